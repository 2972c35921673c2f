//! Data model for machine representations.

mod block;
mod mr;

pub use block::{ContentBlock, RawBlock};
pub use mr::{Author, FeaturedImage, Links, MachineRepresentation, Term};
