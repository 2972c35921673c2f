//! dual_native: content-addressed dual representation of documents over HTTP.
//!
//! Every document is served in two synchronized forms:
//!
//! - **MR**: a machine representation as canonical JSON, fingerprinted with a
//!   content ID (`sha256-<hex>`) computed over its canonical encoding.
//! - **Rendered**: a markdown projection with its own fingerprint space,
//!   hashed over the exact rendered bytes.
//!
//! The fingerprints double as HTTP validators: conditional reads short-circuit
//! with 304, and writes carry `If-Match` preconditions that fail with 412 when
//! the resource moved underneath the caller. Responses additionally carry an
//! RFC 9530 `Content-Digest` header over the exact body bytes.

pub mod builder;
pub mod canonical;
pub mod cid;
pub mod client;
pub mod conditional;
pub mod error;
pub mod model;
pub mod render;
pub mod server;
pub mod store;
pub mod suggest;

// Top-level re-exports for common usage
pub use crate::cid::{compute_cid, fingerprint_bytes, CID_PREFIX, DEFAULT_EXCLUDE_KEYS};
pub use crate::error::{DualNativeError, Result};
pub use crate::model::{ContentBlock, MachineRepresentation, RawBlock};

pub use crate::client::{ClientConfig, DualNativeClient, InsertAt, Precondition};

pub use crate::server::{service, AppState, Extensions, ServerConfig};

pub use crate::store::{DocumentStore, MemoryStore, RawDocument};
