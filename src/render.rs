//! Markdown projection of a machine representation.
//!
//! The rendering is a projection, not the canonical form: its conditional
//! fingerprint is computed over the rendered bytes themselves, never derived
//! from the MR CID.

use crate::model::{ContentBlock, MachineRepresentation};
use std::fmt::Write;

/// Render an MR to markdown text, ending with a single trailing newline.
#[must_use]
pub fn to_markdown(mr: &MachineRepresentation) -> String {
    let mut out = String::new();
    if !mr.title.is_empty() {
        let _ = writeln!(out, "# {}\n", mr.title);
    }
    for block in &mr.blocks {
        match block {
            ContentBlock::Heading { level, text } => {
                let text = text.trim();
                if !text.is_empty() {
                    let level = (*level).clamp(1, 6) as usize;
                    let _ = writeln!(out, "{} {}\n", "#".repeat(level), text);
                }
            }
            ContentBlock::Paragraph { text } | ContentBlock::Generic { text, .. } => {
                let text = text.trim();
                if !text.is_empty() {
                    let _ = writeln!(out, "{text}\n");
                }
            }
            ContentBlock::List { ordered, items } => {
                for (idx, item) in items.iter().enumerate() {
                    if *ordered {
                        let _ = writeln!(out, "{}. {item}", idx + 1);
                    } else {
                        let _ = writeln!(out, "- {item}");
                    }
                }
                if !items.is_empty() {
                    out.push('\n');
                }
            }
            ContentBlock::Image { url, alt_text, .. } => {
                if let Some(url) = url {
                    let _ = writeln!(out, "![{alt_text}]({url})\n");
                }
            }
            ContentBlock::Code { text } => {
                if !text.is_empty() {
                    let _ = writeln!(out, "```\n{text}\n```\n");
                }
            }
            ContentBlock::Quote { text } => {
                if !text.is_empty() {
                    for line in text.lines() {
                        let _ = writeln!(out, "> {line}");
                    }
                    out.push('\n');
                }
            }
        }
    }
    format!("{}\n", out.trim_end())
}
