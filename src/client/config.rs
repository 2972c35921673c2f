//! Configuration for the Dual-Native client.
//!
//! # Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `request_timeout_ms` | 20000 | Per-request timeout |
//! | `unconditional_writes` | false | Skip `If-Match` unless a token is supplied |
//!
//! # Examples
//!
//! ```
//! use dual_native::client::ClientConfig;
//!
//! let config = ClientConfig {
//!     request_timeout_ms: 5000,
//!     ..Default::default()
//! };
//! assert!(!config.unconditional_writes);
//! ```

/// Configuration for [`DualNativeClient`](crate::client::DualNativeClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-request timeout in milliseconds. Every network call is bounded;
    /// nothing blocks indefinitely.
    pub request_timeout_ms: u64,
    /// When set, writes omit `If-Match` unless the caller supplies an
    /// explicit token.
    pub unconditional_writes: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            request_timeout_ms: 20_000,
            unconditional_writes: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.request_timeout_ms, 20_000);
        assert!(!config.unconditional_writes);
    }
}
