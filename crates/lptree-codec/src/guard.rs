//! Resource limits for decoding and encoding.
//!
//! [`GuardConfig`] is the caller-facing policy. [`Guard`] holds the live
//! counters for a single decode call and is never shared between calls.

use tracing::warn;

use crate::error::{ParseError, ParseErrorKind, Result};

/// Default maximum name length: 64 KiB.
pub const DEFAULT_MAX_NAME_LENGTH: usize = 64 * 1024;

/// Default maximum content length of a single value: 16 MiB.
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 16 * 1024 * 1024;

/// Default maximum input size: 64 MiB.
pub const DEFAULT_MAX_TOTAL_INPUT_SIZE: usize = 64 * 1024 * 1024;

/// Default maximum container nesting.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 64;

/// Default budget for bytes copied out of the input: 64 MiB.
pub const DEFAULT_MAX_TOTAL_ALLOCATED_BYTES: usize = 64 * 1024 * 1024;

/// Default maximum digits in a length field or container count.
pub const DEFAULT_MAX_LENGTH_DIGITS: usize = 20;

/// Resource limits consulted by the decoder and encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GuardConfig {
    /// Maximum NAMELEN. Default: 64 KiB.
    pub max_name_length: usize,
    /// Maximum CONTENTLEN of any value, containers included. Default: 16 MiB.
    pub max_content_length: usize,
    /// Maximum size of the whole input buffer. Default: 64 MiB.
    pub max_total_input_size: usize,
    /// Maximum number of nested containers. Default: 64.
    pub max_nesting_depth: usize,
    /// Maximum bytes copied into names, leaf contents and count digits
    /// across one decode. Default: 64 MiB.
    pub max_total_allocated_bytes: usize,
    /// Maximum digits in NAMELEN, CONTENTLEN or a container count. Default: 20.
    pub max_length_digits: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            max_total_input_size: DEFAULT_MAX_TOTAL_INPUT_SIZE,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            max_total_allocated_bytes: DEFAULT_MAX_TOTAL_ALLOCATED_BYTES,
            max_length_digits: DEFAULT_MAX_LENGTH_DIGITS,
        }
    }
}

impl GuardConfig {
    /// Tight limits for input from untrusted peers.
    pub fn strict() -> Self {
        Self {
            max_name_length: 1024,
            max_content_length: 1024 * 1024,
            max_total_input_size: 4 * 1024 * 1024,
            max_nesting_depth: 16,
            max_total_allocated_bytes: 8 * 1024 * 1024,
            max_length_digits: 10,
        }
    }

    /// No byte limits. Nesting stays bounded so the work stack does too.
    pub fn unlimited() -> Self {
        Self {
            max_name_length: usize::MAX,
            max_content_length: usize::MAX,
            max_total_input_size: usize::MAX,
            max_nesting_depth: 1024,
            max_total_allocated_bytes: usize::MAX,
            max_length_digits: DEFAULT_MAX_LENGTH_DIGITS,
        }
    }
}

/// Live counters for one decode call.
#[derive(Debug)]
pub struct Guard<'a> {
    config: &'a GuardConfig,
    allocated: usize,
    depth: usize,
}

impl<'a> Guard<'a> {
    /// Start a decode over `input_len` bytes.
    pub fn new(config: &'a GuardConfig, input_len: usize) -> Result<Self> {
        if input_len > config.max_total_input_size {
            warn!(
                input_len,
                max = config.max_total_input_size,
                "input exceeds max_total_input_size"
            );
            return Err(ParseError::new(ParseErrorKind::ResourceLimitExceeded, 0));
        }
        Ok(Self {
            config,
            allocated: 0,
            depth: 0,
        })
    }

    pub fn config(&self) -> &'a GuardConfig {
        self.config
    }

    /// Charge `len` bytes against the allocation budget before copying them.
    pub fn charge(&mut self, len: usize, offset: usize) -> Result<()> {
        let total = self.allocated.saturating_add(len);
        if total > self.config.max_total_allocated_bytes {
            warn!(
                total,
                max = self.config.max_total_allocated_bytes,
                offset,
                "decode exceeds max_total_allocated_bytes"
            );
            return Err(ParseError::new(
                ParseErrorKind::ResourceLimitExceeded,
                offset,
            ));
        }
        self.allocated = total;
        Ok(())
    }

    /// Enter a container.
    pub fn enter(&mut self, offset: usize) -> Result<()> {
        if self.depth >= self.config.max_nesting_depth {
            warn!(
                depth = self.depth + 1,
                max = self.config.max_nesting_depth,
                offset,
                "decode exceeds max_nesting_depth"
            );
            return Err(ParseError::new(ParseErrorKind::DepthExceeded, offset));
        }
        self.depth += 1;
        Ok(())
    }

    /// Leave the innermost container.
    pub fn exit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Current container depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Bytes charged so far.
    pub fn allocated(&self) -> usize {
        self.allocated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversized_input_up_front() {
        let cfg = GuardConfig {
            max_total_input_size: 8,
            ..GuardConfig::default()
        };
        let err = Guard::new(&cfg, 9).unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::ResourceLimitExceeded);
        assert_eq!(err.offset(), 0);
        assert!(Guard::new(&cfg, 8).is_ok());
    }

    #[test]
    fn allocation_budget_is_cumulative() {
        let cfg = GuardConfig {
            max_total_allocated_bytes: 10,
            ..GuardConfig::default()
        };
        let mut guard = Guard::new(&cfg, 0).unwrap();
        guard.charge(6, 0).unwrap();
        guard.charge(4, 6).unwrap();
        assert_eq!(guard.allocated(), 10);

        let err = guard.charge(1, 10).unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::ResourceLimitExceeded);
        assert_eq!(err.offset(), 10);
    }

    #[test]
    fn depth_counter_enforces_limit() {
        let cfg = GuardConfig {
            max_nesting_depth: 2,
            ..GuardConfig::default()
        };
        let mut guard = Guard::new(&cfg, 0).unwrap();
        guard.enter(0).unwrap();
        guard.enter(5).unwrap();
        let err = guard.enter(9).unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::DepthExceeded);

        guard.exit();
        assert_eq!(guard.depth(), 1);
        guard.enter(12).unwrap();
    }

    #[cfg(feature = "serde")]
    #[test]
    fn config_deserializes_with_defaults() {
        let cfg: GuardConfig = serde_json::from_str(r#"{"max_nesting_depth": 4}"#).unwrap();
        assert_eq!(cfg.max_nesting_depth, 4);
        assert_eq!(cfg.max_name_length, DEFAULT_MAX_NAME_LENGTH);
    }

    #[test]
    fn presets_differ_from_default() {
        let strict = GuardConfig::strict();
        assert!(strict.max_nesting_depth < GuardConfig::default().max_nesting_depth);
        assert_eq!(GuardConfig::unlimited().max_content_length, usize::MAX);
    }
}
