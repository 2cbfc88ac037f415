//! Descriptor parse errors

use thiserror::Error;

/// Errors produced while decoding a raw descriptor buffer
///
/// Parsing is a pure function of its input, so these errors never carry
/// side effects and are always safe to hand back to the immediate caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Fewer than two bytes, so neither bLength nor bDescriptorType is readable
    #[error("Truncated descriptor header: need 2 bytes")]
    TruncatedHeader,

    /// The buffer is shorter than the descriptor's declared bLength
    #[error("Truncated descriptor body: declared {declared} bytes, got {available}")]
    TruncatedBody { declared: usize, available: usize },

    /// A fixed-size descriptor declared a length other than its defined size
    #[error(
        "Descriptor length mismatch for type {descriptor_type:#04x}: expected {expected}, got {actual}"
    )]
    LengthMismatch {
        descriptor_type: u8,
        expected: usize,
        actual: usize,
    },

    /// bDescriptorType is not one of the standard descriptor codes
    #[error("Unknown descriptor type {0:#04x}")]
    UnknownDescriptorType(u8),

    /// A valid descriptor of a different kind than the caller asked for
    #[error("Expected descriptor type {expected:#04x}, found {actual:#04x}")]
    UnexpectedType { expected: u8, actual: u8 },
}

/// Type alias for descriptor parse results
pub type Result<T> = std::result::Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ParseError::LengthMismatch {
            descriptor_type: 0x02,
            expected: 9,
            actual: 8,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("length mismatch"));
        assert!(msg.contains("0x02"));
        assert!(msg.contains("expected 9"));
    }

    #[test]
    fn test_unknown_type_display() {
        let msg = ParseError::UnknownDescriptorType(0x29).to_string();
        assert_eq!(msg, "Unknown descriptor type 0x29");
    }
}
