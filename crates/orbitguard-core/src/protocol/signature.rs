// ============================================
// File: crates/orbitguard-core/src/protocol/signature.rs
// ============================================
//! # Sequence Signature Tokens
//!
//! Sensors stamp each envelope with a token derived from the sequence number
//! sealed inside the payload. The relay re-derives it after decryption and
//! compares.
//!
//! ```text
//! sequence 42      → "SIG_000042"
//! sequence 1234567 → "SIG_1234567"   (padding is a minimum width)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This is a consistency check, not authentication: anyone who can read
//!   the sequence can forge the token. Integrity comes from the AEAD tag

/// Fixed token prefix.
pub const SIGNATURE_PREFIX: &str = "SIG_";

/// Minimum number of digits in the token.
pub const SIGNATURE_DIGITS: usize = 6;

/// Derives the expected token for `sequence`.
#[must_use]
pub fn expected_signature(sequence: u64) -> String {
    format!("{SIGNATURE_PREFIX}{sequence:0width$}", width = SIGNATURE_DIGITS)
}

/// Returns `true` if `token` is the expected token for `sequence`.
#[must_use]
pub fn signature_matches(token: &str, sequence: u64) -> bool {
    token == expected_signature(sequence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_padding() {
        assert_eq!(expected_signature(0), "SIG_000000");
        assert_eq!(expected_signature(42), "SIG_000042");
        assert_eq!(expected_signature(999_999), "SIG_999999");
    }

    #[test]
    fn test_wide_sequence_is_not_truncated() {
        assert_eq!(expected_signature(1_234_567), "SIG_1234567");
    }

    #[test]
    fn test_matching() {
        assert!(signature_matches("SIG_000007", 7));
        assert!(!signature_matches("SIG_7", 7));
        assert!(!signature_matches("SIG_000008", 7));
        assert!(!signature_matches("sig_000007", 7));
    }
}
