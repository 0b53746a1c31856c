//! Time-based one-time codes for the Sense MFA step.
//!
//! Standard 30-second / 6-digit TOTP over HMAC-SHA1, which is what every
//! authenticator app produces for a Sense account.

use ring::hmac;

use crate::error::Error;

/// Length of one code window in seconds.
pub const STEP_SECS: u64 = 30;

const DIGITS_MODULUS: u32 = 1_000_000;
const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Generate the 6-digit code for `secret` at `unix_secs`.
///
/// The secret is base32, case-insensitive. Characters outside the
/// alphabet (spaces, dashes, `=` padding) are skipped.
pub fn generate(secret: &str, unix_secs: u64) -> Result<String, Error> {
    let key = decode_base32(secret)?;
    let counter = unix_secs / STEP_SECS;

    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, &key);
    let tag = hmac::sign(&key, &counter.to_be_bytes());
    let hash = tag.as_ref();

    let offset = usize::from(hash[hash.len() - 1] & 0x0f);
    let binary = u32::from_be_bytes([
        hash[offset] & 0x7f,
        hash[offset + 1],
        hash[offset + 2],
        hash[offset + 3],
    ]);

    Ok(format!("{:06}", binary % DIGITS_MODULUS))
}

/// Generate the code for the current wall-clock time.
pub fn generate_now(secret: &str) -> Result<String, Error> {
    generate(secret, unix_now())
}

/// Seconds left before the code generated at `unix_secs` rolls over.
pub fn seconds_remaining(unix_secs: u64) -> u64 {
    STEP_SECS - unix_secs % STEP_SECS
}

/// Current Unix time in whole seconds.
pub fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn decode_base32(secret: &str) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(secret.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;

    for ch in secret.chars() {
        let upper = ch.to_ascii_uppercase();
        let Some(value) = BASE32_ALPHABET
            .iter()
            .position(|&c| char::from(c) == upper)
        else {
            continue;
        };

        buffer = (buffer << 5) | value as u32;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
            buffer &= (1 << bits) - 1;
        }
    }

    if out.is_empty() {
        return Err(Error::InvalidTotpSecret(
            "secret has no base32 content".into(),
        ));
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // RFC 6238 SHA-1 seed "12345678901234567890", base32-encoded.
    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    #[test]
    fn matches_rfc6238_vectors() {
        let cases = [
            (59, "287082"),
            (1_111_111_109, "081804"),
            (1_111_111_111, "050471"),
            (1_234_567_890, "005924"),
            (2_000_000_000, "279037"),
        ];
        for (time, expected) in cases {
            assert_eq!(generate(RFC_SECRET, time).unwrap(), expected, "t={time}");
        }
    }

    #[test]
    fn secret_is_case_and_whitespace_insensitive() {
        let spaced = "gezd gnbv gy3t qojq gezd gnbv gy3t qojq";
        assert_eq!(
            generate(spaced, 59).unwrap(),
            generate(RFC_SECRET, 59).unwrap()
        );
    }

    #[test]
    fn stable_within_window_and_changes_across() {
        let start = 1_700_000_010 - 1_700_000_010 % STEP_SECS;
        let first = generate("JBSWY3DPEHPK3PXP", start).unwrap();
        let last = generate("JBSWY3DPEHPK3PXP", start + STEP_SECS - 1).unwrap();
        let next = generate("JBSWY3DPEHPK3PXP", start + STEP_SECS).unwrap();
        assert_eq!(first, last);
        assert_ne!(first, next);
    }

    #[test]
    fn codes_are_six_digits() {
        for t in (0..20).map(|i| i * STEP_SECS) {
            let code = generate("JBSWY3DPEHPK3PXP", t).unwrap();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(generate("", 0), Err(Error::InvalidTotpSecret(_))));
        assert!(matches!(generate("   ", 0), Err(Error::InvalidTotpSecret(_))));
    }

    #[test]
    fn single_character_decodes_to_nothing() {
        assert!(matches!(generate("A", 0), Err(Error::InvalidTotpSecret(_))));
    }

    #[test]
    fn non_base32_characters_are_skipped() {
        assert_eq!(
            generate("GEZD!GNBV GY3T-QOJQ_GEZD1GNBV8GY3T0QOJQ", 59).unwrap(),
            "287082"
        );
    }

    #[test]
    fn secret_without_base32_content_is_rejected() {
        assert!(matches!(
            generate("0189!?", 0),
            Err(Error::InvalidTotpSecret(_))
        ));
    }

    #[test]
    fn remaining_seconds_counts_down() {
        assert_eq!(seconds_remaining(0), 30);
        assert_eq!(seconds_remaining(29), 1);
        assert_eq!(seconds_remaining(30), 30);
    }
}
