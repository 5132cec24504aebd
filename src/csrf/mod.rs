//! CSRF token masking protocol
//!
//! Each session owns a single fixed-length random secret. The secret itself
//! never goes over the wire: every response carries
//! `base64(otp || otp XOR secret)` where `otp` is a fresh one-time pad
//! generated for that response alone. XOR-folding the two halves of a
//! decoded token recovers the claimed secret, which is then compared
//! against the stored one in constant time.
//!
//! The XOR step is not encryption. It exists to vary an otherwise static
//! wire value between responses (a BREACH countermeasure) without rotating
//! the underlying secret, so client and server cannot desynchronize. A
//! captured token therefore still allows recovery of the secret and replay
//! for as long as the session stays valid.
//!
//! Security assumptions:
//! - all communication happens over TLS
//! - sessions are opaque to the client, or the secret leaks with them
//! - sessions are tamper resistant (server-side storage or authenticated
//!   encryption)
//! - state-changing endpoints never use GET, HEAD, or TRACE

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::utils::errors::{GuardError, GuardResult};

/// Session value key the secret is stored under.
pub const SECRET_SESSION_KEY: &str = "csrf.secret";

/// Secret and one-time-pad length in bytes unless configured otherwise.
pub const DEFAULT_SECRET_LENGTH: usize = 32;

/// Header carrying the masked token in both directions.
pub const CSRF_TOKEN_HEADER: &str = "X-CSRF-Token";

fn random_bytes(len: usize) -> GuardResult<Vec<u8>> {
    let mut buf = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| GuardError::Randomness(e.to_string()))?;

    Ok(buf)
}

/// Generate a fresh per-session secret.
pub fn generate_secret(len: usize) -> GuardResult<Vec<u8>> {
    random_bytes(len)
}

/// Generate the one-time pad for a single response.
pub fn generate_otp(len: usize) -> GuardResult<Vec<u8>> {
    random_bytes(len)
}

/// Byte-wise XOR of two equal-length buffers.
///
/// A length mismatch cannot be triggered by request data; both operands are
/// produced locally at the configured length, so hitting the error arm is a
/// bug in the caller.
pub fn xor(a: &[u8], b: &[u8]) -> GuardResult<Vec<u8>> {
    if a.len() != b.len() {
        return Err(GuardError::Internal(format!(
            "xor length mismatch: {} != {}",
            a.len(),
            b.len()
        )));
    }

    Ok(a.iter().zip(b.iter()).map(|(x, y)| x ^ y).collect())
}

/// Encode `otp || otp XOR secret` as the wire token.
pub fn mask(secret: &[u8], otp: &[u8]) -> GuardResult<String> {
    let masked = xor(secret, otp)?;

    let mut wire = Vec::with_capacity(otp.len() + masked.len());
    wire.extend_from_slice(otp);
    wire.extend_from_slice(&masked);

    Ok(BASE64.encode(wire))
}

/// Decode a wire token and fold the pad back out, recovering the claimed
/// secret.
///
/// A missing header is passed in as the empty string and rejected by the
/// length check like any other truncated token.
pub fn unmask(encoded: &str, secret_len: usize) -> GuardResult<Vec<u8>> {
    let raw = BASE64
        .decode(encoded)
        .map_err(|e| GuardError::MalformedToken(e.to_string()))?;

    if raw.len() != secret_len * 2 {
        return Err(GuardError::MalformedToken(format!(
            "expected {} bytes, got {}",
            secret_len * 2,
            raw.len()
        )));
    }

    let (otp, masked) = raw.split_at(secret_len);
    xor(otp, masked)
}

/// Constant-time comparison of a claimed secret against the stored one.
///
/// Must stay fixed-time over the whole buffer; a short-circuiting equality
/// here reopens the timing side channel the masking scheme assumes away.
pub fn verify(claimed: &[u8], secret: &[u8]) -> bool {
    claimed.ct_eq(secret).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xor_is_self_inverse() {
        let a = vec![0xde, 0xad, 0xbe, 0xef];
        let b = vec![0x01, 0x02, 0x03, 0x04];

        let folded = xor(&xor(&a, &b).unwrap(), &b).unwrap();
        assert_eq!(folded, a);
    }

    #[test]
    fn test_xor_is_commutative() {
        let a = vec![0x10, 0x20, 0x30];
        let b = vec![0xff, 0x00, 0x7f];

        assert_eq!(xor(&a, &b).unwrap(), xor(&b, &a).unwrap());
    }

    #[test]
    fn test_xor_rejects_length_mismatch() {
        let result = xor(&[0x00, 0x01], &[0x00]);
        assert!(matches!(result, Err(GuardError::Internal(_))));
    }

    #[test]
    fn test_mask_unmask_round_trip() {
        let secret = generate_secret(DEFAULT_SECRET_LENGTH).unwrap();
        let otp = generate_otp(DEFAULT_SECRET_LENGTH).unwrap();

        let token = mask(&secret, &otp).unwrap();
        let claimed = unmask(&token, DEFAULT_SECRET_LENGTH).unwrap();

        assert_eq!(claimed, secret);
    }

    #[test]
    fn test_round_trip_holds_for_other_lengths() {
        for len in [16, 48, 64] {
            let secret = generate_secret(len).unwrap();
            let otp = generate_otp(len).unwrap();

            let token = mask(&secret, &otp).unwrap();
            assert_eq!(unmask(&token, len).unwrap(), secret);
        }
    }

    #[test]
    fn test_fresh_pads_change_the_wire_value() {
        let secret = generate_secret(DEFAULT_SECRET_LENGTH).unwrap();

        let first = mask(&secret, &generate_otp(DEFAULT_SECRET_LENGTH).unwrap()).unwrap();
        let second = mask(&secret, &generate_otp(DEFAULT_SECRET_LENGTH).unwrap()).unwrap();

        assert_ne!(first, second);
        assert_eq!(
            unmask(&first, DEFAULT_SECRET_LENGTH).unwrap(),
            unmask(&second, DEFAULT_SECRET_LENGTH).unwrap()
        );
    }

    #[test]
    fn test_unmask_rejects_invalid_base64() {
        let result = unmask("~~~not base64~~~", DEFAULT_SECRET_LENGTH);
        assert!(matches!(result, Err(GuardError::MalformedToken(_))));
    }

    #[test]
    fn test_unmask_rejects_wrong_length() {
        // "dGVzdA==" decodes to 4 bytes, far short of 64
        let result = unmask("dGVzdA==", DEFAULT_SECRET_LENGTH);
        assert!(matches!(result, Err(GuardError::MalformedToken(_))));
    }

    #[test]
    fn test_unmask_rejects_empty_token() {
        let result = unmask("", DEFAULT_SECRET_LENGTH);
        assert!(matches!(result, Err(GuardError::MalformedToken(_))));
    }

    #[test]
    fn test_verify_accepts_equal_secrets() {
        let secret = generate_secret(DEFAULT_SECRET_LENGTH).unwrap();
        assert!(verify(&secret, &secret.clone()));
    }

    #[test]
    fn test_verify_rejects_different_secrets() {
        let secret = generate_secret(DEFAULT_SECRET_LENGTH).unwrap();
        let mut other = secret.clone();
        other[0] ^= 0x01;

        assert!(!verify(&other, &secret));
    }

    #[test]
    fn test_generated_secrets_are_distinct() {
        let a = generate_secret(DEFAULT_SECRET_LENGTH).unwrap();
        let b = generate_secret(DEFAULT_SECRET_LENGTH).unwrap();

        assert_eq!(a.len(), DEFAULT_SECRET_LENGTH);
        assert_ne!(a, b);
    }
}
