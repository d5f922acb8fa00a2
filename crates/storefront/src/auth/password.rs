//! PBKDF2 password hashes.
//!
//! Encoded as `pbkdf2_sha256$<iterations>$<salt>$<base64 hash>`, so hashes
//! created with a different iteration count keep verifying.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::Hmac;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{Error, Result};

/// PBKDF2 rounds for new hashes.
pub const DEFAULT_ITERATIONS: u32 = 600_000;

const ALGORITHM: &str = "pbkdf2_sha256";
const SALT_LEN: usize = 22;
const HASH_LEN: usize = 32;

/// Hash `password` with a fresh random salt.
///
/// # Errors
///
/// Returns an internal error if the key derivation fails.
pub fn hash_password(password: &str, iterations: u32) -> Result<String> {
    let salt: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LEN)
        .map(char::from)
        .collect();
    encode(password, &salt, iterations)
}

/// Check `password` against an encoded hash. Malformed hashes never match.
#[must_use]
pub fn verify_password(password: &str, encoded: &str) -> bool {
    let mut parts = encoded.splitn(4, '$');
    let (Some(algorithm), Some(iterations), Some(salt), Some(expected)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if algorithm != ALGORITHM {
        return false;
    }
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    let Ok(candidate) = encode(password, salt, iterations) else {
        return false;
    };
    let Some((_, actual)) = candidate.rsplit_once('$') else {
        return false;
    };
    actual.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn encode(password: &str, salt: &str, iterations: u32) -> Result<String> {
    if iterations == 0 {
        return Err(Error::internal("pbkdf2 iterations must be positive"));
    }
    let mut derived = [0u8; HASH_LEN];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password.as_bytes(), salt.as_bytes(), iterations, &mut derived)
        .map_err(|e| Error::internal(format!("pbkdf2: {e}")))?;
    Ok(format!(
        "{ALGORITHM}${iterations}${salt}${}",
        STANDARD.encode(derived)
    ))
}
