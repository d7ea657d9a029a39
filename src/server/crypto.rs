use anyhow::{Context, Result};
use pbkdf2::pbkdf2_hmac;
use rand::Rng;
use sha2::Sha256;

/// Number of digits in a one-time passcode.
pub const OTP_DIGITS: usize = 6;
const OTP_SPACE: u32 = 1_000_000;

const PASSWORD_SCHEME: &str = "pbkdf2_sha256";
const PASSWORD_ITERATIONS: u32 = 100_000;
const PASSWORD_SALT_LEN: usize = 16;
const PASSWORD_KEY_LEN: usize = 32;

/// Draws a uniform code over 000000-999999, left-padded with zeros.
pub fn generate_otp_code() -> String {
    let value = rand::rng().random_range(0..OTP_SPACE);
    format!("{:0width$}", value, width = OTP_DIGITS)
}

/// Generates a random salt of the specified length in bytes.
pub fn generate_salt(len: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut salt = vec![0u8; len];
    rand::rng().fill_bytes(&mut salt);
    salt
}

fn derive_key(password: &str, salt: &[u8], iterations: u32) -> Vec<u8> {
    let mut key = vec![0u8; PASSWORD_KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    key
}

/// Hashes a password with PBKDF2-HMAC-SHA256.
///
/// Output format: `pbkdf2_sha256$<iterations>$<salt hex>$<key hex>`.
pub fn hash_password(password: &str) -> String {
    let salt = generate_salt(PASSWORD_SALT_LEN);
    let key = derive_key(password, &salt, PASSWORD_ITERATIONS);
    format!(
        "{}${}${}${}",
        PASSWORD_SCHEME,
        PASSWORD_ITERATIONS,
        hex::encode(&salt),
        hex::encode(&key)
    )
}

/// Verifies a plain password against a hash produced by [`hash_password`].
///
/// A malformed stored hash is an error, a wrong password is `Ok(false)`.
pub fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(key), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        anyhow::bail!("Malformed password hash");
    };

    if scheme != PASSWORD_SCHEME {
        anyhow::bail!("Unsupported password scheme: {}", scheme);
    }

    let iterations: u32 = iterations
        .parse()
        .context("Invalid iteration count in password hash")?;
    let salt = hex::decode(salt).context("Invalid salt in password hash")?;
    let expected = hex::decode(key).context("Invalid key in password hash")?;

    let derived = derive_key(password, &salt, iterations);
    Ok(constant_time_eq(&derived, &expected))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[test]
fn test_otp_code_shape() {
    for _ in 0..200 {
        let code = generate_otp_code();
        assert_eq!(code.len(), OTP_DIGITS);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }
}

#[test]
fn test_password_roundtrip() -> Result<()> {
    let hash = hash_password("hunter2!");

    assert!(hash.starts_with("pbkdf2_sha256$100000$"));
    assert!(verify_password("hunter2!", &hash)?);
    assert!(!verify_password("hunter3!", &hash)?);

    // Same password, fresh salt
    assert_ne!(hash, hash_password("hunter2!"));
    Ok(())
}

#[test]
fn test_malformed_hash_is_error() {
    assert!(verify_password("x", "not-a-hash").is_err());
    assert!(verify_password("x", "md5$1$00$00").is_err());
    assert!(verify_password("x", "pbkdf2_sha256$abc$00$00").is_err());
}
