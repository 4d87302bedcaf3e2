//! Password hashing (bcrypt).

use super::AuthError;

/// bcrypt only reads this many bytes of input; anything past it is ignored.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Hash a password with the given bcrypt cost.
///
/// Passwords longer than [`MAX_PASSWORD_BYTES`] are rejected rather than
/// silently truncated.
pub fn hash(plaintext: &str, cost: u32) -> Result<String, AuthError> {
    if plaintext.len() > MAX_PASSWORD_BYTES {
        return Err(AuthError::invalid_input(format!(
            "Invalid password: must be at most {MAX_PASSWORD_BYTES} bytes"
        )));
    }
    bcrypt::hash(plaintext, cost).map_err(|e| AuthError::internal(format!("hashing failed: {e}")))
}

/// Verify a password against a bcrypt digest. A malformed digest never matches,
/// and neither does a candidate too long to have been hashed.
pub fn verify(plaintext: &str, digest: &str) -> bool {
    if plaintext.len() > MAX_PASSWORD_BYTES {
        return false;
    }
    bcrypt::verify(plaintext, digest).unwrap_or(false)
}

/// Run CPU-bound work on the blocking pool.
pub async fn blocking<T, F>(f: F) -> Result<T, AuthError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AuthError::internal(format!("blocking task failed: {e}")))
}

/// [`hash`] off the async executor.
pub async fn hash_blocking(plaintext: String, cost: u32) -> Result<String, AuthError> {
    blocking(move || hash(&plaintext, cost)).await?
}
