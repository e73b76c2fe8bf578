use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use rand::{Rng, distr::Alphanumeric};

const PLACEHOLDER_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
#[error("credential hashing failed: {0}")]
pub struct CredentialError(String);

/// Generates an unguessable credential for an account nobody has logged
/// into yet and returns its argon2 PHC hash. The plaintext is discarded.
///
/// Hashing runs on the blocking pool.
pub async fn placeholder_credential() -> Result<String, CredentialError> {
    tokio::task::spawn_blocking(hash_placeholder)
        .await
        .map_err(|e| CredentialError(e.to_string()))?
}

fn hash_placeholder() -> Result<String, CredentialError> {
    let plaintext: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(PLACEHOLDER_LEN)
        .map(char::from)
        .collect();

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CredentialError(e.to_string()))
}
