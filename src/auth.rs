use rand::distr::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

const TOKEN_LEN: usize = 64;

/// Random alphanumeric bearer token.
pub fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Tokens are stored and looked up by this digest, never in the clear.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
