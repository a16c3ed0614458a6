//! Invitation tokens and bearer header parsing

use axum::http::HeaderMap;

const TOKEN_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of a generated invitation token
pub const INVITATION_TOKEN_LEN: usize = 37;

/// Random base-36 token with mixed case
pub fn generate_invitation_token() -> String {
    (0..INVITATION_TOKEN_LEN)
        .map(|_| {
            let c = TOKEN_ALPHABET[rand::random::<u32>() as usize % TOKEN_ALPHABET.len()] as char;
            if rand::random::<bool>() {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect()
}

/// Extract the token of an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
