//! Caller identity.
//!
//! Accounts authenticate with a bearer API key issued once at registration.
//! Only the sha256 of the key is stored; lookups are by hash so the table
//! never holds usable credentials. Identity federation beyond keys this
//! service issued is an external concern.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::http::HeaderMap;
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::Row;

/// Resolved request identity, passed explicitly into handlers.
#[derive(Debug, Clone)]
pub struct Caller {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub token_balance: i64,
    pub created_at: Option<String>,
}

pub fn generate_api_key() -> String {
    let mut buf = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{b:02x}")).collect()
}

pub fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn hash_prefix(value: &str) -> String {
    sha256_hex(value).chars().take(12).collect()
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            let (scheme, rest) = v.split_once(' ')?;
            if !scheme.eq_ignore_ascii_case("bearer") {
                return None;
            }
            let token = rest.trim();
            (!token.is_empty()).then_some(token)
        })
}

fn normalize_api_key(raw: &str) -> Option<String> {
    let t = raw.trim();
    if t.len() != 64 || !t.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(t.to_ascii_lowercase())
}

pub async fn require_caller(state: &AppState, headers: &HeaderMap) -> ApiResult<Caller> {
    let token = bearer_token(headers)
        .and_then(normalize_api_key)
        .ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;
    let key_hash = sha256_hex(&token);

    let accounts = state.table("accounts");
    let row = sqlx::query(&format!(
        "SELECT id,email,display_name,avatar_url,token_balance,created_at FROM {accounts} WHERE api_key_hash=$1"
    ))
    .bind(&key_hash)
    .fetch_optional(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "db caller lookup failed");
        ApiError::internal("database error")
    })?;

    let Some(row) = row else {
        tracing::warn!(
            security_event = "api_key_auth",
            outcome = "rejected",
            key_hash_prefix = %hash_prefix(&token),
            "unknown api key"
        );
        return Err(ApiError::unauthorized("Unauthorized"));
    };

    Ok(Caller {
        id: row.try_get("id").unwrap_or_default(),
        email: row.try_get("email").unwrap_or_default(),
        display_name: row.try_get("display_name").unwrap_or(None),
        avatar_url: row.try_get("avatar_url").unwrap_or(None),
        token_balance: row.try_get("token_balance").unwrap_or(0),
        created_at: row.try_get("created_at").ok(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn generated_keys_are_64_hex_chars() {
        let key = generate_api_key();
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, generate_api_key());
    }

    #[test]
    fn bearer_parsing_accepts_case_insensitive_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert("authorization", HeaderValue::from_static("bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));
    }

    #[test]
    fn bearer_parsing_rejects_other_schemes_and_empty_tokens() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn api_key_normalization_enforces_shape() {
        let key = generate_api_key();
        assert_eq!(normalize_api_key(&key), Some(key.clone()));
        assert_eq!(
            normalize_api_key(&key.to_uppercase()),
            Some(key.to_lowercase())
        );
        assert_eq!(normalize_api_key("short"), None);
        assert_eq!(normalize_api_key(&"g".repeat(64)), None);
    }

    #[test]
    fn key_hash_is_stable() {
        assert_eq!(sha256_hex("abc"), sha256_hex("abc"));
        assert_ne!(sha256_hex("abc"), sha256_hex("abd"));
        assert_eq!(sha256_hex("abc").len(), 64);
    }
}
