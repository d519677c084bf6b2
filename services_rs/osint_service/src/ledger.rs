//! Token ledger. The only module that mutates `token_balance`.
//!
//! Both mutations are single conditional/unconditional UPDATEs so that the
//! database performs the compare-and-set: two debits racing on a balance of
//! one can never both pass the `token_balance >= amount` guard, and a debit
//! that fails leaves no trace. The scan charge couples the debit with its
//! audit row in one transaction so billing and the scan log cannot diverge.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use chrono::Utc;
use sqlx::{Row, Transaction};
use uuid::Uuid;

/// Fixed price per scan; one token buys one lookup.
pub const SCAN_TOKEN_COST: i64 = 1;

const MAX_QUERY_LEN: usize = 255;

fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

/// Keep stored queries within the column width.
pub fn clamp_query(query: &str) -> String {
    let trimmed = query.trim();
    if trimmed.len() <= MAX_QUERY_LEN {
        return trimmed.to_string();
    }
    let mut out = String::with_capacity(MAX_QUERY_LEN);
    for c in trimmed.chars() {
        if out.len() + c.len_utf8() > MAX_QUERY_LEN {
            break;
        }
        out.push(c);
    }
    out
}

/// Debit one scan's worth of tokens and append the audit row, atomically.
/// Fails closed: insufficient balance rolls everything back and surfaces as
/// 402 with no scan log written.
pub async fn charge_scan(
    state: &AppState,
    account_id: &str,
    module: &'static str,
    query: &str,
) -> ApiResult<i64> {
    let accounts = state.table("accounts");
    let scan_logs = state.table("scan_logs");
    let now = now_iso();

    let mut tx = state.pool.begin().await.map_err(|e| {
        tracing::error!(error = %e, "db begin charge_scan failed");
        ApiError::internal("database error")
    })?;

    let row = sqlx::query(&format!(
        "UPDATE {accounts} SET token_balance = token_balance - $1, updated_at = $2 \
         WHERE id = $3 AND token_balance >= $1 RETURNING token_balance"
    ))
    .bind(SCAN_TOKEN_COST)
    .bind(&now)
    .bind(account_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "db charge_scan debit failed");
        ApiError::internal("database error")
    })?;

    let Some(row) = row else {
        // Zero rows means either no such account or not enough balance.
        let exists = sqlx::query(&format!("SELECT 1 FROM {accounts} WHERE id=$1"))
            .bind(account_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "db charge_scan account check failed");
                ApiError::internal("database error")
            })?
            .is_some();
        if !exists {
            return Err(ApiError::unauthorized("Unauthorized"));
        }
        return Err(ApiError::payment_required("Insufficient tokens"));
    };
    let new_balance: i64 = row.try_get("token_balance").unwrap_or(0);

    sqlx::query(&format!(
        "INSERT INTO {scan_logs} (id,account_id,module,query,tokens_charged,created_at) \
         VALUES ($1,$2,$3,$4,$5,$6)"
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(account_id)
    .bind(module)
    .bind(clamp_query(query))
    .bind(SCAN_TOKEN_COST)
    .bind(&now)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "db charge_scan log insert failed");
        ApiError::internal("database error")
    })?;

    tx.commit().await.map_err(|e| {
        tracing::error!(error = %e, "db charge_scan commit failed");
        ApiError::internal("database error")
    })?;

    Ok(new_balance)
}

/// Credit purchased tokens inside the caller's transaction. The caller (the
/// webhook receiver) is responsible for idempotency via its own state CAS;
/// the ledger just applies the increment.
pub async fn credit_in_tx(
    state: &AppState,
    tx: &mut Transaction<'_, sqlx::Postgres>,
    account_id: &str,
    amount: i64,
) -> ApiResult<i64> {
    if amount <= 0 {
        return Err(ApiError::internal("credit amount must be positive"));
    }
    let accounts = state.table("accounts");
    let row = sqlx::query(&format!(
        "UPDATE {accounts} SET token_balance = token_balance + $1, updated_at = $2 \
         WHERE id = $3 RETURNING token_balance"
    ))
    .bind(amount)
    .bind(now_iso())
    .bind(account_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "db credit failed");
        ApiError::internal("database error")
    })?
    .ok_or_else(|| ApiError::not_found("account not found"))?;

    Ok(row.try_get("token_balance").unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_cost_is_one_token() {
        assert_eq!(SCAN_TOKEN_COST, 1);
    }

    #[test]
    fn query_clamp_respects_char_boundaries() {
        assert_eq!(clamp_query("  0812345678 "), "0812345678");

        let long = "a".repeat(300);
        assert_eq!(clamp_query(&long).len(), 255);

        // Multi-byte input must not be split mid-character.
        let wide = "é".repeat(200);
        let clamped = clamp_query(&wide);
        assert!(clamped.len() <= 255);
        assert!(clamped.chars().all(|c| c == 'é'));
    }
}
