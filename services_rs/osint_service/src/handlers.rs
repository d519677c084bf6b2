use crate::auth;
use crate::error::{ApiError, ApiResult};
use crate::ledger;
use crate::models::*;
use crate::osint::{email, phone};
use crate::payment::{self, CheckoutRequest, WebhookAction, SIGNATURE_HEADER, TOKEN_PACKAGES};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

const MAX_DISPLAY_NAME_LEN: usize = 120;

fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

fn normalize_limit(raw: Option<i64>, default: i64, min: i64, max: i64) -> i64 {
    raw.unwrap_or(default).clamp(min, max)
}

pub async fn health(State(state): State<AppState>) -> axum::Json<HealthOut> {
    axum::Json(HealthOut {
        status: "ok",
        env: state.env_name.clone(),
        service: "BlackEagle OSINT API",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn create_account(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<RegisterReq>,
) -> ApiResult<axum::Json<DataBody<RegisterResp>>> {
    let email_addr = body.email.trim().to_lowercase();
    if email_addr.is_empty() {
        return Err(ApiError::bad_request("Email is required"));
    }
    if !email::is_valid_format(&email_addr) {
        return Err(ApiError::bad_request("invalid email format"));
    }
    let display_name = body
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    if display_name
        .as_deref()
        .is_some_and(|n| n.len() > MAX_DISPLAY_NAME_LEN)
    {
        return Err(ApiError::bad_request("display_name too long"));
    }

    let api_key = auth::generate_api_key();
    let key_hash = auth::sha256_hex(&api_key);
    let account_id = Uuid::new_v4().to_string();
    let now = now_iso();

    let accounts = state.table("accounts");
    let res = sqlx::query(&format!(
        "INSERT INTO {accounts} (id,email,display_name,avatar_url,api_key_hash,token_balance,created_at,updated_at) \
         VALUES ($1,$2,$3,$4,$5,$6,$7,$8)"
    ))
    .bind(&account_id)
    .bind(&email_addr)
    .bind(display_name.as_deref())
    .bind(Option::<String>::None)
    .bind(&key_hash)
    .bind(0i64)
    .bind(&now)
    .bind(&now)
    .execute(&state.pool)
    .await;

    if let Err(e) = res {
        let unique_violation = match &e {
            sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
            _ => false,
        };
        if unique_violation {
            return Err(ApiError::conflict("email already registered"));
        }
        tracing::error!(error = %e, "db create_account insert failed");
        return Err(ApiError::internal("database error"));
    }

    Ok(axum::Json(DataBody::new(RegisterResp {
        account_id,
        email: email_addr,
        display_name,
        api_key,
        token_balance: 0,
    })))
}

pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<axum::Json<DataBody<MeResp>>> {
    let caller = auth::require_caller(&state, &headers).await?;
    Ok(axum::Json(DataBody::new(MeResp {
        account_id: caller.id,
        email: caller.email,
        display_name: caller.display_name,
        avatar_url: caller.avatar_url,
        token_balance: caller.token_balance,
        created_at: caller.created_at,
    })))
}

pub async fn list_packages() -> axum::Json<DataBody<&'static [payment::TokenPackage]>> {
    axum::Json(DataBody::new(TOKEN_PACKAGES))
}

pub async fn scan_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<EmailScanReq>,
) -> ApiResult<axum::Json<DataBody<EmailReport>>> {
    let caller = auth::require_caller(&state, &headers).await?;

    let email_addr = body.email.trim().to_string();
    if email_addr.is_empty() {
        return Err(ApiError::bad_request("Email is required"));
    }

    // Debit before lookup; "no findings" is still a billable scan.
    let remaining = ledger::charge_scan(&state, &caller.id, "email", &email_addr).await?;

    let format_valid = email::is_valid_format(&email_addr);
    let disposable = email::is_disposable(&email_addr);
    let free_provider = email::is_free_provider(&email_addr);
    let deliverable = format_valid && !disposable;

    let (gravatar_url, breaches, social_profiles) = if format_valid {
        let username = email::local_part(&email_addr);
        tokio::join!(
            state.avatar.probe(&email_addr),
            state.intel.breach.breaches_for(&email_addr),
            state
                .intel
                .social
                .profiles_for(&email_addr, &username, body.deep_scan),
        )
    } else {
        (None, Vec::new(), Vec::new())
    };

    let social_count = social_profiles.iter().filter(|p| p.exists).count();
    tracing::info!(
        module = "email",
        deep_scan = body.deep_scan,
        remaining_tokens = remaining,
        "scan completed"
    );

    Ok(axum::Json(DataBody::new(EmailReport {
        valid: format_valid,
        format_valid,
        disposable,
        free_provider,
        deliverable,
        breached: !breaches.is_empty(),
        breach_count: breaches.len(),
        breaches,
        gravatar_url,
        social_profiles,
        social_count,
        email: email_addr,
    })))
}

pub async fn scan_phone(
    State(state): State<AppState>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<PhoneScanReq>,
) -> ApiResult<axum::Json<DataBody<PhoneReport>>> {
    let caller = auth::require_caller(&state, &headers).await?;

    let phone_raw = body.phone.trim().to_string();
    if phone_raw.is_empty() {
        return Err(ApiError::bad_request("Phone number is required"));
    }

    let remaining = ledger::charge_scan(&state, &caller.id, "phone", &phone_raw).await?;

    let report = match phone::parse(&phone_raw, &state.default_country_code) {
        // Unparseable input is a completed (and charged) scan with an empty report.
        None => PhoneReport {
            phone: phone_raw,
            formatted: String::new(),
            valid: false,
            country_code: String::new(),
            country_name: "Unknown".to_string(),
            country_iso: "XX".to_string(),
            carrier: "Unknown".to_string(),
            line_type: "unknown".to_string(),
            whatsapp: false,
            telegram: false,
            national_number: String::new(),
            international_format: String::new(),
        },
        Some(parsed) => {
            let e164 = parsed.e164();
            let country = phone::country_for(&parsed.country_code);
            let presence = state.intel.presence.messengers_for(&e164).await;
            PhoneReport {
                phone: phone_raw,
                valid: phone::is_plausible_national_number(&parsed.national_number),
                country_name: country
                    .map(|c| c.name.to_string())
                    .unwrap_or_else(|| "Unknown".to_string()),
                country_iso: country
                    .map(|c| c.iso.to_string())
                    .unwrap_or_else(|| "XX".to_string()),
                carrier: phone::carrier_for(&parsed.country_code, &parsed.national_number)
                    .to_string(),
                line_type: "mobile".to_string(),
                whatsapp: presence.whatsapp,
                telegram: presence.telegram,
                international_format: parsed.international(),
                formatted: e164,
                country_code: parsed.country_code,
                national_number: parsed.national_number,
            }
        }
    };

    tracing::info!(module = "phone", remaining_tokens = remaining, "scan completed");

    Ok(axum::Json(DataBody::new(report)))
}

pub async fn list_scans(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ScanLogParams>,
) -> ApiResult<axum::Json<DataBody<Vec<ScanLogItem>>>> {
    let caller = auth::require_caller(&state, &headers).await?;
    let limit = normalize_limit(params.limit, 50, 1, 200);

    let scan_logs = state.table("scan_logs");
    let rows = sqlx::query(&format!(
        "SELECT id,module,query,tokens_charged,created_at FROM {scan_logs} \
         WHERE account_id=$1 ORDER BY created_at DESC LIMIT $2"
    ))
    .bind(&caller.id)
    .bind(limit)
    .fetch_all(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "db list_scans failed");
        ApiError::internal("database error")
    })?;

    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        out.push(ScanLogItem {
            id: r.try_get("id").unwrap_or_default(),
            module: r.try_get("module").unwrap_or_default(),
            query: r.try_get("query").unwrap_or_default(),
            tokens_charged: r.try_get("tokens_charged").unwrap_or(0),
            created_at: r.try_get("created_at").ok(),
        });
    }

    Ok(axum::Json(DataBody::new(out)))
}

pub async fn create_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<PaymentCreateReq>,
) -> ApiResult<axum::Json<PaymentCreateResp>> {
    let caller = auth::require_caller(&state, &headers).await?;

    let pkg = payment::package_by_id(body.package_id.trim())
        .ok_or_else(|| ApiError::bad_request("Invalid request"))?;
    // Never trust client-side pricing; the catalog is authoritative.
    if body.amount != pkg.price || body.tokens != pkg.tokens {
        return Err(ApiError::bad_request("package price mismatch"));
    }

    let transaction_id = Uuid::new_v4().to_string();
    let now = now_iso();
    let transactions = state.table("transactions");
    sqlx::query(&format!(
        "INSERT INTO {transactions} (id,account_id,amount,tokens,status,external_payment_id,created_at,updated_at) \
         VALUES ($1,$2,$3,$4,$5,$6,$7,$8)"
    ))
    .bind(&transaction_id)
    .bind(&caller.id)
    .bind(pkg.price)
    .bind(pkg.tokens)
    .bind("pending")
    .bind(Option::<String>::None)
    .bind(&now)
    .bind(&now)
    .execute(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "db create_payment insert failed");
        ApiError::internal("database error")
    })?;

    let session = payment::create_checkout(
        &state.http,
        &state.checkout,
        CheckoutRequest {
            customer_name: caller.display_name.as_deref().unwrap_or("BlackEagle User"),
            customer_email: &caller.email,
            amount: pkg.price,
            tokens: pkg.tokens,
            transaction_id: &transaction_id,
            account_id: &caller.id,
        },
    )
    .await?;

    match session {
        Some(session) => {
            if let Some(ext) = session.external_id.as_deref() {
                let _ = sqlx::query(&format!(
                    "UPDATE {transactions} SET external_payment_id=$1 WHERE id=$2"
                ))
                .bind(ext)
                .bind(&transaction_id)
                .execute(&state.pool)
                .await;
            }
            Ok(axum::Json(PaymentCreateResp {
                success: true,
                payment_url: session.url,
                transaction_id,
                message: None,
            }))
        }
        // Dev fallback: no processor key configured, hand back a mock link so
        // the purchase flow stays drivable end to end.
        None => Ok(axum::Json(PaymentCreateResp {
            success: true,
            payment_url: format!(
                "{}/topup?mock=true&txId={}&tokens={}",
                state.checkout.public_base_url, transaction_id, pkg.tokens
            ),
            transaction_id,
            message: Some("development mode - payment provider not configured"),
        })),
    }
}

pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<axum::Json<WebhookAck>> {
    if let Some(secret) = state.webhook_secret.as_deref() {
        let provided = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !payment::verify_signature(secret, &body, provided) {
            tracing::warn!(
                security_event = "payment_webhook",
                outcome = "invalid_signature",
                "webhook signature rejected"
            );
            return Err(ApiError::unauthorized("Invalid signature"));
        }
    }

    let event: payment::WebhookEvent =
        serde_json::from_slice(&body).map_err(|_| ApiError::bad_request("invalid payload"))?;

    match payment::classify_event(&event.event) {
        WebhookAction::Ignore => Ok(axum::Json(WebhookAck {
            success: true,
            message: Some("Event ignored"),
        })),
        WebhookAction::Complete => {
            let transaction_id = event
                .data
                .metadata
                .transaction_id
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ApiError::bad_request("Missing metadata"))?
                .to_string();

            let transactions = state.table("transactions");
            let mut tx = state.pool.begin().await.map_err(|e| {
                tracing::error!(error = %e, "db begin webhook failed");
                ApiError::internal("database error")
            })?;

            // Check-and-set on the stored status: a replayed event finds no
            // pending row and credits nothing.
            let row = sqlx::query(&format!(
                "UPDATE {transactions} SET status='completed', updated_at=$1, \
                 external_payment_id=COALESCE(external_payment_id,$2) \
                 WHERE id=$3 AND status='pending' RETURNING account_id,tokens"
            ))
            .bind(now_iso())
            .bind(event.data.id.as_deref())
            .bind(&transaction_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "db webhook complete update failed");
                ApiError::internal("database error")
            })?;

            match row {
                Some(row) => {
                    let account_id: String = row.try_get("account_id").unwrap_or_default();
                    let tokens: i64 = row.try_get("tokens").unwrap_or(0);
                    let balance =
                        ledger::credit_in_tx(&state, &mut tx, &account_id, tokens).await?;
                    tx.commit().await.map_err(|e| {
                        tracing::error!(error = %e, "db webhook commit failed");
                        ApiError::internal("database error")
                    })?;
                    tracing::info!(
                        transaction = %transaction_id,
                        tokens,
                        balance,
                        "payment completed, tokens credited"
                    );
                    Ok(axum::Json(WebhookAck {
                        success: true,
                        message: None,
                    }))
                }
                None => {
                    // Already terminal (replay) or unknown id; either way no
                    // state change, and the processor gets an ack.
                    drop(tx);
                    let known = sqlx::query(&format!(
                        "SELECT status FROM {transactions} WHERE id=$1"
                    ))
                    .bind(&transaction_id)
                    .fetch_optional(&state.pool)
                    .await
                    .ok()
                    .flatten();
                    match known {
                        Some(r) => {
                            let status: String = r.try_get("status").unwrap_or_default();
                            tracing::info!(
                                transaction = %transaction_id,
                                status = %status,
                                "webhook replay ignored"
                            );
                        }
                        None => {
                            tracing::warn!(
                                transaction = %transaction_id,
                                "webhook for unknown transaction"
                            );
                        }
                    }
                    Ok(axum::Json(WebhookAck {
                        success: true,
                        message: None,
                    }))
                }
            }
        }
        WebhookAction::Fail => {
            if let Some(transaction_id) = event
                .data
                .metadata
                .transaction_id
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
            {
                let transactions = state.table("transactions");
                let res = sqlx::query(&format!(
                    "UPDATE {transactions} SET status='failed', updated_at=$1 \
                     WHERE id=$2 AND status='pending'"
                ))
                .bind(now_iso())
                .bind(transaction_id)
                .execute(&state.pool)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "db webhook fail update failed");
                    ApiError::internal("database error")
                })?;
                if res.rows_affected() == 1 {
                    tracing::info!(transaction = %transaction_id, "payment marked failed");
                }
            }
            Ok(axum::Json(WebhookAck {
                success: true,
                message: None,
            }))
        }
    }
}
