//! Payment processor integration: token catalog, hosted-checkout client and
//! webhook verification.
//!
//! The processor is trusted only through two narrow contracts: the checkout
//! link it returns at session creation, and webhook payloads whose HMAC over
//! the raw body matches the shared secret.

use crate::error::{ApiError, ApiResult};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-callback-signature";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TokenPackage {
    pub id: &'static str,
    pub price: i64,
    pub tokens: i64,
    pub popular: bool,
}

/// Static purchase catalog; prices are IDR.
pub const TOKEN_PACKAGES: &[TokenPackage] = &[
    TokenPackage { id: "pkg-2", price: 5_000, tokens: 2, popular: false },
    TokenPackage { id: "pkg-4", price: 10_000, tokens: 4, popular: true },
    TokenPackage { id: "pkg-8", price: 20_000, tokens: 8, popular: false },
    TokenPackage { id: "pkg-25", price: 50_000, tokens: 25, popular: false },
];

pub fn package_by_id(id: &str) -> Option<&'static TokenPackage> {
    TOKEN_PACKAGES.iter().find(|p| p.id == id)
}

#[derive(Clone)]
pub struct CheckoutConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub public_base_url: String,
}

pub struct CheckoutRequest<'a> {
    pub customer_name: &'a str,
    pub customer_email: &'a str,
    pub amount: i64,
    pub tokens: i64,
    pub transaction_id: &'a str,
    pub account_id: &'a str,
}

#[derive(Debug)]
pub struct CheckoutSession {
    pub external_id: Option<String>,
    pub url: String,
}

#[derive(Serialize)]
struct CreatePaymentBody<'a> {
    name: &'a str,
    email: &'a str,
    amount: i64,
    description: String,
    #[serde(rename = "callbackUrl")]
    callback_url: String,
    #[serde(rename = "successRedirectUrl")]
    success_redirect_url: String,
    #[serde(rename = "failureRedirectUrl")]
    failure_redirect_url: String,
    metadata: CheckoutMetadata<'a>,
}

#[derive(Serialize)]
struct CheckoutMetadata<'a> {
    transaction_id: &'a str,
    account_id: &'a str,
    tokens: String,
}

#[derive(Deserialize)]
struct CreatePaymentResp {
    #[serde(default)]
    data: Option<CreatePaymentData>,
}

#[derive(Deserialize)]
struct CreatePaymentData {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

/// Ask the processor for a hosted checkout link. Returns `Ok(None)` when no
/// API key is configured (dev fallback; prod config requires a key).
pub async fn create_checkout(
    http: &reqwest::Client,
    cfg: &CheckoutConfig,
    req: CheckoutRequest<'_>,
) -> ApiResult<Option<CheckoutSession>> {
    let Some(api_key) = cfg.api_key.as_deref() else {
        return Ok(None);
    };

    let body = CreatePaymentBody {
        name: req.customer_name,
        email: req.customer_email,
        amount: req.amount,
        description: format!("BlackEagle OSINT - {} Tokens", req.tokens),
        callback_url: format!("{}/payments/webhook", cfg.public_base_url),
        success_redirect_url: format!("{}/topup?status=success", cfg.public_base_url),
        failure_redirect_url: format!("{}/topup?status=failed", cfg.public_base_url),
        metadata: CheckoutMetadata {
            transaction_id: req.transaction_id,
            account_id: req.account_id,
            tokens: req.tokens.to_string(),
        },
    };

    let resp = http
        .post(format!("{}/payment/create", cfg.api_url))
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "payment create request failed");
            ApiError::upstream("payment provider unreachable")
        })?;

    let status = resp.status();
    if !status.is_success() {
        tracing::error!(status = %status, "payment create rejected by provider");
        return Err(ApiError::upstream("payment provider error"));
    }

    let parsed: CreatePaymentResp = resp.json().await.map_err(|e| {
        tracing::error!(error = %e, "payment create response malformed");
        ApiError::upstream("payment provider error")
    })?;

    let data = parsed.data.unwrap_or(CreatePaymentData {
        id: None,
        link: None,
    });
    let Some(url) = data.link.filter(|l| !l.trim().is_empty()) else {
        tracing::error!("payment create response missing checkout link");
        return Err(ApiError::upstream("payment provider error"));
    };

    Ok(Some(CheckoutSession {
        external_id: data.id,
        url,
    }))
}

pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return String::new(),
    };
    mac.update(body);
    mac.finalize()
        .into_bytes()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Constant-time comparison of the header-carried signature against the HMAC
/// of the raw request body.
pub fn verify_signature(secret: &str, body: &[u8], provided: &str) -> bool {
    let expected = sign_payload(secret, body);
    if expected.is_empty() {
        return false;
    }
    let provided = provided.trim();
    expected.as_bytes().ct_eq(provided.as_bytes()).unwrap_u8() == 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookAction {
    Complete,
    Fail,
    Ignore,
}

/// Event-name mapping from the processor's vocabulary. Unknown events are
/// acknowledged and ignored.
pub fn classify_event(event: &str) -> WebhookAction {
    match event.trim().to_ascii_lowercase().as_str() {
        "payment.completed" | "payment.success" => WebhookAction::Complete,
        "payment.failed" | "payment.expired" => WebhookAction::Fail,
        _ => WebhookAction::Ignore,
    }
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub data: WebhookEventData,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookEventData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub metadata: WebhookMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookMetadata {
    #[serde(default)]
    pub transaction_id: Option<String>,
}
