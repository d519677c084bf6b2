use serde::{Deserialize, Serialize};

/// Success envelope for every data-bearing endpoint.
#[derive(Debug, Serialize)]
pub struct DataBody<T> {
    pub success: bool,
    pub data: T,
}

impl<T> DataBody<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterReq {
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResp {
    pub account_id: String,
    pub email: String,
    pub display_name: Option<String>,
    /// Shown exactly once; only a hash is stored.
    pub api_key: String,
    pub token_balance: i64,
}

#[derive(Debug, Serialize)]
pub struct MeResp {
    pub account_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub token_balance: i64,
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailScanReq {
    pub email: String,
    #[serde(default)]
    pub deep_scan: bool,
}

#[derive(Debug, Deserialize)]
pub struct PhoneScanReq {
    pub phone: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreachRecord {
    pub name: String,
    pub domain: String,
    pub date: String,
    pub data_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SocialProfile {
    pub platform: String,
    pub url: String,
    pub username: Option<String>,
    pub exists: bool,
    pub category: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MessengerPresence {
    pub whatsapp: bool,
    pub telegram: bool,
}

#[derive(Debug, Serialize)]
pub struct EmailReport {
    pub email: String,
    pub valid: bool,
    pub format_valid: bool,
    pub disposable: bool,
    pub free_provider: bool,
    pub deliverable: bool,
    pub breached: bool,
    pub breach_count: usize,
    pub breaches: Vec<BreachRecord>,
    pub gravatar_url: Option<String>,
    pub social_profiles: Vec<SocialProfile>,
    pub social_count: usize,
}

#[derive(Debug, Serialize)]
pub struct PhoneReport {
    pub phone: String,
    pub formatted: String,
    pub valid: bool,
    pub country_code: String,
    pub country_name: String,
    pub country_iso: String,
    pub carrier: String,
    pub line_type: String,
    pub whatsapp: bool,
    pub telegram: bool,
    pub national_number: String,
    pub international_format: String,
}

#[derive(Debug, Serialize)]
pub struct ScanLogItem {
    pub id: String,
    pub module: String,
    pub query: String,
    pub tokens_charged: i64,
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScanLogParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentCreateReq {
    #[serde(rename = "packageId")]
    pub package_id: String,
    pub amount: i64,
    pub tokens: i64,
}

#[derive(Debug, Serialize)]
pub struct PaymentCreateResp {
    pub success: bool,
    #[serde(rename = "paymentUrl")]
    pub payment_url: String,
    #[serde(rename = "transactionId")]
    pub transaction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub status: &'static str,
    pub env: String,
    pub service: &'static str,
    pub version: &'static str,
}
