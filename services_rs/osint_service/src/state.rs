use crate::intel::{AvatarProbe, IntelSuite};
use crate::payment::CheckoutConfig;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub db_schema: Option<String>,
    pub env_name: String,
    pub default_country_code: String,
    pub http: reqwest::Client,
    pub checkout: CheckoutConfig,
    pub webhook_secret: Option<String>,
    pub avatar: AvatarProbe,
    pub intel: Arc<IntelSuite>,
}

impl AppState {
    pub fn table(&self, name: &str) -> String {
        match &self.db_schema {
            Some(s) => format!("{s}.{name}"),
            None => name.to_string(),
        }
    }
}
