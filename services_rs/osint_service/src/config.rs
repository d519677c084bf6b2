use blackeagle_common::secret_policy;
use regex::Regex;
use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub env_name: String,

    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,

    pub db_url: String,
    pub db_schema: Option<String>,

    pub allowed_hosts: Vec<String>,
    pub allowed_origins: Vec<String>,

    pub default_country_code: String,

    pub public_base_url: String,
    pub mayar_api_url: String,
    pub mayar_api_key: Option<String>,
    pub mayar_webhook_secret: Option<String>,

    pub avatar_base_url: String,
    pub avatar_probe_timeout_ms: u64,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize_db_url(raw: &str) -> String {
    // Accept SQLAlchemy-style URLs like "postgresql+psycopg://..." by dropping
    // the "+driver" portion.
    if let Some(colon) = raw.find(':') {
        let (scheme, rest) = raw.split_at(colon);
        if let Some(plus) = scheme.find('+') {
            return format!("{}{}", &scheme[..plus], rest);
        }
    }
    raw.to_string()
}

fn validate_postgres_url(url: &str) -> Result<(), String> {
    let scheme = url
        .split_once(':')
        .map(|(s, _)| s.trim().to_lowercase())
        .unwrap_or_default();
    match scheme.as_str() {
        "postgres" | "postgresql" => Ok(()),
        _ => Err("OSINT_DB_URL (or DB_URL) must be a postgres URL".to_string()),
    }
}

fn strip_trailing_slash(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let env_name = env_or("ENV", "dev");
        let env_lower = env_name.trim().to_lowercase();
        let prod_like = secret_policy::is_production_like(&env_name);

        let host = env_or("APP_HOST", "0.0.0.0");
        let port: u16 = env_or("APP_PORT", "8080")
            .parse()
            .map_err(|_| "APP_PORT must be a valid u16".to_string())?;

        let db_raw = env_opt("OSINT_DB_URL")
            .or_else(|| env_opt("DB_URL"))
            .unwrap_or_else(|| {
                "postgresql://blackeagle:blackeagle@db:5432/blackeagle".to_string()
            });
        let db_url = normalize_db_url(&db_raw);
        validate_postgres_url(&db_url)?;

        let db_schema = env_opt("DB_SCHEMA");
        if let Some(s) = &db_schema {
            let re = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").map_err(|e| e.to_string())?;
            if !re.is_match(s) {
                return Err("DB_SCHEMA must match ^[A-Za-z_][A-Za-z0-9_]*$".to_string());
            }
        }

        let mut allowed_hosts = parse_csv(&env_or("ALLOWED_HOSTS", ""));
        if allowed_hosts.is_empty() && matches!(env_lower.as_str(), "dev" | "test") {
            allowed_hosts = vec!["localhost".to_string(), "127.0.0.1".to_string()];
        }
        if prod_like && allowed_hosts.iter().any(|h| h.trim() == "*") {
            return Err("ALLOWED_HOSTS must not contain '*' in prod/staging".to_string());
        }

        let mut allowed_origins = parse_csv(&env_or("ALLOWED_ORIGINS", ""));
        if allowed_origins.is_empty() {
            allowed_origins = vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ];
        }
        if prod_like && allowed_origins.iter().any(|o| o.trim() == "*") {
            return Err("ALLOWED_ORIGINS must not contain '*' in prod/staging".to_string());
        }
        if prod_like
            && allowed_origins
                .iter()
                .any(|o| !o.trim().starts_with("https://"))
        {
            return Err("ALLOWED_ORIGINS must use https:// origins in prod/staging".to_string());
        }

        // Scan and payment payloads are tiny; keep the ceiling low.
        let max_body_bytes: usize = env_or("OSINT_MAX_BODY_BYTES", "65536")
            .parse()
            .map_err(|_| "OSINT_MAX_BODY_BYTES must be an integer".to_string())?;
        let max_body_bytes = max_body_bytes.clamp(4 * 1024, 1024 * 1024);

        let default_country_code = env_or("DEFAULT_COUNTRY_CODE", "62").trim().to_string();
        if default_country_code.is_empty()
            || default_country_code.len() > 3
            || !default_country_code.chars().all(|c| c.is_ascii_digit())
        {
            return Err("DEFAULT_COUNTRY_CODE must be 1-3 digits".to_string());
        }

        let public_base_url = strip_trailing_slash(&env_or(
            "PUBLIC_BASE_URL",
            "http://localhost:3000",
        ));
        if prod_like && !public_base_url.starts_with("https://") {
            return Err("PUBLIC_BASE_URL must be an https:// URL in prod/staging".to_string());
        }

        let mayar_api_url =
            strip_trailing_slash(&env_or("MAYAR_API_URL", "https://api.mayar.id/hl/v1"));
        let mayar_api_key = env_opt("MAYAR_API_KEY");
        if prod_like && mayar_api_key.is_none() {
            return Err("MAYAR_API_KEY must be set in prod/staging".to_string());
        }

        let mayar_webhook_secret = env_opt("MAYAR_WEBHOOK_SECRET");
        secret_policy::validate_secret_for_env(
            &env_name,
            "MAYAR_WEBHOOK_SECRET",
            mayar_webhook_secret.as_deref(),
            true,
        )?;

        let avatar_base_url =
            strip_trailing_slash(&env_or("AVATAR_BASE_URL", "https://www.gravatar.com"));
        let avatar_probe_timeout_ms: u64 = env_or("AVATAR_PROBE_TIMEOUT_MS", "3000")
            .parse()
            .map_err(|_| "AVATAR_PROBE_TIMEOUT_MS must be an integer".to_string())?;
        let avatar_probe_timeout_ms = avatar_probe_timeout_ms.clamp(250, 10_000);

        Ok(Self {
            env_name,
            host,
            port,
            max_body_bytes,
            db_url,
            db_schema,
            allowed_hosts,
            allowed_origins,
            default_country_code,
            public_base_url,
            mayar_api_url,
            mayar_api_key,
            mayar_webhook_secret,
            avatar_base_url,
            avatar_probe_timeout_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const ALL_KEYS: &[&str] = &[
        "ENV",
        "APP_HOST",
        "APP_PORT",
        "OSINT_DB_URL",
        "DB_URL",
        "DB_SCHEMA",
        "ALLOWED_HOSTS",
        "ALLOWED_ORIGINS",
        "OSINT_MAX_BODY_BYTES",
        "DEFAULT_COUNTRY_CODE",
        "PUBLIC_BASE_URL",
        "MAYAR_API_URL",
        "MAYAR_API_KEY",
        "MAYAR_WEBHOOK_SECRET",
        "AVATAR_BASE_URL",
        "AVATAR_PROBE_TIMEOUT_MS",
    ];

    struct EnvGuard {
        saved: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            let mut saved = Vec::with_capacity(ALL_KEYS.len());
            for k in ALL_KEYS {
                saved.push(((*k).to_string(), env::var(k).ok()));
                env::remove_var(k);
            }
            Self { saved }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (k, v) in self.saved.drain(..) {
                match v {
                    Some(val) => env::set_var(k, val),
                    None => env::remove_var(k),
                }
            }
        }
    }

    fn set_prod_baseline() {
        env::set_var("ENV", "prod");
        env::set_var(
            "OSINT_DB_URL",
            "postgresql://u:p@localhost:5432/blackeagle",
        );
        env::set_var("ALLOWED_HOSTS", "api.blackeagle.id");
        env::set_var("ALLOWED_ORIGINS", "https://app.blackeagle.id");
        env::set_var("PUBLIC_BASE_URL", "https://app.blackeagle.id");
        env::set_var("MAYAR_API_KEY", "mayar-live-key-0123456789");
        env::set_var("MAYAR_WEBHOOK_SECRET", "w8Jq-p2Nv_6xKd4Tz9Rb");
    }

    #[test]
    fn dev_defaults_are_accepted() {
        let _g = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
        let _env = EnvGuard::new();

        let cfg = Config::from_env().expect("config");
        assert_eq!(cfg.default_country_code, "62");
        assert_eq!(cfg.mayar_api_url, "https://api.mayar.id/hl/v1");
        assert!(cfg.mayar_api_key.is_none());
        assert!(cfg.allowed_hosts.iter().any(|h| h == "localhost"));
    }

    #[test]
    fn rejects_non_postgres_url() {
        let _g = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
        let _env = EnvGuard::new();

        env::set_var("OSINT_DB_URL", "sqlite:////tmp/osint.db");
        assert!(Config::from_env().is_err());
    }

    #[test]
    fn normalizes_sqlalchemy_style_url() {
        let _g = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
        let _env = EnvGuard::new();

        env::set_var(
            "OSINT_DB_URL",
            "postgresql+psycopg://u:p@localhost:5432/blackeagle",
        );
        let cfg = Config::from_env().expect("config");
        assert_eq!(cfg.db_url, "postgresql://u:p@localhost:5432/blackeagle");
    }

    #[test]
    fn prod_baseline_is_accepted() {
        let _g = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
        let _env = EnvGuard::new();

        set_prod_baseline();
        let cfg = Config::from_env().expect("config");
        assert_eq!(cfg.env_name, "prod");
        assert!(cfg.mayar_webhook_secret.is_some());
    }

    #[test]
    fn prod_requires_payment_api_key() {
        let _g = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
        let _env = EnvGuard::new();

        set_prod_baseline();
        env::remove_var("MAYAR_API_KEY");
        let err = Config::from_env().expect_err("missing api key must be rejected");
        assert!(err.contains("MAYAR_API_KEY"));
    }

    #[test]
    fn prod_rejects_weak_webhook_secret() {
        let _g = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
        let _env = EnvGuard::new();

        set_prod_baseline();
        env::set_var("MAYAR_WEBHOOK_SECRET", "changethis_secret_key");
        let err = Config::from_env().expect_err("placeholder secret must be rejected");
        assert!(err.contains("MAYAR_WEBHOOK_SECRET"));
    }

    #[test]
    fn prod_rejects_wildcard_hosts_and_origins() {
        let _g = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
        let _env = EnvGuard::new();

        set_prod_baseline();
        env::set_var("ALLOWED_HOSTS", "*");
        let err = Config::from_env().expect_err("wildcard hosts must be rejected");
        assert!(err.contains("ALLOWED_HOSTS"));

        env::set_var("ALLOWED_HOSTS", "api.blackeagle.id");
        env::set_var("ALLOWED_ORIGINS", "*");
        let err = Config::from_env().expect_err("wildcard origins must be rejected");
        assert!(err.contains("ALLOWED_ORIGINS"));
    }

    #[test]
    fn prod_rejects_plain_http_surfaces() {
        let _g = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
        let _env = EnvGuard::new();

        set_prod_baseline();
        env::set_var("ALLOWED_ORIGINS", "http://app.blackeagle.id");
        let err = Config::from_env().expect_err("http origins must be rejected");
        assert!(err.contains("ALLOWED_ORIGINS must use https"));

        env::set_var("ALLOWED_ORIGINS", "https://app.blackeagle.id");
        env::set_var("PUBLIC_BASE_URL", "http://app.blackeagle.id");
        let err = Config::from_env().expect_err("http public url must be rejected");
        assert!(err.contains("PUBLIC_BASE_URL"));
    }

    #[test]
    fn body_limit_is_clamped_to_safe_bounds() {
        let _g = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
        let _env = EnvGuard::new();

        env::set_var("OSINT_MAX_BODY_BYTES", "1");
        let cfg = Config::from_env().expect("config");
        assert_eq!(cfg.max_body_bytes, 4 * 1024);

        env::set_var("OSINT_MAX_BODY_BYTES", "999999999");
        let cfg = Config::from_env().expect("config");
        assert_eq!(cfg.max_body_bytes, 1024 * 1024);
    }

    #[test]
    fn rejects_malformed_default_country_code() {
        let _g = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
        let _env = EnvGuard::new();

        env::set_var("DEFAULT_COUNTRY_CODE", "+62");
        assert!(Config::from_env().is_err());

        env::set_var("DEFAULT_COUNTRY_CODE", "9711");
        assert!(Config::from_env().is_err());

        env::set_var("DEFAULT_COUNTRY_CODE", "44");
        let cfg = Config::from_env().expect("config");
        assert_eq!(cfg.default_country_code, "44");
    }

    #[test]
    fn probe_timeout_is_clamped() {
        let _g = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
        let _env = EnvGuard::new();

        env::set_var("AVATAR_PROBE_TIMEOUT_MS", "5");
        let cfg = Config::from_env().expect("config");
        assert_eq!(cfg.avatar_probe_timeout_ms, 250);

        env::set_var("AVATAR_PROBE_TIMEOUT_MS", "60000");
        let cfg = Config::from_env().expect("config");
        assert_eq!(cfg.avatar_probe_timeout_ms, 10_000);
    }
}
