mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod intel;
mod ledger;
mod models;
mod osint;
mod payment;
mod state;

use axum::extract::MatchedPath;
use axum::http::{header, header::HeaderName, Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use blackeagle_common::host_guard::AllowedHostsLayer;
use blackeagle_common::request_id::RequestIdLayer;
use blackeagle_common::security_headers::SecurityHeadersLayer;
use config::Config;
use intel::{AvatarProbe, IntelSuite};
use payment::CheckoutConfig;
use serde_json::json;
use state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let pool = match db::connect(&cfg.db_url).await {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "db connect failed");
            std::process::exit(2);
        }
    };
    if let Err(e) = db::ensure_schema(&pool, &cfg.db_schema).await {
        tracing::error!(error = %e, "db ensure_schema failed");
        std::process::exit(2);
    }

    let http = match reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "http client init failed");
            std::process::exit(2);
        }
    };

    if cfg.mayar_webhook_secret.is_none() {
        tracing::warn!("MAYAR_WEBHOOK_SECRET not set; webhook signatures are not verified");
    }

    let state = AppState {
        pool,
        db_schema: cfg.db_schema.clone(),
        env_name: cfg.env_name.clone(),
        default_country_code: cfg.default_country_code.clone(),
        avatar: AvatarProbe::new(
            http.clone(),
            cfg.avatar_base_url.clone(),
            cfg.avatar_probe_timeout_ms,
        ),
        checkout: CheckoutConfig {
            api_url: cfg.mayar_api_url.clone(),
            api_key: cfg.mayar_api_key.clone(),
            public_base_url: cfg.public_base_url.clone(),
        },
        webhook_secret: cfg.mayar_webhook_secret.clone(),
        intel: Arc::new(IntelSuite::simulated()),
        http,
    };

    let cors = if cfg.allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(osint_cors_allowed_headers())
            .allow_credentials(false)
    } else {
        let origins: Vec<axum::http::HeaderValue> = cfg
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(osint_cors_allowed_headers())
            .allow_credentials(false)
            .allow_origin(AllowOrigin::list(origins))
    };

    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/accounts", post(handlers::create_account))
        .route("/me", get(handlers::me))
        .route("/packages", get(handlers::list_packages))
        .route("/osint/email", post(handlers::scan_email))
        .route("/osint/phone", post(handlers::scan_phone))
        .route("/scans", get(handlers::list_scans))
        .route("/payments/create", post(handlers::create_payment))
        .route("/payments/webhook", post(handlers::payment_webhook))
        .fallback(|| async {
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "success": false, "error": "not found" })),
            )
        })
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(cfg.max_body_bytes))
        .layer(cors)
        .layer(AllowedHostsLayer::new(cfg.allowed_hosts.clone()))
        .layer(SecurityHeadersLayer::from_env(&cfg.env_name))
        // Log the matched route template, not the raw path, so scan queries
        // never end up in spans.
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(MatchedPath::as_str)
                    .unwrap_or_else(|| req.uri().path());
                tracing::span!(
                    tracing::Level::INFO,
                    "http_request",
                    method = %req.method(),
                    path = %path
                )
            }),
        )
        .layer(RequestIdLayer::new(HeaderName::from_static("x-request-id")));

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], cfg.port)));
    tracing::info!(%addr, "starting blackeagle_osint_service");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

fn osint_cors_allowed_headers() -> Vec<HeaderName> {
    vec![
        header::ACCEPT,
        header::AUTHORIZATION,
        header::CONTENT_TYPE,
        HeaderName::from_static("x-request-id"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use tower::ServiceExt;

    #[test]
    fn cors_whitelist_excludes_sensitive_and_proxy_headers() {
        let headers = osint_cors_allowed_headers();
        let has = |name: &str| {
            headers
                .iter()
                .any(|h| h.as_str().eq_ignore_ascii_case(name))
        };

        assert!(has("accept"));
        assert!(has("authorization"));
        assert!(has("content-type"));
        assert!(has("x-request-id"));

        // The webhook signature comes from the processor, never a browser.
        assert!(!has("x-callback-signature"));
        assert!(!has("x-forwarded-for"));
        assert!(!has("x-forwarded-host"));
        assert!(!has("x-real-ip"));
        assert!(!has("cookie"));
    }

    #[tokio::test]
    async fn unknown_routes_return_404_envelope() {
        let app = Router::new()
            .route("/health", get(|| async { "ok" }))
            .fallback(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "success": false, "error": "not found" })),
                )
            });

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/does_not_exist")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
