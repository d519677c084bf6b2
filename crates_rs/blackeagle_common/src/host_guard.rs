use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Rejects requests whose Host header is not on the allowlist.
///
/// Rules: `*` matches anything, a leading-dot rule (".example.com") matches the
/// apex and every subdomain, anything else is an exact match. Ports are ignored.
#[derive(Clone)]
pub struct AllowedHostsLayer {
    allowed: Vec<String>,
}

impl AllowedHostsLayer {
    pub fn new(allowed_hosts: Vec<String>) -> Self {
        let allowed = allowed_hosts
            .into_iter()
            .map(|h| h.trim().to_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        Self { allowed }
    }
}

impl<S> Layer<S> for AllowedHostsLayer {
    type Service = AllowedHostsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AllowedHostsService {
            inner,
            allowed: self.allowed.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AllowedHostsService<S> {
    inner: S,
    allowed: Vec<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: &'a str,
}

fn reject(detail: &str) -> Response {
    let body = axum::Json(ErrorBody {
        success: false,
        error: detail,
    });
    (StatusCode::BAD_REQUEST, body).into_response()
}

impl<S, B> Service<Request<B>> for AllowedHostsService<S>
where
    S: Service<Request<B>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    B: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let allowed = self.allowed.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if allowed.is_empty() {
                return inner.call(req).await;
            }

            let host = req
                .headers()
                .get("host")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .unwrap_or("");
            let host = host.split(':').next().unwrap_or("").trim().to_lowercase();
            if host.is_empty() {
                return Ok(reject("invalid host"));
            }

            let ok = allowed.iter().any(|rule| match rule.as_str() {
                "*" => true,
                r if r.starts_with('.') => host == r[1..] || host.ends_with(rule),
                r => host == r,
            });
            if !ok {
                return Ok(reject("invalid host"));
            }

            inner.call(req).await
        })
    }
}
