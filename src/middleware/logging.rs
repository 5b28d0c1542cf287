use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use reqwest::{Request, Response, Url};
use tower::{Layer, Service};

/// Query parameters whose values never reach the log.
const SENSITIVE_FIELDS: &[&str] = &[
    "access_token",
    "appsecret",
    "secret",
    "refresh_token",
    "code",
    "sign",
    "api_key",
    "key",
    "token",
];

/// Logs method, redacted URL, status and latency of every outgoing request.
///
/// Successful exchanges are logged at `debug` (or `info` when verbose),
/// non-2xx statuses at `warn`.
#[derive(Clone)]
pub struct LoggingMiddleware {
    verbose: bool,
    extra_sensitive: Arc<Vec<String>>,
}

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self {
            verbose: false,
            extra_sensitive: Arc::new(Vec::new()),
        }
    }

    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    /// Additional query parameter names to redact.
    pub fn redact(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut all = (*self.extra_sensitive).clone();
        all.extend(fields.into_iter().map(Into::into));
        self.extra_sensitive = Arc::new(all);
        self
    }
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for LoggingMiddleware
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Service = LoggingMiddlewareService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggingMiddlewareService {
            inner,
            verbose: self.verbose,
            extra_sensitive: Arc::clone(&self.extra_sensitive),
        }
    }
}

#[derive(Clone)]
pub struct LoggingMiddlewareService<S> {
    inner: S,
    verbose: bool,
    extra_sensitive: Arc<Vec<String>>,
}

fn is_sensitive(key: &str, extra: &[String]) -> bool {
    SENSITIVE_FIELDS.iter().any(|s| key.eq_ignore_ascii_case(s))
        || extra.iter().any(|s| key.eq_ignore_ascii_case(s))
}

pub(crate) fn redact_url(url: &Url, extra: &[String]) -> String {
    if url.query().is_none() {
        return url.to_string();
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let value = if is_sensitive(&k, extra) {
                "[REDACTED]".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), value)
        })
        .collect();

    let mut redacted = url.clone();
    redacted.set_query(None);
    let query = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{redacted}?{query}")
}

impl<S, Error> Service<Request> for LoggingMiddlewareService<S>
where
    S: Service<Request, Response = Response, Error = Error> + Send + Clone + 'static,
    S::Future: Send,
    Error: std::fmt::Display + Send + 'static,
{
    type Response = Response;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let method = req.method().clone();
        let url = redact_url(req.url(), &self.extra_sensitive);
        let verbose = self.verbose;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if verbose {
                log::info!("[wechat] >>> {method} {url}");
            } else {
                log::debug!("[wechat] >>> {method} {url}");
            }

            let start = Instant::now();
            let result = inner.call(req).await;
            let elapsed = start.elapsed();

            match &result {
                Ok(response) if response.status().is_success() => {
                    if verbose {
                        log::info!("[wechat] <<< {} {url} ({elapsed:?})", response.status());
                    } else {
                        log::debug!("[wechat] <<< {} {url} ({elapsed:?})", response.status());
                    }
                }
                Ok(response) => {
                    log::warn!("[wechat] <<< {} {method} {url} ({elapsed:?})", response.status());
                }
                Err(e) => {
                    log::error!("[wechat] {method} {url} failed after {elapsed:?}: {e}");
                }
            }

            result
        })
    }
}
