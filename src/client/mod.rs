//! HTTP client for the remote compile service.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, CACHE_CONTROL};
use serde::Deserialize;
use serde_json::Value;

use crate::{config::Config, error::PipelineError, request::CompileRequest};

/// Decoded compile reply. Classification happens once, here; downstream
/// code never re-inspects raw fields.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileOutcome {
    /// The program built; `artifact` locates the compiled module.
    Success { artifact: String },
    /// The program did not build. Expected, not exceptional: callers branch
    /// on this and surface the diagnostics.
    Failure {
        exit_detail: Value,
        stdout: String,
        stderr: String,
    },
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    exit_detail: Option<Value>,
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
}

/// A truthy `exit_detail` is the sole failure discriminator. Truthiness
/// mirrors the service's JS heritage: null, false, 0, 0.0 and "" all read
/// as success.
fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn classify(raw: RawResponse) -> Result<CompileOutcome, PipelineError> {
    if let Some(exit_detail) = raw.exit_detail.filter(is_truthy) {
        return Ok(CompileOutcome::Failure {
            exit_detail,
            stdout: raw.stdout,
            stderr: raw.stderr,
        });
    }
    match raw.result {
        Some(artifact) => Ok(CompileOutcome::Success { artifact }),
        None => Err(PipelineError::MalformedResponse {
            message: "success reply is missing `result`".into(),
        }),
    }
}

/// Submits compile requests and waits for the service's verdict.
#[async_trait]
pub trait CompileService: Send + Sync {
    async fn submit(&self, request: &CompileRequest) -> Result<CompileOutcome, PipelineError>;
}

#[derive(Debug, Clone)]
pub struct CompileClient {
    http: reqwest::Client,
    base_url: String,
}

impl CompileClient {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(&cfg.compile_url(), Duration::from_secs(cfg.request_timeout()))
    }

    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CompileService for CompileClient {
    async fn submit(&self, request: &CompileRequest) -> Result<CompileOutcome, PipelineError> {
        // The endpoint is not idempotent-cacheable: identical source can
        // legitimately recompile to a new artifact reference.
        let url = format!("{}/compile", self.base_url);
        let resp = self
            .http
            .post(url)
            .header(CACHE_CONTROL, HeaderValue::from_static("no-store"))
            .json(request)
            .send()
            .await?;
        let body = resp.bytes().await?;
        let raw: RawResponse = serde_json::from_slice(&body).map_err(|e| {
            PipelineError::MalformedResponse { message: e.to_string() }
        })?;
        classify(raw)
    }
}
