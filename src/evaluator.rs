use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use serde::Deserialize;

use crate::error::{FormbarError, Result};
use crate::value::Value;
use crate::{interpreter, parser};

/// Body returned by a remote evaluation endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteResponse {
    pub success: bool,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub params: Option<RemoteParams>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteParams {
    #[serde(default)]
    pub msg: Option<String>,
}

/// Carries a built rule to a remote evaluation endpoint.
pub trait RuleTransport {
    fn fetch_rule(&self, url: &str, rule: &str) -> impl Future<Output = Result<RemoteResponse>>;
}

/// `GET <url>?rule=<rule>` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Option<reqwest::Url>,
}

impl HttpTransport {
    pub fn new(base_url: Option<&str>) -> Result<Self> {
        let base_url = base_url
            .map(|raw| {
                reqwest::Url::parse(raw).map_err(|e| FormbarError::InvalidUrl {
                    url: raw.to_string(),
                    details: e.to_string(),
                })
            })
            .transpose()?;
        Ok(HttpTransport {
            client: reqwest::Client::new(),
            base_url,
        })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Absolute URLs pass through; relative ones are joined onto the base.
    pub fn resolve_url(&self, url: &str) -> Result<reqwest::Url> {
        resolve_url(self.base_url.as_ref(), url)
    }
}

pub(crate) fn resolve_url(base: Option<&reqwest::Url>, url: &str) -> Result<reqwest::Url> {
    // Joining onto a base leaves absolute URLs untouched.
    let resolved = match base {
        Some(base) => base.join(url),
        None => reqwest::Url::parse(url),
    };
    resolved.map_err(|e| FormbarError::InvalidUrl {
        url: url.to_string(),
        details: match base {
            Some(_) => e.to_string(),
            None => format!("{e} (no remote.base_url configured)"),
        },
    })
}

impl RuleTransport for HttpTransport {
    async fn fetch_rule(&self, url: &str, rule: &str) -> Result<RemoteResponse> {
        let url = self.resolve_url(url)?;
        let response = self
            .client
            .get(url)
            .query(&[("rule", rule)])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<RemoteResponse>().await?)
    }
}

/// Evaluates built expressions, remotely when the form names an eval URL
/// and locally otherwise.
#[derive(Debug, Clone)]
pub struct Evaluator<T> {
    transport: T,
    timeout: Duration,
}

impl<T: RuleTransport> Evaluator<T> {
    pub fn new(transport: T, timeout: Duration) -> Self {
        Evaluator { transport, timeout }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Never fails: errors come back as `Value::Undefined` (bad
    /// expression) or `Value::Bool(false)` (unreachable endpoint).
    pub async fn evaluate(&self, built: &str, eval_url: Option<&str>) -> Value {
        match eval_url {
            Some(url) => self.evaluate_remote(url, built).await,
            None => evaluate_local(built),
        }
    }

    async fn evaluate_remote(&self, url: &str, built: &str) -> Value {
        debug!("remote evaluation of {:?} at {}", built, url);
        let request = self.transport.fetch_rule(url, built);
        let outcome = match tokio::time::timeout(self.timeout, request).await {
            Ok(outcome) => outcome,
            Err(_) => Err(FormbarError::Timeout {
                url: url.to_string(),
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };
        match outcome {
            Ok(response) => {
                if !response.success {
                    let msg = response
                        .params
                        .as_ref()
                        .and_then(|p| p.msg.as_deref())
                        .unwrap_or("no message");
                    warn!("remote evaluation of {:?} reported failure: {}", built, msg);
                }
                // The server decides the value even when it reports failure.
                Value::from(response.data)
            }
            Err(err) => {
                warn!("request to eval server failed: {}", err);
                Value::Bool(false)
            }
        }
    }
}

/// Evaluate with the sandboxed local grammar.
pub fn evaluate_local(built: &str) -> Value {
    match parser::parse(built).and_then(|expr| interpreter::evaluate(&expr)) {
        Ok(value) => value,
        Err(err) => {
            debug!("evaluation of {:?} failed: {}", built, err);
            Value::Undefined
        }
    }
}
