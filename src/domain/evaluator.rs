//! Remote expression evaluation against a node's channel.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::node::Channel;

#[derive(Debug, Error)]
pub enum EvaluationFailure {
    #[error("evaluation timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("remote evaluation failed with status {status}: {message}")]
    Remote { status: u16, message: String },
    #[error("malformed evaluation response: {0}")]
    Malformed(String),
}

/// Runs an expression on the agent behind `channel`.
#[async_trait]
pub trait RemoteEvaluator: Send + Sync {
    async fn run(&self, expression: &str, channel: &Channel) -> Result<String, EvaluationFailure>;
}

#[derive(Debug, Serialize)]
struct EvalRequest<'a> {
    expression: &'a str,
}

#[derive(Debug, Deserialize)]
struct EvalResponse {
    result: String,
}

/// Evaluates expressions over the agent's `/api/v1/eval` endpoint.
pub struct HttpEvaluator {
    http: Client,
    timeout: Duration,
}

impl HttpEvaluator {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .build()
            .context("building evaluation HTTP client")?;
        Ok(Self { http, timeout })
    }

    async fn post(&self, expression: &str, channel: &Channel) -> Result<String, EvaluationFailure> {
        let url = format!("{}/api/v1/eval", channel.endpoint());
        let resp = self
            .http
            .post(&url)
            .json(&EvalRequest { expression })
            .send()
            .await
            .map_err(|e| EvaluationFailure::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(EvaluationFailure::Remote {
                status: status.as_u16(),
                message,
            });
        }

        let body: EvalResponse = resp
            .json()
            .await
            .map_err(|e| EvaluationFailure::Malformed(e.to_string()))?;
        Ok(body.result)
    }
}

#[async_trait]
impl RemoteEvaluator for HttpEvaluator {
    async fn run(&self, expression: &str, channel: &Channel) -> Result<String, EvaluationFailure> {
        tokio::time::timeout(self.timeout, self.post(expression, channel))
            .await
            .map_err(|_| EvaluationFailure::Timeout(self.timeout))?
    }
}
