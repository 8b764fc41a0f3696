//! Client side of the validation service: one request/response per mutation,
//! plus the full-schedule and recommendation reads.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::ScheduleId,
    error::ApiError,
    protocol::{
        assignments_route, recommendations_route, schedule_route, AssignmentPatchRequest,
        AssignmentPatchResponse, Recommendation, RecommendationQuery, RecommendationResponse,
        ScheduleResponse,
    },
};
use thiserror::Error;
use tracing::warn;

use crate::types::ValidationOutcome;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Transport(String),
    #[error("server responded {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("malformed response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// A 4xx carries the server's own verdict; anything else leaves the true
    /// server state unknown.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Status { status, .. } if (400..500).contains(status))
    }

    pub fn detail(&self) -> String {
        match self {
            Self::Status { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

#[async_trait]
pub trait ValidationGateway: Send + Sync {
    async fn submit_assignment(
        &self,
        schedule_id: ScheduleId,
        request: AssignmentPatchRequest,
    ) -> Result<ValidationOutcome, GatewayError>;

    async fn fetch_schedule(&self, schedule_id: ScheduleId)
        -> Result<ScheduleResponse, GatewayError>;

    async fn recommend(
        &self,
        schedule_id: ScheduleId,
        query: RecommendationQuery,
    ) -> Result<Vec<Recommendation>, GatewayError>;
}

pub struct HttpValidationGateway {
    http: Client,
    server_url: String,
    timeout: Duration,
}

impl HttpValidationGateway {
    pub fn new(server_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            server_url: server_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn map_send_error(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, res: Response) -> Result<T, GatewayError> {
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiError>(&body)
                .map(|api| api.detail)
                .unwrap_or_else(|_| {
                    if body.trim().is_empty() {
                        status
                            .canonical_reason()
                            .unwrap_or("unknown status")
                            .to_string()
                    } else {
                        body
                    }
                });
            warn!(status = status.as_u16(), %detail, "gateway: non-success response");
            return Err(GatewayError::Status {
                status: status.as_u16(),
                detail,
            });
        }
        res.json::<T>().await.map_err(|err| self.map_send_error(err))
    }
}

#[async_trait]
impl ValidationGateway for HttpValidationGateway {
    async fn submit_assignment(
        &self,
        schedule_id: ScheduleId,
        request: AssignmentPatchRequest,
    ) -> Result<ValidationOutcome, GatewayError> {
        let res = self
            .http
            .patch(format!("{}{}", self.server_url, assignments_route(schedule_id)))
            .json(&request)
            .send()
            .await
            .map_err(|err| self.map_send_error(err))?;
        let body: AssignmentPatchResponse = self.read_json(res).await?;
        Ok(body.into())
    }

    async fn fetch_schedule(
        &self,
        schedule_id: ScheduleId,
    ) -> Result<ScheduleResponse, GatewayError> {
        let res = self
            .http
            .get(format!("{}{}", self.server_url, schedule_route(schedule_id)))
            .send()
            .await
            .map_err(|err| self.map_send_error(err))?;
        self.read_json(res).await
    }

    async fn recommend(
        &self,
        schedule_id: ScheduleId,
        query: RecommendationQuery,
    ) -> Result<Vec<Recommendation>, GatewayError> {
        let res = self
            .http
            .post(format!(
                "{}{}",
                self.server_url,
                recommendations_route(schedule_id)
            ))
            .json(&query)
            .send()
            .await
            .map_err(|err| self.map_send_error(err))?;
        let body: RecommendationResponse = self.read_json(res).await?;
        Ok(body.into_ranked())
    }
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
