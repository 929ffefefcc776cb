use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{FieldPatch, Record, RecordFields, RecordId},
    error::ApiError,
};
use tracing::debug;
use url::Url;

use crate::{error::RequestFailure, service::RecordService};

const RECORDS_SEGMENT: &str = "records";

/// [`RecordService`] over the JSON/HTTP record API.
pub struct HttpRecordService {
    http: Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpRecordService {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(server_url.trim())
            .with_context(|| format!("invalid record server url '{server_url}'"))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!(
                "record server url '{server_url}' cannot carry a path"
            ));
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn records_url(&self) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(RECORDS_SEGMENT);
        }
        url
    }

    fn record_url(&self, id: &RecordId) -> Url {
        let mut url = self.records_url();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(id.as_str());
        }
        url
    }

    fn transport_failure(&self, err: reqwest::Error) -> RequestFailure {
        if err.is_timeout() {
            RequestFailure::Timeout(self.timeout)
        } else if err.is_decode() {
            RequestFailure::Decode(err.to_string())
        } else {
            RequestFailure::Transport(err.to_string())
        }
    }

    async fn ensure_success(&self, response: Response) -> Result<Response, RequestFailure> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(service_failure(status, &body))
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T, RequestFailure> {
        let response = self.ensure_success(response).await?;
        response.json().await.map_err(|err| {
            if err.is_timeout() {
                RequestFailure::Timeout(self.timeout)
            } else {
                RequestFailure::Decode(err.to_string())
            }
        })
    }
}

fn service_failure(status: StatusCode, body: &str) -> RequestFailure {
    let message = serde_json::from_str::<ApiError>(body)
        .map(|err| err.message)
        .ok()
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        });
    RequestFailure::Service {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl RecordService for HttpRecordService {
    async fn list(&self) -> Result<Vec<Record>, RequestFailure> {
        let url = self.records_url();
        debug!(%url, "GET records");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| self.transport_failure(err))?;
        self.decode(response).await
    }

    async fn create(&self, fields: &RecordFields) -> Result<Record, RequestFailure> {
        let url = self.records_url();
        debug!(%url, "POST record");
        let response = self
            .http
            .post(url)
            .json(fields)
            .send()
            .await
            .map_err(|err| self.transport_failure(err))?;
        self.decode(response).await
    }

    async fn update(&self, id: &RecordId, patch: &FieldPatch) -> Result<Record, RequestFailure> {
        let url = self.record_url(id);
        debug!(%url, "PATCH record");
        let response = self
            .http
            .patch(url)
            .json(patch)
            .send()
            .await
            .map_err(|err| self.transport_failure(err))?;
        self.decode(response).await
    }

    async fn delete(&self, id: &RecordId) -> Result<(), RequestFailure> {
        let url = self.record_url(id);
        debug!(%url, "DELETE record");
        let response = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(|err| self.transport_failure(err))?;
        self.ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
