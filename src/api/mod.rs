use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::model::{QueueItem, RecordKind};
use crate::api::model::CreateRecordResponse;

pub mod model;

const HEALTH_PATH: &str = "health";

/// Remote submission boundary. One call per queued record; returning `Ok`
/// means the server durably committed it. The engine swaps in a recording
/// implementation for tests.
#[async_trait]
pub trait SubmitService: Send + Sync {
    /// Submit one queued record and return the server-assigned resource id.
    async fn submit(&self, item: &QueueItem) -> Result<String>;
}

/// HTTP client for the clinic backend.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(
        base_url: Url,
        auth_token: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent("field-sync/0.1")
            .timeout(request_timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            auth_token,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base_url = Url::parse(&cfg.server.base_url).context("invalid server.base_url")?;
        Self::new(base_url, cfg.server.auth_token.clone(), cfg.submit_timeout())
    }

    fn endpoint_for(kind: RecordKind) -> &'static str {
        match kind {
            RecordKind::CreatePatient => "api/patients",
            RecordKind::CreateVisitReport => "api/visits",
            RecordKind::CreatePrescription => "api/prescriptions",
        }
    }

    pub fn build_submit_request(&self, item: &QueueItem) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join(Self::endpoint_for(item.kind))
            .context("invalid API base URL")?;
        let body = submit_body(item);
        let mut builder = self
            .http
            .post(endpoint)
            .header("Content-Type", "application/json");
        if let Some(token) = &self.auth_token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        builder
            .json(&body)
            .build()
            .context("failed to build submit request")
    }

    /// Reachability probe against the server health endpoint. Any transport
    /// error or non-2xx counts as offline.
    pub async fn probe(&self) -> bool {
        let url = match self.base_url.join(HEALTH_PATH) {
            Ok(url) => url,
            Err(_) => return false,
        };
        match self.http.get(url).send().await {
            Ok(res) => res.status().is_success(),
            Err(err) => {
                debug!(?err, "health probe failed");
                false
            }
        }
    }
}

/// Request body for a submission: the record payload with the client id
/// spliced in under `clientId`, so the server can upsert instead of creating
/// a duplicate when a retry races a lost acknowledgment.
pub fn submit_body(item: &QueueItem) -> Value {
    let mut body = match &item.payload {
        Value::Object(map) => map.clone(),
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other.clone());
            map
        }
    };
    body.insert("clientId".to_string(), Value::String(item.id.clone()));
    Value::Object(body)
}

#[async_trait]
impl SubmitService for ApiClient {
    async fn submit(&self, item: &QueueItem) -> Result<String> {
        let request = self.build_submit_request(item)?;
        let url = request.url().clone();
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach server")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!(%url, %status, "submission rejected");
            return Err(anyhow!("server error {}: {}", status, body));
        }

        let payload: CreateRecordResponse =
            res.json().await.context("invalid server response JSON")?;
        info!(%url, remote_id = %payload.id, "record accepted");
        Ok(payload.id)
    }
}
