use crate::config::BackendConfig;
use crate::models::{Distance, FinishTimeRow, PersonalBestRow, PersonalBestUpsert};
use crate::percentile::ReferenceTimeSource;
use crate::time_codec::{self, Duration};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use url::Url;

const USER_AGENT: &str = concat!("runtribe-mcp/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("Failed to send request to backend: {0}")]
    Request(#[source] reqwest::Error),
    #[error("Backend error ({status}): {body}")]
    Status { status: StatusCode, body: String },
    #[error("Failed to parse backend response: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Client for the hosted backend's REST interface
pub struct BackendClient {
    client: Client,
    config: BackendConfig,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(BackendError::Client)?;

        Ok(Self { client, config })
    }

    fn table_url(&self) -> Url {
        let mut url = self.config.base_url.clone();
        // BackendConfig rejects URLs that cannot be a base
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["rest", "v1", self.config.pb_table.as_str()]);
        }
        url
    }

    fn reference_times_url(&self, distance: Distance) -> Url {
        let mut url = self.table_url();
        url.query_pairs_mut()
            .append_pair("select", "finish_time")
            .append_pair("distance", &format!("eq.{}", distance.key()))
            .append_pair("finish_time", "not.is.null")
            .append_pair("order", "finish_time.asc");
        url
    }

    fn personal_bests_url(&self, user_id: &str) -> Url {
        let mut url = self.table_url();
        url.query_pairs_mut()
            .append_pair("select", "user_id,distance,finish_time,updated_at")
            .append_pair("user_id", &format!("eq.{}", user_id));
        url
    }

    fn upsert_url(&self) -> Url {
        let mut url = self.table_url();
        url.query_pairs_mut()
            .append_pair("on_conflict", "user_id,distance");
        url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.api_key)
            .bearer_auth(self.config.bearer_token())
    }

    async fn check_status(response: Response) -> Result<Response, BackendError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(%status, error = %e, "failed to read backend error body");
                String::new()
            }
        };
        Err(BackendError::Status { status, body })
    }

    async fn get_rows<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, BackendError> {
        tracing::debug!(%url, "backend query");

        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(BackendError::Request)?;

        Self::check_status(response)
            .await?
            .json::<Vec<T>>()
            .await
            .map_err(BackendError::Decode)
    }

    /// Every recorded finish time for a distance, fastest first
    pub async fn fetch_reference_times(
        &self,
        distance: Distance,
    ) -> Result<Vec<Duration>, BackendError> {
        let rows: Vec<FinishTimeRow> = self.get_rows(self.reference_times_url(distance)).await?;

        let times: Vec<Duration> = rows
            .iter()
            .filter_map(|row| time_codec::parse_duration(row.finish_time.as_deref()))
            .collect();

        tracing::debug!(%distance, count = times.len(), "fetched reference times");
        Ok(times)
    }

    /// A runner's personal best rows, at most one per distance
    pub async fn fetch_personal_bests(
        &self,
        user_id: &str,
    ) -> Result<Vec<PersonalBestRow>, BackendError> {
        self.get_rows(self.personal_bests_url(user_id)).await
    }

    /// Insert or replace a runner's personal best for a distance
    pub async fn upsert_personal_best(
        &self,
        user_id: &str,
        distance: Distance,
        time: &Duration,
    ) -> Result<(), BackendError> {
        let body = PersonalBestUpsert {
            user_id,
            distance,
            finish_time: time_codec::format(time),
        };

        let response = self
            .authorized(self.client.post(self.upsert_url()))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&body)
            .send()
            .await
            .map_err(BackendError::Request)?;

        Self::check_status(response).await?;

        tracing::info!(user_id, %distance, finish_time = %body.finish_time, "saved personal best");
        Ok(())
    }
}

impl ReferenceTimeSource for BackendClient {
    fn reference_times(
        &self,
        distance: Distance,
    ) -> impl Future<Output = Result<Vec<Duration>, BackendError>> + Send {
        self.fetch_reference_times(distance)
    }
}
