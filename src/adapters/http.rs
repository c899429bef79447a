use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use crate::models::driver::{CourierRecord, CourierStatus};
use crate::ports::{
    AssignmentPayload, DirectoryApi, NotificationSink, PackageStatusApi, PortError, PortResult,
};

/// REST client for the delivery backend. One instance serves the package,
/// directory and notification endpoints.
pub struct HttpBackend {
    base_url: String,
    http_client: Client,
}

#[derive(Deserialize)]
struct SendResult {
    #[serde(default)]
    success: bool,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> PortResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| PortError::Upstream(format!("failed to build http client: {err}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> PortResult<reqwest::Response> {
        let response = request.send().await.map_err(|err| {
            warn!(error = %err, call = what, "backend request failed");
            PortError::Upstream(format!("{what}: {err}"))
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(%status, call = what, "backend returned an error status");
        if status == StatusCode::NOT_FOUND {
            return Err(PortError::NotFound(format!("{what}: {body}")));
        }
        Err(PortError::Upstream(format!("{what}: HTTP {status} - {body}")))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> PortResult<T> {
        self.send(request, what)
            .await?
            .json::<T>()
            .await
            .map_err(|err| PortError::Upstream(format!("{what}: invalid response body: {err}")))
    }
}

fn encode_segment(raw: &str) -> String {
    raw.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            other => format!("%{other:02X}"),
        })
        .collect()
}

#[async_trait]
impl PackageStatusApi for HttpBackend {
    async fn mark_ready(&self, tracking_number: &str) -> PortResult<()> {
        let url = self.url(&format!("/packages/{}/ready", encode_segment(tracking_number)));
        self.send(self.http_client.patch(&url), "mark package ready")
            .await?;
        debug!(tracking_number, "package marked ready upstream");
        Ok(())
    }

    async fn assign(&self, tracking_number: &str, payload: &AssignmentPayload) -> PortResult<()> {
        let url = self.url(&format!("/packages/{}/assign", encode_segment(tracking_number)));
        let body = json!({
            "driverId": payload.driver_id,
            "driverName": payload.driver_name,
        });
        self.send(self.http_client.patch(&url).json(&body), "assign package")
            .await?;
        debug!(tracking_number, driver_id = %payload.driver_id, "package assigned upstream");
        Ok(())
    }
}

#[async_trait]
impl DirectoryApi for HttpBackend {
    async fn list_all(&self) -> PortResult<Vec<CourierRecord>> {
        let url = self.url("/couriers?active=true");
        self.send_json(self.http_client.get(&url), "list couriers").await
    }

    async fn update_status(&self, id: &str, status: CourierStatus) -> PortResult<CourierRecord> {
        let url = self.url(&format!("/couriers/{}/status", encode_segment(id)));
        self.send_json(
            self.http_client.patch(&url).json(&json!({ "status": status })),
            "update courier status",
        )
        .await
    }
}

#[async_trait]
impl NotificationSink for HttpBackend {
    async fn send_sms(&self, phone: &str, message: &str) -> PortResult<bool> {
        let url = self.url("/notifications/sms");
        let result: SendResult = self
            .send_json(
                self.http_client
                    .post(&url)
                    .json(&json!({ "phone": phone, "message": message })),
                "send sms",
            )
            .await?;
        Ok(result.success)
    }

    async fn send_push(&self, user_id: &str, title: &str, message: &str) -> PortResult<bool> {
        let url = self.url("/notifications/push");
        let result: SendResult = self
            .send_json(
                self.http_client.post(&url).json(&json!({
                    "userId": user_id,
                    "title": title,
                    "message": message,
                })),
                "send push",
            )
            .await?;
        Ok(result.success)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{HttpBackend, encode_segment};

    #[test]
    fn path_segments_are_percent_encoded() {
        assert_eq!(encode_segment("PKG-1"), "PKG-1");
        assert_eq!(encode_segment("PKG 1/2"), "PKG%201%2F2");
    }

    #[test]
    fn trailing_slash_is_trimmed_from_base_url() {
        let backend = HttpBackend::new("http://backend.local/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(backend.url("/couriers"), "http://backend.local/api/couriers");
    }
}
