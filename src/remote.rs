//! HTTP collaborators: the site registry, the best-entry-time advisor and
//! the IP geolocation service. All response bodies are interpreted here so
//! nothing upstream touches raw JSON.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RequestError;

#[derive(Debug, Deserialize)]
pub struct SiteList {
    pub sites: Vec<Site>,
}

#[derive(Debug, Deserialize)]
pub struct Site {
    pub domain: String,
}

/// Body of `POST /api/best_entry_time/`. Both timestamps are ISO-8601;
/// `current_time` is recomputed at send time, never reused from a prior call.
#[derive(Debug, Serialize)]
pub struct EntryTimeRequest {
    pub site_domain: String,
    pub release_time: String,
    pub current_time: String,
}

/// Advisor response body. Success carries `optimal_time`; errors carry
/// `error`. Both are optional because the server is free to omit either.
#[derive(Debug, Default, Deserialize)]
pub struct EntryTimeBody {
    #[serde(default)]
    pub optimal_time: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GeoInfo {
    pub status: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Location {
    pub country: String,
    pub timezone: String,
}

impl GeoInfo {
    /// Country and timezone are trustworthy only on `status == "success"`.
    pub fn into_location(self) -> Option<Location> {
        if self.status != "success" {
            return None;
        }
        Some(Location {
            country: self.country.unwrap_or_default(),
            timezone: self.timezone.unwrap_or_default(),
        })
    }
}

/// Seam for the advisor endpoint. Returns the raw `optimal_time` string on
/// success; all failure modes are collapsed into [`RequestError`] here.
#[async_trait]
pub trait EntryTimeApi: Send + Sync {
    async fn best_entry_time(&self, request: &EntryTimeRequest) -> Result<String, RequestError>;
}

pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, client }
    }

    /// Flattened list of registered site domains.
    pub async fn fetch_sites(&self) -> anyhow::Result<Vec<String>> {
        let url = format!("{}/api/sites/", self.base_url);
        let list: SiteList = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .with_context(|| format!("failed to fetch site list from {url}"))?
            .json()
            .await
            .context("site list body was not valid JSON")?;
        Ok(list.sites.into_iter().map(|site| site.domain).collect())
    }
}

#[async_trait]
impl EntryTimeApi for ApiClient {
    async fn best_entry_time(&self, request: &EntryTimeRequest) -> Result<String, RequestError> {
        let url = format!("{}/api/best_entry_time/", self.base_url);
        debug!(
            site_domain = %request.site_domain,
            release_time = %request.release_time,
            current_time = %request.current_time,
            "requesting best entry time"
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|_| RequestError::Network)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|_| RequestError::Network)?;
        interpret_entry_time_response(status, &body)
    }
}

/// Maps an advisor (status, body) pair onto the outcome taxonomy:
/// non-2xx surfaces the remote `error` verbatim when present, a 2xx body
/// without `optimal_time` falls back to its `error` or the unknown-error
/// message.
pub fn interpret_entry_time_response(status: u16, body: &str) -> Result<String, RequestError> {
    let parsed: EntryTimeBody = serde_json::from_str(body).unwrap_or_default();

    if !(200..300).contains(&status) {
        let message = parsed
            .error
            .unwrap_or_else(|| "Failed to fetch optimal time".to_string());
        return Err(RequestError::Remote(message));
    }

    match (parsed.optimal_time, parsed.error) {
        (Some(optimal_time), _) => Ok(optimal_time),
        (None, Some(error)) => Err(RequestError::Remote(error)),
        (None, None) => Err(RequestError::UnknownBody),
    }
}

/// One-shot startup lookup against the geolocation collaborator.
pub async fn fetch_location(client: &reqwest::Client, url: &str) -> anyhow::Result<GeoInfo> {
    let info: GeoInfo = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("geolocation lookup failed against {url}"))?
        .json()
        .await
        .context("geolocation body was not valid JSON")?;
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_2xx_surfaces_remote_error_verbatim() {
        let outcome = interpret_entry_time_response(400, r#"{"error": "site not found"}"#);
        assert_eq!(
            outcome,
            Err(RequestError::Remote("site not found".to_string()))
        );
    }

    #[test]
    fn non_2xx_without_error_field_gets_generic_message() {
        let outcome = interpret_entry_time_response(500, "<html>gateway timeout</html>");
        assert_eq!(
            outcome,
            Err(RequestError::Remote("Failed to fetch optimal time".to_string()))
        );
    }

    #[test]
    fn success_with_optimal_time_passes_it_through() {
        let outcome =
            interpret_entry_time_response(200, r#"{"optimal_time": "2025-06-01T10:15:30Z"}"#);
        assert_eq!(outcome, Ok("2025-06-01T10:15:30Z".to_string()));
    }

    #[test]
    fn success_without_optimal_time_is_unknown_error() {
        assert_eq!(
            interpret_entry_time_response(200, "{}"),
            Err(RequestError::UnknownBody)
        );
        assert_eq!(
            interpret_entry_time_response(200, r#"{"error": "queue is full"}"#),
            Err(RequestError::Remote("queue is full".to_string()))
        );
    }

    #[test]
    fn geo_location_requires_success_status() {
        let ok = GeoInfo {
            status: "success".to_string(),
            country: Some("Norway".to_string()),
            timezone: Some("Europe/Oslo".to_string()),
        };
        let location = ok.into_location().unwrap();
        assert_eq!(location.country, "Norway");
        assert_eq!(location.timezone, "Europe/Oslo");

        let fail = GeoInfo {
            status: "fail".to_string(),
            country: Some("Norway".to_string()),
            timezone: None,
        };
        assert!(fail.into_location().is_none());
    }

    #[test]
    fn entry_time_request_serializes_expected_field_names() {
        let request = EntryTimeRequest {
            site_domain: "example.com".to_string(),
            release_time: "2025-06-01T10:00:00Z".to_string(),
            current_time: "2025-06-01T09:00:00Z".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["site_domain"], "example.com");
        assert_eq!(json["release_time"], "2025-06-01T10:00:00Z");
        assert_eq!(json["current_time"], "2025-06-01T09:00:00Z");
    }
}
