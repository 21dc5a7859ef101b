use crate::{
    api::{ClientWeight, PeplinkApi, UsagePeriod},
    error::{ApiError, Result},
    model::{ClientStatus, ClientUsage, TimeConfig, TrafficStatus, WanStatus},
};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use common::{PeplinkSettings, SettingsError};
use getset::Getters;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use url::Url;

/// Re-grant the token this long before the appliance expires it.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Envelope wrapped around every appliance response.
#[derive(Debug, Deserialize)]
struct Envelope {
    stat: String,
    code: Option<i64>,
    message: Option<String>,
    response: Option<Value>,
}

impl Envelope {
    fn into_response<T: DeserializeOwned>(self, endpoint: &str) -> Result<T> {
        if self.stat != "ok" {
            return Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                code: self.code,
                message: self.message.unwrap_or_else(|| self.stat.clone()),
            });
        }

        let response = self
            .response
            .ok_or_else(|| ApiError::MissingResponse(endpoint.to_string()))?;
        Ok(serde_json::from_value(response)?)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    scope: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenGrant {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug)]
struct AccessToken {
    token: String,
    refresh_at: Instant,
}

/// HTTP implementation of [`PeplinkApi`] using client-credential tokens.
#[derive(Debug, Getters)]
pub struct PeplinkClient {
    http: reqwest::Client,
    #[getset(get = "pub")]
    base_url: Url,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<AccessToken>>,
}

impl PeplinkClient {
    pub fn new(
        base_url: Url,
        client_id: String,
        client_secret: String,
        verify_certificates: bool,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!verify_certificates)
            .build()?;

        Ok(Self {
            http,
            base_url: with_trailing_slash(base_url),
            client_id,
            client_secret,
            token: Mutex::new(None),
        })
    }

    pub fn from_settings(settings: &PeplinkSettings) -> std::result::Result<Self, ClientSetupError> {
        let url = settings.parsed_url()?;
        Ok(Self::new(
            url,
            settings.client_id().clone(),
            settings.client_secret().clone(),
            settings.verify_certificates(),
        )?)
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url> {
        Ok(self.base_url.join(&format!("api/{}", endpoint))?)
    }

    async fn access_token(&self) -> Result<String> {
        let mut token = self.token.lock().await;
        if let Some(current) = token.as_ref() {
            if Instant::now() < current.refresh_at {
                return Ok(current.token.clone());
            }
        }

        let grant = self.grant_token().await?;
        let lifetime = Duration::from_secs(grant.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        debug!(expires_in = grant.expires_in, "Granted new access token");
        *token = Some(AccessToken {
            token: grant.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        Ok(grant.access_token)
    }

    #[instrument(skip(self))]
    async fn grant_token(&self) -> Result<TokenGrant> {
        let endpoint = "auth.token.grant";
        let envelope: Envelope = self
            .http
            .post(self.endpoint_url(endpoint)?)
            .json(&TokenRequest {
                client_id: &self.client_id,
                client_secret: &self.client_secret,
                scope: "api",
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        envelope.into_response(endpoint)
    }

    async fn forget_token(&self, endpoint: &str) {
        warn!(endpoint, "Access token rejected, re-granting on next call");
        self.token.lock().await.take();
    }

    #[instrument(skip(self, query))]
    async fn get<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, String)]) -> Result<T> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(self.endpoint_url(endpoint)?)
            .query(&[("accessToken", token)])
            .query(query)
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.forget_token(endpoint).await;
        }
        let envelope: Envelope = response.error_for_status()?.json().await?;

        let result = envelope.into_response(endpoint);
        if let Err(ApiError::Status { code: Some(401), .. }) = &result {
            self.forget_token(endpoint).await;
        }
        result
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientSetupError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[async_trait]
impl PeplinkApi for PeplinkClient {
    async fn wan_status(&self) -> Result<WanStatus> {
        self.get("status.wan.connection", &[]).await
    }

    async fn client_status(&self, weight: ClientWeight, active_only: bool) -> Result<ClientStatus> {
        let mut query = vec![("weight", weight.as_str().to_string())];
        if active_only {
            query.push(("active", "yes".to_string()));
        }
        self.get("status.client", &query).await
    }

    async fn client_bandwidth_usage(
        &self,
        period: UsagePeriod,
        from: NaiveDateTime,
        to: Option<NaiveDateTime>,
    ) -> Result<ClientUsage> {
        let mut query = vec![
            ("period", period.as_str().to_string()),
            ("from", from.format(DATETIME_FORMAT).to_string()),
        ];
        if let Some(to) = to {
            query.push(("to", to.format(DATETIME_FORMAT).to_string()));
        }
        self.get("status.client.bandwidth.usage", &query).await
    }

    async fn traffic_status(&self) -> Result<TrafficStatus> {
        self.get("status.traffic", &[]).await
    }

    async fn time_config(&self) -> Result<TimeConfig> {
        self.get("config.time", &[]).await
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod client_tests {
    use super::*;
    use chrono::NaiveDate;
    use httpmock::prelude::*;
    use pretty_assertions_sorted::assert_eq;
    use serde_json::json;

    fn envelope(value: Value) -> Envelope {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn ok_envelope_yields_response() {
        let config: TimeConfig = envelope(json!({
            "stat": "ok",
            "response": { "timeZone": "America/Chicago" }
        }))
        .into_response("config.time")
        .unwrap();

        assert_eq!(config.time_zone.as_deref(), Some("America/Chicago"));
    }

    #[test]
    fn failed_envelope_is_a_status_error() {
        let result: Result<TimeConfig> = envelope(json!({
            "stat": "fail",
            "code": 401,
            "message": "Unauthorized"
        }))
        .into_response("config.time");

        match result {
            Err(ApiError::Status { endpoint, code, message }) => {
                assert_eq!(endpoint, "config.time");
                assert_eq!(code, Some(401));
                assert_eq!(message, "Unauthorized");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn ok_envelope_without_body_is_an_error() {
        let result: Result<TimeConfig> =
            envelope(json!({ "stat": "ok" })).into_response("config.time");
        assert!(matches!(result, Err(ApiError::MissingResponse(_))));
    }

    #[test]
    fn endpoints_resolve_under_the_api_path() {
        let client = PeplinkClient::new(
            Url::parse("https://192.168.50.1/router").unwrap(),
            "id".to_string(),
            "secret".to_string(),
            false,
        )
        .unwrap();

        assert_eq!(
            client.endpoint_url("status.traffic").unwrap().as_str(),
            "https://192.168.50.1/router/api/status.traffic"
        );
    }

    fn mock_client(server: &MockServer) -> PeplinkClient {
        PeplinkClient::new(
            Url::parse(&server.base_url()).unwrap(),
            "id".to_string(),
            "secret".to_string(),
            true,
        )
        .unwrap()
    }

    async fn mock_grant(server: &MockServer, expires_in: u64) -> httpmock::Mock<'_> {
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/auth.token.grant")
                    .json_body(json!({ "clientId": "id", "clientSecret": "secret", "scope": "api" }));
                then.status(200).json_body(json!({
                    "stat": "ok",
                    "response": { "accessToken": "tok-1", "expiresIn": expires_in }
                }));
            })
            .await
    }

    async fn mock_time_config(server: &MockServer) -> httpmock::Mock<'_> {
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/config.time")
                    .query_param("accessToken", "tok-1");
                then.status(200).json_body(json!({
                    "stat": "ok",
                    "response": { "timeZone": "Europe/London" }
                }));
            })
            .await
    }

    #[tokio::test]
    async fn token_is_granted_once_and_reused() {
        let server = MockServer::start_async().await;
        let grant = mock_grant(&server, 3600).await;
        let time = mock_time_config(&server).await;
        let client = mock_client(&server);

        let config = client.time_config().await.unwrap();
        client.time_config().await.unwrap();

        assert_eq!(config.time_zone.as_deref(), Some("Europe/London"));
        assert_eq!(grant.hits_async().await, 1);
        assert_eq!(time.hits_async().await, 2);
    }

    #[tokio::test]
    async fn token_inside_refresh_margin_is_re_granted() {
        let server = MockServer::start_async().await;
        let grant = mock_grant(&server, 30).await;
        mock_time_config(&server).await;
        let client = mock_client(&server);

        client.time_config().await.unwrap();
        client.time_config().await.unwrap();

        assert_eq!(grant.hits_async().await, 2);
    }

    #[tokio::test]
    async fn rejected_envelope_forgets_the_token() {
        let server = MockServer::start_async().await;
        let grant = mock_grant(&server, 3600).await;
        mock_time_config(&server).await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/status.traffic");
                then.status(200).json_body(json!({
                    "stat": "fail",
                    "code": 401,
                    "message": "Unauthorized"
                }));
            })
            .await;
        let client = mock_client(&server);

        client.time_config().await.unwrap();
        let result = client.traffic_status().await;
        assert!(matches!(result, Err(ApiError::Status { code: Some(401), .. })));
        client.time_config().await.unwrap();

        assert_eq!(grant.hits_async().await, 2);
    }

    #[tokio::test]
    async fn unauthorized_http_status_forgets_the_token() {
        let server = MockServer::start_async().await;
        let grant = mock_grant(&server, 3600).await;
        mock_time_config(&server).await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/status.wan.connection");
                then.status(401);
            })
            .await;
        let client = mock_client(&server);

        client.time_config().await.unwrap();
        assert!(matches!(client.wan_status().await, Err(ApiError::Http(_))));
        client.time_config().await.unwrap();

        assert_eq!(grant.hits_async().await, 2);
    }

    #[tokio::test]
    async fn client_status_sends_weight_and_active_filter() {
        let server = MockServer::start_async().await;
        mock_grant(&server, 3600).await;
        let full = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/status.client")
                    .query_param("accessToken", "tok-1")
                    .query_param("weight", "full")
                    .query_param("active", "yes");
                then.status(200).json_body(json!({
                    "stat": "ok",
                    "response": { "list": [{ "mac": "AA:AA:AA:AA:AA:01", "ip": "192.168.50.10" }] }
                }));
            })
            .await;
        let client = mock_client(&server);

        let status = client.client_status(ClientWeight::Full, true).await.unwrap();

        full.assert_async().await;
        assert_eq!(status.list.len(), 1);
        assert_eq!(status.list[0].mac, "AA:AA:AA:AA:AA:01");
    }

    #[tokio::test]
    async fn bandwidth_usage_sends_the_window() {
        let server = MockServer::start_async().await;
        mock_grant(&server, 3600).await;
        let usage = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/status.client.bandwidth.usage")
                    .query_param("period", "monthly")
                    .query_param("from", "2024-03-01T00:00:00")
                    .query_param("to", "2024-03-31T23:59:59");
                then.status(200).json_body(json!({
                    "stat": "ok",
                    "response": {
                        "monthly": {
                            "2024-03-01": [{ "mac": "AA:AA:AA:AA:AA:01", "upload": 1.5, "download": 20 }]
                        }
                    }
                }));
            })
            .await;
        let client = mock_client(&server);

        let from = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 3, 31)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        let result = client
            .client_bandwidth_usage(UsagePeriod::Monthly, from, Some(to))
            .await
            .unwrap();

        usage.assert_async().await;
        assert_eq!(result.monthly["2024-03-01"][0].download, 20.0);
    }
}
