use crate::line_protocol::encode_batch;
use async_trait::async_trait;
use common::InfluxSettings;
use getset::Getters;
use metrics::{Measurement, MeasurementSink};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Error, Debug)]
pub enum InfluxError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("InfluxDB responded {status}: {body}")]
    Status { status: u16, body: String },

    #[error("InfluxDB query {query:?} failed: {message}")]
    Query { query: String, message: String },
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    error: Option<String>,
}

/// Writes measurement batches to an InfluxDB 1.x database over HTTP.
#[derive(Debug, Getters)]
pub struct InfluxClient {
    http: reqwest::Client,
    #[getset(get = "pub")]
    base_url: String,
    #[getset(get = "pub")]
    database: String,
    username: String,
    password: String,
}

impl InfluxClient {
    pub fn new(settings: &InfluxSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: settings.base_url(),
            database: settings.database().clone(),
            username: settings.username().clone(),
            password: settings.password().clone(),
        }
    }

    fn credentials(&self) -> Vec<(&'static str, &str)> {
        if self.username.is_empty() {
            Vec::new()
        } else {
            vec![("u", self.username.as_str()), ("p", self.password.as_str())]
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, InfluxError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(InfluxError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }

    #[instrument(skip(self))]
    pub async fn query(&self, query: &str) -> Result<(), InfluxError> {
        let response = self
            .http
            .post(format!("{}/query", self.base_url))
            .query(&self.credentials())
            .form(&[("q", query)])
            .send()
            .await?;
        let response: QueryResponse = Self::check(response).await?.json().await?;

        let failure = response
            .error
            .into_iter()
            .chain(response.results.into_iter().filter_map(|result| result.error))
            .next();
        match failure {
            Some(message) => Err(InfluxError::Query {
                query: query.to_string(),
                message,
            }),
            None => Ok(()),
        }
    }

    /// Create the database and make `policy` its default retention policy,
    /// dropping the stock `autogen` policy.
    pub async fn prepare_database(&self, policy: &str, duration: &str) -> Result<(), InfluxError> {
        let database = quote_identifier(&self.database);
        let policy_name = quote_identifier(policy);

        self.query(&format!("CREATE DATABASE {}", database)).await?;
        self.query(&format!(
            "CREATE RETENTION POLICY {} ON {} DURATION {} REPLICATION 1 DEFAULT",
            policy_name, database, duration
        ))
        .await?;
        if policy != "autogen" {
            self.query(&format!("DROP RETENTION POLICY \"autogen\" ON {}", database))
                .await?;
        }

        info!(database = %self.database, policy, duration, "Database ready");
        Ok(())
    }

    #[instrument(skip(self, batch), fields(points = batch.len()))]
    pub async fn write_points(&self, batch: &[Measurement]) -> Result<(), InfluxError> {
        let body = encode_batch(batch);
        if body.is_empty() {
            debug!("Nothing to write");
            return Ok(());
        }

        let response = self
            .http
            .post(format!("{}/write", self.base_url))
            .query(&[("db", self.database.as_str())])
            .query(&self.credentials())
            .body(body)
            .send()
            .await?;
        Self::check(response).await?;

        Ok(())
    }
}

#[async_trait]
impl MeasurementSink for InfluxClient {
    async fn write(&self, batch: &[Measurement]) -> anyhow::Result<()> {
        Ok(self.write_points(batch).await?)
    }
}

fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('\\', "\\\\").replace('"', "\\\""))
}
