//! Canned appliance responses and a recording sink for tests.

use crate::{measurement::Measurement, sink::MeasurementSink};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use peplink::{
    error::Result,
    model::{ClientStatus, ClientUsage, TimeConfig, TrafficStatus, WanStatus},
    ApiError, ClientWeight, PeplinkApi, UsagePeriod,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{collections::HashMap, sync::Mutex};

#[derive(Debug, Default)]
pub struct FakeApi {
    wan_status: Option<Value>,
    full_clients: Option<Value>,
    lite_clients: Option<Value>,
    usage: Option<Value>,
    traffic: Option<Value>,
    time_config: Option<Value>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wan_status(mut self, value: Value) -> Self {
        self.wan_status = Some(value);
        self
    }

    pub fn with_full_clients(mut self, value: Value) -> Self {
        self.full_clients = Some(value);
        self
    }

    pub fn with_lite_clients(mut self, value: Value) -> Self {
        self.lite_clients = Some(value);
        self
    }

    pub fn with_usage(mut self, value: Value) -> Self {
        self.usage = Some(value);
        self
    }

    pub fn with_traffic(mut self, value: Value) -> Self {
        self.traffic = Some(value);
        self
    }

    pub fn with_time_config(mut self, value: Value) -> Self {
        self.time_config = Some(value);
        self
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        self.calls.lock().unwrap().get(endpoint).copied().unwrap_or(0)
    }

    fn respond<T: DeserializeOwned>(&self, endpoint: &'static str, value: &Option<Value>) -> Result<T> {
        *self.calls.lock().unwrap().entry(endpoint).or_default() += 1;
        match value {
            Some(value) => Ok(serde_json::from_value(value.clone())?),
            None => Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                code: Some(404),
                message: "no canned response".to_string(),
            }),
        }
    }
}

#[async_trait]
impl PeplinkApi for FakeApi {
    async fn wan_status(&self) -> Result<WanStatus> {
        self.respond("wan_status", &self.wan_status)
    }

    async fn client_status(&self, weight: ClientWeight, _active_only: bool) -> Result<ClientStatus> {
        match weight {
            ClientWeight::Full => self.respond("client_status", &self.full_clients),
            ClientWeight::Lite => self.respond("client_status", &self.lite_clients),
        }
    }

    async fn client_bandwidth_usage(
        &self,
        _period: UsagePeriod,
        _from: NaiveDateTime,
        _to: Option<NaiveDateTime>,
    ) -> Result<ClientUsage> {
        self.respond("client_bandwidth_usage", &self.usage)
    }

    async fn traffic_status(&self) -> Result<TrafficStatus> {
        self.respond("traffic_status", &self.traffic)
    }

    async fn time_config(&self) -> Result<TimeConfig> {
        self.respond("time_config", &self.time_config)
    }
}

/// Keeps every batch it is handed.
#[derive(Debug, Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<Vec<Measurement>>>,
    reject: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn batches(&self) -> Vec<Vec<Measurement>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl MeasurementSink for RecordingSink {
    async fn write(&self, batch: &[Measurement]) -> anyhow::Result<()> {
        if self.reject {
            anyhow::bail!("sink unavailable");
        }
        self.batches.lock().unwrap().push(batch.to_vec());
        Ok(())
    }
}
