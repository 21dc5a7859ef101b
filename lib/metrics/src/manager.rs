use crate::{
    collector::{
        CellularCollector, CollectorError, LanClientCollector, LanClientUsageCollector,
        MetricCollector, WanTrafficCollector,
    },
    context::SharedContext,
    measurement::Measurement,
    sink::MeasurementSinkRef,
};
use common::util::time::format_duration;
use core::fmt;
use peplink::PeplinkApiRef;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, instrument, trace};

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Collector {collector} failed: {source}")]
    Collector {
        collector: &'static str,
        #[source]
        source: CollectorError,
    },

    #[error("Failed to write measurements: {0:#}")]
    Sink(anyhow::Error),
}

/// A registered collector and when it last ran.
struct ScheduledCollector {
    collector: Box<dyn MetricCollector>,
    /// `None` until the first invocation, so every collector runs in the first cycle.
    last_ran: Option<Instant>,
}

impl ScheduledCollector {
    fn is_due(&self, now: Instant) -> bool {
        self.last_ran
            .map_or(true, |last| now >= last + self.collector.refresh_rate())
    }
}

/// Runs the registered collectors on their own cadences and writes one batch
/// per cycle. Collectors run one at a time, in registration order.
pub struct Monitor {
    api: PeplinkApiRef,
    sink: MeasurementSinkRef,
    context: SharedContext,
    collectors: Vec<ScheduledCollector>,
    interval: Duration,
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field(
                "collectors",
                &self
                    .collectors
                    .iter()
                    .map(|scheduled| scheduled.collector.name())
                    .collect::<Vec<_>>(),
            )
            .field("context", &self.context)
            .field("interval", &self.interval)
            .finish()
    }
}

impl Monitor {
    pub fn new(api: PeplinkApiRef, sink: MeasurementSinkRef, interval: Duration) -> Self {
        Self {
            api,
            sink,
            context: SharedContext::new(),
            collectors: vec![],
            interval,
        }
    }

    /// A monitor with every appliance collector registered. The cellular
    /// collector goes first so traffic in the same cycle sees the active SIM.
    pub fn with_default_collectors(
        api: PeplinkApiRef,
        sink: MeasurementSinkRef,
        interval: Duration,
    ) -> Self {
        let mut monitor = Self::new(api, sink, interval);
        monitor.register_collector(CellularCollector::new());
        monitor.register_collector(LanClientCollector::new());
        monitor.register_collector(LanClientUsageCollector::new());
        monitor.register_collector(WanTrafficCollector::new());
        monitor
    }

    pub fn register_collector(&mut self, collector: impl MetricCollector + 'static) {
        self.collectors.push(ScheduledCollector {
            collector: Box::new(collector),
            last_ran: None,
        });
    }

    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run every due collector and write the combined batch.
    ///
    /// With `log_errors` a failing collector is logged and the cycle carries
    /// on without its data; without it the first failure is returned and
    /// nothing is written. Either way the collector is not retried before its
    /// refresh rate has elapsed. Returns the number of measurements written.
    #[instrument(skip(self))]
    pub async fn run_once(&mut self, log_errors: bool) -> Result<usize, MonitorError> {
        let started = Instant::now();
        let mut batch: Vec<Measurement> = Vec::new();

        for scheduled in &mut self.collectors {
            let now = Instant::now();
            let name = scheduled.collector.name();
            if !scheduled.is_due(now) {
                trace!(collector = name, "Collector not due");
                continue;
            }

            let result = scheduled
                .collector
                .update(self.api.as_ref(), &mut self.context)
                .await;
            scheduled.last_ran = Some(now);

            match result {
                Ok(measurements) => {
                    debug!(collector = name, count = measurements.len(), "Collected measurements");
                    batch.extend(measurements.into_iter().filter(|m| !m.is_empty()));
                }
                Err(err) if log_errors => {
                    error!(collector = name, error = %err, "Collector failed");
                }
                Err(source) => {
                    return Err(MonitorError::Collector {
                        collector: name,
                        source,
                    });
                }
            }
        }

        self.sink.write(&batch).await.map_err(MonitorError::Sink)?;
        info!(
            measurements = batch.len(),
            elapsed = %format_duration(started.elapsed()),
            "Polling cycle complete"
        );

        Ok(batch.len())
    }

    pub async fn sleep(&self) {
        sleep(self.interval).await;
    }

    /// Poll until the process is stopped. A failed cycle is logged and the
    /// next one runs after the usual interval.
    pub async fn run_forever(&mut self) {
        loop {
            if let Err(err) = self.run_once(true).await {
                error!(error = %err, "Polling cycle failed");
            }
            self.sleep().await;
        }
    }
}
