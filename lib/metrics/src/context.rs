//! Facts shared between collectors for the lifetime of the process.
//!
//! Each cache has one designated writer; every other collector only reads it.
//! Entries are only ever inserted or overwritten, never removed.

use crate::measurement::{TagValue, Tags};
use chrono_tz::Tz;
use getset::Getters;
use peplink::model::WanId;
use std::collections::HashMap;

/// Identity of the SIM and network currently serving a cellular link.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct ActiveCell {
    wan: WanId,
    iccid: Option<String>,
    mcc: Option<u32>,
    mnc: Option<u32>,
    carrier: Option<String>,
}

impl ActiveCell {
    pub fn new(wan: WanId, iccid: Option<String>) -> Self {
        Self {
            wan,
            iccid,
            mcc: None,
            mnc: None,
            carrier: None,
        }
    }

    pub fn with_network(mut self, mcc: Option<u32>, mnc: Option<u32>, carrier: Option<String>) -> Self {
        self.mcc = mcc;
        self.mnc = mnc;
        self.carrier = carrier;
        self
    }

    pub fn tags(&self) -> Tags {
        let mut tags = Tags::new();
        tags.insert("wan".to_string(), TagValue::from(self.wan));
        if let Some(iccid) = &self.iccid {
            tags.insert("iccid".to_string(), TagValue::from(iccid.as_str()));
        }
        if let Some(mcc) = self.mcc {
            tags.insert("mcc".to_string(), TagValue::from(mcc));
        }
        if let Some(mnc) = self.mnc {
            tags.insert("mnc".to_string(), TagValue::from(mnc));
        }
        if let Some(carrier) = &self.carrier {
            tags.insert("carrier".to_string(), TagValue::from(carrier.as_str()));
        }
        tags
    }
}

/// Process-wide state handed to every collector invocation.
#[derive(Debug, Default)]
pub struct SharedContext {
    /// MAC address to hostname. Written by the LAN client collectors.
    hostnames: HashMap<String, String>,
    /// Written by the cellular collector, read by the WAN traffic collector.
    active_cells: HashMap<WanId, ActiveCell>,
    /// Resolved once by the LAN client usage collector.
    time_zone: Option<Tz>,
}

impl SharedContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hostname(&self, mac: &str) -> Option<&str> {
        self.hostnames.get(mac).map(String::as_str)
    }

    pub fn has_hostnames(&self) -> bool {
        !self.hostnames.is_empty()
    }

    pub fn record_hostname(&mut self, mac: impl Into<String>, name: impl Into<String>) {
        self.hostnames.insert(mac.into(), name.into());
    }

    pub fn active_cell(&self, wan: WanId) -> Option<&ActiveCell> {
        self.active_cells.get(&wan)
    }

    pub fn record_active_cell(&mut self, cell: ActiveCell) {
        self.active_cells.insert(cell.wan, cell);
    }

    pub fn time_zone(&self) -> Option<Tz> {
        self.time_zone
    }

    /// The first resolved zone wins for the rest of the process.
    pub fn resolve_time_zone(&mut self, tz: Tz) -> Tz {
        *self.time_zone.get_or_insert(tz)
    }
}
