//! Response models for the appliance status endpoints.
//!
//! The appliance reports collections as an `order` list of integer ids next to
//! one object per id, keyed by the stringified id:
//!
//! ```json
//! { "order": [1, 2], "1": { "type": "ethernet" }, "2": { "type": "cellular" } }
//! ```
//!
//! [`Ordered`] keeps the entries as raw JSON and decodes them one at a time, so
//! a single malformed entry never prevents reading its siblings.

use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::{any::type_name, collections::HashMap, fmt, marker::PhantomData};
use tracing::error;

/// Decode a field, treating a value of the wrong shape like an absent one.
///
/// Used on sub-fields whose malformation must not cost the enclosing record.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    match T::deserialize(&value) {
        Ok(decoded) => Ok(decoded),
        Err(err) => {
            if !value.is_null() {
                error!(
                    value = ?value,
                    expected = type_name::<T>(),
                    error = %err,
                    "Ignoring malformed field"
                );
            }
            Ok(T::default())
        }
    }
}

/// Identifier of a WAN link.
pub type WanId = u32;

#[derive(Clone, Deserialize)]
#[serde(bound = "")]
pub struct Ordered<T> {
    #[serde(default)]
    order: Vec<u32>,
    #[serde(flatten)]
    entries: HashMap<String, Value>,
    #[serde(skip)]
    _entry: PhantomData<T>,
}

impl<T> Default for Ordered<T> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            entries: HashMap::new(),
            _entry: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Ordered<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ordered")
            .field("order", &self.order)
            .field("entries", &self.entries)
            .finish()
    }
}

impl<T: DeserializeOwned> Ordered<T> {
    pub fn order(&self) -> &[u32] {
        &self.order
    }

    pub fn raw(&self, id: u32) -> Option<&Value> {
        self.entries.get(&id.to_string())
    }

    /// Decode the entry for `id`. `None` when the id is listed but absent.
    pub fn get(&self, id: u32) -> Option<Result<T, serde_json::Error>> {
        self.raw(id).map(|value| T::deserialize(value))
    }

    /// Entries in the appliance's reporting order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, Option<Result<T, serde_json::Error>>)> + '_ {
        self.order.iter().map(move |&id| (id, self.get(id)))
    }
}

/// Status of every WAN link, as returned by `status.wan.connection`.
pub type WanStatus = Ordered<WanLink>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WanLink {
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub cellular: Option<Cellular>,
    #[serde(default, deserialize_with = "lenient")]
    pub status_led: Option<String>,
}

impl WanLink {
    pub fn is_cellular(&self) -> bool {
        self.kind == "cellular"
    }
}

/// A mobile network code, reported either as a string or a number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NetworkCode {
    Number(u32),
    Text(String),
}

impl NetworkCode {
    pub fn value(&self) -> Option<u32> {
        match self {
            NetworkCode::Number(code) => Some(*code),
            NetworkCode::Text(text) => text.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cellular {
    #[serde(default, deserialize_with = "lenient")]
    pub mcc: Option<NetworkCode>,
    #[serde(default, deserialize_with = "lenient")]
    pub mnc: Option<NetworkCode>,
    #[serde(default, deserialize_with = "lenient")]
    pub carrier: Option<Carrier>,
    #[serde(default, deserialize_with = "lenient")]
    pub data_technology: Option<String>,
    pub signal_level: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub rat: Vec<Rat>,
    #[serde(default, deserialize_with = "lenient")]
    pub sim: Ordered<Sim>,
}

impl Cellular {
    /// The reported data technology, ignoring blanks.
    pub fn technology(&self) -> Option<&str> {
        self.data_technology
            .as_deref()
            .filter(|technology| !technology.is_empty())
    }

    /// ICCID of the first SIM flagged active, if the appliance reports one.
    pub fn active_iccid(&self) -> Option<String> {
        self.sim
            .iter()
            .filter_map(|(_, sim)| sim.and_then(Result::ok))
            .find(|sim| sim.active)
            .and_then(|sim| sim.iccid)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Carrier {
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
}

/// A radio access technology and the bands it is using.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Rat {
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub band: Vec<Band>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Band {
    #[serde(default, deserialize_with = "lenient")]
    pub name: String,
    /// Left untyped: the schema differs between radio generations.
    pub signal: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Sim {
    #[serde(default, deserialize_with = "lenient")]
    pub active: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub iccid: Option<String>,
}

/// Result of `status.client`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientStatus {
    #[serde(default)]
    pub list: Vec<Client>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub mac: String,
    pub name: Option<String>,
    #[serde(default)]
    pub ip: String,
    pub connection_type: Option<String>,
    #[serde(default)]
    pub active: bool,
    pub signal: Option<Map<String, Value>>,
    pub speed: Option<Speed>,
}

impl Client {
    pub fn is_wireless(&self) -> bool {
        self.connection_type.as_deref() == Some("wireless")
    }

    /// The reported name, ignoring blanks.
    pub fn hostname(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Speed {
    pub unit: String,
    pub upload: f64,
    pub download: f64,
}

/// Result of `status.client.bandwidth.usage`, keyed by period start date.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientUsage {
    #[serde(default)]
    pub monthly: HashMap<String, Vec<ClientUsageEntry>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientUsageEntry {
    pub mac: String,
    #[serde(default)]
    pub ip: String,
    pub upload: f64,
    pub download: f64,
}

/// Result of `status.traffic`.
#[derive(Debug, Clone, Deserialize)]
pub struct TrafficStatus {
    pub bandwidth: TrafficGroup,
    pub traffic: TrafficGroup,
    pub lifetime: LifetimeTraffic,
}

/// Per-link figures sharing one unit.
#[derive(Debug, Clone, Deserialize)]
pub struct TrafficGroup {
    pub unit: String,
    #[serde(flatten)]
    pub links: Ordered<TrafficEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LifetimeTraffic {
    pub unit: String,
    pub all: TrafficEntry,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrafficEntry {
    #[serde(default)]
    pub overall: Map<String, Value>,
}

/// Result of `config.time`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeConfig {
    pub time_zone: Option<String>,
}
