use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One tracked symbol as it appears on the wire.
///
/// Fields missing from an inbound record decode as zero values.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct InstrumentSnapshot {
    pub symbol: String,
    pub open_price: f64,
    pub current_price: f64,
    #[serde(rename = "refreshInterval")]
    pub refresh_interval_hint: u32,
}

/// The complete set of instruments at one point in time.
///
/// Serializes as a bare JSON array; `generated_at` stays in memory.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(transparent)]
pub struct FullSnapshot {
    instruments: Vec<InstrumentSnapshot>,
    #[serde(skip, default = "Utc::now")]
    generated_at: DateTime<Utc>,
}

impl FullSnapshot {
    pub fn new(instruments: Vec<InstrumentSnapshot>) -> Self {
        Self {
            instruments,
            generated_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn instruments(&self) -> &[InstrumentSnapshot] {
        &self.instruments
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
