// ── Monitor and device domain types ──

use serde::{Deserialize, Serialize};

/// A physical monitor on the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: String,
    pub name: String,
}

/// A sub-device identified by device discovery.
///
/// The list is replaced wholesale on every discovery call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub device_type: Option<String>,
}
