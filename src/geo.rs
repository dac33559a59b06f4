//! Geographic enrichment of peer addresses
//!
//! The hub treats location lookup as an opaque collaborator: given a public
//! IP it may or may not know where the peer is. Absence is a normal result,
//! never an error.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Location attached to a peer's system info
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    /// Latitude / longitude pair
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ll: Option<[f64; 2]>,
}

/// One row of the static lookup table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoEntry {
    pub ip: String,

    #[serde(flatten)]
    pub info: GeoInfo,
}

/// Resolve a public IP to a location
pub trait GeoLookup: Send + Sync {
    fn lookup(&self, ip: &str) -> Option<GeoInfo>;
}

/// Lookup that never knows anything
#[derive(Debug, Default)]
pub struct NoGeoLookup;

impl GeoLookup for NoGeoLookup {
    fn lookup(&self, _ip: &str) -> Option<GeoInfo> {
        None
    }
}

/// Lookup backed by a fixed table from configuration
#[derive(Debug, Default)]
pub struct StaticGeoLookup {
    table: HashMap<String, GeoInfo>,
}

impl StaticGeoLookup {
    pub fn new(entries: &[GeoEntry]) -> Self {
        Self {
            table: entries
                .iter()
                .map(|e| (e.ip.trim().to_string(), e.info.clone()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl GeoLookup for StaticGeoLookup {
    fn lookup(&self, ip: &str) -> Option<GeoInfo> {
        self.table.get(ip.trim()).cloned()
    }
}
