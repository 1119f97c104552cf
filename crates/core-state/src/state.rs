//! Deployment state data structures
//!
//! The on-disk shape is
//! `{ "satellites": { "<chainId>": { "contractAddress": "...", "connections"?: { "<chainId>": {} } } } }`.
//! Only outgoing edges are stored; incoming edges are found by scanning every record.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// All satellites deployed in one environment
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentState {
    /// Satellite records keyed by chain id
    pub satellites: BTreeMap<String, SatelliteRecord>,
}

/// One deployed satellite
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SatelliteRecord {
    /// Address of the diamond contract on its chain
    #[serde(rename = "contractAddress")]
    pub contract_address: String,

    /// Outgoing connections keyed by receiving chain id.
    ///
    /// `None` and `Some(empty)` are kept distinct so files round-trip unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<BTreeMap<String, ConnectionEdge>>,
}

/// Marker for a directed connection; serialized as `{}`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionEdge {}

impl SatelliteRecord {
    /// Create a record with no connections field
    pub fn new<S: Into<String>>(contract_address: S) -> Self {
        Self {
            contract_address: contract_address.into(),
            connections: None,
        }
    }

    /// Receiving chain ids of every outgoing edge
    pub fn outgoing(&self) -> Vec<String> {
        self.connections
            .as_ref()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether an edge to `chain_id` is recorded
    pub fn connects_to(&self, chain_id: &str) -> bool {
        self.connections
            .as_ref()
            .is_some_and(|c| c.contains_key(chain_id))
    }
}

impl DeploymentState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the satellite deployed on `chain_id`
    pub fn satellite(&self, chain_id: &str) -> Option<&SatelliteRecord> {
        self.satellites.get(chain_id)
    }

    /// Whether a satellite is recorded for `chain_id`
    pub fn contains(&self, chain_id: &str) -> bool {
        self.satellites.contains_key(chain_id)
    }

    /// Record a newly deployed satellite, replacing nothing.
    ///
    /// Returns `false` if a record for the chain already exists.
    pub fn insert_satellite<C: Into<String>, A: Into<String>>(
        &mut self,
        chain_id: C,
        contract_address: A,
    ) -> bool {
        let chain_id = chain_id.into();
        if self.satellites.contains_key(&chain_id) {
            return false;
        }
        self.satellites
            .insert(chain_id, SatelliteRecord::new(contract_address));
        true
    }

    /// Remove the record for `chain_id` regardless of edges
    pub fn remove_satellite(&mut self, chain_id: &str) -> Option<SatelliteRecord> {
        self.satellites.remove(chain_id)
    }

    /// Whether the directed edge `from -> to` exists
    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.satellite(from).is_some_and(|s| s.connects_to(to))
    }

    /// Add the directed edge `from -> to`.
    ///
    /// Returns `false` if the sender record is missing or the edge already exists.
    pub fn insert_edge(&mut self, from: &str, to: &str) -> bool {
        let Some(sender) = self.satellites.get_mut(from) else {
            return false;
        };
        let connections = sender.connections.get_or_insert_with(BTreeMap::new);
        if connections.contains_key(to) {
            return false;
        }
        connections.insert(to.to_string(), ConnectionEdge::default());
        true
    }

    /// Remove the directed edge `from -> to`, leaving an empty map in place.
    ///
    /// Returns `false` if the edge did not exist.
    pub fn remove_edge(&mut self, from: &str, to: &str) -> bool {
        self.satellites
            .get_mut(from)
            .and_then(|s| s.connections.as_mut())
            .is_some_and(|c| c.remove(to).is_some())
    }

    /// Chains that `chain_id` sends to
    pub fn outgoing(&self, chain_id: &str) -> Vec<String> {
        self.satellite(chain_id)
            .map(SatelliteRecord::outgoing)
            .unwrap_or_default()
    }

    /// Chains that send to `chain_id`
    pub fn incoming(&self, chain_id: &str) -> Vec<String> {
        self.satellites
            .iter()
            .filter(|(_, record)| record.connects_to(chain_id))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Every directed edge as `(from, to)` pairs
    pub fn edges(&self) -> Vec<(String, String)> {
        self.satellites
            .iter()
            .flat_map(|(from, record)| {
                record
                    .outgoing()
                    .into_iter()
                    .map(move |to| (from.clone(), to))
            })
            .collect()
    }

    /// Edges whose receiving end has no satellite record
    pub fn dangling_edges(&self) -> Vec<(String, String)> {
        self.edges()
            .into_iter()
            .filter(|(_, to)| !self.contains(to))
            .collect()
    }
}
