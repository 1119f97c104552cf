//! satctl Core Interface: chain-facing collaborators
//!
//! This crate defines the wire types that cross the boundary between the
//! control plane and the chains it manages, and the async traits behind which
//! every external collaborator sits:
//!
//! 1. **Introspection**: read the live facet map and facet code hashes of a satellite
//! 2. **Name lookup**: reverse-map a deployed facet address to a source contract name
//! 3. **Transactions**: submit maintenance batches and satellite registrations
//! 4. **Deployment**: deploy module contracts and new satellites
//!
//! # Example
//!
//! ```rust,no_run
//! use satctl_core_interface::{ChainTarget, FacetInspector};
//!
//! async fn count_selectors<I: FacetInspector>(
//!     inspector: &I,
//!     chain: &ChainTarget,
//!     satellite: alloy_primitives::Address,
//! ) -> satctl_core_interface::Result<usize> {
//!     let facets = inspector.facets(chain, satellite).await?;
//!     Ok(facets.iter().map(|f| f.selectors.len()).sum())
//! }
//! ```
//!
//! Implementations must be `Send + Sync` so they can be shared across the
//! bounded-parallel introspection tasks.

pub mod calls;
pub mod selector;

pub use calls::{
    ChainTarget, FacetAction, InitInvocation, InitTarget, MaintenanceAction, ModuleRegistration,
    RegisterSatelliteCall, RemoveSatelliteCall, SatelliteSetup,
};
pub use selector::{Selector, SelectorParseError};

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExternalError {
    /// A subprocess exited unsuccessfully; output is kept verbatim
    #[error("{tool} failed ({status}): {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    /// A collaborator answered but the answer could not be interpreted
    #[error("{tool} returned unparseable output: {detail}")]
    Unparseable { tool: String, detail: String },

    #[error("HTTP error: {0}")]
    Http(String),

    /// A lookup returned no result for the given key
    #[error("No result for {0}")]
    Lookup(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExternalError>;

/// One facet of a live diamond, as reported by its loupe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facet {
    pub address: Address,
    pub selectors: Vec<Selector>,
}

/// Read-only view of a deployed satellite
#[async_trait]
pub trait FacetInspector: Send + Sync {
    /// Every facet currently routed by the satellite at `satellite`
    async fn facets(&self, chain: &ChainTarget, satellite: Address) -> Result<Vec<Facet>>;

    /// keccak-256 of the runtime bytecode at `address`
    async fn code_hash(&self, chain: &ChainTarget, address: Address) -> Result<B256>;
}

/// Reverse lookup of a deployed address to its verified source contract name
#[async_trait]
pub trait ContractNameResolver: Send + Sync {
    async fn contract_name(&self, chain: &ChainTarget, address: Address) -> Result<String>;
}

/// State-changing calls on a satellite.
///
/// Each method is one on-chain transaction and resolves only once it is
/// mined; the returned hash is `None` when the tool does not report one.
#[async_trait]
pub trait SatelliteTransactor: Send + Sync {
    /// `satelliteMaintenance(actions, address(0), "")` as a single transaction
    async fn satellite_maintenance(
        &self,
        chain: &ChainTarget,
        satellite: Address,
        actions: &[MaintenanceAction],
    ) -> Result<Option<B256>>;

    async fn register_satellite(
        &self,
        chain: &ChainTarget,
        satellite: Address,
        call: &RegisterSatelliteCall,
    ) -> Result<Option<B256>>;

    async fn remove_satellite(
        &self,
        chain: &ChainTarget,
        satellite: Address,
        call: &RemoveSatelliteCall,
    ) -> Result<Option<B256>>;
}

/// Contract deployment
#[async_trait]
pub trait ModuleDeployer: Send + Sync {
    /// Deploy the named module contracts, returning the address of each
    async fn deploy_modules(
        &self,
        chain: &ChainTarget,
        modules: &[String],
    ) -> Result<BTreeMap<String, Address>>;

    /// Deploy and wire a fresh satellite, returning the diamond address
    async fn deploy_satellite(&self, chain: &ChainTarget, setup: &SatelliteSetup)
        -> Result<Address>;
}
