//! On-chain call shapes
//!
//! These mirror the ABI of the satellite entry points exactly. Argument order
//! and the zero-address sentinels are part of the wire contract with contracts
//! that are already deployed.

use crate::selector::Selector;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chain a call is addressed to, as handed to external collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTarget {
    /// Chain id as used in state files
    pub chain_id: String,
    /// Network name understood by the toolchain (e.g. `sepolia`)
    pub network: String,
    /// Optional RPC endpoint override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
}

/// Diamond maintenance action kind; encoded as its `uint8` discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum FacetAction {
    Add = 0,
    Replace = 1,
    Remove = 2,
}

impl From<FacetAction> for u8 {
    fn from(action: FacetAction) -> Self {
        action as u8
    }
}

impl TryFrom<u8> for FacetAction {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FacetAction::Add),
            1 => Ok(FacetAction::Replace),
            2 => Ok(FacetAction::Remove),
            other => Err(format!("unknown maintenance action {}", other)),
        }
    }
}

impl fmt::Display for FacetAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacetAction::Add => write!(f, "Add"),
            FacetAction::Replace => write!(f, "Replace"),
            FacetAction::Remove => write!(f, "Remove"),
        }
    }
}

/// One `(moduleAddress, action, functionSelectors)` tuple of a maintenance batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceAction {
    pub module_address: Address,
    pub action: FacetAction,
    pub function_selectors: Vec<Selector>,
}

impl MaintenanceAction {
    pub fn new(module_address: Address, action: FacetAction, function_selectors: Vec<Selector>) -> Self {
        Self {
            module_address,
            action,
            function_selectors,
        }
    }
}

/// Arguments of `registerSatellite`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSatelliteCall {
    pub remote_chain_id: String,
    /// Counterpart satellite as `uint256`; Starknet addresses exceed 160 bits
    pub remote_address: U256,
    pub inbox_address: Address,
    pub remote_sender_alias: Address,
    pub send_function_selector: Selector,
}

impl RegisterSatelliteCall {
    /// Positional arguments in the order of the deployed `ISatellite` ABI:
    /// `(chainId, satellite, inbox, sendSelector, senderAlias)`
    pub fn args(&self) -> Vec<String> {
        vec![
            self.remote_chain_id.clone(),
            format!("0x{:x}", self.remote_address),
            self.inbox_address.to_string(),
            self.send_function_selector.to_string(),
            self.remote_sender_alias.to_string(),
        ]
    }
}

/// Arguments of `removeSatellite`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveSatelliteCall {
    pub remote_chain_id: String,
    pub counterpart_address: Address,
}

impl RemoveSatelliteCall {
    /// Positional arguments in ABI order
    pub fn args(&self) -> Vec<String> {
        vec![
            self.remote_chain_id.clone(),
            self.counterpart_address.to_string(),
        ]
    }
}

/// A facet to wire in at initial deployment; its address is bound by the deployer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRegistration {
    pub module: String,
    pub action: FacetAction,
    pub function_selectors: Vec<Selector>,
}

/// Where an initialisation call is sent after the diamond is wired
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "module", rename_all = "camelCase")]
pub enum InitTarget {
    /// The satellite diamond itself
    Satellite,
    /// A contract deployed alongside but not wired in
    External(String),
}

/// One post-deployment initialisation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitInvocation {
    pub module: String,
    pub target: InitTarget,
    pub function: String,
    /// Rendered arguments; `@Name` refers to the address of external module `Name`
    pub args: Vec<String>,
}

/// Everything the deployer needs to stand up a new satellite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SatelliteSetup {
    pub chain_id: String,
    pub registrations: Vec<ModuleRegistration>,
    pub external_modules: Vec<String>,
    pub init_calls: Vec<InitInvocation>,
}
