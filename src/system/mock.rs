//! In-memory chain for unit tests
//!
//! Implements every collaborator trait against a shared map of facets, code
//! hashes and contract names, and records each state-changing call.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use alloy_primitives::{Address, B256};
use async_trait::async_trait;

use satctl_core_interface::{
    ChainTarget, ContractNameResolver, ExternalError, Facet, FacetInspector, MaintenanceAction,
    ModuleDeployer, RegisterSatelliteCall, RemoveSatelliteCall, Result, SatelliteSetup,
    SatelliteTransactor,
};

#[derive(Debug, Default)]
struct MockState {
    facets: BTreeMap<Address, Vec<Facet>>,
    code_hashes: BTreeMap<Address, B256>,
    names: BTreeMap<Address, String>,
    next_address: u8,
    calls: Vec<String>,
    maintenance: Vec<Vec<MaintenanceAction>>,
    setups: Vec<SatelliteSetup>,
    /// Call labels that fail, e.g. `register@10`
    failing: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MockChain {
    state: Arc<Mutex<MockState>>,
}

impl MockChain {
    pub fn new() -> Self {
        let chain = Self::default();
        chain.state.lock().unwrap().next_address = 0xa0;
        chain
    }

    /// Register a live facet and what it resolves to
    pub fn add_facet(&self, satellite: Address, facet: Facet, name: &str, code_hash: B256) {
        let mut state = self.state.lock().unwrap();
        state.code_hashes.insert(facet.address, code_hash);
        state.names.insert(facet.address, name.to_string());
        state.facets.entry(satellite).or_default().push(facet);
    }

    pub fn fail(&self, label: &str) {
        self.state.lock().unwrap().failing.push(label.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn maintenance_batches(&self) -> Vec<Vec<MaintenanceAction>> {
        self.state.lock().unwrap().maintenance.clone()
    }

    pub fn setups(&self) -> Vec<SatelliteSetup> {
        self.state.lock().unwrap().setups.clone()
    }

    fn record(&self, label: String) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing.contains(&label) {
            return Err(ExternalError::ToolFailed {
                tool: "mock".into(),
                status: "exit status: 1".into(),
                stderr: format!("{} reverted", label),
            });
        }
        state.calls.push(label);
        Ok(())
    }

    fn allocate(&self) -> Address {
        let mut state = self.state.lock().unwrap();
        state.next_address = state.next_address.wrapping_add(1);
        Address::repeat_byte(state.next_address)
    }
}

#[async_trait]
impl FacetInspector for MockChain {
    async fn facets(&self, _chain: &ChainTarget, satellite: Address) -> Result<Vec<Facet>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .facets
            .get(&satellite)
            .cloned()
            .unwrap_or_default())
    }

    async fn code_hash(&self, _chain: &ChainTarget, address: Address) -> Result<B256> {
        self.state
            .lock()
            .unwrap()
            .code_hashes
            .get(&address)
            .copied()
            .ok_or_else(|| ExternalError::Lookup(address.to_string()))
    }
}

#[async_trait]
impl ContractNameResolver for MockChain {
    async fn contract_name(&self, _chain: &ChainTarget, address: Address) -> Result<String> {
        self.state
            .lock()
            .unwrap()
            .names
            .get(&address)
            .cloned()
            .ok_or_else(|| ExternalError::Lookup(address.to_string()))
    }
}

#[async_trait]
impl SatelliteTransactor for MockChain {
    async fn satellite_maintenance(
        &self,
        chain: &ChainTarget,
        _satellite: Address,
        actions: &[MaintenanceAction],
    ) -> Result<Option<B256>> {
        self.record(format!("maintenance@{}", chain.chain_id))?;
        self.state
            .lock()
            .unwrap()
            .maintenance
            .push(actions.to_vec());
        Ok(Some(B256::repeat_byte(0x77)))
    }

    async fn register_satellite(
        &self,
        chain: &ChainTarget,
        _satellite: Address,
        call: &RegisterSatelliteCall,
    ) -> Result<Option<B256>> {
        self.record(format!("register@{}:{}", chain.chain_id, call.remote_chain_id))?;
        Ok(None)
    }

    async fn remove_satellite(
        &self,
        chain: &ChainTarget,
        _satellite: Address,
        call: &RemoveSatelliteCall,
    ) -> Result<Option<B256>> {
        self.record(format!("remove@{}:{}", chain.chain_id, call.remote_chain_id))?;
        Ok(None)
    }
}

#[async_trait]
impl ModuleDeployer for MockChain {
    async fn deploy_modules(
        &self,
        chain: &ChainTarget,
        modules: &[String],
    ) -> Result<BTreeMap<String, Address>> {
        self.record(format!("deploy@{}:{}", chain.chain_id, modules.join(",")))?;
        Ok(modules
            .iter()
            .map(|name| (name.clone(), self.allocate()))
            .collect())
    }

    async fn deploy_satellite(&self, chain: &ChainTarget, setup: &SatelliteSetup) -> Result<Address> {
        self.record(format!("satellite@{}", chain.chain_id))?;
        self.state.lock().unwrap().setups.push(setup.clone());
        Ok(self.allocate())
    }
}
