//! Per-family dispatch of EVM collaborators
//!
//! zkSync chains deploy and transact through their own toolchain; every other
//! EVM chain uses the default one. Callers see a single collaborator.

use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::{Address, B256};
use async_trait::async_trait;

use crate::config::SatConfig;
use crate::registry::{ChainFamily, ChainRegistry};
use crate::system::hardhat::HardhatToolchain;
use satctl_core_interface::{
    ChainTarget, Facet, FacetInspector, MaintenanceAction, ModuleDeployer, RegisterSatelliteCall,
    RemoveSatelliteCall, Result, SatelliteSetup, SatelliteTransactor,
};

#[derive(Debug, Clone)]
pub struct FamilyRouter {
    evm: HardhatToolchain,
    zksync: HardhatToolchain,
    zksync_chains: BTreeSet<String>,
}

impl FamilyRouter {
    pub fn new(evm: HardhatToolchain, zksync: HardhatToolchain, zksync_chains: BTreeSet<String>) -> Self {
        Self {
            evm,
            zksync,
            zksync_chains,
        }
    }

    /// Router over the toolchains configured in `config`
    pub fn from_config(config: &SatConfig, registry: &ChainRegistry) -> crate::error::Result<Self> {
        let scripts = config.toolchain.scripts.clone();
        let mut zksync_chains = BTreeSet::new();
        for id in registry.chain_ids() {
            if registry.chain(id)?.family == ChainFamily::Zksync {
                zksync_chains.insert(id.to_string());
            }
        }
        Ok(Self::new(
            HardhatToolchain::new(config.evm_tool_for(false).clone(), scripts.clone()),
            HardhatToolchain::new(config.evm_tool_for(true).clone(), scripts),
            zksync_chains,
        ))
    }

    fn pick(&self, chain: &ChainTarget) -> &HardhatToolchain {
        if self.zksync_chains.contains(&chain.chain_id) {
            &self.zksync
        } else {
            &self.evm
        }
    }
}

#[async_trait]
impl FacetInspector for FamilyRouter {
    async fn facets(&self, chain: &ChainTarget, satellite: Address) -> Result<Vec<Facet>> {
        self.pick(chain).facets(chain, satellite).await
    }

    async fn code_hash(&self, chain: &ChainTarget, address: Address) -> Result<B256> {
        self.pick(chain).code_hash(chain, address).await
    }
}

#[async_trait]
impl SatelliteTransactor for FamilyRouter {
    async fn satellite_maintenance(
        &self,
        chain: &ChainTarget,
        satellite: Address,
        actions: &[MaintenanceAction],
    ) -> Result<Option<B256>> {
        self.pick(chain)
            .satellite_maintenance(chain, satellite, actions)
            .await
    }

    async fn register_satellite(
        &self,
        chain: &ChainTarget,
        satellite: Address,
        call: &RegisterSatelliteCall,
    ) -> Result<Option<B256>> {
        self.pick(chain).register_satellite(chain, satellite, call).await
    }

    async fn remove_satellite(
        &self,
        chain: &ChainTarget,
        satellite: Address,
        call: &RemoveSatelliteCall,
    ) -> Result<Option<B256>> {
        self.pick(chain).remove_satellite(chain, satellite, call).await
    }
}

#[async_trait]
impl ModuleDeployer for FamilyRouter {
    async fn deploy_modules(
        &self,
        chain: &ChainTarget,
        modules: &[String],
    ) -> Result<BTreeMap<String, Address>> {
        self.pick(chain).deploy_modules(chain, modules).await
    }

    async fn deploy_satellite(&self, chain: &ChainTarget, setup: &SatelliteSetup) -> Result<Address> {
        self.pick(chain).deploy_satellite(chain, setup).await
    }
}
