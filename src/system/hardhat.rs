//! EVM toolchain adapter
//!
//! Drives Hardhat scripts and Ignition modules through a [`ToolRunner`].
//! Scripts receive their input through `CONTRACT_ADDRESS` and `ARGS` (JSON)
//! and report results on stdout:
//!
//! - transactions print `Tx: 0x<hash>` once mined
//! - the facets script prints the loupe output as a JSON array
//! - the code hash script prints `CodeHash: 0x<hash>`
//! - Ignition prints one `<Deployment>#<Contract> - 0x<address>` line per contract

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::LazyLock;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{HardhatScripts, ToolCommand};
use crate::system::toolchain::{ToolOutput, ToolRunner};
use satctl_core_interface::{
    ChainTarget, ExternalError, Facet, FacetInspector, MaintenanceAction, ModuleDeployer,
    RegisterSatelliteCall, RemoveSatelliteCall, Result, SatelliteSetup, SatelliteTransactor,
};

static TX_HASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Tx:\s*(0x[0-9a-fA-F]{64})").unwrap());
static CODE_HASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CodeHash:\s*(0x[0-9a-fA-F]{64})").unwrap());
static DEPLOYED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\w+#(\w+)\s+-\s+(0x[0-9a-fA-F]{40})\s*$").unwrap());

/// Contract name Ignition reports for the satellite diamond
pub const SATELLITE_CONTRACT: &str = "Satellite";

/// Transaction hash from script output, if one was printed
pub fn parse_tx_hash(output: &str) -> Option<B256> {
    TX_HASH
        .captures(output)
        .and_then(|c| B256::from_str(&c[1]).ok())
}

/// `contract -> address` for every Ignition result line
pub fn parse_deployments(output: &str) -> BTreeMap<String, Address> {
    DEPLOYED
        .captures_iter(output)
        .filter_map(|c| Some((c[1].to_string(), Address::from_str(&c[2]).ok()?)))
        .collect()
}

/// Loupe facets from the last JSON array printed
pub fn parse_facets(output: &str) -> std::result::Result<Vec<Facet>, String> {
    let line = output
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| l.starts_with('['))
        .ok_or_else(|| "no facet list in output".to_string())?;
    serde_json::from_str(line).map_err(|e| e.to_string())
}

/// Hardhat-based implementation of every chain collaborator
#[derive(Debug, Clone)]
pub struct HardhatToolchain {
    runner: ToolRunner,
    scripts: HardhatScripts,
}

impl HardhatToolchain {
    pub fn new(command: ToolCommand, scripts: HardhatScripts) -> Self {
        Self {
            runner: ToolRunner::new(command),
            scripts,
        }
    }

    /// Program the toolchain runs
    pub fn program(&self) -> &str {
        &self.runner.command().program
    }

    fn base_env(chain: &ChainTarget) -> Vec<(String, String)> {
        let mut env = vec![("SATCTL_CHAIN_ID".to_string(), chain.chain_id.clone())];
        if let Some(rpc) = &chain.rpc_url {
            env.push(("RPC_URL".to_string(), rpc.clone()));
        }
        env
    }

    async fn run_script<A: Serialize>(
        &self,
        script: &str,
        chain: &ChainTarget,
        contract: Address,
        args: &A,
    ) -> Result<ToolOutput> {
        let mut env = Self::base_env(chain);
        env.push(("CONTRACT_ADDRESS".to_string(), contract.to_string()));
        env.push((
            "ARGS".to_string(),
            serde_json::to_string(args).map_err(|e| ExternalError::Unparseable {
                tool: script.to_string(),
                detail: e.to_string(),
            })?,
        ));
        let argv = vec![
            "run".to_string(),
            script.to_string(),
            "--network".to_string(),
            chain.network.clone(),
        ];
        self.runner.run(&argv, &env).await
    }

    async fn transact<A: Serialize>(
        &self,
        script: &str,
        chain: &ChainTarget,
        satellite: Address,
        args: &A,
    ) -> Result<Option<B256>> {
        let output = self.run_script(script, chain, satellite, args).await?;
        let hash = parse_tx_hash(&output.stdout);
        info!(chain = %chain.chain_id, script, tx_hash = ?hash, "transaction mined");
        Ok(hash)
    }

    async fn ignition(
        &self,
        module: &str,
        chain: &ChainTarget,
        extra_env: Vec<(String, String)>,
    ) -> Result<BTreeMap<String, Address>> {
        let mut env = Self::base_env(chain);
        env.extend(extra_env);
        let argv = vec![
            "ignition".to_string(),
            "deploy".to_string(),
            module.to_string(),
            "--network".to_string(),
            chain.network.clone(),
        ];
        let output = self.runner.run(&argv, &env).await?;
        let deployed = parse_deployments(&output.stdout);
        debug!(chain = %chain.chain_id, module, contracts = deployed.len(), "ignition finished");
        Ok(deployed)
    }
}

#[async_trait]
impl SatelliteTransactor for HardhatToolchain {
    async fn satellite_maintenance(
        &self,
        chain: &ChainTarget,
        satellite: Address,
        actions: &[MaintenanceAction],
    ) -> Result<Option<B256>> {
        let script = self.scripts.maintenance.clone();
        self.transact(&script, chain, satellite, &actions).await
    }

    async fn register_satellite(
        &self,
        chain: &ChainTarget,
        satellite: Address,
        call: &RegisterSatelliteCall,
    ) -> Result<Option<B256>> {
        let script = self.scripts.register_satellite.clone();
        self.transact(&script, chain, satellite, &call.args()).await
    }

    async fn remove_satellite(
        &self,
        chain: &ChainTarget,
        satellite: Address,
        call: &RemoveSatelliteCall,
    ) -> Result<Option<B256>> {
        let script = self.scripts.remove_satellite.clone();
        self.transact(&script, chain, satellite, &call.args()).await
    }
}

#[async_trait]
impl FacetInspector for HardhatToolchain {
    async fn facets(&self, chain: &ChainTarget, satellite: Address) -> Result<Vec<Facet>> {
        let output = self
            .run_script(&self.scripts.facets, chain, satellite, &())
            .await?;
        parse_facets(&output.stdout).map_err(|detail| ExternalError::Unparseable {
            tool: self.scripts.facets.clone(),
            detail,
        })
    }

    async fn code_hash(&self, chain: &ChainTarget, address: Address) -> Result<B256> {
        let output = self
            .run_script(&self.scripts.code_hash, chain, address, &())
            .await?;
        CODE_HASH
            .captures(&output.stdout)
            .and_then(|c| B256::from_str(&c[1]).ok())
            .ok_or_else(|| ExternalError::Unparseable {
                tool: self.scripts.code_hash.clone(),
                detail: format!("no code hash for {}", address),
            })
    }
}

#[async_trait]
impl ModuleDeployer for HardhatToolchain {
    async fn deploy_modules(
        &self,
        chain: &ChainTarget,
        modules: &[String],
    ) -> Result<BTreeMap<String, Address>> {
        if modules.is_empty() {
            return Ok(BTreeMap::new());
        }
        let deployed = self
            .ignition(
                &self.scripts.upgrade_module,
                chain,
                vec![("MODULES".to_string(), modules.join(","))],
            )
            .await?;
        // Only the requested modules; Ignition may also print library deployments
        Ok(deployed
            .into_iter()
            .filter(|(name, _)| modules.contains(name))
            .collect())
    }

    async fn deploy_satellite(&self, chain: &ChainTarget, setup: &SatelliteSetup) -> Result<Address> {
        let setup_json = serde_json::to_string(setup).map_err(|e| ExternalError::Unparseable {
            tool: self.scripts.satellite_module.clone(),
            detail: e.to_string(),
        })?;
        let deployed = self
            .ignition(
                &self.scripts.satellite_module,
                chain,
                vec![("SATELLITE_SETUP".to_string(), setup_json)],
            )
            .await?;
        deployed
            .get(SATELLITE_CONTRACT)
            .copied()
            .ok_or_else(|| ExternalError::Unparseable {
                tool: self.scripts.satellite_module.clone(),
                detail: format!("no {} address in deployment output", SATELLITE_CONTRACT),
            })
    }
}
