//! Satellite deployment
//!
//! A new EVM satellite is deployed and wired in one deployer run: every
//! non-external module is registered with `Add`, external modules are deployed
//! alongside, then the configured init calls run. Starknet satellites are a
//! plain declare and deploy. The record is written only once the deployer
//! reported an address.

use tracing::info;

use crate::core::artifacts::{compiled_modules, ArtifactStore};
use crate::core::timeout::with_timeout;
use crate::error::{Result, SatError};
use crate::registry::ChainRegistry;
use crate::system::StarknetDeployer;
use satctl_core_interface::{FacetAction, ModuleDeployer, ModuleRegistration, SatelliteSetup};
use satctl_core_state::EnvironmentStore;

/// Everything the deployer needs for a fresh satellite on `chain_id`
pub fn build_setup(
    artifacts: &ArtifactStore,
    registry: &ChainRegistry,
    chain_id: &str,
    maintenance_module: &str,
) -> Result<SatelliteSetup> {
    let modules = compiled_modules(artifacts, registry, chain_id, maintenance_module)?;

    let registrations = modules
        .iter()
        .filter(|m| !m.is_external)
        .map(|m| ModuleRegistration {
            module: m.name.clone(),
            action: FacetAction::Add,
            function_selectors: m.function_selectors.clone(),
        })
        .collect();
    let external_modules = modules
        .iter()
        .filter(|m| m.is_external)
        .map(|m| m.name.clone())
        .collect();

    Ok(SatelliteSetup {
        chain_id: chain_id.to_string(),
        registrations,
        external_modules,
        init_calls: registry.init_invocations(chain_id)?,
    })
}

/// Deploys satellites and records them in the active environment
pub struct DeploymentOrchestrator<'a> {
    pub store: &'a EnvironmentStore,
    pub registry: &'a ChainRegistry,
    /// Build output; only EVM deployments read it
    pub artifacts: Option<&'a ArtifactStore>,
    pub deployer: &'a dyn ModuleDeployer,
    pub starknet: Option<&'a StarknetDeployer>,
    /// Constructor owner for Starknet satellites
    pub owner: Option<&'a str>,
    pub maintenance_module: &'a str,
    pub timeout_secs: u64,
}

impl DeploymentOrchestrator<'_> {
    /// Deploy the satellite of `chain_id` into `env`, returning its address
    pub async fn deploy_satellite(&self, env: &str, chain_id: &str) -> Result<String> {
        let state = self.store.load(env)?;
        if state.contains(chain_id) {
            return Err(SatError::invariant(format!(
                "a satellite is already deployed on chain {} in environment {}",
                chain_id, env
            )));
        }

        let chain = self.registry.chain(chain_id)?;
        let target = self.registry.target(chain_id)?;
        let operation = format!("satellite deployment on {}", chain_id);

        let address = if chain.family.is_receive_only() {
            let starknet = self.starknet.ok_or_else(|| {
                SatError::Config(format!("no Starknet toolchain configured for chain {}", chain_id))
            })?;
            let owner = self.owner.ok_or_else(|| {
                SatError::Config("`owner` is required to deploy Starknet satellites".into())
            })?;
            with_timeout(
                &operation,
                self.timeout_secs,
                starknet.deploy_satellite(&target, owner),
            )
            .await?
        } else {
            let artifacts = self.artifacts.ok_or_else(|| {
                SatError::Config(format!("build artifacts are required to deploy on chain {}", chain_id))
            })?;
            let setup = build_setup(artifacts, self.registry, chain_id, self.maintenance_module)?;
            info!(
                chain = chain_id,
                modules = setup.registrations.len(),
                external = setup.external_modules.len(),
                init_calls = setup.init_calls.len(),
                "deploying satellite"
            );
            with_timeout(
                &operation,
                self.timeout_secs,
                self.deployer.deploy_satellite(&target, &setup),
            )
            .await?
            .to_string()
        };

        self.store.update(env, |state| {
            if state.insert_satellite(chain_id, address.clone()) {
                Ok(())
            } else {
                Err(SatError::invariant(format!(
                    "satellite on chain {} was recorded while deploying",
                    chain_id
                )))
            }
        })?;
        info!(environment = env, chain = chain_id, address = %address, "satellite recorded");
        Ok(address)
    }
}
