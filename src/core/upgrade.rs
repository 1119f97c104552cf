//! Satellite upgrade
//!
//! An upgrade compares the facets live on a satellite with the current build,
//! lets a [`PlanPresenter`] choose the optional changes, deploys what is new,
//! and submits everything as one `satelliteMaintenance` transaction.
//!
//! Live facets are named through a [`ContractNameResolver`] and fingerprinted
//! by their code hash. Introspection runs with bounded parallelism.

use std::collections::BTreeMap;

use alloy_primitives::{Address, B256};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, error, info, warn};

use crate::core::artifacts::{compiled_modules, ArtifactStore};
use crate::core::connections::evm_address;
use crate::core::planner::{
    bind_addresses, compute_plan, DeployedModuleDescriptor, ModuleDescriptor, ModuleSelection,
    ReconciliationPlan,
};
use crate::core::presenter::PlanPresenter;
use crate::core::timeout::with_timeout;
use crate::config::TimeoutConfig;
use crate::error::{Result, SatError};
use crate::registry::ChainRegistry;
use satctl_core_interface::{
    ChainTarget, ContractNameResolver, Facet, FacetInspector, MaintenanceAction, ModuleDeployer,
    SatelliteTransactor,
};
use satctl_core_state::EnvironmentStore;

/// How an upgrade run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// The satellite already matches the build
    UpToDate,
    /// The operator aborted at plan review
    Aborted,
    /// The selection left nothing to submit
    NothingSelected,
    /// The operator declined the bound batch; `deployed` modules are orphaned
    Declined {
        deployed: BTreeMap<String, Address>,
    },
    Applied {
        selection: ModuleSelection,
        deployed: BTreeMap<String, Address>,
        actions: Vec<MaintenanceAction>,
        tx_hash: Option<B256>,
    },
}

/// Collaborators and limits of an upgrade run
pub struct UpgradeOrchestrator<'a> {
    pub store: &'a EnvironmentStore,
    pub registry: &'a ChainRegistry,
    pub artifacts: &'a ArtifactStore,
    pub inspector: &'a dyn FacetInspector,
    pub resolver: &'a dyn ContractNameResolver,
    pub deployer: &'a dyn ModuleDeployer,
    pub transactor: &'a dyn SatelliteTransactor,
    pub presenter: &'a dyn PlanPresenter,
    pub maintenance_module: &'a str,
    pub timeouts: &'a TimeoutConfig,
    pub max_concurrency: usize,
}

impl UpgradeOrchestrator<'_> {
    fn interface_of(&self, module: &str) -> String {
        self.registry
            .module(module)
            .map(|spec| spec.interface.clone())
            .unwrap_or_else(|_| format!("I{}", module))
    }

    async fn inspect_facet(&self, chain: &ChainTarget, facet: Facet) -> Result<DeployedModuleDescriptor> {
        let hash_operation = format!("code hash of {}", facet.address);
        let name_operation = format!("contract name of {}", facet.address);
        let code_hash = with_timeout(
            &hash_operation,
            self.timeouts.introspection(),
            self.inspector.code_hash(chain, facet.address),
        );
        let name = with_timeout(
            &name_operation,
            self.timeouts.explorer(),
            self.resolver.contract_name(chain, facet.address),
        );
        let (bytecode_hash, name) = futures::try_join!(code_hash, name)?;
        debug!(chain = %chain.chain_id, address = %facet.address, module = %name, "facet identified");

        Ok(DeployedModuleDescriptor {
            module: ModuleDescriptor {
                interface_name: self.interface_of(&name),
                name,
                function_selectors: facet.selectors,
                bytecode_hash,
                is_external: false,
            },
            address: facet.address,
        })
    }

    /// Modules currently routed by the satellite at `satellite`
    pub async fn deployed_modules(
        &self,
        chain: &ChainTarget,
        satellite: Address,
    ) -> Result<Vec<DeployedModuleDescriptor>> {
        let facets = with_timeout(
            &format!("facets of {} on {}", satellite, chain.chain_id),
            self.timeouts.introspection(),
            self.inspector.facets(chain, satellite),
        )
        .await?;
        info!(chain = %chain.chain_id, facets = facets.len(), "inspecting satellite facets");

        let mut deployed: Vec<DeployedModuleDescriptor> = stream::iter(facets)
            .map(|facet| self.inspect_facet(chain, facet))
            .buffer_unordered(self.max_concurrency.max(1))
            .try_collect()
            .await?;
        deployed.sort_by(|a, b| a.module.name.cmp(&b.module.name));

        let duplicates: Vec<String> = deployed
            .windows(2)
            .filter(|pair| pair[0].module.name == pair[1].module.name)
            .map(|pair| {
                format!(
                    "facets {} and {} both resolve to {}",
                    pair[0].address, pair[1].address, pair[0].module.name
                )
            })
            .collect();
        if !duplicates.is_empty() {
            return Err(SatError::InvariantViolation(duplicates));
        }
        Ok(deployed)
    }

    /// Plan the upgrade of the satellite on `chain_id` without applying it
    pub async fn plan(&self, env: &str, chain_id: &str) -> Result<(ChainTarget, Address, ReconciliationPlan)> {
        let chain = self.registry.chain(chain_id)?;
        if chain.family.is_receive_only() {
            return Err(SatError::invariant(format!(
                "{} satellites carry no facets to reconcile (chain {}); they are upgraded by class",
                chain.family, chain_id
            )));
        }

        let state = self.store.load(env)?;
        let record = state
            .satellite(chain_id)
            .ok_or_else(|| SatError::NotFound(format!("satellite on chain {} in environment {}", chain_id, env)))?;
        let satellite = evm_address(chain_id, &record.contract_address)?;
        let target = self.registry.target(chain_id)?;

        let compiled = compiled_modules(self.artifacts, self.registry, chain_id, self.maintenance_module)?;
        let deployed = self.deployed_modules(&target, satellite).await?;
        let plan = compute_plan(&deployed, &compiled)?;
        Ok((target, satellite, plan))
    }

    /// Review, deploy and apply the upgrade of the satellite on `chain_id`
    pub async fn upgrade(&self, env: &str, chain_id: &str) -> Result<UpgradeOutcome> {
        let (target, satellite, plan) = self.plan(env, chain_id).await?;
        if plan.is_noop() {
            info!(chain = chain_id, "satellite is up to date");
            return Ok(UpgradeOutcome::UpToDate);
        }

        let Some(selection) = self.presenter.present_plan(&plan)? else {
            info!(chain = chain_id, "upgrade aborted at plan review");
            return Ok(UpgradeOutcome::Aborted);
        };
        if plan.selected_changes(&selection).is_empty() {
            return Ok(UpgradeOutcome::NothingSelected);
        }

        let to_deploy = plan.modules_to_deploy(&selection);
        let deployed = if to_deploy.is_empty() {
            BTreeMap::new()
        } else {
            info!(chain = chain_id, modules = ?to_deploy, "deploying modules");
            with_timeout(
                &format!("module deployment on {}", chain_id),
                self.timeouts.deployment(),
                self.deployer.deploy_modules(&target, &to_deploy),
            )
            .await?
        };

        let actions = bind_addresses(&plan, &selection, &deployed)?;
        if !self.presenter.confirm_batch(&actions)? {
            warn!(chain = chain_id, deployed = ?deployed, "maintenance batch declined; deployed modules are not wired");
            return Ok(UpgradeOutcome::Declined { deployed });
        }

        let tx_hash = with_timeout(
            &format!("satelliteMaintenance on {}", chain_id),
            self.timeouts.transaction(),
            self.transactor.satellite_maintenance(&target, satellite, &actions),
        )
        .await
        .inspect_err(|e| {
            error!(chain = chain_id, deployed = ?deployed, error = %e, "satelliteMaintenance failed");
        })?;

        info!(chain = chain_id, actions = actions.len(), tx_hash = ?tx_hash, "satellite upgraded");
        Ok(UpgradeOutcome::Applied {
            selection,
            deployed,
            actions,
            tx_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::presenter::{AutoPolicy, AutoPresenter};
    use crate::registry::{ChainFamily, ChainFeatures, ChainSettings, ModuleSpec};
    use crate::system::MockChain;
    use alloy_primitives::keccak256;
    use satctl_core_interface::{FacetAction, Selector};
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const SATELLITE: Address = Address::repeat_byte(0x5a);

    fn function(name: &str) -> serde_json::Value {
        json!({ "type": "function", "name": name, "inputs": [] })
    }

    fn write_module(root: &Path, name: &str, code: &str, functions: &[&str]) {
        let abi: Vec<_> = functions.iter().map(|f| function(f)).collect();
        fs::write(
            root.join(format!("{}.json", name)),
            json!({ "abi": [], "deployedBytecode": code }).to_string(),
        )
        .unwrap();
        fs::write(
            root.join(format!("I{}.json", name)),
            json!({ "abi": abi }).to_string(),
        )
        .unwrap();
    }

    fn code_hash(code: &str) -> B256 {
        keccak256(hex::decode(code.trim_start_matches("0x")).unwrap())
    }

    fn selectors(functions: &[&str]) -> Vec<Selector> {
        functions
            .iter()
            .map(|f| Selector::from_signature(&format!("{}()", f)))
            .collect()
    }

    fn registry(modules: &[&str]) -> ChainRegistry {
        let specs = modules
            .iter()
            .map(|m| {
                (
                    m.to_string(),
                    ModuleSpec {
                        interface: format!("I{}", m),
                        external: false,
                        requires: vec![],
                        init: vec![],
                    },
                )
            })
            .collect();
        let chains = BTreeMap::from([(
            "11155111".to_string(),
            ChainSettings {
                network: "sepolia".into(),
                family: ChainFamily::Evm,
                rpc_url: None,
                explorer_chain_id: None,
                modules: modules.iter().map(|m| m.to_string()).collect(),
                features: ChainFeatures::default(),
                connections: vec![],
            },
        )]);
        ChainRegistry::new(chains, specs).unwrap()
    }

    struct Fixture {
        _dir: TempDir,
        store: EnvironmentStore,
        artifacts: ArtifactStore,
        registry: ChainRegistry,
        chain: MockChain,
        timeouts: TimeoutConfig,
    }

    /// Build `SatelliteMaintenanceModule` plus `Alpha` (`a`, `b`) and `Beta` (`c`).
    /// Live: maintenance unchanged, `Alpha` with old code routing `a` and `c`.
    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("artifacts");
        fs::create_dir_all(&root).unwrap();
        write_module(&root, "SatelliteMaintenanceModule", "0x01", &["satelliteMaintenance"]);
        write_module(&root, "Alpha", "0x0a02", &["a", "b"]);
        write_module(&root, "Beta", "0x0b01", &["c"]);

        let store = EnvironmentStore::new(dir.path().join("deployments"));
        store.create("dev").unwrap();
        store
            .update(
                "dev",
                |state| -> std::result::Result<(), satctl_core_state::Error> {
                    state.insert_satellite("11155111", SATELLITE.to_string());
                    Ok(())
                },
            )
            .unwrap();

        let chain = MockChain::new();
        chain.add_facet(
            SATELLITE,
            Facet {
                address: Address::repeat_byte(0x01),
                selectors: selectors(&["satelliteMaintenance"]),
            },
            "SatelliteMaintenanceModule",
            code_hash("0x01"),
        );
        chain.add_facet(
            SATELLITE,
            Facet {
                address: Address::repeat_byte(0x0a),
                selectors: selectors(&["a", "c"]),
            },
            "Alpha",
            code_hash("0x0a01"),
        );

        Fixture {
            artifacts: ArtifactStore::open(&root).unwrap(),
            registry: registry(&["Alpha", "Beta"]),
            _dir: dir,
            store,
            chain,
            timeouts: TimeoutConfig::default(),
        }
    }

    fn orchestrator<'a>(f: &'a Fixture, presenter: &'a dyn PlanPresenter) -> UpgradeOrchestrator<'a> {
        UpgradeOrchestrator {
            store: &f.store,
            registry: &f.registry,
            artifacts: &f.artifacts,
            inspector: &f.chain,
            resolver: &f.chain,
            deployer: &f.chain,
            transactor: &f.chain,
            presenter,
            maintenance_module: "SatelliteMaintenanceModule",
            timeouts: &f.timeouts,
            max_concurrency: 2,
        }
    }

    #[tokio::test]
    async fn test_plan_from_live_facets() {
        let f = fixture();
        let presenter = AutoPresenter::default();
        let (_, satellite, plan) = orchestrator(&f, &presenter)
            .plan("dev", "11155111")
            .await
            .unwrap();

        assert_eq!(satellite, SATELLITE);
        assert!(plan.added.contains("Beta"));
        assert!(plan.preserved.contains("SatelliteMaintenanceModule"));
        // `c` leaves Alpha, so Alpha is an optional update and Beta is mandatory
        assert!(plan.switchable().contains("Alpha"));
        assert!(plan.mandatory().contains("Beta"));
        assert_eq!(plan.moved_selectors.len(), 1);
    }

    #[tokio::test]
    async fn test_upgrade_applies_one_batch() {
        crate::logging::init_test_logging();
        let f = fixture();
        let presenter = AutoPresenter::new(AutoPolicy::All);
        let outcome = orchestrator(&f, &presenter)
            .upgrade("dev", "11155111")
            .await
            .unwrap();

        let UpgradeOutcome::Applied { deployed, actions, tx_hash, .. } = outcome else {
            panic!("expected an applied upgrade");
        };
        assert_eq!(deployed.len(), 2);
        assert!(tx_hash.is_some());
        assert_eq!(f.chain.maintenance_batches(), vec![actions.clone()]);

        // Moved `c` first, then the Alpha update, then the new `b`
        let kinds: Vec<FacetAction> = actions.iter().map(|a| a.action).collect();
        assert_eq!(
            kinds,
            vec![FacetAction::Replace, FacetAction::Replace, FacetAction::Add]
        );
        assert_eq!(actions[0].module_address, deployed["Beta"]);
        assert_eq!(actions[0].function_selectors, selectors(&["c"]));
        assert_eq!(actions[1].module_address, deployed["Alpha"]);
        assert_eq!(actions[2].function_selectors, selectors(&["b"]));
    }

    #[tokio::test]
    async fn test_mandatory_only_skips_optional_update() {
        let f = fixture();
        let presenter = AutoPresenter::new(AutoPolicy::MandatoryOnly);
        let outcome = orchestrator(&f, &presenter)
            .upgrade("dev", "11155111")
            .await
            .unwrap();

        let UpgradeOutcome::Applied { deployed, actions, .. } = outcome else {
            panic!("expected an applied upgrade");
        };
        assert_eq!(deployed.keys().collect::<Vec<_>>(), vec!["Beta"]);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action, FacetAction::Replace);
    }

    #[tokio::test]
    async fn test_failed_maintenance_is_reported() {
        let f = fixture();
        f.chain.fail("maintenance@11155111");
        let presenter = AutoPresenter::default();
        let err = orchestrator(&f, &presenter)
            .upgrade("dev", "11155111")
            .await
            .unwrap_err();
        assert!(matches!(err, SatError::ExternalToolFailure(_)));
        assert!(f.chain.maintenance_batches().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_facet_names_rejected() {
        let f = fixture();
        f.chain.add_facet(
            SATELLITE,
            Facet {
                address: Address::repeat_byte(0x0c),
                selectors: selectors(&["z"]),
            },
            "Alpha",
            code_hash("0x0a01"),
        );
        let presenter = AutoPresenter::default();
        let err = orchestrator(&f, &presenter)
            .upgrade("dev", "11155111")
            .await
            .unwrap_err();
        assert!(matches!(err, SatError::InvariantViolation(_)));
    }

    #[tokio::test]
    async fn test_missing_satellite() {
        let f = fixture();
        f.store.create("empty").unwrap();
        let presenter = AutoPresenter::default();
        let err = orchestrator(&f, &presenter)
            .upgrade("empty", "11155111")
            .await
            .unwrap_err();
        assert!(matches!(err, SatError::NotFound(_)));
    }
}
