//! Command implementations behind the CLI
//!
//! Every command runs against a [`Context`] built once from the loaded
//! configuration, and records state changes in the audit log.

pub mod connection;
pub mod environment;
pub mod satellite;
pub mod selectors;

use std::collections::BTreeMap;

use tracing::error;

use crate::audit::{AuditEvent, AuditLogger};
use crate::config::SatConfig;
use crate::core::artifacts::ArtifactStore;
use crate::error::{Result, SatError};
use crate::registry::ChainRegistry;
use crate::system::{ExplorerResolver, FamilyRouter, StarknetDeployer};
use satctl_core_state::EnvironmentStore;

/// Loaded configuration plus the stores every command works with
pub struct Context {
    pub config: SatConfig,
    pub registry: ChainRegistry,
    pub store: EnvironmentStore,
    pub audit: AuditLogger,
}

impl Context {
    pub fn new(config: SatConfig) -> Result<Self> {
        let registry = config.registry()?;
        let store = EnvironmentStore::new(&config.deployments_dir);
        let audit = AuditLogger::new(config.audit_log.as_deref())?;
        Ok(Self {
            config,
            registry,
            store,
            audit,
        })
    }

    /// Record `outcome` and pass it through. A command error wins over an
    /// audit write error.
    pub fn audited<T>(&self, event: AuditEvent, outcome: Result<T>) -> Result<T> {
        let recorded = self.audit.emit_result(event, &outcome);
        match (outcome, recorded) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(audit)) => {
                error!(error = %audit, "failed to record audit event");
                Err(e)
            }
        }
    }

    pub fn active_environment(&self) -> Result<String> {
        Ok(self.store.require_active()?)
    }

    pub fn artifacts(&self) -> Result<ArtifactStore> {
        ArtifactStore::open(&self.config.artifacts.dir)
    }

    pub fn evm(&self) -> Result<FamilyRouter> {
        FamilyRouter::from_config(&self.config, &self.registry)
    }

    pub fn starknet(&self) -> StarknetDeployer {
        StarknetDeployer::new(
            self.config.toolchain.starknet.clone(),
            self.config.toolchain.starknet_contract.clone(),
        )
    }

    /// Explorer client keyed from the configured environment variable
    pub fn explorer(&self) -> Result<ExplorerResolver> {
        let settings = &self.config.explorer;
        let api_key = std::env::var(&settings.api_key_env).map_err(|_| {
            SatError::Config(format!(
                "explorer API key missing: set {}",
                settings.api_key_env
            ))
        })?;

        let mut explorer_ids = BTreeMap::new();
        for id in self.registry.chain_ids() {
            if let Some(explorer_id) = &self.registry.chain(id)?.explorer_chain_id {
                explorer_ids.insert(id.to_string(), explorer_id.clone());
            }
        }
        Ok(ExplorerResolver::new(
            settings.api_url.clone(),
            api_key,
            settings.requests_per_second,
            explorer_ids,
        ))
    }
}
