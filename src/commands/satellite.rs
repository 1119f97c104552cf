//! `satctl satellite`: deploy, remove, upgrade and list satellites

use satctl_core_interface::ModuleDeployer;

use super::Context;
use crate::audit::AuditStatus;
use crate::cli_style::{print_info, print_success, print_warning, satellites_table, section_header};
use crate::core::artifacts::ArtifactStore;
use crate::core::connections::ConnectionManager;
use crate::core::deploy::DeploymentOrchestrator;
use crate::core::presenter::{AutoPolicy, AutoPresenter, InteractivePresenter, PlanPresenter};
use crate::core::timeout::with_timeout;
use crate::core::upgrade::{UpgradeOrchestrator, UpgradeOutcome};
use crate::error::{Result, SatError};
use crate::system::StarknetDeployer;

/// Deploy with explicit collaborators
pub async fn deploy_with(
    ctx: &Context,
    chain_input: &str,
    artifacts: Option<&ArtifactStore>,
    deployer: &dyn ModuleDeployer,
    starknet: Option<&StarknetDeployer>,
) -> Result<String> {
    let chain_id = ctx.registry.parse_chain_id(chain_input)?;
    let env = ctx.active_environment()?;
    let event = ctx
        .audit
        .event("satellite.deploy", AuditStatus::Success)
        .with_environment(&env)
        .with_chain(&chain_id);

    let orchestrator = DeploymentOrchestrator {
        store: &ctx.store,
        registry: &ctx.registry,
        artifacts,
        deployer,
        starknet,
        owner: ctx.config.owner.as_deref(),
        maintenance_module: &ctx.config.artifacts.maintenance_module,
        timeout_secs: ctx.config.timeouts.deployment(),
    };
    let outcome = orchestrator.deploy_satellite(&env, &chain_id).await;
    let event = match &outcome {
        Ok(address) => event.with_address(address),
        Err(_) => event,
    };
    ctx.audited(event, outcome)
}

pub async fn deploy(ctx: &Context, chain_input: &str) -> Result<()> {
    let chain_id = ctx.registry.parse_chain_id(chain_input)?;
    let artifacts = if ctx.registry.chain(&chain_id)?.family.is_receive_only() {
        None
    } else {
        Some(ctx.artifacts()?)
    };
    let starknet = ctx.starknet();
    let address = deploy_with(ctx, &chain_id, artifacts.as_ref(), &ctx.evm()?, Some(&starknet)).await?;
    print_success(&format!("Satellite on chain {} deployed at {}", chain_id, address));
    Ok(())
}

/// Forget the satellite on a chain; refused while any edge touches it
pub fn remove(ctx: &Context, chain_input: &str) -> Result<()> {
    let chain_id = ctx.registry.parse_chain_id(chain_input)?;
    let env = ctx.active_environment()?;
    let event = ctx
        .audit
        .event("satellite.remove", AuditStatus::Success)
        .with_environment(&env)
        .with_chain(&chain_id);

    let router = ctx.evm()?;
    let manager = ConnectionManager::new(
        &ctx.store,
        &ctx.registry,
        &router,
        ctx.config.timeouts.transaction(),
    );
    ctx.audited(event, manager.remove_satellite(&env, &chain_id))?;
    print_success(&format!("Satellite on chain {} removed from {}", chain_id, env));
    Ok(())
}

/// Upgrade with explicit collaborators
pub async fn upgrade_with(
    ctx: &Context,
    chain_input: &str,
    orchestrator: &UpgradeOrchestrator<'_>,
) -> Result<UpgradeOutcome> {
    let chain_id = ctx.registry.parse_chain_id(chain_input)?;
    let env = ctx.active_environment()?;
    let event = ctx
        .audit
        .event("satellite.upgrade", AuditStatus::Success)
        .with_environment(&env)
        .with_chain(&chain_id);

    let outcome = orchestrator.upgrade(&env, &chain_id).await;
    let event = match &outcome {
        Ok(UpgradeOutcome::Applied {
            selection, tx_hash, ..
        }) => {
            let event = event.with_modules(selection.modules());
            match tx_hash {
                Some(hash) => event.with_tx_hash(&hash.to_string()),
                None => event,
            }
        }
        Ok(UpgradeOutcome::Declined { deployed }) => {
            let mut event = event.with_modules(deployed.keys());
            event.status = AuditStatus::Partial;
            event
        }
        _ => event,
    };
    ctx.audited(event, outcome)
}

/// Move a Starknet satellite to the current class with an explicit `sncast`
pub async fn upgrade_starknet_with(
    ctx: &Context,
    chain_input: &str,
    starknet: &StarknetDeployer,
) -> Result<String> {
    let chain_id = ctx.registry.parse_chain_id(chain_input)?;
    let env = ctx.active_environment()?;
    let event = ctx
        .audit
        .event("satellite.upgrade", AuditStatus::Success)
        .with_environment(&env)
        .with_chain(&chain_id);

    let outcome = async {
        let state = ctx.store.load(&env)?;
        let satellite = state
            .satellite(&chain_id)
            .map(|s| s.contract_address.clone())
            .ok_or_else(|| {
                SatError::NotFound(format!("satellite on chain {} in environment {}", chain_id, env))
            })?;
        let target = ctx.registry.target(&chain_id)?;
        let operation = format!("upgrade of satellite on {}", chain_id);
        with_timeout(
            &operation,
            ctx.config.timeouts.deployment(),
            starknet.upgrade_satellite(&target, &satellite),
        )
        .await
    }
    .await;
    ctx.audited(event, outcome)
}

pub async fn upgrade(ctx: &Context, chain_input: &str, yes: bool) -> Result<()> {
    let chain_id = ctx.registry.parse_chain_id(chain_input)?;
    if ctx.registry.chain(&chain_id)?.family.is_receive_only() {
        let class_hash = upgrade_starknet_with(ctx, &chain_id, &ctx.starknet()).await?;
        print_success(&format!("Satellite on chain {} upgraded to class {}", chain_id, class_hash));
        return Ok(());
    }

    let artifacts = ctx.artifacts()?;
    let router = ctx.evm()?;
    let explorer = ctx.explorer()?;
    let presenter: Box<dyn PlanPresenter> = if yes {
        Box::new(AutoPresenter::new(AutoPolicy::All))
    } else {
        Box::new(InteractivePresenter)
    };

    let orchestrator = UpgradeOrchestrator {
        store: &ctx.store,
        registry: &ctx.registry,
        artifacts: &artifacts,
        inspector: &router,
        resolver: &explorer,
        deployer: &router,
        transactor: &router,
        presenter: presenter.as_ref(),
        maintenance_module: &ctx.config.artifacts.maintenance_module,
        timeouts: &ctx.config.timeouts,
        max_concurrency: ctx.config.introspection.max_concurrency,
    };

    match upgrade_with(ctx, chain_input, &orchestrator).await? {
        UpgradeOutcome::UpToDate => print_info("Satellite already matches the build"),
        UpgradeOutcome::Aborted => print_info("Upgrade aborted"),
        UpgradeOutcome::NothingSelected => print_info("Nothing selected, no transaction sent"),
        UpgradeOutcome::Declined { deployed } => {
            let names: Vec<&str> = deployed.keys().map(String::as_str).collect();
            print_warning(&format!(
                "Batch declined. Deployed but unwired: {}",
                if names.is_empty() { "-".to_string() } else { names.join(", ") }
            ));
        }
        UpgradeOutcome::Applied { actions, tx_hash, .. } => {
            let tx = tx_hash.map(|h| h.to_string()).unwrap_or_else(|| "-".into());
            print_success(&format!(
                "Satellite upgraded with {} maintenance actions (tx {})",
                actions.len(),
                tx
            ));
        }
    }
    Ok(())
}

/// Satellites of the active environment
pub fn list(ctx: &Context) -> Result<()> {
    let env = ctx.active_environment()?;
    let state = ctx.store.load(&env)?;
    let rows: Vec<(String, String, Vec<String>)> = state
        .satellites
        .iter()
        .map(|(chain, record)| (chain.clone(), record.contract_address.clone(), record.outgoing()))
        .collect();

    section_header(&format!("Satellites in {}", env));
    if rows.is_empty() {
        print_info("No satellites deployed");
    } else {
        println!("{}", satellites_table(&rows));
    }
    Ok(())
}
