//! `satctl connection`: register, remove and list messaging edges

use satctl_core_interface::SatelliteTransactor;

use super::Context;
use crate::audit::AuditStatus;
use crate::cli_style::{connections_table, print_error, print_info, print_success, section_header};
use crate::core::connections::ConnectionManager;
use crate::error::{Result, SatError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Register,
    Remove,
}

async fn apply(
    ctx: &Context,
    change: Change,
    from_input: &str,
    to_input: &str,
    transactor: &dyn SatelliteTransactor,
) -> Result<()> {
    let from = ctx.registry.parse_chain_id(from_input)?;
    let to = ctx.registry.parse_chain_id(to_input)?;
    let env = ctx.active_environment()?;
    let action = match change {
        Change::Register => "connection.register",
        Change::Remove => "connection.remove",
    };
    let event = ctx
        .audit
        .event(action, AuditStatus::Success)
        .with_environment(&env)
        .with_chain(&from)
        .with_remote_chain(&to);

    let manager = ConnectionManager::new(
        &ctx.store,
        &ctx.registry,
        transactor,
        ctx.config.timeouts.transaction(),
    );
    let outcome = match change {
        Change::Register => manager.register_connection(&env, &from, &to).await,
        Change::Remove => manager.remove_connection(&env, &from, &to).await,
    };
    if let Err(SatError::PartialConnection { completed, failed, .. }) = &outcome {
        print_error(
            &format!("{} -> {} is half-applied: {} succeeded, {} failed", from, to, completed, failed),
            Some("the environment was not updated; repair the receiving side before retrying"),
        );
    }
    ctx.audited(event, outcome)
}

/// Register with an explicit transactor
pub async fn register_with(
    ctx: &Context,
    from: &str,
    to: &str,
    transactor: &dyn SatelliteTransactor,
) -> Result<()> {
    apply(ctx, Change::Register, from, to, transactor).await
}

/// Remove with an explicit transactor
pub async fn remove_with(
    ctx: &Context,
    from: &str,
    to: &str,
    transactor: &dyn SatelliteTransactor,
) -> Result<()> {
    apply(ctx, Change::Remove, from, to, transactor).await
}

pub async fn register(ctx: &Context, from: &str, to: &str) -> Result<()> {
    register_with(ctx, from, to, &ctx.evm()?).await?;
    print_success(&format!("Connection {} -> {} registered", from, to));
    Ok(())
}

pub async fn remove(ctx: &Context, from: &str, to: &str) -> Result<()> {
    remove_with(ctx, from, to, &ctx.evm()?).await?;
    print_success(&format!("Connection {} -> {} removed", from, to));
    Ok(())
}

/// Every edge of the active environment
pub fn list(ctx: &Context) -> Result<()> {
    let env = ctx.active_environment()?;
    let state = ctx.store.load(&env)?;
    let edges = state.edges();

    section_header(&format!("Connections in {}", env));
    if edges.is_empty() {
        print_info("No connections registered");
    } else {
        println!("{}", connections_table(&edges));
    }
    Ok(())
}
