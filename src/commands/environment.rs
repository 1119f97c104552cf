//! `satctl env`: named deployment contexts
//!
//! Exactly one environment is active at a time and every satellite and
//! connection command acts on it. Activation changes are audited.

use tracing::info;

use super::Context;
use crate::audit::AuditStatus;
use crate::cli_style::{environments_table, print_info, print_success, section_header};
use crate::error::{Result, SatError};

pub fn list(ctx: &Context) -> Result<()> {
    let names = ctx.store.list_environments()?;
    let active = ctx.store.active()?;

    section_header("Environments");
    if names.is_empty() {
        print_info("No environments yet. Create one with `satctl env create <name>`.");
        return Ok(());
    }
    println!("{}", environments_table(&names, active.as_deref()));
    Ok(())
}

/// Create an empty environment and make it active
pub fn create(ctx: &Context, name: &str) -> Result<()> {
    let event = ctx
        .audit
        .event("env.create", AuditStatus::Success)
        .with_environment(name);
    let outcome = ctx
        .store
        .create(name)
        .and_then(|()| ctx.store.set_active(Some(name)))
        .map_err(SatError::from);
    ctx.audited(event, outcome)?;

    info!(environment = name, "environment created and activated");
    print_success(&format!("Environment {} created and active", name));
    Ok(())
}

/// Switch the active environment to `name`
pub fn change(ctx: &Context, name: &str) -> Result<()> {
    let event = ctx
        .audit
        .event("env.change", AuditStatus::Success)
        .with_environment(name);
    let outcome = activate(ctx, name);
    ctx.audited(event, outcome)?;

    print_success(&format!("Active environment is now {}", name));
    Ok(())
}

fn activate(ctx: &Context, name: &str) -> Result<()> {
    let previous = ctx.store.active()?;
    if previous.as_deref() == Some(name) {
        return Err(SatError::invariant(format!("environment {} is already active", name)));
    }
    // Refuse to activate a file that would fail every later command
    ctx.store.load(name)?;
    ctx.store.set_active(Some(name))?;
    info!(from = ?previous, to = name, "active environment changed");
    Ok(())
}

pub fn delete(ctx: &Context, name: &str) -> Result<()> {
    let event = ctx
        .audit
        .event("env.delete", AuditStatus::Success)
        .with_environment(name);
    let outcome = ctx.store.delete(name).map_err(SatError::from);
    ctx.audited(event, outcome)?;

    print_success(&format!("Environment {} deleted", name));
    Ok(())
}
