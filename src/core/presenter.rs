//! Plan review
//!
//! The upgrade flow never decides on its own which optional changes to apply.
//! It hands the plan to a [`PlanPresenter`]: a terminal prompt for operators,
//! or a fixed [`AutoPolicy`] for pipelines.

use dialoguer::{theme::ColorfulTheme, Confirm, MultiSelect};
use tracing::info;

use crate::cli_style::{self, actions_table, changes_table, plan_table, section_header};
use crate::core::planner::{ModuleSelection, ReconciliationPlan};
use crate::error::{Result, SatError};
use satctl_core_interface::MaintenanceAction;

/// Capability that turns a plan into the operator's selection
pub trait PlanPresenter: Send + Sync {
    /// Show the plan and return the selection, or `None` to abort
    fn present_plan(&self, plan: &ReconciliationPlan) -> Result<Option<ModuleSelection>>;

    /// Last look at the bound batch before it is submitted
    fn confirm_batch(&self, actions: &[MaintenanceAction]) -> Result<bool>;
}

/// Deterministic choice for non-interactive runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoPolicy {
    /// Every switchable module
    #[default]
    All,
    /// Only what cannot be skipped
    MandatoryOnly,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AutoPresenter {
    pub policy: AutoPolicy,
}

impl AutoPresenter {
    pub fn new(policy: AutoPolicy) -> Self {
        Self { policy }
    }
}

impl PlanPresenter for AutoPresenter {
    fn present_plan(&self, plan: &ReconciliationPlan) -> Result<Option<ModuleSelection>> {
        let selection = match self.policy {
            AutoPolicy::All => ModuleSelection::all(plan),
            AutoPolicy::MandatoryOnly => ModuleSelection::mandatory_only(plan),
        };
        info!(policy = ?self.policy, selection = %selection, "automatic plan selection");
        Ok(Some(selection))
    }

    fn confirm_batch(&self, _actions: &[MaintenanceAction]) -> Result<bool> {
        Ok(true)
    }
}

/// Checkbox menu over the switchable modules
#[derive(Debug, Clone, Copy, Default)]
pub struct InteractivePresenter;

fn prompt_error(e: dialoguer::Error) -> SatError {
    SatError::Other(format!("prompt failed: {}", e))
}

impl PlanPresenter for InteractivePresenter {
    fn present_plan(&self, plan: &ReconciliationPlan) -> Result<Option<ModuleSelection>> {
        section_header("Upgrade plan");
        println!("{}", plan_table(plan));

        let switchable: Vec<String> = plan.switchable().into_iter().collect();
        let chosen: Vec<String> = if switchable.is_empty() {
            Vec::new()
        } else {
            let defaults = vec![true; switchable.len()];
            let picked = MultiSelect::with_theme(&ColorfulTheme::default())
                .with_prompt("Modules to apply (space toggles, enter confirms)")
                .items(&switchable)
                .defaults(&defaults)
                .interact_opt()
                .map_err(prompt_error)?;
            match picked {
                Some(indices) => indices.into_iter().map(|i| switchable[i].clone()).collect(),
                None => return Ok(None),
            }
        };

        let selection = ModuleSelection::new(plan, chosen)?;
        section_header("Selector changes");
        println!("{}", changes_table(&plan.selected_changes(&selection)));
        Ok(Some(selection))
    }

    fn confirm_batch(&self, actions: &[MaintenanceAction]) -> Result<bool> {
        section_header("Maintenance batch");
        println!("{}", actions_table(actions));
        cli_style::print_warning("The batch is submitted as a single transaction.");
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Submit satelliteMaintenance?")
            .default(false)
            .interact()
            .map_err(prompt_error)
    }
}
