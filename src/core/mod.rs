/*!
 * Core satellite operations
 *
 * Planning and orchestration with no knowledge of how chains are reached:
 * every external effect goes through the collaborator traits of
 * `satctl-core-interface`.
 */

pub mod abi;
pub mod alias;
pub mod artifacts;
pub mod connections;
pub mod deploy;
pub mod planner;
pub mod presenter;
pub mod timeout;
pub mod upgrade;

pub use connections::ConnectionManager;
pub use deploy::DeploymentOrchestrator;
pub use planner::{bind_addresses, compute_plan, ModuleSelection, ReconciliationPlan};
pub use presenter::{AutoPolicy, AutoPresenter, InteractivePresenter, PlanPresenter};
pub use upgrade::{UpgradeOrchestrator, UpgradeOutcome};
