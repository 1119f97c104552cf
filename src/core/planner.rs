//! Facet reconciliation planner
//!
//! Diffs the selectors live on a satellite against the current build and
//! derives the maintenance batch that converges them. Planning happens in two
//! steps so an operator can review the plan before anything is deployed:
//!
//! 1. [`compute_plan`] classifies modules and selectors.
//! 2. [`bind_addresses`] turns the plan, the operator's [`ModuleSelection`]
//!    and the addresses of freshly deployed modules into one ordered batch.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use alloy_primitives::{Address, B256};
use serde::Serialize;
use tracing::debug;

use crate::error::{Result, SatError};
use satctl_core_interface::{FacetAction, MaintenanceAction, Selector};

/// A module as produced by the current build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleDescriptor {
    pub name: String,
    pub interface_name: String,
    pub function_selectors: Vec<Selector>,
    pub bytecode_hash: B256,
    /// Deployed next to the satellite but never routed through it
    pub is_external: bool,
}

/// A module as found live on the satellite
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployedModuleDescriptor {
    pub module: ModuleDescriptor,
    pub address: Address,
}

/// Whether an updated module may be left at its current bytecode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    /// Same interface, new bytecode: always applied
    ForceInclude,
    /// Interface changed: the operator decides
    Optional,
}

/// A selector that is routed to a different module after the upgrade
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovedSelector {
    pub selector: Selector,
    pub from: String,
    pub to: String,
}

/// Reviewable outcome of [`compute_plan`]. Never persisted.
///
/// Selector maps hold every candidate; which of them reach the batch depends
/// on the [`ModuleSelection`] given to [`bind_addresses`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationPlan {
    pub added: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
    pub updated: BTreeMap<String, UpdateKind>,
    pub preserved: BTreeSet<String>,

    pub added_selectors: BTreeMap<String, Vec<Selector>>,
    pub deleted_selectors: BTreeMap<String, Vec<Selector>>,
    pub moved_selectors: Vec<MovedSelector>,
    pub updated_module_selectors: BTreeMap<String, Vec<Selector>>,

    /// Current facet address of every deployed module
    pub deployed_addresses: BTreeMap<String, Address>,
}

impl ReconciliationPlan {
    /// Modules the operator may toggle: added ones and optional updates
    pub fn switchable(&self) -> BTreeSet<String> {
        let mandatory = self.mandatory();
        self.added
            .iter()
            .chain(
                self.updated
                    .iter()
                    .filter(|(_, kind)| **kind == UpdateKind::Optional)
                    .map(|(name, _)| name),
            )
            .filter(|name| !mandatory.contains(*name))
            .cloned()
            .collect()
    }

    /// Modules that are always part of the batch.
    ///
    /// Deleted modules, force-include updates, and every added or updated
    /// module that a moved selector now points at. The live facet of a move
    /// target does not implement the selector, so it must be redeployed.
    pub fn mandatory(&self) -> BTreeSet<String> {
        let mut mandatory: BTreeSet<String> = self.deleted.iter().cloned().collect();
        mandatory.extend(
            self.updated
                .iter()
                .filter(|(_, kind)| **kind == UpdateKind::ForceInclude)
                .map(|(name, _)| name.clone()),
        );
        mandatory.extend(
            self.moved_selectors
                .iter()
                .filter(|m| self.added.contains(&m.to) || self.updated.contains_key(&m.to))
                .map(|m| m.to.clone()),
        );
        mandatory
    }

    /// Whether applying the plan would change nothing
    pub fn is_noop(&self) -> bool {
        self.added.is_empty()
            && self.deleted.is_empty()
            && self.updated.is_empty()
            && self.moved_selectors.is_empty()
            && self.added_selectors.is_empty()
            && self.deleted_selectors.is_empty()
    }

    /// Modules that need a fresh deployment under `selection`
    pub fn modules_to_deploy(&self, selection: &ModuleSelection) -> Vec<String> {
        self.added
            .iter()
            .chain(self.updated.keys())
            .filter(|name| selection.contains(name))
            .cloned()
            .collect()
    }

    /// Selector changes that `selection` actually applies
    pub fn selected_changes(&self, selection: &ModuleSelection) -> SelectedChanges {
        let keep = |map: &BTreeMap<String, Vec<Selector>>| {
            map.iter()
                .filter(|(module, _)| selection.contains(module))
                .map(|(module, selectors)| (module.clone(), selectors.clone()))
                .collect::<BTreeMap<_, _>>()
        };
        SelectedChanges {
            added: keep(&self.added_selectors),
            deleted: keep(&self.deleted_selectors),
            moved: self.moved_selectors.clone(),
            updated: keep(&self.updated_module_selectors),
        }
    }
}

/// Selector-level changes after the operator's selection is applied
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectedChanges {
    pub added: BTreeMap<String, Vec<Selector>>,
    pub deleted: BTreeMap<String, Vec<Selector>>,
    pub moved: Vec<MovedSelector>,
    pub updated: BTreeMap<String, Vec<Selector>>,
}

impl SelectedChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.moved.is_empty() && self.updated.is_empty()
    }
}

/// Modules the operator chose to apply; always a superset of the mandatory set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleSelection {
    modules: BTreeSet<String>,
}

impl ModuleSelection {
    /// Mandatory modules plus the chosen switchable ones.
    ///
    /// Naming a module that is not switchable is an error.
    pub fn new<I, S>(plan: &ReconciliationPlan, chosen: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let switchable = plan.switchable();
        let mandatory = plan.mandatory();
        let mut modules = mandatory.clone();
        let mut violations = Vec::new();
        for name in chosen {
            let name = name.into();
            if switchable.contains(&name) || mandatory.contains(&name) {
                modules.insert(name);
            } else {
                violations.push(format!("{} is not a selectable module of this plan", name));
            }
        }
        if !violations.is_empty() {
            return Err(SatError::InvariantViolation(violations));
        }
        Ok(Self { modules })
    }

    /// Everything switchable selected
    pub fn all(plan: &ReconciliationPlan) -> Self {
        let mut modules = plan.mandatory();
        modules.extend(plan.switchable());
        Self { modules }
    }

    /// Only what cannot be skipped
    pub fn mandatory_only(plan: &ReconciliationPlan) -> Self {
        Self {
            modules: plan.mandatory(),
        }
    }

    pub fn contains(&self, module: &str) -> bool {
        self.modules.contains(module)
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(String::as_str)
    }
}

impl fmt::Display for ModuleSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.modules().collect();
        write!(f, "{}", names.join(", "))
    }
}

fn selector_owners<'a, I>(modules: I, side: &str) -> Result<BTreeMap<Selector, &'a str>>
where
    I: IntoIterator<Item = &'a ModuleDescriptor>,
{
    let mut owners: BTreeMap<Selector, &'a str> = BTreeMap::new();
    let mut collisions = Vec::new();
    for module in modules {
        for selector in &module.function_selectors {
            if let Some(previous) = owners.insert(*selector, module.name.as_str()) {
                if previous != module.name {
                    collisions.push(format!(
                        "{} is claimed by {} modules {} and {}",
                        selector, side, previous, module.name
                    ));
                }
            }
        }
    }
    if collisions.is_empty() {
        Ok(owners)
    } else {
        Err(SatError::SelectorCollision(collisions))
    }
}

fn append(map: &mut BTreeMap<String, Vec<Selector>>, module: &str, selector: Selector) {
    map.entry(module.to_string()).or_default().push(selector);
}

/// Classify modules and selectors of a satellite against the current build.
///
/// External modules are ignored: they are never routed through the satellite.
pub fn compute_plan(
    deployed: &[DeployedModuleDescriptor],
    compiled: &[ModuleDescriptor],
) -> Result<ReconciliationPlan> {
    let deployed_by_name: BTreeMap<&str, &DeployedModuleDescriptor> = deployed
        .iter()
        .map(|d| (d.module.name.as_str(), d))
        .collect();
    let compiled_by_name: BTreeMap<&str, &ModuleDescriptor> = compiled
        .iter()
        .filter(|m| !m.is_external)
        .map(|m| (m.name.as_str(), m))
        .collect();

    let mut plan = ReconciliationPlan {
        deployed_addresses: deployed
            .iter()
            .map(|d| (d.module.name.clone(), d.address))
            .collect(),
        ..Default::default()
    };

    let all_names: BTreeSet<&str> = deployed_by_name
        .keys()
        .chain(compiled_by_name.keys())
        .copied()
        .collect();

    for name in all_names {
        match (deployed_by_name.get(name), compiled_by_name.get(name)) {
            (None, Some(_)) => {
                plan.added.insert(name.to_string());
            }
            (Some(_), None) => {
                plan.deleted.insert(name.to_string());
            }
            (Some(live), Some(built)) if live.module.bytecode_hash != built.bytecode_hash => {
                let built_selectors: BTreeSet<&Selector> = built.function_selectors.iter().collect();
                let interface_kept = live
                    .module
                    .function_selectors
                    .iter()
                    .all(|s| built_selectors.contains(s));
                let kind = if interface_kept {
                    UpdateKind::ForceInclude
                } else {
                    UpdateKind::Optional
                };
                plan.updated.insert(name.to_string(), kind);
            }
            (Some(_), Some(_)) => {
                plan.preserved.insert(name.to_string());
            }
            (None, None) => {}
        }
    }

    let live_owner = selector_owners(deployed.iter().map(|d| &d.module), "deployed")?;
    let built_owner = selector_owners(compiled_by_name.values().copied(), "compiled")?;

    let all_selectors: BTreeSet<Selector> = live_owner
        .keys()
        .chain(built_owner.keys())
        .copied()
        .collect();

    for selector in all_selectors {
        match (live_owner.get(&selector), built_owner.get(&selector)) {
            (None, Some(to)) => append(&mut plan.added_selectors, to, selector),
            (Some(from), None) => append(&mut plan.deleted_selectors, from, selector),
            (Some(from), Some(to)) if from == to => {
                if plan.updated.contains_key(*to) {
                    append(&mut plan.updated_module_selectors, to, selector);
                }
            }
            (Some(from), Some(to)) => plan.moved_selectors.push(MovedSelector {
                selector,
                from: from.to_string(),
                to: to.to_string(),
            }),
            (None, None) => {}
        }
    }

    debug!(
        added = plan.added.len(),
        deleted = plan.deleted.len(),
        updated = plan.updated.len(),
        preserved = plan.preserved.len(),
        moved = plan.moved_selectors.len(),
        "computed reconciliation plan"
    );

    Ok(plan)
}

/// Produce the maintenance batch for `selection`.
///
/// `addresses` holds the new address of every module in
/// [`ReconciliationPlan::modules_to_deploy`]; modules that were not redeployed
/// keep their current facet address. Batch order is Remove, Replace for moved
/// selectors, Replace for updated modules, then Add. Every missing address is
/// collected before failing, and no partial batch is ever returned.
pub fn bind_addresses(
    plan: &ReconciliationPlan,
    selection: &ModuleSelection,
    addresses: &BTreeMap<String, Address>,
) -> Result<Vec<MaintenanceAction>> {
    let redeployed: BTreeSet<String> = plan.modules_to_deploy(selection).into_iter().collect();
    let mut unresolved = BTreeSet::new();

    let mut resolve = |module: &str| -> Address {
        let found = if redeployed.contains(module) {
            addresses.get(module)
        } else {
            plan.deployed_addresses.get(module)
        };
        match found {
            Some(address) => *address,
            None => {
                unresolved.insert(module.to_string());
                Address::ZERO
            }
        }
    };

    let changes = plan.selected_changes(selection);
    let mut actions = Vec::new();

    for selectors in changes.deleted.values() {
        actions.push(MaintenanceAction::new(
            Address::ZERO,
            FacetAction::Remove,
            selectors.clone(),
        ));
    }
    for moved in &changes.moved {
        actions.push(MaintenanceAction::new(
            resolve(&moved.to),
            FacetAction::Replace,
            vec![moved.selector],
        ));
    }
    for (module, selectors) in &changes.updated {
        actions.push(MaintenanceAction::new(
            resolve(module),
            FacetAction::Replace,
            selectors.clone(),
        ));
    }
    for (module, selectors) in &changes.added {
        actions.push(MaintenanceAction::new(
            resolve(module),
            FacetAction::Add,
            selectors.clone(),
        ));
    }

    if !unresolved.is_empty() {
        return Err(SatError::UnresolvedAddress(unresolved.into_iter().collect()));
    }
    Ok(actions)
}
