/*!
 * satctl CLI Style System
 *
 * Shared styling for operator-facing output: themed text, tables for plans,
 * environments and connections, and status lines.
 */

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use console::{style, StyledObject};

use crate::core::planner::{ReconciliationPlan, SelectedChanges, UpdateKind};
use satctl_core_interface::{FacetAction, MaintenanceAction, Selector};

// ============================================================================
// THEME COLORS
// ============================================================================

/// Brand colors for consistent styling
pub struct Theme;

impl Theme {
    /// Primary accent color (cyan/blue)
    pub fn primary<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).cyan()
    }

    pub fn success<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).green()
    }

    pub fn warning<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).yellow()
    }

    pub fn error<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).red()
    }

    /// Muted/secondary text (dim)
    pub fn muted<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).dim()
    }

    /// Header style (bold cyan)
    pub fn header<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).cyan().bold()
    }
}

// ============================================================================
// ICONS
// ============================================================================

/// Unicode icons for visual feedback
pub struct Icons;

impl Icons {
    pub const SUCCESS: &'static str = "✓";
    pub const ERROR: &'static str = "✗";
    pub const WARNING: &'static str = "⚠";
    pub const INFO: &'static str = "ℹ";
    pub const SATELLITE: &'static str = "🛰";
    pub const ARROW_RIGHT: &'static str = "→";
    pub const BULLET: &'static str = "•";
}

/// Draw a section header with a line
pub fn section_header(title: &str) {
    let line_len = 50 - title.len().min(40);
    println!(
        "\n{} {}",
        Theme::header(title),
        Theme::muted("─".repeat(line_len))
    );
}

// ============================================================================
// TABLES
// ============================================================================

/// Create a styled data table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn header_cells(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .map(|t| Cell::new(t).fg(Color::Cyan).add_attribute(Attribute::Bold))
        .collect()
}

/// Comma separated selectors
pub fn format_selectors(selectors: &[Selector]) -> String {
    selectors
        .iter()
        .map(Selector::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Module-level view of a plan
pub fn plan_table(plan: &ReconciliationPlan) -> Table {
    let mut table = create_table();
    table.set_header(header_cells(&["Module", "Change", "Selectable"]));

    for name in &plan.added {
        table.add_row(vec![
            Cell::new(name),
            Cell::new("added").fg(Color::Green),
            Cell::new(if plan.mandatory().contains(name) {
                "no (selector moves here)"
            } else {
                "yes"
            }),
        ]);
    }
    for name in &plan.deleted {
        table.add_row(vec![
            Cell::new(name),
            Cell::new("deleted").fg(Color::Red),
            Cell::new("no"),
        ]);
    }
    for (name, kind) in &plan.updated {
        let (label, selectable) = match kind {
            UpdateKind::ForceInclude => ("updated (same interface)", "no"),
            UpdateKind::Optional => ("updated (interface changed)", "yes"),
        };
        table.add_row(vec![
            Cell::new(name),
            Cell::new(label).fg(Color::Yellow),
            Cell::new(selectable),
        ]);
    }
    for name in &plan.preserved {
        table.add_row(vec![
            Cell::new(name),
            Cell::new("preserved").fg(Color::DarkGrey),
            Cell::new("-"),
        ]);
    }

    table
}

/// Selector-level view of what a selection applies
pub fn changes_table(changes: &SelectedChanges) -> Table {
    let mut table = create_table();
    table.set_header(header_cells(&["Change", "Module", "Selectors"]));

    for (module, selectors) in &changes.deleted {
        table.add_row(vec![
            Cell::new("remove").fg(Color::Red),
            Cell::new(module),
            Cell::new(format_selectors(selectors)),
        ]);
    }
    for moved in &changes.moved {
        table.add_row(vec![
            Cell::new("move").fg(Color::Magenta),
            Cell::new(format!("{} {} {}", moved.from, Icons::ARROW_RIGHT, moved.to)),
            Cell::new(moved.selector.to_string()),
        ]);
    }
    for (module, selectors) in &changes.updated {
        table.add_row(vec![
            Cell::new("replace").fg(Color::Yellow),
            Cell::new(module),
            Cell::new(format_selectors(selectors)),
        ]);
    }
    for (module, selectors) in &changes.added {
        table.add_row(vec![
            Cell::new("add").fg(Color::Green),
            Cell::new(module),
            Cell::new(format_selectors(selectors)),
        ]);
    }

    table
}

/// The bound maintenance batch, in submission order
pub fn actions_table(actions: &[MaintenanceAction]) -> Table {
    let mut table = create_table();
    table.set_header(header_cells(&["#", "Action", "Module address", "Selectors"]));

    for (i, action) in actions.iter().enumerate() {
        let color = match action.action {
            FacetAction::Add => Color::Green,
            FacetAction::Replace => Color::Yellow,
            FacetAction::Remove => Color::Red,
        };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(action.action).fg(color),
            Cell::new(action.module_address),
            Cell::new(format_selectors(&action.function_selectors)),
        ]);
    }

    table
}

/// Environment listing with the active one marked
pub fn environments_table(names: &[String], active: Option<&str>) -> Table {
    let mut table = create_table();
    table.set_header(header_cells(&["Environment", "Active"]));
    for name in names {
        let is_active = active == Some(name.as_str());
        table.add_row(vec![
            if is_active {
                Cell::new(name).add_attribute(Attribute::Bold)
            } else {
                Cell::new(name)
            },
            if is_active {
                Cell::new(Icons::SUCCESS).fg(Color::Green)
            } else {
                Cell::new("")
            },
        ]);
    }
    table
}

/// Satellites and their outgoing edges
pub fn satellites_table(rows: &[(String, String, Vec<String>)]) -> Table {
    let mut table = create_table();
    table.set_header(header_cells(&["Chain", "Satellite", "Sends to"]));
    for (chain, address, outgoing) in rows {
        table.add_row(vec![
            Cell::new(chain),
            Cell::new(address),
            Cell::new(if outgoing.is_empty() {
                "-".to_string()
            } else {
                outgoing.join(", ")
            }),
        ]);
    }
    table
}

/// Directed connection edges
pub fn connections_table(edges: &[(String, String)]) -> Table {
    let mut table = create_table();
    table.set_header(header_cells(&["From", "", "To"]));
    for (from, to) in edges {
        table.add_row(vec![
            Cell::new(from),
            Cell::new(Icons::ARROW_RIGHT).fg(Color::DarkGrey),
            Cell::new(to),
        ]);
    }
    table
}

/// Function or error signatures with their selectors
pub fn selectors_table(rows: &[(String, Selector)]) -> Table {
    let mut table = create_table();
    table.set_header(header_cells(&["Signature", "Selector"]));
    for (signature, selector) in rows {
        table.add_row(vec![Cell::new(signature), Cell::new(selector).fg(Color::Yellow)]);
    }
    table
}

// ============================================================================
// STATUS LINES
// ============================================================================

/// Print a styled error message with optional suggestion
pub fn print_error(message: &str, suggestion: Option<&str>) {
    eprintln!(
        "\n{} {}",
        Theme::error(format!("{} Error:", Icons::ERROR)),
        message
    );

    if let Some(hint) = suggestion {
        eprintln!(
            "  {} {}",
            Theme::muted(Icons::ARROW_RIGHT),
            Theme::muted(hint)
        );
    }
    eprintln!();
}

pub fn print_warning(message: &str) {
    eprintln!(
        "{} {}",
        Theme::warning(Icons::WARNING.to_string()),
        Theme::warning(message)
    );
}

pub fn print_success(message: &str) {
    println!(
        "{} {}",
        Theme::success(Icons::SUCCESS.to_string()),
        Theme::success(message)
    );
}

pub fn print_info(message: &str) {
    println!("{} {}", Theme::primary(Icons::INFO.to_string()), message);
}
