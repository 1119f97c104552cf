/*!
 * satctl - Satellite fleet control plane
 *
 * Deploys, upgrades and connects diamond-style satellite contracts across a
 * fleet of chains:
 * - Per-environment deployment records with schema validation
 * - Facet reconciliation planning with a single maintenance batch
 * - Directed connection lifecycle with L1 to L2 sender aliasing
 * - Typed chain registry validated at load
 * - JSON Lines audit trail of every state change
 */

pub mod audit;
pub mod cli_style;
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod registry;
pub mod system;

// Re-export commonly used types
pub use config::SatConfig;
pub use error::{Result, SatError};
pub use registry::ChainRegistry;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
