//! Deployment state for satctl
//!
//! This crate owns the durable record of what is deployed where. Every named
//! environment maps to one JSON file holding the satellites deployed in that
//! environment and the directed connections between them.
//!
//! # Key Concepts
//!
//! - **Environment**: an isolated deployment partition (e.g. `staging`, `prod`)
//! - **Satellite record**: one deployed satellite per chain, keyed by chain id
//! - **Connection edge**: a directed `from -> to` link stored on the sender record
//! - **Active environment**: the environment operator commands apply to
//!
//! # Example
//!
//! ```no_run
//! use satctl_core_state::EnvironmentStore;
//!
//! let store = EnvironmentStore::new("deployments");
//! store.create("staging").unwrap();
//! store.set_active(Some("staging")).unwrap();
//!
//! let mut state = store.load("staging").unwrap();
//! state.insert_satellite("11155111", "0x1111111111111111111111111111111111111111");
//! store.save("staging", &state).unwrap();
//! ```

pub mod error;
pub mod state;
pub mod store;
pub mod validate;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use state::{ConnectionEdge, DeploymentState, SatelliteRecord};
pub use store::{EnvironmentStore, ACTIVE_ENVIRONMENT_MARKER};
pub use validate::validate_state_document;
