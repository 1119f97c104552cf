//! Chain collaborators backed by external tools
//!
//! - `HardhatToolchain`: transactions, facet introspection and deployment on EVM chains
//! - `StarknetDeployer`: `sncast` declare and deploy
//! - `ExplorerResolver`: contract names from an Etherscan-compatible explorer
//! - `FamilyRouter`: picks the EVM or zkSync toolchain per chain
//! - `MockChain`: in-memory implementation for testing (in tests module)

pub mod explorer;
pub mod hardhat;
pub mod router;
pub mod starknet;
pub mod toolchain;

pub use explorer::ExplorerResolver;
pub use hardhat::HardhatToolchain;
pub use router::FamilyRouter;
pub use starknet::StarknetDeployer;
pub use toolchain::{ToolOutput, ToolRunner};

#[cfg(test)]
pub mod mock;

#[cfg(test)]
pub use mock::MockChain;
