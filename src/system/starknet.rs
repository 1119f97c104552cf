//! Starknet satellite deployment through `sncast`
//!
//! Starknet satellites are receive-only and carry no facets, so deployment is
//! a declare followed by a single deploy, and an upgrade is a declare followed
//! by an `upgrade` invoke on the satellite. Addresses are felts and are kept as
//! hex strings.

use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use crate::config::ToolCommand;
use crate::system::toolchain::ToolRunner;
use satctl_core_interface::{ChainTarget, ExternalError, Result};

static CLASS_HASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)class[_ ]hash:\s*(0x[0-9a-f]+)").unwrap());
static ALREADY_DECLARED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(0x[0-9a-f]+) is already declared").unwrap());
static CONTRACT_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)contract[_ ]address:\s*(0x[0-9a-f]+)").unwrap());

/// Class hash from a declare run; `already declared` errors carry it on stderr
pub fn parse_class_hash(stdout: &str, stderr: &str) -> Option<String> {
    CLASS_HASH
        .captures(stdout)
        .or_else(|| ALREADY_DECLARED.captures(stderr))
        .or_else(|| ALREADY_DECLARED.captures(stdout))
        .map(|c| c[1].to_lowercase())
}

pub fn parse_contract_address(output: &str) -> Option<String> {
    CONTRACT_ADDRESS.captures(output).map(|c| c[1].to_lowercase())
}

/// Wraps the declare and deploy primitives of `sncast`
#[derive(Debug, Clone)]
pub struct StarknetDeployer {
    runner: ToolRunner,
    contract: String,
}

impl StarknetDeployer {
    pub fn new(command: ToolCommand, contract: impl Into<String>) -> Self {
        Self {
            runner: ToolRunner::new(command),
            contract: contract.into(),
        }
    }

    fn url_args(chain: &ChainTarget) -> Vec<String> {
        match &chain.rpc_url {
            Some(url) => vec!["--url".to_string(), url.clone()],
            None => Vec::new(),
        }
    }

    async fn declare(&self, chain: &ChainTarget) -> Result<String> {
        let mut argv = vec![
            "declare".to_string(),
            "--contract-name".to_string(),
            self.contract.clone(),
        ];
        argv.extend(Self::url_args(chain));

        let output = self.runner.output(&argv, &[]).await?;
        match parse_class_hash(&output.stdout, &output.stderr) {
            Some(hash) => Ok(hash),
            None if !output.success => Err(ExternalError::ToolFailed {
                tool: "sncast declare".to_string(),
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            }),
            None => Err(ExternalError::Unparseable {
                tool: "sncast declare".to_string(),
                detail: "no class hash in output".to_string(),
            }),
        }
    }

    /// Declare the satellite class and deploy it with `<chainId> 0 <owner>`
    pub async fn deploy_satellite(&self, chain: &ChainTarget, owner: &str) -> Result<String> {
        let class_hash = self.declare(chain).await?;
        info!(chain = %chain.chain_id, class_hash = %class_hash, "satellite class declared");

        let mut argv = vec![
            "deploy".to_string(),
            "--class-hash".to_string(),
            class_hash,
            "--constructor-calldata".to_string(),
            chain.chain_id.clone(),
            "0".to_string(),
            owner.to_string(),
        ];
        argv.extend(Self::url_args(chain));

        let output = self.runner.run(&argv, &[]).await?;
        parse_contract_address(&output.stdout).ok_or_else(|| ExternalError::Unparseable {
            tool: "sncast deploy".to_string(),
            detail: "no contract address in output".to_string(),
        })
    }

    /// Declare the current satellite class and point the satellite at it
    /// with `upgrade(<classHash>)`. Returns the new class hash.
    pub async fn upgrade_satellite(&self, chain: &ChainTarget, satellite: &str) -> Result<String> {
        let class_hash = self.declare(chain).await?;
        info!(chain = %chain.chain_id, class_hash = %class_hash, "satellite class declared");

        let mut argv = vec![
            "invoke".to_string(),
            "--contract-address".to_string(),
            satellite.to_string(),
            "--function".to_string(),
            "upgrade".to_string(),
            "--calldata".to_string(),
            class_hash.clone(),
        ];
        argv.extend(Self::url_args(chain));

        self.runner.run(&argv, &[]).await?;
        info!(chain = %chain.chain_id, satellite, class_hash = %class_hash, "satellite upgraded");
        Ok(class_hash)
    }
}
