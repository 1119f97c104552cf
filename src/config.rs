/*!
 * Configuration types for satctl
 *
 * Everything an external tool needs is spelled out here: program, arguments,
 * working directory and environment. Nothing is taken from the ambient process
 * state except the explorer API key, whose variable name is configured too.
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, SatError};
use crate::registry::{ChainRegistry, ChainSettings, ModuleSpec};

/// Default file name looked up in the platform config directory
pub const CONFIG_FILE_NAME: &str = "satctl.toml";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SatConfig {
    /// Directory holding one `<environment>.json` per environment
    #[serde(default = "default_deployments_dir")]
    pub deployments_dir: PathBuf,

    /// JSON Lines audit trail of every state-changing command
    #[serde(default)]
    pub audit_log: Option<PathBuf>,

    #[serde(default)]
    pub log_level: LogLevel,

    /// Write JSON logs to this file instead of the terminal
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    #[serde(default)]
    pub verbose: bool,

    /// Owner passed to Starknet satellite constructors
    #[serde(default)]
    pub owner: Option<String>,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub introspection: IntrospectionConfig,

    #[serde(default)]
    pub explorer: ExplorerConfig,

    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    #[serde(default)]
    pub toolchain: ToolchainConfig,

    /// Chain registry, keyed by canonical chain id
    #[serde(default)]
    pub chains: BTreeMap<String, ChainSettings>,

    /// Module catalogue, keyed by contract name
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleSpec>,
}

impl Default for SatConfig {
    fn default() -> Self {
        Self {
            deployments_dir: default_deployments_dir(),
            audit_log: None,
            log_level: LogLevel::Info,
            log_file: None,
            verbose: false,
            owner: None,
            timeouts: TimeoutConfig::default(),
            introspection: IntrospectionConfig::default(),
            explorer: ExplorerConfig::default(),
            artifacts: ArtifactsConfig::default(),
            toolchain: ToolchainConfig::default(),
            chains: BTreeMap::new(),
            modules: BTreeMap::new(),
        }
    }
}

/// Deadlines in seconds; a concern without its own value uses `default_secs`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_timeout_secs")]
    pub default_secs: u64,
    #[serde(default)]
    pub transaction_secs: Option<u64>,
    #[serde(default)]
    pub introspection_secs: Option<u64>,
    #[serde(default)]
    pub deployment_secs: Option<u64>,
    #[serde(default)]
    pub explorer_secs: Option<u64>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_secs: default_timeout_secs(),
            transaction_secs: None,
            introspection_secs: None,
            deployment_secs: None,
            explorer_secs: None,
        }
    }
}

impl TimeoutConfig {
    pub fn transaction(&self) -> u64 {
        self.transaction_secs.unwrap_or(self.default_secs)
    }

    pub fn introspection(&self) -> u64 {
        self.introspection_secs.unwrap_or(self.default_secs)
    }

    pub fn deployment(&self) -> u64 {
        self.deployment_secs.unwrap_or(self.default_secs)
    }

    pub fn explorer(&self) -> u64 {
        self.explorer_secs.unwrap_or(self.default_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrospectionConfig {
    /// Facets inspected at the same time
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for IntrospectionConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

/// Block explorer used to name deployed facets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerConfig {
    #[serde(default = "default_explorer_url")]
    pub api_url: String,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            api_url: default_explorer_url(),
            api_key_env: default_api_key_env(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Root of the compiler's artifact tree
    #[serde(default = "default_artifacts_dir")]
    pub dir: PathBuf,
    /// Module that is part of every satellite
    #[serde(default = "default_maintenance_module")]
    pub maintenance_module: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: default_artifacts_dir(),
            maintenance_module: default_maintenance_module(),
        }
    }
}

/// One external program with its complete invocation context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub program: String,
    /// Arguments placed before the per-call arguments
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Environment for the child; the parent environment is not inherited
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Parent variables passed through unchanged
    #[serde(default = "default_inherit_env")]
    pub inherit_env: Vec<String>,
}

impl ToolCommand {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
            inherit_env: default_inherit_env(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_cwd<P: Into<PathBuf>>(mut self, cwd: P) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// Scripts run through the EVM toolchain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardhatScripts {
    #[serde(default = "default_maintenance_script")]
    pub maintenance: String,
    #[serde(default = "default_register_script")]
    pub register_satellite: String,
    #[serde(default = "default_remove_script")]
    pub remove_satellite: String,
    /// Prints the loupe facets as JSON
    #[serde(default = "default_facets_script")]
    pub facets: String,
    /// Prints `CodeHash: 0x..` for an address
    #[serde(default = "default_code_hash_script")]
    pub code_hash: String,
    /// Ignition module deploying a set of module contracts
    #[serde(default = "default_upgrade_module")]
    pub upgrade_module: String,
    /// Ignition module deploying and wiring a satellite
    #[serde(default = "default_satellite_module")]
    pub satellite_module: String,
}

impl Default for HardhatScripts {
    fn default() -> Self {
        Self {
            maintenance: default_maintenance_script(),
            register_satellite: default_register_script(),
            remove_satellite: default_remove_script(),
            facets: default_facets_script(),
            code_hash: default_code_hash_script(),
            upgrade_module: default_upgrade_module(),
            satellite_module: default_satellite_module(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolchainConfig {
    /// Runner for EVM chains
    #[serde(default = "default_evm_tool")]
    pub evm: ToolCommand,
    /// Runner for zkSync chains; falls back to `evm`
    #[serde(default)]
    pub zksync: Option<ToolCommand>,
    /// `sncast` for Starknet
    #[serde(default = "default_starknet_tool")]
    pub starknet: ToolCommand,
    /// Cairo contract declared for Starknet satellites
    #[serde(default = "default_starknet_contract")]
    pub starknet_contract: String,
    #[serde(default)]
    pub scripts: HardhatScripts,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            evm: default_evm_tool(),
            zksync: None,
            starknet: default_starknet_tool(),
            starknet_contract: default_starknet_contract(),
            scripts: HardhatScripts::default(),
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_deployments_dir() -> PathBuf {
    PathBuf::from("deployments")
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_concurrency() -> usize {
    4
}

fn default_explorer_url() -> String {
    "https://api.etherscan.io/v2/api".to_string()
}

fn default_api_key_env() -> String {
    "ETHERSCAN_API_KEY".to_string()
}

fn default_requests_per_second() -> u32 {
    3
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("solidity/artifacts")
}

fn default_maintenance_module() -> String {
    "SatelliteMaintenanceModule".to_string()
}

fn default_maintenance_script() -> String {
    "scripts/satelliteMaintenance.ts".to_string()
}

fn default_register_script() -> String {
    "scripts/registerSatellite.ts".to_string()
}

fn default_remove_script() -> String {
    "scripts/removeSatellite.ts".to_string()
}

fn default_facets_script() -> String {
    "scripts/facets.ts".to_string()
}

fn default_code_hash_script() -> String {
    "scripts/codeHash.ts".to_string()
}

fn default_upgrade_module() -> String {
    "ignition/modules/UpgradeDeployment.ts".to_string()
}

fn default_satellite_module() -> String {
    "ignition/modules/SatelliteDeployment.ts".to_string()
}

fn default_inherit_env() -> Vec<String> {
    vec!["PATH".to_string(), "HOME".to_string()]
}

fn default_evm_tool() -> ToolCommand {
    ToolCommand::new("npx").with_args(["hardhat"]).with_cwd("solidity")
}

fn default_starknet_tool() -> ToolCommand {
    ToolCommand::new("sncast").with_cwd("cairo")
}

fn default_starknet_contract() -> String {
    "Satellite".to_string()
}

impl SatConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SatError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents)
            .map_err(|e| SatError::Config(format!("invalid {}: {}", path.display(), e)))
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| SatError::Config(format!("cannot serialize configuration: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// `explicit` if given, else `satctl.toml` in the working directory, else
    /// the platform config directory. Missing files yield the defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.is_file() {
            return Self::from_file(&local);
        }
        match dirs::config_dir().map(|d| d.join("satctl").join(CONFIG_FILE_NAME)) {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Validated chain registry
    pub fn registry(&self) -> Result<ChainRegistry> {
        ChainRegistry::new(self.chains.clone(), self.modules.clone())
    }

    /// Runner for a chain family
    pub fn evm_tool_for(&self, zksync: bool) -> &ToolCommand {
        match (&self.toolchain.zksync, zksync) {
            (Some(tool), true) => tool,
            _ => &self.toolchain.evm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ChainFamily;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SatConfig::default();
        assert_eq!(config.deployments_dir, PathBuf::from("deployments"));
        assert_eq!(config.timeouts.transaction(), 300);
        assert_eq!(config.introspection.max_concurrency, 4);
        assert_eq!(config.artifacts.maintenance_module, "SatelliteMaintenanceModule");
        assert!(config.registry().is_ok());
    }

    #[test]
    fn test_timeout_overrides() {
        let config: SatConfig = toml::from_str(
            r#"
[timeouts]
default_secs = 60
explorer_secs = 10
"#,
        )
        .unwrap();
        assert_eq!(config.timeouts.explorer(), 10);
        assert_eq!(config.timeouts.deployment(), 60);
    }

    #[test]
    fn test_full_example() {
        let toml_str = r#"
deployments_dir = "deployments"
audit_log = "satctl_audit.log"
log_level = "debug"
owner = "0x0123"

[toolchain.evm]
program = "npx"
args = ["hardhat"]
cwd = "solidity"
env = { HARDHAT_NETWORK_TIMEOUT = "60000" }

[toolchain.zksync]
program = "npx"
args = ["hardhat", "--config", "hardhat.config.zksync.ts"]
cwd = "solidity"

[chains.11155111]
network = "sepolia"
modules = ["OwnershipModule"]

[[chains.11155111.connections]]
to = "393402133025997798000961"
inbox = "0xE2Bb56ee936fd6433DC0F6e7e3b8365C906AA057"
send_function = "sendSendToStarknet"

[chains.393402133025997798000961]
network = "starknetSepolia"
family = "starknet"

[modules.OwnershipModule]
interface = "IOwnershipModule"
"#;
        let config: SatConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.evm_tool_for(true).args.len(), 3);
        assert_eq!(config.evm_tool_for(false).args, vec!["hardhat".to_string()]);

        let registry = config.registry().unwrap();
        assert_eq!(
            registry.parse_chain_id("SN_SEPOLIA").unwrap(),
            "393402133025997798000961"
        );
        assert_eq!(
            registry.chain("393402133025997798000961").unwrap().family,
            ChainFamily::Starknet
        );
    }

    #[test]
    fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = SatConfig {
            owner: Some("0xabc".into()),
            ..Default::default()
        };
        config.to_file(&path).unwrap();

        let loaded = SatConfig::discover(Some(&path)).unwrap();
        assert_eq!(loaded.owner.as_deref(), Some("0xabc"));
        assert!(SatConfig::discover(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Error.to_tracing_level(), tracing::Level::ERROR);
        assert_eq!(LogLevel::Trace.to_tracing_level(), tracing::Level::TRACE);
    }
}
