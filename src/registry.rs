/*!
 * Chain and module registry
 *
 * Static, operator-maintained description of every chain a satellite can be
 * deployed to and of the module catalogue. It is read from the `[chains]` and
 * `[modules]` tables of the configuration file and validated once, when the
 * registry is built; every later lookup can rely on the cross references
 * being consistent.
 *
 * ```toml
 * [chains.11155111]
 * network = "sepolia"
 * modules = ["OwnershipModule", "CairoFactRegistryModule"]
 * features.cairo_fact_registry = { is_mocked = true }
 *
 * [[chains.11155111.connections]]
 * to = "421614"
 * inbox = "0xaAe29B0366299461418F5324a79Afc425BE5ae21"
 * send_function = "sendSendToArbitrum"
 * l2_alias = "0x1111000000000000000000000000000000001111"
 *
 * [modules.CairoFactRegistryModule]
 * interface = "ICairoFactRegistryModule"
 * requires = ["cairo_fact_registry"]
 * init = [{ function = "setIsMockedForInternal", args = [{ setting = "cairo_fact_registry.is_mocked" }] }]
 * ```
 */

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::alias::parse_shift;
use crate::error::{Result, SatError};
use satctl_core_interface::{ChainTarget, InitInvocation, InitTarget};

/// Toolchain family of a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    #[default]
    Evm,
    Zksync,
    /// Receive-only: never issues registration calls of its own
    Starknet,
}

impl ChainFamily {
    pub fn is_receive_only(self) -> bool {
        matches!(self, ChainFamily::Starknet)
    }
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainFamily::Evm => write!(f, "evm"),
            ChainFamily::Zksync => write!(f, "zksync"),
            ChainFamily::Starknet => write!(f, "starknet"),
        }
    }
}

/// Optional capabilities a chain may be configured with
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    CairoFactRegistry,
    DataProcessor,
    EvmSharpGrower,
    Starknet,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::CairoFactRegistry => write!(f, "cairo_fact_registry"),
            Feature::DataProcessor => write!(f, "data_processor"),
            Feature::EvmSharpGrower => write!(f, "evm_sharp_grower"),
            Feature::Starknet => write!(f, "starknet"),
        }
    }
}

/// A single value inside [`ChainFeatures`] an init call can reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingKey {
    #[serde(rename = "cairo_fact_registry.is_mocked")]
    CairoFactRegistryIsMocked,
    #[serde(rename = "cairo_fact_registry.external_contract")]
    CairoFactRegistryExternalContract,
    #[serde(rename = "cairo_fact_registry.mocked_fallback")]
    CairoFactRegistryMockedFallback,
    #[serde(rename = "data_processor_program_hash")]
    DataProcessorProgramHash,
    #[serde(rename = "evm_sharp_grower_program_hash")]
    EvmSharpGrowerProgramHash,
    #[serde(rename = "starknet.core_contract")]
    StarknetCoreContract,
    #[serde(rename = "starknet.chain_id")]
    StarknetChainId,
}

impl SettingKey {
    /// Feature block the setting lives in
    pub fn feature(self) -> Feature {
        match self {
            SettingKey::CairoFactRegistryIsMocked
            | SettingKey::CairoFactRegistryExternalContract
            | SettingKey::CairoFactRegistryMockedFallback => Feature::CairoFactRegistry,
            SettingKey::DataProcessorProgramHash => Feature::DataProcessor,
            SettingKey::EvmSharpGrowerProgramHash => Feature::EvmSharpGrower,
            SettingKey::StarknetCoreContract | SettingKey::StarknetChainId => Feature::Starknet,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CairoFactRegistry {
    pub is_mocked: bool,
    #[serde(default)]
    pub external_contract: Option<String>,
    #[serde(default)]
    pub mocked_fallback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarknetSettings {
    pub core_contract: String,
    pub chain_id: String,
}

/// Per-chain feature blocks; absence means the feature is off
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainFeatures {
    #[serde(default)]
    pub cairo_fact_registry: Option<CairoFactRegistry>,
    #[serde(default)]
    pub data_processor_program_hash: Option<String>,
    #[serde(default)]
    pub evm_sharp_grower_program_hash: Option<String>,
    #[serde(default)]
    pub starknet: Option<StarknetSettings>,
}

impl ChainFeatures {
    pub fn has(&self, feature: Feature) -> bool {
        match feature {
            Feature::CairoFactRegistry => self.cairo_fact_registry.is_some(),
            Feature::DataProcessor => self.data_processor_program_hash.is_some(),
            Feature::EvmSharpGrower => self.evm_sharp_grower_program_hash.is_some(),
            Feature::Starknet => self.starknet.is_some(),
        }
    }

    /// Rendered value of a setting, `None` when not configured
    pub fn setting(&self, key: SettingKey) -> Option<String> {
        let cairo = self.cairo_fact_registry.as_ref();
        let starknet = self.starknet.as_ref();
        match key {
            SettingKey::CairoFactRegistryIsMocked => cairo.map(|c| c.is_mocked.to_string()),
            SettingKey::CairoFactRegistryExternalContract => {
                cairo.and_then(|c| c.external_contract.clone())
            }
            SettingKey::CairoFactRegistryMockedFallback => {
                cairo.and_then(|c| c.mocked_fallback.clone())
            }
            SettingKey::DataProcessorProgramHash => self.data_processor_program_hash.clone(),
            SettingKey::EvmSharpGrowerProgramHash => self.evm_sharp_grower_program_hash.clone(),
            SettingKey::StarknetCoreContract => starknet.map(|s| s.core_contract.clone()),
            SettingKey::StarknetChainId => starknet.map(|s| s.chain_id.clone()),
        }
    }
}

/// How the satellite on this chain reaches the satellite on `to`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub to: String,
    /// Bridge inbox the sender module posts to
    pub inbox: Address,
    /// Name of the sender module entry point; its signature is fixed
    pub send_function: String,
    /// Shift applied by the receiving bridge to L1-originated callers
    #[serde(default = "default_l2_alias")]
    pub l2_alias: String,
}

fn default_l2_alias() -> String {
    "0".to_string()
}

impl ConnectionSettings {
    /// Parsed alias shift; validated when the registry is built
    pub fn alias_shift(&self) -> Result<U256> {
        parse_shift(&self.l2_alias)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSettings {
    /// Network name understood by the deployment toolchain
    pub network: String,
    #[serde(default)]
    pub family: ChainFamily,
    #[serde(default)]
    pub rpc_url: Option<String>,
    /// Chain id to query the block explorer with, when it differs
    #[serde(default)]
    pub explorer_chain_id: Option<String>,
    /// Modules wired into (or deployed next to) the satellite
    #[serde(default)]
    pub modules: Vec<String>,
    #[serde(default)]
    pub features: ChainFeatures,
    #[serde(default)]
    pub connections: Vec<ConnectionSettings>,
}

/// One argument of an init call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitArg {
    Literal(String),
    Setting(SettingKey),
    /// Address of an external module deployed with the same satellite
    External(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitCall {
    pub function: String,
    #[serde(default)]
    pub args: Vec<InitArg>,
}

/// Catalogue entry for a module contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSpec {
    /// Interface artifact whose functions become the module's selectors
    pub interface: String,
    /// Deployed alongside the satellite but never wired in as a facet
    #[serde(default)]
    pub external: bool,
    #[serde(default)]
    pub requires: Vec<Feature>,
    #[serde(default)]
    pub init: Vec<InitCall>,
}

/// Validated chain and module registry
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: BTreeMap<String, ChainSettings>,
    modules: BTreeMap<String, ModuleSpec>,
}

impl ChainRegistry {
    /// Build the registry, reporting every inconsistency at once
    pub fn new(
        chains: BTreeMap<String, ChainSettings>,
        modules: BTreeMap<String, ModuleSpec>,
    ) -> Result<Self> {
        let registry = Self { chains, modules };
        let problems = registry.problems();
        if !problems.is_empty() {
            return Err(SatError::Config(format!(
                "invalid chain registry:\n  - {}",
                problems.join("\n  - ")
            )));
        }
        debug!(
            chains = registry.chains.len(),
            modules = registry.modules.len(),
            "chain registry loaded"
        );
        Ok(registry)
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for (id, chain) in &self.chains {
            if normalize_chain_id(id).as_deref() != Some(id.as_str()) {
                problems.push(format!("chain '{}': key is not a canonical decimal chain id", id));
            }
            if chain.network.trim().is_empty() {
                problems.push(format!("chain {}: network is empty", id));
            }

            let mut seen = BTreeSet::new();
            for name in &chain.modules {
                if !seen.insert(name) {
                    problems.push(format!("chain {}: module {} listed twice", id, name));
                }
                let Some(spec) = self.modules.get(name) else {
                    problems.push(format!("chain {}: unknown module {}", id, name));
                    continue;
                };
                for feature in &spec.requires {
                    if !chain.features.has(*feature) {
                        problems.push(format!(
                            "chain {}: module {} requires feature {}",
                            id, name, feature
                        ));
                    }
                }
                for call in &spec.init {
                    for arg in &call.args {
                        if let InitArg::External(target) = arg {
                            if !chain.modules.contains(target) {
                                problems.push(format!(
                                    "chain {}: {}.{} references {} which is not deployed on this chain",
                                    id, name, call.function, target
                                ));
                            }
                        }
                    }
                }
            }

            let mut targets = BTreeSet::new();
            for connection in &chain.connections {
                if !targets.insert(&connection.to) {
                    problems.push(format!("chain {}: duplicate connection to {}", id, connection.to));
                }
                if !self.chains.contains_key(&connection.to) {
                    problems.push(format!("chain {}: connection to unknown chain {}", id, connection.to));
                }
                if connection.send_function.trim().is_empty() {
                    problems.push(format!("chain {}: connection to {} has no send_function", id, connection.to));
                }
                if let Err(e) = connection.alias_shift() {
                    problems.push(format!("chain {}: connection to {}: {}", id, connection.to, e));
                }
            }
            if chain.family.is_receive_only() && !chain.connections.is_empty() {
                problems.push(format!(
                    "chain {}: {} chains are receive-only and cannot declare connections",
                    id, chain.family
                ));
            }
        }

        for (name, spec) in &self.modules {
            if spec.interface.trim().is_empty() {
                problems.push(format!("module {}: interface is empty", name));
            }
            for call in &spec.init {
                for arg in &call.args {
                    match arg {
                        InitArg::Setting(key) if !spec.requires.contains(&key.feature()) => {
                            problems.push(format!(
                                "module {}: {} reads {:?} without requiring feature {}",
                                name,
                                call.function,
                                key,
                                key.feature()
                            ));
                        }
                        InitArg::External(target) => match self.modules.get(target) {
                            Some(t) if t.external => {}
                            Some(_) => problems.push(format!(
                                "module {}: {} is not an external module",
                                name, target
                            )),
                            None => problems.push(format!(
                                "module {}: unknown external module {}",
                                name, target
                            )),
                        },
                        _ => {}
                    }
                }
            }
        }

        problems
    }

    /// Every configured chain id, sorted
    pub fn chain_ids(&self) -> Vec<&str> {
        self.chains.keys().map(String::as_str).collect()
    }

    pub fn chain(&self, chain_id: &str) -> Result<&ChainSettings> {
        self.chains
            .get(chain_id)
            .ok_or_else(|| SatError::NotFound(format!("chain {} in the registry", chain_id)))
    }

    pub fn module(&self, name: &str) -> Result<&ModuleSpec> {
        self.modules
            .get(name)
            .ok_or_else(|| SatError::NotFound(format!("module {} in the registry", name)))
    }

    /// Parse operator input into a configured chain id.
    ///
    /// Accepts decimal ids and ASCII short names such as `SN_SEPOLIA`, which
    /// are read as the big-endian integer of their bytes.
    pub fn parse_chain_id(&self, input: &str) -> Result<String> {
        let id = normalize_chain_id(input)
            .ok_or_else(|| SatError::NotFound(format!("chain id '{}' is not recognised", input)))?;
        self.chain(&id)?;
        Ok(id)
    }

    /// Collaborator-facing description of a chain
    pub fn target(&self, chain_id: &str) -> Result<ChainTarget> {
        let chain = self.chain(chain_id)?;
        Ok(ChainTarget {
            chain_id: chain_id.to_string(),
            network: chain.network.clone(),
            rpc_url: chain.rpc_url.clone(),
        })
    }

    /// Connection metadata held by `from` for reaching `to`
    pub fn connection(&self, from: &str, to: &str) -> Option<&ConnectionSettings> {
        self.chains
            .get(from)?
            .connections
            .iter()
            .find(|c| c.to == to)
    }

    /// Modules of a chain in configured order
    pub fn chain_modules(&self, chain_id: &str) -> Result<Vec<(&str, &ModuleSpec)>> {
        let chain = self.chain(chain_id)?;
        chain
            .modules
            .iter()
            .map(|name| Ok((name.as_str(), self.module(name)?)))
            .collect()
    }

    /// Init calls of every module on a chain, in module order.
    ///
    /// A call reading an optional setting that is not configured is skipped.
    pub fn init_invocations(&self, chain_id: &str) -> Result<Vec<InitInvocation>> {
        let chain = self.chain(chain_id)?;
        let mut invocations = Vec::new();

        for (name, spec) in self.chain_modules(chain_id)? {
            'calls: for call in &spec.init {
                let mut args = Vec::with_capacity(call.args.len());
                for arg in &call.args {
                    match arg {
                        InitArg::Literal(value) => args.push(value.clone()),
                        InitArg::External(module) => args.push(format!("@{}", module)),
                        InitArg::Setting(key) => match chain.features.setting(*key) {
                            Some(value) => args.push(value),
                            None => {
                                debug!(chain = chain_id, module = name, function = %call.function, "skipping init call");
                                continue 'calls;
                            }
                        },
                    }
                }
                invocations.push(InitInvocation {
                    module: name.to_string(),
                    target: if spec.external {
                        InitTarget::External(name.to_string())
                    } else {
                        InitTarget::Satellite
                    },
                    function: call.function.clone(),
                    args,
                });
            }
        }

        Ok(invocations)
    }
}

/// Canonical decimal form of a chain id, or `None` if it cannot be one
pub fn normalize_chain_id(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if input.bytes().all(|b| b.is_ascii_digit()) {
        return U256::from_str_radix(input, 10).ok().map(|v| v.to_string());
    }
    if input.is_ascii() && input.len() <= 32 {
        return Some(U256::from_be_slice(input.as_bytes()).to_string());
    }
    None
}
