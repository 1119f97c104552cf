//! Compiled contract artifacts
//!
//! Build output is a tree of `<ContractName>.json` files, each holding at least
//! `abi` and `deployedBytecode`. Artifacts are looked up by contract name
//! anywhere below the artifacts root.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use alloy_primitives::{keccak256, B256};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use crate::core::abi::{check_name_collisions, extract, AbiFunction, EntryKind};
use crate::core::planner::ModuleDescriptor;
use crate::error::{Result, SatError};
use crate::registry::ChainRegistry;

/// One compiled contract
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(skip)]
    pub path: PathBuf,
    pub abi: Value,
    #[serde(default)]
    pub deployed_bytecode: String,
}

impl Artifact {
    /// keccak-256 of the runtime bytecode
    pub fn bytecode_hash(&self) -> Result<B256> {
        let digits = self
            .deployed_bytecode
            .strip_prefix("0x")
            .unwrap_or(&self.deployed_bytecode);
        let bytes = hex::decode(digits).map_err(|e| {
            SatError::Other(format!(
                "invalid deployedBytecode in {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(keccak256(bytes))
    }
}

/// Index of artifact files by contract name
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    index: BTreeMap<String, Vec<PathBuf>>,
}

impl ArtifactStore {
    /// Scan `root` for artifact files
    pub fn open<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(SatError::NotFound(format!(
                "artifacts directory {}",
                root.display()
            )));
        }

        let mut index: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        for entry in WalkDir::new(&root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            // Debug sidecars are named `<Name>.dbg.json`
            if stem.contains('.') {
                continue;
            }
            index
                .entry(stem.to_string())
                .or_default()
                .push(path.to_path_buf());
        }

        debug!(root = %root.display(), contracts = index.len(), "indexed artifacts");
        Ok(Self { root, index })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load the artifact of contract `name`
    pub fn load(&self, name: &str) -> Result<Artifact> {
        let candidates = self.index.get(name).map(Vec::as_slice).unwrap_or_default();
        let path = match candidates {
            [] => {
                return Err(SatError::NotFound(format!(
                    "artifact for {} under {}",
                    name,
                    self.root.display()
                )))
            }
            [single] => single,
            many => {
                return Err(SatError::InvariantViolation(
                    many.iter()
                        .map(|p| format!("ambiguous artifact for {}: {}", name, p.display()))
                        .collect(),
                ))
            }
        };

        let contents = fs::read_to_string(path)?;
        let mut artifact: Artifact = serde_json::from_str(&contents).map_err(|e| {
            SatError::Other(format!("invalid artifact {}: {}", path.display(), e))
        })?;
        artifact.path = path.clone();
        Ok(artifact)
    }
}

/// Descriptors of every module configured on `chain_id`, built from artifacts.
///
/// `maintenance_module` is always first, whether or not the chain lists it.
/// Function names reused with different signatures across wired modules are
/// rejected.
pub fn compiled_modules(
    artifacts: &ArtifactStore,
    registry: &ChainRegistry,
    chain_id: &str,
    maintenance_module: &str,
) -> Result<Vec<ModuleDescriptor>> {
    let maintenance_interface = registry
        .module(maintenance_module)
        .map(|spec| spec.interface.clone())
        .unwrap_or_else(|_| format!("I{}", maintenance_module));

    let mut entries = vec![(maintenance_module.to_string(), maintenance_interface, false)];
    for (name, spec) in registry.chain_modules(chain_id)? {
        if name != maintenance_module {
            entries.push((name.to_string(), spec.interface.clone(), spec.external));
        }
    }

    let mut modules = Vec::with_capacity(entries.len());
    let mut wired: Vec<(String, Vec<AbiFunction>)> = Vec::new();
    for (name, interface, is_external) in entries {
        let bytecode_hash = artifacts.load(&name)?.bytecode_hash()?;
        let functions = extract(&artifacts.load(&interface)?.abi, EntryKind::Function)?;

        let mut selectors = Vec::with_capacity(functions.len());
        for function in &functions {
            if !selectors.contains(&function.selector) {
                selectors.push(function.selector);
            }
        }
        if !is_external {
            wired.push((name.clone(), functions));
        }
        modules.push(ModuleDescriptor {
            name,
            interface_name: interface,
            function_selectors: selectors,
            bytecode_hash,
            is_external,
        });
    }

    check_name_collisions(&wired)?;
    debug!(chain = chain_id, modules = modules.len(), "compiled module descriptors");
    Ok(modules)
}
