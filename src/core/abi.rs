//! Selector extraction from contract ABIs
//!
//! Turns the JSON ABI of an interface into canonical signatures and their
//! 4-byte selectors. Tuple parameters are flattened to `(t1,t2)` and the
//! `uint`/`int` aliases are widened to their 256-bit names, so the result
//! matches what the compiler routes on.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, SatError};
use satctl_core_interface::Selector;

#[derive(Clone, Debug, Deserialize)]
struct RawAbiEntry {
    #[serde(rename = "type")]
    entry_type: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    inputs: Vec<RawAbiParam>,
}

#[derive(Clone, Debug, Deserialize)]
struct RawAbiParam {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    components: Vec<RawAbiParam>,
}

/// Which ABI entries to extract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Function,
    Error,
}

impl EntryKind {
    fn abi_type(self) -> &'static str {
        match self {
            EntryKind::Function => "function",
            EntryKind::Error => "error",
        }
    }
}

/// A function or custom error with its canonical signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiFunction {
    pub name: String,
    pub signature: String,
    pub selector: Selector,
}

/// Extract every entry of `kind`, in ABI order.
///
/// `abi` may be the ABI array itself or an artifact object with an `abi` field.
pub fn extract(abi: &Value, kind: EntryKind) -> Result<Vec<AbiFunction>> {
    let entries = decode_abi_entries(abi)?;
    let mut functions = Vec::new();
    for entry in entries {
        if entry.entry_type != kind.abi_type() {
            continue;
        }
        let name = entry
            .name
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| SatError::Other(format!("{} entry without a name", kind.abi_type())))?
            .to_string();
        let signature = canonical_signature(&name, &entry.inputs)?;
        functions.push(AbiFunction {
            selector: Selector::from_signature(&signature),
            name,
            signature,
        });
    }
    Ok(functions)
}

/// Ordered, de-duplicated function selectors of an ABI
pub fn function_selectors(abi: &Value) -> Result<Vec<Selector>> {
    let mut seen = BTreeSet::new();
    Ok(extract(abi, EntryKind::Function)?
        .into_iter()
        .map(|f| f.selector)
        .filter(|s| seen.insert(*s))
        .collect())
}

/// Reject function names that carry different signatures in different modules.
///
/// Every collision is reported, not only the first.
pub fn check_name_collisions(modules: &[(String, Vec<AbiFunction>)]) -> Result<()> {
    // name -> signature -> modules declaring it
    let mut by_name: BTreeMap<&str, BTreeMap<&str, Vec<&str>>> = BTreeMap::new();
    for (module, functions) in modules {
        for function in functions {
            by_name
                .entry(function.name.as_str())
                .or_default()
                .entry(function.signature.as_str())
                .or_default()
                .push(module.as_str());
        }
    }

    let collisions: Vec<String> = by_name
        .into_iter()
        .filter(|(_, signatures)| signatures.len() > 1)
        .map(|(name, signatures)| {
            let variants: Vec<String> = signatures
                .into_iter()
                .map(|(signature, owners)| format!("{} in {}", signature, owners.join(", ")))
                .collect();
            format!("{}: {}", name, variants.join("; "))
        })
        .collect();

    if collisions.is_empty() {
        Ok(())
    } else {
        Err(SatError::SelectorCollision(collisions))
    }
}

fn decode_abi_entries(abi: &Value) -> Result<Vec<RawAbiEntry>> {
    let entries = if abi.is_array() {
        abi
    } else if let Some(array) = abi.get("abi") {
        array
    } else {
        return Err(SatError::Other(
            "abi must be an array or an object containing an `abi` array".to_string(),
        ));
    };
    Vec::<RawAbiEntry>::deserialize(entries)
        .map_err(|e| SatError::Other(format!("invalid abi format: {}", e)))
}

fn canonical_signature(name: &str, inputs: &[RawAbiParam]) -> Result<String> {
    let args = inputs
        .iter()
        .map(canonical_type)
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("{}({})", name, args.join(",")))
}

fn canonical_type(param: &RawAbiParam) -> Result<String> {
    let compact: String = param.kind.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(SatError::Other("abi type must be non-empty".to_string()));
    }

    if let Some(suffix) = compact.strip_prefix("tuple") {
        if param.components.is_empty() {
            return Err(SatError::Other("tuple parameter without components".to_string()));
        }
        let components = param
            .components
            .iter()
            .map(canonical_type)
            .collect::<Result<Vec<_>>>()?;
        return Ok(format!("({}){}", components.join(","), suffix));
    }

    let (base, suffix) = match compact.find('[') {
        Some(start) => compact.split_at(start),
        None => (compact.as_str(), ""),
    };
    let base = match base {
        "uint" => "uint256",
        "int" => "int256",
        other => other,
    };
    Ok(format!("{}{}", base, suffix))
}
