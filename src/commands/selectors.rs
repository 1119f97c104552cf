//! `satctl selectors`: 4-byte selectors of an ABI

use std::fs;
use std::path::Path;

use serde_json::Value;

use super::Context;
use crate::cli_style::{print_info, section_header, selectors_table};
use crate::core::abi::{extract, EntryKind};
use crate::error::{Result, SatError};
use satctl_core_interface::Selector;

/// ABI of `artifact`: a JSON file path, or a contract name in the build output
fn load_abi(ctx: &Context, artifact: &str) -> Result<Value> {
    let path = Path::new(artifact);
    if path.is_file() {
        let contents = fs::read_to_string(path)?;
        return serde_json::from_str(&contents)
            .map_err(|e| SatError::Other(format!("invalid ABI file {}: {}", path.display(), e)));
    }
    Ok(ctx.artifacts()?.load(artifact)?.abi)
}

/// Signatures and selectors of every function, or every custom error
pub fn selector_rows(abi: &Value, errors: bool) -> Result<Vec<(String, Selector)>> {
    let kind = if errors {
        EntryKind::Error
    } else {
        EntryKind::Function
    };
    Ok(extract(abi, kind)?
        .into_iter()
        .map(|f| (f.signature, f.selector))
        .collect())
}

pub fn print(ctx: &Context, artifact: &str, errors: bool) -> Result<()> {
    let abi = load_abi(ctx, artifact)?;
    let rows = selector_rows(&abi, errors)?;

    section_header(if errors { "Error selectors" } else { "Function selectors" });
    if rows.is_empty() {
        print_info(&format!("{} has no {} entries", artifact, if errors { "error" } else { "function" }));
    } else {
        println!("{}", selectors_table(&rows));
    }
    Ok(())
}
