//! Hardhat compilation artifacts and constructor argument encoding.

use std::path::{Path, PathBuf};

use alloy_core::{
    dyn_abi::{DynSolType, DynSolValue, Specifier},
    json_abi::JsonAbi,
    primitives::Bytes,
};
use anyhow::{Context, Result};
use serde::Deserialize;

use crate::ArgValue;

/// The subset of a Hardhat artifact (`artifacts/contracts/<File>.sol/<Contract>.json`)
/// needed to deploy a contract.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardhatArtifact {
    pub contract_name: String,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
}

impl HardhatArtifact {
    /// Load an artifact from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| {
            format!(
                "Failed to parse artifact {} (unlinked libraries are not supported)",
                path.display()
            )
        })
    }

    /// Find and load the artifact for `contract` anywhere under `artifacts_dir`.
    pub fn find(artifacts_dir: &Path, contract: &str) -> Result<Self> {
        let file_name = format!("{contract}.json");
        let mut matches = Vec::new();
        collect_matches(artifacts_dir, &file_name, &mut matches)
            .with_context(|| format!("Failed to scan {}", artifacts_dir.display()))?;

        match matches.as_slice() {
            [] => anyhow::bail!(
                "No artifact for contract `{}` under {} (did you compile?)",
                contract,
                artifacts_dir.display()
            ),
            [path] => Self::load(path),
            paths => anyhow::bail!(
                "Contract name `{}` is ambiguous: {}",
                contract,
                paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    /// Creation bytecode followed by the ABI-encoded constructor arguments.
    pub fn creation_code(&self, args: &[ArgValue]) -> Result<Bytes> {
        if self.bytecode.is_empty() {
            anyhow::bail!(
                "Contract `{}` has no bytecode (abstract contract or interface?)",
                self.contract_name
            );
        }

        let encoded = encode_constructor_args(&self.abi, args)
            .with_context(|| format!("Invalid constructor arguments for `{}`", self.contract_name))?;

        let mut code = self.bytecode.to_vec();
        code.extend_from_slice(&encoded);
        Ok(code.into())
    }
}

fn collect_matches(dir: &Path, file_name: &str, matches: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_matches(&path, file_name, matches)?;
        } else if path.file_name().is_some_and(|name| name == file_name) {
            matches.push(path);
        }
    }
    Ok(())
}

/// ABI-encode `args` against the constructor declared in `abi`.
pub fn encode_constructor_args(abi: &JsonAbi, args: &[ArgValue]) -> Result<Vec<u8>> {
    let inputs = abi
        .constructor
        .as_ref()
        .map(|constructor| constructor.inputs.as_slice())
        .unwrap_or_default();

    if inputs.len() != args.len() {
        anyhow::bail!(
            "constructor expects {} argument(s), got {}",
            inputs.len(),
            args.len()
        );
    }

    if inputs.is_empty() {
        return Ok(Vec::new());
    }

    let values = inputs
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            let ty: DynSolType = param
                .resolve()
                .with_context(|| format!("Unsupported ABI type `{}`", param.ty))?;
            coerce(&ty, arg).with_context(|| format!("argument `{}` ({})", param.name, param.ty))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DynSolValue::Tuple(values).abi_encode_params())
}

fn coerce(ty: &DynSolType, arg: &ArgValue) -> Result<DynSolValue> {
    match (ty, arg) {
        (DynSolType::Address, ArgValue::Address(address)) => Ok(DynSolValue::Address(*address)),
        (DynSolType::Bool, ArgValue::Bool(value)) => Ok(DynSolValue::Bool(*value)),
        (DynSolType::String, ArgValue::String(value)) => Ok(DynSolValue::String(value.clone())),
        _ => ty
            .coerce_str(&arg.to_string())
            .map_err(|e| anyhow::anyhow!("cannot use `{}` as {}: {}", arg, ty, e)),
    }
}
