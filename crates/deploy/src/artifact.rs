//! Artifact descriptors: the static definition of one deployable contract.

use std::{collections::HashSet, fmt};

use alloy_core::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::DeployError;

/// A concrete constructor argument value.
///
/// Values are coerced to the constructor's ABI type by the backend, so a
/// `String` holding `"0x..."` can feed an `address` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Address(Address),
    Bool(bool),
    Uint(U256),
    String(String),
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Address(address) => write!(f, "{address}"),
            ArgValue::Bool(value) => write!(f, "{value}"),
            ArgValue::Uint(value) => write!(f, "{value}"),
            ArgValue::String(value) => f.write_str(value),
        }
    }
}

impl From<Address> for ArgValue {
    fn from(address: Address) -> Self {
        Self::Address(address)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<u64> for ArgValue {
    fn from(value: u64) -> Self {
        Self::Uint(U256::from(value))
    }
}

/// How a constructor argument is obtained.
///
/// In TOML plans:
/// `args = [{ ref = "Keeper" }, { env = "METAMASK_ADDRESS" }, { literal = "0x.." }]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgSpec {
    /// A value passed through unchanged.
    Literal(ArgValue),
    /// A value read from the environment source once, before any submission.
    Env(String),
    /// The deployed address of another artifact in the same run.
    Ref(String),
}

impl ArgSpec {
    pub fn literal(value: impl Into<ArgValue>) -> Self {
        Self::Literal(value.into())
    }

    pub fn env(variable: impl Into<String>) -> Self {
        Self::Env(variable.into())
    }

    pub fn reference(artifact: impl Into<String>) -> Self {
        Self::Ref(artifact.into())
    }
}

/// Static definition of one deployable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Name of the artifact, unique within a run.
    pub name: String,
    /// Compiled contract to instantiate. Defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
    /// Ordered constructor arguments.
    #[serde(default)]
    pub args: Vec<ArgSpec>,
}

impl ArtifactDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contract: None,
            args: Vec::new(),
        }
    }

    /// Set the compiled contract name when it differs from the artifact name.
    pub fn contract(mut self, contract: impl Into<String>) -> Self {
        self.contract = Some(contract.into());
        self
    }

    /// Append a constructor argument.
    pub fn arg(mut self, arg: ArgSpec) -> Self {
        self.args.push(arg);
        self
    }

    /// The compiled contract name.
    pub fn contract_name(&self) -> &str {
        self.contract.as_deref().unwrap_or(&self.name)
    }

    /// Names of the artifacts whose addresses this artifact needs.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(|arg| match arg {
            ArgSpec::Ref(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Environment variables read by this artifact.
    pub fn env_variables(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(|arg| match arg {
            ArgSpec::Env(variable) => Some(variable.as_str()),
            _ => None,
        })
    }
}

/// Check that every descriptor has a non-empty name that is unique in the set.
pub fn validate_descriptors(descriptors: &[ArtifactDescriptor]) -> Result<(), DeployError> {
    let mut seen = HashSet::with_capacity(descriptors.len());

    for (index, descriptor) in descriptors.iter().enumerate() {
        if descriptor.name.trim().is_empty() {
            return Err(DeployError::InvalidDescriptor(format!(
                "artifact at position {index} has an empty name"
            )));
        }
        if !seen.insert(descriptor.name.as_str()) {
            return Err(DeployError::InvalidDescriptor(format!(
                "artifact `{}` is declared more than once",
                descriptor.name
            )));
        }
    }

    Ok(())
}
