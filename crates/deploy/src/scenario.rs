//! Built-in deployment scenarios and custom plans.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{ArgSpec, ArtifactDescriptor, validate_descriptors};

/// The contract families this toolchain knows how to deploy.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// The KEEPER token, its NFT and the KeeperTB controller wired to both.
    KeeperToken,
    /// The tiered founders pass, paid in USDT.
    FoundersPass,
    /// The founders keeper vault.
    FoundersKeeper,
}

impl Scenario {
    pub fn descriptors(self) -> Vec<ArtifactDescriptor> {
        match self {
            Scenario::KeeperToken => vec![
                ArtifactDescriptor::new("Keeper").contract("KEEPER"),
                ArtifactDescriptor::new("KeeperNFT"),
                ArtifactDescriptor::new("KeeperTB")
                    .arg(ArgSpec::reference("Keeper"))
                    .arg(ArgSpec::reference("KeeperNFT"))
                    .arg(ArgSpec::env("METAMASK_ADDRESS")),
            ],
            Scenario::FoundersPass => vec![
                ArtifactDescriptor::new("FoundersPass")
                    .arg(ArgSpec::env("USDT_ADDRESS"))
                    .arg(ArgSpec::env("TIER1_METADATA"))
                    .arg(ArgSpec::env("TIER2_METADATA")),
            ],
            Scenario::FoundersKeeper => vec![
                ArtifactDescriptor::new("FoundersKeeper")
                    .arg(ArgSpec::env("PRIVATE_SAFE_ADDRESS"))
                    .arg(ArgSpec::env("TEAM_TOKENS_ADDRESS"))
                    .arg(ArgSpec::env("TB_AND_GA")),
            ],
        }
    }

    pub fn plan(self) -> Plan {
        Plan {
            name: self.to_string(),
            artifacts: self.descriptors(),
        }
    }
}

/// A named list of artifacts to deploy together.
///
/// ```toml
/// name = "keeper-token"
///
/// [[artifacts]]
/// name = "Keeper"
/// contract = "KEEPER"
///
/// [[artifacts]]
/// name = "KeeperTB"
/// args = [{ ref = "Keeper" }, { env = "METAMASK_ADDRESS" }]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Used to name the persisted manifest. Defaults to the file stem.
    #[serde(default)]
    pub name: String,
    pub artifacts: Vec<ArtifactDescriptor>,
}

impl Plan {
    /// Load a plan from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan from {}", path.display()))?;
        let mut plan: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse plan {}", path.display()))?;

        if plan.name.trim().is_empty() {
            plan.name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .context("Plan has no name and its path has no file name")?;
        }

        validate_descriptors(&plan.artifacts)
            .with_context(|| format!("Invalid plan {}", path.display()))?;

        tracing::debug!(plan = %plan.name, artifacts = plan.artifacts.len(), "Plan loaded");
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ArgValue, resolve};
    use strum::IntoEnumIterator;
    use tempdir::TempDir;

    #[test]
    fn test_builtin_scenarios_resolve() {
        for scenario in Scenario::iter() {
            let order = resolve(&scenario.descriptors()).unwrap();
            assert_eq!(order.len(), scenario.descriptors().len(), "{scenario}");
        }
    }

    #[test]
    fn test_keeper_token_deploys_controller_last() {
        let order = resolve(&Scenario::KeeperToken.descriptors()).unwrap();
        let names: Vec<_> = order.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Keeper", "KeeperNFT", "KeeperTB"]);
        assert_eq!(order[0].contract_name(), "KEEPER");
    }

    #[test]
    fn test_scenario_names() {
        assert_eq!(Scenario::FoundersKeeper.to_string(), "founders-keeper");
        assert_eq!(
            "keeper-token".parse::<Scenario>().unwrap(),
            Scenario::KeeperToken
        );
        assert!("keeper".parse::<Scenario>().is_err());
    }

    #[test]
    fn test_load_plan_from_toml() {
        let temp_dir = TempDir::new("keeper-plan").expect("Failed to create temp dir");
        let path = temp_dir.path().join("staking.toml");
        std::fs::write(
            &path,
            r#"
            [[artifacts]]
            name = "Token"
            contract = "KEEPER"

            [[artifacts]]
            name = "Staking"
            args = [{ ref = "Token" }, { literal = true }, { env = "TREASURY" }]
            "#,
        )
        .unwrap();

        let plan = Plan::load_from_file(&path).unwrap();
        assert_eq!(plan.name, "staking");
        assert_eq!(plan.artifacts.len(), 2);
        assert_eq!(plan.artifacts[1].args[0], ArgSpec::reference("Token"));
        assert_eq!(plan.artifacts[1].args[1], ArgSpec::Literal(ArgValue::Bool(true)));
    }

    #[test]
    fn test_plan_with_duplicate_names_is_rejected() {
        let temp_dir = TempDir::new("keeper-plan").expect("Failed to create temp dir");
        let path = temp_dir.path().join("dup.toml");
        std::fs::write(
            &path,
            r#"
            name = "dup"

            [[artifacts]]
            name = "Token"

            [[artifacts]]
            name = "Token"
            "#,
        )
        .unwrap();

        assert!(Plan::load_from_file(&path).is_err());
    }
}
