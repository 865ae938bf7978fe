//! Toolchain configuration: target networks, artifact locations and
//! confirmation policy. Serialized as `Keeper.toml`.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy_core::primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{DeployError, EnvSource, EvmSender};

/// The default name for the configuration file.
pub const CONFIG_FILENAME: &str = "Keeper.toml";

/// Environment variable holding the deployer key on remote networks.
pub const DEFAULT_PRIVATE_KEY_ENV: &str = "METAMASK_SECRET_KEY";

/// How long and how often to wait for a deployment to be mined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Delay between receipt polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Give up waiting for a receipt after this many seconds.
    pub timeout_secs: u64,
    /// Number of blocks (including the inclusion block) to wait for.
    pub confirmations: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            timeout_secs: 300,
            confirmations: 1,
        }
    }
}

/// Connection and signing settings for one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Expected chain id. Checked against `eth_chainId` on connect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Literal RPC URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    /// Environment variable holding the RPC URL. Used when `rpc_url` is unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpc_url_env: Option<String>,
    /// Environment variable holding the deployer private key.
    /// When unset, transactions are sent from an account unlocked on the node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_env: Option<String>,
    /// Unlocked node account to send from. Defaults to the node's first account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Fixed gas price in wei. Queried from the node when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<u64>,
    /// Gas limit as a percentage of `eth_estimateGas`.
    pub gas_multiplier_percent: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            chain_id: None,
            rpc_url: None,
            rpc_url_env: None,
            private_key_env: None,
            from: None,
            gas_price: None,
            gas_multiplier_percent: 120,
        }
    }
}

impl NetworkConfig {
    /// A local development node with unlocked accounts.
    pub fn local(chain_id: u64, rpc_url: impl Into<String>) -> Self {
        Self {
            chain_id: Some(chain_id),
            rpc_url: Some(rpc_url.into()),
            ..Default::default()
        }
    }

    /// A remote network whose URL and deployer key come from the environment.
    pub fn remote(chain_id: u64, rpc_url_env: impl Into<String>) -> Self {
        Self {
            chain_id: Some(chain_id),
            rpc_url_env: Some(rpc_url_env.into()),
            private_key_env: Some(DEFAULT_PRIVATE_KEY_ENV.to_string()),
            ..Default::default()
        }
    }

    /// Resolve the RPC endpoint.
    pub fn rpc_url(&self, env: &EnvSource) -> Result<Url, DeployError> {
        let (variable, raw) = match (&self.rpc_url, &self.rpc_url_env) {
            (Some(url), _) => ("rpc_url", url.as_str()),
            (None, Some(variable)) => (variable.as_str(), env.require(variable)?),
            (None, None) => return Err(DeployError::missing("rpc_url")),
        };

        Url::parse(raw).map_err(|e| DeployError::Configuration {
            variable: variable.to_string(),
            reason: format!("invalid URL: {e}"),
        })
    }

    /// Resolve who signs deployment transactions.
    pub fn sender(&self, env: &EnvSource) -> Result<EvmSender, DeployError> {
        let Some(variable) = &self.private_key_env else {
            return Ok(EvmSender::NodeAccount(self.from));
        };

        let key = env.require(variable)?;
        let signer = key
            .trim()
            .parse::<PrivateKeySigner>()
            .map_err(|_| DeployError::Configuration {
                variable: variable.clone(),
                reason: "not a valid hex-encoded private key".to_string(),
            })?;

        Ok(EvmSender::LocalKey(signer))
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network used when none is given on the command line.
    pub default_network: String,
    /// Root of the compiled Hardhat artifacts.
    pub artifacts_dir: PathBuf,
    /// Where deployment manifests are written.
    pub deployments_dir: PathBuf,
    /// Confirmation policy shared by all networks.
    pub confirmation: ConfirmationConfig,
    /// Known networks by name.
    pub networks: BTreeMap<String, NetworkConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let networks = BTreeMap::from([
            (
                "hardhat".to_string(),
                NetworkConfig::local(31337, "http://127.0.0.1:8545"),
            ),
            (
                "mainnet".to_string(),
                NetworkConfig::remote(1, "ETHERSCAN_INFURA_API_URL"),
            ),
            (
                "sepolia".to_string(),
                NetworkConfig::remote(11155111, "SEPOLIA_API_URL"),
            ),
            (
                "bsctestnet".to_string(),
                NetworkConfig::remote(97, "BSCSCAN_TESTNET_API_URL"),
            ),
        ]);

        Self {
            default_network: "hardhat".to_string(),
            artifacts_dir: PathBuf::from("artifacts"),
            deployments_dir: PathBuf::from("deployments"),
            confirmation: ConfirmationConfig::default(),
            networks,
        }
    }
}

impl Config {
    /// Look up a network by name.
    pub fn network(&self, name: &str) -> Result<&NetworkConfig> {
        self.networks.get(name).with_context(|| {
            format!(
                "Unknown network `{}` (known: {})",
                name,
                self.networks.keys().cloned().collect::<Vec<_>>().join(", ")
            )
        })
    }

    /// Write this configuration to `path` as a starting point for editing.
    ///
    /// An existing file is left untouched unless `overwrite` is set.
    pub fn write_new(&self, path: &Path, overwrite: bool) -> Result<()> {
        if path.exists() && !overwrite {
            anyhow::bail!("{} already exists (use --force to replace it)", path.display());
        }

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to render configuration")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            networks = self.networks.len(),
            "Configuration written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    const HARDHAT_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_default_networks() {
        let config = Config::default();
        assert_eq!(config.network("hardhat").unwrap().chain_id, Some(31337));
        assert_eq!(config.network("bsctestnet").unwrap().chain_id, Some(97));
        assert_eq!(
            config.network("sepolia").unwrap().rpc_url_env.as_deref(),
            Some("SEPOLIA_API_URL")
        );
        assert!(config.network("goerli").is_err());
    }

    #[test]
    fn test_rpc_url_from_env() {
        let sepolia = NetworkConfig::remote(11155111, "SEPOLIA_API_URL");

        let env: EnvSource = [("SEPOLIA_API_URL", "https://sepolia.example.org/v3/key")]
            .into_iter()
            .collect();
        assert_eq!(
            sepolia.rpc_url(&env).unwrap().as_str(),
            "https://sepolia.example.org/v3/key"
        );

        let missing = sepolia.rpc_url(&EnvSource::default()).unwrap_err();
        assert!(matches!(
            missing,
            DeployError::Configuration { ref variable, .. } if variable == "SEPOLIA_API_URL"
        ));

        let malformed: EnvSource = [("SEPOLIA_API_URL", "not a url")].into_iter().collect();
        assert!(sepolia.rpc_url(&malformed).is_err());
    }

    #[test]
    fn test_sender_resolution() {
        let local = NetworkConfig::local(31337, "http://127.0.0.1:8545");
        assert!(matches!(
            local.sender(&EnvSource::default()).unwrap(),
            EvmSender::NodeAccount(None)
        ));

        let remote = NetworkConfig::remote(97, "BSCSCAN_TESTNET_API_URL");
        let env: EnvSource = [(DEFAULT_PRIVATE_KEY_ENV, HARDHAT_KEY)].into_iter().collect();
        match remote.sender(&env).unwrap() {
            EvmSender::LocalKey(signer) => assert_eq!(
                signer.address().to_string(),
                "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
            ),
            other => panic!("expected local key sender, got {other:?}"),
        }

        let bad: EnvSource = [(DEFAULT_PRIVATE_KEY_ENV, "0x1234")].into_iter().collect();
        let err = remote.sender(&bad).unwrap_err();
        assert!(!err.to_string().contains("0x1234"));
    }

    #[test]
    fn test_written_config_parses_back() {
        let temp_dir = TempDir::new("keeper-config").expect("Failed to create temp dir");
        let path = temp_dir.path().join("project").join(CONFIG_FILENAME);

        let mut config = Config::default();
        config.default_network = "sepolia".to_string();
        config.confirmation.confirmations = 3;

        config.write_new(&path, false).unwrap();

        let written: Config = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, config);
    }

    #[test]
    fn test_write_new_keeps_existing_file() {
        let temp_dir = TempDir::new("keeper-config").expect("Failed to create temp dir");
        let path = temp_dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "default_network = \"bsctestnet\"\n").unwrap();

        let err = Config::default().write_new(&path, false).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "default_network = \"bsctestnet\"\n"
        );

        Config::default().write_new(&path, true).unwrap();
        let replaced: Config = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(replaced.default_network, "hardhat");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            default_network = "localhost"

            [networks.localhost]
            chain_id = 31337
            rpc_url = "http://localhost:8545"
            "#,
        )
        .unwrap();

        assert_eq!(config.artifacts_dir, PathBuf::from("artifacts"));
        assert_eq!(config.confirmation, ConfirmationConfig::default());
        assert_eq!(config.network("localhost").unwrap().gas_multiplier_percent, 120);
    }
}
