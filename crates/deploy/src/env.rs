//! Environment source: a flat, read-only map of variable names to values.

use std::{collections::BTreeMap, ffi::OsString, path::Path};

use anyhow::Context;

use crate::DeployError;

/// Snapshot of the environment taken once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSource {
    vars: BTreeMap<String, String>,
}

impl EnvSource {
    /// Snapshot the process environment, layered on top of a `.env` file in the
    /// current directory if one exists.
    pub fn from_process() -> anyhow::Result<Self> {
        Self::from_process_with_dotenv(Path::new(".env"))
    }

    /// Snapshot the process environment, layered on top of the given dotenv file.
    ///
    /// Variables already set in the process take precedence over the file.
    pub fn from_process_with_dotenv(dotenv_path: &Path) -> anyhow::Result<Self> {
        Self::layered(dotenv_path, std::env::vars_os())
    }

    /// `dotenv_path` (if present) overlaid by `process`. Process variables whose
    /// name or value is not valid UTF-8 are skipped.
    fn layered(
        dotenv_path: &Path,
        process: impl IntoIterator<Item = (OsString, OsString)>,
    ) -> anyhow::Result<Self> {
        let mut vars = BTreeMap::new();

        if dotenv_path.exists() {
            let entries = dotenvy::from_path_iter(dotenv_path)
                .with_context(|| format!("Failed to open {}", dotenv_path.display()))?;
            for entry in entries {
                let (key, value) = entry
                    .with_context(|| format!("Failed to parse {}", dotenv_path.display()))?;
                vars.insert(key, value);
            }
            tracing::debug!(path = %dotenv_path.display(), "Loaded dotenv file");
        }

        for (key, value) in process {
            match (key.into_string(), value.into_string()) {
                (Ok(key), Ok(value)) => {
                    vars.insert(key, value);
                }
                (key, _) => {
                    tracing::debug!(variable = ?key, "Skipping non UTF-8 environment variable");
                }
            }
        }

        Ok(Self { vars })
    }

    /// Look up a variable, treating blank values as absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Look up a variable that must be set.
    pub fn require(&self, name: &str) -> Result<&str, DeployError> {
        self.get(name).ok_or_else(|| DeployError::missing(name))
    }
}

impl<K, V> FromIterator<(K, V)> for EnvSource
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_require_missing_and_blank() {
        let env: EnvSource = [("USDT_ADDRESS", "0x01"), ("BLANK", "  ")].into_iter().collect();

        assert_eq!(env.require("USDT_ADDRESS").unwrap(), "0x01");
        assert!(matches!(
            env.require("TIER1_METADATA"),
            Err(DeployError::Configuration { ref variable, .. }) if variable == "TIER1_METADATA"
        ));
        assert!(env.require("BLANK").is_err());
    }

    #[test]
    fn test_dotenv_file_is_loaded() {
        let temp_dir = TempDir::new("keeper-env").expect("Failed to create temp dir");
        let path = temp_dir.path().join(".env");
        std::fs::write(&path, "KEEPER_TEST_ONLY_DOTENV_VAR=from-file\n").unwrap();

        let env = EnvSource::from_process_with_dotenv(&path).unwrap();
        assert_eq!(env.get("KEEPER_TEST_ONLY_DOTENV_VAR"), Some("from-file"));
    }

    #[test]
    fn test_process_overrides_dotenv() {
        let temp_dir = TempDir::new("keeper-env").expect("Failed to create temp dir");
        let path = temp_dir.path().join(".env");
        std::fs::write(&path, "USDT_ADDRESS=from-file\nTIER1_METADATA=ipfs://tier1\n").unwrap();

        let env = EnvSource::layered(
            &path,
            [(OsString::from("USDT_ADDRESS"), OsString::from("from-process"))],
        )
        .unwrap();
        assert_eq!(env.get("USDT_ADDRESS"), Some("from-process"));
        assert_eq!(env.get("TIER1_METADATA"), Some("ipfs://tier1"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_process_variables_are_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let temp_dir = TempDir::new("keeper-env").expect("Failed to create temp dir");
        let process = [
            (OsString::from("BROKEN_VALUE"), OsString::from_vec(b"f\xffo".to_vec())),
            (OsString::from_vec(b"BROKEN_\xffNAME".to_vec()), OsString::from("value")),
            (OsString::from("METAMASK_ADDRESS"), OsString::from("0x01")),
        ];

        let env = EnvSource::layered(&temp_dir.path().join(".env"), process).unwrap();
        assert_eq!(env.get("BROKEN_VALUE"), None);
        assert_eq!(env.require("METAMASK_ADDRESS").unwrap(), "0x01");
    }

    #[test]
    fn test_missing_dotenv_file_is_ignored() {
        let temp_dir = TempDir::new("keeper-env").expect("Failed to create temp dir");
        let env = EnvSource::from_process_with_dotenv(&temp_dir.path().join(".env"));
        assert!(env.is_ok());
    }
}
