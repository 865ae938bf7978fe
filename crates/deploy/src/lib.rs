//! keeper-deploy - Contract deployment sequencing for the Keeper contract family.
//!
//! This crate orders a set of contract artifacts by the addresses their
//! constructors need, deploys them one at a time through a [`DeploymentBackend`]
//! and reports the resulting addresses.

mod artifact;
pub use artifact::{ArgSpec, ArgValue, ArtifactDescriptor, validate_descriptors};

mod error;
pub use error::{ChainError, DeployError};

mod resolver;
pub use resolver::resolve;

mod env;
pub use env::EnvSource;

mod orchestrator;
pub use orchestrator::{AddressTable, DeploymentRecord, DeploymentStatus, Orchestrator};

pub mod backend;
pub use backend::{
    Confirmation, DeployRequest, DeploymentBackend, EvmBackend, EvmSender, HardhatArtifact,
    PendingDeployment,
};

mod config;
pub use config::{
    CONFIG_FILENAME, Config, ConfirmationConfig, DEFAULT_PRIVATE_KEY_ENV, NetworkConfig,
};

mod report;
pub use report::{ReportFormat, Reporter};

mod manifest;
pub use manifest::{DeploymentManifest, ManifestEntry};

mod scenario;
pub use scenario::{Plan, Scenario};
