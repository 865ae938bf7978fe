use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use keeper_deploy::{CONFIG_FILENAME, Plan, ReportFormat, Scenario};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "keeper")]
#[command(
    author,
    version,
    about = "Deploy the Keeper contract family in dependency order"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "KEEPER_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the configuration file (or a directory containing Keeper.toml).
    ///
    /// Built-in defaults are used for anything the file does not set. Values can
    /// be overridden with `KEEPER_`-prefixed environment variables, for example
    /// `KEEPER_CONFIRMATION__TIMEOUT_SECS=600`.
    #[arg(long, alias = "conf", env = "KEEPER_CONFIG", default_value = CONFIG_FILENAME)]
    pub config: PathBuf,

    /// The network to deploy to. Defaults to `default_network` from the configuration.
    #[arg(short, long, env = "KEEPER_NETWORK")]
    pub network: Option<String>,

    /// Path to a dotenv file holding deployment variables and secrets.
    #[arg(long, env = "KEEPER_DOTENV", default_value = ".env")]
    pub dotenv: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write the built-in configuration to the configuration path.
    Init {
        /// Replace an existing configuration file.
        #[arg(long)]
        force: bool,
    },
    /// Deploy a scenario or plan.
    Deploy(DeployArgs),
    /// Print the deployment order without touching the chain.
    Plan(TargetArgs),
    /// Print the addresses recorded by a previous deployment.
    Show {
        /// Scenario or plan name.
        name: String,
    },
}

#[derive(Args)]
pub struct DeployArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Reuse the addresses recorded by a previous run on the same network.
    /// Artifacts already deployed are skipped.
    #[arg(long, env = "KEEPER_RESUME")]
    pub resume: bool,

    /// Output format of the final report.
    #[arg(long, env = "KEEPER_FORMAT", default_value_t = ReportFormat::Plain)]
    pub format: ReportFormat,

    /// Do not write the deployment manifest.
    #[arg(long, env = "KEEPER_NO_SAVE")]
    pub no_save: bool,
}

/// What to deploy: a built-in scenario or a plan file.
#[derive(Args)]
pub struct TargetArgs {
    /// Built-in scenario: keeper-token, founders-pass or founders-keeper.
    #[arg(required_unless_present = "plan")]
    pub scenario: Option<Scenario>,

    /// Path to a TOML plan listing the artifacts to deploy.
    #[arg(long, conflicts_with = "scenario")]
    pub plan: Option<PathBuf>,
}

impl TargetArgs {
    pub fn load(&self) -> anyhow::Result<Plan> {
        match (&self.scenario, &self.plan) {
            (_, Some(path)) => Plan::load_from_file(path),
            (Some(scenario), None) => Ok(scenario.plan()),
            (None, None) => anyhow::bail!("Either a scenario or --plan is required"),
        }
    }
}
