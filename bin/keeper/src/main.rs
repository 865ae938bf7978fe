//! keeper deploys the Keeper contract family to an EVM network in dependency order.

mod cli;

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use cli::{Cli, Command, DeployArgs, TargetArgs};
use keeper_deploy::{
    AddressTable, ArgSpec, CONFIG_FILENAME, Config, DeploymentManifest, DeploymentRecord,
    EnvSource, EvmBackend, Orchestrator, ReportFormat, Reporter, resolve,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let network = |config: &Config| {
        cli.network
            .clone()
            .unwrap_or_else(|| config.default_network.clone())
    };

    match cli.command {
        Command::Init { force } => init(&cli.config, force),
        Command::Deploy(args) => {
            let config = load_config(&cli.config)?;
            let env = EnvSource::from_process_with_dotenv(&cli.dotenv)?;
            deploy(&config, &network(&config), env, args).await
        }
        Command::Plan(target) => plan(&target),
        Command::Show { name } => {
            let config = load_config(&cli.config)?;
            show(&config, &network(&config), &name)
        }
    }
}

/// `path` itself, or `Keeper.toml` inside it when `path` is a directory.
fn config_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(CONFIG_FILENAME)
    } else {
        path.to_path_buf()
    }
}

/// Write the built-in configuration so it can be edited.
fn init(path: &Path, force: bool) -> Result<()> {
    Config::default().write_new(&config_file(path), force)
}

/// Layer the configuration: built-in defaults, then the TOML file, then
/// `KEEPER_`-prefixed environment variables.
fn load_config(path: &Path) -> Result<Config> {
    let file = config_file(path);

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&file))
        .merge(Env::prefixed("KEEPER_").split("__"))
        .extract()
        .with_context(|| format!("Failed to load configuration from {}", file.display()))?;

    tracing::debug!(
        path = %file.display(),
        default_network = %config.default_network,
        "Configuration loaded"
    );
    Ok(config)
}

async fn deploy(config: &Config, network: &str, env: EnvSource, args: DeployArgs) -> Result<()> {
    let plan = args.target.load()?;
    let order = resolve(&plan.artifacts)?;
    let network_config = config.network(network)?;
    let manifest_path = DeploymentManifest::path(&config.deployments_dir, network, &plan.name);

    let resumed = if args.resume && manifest_path.exists() {
        let manifest = DeploymentManifest::load_from_file(&manifest_path)?;
        tracing::info!(
            path = %manifest_path.display(),
            deployed = manifest.entries.len(),
            "Resuming from previous deployment"
        );
        Some(manifest)
    } else {
        None
    };

    let table = match &resumed {
        Some(manifest) => manifest.to_table()?,
        None => AddressTable::new(),
    };

    let mut orchestrator = Orchestrator::with_table(env.clone(), table);
    orchestrator.preflight(&order)?;

    tracing::info!(
        plan = %plan.name,
        network,
        artifacts = order.len(),
        "Starting deployment..."
    );

    let mut backend = EvmBackend::connect(
        network_config,
        &env,
        config.artifacts_dir.clone(),
        config.confirmation.clone(),
    )
    .await?;

    if let Some(manifest) = &resumed {
        manifest.ensure_chain(backend.chain_id())?;
    }

    let outcome = orchestrator
        .run(&order, &mut backend)
        .await
        .map(|_| ())
        .with_context(|| format!("Deployment of `{}` to {} failed", plan.name, network));

    let manifest = (!args.no_save && !orchestrator.records().is_empty()).then(|| {
        DeploymentManifest::from_records(
            &plan.name,
            network,
            Some(backend.chain_id()),
            orchestrator.records(),
        )
    });

    let mut stdout = std::io::stdout().lock();
    conclude(
        outcome,
        orchestrator.table(),
        orchestrator.records(),
        args.format,
        manifest.as_ref().map(|manifest| (manifest, manifest_path.as_path())),
        &mut stdout,
    )
}

/// Print the report for a finished run, then save its manifest.
///
/// A failed run is reported as the error even when printing or saving also
/// failed; those failures are logged.
fn conclude(
    outcome: Result<()>,
    table: &AddressTable,
    records: &[DeploymentRecord],
    format: ReportFormat,
    manifest: Option<(&DeploymentManifest, &Path)>,
    out: &mut impl Write,
) -> Result<()> {
    let reported = Reporter::new(format)
        .report(table, records, out)
        .and_then(|()| out.flush().context("Failed to flush report"))
        .inspect_err(|e| tracing::error!(error = %format!("{e:#}"), "Failed to print report"));

    let saved = match manifest {
        Some((manifest, path)) => manifest.save_to_file(path).inspect_err(|e| {
            tracing::error!(
                path = %path.display(),
                error = %format!("{e:#}"),
                "Failed to save deployment manifest"
            );
        }),
        None => Ok(()),
    };

    outcome.and(reported).and(saved)
}

fn plan(target: &TargetArgs) -> Result<()> {
    let plan = target.load()?;
    let order = resolve(&plan.artifacts)?;

    let mut stdout = std::io::stdout().lock();
    for (index, descriptor) in order.iter().enumerate() {
        let args = descriptor
            .args
            .iter()
            .map(|arg| match arg {
                ArgSpec::Literal(value) => value.to_string(),
                ArgSpec::Env(variable) => format!("${variable}"),
                ArgSpec::Ref(name) => format!("@{name}"),
            })
            .collect::<Vec<_>>()
            .join(", ");

        writeln!(
            stdout,
            "{}. {} [{}] ({})",
            index + 1,
            descriptor.name,
            descriptor.contract_name(),
            args
        )?;
    }

    Ok(())
}

fn show(config: &Config, network: &str, name: &str) -> Result<()> {
    let path = DeploymentManifest::path(&config.deployments_dir, network, name);
    let manifest = DeploymentManifest::load_from_file(&path)?;

    tracing::info!(
        scenario = %manifest.scenario,
        network = %manifest.network,
        deployed_at = %manifest.deployed_at,
        "Loaded deployment manifest"
    );

    let mut stdout = std::io::stdout().lock();
    for line in Reporter::lines(&manifest.to_table()?) {
        writeln!(stdout, "{line}")?;
    }

    Ok(())
}
