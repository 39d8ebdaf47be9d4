use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use prep_core::{init_logging, AppDirs, Config};
use prep_plugin::{
    BuildParams, EnvBlock, HookRequest, InstallParams, PackageIdentity, PluginHost,
    PluginManifest, ResolverParams, MANIFEST_FILE,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(name = "prep", version, about = "Run prep plugin lifecycle hooks")]
struct Cli {
    /// Config file (defaults to config.toml in the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Print plugin output that is not an ECHO frame
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one hook of the plugin installed in PLUGIN_DIR
    Hook {
        plugin_dir: PathBuf,
        #[command(subcommand)]
        hook: HookCommand,
    },
    /// Plugin management commands
    #[command(subcommand)]
    Plugins(PluginsCommand),
}

#[derive(Debug, Subcommand)]
enum PluginsCommand {
    /// List plugins in DIR (defaults to the configured plugins directory)
    List { dir: Option<PathBuf> },
}

#[derive(Debug, Subcommand)]
enum HookCommand {
    Load,
    Build(BuildArgs),
    Install(InstallArgs),
    Remove,
    Resolve(ResolveArgs),
}

#[derive(Debug, Args)]
struct PackageArgs {
    #[arg(long)]
    package: String,
    #[arg(long = "package-version")]
    package_version: String,
}

#[derive(Debug, Args)]
struct EnvArgs {
    /// Environment assignment passed to the plugin (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_assignment)]
    env: Vec<(String, String)>,
}

#[derive(Debug, Args)]
struct BuildArgs {
    #[command(flatten)]
    package: PackageArgs,
    #[arg(long)]
    source: String,
    #[arg(long)]
    build: String,
    #[arg(long)]
    install: String,
    #[arg(long, default_value = "")]
    options: String,
    #[command(flatten)]
    env: EnvArgs,
}

#[derive(Debug, Args)]
struct InstallArgs {
    #[command(flatten)]
    package: PackageArgs,
    #[arg(long)]
    repository: String,
    #[command(flatten)]
    env: EnvArgs,
}

#[derive(Debug, Args)]
struct ResolveArgs {
    #[arg(long)]
    path: String,
    #[arg(long)]
    location: String,
    #[command(flatten)]
    env: EnvArgs,
}

#[derive(Debug, Error, PartialEq, Eq)]
enum AssignmentError {
    #[error("expected KEY=VALUE, got {0:?}")]
    MissingSeparator(String),
    #[error("environment key is empty in {0:?}")]
    EmptyKey(String),
    #[error("only one '=' is allowed in {0:?}; plugins drop such assignments")]
    ExtraSeparator(String),
}

fn parse_assignment(raw: &str) -> Result<(String, String), AssignmentError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| AssignmentError::MissingSeparator(raw.to_string()))?;
    if key.trim().is_empty() {
        return Err(AssignmentError::EmptyKey(raw.to_string()));
    }
    if value.contains('=') {
        return Err(AssignmentError::ExtraSeparator(raw.to_string()));
    }
    Ok((key.trim().to_string(), value.trim().to_string()))
}

impl PackageArgs {
    fn identity(self) -> PackageIdentity {
        PackageIdentity {
            package: self.package,
            version: self.package_version,
        }
    }
}

impl EnvArgs {
    fn block(self) -> EnvBlock {
        self.env.into_iter().collect()
    }
}

impl HookCommand {
    fn into_request(self) -> HookRequest {
        match self {
            HookCommand::Load => HookRequest::Load,
            HookCommand::Remove => HookRequest::Remove,
            HookCommand::Build(args) => HookRequest::Build(BuildParams {
                identity: args.package.identity(),
                source_path: args.source,
                build_path: args.build,
                install_path: args.install,
                build_opts: args.options,
                env: args.env.block(),
            }),
            HookCommand::Install(args) => HookRequest::Install(InstallParams {
                identity: args.package.identity(),
                repository: args.repository,
                env: args.env.block(),
            }),
            HookCommand::Resolve(args) => HookRequest::Resolve(ResolverParams {
                path: args.path,
                location: args.location,
                env: args.env.block(),
            }),
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let dirs = AppDirs::discover()?;
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&dirs)?,
    };
    let _logging = init_logging(&config.logging, &dirs)?;
    let verbose = cli.verbose || config.verbose;

    match cli.command {
        Command::Hook { plugin_dir, hook } => run_hook(&plugin_dir, hook.into_request(), verbose),
        Command::Plugins(PluginsCommand::List { dir }) => {
            let dir = dir.unwrap_or_else(|| config.plugins_dir(&dirs));
            print_plugins(&dir)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_hook(plugin_dir: &Path, request: HookRequest, verbose: bool) -> Result<ExitCode> {
    let host = PluginHost::load(plugin_dir)
        .with_context(|| format!("failed to load plugin from {}", plugin_dir.display()))?
        .with_verbose(verbose);

    tracing::info!(
        plugin = %host.name(),
        version = %host.manifest().version,
        hook = %request.kind(),
        "running plugin hook"
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let outcome = host
        .execute(&request, &mut out)
        .with_context(|| format!("{} hook of plugin {} failed", request.kind(), host.name()))?;

    for value in &outcome.returns {
        writeln!(out, "{value}")?;
    }
    out.flush()?;

    Ok(exit_code(outcome.exit_code))
}

/// Mirrors the plugin's status; a signal-terminated plugin counts as failure.
fn exit_code(code: Option<i32>) -> ExitCode {
    match code.map(u8::try_from) {
        Some(Ok(code)) => ExitCode::from(code),
        _ => ExitCode::FAILURE,
    }
}

#[derive(Debug)]
struct PluginSummary {
    name: String,
    manifest: Result<PluginManifest, String>,
    valid: bool,
}

fn list_plugins(dir: &Path) -> Result<Vec<PluginSummary>> {
    let mut summaries = Vec::new();
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to list plugins in {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if !path.join(MANIFEST_FILE).is_file() {
            continue;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let summary = match PluginHost::load(&path) {
            Ok(host) => PluginSummary {
                name,
                valid: host.is_valid(),
                manifest: Ok(host.manifest().clone()),
            },
            Err(err) => PluginSummary {
                name,
                valid: false,
                manifest: Err(err.to_string()),
            },
        };
        summaries.push(summary);
    }
    summaries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(summaries)
}

fn print_plugins(dir: &Path) -> Result<()> {
    let plugins = list_plugins(dir)?;
    if plugins.is_empty() {
        println!("No plugins found in {}.", dir.display());
        return Ok(());
    }
    for plugin in plugins {
        match &plugin.manifest {
            Ok(manifest) => {
                let mut flags = Vec::new();
                if !manifest.enabled {
                    flags.push("disabled");
                }
                if !plugin.valid {
                    flags.push("not executable");
                }
                let suffix = if flags.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", flags.join(", "))
                };
                println!(
                    "{} [{}] {}{}",
                    plugin.name, manifest.kind, manifest.version, suffix
                );
            }
            Err(err) => println!("{}: {}", plugin.name, err),
        }
    }
    Ok(())
}
