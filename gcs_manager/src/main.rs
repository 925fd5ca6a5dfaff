use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::*;
use gcs_core::{
    format_plugin_options, format_plugin_versions, ManagerConfig, PluginArguments, PluginManager,
    PluginSpec, PluginState,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Plugin directories tried next to the executable when none is configured
const DEFAULT_PLUGIN_DIRS: &[&str] = &["../lib/gcs/plugins", "plugins"];

#[derive(Parser)]
#[command(name = "gcs")]
#[command(about = "GCS - ground control station plugin host")]
#[command(disable_version_flag = true)]
struct Cli {
    /// Print the launcher, core and plugin versions and exit
    #[arg(short = 'V', long = "version")]
    version: bool,

    /// List the options the discovered plugins accept and exit
    #[arg(long = "plugin-help")]
    plugin_help: bool,

    /// Manager configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Additional plugin directory, may be repeated
    #[arg(long = "plugin-path", value_name = "DIR")]
    plugin_dirs: Vec<PathBuf>,

    /// List discovered plugins and exit
    #[arg(short = 'l', long = "list")]
    list: bool,

    /// Print the effective configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,

    /// Plugin arguments after `--`: -noload, -test, -pluginpath, -p
    #[arg(last = true, value_name = "ARGS")]
    args: Vec<String>,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gcs_core=info,gcs=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let mut config = match &cli.config {
        Some(path) => ManagerConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => ManagerConfig::default(),
    };

    let args = PluginArguments::parse(cli.args).context("Invalid plugin arguments")?;
    config
        .plugin_paths
        .extend(cli.plugin_dirs.iter().chain(args.plugin_paths()).cloned());
    if config.plugin_paths.is_empty() {
        match default_plugin_dir() {
            Some(dir) => config.plugin_paths.push(dir),
            None if cli.version => {}
            None => bail!("No plugin directory configured, use --plugin-path or -pluginpath"),
        }
    }

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(0);
    }

    let mut manager = PluginManager::with_defaults(config);
    manager.discover();

    if cli.version {
        println!("gcs {}", env!("CARGO_PKG_VERSION"));
        print!("{}", format_plugin_versions(&manager.registry()));
        return Ok(0);
    }

    if cli.plugin_help {
        let options = format_plugin_options(&manager.registry());
        if options.is_empty() {
            println!("{}", "No plugin declares options".yellow());
        } else {
            println!("Pass plugin options after `--`, for example `gcs -- -p <option>=<value>`\n");
            print!("{}", options);
        }
        return Ok(0);
    }

    if cli.list {
        print_plugins(&manager);
        return Ok(0);
    }

    if !args.free_arguments().is_empty() {
        tracing::debug!("Host arguments: {:?}", args.free_arguments());
    }
    manager.apply_arguments(&args)?;
    manager.load_plugins()?;
    print_failures(&manager);

    let missing = manager.missing_required();
    if !missing.is_empty() {
        eprintln!(
            "{} Required plugins not running: {}",
            "Error:".red().bold(),
            missing.join(", ")
        );
        manager.shutdown()?;
        return Ok(1);
    }

    if let Some(report) = manager.run_tests()? {
        for name in &report.passed {
            println!("  {} {}", "PASS".green(), name);
        }
        for (name, reason) in &report.failed {
            println!("  {} {}: {}", "FAIL".red(), name, reason);
        }
        println!("{} of {} self tests passed", report.passed.len(), report.total());
        manager.shutdown()?;
        return Ok(if report.is_success() { 0 } else { 1 });
    }

    wait_for_interrupt()?;
    println!("\n{}", "Shutting down plugins...".yellow());
    manager.shutdown()?;
    Ok(0)
}

/// First existing default plugin directory relative to the executable
fn default_plugin_dir() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let base = exe.parent()?;
    DEFAULT_PLUGIN_DIRS
        .iter()
        .map(|dir| base.join(dir))
        .find(|dir| dir.is_dir())
}

fn wait_for_interrupt() -> Result<()> {
    let (tx, rx) = crossbeam::channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })
    .context("Failed to set Ctrl-C handler")?;

    println!("Plugins running, press Ctrl+C to exit");
    rx.recv().context("Interrupt channel closed")?;
    Ok(())
}

fn state_label(spec: &PluginSpec) -> ColoredString {
    let label = spec.state().to_string();
    match spec.state() {
        PluginState::Invalid => label.red(),
        PluginState::Running => label.green(),
        _ if !spec.is_enabled() => label.dimmed(),
        _ => label.yellow(),
    }
}

fn print_plugins(manager: &PluginManager) {
    let registry = manager.registry();
    if registry.is_empty() {
        println!("{}", "No plugins found".yellow());
        return;
    }

    println!(
        "{:<24} {:<10} {:<12} {:<8} {}",
        "NAME".bold(),
        "VERSION".bold(),
        "STATE".bold(),
        "ENABLED".bold(),
        "DESCRIPTOR".bold()
    );
    for spec in registry.all() {
        println!(
            "{:<24} {:<10} {:<12} {:<8} {}",
            spec.name(),
            spec.version().to_string(),
            state_label(spec),
            if spec.is_enabled() { "yes" } else { "no" },
            spec.descriptor_path().display()
        );
        if let Some(error) = spec.error() {
            println!("    {}", error.to_string().dimmed());
        }
    }
}

fn print_failures(manager: &PluginManager) {
    let registry = manager.registry();
    let failed = registry.failed();
    if failed.is_empty() {
        return;
    }

    eprintln!("{} {} plugins failed to load:", "Warning:".yellow().bold(), failed.len());
    for spec in failed {
        if let Some(error) = spec.error() {
            eprintln!("  {} {}", spec.name().red(), error);
        }
    }
}
