//! `dimspect config` command - Configuration management
//!
//! Provides commands to view and modify dimspect configuration.

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use serde_yml::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::helpers::print_structured;
use crate::cli::GlobalOpts;
use crate::core::config::PROJECT_CONFIG_FILE;
use crate::core::Config;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show(ShowArgs),

    /// Set a configuration value
    Set(SetArgs),

    /// Unset (remove) a configuration value
    Unset(UnsetArgs),

    /// Show paths to configuration files
    Path,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Show only this key's value (dotted, e.g. tolerance.abs_tol_mm)
    pub key: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Configuration key (dotted, e.g. calibration.bearing.mm)
    pub key: String,

    /// Value to set, parsed as YAML
    pub value: String,

    /// Set in global (user) config instead of ./dimspect.yaml
    #[arg(long, short = 'g')]
    pub global: bool,
}

#[derive(clap::Args, Debug)]
pub struct UnsetArgs {
    /// Configuration key to remove
    pub key: String,

    /// Remove from global (user) config instead of ./dimspect.yaml
    #[arg(long, short = 'g')]
    pub global: bool,
}

/// Run a config subcommand
pub fn run(cmd: ConfigCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ConfigCommands::Show(args) => run_show(args, global),
        ConfigCommands::Set(args) => run_set(args),
        ConfigCommands::Unset(args) => run_unset(args),
        ConfigCommands::Path => run_path(),
    }
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let config = Config::load()?;

    if let Some(key) = &args.key {
        let root = serde_yml::to_value(&config).into_diagnostic()?;
        let value = lookup(&root, key).ok_or_else(|| miette::miette!("Unknown key '{}'", key))?;
        if !print_structured(value, global.format)? {
            print!("{}", serde_yml::to_string(value).into_diagnostic()?);
        }
        return Ok(());
    }

    if !print_structured(&config, global.format)? {
        print!("{}", config.to_yaml().into_diagnostic()?);
    }
    Ok(())
}

fn run_set(args: SetArgs) -> Result<()> {
    let config_path = target_path(args.global)?;
    let mut root = read_layer(&config_path)?;
    let value: Value = serde_yml::from_str(&args.value).into_diagnostic()?;

    set_nested_value(&mut root, &args.key, value)?;
    validate(&root)?;
    write_layer(&config_path, &root)?;

    let scope = if args.global { "global" } else { "project" };
    println!(
        "{} Set {} {} {} in {} config",
        style("✓").green(),
        style(&args.key).cyan(),
        style("→").dim(),
        style(&args.value).yellow(),
        scope
    );
    Ok(())
}

fn run_unset(args: UnsetArgs) -> Result<()> {
    let config_path = target_path(args.global)?;
    if !config_path.exists() {
        return Err(miette::miette!(
            "Config file does not exist: {}",
            config_path.display()
        ));
    }

    let mut root = read_layer(&config_path)?;
    if !unset_nested_value(&mut root, &args.key) {
        return Err(miette::miette!("Key '{}' not found in config", args.key));
    }
    write_layer(&config_path, &root)?;

    let scope = if args.global { "global" } else { "project" };
    println!(
        "{} Removed {} from {} config",
        style("✓").green(),
        style(&args.key).cyan(),
        scope
    );
    Ok(())
}

fn run_path() -> Result<()> {
    println!("{}", style("Configuration files (later wins):").bold());
    println!();
    for (label, path) in [
        ("Global:", Config::global_config_path()),
        ("Project:", Some(PathBuf::from(PROJECT_CONFIG_FILE))),
    ] {
        match path {
            Some(path) => {
                let state = if path.exists() {
                    style("(exists)").green()
                } else {
                    style("(not created)").dim()
                };
                println!("  {:<9} {} {}", style(label).cyan(), path.display(), state);
            }
            None => println!("  {:<9} {}", style(label).cyan(), style("(unavailable)").dim()),
        }
    }
    println!();
    println!(
        "{}",
        style("Environment: DIMSPECT_ABS_TOL_MM, DIMSPECT_REL_TOL_PCT").dim()
    );
    Ok(())
}

// Helper functions

fn target_path(global: bool) -> Result<PathBuf> {
    if global {
        Config::global_config_path()
            .ok_or_else(|| miette::miette!("Could not determine global config directory"))
    } else {
        Ok(PathBuf::from(PROJECT_CONFIG_FILE))
    }
}

fn read_layer(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Ok(Value::Mapping(Default::default()));
    }
    let content = fs::read_to_string(path).into_diagnostic()?;
    let parsed: Value = serde_yml::from_str(&content).into_diagnostic()?;
    if parsed.is_null() {
        Ok(Value::Mapping(Default::default()))
    } else {
        Ok(parsed)
    }
}

fn write_layer(path: &Path, root: &Value) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).into_diagnostic()?;
    }
    let yaml = serde_yml::to_string(root).into_diagnostic()?;
    fs::write(path, yaml).into_diagnostic()
}

/// Reject a layer that would no longer load
fn validate(root: &Value) -> Result<()> {
    Config::from_layers([root.clone()])?;
    Ok(())
}

fn lookup<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.')
        .try_fold(root, |current, part| current.get(part))
}

fn set_nested_value(root: &mut Value, key: &str, value: Value) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    let (last, parents) = parts
        .split_last()
        .ok_or_else(|| miette::miette!("Empty key"))?;

    let mut current = root;
    for part in parents {
        let Value::Mapping(map) = current else {
            return Err(miette::miette!("'{}' is not a section", part));
        };
        current = map
            .entry(Value::String(part.to_string()))
            .or_insert_with(|| Value::Mapping(Default::default()));
    }
    match current {
        Value::Mapping(map) => {
            map.insert(Value::String(last.to_string()), value);
            Ok(())
        }
        _ => Err(miette::miette!("Cannot set '{}' inside a scalar value", key)),
    }
}

fn unset_nested_value(root: &mut Value, key: &str) -> bool {
    let parts: Vec<&str> = key.split('.').collect();
    let Some((last, parents)) = parts.split_last() else {
        return false;
    };

    let mut current = root;
    for part in parents {
        match current.get_mut(*part) {
            Some(next) => current = next,
            None => return false,
        }
    }
    match current {
        Value::Mapping(map) => map.remove(*last).is_some(),
        _ => false,
    }
}
