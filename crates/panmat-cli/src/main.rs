//! panmat CLI.
//!
//! Drives the panMat engine from the command line through an in-memory host
//! workspace: load a netlist, run simulator commands and print results.

mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use panmat_commands::Frontend;
use panmat_core::{ERROR_CELL, HostValue, Scope, Workspace, read_status};
use panmat_engine::{BridgeConfig, ModuleRegistry, ffi};

#[derive(Parser)]
#[command(name = "panmat")]
#[command(about = "Drive the panMat simulator engine from the command line")]
#[command(version)]
struct Cli {
    /// Directory holding the engine module (overrides PAN_MAT_SHL_PATH)
    #[arg(long, global = true)]
    module_dir: Option<PathBuf>,

    /// File name of the engine module
    #[arg(long, global = true)]
    module_name: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a netlist and run simulator commands against it
    Run {
        /// Netlist file followed by any engine arguments
        #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        netlist: Vec<String>,

        /// Simulator command to run after loading (repeatable)
        #[arg(short = 'c', long = "exec")]
        exec: Vec<String>,

        /// Result to read back and print (repeatable)
        #[arg(short, long)]
        get: Vec<String>,

        /// Define a caller variable NAME=VALUE the engine can read (repeatable)
        #[arg(short = 'D', long = "define", value_parser = parse_define)]
        define: Vec<(String, f64)>,

        /// Turn host redraws on or off
        #[arg(long, value_parser = ["on", "off"])]
        redraw: Option<String>,

        /// Collect engine codes in the MPanerror channel instead of failing
        #[arg(long)]
        keep_going: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the engine module can be found and loaded
    Check,
}

fn parse_define(arg: &str) -> std::result::Result<(String, f64), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", arg))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid value for {}: {}", name, e))?;
    Ok((name.trim().to_string(), value))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let mut config = BridgeConfig::from_env();
    if let Some(dir) = cli.module_dir {
        config = config.with_module_dir(dir);
    }
    if let Some(name) = cli.module_name {
        config = config.with_module_name(name);
    }

    let result = match cli.command {
        Commands::Run {
            netlist,
            exec,
            get,
            define,
            redraw,
            keep_going,
            json,
        } => cmd_run(
            config,
            RunOptions {
                netlist,
                exec,
                get,
                define,
                redraw,
                keep_going,
                json,
            },
        ),
        Commands::Check => cmd_check(config),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

struct RunOptions {
    netlist: Vec<String>,
    exec: Vec<String>,
    get: Vec<String>,
    define: Vec<(String, f64)>,
    redraw: Option<String>,
    keep_going: bool,
    json: bool,
}

fn cmd_run(config: BridgeConfig, options: RunOptions) -> Result<ExitCode> {
    let mut workspace = Workspace::new();
    for (name, value) in &options.define {
        workspace = workspace.with_variable(Scope::Caller, name, *value);
    }
    if options.keep_going {
        workspace = workspace.with_variable(Scope::Global, ERROR_CELL, 0.0);
    }
    let workspace = Rc::new(workspace);
    let frontend = Rc::new(Frontend::new(config, workspace.clone()));
    frontend.register_commands(&workspace);

    let echo = |workspace: &Workspace| {
        let text = workspace.take_output();
        if !text.is_empty() && !options.json {
            print!("{}", text);
        }
    };

    let command_line = options.netlist.join(" ");
    let loaded = frontend.pannet(&[HostValue::from(command_line.as_str())], 0);
    echo(&workspace);
    loaded.with_context(|| format!("loading '{}'", command_line))?;

    if let Some(flag) = &options.redraw {
        frontend.panredraw(&[HostValue::from(flag.as_str())], 0)?;
    }

    for command in &options.exec {
        let outcome = frontend.pansimc(&[HostValue::from(command.as_str())], 0);
        echo(&workspace);
        let outcome = outcome.with_context(|| format!("running '{}'", command))?;
        log::debug!("{}: {:?}", command, outcome);
    }

    let mut results = Vec::with_capacity(options.get.len());
    for name in &options.get {
        let value = frontend
            .panget(&[HostValue::from(name.as_str())], 1)
            .with_context(|| format!("reading '{}'", name))?;
        results.push((name.clone(), value));
    }

    let status = read_status(workspace.as_ref());
    if options.json {
        let values: serde_json::Map<String, serde_json::Value> = results
            .iter()
            .map(|(name, value)| -> Result<(String, serde_json::Value)> {
                Ok((name.clone(), serde_json::to_value(value)?))
            })
            .collect::<Result<_>>()?;
        let report = serde_json::json!({
            "module": frontend.config().module_path(),
            "status": status,
            "values": values,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for (name, value) in &results {
            print!("{}", output::format_value(name, value));
        }
        if let Some(code) = status {
            println!("{} = {}", ERROR_CELL, code);
        }
    }

    Ok(match status {
        Some(code) if code != 0.0 => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

fn cmd_check(config: BridgeConfig) -> Result<ExitCode> {
    let path = config.module_path();
    println!("module: {}", path.display());
    if !path.exists() {
        bail!("{} does not exist", path.display());
    }

    let handle = ModuleRegistry::with_global(|registry| registry.load(&path))
        .map_err(|e| anyhow!("{}", e))?;

    let required = [
        ffi::INITIALISE_GLOBALS,
        ffi::REGISTER_HOST,
        ffi::MATLAB_PAN_INIT,
        ffi::EXECUTE_COMMAND,
        ffi::GET_VALUE,
        ffi::REDRAW,
        ffi::DELETE_WAVEFORM,
    ];
    let optional = [ffi::READ_RAW_FILE, ffi::RECORD_ALLOCATION];

    let mut missing = 0;
    for symbol in required {
        let present = handle.has_symbol(symbol);
        if !present {
            missing += 1;
        }
        println!("  {:<26} {}", symbol.to_string_lossy(), if present { "ok" } else { "MISSING" });
    }
    for symbol in optional {
        let present = handle.has_symbol(symbol);
        println!(
            "  {:<26} {}",
            symbol.to_string_lossy(),
            if present { "ok" } else { "absent (optional)" }
        );
    }
    ModuleRegistry::with_global(ModuleRegistry::unload);

    if missing == 0 {
        println!("module loads and exports every entry point");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{} required entry point(s) missing", missing);
        Ok(ExitCode::FAILURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_define() {
        assert_eq!(parse_define("tstop=1e-6").unwrap(), ("tstop".to_string(), 1e-6));
        assert_eq!(parse_define(" R = 50 ").unwrap(), ("R".to_string(), 50.0));
        assert!(parse_define("R").is_err());
        assert!(parse_define("R=abc").is_err());
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "panmat", "--module-dir", "/opt/pan", "run", "-c", "tran", "--get", "v(out)",
            "-D", "tstop=1e-6", "--json", "deck.pan", "-o",
        ])
        .unwrap();
        assert_eq!(cli.module_dir, Some(PathBuf::from("/opt/pan")));
        match cli.command {
            Commands::Run {
                netlist,
                exec,
                get,
                define,
                json,
                ..
            } => {
                assert_eq!(netlist, vec!["deck.pan", "-o"]);
                assert_eq!(exec, vec!["tran"]);
                assert_eq!(get, vec!["v(out)"]);
                assert_eq!(define, vec![("tstop".to_string(), 1e-6)]);
                assert!(json);
            }
            Commands::Check => panic!("expected run"),
        }
    }

    #[test]
    fn test_check_reports_missing_module() {
        let dir = std::env::temp_dir().join("panmat-cli-no-such-dir");
        let config = BridgeConfig::default().with_module_dir(dir);
        assert!(cmd_check(config).is_err());
    }
}
