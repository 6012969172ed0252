//! Player/Coach convergence loop CLI.
//!
//! `dada run` writes the requirements into a workspace and alternates a player
//! agent (implements) and a coach agent (reviews) until the coach approves or
//! the turn budget is spent.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::debug;

use dada::core::types::Credential;
use dada::exit_codes;
use dada::io::agent::CommandAgentRunner;
use dada::io::config::{DEFAULT_CONFIG_PATH, DadaConfig, load_config, write_config};
use dada::io::workspace::Workspace;
use dada::logging;
use dada::observer::ConsoleObserver;
use dada::session::Orchestrator;

#[derive(Parser)]
#[command(
    name = "dada",
    version,
    about = "Player/Coach convergence loop for coding agents"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a session until the coach approves or the turn budget is spent.
    Run {
        /// Requirements file, or `-` to read from stdin.
        #[arg(short, long)]
        requirements: String,
        /// Workspace root shared by both agents.
        #[arg(short, long, default_value = "workspace")]
        workspace: PathBuf,
        /// Override `max_turns` from the config file.
        #[arg(long)]
        max_turns: Option<u32>,
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
        /// Remove feedback left by an earlier session before starting.
        #[arg(long)]
        fresh: bool,
    },
    /// Write the default config file.
    Init {
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::ERROR);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            requirements,
            workspace,
            max_turns,
            config,
            fresh,
        } => cmd_run(&requirements, &workspace, max_turns, &config, fresh),
        Command::Init { config, force } => cmd_init(&config, force),
    }
}

fn cmd_run(
    requirements: &str,
    workspace: &Path,
    max_turns: Option<u32>,
    config_path: &Path,
    fresh: bool,
) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let requirements = read_requirements(requirements)?;
    let max_turns = max_turns.unwrap_or(cfg.max_turns);
    let credential = read_credential(&cfg);
    let root = std::path::absolute(workspace)
        .with_context(|| format!("resolve workspace {}", workspace.display()))?;
    debug!(root = %root.display(), max_turns, "starting run");

    let runner = CommandAgentRunner::new(&cfg);
    let orchestrator =
        Orchestrator::new(&runner, &cfg, credential, Workspace::new(root))?.fresh(fresh);
    let mut observer = ConsoleObserver::stdio();
    let outcome = orchestrator.run(&requirements, max_turns, &mut observer, |_| {})?;

    println!(
        "final: approved={} turns={} workspace={}",
        outcome.approved,
        outcome.turns_executed,
        outcome.workspace.display()
    );
    Ok(if outcome.approved {
        exit_codes::OK
    } else {
        exit_codes::NOT_APPROVED
    })
}

fn cmd_init(config_path: &Path, force: bool) -> Result<i32> {
    if !force && config_path.exists() {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    write_config(config_path, &DadaConfig::default())?;
    println!("wrote {}", config_path.display());
    Ok(exit_codes::OK)
}

fn read_requirements(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("read requirements from stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(source).with_context(|| format!("read requirements {source}"))
}

/// Credential from the configured environment variable; blank counts as absent.
fn read_credential(cfg: &DadaConfig) -> Option<Credential> {
    std::env::var(&cfg.credential_env)
        .ok()
        .and_then(Credential::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_defaults() {
        let cli = Cli::parse_from(["dada", "run", "--requirements", "req.md"]);
        let Command::Run {
            requirements,
            workspace,
            max_turns,
            config,
            fresh,
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(requirements, "req.md");
        assert_eq!(workspace, PathBuf::from("workspace"));
        assert_eq!(max_turns, None);
        assert_eq!(config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(!fresh);
    }

    #[test]
    fn parse_run_overrides() {
        let cli = Cli::parse_from([
            "dada",
            "run",
            "-r",
            "-",
            "-w",
            "/tmp/ws",
            "--max-turns",
            "3",
            "--fresh",
        ]);
        let Command::Run {
            requirements,
            workspace,
            max_turns,
            fresh,
            ..
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(requirements, "-");
        assert_eq!(workspace, PathBuf::from("/tmp/ws"));
        assert_eq!(max_turns, Some(3));
        assert!(fresh);
    }

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["dada", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true, .. }));
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("dada.toml");
        cmd_init(&path, false).expect("first init");
        assert!(cmd_init(&path, false).is_err());
        cmd_init(&path, true).expect("forced init");
        assert_eq!(load_config(&path).expect("load"), DadaConfig::default());
    }

    #[test]
    fn reads_requirements_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("req.md");
        fs::write(&path, "# Counter app\n").expect("write");
        let text = read_requirements(path.to_str().expect("utf8 path")).expect("read");
        assert_eq!(text, "# Counter app\n");
    }
}
