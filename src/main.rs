use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mapmycode::batch::BatchProcessor;
use mapmycode::config::load_config;
use mapmycode::lang::list_functions;
use mapmycode::log::StderrLog;
use mapmycode::scanner::{collect_entries, read_uploads};
use mapmycode::server::run_stdio_server;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "mapmycode")]
#[command(version)]
#[command(about = "Per-file call graphs for Python, JavaScript/TypeScript, shell and Java sources")]
struct Cli {
    /// Files or directories to map (directories are walked, honouring .gitignore)
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// List the functions of a single Python file with their line and docstring
    #[arg(long, value_name = "FILE_PATH", conflicts_with = "paths")]
    functions: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve line-delimited JSON requests on stdin/stdout
    Serve,
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let root = std::env::current_dir().context("Failed to get current dir")?;
    let cfg = load_config(&root);
    let log = Arc::new(StderrLog);

    if matches!(cli.cmd, Some(Command::Serve)) {
        return run_stdio_server(cfg, log);
    }

    if let Some(p) = cli.functions {
        let abs = if p.is_absolute() { p } else { root.join(&p) };
        let text = std::fs::read_to_string(&abs)
            .with_context(|| format!("Failed to read {}", abs.display()))?;
        let functions = list_functions(&text)
            .with_context(|| format!("Failed to parse {}", abs.display()))?;
        return print_json(&json!({ "functions": functions }), cli.pretty);
    }

    let targets = if cli.paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        cli.paths
    };
    let entries = collect_entries(&root, &targets, &cfg.scan)?;
    let uploads = read_uploads(&entries, cfg.max_files).context("Batch rejected")?;

    let processor = BatchProcessor::new(cfg, log);
    let call_graph = processor.process(&uploads).context("Batch rejected")?;
    print_json(&json!({ "call_graph": call_graph }), cli.pretty)
}
