use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use py2cpp::error::{display_parse_error, display_transpile_error};
use py2cpp::parser::parse_module;
use py2cpp::transpile;

#[derive(Parser, Debug)]
#[command(name = "py2cpp", version, about = "Annotated Python subset to C++ transpiler")]
struct Cli {
    /// Python source file
    input: PathBuf,

    /// Output file for the translation unit. Defaults to stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Filename used in diagnostics. Defaults to the input path
    #[arg(long)]
    filename: Option<String>,

    /// Print the parsed AST instead of generating code
    #[arg(long, default_value_t = false)]
    dump_ast: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Returns `Ok(false)` when a diagnostic has already been reported.
fn run(cli: &Cli) -> Result<bool> {
    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    let filename = cli
        .filename
        .clone()
        .unwrap_or_else(|| cli.input.display().to_string());

    if cli.dump_ast {
        match parse_module(&source, &filename) {
            Ok(module) => println!("{:#?}", module),
            Err(error) => {
                display_parse_error(&source, &filename, &error)
                    .context("writing diagnostic")?;
                return Ok(false);
            }
        }
        return Ok(true);
    }

    let output = match transpile(&source, &filename) {
        Ok(output) => output,
        Err(error) => {
            display_transpile_error(&source, &filename, &error)
                .context("writing diagnostic")?;
            return Ok(false);
        }
    };

    match &cli.output {
        Some(path) => {
            fs::write(path, &output).with_context(|| format!("writing {}", path.display()))?;
            debug!(output = %path.display(), bytes = output.len(), "wrote translation unit");
        }
        None => print!("{}", output),
    }
    Ok(true)
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("error: {:#}", error);
            ExitCode::FAILURE
        }
    }
}
