mod client;
mod cmd;
mod output;
mod sources;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use client::Client;
use cmd::{cmd_build, cmd_build_js, cmd_headers};
use output::OutputFormat;

/// c2wasm - build hooks to WebAssembly or bytecode on a c2wasm service
#[derive(Parser)]
#[command(name = "c2wasm")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Base URL of the build service
  #[arg(long, global = true, env = "C2WASM_CLI_HOST", default_value = "http://localhost:9000")]
  host: String,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build a C file, or every C file under a directory, to WebAssembly
  Build {
    /// A .c file or a directory to search for .c files
    in_path: PathBuf,

    /// Directory the artifacts and failure logs are written to
    out_dir: PathBuf,

    /// Directory of .h files sent with every build
    #[arg(long)]
    headers: Option<PathBuf>,
  },

  /// Build a JavaScript or TypeScript hook to bytecode
  BuildJs {
    /// A .js or .ts file
    file: PathBuf,

    /// Directory the artifact or failure log is written to
    out_dir: PathBuf,
  },

  /// Download the service's default headers
  Headers {
    /// Directory the headers are written to
    out_dir: PathBuf,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let filter = if cli.verbose {
    EnvFilter::new("c2wasm=debug,c2wasm_cli=debug")
  } else {
    EnvFilter::from_default_env()
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let client = Client::new(&cli.host);

  match cli.command {
    Commands::Build {
      in_path,
      out_dir,
      headers,
    } => cmd_build(&client, &in_path, &out_dir, headers.as_deref(), cli.output),
    Commands::BuildJs { file, out_dir } => cmd_build_js(&client, &file, &out_dir, cli.output),
    Commands::Headers { out_dir } => cmd_headers(&client, &out_dir, cli.output),
  }
}
