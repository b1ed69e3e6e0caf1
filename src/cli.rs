use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
}

#[derive(Parser)]
#[command(name = "zipfix")]
#[command(
    about = "AI-assisted project patcher: upload a code archive, apply an instruction through a generative model, download the fixed ZIP"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress bars and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API server
    Serve(ServeArgs),

    /// One-shot fix round over a ZIP, a single file, or a directory
    Fix(FixArgs),

    /// Initialize a zipfix.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Parser)]
pub struct ServeArgs {
    /// Bind address (overrides config)
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[derive(Parser)]
pub struct FixArgs {
    /// Input path: .zip archive, single text file, or project directory
    pub input: String,

    /// Instruction for the model; empty means general cleanup
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Output path for the patched archive
    #[arg(short, long)]
    pub output: Option<String>,

    /// Model identifier override (e.g. gemini-1.5-pro)
    #[arg(long)]
    pub model: Option<String>,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory for the config file
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Write the script to stdout
    #[arg(long)]
    pub stdout: bool,

    /// Directory to write the completion file into
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}
