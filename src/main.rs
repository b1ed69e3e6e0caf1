use anyhow::Result;
use clap::Parser;
use zipfix::cli::{AppContext, Cli, Commands};
use zipfix::core::error::{PipelineError, exit_code_for};

fn main() -> Result<()> {
    init_tracing();
    install_panic_hook();

    let cli = Cli::parse();

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
    };

    let result = match cli.command {
        Commands::Serve(args) => zipfix::server::run(&args, &ctx),
        Commands::Fix(args) => zipfix::core::pipeline::run(args, &ctx),
        Commands::Init(args) => zipfix::infra::config::init(args, &ctx),
        Commands::Completions(args) => zipfix::completion::run(args),
    };

    // Pipeline failures carry their own exit codes; everything else is
    // reported through anyhow's default formatting.
    if let Err(err) = result {
        if let Some(pipeline_err) = err.downcast_ref::<PipelineError>() {
            eprintln!("Error: {pipeline_err}");
            std::process::exit(exit_code_for(pipeline_err));
        }
        return Err(err);
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("ZIPFIX_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// The process state is untrustworthy after an uncaught panic; log it
/// and terminate, leaving the restart to the supervisor.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("uncaught panic: {info}");
        default_hook(info);
        std::process::exit(1);
    }));
}
