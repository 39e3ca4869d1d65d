use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use sigadopt::cli::{
    Commands, load_config, run_classify, run_clean, run_init, run_stage, run_summary,
};
use sigadopt::error::Error;

#[derive(Parser)]
#[command(name = "sigadopt")]
#[command(about = "Tracks signing adoption across package registries", long_about = None)]
struct Cli {
    /// Pipeline config file (TOML)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Data directory for the database; overrides the config file
    #[arg(long, global = true)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sigadopt=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.data_dir.as_deref())?;

    let result = match cli.command {
        Commands::Init => run_init(&config),
        Commands::Run(args) => run_stage(&config, args),
        Commands::Clean {
            registry,
            level,
            yes,
            non_interactive,
        } => run_clean(&config, registry, level, yes, non_interactive),
        Commands::Summary { registry, json } => run_summary(&config, registry, json),
        Commands::Classify { file, packets } => run_classify(file, packets),
    };

    if let Err(err) = &result {
        if let Some(Error::RateLimited(source)) = err.downcast_ref::<Error>() {
            error!(%source, "Rate limited; stopping. Resume with --start at the last logged position");
        }
    }
    result
}
