//! OrangeFlow - Main Entry Point
//!
//! Starts the HTTP server or runs the pipeline once from the command line.

use clap::Parser;
use orangeflow::cli::{cmd_run, cmd_serve, Cli, Commands, RunOptions};
use orangeflow::server::ServerConfig;
use orangeflow::training::{ModelParams, SplitConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orangeflow=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { port, host }) => {
            cmd_serve(&host, port).await?;
        }
        Some(Commands::Run {
            file,
            target,
            features,
            scaling,
            missing,
            test_size,
            seed,
            no_stratify,
            model,
            max_depth,
            c,
            svg,
        }) => {
            let options = RunOptions {
                target,
                features,
                scaling,
                missing,
                split: SplitConfig::default()
                    .with_test_size(test_size)
                    .with_random_state(seed)
                    .with_stratify(!no_stratify),
                model,
                params: ModelParams::default().with_c(c).with_max_depth(max_depth),
                svg,
            };
            cmd_run(&file, &options)?;
        }
        None => {
            // Default: serve with the environment's host and port
            let config = ServerConfig::default();
            cmd_serve(&config.host, config.port).await?;
        }
    }

    Ok(())
}
