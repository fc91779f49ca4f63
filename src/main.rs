use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use songdown::pipeline::Collaborators;
use songdown::{utils, Cli, Commands, Config, Pipeline, RunOutcome, TerminalSession, Workspace};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they never interleave with the prompts on stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_directive().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load().await?;

    match cli.selected_command() {
        Commands::Get { query } => {
            let missing_deps = utils::check_dependencies(&config.tools).await;
            if !missing_deps.is_empty() {
                eprintln!("⚠️  Dependency check warnings:");
                for dep in missing_deps {
                    eprintln!("   • {}", dep);
                }
                eprintln!("   (Continuing anyway - tools may be available)");
            }

            let workspace = Workspace::new(std::env::current_dir()?);
            let providers = Collaborators::from_config(&config);
            let pipeline = Pipeline::new(config, workspace, providers).with_progress(!cli.quiet);

            let mut session = TerminalSession::new();
            let result = pipeline.run(&mut session, query).await;
            drop(session);

            match result {
                Ok(RunOutcome::Completed { output }) => {
                    tracing::info!("Saved {}", output.display());
                }
                Ok(RunOutcome::NothingFound) => {
                    tracing::debug!("Nothing selected");
                }
                Err(err) => {
                    eprintln!("{} stage failed: {}", err.stage(), err);
                    std::process::exit(1);
                }
            }
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                println!("Edit the configuration file to change settings:");
                println!("  {}", Config::config_path()?.display());
            }
        }
        Commands::Deps => {
            let missing_deps = utils::check_dependencies(&config.tools).await;
            if missing_deps.is_empty() {
                println!("All external tools are available:");
                println!("  • {}", config.tools.yt_dlp);
                println!("  • {}", config.tools.ffmpeg);
            } else {
                println!("Missing external tools:");
                for dep in missing_deps {
                    println!("  • {}", dep);
                }
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
