//! tabserve - Main Entry Point

use clap::Parser;
use tabserve::cli::{cmd_predict, cmd_serve, cmd_train, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tabserve=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { service, host, port } => {
            cmd_serve(service, &host, port).await?;
        }
        Commands::Train { data, model_type, model_params, target, columns_to_drop, model_dir } => {
            cmd_train(
                &data,
                &model_type,
                &model_params,
                target.as_deref(),
                columns_to_drop.as_deref(),
                &model_dir,
            )?;
        }
        Commands::Predict { data, columns_to_drop, model_dir, output } => {
            cmd_predict(&data, columns_to_drop.as_deref(), &model_dir, output.as_deref())?;
        }
    }

    Ok(())
}
