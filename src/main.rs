use anyhow::Context;
use clap::Parser;
use specwarden::{
    cli::{Cli, Commands},
    commands, telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let telemetry_guard = telemetry::init_telemetry().context("Failed to initialize telemetry")?;

    match cli.command {
        Commands::Validate {
            document,
            declarations,
            spec_version,
            json,
            local,
        } => {
            let valid =
                commands::execute_validate(&document, &declarations, spec_version, json, local)
                    .await
                    .with_context(|| format!("Failed to validate {}", document.display()))?;
            if !valid {
                drop(telemetry_guard);
                std::process::exit(1);
            }
        }
        Commands::Resolve {
            document,
            pointer,
            format,
            output,
            local,
        } => {
            commands::execute_resolve(&document, pointer.as_deref(), format, output.as_deref(), local)
                .await
                .with_context(|| format!("Failed to resolve {}", document.display()))?;
        }
        Commands::Compose {
            document,
            model,
            format,
            output,
            local,
        } => {
            commands::execute_compose(&document, &model, format, output.as_deref(), local)
                .await
                .with_context(|| format!("Failed to compose {} from {}", model, document.display()))?;
        }
        Commands::Serve {
            document,
            bind,
            local,
        } => {
            commands::execute_serve(&document, bind.as_deref(), local)
                .await
                .with_context(|| format!("Failed to serve {}", document.display()))?;
        }
    }

    Ok(())
}
