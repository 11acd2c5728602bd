use arbiter::{cli, errors};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!cli.no_color)
        .init();

    let result = match cli.command {
        cli::Commands::Submit(args) => cli::submit::handle_submit(args).await,
        cli::Commands::Report(args) => cli::report::handle_report(args).await,
        cli::Commands::Validate(args) => handle_validate(args).await,
    };

    match result {
        Ok(()) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            let exit_code = match &e {
                errors::TriageError::Config(_) => 2,
                errors::TriageError::Validation(_) => 3,
                errors::TriageError::Authentication(_) => 4,
                errors::TriageError::Database(_) => 5,
                _ => 1,
            };
            std::process::exit(exit_code);
        }
    }
}

async fn handle_validate(args: cli::commands::ValidateArgs) -> Result<(), errors::TriageError> {
    let path = std::path::PathBuf::from(&args.config);
    let _config = arbiter::config::parse_config(&path).await?;
    println!("Configuration is valid: {}", args.config);
    Ok(())
}
