use std::path::PathBuf;
use std::sync::Arc;

use console::style;
use tracing::info;

use crate::cli::commands::SubmitArgs;
use crate::config::{self, TriageConfig};
use crate::errors::TriageError;
use crate::models::{FindingSubmission, TriageReport};
use crate::oracle;
use crate::store::Database;
use crate::triage::TriageOrchestrator;

pub async fn handle_submit(args: SubmitArgs) -> Result<(), TriageError> {
    info!(task = %args.task, agent = %args.agent, input = %args.input, "Submitting findings");

    let config = load_config(args.config.as_deref()).await?;
    config::parser::validate_semantics(&config)?;

    let content = tokio::fs::read_to_string(&args.input).await?;
    let submissions: Vec<FindingSubmission> = serde_json::from_str(&content)?;

    let db_path = args.db.clone().unwrap_or_else(|| config.db_path());
    let store = Arc::new(Database::new(&db_path)?);

    let mut oracle_config = config.oracle.clone().unwrap_or_default();
    if let Some(provider) = &args.similarity_provider {
        oracle_config.similarity_provider = Some(provider.clone());
    }
    let similarity = oracle::create_similarity_oracle(&oracle_config)?;
    let verdict = oracle::create_verdict_oracle(&oracle_config)?;

    let orchestrator = TriageOrchestrator::new(store, similarity, verdict, &config);
    let report = orchestrator
        .process_submission(&args.task, &args.agent, submissions)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

async fn load_config(path: Option<&str>) -> Result<TriageConfig, TriageError> {
    match path {
        Some(p) => config::parse_config(&PathBuf::from(p)).await,
        None => Ok(TriageConfig::default()),
    }
}

fn print_report(report: &TriageReport) {
    println!();
    println!(
        "{} task {} / agent {}",
        style("Triage report:").bold(),
        report.task_id,
        report.agent_id
    );
    println!("  received          {}", report.received);
    println!("  new               {}", report.new);
    println!("  already reported  {}", style(report.already_reported).yellow());
    println!("  similar valid     {}", style(report.similar_valid).cyan());
    println!("  unique valid      {}", style(report.unique_valid).green());
    println!("  disputed          {}", style(report.disputed).red());
    println!("  pending (retry)   {}", report.pending);
    if report.demoted > 0 {
        println!("  demoted           {}", report.demoted);
    }
    if report.carryover_evaluated > 0 {
        println!("  carryover         {}", report.carryover_evaluated);
    }
    println!();
    for finding in &report.findings {
        println!(
            "  [{}] {} ({})",
            style(finding.status.as_str()).bold(),
            finding.title,
            finding.finding_id
        );
        if let Some(comment) = &finding.evaluation_comment {
            if let Some(first_line) = comment.lines().next() {
                println!("      {}", style(first_line).dim());
            }
        }
    }
}
