use std::path::PathBuf;

use console::style;

use crate::cli::commands::ReportArgs;
use crate::config::{self, TriageConfig};
use crate::errors::TriageError;
use crate::models::TaskSummary;
use crate::store::{Database, FindingStore};

pub async fn handle_report(args: ReportArgs) -> Result<(), TriageError> {
    let config = match &args.config {
        Some(p) => config::parse_config(&PathBuf::from(p)).await?,
        None => TriageConfig::default(),
    };

    let db_path = args.db.clone().unwrap_or_else(|| config.db_path());
    let store = Database::new(&db_path)?;

    let findings = store.list_by_task(&args.task).await?;
    let summary = TaskSummary::build(&args.task, &findings);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    println!("{} {}", style("Task summary:").bold(), summary.task_id);
    println!("  total findings  {}", summary.total_findings);

    let mut statuses: Vec<(&String, &usize)> = summary.status_distribution.iter().collect();
    statuses.sort();
    for (status, count) in statuses {
        println!("  {:16}{}", status, count);
    }

    if !summary.categories.is_empty() {
        println!();
        println!("{}", style("Similarity groups:").bold());
        for group in &summary.categories {
            println!(
                "  {} {} ({}, {} member{})",
                style(&group.category_id).cyan(),
                group.category,
                group.severity,
                group.count,
                if group.count == 1 { "" } else { "s" }
            );
            for title in &group.findings {
                println!("      - {}", title);
            }
        }
    }

    Ok(())
}
