use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "arbiter", version, about = "Security finding triage and deduplication engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Triage a batch of findings from one agent
    Submit(SubmitArgs),
    /// Print the consolidated report for a task
    Report(ReportArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

#[derive(Args, Clone)]
pub struct SubmitArgs {
    /// Task identifier the findings are submitted against
    #[arg(short, long)]
    pub task: String,

    /// Agent identifier of the submitter
    #[arg(short, long)]
    pub agent: String,

    /// JSON file containing the ordered list of findings
    #[arg(short, long)]
    pub input: String,

    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// SQLite database path (overrides config)
    #[arg(long)]
    pub db: Option<String>,

    /// Similarity scorer: anthropic, lexical (overrides config)
    #[arg(long)]
    pub similarity_provider: Option<String>,

    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct ReportArgs {
    /// Task identifier
    pub task: String,

    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// SQLite database path (overrides config)
    #[arg(long)]
    pub db: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// Config file to validate
    pub config: String,
}
