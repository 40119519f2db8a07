//! Grantflow - draft grant applications and funder reports.
//!
//! Opens a draft from the fixture catalog, runs the simulated RFP analysis
//! and draft generation, and submits once every required section is done.

#![allow(clippy::single_match_else)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use grantflow::core::{FanoutSink, NotificationSink, Severity, Toast};
use grantflow::workflow::{
    GenerationScope, SessionEvent, SimulationKind, SubmitOutcome, WorkflowError, WorkflowPhase,
};
use grantflow::{AppSession, Config, DraftingSession, WorkflowKind};

/// Draft grant applications and funder reports
#[derive(Parser)]
#[command(name = "grantflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the default locations
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List grants and reports in the catalog
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show the sections a draft would have
    Sections {
        /// Grant or report id
        id: String,

        /// Kind of draft
        #[arg(short, long, value_enum, default_value_t = KindArg::Application)]
        kind: KindArg,
    },

    /// Draft an application or report
    Draft {
        /// Grant or report id
        id: String,

        /// Kind of draft
        #[arg(short, long, value_enum, default_value_t = KindArg::Application)]
        kind: KindArg,

        /// Questionnaire answer (question-id=answer)
        #[arg(short, long, value_name = "KEY=VALUE")]
        answer: Vec<String>,

        /// Seed for the pseudo-random generator
        #[arg(long)]
        seed: Option<u64>,

        /// Skip the pauses between progress steps
        #[arg(long)]
        fast: bool,

        /// Submit when the draft is complete
        #[arg(long)]
        submit: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Complete the first-run walkthrough
    Onboard,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindArg {
    /// Full application workspace with RFP analysis
    Application,
    /// Quick application from the grant's template
    Inline,
    /// Funder report
    Report,
}

impl From<KindArg> for WorkflowKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Application => Self::GrantApplication,
            KindArg::Inline => Self::InlineApplication,
            KindArg::Report => Self::Report,
        }
    }
}

/// Prints toasts to stderr so JSON output stays clean.
struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn notify(&self, toast: Toast) {
        let marker = match toast.severity {
            Severity::Success => "✓",
            Severity::Error => "✗",
            Severity::Warning => "!",
            Severity::Info => "·",
        };
        eprintln!("{marker} {}: {}", toast.title, toast.description);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::List { format } => cmd_list(config_path, format)?,
        Commands::Sections { id, kind } => cmd_sections(config_path, &id, kind.into())?,
        Commands::Draft { id, kind, answer, seed, fast, submit, format } => {
            let options = DraftOptions { answers: answer, seed, fast, submit, format };
            cmd_draft(config_path, &id, kind.into(), &options)?;
        }
        Commands::Config { path } => cmd_config(config_path, path)?,
        Commands::Onboard => cmd_onboard(config_path)?,
        Commands::Completions { shell } => cmd_completions(shell),
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_file(path),
        None => Config::load(),
    }
}

/// Print the empty state for a missing grant or report and exit.
fn exit_not_found(kind: WorkflowKind, id: &str) -> ! {
    let view = kind.not_found_view(id);
    eprintln!("{}", view.message);
    eprintln!("{} ({})", view.action_label, view.route);
    std::process::exit(2);
}

fn open_or_exit(app: &mut AppSession, kind: WorkflowKind, id: &str) -> Result<DraftingSession> {
    match app.open(kind, id) {
        Ok(draft) => Ok(draft),
        Err(e) if e.is_not_found() => exit_not_found(kind, id),
        Err(e) => Err(e.into()),
    }
}

/// List grants and reports.
fn cmd_list(config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let app = AppSession::new(load_config(config_path)?)?;
    let catalog = app.catalog();

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "grants": catalog.grants(),
                "reports": catalog.reports(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("Grants:");
            for grant in catalog.grants() {
                println!(
                    "  {} {} - {} (${}, due {})",
                    grant.id, grant.title, grant.funder, grant.amount, grant.deadline
                );
            }
            println!("\nReports:");
            for report in catalog.reports() {
                println!(
                    "  {} {} (grant {}, due {})",
                    report.id, report.title, report.grant_id, report.due
                );
            }
            println!(
                "\nTotal: {} grants, {} reports",
                catalog.grants().len(),
                catalog.reports().len()
            );
        }
    }

    Ok(())
}

/// Show a draft's sections, running analysis first when needed.
fn cmd_sections(config_path: Option<&Path>, id: &str, kind: WorkflowKind) -> Result<()> {
    let app = AppSession::new(load_config(config_path)?)?;
    let settings = app.settings().instant();
    let mut app = app.with_settings(settings);

    let mut draft = open_or_exit(&mut app, kind, id)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        if draft.phase() == WorkflowPhase::Empty {
            draft.start_analysis()?;
            draft.run_until_idle().await;
        }
        Ok::<_, WorkflowError>(())
    })?;

    println!("{} ({})\n", draft.title(), draft.kind());
    for section in draft.sections() {
        let marker = if section.required { "*" } else { " " };
        println!("  {marker} {:<28} {:<20} {}", section.id, section.kind.name(), section.title);
    }
    if !draft.requirements().is_empty() {
        println!("\nKey requirements:");
        for requirement in draft.requirements() {
            println!("  - {requirement}");
        }
    }

    Ok(())
}

struct DraftOptions {
    answers: Vec<String>,
    seed: Option<u64>,
    fast: bool,
    submit: bool,
    format: OutputFormat,
}

fn parse_answers(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                .filter(|(k, _)| !k.is_empty())
                .ok_or_else(|| anyhow::anyhow!("Invalid answer '{pair}': expected KEY=VALUE"))
        })
        .collect()
}

/// Run a draft from start to finish.
fn cmd_draft(
    config_path: Option<&Path>,
    id: &str,
    kind: WorkflowKind,
    options: &DraftOptions,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if options.seed.is_some() {
        config.general.seed = options.seed;
    }

    let mut app = AppSession::new(config)?;
    if options.fast {
        let settings = app.settings().instant();
        app = app.with_settings(settings);
    }
    let notifier: Arc<dyn NotificationSink> =
        Arc::new(FanoutSink::new().with(app.notifier()).with(Arc::new(ConsoleSink)));
    app = app.with_notifier(notifier);

    let questionnaire = app.questionnaire(&parse_answers(&options.answers)?);
    let mut draft = open_or_exit(&mut app, kind, id)?;
    let text = options.format == OutputFormat::Text;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        if draft.phase() == WorkflowPhase::Empty {
            draft.start_analysis()?;
            drive(&mut draft, text).await?;
        }

        draft.start_generation(GenerationScope::All, questionnaire)?;
        drive(&mut draft, text).await
    })?;

    let outcome = if options.submit { Some(draft.submit()?) } else { None };

    match options.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "draft": draft.snapshot(),
                "submit": outcome,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("\n{} ({})", draft.title(), draft.kind());
            println!("{}", draft.summary().to_summary_string());
            if let Some(SubmitOutcome::Submitted(submission)) = &outcome {
                println!("\nSubmitted. Continue at {}", submission.redirect);
            }
        }
    }

    if let Some(SubmitOutcome::Rejected { message, .. }) = &outcome {
        if text {
            eprintln!("{message}");
        }
        std::process::exit(1);
    }

    Ok(())
}

/// Apply simulation events until idle; a failed run is an error.
async fn drive(draft: &mut DraftingSession, show_progress: bool) -> Result<()> {
    while let Some(event) = draft.next_event().await {
        match event {
            SessionEvent::Progress { kind, percent } if show_progress => {
                eprintln!("  {} {:>3}%", label(kind), percent);
            }
            SessionEvent::Failed { kind, error } => {
                anyhow::bail!("{} failed: {error}", label(kind));
            }
            _ => {}
        }
    }
    Ok(())
}

fn label(kind: SimulationKind) -> &'static str {
    match kind {
        SimulationKind::Analysis => "Analyzing RFP",
        SimulationKind::Generation => "Generating draft",
    }
}

/// Show configuration.
fn cmd_config(config_path: Option<&Path>, show_path: bool) -> Result<()> {
    if show_path {
        match config_path {
            Some(path) => println!("{}", path.display()),
            None => {
                if let Some(path) = Config::config_file() {
                    println!("{}", path.display());
                }
            }
        }
        return Ok(());
    }

    let config = load_config(config_path)?;
    let toml = toml::to_string_pretty(&config)?;
    println!("{toml}");

    Ok(())
}

/// Mark onboarding as completed and persist it.
fn cmd_onboard(config_path: Option<&Path>) -> Result<()> {
    let mut app = AppSession::new(load_config(config_path)?)?;

    if !app.complete_onboarding() {
        println!("✓ Onboarding already completed");
        return Ok(());
    }

    let path = match config_path {
        Some(path) => {
            app.config().save_to_file(path)?;
            path.to_path_buf()
        }
        None => app.save_config()?,
    };
    println!("✓ Onboarding completed ({})", path.display());

    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "grantflow", &mut io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_answers() {
        let parsed =
            parse_answers(&["community-need=Clinic access".to_string(), "x=a=b".to_string()])
                .unwrap();
        assert_eq!(parsed[0], ("community-need".to_string(), "Clinic access".to_string()));
        assert_eq!(parsed[1], ("x".to_string(), "a=b".to_string()));

        assert!(parse_answers(&["no-separator".to_string()]).is_err());
        assert!(parse_answers(&["=value".to_string()]).is_err());
    }
}
