use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, FeedbackAction, FeedbackPresenter, MoveIntent, MutationOutcome,
    ScheduleEditor,
};
use shared::{
    domain::{ContainerKey, EntityId, ScheduleId, ShiftLabel},
    protocol::IssueType,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    /// Overrides `server_url` from shiftboard.toml / environment.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    schedule_id: Option<i64>,
    #[arg(long)]
    timeout_ms: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current grid.
    Show,
    /// Move an entity between cells, e.g. `--from 2025-10-16:night`.
    Move {
        #[arg(long)]
        entity: String,
        #[arg(long, value_parser = parse_key)]
        from: ContainerKey,
        #[arg(long, value_parser = parse_key)]
        to: ContainerKey,
        /// Resubmit as an override with this justification if rejected.
        #[arg(long)]
        retry_forced: Option<String>,
    },
    /// Force a move past constraint checks.
    Override {
        #[arg(long)]
        entity: String,
        #[arg(long, value_parser = parse_key)]
        from: ContainerKey,
        #[arg(long, value_parser = parse_key)]
        to: ContainerKey,
        #[arg(long)]
        reason: String,
    },
    Recommend {
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        shift: String,
        /// missing_staff, overload or constraint_violation.
        #[arg(long, default_value = "missing_staff", value_parser = parse_issue)]
        issue: IssueType,
    },
}

fn parse_key(raw: &str) -> Result<ContainerKey> {
    ContainerKey::parse(raw).ok_or_else(|| anyhow!("expected YYYY-MM-DD:shift, got '{raw}'"))
}

fn parse_issue(raw: &str) -> Result<IssueType> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "missing_staff" => Ok(IssueType::MissingStaff),
        "overload" => Ok(IssueType::Overload),
        "constraint_violation" => Ok(IssueType::ConstraintViolation),
        other => Err(anyhow!("unknown issue type '{other}'")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(server_url) = cli.server_url {
        settings.server_url = server_url;
    }
    if let Some(schedule_id) = cli.schedule_id {
        settings.schedule_id = ScheduleId(schedule_id);
    }
    if let Some(timeout_ms) = cli.timeout_ms.filter(|ms| *ms > 0) {
        settings.request_timeout_ms = timeout_ms;
    }
    info!(
        server_url = %settings.server_url,
        schedule_id = settings.schedule_id.0,
        "shiftboard: connecting"
    );
    let editor = ScheduleEditor::connect(&settings).await?;

    match cli.command {
        Command::Show => print_grid(&editor).await,
        Command::Move {
            entity,
            from,
            to,
            retry_forced,
        } => {
            let intent = MoveIntent::new(EntityId::new(entity), from, to);
            println!("{}", FeedbackPresenter::in_progress(&intent));
            let outcome = editor.submit(intent).await?;
            println!("{}", FeedbackPresenter::render(&outcome));

            if let (MutationOutcome::Rejected { .. }, Some(reason)) = (&outcome, retry_forced) {
                let retry = FeedbackPresenter::render(&outcome)
                    .actions
                    .into_iter()
                    .find_map(|action| match action {
                        FeedbackAction::RetryForced(intent) => Some(intent),
                        _ => None,
                    });
                if let Some(rejected) = retry {
                    let forced = editor.retry_forced(&rejected, &reason).await?;
                    println!("{}", FeedbackPresenter::render(&forced));
                }
            }
        }
        Command::Override {
            entity,
            from,
            to,
            reason,
        } => {
            let outcome = editor
                .submit_override(EntityId::new(entity), from, to, &reason)
                .await?;
            println!("{}", FeedbackPresenter::render(&outcome));
            for entry in editor.audit_log().await {
                println!(
                    "override {} {} -> {} at {}: {:?}",
                    entry.entity,
                    entry.from,
                    entry.to,
                    entry.recorded_at.to_rfc3339(),
                    entry.outcome
                );
            }
        }
        Command::Recommend { date, shift, issue } => {
            let ranked = editor
                .recommend(date, ShiftLabel::new(&shift), issue)
                .await?;
            if ranked.is_empty() {
                println!("no candidates for {date} {shift}");
            }
            for candidate in ranked {
                let name = candidate.display_name.as_deref().unwrap_or("");
                println!(
                    "{:<12} {:<16} {:.2}  {}",
                    candidate.entity_id,
                    name,
                    candidate.suitability_score,
                    candidate.reasons.join("; ")
                );
                for risk in candidate.risks {
                    println!("{:<12} risk: {risk}", "");
                }
            }
        }
    }

    Ok(())
}

async fn print_grid(editor: &ScheduleEditor) {
    let grid = editor.grid();
    for (key, entities) in grid.containers() {
        let ids: Vec<&str> = entities.iter().map(EntityId::as_str).collect();
        println!("{key:<24} {}", ids.join(", "));
    }
    match editor.scores().await.total {
        Some(total) => println!("total score: {total}"),
        None => println!("total score: unknown"),
    }
}
