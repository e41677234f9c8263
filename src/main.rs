use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod commission;
mod currency;
mod db;
mod error;
mod models;
mod reminder;
mod report;

use models::{CommissionResult, Meeting, StudentReminder};

#[derive(Parser)]
#[command(name = "course-commission-reminder")]
#[command(about = "Teacher commission and payment reminder calculator for the course back office", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import attendance rows from a CSV sheet
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Calculate commissions for one meeting or a whole class
    #[command(group(
        ArgGroup::new("scope")
            .args(["meeting", "class"])
            .multiple(false)
            .required(true)
    ))]
    Commission {
        #[arg(long)]
        meeting: Option<Uuid>,
        #[arg(long)]
        class: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Evaluate payment reminders across students
    #[command(group(
        ArgGroup::new("scope")
            .args(["class", "email"])
            .multiple(false)
    ))]
    Reminders {
        #[arg(long)]
        class: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        class: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_attendance_csv(&pool, &csv).await?;
            println!("Inserted {inserted} attendance rows from {}.", csv.display());
        }
        Commands::Commission {
            meeting,
            class,
            json,
        } => {
            if let Some(meeting_id) = meeting {
                let (meeting, policy, attendance) = db::fetch_meeting(&pool, meeting_id).await?;
                let result =
                    commission::calculate_commission(policy.kind, policy.amount, &attendance)?;

                if json {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                } else {
                    let names = db::fetch_teacher_names(&pool).await?;
                    let credited = commission::credited_teacher(&meeting);
                    let teacher = names
                        .get(&credited)
                        .cloned()
                        .unwrap_or_else(|| credited.to_string());
                    println!(
                        "Commission for {} on {}: {} ({}), credited to {}",
                        meeting.class_name,
                        meeting.meeting_date,
                        currency::format_amount(result.amount),
                        result.breakdown,
                        teacher
                    );
                    println!("Roster: {}", commission::roster_summary(&attendance));
                }
            } else {
                let results = collect_commissions(&pool, class.as_deref()).await?;
                let names = db::fetch_teacher_names(&pool).await?;
                let totals = report::summarize_by_teacher(&results, &names);

                if json {
                    println!("{}", serde_json::to_string_pretty(&totals)?);
                } else if totals.is_empty() {
                    println!("No meetings with commissions in this scope.");
                } else {
                    println!("Commission totals by teacher:");
                    for total in &totals {
                        println!(
                            "- {}: {} across {} meetings",
                            total.teacher_name,
                            currency::format_amount(total.total_amount),
                            total.meeting_count
                        );
                    }
                }
            }
        }
        Commands::Reminders {
            class,
            email,
            limit,
            json,
        } => {
            let reminders =
                collect_reminders(&pool, class.as_deref(), email.as_deref()).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&reminders)?);
                return Ok(());
            }

            let due: Vec<&StudentReminder> = reminders
                .iter()
                .filter(|entry| entry.decision.should_show_reminder)
                .collect();

            if due.is_empty() {
                println!("No students due for a reminder.");
            } else {
                println!("Students due for a payment reminder:");
                for entry in due.iter().take(limit) {
                    println!(
                        "- {} ({}, {}): {}",
                        entry.student.full_name,
                        entry.student.email,
                        entry.student.class_name,
                        entry.decision.reason
                    );
                }
            }
            println!(
                "{} of {} students due.",
                due.len(),
                reminders.len()
            );
        }
        Commands::Report { class, out } => {
            let results = collect_commissions(&pool, class.as_deref()).await?;
            let names = db::fetch_teacher_names(&pool).await?;
            let totals = report::summarize_by_teacher(&results, &names);
            let reminders = collect_reminders(&pool, class.as_deref(), None).await?;

            let today = Utc::now().date_naive();
            let report = report::build_report(class.as_deref(), today, &totals, &reminders);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn collect_commissions(
    pool: &PgPool,
    class: Option<&str>,
) -> anyhow::Result<Vec<(Meeting, CommissionResult)>> {
    let meeting_ids = db::fetch_meeting_ids(pool, class).await?;
    let mut results = Vec::with_capacity(meeting_ids.len());

    for meeting_id in meeting_ids {
        let (meeting, policy, attendance) = db::fetch_meeting(pool, meeting_id).await?;
        let result = commission::calculate_commission(policy.kind, policy.amount, &attendance)?;
        results.push((meeting, result));
    }

    Ok(results)
}

async fn collect_reminders(
    pool: &PgPool,
    class: Option<&str>,
    email: Option<&str>,
) -> anyhow::Result<Vec<StudentReminder>> {
    let snapshots = db::fetch_student_billing(pool, class, email).await?;
    // The grace window moves with the wall clock; pin "today" once per run.
    let today = Utc::now().date_naive();

    Ok(snapshots
        .into_iter()
        .map(|snapshot| {
            let decision = reminder::evaluate_reminder(
                snapshot.payment.as_ref(),
                &snapshot.transactions,
                &snapshot.meeting_dates,
                today,
            );
            StudentReminder {
                student: snapshot.student,
                decision,
            }
        })
        .collect())
}
