use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod classify;
mod config;
mod csv_store;
mod dashboard;
mod db;
mod deadline;
mod digest;
mod error;
mod models;
mod notify;
mod ranking;
mod reconcile;
mod report;
mod review;
mod schema;
mod sheet;
mod state;
mod views;
mod worker;
mod writer;

use config::{local_now, PortalArgs};
use error::PortalError;
use review::{ReviewRequest, ReviewResponse};
use state::StateStore;
use worker::{Worker, WorkerSettings};

#[derive(Parser)]
#[command(name = "homework-portal")]
#[command(about = "Homework submission sync, grading ledgers and SMS notices", long_about = None)]
struct Cli {
    #[command(flatten)]
    portal: PortalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the worker state schema
    InitDb,
    /// Poll for new submissions and send the daily digest
    Worker {
        #[arg(
            long,
            env = "PORTAL_INTERVAL_SECS",
            default_value_t = 20,
            value_parser = clap::value_parser!(u64).range(5..=3600)
        )]
        interval_secs: u64,
        /// Local hour from which the daily digest may fire
        #[arg(
            long,
            env = "PORTAL_DIGEST_HOUR",
            default_value_t = 21,
            value_parser = clap::value_parser!(u32).range(0..=23)
        )]
        digest_hour: u32,
    },
    /// Classify pending submissions once
    Classify,
    /// Send the missing-submission digest now
    Digest {
        /// Send even if today's digest already went out
        #[arg(long)]
        force: bool,
    },
    /// Backfill the submission table from the graded and rejected ledgers
    Reconcile,
    /// Print dashboard data as JSON
    Dashboard,
    /// Write a markdown dashboard report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Confirm or reject a submission from a JSON request file
    Review {
        #[arg(long)]
        request: PathBuf,
    },
    /// Show recorded grading details for a submission
    Details {
        #[arg(long)]
        id: String,
    },
    /// Show one student's attendance, clinic and assignment overview
    Student {
        #[arg(long)]
        name: String,
        #[arg(long)]
        class: String,
    },
    /// Print all submissions with local submission times
    Feed,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let portal = cli.portal;
    init_tracing(portal.log_json);
    let local = portal.local_offset()?;

    match cli.command {
        Commands::InitDb => {
            let StateStore::Postgres(pool) = portal.state_store().await? else {
                anyhow::bail!("DATABASE_URL must be set to initialize the state schema");
            };
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Worker {
            interval_secs,
            digest_hour,
        } => {
            let workbook = portal.open_workbook()?;
            tracing::info!(workbook = %workbook.dir().display(), "using csv workbook");
            let worker = Worker::new(
                Arc::new(workbook),
                Arc::new(portal.notifier()),
                portal.state_store().await?,
                WorkerSettings {
                    local,
                    interval: Duration::from_secs(interval_secs),
                    digest_hour,
                    operator_phone: portal.operator_phone(),
                },
            );
            worker.run().await?;
        }
        Commands::Classify => {
            let workbook = portal.open_workbook()?;
            let report = classify::run(&workbook, &portal.notifier(), local, local_now(local))?;
            println!(
                "Classified {} submissions ({} on time, {} late); {} SMS sent, {} students not in roster.",
                report.classified, report.on_time, report.late, report.notified, report.roster_misses
            );
        }
        Commands::Digest { force } => {
            let now = local_now(local);
            let worker = Worker::new(
                Arc::new(portal.open_workbook()?),
                Arc::new(portal.notifier()),
                portal.state_store().await?,
                WorkerSettings {
                    local,
                    interval: Duration::from_secs(20),
                    digest_hour: 0,
                    operator_phone: portal.operator_phone(),
                },
            );
            let report = if force {
                Some(worker.send_digest(now.date()).await?)
            } else {
                worker.digest_if_due(now).await?
            };
            match report {
                Some(report) => println!(
                    "Digest sent to {} of {} students (summary sent: {}).",
                    report.delivered, report.students, report.summary_sent
                ),
                None => println!("Today's digest was already sent."),
            }
        }
        Commands::Reconcile => {
            let workbook = portal.open_workbook()?;
            let report = reconcile::reconcile(&workbook).context("reconciliation failed")?;
            println!("{}", report.message());
        }
        Commands::Dashboard => {
            let workbook = portal.open_workbook()?;
            let dashboard = dashboard::load_dashboard(&workbook, local_now(local), local)?;
            print_json(&dashboard)?;
        }
        Commands::Report { out } => {
            let workbook = portal.open_workbook()?;
            let now = local_now(local);
            let dashboard = dashboard::load_dashboard(&workbook, now, local)?;
            std::fs::write(&out, report::build_report(&dashboard, now))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Review { request } => {
            let raw = std::fs::read_to_string(&request)
                .with_context(|| format!("failed to read {}", request.display()))?;
            let review: ReviewRequest =
                serde_json::from_str(&raw).context("malformed review request")?;
            let workbook = portal.open_workbook()?;
            match review::apply_review(&workbook, &portal.notifier(), &review, local_now(local)) {
                Ok(response) => print_json(&response)?,
                Err(err @ PortalError::SubmissionNotFound(_)) => {
                    print_json(&ReviewResponse {
                        success: false,
                        message: err.to_string(),
                    })?;
                    anyhow::bail!(err);
                }
                Err(err) => return Err(anyhow::Error::new(err).context("review failed")),
            }
        }
        Commands::Details { id } => {
            let workbook = portal.open_workbook()?;
            print_json(&review::result_details(&workbook, &id)?)?;
        }
        Commands::Student { name, class } => {
            let workbook = portal.open_workbook()?;
            let overview =
                views::student_overview(&workbook, &name, &class, local_now(local), local)?;
            print_json(&overview)?;
        }
        Commands::Feed => {
            let workbook = portal.open_workbook()?;
            print_json(&views::submission_feed(&workbook, local)?)?;
        }
    }

    Ok(())
}
