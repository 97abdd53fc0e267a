use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use chrono::{Duration, NaiveDate};
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;

use signin_ledger::config::Settings;
use signin_ledger::store::PgStore;
use signin_ledger::{
    logging, report, Admission, RequestContext, SigninLedger, SigninType, TypeFilter, Window,
    COOLDOWN_HOURS,
};

#[derive(Parser)]
#[command(name = "signin-ledger")]
#[command(about = "Community sign-in ledger and leaderboards", long_about = None)]
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
    /// Upsert members from a CSV file with id,username columns
    ImportUsers {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Record a sign-in unless the member is still cooling down
    SignIn {
        #[arg(long)]
        user: String,
        #[arg(long = "type")]
        kind: SigninType,
    },
    /// Count a member's sign-ins
    Count {
        #[arg(long)]
        user: String,
        #[arg(long = "type")]
        kind: Option<SigninType>,
    },
    /// Check whether a member signed in within the cooldown
    Recent {
        #[arg(long)]
        user: String,
        #[arg(long = "type")]
        kind: SigninType,
    },
    /// Rank members over a trailing window or a calendar day
    #[command(group(
        ArgGroup::new("window")
            .args(["hours", "date"])
            .multiple(false)
    ))]
    Leaderboard {
        #[arg(long)]
        hours: Option<i64>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long = "type", default_value = "All")]
        kind: TypeFilter,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value_t = 7)]
        days: i64,
        #[arg(long = "type", default_value = "All")]
        kind: TypeFilter,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    logging::init(&settings.log_level, settings.log_format)?;

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(settings.require_database_url()?)
        .await
        .context("failed to connect to Postgres")?;

    let store = Arc::new(PgStore::new(pool));
    let ledger =
        SigninLedger::new(store.clone(), store.clone()).with_day_offset(settings.day_offset);
    let ctx = RequestContext::new()
        .with_timeout(settings.query_timeout)
        .with_parent(tracing::info_span!("cli"));

    match cli.command {
        Commands::InitDb => {
            within_deadline(&ctx, "init-db", store.migrate()).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            within_deadline(&ctx, "seed", store.seed()).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportUsers { csv } => {
            let imported =
                within_deadline(&ctx, "import-users", store.import_users(&csv)).await?;
            println!("Imported {imported} members from {}.", csv.display());
        }
        Commands::SignIn { user, kind } => match ledger.admit(&ctx, &user, kind).await? {
            Admission::Recorded(event) => {
                println!(
                    "Recorded {} sign-in for {} at {}.",
                    event.signin_type, event.user_id, event.recorded_at
                );
            }
            Admission::CoolingDown => {
                println!(
                    "{user} already signed in for {kind} within the last {COOLDOWN_HOURS} hours."
                );
            }
        },
        Commands::Count { user, kind } => {
            let count = match kind {
                Some(kind) => ledger.count_by_user_and_type(&ctx, &user, kind).await?,
                None => ledger.count_by_user(&ctx, &user).await?,
            };
            let label = kind.map_or_else(|| "total".to_string(), |kind| kind.to_string());
            println!("{user}: {count} {label} sign-ins");
        }
        Commands::Recent { user, kind } => {
            let recent = ledger.recently_signed_in(&ctx, &user, kind).await?;
            if recent {
                println!("{user} signed in for {kind} within the last {COOLDOWN_HOURS} hours.");
            } else {
                println!("{user} has no {kind} sign-in in the last {COOLDOWN_HOURS} hours.");
            }
        }
        Commands::Leaderboard {
            hours,
            date,
            kind,
            limit,
            json,
        } => {
            let ranked = match date {
                Some(date) => ledger.aggregate_day(&ctx, date, kind).await?,
                None => {
                    let hours = hours.unwrap_or(24 * 7);
                    let delta = Duration::try_hours(hours)
                        .with_context(|| format!("--hours {hours} is out of range"))?;
                    ledger.aggregate(&ctx, delta, kind).await?
                }
            };
            let top: Vec<_> = ranked.iter().take(limit).collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&top)?);
            } else if top.is_empty() {
                println!("No sign-ins found for this window.");
            } else {
                println!("Top members by {kind} sign-ins:");
                for (place, pair) in top.iter().enumerate() {
                    println!("{}. {} ({})", place + 1, pair.key, pair.value);
                }
            }
        }
        Commands::Report {
            days,
            kind,
            limit,
            out,
        } => {
            let delta = Duration::try_days(days)
                .with_context(|| format!("--days {days} is out of range"))?;
            let window = Window::trailing(ledger.now(), delta)?;
            let type_mix = ledger.aggregate_types(&ctx, window).await?;
            let leaderboard = ledger.aggregate_window(&ctx, window, kind).await?;
            let report = report::build_report(kind, window, &type_mix, &leaderboard, limit);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

/// Bounds a maintenance command by the same deadline as ledger operations.
async fn within_deadline<T, F>(ctx: &RequestContext, command: &str, work: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match ctx.deadline() {
        Some(deadline) => tokio::time::timeout_at(deadline, work)
            .await
            .map_err(|_| anyhow!("{command} exceeded SIGNIN_QUERY_TIMEOUT_SECS"))?,
        None => work.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn maintenance_commands_honor_the_deadline() {
        let ctx = RequestContext::new().with_timeout(std::time::Duration::from_millis(10));
        let err = within_deadline(&ctx, "seed", async {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("seed exceeded"));

        let done = within_deadline(&RequestContext::new(), "init-db", async { Ok(3) })
            .await
            .unwrap();
        assert_eq!(done, 3);
    }

    #[test]
    fn oversized_window_flags_are_rejected() {
        assert!(Duration::try_hours(i64::MAX).is_none());
        assert!(Duration::try_days(i64::MAX).is_none());
        let cli = Cli::try_parse_from([
            "signin-ledger",
            "leaderboard",
            "--hours",
            "9223372036854775807",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Leaderboard { hours: Some(i64::MAX), .. }));
    }
}
