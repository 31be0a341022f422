use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use trend_alerts::alerts::{DEFAULT_APPROACH_THRESHOLD, DEFAULT_MIN_DAILY_ASSESSMENTS};
use trend_alerts::config::DEFAULT_UTC_OFFSET;
use trend_alerts::series::DEFAULT_SERIES_DAYS;
use trend_alerts::{import, report, series};
use trend_alerts::{AlertLedger, AlertVariant, Config, Window};

#[derive(Parser)]
#[command(name = "trend-alerts")]
#[command(about = "Daily averages, moving averages and score alerts for assessment history", long_about = None)]
struct Cli {
    /// Timezone used to bucket assessments into days (Z, +08:00, -0530)
    #[arg(long, global = true, env = "TREND_UTC_OFFSET", default_value = DEFAULT_UTC_OFFSET)]
    utc_offset: String,
    /// Largest gap below a moving average that raises a low alert
    #[arg(long, global = true, env = "TREND_APPROACH_THRESHOLD", default_value_t = DEFAULT_APPROACH_THRESHOLD)]
    approach_threshold: f64,
    /// Same-day assessments needed before a day is checked for alerts
    #[arg(long, global = true, env = "TREND_MIN_DAILY_ASSESSMENTS", default_value_t = DEFAULT_MIN_DAILY_ASSESSMENTS)]
    min_daily_assessments: usize,
    /// Log debug output, including skipped records
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Average score for one day
    Daily {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Moving averages ending on a day
    Ma {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        date: Option<NaiveDate>,
        /// 7, 14 or 30; all three when omitted
        #[arg(long, value_parser = parse_window)]
        window: Option<Window>,
    },
    /// Detect high and low alerts for a day
    Alerts {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value_t = AlertVariant::Threshold)]
        variant: AlertVariant,
        /// JSON file tracking emitted alerts and their read state
        #[arg(long)]
        ledger: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Per-day averages with moving-average lines
    Series {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long, default_value_t = DEFAULT_SERIES_DAYS)]
        days: u32,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value_t = DEFAULT_SERIES_DAYS)]
        days: u32,
        #[arg(long, default_value_t = AlertVariant::Threshold)]
        variant: AlertVariant,
        #[arg(long)]
        label: Option<String>,
        #[arg(long, default_value = "trend-report.md")]
        out: PathBuf,
    },
}

fn parse_window(value: &str) -> Result<Window, String> {
    value
        .parse::<u32>()
        .ok()
        .and_then(Window::from_days)
        .ok_or_else(|| format!("window must be 7, 14 or 30, got '{value}'"))
}

fn format_average(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.1}"))
        .unwrap_or_else(|| "insufficient data".to_string())
}

fn cell(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.1}"))
        .unwrap_or_else(|| "-".to_string())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::new(&cli.utc_offset, cli.approach_threshold, cli.min_daily_assessments)
        .context("invalid configuration")?;
    let analytics = config.analytics();
    let calendar = config.calendar();
    info!(offset = %config.utc_offset, "bucketing assessments by local day");

    let load = |path: &PathBuf| {
        import::load_records(path)
            .with_context(|| format!("failed to load assessment history from {}", path.display()))
    };

    match cli.command {
        Commands::Daily { input, date } => {
            let records = load(&input)?;
            let date = date.unwrap_or_else(|| calendar.today());
            match analytics.compute_daily_average(&records, date) {
                Some(daily) => println!(
                    "{}: average {:.1} across {} assessments",
                    daily.date, daily.average, daily.count
                ),
                None => println!("{date}: no data"),
            }
        }
        Commands::Ma {
            input,
            date,
            window,
        } => {
            let records = load(&input)?;
            let date = date.unwrap_or_else(|| calendar.today());
            let buckets = analytics.buckets(&records);
            let windows = match window {
                Some(window) => vec![window],
                None => Window::ALL.to_vec(),
            };
            println!("Moving averages ending {date}:");
            for window in windows {
                println!(
                    "- {}: {}",
                    window,
                    format_average(buckets.moving_average(window.days(), date))
                );
            }
        }
        Commands::Alerts {
            input,
            date,
            variant,
            ledger,
            json,
        } => {
            let records = load(&input)?;
            let date = date.unwrap_or_else(|| calendar.today());
            let detection = analytics.detect(&records, date, variant);

            if let Some(path) = ledger {
                let mut alert_ledger = AlertLedger::load(&path)
                    .with_context(|| format!("failed to read alert ledger {}", path.display()))?;
                let created = alert_ledger.reconcile(date, &detection);
                alert_ledger
                    .save(&path)
                    .with_context(|| format!("failed to write alert ledger {}", path.display()))?;
                info!(
                    created = created.len(),
                    unread = alert_ledger.unread().count(),
                    "alert ledger updated"
                );
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&detection)?);
            } else if detection.is_empty() {
                println!("No alerts for {date} ({variant}).");
            } else {
                for alert in detection.alerts() {
                    println!(
                        "{} alert on {}: daily average {:.1} across {} assessments vs {}",
                        alert.kind,
                        alert.reference_day,
                        alert.daily_average,
                        alert.assessment_count,
                        alert.windows_label()
                    );
                }
            }
        }
        Commands::Series {
            input,
            end,
            days,
            json,
        } => {
            let records = load(&input)?;
            let end = end.unwrap_or_else(|| calendar.today());
            let points = series::recent_series(&analytics.buckets(&records), end, days);

            if json {
                println!("{}", serde_json::to_string_pretty(&points)?);
            } else {
                for point in &points {
                    println!(
                        "{} {:>6} | MA7 {:>6} | MA14 {:>6} | MA30 {:>6}",
                        point.date,
                        cell(point.daily_average),
                        cell(point.averages.ma7),
                        cell(point.averages.ma14),
                        cell(point.averages.ma30),
                    );
                }
            }
        }
        Commands::Report {
            input,
            date,
            days,
            variant,
            label,
            out,
        } => {
            let records = load(&input)?;
            let date = date.unwrap_or_else(|| calendar.today());
            let report = report::build_report(
                label.as_deref(),
                date,
                days,
                &analytics.buckets(&records),
                analytics.policy(),
                variant,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write report to {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
