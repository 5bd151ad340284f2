use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use flowmetrics::config::DEFAULT_SOURCE;
use flowmetrics::date_util::parse_date_arg;
use flowmetrics::report::{observed_teams, resolve_teams};
use flowmetrics::{storage, Config, Dashboard, FlowMetrics, MetricStore, Snapshot};

#[derive(Parser)]
#[command(name = "flowmetrics", about = "Engineering flow metrics from issue and cycle snapshots")]
struct Cli {
    /// Config file (default: ~/.flowmetrics/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute metric rows from issue/cycle JSON and write them as CSV
    Calculate {
        /// Issues JSON array
        #[arg(long)]
        issues: Option<PathBuf>,
        /// Cycles JSON array
        #[arg(long)]
        cycles: Option<PathBuf>,
        /// Reference date, YYYY-MM-DD (default: today)
        #[arg(long)]
        today: Option<String>,
        /// Output CSV path
        #[arg(long)]
        out: PathBuf,
    },
    /// Build a dashboard from a metric CSV
    Report {
        /// Metric CSV written by `calculate`
        #[arg(long)]
        metrics: PathBuf,
        /// Only use time series from this date on (YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,
        /// Team-pattern namespace to use
        #[arg(long, default_value = DEFAULT_SOURCE)]
        source: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show observed team names and the unified teams they roll up into
    Teams {
        #[arg(long)]
        metrics: PathBuf,
        #[arg(long, default_value = DEFAULT_SOURCE)]
        source: String,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    Ok(match path {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = load_config(cli.config.as_deref())?;
    let engine = FlowMetrics::from_config(&config)?;

    if let Commands::Report { source, .. } | Commands::Teams { source, .. } = &cli.command {
        if !config.teams.sources().contains(source.as_str()) {
            log::warn!("No team patterns configured for source '{source}'");
        }
    }

    match cli.command {
        Commands::Calculate {
            issues,
            cycles,
            today,
            out,
        } => {
            if issues.is_none() && cycles.is_none() {
                anyhow::bail!("Provide --issues and/or --cycles");
            }
            let today = match today {
                Some(s) => parse_date_arg(&s)?,
                None => chrono::Local::now().date_naive(),
            };
            let snapshot = Snapshot::from_json_files(issues.as_deref(), cycles.as_deref())?;
            let rows = engine.calculate(&snapshot, today);
            storage::write_csv(&out, &rows)?;
            eprintln!("Wrote {} metric rows to {}", rows.len(), out.display());
        }
        Commands::Report {
            metrics,
            since,
            source,
            json,
        } => {
            let since = since.as_deref().map(parse_date_arg).transpose()?;
            let store = MetricStore::open(&metrics)?;
            let dashboard = engine.build_report(&store, &config.teams, &source, since);
            if json {
                println!("{}", serde_json::to_string_pretty(&dashboard)?);
            } else {
                print_dashboard(&dashboard);
            }
        }
        Commands::Teams { metrics, source } => {
            let store = MetricStore::open(&metrics)?;
            let observed = observed_teams(&store);
            let resolved = resolve_teams(&config.teams, &source, &observed);

            println!("Observed teams ({}):", observed.len());
            for team in &observed {
                let unified: Vec<&str> = resolved
                    .iter()
                    .filter(|(_, sources)| sources.contains(team))
                    .map(|(name, _)| name.as_str())
                    .collect();
                if unified.is_empty() {
                    println!("  {team}  (unmatched)");
                } else {
                    println!("  {team}  -> {}", unified.join(", "));
                }
            }
            if resolved.is_empty() {
                println!("No unified teams configured for source '{source}'.");
            }
        }
    }

    Ok(())
}

fn print_dashboard(dashboard: &Dashboard) {
    match dashboard.generated_for {
        Some(date) => println!("Flow metrics as of {date}"),
        None => println!("Flow metrics (no flow snapshot)"),
    }
    for (metric, value) in &dashboard.flow {
        println!("  {metric:<28} {value}");
    }
    if !dashboard.cycle_summary.is_empty() {
        println!();
        println!("Cycles");
        for (metric, value) in &dashboard.cycle_summary {
            println!("  {metric:<28} {value}");
        }
    }

    for team in &dashboard.unified_teams {
        println!();
        println!("{} ({})", team.name, team.source_teams.join(", "));
        if team.source_teams.is_empty() {
            println!("  no matching teams");
            continue;
        }
        for (stat, value) in team.stats.iter().chain(&team.bugs) {
            println!("  {stat:<28} {value}");
        }
        println!(
            "  velocity p50/p90: {} / {}  (min {}, max {}, avg {}, {} cycles)",
            team.velocity.p50,
            team.velocity.p90,
            team.velocity_stats.min,
            team.velocity_stats.max,
            team.velocity_stats.avg,
            team.velocity_stats.count
        );
        for cycle in &team.cycles {
            let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
            println!(
                "  {:<20} {}  {:<9} done {}/{}  rate {}%  velocity {}",
                cycle.name,
                cycle.date,
                cycle.status.map_or("-", |s| s.as_str()),
                cycle.completed_issues.unwrap_or(0),
                cycle.total_issues.unwrap_or(0),
                fmt(cycle.completion_rate),
                fmt(cycle.velocity),
            );
        }
    }

    let weekly = &dashboard.weekly_tickets;
    if !weekly.labels.is_empty() {
        println!();
        println!("Weekly tickets ({} / {})", weekly.names.0, weekly.names.1);
        for (i, label) in weekly.labels.iter().enumerate() {
            println!(
                "  {label}  {:>5} ({:>6}%)  {:>5} ({:>6}%)",
                weekly.a_raw[i], weekly.a_pct[i], weekly.b_raw[i], weekly.b_pct[i]
            );
        }
    }
}
