use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::*;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use tabled::{settings::Style, Table, Tabled};

use weightrs::badges;
use weightrs::body;
use weightrs::comparison;
use weightrs::config::AppConfig;
use weightrs::dates::{format_date, parse_date};
use weightrs::error::ErrorSeverity;
use weightrs::export::ExportFormat;
use weightrs::insights::{self, Insight};
use weightrs::logging::init_logging;
use weightrs::metabolic;
use weightrs::numeric::format_fixed;
use weightrs::persistence::JsonFileStore;
use weightrs::projection::{remaining_kg, Projection, ProjectionCalculator};
use weightrs::reports;
use weightrs::series::ChartFilter;
use weightrs::store::UpsertOutcome;
use weightrs::{Settings, SystemClock, Tracker, TrackerError};

/// WeightRS - Personal weight tracking CLI
///
/// Log daily weigh-ins and get statistics, goal projections, badges and
/// pattern insights computed from your history.
#[derive(Parser)]
#[command(name = "weightrs")]
#[command(version)]
#[command(about = "Personal weight tracking CLI", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Overrides the data directory from the config
    #[arg(short, long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a weigh-in
    Add {
        /// Weight in kg
        weight: Decimal,

        /// Date of the weigh-in (YYYY-MM-DD, default today)
        #[arg(short = 'D', long, value_parser = date_arg)]
        date: Option<NaiveDate>,

        /// Body fat percentage
        #[arg(short, long)]
        fat: Option<Decimal>,

        /// Replace an existing entry on the same date
        #[arg(long)]
        overwrite: bool,
    },

    /// Change an existing weigh-in
    Edit {
        /// Date of the entry to change
        #[arg(value_parser = date_arg)]
        date: NaiveDate,

        /// New weight in kg
        #[arg(short, long)]
        weight: Option<Decimal>,

        /// New body fat percentage (0 clears it)
        #[arg(short, long)]
        fat: Option<Decimal>,

        /// Move the entry to another date
        #[arg(long, value_parser = date_arg)]
        new_date: Option<NaiveDate>,

        /// Replace an existing entry on the new date
        #[arg(long)]
        overwrite: bool,
    },

    /// Delete a weigh-in
    Remove {
        #[arg(value_parser = date_arg)]
        date: NaiveDate,
    },

    /// Show the history
    List {
        /// Range to show: all, 1m, 3m, 6m, 1y or START..END
        #[arg(short, long, default_value = "all")]
        filter: ChartFilter,

        /// Show only the most recent entries
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Summary statistics and progress
    Stats,

    /// Achievement badges
    Badges {
        /// Also list badges that are still locked
        #[arg(short, long)]
        all: bool,
    },

    /// Estimate when the goal weight will be reached
    Project,

    /// Pattern insights from the history
    Insights,

    /// Tabular reports
    Report {
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Import a CSV or JSON backup
    Import {
        /// Input file path (.csv merges, .json replaces)
        file: PathBuf,
    },

    /// Export the history
    Export {
        /// Output file path (default YYMMDD_Weight_Backup.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export format (csv, json)
        #[arg(short = 'f', long, default_value = "json")]
        format: ExportFormat,
    },

    /// Show or change the profile
    Settings {
        /// Height in cm
        #[arg(long)]
        height: Option<Decimal>,

        /// Start weight in kg
        #[arg(long)]
        start: Option<Decimal>,

        /// Goal weight in kg
        #[arg(long)]
        goal: Option<Decimal>,

        /// Planned daily intake in kcal
        #[arg(long)]
        intake: Option<Decimal>,
    },

    /// Delete all records and restore default settings
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

fn date_arg(value: &str) -> std::result::Result<NaiveDate, String> {
    parse_date(value).map_err(|e| e.to_string())
}

fn kg(value: Decimal) -> String {
    format!("{}kg", format_fixed(value, 1))
}

fn signed_kg(value: Decimal) -> String {
    let text = kg(value);
    if value > Decimal::ZERO {
        format!("+{}", text).red().to_string()
    } else if value < Decimal::ZERO {
        text.green().to_string()
    } else {
        text
    }
}

#[derive(Tabled)]
struct HistoryTableRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Weight")]
    weight: String,
    #[tabled(rename = "Body fat")]
    fat: String,
    #[tabled(rename = "Change")]
    change: String,
}

#[derive(Tabled)]
struct MonthlyTableRow {
    #[tabled(rename = "Month")]
    month: String,
    #[tabled(rename = "Start")]
    start: String,
    #[tabled(rename = "End")]
    end: String,
    #[tabled(rename = "Change")]
    change: String,
    #[tabled(rename = "Average")]
    average: String,
}

#[derive(Tabled)]
struct WeekdayTableRow {
    #[tabled(rename = "Day")]
    day: String,
    #[tabled(rename = "Avg change")]
    average: String,
    #[tabled(rename = "Win rate")]
    win_rate: String,
    #[tabled(rename = "Grade")]
    grade: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<TrackerError>() {
            Some(tracker_error) => report_error(tracker_error),
            None => eprintln!("{} {:#}", "Error:".red().bold(), e),
        }
        std::process::exit(1);
    }
}

fn report_error(error: &TrackerError) {
    let severity = error.severity();
    let label = match severity {
        ErrorSeverity::Critical | ErrorSeverity::Error => severity.label().red().bold(),
        ErrorSeverity::Warning => severity.label().yellow().bold(),
        ErrorSeverity::Info => severity.label().cyan().bold(),
    };
    eprintln!("{} {}", label, error.user_message());
    if error.is_retryable() {
        eprintln!("{}", "This may succeed if you try again.".dimmed());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::load_or_default(),
    };

    let mut log_config = config.logging.clone();
    log_config.level = log_config.level.raised_by(cli.verbose);
    init_logging(&log_config).context("Failed to initialize logging")?;

    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.storage.data_dir.clone());
    let tracker = Tracker::open(
        JsonFileStore::new(&data_dir),
        config.default_settings.clone(),
        config.storage.debounce(),
        Arc::new(SystemClock),
    )
    .with_context(|| format!("Failed to open data directory {}", data_dir.display()))?
    .with_analytics(config.analytics.clone());

    execute(&tracker, &config, cli.command)?;
    tracker.flush().await?;
    Ok(())
}

fn execute(tracker: &Tracker, config: &AppConfig, command: Commands) -> Result<()> {
    match command {
        Commands::Add {
            weight,
            date,
            fat,
            overwrite,
        } => {
            let date = date.unwrap_or_else(|| tracker.today());
            let outcome = tracker.add_record(date, weight, fat, overwrite)?;
            let verb = match outcome {
                UpsertOutcome::Inserted => "Saved",
                UpsertOutcome::Replaced(_) => "Replaced",
            };
            println!(
                "{} {} for {}",
                format!("✓ {}", verb).green().bold(),
                kg(weight),
                format_date(date)
            );
            print_unlocked_count(tracker);
        }

        Commands::Edit {
            date,
            weight,
            fat,
            new_date,
            overwrite,
        } => {
            let existing = tracker
                .records()
                .into_iter()
                .find(|r| r.date == date)
                .ok_or(TrackerError::NotFound { date })?;
            let target = new_date.unwrap_or(date);
            tracker.edit_record(
                date,
                target,
                weight.unwrap_or(existing.weight),
                fat.or(existing.fat),
                overwrite,
            )?;
            println!("{} {}", "✓ Updated".green().bold(), format_date(target));
        }

        Commands::Remove { date } => {
            let removed = tracker.remove_record(date)?;
            println!(
                "{} {} ({})",
                "✓ Removed".green().bold(),
                format_date(removed.date),
                kg(removed.weight)
            );
        }

        Commands::List { filter, limit } => {
            let records = tracker.records();
            let shown = filter.apply(&records, tracker.today());
            let mut rows = reports::history(shown);
            if let Some(limit) = limit {
                rows.truncate(limit);
            }
            if rows.is_empty() {
                println!("{}", "No records in this range.".yellow());
                return Ok(());
            }
            let rows: Vec<HistoryTableRow> = rows
                .into_iter()
                .map(|row| HistoryTableRow {
                    date: format_date(row.date),
                    weight: kg(row.weight),
                    fat: row.fat.map_or("-".to_string(), |f| format!("{}%", format_fixed(f, 1))),
                    change: row.change.map_or("-".to_string(), signed_kg),
                })
                .collect();
            println!("{}", Table::new(rows).with(Style::rounded()));
        }

        Commands::Stats => print_stats(tracker),

        Commands::Badges { all } => {
            let status = tracker.analyze(badges::evaluate);
            let unlocked = status.values().filter(|v| **v).count();
            println!(
                "{}",
                format!("Badges {}/{}", unlocked, status.len()).cyan().bold()
            );
            for badge in badges::catalog() {
                let earned = status.get(&badge.id).copied().unwrap_or(false);
                if earned {
                    println!("  {} {} - {}", badge.icon, badge.name.bold(), badge.description);
                } else if all {
                    println!("  🔒 {} - {}", badge.name.dimmed(), badge.description.dimmed());
                }
            }
        }

        Commands::Project => {
            let projection = tracker.analyze(|ctx| {
                ProjectionCalculator::with_config(config.analytics.clone()).project(
                    ctx.records,
                    ctx.settings.goal_weight,
                    ctx.today,
                )
            });
            print_projection(&projection);
        }

        Commands::Insights => {
            let found = tracker.analyze(insights::generate);
            if found.is_empty() {
                println!(
                    "{}",
                    format!(
                        "Insights need at least {} records.",
                        insights::MIN_RECORDS
                    )
                    .yellow()
                );
            }
            for insight in &found {
                println!("  • {}", describe_insight(insight));
            }
        }

        Commands::Report { json } => {
            let report = tracker.analyze(reports::full_report);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            println!("{}", "Monthly".cyan().bold());
            let monthly: Vec<MonthlyTableRow> = report
                .monthly
                .iter()
                .map(|row| MonthlyTableRow {
                    month: row.month.to_string(),
                    start: kg(row.start),
                    end: kg(row.end),
                    change: signed_kg(row.change),
                    average: kg(row.average),
                })
                .collect();
            println!("{}", Table::new(monthly).with(Style::rounded()));

            println!("{}", "Weekdays".cyan().bold());
            let weekdays: Vec<WeekdayTableRow> = report
                .weekday_grades
                .iter()
                .map(|row| WeekdayTableRow {
                    day: row.weekday.to_string(),
                    average: signed_kg(row.average_change),
                    win_rate: format!("{}%", row.win_rate_percent),
                    grade: format!("{:?}", row.grade),
                })
                .collect();
            println!("{}", Table::new(weekdays).with(Style::rounded()));

            println!("{}", "Streaks".cyan().bold());
            println!("  Longest loss streak: {} entries", report.streaks.longest_loss);
            println!("  Longest gain streak: {} entries", report.streaks.longest_gain);
            println!("  Longest recording streak: {} days", report.streaks.longest_recording);
            println!("  Longest gap: {} days", report.streaks.longest_gap_days);

            if !report.sprints.is_empty() {
                println!("{}", "Fastest kilograms".cyan().bold());
                for sprint in &report.sprints {
                    println!(
                        "  {} → {}: {} in {} days",
                        format_date(sprint.start),
                        format_date(sprint.end),
                        kg(sprint.loss_kg),
                        sprint.days
                    );
                }
            }

            println!("{}", "Consistency".cyan().bold());
            println!("  Recording score: {}/100", report.consistency.record_score);
            println!("  Plateau: {:?}", report.plateau);
        }

        Commands::Import { file } => {
            let report = tracker
                .import_file(&file)
                .with_context(|| format!("Failed to import {}", file.display()))?;
            println!(
                "{} {} records imported, {} skipped",
                "✓ Import completed".green().bold(),
                report.summary.accepted,
                report.failed()
            );
            if report.settings_restored {
                println!("  Settings restored from backup");
            }
        }

        Commands::Export { output, format } => {
            let output =
                output.unwrap_or_else(|| PathBuf::from(format.default_file_name(tracker.today())));
            tracker.export_to_path(format, &output)?;
            println!(
                "{} {} records to {}",
                "✓ Exported".green().bold(),
                tracker.record_count(),
                output.display()
            );
        }

        Commands::Settings {
            height,
            start,
            goal,
            intake,
        } => {
            let current = tracker.settings();
            if height.is_none() && start.is_none() && goal.is_none() && intake.is_none() {
                print_settings(&current);
                return Ok(());
            }
            let updated = Settings {
                height_cm: height.unwrap_or(current.height_cm),
                start_weight: start.unwrap_or(current.start_weight),
                goal_weight: goal.unwrap_or(current.goal_weight),
                daily_intake_kcal: intake.unwrap_or(current.daily_intake_kcal),
            };
            tracker.update_settings(updated.clone())?;
            println!("{}", "✓ Settings updated".green().bold());
            print_settings(&updated);
        }

        Commands::Reset { yes } => {
            if !yes {
                bail!("Reset deletes every record; run again with --yes to confirm");
            }
            tracker.reset(config.default_settings.clone())?;
            println!("{}", "✓ All data reset".yellow().bold());
        }
    }

    Ok(())
}

fn print_unlocked_count(tracker: &Tracker) {
    let unlocked = tracker.analyze(|ctx| badges::unlocked(ctx).len());
    if unlocked > 0 {
        println!("  {} badges unlocked", unlocked.to_string().cyan());
    }
}

fn print_settings(settings: &Settings) {
    println!("  Height:       {}cm", settings.height_cm);
    println!("  Start weight: {}", kg(settings.start_weight));
    println!("  Goal weight:  {}", kg(settings.goal_weight));
    println!("  Daily intake: {}kcal", settings.daily_intake_kcal);
}

fn print_stats(tracker: &Tracker) {
    let snapshot = tracker.snapshot();
    let Some(current) = snapshot.current else {
        println!("{}", "No records yet. Add one with `weightrs add <kg>`.".yellow());
        return;
    };

    println!("{}", "Summary".cyan().bold());
    println!("  Current:       {}", kg(current));
    if let (Some(min), Some(min_date)) = (snapshot.min, snapshot.min_date) {
        println!("  Lowest:        {} ({})", kg(min), format_date(min_date));
    }
    if let (Some(max), Some(max_date)) = (snapshot.max, snapshot.max_date) {
        println!("  Highest:       {} ({})", kg(max), format_date(max_date));
    }
    println!("  Loss streak:   {} entries", snapshot.max_streak_days);
    println!("  Success rate:  {}%", snapshot.success_rate_percent);
    println!("  Biggest drop:  {}", kg(snapshot.max_daily_drop));
    println!("  Biggest gain:  {}", kg(snapshot.max_daily_gain));
    println!("  Std deviation: {}", format_fixed(snapshot.std_dev, 2));
    println!("  Longest plateau: {} entries", snapshot.max_plateau_days);

    tracker.analyze(|ctx| {
        if let Some(progress) = body::progress_summary(ctx.records, ctx.settings) {
            println!("{}", "Progress".cyan().bold());
            println!("  Lost so far:   {}", signed_kg(-progress.total_lost));
            println!(
                "  Remaining:     {} ({}% of plan done)",
                kg(remaining_kg(progress.current, ctx.settings.goal_weight)),
                format_fixed(progress.percent_of_goal_display, 1)
            );
            if let (Some(bmi), Some(category)) = (progress.bmi, progress.bmi_category) {
                println!("  BMI:           {} ({})", format_fixed(bmi, 1), category.label());
            }
        }

        if let Some(comparison) = comparison::weekly_comparison(ctx.records, ctx.today) {
            println!("  This week vs last: {}", signed_kg(comparison.diff));
        }

        if let Some(energy) = metabolic::estimate_energy(ctx.records, ctx.settings) {
            println!("{}", "Energy".cyan().bold());
            println!("  Estimated TDEE: {}kcal", format_fixed(energy.tdee_kcal, 0));
            println!("  Daily deficit:  {}kcal", format_fixed(energy.deficit_kcal, 0));
            if energy.adaptation_suspected {
                println!("  {}", "Loss has slowed against your long-term pace".yellow());
            }
        }
    });
}

fn print_projection(projection: &Projection) {
    match projection {
        Projection::Achieved => println!("{}", "🎉 Goal reached!".green().bold()),
        Projection::InsufficientData { records, required } => println!(
            "{}",
            format!("Need {} records for a projection (have {}).", required, records).yellow()
        ),
        Projection::NotProgressing { rate_kg_per_day } => println!(
            "{} recent trend is {}/day",
            "Not progressing:".yellow().bold(),
            signed_kg(-*rate_kg_per_day)
        ),
        Projection::Estimate(estimate) => {
            println!("{}", "Goal projection".cyan().bold());
            println!("  Remaining:    {}", kg(estimate.remaining_kg));
            println!(
                "  Expected:     {} ({} days)",
                format_date(estimate.point_estimate),
                estimate.days_to_goal
            );
            println!(
                "  Optimistic:   {} ({} days)",
                format_date(estimate.optimistic),
                estimate.optimistic_days
            );
            println!(
                "  Conservative: {} ({} days)",
                format_date(estimate.conservative),
                estimate.conservative_days
            );
        }
    }
}

fn describe_insight(insight: &Insight) -> String {
    match insight {
        Insight::Persona { persona } => format!("Your weight curve reads as {:?}", persona),
        Insight::WaterMasking { fat_change } => format!(
            "Body fat changed {}% while the scale held: likely water masking fat loss",
            format_fixed(*fat_change, 1)
        ),
        Insight::GoldenCross => "Golden cross: the 7-entry average fell below the 30-entry average".to_string(),
        Insight::DeadCross => "Dead cross: the 7-entry average rose above the 30-entry average".to_string(),
        Insight::BestWorstWeekday { best, worst } => {
            format!("Best weekday is {}, worst is {}", best, worst)
        }
        Insight::CyclePattern { cycles_with_gain } => format!(
            "A gain recurs about every 28 entries ({} cycles)",
            cycles_with_gain
        ),
        Insight::ReboundWarning { drop_kg } => {
            format!("Dropped {} in three entries; expect some rebound", kg(*drop_kg))
        }
        Insight::SeasonalGain { month, gain_kg } => {
            format!("Month {} tends to add {}", month, kg(*gain_kg))
        }
        Insight::CheatRecovery(pattern) => format!(
            "Spikes on {} usually recover by {} ({} times)",
            pattern.spike_day, pattern.recovery_day, pattern.occurrences
        ),
        Insight::ZoneSpeed {
            fastest_zone_kg,
            slowest_zone_kg,
        } => format!(
            "Fastest progress in the {}kg zone, slowest in the {}kg zone",
            fastest_zone_kg, slowest_zone_kg
        ),
        Insight::LongestPlateau { entries } => format!("Longest plateau: {} entries", entries),
        Insight::Volatility { score, level } => {
            format!("Volatility score {} ({:?})", score, level)
        }
        Insight::ConfidenceWindow(window) => format!(
            "Goal likely between {} and {}",
            format_date(window.earliest),
            format_date(window.latest)
        ),
        Insight::MonthlyGrade {
            month,
            grade,
            loss_kg,
        } => format!("{} grade {:?}: {} lost", month, grade, kg(*loss_kg)),
        Insight::RapidLossWarning { weekly_drop_kg } => format!(
            "{} lost in a week is faster than recommended",
            kg(*weekly_drop_kg)
        ),
        Insight::BestPerformance { from, to, loss_kg } => format!(
            "Best week: {} → {} with {} lost",
            format_date(*from),
            format_date(*to),
            kg(*loss_kg)
        ),
        Insight::FridayPattern => "Losses through Thursday tend to reverse on Friday or Saturday".to_string(),
        Insight::StopLoss {
            gain_streak,
            gained_kg,
        } => format!(
            "{} gains in a row adding {}: time for a stop-loss",
            gain_streak,
            kg(*gained_kg)
        ),
        Insight::FalsePlateau => "Flat week, but the latest entry is below the weekly mean".to_string(),
        Insight::WhooshExpected { plateau_entries } => format!(
            "{} flat entries: a whoosh is often close",
            plateau_entries
        ),
        Insight::TrendReversal { peak_kg } => {
            format!("Trend turned down after peaking at {}", kg(*peak_kg))
        }
        Insight::CheatRecoveryDays { average_days } => format!(
            "Spikes take about {} entries to recover",
            format_fixed(*average_days, 1)
        ),
        Insight::LossStyle { style } => format!("Loss style: {:?}", style),
        Insight::ShortTrend(reading) => format!(
            "Short trend {:?}: {} over the last entries",
            reading.trend,
            signed_kg(reading.change_kg)
        ),
    }
}
