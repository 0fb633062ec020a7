use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, warn, Level};

use habitrs::export::{self, text};
use habitrs::import::read_history;
use habitrs::{
    init_logging, Engine, EngineConfig, HabitError, History, LogFormat, PredictionInput,
    Recommendation, RecommendationType, SimulationParams, TrainingReport,
};

/// HabitRS - Habit adherence and burnout CLI
///
/// Trains an adherence classifier and a burnout survival model on a daily
/// activity history (simulated or your own) and turns their outputs into a
/// daily recommendation.
#[derive(Parser)]
#[command(name = "habitrs")]
#[command(author = "HabitRS Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Habit adherence and burnout CLI", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format (pretty, json, compact)
    #[arg(long, value_name = "FORMAT", global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

/// Simulator overrides; unset flags fall back to the config file
#[derive(Args, Debug, Clone, Default)]
struct SimulationArgs {
    /// Number of days to simulate
    #[arg(long)]
    days: Option<i64>,

    /// Average daily steps
    #[arg(long)]
    avg_steps: Option<f64>,

    /// Step standard deviation as a fraction of the average
    #[arg(long)]
    steps_volatility: Option<f64>,

    /// Average nightly sleep in hours
    #[arg(long)]
    avg_sleep_hours: Option<f64>,

    /// Sleep standard deviation as a fraction of the average
    #[arg(long)]
    sleep_volatility: Option<f64>,

    /// Expected exercise days per week
    #[arg(long)]
    exercise_freq: Option<f64>,

    /// Random seed for reproducible histories
    #[arg(long)]
    seed: Option<u64>,

    /// Last simulated day (YYYY-MM-DD), defaults to today
    #[arg(long)]
    end_date: Option<chrono::NaiveDate>,
}

impl SimulationArgs {
    fn apply(&self, base: &SimulationParams) -> SimulationParams {
        SimulationParams {
            history_days: self.days.unwrap_or(base.history_days),
            avg_steps: self.avg_steps.unwrap_or(base.avg_steps),
            steps_volatility: self.steps_volatility.unwrap_or(base.steps_volatility),
            avg_sleep_hours: self.avg_sleep_hours.unwrap_or(base.avg_sleep_hours),
            sleep_volatility: self.sleep_volatility.unwrap_or(base.sleep_volatility),
            exercise_freq: self.exercise_freq.unwrap_or(base.exercise_freq),
            seed: self.seed.or(base.seed),
            end_date: self.end_date.or(base.end_date),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a synthetic activity history
    Simulate {
        #[command(flatten)]
        sim: SimulationArgs,

        /// Write the history to a file (.csv or .json) instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of recent days to print
        #[arg(short, long, default_value = "14")]
        limit: usize,
    },

    /// Train both models and print evaluation metrics
    Train {
        /// History file (.csv or .json); simulates one when omitted
        #[arg(long, value_name = "FILE")]
        history: Option<PathBuf>,

        #[command(flatten)]
        sim: SimulationArgs,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Train, then recommend for today's numbers
    Predict {
        /// Steps taken today
        #[arg(long)]
        steps: u32,

        /// Hours slept last night
        #[arg(long)]
        sleep_hours: f64,

        /// Minutes of exercise today
        #[arg(long, default_value = "0")]
        exercise_minutes: u32,

        /// History file (.csv or .json); simulates one when omitted
        #[arg(long, value_name = "FILE")]
        history: Option<PathBuf>,

        #[command(flatten)]
        sim: SimulationArgs,

        /// Append today's input to the history file after predicting
        #[arg(long, requires = "history")]
        commit: bool,

        /// Print the recommendation as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configure application settings
    Config {
        /// Show the effective configuration
        #[arg(short, long)]
        list: bool,

        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_failure(&err);
            ExitCode::FAILURE
        }
    }
}

/// Print a failure, using the friendlier wording for engine errors
fn report_failure(err: &anyhow::Error) {
    let Some(habit_error) = err.downcast_ref::<HabitError>() else {
        error!(error = %err, "Command failed");
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        return;
    };

    if habit_error.severity().to_tracing_level() == Level::WARN {
        warn!(error = %habit_error, "Command failed");
    } else {
        error!(error = %habit_error, "Command failed");
    }

    eprintln!("{} {}", "Error:".red().bold(), habit_error.user_message());
    let outer = err.to_string();
    if outer != habit_error.to_string() {
        eprintln!("  {}", outer.dimmed());
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::load_or_default(),
    };

    config.logging.level = config.logging.level.raised_by(cli.verbose);
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    init_logging(&config.logging)?;

    if cli.verbose > 0 {
        eprintln!("{}", format!("Log level: {:?}", config.logging.level).dimmed());
    }

    match cli.command {
        Commands::Simulate { sim, output, limit } => {
            let params = sim.apply(&config.simulator);
            let history = habitrs::simulate_history(&params)?;
            match output {
                Some(path) => {
                    export::write_history(&path, &history)?;
                    println!(
                        "{} {} days written to {}",
                        "✓".green(),
                        history.len(),
                        path.display()
                    );
                }
                None => {
                    println!("{}", "Simulated history".green().bold());
                    println!("{}", text::history_table(&history, Some(limit)));
                    println!("  {} days total", history.len());
                }
            }
        }

        Commands::Train { history, sim, json } => {
            let engine = Engine::new(config.clone());
            let report = train(&engine, history.as_deref(), &sim, &config)?;
            if json {
                println!("{}", export::to_json_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }

        Commands::Predict {
            steps,
            sleep_hours,
            exercise_minutes,
            history,
            sim,
            commit,
            json,
        } => {
            let input = PredictionInput::new(steps, sleep_hours, exercise_minutes)?;
            let engine = Engine::new(config.clone());
            let report = train(&engine, history.as_deref(), &sim, &config)?;
            let recommendation = engine.predict(&input)?;

            if json {
                println!("{}", export::to_json_pretty(&recommendation)?);
            } else {
                print_recommendation(&recommendation);
            }

            if commit {
                if let Some(path) = history {
                    commit_input(&path, &report.history, &input)?;
                }
            }
        }

        Commands::Config { list, init } => {
            if init {
                let path = cli
                    .config
                    .clone()
                    .unwrap_or_else(EngineConfig::default_config_path);
                if path.exists() {
                    bail!("Config file already exists: {}", path.display());
                }
                EngineConfig::default().save_to_file(&path)?;
                println!("{} Wrote {}", "✓".green(), path.display());
            }
            if list || !init {
                let rendered = toml::to_string_pretty(&config)
                    .context("Failed to render configuration")?;
                println!("{}", rendered);
            }
        }
    }

    Ok(())
}

fn train(
    engine: &Engine,
    history: Option<&Path>,
    sim: &SimulationArgs,
    config: &EngineConfig,
) -> Result<TrainingReport> {
    let report = match history {
        Some(path) => {
            let history = read_history(path)
                .with_context(|| format!("Failed to read history from {}", path.display()))?;
            engine.train_custom(history)?
        }
        None => engine.simulate_train(&sim.apply(&config.simulator))?,
    };
    Ok(report)
}

fn commit_input(path: &Path, history: &History, input: &PredictionInput) -> Result<()> {
    let updated = history.commit(input)?;
    export::write_history(path, &updated)
        .with_context(|| format!("Failed to update {}", path.display()))?;
    println!(
        "{} Today's input saved to {}",
        "✓".green(),
        path.display()
    );
    Ok(())
}

fn print_report(report: &TrainingReport) {
    println!("{}", "Training complete".green().bold());
    println!("{}", text::training_summary(report, 5));
    if report.burnout_events_observed == 0 {
        println!(
            "{}",
            "No burnout events in this history; burnout risk stays at baseline.".yellow()
        );
    }
}

fn print_recommendation(recommendation: &Recommendation) {
    let label = recommendation.recommendation_type.to_string().to_uppercase();
    let badge = match recommendation.recommendation_type {
        RecommendationType::Warning => label.red().bold(),
        RecommendationType::Rest => label.yellow().bold(),
        RecommendationType::Push => label.blue().bold(),
        RecommendationType::Maintain => label.green().bold(),
    };

    println!("{} {}", badge, recommendation.message_title.bold());
    println!("{}", recommendation.message_body);
    println!("{} {}", "→".cyan(), recommendation.suggested_action);
    println!(
        "  Adherence probability: {:.0}%   Burnout risk: {:.2}x baseline",
        recommendation.adherence_probability * 100.0,
        recommendation.burnout_risk_score
    );
    if !recommendation.why_this_recommendation.is_empty() {
        println!("{}", "Why this recommendation:".dimmed());
        for reason in &recommendation.why_this_recommendation {
            println!("  • {}", reason);
        }
    }
}
