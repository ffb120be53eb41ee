use clap::{Parser, Subcommand};
use log::{error, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use student_scheduler::config::SchedulerConfig;
use student_scheduler::data::{FailureOutput, SchedulingInput};
use student_scheduler::error::{Result, ScheduleError};
use student_scheduler::server::{self, AppState};
use student_scheduler::solver::HighsBackend;

/// Assigns students to course sections with a MILP solver
#[derive(Parser)]
#[command(name = "student_scheduler")]
#[command(version)]
struct Cli {
    /// JSON configuration file (weighting, solver and server settings)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Solver threads
    #[arg(long, global = true)]
    threads: Option<u32>,

    /// Solver random seed
    #[arg(long, global = true)]
    seed: Option<u32>,

    /// Solver time limit in seconds
    #[arg(long, global = true)]
    time_limit: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve POST /v1/schedule/solve over HTTP
    Serve {
        /// Address to listen on
        #[arg(short, long)]
        bind: Option<String>,

        /// Seconds before a request is abandoned
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Solve one input file and print the result as JSON
    Solve {
        /// Scheduling input (catalog and students)
        input: PathBuf,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn load_config(cli: &Cli) -> Result<SchedulerConfig> {
    let mut config = match &cli.config {
        Some(path) => SchedulerConfig::load(path)?,
        None => SchedulerConfig::default(),
    };
    if let Some(threads) = cli.threads {
        config.solver.threads = threads;
    }
    if let Some(seed) = cli.seed {
        config.solver.random_seed = seed;
    }
    if cli.time_limit.is_some() {
        config.solver.time_limit_secs = cli.time_limit;
    }
    if let Commands::Serve { bind, timeout } = &cli.command {
        if let Some(bind) = bind {
            config.server.bind = bind.clone();
        }
        if let Some(timeout) = timeout {
            config.server.request_timeout_secs = *timeout;
        }
    }
    config.validate()?;
    Ok(config)
}

fn solve_file(input: &Path, output: Option<&Path>, config: &SchedulerConfig) -> Result<()> {
    let input: SchedulingInput = serde_json::from_str(&fs::read_to_string(input)?)?;
    let backend = HighsBackend::new(config.solver.clone());

    let json = match student_scheduler::schedule(input, config, &backend) {
        Ok(report) => {
            for schedule in &report.schedules {
                for unmet in &schedule.unmet_preferences {
                    info!("Student {}: {}", schedule.student_id, unmet);
                }
            }
            serde_json::to_string_pretty(&report.into_output())?
        }
        Err(e) => {
            let body = serde_json::to_string_pretty(&FailureOutput::from(&e))?;
            write_result(output, &body)?;
            return Err(e);
        }
    };
    write_result(output, &json)
}

fn write_result(output: Option<&Path>, json: &str) -> Result<()> {
    match output {
        Some(path) => fs::write(path, json).map_err(ScheduleError::from),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match &cli.command {
        Commands::Serve { .. } => {
            let backend = Arc::new(HighsBackend::new(config.solver.clone()));
            server::run_server(AppState::new(config, backend)).await
        }
        Commands::Solve { input, output } => {
            let input = input.clone();
            let output = output.clone();
            tokio::task::spawn_blocking(move || solve_file(&input, output.as_deref(), &config))
                .await
                .unwrap_or_else(|e| Err(ScheduleError::solver(e.to_string())))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
