//! Jobkeeper CLI Entry Point
//!
//! Submits one workflow to the runner, tails its log and prints the final
//! job status.
//!
//! # Usage
//!
//! ```bash
//! # Run a workflow with inputs from a YAML or JSON file
//! jobkeeper align.cwl inputs.yaml
//!
//! # Use a specific runner and give up after ten minutes
//! jobkeeper align.cwl inputs.yaml --runner /opt/cwl/bin/cwltool --timeout 600
//! ```

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use colored::Colorize;
use log::{debug, info};
use serde_json::Value;

use jobkeeper::environment::resolve_runner;
use jobkeeper::{Job, JobRegistry, JobRequest, JobState, RunnerConfig, APP_NAME, VERSION};

/// Command-line configuration parsed from arguments.
#[derive(Debug, Default)]
struct Config {
    workflow_path: Option<String>,
    input_path: Option<String>,
    name: String,
    runner: Option<String>,
    base_url: Option<String>,
    work_root: Option<PathBuf>,
    timeout: Option<Duration>,
    poll_interval: Option<Duration>,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| match record.level() {
            log::Level::Warn | log::Level::Error => {
                writeln!(buf, "[{}] {}", record.level(), record.args())
            }
            _ => writeln!(buf, "{}", record.args()),
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    eprintln!();
    eprintln!("{} v{}", APP_NAME, VERSION);
    eprintln!("Workflow Job Lifecycle Manager");
    eprintln!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: jobkeeper [OPTIONS] <WORKFLOW> [INPUT_FILE]");
    println!();
    println!("Arguments:");
    println!("  <WORKFLOW>          Workflow document passed to the runner");
    println!("  [INPUT_FILE]        YAML or JSON input object (default: {{}})");
    println!();
    println!("Options:");
    println!("  --name NAME         Label for the job");
    println!("  --runner PATH       Runner executable (default: $JOBKEEPER_RUNNER or cwl-runner)");
    println!("  --base-url URL      Prefix for job and log URLs (default: /)");
    println!("  --work-root PATH    Directory for job work dirs and logs");
    println!("  --timeout SECS      Cancel the job after SECS seconds");
    println!("  --poll-ms MS        Log poll interval in milliseconds (default: 1000)");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Examples:");
    println!("  jobkeeper align.cwl inputs.yaml");
    println!("  jobkeeper align.cwl inputs.json --runner cwltool --timeout 600");
}

/// Returns the value following an option, advancing the cursor.
fn option_value<'a>(args: &'a [String], i: &mut usize, option: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires a value", option))
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut positional_index = 0;
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--name" => {
                config.name = option_value(args, &mut i, "--name")?.to_string();
            }
            "--runner" => {
                config.runner = Some(option_value(args, &mut i, "--runner")?.to_string());
            }
            "--base-url" => {
                config.base_url = Some(option_value(args, &mut i, "--base-url")?.to_string());
            }
            "--work-root" => {
                config.work_root = Some(PathBuf::from(option_value(args, &mut i, "--work-root")?));
            }
            "--timeout" => {
                let value = option_value(args, &mut i, "--timeout")?;
                let secs: u64 = value
                    .parse()
                    .map_err(|_| format!("Invalid timeout value: {}", value))?;
                config.timeout = Some(Duration::from_secs(secs));
            }
            "--poll-ms" => {
                let value = option_value(args, &mut i, "--poll-ms")?;
                let ms: u64 = value
                    .parse()
                    .map_err(|_| format!("Invalid poll interval: {}", value))?;
                config.poll_interval = Some(Duration::from_millis(ms));
            }
            arg if arg.starts_with('-') && arg.len() > 1 => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                match positional_index {
                    0 => config.workflow_path = Some(arg.clone()),
                    1 => config.input_path = Some(arg.clone()),
                    _ => return Err(format!("Unexpected argument: {}", arg)),
                }
                positional_index += 1;
            }
        }
        i += 1;
    }

    if config.workflow_path.is_none() {
        return Err("Missing workflow argument".to_string());
    }

    Ok(config)
}

/// Reads the input object from a YAML or JSON file.
fn load_input(path: Option<&str>) -> Result<Value, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(Value::Object(Default::default()));
    };

    let text = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read input file '{}': {}", path, e))?;
    let input = JobRequest::parse_input(&text)
        .map_err(|e| format!("Failed to parse input file '{}': {}", path, e))?;

    debug!("Input object loaded ({} bytes)", text.len());
    Ok(input)
}

/// Builds the job configuration from command-line settings.
fn runner_config(config: &Config) -> Result<RunnerConfig, Box<dyn std::error::Error>> {
    let mut runner_config = match config.runner.as_deref() {
        Some(runner) => RunnerConfig::with_runner(resolve_runner(runner)),
        None => RunnerConfig::default(),
    };

    if let Some(ref base_url) = config.base_url {
        runner_config.set_base_url(base_url.as_str());
    }

    if let Some(ref dir) = config.work_root {
        if !dir.is_dir() {
            return Err(format!("Work root is not a directory: {}", dir.display()).into());
        }
        runner_config.set_work_root(dir);
    }

    if let Some(interval) = config.poll_interval {
        runner_config.set_log_poll_interval(interval);
    }

    runner_config.set_max_runtime(config.timeout);
    Ok(runner_config)
}

/// Colors a state for the summary line.
fn paint(state: JobState) -> colored::ColoredString {
    match state {
        JobState::Success => state.as_str().green().bold(),
        JobState::Running | JobState::Paused => state.as_str().yellow(),
        JobState::Cancelled => state.as_str().magenta(),
        JobState::PermanentFailure | JobState::SystemError => state.as_str().red().bold(),
    }
}

/// One-line outcome of a finished job, with run and pause times.
fn summary_line(job: &Job, state: JobState) -> String {
    let mut line = format!("Job {} finished: {}", job.id(), paint(state));
    if let Some(runtime) = job.runtime() {
        line.push_str(&format!(" ({:.2}s", seconds(runtime)));
        let paused = job.paused_for();
        if paused > chrono::Duration::zero() {
            line.push_str(&format!(", {:.2}s paused", seconds(paused)));
        }
        line.push(')');
    }
    line
}

fn seconds(duration: chrono::Duration) -> f64 {
    duration.num_milliseconds() as f64 / 1000.0
}

/// Main application entry point.
fn run() -> Result<JobState, Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(config.verbose);
    print_banner();

    let input = load_input(config.input_path.as_deref())?;
    let runner_config = runner_config(&config)?;
    info!("Runner: {}", runner_config.runner().display());
    if let Some(limit) = runner_config.max_runtime() {
        info!("Deadline: {:?}", limit);
    }

    let registry = JobRegistry::new(runner_config);
    let workflow = config.workflow_path.unwrap_or_default();
    let id = registry.create(JobRequest::new(workflow, input).with_name(config.name));

    // Tail the runner log until the job leaves Running.
    let mut stderr = io::stderr().lock();
    for chunk in registry.stream_log(id)? {
        stderr.write_all(&chunk)?;
    }
    stderr.flush()?;
    drop(stderr);

    let job = registry.get(id)?;
    let status = job.wait(None);

    eprintln!();
    eprintln!("{}", summary_line(&job, status.state));

    println!("{}", status.to_json_pretty()?);
    Ok(status.state)
}

fn main() -> ExitCode {
    match run() {
        Ok(JobState::Success) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("jobkeeper")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_minimal() {
        let config = parse_arguments(&args(&["wf.cwl"])).unwrap();
        assert_eq!(config.workflow_path.as_deref(), Some("wf.cwl"));
        assert!(config.input_path.is_none());
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_parse_full() {
        let config = parse_arguments(&args(&[
            "wf.cwl",
            "inputs.yaml",
            "--name",
            "nightly",
            "--runner",
            "cwltool",
            "--timeout",
            "60",
            "--poll-ms",
            "250",
            "--verbose",
        ]))
        .unwrap();

        assert_eq!(config.input_path.as_deref(), Some("inputs.yaml"));
        assert_eq!(config.name, "nightly");
        assert_eq!(config.runner.as_deref(), Some("cwltool"));
        assert_eq!(config.timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.poll_interval, Some(Duration::from_millis(250)));
        assert!(config.verbose);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_arguments(&args(&[])).is_err());
        assert!(parse_arguments(&args(&["wf.cwl", "--timeout"])).is_err());
        assert!(parse_arguments(&args(&["wf.cwl", "--timeout", "soon"])).is_err());
        assert!(parse_arguments(&args(&["wf.cwl", "--bogus"])).is_err());
        assert!(parse_arguments(&args(&["a", "b", "c"])).is_err());
    }

    #[test]
    fn test_load_input_default() {
        assert_eq!(load_input(None).unwrap(), serde_json::json!({}));
    }

    #[test]
    fn test_load_input_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inputs.yaml");
        fs::write(&path, "reads:\n  - a.fq\nthreads: 4\n").unwrap();

        let input = load_input(path.to_str()).unwrap();
        assert_eq!(input, serde_json::json!({"reads": ["a.fq"], "threads": 4}));
    }

    #[test]
    fn test_load_input_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        fs::write(&path, "{unclosed: [").unwrap();

        let err = load_input(path.to_str()).unwrap_err().to_string();
        assert!(err.contains("broken.yaml"));
        assert!(err.contains("YAML error"));
    }

    #[test]
    fn test_summary_line_without_runtime() {
        colored::control::set_override(false);
        let job = Job::start(
            jobkeeper::JobId(4),
            JobRequest::new("wf.cwl", serde_json::json!({})),
            &RunnerConfig::with_runner("not-a-real-binary"),
        );

        assert_eq!(job.paused_for(), chrono::Duration::zero());
        assert_eq!(
            summary_line(&job, job.state()),
            "Job 4 finished: SystemError (0.00s)"
        );
    }

    #[test]
    fn test_runner_config_rejects_missing_work_root() {
        let config = Config {
            runner: Some("cwltool".to_string()),
            work_root: Some(PathBuf::from("/nonexistent/jobkeeper")),
            ..Config::default()
        };
        assert!(runner_config(&config).is_err());
    }

    #[test]
    fn test_runner_config_applies_settings() {
        let config = Config {
            runner: Some("/opt/bin/runner".to_string()),
            base_url: Some("http://localhost:5000".to_string()),
            timeout: Some(Duration::from_secs(5)),
            ..Config::default()
        };
        let runner_config = runner_config(&config).unwrap();

        assert_eq!(runner_config.runner(), &PathBuf::from("/opt/bin/runner"));
        assert_eq!(runner_config.base_url(), "http://localhost:5000/");
        assert_eq!(runner_config.max_runtime(), Some(Duration::from_secs(5)));
    }
}
