//! jsub - generate Japanese SRT subtitles from a video file.
//!
//! Thin shell over `jsub_core`: loads settings, detects hardware, submits
//! one job and renders its events.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use directories::ProjectDirs;
use indicatif::{ProgressBar, ProgressStyle};

use jsub_core::config::{ConfigError, ConfigManager, Settings};
use jsub_core::hardware::{self, NvidiaSmiProbe};
use jsub_core::io::CancelToken;
use jsub_core::logging::{init_tracing_with_writer, LogLevel};
use jsub_core::models::{CapabilityDescriptor, ComputeTypePolicy, JobOutcome};
use jsub_core::orchestrator::{JobWorker, WorkerEvent};
use jsub_core::subtitles::{check_subtitles, read_srt_file, FormatOptions};

/// Exit status after Ctrl-C (128 + SIGINT).
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser, Debug)]
#[command(
    name = "jsub",
    version,
    about = "Generate Japanese SRT subtitles from .mkv/.mp4 videos"
)]
struct Cli {
    /// Settings file (default: per-user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More output (-v debug, -vv trace). Also prints the job log.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transcribe a video and write `<name>.srt`
    Run(RunArgs),
    /// Show which device and precision would be used
    Detect,
    /// Manage the settings file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Check an existing SRT file against the formatting rules
    Inspect {
        /// SRT file to check
        srt: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Create the settings file with defaults (fills in missing keys)
    Init {
        /// Overwrite an existing file with defaults
        #[arg(long)]
        force: bool,
    },
    /// Print the effective settings
    Show,
    /// Print the settings file location
    Path,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Input video (.mkv or .mp4)
    video: PathBuf,

    /// Write the subtitle file into this directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Recognition model file
    #[arg(long)]
    model: Option<String>,

    /// Beam size for decoding
    #[arg(long)]
    beam_size: Option<u32>,

    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f64>,

    /// Maximum characters per subtitle line
    #[arg(long)]
    max_line_length: Option<u32>,

    /// Maximum lines per subtitle
    #[arg(long)]
    max_lines: Option<u32>,

    /// Compute type: auto, float16, int8 or float32
    #[arg(long)]
    compute_type: Option<ComputeTypePolicy>,

    /// Enable voice activity detection
    #[arg(long, overrides_with = "no_vad")]
    vad: bool,

    /// Disable voice activity detection
    #[arg(long)]
    no_vad: bool,
}

impl RunArgs {
    fn apply(&self, settings: &mut Settings) {
        if let Some(dir) = &self.output_dir {
            settings.paths.output_dir = dir.to_string_lossy().to_string();
        }
        if let Some(model) = &self.model {
            settings.transcription.model = model.clone();
        }
        if let Some(beam) = self.beam_size {
            settings.transcription.beam_size = beam;
        }
        if let Some(temperature) = self.temperature {
            settings.transcription.temperature = temperature;
        }
        if let Some(len) = self.max_line_length {
            settings.formatting.max_line_length = len;
        }
        if let Some(lines) = self.max_lines {
            settings.formatting.max_lines_per_subtitle = lines;
        }
        if let Some(policy) = self.compute_type {
            settings.hardware.compute_type = policy;
        }
        if self.vad {
            settings.transcription.vad_enabled = true;
        } else if self.no_vad {
            settings.transcription.vad_enabled = false;
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Keep stderr quiet under the progress bar unless asked
    let level = match cli.verbose {
        0 => LogLevel::Warn,
        n => LogLevel::from_verbosity(n),
    };
    let (writer, _guard) = tracing_appender::non_blocking(std::io::stderr());
    init_tracing_with_writer(level, writer);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    match &cli.command {
        Command::Run(args) => run_job(&config_path, args, cli.verbose),
        Command::Detect => {
            let settings = load_settings(&config_path)?;
            let capability = detect(&settings);
            println!("{}", capability.label());
            if let Some(reason) = &capability.fallback_reason {
                println!("Fallback reason: {}", reason);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Config { action } => config_command(&config_path, action),
        Command::Inspect { srt } => inspect(&config_path, srt),
    }
}

fn default_config_path() -> PathBuf {
    ProjectDirs::from("", "", "jsub")
        .map(|dirs| dirs.config_dir().join("settings.toml"))
        .unwrap_or_else(|| PathBuf::from("jsub.toml"))
}

fn load_settings(path: &Path) -> Result<Settings> {
    let mut config = ConfigManager::new(path);
    config
        .load_or_create()
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    Ok(config.into_settings())
}

fn detect(settings: &Settings) -> CapabilityDescriptor {
    let probe = NvidiaSmiProbe::new(&settings.tools.gpu_probe);
    hardware::detect_once(&probe, settings.hardware.compute_type)
}

fn run_job(config_path: &Path, args: &RunArgs, verbose: u8) -> Result<ExitCode> {
    let mut settings = load_settings(config_path)?;
    args.apply(&mut settings);
    settings.validate().context("Invalid option")?;

    let capability = detect(&settings);
    println!("{}", capability.label());
    if let Some(reason) = &capability.fallback_reason {
        println!("  {}", reason);
    }

    let worker = JobWorker::from_settings(settings, capability);
    let mut handle = worker.submit(&args.video)?;
    cancel_on_ctrl_c(handle.cancel_token());

    let bar = ProgressBar::new(1000);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {percent:>3}% {msg}")
            .context("Invalid progress template")?
            .progress_chars("=> "),
    );

    let mut attempt = 1;
    let mut outcome = None;
    for event in handle.events().iter() {
        match event {
            WorkerEvent::Progress(p) => {
                bar.set_position((p.overall * 1000.0).round() as u64);
                bar.set_message(format!("{:<12} {}", p.stage.name(), format_eta(p.eta)));
            }
            WorkerEvent::StateChanged(snapshot) => {
                if snapshot.attempt > attempt {
                    attempt = snapshot.attempt;
                    if let Some(cap) = &snapshot.capability {
                        bar.println(format!("Retrying recognition - {}", cap.label()));
                    }
                }
            }
            WorkerEvent::Log(line) => {
                if verbose > 0 {
                    bar.println(line);
                }
            }
            WorkerEvent::Finished(result) => {
                outcome = Some(result);
                break;
            }
        }
    }
    bar.finish_and_clear();
    handle.join();

    let Some(outcome) = outcome else {
        bail!("Worker stopped without reporting a result");
    };

    Ok(match outcome {
        JobOutcome::Succeeded {
            output_path,
            subtitle_count,
            capability,
        } => {
            println!(
                "Wrote {} subtitles to {} ({})",
                subtitle_count,
                output_path.display(),
                capability.label()
            );
            ExitCode::SUCCESS
        }
        JobOutcome::Failed(failure) => {
            eprintln!("Failed: {}", failure.message);
            eprintln!(
                "  {} during {}; check the {}",
                failure.kind, failure.stage, failure.category
            );
            ExitCode::FAILURE
        }
        JobOutcome::Cancelled => {
            eprintln!("Cancelled");
            ExitCode::from(EXIT_CANCELLED)
        }
    })
}

/// Cancel the job on the first Ctrl-C.
fn cancel_on_ctrl_c(token: CancelToken) {
    let spawned = thread::Builder::new()
        .name("jsub-signal".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    tracing::warn!("Ctrl-C handling unavailable: {}", e);
                    return;
                }
            };
            if runtime.block_on(tokio::signal::ctrl_c()).is_ok() {
                tracing::info!("Interrupted, cancelling job");
                token.cancel();
            }
        });

    if let Err(e) = spawned {
        tracing::warn!("Ctrl-C handling unavailable: {}", e);
    }
}

fn format_eta(eta: Option<f64>) -> String {
    let Some(secs) = eta else {
        return "ETA --:--".to_string();
    };
    let secs = secs.max(0.0).round() as u64;
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("ETA {}:{:02}:{:02}", h, m, s)
    } else {
        format!("ETA {:02}:{:02}", m, s)
    }
}

fn config_command(path: &Path, action: &ConfigAction) -> Result<ExitCode> {
    match action {
        ConfigAction::Init { force } => {
            let mut config = ConfigManager::new(path);
            if *force {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create {}", parent.display()))?;
                }
                config.save()?;
            } else {
                config.load_or_create()?;
            }
            config.ensure_dirs_exist()?;
            println!("{}", path.display());
        }
        ConfigAction::Show => {
            let mut config = ConfigManager::new(path);
            match config.load() {
                Ok(()) | Err(ConfigError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
            print!("{}", config.render()?);
        }
        ConfigAction::Path => println!("{}", path.display()),
    }
    Ok(ExitCode::SUCCESS)
}

fn inspect(config_path: &Path, srt: &Path) -> Result<ExitCode> {
    let settings = load_settings(config_path)?;
    let subtitles =
        read_srt_file(srt).with_context(|| format!("Failed to read {}", srt.display()))?;

    let span = subtitles.last().map(|s| s.end).unwrap_or(0.0);
    let longest = subtitles.iter().map(|s| s.longest_line()).max().unwrap_or(0);
    println!("{} subtitles, {:.1}s, longest line {} chars", subtitles.len(), span, longest);

    let issues = check_subtitles(&subtitles, &FormatOptions::from(&settings.formatting));
    if issues.is_empty() {
        println!("OK");
        return Ok(ExitCode::SUCCESS);
    }
    for issue in &issues {
        println!("  {}", issue);
    }
    Ok(ExitCode::FAILURE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn run_overrides_apply_to_settings() {
        let cli = Cli::parse_from([
            "jsub",
            "run",
            "movie.mkv",
            "--beam-size",
            "3",
            "--max-line-length",
            "20",
            "--compute-type",
            "int8",
            "--no-vad",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };

        let mut settings = Settings::default();
        settings.transcription.vad_enabled = true;
        args.apply(&mut settings);

        assert_eq!(settings.transcription.beam_size, 3);
        assert_eq!(settings.formatting.max_line_length, 20);
        assert_eq!(settings.hardware.compute_type, ComputeTypePolicy::Int8);
        assert!(!settings.transcription.vad_enabled);
    }

    #[test]
    fn eta_formatting() {
        assert_eq!(format_eta(None), "ETA --:--");
        assert_eq!(format_eta(Some(75.4)), "ETA 01:15");
        assert_eq!(format_eta(Some(3725.0)), "ETA 1:02:05");
    }
}
