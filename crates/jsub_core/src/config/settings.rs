//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.
//! Every value is validated on load; invalid values never reach a running job.

use serde::{Deserialize, Serialize};

use crate::models::{ComputeTypePolicy, OverflowPolicy};

use super::manager::{ConfigError, ConfigResult};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// External tool locations.
    #[serde(default)]
    pub tools: ToolSettings,

    /// Recognizer decoding parameters.
    #[serde(default)]
    pub transcription: TranscriptionSettings,

    /// Subtitle formatting rules.
    #[serde(default)]
    pub formatting: FormattingSettings,

    /// Hardware selection.
    #[serde(default)]
    pub hardware: HardwareSettings,
}

impl Settings {
    /// Check every tunable, returning the first invalid one.
    pub fn validate(&self) -> ConfigResult<()> {
        self.transcription.validate()?;
        self.formatting.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Path configuration for output, temp, and logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Directory for subtitle files. Empty writes next to the input video.
    #[serde(default)]
    pub output_dir: String,

    /// Root folder for per-job temporary files. Empty uses the system temp dir.
    #[serde(default)]
    pub temp_root: String,

    /// Folder for per-job log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_dir: String::new(),
            temp_root: String::new(),
            logs_folder: default_logs_folder(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Use compact log format.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of tool output lines kept for the failure tail.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Progress update step percentage in the job log.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> u32 {
    20
}

fn default_progress_step() -> u32 {
    10
}

impl LoggingSettings {
    fn validate(&self) -> ConfigResult<()> {
        if self.progress_step == 0 || self.progress_step > 100 {
            return Err(ConfigError::invalid(
                "logging.progress_step",
                "must be between 1 and 100",
            ));
        }
        Ok(())
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            compact: true,
            error_tail: default_error_tail(),
            progress_step: default_progress_step(),
        }
    }
}

/// External tool executables (names are looked up on PATH).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,

    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,

    /// whisper.cpp command line front end.
    #[serde(default = "default_whisper")]
    pub whisper: String,

    /// GPU runtime probe.
    #[serde(default = "default_gpu_probe")]
    pub gpu_probe: String,
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

fn default_whisper() -> String {
    "whisper-cli".to_string()
}

fn default_gpu_probe() -> String {
    "nvidia-smi".to_string()
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
            whisper: default_whisper(),
            gpu_probe: default_gpu_probe(),
        }
    }
}

/// Recognizer decoding parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionSettings {
    /// Default model file.
    #[serde(default = "default_model")]
    pub model: String,

    /// Model file used at float16 precision (empty falls back to `model`).
    #[serde(default)]
    pub model_float16: String,

    /// Model file used at int8 precision (empty falls back to `model`).
    #[serde(default)]
    pub model_int8: String,

    /// Model file used at float32 precision (empty falls back to `model`).
    #[serde(default)]
    pub model_float32: String,

    /// Spoken language.
    #[serde(default = "default_language")]
    pub language: String,

    /// Prompt that primes the decoder with Japanese punctuation style.
    #[serde(default = "default_initial_prompt")]
    pub initial_prompt: String,

    #[serde(default = "default_beam_size")]
    pub beam_size: u32,

    #[serde(default)]
    pub temperature: f64,

    /// Voice activity detection pre-filter. Off by default; it has crashed
    /// on some macOS systems.
    #[serde(default)]
    pub vad_enabled: bool,

    /// VAD model file, required when `vad_enabled` is set.
    #[serde(default)]
    pub vad_model: String,

    #[serde(default = "default_vad_threshold")]
    pub vad_threshold: f64,

    #[serde(default = "default_vad_min_speech_ms")]
    pub vad_min_speech_ms: u32,

    #[serde(default = "default_vad_min_silence_ms")]
    pub vad_min_silence_ms: u32,

    /// Decoder threads, 0 lets the recognizer decide.
    #[serde(default)]
    pub threads: u32,
}

fn default_model() -> String {
    "models/ggml-kotoba-whisper-v2.0.bin".to_string()
}

fn default_language() -> String {
    "ja".to_string()
}

fn default_initial_prompt() -> String {
    "こんにちは。本日は日本の映画を視聴しています。".to_string()
}

fn default_beam_size() -> u32 {
    5
}

fn default_vad_threshold() -> f64 {
    0.5
}

fn default_vad_min_speech_ms() -> u32 {
    250
}

fn default_vad_min_silence_ms() -> u32 {
    100
}

impl TranscriptionSettings {
    fn validate(&self) -> ConfigResult<()> {
        if self.beam_size < 1 {
            return Err(ConfigError::invalid(
                "transcription.beam_size",
                "must be at least 1",
            ));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(ConfigError::invalid(
                "transcription.temperature",
                "must be a finite number >= 0",
            ));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::invalid(
                "transcription.model",
                "must name a model file",
            ));
        }
        if self.language.trim().is_empty() {
            return Err(ConfigError::invalid(
                "transcription.language",
                "must not be empty",
            ));
        }
        if !(0.0..=1.0).contains(&self.vad_threshold) {
            return Err(ConfigError::invalid(
                "transcription.vad_threshold",
                "must be between 0 and 1",
            ));
        }
        if self.vad_enabled && self.vad_model.trim().is_empty() {
            return Err(ConfigError::invalid(
                "transcription.vad_model",
                "is required when vad_enabled is true",
            ));
        }
        Ok(())
    }
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            model_float16: String::new(),
            model_int8: String::new(),
            model_float32: String::new(),
            language: default_language(),
            initial_prompt: default_initial_prompt(),
            beam_size: default_beam_size(),
            temperature: 0.0,
            vad_enabled: false,
            vad_model: String::new(),
            vad_threshold: default_vad_threshold(),
            vad_min_speech_ms: default_vad_min_speech_ms(),
            vad_min_silence_ms: default_vad_min_silence_ms(),
            threads: 0,
        }
    }
}

/// Subtitle formatting rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormattingSettings {
    /// Characters per line.
    #[serde(default = "default_max_line_length")]
    pub max_line_length: u32,

    #[serde(default = "default_max_lines")]
    pub max_lines_per_subtitle: u32,

    /// Merge fragmented recognizer output.
    #[serde(default = "default_true")]
    pub merge_enabled: bool,

    /// Largest silence (seconds) bridged by a merge.
    #[serde(default = "default_merge_max_gap")]
    pub merge_max_gap: f64,

    /// Character budget of a merged unit. 0 uses line length x lines.
    #[serde(default)]
    pub merge_char_budget: u32,

    /// Shortest display time in seconds.
    #[serde(default = "default_min_duration")]
    pub min_duration: f64,

    /// Longest span a merge may produce, in seconds.
    #[serde(default = "default_max_duration")]
    pub max_duration: f64,

    /// What to do with text beyond one subtitle's capacity.
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

fn default_max_line_length() -> u32 {
    42
}

fn default_max_lines() -> u32 {
    2
}

fn default_merge_max_gap() -> f64 {
    0.5
}

fn default_min_duration() -> f64 {
    1.0
}

fn default_max_duration() -> f64 {
    7.0
}

impl FormattingSettings {
    fn validate(&self) -> ConfigResult<()> {
        if self.max_line_length == 0 {
            return Err(ConfigError::invalid(
                "formatting.max_line_length",
                "must be greater than 0",
            ));
        }
        if self.max_lines_per_subtitle == 0 {
            return Err(ConfigError::invalid(
                "formatting.max_lines_per_subtitle",
                "must be greater than 0",
            ));
        }
        for (field, value) in [
            ("formatting.merge_max_gap", self.merge_max_gap),
            ("formatting.min_duration", self.min_duration),
            ("formatting.max_duration", self.max_duration),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(field, "must be a finite number >= 0"));
            }
        }
        if self.max_duration > 0.0 && self.max_duration < self.min_duration {
            return Err(ConfigError::invalid(
                "formatting.max_duration",
                "must not be smaller than min_duration",
            ));
        }
        Ok(())
    }
}

impl Default for FormattingSettings {
    fn default() -> Self {
        Self {
            max_line_length: default_max_line_length(),
            max_lines_per_subtitle: default_max_lines(),
            merge_enabled: true,
            merge_max_gap: default_merge_max_gap(),
            merge_char_budget: 0,
            min_duration: default_min_duration(),
            max_duration: default_max_duration(),
            overflow: OverflowPolicy::default(),
        }
    }
}

/// Hardware selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HardwareSettings {
    /// Compute type override; `auto` lets the profiler decide.
    #[serde(default)]
    pub compute_type: ComputeTypePolicy,
}

/// Sections of the config file, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Paths,
    Logging,
    Tools,
    Transcription,
    Formatting,
    Hardware,
}

impl ConfigSection {
    /// All sections in file order.
    pub const ALL: [ConfigSection; 6] = [
        ConfigSection::Paths,
        ConfigSection::Logging,
        ConfigSection::Tools,
        ConfigSection::Transcription,
        ConfigSection::Formatting,
        ConfigSection::Hardware,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Tools => "tools",
            ConfigSection::Transcription => "transcription",
            ConfigSection::Formatting => "formatting",
            ConfigSection::Hardware => "hardware",
        }
    }

    /// Comment written above the section.
    pub fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "Output, working and log directories",
            ConfigSection::Logging => "Logging configuration",
            ConfigSection::Tools => "External tools (looked up on PATH)",
            ConfigSection::Transcription => "Speech recognition parameters",
            ConfigSection::Formatting => "Subtitle formatting rules",
            ConfigSection::Hardware => "Compute device selection (auto, float16, int8, float32)",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_serializes() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        assert!(toml.contains("[formatting]"));
        assert!(toml.contains("[transcription]"));
        assert!(toml.contains("max_line_length"));
    }

    #[test]
    fn default_settings_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn missing_fields_use_defaults() {
        let minimal = "[formatting]\nmax_line_length = 30";
        let parsed: Settings = toml::from_str(minimal).unwrap();
        assert_eq!(parsed.formatting.max_line_length, 30);
        assert_eq!(parsed.formatting.max_lines_per_subtitle, 2);
        assert_eq!(parsed.transcription.beam_size, 5);
        assert_eq!(parsed.hardware.compute_type, ComputeTypePolicy::Auto);
    }

    #[test]
    fn rejects_zero_beam_size() {
        let mut settings = Settings::default();
        settings.transcription.beam_size = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("beam_size"));
    }

    #[test]
    fn rejects_negative_temperature() {
        let mut settings = Settings::default();
        settings.transcription.temperature = -0.1;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_zero_line_length() {
        let mut settings = Settings::default();
        settings.formatting.max_line_length = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn vad_requires_model() {
        let mut settings = Settings::default();
        settings.transcription.vad_enabled = true;
        assert!(settings.validate().is_err());
        settings.transcription.vad_model = "models/ggml-silero-v5.1.2.bin".to_string();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn compute_type_reads_lowercase() {
        let parsed: Settings = toml::from_str("[hardware]\ncompute_type = \"int8\"").unwrap();
        assert_eq!(parsed.hardware.compute_type, ComputeTypePolicy::Int8);
    }
}
