//! Configuration management for jsub.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Validation on load with automatic defaults
//!
//! # Example
//!
//! ```no_run
//! use jsub_core::config::ConfigManager;
//!
//! let mut config = ConfigManager::new(".config/jsub.toml");
//! config.load_or_create().unwrap();
//!
//! println!("Beam size: {}", config.settings().transcription.beam_size);
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    ConfigSection, FormattingSettings, HardwareSettings, LoggingSettings, PathSettings, Settings,
    ToolSettings, TranscriptionSettings,
};
