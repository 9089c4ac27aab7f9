//! `kiln.toml` configuration and process-wide tracing setup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Once;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;

/// File name looked up by [`KilnConfig::discover`].
pub const CONFIG_FILE_NAME: &str = "kiln.toml";

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KilnConfig {
    pub logging: LoggingConfig,
    pub compiler: CompilerOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// A simple level (`info`, `debug`, ...) or an `EnvFilter` directive string.
    pub level: String,
    /// Emit one JSON object per event instead of plain text.
    pub json: bool,
    /// Write events to stderr. When false events are dropped.
    pub stderr: bool,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    pub(crate) fn normalize_level_directives(input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default_level();
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "trace" => "trace".to_owned(),
            "debug" => "debug".to_owned(),
            "info" => "info".to_owned(),
            "warn" | "warning" => "warn".to_owned(),
            "error" => "error".to_owned(),
            // Anything else is an `EnvFilter` directive string.
            _ => trimmed.to_owned(),
        }
    }

    fn config_env_filter(&self) -> tracing_subscriber::EnvFilter {
        let directives = Self::normalize_level_directives(&self.level);
        tracing_subscriber::EnvFilter::try_new(directives).unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::default()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        })
    }

    /// The effective filter: the configured level with `RUST_LOG` merged on top.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        let env_directives = std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        let config_directives = Self::normalize_level_directives(&self.level);

        match env_directives {
            Some(env_directives) => {
                let combined = format!("{config_directives},{env_directives}");
                tracing_subscriber::EnvFilter::try_new(combined)
                    .or_else(|_| tracing_subscriber::EnvFilter::try_new(env_directives))
                    .unwrap_or_else(|_| self.config_env_filter())
            }
            None => self.config_env_filter(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: true,
        }
    }
}

/// Options the compiler driver reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerOptions {
    /// Directories and `.jar` archives holding library classes.
    pub classpath: Vec<PathBuf>,
    pub output_dir: PathBuf,
    /// Inline locals that are initialised with a literal and never written again.
    pub propagate_constants: bool,
    /// Fail a file that only has warnings.
    pub warnings_as_errors: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            classpath: Vec::new(),
            output_dir: PathBuf::from("out"),
            propagate_constants: true,
            warnings_as_errors: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // The default `Display` carries a source snippet; keep the message only.
        ConfigError::Toml(err.message().to_owned())
    }
}

impl KilnConfig {
    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a config file from TOML. Relative class-path entries and the
    /// output directory are resolved against the file's directory.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::load_from_str(&text)?;
        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.compiler.rebase(base);
        }
        tracing::debug!(target: "kiln.config", path = %path.display(), "loaded config");
        Ok(config)
    }

    /// `dir/kiln.toml` when it exists, else the defaults.
    pub fn discover(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let candidate = dir.as_ref().join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::load_from_path(candidate)
        } else {
            Ok(Self::default())
        }
    }
}

impl CompilerOptions {
    fn rebase(&mut self, base: &Path) {
        for entry in &mut self.classpath {
            if entry.is_relative() {
                *entry = base.join(&*entry);
            }
        }
        if self.output_dir.is_relative() {
            self.output_dir = base.join(&self.output_dir);
        }
    }
}

static TRACING_INIT: Once = Once::new();

/// Installs the global `tracing` subscriber.
///
/// Safe to call more than once; only the first call has an effect.
pub fn init_tracing(config: &LoggingConfig) {
    TRACING_INIT.call_once(|| {
        let filter = config.env_filter();
        let layer: Box<dyn Layer<_> + Send + Sync> = match (config.stderr, config.json) {
            (false, _) => tracing_subscriber::layer::Identity::new().boxed(),
            (true, true) => tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .boxed(),
            (true, false) => tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .boxed(),
        };
        let subscriber = tracing_subscriber::registry().with(filter).with(layer);
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            // Someone else (a test harness) installed one first.
            tracing::debug!(target: "kiln.config", "global tracing subscriber already set");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn simple_levels_are_normalized() {
        assert_eq!(LoggingConfig::normalize_level_directives("WARNING"), "warn");
        assert_eq!(LoggingConfig::normalize_level_directives(" Debug "), "debug");
        assert_eq!(LoggingConfig::normalize_level_directives(""), "info");
        assert_eq!(
            LoggingConfig::normalize_level_directives("kiln.driver=trace,info"),
            "kiln.driver=trace,info"
        );
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = KilnConfig::load_from_str("").unwrap();
        assert_eq!(config, KilnConfig::default());
        assert_eq!(config.compiler.output_dir, PathBuf::from("out"));
        assert!(config.compiler.propagate_constants);
        assert!(config.logging.stderr);
    }

    #[test]
    fn sections_override_defaults() {
        let config = KilnConfig::load_from_str(
            r#"
            [logging]
            level = "debug"
            json = true

            [compiler]
            classpath = ["lib/a.jar", "classes"]
            warnings_as_errors = true
            "#,
        )
        .unwrap();
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert!(config.logging.stderr);
        assert_eq!(
            config.compiler.classpath,
            vec![PathBuf::from("lib/a.jar"), PathBuf::from("classes")]
        );
        assert!(config.compiler.warnings_as_errors);
        assert!(config.compiler.propagate_constants);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = KilnConfig::load_from_str("[compiler]\noptimise = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(ref message) if message.contains("optimise")));
    }

    #[test]
    fn init_tracing_is_idempotent() {
        let config = LoggingConfig {
            stderr: false,
            ..LoggingConfig::default()
        };
        init_tracing(&config);
        init_tracing(&config);
    }
}
