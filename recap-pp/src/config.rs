//! Service configuration
//!
//! Loaded from `recap-pp.toml` (resolved via recap_common::config), then
//! overridden by `RECAP_*` environment variables. Every field has a
//! compiled default so the service runs with no file at all.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const MIB: i64 = 1024 * 1024;

/// Top-level service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listen port
    pub port: u16,
    /// SQLite database path; defaults under the platform data dir
    pub database_path: Option<PathBuf>,
    /// Pipeline tunables
    pub pipeline: PipelineConfig,
    /// External provider endpoints
    pub providers: ProviderConfig,
}

/// Pipeline thresholds, timeouts, and intervals
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Hard ceiling the transcription service accepts, in bytes
    pub transcribe_max_bytes: i64,
    /// Above this size the large-file path is preferred, in bytes
    pub large_file_threshold_bytes: i64,
    /// Transcription call timeout, seconds
    pub transcribe_timeout_secs: u64,
    /// Analysis call timeout, seconds
    pub analysis_timeout_secs: u64,
    /// A working recording older than this is considered stuck, minutes
    pub stale_after_minutes: i64,
    /// Jobs sampled per queue statistics refresh
    pub queue_sample_size: i64,
    /// Queue statistics refresh interval, seconds
    pub queue_refresh_secs: u64,
    /// Background recovery sweep interval, seconds
    pub recovery_sweep_secs: u64,
}

/// Endpoints for the opaque transcription/analysis capabilities
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL for the standard transcription endpoint
    pub transcription_url: String,
    /// Base URL for the dedicated large-file transcription backend
    pub transcription_large_url: String,
    /// Base URL for the analysis (summary/coaching) endpoint
    pub analysis_url: String,
    /// Bearer token sent to both providers, if any
    pub api_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 5780,
            database_path: None,
            pipeline: PipelineConfig::default(),
            providers: ProviderConfig::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            transcribe_max_bytes: 25 * MIB,
            large_file_threshold_bytes: 50 * MIB,
            transcribe_timeout_secs: 120,
            analysis_timeout_secs: 45,
            stale_after_minutes: 30,
            queue_sample_size: 200,
            queue_refresh_secs: 15,
            recovery_sweep_secs: 600,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            transcription_url: "http://127.0.0.1:9200".to_string(),
            transcription_large_url: "http://127.0.0.1:9201".to_string(),
            analysis_url: "http://127.0.0.1:9210".to_string(),
            api_key: None,
        }
    }
}

impl AppConfig {
    /// Load configuration: TOML file (if resolvable), then env overrides
    pub fn load(cli_config_path: Option<&str>) -> recap_common::Result<Self> {
        let mut config = match recap_common::config::resolve_config_path(
            cli_config_path,
            "RECAP_PP_CONFIG",
            "recap-pp",
        ) {
            Some(path) => {
                tracing::info!("Loading configuration from {}", path.display());
                recap_common::config::load_config_file(&path)?
            }
            None => AppConfig::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Resolved database path (configured or platform default)
    pub fn database_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(|| {
            recap_common::config::default_data_dir("recap-pp").join("recap.db")
        })
    }

    fn apply_env_overrides(&mut self) {
        if let Some(port) = env_parse::<u16>("RECAP_PP_PORT") {
            self.port = port;
        }
        if let Ok(path) = std::env::var("RECAP_PP_DATABASE") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Ok(url) = std::env::var("RECAP_TRANSCRIPTION_URL") {
            self.providers.transcription_url = url;
        }
        if let Ok(url) = std::env::var("RECAP_TRANSCRIPTION_LARGE_URL") {
            self.providers.transcription_large_url = url;
        }
        if let Ok(url) = std::env::var("RECAP_ANALYSIS_URL") {
            self.providers.analysis_url = url;
        }
        if let Ok(key) = std::env::var("RECAP_PROVIDER_API_KEY") {
            self.providers.api_key = Some(key);
        }
        if let Some(v) = env_parse::<i64>("RECAP_TRANSCRIBE_MAX_BYTES") {
            self.pipeline.transcribe_max_bytes = v;
        }
        if let Some(v) = env_parse::<i64>("RECAP_LARGE_FILE_THRESHOLD_BYTES") {
            self.pipeline.large_file_threshold_bytes = v;
        }
        if let Some(v) = env_parse::<i64>("RECAP_STALE_AFTER_MINUTES") {
            self.pipeline.stale_after_minutes = v;
        }
    }
}

impl PipelineConfig {
    /// Transcription timeout as a Duration
    pub fn transcribe_timeout(&self) -> Duration {
        Duration::from_secs(self.transcribe_timeout_secs)
    }

    /// Analysis timeout as a Duration
    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_secs(self.analysis_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
