//! Persistent application configuration model and defaults.

use std::path::PathBuf;

use crate::song::Locale;

/// Root configuration persisted to `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Embedded playback behavior.
    pub playback: PlaybackConfig,
    #[serde(default)]
    /// Drag gesture activation thresholds.
    pub drag: DragConfig,
    #[serde(default)]
    /// Display preferences.
    pub display: DisplayConfig,
    #[serde(default)]
    /// Reference title lookup service.
    pub lookup: LookupConfig,
    #[serde(default)]
    /// Setlist storage location.
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Whether playback must start muted before attempting an unmute.
#[derive(Debug, Clone, Copy, serde::Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MutedAutoplayPolicy {
    /// Detect from the configured user agent.
    #[default]
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PlaybackConfig {
    /// Window in which repeated play/pause requests collapse into one.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default)]
    pub requires_muted_autoplay: MutedAutoplayPolicy,
    /// Player error codes reported to the user as restricted/unavailable.
    #[serde(default = "default_restricted_error_codes")]
    pub restricted_error_codes: Vec<i32>,
    /// User agent consulted when `requires_muted_autoplay` is `auto`.
    #[serde(default)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct DragConfig {
    /// Press-and-hold time before a touch becomes a drag.
    #[serde(default = "default_touch_activation_delay_ms")]
    pub touch_activation_delay_ms: u64,
    /// Movement allowed during the touch hold before the gesture is treated as a scroll.
    #[serde(default = "default_touch_tolerance_px")]
    pub touch_tolerance_px: f32,
    /// Distance a mouse must travel before a drag starts. Zero starts immediately.
    #[serde(default)]
    pub pointer_activation_distance_px: f32,
}

#[derive(Debug, Clone, PartialEq, Default, serde::Deserialize, serde::Serialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub locale: Locale,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LookupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// oEmbed endpoint queried with `?url=<link>&format=json`.
    #[serde(default = "default_lookup_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_lookup_timeout_secs")]
    pub timeout_secs: u64,
    /// Minimum spacing between outgoing lookup requests.
    #[serde(default = "default_lookup_min_interval_ms")]
    pub min_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Default, serde::Deserialize, serde::Serialize)]
pub struct StorageConfig {
    /// Overrides the default `<data_dir>/setlist-sync/setlists.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LoggingConfig {
    /// One of `error`, `warn`, `info`, `debug`, `trace`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            requires_muted_autoplay: MutedAutoplayPolicy::Auto,
            restricted_error_codes: default_restricted_error_codes(),
            user_agent: None,
        }
    }
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            touch_activation_delay_ms: default_touch_activation_delay_ms(),
            touch_tolerance_px: default_touch_tolerance_px(),
            pointer_activation_distance_px: 0.0,
        }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_lookup_endpoint(),
            timeout_secs: default_lookup_timeout_secs(),
            min_interval_ms: default_lookup_min_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> log::LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "off" => log::LevelFilter::Off,
            "error" => log::LevelFilter::Error,
            "warn" => log::LevelFilter::Warn,
            "info" => log::LevelFilter::Info,
            "trace" => log::LevelFilter::Trace,
            _ => log::LevelFilter::Debug,
        }
    }
}

/// Clamps out-of-range values loaded from disk.
pub fn sanitize_config(config: Config) -> Config {
    Config {
        playback: PlaybackConfig {
            debounce_ms: config.playback.debounce_ms.clamp(50, 2_000),
            ..config.playback
        },
        drag: DragConfig {
            touch_activation_delay_ms: config.drag.touch_activation_delay_ms.min(2_000),
            touch_tolerance_px: config.drag.touch_tolerance_px.max(0.0),
            pointer_activation_distance_px: config.drag.pointer_activation_distance_px.max(0.0),
        },
        lookup: LookupConfig {
            timeout_secs: config.lookup.timeout_secs.clamp(1, 60),
            min_interval_ms: config.lookup.min_interval_ms.max(1),
            ..config.lookup
        },
        ..config
    }
}

fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_restricted_error_codes() -> Vec<i32> {
    vec![100, 101, 150]
}

fn default_touch_activation_delay_ms() -> u64 {
    250
}

fn default_touch_tolerance_px() -> f32 {
    5.0
}

fn default_lookup_endpoint() -> String {
    "https://www.youtube.com/oembed".to_string()
}

fn default_lookup_timeout_secs() -> u64 {
    7
}

fn default_lookup_min_interval_ms() -> u64 {
    250
}

fn default_log_level() -> String {
    "debug".to_string()
}
