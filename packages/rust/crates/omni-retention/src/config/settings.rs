//! Runtime settings loader for omni-retention.
//!
//! Loads and merges:
//! - System defaults: `<PRJ_ROOT>/packages/conf/settings.yaml`
//! - User overrides:  `<PRJ_CONFIG_HOME>/omni-retention/settings.yaml`
//!
//! Merge precedence is env over user over system.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use omni_types::{RetentionError, RetentionPolicy, RetentionResult, TrimMode};
use omni_window::EngineConfig;
use serde::Deserialize;

const DEFAULT_SYSTEM_SETTINGS_RELATIVE_PATH: &str = "packages/conf/settings.yaml";
const DEFAULT_USER_SETTINGS_RELATIVE_PATH: &str = "omni-retention/settings.yaml";
const DEFAULT_CONFIG_HOME_RELATIVE_PATH: &str = ".config";
static CONFIG_HOME_OVERRIDE: OnceLock<PathBuf> = OnceLock::new();

/// Overrides `retention.keep_rounds`.
pub const ENV_KEEP_ROUNDS: &str = "OMNI_RETENTION_KEEP_ROUNDS";
/// Overrides `retention.trim_mode` (`hide` or `placeholder`).
pub const ENV_TRIM_MODE: &str = "OMNI_RETENTION_TRIM_MODE";

/// One settings file, or the merge of several. Unset fields fall back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeSettings {
    /// `retention:` section, the policy.
    #[serde(default)]
    pub retention: RetentionSettings,
    /// `engine:` section, the view engine timing.
    #[serde(default)]
    pub engine: EngineSettings,
}

/// Policy fields as written in YAML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetentionSettings {
    /// Master switch.
    pub enabled: Option<bool>,
    /// Most-recent rounds to keep; clamped into `1..=100`.
    pub keep_rounds: Option<usize>,
    /// Keep tool/system/thinking turns inside the kept region.
    pub preserve_auxiliary: Option<bool>,
    /// Defer non-forced trims while the reader is scrolled up.
    pub pause_when_scrolled_up: Option<bool>,
    /// `hide` or `placeholder`.
    pub trim_mode: Option<String>,
}

/// Engine timing fields as written in YAML. See [`EngineConfig`] for meaning.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineSettings {
    /// Boot mode length after binding.
    pub boot_window_ms: Option<u64>,
    /// Steady-mode trailing debounce.
    pub debounce_ms: Option<u64>,
    /// Cap on how long a debounce may keep extending.
    pub debounce_max_wait_ms: Option<u64>,
    /// Frame length for the per-frame evaluation cap.
    pub frame_interval_ms: Option<u64>,
    /// Period of the latched-run flush.
    pub flush_interval_ms: Option<u64>,
    /// Hold after the last composer input.
    pub typing_grace_ms: Option<u64>,
    /// Suppression window around batches.
    pub suppression_window_ms: Option<u64>,
    /// Host time one batch slice may use.
    pub slice_budget_ms: Option<u64>,
    /// Gap between batch slices.
    pub slice_gap_ms: Option<u64>,
    /// Locator cache lifetime.
    pub locator_cache_ttl_ms: Option<u64>,
    /// Distance from the bottom that still counts as pinned.
    pub scroll_pin_threshold_px: Option<f64>,
    /// Structural tier: minimum text length of a turn.
    pub structural_min_text_len: Option<usize>,
    /// Structural tier: largest share of the page one turn may cover.
    pub structural_max_height_fraction: Option<f64>,
    /// Fewer located turns than this defers the evaluation.
    pub min_turns: Option<usize>,
    /// Timer rounds per `advance` before deferring the rest.
    pub max_timer_iterations: Option<usize>,
}

impl RuntimeSettings {
    /// Parse one settings document.
    ///
    /// # Errors
    ///
    /// Returns [`RetentionError::Config`] when the YAML does not match the settings shape.
    pub fn from_yaml_str(raw: &str) -> RetentionResult<Self> {
        serde_yaml::from_str(raw).map_err(|error| RetentionError::Config(error.to_string()))
    }

    fn merge(self, overlay: Self) -> Self {
        Self {
            retention: self.retention.merge(overlay.retention),
            engine: self.engine.merge(overlay.engine),
        }
    }

    /// Policy with defaults for unset fields. `keep_rounds` is clamped into range.
    #[must_use]
    pub fn policy(&self) -> RetentionPolicy {
        let defaults = RetentionPolicy::default();
        let retention = &self.retention;
        let trim_mode = retention
            .trim_mode
            .as_deref()
            .and_then(|raw| {
                let parsed = TrimMode::parse(raw);
                if parsed.is_none() {
                    tracing::warn!(
                        event = "retention.settings.invalid_trim_mode",
                        value = raw,
                        "unknown trim_mode; using default"
                    );
                }
                parsed
            })
            .unwrap_or(defaults.trim_mode);
        let policy = RetentionPolicy {
            keep_rounds: retention.keep_rounds.unwrap_or(defaults.keep_rounds),
            preserve_auxiliary: retention
                .preserve_auxiliary
                .unwrap_or(defaults.preserve_auxiliary),
            pause_when_scrolled_up: retention
                .pause_when_scrolled_up
                .unwrap_or(defaults.pause_when_scrolled_up),
            enabled: retention.enabled.unwrap_or(defaults.enabled),
            trim_mode,
        };
        if let Err(error) = policy.validate() {
            tracing::warn!(
                event = "retention.settings.keep_rounds_clamped",
                error = %error,
                "keep_rounds out of range; clamping"
            );
        }
        policy.normalized()
    }

    /// Engine configuration with defaults for unset fields.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        let d = EngineConfig::default();
        let e = &self.engine;
        EngineConfig {
            boot_window_ms: e.boot_window_ms.unwrap_or(d.boot_window_ms),
            debounce_ms: e.debounce_ms.unwrap_or(d.debounce_ms),
            debounce_max_wait_ms: e.debounce_max_wait_ms.unwrap_or(d.debounce_max_wait_ms),
            frame_interval_ms: e.frame_interval_ms.unwrap_or(d.frame_interval_ms),
            flush_interval_ms: e.flush_interval_ms.unwrap_or(d.flush_interval_ms),
            typing_grace_ms: e.typing_grace_ms.unwrap_or(d.typing_grace_ms),
            suppression_window_ms: e.suppression_window_ms.unwrap_or(d.suppression_window_ms),
            slice_budget_ms: e.slice_budget_ms.unwrap_or(d.slice_budget_ms),
            slice_gap_ms: e.slice_gap_ms.unwrap_or(d.slice_gap_ms),
            locator_cache_ttl_ms: e.locator_cache_ttl_ms.unwrap_or(d.locator_cache_ttl_ms),
            scroll_pin_threshold_px: e.scroll_pin_threshold_px.unwrap_or(d.scroll_pin_threshold_px),
            structural_min_text_len: e.structural_min_text_len.unwrap_or(d.structural_min_text_len),
            structural_max_height_fraction: e
                .structural_max_height_fraction
                .unwrap_or(d.structural_max_height_fraction),
            min_turns: e.min_turns.unwrap_or(d.min_turns),
            max_timer_iterations: e.max_timer_iterations.unwrap_or(d.max_timer_iterations),
        }
    }
}

impl RetentionSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            enabled: overlay.enabled.or(self.enabled),
            keep_rounds: overlay.keep_rounds.or(self.keep_rounds),
            preserve_auxiliary: overlay.preserve_auxiliary.or(self.preserve_auxiliary),
            pause_when_scrolled_up: overlay
                .pause_when_scrolled_up
                .or(self.pause_when_scrolled_up),
            trim_mode: overlay.trim_mode.or(self.trim_mode),
        }
    }
}

impl EngineSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            boot_window_ms: overlay.boot_window_ms.or(self.boot_window_ms),
            debounce_ms: overlay.debounce_ms.or(self.debounce_ms),
            debounce_max_wait_ms: overlay.debounce_max_wait_ms.or(self.debounce_max_wait_ms),
            frame_interval_ms: overlay.frame_interval_ms.or(self.frame_interval_ms),
            flush_interval_ms: overlay.flush_interval_ms.or(self.flush_interval_ms),
            typing_grace_ms: overlay.typing_grace_ms.or(self.typing_grace_ms),
            suppression_window_ms: overlay
                .suppression_window_ms
                .or(self.suppression_window_ms),
            slice_budget_ms: overlay.slice_budget_ms.or(self.slice_budget_ms),
            slice_gap_ms: overlay.slice_gap_ms.or(self.slice_gap_ms),
            locator_cache_ttl_ms: overlay.locator_cache_ttl_ms.or(self.locator_cache_ttl_ms),
            scroll_pin_threshold_px: overlay
                .scroll_pin_threshold_px
                .or(self.scroll_pin_threshold_px),
            structural_min_text_len: overlay
                .structural_min_text_len
                .or(self.structural_min_text_len),
            structural_max_height_fraction: overlay
                .structural_max_height_fraction
                .or(self.structural_max_height_fraction),
            min_turns: overlay.min_turns.or(self.min_turns),
            max_timer_iterations: overlay.max_timer_iterations.or(self.max_timer_iterations),
        }
    }
}

/// Load merged runtime settings (env over user over system).
pub fn load_runtime_settings() -> RuntimeSettings {
    let (system_path, user_path) = runtime_settings_paths();
    let settings = load_runtime_settings_from_paths(&system_path, &user_path);
    apply_env_overrides(settings, |key| std::env::var(key).ok())
}

#[doc(hidden)]
pub fn runtime_settings_paths() -> (PathBuf, PathBuf) {
    let root = project_root();
    let system_path = root.join(DEFAULT_SYSTEM_SETTINGS_RELATIVE_PATH);
    let user_path = resolve_config_home(&root).join(DEFAULT_USER_SETTINGS_RELATIVE_PATH);
    (system_path, user_path)
}

#[doc(hidden)]
pub fn load_runtime_settings_from_paths(system: &Path, user: &Path) -> RuntimeSettings {
    load_one(system).merge(load_one(user))
}

/// Apply `OMNI_RETENTION_*` overrides read through `lookup`.
///
/// Unparseable values are logged and ignored.
pub fn apply_env_overrides<F>(mut settings: RuntimeSettings, lookup: F) -> RuntimeSettings
where
    F: Fn(&str) -> Option<String>,
{
    let read = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    if let Some(raw) = read(ENV_KEEP_ROUNDS) {
        match raw.parse::<usize>() {
            Ok(keep_rounds) => settings.retention.keep_rounds = Some(keep_rounds),
            Err(error) => tracing::warn!(
                event = "retention.settings.invalid_env",
                key = ENV_KEEP_ROUNDS,
                value = %raw,
                error = %error,
                "ignoring unparseable environment override"
            ),
        }
    }
    if let Some(raw) = read(ENV_TRIM_MODE) {
        if TrimMode::parse(&raw).is_some() {
            settings.retention.trim_mode = Some(raw);
        } else {
            tracing::warn!(
                event = "retention.settings.invalid_env",
                key = ENV_TRIM_MODE,
                value = %raw,
                "ignoring unknown trim mode override"
            );
        }
    }
    settings
}

fn load_one(path: &Path) -> RuntimeSettings {
    if !path.exists() {
        return RuntimeSettings::default();
    }
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "failed to read settings file; ignoring"
            );
            return RuntimeSettings::default();
        }
    };
    match RuntimeSettings::from_yaml_str(&raw) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "failed to parse settings yaml; ignoring file"
            );
            RuntimeSettings::default()
        }
    }
}

fn project_root() -> PathBuf {
    std::env::var("PRJ_ROOT")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map_or_else(
            || std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            PathBuf::from,
        )
}

/// Set config-home override (used by CLI `--conf`).
///
/// The path can be absolute, or relative to `PRJ_ROOT`/cwd.
pub fn set_config_home_override(path: impl Into<PathBuf>) {
    let path = path.into();
    if path.as_os_str().is_empty() {
        return;
    }
    if CONFIG_HOME_OVERRIDE.set(path.clone()).is_err()
        && let Some(current) = CONFIG_HOME_OVERRIDE.get()
        && current != &path
    {
        tracing::warn!(
            current = %current.display(),
            ignored = %path.display(),
            "config home override already set; ignoring subsequent value"
        );
    }
}

fn resolve_config_home(project_root: &Path) -> PathBuf {
    if let Some(path) = CONFIG_HOME_OVERRIDE.get() {
        return absolutize(project_root, path.clone());
    }

    let configured = std::env::var("PRJ_CONFIG_HOME")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_HOME_RELATIVE_PATH.to_string());
    absolutize(project_root, PathBuf::from(configured))
}

fn absolutize(project_root: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        project_root.join(path)
    }
}
