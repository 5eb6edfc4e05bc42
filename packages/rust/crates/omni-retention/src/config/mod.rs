//! Config namespace: layered retention settings.

mod settings;

pub use settings::{
    ENV_KEEP_ROUNDS, ENV_TRIM_MODE, EngineSettings, RetentionSettings, RuntimeSettings, apply_env_overrides,
    load_runtime_settings, load_runtime_settings_from_paths, runtime_settings_paths, set_config_home_override,
};
