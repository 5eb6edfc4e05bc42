//! Conversation retention tooling: layered settings plus the command bodies
//! behind the `omni-retention` CLI.
//!
//! - **prune**: rewrite a conversation payload to the last N rounds.
//! - **simulate**: run the live view engine over a document fixture.
//! - **settings**: show the resolved policy and engine timing.

mod commands;
mod config;

pub use commands::{
    PruneReport, ResolvedSettings, SIMULATION_DRAIN_MS, SimulationReport, policy_with_overrides, prune_json, simulate,
};
pub use config::{
    ENV_KEEP_ROUNDS, ENV_TRIM_MODE, EngineSettings, RetentionSettings, RuntimeSettings, apply_env_overrides,
    load_runtime_settings, load_runtime_settings_from_paths, runtime_settings_paths, set_config_home_override,
};
