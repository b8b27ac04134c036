use std::env;
use std::path::PathBuf;

pub const ARTIFACT_DIR_ENV: &str = "REVENUE_ENGINE_ARTIFACTS";
pub const DEFAULT_ARTIFACT_DIR: &str = "artifacts";

/// Sweep and forecast defaults shared by the CLI commands.
#[derive(Debug, Clone)]
pub struct EngineDefaults {
    pub confidence_level: f64,
    pub scenario_min_factor: f64,
    pub scenario_max_factor: f64,
    pub scenario_steps: usize,
}

impl Default for EngineDefaults {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
            scenario_min_factor: 0.5,
            scenario_max_factor: 2.0,
            scenario_steps: 20,
        }
    }
}

/// Resolves the artifact directory: explicit flag wins, then the
/// environment variable, then the default relative path.
pub fn resolve_artifact_dir(flag: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = flag {
        return dir;
    }
    match env::var(ARTIFACT_DIR_ENV) {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value.trim()),
        _ => PathBuf::from(DEFAULT_ARTIFACT_DIR),
    }
}
