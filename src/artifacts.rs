use crate::booster::RegressionBooster;
use crate::encoders::EncoderSet;
use crate::errors::{PredictionError, Result};
use crate::reference::{ReferenceSnapshot, ReferenceStatistics, REFERENCE_SNAPSHOT_VERSION};
use log::info;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

pub const MODEL_FILE: &str = "model.txt";
pub const ENCODERS_FILE: &str = "encoders.json";
pub const REFERENCE_FILE: &str = "reference.bin";

/// The three pre-trained artifacts the engine runs on. Owned here and
/// shared read-only; everything downstream is request-scoped.
#[derive(Debug)]
pub struct Artifacts {
    pub booster: RegressionBooster,
    pub encoders: EncoderSet,
    pub reference: ReferenceStatistics,
}

impl Artifacts {
    pub fn from_parts(
        booster: RegressionBooster,
        encoders: EncoderSet,
        reference: ReferenceStatistics,
    ) -> Result<Self> {
        encoders.check_shapes()?;
        Ok(Self {
            booster,
            encoders,
            reference,
        })
    }

    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let model_path = dir.join(MODEL_FILE);
        let model_text = read_artifact(&model_path)?;
        let booster = RegressionBooster::from_model_text(&model_text)
            .map_err(|err| corrupt(&model_path, err.to_string()))?;

        let encoders_path = dir.join(ENCODERS_FILE);
        let encoders_json = read_artifact(&encoders_path)?;
        let encoders: EncoderSet = serde_json::from_str(&encoders_json)
            .map_err(|err| corrupt(&encoders_path, err.to_string()))?;
        encoders
            .check_shapes()
            .map_err(|err| corrupt(&encoders_path, err.to_string()))?;

        let reference_path = dir.join(REFERENCE_FILE);
        if !reference_path.exists() {
            return Err(PredictionError::ArtifactMissing {
                path: reference_path,
            });
        }
        let file = File::open(&reference_path)
            .map_err(|err| corrupt(&reference_path, err.to_string()))?;
        let snapshot: ReferenceSnapshot = bincode::deserialize_from(BufReader::new(file))
            .map_err(|err| corrupt(&reference_path, err.to_string()))?;
        if snapshot.version != REFERENCE_SNAPSHOT_VERSION {
            return Err(corrupt(
                &reference_path,
                format!(
                    "reference snapshot version mismatch (found {}, expected {})",
                    snapshot.version, REFERENCE_SNAPSHOT_VERSION
                ),
            ));
        }

        info!(
            "Loaded artifacts from {}: {} feature(s), {} product(s), {} location(s), {} composite key(s)",
            dir.display(),
            booster.num_features(),
            encoders.known_products().map(|p| p.len()).unwrap_or(0),
            encoders.known_locations().map(|l| l.len()).unwrap_or(0),
            snapshot.stats.composites.len()
        );

        Artifacts::from_parts(booster, encoders, snapshot.stats)
    }

    /// Trained schema: ordered column names every feature vector follows.
    pub fn schema(&self) -> &[String] {
        self.booster.feature_names()
    }
}

fn read_artifact(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(PredictionError::ArtifactMissing {
            path: path.to_path_buf(),
        });
    }
    std::fs::read_to_string(path).map_err(|err| corrupt(path, err.to_string()))
}

fn corrupt(path: &Path, reason: String) -> PredictionError {
    PredictionError::ArtifactCorrupt {
        path: path.to_path_buf(),
        reason,
    }
}

// Process-wide artifact cache: written once under the mutex, read-only
// afterwards. Reload is an explicit external action, never a TTL.
static ARTIFACT_STORE: OnceLock<Mutex<Option<Arc<Artifacts>>>> = OnceLock::new();

fn store_slot() -> &'static Mutex<Option<Arc<Artifacts>>> {
    ARTIFACT_STORE.get_or_init(|| Mutex::new(None))
}

/// Loads and caches the artifacts if they are not already loaded. The
/// mutex guards the first load so concurrent hosts cannot load twice.
pub fn init(dir: &Path) -> Result<Arc<Artifacts>> {
    let mut slot = store_slot().lock().expect("artifact store lock poisoned");
    if let Some(existing) = slot.as_ref() {
        return Ok(existing.clone());
    }
    let loaded = Arc::new(Artifacts::load_from_dir(dir)?);
    *slot = Some(loaded.clone());
    Ok(loaded)
}

pub fn is_loaded() -> bool {
    store_slot()
        .lock()
        .map(|slot| slot.is_some())
        .unwrap_or(false)
}

/// Drops the cached artifacts and re-reads them from disk.
pub fn reload(dir: &Path) -> Result<Arc<Artifacts>> {
    let loaded = Arc::new(Artifacts::load_from_dir(dir)?);
    let mut slot = store_slot().lock().expect("artifact store lock poisoned");
    *slot = Some(loaded.clone());
    Ok(loaded)
}

/// Installs pre-built artifacts directly, bypassing disk. Used by
/// embedders and tests.
pub fn install(artifacts: Artifacts) -> Arc<Artifacts> {
    let shared = Arc::new(artifacts);
    let mut slot = store_slot().lock().expect("artifact store lock poisoned");
    *slot = Some(shared.clone());
    shared
}

pub fn get() -> Result<Arc<Artifacts>> {
    store_slot()
        .lock()
        .ok()
        .and_then(|slot| slot.clone())
        .ok_or(PredictionError::ArtifactsNotLoaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceSnapshot;
    use std::io::Write;

    const MODEL_TEXT: &str = "\
objective=regression
max_feature_idx=1
feature_names=Unit_Price Month

Tree=0
num_leaves=2
split_feature=0
threshold=50.0
left_child=-1
right_child=-2
leaf_value=1.0 2.0
shrinkage=1
";

    fn write_valid_artifacts(dir: &Path) {
        std::fs::write(dir.join(MODEL_FILE), MODEL_TEXT).unwrap();
        let encoders = EncoderSet::new(vec!["1".to_string()], vec!["North".to_string()]);
        std::fs::write(
            dir.join(ENCODERS_FILE),
            serde_json::to_string(&encoders).unwrap(),
        )
        .unwrap();
        let snapshot = ReferenceSnapshot::current(ReferenceStatistics::default());
        let mut file = File::create(dir.join(REFERENCE_FILE)).unwrap();
        file.write_all(&bincode::serialize(&snapshot).unwrap())
            .unwrap();
    }

    #[test]
    fn load_from_dir_reads_all_three_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        write_valid_artifacts(dir.path());
        let artifacts = Artifacts::load_from_dir(dir.path()).unwrap();
        assert_eq!(artifacts.schema(), &["Unit_Price", "Month"]);
    }

    #[test]
    fn missing_model_is_artifact_missing() {
        let dir = tempfile::tempdir().unwrap();
        match Artifacts::load_from_dir(dir.path()) {
            Err(PredictionError::ArtifactMissing { path }) => {
                assert!(path.ends_with(MODEL_FILE));
            }
            other => panic!("expected ArtifactMissing, got {other:?}"),
        }
    }

    #[test]
    fn garbage_model_is_artifact_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        write_valid_artifacts(dir.path());
        std::fs::write(dir.path().join(MODEL_FILE), "not a model").unwrap();
        assert!(matches!(
            Artifacts::load_from_dir(dir.path()),
            Err(PredictionError::ArtifactCorrupt { .. })
        ));
    }

    // Single test for the whole cache lifecycle: the store is process-wide,
    // so splitting these steps across tests would make them order-dependent.
    #[test]
    fn cache_lifecycle_initializes_reloads_and_installs() {
        assert!(!is_loaded());
        assert!(matches!(get(), Err(PredictionError::ArtifactsNotLoaded)));

        let dir = tempfile::tempdir().unwrap();
        write_valid_artifacts(dir.path());

        let first = init(dir.path()).unwrap();
        assert!(is_loaded());
        let cached = init(dir.path()).unwrap();
        assert!(Arc::ptr_eq(&first, &cached));
        assert!(Arc::ptr_eq(&first, &get().unwrap()));

        let reloaded = reload(dir.path()).unwrap();
        assert!(!Arc::ptr_eq(&first, &reloaded));
        assert!(Arc::ptr_eq(&reloaded, &get().unwrap()));

        let booster = RegressionBooster::from_model_text(MODEL_TEXT).unwrap();
        let encoders = EncoderSet::new(vec!["1".to_string()], vec!["North".to_string()]);
        let built = Artifacts::from_parts(booster, encoders, ReferenceStatistics::default()).unwrap();
        let installed = install(built);
        assert!(Arc::ptr_eq(&installed, &get().unwrap()));
        assert!(!Arc::ptr_eq(&reloaded, &installed));
    }

    #[test]
    fn version_mismatch_is_artifact_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        write_valid_artifacts(dir.path());
        let snapshot = ReferenceSnapshot {
            version: REFERENCE_SNAPSHOT_VERSION + 1,
            stats: ReferenceStatistics::default(),
        };
        std::fs::write(
            dir.path().join(REFERENCE_FILE),
            bincode::serialize(&snapshot).unwrap(),
        )
        .unwrap();
        assert!(matches!(
            Artifacts::load_from_dir(dir.path()),
            Err(PredictionError::ArtifactCorrupt { .. })
        ));
    }
}
