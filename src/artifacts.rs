//! Circuit artifact loading
//!
//! The prover needs two files: a JSON circuit description listing the
//! circuits and their public-input counts, and the raw proving key. Both are
//! read once and then shared read-only between concurrent proving calls.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::CircuitId;
use crate::error::CircuitLoadError;

/// Filesystem locations of the proving artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub circuit_path: PathBuf,
    pub proving_key_path: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            circuit_path: PathBuf::from("./circuits/legacy_circuits.json"),
            proving_key_path: PathBuf::from("./keys/proving_key.bin"),
        }
    }
}

impl ArtifactPaths {
    pub fn new(circuit_path: impl Into<PathBuf>, proving_key_path: impl Into<PathBuf>) -> Self {
        Self {
            circuit_path: circuit_path.into(),
            proving_key_path: proving_key_path.into(),
        }
    }

    /// Override defaults from `LEGACY_ZK_CIRCUIT_PATH` / `LEGACY_ZK_PROVING_KEY_PATH`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            circuit_path: std::env::var("LEGACY_ZK_CIRCUIT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.circuit_path),
            proving_key_path: std::env::var("LEGACY_ZK_PROVING_KEY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.proving_key_path),
        }
    }
}

/// One entry of the circuit description file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitEntry {
    pub id: String,
    pub public_inputs: usize,
}

/// Parsed circuit description file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitDescription {
    pub version: u32,
    pub circuits: Vec<CircuitEntry>,
    /// Hex BLAKE3 digest of the proving key, checked on load when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proving_key_blake3: Option<String>,
}

impl CircuitDescription {
    /// Description covering the three protocol circuits.
    pub fn standard() -> Self {
        Self {
            version: 1,
            circuits: CircuitId::ALL
                .iter()
                .map(|id| CircuitEntry {
                    id: id.as_str().to_string(),
                    public_inputs: id.public_input_count(),
                })
                .collect(),
            proving_key_blake3: None,
        }
    }

    pub fn circuit(&self, id: CircuitId) -> Option<&CircuitEntry> {
        self.circuits.iter().find(|entry| entry.id == id.as_str())
    }

    fn validate(&self) -> Result<(), CircuitLoadError> {
        for id in CircuitId::ALL {
            let entry = self
                .circuit(id)
                .ok_or_else(|| CircuitLoadError::UnknownCircuit(id.as_str().to_string()))?;
            if entry.public_inputs != id.public_input_count() {
                return Err(CircuitLoadError::PublicInputMismatch {
                    circuit: entry.id.clone(),
                    expected: id.public_input_count(),
                    found: entry.public_inputs,
                });
            }
        }
        Ok(())
    }
}

/// Loaded, validated artifacts. Immutable once constructed.
#[derive(Debug)]
pub struct CircuitArtifacts {
    description: CircuitDescription,
    proving_key: Vec<u8>,
    key_digest: [u8; 32],
}

impl CircuitArtifacts {
    /// Read and validate both artifacts.
    pub fn load(paths: &ArtifactPaths) -> Result<Self, CircuitLoadError> {
        let raw_description = read_artifact(&paths.circuit_path)?;
        let description: CircuitDescription = serde_json::from_slice(&raw_description)
            .map_err(|e| CircuitLoadError::MalformedDescription(e.to_string()))?;
        let proving_key = read_artifact(&paths.proving_key_path)?;

        let artifacts = Self::from_parts(description, proving_key)?;
        info!(
            "Circuit artifacts loaded: {} circuits, proving key {} bytes",
            artifacts.description.circuits.len(),
            artifacts.proving_key.len()
        );
        Ok(artifacts)
    }

    /// Validate artifacts already in memory.
    pub fn from_parts(
        description: CircuitDescription,
        proving_key: Vec<u8>,
    ) -> Result<Self, CircuitLoadError> {
        description.validate()?;

        if proving_key.is_empty() {
            return Err(CircuitLoadError::EmptyProvingKey);
        }

        let key_digest = *blake3::hash(&proving_key).as_bytes();
        if let Some(expected) = &description.proving_key_blake3 {
            let found = hex::encode(key_digest);
            if !expected.trim_start_matches("0x").eq_ignore_ascii_case(&found) {
                return Err(CircuitLoadError::DigestMismatch {
                    expected: expected.clone(),
                    found,
                });
            }
        }

        Ok(Self {
            description,
            proving_key,
            key_digest,
        })
    }

    pub fn description(&self) -> &CircuitDescription {
        &self.description
    }

    pub fn proving_key(&self) -> &[u8] {
        &self.proving_key
    }

    /// BLAKE3 digest of the proving key.
    pub fn key_digest(&self) -> &[u8; 32] {
        &self.key_digest
    }
}

fn read_artifact(path: &Path) -> Result<Vec<u8>, CircuitLoadError> {
    debug!("Reading artifact {}", path.display());
    fs::read(path).map_err(|e| CircuitLoadError::Missing {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Lazily populated, process-lifetime artifact cache.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    paths: ArtifactPaths,
    loaded: Arc<RwLock<Option<Arc<CircuitArtifacts>>>>,
}

impl ArtifactCache {
    pub fn new(paths: ArtifactPaths) -> Self {
        Self {
            paths,
            loaded: Arc::new(RwLock::new(None)),
        }
    }

    /// Cache pre-populated with artifacts that are already in memory.
    pub fn with_artifacts(artifacts: CircuitArtifacts) -> Self {
        Self {
            paths: ArtifactPaths::default(),
            loaded: Arc::new(RwLock::new(Some(Arc::new(artifacts)))),
        }
    }

    /// Return the cached artifacts, loading them on first use.
    pub fn get(&self) -> Result<Arc<CircuitArtifacts>, CircuitLoadError> {
        if let Some(artifacts) = self.loaded.read().as_ref() {
            return Ok(Arc::clone(artifacts));
        }

        let mut guard = self.loaded.write();
        // Another caller may have loaded while we waited for the write lock.
        if let Some(artifacts) = guard.as_ref() {
            return Ok(Arc::clone(artifacts));
        }
        let artifacts = Arc::new(CircuitArtifacts::load(&self.paths)?);
        *guard = Some(Arc::clone(&artifacts));
        Ok(artifacts)
    }

    /// Check if artifacts are loaded
    pub fn is_loaded(&self) -> bool {
        self.loaded.read().is_some()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    pub(crate) fn write_artifacts(dir: &TempDir, description: &CircuitDescription, key: &[u8]) -> ArtifactPaths {
        let circuit_path = dir.path().join("circuits.json");
        let key_path = dir.path().join("proving_key.bin");
        fs::write(&circuit_path, serde_json::to_vec(description).unwrap()).unwrap();
        let mut file = fs::File::create(&key_path).unwrap();
        file.write_all(key).unwrap();
        ArtifactPaths::new(circuit_path, key_path)
    }

    #[test]
    fn test_load_standard_artifacts() {
        let dir = TempDir::new().unwrap();
        let paths = write_artifacts(&dir, &CircuitDescription::standard(), &[5u8; 64]);

        let artifacts = CircuitArtifacts::load(&paths).expect("Failed to load artifacts");
        assert_eq!(artifacts.proving_key().len(), 64);
        assert_eq!(artifacts.key_digest(), blake3::hash(&[5u8; 64]).as_bytes());
        assert!(artifacts.description().circuit(CircuitId::ViewingKey).is_some());
    }

    #[test]
    fn test_missing_file() {
        let paths = ArtifactPaths::new("/nonexistent/circuits.json", "/nonexistent/key.bin");
        assert!(matches!(
            CircuitArtifacts::load(&paths),
            Err(CircuitLoadError::Missing { .. })
        ));
    }

    #[test]
    fn test_malformed_description() {
        let dir = TempDir::new().unwrap();
        let circuit_path = dir.path().join("circuits.json");
        fs::write(&circuit_path, b"{not json").unwrap();
        let key_path = dir.path().join("key.bin");
        fs::write(&key_path, [1u8; 8]).unwrap();

        let result = CircuitArtifacts::load(&ArtifactPaths::new(circuit_path, key_path));
        assert!(matches!(result, Err(CircuitLoadError::MalformedDescription(_))));
    }

    #[test]
    fn test_empty_key_rejected() {
        let result = CircuitArtifacts::from_parts(CircuitDescription::standard(), Vec::new());
        assert!(matches!(result, Err(CircuitLoadError::EmptyProvingKey)));
    }

    #[test]
    fn test_missing_circuit_rejected() {
        let mut description = CircuitDescription::standard();
        description.circuits.retain(|c| c.id != "emergency_access");
        let result = CircuitArtifacts::from_parts(description, vec![1u8; 8]);
        assert!(matches!(result, Err(CircuitLoadError::UnknownCircuit(id)) if id == "emergency_access"));
    }

    #[test]
    fn test_public_input_count_checked() {
        let mut description = CircuitDescription::standard();
        description.circuits[0].public_inputs = 7;
        let result = CircuitArtifacts::from_parts(description, vec![1u8; 8]);
        assert!(matches!(result, Err(CircuitLoadError::PublicInputMismatch { found: 7, .. })));
    }

    #[test]
    fn test_digest_mismatch() {
        let key = vec![3u8; 16];
        let mut description = CircuitDescription::standard();
        description.proving_key_blake3 = Some(hex::encode(blake3::hash(&key).as_bytes()));
        assert!(CircuitArtifacts::from_parts(description.clone(), key).is_ok());

        let result = CircuitArtifacts::from_parts(description, vec![4u8; 16]);
        assert!(matches!(result, Err(CircuitLoadError::DigestMismatch { .. })));
    }

    #[test]
    fn test_cache_loads_once() {
        let dir = TempDir::new().unwrap();
        let paths = write_artifacts(&dir, &CircuitDescription::standard(), &[9u8; 32]);
        let cache = ArtifactCache::new(paths.clone());
        assert!(!cache.is_loaded());

        let first = cache.get().unwrap();
        assert!(cache.is_loaded());

        // Removing the files must not matter once cached
        fs::remove_file(&paths.proving_key_path).unwrap();
        let second = cache.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
