//! Classifier artifacts and the loaded classifier store
//!
//! Every category is persisted as its own JSON artifact named
//! `<category>_model.json`, so categories can be retrained and redeployed
//! independently. At startup [`ClassifierStore::load_all`] reads every artifact
//! in the models directory; a single unreadable or mismatched artifact aborts
//! the load so that a service never starts with a category silently missing.

use crate::classifier::FitClassifier;
use crate::forest::RandomForest;
use crate::schema::{FeatureSchema, SchemaRegistry};
use chrono::{DateTime, Utc};
use fitcheck_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Current artifact layout version
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// File name suffix shared by all artifacts
pub const ARTIFACT_SUFFIX: &str = "_model.json";

/// Serialized, self-describing classifier for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    pub format_version: u32,
    pub category: String,
    pub features: Vec<String>,
    pub classes: Vec<String>,
    pub trained_at: DateTime<Utc>,
    pub n_samples: usize,
    pub model: RandomForest,
}

impl ClassifierArtifact {
    /// Wrap a freshly trained forest
    pub fn new(schema: &FeatureSchema, model: RandomForest, n_samples: usize) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            category: schema.category().to_string(),
            features: schema.features().to_vec(),
            classes: model.classes().to_vec(),
            trained_at: Utc::now(),
            n_samples,
            model,
        }
    }

    /// Check the artifact against the registry it is about to serve under
    fn validate(&self, path: &Path, expected_category: &str, registry: &SchemaRegistry) -> Result<()> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(Error::corrupt_artifact(
                path,
                format!("unsupported format version {}", self.format_version),
            ));
        }
        if self.category != expected_category {
            return Err(Error::corrupt_artifact(
                path,
                format!("artifact is for category '{}'", self.category),
            ));
        }

        let schema = registry.schema(&self.category)?;
        if self.features != schema.features() {
            return Err(Error::corrupt_artifact(
                path,
                format!(
                    "trained on {:?} but schema is {:?}",
                    self.features,
                    schema.features()
                ),
            ));
        }
        if self.model.n_features() != schema.len() {
            return Err(Error::corrupt_artifact(
                path,
                format!(
                    "model expects {} features, schema has {}",
                    self.model.n_features(),
                    schema.len()
                ),
            ));
        }
        if self.model.classes().is_empty() || self.classes != self.model.classes() {
            return Err(Error::corrupt_artifact(path, "class list does not match model"));
        }
        Ok(())
    }
}

/// Directory holding one artifact per category
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    root: PathBuf,
}

impl ArtifactDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic artifact path for a category
    pub fn path_for(&self, category: &str) -> PathBuf {
        self.root.join(format!("{}{}", category, ARTIFACT_SUFFIX))
    }

    /// Persist an artifact, replacing any previous one for the same category.
    ///
    /// The file is written next to its destination and renamed into place so a
    /// concurrent reader never sees a partial artifact.
    pub fn save(&self, artifact: &ClassifierArtifact) -> Result<PathBuf> {
        let category = artifact.category.as_str();
        if category.is_empty()
            || !category
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::config(format!(
                "category '{}' cannot be used as an artifact name",
                category
            )));
        }

        std::fs::create_dir_all(&self.root)?;
        let path = self.path_for(category);
        let tmp = self.root.join(format!(".{}{}.tmp", category, ARTIFACT_SUFFIX));

        let bytes = serde_json::to_vec(artifact)?;
        if let Err(e) = std::fs::write(&tmp, bytes).and_then(|()| std::fs::rename(&tmp, &path)) {
            if let Err(cleanup) = std::fs::remove_file(&tmp) {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!("Could not remove {}: {}", tmp.display(), cleanup);
                }
            }
            return Err(e.into());
        }

        Ok(path)
    }

    /// Read one artifact file
    pub fn load(&self, path: &Path) -> Result<ClassifierArtifact> {
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| Error::corrupt_artifact(path, e.to_string()))
    }

    /// Artifacts present in the directory as `(category, path)`, sorted by category
    pub fn list(&self) -> Result<Vec<(String, PathBuf)>> {
        let mut found = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            if let Some(category) = name.strip_suffix(ARTIFACT_SUFFIX) {
                found.push((category.to_string(), path.clone()));
            }
        }
        found.sort();
        Ok(found)
    }
}

/// Immutable set of classifiers, one per loaded category
#[derive(Clone)]
pub struct ClassifierStore {
    classifiers: HashMap<String, Arc<dyn FitClassifier>>,
    order: Vec<String>,
}

impl ClassifierStore {
    /// Load every artifact in `dir`, aborting on the first bad one
    pub fn load_all(registry: &SchemaRegistry, dir: impl AsRef<Path>) -> Result<Self> {
        let artifacts = ArtifactDir::new(dir.as_ref());
        info!("Loading classifiers from {}", artifacts.root().display());

        let mut entries: Vec<(String, Arc<dyn FitClassifier>)> = Vec::new();
        for (category, path) in artifacts.list()? {
            let artifact = artifacts.load(&path)?;
            artifact.validate(&path, &category, registry)?;

            info!(
                "  - Loaded model for category '{}' ({} trees, {} samples)",
                category,
                artifact.model.n_trees(),
                artifact.n_samples
            );
            let classifier: Arc<dyn FitClassifier> = Arc::new(artifact.model);
            entries.push((category, classifier));
        }

        let store = Self::from_classifiers(registry, entries)?;
        if store.is_empty() {
            warn!("No classifier artifacts found in {}", artifacts.root().display());
        }
        Ok(store)
    }

    /// Assemble a store from in-memory classifiers
    pub fn from_classifiers<I>(registry: &SchemaRegistry, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Arc<dyn FitClassifier>)>,
    {
        let mut classifiers: HashMap<String, Arc<dyn FitClassifier>> = HashMap::new();
        for (category, classifier) in entries {
            let schema = registry.schema(&category)?;
            if classifier.n_features() != schema.len() {
                return Err(Error::config(format!(
                    "classifier for '{}' expects {} features, schema has {}",
                    category,
                    classifier.n_features(),
                    schema.len()
                )));
            }
            if classifiers.insert(category.clone(), classifier).is_some() {
                return Err(Error::config(format!(
                    "classifier for '{}' supplied twice",
                    category
                )));
            }
        }

        let order = registry
            .categories()
            .filter(|c| classifiers.contains_key(*c))
            .map(String::from)
            .collect();

        Ok(Self { classifiers, order })
    }

    /// Classifier for a category
    pub fn get(&self, category: &str) -> Result<Arc<dyn FitClassifier>> {
        self.classifiers
            .get(category)
            .cloned()
            .ok_or_else(|| Error::UnknownCategory(category.to_string()))
    }

    /// Loaded categories in registry order
    pub fn categories(&self) -> &[String] {
        &self.order
    }

    pub fn contains(&self, category: &str) -> bool {
        self.classifiers.contains_key(category)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl fmt::Debug for ClassifierStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierStore")
            .field("categories", &self.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::ForestParams;

    fn trained_artifact(category: &str) -> ClassifierArtifact {
        let registry = SchemaRegistry::standard();
        let schema = registry.schema(category).unwrap();
        let width = schema.len();

        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..30 {
            let base = 80.0 + i as f64;
            x.push(vec![base; width]);
            y.push(if i % 2 == 0 { "Perfect Fit" } else { "Very Tight" }.to_string());
        }
        let params = ForestParams::default().with_n_estimators(5);
        let model = RandomForest::fit(&params, &x, &y).unwrap();
        ClassifierArtifact::new(schema, model, x.len())
    }

    #[test]
    fn test_save_uses_deterministic_name() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactDir::new(dir.path());

        let path = artifacts.save(&trained_artifact("upper_loose")).unwrap();
        assert_eq!(path, dir.path().join("upper_loose_model.json"));
        assert_eq!(
            artifacts.list().unwrap(),
            vec![("upper_loose".to_string(), path)]
        );
    }

    #[test]
    fn test_save_load_roundtrip_predicts_identically() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactDir::new(dir.path());
        let artifact = trained_artifact("upper_fitted");
        artifacts.save(&artifact).unwrap();

        let registry = SchemaRegistry::standard();
        let store = ClassifierStore::load_all(&registry, dir.path()).unwrap();
        let loaded = store.get("upper_fitted").unwrap();

        let probe = [90.0, 70.0, 92.0, 71.0];
        assert_eq!(loaded.classes(), artifact.model.classes());
        assert_eq!(
            loaded.predict_proba(&probe).unwrap(),
            artifact.model.predict_proba(&probe).unwrap()
        );
        assert_eq!(
            loaded.predict(&probe).unwrap(),
            artifact.model.predict(&probe).unwrap()
        );
    }

    #[test]
    fn test_load_all_orders_by_registry() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactDir::new(dir.path());
        for category in ["dresses", "upper_loose", "lower_fitted"] {
            artifacts.save(&trained_artifact(category)).unwrap();
        }

        let store = ClassifierStore::load_all(&SchemaRegistry::standard(), dir.path()).unwrap();
        assert_eq!(store.categories(), &["upper_loose", "lower_fitted", "dresses"]);
        assert!(matches!(store.get("lower_loose"), Err(Error::UnknownCategory(_))));
    }

    #[test]
    fn test_corrupt_artifact_aborts_load() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactDir::new(dir.path());
        artifacts.save(&trained_artifact("dresses")).unwrap();
        std::fs::write(dir.path().join("upper_loose_model.json"), b"{not json").unwrap();

        let err = ClassifierStore::load_all(&SchemaRegistry::standard(), dir.path()).unwrap_err();
        assert!(matches!(err, Error::CorruptArtifact { ref path, .. } if path.ends_with("upper_loose_model.json")));
    }

    #[test]
    fn test_renamed_artifact_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactDir::new(dir.path());
        let saved = artifacts.save(&trained_artifact("lower_fitted")).unwrap();
        std::fs::rename(&saved, dir.path().join("lower_loose_model.json")).unwrap();

        let err = ClassifierStore::load_all(&SchemaRegistry::standard(), dir.path()).unwrap_err();
        assert!(matches!(err, Error::CorruptArtifact { .. }));
    }

    #[test]
    fn test_schema_drift_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactDir::new(dir.path());
        let mut artifact = trained_artifact("lower_loose");
        artifact.features.reverse();
        artifacts.save(&artifact).unwrap();

        let err = ClassifierStore::load_all(&SchemaRegistry::standard(), dir.path()).unwrap_err();
        assert!(matches!(err, Error::CorruptArtifact { ref detail, .. } if detail.contains("schema")));
    }

    #[test]
    fn test_unregistered_artifact_aborts_load() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactDir::new(dir.path());
        let mut artifact = trained_artifact("upper_loose");
        artifact.category = "capes".to_string();
        artifacts.save(&artifact).unwrap();

        let err = ClassifierStore::load_all(&SchemaRegistry::standard(), dir.path()).unwrap_err();
        assert!(matches!(err, Error::UnknownCategory(ref c) if c == "capes"));
    }

    #[test]
    fn test_empty_directory_gives_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClassifierStore::load_all(&SchemaRegistry::standard(), dir.path()).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            ClassifierStore::load_all(&SchemaRegistry::standard(), &missing),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_failed_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the artifact should go makes the rename fail.
        std::fs::create_dir(dir.path().join("dresses_model.json")).unwrap();

        let artifacts = ArtifactDir::new(dir.path());
        assert!(matches!(
            artifacts.save(&trained_artifact("dresses")),
            Err(Error::Io(_))
        ));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("dresses_model.json")]);
    }

    #[test]
    fn test_save_rejects_path_like_category() {
        let dir = tempfile::tempdir().unwrap();
        let mut artifact = trained_artifact("dresses");
        artifact.category = "../dresses".to_string();
        assert!(matches!(
            ArtifactDir::new(dir.path()).save(&artifact),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_from_classifiers_rejects_width_mismatch() {
        let registry = SchemaRegistry::standard();
        let artifact = trained_artifact("dresses");
        let entries: Vec<(String, Arc<dyn FitClassifier>)> =
            vec![("upper_loose".to_string(), Arc::new(artifact.model) as Arc<dyn FitClassifier>)];
        assert!(matches!(
            ClassifierStore::from_classifiers(&registry, entries),
            Err(Error::Config(_))
        ));
    }
}
