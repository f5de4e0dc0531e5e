use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::semantic::{
    DEFAULT_NLI_MODEL_ID, DEFAULT_SIMILARITY_MODEL_ID, NLI_BACKEND, SIMILARITY_BACKEND,
    TOKENIZER_BACKEND,
};
use crate::util::{file_stem_string, list_files_with_extension, read_json};

pub const CONFIG_PATH_ENV: &str = "TIMELINE_EVAL_CONFIG";
pub const DEFAULT_CONFIG_FILENAME: &str = "eval_config.json";

pub const DEV_ANNOTATED_FILENAME: &str = "dev.json";
pub const TEST_ANNOTATED_FILENAME: &str = "test.json";
pub const TIMELINE_POST_MAPPING_FILENAME: &str = "timeline_id_to_post_id.json";
pub const RESULTS_DB_FILENAME: &str = "results.sqlite";

const DEFAULT_DEV_TIMELINE_IDS: &[&str] = &[
    "83997cd4e7",
    "46f4bb3ada",
    "0cac13e357",
    "5da839acb5",
    "6c9677b482",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    pub train_dir: PathBuf,
    pub test_dir: PathBuf,
    pub dev_timeline_ids: Vec<String>,
    pub models: ModelSettings,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            train_dir: PathBuf::from("annotations/train"),
            test_dir: PathBuf::from("annotations/test"),
            dev_timeline_ids: DEFAULT_DEV_TIMELINE_IDS
                .iter()
                .map(|id| id.to_string())
                .collect(),
            models: ModelSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub similarity_model_id: String,
    pub similarity_backend: String,
    /// Empty means "use the similarity model's tokenizer".
    pub tokenizer_id: String,
    pub tokenizer_backend: String,
    pub nli_model_id: String,
    pub nli_backend: String,
    pub bertscore_baseline: Option<f64>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            similarity_model_id: DEFAULT_SIMILARITY_MODEL_ID.to_string(),
            similarity_backend: SIMILARITY_BACKEND.to_string(),
            tokenizer_id: String::new(),
            tokenizer_backend: TOKENIZER_BACKEND.to_string(),
            nli_model_id: DEFAULT_NLI_MODEL_ID.to_string(),
            nli_backend: NLI_BACKEND.to_string(),
            bertscore_baseline: None,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Split {
    Dev,
    Test,
}

impl Split {
    pub fn from_test_flag(test: bool) -> Self {
        if test { Self::Test } else { Self::Dev }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Test => "test",
        }
    }
}

/// Configuration plus every path derived from the evaluation root.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    /// Config file that was read; `None` when running on defaults.
    pub config_path: Option<PathBuf>,
    pub config: EvalConfig,
}

impl Workspace {
    pub fn load(root: &Path, config_path: Option<&Path>) -> Result<Self> {
        let explicit = config_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let config_path = match explicit {
            Some(path) => {
                if !path.exists() {
                    bail!("config file not found: {}", path.display());
                }
                Some(path)
            }
            None => Some(root.join(DEFAULT_CONFIG_FILENAME)).filter(|path| path.exists()),
        };

        let config = match &config_path {
            Some(path) => {
                info!(path = %path.display(), "loading evaluation config");
                read_json::<EvalConfig>(path)?
            }
            None => {
                debug!(root = %root.display(), "no config file; using defaults");
                EvalConfig::default()
            }
        };

        Ok(Self {
            root: root.to_path_buf(),
            config_path,
            config,
        })
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join("results")
    }

    pub fn submissions_dir(&self, split: Split) -> PathBuf {
        match split {
            Split::Dev => self.root.join("submissions_dev"),
            Split::Test => self.root.join("submissions"),
        }
    }

    pub fn mapping_path(&self) -> PathBuf {
        self.data_dir().join(TIMELINE_POST_MAPPING_FILENAME)
    }

    pub fn gold_path(&self, split: Split) -> PathBuf {
        match split {
            Split::Dev => self.data_dir().join(DEV_ANNOTATED_FILENAME),
            Split::Test => self.data_dir().join(TEST_ANNOTATED_FILENAME),
        }
    }

    pub fn results_db_path(&self) -> PathBuf {
        self.results_dir().join(RESULTS_DB_FILENAME)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn train_dir(&self) -> PathBuf {
        self.resolve(&self.config.train_dir)
    }

    pub fn test_dir(&self) -> PathBuf {
        self.resolve(&self.config.test_dir)
    }

    /// Raw exports of the dev timelines, held out of the training directory.
    pub fn dev_paths(&self) -> Vec<PathBuf> {
        let train_dir = self.train_dir();
        self.config
            .dev_timeline_ids
            .iter()
            .map(|id| train_dir.join(format!("{id}.json")))
            .collect()
    }

    pub fn train_paths(&self) -> Result<Vec<PathBuf>> {
        let paths = list_files_with_extension(&self.train_dir(), "json")?;
        Ok(paths
            .into_iter()
            .filter(|path| {
                file_stem_string(path)
                    .map(|stem| !self.config.dev_timeline_ids.contains(&stem))
                    .unwrap_or(true)
            })
            .collect())
    }

    pub fn test_paths(&self) -> Result<Vec<PathBuf>> {
        list_files_with_extension(&self.test_dir(), "json")
    }

    pub fn split_paths(&self, split: Split) -> Result<Vec<PathBuf>> {
        match split {
            Split::Dev => Ok(self.dev_paths()),
            Split::Test => self.test_paths(),
        }
    }

    pub fn split_timeline_ids(&self, split: Split) -> Result<Vec<String>> {
        match split {
            Split::Dev => Ok(self.config.dev_timeline_ids.clone()),
            Split::Test => Ok(self
                .test_paths()?
                .iter()
                .filter_map(|path| file_stem_string(path))
                .collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn partial_config_keeps_defaults_for_missing_fields() {
        let config: EvalConfig = serde_json::from_value(serde_json::json!({
            "train_dir": "/data/train",
            "models": {"bertscore_baseline": 0.83}
        }))
        .expect("partial config should deserialize");

        assert_eq!(config.train_dir, PathBuf::from("/data/train"));
        assert_eq!(config.dev_timeline_ids.len(), 5);
        assert_eq!(config.models.bertscore_baseline, Some(0.83));
        assert_eq!(config.models.nli_backend, NLI_BACKEND);
    }

    #[test]
    fn split_paths_hold_dev_ids_out_of_train() {
        let root = tempfile::tempdir().expect("tempdir");
        let train = root.path().join("annotations/train");
        let test = root.path().join("annotations/test");
        fs::create_dir_all(&train).expect("train dir");
        fs::create_dir_all(&test).expect("test dir");
        for id in ["aaa", "bbb", "ccc"] {
            fs::write(train.join(format!("{id}.json")), "{}").expect("write train");
        }
        fs::write(test.join("ttt.json"), "{}").expect("write test");

        let workspace = Workspace {
            root: root.path().to_path_buf(),
            config_path: None,
            config: EvalConfig {
                dev_timeline_ids: vec!["bbb".to_string()],
                ..EvalConfig::default()
            },
        };

        let train_stems = workspace
            .train_paths()
            .expect("train paths")
            .iter()
            .filter_map(|path| file_stem_string(path))
            .collect::<Vec<String>>();
        assert_eq!(train_stems, vec!["aaa", "ccc"]);
        assert_eq!(workspace.dev_paths(), vec![train.join("bbb.json")]);
        assert_eq!(
            workspace.split_timeline_ids(Split::Test).expect("test ids"),
            vec!["ttt"]
        );
        assert_eq!(
            workspace.gold_path(Split::Test),
            root.path().join("data").join("test.json")
        );
    }

    #[test]
    fn load_without_config_file_uses_defaults() {
        let root = tempfile::tempdir().expect("tempdir");
        let workspace = Workspace::load(root.path(), None).expect("load");
        assert_eq!(workspace.config.dev_timeline_ids[0], "83997cd4e7");
    }

    #[test]
    fn load_records_which_config_file_was_read() {
        let root = tempfile::tempdir().expect("tempdir");
        let defaults = Workspace::load(root.path(), None).expect("load defaults");
        assert_eq!(defaults.config_path, None);

        let custom = root.path().join("elsewhere.json");
        fs::write(&custom, r#"{"dev_timeline_ids": ["abc"]}"#).expect("write config");
        let explicit = Workspace::load(root.path(), Some(&custom)).expect("load explicit");
        assert_eq!(explicit.config_path, Some(custom));
        assert_eq!(explicit.config.dev_timeline_ids, vec!["abc"]);

        let default_path = root.path().join(DEFAULT_CONFIG_FILENAME);
        fs::write(&default_path, "{}").expect("write default config");
        let found = Workspace::load(root.path(), None).expect("load default file");
        assert_eq!(found.config_path, Some(default_path));
    }

    #[test]
    fn load_rejects_missing_explicit_config() {
        let root = tempfile::tempdir().expect("tempdir");
        let error = Workspace::load(root.path(), Some(&root.path().join("nope.json")))
            .expect_err("missing explicit config should fail");
        assert!(error.to_string().contains("config file not found"));
    }
}
