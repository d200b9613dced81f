//! JSON configuration.
//!
//! Several files can be layered. Each must hold a JSON object; top-level keys
//! from later files replace the same keys from earlier ones wholesale (a
//! `generators` table in a later file replaces the whole earlier table, it is
//! not merged entry by entry). Keys nobody sets keep their defaults.
//!
//! ```json
//! {
//!     "bpm": 96,
//!     "generators": { "click": { "drum": "kh" }, "pulse": {} },
//!     "presets": { "intro": ["click width:30", "pulse beats:3"] }
//! }
//! ```

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{engine::EngineConfig, error::ConfigError, params::ParamMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bpm: f64,
    /// Clock pulses per beat
    pub division: u32,
    /// Largest target volume change a voice applies per cycle
    pub volume_step: f64,
    /// Delay between the commands of a preset
    pub preset_pacing_ms: u64,
    /// Named command lists
    pub presets: BTreeMap<String, Vec<String>>,
    /// Generators commands may name, with the defaults they declare
    pub generators: BTreeMap<String, ParamMap>,
}

impl Default for Config {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            bpm: engine.bpm,
            division: engine.division,
            volume_step: engine.volume_step,
            preset_pacing_ms: 100,
            presets: BTreeMap::new(),
            generators: ["click", "pulse", "bounce"]
                .into_iter()
                .map(|name| (name.to_string(), ParamMap::new()))
                .collect(),
        }
    }
}

impl Config {
    /// Read and merge `paths` in order; every file must exist.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self, ConfigError> {
        let mut merged = Map::new();
        for path in paths {
            merged.extend(read_object(path.as_ref())?);
        }
        Self::from_value(Value::Object(merged))
    }

    /// Like `load`, but files that do not exist are skipped with a warning.
    pub fn load_present<P: AsRef<Path>>(paths: &[P]) -> Result<Self, ConfigError> {
        let present: Vec<&Path> = paths
            .iter()
            .map(AsRef::as_ref)
            .filter(|path| {
                let exists = path.exists();
                if !exists {
                    log::warn!("config file {} not found, skipping", path.display());
                }
                exists
            })
            .collect();
        Self::load(&present)
    }

    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        serde_json::from_value(value).map_err(ConfigError::Schema)
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            bpm: self.bpm,
            division: self.division,
            volume_step: self.volume_step,
        }
    }

    pub fn preset(&self, name: &str) -> Option<&[String]> {
        self.presets.get(name).map(Vec::as_slice)
    }

    /// Declared defaults of a configured generator, `None` if not configured
    pub fn generator(&self, name: &str) -> Option<&ParamMap> {
        self.generators.get(name)
    }
}

fn read_object(path: &Path) -> Result<Map<String, Value>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let value: Value = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    match value {
        Value::Object(map) => {
            log::debug!("loaded config {}", path.display());
            Ok(map)
        }
        _ => Err(ConfigError::NotAnObject(PathBuf::from(path))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamValue;
    use serde_json::json;
    use std::{env, process};

    /// Scratch directory unique to one test
    fn scratch(test: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("voicegrid-{}-{test}", process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn defaults_cover_builtin_generators() {
        let config = Config::default();
        assert_eq!(config.bpm, 120.0);
        assert_eq!(config.preset_pacing_ms, 100);
        assert!(config.generator("click").is_some());
        assert!(config.generator("pulse").is_some());
        assert!(config.generator("bounce").is_some());
        assert!(config.generator("nope").is_none());
    }

    #[test]
    fn later_files_win_key_for_key() {
        let dir = scratch("merge");
        let global = write(
            &dir,
            "global.json",
            r#"{"bpm": 90, "volume_step": 0.2, "generators": {"click": {"width": 20}}}"#,
        );
        let suite = write(&dir, "suite.json", r#"{"bpm": 140, "generators": {"pulse": {}}}"#);

        let config = Config::load(&[global, suite]).unwrap();

        assert_eq!(config.bpm, 140.0);
        assert_eq!(config.volume_step, 0.2);
        // Shallow: the second `generators` table replaced the first
        assert!(config.generator("click").is_none());
        assert!(config.generator("pulse").unwrap().is_empty());
        assert_eq!(config.division, 1);
    }

    #[test]
    fn missing_optional_files_are_skipped() {
        let dir = scratch("present");
        let global = write(&dir, "global.json", r#"{"division": 4}"#);
        let missing = dir.join("suite.json");

        let config = Config::load_present(&[global, missing.clone()]).unwrap();
        assert_eq!(config.division, 4);

        assert!(matches!(
            Config::load(&[missing]),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn rejects_non_objects_and_bad_json() {
        let dir = scratch("reject");
        let list = write(&dir, "list.json", "[1, 2]");
        let broken = write(&dir, "broken.json", "{bpm: ");

        assert!(matches!(
            Config::load(&[list]),
            Err(ConfigError::NotAnObject(_))
        ));
        assert!(matches!(
            Config::load(&[broken]),
            Err(ConfigError::Json { .. })
        ));
    }

    #[test]
    fn generator_defaults_and_presets_deserialize() {
        let config = Config::from_value(json!({
            "generators": {"click": {"drum": "k", "width": 30, "bend": false}},
            "presets": {"intro": ["click", "s 1"]}
        }))
        .unwrap();

        let click = config.generator("click").unwrap();
        assert_eq!(click["drum"], ParamValue::Text("k".into()));
        assert_eq!(click["width"], ParamValue::Int(30));
        assert_eq!(click["bend"], ParamValue::Bool(false));
        assert_eq!(config.preset("intro").unwrap(), ["click", "s 1"]);
        assert!(config.preset("outro").is_none());
    }

    #[test]
    fn schema_errors_are_reported() {
        let result = Config::from_value(json!({"bpm": "fast"}));
        assert!(matches!(result, Err(ConfigError::Schema(_))));
    }

    #[test]
    fn engine_settings_come_from_config() {
        let config = Config::from_value(json!({"bpm": 100, "division": 2})).unwrap();
        let engine = config.engine();
        assert_eq!(engine.bpm, 100.0);
        assert_eq!(engine.division, 2);
        assert_eq!(engine.volume_step, 0.1);
    }
}
