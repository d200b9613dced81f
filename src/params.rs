//! Voice parameter records.
//!
//! A `ParamRecord` is what the registry stores per voice and what generators
//! read on every render. The four keys every voice needs (`generator`, `bpm`,
//! `loop`, `target_volume`) are typed fields; everything else a command or a
//! generator's defaults supply lives in `values`.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// Named parameter values, ordered by name.
pub type ParamMap = BTreeMap<String, ParamValue>;

/// A single parameter value as decoded from a command or a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Parse a command token: `true`/`false`, integer, float, else text.
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        match token {
            "true" | "True" => return ParamValue::Bool(true),
            "false" | "False" => return ParamValue::Bool(false),
            _ => {}
        }

        if let Ok(int) = token.parse::<i64>() {
            ParamValue::Int(int)
        } else if let Ok(float) = token.parse::<f64>() {
            ParamValue::Float(float)
        } else {
            ParamValue::Text(token.to_string())
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            ParamValue::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Text(v) => f.write_str(v),
            ParamValue::List(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// A generator name plus the defaults it declares.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeneratorSpec {
    pub name: String,
    #[serde(default)]
    pub params: ParamMap,
}

impl GeneratorSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: ParamMap::new(),
        }
    }

    pub fn with_params(mut self, params: ParamMap) -> Self {
        self.params = params;
        self
    }
}

/// What the decoder hands the engine: a generator and caller-supplied values.
///
/// `values` may also carry `bpm`, `loop`, `target_volume` and transport keys
/// such as `device`; the engine folds those in when it builds the record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VoiceRequest {
    pub generator: GeneratorSpec,
    pub values: ParamMap,
}

impl VoiceRequest {
    pub fn new(generator: impl Into<String>) -> Self {
        Self {
            generator: GeneratorSpec::new(generator),
            values: ParamMap::new(),
        }
    }

    /// Set a caller value (builder style)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

/// The full parameter record of a registered voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamRecord {
    pub generator: GeneratorSpec,
    pub bpm: f64,
    #[serde(rename = "loop")]
    pub looping: bool,
    /// Volume the supervisor ramps toward (0.0-1.0)
    pub target_volume: f64,
    #[serde(flatten)]
    pub values: ParamMap,
}

impl ParamRecord {
    pub fn new(generator: GeneratorSpec, bpm: f64) -> Self {
        Self {
            generator,
            bpm,
            looping: true,
            target_volume: 1.0,
            values: ParamMap::new(),
        }
    }

    pub fn generator_name(&self) -> &str {
        &self.generator.name
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.get(key).and_then(ParamValue::as_f64).unwrap_or(default)
    }

    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.get(key).and_then(ParamValue::as_i64).unwrap_or(default)
    }

    /// Non-negative integer parameter; negative values read as zero.
    pub fn get_usize(&self, key: &str, default: usize) -> usize {
        self.get(key)
            .and_then(ParamValue::as_i64)
            .map(|v| v.max(0) as usize)
            .unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(ParamValue::as_bool).unwrap_or(default)
    }

    pub fn get_str<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).and_then(ParamValue::as_str).unwrap_or(default)
    }

    /// `(key, value)` pairs in display order: the required keys, then the rest.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries = vec![
            ("generator".to_string(), self.generator.name.clone()),
            ("bpm".to_string(), self.bpm.to_string()),
            ("loop".to_string(), self.looping.to_string()),
            ("target_volume".to_string(), self.target_volume.to_string()),
        ];
        entries.extend(
            self.values
                .iter()
                .map(|(key, value)| (key.clone(), value.to_string())),
        );
        entries
    }
}

impl fmt::Display for ParamRecord {
    /// Compact one-line summary: three-letter keys, e.g. `gen: click bpm: 120`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .entries()
            .into_iter()
            .map(|(key, value)| format!("{}: {}", short_key(&key), value))
            .collect();
        f.write_str(&parts.join(" "))
    }
}

/// First three characters of a parameter name.
pub fn short_key(key: &str) -> &str {
    match key.char_indices().nth(3) {
        Some((end, _)) => &key[..end],
        None => key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_picks_narrowest_type() {
        assert_eq!(ParamValue::parse("true"), ParamValue::Bool(true));
        assert_eq!(ParamValue::parse("12"), ParamValue::Int(12));
        assert_eq!(ParamValue::parse("-3"), ParamValue::Int(-3));
        assert_eq!(ParamValue::parse("0.5"), ParamValue::Float(0.5));
        assert_eq!(ParamValue::parse("khc"), ParamValue::Text("khc".into()));
    }

    #[test]
    fn numeric_accessors_coerce() {
        let mut record = ParamRecord::new(GeneratorSpec::new("click"), 120.0);
        record.values.insert("width".into(), ParamValue::Int(40));
        record.values.insert("freq".into(), ParamValue::Float(220.5));
        record.values.insert("steps".into(), ParamValue::Int(-2));

        assert_eq!(record.get_f64("width", 0.0), 40.0);
        assert_eq!(record.get_i64("freq", 0), 220);
        assert_eq!(record.get_usize("steps", 9), 0);
        assert_eq!(record.get_usize("missing", 9), 9);
        assert_eq!(record.get_str("width", "fallback"), "fallback");
    }

    #[test]
    fn display_uses_short_keys() {
        let mut record = ParamRecord::new(GeneratorSpec::new("pulse"), 90.0);
        record.values.insert("steps".into(), ParamValue::Int(16));

        assert_eq!(
            record.to_string(),
            "gen: pulse bpm: 90 loo: true tar: 1 ste: 16"
        );
    }

    #[test]
    fn record_serializes_loop_key() {
        let record = ParamRecord::new(GeneratorSpec::new("click"), 120.0);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["loop"], serde_json::Value::Bool(true));
        assert_eq!(json["generator"]["name"], "click");
    }

    #[test]
    fn short_key_handles_short_names() {
        assert_eq!(short_key("generator"), "gen");
        assert_eq!(short_key("hz"), "hz");
    }
}
