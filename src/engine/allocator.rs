use std::sync::atomic::{AtomicU64, Ordering};

use super::VoiceId;
use crate::params::{ParamMap, ParamRecord, VoiceRequest};

/// Slowest tempo a voice may run at. Lower `bpm` values fall back to the
/// engine tempo.
pub const MIN_BPM: f64 = 1.0;

/// Keys that only matter to the command transport and are never stored.
pub const TRANSPORT_KEYS: &[&str] = &["device"];

/// Session-wide voice id counter. Ids start at 1 and are never reused.
#[derive(Debug, Default)]
pub struct VoiceIds {
    last: AtomicU64,
}

impl VoiceIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next id
    pub fn next(&self) -> VoiceId {
        VoiceId(self.last.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Highest id issued so far (0 before the first allocation)
    pub fn highest(&self) -> u64 {
        self.last.load(Ordering::Acquire)
    }

    /// Every id issued so far, ascending
    pub fn issued(&self) -> impl Iterator<Item = VoiceId> {
        (1..=self.highest()).map(VoiceId)
    }
}

/// Build the stored record for a new voice.
///
/// Layering, lowest precedence first: the generator's built-in defaults, the
/// defaults declared alongside the generator name, then the caller's values.
/// `bpm` falls back to the engine tempo, `loop` to true and `target_volume` to
/// full. Transport keys are dropped.
pub fn finalize(request: VoiceRequest, builtin: &ParamMap, bpm: f64) -> ParamRecord {
    let VoiceRequest { generator, values } = request;

    let mut merged = builtin.clone();
    merged.extend(
        generator
            .params
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );
    merged.extend(values);

    for key in TRANSPORT_KEYS {
        merged.remove(*key);
    }

    let bpm = merged
        .remove("bpm")
        .and_then(|v| v.as_f64())
        .filter(|v| v.is_finite() && *v >= MIN_BPM)
        .unwrap_or(bpm);
    let looping = merged
        .remove("loop")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    let target_volume = merged
        .remove("target_volume")
        .and_then(|v| v.as_f64())
        .map(|v| v.clamp(0.0, 1.0))
        .unwrap_or(1.0);

    ParamRecord {
        generator,
        bpm,
        looping,
        target_volume,
        values: merged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{GeneratorSpec, ParamValue};
    use std::{collections::HashSet, sync::Arc, thread};

    #[test]
    fn ids_start_at_one_and_increase() {
        let ids = VoiceIds::new();
        assert_eq!(ids.highest(), 0);
        assert_eq!(ids.next(), VoiceId(1));
        assert_eq!(ids.next(), VoiceId(2));
        assert_eq!(ids.highest(), 2);
        assert_eq!(ids.issued().collect::<Vec<_>>(), vec![VoiceId(1), VoiceId(2)]);
    }

    #[test]
    fn concurrent_ids_are_unique() {
        let ids = Arc::new(VoiceIds::new());
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                thread::spawn(move || (0..250).map(|_| ids.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for worker in workers {
            for id in worker.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 2000);
        assert_eq!(ids.highest(), 2000);
    }

    #[test]
    fn caller_values_win_over_defaults() {
        let mut builtin = ParamMap::new();
        builtin.insert("width".into(), ParamValue::Int(50));
        builtin.insert("drum".into(), "khc".into());

        let mut declared = ParamMap::new();
        declared.insert("width".into(), ParamValue::Int(30));

        let request = VoiceRequest {
            generator: GeneratorSpec::new("click").with_params(declared),
            values: ParamMap::new(),
        }
        .with("drum", "k")
        .with("device", "default");

        let record = finalize(request, &builtin, 96.0);

        assert_eq!(record.get_usize("width", 0), 30);
        assert_eq!(record.get_str("drum", ""), "k");
        assert!(record.get("device").is_none());
        assert_eq!(record.bpm, 96.0);
        assert!(record.looping);
        assert_eq!(record.target_volume, 1.0);
    }

    #[test]
    fn required_keys_are_lifted_out_of_values() {
        let request = VoiceRequest::new("pulse")
            .with("bpm", 140i64)
            .with("loop", false)
            .with("target_volume", 3.0);

        let record = finalize(request, &ParamMap::new(), 120.0);

        assert_eq!(record.bpm, 140.0);
        assert!(!record.looping);
        assert_eq!(record.target_volume, 1.0);
        assert!(record.values.is_empty());
    }

    #[test]
    fn nonsense_tempo_falls_back_to_engine_tempo() {
        let request = VoiceRequest::new("pulse").with("bpm", -4i64);
        assert_eq!(finalize(request, &ParamMap::new(), 120.0).bpm, 120.0);

        let request = VoiceRequest::new("pulse").with("bpm", 0.001);
        assert_eq!(finalize(request, &ParamMap::new(), 120.0).bpm, 120.0);

        let request = VoiceRequest::new("pulse").with("bpm", MIN_BPM);
        assert_eq!(finalize(request, &ParamMap::new(), 120.0).bpm, MIN_BPM);
    }
}
