//! Buffer-level helpers: summing, gain, overlaying, padding and resampling.

/*
Buffer Operations
=================

Generators build a whole buffer per render, so most work here is on complete
sample vectors rather than fixed-size blocks.

Vocabulary
----------

  overlay     Add a sound into a longer buffer starting at a frame offset.
              The destination grows if the sound runs past its end.

  pad         Surround a sound with silence: `before` zeros, the sound,
              `after` zeros.

  cut         A window of `len` frames starting at `start`, zero-filled when
              it runs past the source.

  resample    Play a sound faster or slower by reading it at a fractional
              rate (linear interpolation). speed 2.0 halves the length and
              raises pitch an octave.

Summing does not limit. Several layers at full scale will exceed ±1.0, so the
caller scales before or after.
*/

/// Add `b` into `a` sample by sample over their common length.
#[inline]
pub fn sum_in_place(a: &mut [f32], b: &[f32]) {
    for (sa, &sb) in a.iter_mut().zip(b.iter()) {
        *sa += sb;
    }
}

#[inline]
pub fn apply_gain(signal: &mut [f32], gain: f32) {
    for sample in signal.iter_mut() {
        *sample *= gain;
    }
}

/// Add `sound` into `dest` starting at `offset`, growing `dest` as needed.
pub fn overlay(dest: &mut Vec<f32>, sound: &[f32], offset: usize) {
    let end = offset + sound.len();
    if dest.len() < end {
        dest.resize(end, 0.0);
    }
    sum_in_place(&mut dest[offset..end], sound);
}

/// Sum layers of possibly different lengths into one buffer.
pub fn mix_layers(layers: &[Vec<f32>]) -> Vec<f32> {
    let mut out = Vec::new();
    for layer in layers {
        overlay(&mut out, layer, 0);
    }
    out
}

pub fn pad(sound: &[f32], before: usize, after: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(before + sound.len() + after);
    out.resize(before, 0.0);
    out.extend_from_slice(sound);
    out.resize(before + sound.len() + after, 0.0);
    out
}

pub fn cut(sound: &[f32], start: usize, len: usize) -> Vec<f32> {
    let mut out: Vec<f32> = sound.iter().skip(start).take(len).copied().collect();
    out.resize(len, 0.0);
    out
}

/// Read `sound` at `speed` times its original rate.
pub fn resample(sound: &[f32], speed: f64) -> Vec<f32> {
    if sound.is_empty() || !speed.is_finite() || speed <= 0.0 {
        return sound.to_vec();
    }

    let len = (sound.len() as f64 / speed).floor() as usize;
    let last = sound.len() - 1;

    (0..len)
        .map(|i| {
            let position = i as f64 * speed;
            let index = (position as usize).min(last);
            let next = (index + 1).min(last);
            let frac = (position - index as f64) as f32;
            sound[index] + (sound[next] - sound[index]) * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_grows_destination() {
        let mut dest = vec![1.0f32; 4];
        overlay(&mut dest, &[0.5, 0.5, 0.5], 2);
        assert_eq!(dest, vec![1.0, 1.0, 1.5, 1.5, 0.5]);
    }

    #[test]
    fn layers_of_different_lengths_mix() {
        let mixed = mix_layers(&[vec![0.25; 2], vec![0.5; 3]]);
        assert_eq!(mixed, vec![0.75, 0.75, 0.5]);
    }

    #[test]
    fn pad_and_cut_fill_with_silence() {
        assert_eq!(pad(&[1.0, 2.0], 1, 2), vec![0.0, 1.0, 2.0, 0.0, 0.0]);
        assert_eq!(cut(&[1.0, 2.0, 3.0], 1, 4), vec![2.0, 3.0, 0.0, 0.0]);
        assert_eq!(cut(&[1.0, 2.0], 5, 2), vec![0.0, 0.0]);
    }

    #[test]
    fn resample_changes_length() {
        let sound: Vec<f32> = (0..100).map(|i| i as f32).collect();

        let fast = resample(&sound, 2.0);
        assert_eq!(fast.len(), 50);
        assert_eq!(fast[10], 20.0);

        let slow = resample(&sound, 0.5);
        assert_eq!(slow.len(), 200);
        assert_eq!(slow[3], 1.5);
    }

    #[test]
    fn gain_scales_every_sample() {
        let mut signal = vec![0.5f32, -1.0];
        apply_gain(&mut signal, 0.5);
        assert_eq!(signal, vec![0.25, -0.5]);
    }
}
