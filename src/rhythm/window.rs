//! Window shapes sampled by `curve`.

use std::{f64::consts::PI, fmt, str::FromStr};

use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

/// A unipolar (0.0-1.0) shape over one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    /// Half a sine: 0 → 1 → 0
    Sine,
    /// Linear up then down: 0 → 1 → 0
    Triangle,
    /// Linear ramp down: 1 → 0
    Saw,
    /// Linear ramp up: 0 → 1
    Phasor,
    /// Raised cosine: 0 → 1 → 0
    Hann,
    /// Any of the above, picked when sampled
    Random,
}

impl Window {
    /// Every concrete shape (excludes `Random`).
    pub const SHAPES: [Window; 5] = [
        Window::Sine,
        Window::Triangle,
        Window::Saw,
        Window::Phasor,
        Window::Hann,
    ];

    /// Replace `Random` with a concrete shape.
    pub fn resolve<R: Rng + ?Sized>(self, rng: &mut R) -> Window {
        match self {
            Window::Random => *Self::SHAPES.choose(rng).unwrap_or(&Window::Sine),
            shape => shape,
        }
    }

    /// Level at `phase` (0.0-1.0). `Random` reads as a sine.
    pub fn level(self, phase: f64) -> f64 {
        match self {
            Window::Sine | Window::Random => (PI * phase).sin(),
            Window::Triangle => 1.0 - (2.0 * phase - 1.0).abs(),
            Window::Saw => 1.0 - phase,
            Window::Phasor => phase,
            Window::Hann => 0.5 - 0.5 * (2.0 * PI * phase).cos(),
        }
    }

    /// Sample `size` evenly spaced points starting at phase 0.
    pub fn table(self, size: usize) -> Vec<f64> {
        let shape = self.resolve(&mut rand::thread_rng());
        (0..size)
            .map(|i| shape.level(i as f64 / size as f64))
            .collect()
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Window::Sine => "sine",
            Window::Triangle => "tri",
            Window::Saw => "saw",
            Window::Phasor => "phasor",
            Window::Hann => "hann",
            Window::Random => "random",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown window shape `{0}`")]
pub struct ParseWindowError(pub String);

impl FromStr for Window {
    type Err = ParseWindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sine" | "sin" => Ok(Window::Sine),
            "tri" | "triangle" => Ok(Window::Triangle),
            "saw" => Ok(Window::Saw),
            "phasor" | "line" => Ok(Window::Phasor),
            "hann" | "hanning" => Ok(Window::Hann),
            "random" | "rnd" => Ok(Window::Random),
            other => Err(ParseWindowError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn shapes_stay_unipolar() {
        for shape in Window::SHAPES {
            for level in shape.table(64) {
                assert!((0.0..=1.0).contains(&level), "{shape} produced {level}");
            }
        }
    }

    #[test]
    fn peaks_sit_mid_cycle() {
        assert!((Window::Sine.level(0.5) - 1.0).abs() < 1e-9);
        assert!((Window::Triangle.level(0.5) - 1.0).abs() < 1e-9);
        assert!((Window::Hann.level(0.5) - 1.0).abs() < 1e-9);
        assert_eq!(Window::Saw.level(0.0), 1.0);
        assert_eq!(Window::Phasor.level(0.0), 0.0);
    }

    #[test]
    fn random_resolves_to_concrete_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..16 {
            assert_ne!(Window::Random.resolve(&mut rng), Window::Random);
        }
    }

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("tri".parse::<Window>(), Ok(Window::Triangle));
        assert_eq!("LINE".parse::<Window>(), Ok(Window::Phasor));
        assert_eq!(
            "square".parse::<Window>(),
            Err(ParseWindowError("square".into()))
        );
    }
}
