/*
Rhythm Helpers
==============

Small, pure functions for building and transforming rhythm patterns and onset
lists. Generators use them to decide *when* things happen inside a buffer; they
know nothing about audio.

Vocabulary
----------

  pattern     A fixed-length list of markers, `1` for an onset and `0` for a
              rest. One marker per step.

  onset       A frame offset (in samples) where a sound event starts.

  beat length How many frames one pattern step lasts when a pattern is turned
              into onsets.

  arrange     Post-processing shared by the pattern builders: shift, tile
              (`reps`) and reverse.


Example mental model:

    eu(8, 3)                   = [1, 0, 0, 1, 0, 0, 1, 0]
    onsets(&eu(8, 3), 100, ..) = [0, 300, 600]


About `eu`
----------

`eu` spreads rests between onsets with a simple insertion walk rather than the
usual bisection (Bjorklund) construction. The results agree for the common
cases (12/3, 6/3, 8/4, ...) but are not guaranteed to be maximally even for
every input: 5/2 gives [1, 0, 0, 1, 0] where Bjorklund gives [1, 0, 1, 0, 0].
*/

mod window;

pub use window::{ParseWindowError, Window};

/// Default step length used by generators: 0.1 s at 44.1 kHz.
pub const DEFAULT_BEAT_LENGTH: usize = 4410;

/// Shift, tiling and reversal applied after a pattern is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Arrange {
    /// Step offset. Meaning depends on the builder (see `pattern` and `eu`).
    pub offset: isize,
    /// Tile the whole pattern this many times.
    pub reps: Option<usize>,
    /// Reverse the final pattern.
    pub reverse: bool,
}

impl Arrange {
    pub fn offset(offset: isize) -> Self {
        Self {
            offset,
            ..Self::default()
        }
    }

    pub fn with_reps(mut self, reps: usize) -> Self {
        self.reps = Some(reps);
        self
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Apply tiling and reversal (the offset is handled by each builder)
    fn finish<T: Copy>(&self, mut pattern: Vec<T>) -> Vec<T> {
        if let Some(reps) = self.reps {
            pattern = pattern.repeat(reps);
        }

        if self.reverse {
            pattern.reverse();
        }

        pattern
    }
}

/// Options for `onsets`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OnsetOpts {
    /// Frame offset of the first step.
    pub playhead: usize,
    /// Reverse the order of the emitted onsets (values are unchanged).
    pub reverse: bool,
}

/// A pattern marker that may count as a hit.
pub trait Hit {
    fn is_hit(&self) -> bool;
}

impl Hit for u8 {
    fn is_hit(&self) -> bool {
        *self == 1
    }
}

impl Hit for i32 {
    fn is_hit(&self) -> bool {
        *self == 1
    }
}

impl Hit for bool {
    fn is_hit(&self) -> bool {
        *self
    }
}

impl Hit for char {
    fn is_hit(&self) -> bool {
        matches!(self, '1' | 'x' | 'X')
    }
}

impl Hit for &str {
    fn is_hit(&self) -> bool {
        matches!(*self, "1" | "x" | "X")
    }
}

impl Hit for String {
    fn is_hit(&self) -> bool {
        self.as_str().is_hit()
    }
}

/// Build a pulse every `div` steps across `numbeats` steps.
///
/// A positive `offset` drops the last `offset` steps and pushes zeros in at the
/// front, so the pattern shifts right without wrapping. The offset is clamped
/// to `numbeats`, and a `div` of zero is treated as one.
pub fn pattern(numbeats: usize, div: usize, arrange: Arrange) -> Vec<u8> {
    let div = div.max(1);
    let mut pat: Vec<u8> = (0..numbeats).map(|step| u8::from(step % div == 0)).collect();

    if arrange.offset > 0 {
        let offset = (arrange.offset as usize).min(numbeats);
        pat.truncate(numbeats - offset);
        pat.splice(0..0, std::iter::repeat(0).take(offset));
    }

    arrange.finish(pat)
}

/// Distribute `numbeats` onsets over `length` steps.
///
/// The offset rotates the result to the right (cyclically). `numbeats` is
/// clamped to `length`; zero beats gives a pattern of rests.
///
/// ```
/// use voicegrid::rhythm::{eu, Arrange};
///
/// assert_eq!(eu(6, 3, Arrange::default()), vec![1, 0, 1, 0, 1, 0]);
/// assert_eq!(eu(6, 3, Arrange::offset(1)), vec![0, 1, 0, 1, 0, 1]);
/// ```
pub fn eu(length: usize, numbeats: usize, arrange: Arrange) -> Vec<u8> {
    let numbeats = numbeats.min(length);
    if numbeats == 0 {
        return arrange.finish(vec![0; length]);
    }

    let mut pulses = vec![1u8; numbeats];
    let mut pauses = length - numbeats;
    let mut position = 0;

    // Walk forward dropping one rest after each onset, wrapping to the start
    // whenever no onset is left ahead of the cursor.
    while pauses > 0 {
        match pulses[position..].iter().position(|&marker| marker == 1) {
            Some(found) => {
                let index = position + found;
                pulses.insert(index + 1, 0);
                pauses -= 1;
                position = index + 1;
            }
            None => position = 0,
        }
    }

    arrange.finish(rotate(&pulses, arrange.offset))
}

/// Turn a pattern into frame offsets, one per hit.
///
/// The playhead advances by `beat_length` after every step, hit or not.
pub fn onsets<H: Hit>(pattern: &[H], beat_length: usize, opts: OnsetOpts) -> Vec<usize> {
    let mut playhead = opts.playhead;
    let mut out = Vec::with_capacity(pattern.len());

    for marker in pattern {
        if marker.is_hit() {
            out.push(playhead);
        }

        playhead += beat_length;
    }

    if opts.reverse {
        out.reverse();
    }

    out
}

/// Sample a window shape at `numbeats` points and scale to `length` frames.
///
/// The rising half of a window twice as long is used, or the falling half when
/// `reverse` is set. `None` picks a random shape.
pub fn curve(numbeats: usize, window: Option<Window>, length: usize, reverse: bool) -> Vec<usize> {
    let shape = window
        .unwrap_or(Window::Random)
        .resolve(&mut rand::thread_rng());
    let table = shape.table(numbeats * 2);

    let half = if reverse {
        &table[numbeats..]
    } else {
        &table[..numbeats]
    };

    half.iter()
        .map(|&level| (level * length as f64) as usize)
        .collect()
}

/// Rotate a pattern cyclically: the last `offset` elements move to the front.
///
/// Negative offsets rotate the other way.
pub fn rotate<T: Clone>(pattern: &[T], offset: isize) -> Vec<T> {
    if pattern.is_empty() {
        return Vec::new();
    }

    let split = (-offset).rem_euclid(pattern.len() as isize) as usize;
    let mut out = Vec::with_capacity(pattern.len());
    out.extend_from_slice(&pattern[split..]);
    out.extend_from_slice(&pattern[..split]);
    out
}

/// Multiply every onset by `factor`, truncating toward zero.
pub fn scale(onsets: &[usize], factor: f64) -> Vec<usize> {
    onsets
        .iter()
        .map(|&onset| (onset as f64 * factor) as usize)
        .collect()
}

/// Tile an onset list `reps` times, shifting repetition `r` by `r * span`.
///
/// `span` is the length of the source pattern in frames (see `span_of`). The
/// result stays non-decreasing as long as every onset is below `span`.
pub fn repeat(onsets: &[usize], reps: usize, span: usize) -> Vec<usize> {
    (0..reps)
        .flat_map(|rep| onsets.iter().map(move |&onset| onset + rep * span))
        .collect()
}

/// Length in frames of a pattern played at `beat_length` frames per step.
pub fn span_of<T>(pattern: &[T], beat_length: usize) -> usize {
    pattern.len() * beat_length
}
