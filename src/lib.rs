pub mod config;
pub mod console; // Operator command line
pub mod dsp;
pub mod engine; // Voice allocation, clock and supervision
pub mod error;
pub mod generators;
pub mod io;
pub mod params;
pub mod rhythm; // Pattern and onset construction

pub const MAX_BLOCK_SIZE: usize = 2048;
pub(crate) const MIN_TIME: f32 = 1.0 / 48_000.0;
