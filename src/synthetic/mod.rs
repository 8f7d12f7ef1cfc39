// =============================================================================
// Synthetic Market Data
// =============================================================================
//
// Plausible stand-in candles for when the live provider is unreachable,
// throttled or returns something we cannot read.

pub mod generator;
pub mod profile;

pub use generator::generate_envelope;
