pub mod candle;
pub mod envelope;
pub mod options_flow;

// Re-export the core records for convenient access (e.g. `use crate::market_data::Candle`).
pub use candle::{Candle, CandleSeries, PriceBounds, MAX_SERIES_LEN};
pub use envelope::{EnvelopeStatus, ResultEnvelope};
