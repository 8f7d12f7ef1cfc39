// =============================================================================
// Intraday Market-Data Provider
// =============================================================================
//
// Everything that knows about the provider's wire format lives here:
//
//   1. interval   -- application interval token -> provider token
//   2. symbol     -- region-qualified symbol rewriting
//   3. client     -- request model, transport seam, reqwest transport
//   4. normalizer -- payload classification and candle extraction
//   5. rate_limit -- local per-minute request budget

pub mod client;
pub mod interval;
pub mod normalizer;
pub mod rate_limit;
pub mod symbol;

pub use client::{HttpTransport, OutputSize, ProviderRequest, QuoteTransport};
pub use normalizer::{normalize, ProviderPayload};
pub use rate_limit::{RateLimitSnapshot, RateLimitTracker};
