// =============================================================================
// Symbol Profiles -- anchors for synthetic series
// =============================================================================
//
// Each profile carries a base price, a volatility multiplier applied to the
// per-candle move and a volume multiplier. Unknown symbols get the default
// profile; unknown symbols on a regional exchange get the regional volatility.
// =============================================================================

use serde::Serialize;

use crate::provider::symbol::is_regional;

/// Base price for symbols not in the table.
pub const DEFAULT_BASE_PRICE: f64 = 100.0;
/// Volatility multiplier for symbols on a regional exchange.
pub const REGIONAL_VOLATILITY: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SymbolProfile {
    pub base_price: f64,
    pub volatility: f64,
    pub volume_multiplier: f64,
}

impl Default for SymbolProfile {
    fn default() -> Self {
        Self {
            base_price: DEFAULT_BASE_PRICE,
            volatility: 1.0,
            volume_multiplier: 1.0,
        }
    }
}

/// (symbol, base price, volatility, volume multiplier)
const PROFILES: &[(&str, f64, f64, f64)] = &[
    ("IBM", 170.0, 1.0, 1.0),
    ("MSFT", 410.0, 1.0, 2.0),
    ("AAPL", 185.0, 1.0, 2.5),
    ("GOOGL", 140.0, 1.0, 1.8),
    ("AMZN", 175.0, 1.0, 2.0),
    ("NVDA", 880.0, 1.0, 2.5),
    ("TSLA", 240.0, 1.0, 2.2),
    ("META", 480.0, 1.0, 1.6),
    ("RELIANCE.BSE", 2900.0, REGIONAL_VOLATILITY, 1.0),
    ("TCS.BSE", 3900.0, REGIONAL_VOLATILITY, 1.0),
    ("INFY.BSE", 1500.0, REGIONAL_VOLATILITY, 1.0),
    ("HDFCBANK.BSE", 1450.0, REGIONAL_VOLATILITY, 1.0),
    ("RELIANCE.NSE", 2900.0, REGIONAL_VOLATILITY, 1.0),
    ("TCS.NSE", 3900.0, REGIONAL_VOLATILITY, 1.0),
];

/// Look up the profile for `symbol` (case-insensitive).
pub fn profile_for(symbol: &str) -> SymbolProfile {
    let symbol = symbol.trim();
    if let Some((_, base_price, volatility, volume_multiplier)) = PROFILES
        .iter()
        .find(|(sym, ..)| sym.eq_ignore_ascii_case(symbol))
    {
        return SymbolProfile {
            base_price: *base_price,
            volatility: *volatility,
            volume_multiplier: *volume_multiplier,
        };
    }

    if is_regional(symbol) {
        return SymbolProfile {
            volatility: REGIONAL_VOLATILITY,
            ..SymbolProfile::default()
        };
    }
    SymbolProfile::default()
}
