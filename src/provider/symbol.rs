// =============================================================================
// Provider symbol format
// =============================================================================
//
// Region-qualified tickers are written `BASE.EXCHANGE` in the application
// (e.g. `RELIANCE.BSE`) but the provider expects `BASE:EXCHANGE`.
// =============================================================================

/// Exchange suffixes treated as region qualifiers.
pub const REGIONAL_EXCHANGES: &[&str] = &["BSE", "NSE"];

const APP_SEPARATOR: char = '.';
const PROVIDER_SEPARATOR: char = ':';

/// Split `BASE.EXCHANGE` when `EXCHANGE` is a known regional exchange.
fn split_regional(symbol: &str) -> Option<(&str, &str)> {
    let (base, exchange) = symbol.rsplit_once(APP_SEPARATOR)?;
    if base.is_empty() {
        return None;
    }
    REGIONAL_EXCHANGES
        .iter()
        .any(|ex| ex.eq_ignore_ascii_case(exchange))
        .then_some((base, exchange))
}

/// Whether `symbol` is qualified with a regional exchange suffix.
pub fn is_regional(symbol: &str) -> bool {
    split_regional(symbol.trim()).is_some()
}

/// Rewrite an application symbol into the provider's form. Symbols without a
/// regional suffix (including class shares such as `BRK.B`) pass through.
pub fn to_provider_symbol(symbol: &str) -> String {
    let symbol = symbol.trim();
    match split_regional(symbol) {
        Some((base, exchange)) => format!("{base}{PROVIDER_SEPARATOR}{exchange}"),
        None => symbol.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_regional_separator() {
        assert_eq!(to_provider_symbol("RELIANCE.BSE"), "RELIANCE:BSE");
        assert_eq!(to_provider_symbol("TCS.NSE"), "TCS:NSE");
        assert_eq!(to_provider_symbol(" INFY.bse "), "INFY:bse");
    }

    #[test]
    fn leaves_other_symbols_alone() {
        assert_eq!(to_provider_symbol("IBM"), "IBM");
        assert_eq!(to_provider_symbol("BRK.B"), "BRK.B");
        assert_eq!(to_provider_symbol(".BSE"), ".BSE");
    }

    #[test]
    fn regional_detection() {
        assert!(is_regional("RELIANCE.BSE"));
        assert!(!is_regional("MSFT"));
        assert!(!is_regional("RELIANCE:BSE"));
    }
}
