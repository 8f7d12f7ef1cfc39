use serde::Serialize;

use super::candle::CandleSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Error,
}

/// The `{status, data}` wrapper handed to the presentation layer.
///
/// The only constructors are [`ResultEnvelope::success`] and
/// [`ResultEnvelope::error`], so an `error` envelope always carries an empty
/// series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEnvelope {
    status: EnvelopeStatus,
    data: CandleSeries,
}

impl ResultEnvelope {
    pub fn success(data: CandleSeries) -> Self {
        Self {
            status: EnvelopeStatus::Success,
            data,
        }
    }

    pub fn error() -> Self {
        Self {
            status: EnvelopeStatus::Error,
            data: CandleSeries::empty(),
        }
    }

    pub fn status(&self) -> EnvelopeStatus {
        self.status
    }

    pub fn data(&self) -> &CandleSeries {
        &self.data
    }
}

impl Default for ResultEnvelope {
    /// Nothing fetched yet.
    fn default() -> Self {
        Self::success(CandleSeries::empty())
    }
}
