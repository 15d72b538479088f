//! Serde mirrors of the Yahoo v8 chart payload.
//!
//! Yahoo pads its parallel arrays with `null` for halted or missing windows;
//! [`Series::points`] zips the arrays and drops any index with a hole so a
//! partial series never turns into a parse error.

use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct ChartEnvelope {
    pub chart: Chart,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Chart {
    pub result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChartResult {
    pub meta: Meta,
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: Indicators,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Meta {
    #[serde(rename = "regularMarketPrice")]
    pub regular_market_price: Option<Decimal>,
    #[serde(rename = "chartPreviousClose")]
    pub chart_previous_close: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Indicators {
    #[serde(default)]
    pub quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Quote {
    #[serde(default)]
    pub open: Vec<Option<Decimal>>,
    #[serde(default)]
    pub high: Vec<Option<Decimal>>,
    #[serde(default)]
    pub low: Vec<Option<Decimal>>,
    #[serde(default)]
    pub close: Vec<Option<Decimal>>,
    #[serde(default)]
    pub volume: Vec<Option<Decimal>>,
}

/// One fully-populated index of the parallel arrays.
pub(crate) struct Point {
    pub unix_seconds: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

pub(crate) struct Series {
    timestamps: Vec<i64>,
    quote: Quote,
}

impl Series {
    pub(crate) fn points(&self) -> impl Iterator<Item = Point> + '_ {
        self.timestamps.iter().enumerate().filter_map(|(i, &t)| {
            Some(Point {
                unix_seconds: t,
                open: (*self.quote.open.get(i)?)?,
                high: (*self.quote.high.get(i)?)?,
                low: (*self.quote.low.get(i)?)?,
                close: (*self.quote.close.get(i)?)?,
                volume: (*self.quote.volume.get(i)?)?,
            })
        })
    }
}

impl ChartEnvelope {
    /// The first (and in practice only) result, stripped down to the series.
    pub(crate) fn into_series(self) -> Option<Series> {
        let result = self.chart.result?.into_iter().next()?;
        let quote = result.indicators.quote.into_iter().next()?;
        Some(Series {
            timestamps: result.timestamp,
            quote,
        })
    }

    /// Live market price, falling back to the previous close.
    pub(crate) fn latest_price(&self) -> Option<Decimal> {
        let result = self.chart.result.as_ref()?.first()?;
        result
            .meta
            .regular_market_price
            .or(result.meta.chart_previous_close)
    }
}
