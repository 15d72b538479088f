//! Serde mirrors of the Alpaca Market Data payloads.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use quantfeed_core::Bar;

use crate::midpoint;

#[derive(Debug, Deserialize)]
pub(crate) struct BarsEnvelope {
    pub bars: Option<BTreeMap<String, Vec<BarWire>>>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BarWire {
    pub t: DateTime<Utc>,
    pub o: Decimal,
    pub h: Decimal,
    pub l: Decimal,
    pub c: Decimal,
    pub v: Decimal,
}

impl BarWire {
    pub(crate) fn into_bar(self) -> Bar {
        Bar {
            timestamp: self.t,
            open: self.o,
            high: self.h,
            low: self.l,
            close: self.c,
            volume: self.v,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LatestQuotesEnvelope {
    pub quotes: Option<BTreeMap<String, QuoteWire>>,
}

/// Latest NBBO quote; `bp`/`ap` are bid and ask price.
#[derive(Debug, Deserialize)]
pub(crate) struct QuoteWire {
    #[serde(default)]
    pub bp: Decimal,
    #[serde(default)]
    pub ap: Decimal,
}

impl QuoteWire {
    pub(crate) fn mid(&self) -> Option<Decimal> {
        midpoint(self.bp, self.ap)
    }
}
