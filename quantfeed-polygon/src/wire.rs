//! Serde mirrors of the Polygon REST payloads.
//!
//! Every envelope field that may be absent on an empty result set is an
//! `Option`, so "no data" deserializes cleanly instead of erroring.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use quantfeed_core::{FeedError, NewsArticle, OptionContract, OptionRight};

#[derive(Debug, Deserialize)]
pub(crate) struct AggsEnvelope {
    pub results: Option<Vec<AggWire>>,
}

/// One aggregate bar; `t` is the window start in unix milliseconds.
#[derive(Debug, Deserialize)]
pub(crate) struct AggWire {
    pub t: i64,
    pub o: Decimal,
    pub h: Decimal,
    pub l: Decimal,
    pub c: Decimal,
    pub v: Decimal,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LastTradeEnvelope {
    pub results: Option<LastTradeWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LastTradeWire {
    /// Trade price.
    pub p: Decimal,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContractsEnvelope {
    pub results: Option<Vec<ContractWire>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContractWire {
    pub ticker: String,
    pub underlying_ticker: String,
    pub strike_price: Decimal,
    pub expiration_date: NaiveDate,
    pub contract_type: String,
    pub shares_per_contract: Option<u32>,
}

impl ContractWire {
    pub(crate) fn into_contract(self) -> Result<OptionContract, FeedError> {
        let right: OptionRight = self
            .contract_type
            .parse()
            .map_err(|_| FeedError::Data(format!("unknown contract type {}", self.contract_type)))?;
        Ok(OptionContract {
            ticker: self.ticker,
            underlying: self.underlying_ticker,
            expiration: self.expiration_date,
            strike: self.strike_price,
            right,
            shares_per_contract: self.shares_per_contract.unwrap_or(100),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewsEnvelope {
    pub results: Option<Vec<NewsWire>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewsWire {
    pub id: String,
    pub title: String,
    pub published_utc: DateTime<Utc>,
    pub article_url: String,
    #[serde(default)]
    pub tickers: Vec<String>,
    pub description: Option<String>,
}

impl NewsWire {
    pub(crate) fn into_article(self) -> NewsArticle {
        NewsArticle {
            id: self.id,
            title: self.title,
            published_at: self.published_utc,
            url: self.article_url,
            tickers: self.tickers,
            description: self.description,
        }
    }
}

/// Health-probe payload; only the status string matters.
#[derive(Debug, Deserialize)]
pub(crate) struct MarketStatus {
    #[allow(dead_code)]
    pub market: Option<String>,
}
