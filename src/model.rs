//! Wire model for the CoinMarketCap listings endpoint and the flat row
//! shape the harvester accumulates.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Payload shape violation detected while flattening a listing.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("listing {symbol} has quotes but none for {convert}")]
    MissingQuote { symbol: String, convert: String },
}

/// Some CMC error responses carry `error_code` as a string.
fn deserialize_error_code<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrInt {
        String(String),
        Int(i32),
    }

    match StringOrInt::deserialize(deserializer)? {
        StringOrInt::String(s) => s.parse().map_err(de::Error::custom),
        StringOrInt::Int(i) => Ok(i),
    }
}

/// Response envelope status block. Present on both success and error bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    pub timestamp: String,
    #[serde(deserialize_with = "deserialize_error_code")]
    pub error_code: i32,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub elapsed: i32,
    #[serde(default)]
    pub credit_count: i32,
}

/// Per-currency metrics attached to a listing, keyed by currency code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub price: f64,
    pub volume_24h: Option<f64>,
    pub volume_change_24h: Option<f64>,
    pub percent_change_1h: Option<f64>,
    pub percent_change_24h: Option<f64>,
    pub percent_change_7d: Option<f64>,
    pub market_cap: Option<f64>,
    pub market_cap_dominance: Option<f64>,
    pub fully_diluted_market_cap: Option<f64>,
    pub last_updated: String,
}

/// One cryptocurrency's snapshot as returned by `listings/latest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: u64,
    pub name: String,
    pub symbol: String,
    pub slug: String,
    pub num_market_pairs: Option<u32>,
    pub date_added: Option<String>,
    pub max_supply: Option<f64>,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub cmc_rank: Option<u32>,
    pub last_updated: String,
    #[serde(default)]
    pub quote: HashMap<String, Quote>,
}

/// Full response body: envelope status plus the ordered listing set.
/// A body without `data` fails to decode, which the client surfaces as a
/// schema failure rather than an error deep inside flattening.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingsResponse {
    pub status: Status,
    pub data: Vec<Listing>,
}

/// A listing with its quote lifted to the top level. This is the fixed CSV
/// column schema; column order is declaration order.
///
/// `last_updated` follows merge semantics: the quote's timestamp replaces
/// the listing's when a quote is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRow {
    pub id: u64,
    pub name: String,
    pub symbol: String,
    pub slug: String,
    pub num_market_pairs: Option<u32>,
    pub date_added: Option<String>,
    pub max_supply: Option<f64>,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub cmc_rank: Option<u32>,
    pub last_updated: String,
    pub price: Option<f64>,
    pub volume_24h: Option<f64>,
    pub volume_change_24h: Option<f64>,
    pub percent_change_1h: Option<f64>,
    pub percent_change_24h: Option<f64>,
    pub percent_change_7d: Option<f64>,
    pub market_cap: Option<f64>,
    pub market_cap_dominance: Option<f64>,
    pub fully_diluted_market_cap: Option<f64>,
}

/// Lifts the quote for `convert` into the listing's top-level fields and
/// drops the currency-keyed wrapper.
///
/// A listing with no quotes at all passes through with empty metric
/// columns, so re-flattening already-flat data is a no-op instead of an
/// error. A listing that has quotes but not the requested currency is a
/// schema violation: we asked for exactly that conversion.
pub fn flatten_listing(mut listing: Listing, convert: &str) -> Result<FlatRow, SchemaError> {
    let quote = match listing.quote.remove(convert) {
        Some(q) => Some(q),
        None if listing.quote.is_empty() => None,
        None => {
            return Err(SchemaError::MissingQuote {
                symbol: listing.symbol,
                convert: convert.to_string(),
            })
        }
    };

    let mut row = FlatRow {
        id: listing.id,
        name: listing.name,
        symbol: listing.symbol,
        slug: listing.slug,
        num_market_pairs: listing.num_market_pairs,
        date_added: listing.date_added,
        max_supply: listing.max_supply,
        circulating_supply: listing.circulating_supply,
        total_supply: listing.total_supply,
        cmc_rank: listing.cmc_rank,
        last_updated: listing.last_updated,
        price: None,
        volume_24h: None,
        volume_change_24h: None,
        percent_change_1h: None,
        percent_change_24h: None,
        percent_change_7d: None,
        market_cap: None,
        market_cap_dominance: None,
        fully_diluted_market_cap: None,
    };

    if let Some(q) = quote {
        row.price = Some(q.price);
        row.volume_24h = q.volume_24h;
        row.volume_change_24h = q.volume_change_24h;
        row.percent_change_1h = q.percent_change_1h;
        row.percent_change_24h = q.percent_change_24h;
        row.percent_change_7d = q.percent_change_7d;
        row.market_cap = q.market_cap;
        row.market_cap_dominance = q.market_cap_dominance;
        row.fully_diluted_market_cap = q.fully_diluted_market_cap;
        row.last_updated = q.last_updated;
    }

    Ok(row)
}

/// Flattens one cycle's payload in listing order. Any schema violation
/// voids the whole cycle: the caller appends either every row or none.
pub fn flatten_listings(
    listings: Vec<Listing>,
    convert: &str,
) -> Result<Vec<FlatRow>, SchemaError> {
    listings
        .into_iter()
        .map(|l| flatten_listing(l, convert))
        .collect()
}


#[cfg(test)]
mod tests {
    use super::fixtures::listing;
    use super::*;

    #[test]
    fn flatten_lifts_quote_fields() {
        let row = flatten_listing(listing(1, "BTC", 1, 50_000.0), "USD").unwrap();
        assert_eq!(row.symbol, "BTC");
        assert_eq!(row.price, Some(50_000.0));
        assert_eq!(row.percent_change_24h, Some(5.0));
        // Merge semantics: the quote timestamp wins.
        assert_eq!(row.last_updated, "2024-01-01T00:05:00.000Z");
    }

    #[test]
    fn flatten_preserves_non_quote_fields() {
        let row = flatten_listing(listing(42, "ETH", 2, 3_000.0), "USD").unwrap();
        assert_eq!(row.id, 42);
        assert_eq!(row.cmc_rank, Some(2));
        assert_eq!(row.max_supply, Some(21_000_000.0));
        assert_eq!(row.slug, "eth");
    }

    #[test]
    fn flatten_without_quotes_is_a_passthrough() {
        let mut l = listing(3, "XRP", 5, 1.0);
        l.quote.clear();
        let row = flatten_listing(l, "USD").unwrap();
        assert_eq!(row.price, None);
        assert_eq!(row.market_cap, None);
        assert_eq!(row.last_updated, "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn flatten_missing_requested_currency_is_schema_error() {
        let l = listing(4, "SOL", 6, 150.0);
        let err = flatten_listing(l, "EUR").unwrap_err();
        assert!(matches!(err, SchemaError::MissingQuote { .. }));
        assert!(err.to_string().contains("SOL"));
        assert!(err.to_string().contains("EUR"));
    }

    #[test]
    fn flatten_listings_preserves_order() {
        let batch = vec![
            listing(1, "BTC", 1, 50_000.0),
            listing(2, "ETH", 2, 3_000.0),
            listing(3, "USDT", 3, 1.0),
        ];
        let rows = flatten_listings(batch, "USD").unwrap();
        let symbols: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, ["BTC", "ETH", "USDT"]);
    }

    #[test]
    fn flatten_listings_voids_cycle_on_schema_error() {
        let mut bad = listing(2, "ETH", 2, 3_000.0);
        bad.quote.remove("USD");
        bad.quote.insert("EUR".to_string(), fixtures::quote(2_800.0));
        let batch = vec![listing(1, "BTC", 1, 50_000.0), bad];
        assert!(flatten_listings(batch, "USD").is_err());
    }

    #[test]
    fn listings_response_decodes() {
        let body = r#"{
            "status": {
                "timestamp": "2024-01-01T00:00:00.000Z",
                "error_code": 0,
                "error_message": null,
                "elapsed": 10,
                "credit_count": 1
            },
            "data": [{
                "id": 1,
                "name": "Bitcoin",
                "symbol": "BTC",
                "slug": "bitcoin",
                "num_market_pairs": 1000,
                "date_added": "2010-07-13T00:00:00.000Z",
                "max_supply": 21000000,
                "circulating_supply": 19000000.0,
                "total_supply": 19000000.0,
                "cmc_rank": 1,
                "last_updated": "2024-01-01T00:00:00.000Z",
                "quote": {
                    "USD": {
                        "price": 50000.0,
                        "volume_24h": 1000000000.0,
                        "volume_change_24h": 0.5,
                        "percent_change_1h": 0.1,
                        "percent_change_24h": 1.5,
                        "percent_change_7d": 5.0,
                        "market_cap": 950000000000.0,
                        "market_cap_dominance": 50.0,
                        "fully_diluted_market_cap": 1050000000000.0,
                        "last_updated": "2024-01-01T00:00:00.000Z"
                    }
                }
            }]
        }"#;
        let resp: ListingsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.status.error_code, 0);
        assert_eq!(resp.data.len(), 1);
        assert_eq!(resp.data[0].quote["USD"].price, 50_000.0);
    }

    #[test]
    fn error_code_decodes_from_string() {
        let body = r#"{
            "timestamp": "2024-01-01T00:00:00.000Z",
            "error_code": "1001",
            "error_message": "This API Key is invalid.",
            "elapsed": 0,
            "credit_count": 0
        }"#;
        let status: Status = serde_json::from_str(body).unwrap();
        assert_eq!(status.error_code, 1001);
    }

    #[test]
    fn body_without_data_fails_to_decode() {
        let body = r#"{
            "status": {
                "timestamp": "2024-01-01T00:00:00.000Z",
                "error_code": 0,
                "error_message": null,
                "elapsed": 10,
                "credit_count": 1
            }
        }"#;
        assert!(serde_json::from_str::<ListingsResponse>(body).is_err());
    }
}
