use serde::Deserialize;
use crate::error::{Error, Result};

/// Coinbase spot price: `GET /v2/prices/NEO-USD/spot`.
#[derive(Deserialize)]
struct CoinbaseSpotResponse {
    data: CoinbaseSpotData,
}

#[derive(Deserialize)]
struct CoinbaseSpotData {
    amount: String,
}

pub fn parse_price(source_name: &str, body: &[u8]) -> Result<f64> {
    let response: CoinbaseSpotResponse = serde_json::from_slice(body)
        .map_err(|e| Error::SourceFailed {
            source_name: source_name.to_string(),
            reason: format!("invalid spot payload: {}", e),
        })?;

    response.data.amount.parse()
        .map_err(|_| Error::SourceFailed {
            source_name: source_name.to_string(),
            reason: format!("unparseable amount '{}'", response.data.amount),
        })
}
