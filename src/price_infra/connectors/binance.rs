use serde::Deserialize;
use crate::error::{Error, Result};

/// Binance REST ticker: `GET /api/v3/ticker/price?symbol=NEOUSDT`.
#[derive(Deserialize)]
struct BinanceTickerData {
    price: String,
}

pub fn parse_price(source_name: &str, body: &[u8]) -> Result<f64> {
    let data: BinanceTickerData = serde_json::from_slice(body)
        .map_err(|e| Error::SourceFailed {
            source_name: source_name.to_string(),
            reason: format!("invalid ticker payload: {}", e),
        })?;

    data.price.parse()
        .map_err(|_| Error::SourceFailed {
            source_name: source_name.to_string(),
            reason: format!("unparseable price '{}'", data.price),
        })
}
