use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::error::{MarketError, Result};
use crate::model::{DateFilter, PriceRecord};

const MAX_RETRIES: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Anything that can resolve a price API URL into records. The live
/// implementation is `PriceFetcher`; scans are tested against canned sources.
pub trait PriceSource {
    fn fetch(&self, url: &str, filter: DateFilter) -> Result<Vec<PriceRecord>>;
}

/// Blocking HTTP client for the price API with bounded retry on transient
/// failures. Non-transient failures and unparseable bodies yield an empty
/// record set; the caller decides whether that matters.
pub struct PriceFetcher {
    client: Client,
}

impl PriceFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self { client }
    }
}

impl Default for PriceFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceSource for PriceFetcher {
    fn fetch(&self, url: &str, filter: DateFilter) -> Result<Vec<PriceRecord>> {
        let mut backoff = INITIAL_BACKOFF;
        let mut reason = String::new();

        for attempt in 1..=MAX_RETRIES {
            match self.client.get(url).send() {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let body = response.text().unwrap_or_default();
                        let records = parse_records(&body);
                        return Ok(records.into_iter().filter(|r| filter.retains(r)).collect());
                    }
                    if !is_transient(status) {
                        warn!("{} returned {}, treating as no data", url, status);
                        return Ok(Vec::new());
                    }
                    reason = format!("status {}", status);
                    warn!(
                        "transient failure ({}) on attempt {}/{}",
                        status, attempt, MAX_RETRIES
                    );
                }
                Err(e) => {
                    reason = e.to_string();
                    warn!("request error on attempt {}/{}: {}", attempt, MAX_RETRIES, e);
                }
            }

            if attempt < MAX_RETRIES {
                debug!("retrying in {:?}", backoff);
                thread::sleep(backoff);
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }

        Err(MarketError::BatchUnavailable {
            url: url.to_string(),
            attempts: MAX_RETRIES,
            reason,
        })
    }
}

/// Statuses worth retrying: rate limiting and upstream hiccups.
fn is_transient(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

/// A body that is not a JSON record array counts as zero records.
fn parse_records(body: &str) -> Vec<PriceRecord> {
    match serde_json::from_str::<Vec<PriceRecord>>(body) {
        Ok(records) => records,
        Err(e) => {
            if !body.trim().is_empty() {
                warn!("unparseable price response: {}", e);
            }
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NEVER_RECORDED;

    const SAMPLE: &str = r#"[
        {"item_id": "T4_PLANKS", "city": "Thetford", "quality": 1,
         "sell_price_min": 100, "sell_price_min_date": "2024-06-01T12:00:00",
         "sell_price_max": 120, "sell_price_max_date": "2024-06-01T12:00:00",
         "buy_price_min": 80, "buy_price_min_date": "2024-06-01T12:00:00",
         "buy_price_max": 90, "buy_price_max_date": "2024-06-01T12:00:00"},
        {"item_id": "T4_PLANKS", "city": "Martlock", "quality": 1,
         "sell_price_min": 150, "sell_price_min_date": "2024-06-01T12:00:00",
         "sell_price_max": 150, "sell_price_max_date": "2024-06-01T12:00:00",
         "buy_price_min": 0, "buy_price_min_date": "0001-01-01T00:00:00",
         "buy_price_max": 0, "buy_price_max_date": "0001-01-01T00:00:00"}
    ]"#;

    #[test]
    fn parses_the_api_record_array() {
        let records = parse_records(SAMPLE);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].city, "Thetford");
        assert_eq!(records[1].sell_price_min, 150);
        assert_eq!(records[1].buy_price_max_date, NEVER_RECORDED);
    }

    #[test]
    fn malformed_body_is_zero_records() {
        assert!(parse_records("<html>bad gateway</html>").is_empty());
        assert!(parse_records("").is_empty());
    }

    #[test]
    fn strict_filter_drops_partially_observed_rows() {
        let records: Vec<PriceRecord> = parse_records(SAMPLE)
            .into_iter()
            .filter(|r| DateFilter::Strict.retains(r))
            .collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].city, "Thetford");
    }

    #[test]
    fn lenient_filter_keeps_partially_observed_rows() {
        let records: Vec<PriceRecord> = parse_records(SAMPLE)
            .into_iter()
            .filter(|r| DateFilter::Lenient.retains(r))
            .collect();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn transient_statuses_are_the_retry_set() {
        for code in [429u16, 500, 502, 503, 504] {
            assert!(is_transient(StatusCode::from_u16(code).unwrap()));
        }
        for code in [200u16, 400, 403, 404] {
            assert!(!is_transient(StatusCode::from_u16(code).unwrap()));
        }
    }
}
