use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use statrs::statistics::Statistics;
use tracing::{info, warn};

use crate::batch::BatchUrlBuilder;
use crate::catalog::{item_id, load_catalog};
use crate::config::{
    artifact_items, BASE_URL, BATCH_SIZE, BLACK_MARKET, CATALOG_PATH, CITIES, ENCHANT_MAX,
    ENCHANT_MIN, MAX_URL_LENGTH, RESOURCE_TYPES, TIER_MAX, TIER_MIN,
};
use crate::error::Result;
use crate::fetcher::PriceSource;
use crate::limiter::RateLimiter;
use crate::model::{DateFilter, Opportunity, PriceRecord};

/// Cooperative stop signal, checked between batches. A cancelled scan keeps
/// whatever it gathered so far.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScanProgress {
    pub done: usize,
    pub total: usize,
}

/// Whether a Black Market flip must beat the city price or merely match it.
/// Strict is the default; break-even exists for players who value the trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlackMarketMargin {
    StrictlyPositive,
    BreakEven,
}

/// Picks the cheapest and dearest sell listing for one item and turns the
/// spread into an opportunity. Needs two distinct cities with real prices.
pub fn find_opportunity(records: &[PriceRecord]) -> Option<Opportunity> {
    let valid: Vec<&PriceRecord> = records.iter().filter(|r| r.sell_price_min > 0).collect();
    if valid.len() < 2 {
        return None;
    }

    let buy = *valid.iter().min_by_key(|r| r.sell_price_min)?;
    let sell = *valid.iter().max_by_key(|r| r.sell_price_min)?;

    if sell.sell_price_min <= buy.sell_price_min {
        return None;
    }

    Some(Opportunity {
        item_id: buy.item_id.clone(),
        buy_city: buy.city.clone(),
        buy_price: buy.sell_price_min,
        buy_price_date: buy.sell_price_min_date.clone(),
        sell_city: sell.city.clone(),
        sell_price: sell.sell_price_min,
        sell_price_date: sell.sell_price_min_date.clone(),
        profit: sell.sell_price_min - buy.sell_price_min,
    })
}

/// The Black Market only buys, so the trade direction flips: buy the cheapest
/// city sell listing, deliver into the Black Market buy order.
pub fn find_black_market_opportunity(
    records: &[PriceRecord],
    margin: BlackMarketMargin,
) -> Option<Opportunity> {
    let black_market = records.iter().find(|r| r.city == BLACK_MARKET)?;
    let best_sell = records
        .iter()
        .filter(|r| r.city != BLACK_MARKET && r.sell_price_min > 0)
        .min_by_key(|r| r.sell_price_min)?;

    let bm_price = black_market.buy_price_max;
    let city_price = best_sell.sell_price_min;
    let worthwhile = match margin {
        BlackMarketMargin::StrictlyPositive => bm_price > city_price,
        BlackMarketMargin::BreakEven => bm_price >= city_price,
    };
    if !worthwhile {
        return None;
    }

    Some(Opportunity {
        item_id: black_market.item_id.clone(),
        buy_city: best_sell.city.clone(),
        buy_price: city_price,
        buy_price_date: best_sell.sell_price_min_date.clone(),
        sell_city: BLACK_MARKET.to_string(),
        sell_price: bm_price,
        sell_price_date: black_market.buy_price_max_date.clone(),
        profit: bm_price - city_price,
    })
}

/// Artifact foundry price sheet: raw records per city plus cross-city means.
pub struct ArtifactReport {
    pub cities: Vec<CityPrices>,
}

pub struct CityPrices {
    pub city: String,
    pub records: Vec<PriceRecord>,
}

pub struct ArtifactAverage {
    pub item_id: String,
    pub sell_price_min: f64,
    pub buy_price_max: f64,
}

impl ArtifactReport {
    pub fn city(&self, name: &str) -> Option<&CityPrices> {
        self.cities.iter().find(|c| c.city == name)
    }

    /// Mean sell/buy price per artifact across every city that reported it,
    /// in the foundry's canonical item order.
    pub fn averages(&self) -> Vec<ArtifactAverage> {
        let mut sells: HashMap<&str, Vec<f64>> = HashMap::new();
        let mut buys: HashMap<&str, Vec<f64>> = HashMap::new();

        for city in &self.cities {
            for r in &city.records {
                sells.entry(&r.item_id).or_default().push(r.sell_price_min as f64);
                buys.entry(&r.item_id).or_default().push(r.buy_price_max as f64);
            }
        }

        artifact_items()
            .into_iter()
            .filter_map(|id| {
                let sell = sells.remove(id.as_str())?;
                let buy = buys.remove(id.as_str()).unwrap_or_default();
                Some(ArtifactAverage {
                    item_id: id,
                    sell_price_min: sell.mean(),
                    buy_price_max: buy.mean(),
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisKind {
    Arbitrage,
    BlackMarket,
    Artifacts,
}

/// Results of the last completed run of each analysis. Owned by the dashboard
/// and refreshed explicitly; nothing in here updates behind the UI's back.
#[derive(Default)]
pub struct AnalysisCache {
    arbitrage: Option<Vec<Opportunity>>,
    black_market: Option<Vec<Opportunity>>,
    artifacts: Option<ArtifactReport>,
}

impl AnalysisCache {
    pub fn arbitrage(&self) -> Option<&[Opportunity]> {
        self.arbitrage.as_deref()
    }

    pub fn black_market(&self) -> Option<&[Opportunity]> {
        self.black_market.as_deref()
    }

    pub fn artifacts(&self) -> Option<&ArtifactReport> {
        self.artifacts.as_ref()
    }

    pub fn store_arbitrage(&mut self, opportunities: Vec<Opportunity>) {
        self.arbitrage = Some(opportunities);
    }

    pub fn store_black_market(&mut self, opportunities: Vec<Opportunity>) {
        self.black_market = Some(opportunities);
    }

    pub fn store_artifacts(&mut self, report: ArtifactReport) {
        self.artifacts = Some(report);
    }

    pub fn invalidate(&mut self, kind: AnalysisKind) {
        match kind {
            AnalysisKind::Arbitrage => self.arbitrage = None,
            AnalysisKind::BlackMarket => self.black_market = None,
            AnalysisKind::Artifacts => self.artifacts = None,
        }
    }
}

/// Drives a full scan: item enumeration, batching, rate-limited fetching and
/// opportunity detection. Batches run strictly in emission order; a failed
/// batch is skipped, never fatal.
pub struct MarketAnalyzer<S: PriceSource> {
    source: S,
    limiter: RateLimiter,
    builder: BatchUrlBuilder,
    catalog_path: String,
    margin: BlackMarketMargin,
}

impl<S: PriceSource> MarketAnalyzer<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            limiter: RateLimiter::new(),
            builder: BatchUrlBuilder::new(BASE_URL, &CITIES, MAX_URL_LENGTH, BATCH_SIZE),
            catalog_path: CATALOG_PATH.to_string(),
            margin: BlackMarketMargin::StrictlyPositive,
        }
    }

    pub fn with_catalog_path(mut self, path: impl Into<String>) -> Self {
        self.catalog_path = path.into();
        self
    }

    pub fn with_margin(mut self, margin: BlackMarketMargin) -> Self {
        self.margin = margin;
        self
    }

    /// Scans the refined-resource cross product for cross-city spreads.
    /// Returns opportunities sorted by profit, best first.
    pub fn run_arbitrage_analysis<F>(
        &mut self,
        cancel: &CancelToken,
        mut on_progress: F,
    ) -> Result<Vec<Opportunity>>
    where
        F: FnMut(ScanProgress),
    {
        let ids: Vec<String> = RESOURCE_TYPES
            .iter()
            .flat_map(|&res| {
                (TIER_MIN..=TIER_MAX).flat_map(move |tier| {
                    (ENCHANT_MIN..=ENCHANT_MAX).map(move |ench| item_id(res, tier, ench))
                })
            })
            .collect();

        let urls = self.builder.build(&ids)?;
        info!(
            "arbitrage scan: {} item ids across {} batches",
            ids.len(),
            urls.len()
        );

        let opportunities =
            self.scan_urls(&urls, cancel, &mut on_progress, find_opportunity);
        info!("arbitrage scan found {} opportunities", opportunities.len());
        Ok(opportunities)
    }

    /// Scans every tradeable item in the static catalog against the Black
    /// Market buy orders. Aborts before any request if the catalog is missing.
    pub fn run_black_market_analysis<F>(
        &mut self,
        cancel: &CancelToken,
        mut on_progress: F,
    ) -> Result<Vec<Opportunity>>
    where
        F: FnMut(ScanProgress),
    {
        let catalog = load_catalog(&self.catalog_path)?;
        let ids: Vec<String> = catalog.into_iter().map(|e| e.unique_name).collect();

        let urls = self.builder.build(&ids)?;
        info!(
            "black market scan: {} catalog items across {} batches",
            ids.len(),
            urls.len()
        );

        let margin = self.margin;
        let opportunities = self.scan_urls(&urls, cancel, &mut on_progress, move |records| {
            find_black_market_opportunity(records, margin)
        });
        info!("black market scan found {} opportunities", opportunities.len());
        Ok(opportunities)
    }

    /// Fetches the artifact foundry price sheet, one request per city, with
    /// the lenient date filter: partially observed artifact rows still count.
    pub fn run_artifact_scan<F>(
        &mut self,
        cancel: &CancelToken,
        mut on_progress: F,
    ) -> Result<ArtifactReport>
    where
        F: FnMut(ScanProgress),
    {
        let items = artifact_items();
        let total = CITIES.len();
        let mut cities = Vec::new();

        for (i, city) in CITIES.into_iter().enumerate() {
            if cancel.is_cancelled() {
                info!("artifact scan cancelled after {}/{} cities", i, total);
                break;
            }

            let url =
                BatchUrlBuilder::new(BASE_URL, &[city], MAX_URL_LENGTH, BATCH_SIZE).url_for(&items);

            self.limiter.acquire();
            match self.source.fetch(&url, DateFilter::Lenient) {
                Ok(records) => {
                    self.limiter.record();
                    if !records.is_empty() {
                        cities.push(CityPrices {
                            city: city.to_string(),
                            records,
                        });
                    }
                }
                Err(e) => warn!("skipping {}: {}", city, e),
            }
            on_progress(ScanProgress {
                done: i + 1,
                total,
            });
        }

        Ok(ArtifactReport { cities })
    }

    fn scan_urls<F, G>(
        &mut self,
        urls: &[String],
        cancel: &CancelToken,
        on_progress: &mut F,
        finder: G,
    ) -> Vec<Opportunity>
    where
        F: FnMut(ScanProgress),
        G: Fn(&[PriceRecord]) -> Option<Opportunity>,
    {
        let total = urls.len();
        let mut opportunities = Vec::new();

        for (i, url) in urls.iter().enumerate() {
            if cancel.is_cancelled() {
                info!("scan cancelled after {}/{} batches", i, total);
                break;
            }

            self.limiter.acquire();
            match self.source.fetch(url, DateFilter::Strict) {
                Ok(records) => {
                    self.limiter.record();
                    for (_, group) in group_by_item(records) {
                        if let Some(op) = finder(&group) {
                            opportunities.push(op);
                        }
                    }
                }
                Err(e) => warn!("skipping batch {}/{}: {}", i + 1, total, e),
            }
            on_progress(ScanProgress {
                done: i + 1,
                total,
            });
        }

        opportunities.sort_by(|a, b| b.profit.cmp(&a.profit));
        opportunities
    }
}

/// Buckets a batch response per item, keeping first-seen item order so
/// results are deterministic before the final profit sort.
fn group_by_item(records: Vec<PriceRecord>) -> Vec<(String, Vec<PriceRecord>)> {
    let mut order: Vec<String> = Vec::new();
    let mut map: HashMap<String, Vec<PriceRecord>> = HashMap::new();

    for record in records {
        if !map.contains_key(&record.item_id) {
            order.push(record.item_id.clone());
        }
        map.entry(record.item_id.clone()).or_default().push(record);
    }

    order
        .into_iter()
        .filter_map(|id| map.remove(&id).map(|group| (id, group)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MarketError;
    use crate::model::test_record;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::fs;
    use std::rc::Rc;

    fn rec(item: &str, city: &str, sell_min: u64) -> PriceRecord {
        let mut r = test_record(city, sell_min);
        r.item_id = item.to_string();
        r
    }

    fn bm_rec(item: &str, buy_max: u64) -> PriceRecord {
        let mut r = test_record(BLACK_MARKET, 0);
        r.item_id = item.to_string();
        r.buy_price_max = buy_max;
        r
    }

    #[test]
    fn finds_the_widest_spread() {
        let records = vec![rec("T4_PLANKS", "Thetford", 100), rec("T4_PLANKS", "Martlock", 150)];
        let op = find_opportunity(&records).unwrap();
        assert_eq!(op.buy_city, "Thetford");
        assert_eq!(op.sell_city, "Martlock");
        assert_eq!(op.profit, 50);
    }

    #[test]
    fn input_order_does_not_matter() {
        let records = vec![rec("T4_ORE", "Caerleon", 200), rec("T4_ORE", "Lymhurst", 150)];
        let op = find_opportunity(&records).unwrap();
        assert_eq!(op.buy_price, 150);
        assert_eq!(op.sell_price, 200);
        assert_eq!(op.buy_city, "Lymhurst");
    }

    #[test]
    fn zero_priced_rows_are_not_listings() {
        assert!(find_opportunity(&[rec("T4_HIDE", "Thetford", 0)]).is_none());
        // One valid row is still not a spread.
        assert!(
            find_opportunity(&[rec("T4_HIDE", "Thetford", 0), rec("T4_HIDE", "Martlock", 90)])
                .is_none()
        );
    }

    #[test]
    fn equal_prices_yield_no_profit() {
        let records = vec![rec("T4_FIBER", "Thetford", 120), rec("T4_FIBER", "Martlock", 120)];
        assert!(find_opportunity(&records).is_none());
    }

    #[test]
    fn black_market_buys_above_city_price() {
        let records = vec![bm_rec("T4_CLOTH", 300), rec("T4_CLOTH", "Martlock", 250)];
        let op =
            find_black_market_opportunity(&records, BlackMarketMargin::StrictlyPositive).unwrap();
        assert_eq!(op.buy_city, "Martlock");
        assert_eq!(op.sell_city, BLACK_MARKET);
        assert_eq!(op.profit, 50);
    }

    #[test]
    fn black_market_break_even_is_policy() {
        let records = vec![bm_rec("T4_CLOTH", 280), rec("T4_CLOTH", "Martlock", 280)];
        assert!(
            find_black_market_opportunity(&records, BlackMarketMargin::StrictlyPositive).is_none()
        );
        let op = find_black_market_opportunity(&records, BlackMarketMargin::BreakEven).unwrap();
        assert_eq!(op.profit, 0);
    }

    #[test]
    fn black_market_needs_a_real_city_listing() {
        assert!(find_black_market_opportunity(
            &[bm_rec("T4_CLOTH", 300)],
            BlackMarketMargin::StrictlyPositive
        )
        .is_none());
        assert!(find_black_market_opportunity(
            &[bm_rec("T4_CLOTH", 300), rec("T4_CLOTH", "Martlock", 0)],
            BlackMarketMargin::StrictlyPositive
        )
        .is_none());
    }

    #[derive(Clone)]
    struct FakeSource {
        responses: Rc<RefCell<VecDeque<Result<Vec<PriceRecord>>>>>,
    }

    impl FakeSource {
        fn new(responses: Vec<Result<Vec<PriceRecord>>>) -> Self {
            Self {
                responses: Rc::new(RefCell::new(responses.into())),
            }
        }

        fn remaining(&self) -> usize {
            self.responses.borrow().len()
        }
    }

    impl PriceSource for FakeSource {
        fn fetch(&self, _url: &str, filter: DateFilter) -> Result<Vec<PriceRecord>> {
            match self.responses.borrow_mut().pop_front() {
                Some(Ok(records)) => {
                    Ok(records.into_iter().filter(|r| filter.retains(r)).collect())
                }
                Some(Err(e)) => Err(e),
                None => Ok(Vec::new()),
            }
        }
    }

    fn unavailable() -> MarketError {
        MarketError::BatchUnavailable {
            url: "http://test".into(),
            attempts: 5,
            reason: "status 503".into(),
        }
    }

    fn three_item_batch() -> Vec<PriceRecord> {
        vec![
            // Spread 80.
            rec("T4_PLANKS", "Thetford", 100),
            rec("T4_PLANKS", "Martlock", 180),
            rec("T4_PLANKS", "Caerleon", 140),
            // Spread 200.
            rec("T5_ORE", "Thetford", 300),
            rec("T5_ORE", "Martlock", 500),
            rec("T5_ORE", "Caerleon", 400),
            // Flat: no opportunity.
            rec("T6_HIDE", "Thetford", 250),
            rec("T6_HIDE", "Martlock", 250),
            rec("T6_HIDE", "Caerleon", 250),
        ]
    }

    #[test]
    fn arbitrage_scan_ranks_by_profit() {
        let source = FakeSource::new(vec![Ok(three_item_batch())]);
        let mut analyzer = MarketAnalyzer::new(source);

        let mut progress = Vec::new();
        let ops = analyzer
            .run_arbitrage_analysis(&CancelToken::new(), |p| progress.push(p))
            .unwrap();

        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].item_id, "T5_ORE");
        assert_eq!(ops[0].profit, 200);
        assert_eq!(ops[1].item_id, "T4_PLANKS");
        assert!(ops.windows(2).all(|w| w[0].profit >= w[1].profit));
        assert!(ops.iter().all(|o| o.profit > 0));

        // One progress tick per batch, ending complete.
        let last = progress.last().unwrap();
        assert_eq!(last.done, last.total);
        assert_eq!(progress.len(), last.total);
    }

    #[test]
    fn failed_batch_is_skipped_not_fatal() {
        let source = FakeSource::new(vec![
            Err(unavailable()),
            Ok(vec![
                rec("T4_PLANKS", "Thetford", 100),
                rec("T4_PLANKS", "Martlock", 180),
            ]),
        ]);
        let mut analyzer = MarketAnalyzer::new(source);

        let ops = analyzer
            .run_arbitrage_analysis(&CancelToken::new(), |_| {})
            .unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].profit, 80);
    }

    #[test]
    fn cancelled_scan_stops_before_fetching() {
        let source = FakeSource::new(vec![Ok(three_item_batch())]);
        let handle = source.clone();
        let mut analyzer = MarketAnalyzer::new(source);

        let cancel = CancelToken::new();
        cancel.cancel();
        let ops = analyzer.run_arbitrage_analysis(&cancel, |_| {}).unwrap();

        assert!(ops.is_empty());
        assert_eq!(handle.remaining(), 1);
    }

    #[test]
    fn black_market_scan_reads_the_catalog() {
        let path = std::env::temp_dir().join("albion_bm_catalog.json");
        fs::write(
            &path,
            r#"[{"UniqueName": "T4_CLOTH", "Index": "10"},
               {"UniqueName": "T5_CLOTH", "Index": "11"}]"#,
        )
        .unwrap();

        let source = FakeSource::new(vec![Ok(vec![
            bm_rec("T4_CLOTH", 300),
            rec("T4_CLOTH", "Martlock", 250),
            bm_rec("T5_CLOTH", 100),
            rec("T5_CLOTH", "Martlock", 250),
        ])]);
        let mut analyzer =
            MarketAnalyzer::new(source).with_catalog_path(path.to_str().unwrap());

        let ops = analyzer
            .run_black_market_analysis(&CancelToken::new(), |_| {})
            .unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].item_id, "T4_CLOTH");
        assert_eq!(ops[0].sell_city, BLACK_MARKET);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn missing_catalog_aborts_the_scan() {
        let source = FakeSource::new(vec![Ok(three_item_batch())]);
        let handle = source.clone();
        let mut analyzer = MarketAnalyzer::new(source).with_catalog_path("/nope/items.json");

        let err = analyzer
            .run_black_market_analysis(&CancelToken::new(), |_| {})
            .unwrap_err();
        assert!(matches!(err, MarketError::CatalogUnavailable { .. }));
        assert_eq!(handle.remaining(), 1);
    }

    #[test]
    fn artifact_scan_averages_across_cities() {
        let mut first = rec("T4_RUNE", "Thetford", 100);
        first.buy_price_max = 80;
        let mut second = rec("T4_RUNE", "Martlock", 200);
        second.buy_price_max = 120;

        let source = FakeSource::new(vec![Ok(vec![first]), Ok(vec![second])]);
        let mut analyzer = MarketAnalyzer::new(source);

        let report = analyzer
            .run_artifact_scan(&CancelToken::new(), |_| {})
            .unwrap();
        assert_eq!(report.cities.len(), 2);
        assert!(report.city("Thetford").is_some());

        let averages = report.averages();
        assert_eq!(averages.len(), 1);
        assert_eq!(averages[0].item_id, "T4_RUNE");
        assert!((averages[0].sell_price_min - 150.0).abs() < f64::EPSILON);
        assert!((averages[0].buy_price_max - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn cache_invalidates_per_kind() {
        let mut cache = AnalysisCache::default();
        cache.store_arbitrage(vec![]);
        cache.store_black_market(vec![]);
        assert!(cache.arbitrage().is_some());
        assert!(cache.black_market().is_some());

        cache.invalidate(AnalysisKind::Arbitrage);
        assert!(cache.arbitrage().is_none());
        assert!(cache.black_market().is_some());
    }
}
