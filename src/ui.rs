use crate::analyzer::{
    AnalysisCache, AnalysisKind, BlackMarketMargin, CancelToken, MarketAnalyzer, ScanProgress,
};
use crate::batch::BatchUrlBuilder;
use crate::catalog::load_catalog;
use crate::config::{
    BASE_URL, BATCH_SIZE, CATALOG_PATH, CITIES, ENCHANT_MAX, ENCHANT_MIN, MAX_URL_LENGTH,
    RESOURCE_TYPES, TIER_MAX, TIER_MIN,
};
use crate::fetcher::{PriceFetcher, PriceSource};
use crate::model::{DateFilter, Opportunity, PriceRecord};
use eframe::egui;
use egui::{
    Color32, Context, FontFamily, FontId, Margin, RichText, Visuals, Stroke
};
use egui_extras::{Column, TableBuilder};
use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver};
use std::thread;

pub fn set_custom_style(ctx: &Context) {
    // Albion marketplace dark slate-and-silver theme
    let mut visuals = Visuals::dark();

    visuals.panel_fill = Color32::from_rgb(15, 18, 24);           // Deep slate panel
    visuals.window_fill = Color32::from_rgb(22, 26, 34);          // Window background
    visuals.extreme_bg_color = Color32::from_rgb(34, 40, 52);     // hover highlight
    visuals.faint_bg_color = Color32::from_rgb(28, 33, 43);       // subtle background

    // Widget colors with silver accents
    visuals.widgets.inactive.bg_fill = Color32::from_rgb(40, 46, 58);
    visuals.widgets.inactive.bg_stroke = Stroke::new(1.0, Color32::from_rgb(70, 80, 100));

    visuals.widgets.hovered.bg_fill  = Color32::from_rgb(55, 64, 80);
    visuals.widgets.hovered.bg_stroke = Stroke::new(2.0, Color32::from_rgb(140, 165, 200));

    visuals.widgets.active.bg_fill   = Color32::from_rgb(70, 82, 104);
    visuals.widgets.active.bg_stroke = Stroke::new(2.0, Color32::from_rgb(190, 215, 255));

    // Selection colors
    visuals.selection.bg_fill = Color32::from_rgb(60, 75, 100);
    visuals.selection.stroke = Stroke::new(1.0, Color32::from_rgb(200, 220, 255));

    ctx.set_visuals(visuals);

    let mut style = (*ctx.style()).clone();

    style.spacing.item_spacing = egui::vec2(8.0, 6.0);
    style.spacing.window_margin = Margin::same(12);
    style.spacing.button_padding = egui::vec2(12.0, 8.0);
    style.spacing.indent = 16.0;

    style.text_styles.insert(
        egui::TextStyle::Body,
        FontId::new(15.0, FontFamily::Proportional),
    );
    style.text_styles.insert(
        egui::TextStyle::Heading,
        FontId::new(22.0, FontFamily::Proportional),
    );
    style.text_styles.insert(
        egui::TextStyle::Button,
        FontId::new(15.0, FontFamily::Proportional),
    );
    style.text_styles.insert(
        egui::TextStyle::Monospace,
        FontId::new(14.0, FontFamily::Monospace),
    );

    ctx.set_style(style);
}

const HEADER_GOLD: Color32 = Color32::from_rgb(230, 200, 120);
const TEXT_DIM: Color32 = Color32::from_rgb(170, 180, 195);

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tab {
    Overview,
    Arbitrage,
    BlackMarket,
    Artifacts,
}

#[derive(Clone)]
struct Row {
    item_id: String,
    name: String,
    buy_city: String,
    buy_price: u64,
    sell_city: String,
    sell_price: u64,
    profit: u64,
    updated: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SortBy {
    Profit,
    Item,
    BuyPrice,
    SellPrice,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SortOrder {
    Ascending,
    Descending,
}

enum ScanEvent {
    Progress(ScanProgress),
    Opportunities(AnalysisKind, Vec<Opportunity>),
    Artifacts(crate::analyzer::ArtifactReport),
    Failed(String),
}

pub struct MarketApp {
    tab: Tab,
    cache: AnalysisCache,
    item_names: HashMap<String, String>,
    fetcher: PriceFetcher,
    builder: BatchUrlBuilder,

    // Background scan wiring
    scan_rx: Option<Receiver<ScanEvent>>,
    cancel: Option<CancelToken>,
    running: Option<AnalysisKind>,
    progress: Option<ScanProgress>,
    status: String,

    // Opportunity table state
    search: String,
    min_profit: f64,
    sort_by: SortBy,
    sort_order: SortOrder,
    rows: Vec<Row>,

    // Market overview state
    resource_idx: usize,
    tier: u8,
    enchant: u8,
    overview: Vec<PriceRecord>,
    overview_item: String,

    // Artifact foundry state
    artifact_city: String,

    // Black market scan policy, applied on the next scan
    bm_break_even: bool,
}

impl MarketApp {
    pub fn new() -> Self {
        // Display names come from the static catalog when it is present;
        // scans that do not need it keep working without one.
        let item_names = match load_catalog(CATALOG_PATH) {
            Ok(entries) => entries
                .iter()
                .map(|e| (e.unique_name.clone(), e.display_name().to_string()))
                .collect(),
            Err(_) => HashMap::new(),
        };

        Self {
            tab: Tab::Overview,
            cache: AnalysisCache::default(),
            item_names,
            fetcher: PriceFetcher::new(),
            builder: BatchUrlBuilder::new(BASE_URL, &CITIES, MAX_URL_LENGTH, BATCH_SIZE),

            scan_rx: None,
            cancel: None,
            running: None,
            progress: None,
            status: String::new(),

            search: "".into(),
            min_profit: 0.0,
            sort_by: SortBy::Profit,
            sort_order: SortOrder::Descending,
            rows: vec![],

            resource_idx: 0,
            tier: TIER_MIN,
            enchant: ENCHANT_MIN,
            overview: vec![],
            overview_item: String::new(),

            artifact_city: "Average".into(),

            bm_break_even: false,
        }
    }

    fn display_name(&self, item_id: &str) -> String {
        self.item_names
            .get(item_id)
            .cloned()
            .unwrap_or_else(|| item_id.to_string())
    }

    fn start_scan(&mut self, kind: AnalysisKind) {
        if self.scan_rx.is_some() {
            return;
        }

        let (tx, rx) = channel();
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let margin = if self.bm_break_even {
            BlackMarketMargin::BreakEven
        } else {
            BlackMarketMargin::StrictlyPositive
        };

        thread::spawn(move || {
            let mut analyzer = MarketAnalyzer::new(PriceFetcher::new()).with_margin(margin);
            let progress_tx = tx.clone();
            let mut on_progress = move |p: ScanProgress| {
                let _ = progress_tx.send(ScanEvent::Progress(p));
            };

            let event = match kind {
                AnalysisKind::Arbitrage => analyzer
                    .run_arbitrage_analysis(&worker_cancel, &mut on_progress)
                    .map(|ops| ScanEvent::Opportunities(kind, ops)),
                AnalysisKind::BlackMarket => analyzer
                    .run_black_market_analysis(&worker_cancel, &mut on_progress)
                    .map(|ops| ScanEvent::Opportunities(kind, ops)),
                AnalysisKind::Artifacts => analyzer
                    .run_artifact_scan(&worker_cancel, &mut on_progress)
                    .map(ScanEvent::Artifacts),
            };

            let _ = tx.send(event.unwrap_or_else(|e| ScanEvent::Failed(e.to_string())));
        });

        self.cache.invalidate(kind);
        self.scan_rx = Some(rx);
        self.cancel = Some(cancel);
        self.running = Some(kind);
        self.progress = None;
        self.status = "Scanning...".into();
    }

    fn poll_scan(&mut self) {
        let Some(rx) = self.scan_rx.take() else { return };

        let mut finished = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                ScanEvent::Progress(p) => self.progress = Some(p),
                ScanEvent::Opportunities(kind, ops) => {
                    self.status = format!("{} opportunities found", ops.len());
                    match kind {
                        AnalysisKind::Arbitrage => self.cache.store_arbitrage(ops),
                        AnalysisKind::BlackMarket => self.cache.store_black_market(ops),
                        AnalysisKind::Artifacts => {}
                    }
                    finished = true;
                }
                ScanEvent::Artifacts(report) => {
                    self.status = format!("{} cities reported", report.cities.len());
                    self.cache.store_artifacts(report);
                    finished = true;
                }
                ScanEvent::Failed(msg) => {
                    self.status = format!("Scan failed: {}", msg);
                    finished = true;
                }
            }
        }

        if finished {
            self.cancel = None;
            self.running = None;
            self.progress = None;
            self.apply_filters();
        } else {
            self.scan_rx = Some(rx);
        }
    }

    fn active_opportunities(&self) -> Option<&[Opportunity]> {
        match self.tab {
            Tab::Arbitrage => self.cache.arbitrage(),
            Tab::BlackMarket => self.cache.black_market(),
            _ => None,
        }
    }

    fn apply_filters(&mut self) {
        let Some(ops) = self.active_opportunities() else {
            self.rows = vec![];
            return;
        };

        let mut rows: Vec<Row> = ops
            .iter()
            .map(|op| Row {
                item_id: op.item_id.clone(),
                name: self.display_name(&op.item_id),
                buy_city: op.buy_city.clone(),
                buy_price: op.buy_price,
                sell_city: op.sell_city.clone(),
                sell_price: op.sell_price,
                profit: op.profit,
                updated: short_date(&op.sell_price_date),
            })
            .collect();

        if !self.search.is_empty() {
            let needle = self.search.to_lowercase();
            rows.retain(|r| {
                r.name.to_lowercase().contains(&needle)
                    || r.item_id.to_lowercase().contains(&needle)
            });
        }

        if self.min_profit > 0.0 {
            rows.retain(|r| r.profit as f64 >= self.min_profit);
        }

        match self.sort_by {
            SortBy::Profit => rows.sort_by(|a, b| {
                if self.sort_order == SortOrder::Descending {
                    b.profit.cmp(&a.profit)
                } else {
                    a.profit.cmp(&b.profit)
                }
            }),
            SortBy::Item => rows.sort_by(|a, b| {
                if self.sort_order == SortOrder::Descending {
                    b.name.cmp(&a.name)
                } else {
                    a.name.cmp(&b.name)
                }
            }),
            SortBy::BuyPrice => rows.sort_by(|a, b| {
                if self.sort_order == SortOrder::Descending {
                    b.buy_price.cmp(&a.buy_price)
                } else {
                    a.buy_price.cmp(&b.buy_price)
                }
            }),
            SortBy::SellPrice => rows.sort_by(|a, b| {
                if self.sort_order == SortOrder::Descending {
                    b.sell_price.cmp(&a.sell_price)
                } else {
                    a.sell_price.cmp(&b.sell_price)
                }
            }),
        }

        self.rows = rows;
    }

    fn fetch_overview(&mut self) {
        let resource = RESOURCE_TYPES[self.resource_idx];
        let item = crate::catalog::item_id(resource, self.tier, self.enchant);
        let url = self.builder.url_for(&[item.clone()]);

        match self.fetcher.fetch(&url, DateFilter::Strict) {
            Ok(records) => {
                self.status = if records.is_empty() {
                    format!("No price data for {}", item)
                } else {
                    format!("{} cities reporting {}", records.len(), item)
                };
                self.overview = records;
                self.overview_item = item;
            }
            Err(e) => {
                self.status = format!("Fetch failed: {}", e);
                self.overview = vec![];
                self.overview_item = item;
            }
        }
    }

    fn scan_kind_for_tab(&self) -> Option<AnalysisKind> {
        match self.tab {
            Tab::Overview => None,
            Tab::Arbitrage => Some(AnalysisKind::Arbitrage),
            Tab::BlackMarket => Some(AnalysisKind::BlackMarket),
            Tab::Artifacts => Some(AnalysisKind::Artifacts),
        }
    }

    fn top_bar(&mut self, ui: &mut egui::Ui) {
        ui.add_space(4.0);

        ui.horizontal(|ui| {
            ui.heading(RichText::new("📦 Albion Online Market Scanner")
                .color(HEADER_GOLD)
                .strong()
                .size(24.0)
            );
        });

        ui.add_space(4.0);
        ui.separator();
        ui.add_space(4.0);

        ui.horizontal(|ui| {
            let tabs = [
                (Tab::Overview, "📊 Market Overview"),
                (Tab::Arbitrage, "💸 Resource Arbitrage"),
                (Tab::BlackMarket, "🏴 Black Market Flips"),
                (Tab::Artifacts, "🔨 Artifact Foundry"),
            ];
            for (tab, label) in tabs {
                if ui.selectable_label(self.tab == tab, label).clicked() {
                    self.tab = tab;
                    self.apply_filters();
                }
            }

            ui.separator();

            if let Some(kind) = self.scan_kind_for_tab() {
                let idle = self.scan_rx.is_none();
                let label = match kind {
                    AnalysisKind::Arbitrage => "🔍 Scan Arbitrage",
                    AnalysisKind::BlackMarket => "🔍 Scan Black Market",
                    AnalysisKind::Artifacts => "🔍 Fetch Artifacts",
                };
                if ui.add_enabled(
                    idle,
                    egui::Button::new(RichText::new(label).color(HEADER_GOLD).strong()),
                )
                .clicked()
                {
                    self.start_scan(kind);
                }

                if self.running == Some(kind) {
                    if let Some(cancel) = &self.cancel {
                        if ui.button(RichText::new("✋ Cancel")
                            .color(Color32::from_rgb(255, 150, 150)))
                            .clicked()
                        {
                            cancel.cancel();
                        }
                    }
                    let fraction = self
                        .progress
                        .map(|p| p.done as f32 / p.total.max(1) as f32)
                        .unwrap_or(0.0);
                    ui.add(egui::ProgressBar::new(fraction)
                        .desired_width(160.0)
                        .show_percentage());
                }
            }

            if matches!(self.tab, Tab::Arbitrage | Tab::BlackMarket) {
                ui.separator();
                ui.label(RichText::new("🔎").color(TEXT_DIM));
                let response = ui.add(
                    egui::TextEdit::singleline(&mut self.search)
                        .hint_text("Search items...")
                        .desired_width(200.0)
                );
                if response.changed() {
                    self.apply_filters();
                }
            }
        });

        if !self.status.is_empty() {
            ui.add_space(2.0);
            ui.label(RichText::new(&self.status).color(TEXT_DIM).italics());
        }

        ui.add_space(2.0);
    }

    fn filter_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading(RichText::new("⚡ Filters & Settings").color(HEADER_GOLD));
        ui.separator();

        egui::ScrollArea::vertical().show(ui, |ui| {
            ui.label(RichText::new("💎 Min Profit").strong());
            let mut min_profit_k = self.min_profit / 1_000.0;
            if ui.add(egui::Slider::new(&mut min_profit_k, 0.0..=500.0)
                .suffix(" K")
                .step_by(1.0))
                .changed()
            {
                self.min_profit = min_profit_k * 1_000.0;
                self.apply_filters();
            }

            ui.add_space(10.0);
            ui.separator();

            ui.label(RichText::new("📊 Sort By").strong());

            egui::ComboBox::from_id_salt("sort_by")
                .selected_text(format!("{:?}", self.sort_by))
                .show_ui(ui, |ui| {
                    let sorts = [
                        SortBy::Profit,
                        SortBy::Item,
                        SortBy::BuyPrice,
                        SortBy::SellPrice,
                    ];
                    for sort in sorts {
                        if ui.selectable_value(&mut self.sort_by, sort, format!("{:?}", sort)).clicked() {
                            self.apply_filters();
                        }
                    }
                });

            ui.horizontal(|ui| {
                if ui.selectable_value(&mut self.sort_order, SortOrder::Descending, "⬇ Desc")
                    .clicked()
                {
                    self.apply_filters();
                }
                if ui.selectable_value(&mut self.sort_order, SortOrder::Ascending, "⬆ Asc")
                    .clicked()
                {
                    self.apply_filters();
                }
            });

            if self.tab == Tab::BlackMarket {
                ui.add_space(10.0);
                ui.separator();
                ui.checkbox(&mut self.bm_break_even, "Accept break-even flips")
                    .on_hover_text("Takes effect on the next scan");
            }

            ui.add_space(10.0);
            ui.separator();

            if ui.button(RichText::new("🔄 Reset Filters")
                .color(Color32::from_rgb(255, 150, 150)))
                .clicked()
            {
                self.search.clear();
                self.min_profit = 0.0;
                self.sort_by = SortBy::Profit;
                self.sort_order = SortOrder::Descending;
                self.apply_filters();
            }
        });
    }

    fn empty_state(ui: &mut egui::Ui, icon: &str, title: &str, hint: &str) {
        ui.centered_and_justified(|ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(100.0);
                ui.label(RichText::new(icon).size(80.0).color(HEADER_GOLD));
                ui.add_space(20.0);
                ui.label(RichText::new(title).size(24.0).color(TEXT_DIM));
                ui.add_space(10.0);
                ui.label(RichText::new(hint).color(TEXT_DIM));
            });
        });
    }

    fn overview_tab(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            egui::ComboBox::from_label("Resource")
                .selected_text(RESOURCE_TYPES[self.resource_idx])
                .show_ui(ui, |ui| {
                    for (i, res) in RESOURCE_TYPES.iter().enumerate() {
                        ui.selectable_value(&mut self.resource_idx, i, *res);
                    }
                });

            egui::ComboBox::from_label("Tier")
                .selected_text(format!("T{}", self.tier))
                .show_ui(ui, |ui| {
                    for t in TIER_MIN..=TIER_MAX {
                        ui.selectable_value(&mut self.tier, t, format!("T{}", t));
                    }
                });

            egui::ComboBox::from_label("Enchantment")
                .selected_text(format!("{}", self.enchant))
                .show_ui(ui, |ui| {
                    for e in ENCHANT_MIN..=ENCHANT_MAX {
                        ui.selectable_value(&mut self.enchant, e, format!("{}", e));
                    }
                });

            if ui.button(RichText::new("📥 Fetch Prices").color(HEADER_GOLD)).clicked() {
                self.fetch_overview();
            }
        });

        ui.add_space(6.0);

        if self.overview.is_empty() {
            Self::empty_state(
                ui,
                "📊",
                "Pick an item and fetch its prices",
                "Per-city order book extremes for one item",
            );
            return;
        }

        ui.label(RichText::new(format!("Prices for {}", self.overview_item))
            .color(HEADER_GOLD)
            .strong());
        ui.add_space(4.0);

        let records = self.overview.clone();
        TableBuilder::new(ui)
            .striped(true)
            .vscroll(true)
            .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
            .column(Column::remainder().at_least(140.0))  // City
            .column(Column::exact(110.0))  // Sell min
            .column(Column::exact(110.0))  // Sell max
            .column(Column::exact(110.0))  // Buy min
            .column(Column::exact(110.0))  // Buy max
            .column(Column::exact(150.0))  // Updated
            .header(32.0, |mut header| {
                for title in ["City", "Sell Min", "Sell Max", "Buy Min", "Buy Max", "Updated"] {
                    header.col(|ui| {
                        ui.heading(RichText::new(title).color(TEXT_DIM));
                    });
                }
            })
            .body(|body| {
                body.rows(32.0, records.len(), |mut row| {
                    let r = &records[row.index()];
                    row.col(|ui| { ui.label(&r.city); });
                    row.col(|ui| {
                        ui.label(RichText::new(format_silver(r.sell_price_min as f64))
                            .color(Color32::from_rgb(150, 255, 150)));
                    });
                    row.col(|ui| { ui.label(format_silver(r.sell_price_max as f64)); });
                    row.col(|ui| { ui.label(format_silver(r.buy_price_min as f64)); });
                    row.col(|ui| {
                        ui.label(RichText::new(format_silver(r.buy_price_max as f64))
                            .color(Color32::from_rgb(255, 200, 120)));
                    });
                    row.col(|ui| {
                        ui.label(RichText::new(short_date(&r.sell_price_min_date))
                            .color(TEXT_DIM));
                    });
                });
            });
    }

    fn opportunity_tab(&mut self, ui: &mut egui::Ui) {
        if self.active_opportunities().is_none() {
            let (title, hint) = match self.tab {
                Tab::BlackMarket => (
                    "Scan the Black Market",
                    "Finds city listings the Black Market buys for more",
                ),
                _ => (
                    "Scan for arbitrage",
                    "Finds resources cheaper in one city than another",
                ),
            };
            Self::empty_state(ui, "💰", title, hint);
            return;
        }

        if self.rows.is_empty() {
            Self::empty_state(
                ui,
                "🔍",
                "No opportunities match your filters",
                "Try adjusting your search or filter settings",
            );
            return;
        }

        ui.style_mut().visuals.extreme_bg_color = Color32::from_rgb(34, 40, 52);

        let rows = self.rows.clone();
        TableBuilder::new(ui)
            .striped(true)
            .vscroll(true)
            .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
            .column(Column::remainder().at_least(180.0).clip(true))  // Item
            .column(Column::exact(120.0))  // Buy city
            .column(Column::exact(110.0))  // Buy price
            .column(Column::exact(120.0))  // Sell city
            .column(Column::exact(110.0))  // Sell price
            .column(Column::exact(110.0))  // Profit
            .column(Column::exact(140.0))  // Updated
            .column(Column::exact(50.0))   // Copy button
            .header(32.0, |mut header| {
                let titles = [
                    "Item", "Buy In", "Buy Price", "Sell In", "Sell Price",
                    "Profit", "Updated", "📋",
                ];
                for title in titles {
                    header.col(|ui| {
                        ui.heading(RichText::new(title).color(TEXT_DIM));
                    });
                }
            })
            .body(|body| {
                body.rows(36.0, rows.len(), |mut row| {
                    let r = &rows[row.index()];

                    row.col(|ui| {
                        ui.label(RichText::new(&r.name))
                            .on_hover_text(r.item_id.as_str());
                    });
                    row.col(|ui| {
                        ui.label(RichText::new(&r.buy_city)
                            .color(Color32::from_rgb(255, 150, 150)));
                    });
                    row.col(|ui| {
                        ui.label(format_silver(r.buy_price as f64));
                    });
                    row.col(|ui| {
                        ui.label(RichText::new(&r.sell_city)
                            .color(Color32::from_rgb(150, 255, 150)));
                    });
                    row.col(|ui| {
                        ui.label(format_silver(r.sell_price as f64));
                    });
                    row.col(|ui| {
                        let profit_color = if r.profit > 100_000 {
                            Color32::from_rgb(100, 255, 100)
                        } else if r.profit > 10_000 {
                            Color32::from_rgb(150, 255, 150)
                        } else {
                            Color32::from_rgb(200, 255, 200)
                        };
                        ui.label(RichText::new(format_silver(r.profit as f64))
                            .color(profit_color)
                            .strong());
                    });
                    row.col(|ui| {
                        ui.label(RichText::new(&r.updated).color(TEXT_DIM));
                    });
                    row.col(|ui| {
                        if ui.button("📋").on_hover_text("Copy flip details").clicked() {
                            let copy_text = format!(
                                "{}: buy in {} at {}, sell in {} at {} (+{})",
                                r.name,
                                r.buy_city,
                                format_silver(r.buy_price as f64),
                                r.sell_city,
                                format_silver(r.sell_price as f64),
                                format_silver(r.profit as f64),
                            );
                            ui.ctx().copy_text(copy_text);
                        }
                    });
                });
            });
    }

    fn artifacts_tab(&mut self, ui: &mut egui::Ui) {
        if self.cache.artifacts().is_none() {
            Self::empty_state(
                ui,
                "🔨",
                "Fetch artifact prices",
                "Rune, soul, relic and shard prices per city",
            );
            return;
        }

        ui.horizontal(|ui| {
            egui::ComboBox::from_label("City")
                .selected_text(self.artifact_city.clone())
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut self.artifact_city, "Average".to_string(), "Average");
                    for city in CITIES {
                        ui.selectable_value(&mut self.artifact_city, city.to_string(), city);
                    }
                });
        });
        ui.add_space(6.0);

        // (item, sell, buy) rows for the selected city, prices per bundle of 50.
        let rows: Vec<(String, String, f64, f64)> = {
            let report = match self.cache.artifacts() {
                Some(r) => r,
                None => return,
            };
            if self.artifact_city == "Average" {
                report
                    .averages()
                    .into_iter()
                    .map(|a| {
                        let name = self.display_name(&a.item_id);
                        (a.item_id, name, a.sell_price_min * 50.0, a.buy_price_max * 50.0)
                    })
                    .collect()
            } else {
                match report.city(&self.artifact_city) {
                    Some(city) => city
                        .records
                        .iter()
                        .map(|r| {
                            (
                                r.item_id.clone(),
                                self.display_name(&r.item_id),
                                r.sell_price_min as f64 * 50.0,
                                r.buy_price_max as f64 * 50.0,
                            )
                        })
                        .collect(),
                    None => vec![],
                }
            }
        };

        if rows.is_empty() {
            Self::empty_state(ui, "🔨", "No data for this city", "Try another city or refetch");
            return;
        }

        TableBuilder::new(ui)
            .striped(true)
            .vscroll(true)
            .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
            .column(Column::remainder().at_least(200.0).clip(true))  // Artifact
            .column(Column::exact(140.0))  // Sell order (50)
            .column(Column::exact(140.0))  // Buy order (50)
            .header(32.0, |mut header| {
                for title in ["Artifact", "Sell Order (50)", "Buy Order (50)"] {
                    header.col(|ui| {
                        ui.heading(RichText::new(title).color(TEXT_DIM));
                    });
                }
            })
            .body(|body| {
                body.rows(32.0, rows.len(), |mut row| {
                    let (item_id, name, sell, buy) = &rows[row.index()];
                    row.col(|ui| {
                        ui.label(RichText::new(name)).on_hover_text(item_id.as_str());
                    });
                    row.col(|ui| {
                        ui.label(RichText::new(format_silver(*sell))
                            .color(Color32::from_rgb(150, 255, 150)));
                    });
                    row.col(|ui| {
                        ui.label(RichText::new(format_silver(*buy))
                            .color(Color32::from_rgb(255, 200, 120)));
                    });
                });
            });
    }
}

impl eframe::App for MarketApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        self.poll_scan();

        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            self.top_bar(ui);
        });

        if matches!(self.tab, Tab::Arbitrage | Tab::BlackMarket)
            && self.active_opportunities().is_some()
        {
            egui::SidePanel::right("filters")
                .min_width(250.0)
                .max_width(350.0)
                .show(ctx, |ui| {
                    self.filter_panel(ui);
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            match self.tab {
                Tab::Overview => self.overview_tab(ui),
                Tab::Arbitrage | Tab::BlackMarket => self.opportunity_tab(ui),
                Tab::Artifacts => self.artifacts_tab(ui),
            }
        });

        ctx.request_repaint();
    }
}

/// "1234567" -> "1.23M" etc; prices are silver.
fn format_silver(value: f64) -> String {
    if value >= 1_000_000_000.0 {
        format!("{:.2}B", value / 1_000_000_000.0)
    } else if value >= 1_000_000.0 {
        format!("{:.2}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("{:.1}K", value / 1_000.0)
    } else {
        format!("{:.0}", value)
    }
}

/// Trims an API timestamp to a table-friendly "YYYY-MM-DD HH:MM".
fn short_date(date: &str) -> String {
    let trimmed: String = date.chars().take(16).collect();
    trimmed.replace('T', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silver_amounts_abbreviate() {
        assert_eq!(format_silver(950.0), "950");
        assert_eq!(format_silver(1_500.0), "1.5K");
        assert_eq!(format_silver(2_340_000.0), "2.34M");
        assert_eq!(format_silver(1_200_000_000.0), "1.20B");
    }

    #[test]
    fn dates_shorten_for_tables() {
        assert_eq!(short_date("2024-06-01T12:30:45"), "2024-06-01 12:30");
        assert_eq!(short_date("bad"), "bad");
    }
}
