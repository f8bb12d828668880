//! Dashboard aggregation: summary statistics and chart series for one address.
//!
//! A pass fetches the address's year archives, flattens the service (or meter
//! reading) documents of the selected years into one list, filters it by
//! service and month, and reduces it into per-item totals, per-month totals
//! and a grand total. Stats and chart payloads are derived from those three
//! accumulators.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::month::{Month, MonthFilter, MONTHS};
use crate::models::reading::MeterReadingRecord;
use crate::models::utility::UtilityServiceRecord;
use crate::models::year::sorted_year_ids;
use crate::store::UtilityStore;

/// Pie charts with more items than this collapse their tail into "Others".
pub const PIE_COLLAPSE_THRESHOLD: usize = 10;

/// Items kept individually when the pie chart is collapsed.
pub const PIE_TOP_ITEMS: usize = 8;

/// Id of the synthetic "Others" pie slice.
pub const OTHERS_ID: usize = 999;

/// Which record shape drives the dashboard: payments or meter readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DashboardType {
    #[default]
    Expenses,
    Readings,
}

/// `"all"` or one concrete value (a year id, a service name or record id).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    All,
    Only(String),
}

impl Selection {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") | Some("all") => Selection::All,
            Some(value) => Selection::Only(value.to_string()),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }
}

/// One dashboard request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardQuery {
    pub address_id: String,
    pub dashboard_type: DashboardType,
    pub year: Selection,
    pub service: Selection,
    pub month: MonthFilter,
}

/// Raw query-string form of [`DashboardQuery`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardParams {
    pub address: Option<String>,
    #[serde(rename = "type")]
    pub dashboard_type: Option<DashboardType>,
    pub year: Option<String>,
    pub service: Option<String>,
    pub month: Option<String>,
}

impl TryFrom<DashboardParams> for DashboardQuery {
    type Error = AppError;

    fn try_from(params: DashboardParams) -> Result<Self, Self::Error> {
        let month = match params.month.as_deref().map(str::trim) {
            None | Some("") => MonthFilter::All,
            Some(raw) => {
                MonthFilter::from_str(raw).map_err(|e| AppError::Validation(e.to_string()))?
            }
        };
        Ok(Self {
            address_id: params.address.unwrap_or_default().trim().to_string(),
            dashboard_type: params.dashboard_type.unwrap_or_default(),
            year: Selection::parse(params.year.as_deref()),
            service: Selection::parse(params.service.as_deref()),
            month,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardStats {
    /// Same as `filtered`; there is no separate unfiltered grand total.
    pub total: f64,
    pub filtered: f64,
    pub avg_monthly: f64,
    pub last_month: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PieSlice {
    pub id: usize,
    pub value: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarEntry {
    pub category: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartData {
    pub line_data: Vec<f64>,
    pub pie_data: Vec<PieSlice>,
    pub bar_data: Vec<BarEntry>,
    pub monthly_trend: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardData {
    pub stats: DashboardStats,
    pub chart_data: ChartData,
    pub available_years: Vec<String>,
    pub available_services: Vec<String>,
    pub loading: bool,
}

/// Presentation knobs that come from configuration.
#[derive(Debug, Clone)]
pub struct DashboardSettings {
    pub others_label: String,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            others_label: "Others".to_string(),
        }
    }
}

/// A service or meter record flattened to what aggregation needs.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardItem {
    pub id: Option<String>,
    pub name: String,
    pub label: String,
    pub values: Vec<(Month, f64)>,
}

impl DashboardItem {
    fn matches(&self, selection: &Selection) -> bool {
        match selection {
            Selection::All => true,
            Selection::Only(s) => self.name == *s || self.id.as_deref() == Some(s.as_str()),
        }
    }
}

impl From<UtilityServiceRecord> for DashboardItem {
    fn from(r: UtilityServiceRecord) -> Self {
        Self {
            values: r
                .monthly_payments
                .iter()
                .map(|(m, p)| (*m, p.amount))
                .collect(),
            label: r.name.clone(),
            id: r.id,
            name: r.name,
        }
    }
}

impl From<MeterReadingRecord> for DashboardItem {
    fn from(r: MeterReadingRecord) -> Self {
        Self {
            values: r
                .monthly_readings
                .iter()
                .map(|(m, v)| (*m, v.value))
                .collect(),
            label: r.display_name(),
            id: r.id,
            name: r.name,
        }
    }
}

/// Reduce a flat item list into stats and chart series.
///
/// `year_divisor` is the number of years folded into `items` (clamped to 1).
pub fn aggregate(
    items: &[DashboardItem],
    service: &Selection,
    month: MonthFilter,
    year_divisor: usize,
    settings: &DashboardSettings,
) -> (DashboardStats, ChartData) {
    let divisor = year_divisor.max(1) as f64;

    let mut filtered_total = 0.0;
    let mut monthly = [0.0_f64; 12];
    // First-seen order of item labels.
    let mut item_totals: Vec<(String, f64)> = Vec::new();
    let mut item_index: HashMap<String, usize> = HashMap::new();

    for item in items.iter().filter(|i| i.matches(service)) {
        let slot = *item_index.entry(item.label.clone()).or_insert_with(|| {
            item_totals.push((item.label.clone(), 0.0));
            item_totals.len() - 1
        });

        for (m, value) in item.values.iter().filter(|(m, _)| month.matches(*m)) {
            filtered_total += value;
            item_totals[slot].1 += value;
            monthly[m.index()] += value;
        }
    }

    let active: Vec<usize> = (0..12).filter(|i| monthly[*i] > 0.0).collect();
    let avg_monthly = if active.is_empty() {
        0.0
    } else {
        filtered_total / (active.len() as f64 * divisor)
    };
    let last_month = active.last().map_or(0.0, |i| monthly[*i]);

    let stats = DashboardStats {
        total: filtered_total,
        filtered: filtered_total,
        avg_monthly,
        last_month,
    };

    let charts = ChartData {
        line_data: monthly.iter().map(|v| v / divisor).collect(),
        pie_data: pie_slices(&item_totals, &settings.others_label),
        bar_data: item_totals
            .iter()
            .map(|(category, value)| BarEntry {
                category: category.clone(),
                value: *value,
            })
            .collect(),
        monthly_trend: monthly.to_vec(),
    };

    (stats, charts)
}

/// Pie slices sorted by value descending; long tails collapse into one "Others" slice.
fn pie_slices(item_totals: &[(String, f64)], others_label: &str) -> Vec<PieSlice> {
    let mut slices: Vec<PieSlice> = item_totals
        .iter()
        .enumerate()
        .map(|(id, (label, value))| PieSlice {
            id,
            value: *value,
            label: label.clone(),
        })
        .collect();
    slices.sort_by(|a, b| b.value.total_cmp(&a.value));

    if slices.len() <= PIE_COLLAPSE_THRESHOLD {
        return slices;
    }

    let rest = slices.split_off(PIE_TOP_ITEMS);
    slices.push(PieSlice {
        id: OTHERS_ID,
        value: rest.iter().map(|s| s.value).sum(),
        label: others_label.to_string(),
    });
    slices
}

async fn fetch_items(
    store: &dyn UtilityStore,
    dashboard_type: DashboardType,
    address_id: &str,
    year_id: &str,
) -> Result<Vec<DashboardItem>, AppError> {
    Ok(match dashboard_type {
        DashboardType::Expenses => store
            .list_service_records(address_id, year_id)
            .await?
            .into_iter()
            .map(DashboardItem::from)
            .collect(),
        DashboardType::Readings => store
            .list_reading_records(address_id, year_id)
            .await?
            .into_iter()
            .map(DashboardItem::from)
            .collect(),
    })
}

fn distinct_names(items: &[DashboardItem]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for item in items {
        if !names.contains(&item.name) {
            names.push(item.name.clone());
        }
    }
    names
}

/// Run one full aggregation pass against the store.
///
/// An empty address yields zeroed output without touching the store. Any fetch
/// failure aborts the whole pass.
pub async fn load(
    store: &dyn UtilityStore,
    query: &DashboardQuery,
    settings: &DashboardSettings,
) -> Result<DashboardData, AppError> {
    if query.address_id.is_empty() {
        return Ok(DashboardData::default());
    }
    let address_id = query.address_id.as_str();

    let years = store.list_years(address_id).await?;
    let available_years = sorted_year_ids(&years);

    let (target_years, year_divisor) = match &query.year {
        Selection::All => (available_years.clone(), available_years.len()),
        Selection::Only(year_id) => (vec![year_id.clone()], 1),
    };

    // Filter options always come from the most recent year.
    let available_services = match available_years.first() {
        Some(latest) => distinct_names(
            &fetch_items(store, query.dashboard_type, address_id, latest).await?,
        ),
        None => Vec::new(),
    };

    let per_year = try_join_all(
        target_years
            .iter()
            .map(|year_id| fetch_items(store, query.dashboard_type, address_id, year_id)),
    )
    .await?;
    let items: Vec<DashboardItem> = per_year.into_iter().flatten().collect();

    tracing::debug!(
        address_id,
        years = target_years.len(),
        items = items.len(),
        "Aggregating dashboard"
    );

    let (stats, chart_data) = aggregate(
        &items,
        &query.service,
        query.month,
        year_divisor,
        settings,
    );

    Ok(DashboardData {
        stats,
        chart_data,
        available_years,
        available_services,
        loading: false,
    })
}

/// What happened to the result of a [`DashboardSession::refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The result replaced the session's data.
    Published,
    /// A newer refresh started meanwhile; the result was discarded.
    Superseded,
    /// The pass failed; the previous data was kept.
    Failed,
}

/// Long-lived dashboard view state with last-write-wins semantics.
///
/// Every refresh takes a new generation number; only the refresh holding the
/// newest generation may publish, so a slow stale pass never overwrites a
/// newer one.
pub struct DashboardSession {
    store: Arc<dyn UtilityStore>,
    settings: DashboardSettings,
    generation: AtomicU64,
    current: RwLock<DashboardData>,
}

impl DashboardSession {
    pub fn new(store: Arc<dyn UtilityStore>, settings: DashboardSettings) -> Self {
        Self {
            store,
            settings,
            generation: AtomicU64::new(0),
            current: RwLock::new(DashboardData::default()),
        }
    }

    /// Current view state.
    pub fn snapshot(&self) -> DashboardData {
        match self.current.read() {
            Ok(data) => data.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn update(&self, f: impl FnOnce(&mut DashboardData)) {
        match self.current.write() {
            Ok(mut data) => f(&mut data),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    pub async fn refresh(&self, query: &DashboardQuery) -> RefreshOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.update(|d| d.loading = true);

        let result = load(self.store.as_ref(), query, &self.settings).await;

        if !self.is_current(generation) {
            tracing::debug!(generation, "Discarding superseded dashboard result");
            return RefreshOutcome::Superseded;
        }

        match result {
            Ok(data) => {
                self.update(|d| *d = data);
                RefreshOutcome::Published
            }
            Err(e) => {
                tracing::error!(error = %e, address_id = %query.address_id, "Dashboard data fetch error");
                self.update(|d| d.loading = false);
                RefreshOutcome::Failed
            }
        }
    }
}
