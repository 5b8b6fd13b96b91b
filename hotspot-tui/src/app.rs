use hotspot_core::Kpi;
use hotspot_core::storage::MunicipalityFeature;

use crate::data::DashboardData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screen {
    GranularitySelect,
    KpiSelect,
    MapView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Granularity {
    Municipality,
    Gps,
}

impl Granularity {
    pub(crate) const ALL: [Self; 2] = [Self::Municipality, Self::Gps];

    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Municipality => "by Municipality",
            Self::Gps => "by GPS",
        }
    }
}

pub(crate) struct App {
    pub data: DashboardData,

    pub screen: Screen,
    pub granularity_index: usize,
    pub granularity: Granularity,
    pub kpi_index: usize,
    pub kpi: Kpi,

    /// Position in the ranking of the map view.
    pub ranking_index: usize,
    pub show_all_kpis: bool,
    /// Draw establishment dots over the density grid.
    pub show_establishments: bool,

    pub error_message: Option<String>,
}

impl App {
    pub(crate) fn new(data: DashboardData) -> Self {
        Self {
            data,
            screen: Screen::GranularitySelect,
            granularity_index: 0,
            granularity: Granularity::Municipality,
            kpi_index: 0,
            kpi: Kpi::Density,
            ranking_index: 0,
            show_all_kpis: false,
            show_establishments: false,
            error_message: None,
        }
    }

    pub(crate) fn select_current_granularity(&mut self) {
        let Some(granularity) = Granularity::ALL.get(self.granularity_index) else {
            return;
        };
        self.granularity = *granularity;
        self.error_message = None;
        match granularity {
            Granularity::Municipality => self.screen = Screen::KpiSelect,
            Granularity::Gps if self.data.grid.is_none() => {
                self.error_message =
                    Some("No density grid found, run prepare-data first".to_owned());
            }
            Granularity::Gps => self.screen = Screen::MapView,
        }
    }

    pub(crate) fn select_current_kpi(&mut self) {
        if let Some(kpi) = Kpi::ALL.get(self.kpi_index) {
            self.kpi = *kpi;
            self.ranking_index = 0;
            self.screen = Screen::MapView;
        }
    }

    /// Feature indices ordered by the selected KPI, highest first; missing values last.
    pub(crate) fn ranking(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.data.features.len()).collect();
        let value = |idx: &usize| {
            self.data
                .features
                .get(*idx)
                .and_then(|feature| self.kpi.value(&feature.metric))
        };
        order.sort_by(|left, right| match (value(left), value(right)) {
            (Some(left), Some(right)) => right.total_cmp(&left),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        order
    }

    pub(crate) fn selected_feature(&self) -> Option<(usize, &MunicipalityFeature)> {
        let idx = *self.ranking().get(self.ranking_index)?;
        self.data.features.get(idx).map(|feature| (idx, feature))
    }

    /// Flip the overlay of the current map view.
    pub(crate) fn toggle_overlay(&mut self) {
        match self.granularity {
            Granularity::Municipality => self.show_all_kpis = !self.show_all_kpis,
            Granularity::Gps => self.show_establishments = !self.show_establishments,
        }
    }

    pub(crate) fn replace_data(&mut self, data: DashboardData) {
        self.data = data;
        self.ranking_index = 0;
        if self.granularity == Granularity::Gps && self.data.grid.is_none() {
            self.screen = Screen::GranularitySelect;
        }
    }
}
