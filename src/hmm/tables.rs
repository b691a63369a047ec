use crate::hmm::emission::EmissionTable;
use crate::hmm::transition::GapParams;
use crate::model::genetic_map::MarkerMap;
use crate::model::params::ModelParams;
use crate::model::window::Window;

/// Per-window precomputation: the emission table (constant across the
/// window) and one `GapParams` per inter-marker gap inside the window's
/// analysis range. Rebuilt once per EM iteration per window, per spec
/// §4.3's stated memory budget.
pub struct WindowTables {
    pub emission: EmissionTable,
    pub gaps: Vec<GapParams>,
}

impl WindowTables {
    pub fn build(params: &ModelParams, map: &MarkerMap, window: &Window) -> WindowTables {
        let emission = EmissionTable::new(params);
        let gaps = (window.analysis.start..window.analysis.end.saturating_sub(1))
            .map(|i| GapParams::new(params, map.distance(i)))
            .collect();
        WindowTables { emission, gaps }
    }
}
