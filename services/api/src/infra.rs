use admission::config::AdmissionsConfig;
use admission::workflows::admissions::{AcademicYear, CutoffError, CutoffTable};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Cutoff table from the configured CSV, or the built-in seed when none is set.
pub(crate) fn load_cutoffs(config: &AdmissionsConfig) -> Result<CutoffTable, CutoffError> {
    match &config.cutoffs_csv {
        Some(path) => {
            let table = CutoffTable::from_path(path)?;
            info!(path = %path.display(), entries = table.len(), "loaded cutoff table");
            Ok(table)
        }
        None => Ok(CutoffTable::seeded()),
    }
}

pub(crate) fn parse_academic_year(raw: &str) -> Result<AcademicYear, String> {
    AcademicYear::parse(raw).ok_or_else(|| format!("'{raw}' is not an academic year like 2024-25"))
}
