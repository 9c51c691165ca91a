pub mod missing;
pub mod patterns;
pub mod report;
pub mod suggestions;

use crate::models::{ColumnProfile, PatternProfile, Suggestion};
use crate::services::table::Table;

pub use report::FileReport;

#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub profiles: Vec<ColumnProfile>,
    pub patterns: Vec<PatternProfile>,
    pub suggestions: Vec<Suggestion>,
}

/// Runs both analyzers side by side, then synthesizes suggestions from
/// their combined output.
pub fn run(table: &Table) -> AnalysisRun {
    let (profiles, patterns) = rayon::join(
        || missing::analyze(table),
        || patterns::classify(table),
    );
    let suggestions = suggestions::synthesize(&profiles, &patterns);

    AnalysisRun { profiles, patterns, suggestions }
}
