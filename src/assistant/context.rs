use tracing::warn;

use crate::dataset::DatasetView;

/// Number of rows shown to the model as a sample.
pub const SAMPLE_ROWS: usize = 3;

/// Stand-in used when descriptive statistics cannot be computed.
pub const STATS_UNAVAILABLE: &str = "Not available";

/// Build the system briefing for a dataset.
///
/// Never fails: a statistics error is logged and replaced with
/// [`STATS_UNAVAILABLE`].
pub fn build_context(dataset: &dyn DatasetView) -> String {
    let columns = dataset
        .column_names()
        .iter()
        .map(|name| format!("'{}'", name))
        .collect::<Vec<_>>()
        .join(", ");

    let stats = match dataset.describe() {
        Ok(stats) => stats,
        Err(e) => {
            warn!("Descriptive statistics unavailable: {}", e);
            STATS_UNAVAILABLE.to_string()
        }
    };

    let sample = dataset.head(SAMPLE_ROWS);

    format!(
        r#"You are an expert data analyst.

DATASET INFO:
- Columns: [{}]
- Total rows: {}

STATS:
{}

SAMPLE:
{}

Answer questions about this data concisely."#,
        columns,
        dataset.row_count(),
        stats,
        sample
    )
}
