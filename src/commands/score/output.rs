use super::*;

const RESULTS_HEADER: [&str; 6] = [
    "timeline_id",
    "metric",
    "task",
    "value",
    "team_name",
    "submission_id",
];

pub fn write_results_csv(path: &Path, rows: &[MetricRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create results csv {}", path.display()))?;
    if rows.is_empty() {
        writer
            .write_record(RESULTS_HEADER)
            .with_context(|| format!("failed to write results header to {}", path.display()))?;
    }
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("failed to write results row to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush results csv {}", path.display()))?;

    Ok(())
}

pub fn render_grouped_summary(summary: &[GroupedMetric]) -> String {
    let mut out = String::new();
    out.push_str("team_name\tsubmission_id\ttask\tmetric\tmean\tn\n");
    for entry in summary {
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{:.6}\t{}\n",
            entry.team_name, entry.submission_id, entry.task, entry.metric, entry.mean, entry.count
        ));
    }
    out
}
