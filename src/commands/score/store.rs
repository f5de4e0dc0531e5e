use super::*;

pub struct EvalRun<'r> {
    pub run_id: &'r str,
    pub split: Split,
    pub started_at: &'r str,
    pub tasks: &'r ActiveTasks,
    pub submission_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupedMetric {
    pub team_name: String,
    pub submission_id: String,
    pub task: String,
    pub metric: String,
    pub mean: f64,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub split: String,
    pub run_count: i64,
    pub row_count: i64,
    pub latest_run_id: Option<String>,
}

pub fn open_results_store(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let connection =
        Connection::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    configure_connection(&connection)?;
    ensure_schema(&connection)?;
    Ok(connection)
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

pub(super) fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS eval_runs (
              run_id TEXT PRIMARY KEY,
              split TEXT NOT NULL,
              started_at TEXT NOT NULL,
              tasks TEXT NOT NULL,
              submission_count INTEGER NOT NULL,
              row_count INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS metric_results (
              run_id TEXT NOT NULL,
              timeline_id TEXT NOT NULL,
              metric TEXT NOT NULL,
              task TEXT NOT NULL,
              value REAL NOT NULL,
              team_name TEXT NOT NULL,
              submission_id TEXT NOT NULL,
              FOREIGN KEY(run_id) REFERENCES eval_runs(run_id)
            );

            CREATE INDEX IF NOT EXISTS idx_metric_results_run
              ON metric_results(run_id, team_name, submission_id, task, metric);
            ",
        )
        .context("failed to create results schema")?;
    Ok(())
}

/// Appends one run and its rows in a single transaction.
pub fn record_run(connection: &mut Connection, run: &EvalRun<'_>, rows: &[MetricRow]) -> Result<()> {
    let tx = connection.transaction()?;

    tx.execute(
        "
        INSERT INTO eval_runs (run_id, split, started_at, tasks, submission_count, row_count)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ",
        params![
            run.run_id,
            run.split.as_str(),
            run.started_at,
            run.tasks.labels(),
            run.submission_count as i64,
            rows.len() as i64,
        ],
    )
    .with_context(|| format!("failed to record run {}", run.run_id))?;

    {
        let mut statement = tx.prepare(
            "
            INSERT INTO metric_results (
              run_id, timeline_id, metric, task, value, team_name, submission_id
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )?;

        for row in rows {
            statement.execute(params![
                run.run_id,
                row.timeline_id,
                row.metric,
                row.task.as_str(),
                row.value,
                row.team_name,
                row.submission_id,
            ])?;
        }
    }

    tx.commit()
        .with_context(|| format!("failed to commit run {}", run.run_id))?;
    Ok(())
}

pub fn run_exists(connection: &Connection, run_id: &str) -> Result<bool> {
    let count: i64 = connection
        .query_row(
            "SELECT COUNT(*) FROM eval_runs WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )
        .with_context(|| format!("failed to look up run {run_id}"))?;
    Ok(count > 0)
}

/// Mean value per (team, submission, task, metric) for one run.
pub fn grouped_means(connection: &Connection, run_id: &str) -> Result<Vec<GroupedMetric>> {
    let mut statement = connection.prepare(
        "
        SELECT team_name, submission_id, task, metric, AVG(value), COUNT(*)
        FROM metric_results
        WHERE run_id = ?1
        GROUP BY team_name, submission_id, task, metric
        ORDER BY team_name, submission_id, task, metric
        ",
    )?;

    let rows = statement.query_map(params![run_id], |row| {
        Ok(GroupedMetric {
            team_name: row.get(0)?,
            submission_id: row.get(1)?,
            task: row.get(2)?,
            metric: row.get(3)?,
            mean: row.get(4)?,
            count: row.get(5)?,
        })
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn summarize_runs(connection: &Connection) -> Result<Vec<RunSummary>> {
    let mut statement = connection.prepare(
        "
        SELECT split, COUNT(*), COALESCE(SUM(row_count), 0), MAX(run_id)
        FROM eval_runs
        GROUP BY split
        ORDER BY split
        ",
    )?;

    let rows = statement.query_map([], |row| {
        Ok(RunSummary {
            split: row.get(0)?,
            run_count: row.get(1)?,
            row_count: row.get(2)?,
            latest_run_id: row.get(3)?,
        })
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
