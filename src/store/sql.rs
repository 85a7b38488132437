use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, SqlitePool};
use tracing::debug;

use super::{MachineProfile, SampleRow, SampleTable};

/// Recipe-frequency summary for one machine table.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FrequencyTable {
    pub columns: Vec<String>,
    pub rows: Vec<FrequencyRow>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct FrequencyRow {
    pub recipe: String,
    pub runs: i64,
}

/// Fetch every sample whose recipe-steps column contains `recipe_filter`,
/// ordered by timestamp. Numeric columns other than the profile's bookkeeping
/// and shutter columns become channels. An empty result set is a valid empty
/// table.
pub async fn fetch_samples(
    pool: &SqlitePool,
    profile: &MachineProfile,
    recipe_filter: &str,
) -> Result<SampleTable, sqlx::Error> {
    let query = format!(
        "SELECT * FROM {table} WHERE {recipe} LIKE '%' || ?1 || '%' ORDER BY {ts} ASC",
        table = profile.table,
        recipe = profile.recipe_column,
        ts = profile.timestamp_column,
    );
    let rows = sqlx::query(&query)
        .bind(recipe_filter)
        .fetch_all(pool)
        .await?;
    debug!(table = profile.table, rows = rows.len(), "fetched samples");

    let mut table = SampleTable::default();
    let Some(first) = rows.first() else {
        return Ok(table);
    };

    // Channel list comes from the first row's column set; every row of a
    // table shares it.
    let channel_indices: Vec<usize> = first
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, col)| is_channel_column(profile, col.name()))
        .map(|(idx, _)| idx)
        .collect();
    table.channels = channel_indices
        .iter()
        .map(|&idx| first.columns()[idx].name().to_string())
        .collect();

    for row in &rows {
        table.rows.push(SampleRow {
            timestamp: row.try_get(profile.timestamp_column)?,
            layer: row.try_get(profile.layer_column)?,
            source_file: row.try_get(profile.source_file_column)?,
            values: channel_indices
                .iter()
                .map(|&idx| numeric_value(row, idx))
                .collect(),
        });
    }
    Ok(table)
}

/// Count distinct (recipe, job, layer) tuples per recipe, keeping only rows
/// where one of the machine's shutters is OPEN and dropping turn-off steps.
/// One builder serves every machine type; the profile supplies the
/// machine-specific parts.
pub async fn recipe_frequency(
    pool: &SqlitePool,
    profile: &MachineProfile,
) -> Result<FrequencyTable, sqlx::Error> {
    let shutter_open = profile
        .shutter_channels
        .iter()
        .map(|ch| format!("{ch} = 'OPEN'"))
        .collect::<Vec<_>>()
        .join(" OR ");
    let query = format!(
        "SELECT {recipe} AS recipe, COUNT(*) AS runs FROM \
         (SELECT DISTINCT {recipe}, {job}, {layer} FROM {table} \
          WHERE ({shutter_open}) AND {recipe} NOT LIKE ?1) \
         GROUP BY {recipe} ORDER BY runs DESC",
        recipe = profile.recipe_column,
        job = profile.job_column,
        layer = profile.layer_column,
        table = profile.table,
    );
    let rows = sqlx::query(&query)
        .bind(profile.turn_off_pattern)
        .fetch_all(pool)
        .await?;

    Ok(FrequencyTable {
        columns: vec!["Recipe".to_string(), "Runs".to_string()],
        rows: rows
            .iter()
            .map(|row| {
                Ok(FrequencyRow {
                    recipe: row.try_get("recipe")?,
                    runs: row.try_get("runs")?,
                })
            })
            .collect::<Result<_, sqlx::Error>>()?,
    })
}

fn is_channel_column(profile: &MachineProfile, name: &str) -> bool {
    name != profile.timestamp_column
        && name != profile.recipe_column
        && name != profile.job_column
        && name != profile.source_file_column
        && !profile.shutter_channels.contains(&name)
}

/// SQLite columns carry mixed affinities; read REAL first, fall back to
/// INTEGER, and treat NULL or text as zero.
fn numeric_value(row: &SqliteRow, idx: usize) -> f64 {
    if let Ok(v) = row.try_get::<f64, _>(idx) {
        v
    } else if let Ok(v) = row.try_get::<i64, _>(idx) {
        v as f64
    } else {
        0.0
    }
}
