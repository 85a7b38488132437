use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::warn;

use super::{SampleRow, SampleTable, RECIPE_MISSING};

/// One plottable datalog within a machine's log tree.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobEntry {
    pub job: String,
    pub path: PathBuf,
    pub file_name: String,
    pub recipe: Vec<String>,
}

#[derive(Error, Debug)]
pub enum LogError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed datalog: {0}")]
    Csv(#[from] csv::Error),
    #[error("datalog has no header row")]
    MissingHeader,
    #[error("unparseable timestamp {0:?}")]
    Timestamp(String),
}

const DATALOG_EXTENSION: &str = "dlg";
const RECIPE_FILE: &str = "recipe.txt";

/// Enumerate a machine's job directories and list every datalog, with the
/// job's recipe steps attached. A job without a recipe file gets the
/// "recipe missing" sentinel rather than failing.
pub fn build_job_list(root: &Path) -> Result<Vec<JobEntry>, LogError> {
    let mut job_dirs: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    job_dirs.sort();

    let mut jobs = Vec::new();
    for dir in job_dirs {
        let job = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let recipe = read_recipe(&dir);

        let mut datalogs: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(DATALOG_EXTENSION))
            })
            .collect();
        datalogs.sort();

        for path in datalogs {
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            jobs.push(JobEntry {
                job: job.clone(),
                path,
                file_name,
                recipe: recipe.clone(),
            });
        }
    }
    Ok(jobs)
}

fn read_recipe(job_dir: &Path) -> Vec<String> {
    match fs::read_to_string(job_dir.join(RECIPE_FILE)) {
        Ok(text) => {
            let steps: Vec<String> = text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect();
            if steps.is_empty() {
                vec![RECIPE_MISSING.to_string()]
            } else {
                steps
            }
        }
        Err(_) => vec![RECIPE_MISSING.to_string()],
    }
}

/// Parse one tab-separated datalog into a `SampleTable`. Column 0 is the
/// timestamp; the remaining headers are normalized to snake_case so channel
/// names line up with the SQL store's columns.
pub fn read_log(path: &Path) -> Result<SampleTable, LogError> {
    let raw = fs::read_to_string(path)?;
    let source_file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(raw.as_bytes());

    let headers = reader.headers().map_err(|_| LogError::MissingHeader)?;
    if headers.is_empty() {
        return Err(LogError::MissingHeader);
    }
    let channels: Vec<String> = headers.iter().skip(1).map(normalize_header).collect();
    let layer_idx = channels.iter().position(|c| c == "layer");

    let mut table = SampleTable {
        channels,
        rows: Vec::new(),
    };
    for record in reader.records() {
        let record = record?;
        let Some(stamp) = record.get(0) else {
            continue;
        };
        let timestamp = parse_timestamp(stamp)?;
        let values: Vec<f64> = (1..=table.channels.len())
            .map(|idx| {
                record
                    .get(idx)
                    .and_then(|field| field.trim().parse::<f64>().ok())
                    .unwrap_or(0.0)
            })
            .collect();
        let layer = layer_idx.map(|idx| values[idx] as i64).unwrap_or(0);
        table.rows.push(SampleRow {
            timestamp,
            layer,
            source_file: source_file.clone(),
            values,
        });
    }
    if table.is_empty() {
        warn!(path = %path.display(), "datalog contained no sample rows");
    }
    Ok(table)
}

/// Datalogs from older controller firmware use 12-hour stamps; newer ones
/// write ISO-style. Try both.
fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, LogError> {
    const FORMATS: &[&str] = &[
        "%m/%d/%Y %I:%M:%S%.f %p",
        "%m/%d/%Y %I:%M:%S %p",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];
    let trimmed = raw.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| LogError::Timestamp(trimmed.to_string()))
}

fn normalize_header(raw: &str) -> String {
    let mut out = String::new();
    for ch in raw.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if matches!(ch, ' ' | '_' | '-' | '.') && !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_end_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_job(root: &Path, job: &str, recipe: Option<&str>, datalog: &str) -> PathBuf {
        let dir = root.join(job);
        fs::create_dir_all(&dir).unwrap();
        if let Some(recipe) = recipe {
            fs::write(dir.join(RECIPE_FILE), recipe).unwrap();
        }
        let log_path = dir.join("layer1.dlg");
        let mut file = fs::File::create(&log_path).unwrap();
        file.write_all(datalog.as_bytes()).unwrap();
        log_path
    }

    const DATALOG: &str = "Time Stamp\tLayer #\tWafers Loaded\tPower (W)\n\
        03/01/2024 10:00:00 AM\t1\t1\t150.0\n\
        03/01/2024 10:00:05 AM\t1\t1\t152.5\n";

    #[test]
    fn read_log_normalizes_headers_and_layers() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_job(tmp.path(), "J1 2024-03-01", Some("step 1\nstep 2\n"), DATALOG);

        let table = read_log(&path).unwrap();
        assert_eq!(table.channels, vec!["layer", "wafers_loaded", "power_w"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].layer, 1);
        assert_eq!(table.rows[0].source_file, "layer1.dlg");
        let power = table.channel_index("power_w").unwrap();
        assert_eq!(table.rows[1].values[power], 152.5);
    }

    #[test]
    fn build_job_list_sorts_and_substitutes_missing_recipe() {
        let tmp = tempfile::tempdir().unwrap();
        write_job(tmp.path(), "b_job", None, DATALOG);
        write_job(tmp.path(), "a_job", Some("Ta adhesion\n"), DATALOG);

        let jobs = build_job_list(tmp.path()).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].job, "a_job");
        assert_eq!(jobs[0].recipe, vec!["Ta adhesion"]);
        assert_eq!(jobs[1].job, "b_job");
        assert_eq!(jobs[1].recipe, vec![RECIPE_MISSING]);
    }

    #[test]
    fn unparseable_timestamp_is_an_error() {
        assert!(matches!(
            parse_timestamp("not a time"),
            Err(LogError::Timestamp(_))
        ));
        assert!(parse_timestamp("2024-03-01 10:00:00.250").is_ok());
    }
}
