use crate::store::{SampleTable, EXCLUDED_CHANNELS};

/// Backend-agnostic chart description. Both the PNG and the SVG encoder
/// consume this, so the two modes always agree on subplot count, titles, and
/// per-group trace counts.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub subplots: Vec<SubplotSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubplotSpec {
    pub title: String,
    pub traces: Vec<TraceSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceSpec {
    /// Group origin timestamp in string form, used for the legend.
    pub label: String,
    pub points: Vec<(f64, f64)>,
}

impl ChartSpec {
    pub fn is_empty(&self) -> bool {
        self.subplots.is_empty()
    }

    /// Legend labels, one per group, in first-appearance order.
    pub fn group_labels(&self) -> Vec<&str> {
        self.subplots
            .first()
            .map(|sub| sub.traces.iter().map(|t| t.label.as_str()).collect())
            .unwrap_or_default()
    }
}

/// Channels worth plotting: everything except the fixed excluded set and any
/// channel that is zero in every row.
pub fn eligible_channels(table: &SampleTable) -> Vec<usize> {
    (0..table.channels.len())
        .filter(|&idx| !EXCLUDED_CHANNELS.contains(&table.channels[idx].as_str()))
        .filter(|&idx| table.rows.iter().any(|row| row.values[idx] != 0.0))
        .collect()
}

/// Group the table by (layer, source file) and emit one trace per group per
/// eligible channel, with elapsed seconds since the group's first sample on
/// the x-axis. `x_scale` stretches the time axis (1.0 for plain seconds).
pub fn aggregate(table: &SampleTable, x_scale: f64) -> ChartSpec {
    let channels = eligible_channels(table);

    // Partition row indices by group key, preserving table order inside each
    // group and first-appearance order across groups.
    let mut keys: Vec<(i64, &str)> = Vec::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (row_idx, row) in table.rows.iter().enumerate() {
        let key = (row.layer, row.source_file.as_str());
        match keys.iter().position(|k| *k == key) {
            Some(pos) => groups[pos].push(row_idx),
            None => {
                keys.push(key);
                groups.push(vec![row_idx]);
            }
        }
    }

    let labels: Vec<String> = groups
        .iter()
        .map(|rows| {
            table.rows[rows[0]]
                .timestamp
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .collect();

    let subplots = channels
        .iter()
        .map(|&ch| SubplotSpec {
            title: table.channels[ch].clone(),
            traces: groups
                .iter()
                .zip(&labels)
                .map(|(rows, label)| {
                    let origin = table.rows[rows[0]].timestamp;
                    TraceSpec {
                        label: label.clone(),
                        points: rows
                            .iter()
                            .map(|&idx| {
                                let row = &table.rows[idx];
                                let elapsed = (row.timestamp - origin).num_milliseconds()
                                    as f64
                                    / 1000.0;
                                (elapsed * x_scale, row.values[ch])
                            })
                            .collect(),
                    }
                })
                .collect(),
        })
        .collect();

    ChartSpec { subplots }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SampleRow;
    use chrono::NaiveDate;

    fn ts(secs: u32, milli: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_milli_opt(10, 0, secs, milli)
            .unwrap()
    }

    fn table() -> SampleTable {
        let channels = vec![
            "layer".to_string(),
            "wafers_loaded".to_string(),
            "power_w".to_string(),
            "unused_gun".to_string(),
        ];
        let rows = vec![
            SampleRow {
                timestamp: ts(0, 0),
                layer: 1,
                source_file: "a.dlg".into(),
                values: vec![1.0, 1.0, 150.0, 0.0],
            },
            SampleRow {
                timestamp: ts(5, 500),
                layer: 1,
                source_file: "a.dlg".into(),
                values: vec![1.0, 1.0, 152.0, 0.0],
            },
            SampleRow {
                timestamp: ts(30, 0),
                layer: 2,
                source_file: "a.dlg".into(),
                values: vec![2.0, 1.0, 90.0, 0.0],
            },
        ];
        SampleTable { channels, rows }
    }

    #[test]
    fn excluded_and_all_zero_channels_are_ineligible() {
        let table = table();
        let eligible = eligible_channels(&table);
        let names: Vec<&str> = eligible
            .iter()
            .map(|&idx| table.channels[idx].as_str())
            .collect();
        assert_eq!(names, vec!["power_w"]);
    }

    #[test]
    fn elapsed_time_starts_at_zero_and_is_non_decreasing() {
        let chart = aggregate(&table(), 1.0);
        assert_eq!(chart.subplots.len(), 1);
        for trace in &chart.subplots[0].traces {
            assert_eq!(trace.points[0].0, 0.0);
            for pair in trace.points.windows(2) {
                assert!(pair[1].0 >= pair[0].0);
            }
        }
        // Fractional seconds survive.
        assert_eq!(chart.subplots[0].traces[0].points[1].0, 5.5);
    }

    #[test]
    fn groups_split_on_layer_and_keep_origin_labels() {
        let chart = aggregate(&table(), 1.0);
        let labels = chart.group_labels();
        assert_eq!(labels, vec!["2024-03-01 10:00:00", "2024-03-01 10:00:30"]);
        // Layer 2 has a single row: one point at elapsed 0.
        assert_eq!(chart.subplots[0].traces[1].points, vec![(0.0, 90.0)]);
    }

    #[test]
    fn x_scale_stretches_the_time_axis() {
        let chart = aggregate(&table(), 2.0);
        assert_eq!(chart.subplots[0].traces[0].points[1].0, 11.0);
    }

    #[test]
    fn empty_table_aggregates_to_zero_subplots() {
        let chart = aggregate(&SampleTable::default(), 1.0);
        assert!(chart.is_empty());
        assert!(chart.group_labels().is_empty());
    }
}
