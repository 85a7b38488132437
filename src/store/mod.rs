use chrono::NaiveDateTime;

pub mod logs;
pub mod sql;

/// Channels that are carried in the data but never plotted.
pub const EXCLUDED_CHANNELS: &[&str] = &["layer", "wafers_loaded"];

/// Placeholder recipe attached to jobs whose recipe file is absent.
pub const RECIPE_MISSING: &str = "recipe missing";

/// One sample row: a timestamp plus one value per channel in the owning
/// table's channel list, tagged with the layer and source file it came from.
#[derive(Debug, Clone)]
pub struct SampleRow {
    pub timestamp: NaiveDateTime,
    pub layer: i64,
    pub source_file: String,
    pub values: Vec<f64>,
}

/// Uniform tabular shape produced by both data-source adapters.
///
/// `channels` names the numeric columns; every row's `values` vector is
/// parallel to it. Built fresh per request and discarded with the response.
#[derive(Debug, Clone, Default)]
pub struct SampleTable {
    pub channels: Vec<String>,
    pub rows: Vec<SampleRow>,
}

impl SampleTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a channel by name, if present.
    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| c == name)
    }
}

/// Declarative per-machine-type query configuration. Machine types differ
/// only in these fields, so one profile table plus one parameterized query
/// builder serves them all.
#[derive(Debug, Clone, Copy)]
pub struct MachineProfile {
    /// SQLite table holding this machine's recipe runs.
    pub table: &'static str,
    pub timestamp_column: &'static str,
    pub recipe_column: &'static str,
    pub job_column: &'static str,
    pub layer_column: &'static str,
    pub source_file_column: &'static str,
    /// Categorical shutter-state channels; a row counts as an active
    /// deposition step when any of these reads OPEN.
    pub shutter_channels: &'static [&'static str],
    /// LIKE pattern matching this machine's source turn-off steps.
    pub turn_off_pattern: &'static str,
}

pub const MACHINE_PROFILES: &[MachineProfile] = &[
    MachineProfile {
        table: "orion",
        timestamp_column: "timestamp",
        recipe_column: "recipe_steps",
        job_column: "job_name",
        layer_column: "layer",
        source_file_column: "source_file",
        shutter_channels: &[
            "source1_shutter",
            "source2_shutter",
            "source3_shutter",
            "source4_shutter",
        ],
        turn_off_pattern: "%turn off%",
    },
    MachineProfile {
        table: "atc2200",
        timestamp_column: "timestamp",
        recipe_column: "recipe_steps",
        job_column: "job_name",
        layer_column: "layer",
        source_file_column: "source_file",
        shutter_channels: &["gun1_shutter", "gun2_shutter", "gun3_shutter"],
        turn_off_pattern: "%turn off%",
    },
];

/// Look up a machine profile by its table name.
pub fn profile_for_table(table: &str) -> Option<&'static MachineProfile> {
    MACHINE_PROFILES.iter().find(|p| p.table == table)
}
