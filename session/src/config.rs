use civ_tactics_world::{TerrainConfig, TerrainYieldTable};
use serde::Deserialize;

/// Grid construction and pacing parameters for a session.
///
/// Every field has a default, so a configuration file only needs to list
/// what it changes.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Number of rows, indexed by `x`.
    pub height: u32,
    /// Number of columns, indexed by `y`.
    pub width: u32,
    /// World-space distance between neighbouring cell centres.
    pub cell_spacing: f32,
    /// Ticks spent traversing one path segment.
    pub frames_per_step: u32,
    /// Seconds a freshly started selection ignores the pointer.
    pub input_delay_secs: f32,
    /// How cell terrain is produced.
    pub terrain: TerrainConfig,
    /// Resource yields attached to each terrain classification.
    pub yields: TerrainYieldTable,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            height: 8,
            width: 8,
            cell_spacing: 10.0,
            frames_per_step: 10,
            input_delay_secs: 1.0,
            terrain: TerrainConfig::default(),
            yields: TerrainYieldTable::default(),
        }
    }
}
