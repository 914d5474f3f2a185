//! Terrain sources consulted once per cell while the grid is initialised.

use civ_tactics_core::{CellCoord, GridDimensions, Terrain, TerrainType, TerrainYield};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use thiserror::Error;

/// Supplies the terrain of each cell during grid construction.
pub trait TerrainSource {
    /// Terrain assigned to the cell. Called exactly once per cell, in row-major order.
    fn terrain_at(&mut self, cell: CellCoord) -> Terrain;
}

/// Assigns the same terrain to every cell.
#[derive(Clone, Copy, Debug)]
pub struct UniformTerrain {
    terrain: Terrain,
}

impl UniformTerrain {
    /// Creates a source that yields `terrain` for every cell.
    #[must_use]
    pub const fn new(terrain: Terrain) -> Self {
        Self { terrain }
    }
}

impl TerrainSource for UniformTerrain {
    fn terrain_at(&mut self, _cell: CellCoord) -> Terrain {
        self.terrain
    }
}

/// Terrain described by one row of layout symbols per grid row.
#[derive(Clone, Debug)]
pub struct TerrainLayout {
    dimensions: GridDimensions,
    kinds: Vec<TerrainType>,
    yields: TerrainYieldTable,
}

impl TerrainLayout {
    /// Parses `rows`, validating them against the grid dimensions.
    ///
    /// Row `x` describes cells `(x, 0)..(x, width)`; symbols are listed by
    /// [`TerrainType::symbol`] and whitespace is ignored.
    pub fn parse<S>(
        rows: &[S],
        dimensions: GridDimensions,
        yields: TerrainYieldTable,
    ) -> Result<Self, TerrainError>
    where
        S: AsRef<str>,
    {
        if rows.len() != dimensions.height() as usize {
            return Err(TerrainError::RowCount {
                expected: dimensions.height(),
                found: rows.len(),
            });
        }

        let mut kinds = Vec::with_capacity(dimensions.cell_count());
        for (row_index, row) in rows.iter().enumerate() {
            let symbols: Vec<char> = row
                .as_ref()
                .chars()
                .filter(|symbol| !symbol.is_whitespace())
                .collect();
            if symbols.len() != dimensions.width() as usize {
                return Err(TerrainError::RowWidth {
                    row: row_index,
                    expected: dimensions.width(),
                    found: symbols.len(),
                });
            }
            for (column, symbol) in symbols.into_iter().enumerate() {
                let kind = TerrainType::from_symbol(symbol).ok_or(TerrainError::UnknownSymbol {
                    symbol,
                    row: row_index,
                    column,
                })?;
                kinds.push(kind);
            }
        }

        Ok(Self {
            dimensions,
            kinds,
            yields,
        })
    }
}

impl TerrainSource for TerrainLayout {
    fn terrain_at(&mut self, cell: CellCoord) -> Terrain {
        let kind = self
            .dimensions
            .index(cell)
            .and_then(|index| self.kinds.get(index).copied())
            .unwrap_or(TerrainType::Grassland);
        self.yields.terrain(kind)
    }
}

/// Deterministic pseudo-random terrain generator.
#[derive(Clone, Debug)]
pub struct SeededTerrain {
    rng: ChaCha8Rng,
    water_percent: u32,
    yields: TerrainYieldTable,
}

impl SeededTerrain {
    /// Creates a generator; the same seed always yields the same map.
    #[must_use]
    pub fn new(seed: u64, water_percent: u32, yields: TerrainYieldTable) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            water_percent: water_percent.min(100),
            yields,
        }
    }
}

impl TerrainSource for SeededTerrain {
    fn terrain_at(&mut self, _cell: CellCoord) -> Terrain {
        let roll = self.rng.gen_range(0..100);
        let kind = if roll < self.water_percent {
            TerrainType::Water
        } else {
            match self.rng.gen_range(0..4) {
                0 => TerrainType::Desert,
                1 => TerrainType::Mountain,
                2 => TerrainType::Forest,
                _ => TerrainType::Grassland,
            }
        };
        self.yields.terrain(kind)
    }
}

/// Resource attributes per terrain classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TerrainYieldTable {
    /// Yields of desert cells.
    pub desert: TerrainYield,
    /// Yields of water cells.
    pub water: TerrainYield,
    /// Yields of mountain cells.
    pub mountain: TerrainYield,
    /// Yields of grassland cells.
    pub grassland: TerrainYield,
    /// Yields of forest cells.
    pub forest: TerrainYield,
}

impl TerrainYieldTable {
    /// Yields configured for the terrain classification.
    #[must_use]
    pub const fn yields_for(&self, kind: TerrainType) -> TerrainYield {
        match kind {
            TerrainType::Desert => self.desert,
            TerrainType::Water => self.water,
            TerrainType::Mountain => self.mountain,
            TerrainType::Grassland => self.grassland,
            TerrainType::Forest => self.forest,
        }
    }

    /// Terrain of the provided kind carrying its configured yields.
    #[must_use]
    pub const fn terrain(&self, kind: TerrainType) -> Terrain {
        Terrain::new(kind, self.yields_for(kind))
    }
}

impl Default for TerrainYieldTable {
    fn default() -> Self {
        Self {
            desert: TerrainYield {
                production: 0,
                trade: 1,
                culture: 0,
                coin: 1,
            },
            water: TerrainYield {
                production: 0,
                trade: 2,
                culture: 0,
                coin: 0,
            },
            mountain: TerrainYield {
                production: 2,
                trade: 0,
                culture: 1,
                coin: 0,
            },
            grassland: TerrainYield {
                production: 1,
                trade: 1,
                culture: 0,
                coin: 0,
            },
            forest: TerrainYield {
                production: 2,
                trade: 0,
                culture: 0,
                coin: 0,
            },
        }
    }
}

const DEFAULT_WATER_PERCENT: u32 = 20;

/// Serialized description of how a session's terrain is produced.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerrainConfig {
    /// Every cell carries the same terrain.
    Uniform {
        /// Terrain assigned to every cell.
        terrain: TerrainType,
    },
    /// Explicit symbol layout, one string per grid row.
    Layout {
        /// Layout rows.
        rows: Vec<String>,
    },
    /// Pseudo-random terrain.
    Seeded {
        /// Generator seed.
        seed: u64,
        /// Chance, in percent, that a cell becomes water.
        #[serde(default = "default_water_percent")]
        water_percent: u32,
    },
}

fn default_water_percent() -> u32 {
    DEFAULT_WATER_PERCENT
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self::Uniform {
            terrain: TerrainType::Grassland,
        }
    }
}

impl TerrainConfig {
    /// Builds the terrain source described by the configuration.
    pub fn into_source(
        self,
        dimensions: GridDimensions,
        yields: TerrainYieldTable,
    ) -> Result<Box<dyn TerrainSource>, TerrainError> {
        let source: Box<dyn TerrainSource> = match self {
            Self::Uniform { terrain } => Box::new(UniformTerrain::new(yields.terrain(terrain))),
            Self::Layout { rows } => {
                Box::new(TerrainLayout::parse(rows.as_slice(), dimensions, yields)?)
            }
            Self::Seeded {
                seed,
                water_percent,
            } => Box::new(SeededTerrain::new(seed, water_percent, yields)),
        };
        Ok(source)
    }
}

/// Errors raised while interpreting a terrain layout.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TerrainError {
    /// The layout does not list one row per grid row.
    #[error("terrain layout has {found} rows, expected {expected}")]
    RowCount {
        /// Grid height.
        expected: u32,
        /// Rows present in the layout.
        found: usize,
    },
    /// A layout row does not list one symbol per grid column.
    #[error("terrain layout row {row} has {found} cells, expected {expected}")]
    RowWidth {
        /// Offending row.
        row: usize,
        /// Grid width.
        expected: u32,
        /// Symbols present in the row.
        found: usize,
    },
    /// A layout symbol does not name a terrain classification.
    #[error("unknown terrain symbol '{symbol}' at row {row}, column {column}")]
    UnknownSymbol {
        /// Offending symbol.
        symbol: char,
        /// Row containing the symbol.
        row: usize,
        /// Column containing the symbol.
        column: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_assigns_rows_along_x() {
        let dimensions = GridDimensions::new(2, 3);
        let mut layout =
            TerrainLayout::parse(&["GGW", "M F D"], dimensions, TerrainYieldTable::default())
                .expect("valid layout");

        assert_eq!(
            layout.terrain_at(CellCoord::new(0, 2)).kind(),
            TerrainType::Water
        );
        assert_eq!(
            layout.terrain_at(CellCoord::new(1, 0)).kind(),
            TerrainType::Mountain
        );
        assert_eq!(
            layout.terrain_at(CellCoord::new(1, 2)).kind(),
            TerrainType::Desert
        );
    }

    #[test]
    fn layout_rejects_mismatched_shapes() {
        let dimensions = GridDimensions::new(2, 2);
        let table = TerrainYieldTable::default();

        assert_eq!(
            TerrainLayout::parse(&["GG"], dimensions, table).map(|_| ()),
            Err(TerrainError::RowCount {
                expected: 2,
                found: 1
            })
        );
        assert_eq!(
            TerrainLayout::parse(&["GG", "G"], dimensions, table).map(|_| ()),
            Err(TerrainError::RowWidth {
                row: 1,
                expected: 2,
                found: 1
            })
        );
        assert_eq!(
            TerrainLayout::parse(&["GG", "GX"], dimensions, table).map(|_| ()),
            Err(TerrainError::UnknownSymbol {
                symbol: 'X',
                row: 1,
                column: 1
            })
        );
    }

    #[test]
    fn seeded_terrain_is_deterministic() {
        let table = TerrainYieldTable::default();
        let mut first = SeededTerrain::new(7, 30, table);
        let mut second = SeededTerrain::new(7, 30, table);
        let dimensions = GridDimensions::new(6, 6);

        let first_map: Vec<_> = dimensions.coords().map(|c| first.terrain_at(c)).collect();
        let second_map: Vec<_> = dimensions.coords().map(|c| second.terrain_at(c)).collect();
        assert_eq!(first_map, second_map);
    }

    #[test]
    fn seeded_terrain_without_water_never_yields_water() {
        let mut source = SeededTerrain::new(3, 0, TerrainYieldTable::default());
        let dimensions = GridDimensions::new(8, 8);
        assert!(dimensions
            .coords()
            .all(|cell| !source.terrain_at(cell).kind().is_water()));
    }

    #[test]
    fn terrain_config_parses_from_toml() {
        let config: TerrainConfig =
            toml::from_str("kind = \"seeded\"\nseed = 11").expect("valid config");
        assert_eq!(
            config,
            TerrainConfig::Seeded {
                seed: 11,
                water_percent: DEFAULT_WATER_PERCENT
            }
        );

        let config: TerrainConfig =
            toml::from_str("kind = \"layout\"\nrows = [\"GW\", \"FD\"]").expect("valid config");
        assert!(config
            .into_source(GridDimensions::new(2, 2), TerrainYieldTable::default())
            .is_ok());
    }

    #[test]
    fn yield_table_overrides_merge_with_defaults() {
        let table: TerrainYieldTable =
            toml::from_str("[forest]\nproduction = 5").expect("valid table");
        assert_eq!(table.forest.production, 5);
        assert_eq!(table.forest.coin, 0);
        assert_eq!(table.water, TerrainYieldTable::default().water);
    }
}
