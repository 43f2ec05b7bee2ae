// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Machine parameters of the simulated manycore.

use serde::{Deserialize, Serialize};

use crate::address::{TILE_EPA_CSR_FREEZE, TILE_EPA_DMEM_BASE};
use crate::sim_error;
use crate::types::{Coordinate, SimError, SimResult};

/// Smallest DMEM that can hold a tile program's configuration block.
pub const MIN_DMEM_SIZE_BYTES: u32 = 64;

/// Total EVA space reserved for DRAM.
pub const DRAM_EVA_SPACE_BYTES: u64 = 0x8000_0000;

/// The geometry and timing of the simulated machine.
///
/// Tiles occupy the rectangle starting at `origin_vcore` of size
/// `dimension_vcore`. One DRAM bank sits below each column of tiles and the
/// host sits at `host_coordinate`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct ManycoreConfig {
    pub origin_vcore: Coordinate,
    pub dimension_vcore: Coordinate,
    pub host_coordinate: Coordinate,
    pub dmem_size_bytes: u32,
    pub dram_bank_size_bytes: u32,
    pub hop_latency_cycles: u64,
    pub dram_latency_cycles: u64,
    pub dram_requests_per_cycle: usize,
    pub max_out_credits: usize,
}

impl Default for ManycoreConfig {
    fn default() -> Self {
        Self {
            origin_vcore: Coordinate::new(0, 1),
            dimension_vcore: Coordinate::new(4, 4),
            host_coordinate: Coordinate::new(0, 0),
            dmem_size_bytes: 4096,
            dram_bank_size_bytes: 0x0100_0000,
            hop_latency_cycles: 1,
            dram_latency_cycles: 10,
            dram_requests_per_cycle: 4,
            max_out_credits: 32,
        }
    }
}

impl ManycoreConfig {
    /// Check the configuration describes a machine that can be built.
    pub fn validate(&self) -> SimResult {
        if self.dimension_vcore.x == 0 || self.dimension_vcore.y == 0 {
            return sim_error!(format!(
                "tile array dimension {} must be non-zero",
                self.dimension_vcore
            ));
        }
        if u64::from(self.origin_vcore.y) + u64::from(self.dimension_vcore.y) > u64::from(u32::MAX)
            || u64::from(self.origin_vcore.x) + u64::from(self.dimension_vcore.x)
                > u64::from(u32::MAX)
        {
            return sim_error!("tile array does not fit the coordinate space");
        }
        if self.dmem_size_bytes % 4 != 0 || self.dmem_size_bytes < MIN_DMEM_SIZE_BYTES {
            return sim_error!(format!(
                "DMEM size {} must be a multiple of 4 and at least {MIN_DMEM_SIZE_BYTES}",
                self.dmem_size_bytes
            ));
        }
        if TILE_EPA_DMEM_BASE + self.dmem_size_bytes > TILE_EPA_CSR_FREEZE {
            return sim_error!(format!(
                "DMEM size {} overlaps the tile CSRs",
                self.dmem_size_bytes
            ));
        }
        if self.dram_bank_size_bytes == 0 || self.dram_bank_size_bytes % 4 != 0 {
            return sim_error!(format!(
                "DRAM bank size {} must be a non-zero multiple of 4",
                self.dram_bank_size_bytes
            ));
        }
        if u64::from(self.dram_bank_size_bytes) * u64::from(self.num_dram()) > DRAM_EVA_SPACE_BYTES
        {
            return sim_error!("DRAM banks do not fit the DRAM EVA space");
        }
        if self.is_vcore(&self.host_coordinate) || self.dram_index(&self.host_coordinate).is_some()
        {
            return sim_error!(format!(
                "host {} overlaps a tile or DRAM bank",
                self.host_coordinate
            ));
        }
        if self.dram_requests_per_cycle == 0 {
            return sim_error!("DRAM must service at least one request per cycle");
        }
        if self.max_out_credits == 0 {
            return sim_error!("tiles need at least one outstanding request credit");
        }
        Ok(())
    }

    /// Number of DRAM banks (one per tile column).
    #[must_use]
    pub fn num_dram(&self) -> u32 {
        self.dimension_vcore.x
    }

    /// Coordinate of the last tile in the array.
    #[must_use]
    pub fn last_vcore(&self) -> Coordinate {
        Coordinate::new(
            self.origin_vcore.x + self.dimension_vcore.x - 1,
            self.origin_vcore.y + self.dimension_vcore.y - 1,
        )
    }

    #[must_use]
    pub fn is_vcore(&self, coord: &Coordinate) -> bool {
        coord.is_within(&self.origin_vcore, &self.dimension_vcore)
    }

    /// Row-major index of a tile: `y` outer, `x` inner.
    #[must_use]
    pub fn vcore_index(&self, coord: &Coordinate) -> Option<usize> {
        if !self.is_vcore(coord) {
            return None;
        }
        let x = (coord.x - self.origin_vcore.x) as usize;
        let y = (coord.y - self.origin_vcore.y) as usize;
        Some(y * self.dimension_vcore.x as usize + x)
    }

    /// All tile coordinates in row-major order.
    pub fn vcore_coordinates(&self) -> impl Iterator<Item = Coordinate> + '_ {
        let origin = self.origin_vcore;
        let dim = self.dimension_vcore;
        (origin.y..origin.y + dim.y)
            .flat_map(move |y| (origin.x..origin.x + dim.x).map(move |x| Coordinate::new(x, y)))
    }

    /// DRAM banks live on the row below the tile array.
    pub fn dram_coordinate(&self, index: u32) -> Result<Coordinate, SimError> {
        if index >= self.num_dram() {
            return sim_error!(format!("DRAM bank {index} does not exist"));
        }
        Ok(Coordinate::new(
            self.origin_vcore.x + index,
            self.origin_vcore.y + self.dimension_vcore.y,
        ))
    }

    #[must_use]
    pub fn dram_index(&self, coord: &Coordinate) -> Option<u32> {
        let row = self.origin_vcore.y + self.dimension_vcore.y;
        if coord.y == row
            && coord.x >= self.origin_vcore.x
            && coord.x - self.origin_vcore.x < self.num_dram()
        {
            Some(coord.x - self.origin_vcore.x)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = ManycoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.last_vcore(), Coordinate::new(3, 4));
        assert_eq!(config.dram_coordinate(2).unwrap(), Coordinate::new(2, 5));
        assert_eq!(config.dram_index(&Coordinate::new(3, 5)), Some(3));
        assert_eq!(config.dram_index(&Coordinate::new(4, 5)), None);
        assert!(config.dram_coordinate(4).is_err());
    }

    #[test]
    fn row_major_order() {
        let config = ManycoreConfig {
            origin_vcore: Coordinate::new(1, 1),
            dimension_vcore: Coordinate::new(2, 2),
            ..Default::default()
        };
        let coords: Vec<_> = config.vcore_coordinates().collect();
        assert_eq!(
            coords,
            vec![
                Coordinate::new(1, 1),
                Coordinate::new(2, 1),
                Coordinate::new(1, 2),
                Coordinate::new(2, 2)
            ]
        );
        for (i, coord) in coords.iter().enumerate() {
            assert_eq!(config.vcore_index(coord), Some(i));
        }
        assert_eq!(config.vcore_index(&Coordinate::new(0, 0)), None);
    }

    #[test]
    fn invalid_configs() {
        let bad = [
            ManycoreConfig {
                dimension_vcore: Coordinate::new(0, 4),
                ..Default::default()
            },
            ManycoreConfig {
                dmem_size_bytes: 4094,
                ..Default::default()
            },
            ManycoreConfig {
                dmem_size_bytes: 0x2_0000,
                ..Default::default()
            },
            ManycoreConfig {
                dram_bank_size_bytes: 0,
                ..Default::default()
            },
            ManycoreConfig {
                host_coordinate: Coordinate::new(1, 1),
                ..Default::default()
            },
            ManycoreConfig {
                max_out_credits: 0,
                ..Default::default()
            },
            ManycoreConfig {
                dram_bank_size_bytes: 0x4000_0000,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "{config:?} should be rejected");
        }
    }
}
