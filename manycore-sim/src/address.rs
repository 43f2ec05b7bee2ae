// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Network physical addresses (NPA) and endpoint virtual addresses (EVA).
//!
//! An NPA names a word on a particular endpoint: the endpoint's coordinate
//! plus an endpoint physical address (EPA). An EVA is the 32-bit address a
//! tile program uses; the [`AddressMap`] translates between the two from the
//! point of view of a source tile.
//!
//! The default map exposes:
//!  - the source tile's own DMEM at EVAs `[TILE_EPA_DMEM_BASE, +dmem_size)`,
//!  - DRAM from [`DRAM_EVA_BASE`] upwards, bank after bank.

use std::fmt;

use crate::config::ManycoreConfig;
use crate::sim_error;
use crate::types::{Coordinate, SimError};

/// Endpoint virtual address.
pub type Eva = u32;

pub const TILE_EPA_DMEM_BASE: u32 = 0x1000;
pub const TILE_EPA_CSR_FREEZE: u32 = 0x2_0000;
pub const TILE_EPA_CSR_TG_ORIGIN_X: u32 = 0x2_0004;
pub const TILE_EPA_CSR_TG_ORIGIN_Y: u32 = 0x2_0008;
pub const VCACHE_EPA_BASE: u32 = 0;
pub const DRAM_EVA_BASE: Eva = 0x8000_0000;

/// Network physical address.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct Npa {
    pub x: u32,
    pub y: u32,
    pub epa: u32,
}

impl Npa {
    #[must_use]
    pub fn new(coord: Coordinate, epa: u32) -> Self {
        Self {
            x: coord.x,
            y: coord.y,
            epa,
        }
    }

    #[must_use]
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.x, self.y)
    }

    /// The NPA `words` words further on within the same endpoint.
    pub fn offset_words(&self, words: usize) -> Result<Npa, SimError> {
        let bytes = u32::try_from(words)
            .ok()
            .and_then(|w| w.checked_mul(4))
            .and_then(|b| self.epa.checked_add(b));
        match bytes {
            Some(epa) => Ok(Npa { epa, ..*self }),
            None => sim_error!(format!("{self} + {words} words overflows the EPA space")),
        }
    }
}

impl fmt::Display for Npa {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {}):0x{:08x}", self.x, self.y, self.epa)
    }
}

/// Translation between EVAs and NPAs as seen from a source tile.
///
/// Both directions also return the number of contiguous bytes that remain
/// mapped from the translated address.
pub trait AddressMap {
    fn npa_to_eva(
        &self,
        config: &ManycoreConfig,
        src: &Coordinate,
        npa: &Npa,
    ) -> Result<(Eva, usize), SimError>;

    fn eva_to_npa(
        &self,
        config: &ManycoreConfig,
        src: &Coordinate,
        eva: Eva,
    ) -> Result<(Npa, usize), SimError>;
}

/// The map tile programs are linked against.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultMap;

pub static DEFAULT_MAP: DefaultMap = DefaultMap;

impl AddressMap for DefaultMap {
    fn npa_to_eva(
        &self,
        config: &ManycoreConfig,
        src: &Coordinate,
        npa: &Npa,
    ) -> Result<(Eva, usize), SimError> {
        let coord = npa.coordinate();
        if let Some(bank) = config.dram_index(&coord) {
            let bank_size = config.dram_bank_size_bytes;
            if npa.epa >= bank_size {
                return sim_error!(format!("{npa} is beyond the end of DRAM bank {bank}"));
            }
            let eva = u64::from(DRAM_EVA_BASE)
                + u64::from(bank) * u64::from(bank_size)
                + u64::from(npa.epa);
            let eva = match Eva::try_from(eva) {
                Ok(eva) => eva,
                Err(_) => return sim_error!(format!("{npa} maps beyond the EVA space")),
            };
            return Ok((eva, (bank_size - npa.epa) as usize));
        }

        let dmem_end = TILE_EPA_DMEM_BASE + config.dmem_size_bytes;
        if coord == *src && (TILE_EPA_DMEM_BASE..dmem_end).contains(&npa.epa) {
            return Ok((npa.epa, (dmem_end - npa.epa) as usize));
        }

        sim_error!(format!("{npa} is not mapped for source {src}"))
    }

    fn eva_to_npa(
        &self,
        config: &ManycoreConfig,
        src: &Coordinate,
        eva: Eva,
    ) -> Result<(Npa, usize), SimError> {
        if eva >= DRAM_EVA_BASE {
            let offset = eva - DRAM_EVA_BASE;
            let bank_size = config.dram_bank_size_bytes;
            let bank = offset / bank_size;
            if bank >= config.num_dram() {
                return sim_error!(format!("EVA 0x{eva:08x} is beyond the last DRAM bank"));
            }
            let epa = offset % bank_size;
            let npa = Npa::new(config.dram_coordinate(bank)?, epa);
            return Ok((npa, (bank_size - epa) as usize));
        }

        let dmem_end = TILE_EPA_DMEM_BASE + config.dmem_size_bytes;
        if (TILE_EPA_DMEM_BASE..dmem_end).contains(&eva) {
            return Ok((Npa::new(*src, eva), (dmem_end - eva) as usize));
        }

        sim_error!(format!("EVA 0x{eva:08x} is not mapped for source {src}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ManycoreConfig {
        ManycoreConfig {
            origin_vcore: Coordinate::new(0, 1),
            dimension_vcore: Coordinate::new(2, 2),
            dram_bank_size_bytes: 0x1000,
            ..Default::default()
        }
    }

    #[test]
    fn dram_translation() {
        let config = config();
        let src = Coordinate::new(0, 1);

        let (npa, size) = DEFAULT_MAP.eva_to_npa(&config, &src, DRAM_EVA_BASE + 0x1010).unwrap();
        assert_eq!(npa, Npa::new(Coordinate::new(1, 3), 0x10));
        assert_eq!(size, 0x1000 - 0x10);

        let (eva, _) = DEFAULT_MAP.npa_to_eva(&config, &src, &npa).unwrap();
        assert_eq!(eva, DRAM_EVA_BASE + 0x1010);

        assert!(DEFAULT_MAP.eva_to_npa(&config, &src, DRAM_EVA_BASE + 0x2000).is_err());
    }

    #[test]
    fn dmem_is_local_only() {
        let config = config();
        let src = Coordinate::new(1, 2);

        let (npa, size) = DEFAULT_MAP.eva_to_npa(&config, &src, TILE_EPA_DMEM_BASE + 8).unwrap();
        assert_eq!(npa, Npa::new(src, TILE_EPA_DMEM_BASE + 8));
        assert_eq!(size, config.dmem_size_bytes as usize - 8);

        let remote = Npa::new(Coordinate::new(0, 1), TILE_EPA_DMEM_BASE);
        assert!(DEFAULT_MAP.npa_to_eva(&config, &src, &remote).is_err());
        assert!(DEFAULT_MAP.eva_to_npa(&config, &src, 0x10).is_err());
    }

    #[test]
    fn npa_offsets() {
        let npa = Npa::new(Coordinate::new(0, 3), 0x100);
        assert_eq!(npa.offset_words(4).unwrap().epa, 0x110);
        assert!(Npa::new(Coordinate::new(0, 3), u32::MAX - 2).offset_words(1).is_err());
    }
}
