// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Word-addressed memories: tile DMEM and DRAM banks.

use std::collections::HashMap;

use crate::layout::Field;
use crate::sim_error;
use crate::types::{SimError, SimResult};

/// Byte counters kept by each memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryMetrics {
    pub bytes_read: usize,
    pub bytes_written: usize,
}

/// A tile's data memory. Offsets are in bytes from the start of DMEM.
#[derive(Clone)]
pub struct Dmem {
    words: Vec<u32>,
}

impl Dmem {
    #[must_use]
    pub fn new(size_bytes: u32) -> Self {
        Self {
            words: vec![0; (size_bytes / 4) as usize],
        }
    }

    #[must_use]
    pub fn size_bytes(&self) -> u32 {
        (self.words.len() * 4) as u32
    }

    fn index(&self, offset: u32) -> Result<usize, SimError> {
        if offset % 4 != 0 {
            return sim_error!(format!("DMEM offset 0x{offset:x} is not word aligned"));
        }
        let index = (offset / 4) as usize;
        if index >= self.words.len() {
            return sim_error!(format!(
                "DMEM offset 0x{offset:x} is beyond the {} byte DMEM",
                self.size_bytes()
            ));
        }
        Ok(index)
    }

    pub fn read_word(&self, offset: u32) -> Result<u32, SimError> {
        Ok(self.words[self.index(offset)?])
    }

    pub fn write_word(&mut self, offset: u32, value: u32) -> SimResult {
        let index = self.index(offset)?;
        self.words[index] = value;
        Ok(())
    }

    /// Read a layout field.
    pub fn read(&self, field: &Field) -> Result<u32, SimError> {
        self.read_word(field.offset(self.size_bytes())?)
    }

    /// Write a layout field.
    pub fn write(&mut self, field: &Field, value: u32) -> SimResult {
        self.write_word(field.offset(self.size_bytes())?, value)
    }
}

/// One DRAM bank. Storage is sparse and unwritten words read as zero.
pub struct Dram {
    size_bytes: u32,
    words: HashMap<u32, u32>,
    metrics: MemoryMetrics,
}

impl Dram {
    #[must_use]
    pub fn new(size_bytes: u32) -> Self {
        Self {
            size_bytes,
            words: HashMap::new(),
            metrics: MemoryMetrics::default(),
        }
    }

    fn check(&self, epa: u32) -> SimResult {
        if epa % 4 != 0 || epa >= self.size_bytes {
            return sim_error!(format!(
                "DRAM EPA 0x{epa:x} is unaligned or beyond the {} byte bank",
                self.size_bytes
            ));
        }
        Ok(())
    }

    pub fn read_word(&mut self, epa: u32) -> Result<u32, SimError> {
        self.check(epa)?;
        self.metrics.bytes_read += 4;
        Ok(self.words.get(&epa).copied().unwrap_or(0))
    }

    pub fn write_word(&mut self, epa: u32, value: u32) -> SimResult {
        self.check(epa)?;
        self.metrics.bytes_written += 4;
        self.words.insert(epa, value);
        Ok(())
    }

    #[must_use]
    pub fn metrics(&self) -> &MemoryMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dmem_bounds() {
        let mut dmem = Dmem::new(64);
        assert_eq!(dmem.size_bytes(), 64);
        dmem.write_word(60, 7).unwrap();
        assert_eq!(dmem.read_word(60).unwrap(), 7);
        assert!(dmem.read_word(64).is_err());
        assert!(dmem.write_word(2, 1).is_err());
    }

    #[test]
    fn dmem_fields() {
        let mut dmem = Dmem::new(64);
        let last = Field::end("result", 4);
        dmem.write(&last, 0xdead_beef).unwrap();
        assert_eq!(dmem.read_word(60).unwrap(), 0xdead_beef);
        assert_eq!(dmem.read(&last).unwrap(), 0xdead_beef);
    }

    #[test]
    fn dram_counts_bytes() {
        let mut dram = Dram::new(0x100);
        assert_eq!(dram.read_word(0x10).unwrap(), 0);
        dram.write_word(0x10, 3).unwrap();
        dram.write_word(0x14, 4).unwrap();
        assert_eq!(dram.read_word(0x10).unwrap(), 3);
        assert!(dram.read_word(0x100).is_err());
        assert_eq!(dram.metrics().bytes_read, 8);
        assert_eq!(dram.metrics().bytes_written, 8);
    }
}
