// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Per-tile result checks and the pass/fail summary of a regression.

use std::fmt;
use std::rc::Rc;

use manycore_sim::types::Coordinate;
use manycore_track::entity::Entity;
use manycore_track::{error, info};

/// A result word read back from a tile, with how to interpret it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Word {
    Float(u32),
    Unsigned(u32),
}

impl Word {
    #[must_use]
    pub fn float(value: f32) -> Self {
        Word::Float(value.to_bits())
    }

    #[must_use]
    pub fn bits(self) -> u32 {
        match self {
            Word::Float(bits) | Word::Unsigned(bits) => bits,
        }
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Word::Float(bits) => write!(f, "{:.6}", f32::from_bits(*bits)),
            Word::Unsigned(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TileCheck {
    pub tile: Coordinate,
    pub expected: Word,
    pub actual: Word,
}

impl TileCheck {
    /// Results are compared bit for bit.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.expected.bits() == self.actual.bits()
    }
}

#[derive(Clone, Debug)]
pub struct Report {
    pub program: &'static str,
    pub checks: Vec<TileCheck>,
    pub kernel_start_cycle: Option<u64>,
    pub kernel_end_cycle: Option<u64>,
    /// Cycle the machine had reached when the report was made.
    pub cycles: u64,
}

impl Report {
    #[must_use]
    pub fn new(program: &'static str) -> Self {
        Self {
            program,
            checks: Vec::new(),
            kernel_start_cycle: None,
            kernel_end_cycle: None,
            cycles: 0,
        }
    }

    /// Passes when at least one tile was checked and every check matched.
    #[must_use]
    pub fn passed(&self) -> bool {
        !self.checks.is_empty() && self.checks.iter().all(TileCheck::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &TileCheck> {
        self.checks.iter().filter(|c| !c.passed())
    }

    /// Log every mismatch and the final verdict.
    pub fn log(&self, entity: &Rc<Entity>) {
        for check in self.failures() {
            error!(entity ; "{}: (x: {}, y: {}): read data ({}) and expected ({}) do not match",
                self.program, check.tile.x, check.tile.y, check.actual, check.expected);
        }
        if let (Some(start), Some(end)) = (self.kernel_start_cycle, self.kernel_end_cycle) {
            info!(entity ; "{}: kernel ran from cycle {start} to {end}", self.program);
        }
        if self.passed() {
            info!(entity ; "{}: PASSED after {} cycles", self.program, self.cycles);
        } else {
            error!(entity ; "{}: FAILED", self.program);
        }
    }
}
