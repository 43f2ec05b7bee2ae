// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! DMEM words shared by the test_dram host driver and tile program. The
//! first word of DMEM is not used.

use manycore_sim::address::Eva;
use manycore_sim::layout::{DmemRecord, Field, Layout, check_word_count};
use manycore_sim::types::SimError;

pub const BASE: Field = Field::start("base", 4);
pub const NELS: Field = Field::start("nels", 8);
/// Next word to read; advanced by the tile.
pub const PTR: Field = Field::start("ptr", 12);
pub const RESULT: Field = Field::end("result", 4);

pub const LAYOUT: Layout = Layout {
    name: "test_dram",
    fields: &[BASE, NELS, PTR, RESULT],
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TestDramArgs {
    pub base: Eva,
    pub nels: u32,
    pub ptr: Eva,
    pub result: u32,
}

impl DmemRecord for TestDramArgs {
    const LAYOUT: Layout = LAYOUT;

    fn to_words(&self) -> Vec<u32> {
        vec![self.base, self.nels, self.ptr, self.result]
    }

    fn from_words(words: &[u32]) -> Result<Self, SimError> {
        check_word_count(&Self::LAYOUT, words)?;
        Ok(Self {
            base: words[0],
            nels: words[1],
            ptr: words[2],
            result: words[3],
        })
    }
}
