// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! DMEM words shared by the linear_inorder host driver and tile program.

use manycore_sim::address::Eva;
use manycore_sim::layout::{DmemRecord, Field, Layout, check_word_count};
use manycore_sim::types::{Coordinate, SimError};

/// EVA of the DRAM buffer.
pub const BASE: Field = Field::start("base", 0);
/// Number of elements in the buffer.
pub const NELS: Field = Field::start("nels", 4);
/// Element offset this tile starts from.
pub const OFFSET: Field = Field::start("offset", 8);
pub const STRIDE: Field = Field::start("stride", 12);
/// Reads issued so far; advanced by the tile.
pub const ITER: Field = Field::start("iter", 16);
pub const LIMIT: Field = Field::start("limit", 20);
pub const TG_X: Field = Field::start("tg_x", 24);
pub const TG_Y: Field = Field::start("tg_y", 28);
/// Seed value on entry, the `f32` result on exit.
pub const RESULT: Field = Field::end("result", 4);

pub const LAYOUT: Layout = Layout {
    name: "linear_inorder",
    fields: &[BASE, NELS, OFFSET, STRIDE, ITER, LIMIT, TG_X, TG_Y, RESULT],
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearInorderArgs {
    pub base: Eva,
    pub nels: u32,
    pub offset: u32,
    pub stride: u32,
    pub iter: u32,
    pub limit: u32,
    pub tg_dim: Coordinate,
    pub result: f32,
}

impl DmemRecord for LinearInorderArgs {
    const LAYOUT: Layout = LAYOUT;

    fn to_words(&self) -> Vec<u32> {
        vec![
            self.base,
            self.nels,
            self.offset,
            self.stride,
            self.iter,
            self.limit,
            self.tg_dim.x,
            self.tg_dim.y,
            self.result.to_bits(),
        ]
    }

    fn from_words(words: &[u32]) -> Result<Self, SimError> {
        check_word_count(&Self::LAYOUT, words)?;
        Ok(Self {
            base: words[0],
            nels: words[1],
            offset: words[2],
            stride: words[3],
            iter: words[4],
            limit: words[5],
            tg_dim: Coordinate::new(words[6], words[7]),
            result: f32::from_bits(words[8]),
        })
    }
}
