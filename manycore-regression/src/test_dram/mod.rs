// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! DRAM sum regression.
//!
//! The last tile of the array reads a buffer holding `0..len` word by word
//! and adds each value into its result. The host expects
//! `len * (len - 1) / 2`.

pub mod host;
pub mod layout;
pub mod tile;
