// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Strided divide regression.
//!
//! Every tile of the array reads `niters` elements of a shared DRAM buffer
//! of `f32` values, element `k` being `(k * stride + pto * idx) % nels` for
//! the tile at row-major position `idx`, and divides a seed value by each
//! element in turn. The group synchronises on two barriers around the fetch
//! loop and the origin tile brackets the kernel with start and end markers.
//! The host computes the same fold and checks each tile's result bit for bit.

pub mod host;
pub mod layout;
pub mod tile;
