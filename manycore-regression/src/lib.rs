// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Traffic-generator regressions for the simulated manycore.
//!
//! Each regression is a pair of programs that share a DMEM layout: a host
//! driver that configures the machine and checks the results, and a DPI
//! tile that generates memory traffic one cycle at a time.
//!
//!  - [`linear_inorder`]: every tile divides a seed value by a strided
//!    sequence of DRAM elements, synchronised by barriers.
//!  - [`test_dram`]: one tile sums a small DRAM buffer.

pub mod config;
pub mod linear_inorder;
pub mod report;
pub mod test_dram;
pub mod test_helpers;
