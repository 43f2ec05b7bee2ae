// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! A cycle-stepped host runtime for a simulated manycore tile array.
//!
//! The [`Manycore`](crate::manycore::Manycore) owns a rectangle of *DPI tiles*
//! (tiles whose behaviour is provided by host-side code implementing
//! [`DpiTile`](crate::tile::DpiTile)), one DRAM bank per column, and a host
//! endpoint. A host driver uses it the way a regression program uses the real
//! runtime:
//!
//!  1. write configuration words into tile DMEM and data into DRAM,
//!  2. set each tile's group origin and unfreeze it,
//!  3. wait for finish packets while the tiles generate traffic,
//!  4. read results back, freeze the tiles and exit.
//!
//! Every cycle each unfrozen tile that still has credits is offered the chance
//! to send one request through
//! [`send_request`](crate::tile::DpiTile::send_request); responses come back
//! through [`receive_response`](crate::tile::DpiTile::receive_response) in the
//! order their requests were serviced.
//!
//! # Simple Application
//!
//! ```rust
//! use manycore_sim::config::ManycoreConfig;
//! use manycore_sim::manycore::Manycore;
//! use manycore_sim::packet::{RequestPacket, ResponsePacket};
//! use manycore_sim::tile::{DpiTile, TileContext, TilePort};
//! use manycore_sim::types::{Coordinate, SimError, SimResult};
//! use manycore_track::entity::toplevel;
//! use manycore_track::tracker::dev_null_tracker;
//!
//! /// A tile that finishes as soon as it is unfrozen.
//! struct FinishTile;
//!
//! impl DpiTile for FinishTile {
//!     fn send_request(
//!         &mut self,
//!         ctx: &mut TileContext,
//!     ) -> Result<Option<RequestPacket>, SimError> {
//!         ctx.set_finished();
//!         Ok(Some(ctx.finish()))
//!     }
//!
//!     fn receive_response(&mut self, _ctx: &mut TileContext, _rsp: &ResponsePacket) -> SimResult {
//!         Ok(())
//!     }
//! }
//!
//! let tracker = dev_null_tracker();
//! let top = toplevel(&tracker, "top");
//! let config = ManycoreConfig {
//!     dimension_vcore: Coordinate::new(1, 1),
//!     ..Default::default()
//! };
//! let mut mc = Manycore::new(&top, config, &|_| Box::new(FinishTile)).unwrap();
//! let target = mc.config().origin_vcore;
//! mc.tile_unfreeze(&target).unwrap();
//! assert_eq!(mc.wait_finish(Some(100)).unwrap(), target);
//! mc.exit().unwrap();
//! ```

pub mod address;
pub mod barrier;
pub mod config;
pub mod layout;
pub mod manycore;
pub mod memory;
pub mod network;
pub mod packet;
pub mod test_helpers;
pub mod tile;
pub mod types;
