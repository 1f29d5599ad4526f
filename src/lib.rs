//! Reads MagicaVoxel `.vox` files, either as a list of sparse models with
//! their palette and materials ([`semantic`]) or as a single dense grid
//! ([`dense`]). Both are assembled from the same [chunk tree](`syntax`).
//! # Reading a model
//! ```no_run
//! let vox = vox_reader::semantic::parse_file("pyramid.vox").unwrap();
//! for model in &vox.models {
//!     println!("{:?}: {} voxels", model.size, model.voxels.len());
//! }
//! ```

pub mod cursor;
pub mod dense;
mod error;
pub mod semantic;
pub mod syntax;

pub use error::{Result, VoxError};
