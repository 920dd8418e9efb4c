//! # `scenery-core`
//!
//! A pure-Rust library that converts Microsoft Flight Simulator scenery
//! packages ("BGL" files plus their embedded models) into a FlightGear
//! tile-tree: merged per-tile glTF and/or AC3D models, copied textures,
//! and STG placement files.
//!
//! ## Supported Formats
//!
//! - **BGL** - scenery placement and airport container files
//! - **RIFF/GXML/GLBD** - MSFS's embedded-model container wrapping glTF 2.0 (GLB)
//! - **BTG** - FlightGear binary terrain geometry, used for elevation lookups
//! - **AC3D** - the legacy ASCII model format FlightGear accepted before glTF
//!
//! ## Quick Start
//!
//! ```no_run
//! use scenery_core::pipeline::{ConversionConfig, convert_scenery};
//!
//! let config = ConversionConfig::new("Addon/Scenery", "fgfs-scenery")
//!     .with_gltf(true)
//!     .with_ac3d(true);
//! let report = convert_scenery(&config, None)?;
//! println!("wrote {} tiles", report.tiles_written);
//! # Ok::<(), scenery_core::Error>(())
//! ```
//!
//! ### Using the Prelude
//!
//! ```
//! use scenery_core::prelude::*;
//! ```

pub mod assembler;
pub mod bgl;
pub mod config;
pub mod emit;
pub mod error;
pub mod geo;
pub mod model;
pub mod pipeline;
pub mod terrain;

pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::assembler::{ModelIndex, TileAssembler};
    pub use crate::bgl::{Airport, BgWalker, LibraryPlacement, PlacementsByGuid, SimObjectPlacement};
    pub use crate::config::ConversionConfig;
    pub use crate::error::{Error, Result};
    pub use crate::geo::tile_index::{TileIndex, get_lat_lon_of_tile, get_tile_index};
    pub use crate::pipeline::{AbortFlags, ConversionReport, Observer, convert_scenery};
    pub use crate::terrain::{StubTerrainService, TerrainService};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
