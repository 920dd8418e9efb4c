//! Pass-2 model indexing and per-tile assembly: building a
//! guid-to-reference map over every BGL, then instancing placements
//! sharing those GUIDs into each tile's glTF/AC3D builders.

pub mod model_index;
pub mod texture_resolver;
pub mod tile_assembler;
pub mod transform;

pub use model_index::{build_model_index, ModelReference, ModelReferencesByTile};
pub use model_index::ModelReferencesByTile as ModelIndex;
pub use texture_resolver::TextureIndex;
pub use tile_assembler::{AssembleOutcome, TileAssembler, TileOutputs};
pub use transform::{ac3d_transform, flip_z, placement_transform, TileOrigin};
