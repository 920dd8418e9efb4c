//! Tile-level output emitters: composite glTF, composite AC3D, the STG
//! placement line, and the dual-format XML model selector.

pub mod ac_emitter;
pub mod gltf_emitter;
pub mod stg_emitter;
pub mod xml_emitter;

pub use ac_emitter::AcTileBuilder;
pub use gltf_emitter::GltfTileBuilder;
pub use stg_emitter::{stg_line, StgModelFormat};
pub use xml_emitter::selector_xml;
