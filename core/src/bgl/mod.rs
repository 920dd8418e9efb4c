//! BGL scenery-container decoding: the top-level record walker plus the
//! placement and airport decoders layered over it.

pub mod airport;
pub mod placement;
pub mod types;
pub mod walker;

pub use types::{
    Airport, Guid, LibraryPlacement, PlacementFlags, PlacementsByGuid, SimObjectPlacement,
};
pub use walker::{
    BgWalker, RecordTableSummary, Subrecord, RECORD_TYPE_AIRPORT, RECORD_TYPE_MODEL_DATA,
    RECORD_TYPE_SCENERY_OBJECT,
};
