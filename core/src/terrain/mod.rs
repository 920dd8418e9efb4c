//! `TerrainService`: ground elevation lookups for placement altitude
//! resolution, backed by a process-wide tile cache over BTG meshes.

pub mod btg;
pub mod provider;
pub mod sampler;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Instant;

use tracing::{debug, warn};

use crate::error::Result;
use crate::geo::tile_index::get_tile_index;
pub use provider::{HttpTerrainProvider, LocalTerrainProvider, TerrainTileProvider};

/// Abstract ground-elevation lookup. The pipeline never depends on a
/// concrete implementation; a stub returning a constant is a valid
/// substitute when no terrain source is configured.
pub trait TerrainService: Send + Sync {
    /// Returns ground elevation in meters at `(lat, lon)`.
    ///
    /// # Errors
    /// Implementations may return an error if the lookup cannot be
    /// completed; callers treat this as non-fatal and fall back to the
    /// placement's raw altitude.
    fn get_elevation(&self, lat: f64, lon: f64) -> Result<f64>;
}

/// Always returns a fixed elevation. Used in tests and whenever no
/// terrain source is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubTerrainService {
    fixed_elevation: f64,
}

impl StubTerrainService {
    #[must_use]
    pub fn with_fixed_elevation(elevation: f64) -> Self {
        Self {
            fixed_elevation: elevation,
        }
    }
}

impl TerrainService for StubTerrainService {
    fn get_elevation(&self, _lat: f64, _lon: f64) -> Result<f64> {
        Ok(self.fixed_elevation)
    }
}

struct CacheEntry {
    meshes: Vec<btg::BtgMesh>,
    locked: AtomicBool,
    #[allow(dead_code)]
    inserted_at: Instant,
}

/// Resolves elevation by fetching and decoding the BTG meshes covering
/// a tile, caching them process-wide. An entry's `locked` bit is set
/// for the duration of a lookup so the (currently unbounded) cache
/// could be LRU-pruned externally without racing an in-flight read.
pub struct DefaultTerrainService<P: TerrainTileProvider> {
    provider: P,
    cache: RwLock<HashMap<u32, CacheEntry>>,
}

impl<P: TerrainTileProvider> DefaultTerrainService<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn ensure_cached(&self, tile_key: u32, tile: crate::geo::TileIndex, lat: f64, lon: f64) -> Result<()> {
        if self.cache.read().unwrap().contains_key(&tile_key) {
            return Ok(());
        }

        let mut meshes = Vec::new();
        match self.provider.fetch_index(tile, lat, lon) {
            Ok(entries) => {
                for entry in entries {
                    match self.provider.fetch_btg(lat, lon, &entry.filename) {
                        Ok(bytes) => match btg::decode(std::io::Cursor::new(bytes)) {
                            Ok(mesh) => meshes.push(mesh),
                            Err(e) => warn!(error = %e, file = entry.filename, "failed to decode BTG"),
                        },
                        Err(e) => warn!(error = %e, file = entry.filename, "failed to fetch BTG"),
                    }
                }
            }
            Err(e) => {
                debug!(error = %e, "no terrain index for tile; caching empty mesh set");
            }
        }

        self.cache.write().unwrap().insert(
            tile_key,
            CacheEntry {
                meshes,
                locked: AtomicBool::new(false),
                inserted_at: Instant::now(),
            },
        );
        Ok(())
    }

    /// Drops cache entries not currently locked by an in-flight lookup.
    /// No automatic eviction policy runs; callers invoke this under
    /// memory pressure.
    pub fn prune_unlocked(&self) {
        self.cache
            .write()
            .unwrap()
            .retain(|_, entry| entry.locked.load(Ordering::SeqCst));
    }
}

impl<P: TerrainTileProvider> TerrainService for DefaultTerrainService<P> {
    fn get_elevation(&self, lat: f64, lon: f64) -> Result<f64> {
        let tile = get_tile_index(lat, lon)?;
        let tile_key = tile.value();
        self.ensure_cached(tile_key, tile, lat, lon)?;

        let guard = self.cache.read().unwrap();
        let entry = guard.get(&tile_key).expect("just inserted by ensure_cached");
        entry.locked.store(true, Ordering::SeqCst);

        let max_alt = entry
            .meshes
            .iter()
            .filter_map(|mesh| sampler::sample_altitude(mesh, lat, lon))
            .fold(None, |acc: Option<f64>, alt| {
                Some(acc.map_or(alt, |a| a.max(alt)))
            })
            .unwrap_or(0.0);

        entry.locked.store(false, Ordering::SeqCst);
        Ok(max_alt)
    }
}
