//! `TerrainTileProvider`: an abstract fetch of a tile's terrain index
//! and BTG payloads, substitutable so the core never hard-codes a
//! transport. Two concrete implementations are provided: a local
//! directory (TerraSync-style) and a minimal blocking HTTP client.

use std::io::Read;
use std::path::PathBuf;

use tracing::debug;

use crate::error::{Error, Result};
use crate::geo::bucket::tile_bucket_path;
use crate::geo::tile_index::TileIndex;

/// One line of a `tile.stg` index: either a regular object or the base
/// terrain mesh for the tile.
#[derive(Debug, Clone)]
pub struct TerrainIndexEntry {
    pub filename: String,
    pub is_base: bool,
}

/// Fetches the two artifacts the default `TerrainService` needs for a
/// tile: its `.stg` index (a short ASCII list of BTG filenames) and the
/// gzip-compressed BTG bytes for a named file.
pub trait TerrainTileProvider: Send + Sync {
    /// Fetches and parses `<bucket>/<tileIndex>.stg`.
    ///
    /// # Errors
    /// Returns [`Error::TerrainProvider`] if the index cannot be fetched.
    fn fetch_index(&self, tile: TileIndex, lat: f64, lon: f64) -> Result<Vec<TerrainIndexEntry>>;

    /// Fetches and gzip-decompresses `<bucket>/<name>.gz`.
    ///
    /// # Errors
    /// Returns [`Error::TerrainProvider`] if the payload cannot be fetched.
    fn fetch_btg(&self, lat: f64, lon: f64, name: &str) -> Result<Vec<u8>>;
}

fn parse_stg_index(text: &str) -> Vec<TerrainIndexEntry> {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let kind = parts.next()?;
            let filename = parts.next()?.to_string();
            match kind {
                "OBJECT" => Some(TerrainIndexEntry {
                    filename,
                    is_base: false,
                }),
                "OBJECT_BASE" => Some(TerrainIndexEntry {
                    filename,
                    is_base: true,
                }),
                _ => None,
            }
        })
        .collect()
}

fn gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Reads terrain artifacts from a local TerraSync-style directory tree:
/// `<root>/Terrain/<bucket>/<tileIndex>.stg` and `<name>.btg.gz`.
pub struct LocalTerrainProvider {
    root: PathBuf,
}

impl LocalTerrainProvider {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn tile_dir(&self, lat: f64, lon: f64) -> PathBuf {
        self.root.join("Terrain").join(tile_bucket_path(lat, lon))
    }
}

impl TerrainTileProvider for LocalTerrainProvider {
    fn fetch_index(&self, tile: TileIndex, lat: f64, lon: f64) -> Result<Vec<TerrainIndexEntry>> {
        let path = self.tile_dir(lat, lon).join(format!("{tile}.stg"));
        debug!(path = %path.display(), "reading local terrain index");
        let text = std::fs::read_to_string(&path)
            .map_err(|e| Error::TerrainProvider(format!("{}: {e}", path.display())))?;
        Ok(parse_stg_index(&text))
    }

    fn fetch_btg(&self, lat: f64, lon: f64, name: &str) -> Result<Vec<u8>> {
        let path = self.tile_dir(lat, lon).join(format!("{name}.gz"));
        let bytes = std::fs::read(&path)
            .map_err(|e| Error::TerrainProvider(format!("{}: {e}", path.display())))?;
        gunzip(&bytes)
    }
}

/// Fetches terrain artifacts over HTTP from a TerraSync mirror. Blocking
/// and synchronous, matching the pipeline's single-threaded I/O model;
/// network failures are always non-fatal (`TerrainService` falls back
/// to a zero elevation).
pub struct HttpTerrainProvider {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpTerrainProvider {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            agent: ureq::AgentBuilder::new().build(),
        }
    }

    fn url(&self, lat: f64, lon: f64, filename: &str) -> String {
        format!(
            "{}/Terrain/{}/{}",
            self.base_url.trim_end_matches('/'),
            tile_bucket_path(lat, lon),
            filename
        )
    }
}

impl TerrainTileProvider for HttpTerrainProvider {
    fn fetch_index(&self, tile: TileIndex, lat: f64, lon: f64) -> Result<Vec<TerrainIndexEntry>> {
        let url = self.url(lat, lon, &format!("{tile}.stg"));
        debug!(url, "fetching remote terrain index");
        let text = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| Error::TerrainProvider(format!("{url}: {e}")))?
            .into_string()
            .map_err(|e| Error::TerrainProvider(format!("{url}: {e}")))?;
        Ok(parse_stg_index(&text))
    }

    fn fetch_btg(&self, lat: f64, lon: f64, name: &str) -> Result<Vec<u8>> {
        let url = self.url(lat, lon, &format!("{name}.gz"));
        let mut reader = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| Error::TerrainProvider(format!("{url}: {e}")))?
            .into_reader();
        let mut compressed = Vec::new();
        reader.read_to_end(&mut compressed)?;
        gunzip(&compressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stg_index_lines() {
        let text = "OBJECT foo.btg\nOBJECT_BASE bar.btg\n# comment ignored\n";
        let entries = parse_stg_index(text);
        assert_eq!(entries.len(), 2);
        assert!(!entries[0].is_base);
        assert!(entries[1].is_base);
        assert_eq!(entries[1].filename, "bar.btg");
    }
}
