//! `ConversionConfig`: the pipeline's single configuration surface,
//! constructible programmatically or loaded from a small TOML document
//! (mirroring the shape, not the exhaustive field set, of a GUI-facing
//! settings file).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Which terrain backend to resolve placement altitudes against.
#[derive(Debug, Clone, PartialEq)]
pub enum TerrainProviderConfig {
    /// Always returns a fixed elevation; no I/O. The default when no
    /// terrain source is configured.
    Stub { fixed_elevation: f64 },
    /// A local TerraSync-style directory tree.
    Local { dir: PathBuf },
    /// A remote TerraSync HTTP mirror.
    Http { base_url: String },
}

impl Default for TerrainProviderConfig {
    fn default() -> Self {
        Self::Stub { fixed_elevation: 0.0 }
    }
}

/// Programmatic configuration for [`crate::pipeline::convert_scenery`].
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub emit_gltf: bool,
    pub emit_ac3d: bool,
    pub terrain: TerrainProviderConfig,
    pub parallel_tiles: bool,
}

impl ConversionConfig {
    /// Starts from `(input, output)` with glTF emission on, AC3D off, a
    /// stub terrain service, and sequential tile processing — override
    /// with the `with_*` builder methods.
    #[must_use]
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            emit_gltf: true,
            emit_ac3d: false,
            terrain: TerrainProviderConfig::default(),
            parallel_tiles: false,
        }
    }

    #[must_use]
    pub fn with_gltf(mut self, enabled: bool) -> Self {
        self.emit_gltf = enabled;
        self
    }

    #[must_use]
    pub fn with_ac3d(mut self, enabled: bool) -> Self {
        self.emit_ac3d = enabled;
        self
    }

    #[must_use]
    pub fn with_terrain(mut self, terrain: TerrainProviderConfig) -> Self {
        self.terrain = terrain;
        self
    }

    #[must_use]
    pub fn with_parallel_tiles(mut self, enabled: bool) -> Self {
        self.parallel_tiles = enabled;
        self
    }

    /// Parses the TOML shape `[paths] input=... output=...`,
    /// `[output] gltf=... ac3d=...`, `[terrain] provider="local"|"http"|"stub"`,
    /// `[terrain.local] dir=...`, `[terrain.http] base_url=...`.
    ///
    /// # Errors
    /// Returns [`Error::Config`] on malformed TOML, a missing
    /// `[paths]` section, or a selected terrain provider missing its
    /// required sub-table.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(text)?;
        raw.try_into()
    }

    /// Reads and parses a configuration file at `path`.
    ///
    /// # Errors
    /// Propagates I/O errors opening `path`; see [`Self::from_toml_str`]
    /// for parse errors.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    paths: RawPaths,
    #[serde(default = "default_raw_output")]
    output: RawOutput,
    #[serde(default = "default_raw_terrain")]
    terrain: RawTerrain,
}

#[derive(Debug, Deserialize)]
struct RawPaths {
    input: String,
    output: String,
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    #[serde(default = "default_true")]
    gltf: bool,
    #[serde(default)]
    ac3d: bool,
}

fn default_raw_output() -> RawOutput {
    RawOutput { gltf: true, ac3d: false }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RawTerrain {
    #[serde(default = "default_provider_name")]
    provider: String,
    local: Option<RawTerrainLocal>,
    http: Option<RawTerrainHttp>,
}

fn default_raw_terrain() -> RawTerrain {
    RawTerrain { provider: default_provider_name(), local: None, http: None }
}

fn default_provider_name() -> String {
    "stub".to_string()
}

#[derive(Debug, Deserialize)]
struct RawTerrainLocal {
    dir: String,
}

#[derive(Debug, Deserialize)]
struct RawTerrainHttp {
    base_url: String,
}

impl TryFrom<RawConfig> for ConversionConfig {
    type Error = Error;

    fn try_from(raw: RawConfig) -> Result<Self> {
        if raw.paths.input.is_empty() || raw.paths.output.is_empty() {
            return Err(Error::Config("[paths] input and output are required".into()));
        }

        let terrain = match raw.terrain.provider.as_str() {
            "local" => {
                let dir = raw
                    .terrain
                    .local
                    .ok_or_else(|| Error::Config("[terrain.local] dir is required for provider = \"local\"".into()))?
                    .dir;
                TerrainProviderConfig::Local { dir: PathBuf::from(dir) }
            }
            "http" => {
                let base_url = raw
                    .terrain
                    .http
                    .ok_or_else(|| Error::Config("[terrain.http] base_url is required for provider = \"http\"".into()))?
                    .base_url;
                TerrainProviderConfig::Http { base_url }
            }
            "stub" | "" => TerrainProviderConfig::default(),
            other => return Err(Error::Config(format!("unknown terrain provider {other:?}"))),
        };

        Ok(Self {
            input_path: PathBuf::from(raw.paths.input),
            output_path: PathBuf::from(raw.paths.output),
            emit_gltf: raw.output.gltf,
            emit_ac3d: raw.output.ac3d,
            terrain,
            parallel_tiles: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_to_gltf_only_with_stub_terrain() {
        let config = ConversionConfig::new("in", "out");
        assert!(config.emit_gltf);
        assert!(!config.emit_ac3d);
        assert_eq!(config.terrain, TerrainProviderConfig::Stub { fixed_elevation: 0.0 });
    }

    #[test]
    fn loads_minimal_toml_with_defaults() {
        let config = ConversionConfig::from_toml_str(
            r#"
            [paths]
            input = "Addon/Scenery"
            output = "fgfs-scenery"
            "#,
        )
        .unwrap();
        assert_eq!(config.input_path, PathBuf::from("Addon/Scenery"));
        assert!(config.emit_gltf);
        assert!(!config.emit_ac3d);
    }

    #[test]
    fn loads_local_terrain_provider() {
        let config = ConversionConfig::from_toml_str(
            r#"
            [paths]
            input = "a"
            output = "b"
            [output]
            gltf = true
            ac3d = true
            [terrain]
            provider = "local"
            [terrain.local]
            dir = "/srv/terrasync"
            "#,
        )
        .unwrap();
        assert!(config.emit_ac3d);
        assert_eq!(config.terrain, TerrainProviderConfig::Local { dir: PathBuf::from("/srv/terrasync") });
    }

    #[test]
    fn local_provider_without_subtable_is_an_error() {
        let result = ConversionConfig::from_toml_str(
            r#"
            [paths]
            input = "a"
            output = "b"
            [terrain]
            provider = "local"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn missing_paths_section_is_an_error() {
        assert!(ConversionConfig::from_toml_str("").is_err());
    }
}
