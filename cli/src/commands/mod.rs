use std::path::PathBuf;

use clap::Subcommand;

pub mod convert;
pub mod inspect_bgl;
pub mod tile_index;

#[derive(Subcommand)]
pub enum Commands {
    /// Convert an MSFS BGL scenery package into a FlightGear tile tree
    Convert {
        /// Root directory of the addon's Scenery folder
        #[arg(short, long)]
        source: PathBuf,

        /// Output FlightGear scenery root
        #[arg(short, long)]
        destination: PathBuf,

        /// Emit composite glTF tiles
        #[arg(long, default_value_t = true)]
        gltf: bool,

        /// Emit composite AC3D tiles
        #[arg(long, default_value_t = false)]
        ac3d: bool,

        /// TerraSync-style local terrain directory, for ground-elevation lookups
        #[arg(long)]
        terrain_dir: Option<PathBuf>,
    },

    /// Print a BGL's top-level record table
    InspectBgl {
        /// BGL file to inspect
        #[arg(short, long)]
        source: PathBuf,
    },

    /// Compute the packed FlightGear tile index for a (lat, lon) pair
    TileIndex {
        /// Latitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Longitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,

        /// Look up a tile's origin by its packed index instead
        #[arg(long, conflicts_with_all = ["lat", "lon"])]
        index: Option<u32>,
    },
}

impl Commands {
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            Commands::Convert { source, destination, gltf, ac3d, terrain_dir } => {
                convert::execute(source, destination, *gltf, *ac3d, terrain_dir.as_deref())
            }
            Commands::InspectBgl { source } => inspect_bgl::execute(source),
            Commands::TileIndex { lat, lon, index } => {
                if let Some(index) = index {
                    tile_index::execute_from_index(*index)
                } else {
                    let lat = lat.ok_or_else(|| anyhow::anyhow!("--lat is required unless --index is given"))?;
                    let lon = lon.ok_or_else(|| anyhow::anyhow!("--lon is required unless --index is given"))?;
                    tile_index::execute_from_lat_lon(lat, lon)
                }
            }
        }
    }
}
