use clap::Parser;
use marker_grid::Config;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Marker Grid Replay - feed a recorded scenario through the marker visibility manager
pub struct Settings {
    /// Scenario file (JSON) to replay
    #[clap(value_name = "FILE")]
    pub scenario: PathBuf,

    /// Override the finest tracked zoom level
    #[clap(long)]
    pub max_zoom: Option<u32>,

    /// Override the grid cell size in pixels
    #[clap(short, long)]
    pub tile_size: Option<u32>,

    /// Override the pixel padding added around the viewport
    #[clap(short = 'p', long)]
    pub border_padding: Option<u32>,

    /// Ignore marker move events
    #[clap(long, default_value = "false")]
    pub no_track_relocations: bool,

    /// Only print the final summary, not every change notification
    #[clap(short, long, default_value = "false")]
    pub quiet: bool,

    /// Pretty-print the summary JSON
    #[clap(long, default_value = "false")]
    pub pretty: bool,
}

impl Settings {
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    /// Apply the command-line overrides on top of a scenario's configuration
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(max_zoom) = self.max_zoom {
            config.max_zoom = max_zoom;
        }
        if let Some(tile_size) = self.tile_size {
            config.tile_size = tile_size;
        }
        if let Some(border_padding) = self.border_padding {
            config.border_padding = border_padding;
        }
        if self.no_track_relocations {
            config.track_relocations = false;
        }
        config
    }
}
