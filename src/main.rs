use std::env;
use std::io;
use std::path::{Path, PathBuf};

use structured_logger::json::new_writer;
use structured_logger::Builder;

use road_curvature::config::Config;
use road_curvature::errors::Result;
use road_curvature::etl::score_roads::ScoreRoadsEtl;
use road_curvature::etl::Etl;

const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Output for `data/vermont.osm.xz` goes to `<output_dir>/vermont.osm.xz/`.
fn output_dir(config: &Config) -> Result<PathBuf> {
    let input_fname = Path::new(&config.data_path)
        .file_name()
        .ok_or("Could not get input file name")?;
    Ok(Path::new(&config.output_dir).join(input_fname))
}

fn setup_logging(level: &str) {
    Builder::with_level(level)
        .with_target_writer("*", new_writer(io::stderr()))
        .init();
}

fn main() -> Result<()> {
    let config_path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(Path::new(&config_path))?;
    setup_logging(&config.log_level);

    let mut etl = ScoreRoadsEtl::new(&config)?;
    etl.process(&output_dir(&config)?, config.overwrite)?;
    Ok(())
}
