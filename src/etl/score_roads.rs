use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use log::info;

use crate::{
    collector::WayCollector,
    config::Config,
    data::Collection,
    errors::Result,
    pipeline::Pipeline,
};

use super::{parse_osm::OsmXmlReader, Etl};

pub const ETL_NAME: &str = "score_roads";
pub const OUTPUT_FILE_NAME: &str = "collections.jsonl";
const PARTIAL_FILE_NAME: &str = "collections.jsonl.partial";

/// Reads the map, joins its roads, runs the configured stages and writes one
/// JSON collection per line.
///
/// Stages run lazily while loading, so each collection is written as soon as it
/// leaves the pipeline. Only the collector output and buffering stages such as
/// sorting hold every collection at once. Lines go to a partial file that is
/// renamed into place once the pipeline has finished without error.
pub struct ScoreRoadsEtl<'a> {
    config: &'a Config,
    pipeline: Pipeline,
}

impl<'a> ScoreRoadsEtl<'a> {
    /// Fails on a misconfigured pipeline before any data is read.
    pub fn new(config: &'a Config) -> Result<Self> {
        Ok(ScoreRoadsEtl {
            config,
            pipeline: config.build_pipeline()?,
        })
    }

    pub fn output_path(dir: &Path) -> PathBuf {
        dir.join(OUTPUT_FILE_NAME)
    }

    /// Run the pipeline over `collections`, writing each result to `path`.
    fn write_scored(&self, path: &Path, collections: Vec<Collection>) -> Result<usize> {
        let mut writer = BufWriter::new(File::create(path)?);
        let mut written = 0;
        for collection in tqdm::tqdm(self.pipeline.run(collections)) {
            serde_json::to_writer(&mut writer, &collection?)?;
            writer.write_all(b"\n")?;
            written += 1;
        }
        writer.flush()?;
        Ok(written)
    }
}

impl Etl for ScoreRoadsEtl<'_> {
    type Input = Vec<Collection>;
    type Output = Vec<Collection>;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        Ok(Self::output_path(dir).try_exists()?)
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        fs::remove_file(Self::output_path(dir))?;
        Ok(())
    }

    fn extract(&mut self, _dir: &Path) -> Result<Self::Input> {
        let elements = OsmXmlReader::open_path(Path::new(&self.config.data_path))?;
        WayCollector::new(self.config.collector.clone()).collect(elements)
    }

    /// Pass the joined collections on to `load`, which drives the pipeline.
    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        info!(collections = input.len(), stages = self.pipeline.stage_names().len(); "Collections ready for scoring");
        Ok(input)
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        fs::create_dir_all(dir)?;
        let partial_path = dir.join(PARTIAL_FILE_NAME);
        let written = self.write_scored(&partial_path, output);
        if written.is_err() {
            fs::remove_file(&partial_path).ok();
        }
        let written = written?;
        fs::rename(&partial_path, Self::output_path(dir))?;
        info!(collections = written; "Pipeline finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::{collection::fixtures::way, JoinType, Way},
        errors::ErrorKind,
        pipeline::validate::Validate,
    };

    fn validating_etl(config: &Config) -> ScoreRoadsEtl<'_> {
        ScoreRoadsEtl {
            config,
            pipeline: Pipeline::new(vec![Box::new(Validate)]).unwrap(),
        }
    }

    fn road(name: &str, ways: Vec<Way>) -> Collection {
        Collection::new(JoinType::Name, Some(name.into()), ways)
    }

    #[test]
    fn load_writes_each_collection_as_it_is_scored() {
        let config = Config::from_json(r#"{"data_path": "unused.osm"}"#).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let collections = vec![
            road("Notch Road", vec![way(1, &[1, 2], &[(44.0, -73.0), (44.001, -73.0)])]),
            road("Gap Road", vec![way(2, &[3, 4], &[(44.1, -73.0), (44.101, -73.0)])]),
        ];
        validating_etl(&config).load(dir.path(), collections).unwrap();

        let written = fs::read_to_string(ScoreRoadsEtl::output_path(dir.path())).unwrap();
        assert_eq!(written.lines().count(), 2);
        assert!(!dir.path().join(PARTIAL_FILE_NAME).exists());
    }

    #[test]
    fn failing_stage_leaves_no_output_behind() {
        let config = Config::from_json(r#"{"data_path": "unused.osm"}"#).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let broken = road(
            "Broken Road",
            vec![
                way(1, &[1, 2], &[(44.0, -73.0), (44.001, -73.0)]),
                way(2, &[7, 8], &[(45.0, -73.0), (45.001, -73.0)]),
            ],
        );
        let collections = vec![road("Notch Road", vec![way(3, &[3, 4], &[(44.1, -73.0), (44.101, -73.0)])]), broken];

        let mut etl = validating_etl(&config);
        let err = etl.load(dir.path(), collections).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Invalid);
        assert!(!etl.is_cached(dir.path()).unwrap());
        assert!(!dir.path().join(PARTIAL_FILE_NAME).exists());
    }
}
