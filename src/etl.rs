pub mod parse_osm;
pub mod score_roads;

use std::path::Path;

use log::{error, info};

use crate::errors::Result;

/// A step that reads its input, transforms it and writes its output into a
/// directory. Steps whose output is already present are skipped unless asked
/// to start over.
pub trait Etl {
    type Input;
    type Output;

    fn etl_name(&self) -> &str;

    fn is_cached(&self, dir: &Path) -> Result<bool>;
    fn clean(&self, dir: &Path) -> Result<()>;

    fn extract(&mut self, dir: &Path) -> Result<Self::Input>;
    fn transform(&mut self, input: Self::Input) -> Result<Self::Output>;
    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()>;

    /// Log a failed phase before handing the error back.
    fn checked<T>(&self, phase: &str, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            error!(etl_name = self.etl_name(), phase = phase, err = err.message.as_str(); "ETL phase failed with error");
        }
        result
    }

    fn process(&mut self, dir: &Path, overwrite: bool) -> Result<()> {
        info!(etl_name = self.etl_name(), overwrite = overwrite; "Starting ETL process");
        let cached = self.is_cached(dir)?;
        if cached && !overwrite {
            info!(etl_name = self.etl_name(); "Output already present, nothing to do");
            return Ok(());
        }
        if cached {
            info!(etl_name = self.etl_name(); "Removing previous output");
            self.clean(dir)?;
        }

        info!(etl_name = self.etl_name(); "Extracting");
        let extracted = self.extract(dir);
        let input = self.checked("extract", extracted)?;

        info!(etl_name = self.etl_name(); "Transforming");
        let transformed = self.transform(input);
        let output = self.checked("transform", transformed)?;

        info!(etl_name = self.etl_name(); "Loading");
        let loaded = self.load(dir, output);
        self.checked("load", loaded)?;

        info!(etl_name = self.etl_name(); "Process finished");
        Ok(())
    }
}
