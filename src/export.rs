pub mod attr_maps;
pub mod dump;
pub mod map;
pub mod stats;

use std::path::Path;

use log::{error, info};

use crate::data::Data;
use crate::errors::Result;

/// One output family rendered from the collected map data. Exports run
/// strictly one after another; `process` wraps `run` with the bookkeeping
/// logging shared by all of them.
pub trait Export {
    fn export_name(&self) -> &str;

    async fn run(&mut self, data: &Data, dir: &Path) -> Result<()>;

    async fn process(&mut self, data: &Data, dir: &Path) -> Result<()> {
        info!(export_name = self.export_name(); "Starting export");
        match self.run(data, dir).await {
            Ok(()) => {
                info!(export_name = self.export_name(); "Export finished");
                Ok(())
            }
            Err(err) => {
                error!(export_name = self.export_name(), err = err.message.as_str(); "Export failed with error");
                Err(err)
            }
        }
    }
}
