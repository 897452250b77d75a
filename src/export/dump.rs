use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::data::osm::OsmItem;
use crate::errors::Result;

/// Appends every ingested item as one JSON line, in arrival order. The file
/// can be fed back in as an input, skipping the XML decode.
pub struct DumpWriter {
    writer: BufWriter<File>,
}

impl DumpWriter {
    pub async fn create(path: &Path) -> Result<DumpWriter> {
        let file = File::create(path).await?;
        Ok(DumpWriter {
            writer: BufWriter::new(file),
        })
    }

    pub async fn write_item(&mut self, item: &OsmItem) -> Result<()> {
        let mut line = serde_json::to_string(item)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        Ok(())
    }

    pub async fn close(mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
