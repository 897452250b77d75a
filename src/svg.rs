use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::data::osm::OsmId;
use crate::errors::Result;
use crate::range::{RangeTracker, Ranges};

/// A way or merged chain rendered down to an SVG path string.
#[derive(Debug, Clone, PartialEq)]
pub struct SvgPath {
    pub d: String,
    pub is_open: bool,
}

pub fn open_map(ranges: &Ranges) -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="{} {} {} {}">"#,
        ranges.lon.min,
        ranges.lat.min,
        ranges.lon.max - ranges.lon.min,
        ranges.lat.max - ranges.lat.min,
    )
}

pub fn close_map() -> &'static str {
    "</svg>"
}

/// Flips the y axis so north points up; lon maps to x and lat to y.
pub fn transform_map_coordinates(ranges: &Ranges) -> String {
    format!(
        r#"transform="translate(0, {}) scale(1 -1)""#,
        ranges.lat.min + ranges.lat.max,
    )
}

/// Renders refs into a `M{lon} {lat}L...` path, resolving each ref through the
/// tracker. Unresolvable refs drop out of the geometry.
pub fn way_path(refs: &[OsmId], nodes: &mut RangeTracker) -> String {
    let points: Vec<String> = refs
        .iter()
        .filter_map(|&id| nodes.get_node(id))
        .map(|node| format!("{} {}", node.lon, node.lat))
        .collect();
    format!("M{}", points.join("L"))
}

/// `--` terminates an XML comment early, so tag values carried into comment
/// blocks get it split up.
pub fn safe_in_comment(s: &str) -> String {
    s.replace("--", "- -")
}

/// Deterministic value → color mapping. The same value string yields the same
/// color in every run; collisions between unrelated values are acceptable.
pub fn color_for(value: &str) -> String {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    let hash = hasher.finish();
    let hue = hash % 360;
    let saturation = 55 + (hash >> 16) % 35;
    let lightness = 35 + (hash >> 32) % 30;
    format!("hsl({hue}, {saturation}%, {lightness}%)")
}

/// Buffered file sink for one SVG document. `write` suspends while the sink
/// drains, which is the pipeline's only backpressure point; the handle is
/// released exactly once whether writing succeeds or fails, `close` just
/// flushes first so errors surface.
pub struct SvgStream {
    writer: BufWriter<File>,
}

impl SvgStream {
    pub async fn create(path: &Path) -> Result<SvgStream> {
        let file = File::create(path).await?;
        Ok(SvgStream {
            writer: BufWriter::new(file),
        })
    }

    pub async fn write(&mut self, data: &str) -> Result<()> {
        self.writer.write_all(data.as_bytes()).await?;
        Ok(())
    }

    pub async fn close(mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
