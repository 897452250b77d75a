use std::path::Path;

use indexmap::IndexMap;
use log::info;

use crate::data::Data;
use crate::data::osm::Tags;
use crate::errors::Result;
use crate::export::Export;
use crate::range::{RangeTracker, Ranges};
use crate::relations::{merge_ways, relation_ways};
use crate::svg::{
    close_map, color_for, open_map, safe_in_comment, transform_map_coordinates, way_path, SvgPath,
    SvgStream,
};

const WAYS_DIR_NAME: &str = "attr_maps_ways";
const RELATIONS_DIR_NAME: &str = "attr_maps_relations";

/// One indexed entity: its rendered geometry plus the full tag map it came
/// with, kept so every output file can dump the source tags next to the paths.
pub struct TagValueEntry<'a> {
    pub payload: Vec<SvgPath>,
    pub all_tags: &'a Tags,
}

/// Groups entities by tag name, then by exact tag value. Both levels and the
/// entry lists inside them keep first-seen order; a bucket, once created, is
/// never removed for the rest of the run.
#[derive(Default)]
pub struct TagAttributeIndex<'a> {
    tags: IndexMap<&'a str, IndexMap<&'a str, Vec<TagValueEntry<'a>>>>,
}

impl<'a> TagAttributeIndex<'a> {
    pub fn new() -> TagAttributeIndex<'a> {
        TagAttributeIndex::default()
    }

    /// Files the payload under every tag the entity carries. Entities without
    /// tags contribute nothing.
    pub fn add(&mut self, all_tags: &'a Tags, payload: Vec<SvgPath>) {
        for (tag_name, value) in all_tags {
            self.tags
                .entry(tag_name.as_str())
                .or_default()
                .entry(value.as_str())
                .or_default()
                .push(TagValueEntry {
                    payload: payload.clone(),
                    all_tags,
                });
        }
    }

    pub fn tags(&self) -> &IndexMap<&'a str, IndexMap<&'a str, Vec<TagValueEntry<'a>>>> {
        &self.tags
    }
}

pub fn attribute_map_file_name(base_name: &str, tag_name: &str) -> String {
    // colons are reserved on the target filesystems
    format!("{}-{}.svg", base_name, tag_name.replace(':', "_"))
}

/// Renders one SVG per tag name into `dir`. Values are styled by their
/// assigned color, every entry carries its source tags as a comment block, and
/// open geometries get the `o` class. Files are written strictly one at a
/// time.
async fn write_attribute_maps(
    index: &TagAttributeIndex<'_>,
    dir: &Path,
    base_name: &str,
    ranges: &Ranges,
) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    for (tag_name, values) in index.tags() {
        let path = dir.join(attribute_map_file_name(base_name, tag_name));
        let mut stream = SvgStream::create(&path).await?;
        stream.write(&open_map(ranges)).await?;
        stream.write("<style>").await?;
        for (idx, value) in values.keys().enumerate() {
            let color = color_for(value);
            stream
                .write(&format!(
                    "\n.v{idx} path {{ fill: {color}; stroke: {color}; <!-- {} --> }}",
                    safe_in_comment(value),
                ))
                .await?;
        }
        stream
            .write("\npath { stroke-width: 0.0001; fill-opacity: 0.4; }\npath.o { fill: none; }\n</style>")
            .await?;
        stream
            .write(&format!("<g {}>", transform_map_coordinates(ranges)))
            .await?;
        for (idx, (value, entries)) in values.iter().enumerate() {
            stream
                .write(&format!("<g class=\"v{idx}\"> <!-- {} -->", safe_in_comment(value)))
                .await?;
            for entry in entries {
                stream.write("<g> <!--\n").await?;
                for (tag_name, value) in entry.all_tags {
                    stream
                        .write(&format!("{tag_name}: {}\n", safe_in_comment(value)))
                        .await?;
                }
                stream.write("-->").await?;
                for path in &entry.payload {
                    let class = if path.is_open { "class=\"o\" " } else { "" };
                    stream
                        .write(&format!("<path {}d=\"{}\" />", class, path.d))
                        .await?;
                }
                stream.write("</g>").await?;
            }
            stream.write("</g>").await?;
        }
        stream.write("</g>").await?;
        stream.write(close_map()).await?;
        stream.close().await?;
    }
    Ok(())
}

/// Tag-grouped maps built from every tagged way's own geometry.
pub struct WayAttributeMapsExport {
    base_name: String,
}

impl WayAttributeMapsExport {
    pub fn new(base_name: &str) -> WayAttributeMapsExport {
        WayAttributeMapsExport {
            base_name: base_name.to_string(),
        }
    }
}

impl Export for WayAttributeMapsExport {
    fn export_name(&self) -> &str {
        "way_attribute_maps"
    }

    async fn run(&mut self, data: &Data, dir: &Path) -> Result<()> {
        let mut nodes = RangeTracker::new(&data.nodes);
        let mut index = TagAttributeIndex::new();
        for way in data.ways.values() {
            if way.tags.is_empty() {
                continue;
            }
            let d = way_path(&way.refs, &mut nodes);
            index.add(
                &way.tags,
                vec![SvgPath {
                    d,
                    is_open: way.is_open(),
                }],
            );
        }

        let Some(ranges) = nodes.ranges() else {
            info!(export_name = self.export_name(); "No nodes resolved; skipping export");
            return Ok(());
        };
        write_attribute_maps(&index, &dir.join(WAYS_DIR_NAME), &self.base_name, &ranges).await
    }
}

/// Tag-grouped maps built from relations: each relation's membership graph is
/// flattened to ways, the ways are stitched into chains, and the chains are
/// filed under the relation's own (top-level) tags.
pub struct RelationAttributeMapsExport {
    base_name: String,
}

impl RelationAttributeMapsExport {
    pub fn new(base_name: &str) -> RelationAttributeMapsExport {
        RelationAttributeMapsExport {
            base_name: base_name.to_string(),
        }
    }
}

impl Export for RelationAttributeMapsExport {
    fn export_name(&self) -> &str {
        "relation_attribute_maps"
    }

    async fn run(&mut self, data: &Data, dir: &Path) -> Result<()> {
        let mut nodes = RangeTracker::new(&data.nodes);
        let mut index = TagAttributeIndex::new();
        for relation in data.relations.values() {
            let ways = relation_ways(relation, &data.relations, &data.ways, &[]);
            let merged = merge_ways(&ways);
            if merged.is_empty() || merged.iter().all(|way| way.refs.is_empty()) {
                continue;
            }
            let payload: Vec<SvgPath> = merged
                .iter()
                .map(|way| SvgPath {
                    d: way_path(&way.refs, &mut nodes),
                    is_open: way.is_open(),
                })
                .collect();
            index.add(&relation.tags, payload);
        }

        let Some(ranges) = nodes.ranges() else {
            info!(export_name = self.export_name(); "No nodes resolved; skipping export");
            return Ok(());
        };
        write_attribute_maps(&index, &dir.join(RELATIONS_DIR_NAME), &self.base_name, &ranges).await
    }
}
