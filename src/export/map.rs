use std::fs;
use std::path::Path;

use log::info;

use crate::data::Data;
use crate::data::osm::Way;
use crate::errors::Result;
use crate::export::Export;
use crate::range::RangeTracker;
use crate::svg::{close_map, open_map, transform_map_coordinates, way_path};

/// Whether ways that match none of the style classes still get drawn.
const INCLUDE_UNKNOWN_LINES: bool = false;

const STYLE: &str = "<style>
    path { fill: none; stroke: black; stroke-width: 0.0001; }
    .building { fill: sandybrown; stroke: brown; }
    .forest { fill: darkgreen; stroke: darkgreen; }
    .field { fill: beige; stroke: beige; }
    .water { fill: lightskyblue; stroke: lightskyblue; }
    .highway { fill: green; stroke: green; }
    .railway { stroke: black; stroke-dasharray: 0.001, 0.001; }
    path.o { fill: none; }
    </style>";

/// The legacy whole-extract render: every way in one file, styled by a fixed
/// tag table instead of the per-tag grouping.
pub struct MapExport {
    base_name: String,
}

impl MapExport {
    pub fn new(base_name: &str) -> MapExport {
        MapExport {
            base_name: base_name.to_string(),
        }
    }
}

fn way_classes(way: &Way) -> Vec<&'static str> {
    let tags = &way.tags;
    let landuse = tags.get("landuse").map(String::as_str);
    let mut classes = Vec::new();
    if tags.contains_key("building") {
        classes.push("building");
    }
    if matches!(landuse, Some("meadow" | "forest" | "orchard")) {
        classes.push("forest");
    }
    if matches!(landuse, Some("farmland" | "grass" | "farmyard")) {
        classes.push("field");
    }
    if tags.contains_key("waterway")
        || tags.contains_key("water")
        || tags.get("natural").map(String::as_str) == Some("water")
        || tags.get("leisure").map(String::as_str) == Some("swimming_pool")
    {
        classes.push("water");
    }
    if tags.contains_key("highway") {
        classes.push("highway");
    }
    if tags.contains_key("railway") {
        classes.push("railway");
    }
    if way.is_open() {
        classes.push("o");
    }
    classes
}

impl Export for MapExport {
    fn export_name(&self) -> &str {
        "map"
    }

    async fn run(&mut self, data: &Data, dir: &Path) -> Result<()> {
        let mut nodes = RangeTracker::new(&data.nodes);
        let mut paths = Vec::new();
        for way in data.ways.values() {
            let d = way_path(&way.refs, &mut nodes);
            let classes = way_classes(way);
            if !classes.is_empty() {
                paths.push(format!(r#"<path class="{}" d="{}"/>"#, classes.join(" "), d));
            } else if INCLUDE_UNKNOWN_LINES {
                paths.push(format!(r#"<path d="{}"/>"#, d));
            }
        }

        let Some(ranges) = nodes.ranges() else {
            info!(export_name = self.export_name(); "No nodes resolved; skipping export");
            return Ok(());
        };
        let content = format!(
            "{}{}<g {}>{}</g>{}",
            open_map(&ranges),
            STYLE,
            transform_map_coordinates(&ranges),
            paths.join(""),
            close_map(),
        );
        fs::write(dir.join(format!("{}.svg", self.base_name)), content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::data::osm::Tags;

    use super::*;

    fn tagged_way(pairs: &[(&str, &str)], refs: &[i64]) -> Way {
        Way {
            id: 1,
            refs: refs.to_vec(),
            tags: pairs
                .iter()
                .map(|&(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn classes_follow_the_fixed_tag_table() {
        let way = tagged_way(&[("building", "house")], &[1, 2, 3, 1]);
        assert_eq!(way_classes(&way), vec!["building"]);

        let way = tagged_way(&[("landuse", "forest"), ("highway", "track")], &[1, 2, 1]);
        assert_eq!(way_classes(&way), vec!["forest", "highway"]);

        let way = tagged_way(&[("natural", "water")], &[1, 2, 3, 1]);
        assert_eq!(way_classes(&way), vec!["water"]);
    }

    #[test]
    fn open_ways_are_flagged_even_without_known_tags() {
        let way = tagged_way(&[], &[1, 2, 3]);
        assert_eq!(way_classes(&way), vec!["o"]);

        let ring = tagged_way(&[], &[1, 2, 3, 1]);
        assert!(way_classes(&ring).is_empty());
    }
}
