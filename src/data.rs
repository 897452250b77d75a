use indexmap::IndexMap;

use self::osm::{Metadata, Node, OsmId, OsmItem, Relation, Way};

pub mod osm;

/// Map data as decoded from the extract. Entities are kept as-is; referential
/// integrity is never checked at ingestion time and dangling references are
/// resolved lazily by consumers.
///
/// Each id map is last-write-wins on duplicate ids, and iteration follows
/// insertion order (a replaced entity keeps its original position).
#[derive(Debug, Default)]
pub struct Data {
    pub metadata: Vec<Metadata>,
    pub nodes: IndexMap<OsmId, Node>,
    pub ways: IndexMap<OsmId, Way>,
    pub relations: IndexMap<OsmId, Relation>,
}

impl Data {
    pub fn visit(&mut self, item: OsmItem) {
        match item {
            OsmItem::Metadata(metadata) => self.metadata.push(metadata),
            OsmItem::Node(node) => {
                self.nodes.insert(node.id, node);
            }
            OsmItem::Way(way) => {
                self.ways.insert(way.id, way);
            }
            OsmItem::Relation(relation) => {
                self.relations.insert(relation.id, relation);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::osm::Tags;
    use super::*;

    fn node(id: OsmId, lat: f64, lon: f64) -> OsmItem {
        OsmItem::Node(Node { id, lat, lon, tags: Tags::new() })
    }

    #[test]
    fn visit_sorts_items_into_their_maps() {
        let mut data = Data::default();
        data.visit(node(1, 50.0, 15.0));
        data.visit(OsmItem::Way(Way { id: 2, refs: vec![1], tags: Tags::new() }));
        data.visit(OsmItem::Relation(Relation { id: 3, members: Vec::new(), tags: Tags::new() }));
        data.visit(OsmItem::Metadata(Metadata::default()));

        assert_eq!(data.nodes.len(), 1);
        assert_eq!(data.ways.len(), 1);
        assert_eq!(data.relations.len(), 1);
        assert_eq!(data.metadata.len(), 1);
    }

    #[test]
    fn duplicate_ids_are_last_write_wins_in_place() {
        let mut data = Data::default();
        data.visit(node(1, 50.0, 15.0));
        data.visit(node(2, 51.0, 16.0));
        data.visit(node(1, 49.0, 14.0));

        assert_eq!(data.nodes.len(), 2);
        assert_eq!(data.nodes[&1].lat, 49.0);
        // the replacement keeps the original insertion position
        let ids: Vec<OsmId> = data.nodes.keys().copied().collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
