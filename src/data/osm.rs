use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub type OsmId = i64;

/// Open tag dictionary. Tag names are data, not schema, so this stays an
/// ordered string map with an unconstrained key vocabulary.
pub type Tags = IndexMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OsmItem {
    Metadata(Metadata),
    Node(Node),
    Way(Way),
    Relation(Relation),
}

impl OsmItem {
    pub fn kind_name(&self) -> &'static str {
        match self {
            OsmItem::Metadata(_) => "metadata",
            OsmItem::Node(_) => "node",
            OsmItem::Way(_) => "way",
            OsmItem::Relation(_) => "relation",
        }
    }
}

/// Header records from the extract (the `<osm>` root, `<bounds>`). Kept as an
/// open attribute map; nothing downstream interprets them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(flatten)]
    pub attrs: Tags,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: OsmId,
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub tags: Tags,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Way {
    pub id: OsmId,
    pub refs: Vec<OsmId>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub tags: Tags,
}

impl Way {
    pub fn is_open(&self) -> bool {
        is_open_refs(&self.refs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub id: OsmId,
    pub members: Vec<Member>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub tags: Tags,
}

/// Relation member. `kind` is an open string: extracts can carry member types
/// this tool does not know about, and those are reported, not rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "ref")]
    pub ref_id: OsmId,
    #[serde(default)]
    pub role: String,
}

/// A geometry with fewer than 2 refs, or whose endpoints differ, renders as an
/// open line; anything else is a ring.
pub fn is_open_refs(refs: &[OsmId]) -> bool {
    refs.len() < 2 || refs.first() != refs.last()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openness_of_short_geometries() {
        assert!(is_open_refs(&[]));
        assert!(is_open_refs(&[1]));
    }

    #[test]
    fn openness_by_endpoints() {
        assert!(is_open_refs(&[1, 2, 3]));
        assert!(!is_open_refs(&[1, 2, 3, 1]));
        assert!(!is_open_refs(&[7, 7]));
    }
}
