use indexmap::IndexMap;

use crate::data::osm::{Node, OsmId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    fn of(value: f64) -> Range {
        Range { min: value, max: value }
    }

    fn widen(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranges {
    pub lat: Range,
    pub lon: Range,
}

/// Resolves node refs against the store and, as a side effect, accumulates the
/// lat/lon envelope of every node it has handed out. One tracker is created
/// per export pass; the envelope is read once, after all geometry for that
/// pass has been resolved.
pub struct RangeTracker<'a> {
    nodes: &'a IndexMap<OsmId, Node>,
    lat: Option<Range>,
    lon: Option<Range>,
}

impl<'a> RangeTracker<'a> {
    pub fn new(nodes: &'a IndexMap<OsmId, Node>) -> RangeTracker<'a> {
        RangeTracker {
            nodes,
            lat: None,
            lon: None,
        }
    }

    /// A missing node is not an error; callers filter it out of the geometry.
    pub fn get_node(&mut self, id: OsmId) -> Option<&'a Node> {
        let node = self.nodes.get(&id)?;
        match self.lat.as_mut() {
            Some(range) => range.widen(node.lat),
            None => self.lat = Some(Range::of(node.lat)),
        }
        match self.lon.as_mut() {
            Some(range) => range.widen(node.lon),
            None => self.lon = Some(Range::of(node.lon)),
        }
        Some(node)
    }

    /// `None` until at least one node has been resolved.
    pub fn ranges(&self) -> Option<Ranges> {
        Some(Ranges {
            lat: self.lat?,
            lon: self.lon?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::data::osm::Tags;

    use super::*;

    fn nodes(coords: &[(OsmId, f64, f64)]) -> IndexMap<OsmId, Node> {
        coords
            .iter()
            .map(|&(id, lat, lon)| (id, Node { id, lat, lon, tags: Tags::new() }))
            .collect()
    }

    #[test]
    fn no_ranges_before_first_resolution() {
        let nodes = nodes(&[(1, 50.0, 15.0)]);
        let tracker = RangeTracker::new(&nodes);
        assert_eq!(tracker.ranges(), None);
    }

    #[test]
    fn missing_nodes_do_not_touch_the_envelope() {
        let nodes = nodes(&[(1, 50.0, 15.0)]);
        let mut tracker = RangeTracker::new(&nodes);
        assert!(tracker.get_node(99).is_none());
        assert_eq!(tracker.ranges(), None);
    }

    #[test]
    fn envelope_covers_every_resolved_node() {
        let coords = [(1, 50.0, 15.0), (2, 49.5, 16.2), (3, 50.7, 14.9)];
        let nodes = nodes(&coords);
        let mut tracker = RangeTracker::new(&nodes);
        for &(id, _, _) in &coords {
            tracker.get_node(id);
        }
        let ranges = tracker.ranges().unwrap();
        for &(_, lat, lon) in &coords {
            assert!(ranges.lat.min <= lat && lat <= ranges.lat.max);
            assert!(ranges.lon.min <= lon && lon <= ranges.lon.max);
        }
        assert_eq!(ranges.lat.min, 49.5);
        assert_eq!(ranges.lat.max, 50.7);
        assert_eq!(ranges.lon.min, 14.9);
        assert_eq!(ranges.lon.max, 16.2);
    }
}
