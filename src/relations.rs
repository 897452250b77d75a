use indexmap::IndexMap;
use log::warn;

use crate::data::osm::{is_open_refs, OsmId, Relation, Way};

/// Expands a relation's membership graph into a flat, depth-first ordered list
/// of ways. Node members carry no line geometry and are ignored; missing ways
/// and relations are skipped. Ways reachable through several non-cyclic paths
/// appear once per path: they are not deduplicated by id.
///
/// `visited` holds the relation ids on the current descent path. Each
/// recursion works on its own copy, so sibling branches never see each other's
/// visited ids, only their ancestors' — that is what bounds the recursion on
/// cyclic graphs.
pub fn relation_ways<'a>(
    relation: &Relation,
    relations: &'a IndexMap<OsmId, Relation>,
    ways: &'a IndexMap<OsmId, Way>,
    visited: &[OsmId],
) -> Vec<&'a Way> {
    if relation.members.is_empty() {
        warn!(relation_id = relation.id; "relation with no members");
        return Vec::new();
    }
    if visited.contains(&relation.id) {
        warn!(relation_id = relation.id, path_len = visited.len() as u64; "circular relation reference");
        return Vec::new();
    }
    let mut visited = visited.to_vec();
    visited.push(relation.id);

    let mut result = Vec::new();
    for member in &relation.members {
        match member.kind.as_str() {
            "node" => (),
            "way" => {
                if let Some(way) = ways.get(&member.ref_id) {
                    result.push(way);
                }
            }
            "relation" => {
                if let Some(child) = relations.get(&member.ref_id) {
                    result.extend(relation_ways(child, relations, ways, &visited));
                }
            }
            _ => {
                warn!(
                    relation_id = relation.id,
                    member_ref = member.ref_id,
                    member_kind = member.kind.as_str();
                    "relation with unknown member type"
                );
            }
        }
    }
    result
}

/// One continuous node sequence stitched together from one or more ways.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedWay {
    pub refs: Vec<OsmId>,
}

impl MergedWay {
    pub fn is_open(&self) -> bool {
        is_open_refs(&self.refs)
    }
}

/// Stitches a relation's member ways (often stored in arbitrary fragment
/// order) into as few continuous chains as possible, so rendering produces
/// whole paths instead of disjoint micro-segments.
///
/// Greedy with a single active chain: scan the remaining ways in input order
/// for the first touching either chain endpoint and splice it on, reversing
/// the fragment when its matching endpoint is not already adjacent. When
/// nothing touches the chain, the chain is finished and the next unconsumed
/// way seeds a new one — unless fewer than two ways remain, in which case a
/// final unmatched way is left unconsumed and unreported. O(n²) in the number
/// of ways, which relations stay far below in practice.
pub fn merge_ways(ways: &[&Way]) -> Vec<MergedWay> {
    let Some((first, rest)) = ways.split_first() else {
        return Vec::new();
    };
    let mut remaining: Vec<&Way> = rest.to_vec();
    let mut merged = Vec::new();
    let mut chain: Vec<OsmId> = first.refs.clone();

    loop {
        let next_idx = match (chain.first().copied(), chain.last().copied()) {
            (Some(first_node), Some(last_node)) => remaining.iter().position(|way| {
                let head = way.refs.first().copied();
                let tail = way.refs.last().copied();
                head == Some(last_node)
                    || tail == Some(last_node)
                    || head == Some(first_node)
                    || tail == Some(first_node)
            }),
            _ => None,
        };
        match next_idx {
            Some(idx) => {
                let next_way = remaining.remove(idx);
                splice(&mut chain, &next_way.refs);
            }
            None => {
                if remaining.len() < 2 {
                    break;
                }
                let seed = remaining.remove(0);
                merged.push(MergedWay {
                    refs: std::mem::replace(&mut chain, seed.refs.clone()),
                });
            }
        }
    }
    merged.push(MergedWay { refs: chain });
    merged
}

/// Joins `refs` onto whichever chain end it touches, dropping the duplicated
/// junction ref. The four cases, checked in order: appended forward, appended
/// reversed, prepended reversed, prepended forward.
fn splice(chain: &mut Vec<OsmId>, refs: &[OsmId]) {
    let (Some(&first_node), Some(&last_node)) = (chain.first(), chain.last()) else {
        return;
    };
    if refs.first() == Some(&last_node) {
        chain.extend_from_slice(&refs[1..]);
    } else if refs.last() == Some(&last_node) {
        chain.extend(refs.iter().rev().skip(1));
    } else if refs.first() == Some(&first_node) {
        let mut joined: Vec<OsmId> = refs[1..].iter().rev().copied().collect();
        joined.extend_from_slice(chain);
        *chain = joined;
    } else if refs.last() == Some(&first_node) {
        let mut joined = refs[..refs.len() - 1].to_vec();
        joined.extend_from_slice(chain);
        *chain = joined;
    }
}

#[cfg(test)]
mod tests {
    use crate::data::osm::{Member, Tags};

    use super::*;

    fn way(id: OsmId, refs: &[OsmId]) -> Way {
        Way {
            id,
            refs: refs.to_vec(),
            tags: Tags::new(),
        }
    }

    fn member(kind: &str, ref_id: OsmId) -> Member {
        Member {
            kind: kind.to_string(),
            ref_id,
            role: String::new(),
        }
    }

    fn relation(id: OsmId, members: Vec<Member>) -> Relation {
        Relation {
            id,
            members,
            tags: Tags::new(),
        }
    }

    fn way_map(ways: Vec<Way>) -> IndexMap<OsmId, Way> {
        ways.into_iter().map(|w| (w.id, w)).collect()
    }

    fn relation_map(relations: Vec<Relation>) -> IndexMap<OsmId, Relation> {
        relations.into_iter().map(|r| (r.id, r)).collect()
    }

    fn merged_refs(merged: &[MergedWay]) -> Vec<Vec<OsmId>> {
        merged.iter().map(|m| m.refs.clone()).collect()
    }

    #[test]
    fn merge_of_single_way_is_identity() {
        let w = way(1, &[10, 20, 30]);
        let merged = merge_ways(&[&w]);
        assert_eq!(merged_refs(&merged), vec![vec![10, 20, 30]]);
    }

    #[test]
    fn merge_of_empty_input_is_empty() {
        assert!(merge_ways(&[]).is_empty());
    }

    #[test]
    fn merge_reverses_fragments_to_attach() {
        let a = way(1, &[1, 2]);
        let b = way(2, &[2, 3]);
        let c = way(3, &[4, 3]);
        let merged = merge_ways(&[&a, &b, &c]);
        assert_eq!(merged_refs(&merged), vec![vec![1, 2, 3, 4]]);
    }

    #[test]
    fn merge_is_permutation_independent_for_a_connected_path() {
        let a = way(1, &[1, 2]);
        let b = way(2, &[2, 3]);
        let c = way(3, &[3, 4]);
        let d = way(4, &[4, 5]);
        let orders: &[[&Way; 4]] = &[
            [&a, &b, &c, &d],
            [&b, &d, &a, &c],
            [&d, &c, &b, &a],
            [&c, &a, &d, &b],
        ];
        for ways in orders {
            let merged = merge_ways(ways);
            assert_eq!(merged.len(), 1, "order {:?}", ways.iter().map(|w| w.id).collect::<Vec<_>>());
            let refs = &merged[0].refs;
            let forward = vec![1, 2, 3, 4, 5];
            let backward: Vec<OsmId> = forward.iter().rev().copied().collect();
            assert!(*refs == forward || *refs == backward, "got {:?}", refs);
        }
    }

    #[test]
    fn merge_prepends_on_first_node_matches() {
        let a = way(1, &[3, 4]);
        let b = way(2, &[3, 2]);
        let c = way(3, &[1, 2]);
        // [3,4] <- [3,2] reversed in front -> [2,3,4]; then [1,2] in front
        let merged = merge_ways(&[&a, &b, &c]);
        assert_eq!(merged_refs(&merged), vec![vec![1, 2, 3, 4]]);
    }

    #[test]
    fn merge_closes_rings() {
        let a = way(1, &[1, 2]);
        let b = way(2, &[2, 3]);
        let c = way(3, &[3, 1]);
        let merged = merge_ways(&[&a, &b, &c]);
        assert_eq!(merged.len(), 1);
        assert!(!merged[0].is_open());
        assert_eq!(merged[0].refs.first(), merged[0].refs.last());
        assert_eq!(merged[0].refs.len(), 4);
    }

    #[test]
    fn merge_starts_a_new_chain_per_disconnected_component() {
        let a = way(1, &[1, 2]);
        let b = way(2, &[7, 8]);
        let c = way(3, &[8, 9]);
        let merged = merge_ways(&[&a, &b, &c]);
        assert_eq!(merged_refs(&merged), vec![vec![1, 2], vec![7, 8, 9]]);
    }

    #[test]
    fn merge_drops_a_final_unmatched_way() {
        // the last unconsumed way never gets to seed a chain of its own
        let a = way(1, &[1, 2]);
        let b = way(2, &[2, 3]);
        let c = way(3, &[7, 8]);
        let merged = merge_ways(&[&a, &b, &c]);
        assert_eq!(merged_refs(&merged), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn expand_collects_way_members_in_declaration_order() {
        let ways = way_map(vec![way(10, &[1, 2]), way(11, &[2, 3])]);
        let relations = relation_map(vec![relation(
            1,
            vec![member("way", 11), member("node", 5), member("way", 10)],
        )]);
        let result = relation_ways(&relations[&1], &relations, &ways, &[]);
        let ids: Vec<OsmId> = result.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![11, 10]);
    }

    #[test]
    fn expand_recurses_into_child_relations_depth_first() {
        let ways = way_map(vec![way(10, &[1, 2]), way(11, &[2, 3]), way(12, &[3, 4])]);
        let child = relation(2, vec![member("way", 11)]);
        let parent = relation(
            1,
            vec![member("way", 10), member("relation", 2), member("way", 12)],
        );
        let relations = relation_map(vec![parent, child]);
        let result = relation_ways(&relations[&1], &relations, &ways, &[]);
        let ids: Vec<OsmId> = result.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![10, 11, 12]);
    }

    #[test]
    fn expand_skips_missing_refs_and_unknown_kinds() {
        let ways = way_map(vec![way(10, &[1, 2])]);
        let relations = relation_map(vec![relation(
            1,
            vec![
                member("way", 99),
                member("relation", 98),
                member("boundary", 97),
                member("way", 10),
            ],
        )]);
        let result = relation_ways(&relations[&1], &relations, &ways, &[]);
        let ids: Vec<OsmId> = result.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![10]);
    }

    #[test]
    fn expand_of_memberless_relation_is_empty() {
        let ways = way_map(Vec::new());
        let relations = relation_map(vec![relation(1, Vec::new())]);
        assert!(relation_ways(&relations[&1], &relations, &ways, &[]).is_empty());
    }

    #[test]
    fn expand_terminates_on_self_reference() {
        let ways = way_map(vec![way(10, &[1, 2])]);
        let relations = relation_map(vec![relation(
            1,
            vec![member("relation", 1), member("way", 10)],
        )]);
        let result = relation_ways(&relations[&1], &relations, &ways, &[]);
        let ids: Vec<OsmId> = result.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![10]);
    }

    #[test]
    fn expand_terminates_on_mutual_cycle() {
        let ways = way_map(Vec::new());
        let a = relation(1, vec![member("relation", 2)]);
        let b = relation(2, vec![member("relation", 1)]);
        let relations = relation_map(vec![a, b]);
        assert!(relation_ways(&relations[&1], &relations, &ways, &[]).is_empty());
        assert!(relation_ways(&relations[&2], &relations, &ways, &[]).is_empty());
    }

    #[test]
    fn expand_allows_the_same_child_on_sibling_branches() {
        // the visited path is per-branch: a diamond is not a cycle
        let ways = way_map(vec![way(10, &[1, 2])]);
        let shared = relation(3, vec![member("way", 10)]);
        let left = relation(2, vec![member("relation", 3)]);
        let top = relation(
            1,
            vec![member("relation", 2), member("relation", 3)],
        );
        let relations = relation_map(vec![top, left, shared]);
        let result = relation_ways(&relations[&1], &relations, &ways, &[]);
        let ids: Vec<OsmId> = result.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![10, 10]);
    }
}
