use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str;
use std::thread;

use quick_xml::escape::unescape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use tokio::sync::mpsc;
use xz::bufread::XzDecoder;

use crate::data::osm::{Member, Metadata, Node, OsmId, OsmItem, Relation, Tags, Way};
use crate::errors::Result;

const CHANNEL_CAPACITY: usize = 1024;

/// Decodes a map extract into a bounded stream of items, one at a time, with
/// no look-ahead. The reader thread blocks whenever the consumer lags behind.
/// Parse failures of the stream itself arrive in-band as the final item.
///
/// `.osm` / `.osm.xz` inputs are parsed as OSM XML; `.txt` / `.jsonl` inputs
/// are read back from the JSON-lines dump format this tool writes itself.
pub fn stream_osm_items(path: &Path) -> Result<mpsc::Receiver<Result<OsmItem>>> {
    let reader = create_extract_reader(path)?;
    let dump_input = is_dump_input(path);
    let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
    thread::spawn(move || {
        let on_item = |item| sender.blocking_send(Ok(item)).is_ok();
        let result = if dump_input {
            parse_dump_items(reader, on_item)
        } else {
            parse_osm_items(reader, on_item)
        };
        if let Err(err) = result {
            let _ = sender.blocking_send(Err(err));
        }
    });
    Ok(receiver)
}

fn create_extract_reader(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = fs::File::open(path)?;
    let file_reader = BufReader::new(file);
    if path.extension().and_then(|ext| ext.to_str()) == Some("xz") {
        let xz_reader = XzDecoder::new(file_reader);
        Ok(Box::new(BufReader::new(xz_reader)))
    } else {
        Ok(Box::new(file_reader))
    }
}

fn is_dump_input(path: &Path) -> bool {
    let name = path.file_name().and_then(|name| name.to_str()).unwrap_or("");
    let name = name.strip_suffix(".xz").unwrap_or(name);
    name.ends_with(".txt") || name.ends_with(".jsonl")
}

/// The entity currently being assembled from child elements.
enum Pending {
    None,
    Node(Node),
    Way(Way),
    Relation(Relation),
}

impl Pending {
    fn add_tag(&mut self, key: String, value: String) {
        match self {
            Pending::None => (),
            Pending::Node(node) => {
                node.tags.insert(key, value);
            }
            Pending::Way(way) => {
                way.tags.insert(key, value);
            }
            Pending::Relation(relation) => {
                relation.tags.insert(key, value);
            }
        }
    }
}

/// Event-driven pass over an OSM XML document. Malformed elements are skipped;
/// only a corrupt stream or unexpected document shape aborts. `on_item`
/// returning false stops the pass (the consumer went away).
fn parse_osm_items<R: BufRead>(
    reader: R,
    mut on_item: impl FnMut(OsmItem) -> bool,
) -> Result<()> {
    let mut reader = Reader::from_reader(reader);
    let mut buf = Vec::new();
    let mut pending = Pending::None;

    loop {
        match reader.read_event_into(&mut buf) {
            Err(e) => return Err(e.into()),
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                if let Some(item) = handle_element(&mut pending, &e, false) {
                    if !on_item(item) {
                        return Ok(());
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(item) = handle_element(&mut pending, &e, true) {
                    if !on_item(item) {
                        return Ok(());
                    }
                }
            }
            Ok(Event::End(e)) => {
                if let Some(item) = finish_element(&mut pending, e.name().as_ref()) {
                    if !on_item(item) {
                        return Ok(());
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let text = str::from_utf8(e.as_ref()).unwrap_or("?");
                if !text.trim().is_empty() {
                    return Err(format!("Unexpected text in OSM file: {text}").into());
                }
            }
            Ok(_) => (),
        }
        buf.clear();
    }
    Ok(())
}

fn handle_element(pending: &mut Pending, el: &BytesStart, self_closing: bool) -> Option<OsmItem> {
    match el.name().as_ref() {
        b"osm" | b"bounds" => Some(OsmItem::Metadata(Metadata {
            attrs: parse_attributes(el),
        })),
        b"node" => {
            let node = parse_node(el)?;
            if self_closing {
                Some(OsmItem::Node(node))
            } else {
                *pending = Pending::Node(node);
                None
            }
        }
        b"way" => {
            let way = parse_way(el)?;
            if self_closing {
                Some(OsmItem::Way(way))
            } else {
                *pending = Pending::Way(way);
                None
            }
        }
        b"relation" => {
            let relation = parse_relation(el)?;
            if self_closing {
                Some(OsmItem::Relation(relation))
            } else {
                *pending = Pending::Relation(relation);
                None
            }
        }
        b"tag" => {
            if let Some((key, value)) = parse_tag(el) {
                pending.add_tag(key, value);
            }
            None
        }
        b"nd" => {
            if let Some(ref_id) = parse_nd(el) {
                if let Pending::Way(way) = pending {
                    way.refs.push(ref_id);
                }
            }
            None
        }
        b"member" => {
            if let Some(member) = parse_member(el) {
                if let Pending::Relation(relation) = pending {
                    relation.members.push(member);
                }
            }
            None
        }
        _ => None,
    }
}

fn finish_element(pending: &mut Pending, name: &[u8]) -> Option<OsmItem> {
    match (name, std::mem::replace(pending, Pending::None)) {
        (b"node", Pending::Node(node)) => Some(OsmItem::Node(node)),
        (b"way", Pending::Way(way)) => Some(OsmItem::Way(way)),
        (b"relation", Pending::Relation(relation)) => Some(OsmItem::Relation(relation)),
        (_, prev) => {
            *pending = prev;
            None
        }
    }
}

fn parse_node(el: &BytesStart) -> Option<Node> {
    let mut id = None;
    let mut lat = None;
    let mut lon = None;

    for attribute_res in el.attributes() {
        let attribute = attribute_res.ok()?;
        match attribute.key.as_ref() {
            b"id" => id = Some(str::from_utf8(&attribute.value).ok()?.parse().ok()?),
            b"lat" => lat = Some(str::from_utf8(&attribute.value).ok()?.parse().ok()?),
            b"lon" => lon = Some(str::from_utf8(&attribute.value).ok()?.parse().ok()?),
            // version, timestamp, changeset, uid, user
            _ => (),
        }
    }

    Some(Node {
        id: id?,
        lat: lat?,
        lon: lon?,
        tags: Tags::new(),
    })
}

fn parse_way(el: &BytesStart) -> Option<Way> {
    let mut id = None;
    for attribute_res in el.attributes() {
        let attribute = attribute_res.ok()?;
        if attribute.key.as_ref() == b"id" {
            id = Some(str::from_utf8(&attribute.value).ok()?.parse().ok()?);
        }
    }
    Some(Way {
        id: id?,
        refs: Vec::new(),
        tags: Tags::new(),
    })
}

fn parse_relation(el: &BytesStart) -> Option<Relation> {
    let mut id = None;
    for attribute_res in el.attributes() {
        let attribute = attribute_res.ok()?;
        if attribute.key.as_ref() == b"id" {
            id = Some(str::from_utf8(&attribute.value).ok()?.parse().ok()?);
        }
    }
    Some(Relation {
        id: id?,
        members: Vec::new(),
        tags: Tags::new(),
    })
}

fn parse_tag(el: &BytesStart) -> Option<(String, String)> {
    let mut key = None;
    let mut value = None;
    for attribute_res in el.attributes() {
        let attribute = attribute_res.ok()?;
        match attribute.key.as_ref() {
            b"k" => key = attr_string(&attribute),
            b"v" => value = attr_string(&attribute),
            _ => (),
        }
    }
    Some((key?, value?))
}

fn parse_nd(el: &BytesStart) -> Option<OsmId> {
    for attribute_res in el.attributes() {
        let attribute = attribute_res.ok()?;
        if attribute.key.as_ref() == b"ref" {
            return str::from_utf8(&attribute.value).ok()?.parse().ok();
        }
    }
    None
}

fn parse_member(el: &BytesStart) -> Option<Member> {
    let mut kind = None;
    let mut ref_id = None;
    let mut role = String::new();
    for attribute_res in el.attributes() {
        let attribute = attribute_res.ok()?;
        match attribute.key.as_ref() {
            b"type" => kind = attr_string(&attribute),
            b"ref" => ref_id = Some(str::from_utf8(&attribute.value).ok()?.parse().ok()?),
            b"role" => role = attr_string(&attribute)?,
            _ => (),
        }
    }
    Some(Member {
        kind: kind?,
        ref_id: ref_id?,
        role,
    })
}

fn parse_attributes(el: &BytesStart) -> Tags {
    let mut attrs = Tags::new();
    for attribute_res in el.attributes() {
        let Ok(attribute) = attribute_res else {
            continue;
        };
        let Ok(key) = str::from_utf8(attribute.key.as_ref()) else {
            continue;
        };
        if let Some(value) = attr_string(&attribute) {
            attrs.insert(key.to_string(), value);
        }
    }
    attrs
}

fn attr_string(attribute: &Attribute) -> Option<String> {
    let raw = str::from_utf8(&attribute.value).ok()?;
    Some(unescape(raw).ok()?.into_owned())
}

/// Reads back a dump written by this tool: one JSON item per line.
fn parse_dump_items<R: BufRead>(
    reader: R,
    mut on_item: impl FnMut(OsmItem) -> bool,
) -> Result<()> {
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let item: OsmItem = serde_json::from_str(&line)?;
        if !on_item(item) {
            return Ok(());
        }
    }
    Ok(())
}
