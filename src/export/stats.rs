use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use indexmap::IndexMap;
use log::warn;
use serde_json::Value;

use crate::data::osm::OsmItem;
use crate::errors::Result;

/// Strings that parse as numbers count as numeric data and are masked.
const MASK_NUMBER_DATA: bool = true;

#[derive(Debug, Default)]
struct Description {
    count: u64,
    children: IndexMap<String, Description>,
}

/// Occurrence counts for every path/value shape seen in the item stream,
/// grouped by item kind. Children print sorted by descending count, so the
/// report surfaces the dominant tag vocabulary of an extract.
#[derive(Debug, Default)]
pub struct Stats {
    data: IndexMap<&'static str, Description>,
}

impl Stats {
    pub fn new() -> Stats {
        Stats::default()
    }

    pub fn visit(&mut self, item: &OsmItem) -> Result<()> {
        let value = serde_json::to_value(item)?;
        let stat = self.data.entry(item.kind_name()).or_default();
        stat.count += 1;

        let mut leaves = Vec::new();
        describe(&value, &mut Vec::new(), &mut leaves);

        // each tree node counts at most once per item, however many leaves
        // share its prefix
        let mut seen: HashSet<String> = HashSet::new();
        for (path, leaf) in leaves {
            let mut desc = &mut *stat;
            let mut prefix = String::new();
            for fragment in path.into_iter().chain([leaf]) {
                prefix.push('\u{1f}');
                prefix.push_str(&fragment);
                desc = desc.children.entry(fragment).or_default();
                if seen.insert(prefix.clone()) {
                    desc.count += 1;
                }
            }
        }
        Ok(())
    }

    pub fn export_to_file(&self, dir: &Path, base_name: &str) -> Result<()> {
        let file = File::create(dir.join(format!("{}-stats.txt", base_name)))?;
        let mut writer = BufWriter::new(file);
        self.write_report(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    fn write_report(&self, writer: &mut impl Write) -> Result<()> {
        for (name, desc) in &self.data {
            writeln!(writer, "{}: {}", name, desc.count)?;
            write_description(desc, writer, 0)?;
        }
        Ok(())
    }
}

fn describe(value: &Value, path: &mut Vec<String>, out: &mut Vec<(Vec<String>, String)>) {
    match value {
        Value::Number(_) => out.push((path.clone(), "<number>".to_string())),
        Value::String(s) => {
            if MASK_NUMBER_DATA && s.parse::<f64>().is_ok() {
                out.push((path.clone(), "<number>".to_string()));
            } else {
                out.push((path.clone(), s.clone()));
            }
        }
        Value::Null => out.push((path.clone(), "<null>".to_string())),
        Value::Object(map) => {
            for (key, child) in map {
                let fragment = if key.parse::<f64>().is_ok() { "[]" } else { key.as_str() };
                path.push(fragment.to_string());
                describe(child, path, out);
                path.pop();
            }
        }
        Value::Array(values) => {
            for child in values {
                path.push("[]".to_string());
                describe(child, path, out);
                path.pop();
            }
        }
        Value::Bool(_) => {
            warn!(path = path.join(".").as_str(); "Unexpected type in stats description");
        }
    }
}

fn write_description(desc: &Description, writer: &mut impl Write, indent: usize) -> Result<()> {
    if desc.children.is_empty() {
        return Ok(());
    }
    let indent = indent + 1;
    let indent_s = " ".repeat(indent);
    let mut children: Vec<(&String, &Description)> = desc.children.iter().collect();
    children.sort_by(|a, b| b.1.count.cmp(&a.1.count));
    for (key, value) in children {
        writeln!(writer, "{}({}) {}", indent_s, value.count, key.replace('\n', "\\n"))?;
        write_description(value, writer, indent)?;
    }
    Ok(())
}
