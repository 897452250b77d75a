mod data;
mod errors;
mod export;
mod ingest;
mod range;
mod relations;
mod svg;

use std::env;
use std::fs::{create_dir_all, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::info;
use serde::Deserialize;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use crate::data::Data;
use crate::errors::Result;
use crate::export::attr_maps::{RelationAttributeMapsExport, WayAttributeMapsExport};
use crate::export::dump::DumpWriter;
use crate::export::map::MapExport;
use crate::export::stats::Stats;
use crate::export::Export;

#[derive(Deserialize)]
pub struct UserConfig {
    pub data_path: String,
    #[serde(default)]
    pub dump: bool,
    #[serde(default)]
    pub stats: bool,
    #[serde(default)]
    pub map: bool,
    #[serde(default)]
    pub way_attribute_maps: bool,
    #[serde(default)]
    pub relation_attribute_maps: bool,
}

fn load_user_config(path: &str) -> UserConfig {
    let file = File::open(path).expect("Could not open config file.");
    serde_json::from_reader(file).expect("Could not parse config.")
}

fn input_base_name(config: &UserConfig) -> Result<String> {
    let file_name = Path::new(&config.data_path)
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or("Could not get input file name")?;
    Ok(file_name
        .split('.')
        .next()
        .unwrap_or(file_name)
        .to_string())
}

fn create_output_dir(base_name: &str) -> Result<PathBuf> {
    let output_dir = Path::new("output").join(base_name);
    create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn setup_logging() {
    Builder::with_level("info")
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();

    let config_path = env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config = load_user_config(&config_path);
    let base_name = input_base_name(&config)?;
    let output_dir = create_output_dir(&base_name)?;

    let started = Instant::now();
    let mut collector = Data::default();
    let mut stats = if config.stats { Some(Stats::new()) } else { None };
    let mut dump = match config.dump {
        true => Some(DumpWriter::create(&output_dir.join(format!("{base_name}-dump.txt"))).await?),
        false => None,
    };

    let mut items = ingest::stream_osm_items(Path::new(&config.data_path))?;
    while let Some(item) = items.recv().await {
        let item = item?;
        if let Some(stats) = stats.as_mut() {
            stats.visit(&item)?;
        }
        if let Some(dump) = dump.as_mut() {
            dump.write_item(&item).await?;
        }
        collector.visit(item);
    }
    if let Some(dump) = dump {
        dump.close().await?;
    }
    info!(
        metadata = collector.metadata.len() as u64,
        nodes = collector.nodes.len() as u64,
        ways = collector.ways.len() as u64,
        relations = collector.relations.len() as u64,
        elapsed_ms = started.elapsed().as_millis() as u64;
        "Loaded OSM data"
    );

    let exported = Instant::now();
    if let Some(stats) = stats {
        stats.export_to_file(&output_dir, &base_name)?;
    }
    if config.map {
        MapExport::new(&base_name).process(&collector, &output_dir).await?;
    }
    if config.way_attribute_maps {
        WayAttributeMapsExport::new(&base_name)
            .process(&collector, &output_dir)
            .await?;
    }
    if config.relation_attribute_maps {
        RelationAttributeMapsExport::new(&base_name)
            .process(&collector, &output_dir)
            .await?;
    }

    info!(elapsed_ms = exported.elapsed().as_millis() as u64; "Done");
    Ok(())
}
