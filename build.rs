use std::collections::HashSet;
use std::env;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use rkyv::{rancor::Error as RkyvError, to_bytes};
use zstd::bulk::compress as zstd_compress;

#[path = "src/data.rs"]
mod data_model;
use data_model::{DetailSection, FaqEntry};

// The dataset is small; favour ratio over build speed.
const ARCHIVE_COMPRESSION_LEVEL: i32 = 9;
const SOURCE_ENV: &str = "RIFTBOUND_FAQ_SOURCE";

fn main() -> Result<(), Box<dyn Error>> {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);

    println!("cargo:rerun-if-env-changed={SOURCE_ENV}");
    let source = env::var_os(SOURCE_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| manifest_dir.join("data/faq.json"));

    let entries = load_entries(&source)?;
    validate_entries(&entries)?;
    write_archive(&entries, &out_dir)?;
    Ok(())
}

fn load_entries(path: &Path) -> Result<Vec<FaqEntry>, Box<dyn Error>> {
    println!("cargo:rerun-if-changed={}", path.display());
    if !path.exists() {
        panic!("Missing FAQ dataset at {}.", path.display());
    }
    let raw = fs::read_to_string(path)?;
    let entries: Vec<FaqEntry> = serde_json::from_str(&raw)
        .map_err(|err| format!("Failed to parse {}: {err}", path.display()))?;
    Ok(entries)
}

fn validate_entries(entries: &[FaqEntry]) -> Result<(), Box<dyn Error>> {
    let mut ids = HashSet::new();
    let mut titles = HashSet::new();
    for (idx, entry) in entries.iter().enumerate() {
        if let Some(id) = entry.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            if !ids.insert(id) {
                return Err(format!("Duplicate entry id {id:?} at index {idx}").into());
            }
        }
        if entry.title.trim().is_empty() {
            println!("cargo:warning=FAQ entry {idx} has an empty title");
        } else if !titles.insert(entry.title.trim()) && entry.id.is_none() {
            println!(
                "cargo:warning=FAQ entry {idx} repeats title {:?}; it will share an anchor",
                entry.title.trim()
            );
        }
        let unknown = entry
            .detail_section
            .iter()
            .filter(|section| matches!(section, DetailSection::Unknown))
            .count();
        if unknown > 0 {
            println!("cargo:warning=FAQ entry {idx} has {unknown} section(s) of unknown type");
        }
    }
    Ok(())
}

#[allow(clippy::ptr_arg)]
fn write_archive(entries: &Vec<FaqEntry>, out_dir: &Path) -> Result<(), Box<dyn Error>> {
    let bytes = to_bytes::<RkyvError>(entries)
        .map_err(|err| format!("Failed to serialize FAQ entries: {err}"))?
        .into_vec();
    let compressed = zstd_compress(&bytes, ARCHIVE_COMPRESSION_LEVEL)?;

    let data_path = out_dir.join("faq_entries.rkyv");
    fs::write(&data_path, compressed)?;
    println!("cargo:rustc-env=FAQ_DATA={}", data_path.display());
    Ok(())
}
