//! Per-region, per-parameter observation catalog
//!
//! Every (region, parameter) pair owns three JSON documents: the ordered
//! record list, the derived latest record and the public view. Each touching
//! operation loads the full documents, mutates them in memory and rewrites
//! them whole. Concurrent writers to the same pair are not supported.

pub mod latest;
pub mod record;

pub use latest::LatestSelection;
pub use record::{CatalogRecord, PublicEntry};

use crate::types::CropResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

const RECORDS_FILE: &str = "records.json";
const LATEST_FILE: &str = "latest.json";
const PUBLIC_FILE: &str = "public.json";

/// File locations of one (region, parameter) partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPaths {
    pub records: PathBuf,
    pub latest: PathBuf,
    pub public: PathBuf,
}

/// Durable catalog rooted at a directory
#[derive(Debug, Clone)]
pub struct MetadataCatalog {
    root: PathBuf,
    public_base_url: String,
    selection: LatestSelection,
}

impl MetadataCatalog {
    pub fn new<P: AsRef<Path>>(root: P, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            public_base_url: public_base_url.into(),
            selection: LatestSelection::default(),
        }
    }

    pub fn with_selection(mut self, selection: LatestSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn partition(&self, region: &str, parameter: &str) -> PartitionPaths {
        let dir = self.root.join(region).join(parameter);
        PartitionPaths {
            records: dir.join(RECORDS_FILE),
            latest: dir.join(LATEST_FILE),
            public: dir.join(PUBLIC_FILE),
        }
    }

    pub fn records(&self, region: &str, parameter: &str) -> CropResult<Vec<CatalogRecord>> {
        read_json_or_default(&self.partition(region, parameter).records)
    }

    pub fn public(&self, region: &str, parameter: &str) -> CropResult<Vec<PublicEntry>> {
        read_json_or_default(&self.partition(region, parameter).public)
    }

    /// Persisted latest record; `None` when the latest document is empty or absent
    pub fn latest(&self, region: &str, parameter: &str) -> CropResult<Option<CatalogRecord>> {
        let path = self.partition(region, parameter).latest;
        let value: serde_json::Value = read_json_or_default(&path)?;
        match value {
            serde_json::Value::Null => Ok(None),
            serde_json::Value::Object(ref map) if map.is_empty() => Ok(None),
            value => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    /// Upsert `record` by output key, then refresh the public and latest views.
    ///
    /// `display_name` identifies the source in the public view; an entry with
    /// the same name is replaced.
    pub fn add(&self, record: CatalogRecord, display_name: &str, region: &str, parameter: &str) -> CropResult<()> {
        let paths = self.partition(region, parameter);
        log::debug!("Adding {} to catalog {}/{}", record.output_key, region, parameter);

        let mut records: Vec<CatalogRecord> = read_json_or_default(&paths.records)?;
        records.retain(|r| r.output_key != record.output_key);
        records.push(record);
        write_json(&paths.records, &records)?;

        let mut public: Vec<PublicEntry> = read_json_or_default(&paths.public)?;
        public.retain(|p| p.name != display_name);
        if let Some(added) = records.last() {
            public.push(PublicEntry::new(added, display_name, &self.public_base_url));
        }
        write_json(&paths.public, &public)?;

        self.write_latest(&paths.latest, &records)
    }

    /// Drop every record produced from `source_filename`.
    ///
    /// Returns `false` (and touches nothing) when no record references it.
    pub fn remove(&self, source_filename: &str, region: &str, parameter: &str) -> CropResult<bool> {
        let paths = self.partition(region, parameter);
        let base = Path::new(source_filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(source_filename);

        let mut records: Vec<CatalogRecord> = read_json_or_default(&paths.records)?;
        if !records.iter().any(|r| r.output_key.contains(base)) {
            return Ok(false);
        }
        log::info!("Removing {} from catalog {}/{}", base, region, parameter);

        records.retain(|r| !r.output_key.contains(base));
        write_json(&paths.records, &records)?;
        self.write_latest(&paths.latest, &records)?;

        let mut public: Vec<PublicEntry> = read_json_or_default(&paths.public)?;
        let before = public.len();
        public.retain(|p| p.name != base);
        if public.len() != before {
            write_json(&paths.public, &public)?;
        }

        Ok(true)
    }

    fn write_latest(&self, path: &Path, records: &[CatalogRecord]) -> CropResult<()> {
        match self.selection.select(records) {
            Some(latest) => write_json(path, latest),
            None => write_json(path, &serde_json::json!({})),
        }
    }
}

fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> CropResult<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Replace `path` atomically with the JSON rendering of `value`
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> CropResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut file, value)?;
    file.write_all(b"\n")?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::record::tests::record;
    use crate::types::CropError;

    const REGION: &str = "geneva";
    const PARAM: &str = "chla";

    fn catalog(dir: &Path) -> MetadataCatalog {
        MetadataCatalog::new(dir, "https://files.example.org")
    }

    #[test]
    fn test_add_is_idempotent_upsert() {
        let dir = tempfile::tempdir().unwrap();
        let cat = catalog(dir.path());

        cat.add(record("20240101T100000", "a/geneva/A_geneva.tif", 50, 100), "A", REGION, PARAM).unwrap();
        let mut second = record("20240101T100000", "a/geneva/A_geneva.tif", 70, 100);
        second.mean = 9.0;
        cat.add(second.clone(), "A", REGION, PARAM).unwrap();

        let records = cat.records(REGION, PARAM).unwrap();
        assert_eq!(records, vec![second.clone()]);
        assert_eq!(cat.public(REGION, PARAM).unwrap().len(), 1);
        assert_eq!(cat.public(REGION, PARAM).unwrap()[0].valid_pixels, "70%");
        assert_eq!(cat.latest(REGION, PARAM).unwrap(), Some(second));
    }

    #[test]
    fn test_remove_then_add_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        let cat = catalog(dir.path());
        let a = record("20240101T100000", "x/geneva/A_geneva.tif", 50, 100);
        let b = record("20240102T100000", "x/geneva/B_geneva_lowres.tif", 60, 100);
        cat.add(a, "A", REGION, PARAM).unwrap();
        cat.add(b.clone(), "B", REGION, PARAM).unwrap();

        let records_before = cat.records(REGION, PARAM).unwrap();
        let public_before = cat.public(REGION, PARAM).unwrap();
        let latest_before = cat.latest(REGION, PARAM).unwrap();

        assert!(cat.remove("incoming/B.tif", REGION, PARAM).unwrap());
        assert_eq!(cat.records(REGION, PARAM).unwrap().len(), 1);
        assert_eq!(cat.public(REGION, PARAM).unwrap().len(), 1);
        assert_eq!(cat.latest(REGION, PARAM).unwrap().unwrap().output_key, "x/geneva/A_geneva.tif");

        cat.add(b, "B", REGION, PARAM).unwrap();
        assert_eq!(cat.records(REGION, PARAM).unwrap(), records_before);
        assert_eq!(cat.public(REGION, PARAM).unwrap(), public_before);
        assert_eq!(cat.latest(REGION, PARAM).unwrap(), latest_before);
    }

    #[test]
    fn test_remove_unknown_source_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let cat = catalog(dir.path());
        assert!(!cat.remove("nothing.tif", REGION, PARAM).unwrap());
        assert!(!cat.partition(REGION, PARAM).records.exists());

        cat.add(record("20240101T100000", "x/geneva/A_geneva.tif", 50, 100), "A", REGION, PARAM).unwrap();
        assert!(!cat.remove("Z.tif", REGION, PARAM).unwrap());
        assert_eq!(cat.records(REGION, PARAM).unwrap().len(), 1);
    }

    #[test]
    fn test_latest_empty_object_when_nothing_qualifies() {
        let dir = tempfile::tempdir().unwrap();
        let cat = catalog(dir.path());
        cat.add(record("20240101T100000", "x/geneva/A_geneva.tif", 5, 100), "A", REGION, PARAM).unwrap();

        let raw = std::fs::read_to_string(cat.partition(REGION, PARAM).latest).unwrap();
        assert_eq!(raw.trim(), "{}");
        assert_eq!(cat.latest(REGION, PARAM).unwrap(), None);
    }

    #[test]
    fn test_records_keep_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let cat = catalog(dir.path());
        for (date, key) in [("20240103T000000", "c"), ("20240101T000000", "a"), ("20240102T000000", "b")] {
            cat.add(record(date, key, 90, 100), key, REGION, PARAM).unwrap();
        }
        let keys: Vec<String> = cat.records(REGION, PARAM).unwrap().into_iter().map(|r| r.output_key).collect();
        assert_eq!(keys, ["c", "a", "b"]);
        assert_eq!(cat.latest(REGION, PARAM).unwrap().unwrap().output_key, "c");
    }

    #[test]
    fn test_corrupt_catalog_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cat = catalog(dir.path());
        let paths = cat.partition(REGION, PARAM);
        std::fs::create_dir_all(paths.records.parent().unwrap()).unwrap();
        std::fs::write(&paths.records, "[{not json").unwrap();

        let result = cat.add(record("20240101T100000", "k", 50, 100), "A", REGION, PARAM);
        assert!(matches!(result, Err(CropError::Json(_))));
    }

    #[test]
    fn test_partitions_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let cat = catalog(dir.path());
        cat.add(record("20240101T100000", "k1", 50, 100), "A", "geneva", "chla").unwrap();
        cat.add(record("20240101T100000", "k2", 50, 100), "A", "geneva", "tsm").unwrap();
        cat.add(record("20240101T100000", "k3", 50, 100), "A", "zurich", "chla").unwrap();

        assert_eq!(cat.records("geneva", "chla").unwrap()[0].output_key, "k1");
        assert_eq!(cat.records("geneva", "tsm").unwrap()[0].output_key, "k2");
        assert_eq!(cat.records("zurich", "chla").unwrap()[0].output_key, "k3");
    }
}
