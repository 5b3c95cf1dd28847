//! Batch driver: turns a remote diff into extracted regions and catalog updates
//!
//! Files are processed one after another. A failure aborts only the file it
//! happened in; catalog updates already made for that file stay in place.

use crate::catalog::{CatalogRecord, MetadataCatalog};
use crate::config::PipelineConfig;
use crate::core::extract::{OutputNames, RegionExtractor};
use crate::core::mask::GdalRasterizer;
use crate::io::{FilenameParser, RegionSet, SourceRaster};
use crate::types::{CropError, CropResult, RegionOutcome};
use std::path::{Component, Path, PathBuf};

/// Files changed on the remote, relative to the source root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Mirror of a remote raster store into the local source root
pub trait RemoteSync {
    /// What a sync would add and remove, without transferring anything
    fn diff(&self) -> CropResult<SyncPlan>;
    /// Bring the local mirror in line with the remote
    fn pull(&self) -> CropResult<()>;
}

/// Per-file extraction tally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileSummary {
    pub extracted: usize,
    pub skipped: usize,
}

/// What a batch did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub processed: Vec<String>,
    pub removed: Vec<String>,
    pub extracted_regions: usize,
    pub skipped_regions: usize,
    pub failed: Vec<String>,
}

impl BatchReport {
    /// Collapse failures into a single error naming every failed file
    pub fn into_result(self) -> CropResult<Self> {
        if self.failed.is_empty() {
            Ok(self)
        } else {
            Err(CropError::BatchFailed(self.failed))
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    regions: RegionSet,
    extractor: RegionExtractor,
    catalog: MetadataCatalog,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, regions: RegionSet) -> Self {
        let extractor = RegionExtractor::new(config.extractor_params(), Box::new(GdalRasterizer));
        let catalog = MetadataCatalog::new(&config.catalog_root, config.public_base_url.clone())
            .with_selection(config.selection());
        Self {
            config,
            regions,
            extractor,
            catalog,
        }
    }

    pub fn catalog(&self) -> &MetadataCatalog {
        &self.catalog
    }

    /// Diff, pull and process; fails with the list of failed files if any
    pub fn run(&self, sync: &dyn RemoteSync) -> CropResult<BatchReport> {
        log::info!("Looking for updates in {}", self.config.source_root.display());
        let plan = sync.diff()?;
        if plan.is_empty() {
            log::info!("No updates, exiting.");
            return Ok(BatchReport::default());
        }

        sync.pull()?;
        self.process(&plan).into_result()
    }

    /// Apply removals, then additions. Never fails as a whole; see `failed`.
    pub fn process(&self, plan: &SyncPlan) -> BatchReport {
        let mut report = BatchReport::default();

        for file in &plan.removed {
            match self.process_removed(file) {
                Ok(_) => report.removed.push(file.clone()),
                Err(e) => {
                    log::error!("Failed to remove {}: {}", file, e);
                    report.failed.push(file.clone());
                }
            }
        }

        for file in &plan.added {
            match self.process_added(file) {
                Ok(summary) => {
                    report.extracted_regions += summary.extracted;
                    report.skipped_regions += summary.skipped;
                    report.processed.push(file.clone());
                }
                Err(e) => {
                    log::error!("Failed to process {}: {}", file, e);
                    report.failed.push(file.clone());
                    self.discard_source(file);
                }
            }
        }

        if !report.failed.is_empty() {
            log::warn!("{} file(s) failed: {:?}", report.failed.len(), report.failed);
        }
        report
    }

    /// Extract every region of one source raster and record the results
    pub fn process_added(&self, file: &str) -> CropResult<FileSummary> {
        let source = self.config.source_root.join(file);
        let properties = FilenameParser::parse(&source)?;
        let display_name = display_name(&source)?;
        let raster = SourceRaster::open(&source)?;

        let output_dir = self.output_dir(file);
        let outcomes = self
            .extractor
            .extract_all(&raster, &source, &self.regions, &output_dir)?;

        let mut summary = FileSummary::default();
        for (region, outcome) in outcomes {
            match outcome {
                RegionOutcome::Extracted(result) => {
                    let key = self.output_key(&result.output_path);
                    let record = CatalogRecord::from_extraction(&result, properties.date.clone(), key);
                    self.catalog.add(record, display_name, &region, &properties.parameter)?;
                    summary.extracted += 1;
                }
                RegionOutcome::Skipped(reason) => {
                    log::debug!("Skipping {} for {}: {}", region, file, reason);
                    summary.skipped += 1;
                }
            }
        }

        log::info!(
            "{}: {} region(s) extracted, {} skipped",
            file,
            summary.extracted,
            summary.skipped
        );
        Ok(summary)
    }

    /// Drop a deleted source raster from every region's catalog and outputs.
    ///
    /// Returns how many catalog partitions changed.
    pub fn process_removed(&self, file: &str) -> CropResult<usize> {
        let properties = FilenameParser::parse(file)?;
        let output_dir = self.output_dir(file);

        let mut changed = 0;
        for region in &self.regions {
            if self.catalog.remove(file, &region.key, &properties.parameter)? {
                changed += 1;
            }
            let names = OutputNames::new(&output_dir, Path::new(file), &region.key)?;
            for path in [&names.full, &names.preview] {
                if path.exists() {
                    std::fs::remove_file(path)?;
                }
            }
        }
        Ok(changed)
    }

    fn output_dir(&self, file: &str) -> PathBuf {
        match Path::new(file).parent() {
            Some(parent) => self.config.output_root.join(parent),
            None => self.config.output_root.clone(),
        }
    }

    /// Output path relative to the output root, `/`-separated
    fn output_key(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.config.output_root).unwrap_or(path);
        relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Delete the local copy so the next sync fetches it again
    fn discard_source(&self, file: &str) {
        let source = self.config.source_root.join(file);
        if !source.exists() {
            return;
        }
        match std::fs::remove_file(&source) {
            Ok(()) => log::info!("Removed local copy of {}", file),
            Err(e) => log::warn!("Could not remove local copy of {}: {}", file, e),
        }
    }
}

fn display_name(source: &Path) -> CropResult<&str> {
    source
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| CropError::InvalidFilename(source.display().to_string()))
}
