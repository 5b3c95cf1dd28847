use gdal::raster::Buffer;
use gdal::DriverManager;
use satcrop::{CropError, Pipeline, PipelineConfig, RegionSet, RemoteSync, SyncPlan};
use std::cell::Cell;
use std::path::Path;

const LAKES: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {"type": "Feature", "properties": {"key": "geneva"},
         "geometry": {"type": "Polygon", "coordinates": [[[2, -2], [5, -2], [5, -5], [2, -5]]]}},
        {"type": "Feature", "properties": {"key": "zurich"},
         "geometry": {"type": "Polygon", "coordinates": [[[6, -6], [9, -6], [9, -9], [6, -9], [6, -6]]]}},
        {"type": "Feature", "properties": {"key": "constance"},
         "geometry": {"type": "Polygon", "coordinates": [[[100, 0], [110, 0], [110, -10]]]}}
    ]
}"#;

struct FakeSync {
    plan: SyncPlan,
    pulls: Cell<usize>,
}

impl FakeSync {
    fn new(added: &[&str], removed: &[&str]) -> Self {
        Self {
            plan: SyncPlan {
                added: added.iter().map(|s| s.to_string()).collect(),
                removed: removed.iter().map(|s| s.to_string()).collect(),
            },
            pulls: Cell::new(0),
        }
    }
}

impl RemoteSync for FakeSync {
    fn diff(&self) -> satcrop::CropResult<SyncPlan> {
        Ok(self.plan.clone())
    }

    fn pull(&self) -> satcrop::CropResult<()> {
        self.pulls.set(self.pulls.get() + 1);
        Ok(())
    }
}

/// 10x10 Float32 raster on a unit grid, row-major values
fn write_band(path: &Path, data: Vec<f32>) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
    let mut dataset = driver.create_with_band_type::<f32, _>(path, 10, 10, 1).unwrap();
    dataset.set_geo_transform(&[0.0, 1.0, 0.0, 0.0, 0.0, -1.0]).unwrap();
    let mut band = dataset.rasterband(1).unwrap();
    band.write((0, 0), (10, 10), &Buffer::new((10, 10), data)).unwrap();
}

/// Constant raster; the zurich corner is fully nodata unless `clear`
fn write_source(path: &Path, value: f32, clear: bool) {
    let data: Vec<f32> = (0..100)
        .map(|i| {
            let (row, col) = (i / 10, i % 10);
            if !clear && row >= 6 && col >= 6 {
                f32::NAN
            } else {
                value
            }
        })
        .collect();
    write_band(path, data);
}

fn setup(dir: &Path) -> Pipeline {
    let config = PipelineConfig {
        source_root: dir.join("data"),
        output_root: dir.join("data_output"),
        catalog_root: dir.join("catalog"),
        public_base_url: "https://files.example.org/crops".to_string(),
        ..Default::default()
    };
    Pipeline::new(config, RegionSet::from_geojson_str(LAKES).unwrap())
}

const FIRST: &str = "sencast/POLYMER_chla_S3A_20240101T093000.tif";
const SECOND: &str = "sencast/POLYMER_chla_S3B_20240101T141500.tif";

#[test]
fn test_run_updates_catalog() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let pipeline = setup(dir.path());
    write_source(&dir.path().join("data").join(FIRST), 3.0, false);

    let sync = FakeSync::new(&[FIRST], &[]);
    let report = pipeline.run(&sync).unwrap();
    assert_eq!(sync.pulls.get(), 1);
    assert_eq!(report.processed, [FIRST]);
    assert_eq!(report.extracted_regions, 1);
    assert_eq!(report.skipped_regions, 2);

    let catalog = pipeline.catalog();
    let records = catalog.records("geneva", "chla").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].date, "20240101T093000");
    assert_eq!(records[0].output_key, "sencast/geneva/POLYMER_chla_S3A_20240101T093000_geneva.tif");
    assert_eq!((records[0].total_pixels, records[0].valid_pixels), (9, 9));
    assert_eq!(records[0].mean, 3.0);
    assert!(dir.path().join("data_output").join(&records[0].output_key).exists());

    let public = catalog.public("geneva", "chla").unwrap();
    assert_eq!(public.len(), 1);
    assert_eq!(public[0].name, "POLYMER_chla_S3A_20240101T093000");
    assert_eq!(public[0].datetime, "2024-01-01T09:30:00Z");
    assert_eq!(
        public[0].url,
        "https://files.example.org/crops/sencast/geneva/POLYMER_chla_S3A_20240101T093000_geneva.tif"
    );
    assert_eq!(public[0].valid_pixels, "100%");

    assert_eq!(catalog.latest("geneva", "chla").unwrap(), Some(records[0].clone()));
    assert!(catalog.records("zurich", "chla").unwrap().is_empty());
}

#[test]
fn test_reprocessing_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = setup(dir.path());
    write_source(&dir.path().join("data").join(FIRST), 3.0, true);

    let plan = SyncPlan {
        added: vec![FIRST.to_string()],
        removed: vec![],
    };
    pipeline.process(&plan);
    write_source(&dir.path().join("data").join(FIRST), 4.0, true);
    let report = pipeline.process(&plan);
    assert!(report.failed.is_empty());

    for region in ["geneva", "zurich"] {
        let records = pipeline.catalog().records(region, "chla").unwrap();
        assert_eq!(records.len(), 1, "region {}", region);
        assert_eq!(records[0].mean, 4.0);
        assert_eq!(pipeline.catalog().public(region, "chla").unwrap().len(), 1);
    }
}

#[test]
fn test_remove_and_same_day_latest() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = setup(dir.path());
    write_source(&dir.path().join("data").join(FIRST), 3.0, true);
    write_source(&dir.path().join("data").join(SECOND), 6.0, true);

    let report = pipeline.process(&SyncPlan {
        added: vec![FIRST.to_string(), SECOND.to_string()],
        removed: vec![],
    });
    assert_eq!(report.processed.len(), 2);

    let latest = pipeline.catalog().latest("zurich", "chla").unwrap().unwrap();
    assert_eq!(latest.mean, 6.0);

    std::fs::remove_file(dir.path().join("data").join(SECOND)).unwrap();
    let report = pipeline.process(&SyncPlan {
        added: vec![],
        removed: vec![SECOND.to_string()],
    });
    assert_eq!(report.removed, [SECOND]);

    let records = pipeline.catalog().records("zurich", "chla").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(pipeline.catalog().latest("zurich", "chla").unwrap().unwrap().mean, 3.0);
    assert_eq!(pipeline.catalog().public("zurich", "chla").unwrap().len(), 1);
    assert!(!dir
        .path()
        .join("data_output/sencast/zurich/POLYMER_chla_S3B_20240101T141500_zurich.tif")
        .exists());
}

#[test]
fn test_infinite_pixels_keep_catalog_readable() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = setup(dir.path());
    for (file, value) in [(FIRST, 3.0f32), (SECOND, 6.0)] {
        let mut data = vec![value; 100];
        data[3 * 10 + 3] = f32::INFINITY;
        data[4 * 10 + 4] = f32::NEG_INFINITY;
        write_band(&dir.path().join("data").join(file), data);
    }

    let plan = SyncPlan {
        added: vec![FIRST.to_string(), SECOND.to_string()],
        removed: vec![],
    };
    assert!(pipeline.process(&plan).failed.is_empty());
    // a second pass re-reads the persisted documents
    assert!(pipeline.process(&plan).failed.is_empty());

    let records = pipeline.catalog().records("geneva", "chla").unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!((records[0].total_pixels, records[0].valid_pixels), (9, 7));
    assert_eq!((records[0].max, records[0].mean), (3.0, 3.0));
    assert_eq!(pipeline.catalog().latest("geneva", "chla").unwrap().unwrap().max, 6.0);
}

#[test]
fn test_failures_are_aggregated_after_successes() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = setup(dir.path());
    write_source(&dir.path().join("data").join(FIRST), 3.0, false);

    let bad_name = "sencast/garbage.tif";
    let unreadable = "sencast/POLYMER_chla_S3A_20240102T093000.tif";
    std::fs::write(dir.path().join("data").join(bad_name), b"x").unwrap();
    std::fs::write(dir.path().join("data").join(unreadable), b"not a tiff").unwrap();

    let sync = FakeSync::new(&[bad_name, FIRST, unreadable], &[]);
    match pipeline.run(&sync) {
        Err(CropError::BatchFailed(files)) => assert_eq!(files, [bad_name, unreadable]),
        other => panic!("expected batch failure, got {:?}", other),
    }

    // the good file still made it into the catalog
    assert_eq!(pipeline.catalog().records("geneva", "chla").unwrap().len(), 1);
    assert!(!dir.path().join("data").join(unreadable).exists());
    assert!(dir.path().join("data").join(FIRST).exists());
}

#[test]
fn test_no_updates_skips_pull() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = setup(dir.path());
    let sync = FakeSync::new(&[], &[]);
    let report = pipeline.run(&sync).unwrap();
    assert_eq!(sync.pulls.get(), 0);
    assert!(report.processed.is_empty());
}
