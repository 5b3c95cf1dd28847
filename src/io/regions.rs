//! Region-of-interest polygons loaded from a GeoJSON feature collection

use crate::types::{CropError, CropResult, Envelope};
use geo::BoundingRect;
use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

/// A named polygonal region; the key partitions the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub key: String,
    pub geometry: MultiPolygon<f64>,
}

impl Region {
    /// Build a region from one or more rings; unclosed rings are closed.
    pub fn new(key: impl Into<String>, geometry: MultiPolygon<f64>) -> CropResult<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(CropError::InvalidRegion("empty region key".to_string()));
        }
        let has_area = geometry.0.iter().any(|p| p.exterior().0.len() >= 4);
        if !has_area {
            return Err(CropError::InvalidRegion(format!(
                "region '{}' has no polygon with at least three vertices",
                key
            )));
        }
        Ok(Self { key, geometry })
    }

    /// Convenience constructor for a single exterior ring
    pub fn from_ring(key: impl Into<String>, ring: Vec<(f64, f64)>) -> CropResult<Self> {
        let polygon = Polygon::new(LineString::from(ring), vec![]);
        Self::new(key, MultiPolygon(vec![polygon]))
    }

    pub fn envelope(&self) -> Option<Envelope> {
        self.geometry.bounding_rect().map(|rect| Envelope {
            min_x: rect.min().x,
            max_x: rect.max().x,
            min_y: rect.min().y,
            max_y: rect.max().y,
        })
    }
}

/// The externally supplied collection of regions, in file order
#[derive(Debug, Clone, Default)]
pub struct RegionSet {
    regions: Vec<Region>,
}

#[derive(Deserialize)]
struct FeatureCollectionJson {
    features: Vec<FeatureJson>,
}

#[derive(Deserialize)]
struct FeatureJson {
    #[serde(default)]
    properties: serde_json::Map<String, Value>,
    geometry: GeometryJson,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum GeometryJson {
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
}

impl RegionSet {
    pub fn new(regions: Vec<Region>) -> CropResult<Self> {
        let mut seen = HashSet::new();
        for region in &regions {
            if !seen.insert(region.key.as_str()) {
                return Err(CropError::InvalidRegion(format!("duplicate region key '{}'", region.key)));
            }
        }
        Ok(Self { regions })
    }

    pub fn from_geojson_file<P: AsRef<Path>>(path: P) -> CropResult<Self> {
        log::info!("Loading regions from: {}", path.as_ref().display());
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_geojson_str(&content)
    }

    pub fn from_geojson_str(content: &str) -> CropResult<Self> {
        let collection: FeatureCollectionJson = serde_json::from_str(content)?;
        let mut regions = Vec::with_capacity(collection.features.len());

        for (index, feature) in collection.features.into_iter().enumerate() {
            let key = match feature.properties.get("key") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => {
                    return Err(CropError::InvalidRegion(format!(
                        "feature {} has no 'key' property",
                        index
                    )))
                }
            };
            let geometry = match feature.geometry {
                GeometryJson::Polygon { coordinates } => MultiPolygon(vec![polygon_from_json(&key, coordinates)?]),
                GeometryJson::MultiPolygon { coordinates } => MultiPolygon(
                    coordinates
                        .into_iter()
                        .map(|rings| polygon_from_json(&key, rings))
                        .collect::<CropResult<Vec<_>>>()?,
                ),
            };
            regions.push(Region::new(key, geometry)?);
        }

        log::debug!("Loaded {} regions", regions.len());
        Self::new(regions)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Region> {
        self.regions.iter()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn as_slice(&self) -> &[Region] {
        &self.regions
    }
}

fn polygon_from_json(key: &str, rings: Vec<Vec<Vec<f64>>>) -> CropResult<Polygon<f64>> {
    let mut rings = rings.into_iter().map(|ring| {
        ring.into_iter()
            .map(|pos| match pos.as_slice() {
                [x, y, ..] => Ok(Coord { x: *x, y: *y }),
                _ => Err(CropError::InvalidRegion(format!("region '{}' has a short position", key))),
            })
            .collect::<CropResult<Vec<_>>>()
            .map(LineString::from)
    });
    let exterior = rings
        .next()
        .ok_or_else(|| CropError::InvalidRegion(format!("region '{}' has an empty polygon", key)))??;
    let interiors = rings.collect::<CropResult<Vec<_>>>()?;
    // Polygon::new closes any ring whose first and last vertex differ
    Ok(Polygon::new(exterior, interiors))
}

impl<'a> IntoIterator for &'a RegionSet {
    type Item = &'a Region;
    type IntoIter = std::slice::Iter<'a, Region>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}
