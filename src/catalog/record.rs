use crate::types::ExtractionResult;
use chrono::{NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Compact acquisition timestamp layout used in filenames and records
pub const DATE_FORMAT: &str = "%Y%m%dT%H%M%S";

/// One observation of a parameter over a region, from one source raster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    #[serde(rename = "dt")]
    pub date: String,
    #[serde(rename = "k")]
    pub output_key: String,
    #[serde(rename = "p")]
    pub total_pixels: u64,
    #[serde(rename = "vp")]
    pub valid_pixels: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p10: f64,
    pub p90: f64,
    #[serde(rename = "c")]
    pub commit: String,
    #[serde(rename = "r")]
    pub reproduce: String,
}

impl CatalogRecord {
    pub fn from_extraction(result: &ExtractionResult, date: impl Into<String>, output_key: impl Into<String>) -> Self {
        let stats = &result.statistics;
        Self {
            date: date.into(),
            output_key: output_key.into(),
            total_pixels: stats.total_pixels,
            valid_pixels: stats.valid_pixels,
            min: stats.min,
            max: stats.max,
            mean: stats.mean,
            p10: stats.p10,
            p90: stats.p90,
            commit: result.provenance.commit.clone(),
            reproduce: result.provenance.reproduce.clone(),
        }
    }

    /// Share of mask-covered pixels holding a measurement
    pub fn valid_fraction(&self) -> f64 {
        if self.total_pixels == 0 {
            return 0.0;
        }
        self.valid_pixels as f64 / self.total_pixels as f64
    }

    /// Calendar day part (`YYYYMMDD`) of the date
    pub fn day(&self) -> &str {
        self.date.get(..8).unwrap_or(&self.date)
    }
}

/// Externally published summary of one observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicEntry {
    pub datetime: String,
    pub name: String,
    pub url: String,
    /// Integer percentage, e.g. `"87%"`
    pub valid_pixels: String,
}

impl PublicEntry {
    pub fn new(record: &CatalogRecord, display_name: &str, public_base_url: &str) -> Self {
        Self {
            datetime: public_datetime(&record.date),
            name: display_name.to_string(),
            url: format!("{}/{}", public_base_url.trim_end_matches('/'), record.output_key),
            valid_pixels: format!("{}%", (record.valid_fraction() * 100.0).round() as u64),
        }
    }
}

/// RFC 3339 rendering of a compact date, or the date unchanged if it does not parse
pub fn public_datetime(date: &str) -> String {
    match NaiveDateTime::parse_from_str(date, DATE_FORMAT) {
        Ok(naive) => Utc
            .from_utc_datetime(&naive)
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        Err(_) => date.to_string(),
    }
}
