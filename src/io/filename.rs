use crate::types::{CropError, CropResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Length of a compact `YYYYMMDDTHHMMSS` acquisition timestamp
const TIMESTAMP_LEN: usize = 15;

/// Provenance keys encoded in a source raster filename
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileProperties {
    pub processor: String,
    pub parameter: String,
    pub satellite: String,
    pub date: String,
    pub tile: Option<String>,
}

/// Parser for `{processor}_{parameter...}_{satellite}_{date}[_{tile}]{ext}`.
///
/// A trailing token of timestamp length means the name has no tile field;
/// anything else is taken as the tile code.
pub struct FilenameParser;

impl FilenameParser {
    pub fn parse<P: AsRef<Path>>(filename: P) -> CropResult<FileProperties> {
        let path = filename.as_ref();
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| CropError::InvalidFilename(path.display().to_string()))?;

        let parts: Vec<&str> = stem.split('_').collect();
        let malformed = || CropError::InvalidFilename(stem.to_string());
        if parts.len() < 3 {
            return Err(malformed());
        }

        let n = parts.len();
        let (tile, date_idx) = if parts[n - 1].len() == TIMESTAMP_LEN {
            (None, n - 1)
        } else {
            (Some(parts[n - 1].to_string()), n - 2)
        };

        // processor + parameter + satellite must precede the date
        if date_idx < 3 || parts[date_idx].len() != TIMESTAMP_LEN {
            return Err(malformed());
        }
        let parameter = parts[1..date_idx - 1].join("_");
        if parts[0].is_empty() || parameter.is_empty() {
            return Err(malformed());
        }

        Ok(FileProperties {
            processor: parts[0].to_string(),
            parameter,
            satellite: parts[date_idx - 1].to_string(),
            date: parts[date_idx].to_string(),
            tile,
        })
    }
}
