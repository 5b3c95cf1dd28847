use crate::catalog::record::CatalogRecord;
use serde::{Deserialize, Serialize};

/// Rule for picking the record most representative of current conditions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatestSelection {
    /// Records at or below this valid-pixel fraction are never selected
    pub min_valid_fraction: f64,
    /// How many of the most recent records take part in the same-day tie-break
    pub same_day_window: usize,
}

impl Default for LatestSelection {
    fn default() -> Self {
        Self {
            min_valid_fraction: 0.1,
            same_day_window: 5,
        }
    }
}

impl LatestSelection {
    /// Latest qualifying record, replaced by a same-day capture with more
    /// valid pixels when one is among the most recent few.
    pub fn select<'a>(&self, records: &'a [CatalogRecord]) -> Option<&'a CatalogRecord> {
        let mut candidates: Vec<&CatalogRecord> = records
            .iter()
            .filter(|r| r.valid_fraction() > self.min_valid_fraction)
            .collect();

        // max_by keeps the last of equal dates, i.e. the newest insertion
        let latest = *candidates.iter().max_by(|a, b| a.date.cmp(&b.date))?;

        candidates.sort_by(|a, b| b.date.cmp(&a.date));
        let best = candidates
            .iter()
            .take(self.same_day_window)
            .filter(|r| r.day() == latest.day())
            .fold(latest, |best, &r| {
                if r.valid_pixels > best.valid_pixels {
                    r
                } else {
                    best
                }
            });

        Some(best)
    }
}
