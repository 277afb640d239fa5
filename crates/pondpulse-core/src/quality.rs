//! Water-quality classification used by report exports.
//!
//! A pure function of the period's average pH, average temperature, and
//! mortality count. The thresholds are fixed operational bands: pH 6.5-8.5
//! and 24-30°C are the healthy ranges for the ponds this system monitors.

use serde::Serialize;

const PH_RANGE: std::ops::RangeInclusive<f64> = 6.5..=8.5;
const TEMP_RANGE_C: std::ops::RangeInclusive<f64> = 24.0..=30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WaterQuality {
    Good,
    Fair,
    Poor,
    /// Either reading was absent for the period; no classification.
    Unknown,
}

impl WaterQuality {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            WaterQuality::Good => "Good",
            WaterQuality::Fair => "Fair",
            WaterQuality::Poor => "Poor",
            WaterQuality::Unknown => "Unknown",
        }
    }

    /// Numeric score shown alongside the label in exports.
    #[must_use]
    pub fn score(self) -> Option<u8> {
        match self {
            WaterQuality::Good => Some(90),
            WaterQuality::Fair => Some(70),
            WaterQuality::Poor => Some(40),
            WaterQuality::Unknown => None,
        }
    }
}

/// Classifies a period from its average temperature (°C), average pH, and
/// mortality count.
///
/// Good: both readings in range and zero mortality. Fair: mortality of at
/// most 3, or in-range readings with some mortality. Poor: otherwise.
/// Unknown when either reading is absent.
#[must_use]
pub fn classify(
    avg_temperature: Option<f64>,
    avg_ph: Option<f64>,
    mortality: u32,
) -> WaterQuality {
    let (Some(temp), Some(ph)) = (avg_temperature, avg_ph) else {
        return WaterQuality::Unknown;
    };
    let in_range = PH_RANGE.contains(&ph) && TEMP_RANGE_C.contains(&temp);
    if in_range && mortality == 0 {
        WaterQuality::Good
    } else if mortality <= 3 || in_range {
        WaterQuality::Fair
    } else {
        WaterQuality::Poor
    }
}
