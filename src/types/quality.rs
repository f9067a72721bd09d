//! Quality bands and classification results

use serde::{Deserialize, Serialize};

/// Named quality tier for one parameter or for the sample as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Critical,
    Poor,
    Fair,
    Good,
    Excellent,
    /// Parameter absent. Excluded from worst-of selection, scores 0.
    Unknown,
}

impl Band {
    /// Known bands from worst to best.
    pub const RANKED: [Band; 5] = [Band::Critical, Band::Poor, Band::Fair, Band::Good, Band::Excellent];

    /// Position in the worst-of ordering (0 = critical). `None` for `Unknown`.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Band::Critical => Some(0),
            Band::Poor => Some(1),
            Band::Fair => Some(2),
            Band::Good => Some(3),
            Band::Excellent => Some(4),
            Band::Unknown => None,
        }
    }

    /// Score contribution of this band before weighting.
    pub fn points(&self) -> u32 {
        match self {
            Band::Excellent => 100,
            Band::Good => 80,
            Band::Fair => 60,
            Band::Poor => 40,
            Band::Critical => 20,
            Band::Unknown => 0,
        }
    }

    /// Worst known band in `bands`, or `Unknown` if none is known.
    pub fn worst_of(bands: &[Band]) -> Band {
        bands
            .iter()
            .filter_map(|b| b.rank().map(|r| (r, *b)))
            .min_by_key(|(r, _)| *r)
            .map_or(Band::Unknown, |(_, b)| b)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Critical => "critical",
            Band::Poor => "poor",
            Band::Fair => "fair",
            Band::Good => "good",
            Band::Excellent => "excellent",
            Band::Unknown => "unknown",
        }
    }

    /// Human-readable assessment for reports and status output.
    pub fn description(&self) -> &'static str {
        match self {
            Band::Excellent => "Water quality is excellent. Safe for all uses including drinking (after proper treatment).",
            Band::Good => "Water quality is good. Generally safe for most uses with minimal treatment.",
            Band::Fair => "Water quality is fair. Suitable for uses with appropriate treatment. Monitor closely.",
            Band::Poor => "Water quality is poor. Not recommended for sensitive uses. Investigation recommended.",
            Band::Critical => "Water quality is critical. Immediate pollution event detected. Urgent action required.",
            Band::Unknown => "Unknown water quality status.",
        }
    }

    /// Operator recommendations for this band.
    pub fn recommendations(&self) -> &'static [&'static str] {
        match self {
            Band::Excellent => &[
                "Continue routine monitoring",
                "Maintain current conditions",
                "Regular maintenance of monitoring equipment",
            ],
            Band::Good => &[
                "Continue monitoring",
                "Review any recent changes in water source",
                "Ensure proper filtration if used for drinking",
            ],
            Band::Fair => &[
                "Increase monitoring frequency",
                "Investigate potential sources of degradation",
                "Consider additional treatment measures",
                "Review environmental factors",
            ],
            Band::Poor => &[
                "Immediately increase monitoring frequency",
                "Investigate pollution sources",
                "Restrict use for sensitive applications",
                "Consider implementing corrective measures",
                "Notify relevant authorities if required",
            ],
            Band::Critical => &[
                "IMMEDIATE ACTION REQUIRED",
                "Stop use for all sensitive applications",
                "Identify and isolate pollution source",
                "Notify environmental authorities",
                "Implement emergency treatment measures",
                "Consider evacuation of affected areas if necessary",
            ],
            Band::Unknown => &["Consult water quality expert"],
        }
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Band {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(Band::Critical),
            "poor" => Ok(Band::Poor),
            "fair" => Ok(Band::Fair),
            "good" => Ok(Band::Good),
            "excellent" => Ok(Band::Excellent),
            "unknown" => Ok(Band::Unknown),
            other => Err(format!("unknown band '{other}'")),
        }
    }
}

/// Per-parameter bands behind an overall classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandBreakdown {
    #[serde(rename = "pH_class")]
    pub ph: Band,
    #[serde(rename = "turbidity_class")]
    pub turbidity: Band,
    #[serde(rename = "temperature_class")]
    pub temperature: Band,
}

/// Result of classifying one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    #[serde(rename = "class")]
    pub band: Band,
    /// Weighted score, 0-100
    pub score: u8,
    /// `None` only for the fail-soft result of an internal failure.
    /// Written as `{}` in that case.
    #[serde(default, with = "details_or_empty")]
    pub details: Option<BandBreakdown>,
}

mod details_or_empty {
    use super::BandBreakdown;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        details: &Option<BandBreakdown>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match details {
            Some(breakdown) => breakdown.serialize(serializer),
            None => serializer.serialize_map(Some(0))?.end(),
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Full(BandBreakdown),
        Empty {},
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<BandBreakdown>, D::Error> {
        Ok(match Option::<Repr>::deserialize(deserializer)? {
            Some(Repr::Full(breakdown)) => Some(breakdown),
            Some(Repr::Empty {}) | None => None,
        })
    }
}

impl ClassificationResult {
    /// Result returned when classification could not be performed.
    pub fn unknown() -> Self {
        Self {
            band: Band::Unknown,
            score: 0,
            details: None,
        }
    }
}
