use serde::{Deserialize, Serialize};

/// Page-performance metrics with known rating thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VitalName {
    /// Largest Contentful Paint
    Lcp,
    /// First Contentful Paint
    Fcp,
    /// Cumulative Layout Shift
    Cls,
    /// Interaction to Next Paint
    Inp,
    /// Time to First Byte
    Ttfb,
    Fid,
    Tti,
    Tbt,
}

impl VitalName {
    pub const CORE: [VitalName; 5] = [
        VitalName::Lcp,
        VitalName::Fcp,
        VitalName::Cls,
        VitalName::Inp,
        VitalName::Ttfb,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VitalName::Lcp => "LCP",
            VitalName::Fcp => "FCP",
            VitalName::Cls => "CLS",
            VitalName::Inp => "INP",
            VitalName::Ttfb => "TTFB",
            VitalName::Fid => "FID",
            VitalName::Tti => "TTI",
            VitalName::Tbt => "TBT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rating {
    Good,
    NeedsImprovement,
    Poor,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    pub good: f64,
    pub poor: f64,
}

const THRESHOLDS: &[(&str, Threshold)] = &[
    ("LCP", Threshold { good: 2500.0, poor: 4000.0 }),
    ("FCP", Threshold { good: 1800.0, poor: 3000.0 }),
    ("CLS", Threshold { good: 0.1, poor: 0.25 }),
    ("INP", Threshold { good: 200.0, poor: 500.0 }),
    ("TTFB", Threshold { good: 800.0, poor: 1800.0 }),
    ("FID", Threshold { good: 100.0, poor: 300.0 }),
    ("TTI", Threshold { good: 3800.0, poor: 7300.0 }),
    ("TBT", Threshold { good: 150.0, poor: 300.0 }),
];

pub fn threshold(metric: &str) -> Option<Threshold> {
    THRESHOLDS
        .iter()
        .find(|(name, _)| *name == metric)
        .map(|(_, t)| *t)
}

/// Pure function: (metric, value) -> verdict. Unknown metrics rate as `Good`.
pub fn classify(metric: &str, value: f64) -> Rating {
    match threshold(metric) {
        None => Rating::Good,
        Some(t) if value <= t.good => Rating::Good,
        Some(t) if value <= t.poor => Rating::NeedsImprovement,
        Some(_) => Rating::Poor,
    }
}
