// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Measurement reliability classification.
//!
//! External energy trackers sample on a fixed window. Runs shorter than that
//! window produce readings dominated by the tracker's noise floor, so every
//! record carries a duration-relative confidence label.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::record::RunRecord;

/// Tracked duration at or above which a measurement is reliable.
pub const RELIABLE_MIN_SECS: f64 = 15.0;
/// Tracked duration at or above which a measurement is at least marginal.
pub const MARGINAL_MIN_SECS: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reliability {
    Reliable,
    Marginal,
    Unreliable,
    Unknown,
}

impl Reliability {
    /// Classify a tracked duration in seconds.
    pub fn from_duration(secs: f64) -> Self {
        if !secs.is_finite() || secs < 0.0 {
            Self::Unknown
        } else if secs >= RELIABLE_MIN_SECS {
            Self::Reliable
        } else if secs >= MARGINAL_MIN_SECS {
            Self::Marginal
        } else {
            Self::Unreliable
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reliable => "reliable",
            Self::Marginal => "marginal",
            Self::Unreliable => "unreliable",
            Self::Unknown => "unknown",
        }
    }

    /// Short human description used in reports.
    pub const fn describe(&self) -> &'static str {
        match self {
            Self::Reliable => "Reliable (>=15s)",
            Self::Marginal => "Marginal (5-15s)",
            Self::Unreliable => "Unreliable (<5s)",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Reliability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a resolved classification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReliabilitySource {
    Explicit,
    Emissions,
    Duration,
    Fallback,
}

/// Outcome of resolving a record's reliability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReliabilityResolution {
    pub classification: Reliability,
    pub source: ReliabilitySource,
    /// Set when a stored classification disagrees with what the tracked
    /// duration alone would give. Holds the duration-based value.
    pub duration_disagreement: Option<Reliability>,
}

type Extractor = fn(&RunRecord) -> Option<Reliability>;

/// Evaluated in order; the first extractor yielding a value wins.
const CHAIN: &[(ReliabilitySource, Extractor)] = &[
    (ReliabilitySource::Explicit, explicit),
    (ReliabilitySource::Emissions, nested),
    (ReliabilitySource::Duration, inferred),
];

fn explicit(record: &RunRecord) -> Option<Reliability> {
    record.measurement_reliability
}

fn nested(record: &RunRecord) -> Option<Reliability> {
    record.emissions.reliability
}

fn inferred(record: &RunRecord) -> Option<Reliability> {
    tracked_duration(record).map(Reliability::from_duration)
}

/// Tracked duration of a record. Older records lack the field and fall back
/// to the load-phase duration.
pub fn tracked_duration(record: &RunRecord) -> Option<f64> {
    record
        .tracked_duration_seconds
        .or(Some(record.test_duration_seconds))
        .filter(|d| d.is_finite() && *d > 0.0)
}

/// Resolve a record's classification through the extractor chain.
pub fn resolve(record: &RunRecord) -> ReliabilityResolution {
    let (source, classification) = CHAIN
        .iter()
        .find_map(|(source, extract)| extract(record).map(|c| (*source, c)))
        .unwrap_or((ReliabilitySource::Fallback, Reliability::Unknown));

    let duration_disagreement = match source {
        ReliabilitySource::Explicit | ReliabilitySource::Emissions
            if classification != Reliability::Unknown =>
        {
            inferred(record).filter(|d| *d != classification)
        }
        _ => None,
    };

    if let Some(by_duration) = duration_disagreement {
        warn!(
            subject = %record.subject,
            load = record.load_size,
            endpoint = %record.endpoint_name,
            stored = %classification,
            by_duration = %by_duration,
            "Stored reliability disagrees with tracked duration; keeping stored value"
        );
    }

    ReliabilityResolution {
        classification,
        source,
        duration_disagreement,
    }
}

/// Counts of each classification over a set of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReliabilityBreakdown {
    pub reliable: usize,
    pub marginal: usize,
    pub unreliable: usize,
    pub unknown: usize,
}

impl ReliabilityBreakdown {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a RunRecord>) -> Self {
        let mut breakdown = Self::default();
        for record in records {
            match resolve(record).classification {
                Reliability::Reliable => breakdown.reliable += 1,
                Reliability::Marginal => breakdown.marginal += 1,
                Reliability::Unreliable => breakdown.unreliable += 1,
                Reliability::Unknown => breakdown.unknown += 1,
            }
        }
        breakdown
    }

    pub fn total(&self) -> usize {
        self.reliable + self.marginal + self.unreliable + self.unknown
    }

    /// Fraction of records classified unreliable, 0.0 when empty.
    pub fn unreliable_fraction(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            n => self.unreliable as f64 / n as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::record;

    #[test]
    fn test_duration_thresholds() {
        assert_eq!(Reliability::from_duration(20.0), Reliability::Reliable);
        assert_eq!(Reliability::from_duration(15.0), Reliability::Reliable);
        assert_eq!(Reliability::from_duration(10.0), Reliability::Marginal);
        assert_eq!(Reliability::from_duration(5.0), Reliability::Marginal);
        assert_eq!(Reliability::from_duration(2.0), Reliability::Unreliable);
        assert_eq!(Reliability::from_duration(f64::NAN), Reliability::Unknown);
    }

    #[test]
    fn test_explicit_takes_precedence() {
        let mut r = record("fastapi", 100, "light");
        r.tracked_duration_seconds = Some(10.0);
        r.emissions.reliability = Some(Reliability::Unreliable);
        r.measurement_reliability = Some(Reliability::Reliable);

        let res = resolve(&r);
        assert_eq!(res.classification, Reliability::Reliable);
        assert_eq!(res.source, ReliabilitySource::Explicit);
        assert_eq!(res.duration_disagreement, Some(Reliability::Marginal));
    }

    #[test]
    fn test_nested_then_duration() {
        let mut r = record("gin", 100, "light");
        r.tracked_duration_seconds = Some(2.0);
        r.emissions.reliability = Some(Reliability::Unreliable);
        let res = resolve(&r);
        assert_eq!(res.source, ReliabilitySource::Emissions);
        assert!(res.duration_disagreement.is_none());

        r.emissions.reliability = None;
        let res = resolve(&r);
        assert_eq!(res.source, ReliabilitySource::Duration);
        assert_eq!(res.classification, Reliability::Unreliable);
    }

    #[test]
    fn test_explicit_unknown_is_a_classification() {
        let mut r = record("chi", 100, "light");
        r.measurement_reliability = Some(Reliability::Unknown);
        let res = resolve(&r);
        assert_eq!(res.classification, Reliability::Unknown);
        assert_eq!(res.source, ReliabilitySource::Explicit);
        assert!(res.duration_disagreement.is_none());
    }

    #[test]
    fn test_fallback_unknown() {
        let mut r = record("django", 100, "light");
        r.tracked_duration_seconds = None;
        r.test_duration_seconds = 0.0;
        let res = resolve(&r);
        assert_eq!(res.classification, Reliability::Unknown);
        assert_eq!(res.source, ReliabilitySource::Fallback);
    }

    #[test]
    fn test_breakdown_fraction() {
        let mut a = record("a", 10, "light");
        a.tracked_duration_seconds = Some(1.0);
        let b = record("b", 10, "light");
        let breakdown = ReliabilityBreakdown::from_records([&a, &b]);
        assert_eq!(breakdown.unreliable, 1);
        assert_eq!(breakdown.reliable, 1);
        assert!((breakdown.unreliable_fraction() - 0.5).abs() < 1e-12);
    }
}
