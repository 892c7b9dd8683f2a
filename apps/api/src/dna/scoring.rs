//! Compatibility scoring: compares a candidate's Decision DNA with the
//! employer's categorical target profile.
//!
//! Default: `OrdinalBucketScorer`. Each target axis is projected onto the
//! continuous profile, bucketed into faible / moyen / élevé, and scored by
//! ordinal distance to the employer's label. The final score is the mean of
//! the four per-axis scores.
//!
//! `AppState` holds an `Arc<dyn CompatibilityScorer>`, swapped at startup.

use serde::{Deserialize, Serialize};

use crate::dna::extractor::DecisionDna;
use crate::dna::tradeoff::Dimension;

// ────────────────────────────────────────────────────────────────────────────
// Target profile
// ────────────────────────────────────────────────────────────────────────────

/// Categorical level used both for employer targets and candidate buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    #[serde(rename = "faible")]
    Faible,
    #[serde(rename = "moyen")]
    Moyen,
    #[serde(rename = "élevé", alias = "eleve")]
    Eleve,
}

impl Level {
    fn rank(self) -> u8 {
        match self {
            Level::Faible => 0,
            Level::Moyen => 1,
            Level::Eleve => 2,
        }
    }

    /// Number of buckets between two levels (0, 1 or 2).
    pub fn distance(self, other: Level) -> u8 {
        self.rank().abs_diff(other.rank())
    }
}

/// The four axes an employer can set a target on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetAxis {
    #[serde(rename = "rapidité", alias = "rapidite")]
    Rapidite,
    #[serde(rename = "prudence")]
    Prudence,
    #[serde(rename = "optimisation_long_terme")]
    OptimisationLongTerme,
    #[serde(rename = "tolérance_au_risque", alias = "tolerance_au_risque")]
    ToleranceAuRisque,
}

impl TargetAxis {
    pub const ALL: [TargetAxis; 4] = [
        TargetAxis::Rapidite,
        TargetAxis::Prudence,
        TargetAxis::OptimisationLongTerme,
        TargetAxis::ToleranceAuRisque,
    ];

    /// Which profile dimension the axis reads, and with which sign.
    pub fn projection(self) -> (Dimension, f64) {
        match self {
            TargetAxis::Rapidite => (Dimension::DecisionSpeed, 1.0),
            TargetAxis::Prudence => (Dimension::RiskTolerance, -1.0),
            TargetAxis::OptimisationLongTerme => (Dimension::LongTermThinking, 1.0),
            TargetAxis::ToleranceAuRisque => (Dimension::RiskTolerance, 1.0),
        }
    }

    pub fn project(self, dna: &DecisionDna) -> f64 {
        let (dimension, sign) = self.projection();
        sign * dna.get(dimension)
    }
}

/// Employer-declared target: one level per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionProfileTarget {
    #[serde(rename = "rapidité", alias = "rapidite")]
    pub rapidite: Level,
    pub prudence: Level,
    pub optimisation_long_terme: Level,
    #[serde(rename = "tolérance_au_risque", alias = "tolerance_au_risque")]
    pub tolerance_au_risque: Level,
}

impl DecisionProfileTarget {
    pub fn level(&self, axis: TargetAxis) -> Level {
        match axis {
            TargetAxis::Rapidite => self.rapidite,
            TargetAxis::Prudence => self.prudence,
            TargetAxis::OptimisationLongTerme => self.optimisation_long_terme,
            TargetAxis::ToleranceAuRisque => self.tolerance_au_risque,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Bucketing
// ────────────────────────────────────────────────────────────────────────────

/// Boundaries between the three buckets. `v < lower` is faible, `v > upper`
/// is élevé, anything in between (inclusive) is moyen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketBoundaries {
    pub lower: f64,
    pub upper: f64,
}

impl Default for BucketBoundaries {
    fn default() -> Self {
        Self::symmetric(1.0 / 3.0)
    }
}

impl BucketBoundaries {
    pub fn symmetric(boundary: f64) -> Self {
        Self {
            lower: -boundary,
            upper: boundary,
        }
    }

    pub fn classify(&self, value: f64) -> Level {
        if value < self.lower {
            Level::Faible
        } else if value > self.upper {
            Level::Eleve
        } else {
            Level::Moyen
        }
    }
}

/// Per-axis score by ordinal distance: same bucket 1.0, adjacent 0.5, opposite 0.0.
pub fn axis_score(candidate: Level, target: Level) -> f64 {
    match candidate.distance(target) {
        0 => 1.0,
        1 => 0.5,
        _ => 0.0,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Report
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisMatch {
    pub axis: TargetAxis,
    pub target: Level,
    pub candidate_level: Level,
    pub candidate_value: f64,
    pub score: f64,
}

/// Compatibility result. `score` is the CompatibilityScore in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    pub score: f64,
    pub percent: u32,
    pub axes: Vec<AxisMatch>,
    pub scorer_backend: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Trait + default implementation
// ────────────────────────────────────────────────────────────────────────────

/// Swap scorer backends without touching the session protocol or handlers.
pub trait CompatibilityScorer: Send + Sync {
    fn score(&self, profile: &DecisionDna, target: &DecisionProfileTarget) -> CompatibilityReport;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OrdinalBucketScorer {
    pub boundaries: BucketBoundaries,
}

impl OrdinalBucketScorer {
    pub fn new(boundaries: BucketBoundaries) -> Self {
        Self { boundaries }
    }
}

impl CompatibilityScorer for OrdinalBucketScorer {
    fn score(&self, profile: &DecisionDna, target: &DecisionProfileTarget) -> CompatibilityReport {
        let axes: Vec<AxisMatch> = TargetAxis::ALL
            .iter()
            .map(|&axis| {
                let candidate_value = axis.project(profile);
                let candidate_level = self.boundaries.classify(candidate_value);
                let target_level = target.level(axis);
                AxisMatch {
                    axis,
                    target: target_level,
                    candidate_level,
                    candidate_value,
                    score: axis_score(candidate_level, target_level),
                }
            })
            .collect();

        let score = (axes.iter().map(|a| a.score).sum::<f64>() / axes.len() as f64).clamp(0.0, 1.0);

        CompatibilityReport {
            score,
            percent: (score * 100.0).round() as u32,
            axes,
            scorer_backend: "ordinal_bucket".to_string(),
        }
    }
}
