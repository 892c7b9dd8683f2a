//! Trade-off vectors: the five-dimensional encoding of what a single choice
//! implies about a candidate's decision style.
//!
//! Every component lives in the closed interval [-1.0, 1.0]. Values coming from
//! the generative service are clamped on construction, never rejected.

use serde::{Deserialize, Serialize};

pub const MIN_COMPONENT: f64 = -1.0;
pub const MAX_COMPONENT: f64 = 1.0;

/// The five behavioral dimensions shared by trade-off vectors and Decision DNA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    RiskTolerance,
    DecisionSpeed,
    Consistency,
    Adaptability,
    LongTermThinking,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::RiskTolerance,
        Dimension::DecisionSpeed,
        Dimension::Consistency,
        Dimension::Adaptability,
        Dimension::LongTermThinking,
    ];

    /// Field name used on the wire and as a context-map key.
    pub fn key(self) -> &'static str {
        match self {
            Dimension::RiskTolerance => "risk_tolerance",
            Dimension::DecisionSpeed => "decision_speed",
            Dimension::Consistency => "consistency",
            Dimension::Adaptability => "adaptability",
            Dimension::LongTermThinking => "long_term_thinking",
        }
    }
}

/// Clamps a raw component into [-1, 1]. NaN collapses to the neutral 0.0.
pub fn clamp_component(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(MIN_COMPONENT, MAX_COMPONENT)
    }
}

/// A bounded trade-off vector. Fields are private so the clamping invariant
/// cannot be bypassed; deserialization goes through [`TradeoffVector::new`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawTradeoff")]
pub struct TradeoffVector {
    risk_tolerance: f64,
    decision_speed: f64,
    consistency: f64,
    adaptability: f64,
    long_term_thinking: f64,
}

/// Unchecked wire shape. All five fields are required and no others are accepted.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawTradeoff {
    pub risk_tolerance: f64,
    pub decision_speed: f64,
    pub consistency: f64,
    pub adaptability: f64,
    pub long_term_thinking: f64,
}

impl From<RawTradeoff> for TradeoffVector {
    fn from(raw: RawTradeoff) -> Self {
        TradeoffVector::new(
            raw.risk_tolerance,
            raw.decision_speed,
            raw.consistency,
            raw.adaptability,
            raw.long_term_thinking,
        )
    }
}

impl TradeoffVector {
    pub fn new(
        risk_tolerance: f64,
        decision_speed: f64,
        consistency: f64,
        adaptability: f64,
        long_term_thinking: f64,
    ) -> Self {
        Self {
            risk_tolerance: clamp_component(risk_tolerance),
            decision_speed: clamp_component(decision_speed),
            consistency: clamp_component(consistency),
            adaptability: clamp_component(adaptability),
            long_term_thinking: clamp_component(long_term_thinking),
        }
    }

    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::RiskTolerance => self.risk_tolerance,
            Dimension::DecisionSpeed => self.decision_speed,
            Dimension::Consistency => self.consistency,
            Dimension::Adaptability => self.adaptability,
            Dimension::LongTermThinking => self.long_term_thinking,
        }
    }

    /// `(key, value)` pairs in canonical dimension order.
    pub fn components(&self) -> [(&'static str, f64); 5] {
        Dimension::ALL.map(|d| (d.key(), self.get(d)))
    }
}
