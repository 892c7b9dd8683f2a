//! Profile extraction: folds an ordered response log into one Decision DNA.
//!
//! Each answered scenario is an equally weighted behavioral sample: every
//! dimension of the profile is the arithmetic mean of that dimension over the
//! chosen options. The result depends only on the stored responses and
//! scenarios, so it can be recomputed from the log at any time.

use serde::{Deserialize, Serialize};

use crate::dna::scenario::{DecisionResponse, MicroScenario};
use crate::dna::tradeoff::{clamp_component, Dimension, TradeoffVector};

/// Aggregated five-dimensional profile of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DecisionDna {
    pub risk_tolerance: f64,
    pub decision_speed: f64,
    pub consistency: f64,
    pub adaptability: f64,
    pub long_term_thinking: f64,
    /// Number of responses that resolved to a scenario option.
    #[serde(default)]
    pub sample_count: u32,
}

impl DecisionDna {
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::RiskTolerance => self.risk_tolerance,
            Dimension::DecisionSpeed => self.decision_speed,
            Dimension::Consistency => self.consistency,
            Dimension::Adaptability => self.adaptability,
            Dimension::LongTermThinking => self.long_term_thinking,
        }
    }

    /// Same profile with every dimension clamped into [-1, 1]. Used on
    /// profiles that arrive from outside (e.g. the compatibility endpoint).
    pub fn clamped(&self) -> Self {
        Self {
            risk_tolerance: clamp_component(self.risk_tolerance),
            decision_speed: clamp_component(self.decision_speed),
            consistency: clamp_component(self.consistency),
            adaptability: clamp_component(self.adaptability),
            long_term_thinking: clamp_component(self.long_term_thinking),
            sample_count: self.sample_count,
        }
    }
}

/// Computes the Decision DNA for a response log.
///
/// Responses whose scenario or option cannot be found are skipped. An empty
/// (or fully unresolvable) log yields the all-zero profile.
pub fn extract(responses: &[DecisionResponse], scenarios: &[MicroScenario]) -> DecisionDna {
    let vectors: Vec<TradeoffVector> = responses
        .iter()
        .filter_map(|response| {
            find_scenario(scenarios, response.scenario_order)
                .and_then(|s| s.option(response.selected_option_id))
                .map(|o| o.tradeoff_vector)
        })
        .collect();

    if vectors.is_empty() {
        return DecisionDna::default();
    }

    let n = vectors.len() as f64;
    let mean = |dimension: Dimension| {
        clamp_component(vectors.iter().map(|v| v.get(dimension)).sum::<f64>() / n)
    };

    DecisionDna {
        risk_tolerance: mean(Dimension::RiskTolerance),
        decision_speed: mean(Dimension::DecisionSpeed),
        consistency: mean(Dimension::Consistency),
        adaptability: mean(Dimension::Adaptability),
        long_term_thinking: mean(Dimension::LongTermThinking),
        sample_count: vectors.len() as u32,
    }
}

/// Scenarios are normally stored at index == order; fall back to a scan otherwise.
fn find_scenario(scenarios: &[MicroScenario], order: u32) -> Option<&MicroScenario> {
    match scenarios.get(order as usize) {
        Some(s) if s.order() == order => Some(s),
        _ => scenarios.iter().find(|s| s.order() == order),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dna::scenario::{ContextMap, DecisionOption, OptionId};
    use proptest::prelude::*;

    fn scenario(order: u32, a: TradeoffVector, b: TradeoffVector) -> MicroScenario {
        MicroScenario::new(
            order,
            ContextMap::new(),
            format!("Scenario {order}"),
            [
                DecisionOption {
                    id: OptionId::A,
                    label: "Bold".to_string(),
                    tradeoff_vector: a,
                },
                DecisionOption {
                    id: OptionId::B,
                    label: "Careful".to_string(),
                    tradeoff_vector: b,
                },
            ],
            None,
            ContextMap::new(),
        )
    }

    fn response(order: u32, id: OptionId) -> DecisionResponse {
        DecisionResponse {
            scenario_order: order,
            selected_option_id: id,
            context_state_before: ContextMap::new(),
            context_state_after: ContextMap::new(),
            response_time_ms: None,
        }
    }

    fn cautious() -> TradeoffVector {
        TradeoffVector::new(-0.6, -0.5, 0.0, 0.0, 0.7)
    }

    fn bold() -> TradeoffVector {
        TradeoffVector::new(0.8, 0.9, -0.2, 0.4, -0.5)
    }

    #[test]
    fn test_identical_answers_reproduce_the_vector() {
        let scenarios: Vec<_> = (0..20).map(|i| scenario(i, bold(), cautious())).collect();
        let responses: Vec<_> = (0..20).map(|i| response(i, OptionId::B)).collect();
        let dna = extract(&responses, &scenarios);
        assert!((dna.risk_tolerance - -0.6).abs() < 1e-12);
        assert!((dna.decision_speed - -0.5).abs() < 1e-12);
        assert!((dna.long_term_thinking - 0.7).abs() < 1e-12);
        assert_eq!(dna.sample_count, 20);
    }

    #[test]
    fn test_mean_of_mixed_answers() {
        let scenarios = vec![scenario(0, bold(), cautious()), scenario(1, bold(), cautious())];
        let responses = vec![response(0, OptionId::A), response(1, OptionId::B)];
        let dna = extract(&responses, &scenarios);
        // (0.8 + -0.6) / 2 = 0.1
        assert!((dna.risk_tolerance - 0.1).abs() < 1e-12);
        // (0.9 + -0.5) / 2 = 0.2
        assert!((dna.decision_speed - 0.2).abs() < 1e-12);
        assert_eq!(dna.sample_count, 2);
    }

    #[test]
    fn test_empty_log_is_all_zero() {
        let dna = extract(&[], &[]);
        assert_eq!(dna, DecisionDna::default());
        assert_eq!(dna.sample_count, 0);
    }

    #[test]
    fn test_unresolvable_responses_are_skipped() {
        let scenarios = vec![scenario(0, bold(), cautious())];
        let responses = vec![response(0, OptionId::A), response(7, OptionId::B)];
        let dna = extract(&responses, &scenarios);
        assert_eq!(dna.sample_count, 1);
        assert!((dna.risk_tolerance - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_scenarios_out_of_index_order_still_resolve() {
        let scenarios = vec![scenario(1, bold(), cautious()), scenario(0, cautious(), bold())];
        let responses = vec![response(0, OptionId::A), response(1, OptionId::A)];
        let dna = extract(&responses, &scenarios);
        // scenario 0 option A = cautious, scenario 1 option A = bold
        assert!((dna.risk_tolerance - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_clamped_bounds_external_profiles() {
        let dna = DecisionDna {
            risk_tolerance: 3.0,
            decision_speed: -2.0,
            ..DecisionDna::default()
        };
        let c = dna.clamped();
        assert_eq!(c.risk_tolerance, 1.0);
        assert_eq!(c.decision_speed, -1.0);
    }

    fn arb_vector() -> impl Strategy<Value = TradeoffVector> {
        (
            -1.0..=1.0f64,
            -1.0..=1.0f64,
            -1.0..=1.0f64,
            -1.0..=1.0f64,
            -1.0..=1.0f64,
        )
            .prop_map(|(a, b, c, d, e)| TradeoffVector::new(a, b, c, d, e))
    }

    proptest! {
        #[test]
        fn prop_extract_is_pure_and_bounded(
            pairs in prop::collection::vec((arb_vector(), arb_vector(), any::<bool>()), 1..30)
        ) {
            let scenarios: Vec<_> = pairs
                .iter()
                .enumerate()
                .map(|(i, (a, b, _))| scenario(i as u32, *a, *b))
                .collect();
            let responses: Vec<_> = pairs
                .iter()
                .enumerate()
                .map(|(i, (_, _, pick_a))| {
                    response(i as u32, if *pick_a { OptionId::A } else { OptionId::B })
                })
                .collect();

            let first = extract(&responses, &scenarios);
            let second = extract(&responses, &scenarios);
            for d in Dimension::ALL {
                prop_assert_eq!(first.get(d).to_bits(), second.get(d).to_bits());
                prop_assert!((-1.0..=1.0).contains(&first.get(d)));
            }
            prop_assert_eq!(first.sample_count as usize, pairs.len());
        }
    }
}
