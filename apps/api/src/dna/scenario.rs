//! Micro-scenarios and the responses recorded against them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dna::tradeoff::TradeoffVector;

/// Evolving situation passed between scenarios. Ordered for stable prompts and storage.
pub type ContextMap = BTreeMap<String, serde_json::Value>;

/// Option identifiers. Every scenario is a binary trade-off, so the alphabet has two letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionId {
    A,
    B,
}

impl OptionId {
    pub fn as_str(self) -> &'static str {
        match self {
            OptionId::A => "A",
            OptionId::B => "B",
        }
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionId {
    type Err = String;

    /// Case-insensitive, whitespace-tolerant.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(OptionId::A),
            "B" | "b" => Ok(OptionId::B),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionOption {
    pub id: OptionId,
    pub label: String,
    pub tradeoff_vector: TradeoffVector,
}

/// One presented step. Only the generation boundary can build one, which
/// guarantees exactly two options with distinct ids.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MicroScenario {
    order: u32,
    context_state: ContextMap,
    decision_prompt: String,
    options: [DecisionOption; 2],
    time_limit_seconds: Option<u32>,
    context_evolution: ContextMap,
}

impl MicroScenario {
    pub(crate) fn new(
        order: u32,
        context_state: ContextMap,
        decision_prompt: String,
        options: [DecisionOption; 2],
        time_limit_seconds: Option<u32>,
        context_evolution: ContextMap,
    ) -> Self {
        debug_assert_ne!(options[0].id, options[1].id);
        Self {
            order,
            context_state,
            decision_prompt,
            options,
            time_limit_seconds,
            context_evolution,
        }
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn context_state(&self) -> &ContextMap {
        &self.context_state
    }

    pub fn decision_prompt(&self) -> &str {
        &self.decision_prompt
    }

    pub fn options(&self) -> &[DecisionOption; 2] {
        &self.options
    }

    pub fn time_limit_seconds(&self) -> Option<u32> {
        self.time_limit_seconds
    }

    pub fn context_evolution(&self) -> &ContextMap {
        &self.context_evolution
    }

    pub fn option(&self, id: OptionId) -> Option<&DecisionOption> {
        self.options.iter().find(|o| o.id == id)
    }

    /// Resolves a raw id from the caller against this scenario's two options.
    pub fn resolve_option(&self, raw_id: &str) -> Option<&DecisionOption> {
        raw_id.parse::<OptionId>().ok().and_then(|id| self.option(id))
    }
}

/// Append-only record of one answered scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub scenario_order: u32,
    pub selected_option_id: OptionId,
    pub context_state_before: ContextMap,
    pub context_state_after: ContextMap,
    pub response_time_ms: Option<u64>,
}

/// Builds the context that follows a choice.
///
/// Precedence, lowest first: carried context, the chosen option's trade-off
/// values (plus `last_option_id`), the scenario's own `context_evolution`.
pub fn evolve_context(
    carried: &ContextMap,
    scenario: &MicroScenario,
    chosen: &DecisionOption,
) -> ContextMap {
    let mut next = carried.clone();
    for (key, value) in chosen.tradeoff_vector.components() {
        next.insert(key.to_string(), serde_json::json!(value));
    }
    next.insert(
        "last_option_id".to_string(),
        serde_json::Value::String(chosen.id.to_string()),
    );
    for (key, value) in scenario.context_evolution() {
        next.insert(key.clone(), value.clone());
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn option(id: OptionId, risk: f64) -> DecisionOption {
        DecisionOption {
            id,
            label: format!("Option {id}"),
            tradeoff_vector: TradeoffVector::new(risk, 0.0, 0.0, 0.0, 0.0),
        }
    }

    fn scenario_with_evolution(evolution: ContextMap) -> MicroScenario {
        MicroScenario::new(
            0,
            ContextMap::new(),
            "Ship now or wait for QA?".to_string(),
            [option(OptionId::A, 0.8), option(OptionId::B, -0.4)],
            Some(30),
            evolution,
        )
    }

    #[test]
    fn test_option_id_parses_leniently() {
        assert_eq!(" a ".parse::<OptionId>(), Ok(OptionId::A));
        assert_eq!("B".parse::<OptionId>(), Ok(OptionId::B));
        assert!("C".parse::<OptionId>().is_err());
        assert!("".parse::<OptionId>().is_err());
    }

    #[test]
    fn test_option_id_serde_is_uppercase_letter() {
        assert_eq!(serde_json::to_string(&OptionId::B).unwrap(), r#""B""#);
    }

    #[test]
    fn test_resolve_option_rejects_unknown_id() {
        let s = scenario_with_evolution(ContextMap::new());
        assert!(s.resolve_option("A").is_some());
        assert!(s.resolve_option("Z").is_none());
    }

    #[test]
    fn test_evolve_context_precedence() {
        let mut carried = ContextMap::new();
        carried.insert("team".to_string(), json!("platform"));
        carried.insert("risk_tolerance".to_string(), json!(0.0));
        carried.insert("phase".to_string(), json!("launch"));

        let mut evolution = ContextMap::new();
        evolution.insert("phase".to_string(), json!("post-launch"));
        evolution.insert("risk_tolerance".to_string(), json!("overridden"));

        let s = scenario_with_evolution(evolution);
        let chosen = s.option(OptionId::A).unwrap().clone();
        let next = evolve_context(&carried, &s, &chosen);

        // carried key untouched by later layers
        assert_eq!(next["team"], json!("platform"));
        // scenario-supplied keys win over both carried and option values
        assert_eq!(next["phase"], json!("post-launch"));
        assert_eq!(next["risk_tolerance"], json!("overridden"));
        // option vector merged in
        assert_eq!(next["long_term_thinking"], json!(0.0));
        assert_eq!(next["last_option_id"], json!("A"));
    }

    #[test]
    fn test_evolve_context_does_not_mutate_carried() {
        let carried = ContextMap::new();
        let s = scenario_with_evolution(ContextMap::new());
        let chosen = s.option(OptionId::B).unwrap().clone();
        let next = evolve_context(&carried, &s, &chosen);
        assert!(carried.is_empty());
        assert_eq!(next["risk_tolerance"], json!(-0.4));
    }
}
