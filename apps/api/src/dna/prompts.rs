// Prompt constants for micro-scenario generation.
// Reuses the cross-cutting JSON-only fragment from llm_client::prompts.

/// System prompt for scenario generation.
pub const SCENARIO_SYSTEM: &str = "You are an organisational psychologist designing short, \
    realistic workplace situations that reveal how a candidate makes decisions under trade-offs. \
    Each situation offers exactly two options, and each option carries an honest trade-off.";

/// Scenario generation prompt. Replace every `{placeholder}` before sending.
pub const SCENARIO_PROMPT_TEMPLATE: &str = r#"Generate micro-scenario {scenario_number} of {total_scenarios} for a candidate applying to a {job_category} role.

Current situation (key-value context, evolves with each answer):
{context_json}

Previous choices, oldest first (scenario order, selected option id):
{history_json}

Return a JSON object with this EXACT schema (no extra fields):
{
  "decision_prompt": "One or two sentences describing the situation and the decision to make.",
  "options": [
    {
      "id": "A",
      "label": "Short description of the first option",
      "tradeoff_vector": {
        "risk_tolerance": 0.0,
        "decision_speed": 0.0,
        "consistency": 0.0,
        "adaptability": 0.0,
        "long_term_thinking": 0.0
      }
    },
    {
      "id": "B",
      "label": "Short description of the second option",
      "tradeoff_vector": {
        "risk_tolerance": 0.0,
        "decision_speed": 0.0,
        "consistency": 0.0,
        "adaptability": 0.0,
        "long_term_thinking": 0.0
      }
    }
  ],
  "context_evolution": {
    "key": "value describing how the situation changes after this decision"
  },
  "time_limit_seconds": 30
}

Rules:
- EXACTLY two options, with ids "A" and "B".
- Every trade-off value is a number between -1.0 and 1.0.
  -1.0 means the option strongly expresses the opposite of the dimension, 1.0 strongly expresses it.
- The two options must differ meaningfully on at least two dimensions.
- Build on the current situation; do not repeat a previous dilemma.
- "context_evolution" holds the new or changed facts of the situation for the next scenario.
- Write the decision prompt and labels in the candidate's language (French unless the context says otherwise)."#;
