//! Agent decision client: prompt in, validated (tool, params) out, with a
//! full audit record of what the model actually said.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::llm::ChatCompletionService;
use super::prompt;
use super::AgentProfile;
use crate::game::ToolKind;

/// Everything worth persisting about one decision
#[derive(Debug, Clone, serde::Serialize)]
pub struct DecisionAudit {
    pub prompt: String,
    pub raw_response: String,
    pub parsed_json: Option<Value>,
    pub thoughts: String,
    pub chosen_tool: String,
    pub parameters: Value,
    pub fell_back: bool,
}

#[derive(Debug, Clone)]
pub struct AgentDecision {
    pub tool: ToolKind,
    pub params: Value,
    pub audit: DecisionAudit,
}

pub struct AgentClient {
    pub profile: AgentProfile,
    llm: Arc<dyn ChatCompletionService>,
}

impl AgentClient {
    pub fn new(profile: AgentProfile, llm: Arc<dyn ChatCompletionService>) -> Self {
        Self { profile, llm }
    }

    /// Ask the model for the next move. Any malformed or illegal output
    /// degrades to `wait` (when legal) or `do_nothing`; it never errors out.
    pub async fn decide(
        &self,
        state_view: &Value,
        legal_tools: &[ToolKind],
        turn: u32,
        seq: u32,
    ) -> AgentDecision {
        let system = prompt::system_prompt(&self.profile.name, &self.profile.personality);
        let user = prompt::user_prompt(state_view, legal_tools, turn, seq);

        if legal_tools.is_empty() {
            return self.fallback(
                user,
                String::new(),
                None,
                "no actions available".into(),
                legal_tools,
            );
        }

        let raw = match self.llm.complete(&system, &user).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(agent = %self.profile.name, "LLM call failed: {e}");
                return self.fallback(
                    user,
                    format!("<llm error: {e}>"),
                    None,
                    format!("LLM call failed: {e}"),
                    legal_tools,
                );
            }
        };

        let Some(parsed) = extract_json(&raw) else {
            return self.fallback(
                user,
                raw,
                None,
                "response could not be parsed as JSON".into(),
                legal_tools,
            );
        };

        let thoughts = parsed
            .get("thoughts")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let tool_name = parsed
            .get("tool_name")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let params = normalize_params(parsed.get("parameters").cloned().unwrap_or(Value::Null));

        match ToolKind::from_name(&tool_name) {
            Some(tool) if legal_tools.contains(&tool) => AgentDecision {
                tool,
                params: params.clone(),
                audit: DecisionAudit {
                    prompt: user,
                    raw_response: raw,
                    parsed_json: Some(parsed),
                    thoughts,
                    chosen_tool: tool.as_str().to_string(),
                    parameters: params,
                    fell_back: false,
                },
            },
            _ => self.fallback(
                user,
                raw,
                Some(parsed),
                format!("model chose unavailable tool '{tool_name}'"),
                legal_tools,
            ),
        }
    }

    fn fallback(
        &self,
        prompt: String,
        raw: String,
        parsed: Option<Value>,
        reason: String,
        legal_tools: &[ToolKind],
    ) -> AgentDecision {
        let tool = if legal_tools.contains(&ToolKind::Wait) {
            ToolKind::Wait
        } else {
            ToolKind::DoNothing
        };
        tracing::debug!(agent = %self.profile.name, %reason, fallback = tool.as_str(), "agent fallback");
        AgentDecision {
            tool,
            params: Value::Object(Map::new()),
            audit: DecisionAudit {
                prompt,
                raw_response: raw,
                parsed_json: parsed,
                thoughts: reason,
                chosen_tool: tool.as_str().to_string(),
                parameters: Value::Object(Map::new()),
                fell_back: true,
            },
        }
    }
}

/// Best-effort JSON extraction: strip code fences, then fall back to the
/// outermost brace pair.
pub fn extract_json(raw: &str) -> Option<Value> {
    let cleaned = strip_code_fences(raw.trim());

    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        if value.is_object() {
            return Some(value);
        }
    }

    let first = cleaned.find('{')?;
    let last = cleaned.rfind('}')?;
    if last <= first {
        return None;
    }
    serde_json::from_str::<Value>(&cleaned[first..=last])
        .ok()
        .filter(Value::is_object)
}

fn strip_code_fences(s: &str) -> &str {
    let s = s
        .strip_prefix("```json")
        .or_else(|| s.strip_prefix("```"))
        .unwrap_or(s);
    s.strip_suffix("```").unwrap_or(s).trim()
}

/// Canonicalize the small fixed set of parameter synonyms models drift into
pub fn normalize_params(params: Value) -> Value {
    let Value::Object(map) = params else {
        return Value::Object(Map::new());
    };

    let mut out = Map::new();
    for (key, value) in map {
        let canonical = match key.as_str() {
            "target_player_id" | "to_player_id" | "recipient" => "recipient_id",
            "property_id" | "tile_id" | "tile_idx" => "square_id",
            "amount" | "bid" => "bid_amount",
            "offer_property_ids" | "offer_properties" | "offered_properties" => {
                "offered_property_ids"
            }
            "offer_money" => "offered_money",
            "offer_gooj_cards" => "offered_gooj_cards",
            "request_property_ids" | "request_properties" | "requested_properties" => {
                "requested_property_ids"
            }
            "request_money" => "requested_money",
            "request_gooj_cards" => "requested_gooj_cards",
            other => other,
        };
        // First writer wins so an explicit canonical key is never clobbered
        out.entry(canonical.to_string()).or_insert(value);
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted chat service for tests
    pub struct ScriptedChat {
        responses: Mutex<Vec<String>>,
    }

    impl ScriptedChat {
        pub fn new(mut responses: Vec<&str>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            }
        }
    }

    #[async_trait]
    impl ChatCompletionService for ScriptedChat {
        async fn complete(
            &self,
            _system: &str,
            _user: &str,
        ) -> Result<String, super::super::llm::LlmError> {
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| "not json".to_string()))
        }
    }

    fn test_profile() -> AgentProfile {
        AgentProfile {
            uid: "agent-1".into(),
            name: "Tester".into(),
            personality: String::new(),
            ledger_account_id: "acct-1".into(),
            games_played: 0,
            games_won: 0,
        }
    }

    #[test]
    fn extracts_json_from_code_fences() {
        let raw = "```json\n{\"thoughts\": \"hm\", \"tool_name\": \"roll_dice\", \"parameters\": {}}\n```";
        let parsed = extract_json(raw).unwrap();
        assert_eq!(parsed["tool_name"], "roll_dice");
    }

    #[test]
    fn extracts_json_embedded_in_prose() {
        let raw = "Sure! Here is my move: {\"tool_name\": \"end_turn\", \"parameters\": {}} Hope that helps.";
        let parsed = extract_json(raw).unwrap();
        assert_eq!(parsed["tool_name"], "end_turn");
    }

    #[test]
    fn normalizes_parameter_synonyms() {
        let params = serde_json::json!({
            "target_player_id": 2,
            "offer_money": 100,
            "property_id": 39,
        });
        let normalized = normalize_params(params);
        assert_eq!(normalized["recipient_id"], 2);
        assert_eq!(normalized["offered_money"], 100);
        assert_eq!(normalized["square_id"], 39);
    }

    #[tokio::test]
    async fn valid_decision_passes_through() {
        let chat = ScriptedChat::new(vec![
            r#"{"thoughts": "rolling", "tool_name": "roll_dice", "parameters": {}}"#,
        ]);
        let client = AgentClient::new(test_profile(), std::sync::Arc::new(chat));
        let decision = client
            .decide(&serde_json::json!({}), &[ToolKind::RollDice], 1, 1)
            .await;
        assert_eq!(decision.tool, ToolKind::RollDice);
        assert!(!decision.audit.fell_back);
        assert_eq!(decision.audit.thoughts, "rolling");
    }

    #[tokio::test]
    async fn illegal_tool_falls_back_to_wait() {
        let chat = ScriptedChat::new(vec![
            r#"{"thoughts": "!", "tool_name": "buy_property", "parameters": {}}"#,
        ]);
        let client = AgentClient::new(test_profile(), std::sync::Arc::new(chat));
        let decision = client
            .decide(
                &serde_json::json!({}),
                &[ToolKind::Wait, ToolKind::RollDice],
                1,
                1,
            )
            .await;
        assert_eq!(decision.tool, ToolKind::Wait);
        assert!(decision.audit.fell_back);
    }

    #[tokio::test]
    async fn garbage_output_falls_back_to_do_nothing_when_wait_illegal() {
        let chat = ScriptedChat::new(vec!["complete nonsense"]);
        let client = AgentClient::new(test_profile(), std::sync::Arc::new(chat));
        let decision = client
            .decide(&serde_json::json!({}), &[ToolKind::RollDice], 1, 1)
            .await;
        assert_eq!(decision.tool, ToolKind::DoNothing);
        assert!(decision.audit.fell_back);
    }
}
