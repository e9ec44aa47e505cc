//! Prompt synthesis for agent decisions

use serde_json::Value;

use crate::game::ToolKind;

pub fn system_prompt(name: &str, personality: &str) -> String {
    let mut prompt = format!(
        "You are {name}, an autonomous player in a Monopoly-style board game. \
         You make every decision for your seat: rolling, buying, trading, \
         bidding, building and managing money. Play to win.\n"
    );
    if !personality.is_empty() {
        prompt.push_str(&format!("Your playing style: {personality}\n"));
    }
    prompt.push_str(
        "\nAlways answer with a single JSON object of the form \
         {\"thoughts\": \"...\", \"tool_name\": \"...\", \"parameters\": {...}}. \
         The tool_name must be one of the tools listed in the request, and the \
         parameters must follow the schema shown next to it. Never output \
         anything outside that JSON object.",
    );
    prompt
}

pub fn user_prompt(view: &Value, legal_tools: &[ToolKind], turn: u32, seq: u32) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== GAME STATE (turn {turn}, decision #{seq}) ===\n"));

    if let Some(cash) = view.get("cash").and_then(Value::as_i64) {
        let position = view.get("position").and_then(Value::as_u64).unwrap_or(0);
        let square = view
            .get("current_square")
            .and_then(Value::as_str)
            .unwrap_or("?");
        out.push_str(&format!(
            "You have ${cash} and stand on square {position} ({square}).\n"
        ));
    }
    if view.get("in_jail").and_then(Value::as_bool) == Some(true) {
        let attempts = view
            .get("jail_turns_attempted")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        out.push_str(&format!(
            "You are IN PRISON ({attempts}/3 release rolls used).\n"
        ));
    }

    if let Some(props) = view.get("my_properties").and_then(Value::as_array) {
        let (mortgaged, clear): (Vec<&Value>, Vec<&Value>) = props
            .iter()
            .partition(|p| p.get("is_mortgaged").and_then(Value::as_bool) == Some(true));
        out.push_str("\nYour holdings:\n");
        if clear.is_empty() && mortgaged.is_empty() {
            out.push_str("  (none)\n");
        }
        for p in clear {
            out.push_str(&format!(
                "  [{}] {} - houses: {}\n",
                p.get("square_id").and_then(Value::as_u64).unwrap_or(0),
                p.get("name").and_then(Value::as_str).unwrap_or("?"),
                p.get("houses").and_then(Value::as_u64).unwrap_or(0),
            ));
        }
        for p in mortgaged {
            out.push_str(&format!(
                "  [{}] {} - MORTGAGED\n",
                p.get("square_id").and_then(Value::as_u64).unwrap_or(0),
                p.get("name").and_then(Value::as_str).unwrap_or("?"),
            ));
        }
    }

    if let Some(opponents) = view.get("opponents").and_then(Value::as_array) {
        out.push_str("\nOpponents:\n");
        for o in opponents {
            out.push_str(&format!(
                "  P{} {} - ${}, squares {:?}{}\n",
                o.get("player_id").and_then(Value::as_u64).unwrap_or(0),
                o.get("name").and_then(Value::as_str).unwrap_or("?"),
                o.get("cash").and_then(Value::as_i64).unwrap_or(0),
                o.get("properties")
                    .and_then(Value::as_array)
                    .map(|a| a.iter().filter_map(Value::as_u64).collect::<Vec<_>>())
                    .unwrap_or_default(),
                if o.get("is_bankrupt").and_then(Value::as_bool) == Some(true) {
                    " (BANKRUPT)"
                } else {
                    ""
                },
            ));
        }
    }

    if let Some(pending) = view.get("pending_decision") {
        if !pending.is_null() {
            out.push_str(&format!(
                "\nPending decision requiring your action:\n{}\n",
                serde_json::to_string_pretty(pending).unwrap_or_default()
            ));
        }
    }
    if let Some(trade) = view.get("active_trade") {
        if !trade.is_null() {
            out.push_str(&format!(
                "\nActive trade under negotiation:\n{}\n",
                serde_json::to_string_pretty(trade).unwrap_or_default()
            ));
        }
    }
    if let Some(auction) = view.get("auction") {
        if !auction.is_null() {
            out.push_str(&format!(
                "\nAuction in progress:\n{}\n",
                serde_json::to_string_pretty(auction).unwrap_or_default()
            ));
        }
    }

    if let Some(log) = view.get("recent_log").and_then(Value::as_array) {
        out.push_str("\nRecent events (errors highlighted):\n");
        for entry in log {
            let line = entry.as_str().unwrap_or("");
            if line.to_lowercase().contains("failed") || line.to_lowercase().contains("error") {
                out.push_str(&format!("  !! {line}\n"));
            } else {
                out.push_str(&format!("  - {line}\n"));
            }
        }
    }

    out.push_str("\n=== YOUR LEGAL TOOLS ===\n");
    for tool in legal_tools {
        out.push_str(&format!("  {} params: {}\n", tool.as_str(), tool.params_hint()));
    }
    out.push_str(
        "\nIf a previous action of yours failed, read the error in the event \
         log and choose a different, legal tool. Respond with the JSON object \
         only.\n",
    );

    out
}
