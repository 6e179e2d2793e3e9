//! Instruction precedence: core > user > server/channel.
//!
//! Personas can be structured (JSON objects, deep-merged) or plain text
//! (layered sections in the system prompt). Either way the core layer
//! always wins on conflict.

use serde_json::Value;

/// Recursively merge `override_with` into `base`. Nested objects merge
/// key-by-key; any other value is replaced wholesale by the override.
pub fn deep_merge(base: &Value, override_with: &Value) -> Value {
    match (base, override_with) {
        (Value::Object(base_map), Value::Object(over_map)) => {
            let mut out = base_map.clone();
            for (k, v) in over_map {
                let merged = match out.get(k) {
                    Some(existing) => deep_merge(existing, v),
                    None => v.clone(),
                };
                out.insert(k.clone(), merged);
            }
            Value::Object(out)
        }
        (_, over) => over.clone(),
    }
}

/// Merge structured persona layers: server is the base, user overrides
/// server, core overrides both.
pub fn resolve_instructions(core: &Value, user: &Value, server: &Value) -> Value {
    let merged = deep_merge(server, user);
    deep_merge(&merged, core)
}

/// Render textual persona layers as prompt sections, core first. Empty
/// layers are omitted.
pub fn build_prompt_text(core_text: &str, user_text: &str, server_text: &str) -> String {
    let mut sections = Vec::new();
    if !core_text.trim().is_empty() {
        sections.push(format!("### CORE INSTRUCTIONS\n{}", core_text.trim()));
    }
    if !user_text.trim().is_empty() {
        sections.push(format!("### USER INSTRUCTIONS\n{}", user_text.trim()));
    }
    if !server_text.trim().is_empty() {
        sections.push(format!("### SERVER/CHANNEL INSTRUCTIONS\n{}", server_text.trim()));
    }
    sections.join("\n\n")
}
