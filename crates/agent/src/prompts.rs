//! System prompt assembly.

use confide_policy::build_prompt_text;

pub const CAPABILITIES_TEXT: &str = "\
You can use tools via function calling when needed. Prefer:
- retrieve_memory for prior messages or facts
- calculator for math
- get_time for time questions
- web_search for web lookups (if enabled by the admin)
When unsure, ask brief clarifying questions.
Respect privacy and consent rules injected below.
When you use CONTEXT items that include a bracketed source tag like [filename p.3], include that tag inline next to the relevant statement.";

/// Assemble the full system prompt: instruction layers in precedence
/// order, capabilities, then the privacy rules.
pub fn make_system_prompt(
    core_text: &str,
    user_text: &str,
    server_text: &str,
    policy_text: &str,
) -> String {
    let instructions = build_prompt_text(core_text, user_text, server_text);
    format!(
        "{instructions}\n\n### CAPABILITIES\n{}\n\n### PRIVACY & CONSENT\n{}",
        CAPABILITIES_TEXT.trim(),
        policy_text.trim()
    )
}
