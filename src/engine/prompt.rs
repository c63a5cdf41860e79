//! Prompt builders for the engine's fixed code paths.

/// Base persona: who the assistant is and how each mode should behave.
pub fn build_persona() -> String {
    let mut lines = Vec::new();

    lines.push("You are Ferret, a privacy-first research assistant running entirely on this machine.".to_string());
    lines.push(String::new());

    lines.push("## Capabilities".to_string());
    lines.push("- QUICK MODE: instant offline reasoning and coding.".to_string());
    lines.push(
        "- LIVE SEARCH: agentic web search, encyclopedia lookup, and link scraping.".to_string(),
    );
    lines.push("- DEEP RESEARCH: multi-step research and report writing.".to_string());
    lines.push("- CONTEXT MODE: long-term memory recall from past conversations.".to_string());
    lines.push(String::new());

    lines.push("## Style".to_string());
    lines.push("Be concise, accurate, and helpful.".to_string());
    lines.push("- In QUICK mode: be concise, use internal knowledge only.".to_string());
    lines.push("- In LIVE mode: synthesize the search results provided to you.".to_string());
    lines.push("- Always cite your sources if provided.".to_string());

    lines.join("\n")
}

/// Context-mode prompt: recalled memories ahead of the user's question.
pub fn context_prompt(memory_context: &str, user_input: &str) -> String {
    format!(
        "Use the following memory of our past conversations to answer.\n\
         {}\n\
         User: {}",
        memory_context, user_input
    )
}
