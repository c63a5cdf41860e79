//! Live-search agent: one LLM call picks a tool, the tool runs, one more
//! LLM call synthesizes the answer from the tool output.

use anyhow::Result;
use tracing::debug;

use super::provider::LlmProvider;
use crate::tools::WebTools;

/// The fixed tool set the router picks from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolChoice {
    Wiki,
    Scrape,
    Search,
}

impl ToolChoice {
    /// Parse the router's reply. Tolerant of extra prose; anything
    /// unrecognized falls back to web search.
    pub fn parse(decision: &str) -> Self {
        let upper = decision.trim().to_uppercase();
        if upper.contains("WIKI") {
            ToolChoice::Wiki
        } else if upper.contains("SCRAPE") {
            ToolChoice::Scrape
        } else {
            ToolChoice::Search
        }
    }

    /// Human-readable source label for citations.
    pub fn source_label(&self) -> &'static str {
        match self {
            ToolChoice::Wiki => "Wikipedia",
            ToolChoice::Scrape => "Web Scraper",
            ToolChoice::Search => "DuckDuckGo Web Search",
        }
    }
}

fn router_prompt(query: &str) -> String {
    format!(
        "You are a routing agent. You must choose ONE tool to answer the user's query.\n\
         Tools available:\n\
         1. WIKI - For historical facts, biographies, science definitions, and general knowledge.\n\
         2. SCRAPE - If the user explicitly provides a URL starting with http/https.\n\
         3. SEARCH - For recent news, current prices, events, or anything else.\n\
         \n\
         User Query: {}\n\
         \n\
         Reply with ONLY the tool name (WIKI, SCRAPE, or SEARCH). Do not explain.",
        query
    )
}

fn synthesis_prompt(query: &str, source: &str, tool_result: &str) -> String {
    format!(
        "You are a live research agent.\n\
         User Query: {}\n\
         \n\
         I have gathered this data from {}:\n\
         {}\n\
         \n\
         Answer the user's question using ONLY this data.\n\
         If the data is an error message, explain it to the user.",
        query, source, tool_result
    )
}

/// Pull the first URL out of a query, falling back to the query itself.
pub fn extract_url(query: &str) -> &str {
    query
        .split_whitespace()
        .find(|word| word.starts_with("http"))
        .unwrap_or(query)
}

/// Step 1: ask the model which tool fits the query.
pub async fn pick_tool(provider: &dyn LlmProvider, query: &str) -> Result<ToolChoice> {
    let decision = provider.complete(&router_prompt(query)).await?;
    let choice = ToolChoice::parse(&decision);
    debug!("Live agent selected tool: {:?}", choice);
    Ok(choice)
}

/// Step 2: run the chosen tool. Tool failures come back as text for the
/// model to explain, so this does not return Result.
pub async fn execute_tool(
    tools: &WebTools,
    choice: ToolChoice,
    query: &str,
    max_results: usize,
) -> String {
    match choice {
        ToolChoice::Wiki => tools.search_wikipedia(query).await,
        ToolChoice::Scrape => tools.scrape_url(extract_url(query)).await,
        ToolChoice::Search => tools.search_web(query, max_results).await,
    }
}

/// Step 3: synthesize the final answer, prefixed with its source.
pub async fn synthesize(
    provider: &dyn LlmProvider,
    query: &str,
    choice: ToolChoice,
    tool_result: &str,
) -> Result<String> {
    let answer = provider
        .complete(&synthesis_prompt(query, choice.source_label(), tool_result))
        .await?;

    Ok(format!(
        "**[Source: {}]**\n\n{}",
        choice.source_label(),
        answer
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_tolerant_of_prose() {
        assert_eq!(ToolChoice::parse("WIKI"), ToolChoice::Wiki);
        assert_eq!(ToolChoice::parse(" wiki\n"), ToolChoice::Wiki);
        assert_eq!(
            ToolChoice::parse("I would use SCRAPE for this."),
            ToolChoice::Scrape
        );
        assert_eq!(ToolChoice::parse("SEARCH"), ToolChoice::Search);
        // Unknown answers default to search
        assert_eq!(ToolChoice::parse("no idea"), ToolChoice::Search);
        assert_eq!(ToolChoice::parse(""), ToolChoice::Search);
    }

    #[test]
    fn extract_url_finds_first_link() {
        assert_eq!(
            extract_url("summarize https://example.com/a please"),
            "https://example.com/a"
        );
        assert_eq!(
            extract_url("http://one.com then https://two.com"),
            "http://one.com"
        );
        // No URL: the whole query is the fallback
        assert_eq!(extract_url("just words"), "just words");
    }

    #[test]
    fn router_prompt_lists_all_tools() {
        let prompt = router_prompt("who was Ada Lovelace?");
        assert!(prompt.contains("WIKI"));
        assert!(prompt.contains("SCRAPE"));
        assert!(prompt.contains("SEARCH"));
        assert!(prompt.contains("who was Ada Lovelace?"));
    }

    #[test]
    fn synthesis_prompt_carries_data_and_source() {
        let prompt = synthesis_prompt("query", "Wikipedia", "Source 1: ...");
        assert!(prompt.contains("gathered this data from Wikipedia"));
        assert!(prompt.contains("Source 1: ..."));
        assert!(prompt.contains("ONLY this data"));
    }
}
