//! Deep-research pipeline: decompose the query into sub-questions, search
//! each one, then write a structured report from the gathered notes.

use anyhow::Result;
use tracing::info;

use super::provider::LlmProvider;
use crate::tools::WebTools;

/// Sub-questions per research run.
const MAX_SUB_QUERIES: usize = 3;

/// Search results gathered per sub-question.
const RESULTS_PER_SUB_QUERY: usize = 2;

fn decompose_prompt(query: &str) -> String {
    format!(
        "You are a Research Planner. Break this question: '{}' into 3 distinct, \
         search-friendly sub-questions. \
         Return ONLY the 3 questions separated by newlines. No numbering.",
        query
    )
}

fn report_prompt(query: &str, context: &str) -> String {
    format!(
        "You are a Senior Technical Writer.\n\
         Write a comprehensive answer to: '{}'.\n\
         Use the following research notes:\n\
         {}\n\
         \n\
         Format as a clean Markdown Report with:\n\
         - **Executive Summary**\n\
         - **Key Findings** (Use bullet points)\n\
         - **Detailed Analysis**\n\
         - **Conclusion**",
        query, context
    )
}

/// Split the planner's reply into sub-questions. Models ignore the "no
/// numbering" instruction often enough that leading markers are stripped.
pub fn parse_sub_queries(response: &str) -> Vec<String> {
    response
        .lines()
        .map(strip_list_marker)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .take(MAX_SUB_QUERIES)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let trimmed = line.trim_start();
    let without_digits = trimmed.trim_start_matches(|c: char| c.is_ascii_digit());
    if without_digits.len() < trimmed.len() {
        // "1. question" or "2) question"
        without_digits
            .strip_prefix('.')
            .or_else(|| without_digits.strip_prefix(')'))
            .unwrap_or(trimmed)
    } else {
        // "- question" or "* question"
        trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
            .unwrap_or(trimmed)
    }
}

/// Step 1: ask the model to break the question down.
pub async fn decompose(provider: &dyn LlmProvider, query: &str) -> Result<Vec<String>> {
    let response = provider.complete(&decompose_prompt(query)).await?;
    let sub_queries = parse_sub_queries(&response);
    info!("Decomposed into {} research tasks", sub_queries.len());
    Ok(sub_queries)
}

/// Step 2: search each sub-question and aggregate the notes under topic
/// headers. Searches run sequentially; a failed search contributes its
/// error text, which the report call is told to work around.
pub async fn gather(tools: &WebTools, sub_queries: &[String]) -> String {
    let mut aggregated = String::new();
    for sub_q in sub_queries {
        let result = tools.search_web(sub_q, RESULTS_PER_SUB_QUERY).await;
        aggregated.push_str(&format!("\n--- TOPIC: {} ---\n{}\n", sub_q, result));
    }
    aggregated
}

/// Step 3: synthesize all notes into the final report.
pub async fn write_report(
    provider: &dyn LlmProvider,
    query: &str,
    context: &str,
) -> Result<String> {
    provider.complete(&report_prompt(query, context)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_newline_list() {
        let queries = parse_sub_queries(
            "What is Rust?\nWho created Rust?\nWhen was Rust released?",
        );
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[0], "What is Rust?");
        assert_eq!(queries[2], "When was Rust released?");
    }

    #[test]
    fn parse_strips_numbering_and_bullets() {
        let queries = parse_sub_queries("1. First question\n2) Second question\n- Third question");
        assert_eq!(
            queries,
            vec!["First question", "Second question", "Third question"]
        );
    }

    #[test]
    fn parse_caps_at_three_and_drops_blanks() {
        let queries = parse_sub_queries("one\n\ntwo\n\nthree\nfour\nfive");
        assert_eq!(queries, vec!["one", "two", "three"]);
    }

    #[test]
    fn parse_empty_response_is_empty() {
        assert!(parse_sub_queries("").is_empty());
        assert!(parse_sub_queries("\n\n  \n").is_empty());
    }

    #[test]
    fn report_prompt_demands_the_sections() {
        let prompt = report_prompt("q", "notes");
        assert!(prompt.contains("**Executive Summary**"));
        assert!(prompt.contains("**Key Findings**"));
        assert!(prompt.contains("**Detailed Analysis**"));
        assert!(prompt.contains("**Conclusion**"));
        assert!(prompt.contains("notes"));
    }
}
