//! Turns retrieval results into the messages sent for answer synthesis.
use anthology_core::error::Error;
use anthology_core::types::{ChatMessage, SearchHit};

use crate::router::RouteDecision;

pub const RESEARCH_SYSTEM_PROMPT: &str = "You are a research assistant for a database of conference papers. Your primary function is to help users by answering their questions based on the provided context from the paper database. If the provided context is empty or does not contain the answer, clearly state that. Strive to be concise and directly answer the user's question using ONLY the information from the provided paper context. Do not use your general knowledge unless the context explicitly allows or there is no context provided.";

pub const GENERAL_SYSTEM_PROMPT: &str =
    "You are a helpful general-purpose assistant. Answer the user's question clearly and concisely.";

pub const NO_RESULTS_CONTEXT: &str = "No relevant papers were found for your query in the paper database.";

#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    max_papers: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self { max_papers: 3 }
    }
}

impl ContextAssembler {
    pub fn new(max_papers: usize) -> Self {
        Self { max_papers: max_papers.max(1) }
    }

    pub fn max_papers(&self) -> usize {
        self.max_papers
    }

    pub fn format_results(&self, hits: &[SearchHit]) -> String {
        if hits.is_empty() {
            return NO_RESULTS_CONTEXT.to_string();
        }
        let shown = &hits[..hits.len().min(self.max_papers)];
        let mut out = format!(
            "Based on your query, here are the top {} potentially relevant paper(s) from the conference proceedings:",
            shown.len()
        );
        for (i, hit) in shown.iter().enumerate() {
            let title = hit.title().unwrap_or_else(|| "N/A".to_string());
            let abstract_ = hit.meta_str("abstract").unwrap_or_else(|| hit.text.trim().to_string());
            out.push_str(&format!(
                "\n\n--- Paper {} ---\nTitle: {} (Relevance Score: {:.4})\nAbstract: {}",
                i + 1,
                title,
                hit.score,
                abstract_
            ));
        }
        out
    }

    /// Messages for the synthesis call.
    ///
    /// `retrieval` is `None` when the route skipped the index. A failed
    /// retrieval becomes an instruction to apologise instead of context.
    pub fn build_messages(
        &self,
        question: &str,
        route: &RouteDecision,
        retrieval: Option<&Result<Vec<SearchHit>, Error>>,
    ) -> Vec<ChatMessage> {
        if !route.needs_retrieval() {
            return vec![ChatMessage::system(GENERAL_SYSTEM_PROMPT), ChatMessage::user(question)];
        }
        let user = match retrieval {
            Some(Ok(hits)) => format!(
                "User question: \"{question}\"\n\nRelevant information from the conference papers which you MUST use to answer:\n{}",
                self.format_results(hits)
            ),
            None => format!(
                "User question: \"{question}\"\n\nRelevant information from the conference papers which you MUST use to answer:\n{NO_RESULTS_CONTEXT}"
            ),
            Some(Err(e)) => format!(
                "User question: \"{question}\"\n\n[Critical Error: Could not retrieve papers from the database due to: {e}. Please apologize to the user for not being able to search for papers and try to answer based on general knowledge if appropriate, or indicate you could not perform the search.]"
            ),
        };
        vec![ChatMessage::system(RESEARCH_SYSTEM_PROMPT), ChatMessage::user(user)]
    }
}
