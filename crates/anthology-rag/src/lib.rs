//! Question answering over the paper index: routing, context assembly and
//! answer synthesis against an OpenAI-compatible chat endpoint.
pub mod context;
pub mod llm;
pub mod pipeline;
pub mod router;
pub mod synthesizer;

pub use context::ContextAssembler;
pub use llm::OpenAiChatClient;
pub use pipeline::{QueryFailure, QueryPipeline, QueryRequest, QueryResponse, Source};
pub use router::{routing_decision, Classification, QueryRouter, RouteDecision};
pub use synthesizer::{AnswerSynthesizer, NO_CONTENT_PLACEHOLDER, TRUNCATION_MARKER};
