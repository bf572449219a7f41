//! Summarizer: condenses an inquiry through the LLM, best-effort.
//!
//! One attempt per inquiry, no retry. Whenever the model is unconfigured or
//! its answer can't be used, the summary is the submitter's text verbatim.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::types::Inquiry;

/// Kept small: the answer is two lines plus a handful of keywords.
const SUMMARY_MAX_TOKENS: u32 = 300;

const SUMMARY_TEMPERATURE: f32 = 0.2;

/// Free text sent to the model is truncated to this many characters.
const PROMPT_MESSAGE_CHARS: usize = 4000;

const UNKNOWN_URGENCY: &str = "Unknown";

/// Where a summary's text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummarySource {
    Generated,
    /// No text-generation service configured.
    Unconfigured,
    /// The service was configured but unusable for this inquiry.
    Fallback(String),
}

/// Result of summarizing one inquiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub text: String,
    pub urgency: String,
    pub keywords: Vec<String>,
    pub source: SummarySource,
}

impl Summary {
    fn verbatim(inquiry: &Inquiry, source: SummarySource) -> Self {
        Self {
            text: inquiry.message.clone(),
            urgency: reported_urgency(inquiry),
            keywords: Vec::new(),
            source,
        }
    }

    /// True unless the model produced the text.
    pub fn fell_back(&self) -> bool {
        self.source != SummarySource::Generated
    }
}

fn reported_urgency(inquiry: &Inquiry) -> String {
    if inquiry.urgency.is_empty() {
        UNKNOWN_URGENCY.to_string()
    } else {
        inquiry.urgency.clone()
    }
}

/// Optional LLM-backed summarizer.
pub struct Summarizer {
    llm: Option<Arc<dyn LlmProvider>>,
}

impl Summarizer {
    pub fn new(llm: Option<Arc<dyn LlmProvider>>) -> Self {
        Self { llm }
    }

    /// Summarizer that always passes text through.
    pub fn disabled() -> Self {
        Self { llm: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.llm.is_some()
    }

    /// Summarize one inquiry. Never fails; see [`SummarySource`].
    pub async fn summarize(&self, inquiry: &Inquiry) -> Summary {
        let Some(ref llm) = self.llm else {
            return Summary::verbatim(inquiry, SummarySource::Unconfigured);
        };

        if inquiry.message.trim().is_empty() {
            return Summary::verbatim(inquiry, SummarySource::Fallback("empty inquiry".into()));
        }

        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_summary_system_prompt()),
            ChatMessage::user(build_summary_user_prompt(inquiry)),
        ])
        .with_temperature(SUMMARY_TEMPERATURE)
        .with_max_tokens(SUMMARY_MAX_TOKENS);

        let response = match llm.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    row = inquiry.row_index,
                    model = llm.model_name(),
                    error = %e,
                    "Summarization failed, using raw text"
                );
                return Summary::verbatim(inquiry, SummarySource::Fallback(e.to_string()));
            }
        };

        match parse_summary_response(&response.content) {
            Ok(parsed) => {
                debug!(
                    row = inquiry.row_index,
                    input_tokens = response.input_tokens,
                    output_tokens = response.output_tokens,
                    "Inquiry summarized"
                );
                Summary {
                    text: parsed.summary,
                    urgency: parsed.urgency.unwrap_or_else(|| reported_urgency(inquiry)),
                    keywords: parsed.keywords,
                    source: SummarySource::Generated,
                }
            }
            Err(reason) => {
                warn!(
                    row = inquiry.row_index,
                    raw_response = %response.content,
                    error = %reason,
                    "Unusable summary response, using raw text"
                );
                Summary::verbatim(inquiry, SummarySource::Fallback(reason))
            }
        }
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_summary_system_prompt() -> String {
    "You summarize inquiries submitted through a contact form. Return ONLY valid compact JSON."
        .to_string()
}

fn build_summary_user_prompt(inquiry: &Inquiry) -> String {
    let message: String = inquiry.message.chars().take(PROMPT_MESSAGE_CHARS).collect();
    let reported = if inquiry.urgency.is_empty() {
        "not given"
    } else {
        &inquiry.urgency
    };

    format!(
        "Summarize this inquiry in 2 concise lines, classify urgency as one of \
         [Low, Medium, High], and provide 3 keywords. Return JSON with keys: \
         summary, urgency, keywords.\n\nInquiry: {message}\nReported urgency: {reported}"
    )
}

// ── Response parsing ────────────────────────────────────────────────

#[derive(Debug, serde::Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    urgency: String,
    #[serde(default)]
    keywords: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
struct ParsedSummary {
    summary: String,
    urgency: Option<String>,
    keywords: Vec<String>,
}

fn parse_summary_response(raw: &str) -> Result<ParsedSummary, String> {
    if raw.trim().is_empty() {
        return Err("empty response".into());
    }

    let json_str = extract_json_object(raw);
    let response: SummaryResponse =
        serde_json::from_str(&json_str).map_err(|e| format!("JSON parse error: {e}"))?;

    let summary = response.summary.trim().to_string();
    if summary.is_empty() {
        return Err("response has no summary".into());
    }

    let urgency = response.urgency.trim();
    Ok(ParsedSummary {
        summary,
        urgency: if urgency.is_empty() {
            None
        } else {
            Some(urgency.to_string())
        },
        keywords: response
            .keywords
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect(),
    })
}

/// Extract a JSON object from LLM output (handles markdown wrapping).
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    // Already a JSON object
    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    // Wrapped in markdown code block
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    // Try to find object bounds
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::provider::CompletionResponse;

    fn inquiry(message: &str, urgency: &str) -> Inquiry {
        Inquiry {
            row_index: 4,
            message: message.into(),
            urgency: urgency.into(),
            ..Inquiry::default()
        }
    }

    /// Mock LLM that returns a fixed response, or fails.
    struct MockSummaryLlm {
        response: Result<String, ()>,
    }

    #[async_trait::async_trait]
    impl LlmProvider for MockSummaryLlm {
        fn model_name(&self) -> &str {
            "mock-summary"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            match &self.response {
                Ok(content) => Ok(CompletionResponse {
                    content: content.clone(),
                    input_tokens: 80,
                    output_tokens: 40,
                }),
                Err(()) => Err(LlmError::RequestFailed {
                    provider: "mock".into(),
                    reason: "connection reset".into(),
                }),
            }
        }
    }

    fn summarizer(response: Result<&str, ()>) -> Summarizer {
        Summarizer::new(Some(Arc::new(MockSummaryLlm {
            response: response.map(str::to_string),
        })))
    }

    // ── Summarizer behaviour ────────────────────────────────────────

    #[tokio::test]
    async fn unconfigured_returns_text_verbatim() {
        let summary = Summarizer::disabled()
            .summarize(&inquiry("How do I refill my prescription?", ""))
            .await;
        assert_eq!(summary.text, "How do I refill my prescription?");
        assert_eq!(summary.source, SummarySource::Unconfigured);
        assert_eq!(summary.urgency, "Unknown");
        assert!(summary.fell_back());
    }

    #[tokio::test]
    async fn generated_summary_is_used() {
        let s = summarizer(Ok(
            r#"{"summary": "Patient asks about refills.", "urgency": "Low", "keywords": ["refill", "prescription", " "]}"#,
        ));
        let summary = s.summarize(&inquiry("How do I refill my prescription?", "")).await;
        assert_eq!(summary.text, "Patient asks about refills.");
        assert_eq!(summary.urgency, "Low");
        assert_eq!(summary.keywords, vec!["refill", "prescription"]);
        assert_eq!(summary.source, SummarySource::Generated);
        assert!(!summary.fell_back());
    }

    #[tokio::test]
    async fn call_failure_falls_back_to_raw_text() {
        let summary = summarizer(Err(()))
            .summarize(&inquiry("Chest pain since morning", "High"))
            .await;
        assert_eq!(summary.text, "Chest pain since morning");
        assert_eq!(summary.urgency, "High");
        assert!(matches!(summary.source, SummarySource::Fallback(ref r) if r.contains("connection reset")));
    }

    #[tokio::test]
    async fn malformed_response_falls_back() {
        let summary = summarizer(Ok("Sure! The patient wants a refill."))
            .summarize(&inquiry("refill please", ""))
            .await;
        assert_eq!(summary.text, "refill please");
        assert!(matches!(summary.source, SummarySource::Fallback(_)));
    }

    #[tokio::test]
    async fn empty_summary_field_falls_back() {
        let summary = summarizer(Ok(r#"{"summary": "  ", "urgency": "High"}"#))
            .summarize(&inquiry("refill please", ""))
            .await;
        assert_eq!(summary.text, "refill please");
        assert_eq!(summary.urgency, "Unknown");
    }

    #[tokio::test]
    async fn empty_inquiry_skips_the_call() {
        let summary = summarizer(Ok(r#"{"summary": "should not be used"}"#))
            .summarize(&inquiry("   ", ""))
            .await;
        assert_eq!(summary.text, "   ");
        assert_eq!(
            summary.source,
            SummarySource::Fallback("empty inquiry".into())
        );
    }

    #[tokio::test]
    async fn missing_urgency_uses_reported_value() {
        let summary = summarizer(Ok(r#"{"summary": "Asks about hours"}"#))
            .summarize(&inquiry("When are you open?", "Medium"))
            .await;
        assert_eq!(summary.urgency, "Medium");
    }

    // ── Parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_response_wrapped_in_markdown() {
        let raw = "```json\n{\"summary\": \"x\", \"urgency\": \"High\"}\n```";
        let parsed = parse_summary_response(raw).unwrap();
        assert_eq!(parsed.summary, "x");
        assert_eq!(parsed.urgency.as_deref(), Some("High"));
    }

    #[test]
    fn parse_response_with_surrounding_text() {
        let raw = "Here you go: {\"summary\": \"y\"} hope that helps";
        assert_eq!(parse_summary_response(raw).unwrap().summary, "y");
    }

    #[test]
    fn parse_empty_response_fails() {
        assert!(parse_summary_response("  \n").is_err());
    }

    #[test]
    fn user_prompt_contains_inquiry_and_urgency() {
        let prompt = build_summary_user_prompt(&inquiry("Need a refill", "Low"));
        assert!(prompt.contains("Inquiry: Need a refill"));
        assert!(prompt.contains("Reported urgency: Low"));
        let prompt = build_summary_user_prompt(&inquiry("x", ""));
        assert!(prompt.contains("Reported urgency: not given"));
    }
}
