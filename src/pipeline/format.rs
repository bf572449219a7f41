//! Notification text for a summarized inquiry.

use crate::channels::Notification;
use crate::pipeline::summarizer::Summary;
use crate::pipeline::types::Inquiry;

/// Raw message is cut to this many characters in the notification body.
const RAW_MESSAGE_PREVIEW_CHARS: usize = 1000;

fn or_dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

/// Build the subject/body pair sent to every channel.
pub fn build_notification(inquiry: &Inquiry, summary: &Summary) -> Notification {
    let subject = format!(
        "New Inquiry — {} — {}",
        summary.urgency,
        inquiry.display_name()
    );

    let mut body = String::with_capacity(512);
    body.push_str(&format!("Name: {}\n", or_dash(&inquiry.name)));
    body.push_str(&format!("Email: {}\n", or_dash(&inquiry.email)));
    body.push_str(&format!("Reported urgency: {}\n", or_dash(&inquiry.urgency)));
    body.push_str(&format!("\nSummary:\n{}\n", or_dash(&summary.text)));

    if !summary.keywords.is_empty() {
        body.push_str(&format!("\nKeywords: {}\n", summary.keywords.join(", ")));
    }

    body.push_str("\n---\n");
    body.push_str(&format!("Timestamp: {}\n", or_dash(&inquiry.timestamp)));
    body.push_str(&format!("Row: {}\n", inquiry.row_index));

    // The raw text is already the summary when summarization didn't run.
    if summary.text != inquiry.message {
        let preview: String = inquiry.message.chars().take(RAW_MESSAGE_PREVIEW_CHARS).collect();
        body.push_str(&format!("Raw message: {}\n", or_dash(&preview)));
    }

    Notification::new(subject, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::summarizer::SummarySource;

    fn inquiry() -> Inquiry {
        Inquiry {
            row_index: 4,
            timestamp: "10/18/2026 09:00:00".into(),
            name: "Grace".into(),
            email: "grace@example.com".into(),
            message: "How do I refill my prescription?".into(),
            urgency: "Low".into(),
        }
    }

    #[test]
    fn subject_includes_urgency_and_name() {
        let summary = Summary {
            text: "Refill request".into(),
            urgency: "Medium".into(),
            keywords: vec!["refill".into(), "pharmacy".into()],
            source: SummarySource::Generated,
        };
        let n = build_notification(&inquiry(), &summary);
        assert_eq!(n.subject, "New Inquiry — Medium — Grace");
        assert!(n.body.contains("Summary:\nRefill request"));
        assert!(n.body.contains("Keywords: refill, pharmacy"));
        assert!(n.body.contains("Raw message: How do I refill my prescription?"));
        assert!(n.body.contains("Row: 4"));
    }

    #[test]
    fn verbatim_summary_is_not_repeated() {
        let summary = Summary {
            text: "How do I refill my prescription?".into(),
            urgency: "Low".into(),
            keywords: Vec::new(),
            source: SummarySource::Unconfigured,
        };
        let n = build_notification(&inquiry(), &summary);
        assert_eq!(n.body.matches("How do I refill my prescription?").count(), 1);
        assert!(!n.body.contains("Keywords"));
    }

    #[test]
    fn empty_fields_render_as_dash() {
        let inquiry = Inquiry {
            row_index: 9,
            ..Inquiry::default()
        };
        let summary = Summary {
            text: String::new(),
            urgency: "Unknown".into(),
            keywords: Vec::new(),
            source: SummarySource::Fallback("empty inquiry".into()),
        };
        let n = build_notification(&inquiry, &summary);
        assert_eq!(n.subject, "New Inquiry — Unknown — Unknown");
        assert!(n.body.contains("Name: -"));
        assert!(n.body.contains("Summary:\n-"));
    }
}
