//! Formats retrieved chunks into the grounding context and prompt for answer
//! generation.

use crate::llm::ChatMessage;

use super::store::RetrievalResult;

/// Format retrieval results into a numbered, cited context block, stopping
/// before `max_context_chars` is exceeded.
pub fn build_context(results: &[RetrievalResult], max_context_chars: usize) -> String {
    if results.is_empty() {
        return String::new();
    }

    let mut context = String::new();
    let mut current_length = 0;

    for (i, result) in results.iter().enumerate() {
        // Extra for formatting
        let addition_length = result.text.len() + 50;
        if current_length + addition_length > max_context_chars {
            break;
        }

        context.push_str(&format!(
            "[{}] (Source: {}, relevance: {:.2})\n{}\n\n",
            i + 1,
            result.metadata.source,
            result.score,
            result.text
        ));

        current_length += addition_length;
    }

    context.trim().to_string()
}

/// Assemble the two-message grounding prompt: system instructions carrying
/// the context, then the user's question.
pub fn build_messages(query: &str, context: &str) -> Vec<ChatMessage> {
    let system = if context.is_empty() {
        "You are an assistant for a crop disease and pest management service. \
         No passages from the uploaded documents matched this question. Say so, \
         then answer from general agronomy knowledge where you can."
            .to_string()
    } else {
        format!(
            "You are an assistant for a crop disease and pest management service. \
             Answer the question using the numbered passages below, and mention the \
             passage numbers you relied on. If the passages do not contain the \
             answer, say so instead of guessing.\n\n{}",
            context
        )
    };

    vec![
        ChatMessage {
            role: "system".to_string(),
            content: system,
        },
        ChatMessage {
            role: "user".to_string(),
            content: query.to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::store::ChunkMetadata;

    fn result(id: &str, score: f32, source: &str, text: &str) -> RetrievalResult {
        RetrievalResult {
            id: id.to_string(),
            score,
            metadata: ChunkMetadata {
                source: source.to_string(),
                page: None,
            },
            text: text.to_string(),
        }
    }

    #[test]
    fn context_numbers_and_cites_results_in_order() {
        let results = vec![
            result("a_0", 0.92, "blight.txt", "Water at the base of plants."),
            result("b_0", 0.41, "pests.txt", "Inspect leaves weekly."),
        ];

        let context = build_context(&results, 4000);

        assert!(context.starts_with("[1] (Source: blight.txt, relevance: 0.92)"));
        assert!(context.contains("Water at the base of plants."));
        assert!(context.contains("[2] (Source: pests.txt, relevance: 0.41)"));
        let first = context.find("[1]").unwrap();
        let second = context.find("[2]").unwrap();
        assert!(first < second);
    }

    #[test]
    fn context_respects_the_length_budget() {
        let results = vec![
            result("a_0", 0.9, "a.txt", &"x".repeat(300)),
            result("b_0", 0.8, "b.txt", &"y".repeat(300)),
        ];

        let context = build_context(&results, 400);

        assert!(context.contains("xxx"));
        assert!(!context.contains("yyy"));
    }

    #[test]
    fn empty_results_build_an_empty_context() {
        assert_eq!(build_context(&[], 4000), "");
    }

    #[test]
    fn messages_carry_context_in_system_and_query_in_user() {
        let results = vec![result("a_0", 0.9, "a.txt", "chunk text")];
        let context = build_context(&results, 4000);
        let messages = build_messages("How do I prevent blight?", &context);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("chunk text"));
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content, "How do I prevent blight?");
    }

    #[test]
    fn empty_context_switches_to_the_no_match_prompt() {
        let messages = build_messages("anything", "");
        assert!(messages[0].content.contains("No passages"));
    }
}
