//! Prompt text and prompt assembly for the orchestrator's model calls.

use chrono::{Days, NaiveDate};

use nexus_core::util::{day_bounds, truncate_chars};
use nexus_core::{ConversationTurn, IndexedMemory};

use crate::models::{ChatMessage, Prompt, PromptStyle};

/// Classifier instructions anchored to `reference_date`.
pub fn classifier_system(reference_date: NaiveDate) -> String {
    let yesterday = reference_date
        .checked_sub_days(Days::new(1))
        .unwrap_or(reference_date);
    let (y_start, y_end) = day_bounds(yesterday);
    let (t_start, t_end) = day_bounds(reference_date);

    format!(
        r#"Reference date: {today}.
Reply ONLY with one valid JSON object, no explanations and no code fences.
Classify the intent of the user's question with exactly one "tipo":
- "mais_recente": the most recent activity ("what did I do last?").
- "temporal": activities in a time range ("last 3 hours", "yesterday"). Also extract "inicio" and "fim" as ISO-8601 (YYYY-MM-DDTHH:MM:SS).
- "semantica": anything else that needs a similarity search over past activity.
- "codigo": questions about code (suggestions, bugs, explanations of the project).
- "tools": commands that run a tool (open, list, read).
- "fallback": greetings and everything else. Never use "fallback" when another type fits.
Use the reference date to resolve relative dates. Examples:
- "what did I do yesterday?" -> "inicio": "{y_start}", "fim": "{y_end}"
- "my activities today" -> "inicio": "{t_start}", "fim": "{t_end}"
Fields: "tipo", "inicio" and "fim" (required when temporal), "detalhes" (optional notes)."#,
        today = reference_date.format("%Y-%m-%d"),
    )
}

pub const MEMORY_SYSTEM_WITH_CONTEXT: &str = "You are an agent that monitors the user's computer activity. \
You have access to their activity history: open windows, on-screen text, typed text and recent records. \
Answer from that context and the chat history, inferring whenever possible. \
Only say you don't know when there is truly no information.";

pub const MEMORY_SYSTEM_WITHOUT_CONTEXT: &str = "You are an agent that monitors the user's computer activity. \
No recent activity data is available: answer from the chat history, or explain what is missing.";

pub const DIRECT_SYSTEM: &str =
    "You are a helpful assistant. Answer the user's question directly.";

pub const CODE_SYSTEM: &str = "You are an expert programming assistant. \
Use the code summary inside <code_summary> to understand the project and answer the question inside <question>. \
Explain any bugs you find and suggest improvements to poor patterns. \
Answer like a senior reviewer: direct, precise, and grounded strictly in the given summary. Never give generic answers.";

pub const FAILURE_SYSTEM: &str = "You are a debugging assistant. A task you tried to run failed. \
Explain the failure to the user simply and honestly, and suggest how they could rephrase the request to succeed. \
Do not invent an answer to the original question; only report the failure.";

pub const CODE_APOLOGY: &str = "I can't answer that accurately because I don't have a recent summary of your code. \
Ask a more general programming question or generate a new code snapshot.";

pub const TOOL_GIVE_UP: &str =
    "The tool failed several times. Please rephrase your request or try a different command.";

/// Grounding block listing retrieved memories.
pub fn memory_context(blocks: &[(usize, IndexedMemory)], snippet_chars: usize) -> String {
    blocks
        .iter()
        .enumerate()
        .map(|(i, (_, block))| {
            format!(
                "{}. [{}] {} (Window: {})",
                i + 1,
                block.timestamp(),
                truncate_chars(&block.summary(), snippet_chars),
                block.window()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn memory_system(context: Option<&str>) -> String {
    match context {
        Some(context) => format!(
            "{MEMORY_SYSTEM_WITH_CONTEXT}\nAdditional context from recent activity:\n{context}\nUse it if relevant."
        ),
        None => MEMORY_SYSTEM_WITHOUT_CONTEXT.to_string(),
    }
}

/// Conversation prompt in the model's style.
///
/// Chat style yields alternating messages; flattened style yields a transcript
/// ending in an open assistant turn.
pub fn chat_prompt(history: &[ConversationTurn], question: &str, style: PromptStyle) -> Prompt {
    match style {
        PromptStyle::Chat => {
            let mut messages = Vec::with_capacity(history.len() * 2 + 1);
            for turn in history {
                if !turn.question.is_empty() {
                    messages.push(ChatMessage::user(&turn.question));
                }
                if !turn.answer.is_empty() {
                    messages.push(ChatMessage::assistant(&turn.answer));
                }
            }
            messages.push(ChatMessage::user(question));
            Prompt::Messages(messages)
        }
        PromptStyle::Flattened => {
            let mut text = String::new();
            for turn in history {
                if !turn.question.is_empty() {
                    text.push_str(&format!("User: {}\n", turn.question));
                }
                if !turn.answer.is_empty() {
                    text.push_str(&format!("Assistant: {}\n", turn.answer));
                }
            }
            text.push_str(&format!("User: {question}\nAssistant:"));
            Prompt::Text(text)
        }
    }
}

/// A single user message in the model's style.
pub fn single_turn(content: String, style: PromptStyle) -> Prompt {
    match style {
        PromptStyle::Chat => Prompt::Messages(vec![ChatMessage::user(content)]),
        PromptStyle::Flattened => Prompt::Text(content),
    }
}

pub fn classifier_user(question: &str) -> String {
    format!("User question: {question}")
}

pub fn code_user(question: &str, summary: &str) -> String {
    format!("<question>\n{question}\n</question>\n\n<code_summary>\n{summary}\n</code_summary>")
}

pub fn failure_user(question: &str, detail: &str) -> String {
    format!(
        "The user's original question was:\n<question>{question}</question>\n\n\
         Running the tool produced this error:\n<error>{detail}</error>\n\n\
         Write a reply to the user explaining what happened."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::ActivityRecord;

    fn turn(q: &str, a: &str) -> ConversationTurn {
        ConversationTurn {
            question: q.into(),
            answer: a.into(),
            timestamp: "2024-03-10T09:00:00".into(),
        }
    }

    #[test]
    fn test_classifier_examples_use_reference_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let system = classifier_system(date);
        assert!(system.contains("Reference date: 2024-03-10"));
        assert!(system.contains(r#""inicio": "2024-03-09T00:00:00", "fim": "2024-03-09T23:59:59""#));
        assert!(system.contains(r#""inicio": "2024-03-10T00:00:00""#));
    }

    #[test]
    fn test_flattened_prompt_ends_open() {
        let prompt = chat_prompt(&[turn("hi", "hello")], "and now?", PromptStyle::Flattened);
        assert_eq!(
            prompt,
            Prompt::Text("User: hi\nAssistant: hello\nUser: and now?\nAssistant:".into())
        );
    }

    #[test]
    fn test_chat_prompt_alternates() {
        let prompt = chat_prompt(&[turn("hi", "hello")], "next", PromptStyle::Chat);
        let Prompt::Messages(messages) = prompt else {
            panic!("expected messages");
        };
        assert_eq!(
            messages,
            vec![
                ChatMessage::user("hi"),
                ChatMessage::assistant("hello"),
                ChatMessage::user("next")
            ]
        );
    }

    #[test]
    fn test_memory_context_truncates_summaries() {
        let entry: IndexedMemory = ActivityRecord::new("Editor", "")
            .at("2024-03-09T10:00:00")
            .with_summary("z".repeat(900))
            .into();
        let context = memory_context(&[(4, entry)], 500);
        assert!(context.starts_with("1. [2024-03-09T10:00:00] "));
        assert!(context.ends_with("(Window: Editor)"));
        assert_eq!(context.matches('z').count(), 500);
    }
}
