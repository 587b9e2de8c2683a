use std::fmt::Write as _;

use super::{ConversationTurn, Role};
use crate::database::lancedb::RetrievedResult;

/// Assemble the generation prompt: instruction, attributed context, history, question.
#[inline]
pub fn build_prompt(
    assistant_name: &str,
    documents: &[RetrievedResult],
    history: &[ConversationTurn],
    query: &str,
) -> String {
    let mut prompt = format!(
        "You are the {} assistant. Answer based on the context. Be brief and helpful.\n\n",
        assistant_name
    );

    if !documents.is_empty() {
        prompt.push_str("CONTEXT:\n");
        for (index, document) in documents.iter().enumerate() {
            let _ = write!(
                prompt,
                "{}. [{}] {}\n\n",
                index + 1,
                document.metadata.source,
                document.text
            );
        }
    }

    if !history.is_empty() {
        prompt.push_str("HISTORY:\n");
        for turn in history {
            let speaker = match turn.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            let _ = writeln!(prompt, "{}: {}", speaker, turn.content);
        }
        prompt.push('\n');
    }

    let _ = write!(prompt, "Question: {}\n\nAnswer:", query);
    prompt
}

/// Lightweight prompt for conversational messages, with no retrieved context
#[inline]
pub fn small_talk_prompt(assistant_name: &str, query: &str) -> String {
    format!(
        "You are a friendly {name} assistant. The user said: \"{query}\".\n\
         This seems like casual conversation, not a question about {name}.\n\
         Respond naturally and briefly (1-2 sentences), then invite them to ask about {name} features.",
        name = assistant_name,
        query = query
    )
}
