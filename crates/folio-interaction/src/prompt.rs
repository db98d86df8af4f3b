//! Prompt assembly for document questions.

use folio_core::conversation::ChatMessage;

/// Builds the single-turn prompt sent to the model: the document text, the
/// conversation so far (omitted when there are no prior turns), then the
/// question.
pub fn build_prompt(document_text: &str, question: &str, history: &[ChatMessage]) -> String {
    let history_text = format_history(history);

    if history_text.is_empty() {
        format!(
            "I have the following PDF content:\n{document_text}\n\n\
             Based on this PDF content and our conversation history, please answer the following question:\n{question}"
        )
    } else {
        format!(
            "I have the following PDF content:\n{document_text}\n\n\
             Here is our conversation so far:\n{history_text}\n\n\
             Based on this PDF content and our conversation history, please answer the following question:\n{question}"
        )
    }
}

/// Renders prior turns as `User:` / `Assistant:` lines joined by blank lines.
pub fn format_history(history: &[ChatMessage]) -> String {
    history
        .iter()
        .map(|message| {
            let speaker = if message.is_user { "User" } else { "Assistant" };
            format!("{}: {}", speaker, message.text)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
