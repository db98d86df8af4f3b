use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use folio_core::ai::QueryClient;
use folio_core::conversation::{ChatMessage, Conversation, ConversationStore};
use folio_core::{FolioError, Result};

/// A document whose extracted text is currently loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    /// Where the bytes came from; not guaranteed valid across sessions
    pub location: String,
    /// Display name, the key conversations are grouped under
    pub file_name: String,
    /// Full extracted text; empty for image-only documents
    pub text: String,
}

/// Result of [`DocumentSession::ask`].
#[derive(Debug, Clone, PartialEq)]
pub enum AskOutcome {
    /// The assistant turn produced for this question
    Answered(ChatMessage),
    /// A previous question is still in flight; this one was not started
    Busy,
    /// The active conversation changed while the request was in flight,
    /// so the response was discarded instead of landing in the wrong one
    Stale,
}

/// Holds everything the chat surface reads: the loaded document, the
/// conversation list and the active conversation.
///
/// `DocumentSession` is also the degradation boundary for storage: every
/// [`ConversationStore`] failure is logged and absorbed here, leaving the
/// in-memory state usable, so the surface never has to branch on storage
/// errors. AI failures degrade to fixed fallback answers inside [`ask`].
///
/// [`ask`]: DocumentSession::ask
pub struct DocumentSession {
    /// Persistent storage backend for conversation data
    store: Arc<dyn ConversationStore>,
    /// Client for the external model
    client: Arc<dyn QueryClient>,
    /// The document currently open, if any
    document: RwLock<Option<LoadedDocument>>,
    /// The conversation new turns are appended to, if any
    active: RwLock<Option<Conversation>>,
    /// In-memory conversation list, most recently updated first
    conversations: RwLock<Vec<Conversation>>,
    /// Held for the duration of one [`ask`](DocumentSession::ask) call;
    /// a second question while it is taken reports [`AskOutcome::Busy`]
    in_flight: tokio::sync::Mutex<()>,
}

impl DocumentSession {
    /// Creates a session with no document loaded and no active conversation.
    pub fn new(store: Arc<dyn ConversationStore>, client: Arc<dyn QueryClient>) -> Self {
        Self {
            store,
            client,
            document: RwLock::new(None),
            active: RwLock::new(None),
            conversations: RwLock::new(Vec::new()),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    /// Reloads the in-memory conversation list from storage.
    ///
    /// On storage failure the list degrades to empty; every lookup reads
    /// this list, so ordering is enforced here rather than trusted from
    /// the store.
    async fn refresh_conversations(&self) {
        match self.store.list_all().await {
            Ok(mut conversations) => {
                conversations.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
                *self.conversations.write().await = conversations;
            }
            Err(e) => {
                warn!(
                    "[DocumentSession] Failed to load conversations: {}; continuing with empty list",
                    e
                );
                *self.conversations.write().await = Vec::new();
            }
        }
    }

    /// Creates, persists and lists a new conversation for the given file.
    ///
    /// Persistence is best-effort; the created conversation is returned
    /// even when the save fails.
    async fn create_conversation(&self, file_name: String, location: String) -> Conversation {
        let conversation = Conversation::new(file_name, location);
        debug!(
            "[DocumentSession] Created conversation {} ({})",
            conversation.id, conversation.title
        );
        if let Err(e) = self.store.save(&conversation).await {
            warn!(
                "[DocumentSession] Failed to persist conversation {}: {}",
                conversation.id, e
            );
        }
        self.refresh_conversations().await;
        conversation
    }

    /// Returns the already-loaded conversations for a display name, most
    /// recently updated first.
    ///
    /// Matching is by exact, case-sensitive string equality; an empty name
    /// matches nothing. The list is not refreshed here, callers that need
    /// fresh state go through [`list_conversations`] or [`load_document`].
    ///
    /// [`list_conversations`]: DocumentSession::list_conversations
    /// [`load_document`]: DocumentSession::load_document
    pub async fn conversations_for_file(&self, file_name: &str) -> Vec<Conversation> {
        if file_name.is_empty() {
            return Vec::new();
        }
        self.conversations
            .read()
            .await
            .iter()
            .filter(|c| c.file_name == file_name)
            .cloned()
            .collect()
    }

    /// Loads a document and resumes or starts its conversation.
    ///
    /// The document fields are always replaced. When the extracted text is
    /// non-empty, the most recently updated conversation for `file_name`
    /// becomes active, or a new one is created and persisted if none
    /// exists. When the text is empty there is nothing to chat about yet:
    /// only the document fields change and any active conversation stays
    /// untouched.
    ///
    /// # Returns
    ///
    /// The conversation made active, or `None` when the text was empty.
    pub async fn load_document(
        &self,
        location: String,
        file_name: String,
        text: String,
    ) -> Option<Conversation> {
        let has_text = !text.trim().is_empty();
        debug!(
            "[DocumentSession] Loading {} ({} chars extracted)",
            file_name,
            text.len()
        );
        *self.document.write().await = Some(LoadedDocument {
            location: location.clone(),
            file_name: file_name.clone(),
            text,
        });

        if !has_text {
            return None;
        }

        self.refresh_conversations().await;
        let conversation = match self
            .conversations_for_file(&file_name)
            .await
            .into_iter()
            .next()
        {
            Some(existing) => {
                debug!(
                    "[DocumentSession] Resuming conversation {} for {}",
                    existing.id, file_name
                );
                existing
            }
            None => self.create_conversation(file_name, location).await,
        };

        *self.active.write().await = Some(conversation.clone());
        Some(conversation)
    }

    /// Clears the loaded document. The active conversation stays untouched
    /// so its transcript remains readable.
    pub async fn clear_document(&self) {
        *self.document.write().await = None;
    }

    /// Conversations for the currently loaded document, refreshed from
    /// storage, most recently updated first. Empty when no document is
    /// loaded.
    pub async fn list_conversations(&self) -> Vec<Conversation> {
        self.refresh_conversations().await;
        let file_name = match self.document.read().await.as_ref() {
            Some(document) => document.file_name.clone(),
            None => return Vec::new(),
        };
        self.conversations_for_file(&file_name).await
    }

    /// Makes the conversation with the given id active.
    ///
    /// Only conversations belonging to the loaded document are eligible.
    ///
    /// # Errors
    ///
    /// Returns `FolioError::NotFound` when no eligible conversation has
    /// this id.
    pub async fn switch_conversation(&self, id: &str) -> Result<Conversation> {
        let conversation = self
            .list_conversations()
            .await
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| FolioError::not_found("conversation", id))?;

        *self.active.write().await = Some(conversation.clone());
        Ok(conversation)
    }

    /// Starts a fresh conversation for the loaded document and makes it
    /// active. Returns `None` when no document is loaded.
    pub async fn new_conversation(&self) -> Option<Conversation> {
        let (file_name, location) = match self.document.read().await.as_ref() {
            Some(document) => (document.file_name.clone(), document.location.clone()),
            None => return None,
        };

        let conversation = self.create_conversation(file_name, location).await;
        *self.active.write().await = Some(conversation.clone());
        Some(conversation)
    }

    /// Deletes a conversation from storage and the in-memory list.
    ///
    /// Deleting the active conversation activates the most recently
    /// updated remaining conversation for the same file, or clears the
    /// active slot when none is left. The loaded document is untouched.
    /// Deleting an unknown id is a no-op.
    pub async fn delete_conversation(&self, id: &str) {
        if let Err(e) = self.store.delete(id).await {
            warn!("[DocumentSession] Failed to delete conversation {}: {}", id, e);
        }
        self.refresh_conversations().await;

        let mut active = self.active.write().await;
        let deleted_active_file = match active.as_ref() {
            Some(current) if current.id == id => current.file_name.clone(),
            _ => return,
        };

        let replacement = self
            .conversations
            .read()
            .await
            .iter()
            .find(|c| c.file_name == deleted_active_file)
            .cloned();
        match &replacement {
            Some(next) => debug!(
                "[DocumentSession] Active conversation deleted; switching to {}",
                next.id
            ),
            None => debug!(
                "[DocumentSession] Active conversation deleted; none left for {}",
                deleted_active_file
            ),
        }
        *active = replacement;
    }

    /// Replaces the active conversation's message list wholesale, stamps
    /// `last_updated` and persists it.
    ///
    /// Without an active conversation this is a no-op and storage is not
    /// touched. Save failures are logged and absorbed; the in-memory
    /// conversation keeps the new messages either way.
    pub async fn update_current_conversation(&self, messages: Vec<ChatMessage>) {
        let updated = {
            let mut active = self.active.write().await;
            let Some(conversation) = active.as_mut() else {
                debug!("[DocumentSession] No active conversation to update");
                return;
            };
            conversation.messages = messages;
            conversation.touch();
            conversation.clone()
        };

        if let Err(e) = self.store.save(&updated).await {
            warn!(
                "[DocumentSession] Failed to save conversation {}: {}",
                updated.id, e
            );
        }
        self.refresh_conversations().await;
    }

    /// Asks the model one question about the loaded document.
    ///
    /// Only one question may be in flight at a time; a second call while
    /// the first is pending returns [`AskOutcome::Busy`] without queueing.
    /// The user turn is appended before the request is sent, the assistant
    /// turn after it returns. AI failures are not surfaced as errors: the
    /// failure's fixed fallback text is recorded as a normal assistant
    /// turn.
    ///
    /// If the active conversation changes while the request is pending,
    /// the response belongs to a conversation the user has left, so it is
    /// discarded and [`AskOutcome::Stale`] is returned. With no active
    /// conversation and no loaded document the exchange is answered (with
    /// a fallback) but nothing is persisted.
    pub async fn ask(&self, question: &str) -> AskOutcome {
        let Ok(_in_flight) = self.in_flight.try_lock() else {
            return AskOutcome::Busy;
        };

        let document = self.document.read().await.clone();

        // A document without an active conversation happens after deleting
        // the last one; start a fresh conversation so the exchange is kept.
        if self.active.read().await.is_none()
            && document
                .as_ref()
                .is_some_and(|d| !d.text.trim().is_empty())
        {
            self.new_conversation().await;
        }

        let originating_id = self.active.read().await.as_ref().map(|c| c.id.clone());

        // The history sent to the model excludes the question being asked.
        let history = self
            .active
            .read()
            .await
            .as_ref()
            .map(|c| c.messages.clone())
            .unwrap_or_default();

        if originating_id.is_some() {
            let mut messages = history.clone();
            messages.push(ChatMessage::user(question));
            self.update_current_conversation(messages).await;
        }

        let document_text = document.map(|d| d.text).unwrap_or_default();
        let answer = match self.client.query(&document_text, question, &history).await {
            Ok(text) => text,
            Err(e) => {
                warn!("[DocumentSession] Query failed: {}", e);
                e.fallback_text().to_string()
            }
        };

        let current_id = self.active.read().await.as_ref().map(|c| c.id.clone());
        if current_id != originating_id {
            warn!(
                "[DocumentSession] Discarding response for conversation {:?}; active changed while in flight",
                originating_id
            );
            return AskOutcome::Stale;
        }

        let assistant_message = ChatMessage::assistant(answer);
        if originating_id.is_some() {
            let mut messages = self
                .active
                .read()
                .await
                .as_ref()
                .map(|c| c.messages.clone())
                .unwrap_or_default();
            messages.push(assistant_message.clone());
            self.update_current_conversation(messages).await;
        }

        AskOutcome::Answered(assistant_message)
    }

    /// The currently loaded document, if any.
    pub async fn document(&self) -> Option<LoadedDocument> {
        self.document.read().await.clone()
    }

    /// The active conversation, if any.
    pub async fn active_conversation(&self) -> Option<Conversation> {
        self.active.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;
    use folio_core::ai::QueryError;
    use tokio::sync::Semaphore;

    // Mock ConversationStore keeping insertion order, for testing
    struct MockConversationStore {
        conversations: Mutex<Vec<Conversation>>,
    }

    impl MockConversationStore {
        fn new() -> Self {
            Self {
                conversations: Mutex::new(Vec::new()),
            }
        }

        fn seeded(conversations: Vec<Conversation>) -> Self {
            Self {
                conversations: Mutex::new(conversations),
            }
        }

        fn stored(&self) -> Vec<Conversation> {
            self.conversations.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ConversationStore for MockConversationStore {
        async fn list_all(&self) -> Result<Vec<Conversation>> {
            Ok(self.conversations.lock().unwrap().clone())
        }

        async fn get_by_id(&self, id: &str) -> Result<Option<Conversation>> {
            let conversations = self.conversations.lock().unwrap();
            Ok(conversations.iter().find(|c| c.id == id).cloned())
        }

        async fn save(&self, conversation: &Conversation) -> Result<()> {
            let mut conversations = self.conversations.lock().unwrap();
            match conversations.iter_mut().find(|c| c.id == conversation.id) {
                Some(existing) => *existing = conversation.clone(),
                None => conversations.push(conversation.clone()),
            }
            Ok(())
        }

        async fn delete(&self, id: &str) -> Result<()> {
            let mut conversations = self.conversations.lock().unwrap();
            conversations.retain(|c| c.id != id);
            Ok(())
        }
    }

    // Store where every operation fails
    struct FailingConversationStore;

    #[async_trait]
    impl ConversationStore for FailingConversationStore {
        async fn list_all(&self) -> Result<Vec<Conversation>> {
            Err(FolioError::data_access("storage offline"))
        }

        async fn get_by_id(&self, _id: &str) -> Result<Option<Conversation>> {
            Err(FolioError::data_access("storage offline"))
        }

        async fn save(&self, _conversation: &Conversation) -> Result<()> {
            Err(FolioError::data_access("storage offline"))
        }

        async fn delete(&self, _id: &str) -> Result<()> {
            Err(FolioError::data_access("storage offline"))
        }
    }

    struct RecordedQuery {
        document_text: String,
        question: String,
        history: Vec<ChatMessage>,
    }

    // Mock QueryClient recording every call, for testing
    struct MockQueryClient {
        response: Mutex<std::result::Result<String, QueryError>>,
        calls: Mutex<Vec<RecordedQuery>>,
    }

    impl MockQueryClient {
        fn answering(text: &str) -> Self {
            Self {
                response: Mutex::new(Ok(text.to_string())),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(error: QueryError) -> Self {
            Self {
                response: Mutex::new(Err(error)),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl QueryClient for MockQueryClient {
        async fn query(
            &self,
            document_text: &str,
            question: &str,
            history: &[ChatMessage],
        ) -> std::result::Result<String, QueryError> {
            self.calls.lock().unwrap().push(RecordedQuery {
                document_text: document_text.to_string(),
                question: question.to_string(),
                history: history.to_vec(),
            });
            self.response.lock().unwrap().clone()
        }
    }

    // QueryClient that blocks until a permit is released, for in-flight tests
    struct GatedQueryClient {
        gate: Semaphore,
        response: String,
    }

    impl GatedQueryClient {
        fn new(response: &str) -> Self {
            Self {
                gate: Semaphore::new(0),
                response: response.to_string(),
            }
        }
    }

    #[async_trait]
    impl QueryClient for GatedQueryClient {
        async fn query(
            &self,
            _document_text: &str,
            _question: &str,
            _history: &[ChatMessage],
        ) -> std::result::Result<String, QueryError> {
            let _permit = self.gate.acquire().await.unwrap();
            Ok(self.response.clone())
        }
    }

    fn make_conversation(id: &str, file_name: &str, last_updated: &str) -> Conversation {
        Conversation {
            id: id.to_string(),
            pdf_uri: format!("file:///tmp/{}", file_name),
            file_name: file_name.to_string(),
            title: format!("{} - 2024-01-01 00:00", file_name),
            messages: vec![ChatMessage {
                id: "1".to_string(),
                text: "Hello".to_string(),
                is_user: false,
            }],
            created_at: "2024-01-01T00:00:00+00:00".to_string(),
            last_updated: last_updated.to_string(),
        }
    }

    #[tokio::test]
    async fn test_load_creates_conversation_when_none_exists() {
        let store = Arc::new(MockConversationStore::new());
        let client = Arc::new(MockQueryClient::answering("The answer."));
        let session = DocumentSession::new(store.clone(), client);

        let conversation = session
            .load_document(
                "file:///tmp/report.pdf".to_string(),
                "report.pdf".to_string(),
                "Quarterly numbers.".to_string(),
            )
            .await
            .unwrap();

        assert_eq!(conversation.file_name, "report.pdf");
        assert_eq!(conversation.messages.len(), 1);
        assert!(!conversation.messages[0].is_user);

        let stored = store.stored();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, conversation.id);

        assert_eq!(
            session.active_conversation().await.map(|c| c.id),
            Some(conversation.id)
        );
        assert_eq!(
            session.document().await.map(|d| d.file_name),
            Some("report.pdf".to_string())
        );
    }

    #[tokio::test]
    async fn test_load_selects_most_recent_existing_conversation() {
        let store = Arc::new(MockConversationStore::seeded(vec![
            make_conversation("c-old", "report.pdf", "2024-01-01T00:00:00+00:00"),
            make_conversation("c-new", "report.pdf", "2024-03-01T00:00:00+00:00"),
        ]));
        let client = Arc::new(MockQueryClient::answering("The answer."));
        let session = DocumentSession::new(store.clone(), client);

        let conversation = session
            .load_document(
                "file:///tmp/report.pdf".to_string(),
                "report.pdf".to_string(),
                "Quarterly numbers.".to_string(),
            )
            .await
            .unwrap();

        assert_eq!(conversation.id, "c-new");
        // No new conversation was created.
        assert_eq!(store.stored().len(), 2);
    }

    #[tokio::test]
    async fn test_load_with_empty_text_keeps_active_conversation() {
        let store = Arc::new(MockConversationStore::new());
        let client = Arc::new(MockQueryClient::answering("The answer."));
        let session = DocumentSession::new(store.clone(), client);

        let first = session
            .load_document(
                "file:///tmp/a.pdf".to_string(),
                "a.pdf".to_string(),
                "Some text.".to_string(),
            )
            .await
            .unwrap();

        let second = session
            .load_document(
                "file:///tmp/b.pdf".to_string(),
                "b.pdf".to_string(),
                "   ".to_string(),
            )
            .await;

        assert!(second.is_none());
        assert_eq!(
            session.document().await.map(|d| d.file_name),
            Some("b.pdf".to_string())
        );
        assert_eq!(
            session.active_conversation().await.map(|c| c.id),
            Some(first.id)
        );
        // Nothing was created for the empty document.
        assert_eq!(store.stored().len(), 1);
    }

    #[tokio::test]
    async fn test_conversations_for_file_matches_display_name_exactly() {
        let store = Arc::new(MockConversationStore::seeded(vec![
            make_conversation("c-lower", "notes.pdf", "2024-01-01T00:00:00+00:00"),
            make_conversation("c-upper", "Notes.pdf", "2024-01-02T00:00:00+00:00"),
        ]));
        let client = Arc::new(MockQueryClient::answering("The answer."));
        let session = DocumentSession::new(store, client);

        session
            .load_document(
                "file:///tmp/notes.pdf".to_string(),
                "notes.pdf".to_string(),
                "Meeting notes.".to_string(),
            )
            .await
            .unwrap();

        let lower = session.conversations_for_file("notes.pdf").await;
        assert_eq!(lower.len(), 1);
        assert_eq!(lower[0].id, "c-lower");

        let upper = session.conversations_for_file("Notes.pdf").await;
        assert_eq!(upper.len(), 1);
        assert_eq!(upper[0].id, "c-upper");

        assert!(session.conversations_for_file("NOTES.PDF").await.is_empty());
        assert!(session.conversations_for_file("").await.is_empty());
    }

    #[tokio::test]
    async fn test_conversations_listed_most_recent_first() {
        let store = Arc::new(MockConversationStore::seeded(vec![
            make_conversation("c1", "report.pdf", "2024-01-01T00:00:00+00:00"),
            make_conversation("c2", "report.pdf", "2024-03-01T00:00:00+00:00"),
            make_conversation("c3", "report.pdf", "2024-02-01T00:00:00+00:00"),
        ]));
        let client = Arc::new(MockQueryClient::answering("The answer."));
        let session = DocumentSession::new(store, client);

        let active = session
            .load_document(
                "file:///tmp/report.pdf".to_string(),
                "report.pdf".to_string(),
                "Numbers.".to_string(),
            )
            .await
            .unwrap();
        assert_eq!(active.id, "c2");

        let listed: Vec<String> = session
            .list_conversations()
            .await
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(listed, vec!["c2", "c3", "c1"]);
    }

    #[tokio::test]
    async fn test_recency_ties_keep_stored_order() {
        let store = Arc::new(MockConversationStore::seeded(vec![
            make_conversation("c-first", "report.pdf", "2024-01-01T00:00:00+00:00"),
            make_conversation("c-second", "report.pdf", "2024-01-01T00:00:00+00:00"),
        ]));
        let client = Arc::new(MockQueryClient::answering("The answer."));
        let session = DocumentSession::new(store, client);

        let active = session
            .load_document(
                "file:///tmp/report.pdf".to_string(),
                "report.pdf".to_string(),
                "Numbers.".to_string(),
            )
            .await
            .unwrap();

        assert_eq!(active.id, "c-first");
        let listed: Vec<String> = session
            .list_conversations()
            .await
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(listed, vec!["c-first", "c-second"]);
    }

    #[tokio::test]
    async fn test_switch_conversation_activates_by_id() {
        let store = Arc::new(MockConversationStore::new());
        let client = Arc::new(MockQueryClient::answering("The answer."));
        let session = DocumentSession::new(store, client);

        let first = session
            .load_document(
                "file:///tmp/notes.pdf".to_string(),
                "notes.pdf".to_string(),
                "Notes.".to_string(),
            )
            .await
            .unwrap();
        let second = session.new_conversation().await.unwrap();
        assert_eq!(
            session.active_conversation().await.map(|c| c.id),
            Some(second.id)
        );

        let switched = session.switch_conversation(&first.id).await.unwrap();
        assert_eq!(switched.id, first.id);
        assert_eq!(
            session.active_conversation().await.map(|c| c.id),
            Some(first.id)
        );

        let missing = session.switch_conversation("no-such-id").await;
        assert!(missing.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_new_conversation_requires_document() {
        let store = Arc::new(MockConversationStore::new());
        let client = Arc::new(MockQueryClient::answering("The answer."));
        let session = DocumentSession::new(store.clone(), client);

        assert!(session.new_conversation().await.is_none());
        assert!(store.stored().is_empty());
    }

    #[tokio::test]
    async fn test_delete_active_conversation_selects_most_recent_sibling() {
        let store = Arc::new(MockConversationStore::new());
        let client = Arc::new(MockQueryClient::answering("The answer."));
        let session = DocumentSession::new(store.clone(), client);

        let first = session
            .load_document(
                "file:///tmp/notes.pdf".to_string(),
                "notes.pdf".to_string(),
                "Notes.".to_string(),
            )
            .await
            .unwrap();
        let second = session.new_conversation().await.unwrap();

        session.delete_conversation(&second.id).await;

        assert_eq!(
            session.active_conversation().await.map(|c| c.id),
            Some(first.id)
        );
        assert_eq!(
            session.document().await.map(|d| d.file_name),
            Some("notes.pdf".to_string())
        );
        assert_eq!(store.stored().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_last_conversation_clears_active() {
        let store = Arc::new(MockConversationStore::new());
        let client = Arc::new(MockQueryClient::answering("The answer."));
        let session = DocumentSession::new(store.clone(), client);

        let conversation = session
            .load_document(
                "file:///tmp/notes.pdf".to_string(),
                "notes.pdf".to_string(),
                "Notes.".to_string(),
            )
            .await
            .unwrap();

        session.delete_conversation(&conversation.id).await;

        assert!(session.active_conversation().await.is_none());
        // The document stays loaded.
        assert!(session.document().await.is_some());
        assert!(store.stored().is_empty());
    }

    #[tokio::test]
    async fn test_delete_inactive_conversation_keeps_active() {
        let store = Arc::new(MockConversationStore::new());
        let client = Arc::new(MockQueryClient::answering("The answer."));
        let session = DocumentSession::new(store.clone(), client);

        let first = session
            .load_document(
                "file:///tmp/notes.pdf".to_string(),
                "notes.pdf".to_string(),
                "Notes.".to_string(),
            )
            .await
            .unwrap();
        let second = session.new_conversation().await.unwrap();

        session.delete_conversation(&first.id).await;

        assert_eq!(
            session.active_conversation().await.map(|c| c.id),
            Some(second.id)
        );
        assert_eq!(store.stored().len(), 1);
    }

    #[tokio::test]
    async fn test_update_without_active_conversation_leaves_storage_untouched() {
        let store = Arc::new(MockConversationStore::new());
        let client = Arc::new(MockQueryClient::answering("The answer."));
        let session = DocumentSession::new(store.clone(), client);

        session
            .update_current_conversation(vec![ChatMessage::user("hello?")])
            .await;

        assert!(store.stored().is_empty());
    }

    #[tokio::test]
    async fn test_ask_appends_user_and_assistant_turns() {
        let store = Arc::new(MockConversationStore::new());
        let client = Arc::new(MockQueryClient::answering("The answer."));
        let session = DocumentSession::new(store.clone(), client.clone());

        let conversation = session
            .load_document(
                "file:///tmp/report.pdf".to_string(),
                "report.pdf".to_string(),
                "Quarterly numbers.".to_string(),
            )
            .await
            .unwrap();

        let outcome = session.ask("What are the numbers?").await;
        assert!(
            matches!(&outcome, AskOutcome::Answered(message) if message.text == "The answer.")
        );

        let calls = client.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].document_text, "Quarterly numbers.");
        assert_eq!(calls[0].question, "What are the numbers?");
        // The history sent excludes the question itself.
        assert_eq!(calls[0].history.len(), 1);
        assert!(!calls[0].history[0].is_user);
        drop(calls);

        let stored = store.stored();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].messages.len(), 3);
        assert!(!stored[0].messages[0].is_user);
        assert!(stored[0].messages[1].is_user);
        assert_eq!(stored[0].messages[1].text, "What are the numbers?");
        assert!(!stored[0].messages[2].is_user);
        assert_eq!(stored[0].messages[2].text, "The answer.");
        assert!(stored[0].last_updated >= conversation.last_updated);
    }

    #[tokio::test]
    async fn test_ask_failure_records_fallback_reply() {
        let store = Arc::new(MockConversationStore::new());
        let client = Arc::new(MockQueryClient::failing(QueryError::MissingCredential));
        let session = DocumentSession::new(store.clone(), client);

        session
            .load_document(
                "file:///tmp/report.pdf".to_string(),
                "report.pdf".to_string(),
                "Quarterly numbers.".to_string(),
            )
            .await
            .unwrap();

        let outcome = session.ask("What are the numbers?").await;
        let AskOutcome::Answered(message) = outcome else {
            panic!("expected an answered outcome");
        };
        assert_eq!(message.text, QueryError::MissingCredential.fallback_text());

        // The fallback is persisted as a normal assistant turn.
        let stored = store.stored();
        assert_eq!(stored[0].messages.len(), 3);
        assert!(!stored[0].messages[2].is_user);
        assert_eq!(
            stored[0].messages[2].text,
            QueryError::MissingCredential.fallback_text()
        );
    }

    #[tokio::test]
    async fn test_ask_without_document_answers_without_persisting() {
        let store = Arc::new(MockConversationStore::new());
        let client = Arc::new(MockQueryClient::failing(QueryError::MissingDocument));
        let session = DocumentSession::new(store.clone(), client.clone());

        let outcome = session.ask("Anyone there?").await;
        let AskOutcome::Answered(message) = outcome else {
            panic!("expected an answered outcome");
        };
        assert_eq!(message.text, QueryError::MissingDocument.fallback_text());

        assert_eq!(client.calls.lock().unwrap()[0].document_text, "");
        assert!(store.stored().is_empty());
        assert!(session.active_conversation().await.is_none());
    }

    #[tokio::test]
    async fn test_second_ask_while_in_flight_reports_busy() {
        let store = Arc::new(MockConversationStore::new());
        let client = Arc::new(GatedQueryClient::new("slow answer"));
        let session = Arc::new(DocumentSession::new(store, client.clone()));

        let pending = {
            let session = session.clone();
            tokio::spawn(async move { session.ask("first question").await })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(session.ask("second question").await, AskOutcome::Busy);

        client.gate.add_permits(1);
        let outcome = pending.await.unwrap();
        assert!(matches!(outcome, AskOutcome::Answered(message) if message.text == "slow answer"));
    }

    #[tokio::test]
    async fn test_response_for_switched_conversation_is_discarded() {
        let store = Arc::new(MockConversationStore::new());
        let client = Arc::new(GatedQueryClient::new("late answer"));
        let session = Arc::new(DocumentSession::new(store.clone(), client.clone()));

        let first = session
            .load_document(
                "file:///tmp/notes.pdf".to_string(),
                "notes.pdf".to_string(),
                "Notes.".to_string(),
            )
            .await
            .unwrap();

        let pending = {
            let session = session.clone();
            tokio::spawn(async move { session.ask("what is this?").await })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let second = session.new_conversation().await.unwrap();

        client.gate.add_permits(1);
        assert_eq!(pending.await.unwrap(), AskOutcome::Stale);

        // The question stays in the conversation it was asked in, unanswered.
        let originating = store
            .stored()
            .into_iter()
            .find(|c| c.id == first.id)
            .unwrap();
        assert_eq!(originating.messages.len(), 2);
        assert!(originating.messages[1].is_user);
        assert_eq!(originating.messages[1].text, "what is this?");

        let active = session.active_conversation().await.unwrap();
        assert_eq!(active.id, second.id);
        assert_eq!(active.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_storage_failures_degrade_to_in_memory_session() {
        let store = Arc::new(FailingConversationStore);
        let client = Arc::new(MockQueryClient::answering("Still here."));
        let session = DocumentSession::new(store, client);

        let conversation = session
            .load_document(
                "file:///tmp/report.pdf".to_string(),
                "report.pdf".to_string(),
                "Quarterly numbers.".to_string(),
            )
            .await
            .unwrap();

        let outcome = session.ask("does this still work?").await;
        assert!(matches!(outcome, AskOutcome::Answered(message) if message.text == "Still here."));

        // The transcript lives on in memory even though every save failed.
        let active = session.active_conversation().await.unwrap();
        assert_eq!(active.id, conversation.id);
        assert_eq!(active.messages.len(), 3);
    }
}
