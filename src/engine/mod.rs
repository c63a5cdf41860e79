//! The engine: conversation state plus the mode router.
//!
//! Every user turn is persisted, dispatched to one of four fixed code paths
//! (quick / live / deep / context), and the reply is persisted and stored in
//! vector memory. Failures surface as a `**System error:**` reply instead of
//! killing the turn.

mod deep;
mod live;
mod prompt;
mod provider;

pub use live::ToolChoice;
pub use provider::{
    LlmProvider, Message, OllamaProvider, Role, StreamChunk, StreamResult,
};

use anyhow::Result;
use futures::{Stream, StreamExt};
use std::fmt;
use std::path::PathBuf;
use std::pin::pin;
use std::str::FromStr;
use tracing::{info, warn};

use crate::config::Config;
use crate::memory::MemoryManager;
use crate::storage::{ChatStorage, SessionSummary, StoredMessage};
use crate::tools::{WebTools, export_report};

/// The four operating modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Quick,
    Live,
    Deep,
    Context,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Quick, Mode::Live, Mode::Deep, Mode::Context];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Quick => "quick",
            Mode::Live => "live",
            Mode::Deep => "deep",
            Mode::Context => "context",
        }
    }

    /// One-line description for help text and the mode selector.
    pub fn description(&self) -> &'static str {
        match self {
            Mode::Quick => "offline chat with the local model",
            Mode::Live => "answer from a live web tool",
            Mode::Deep => "multi-step research report",
            Mode::Context => "chat with long-term memory recall",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "quick" => Ok(Mode::Quick),
            "live" => Ok(Mode::Live),
            "deep" => Ok(Mode::Deep),
            "context" => Ok(Mode::Context),
            other => anyhow::bail!(
                "Invalid mode: '{}' (expected quick, live, deep, or context)",
                other
            ),
        }
    }
}

/// Events yielded while a turn is processed.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Transient status line; not part of the stored reply.
    Progress(String),
    /// A chunk of the reply text.
    Content(String),
    /// Turn finished.
    Done,
}

pub struct Engine {
    provider: Box<dyn LlmProvider>,
    tools: WebTools,
    storage: ChatStorage,
    memory: MemoryManager,
    history: Vec<Message>,
    mode: Mode,
    session_id: String,
    recall_results: usize,
    search_max_results: usize,
    export_dir: PathBuf,
}

impl Engine {
    pub fn new(
        config: &Config,
        provider: Box<dyn LlmProvider>,
        storage: ChatStorage,
        memory: MemoryManager,
    ) -> Result<Self> {
        let tools = WebTools::new(&config.search)?;
        let session_id = storage.create_session()?;
        let history = vec![Message::system(prompt::build_persona())];

        info!("Engine ready (model: {}, session: {})", provider.model(), session_id);

        Ok(Self {
            provider,
            tools,
            storage,
            memory,
            history,
            mode: Mode::default(),
            session_id,
            recall_results: config.memory.recall_results,
            search_max_results: config.search.max_results,
            export_dir: config.export_dir(),
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch the operating mode.
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        info!("Mode switched to: {}", mode);
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Swap in a different provider (used when the active model changes).
    pub fn replace_provider(&mut self, provider: Box<dyn LlmProvider>) {
        info!("Switched to model: {}", provider.model());
        self.provider = provider;
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn memory_count(&self) -> usize {
        self.memory.count()
    }

    pub fn has_embeddings(&self) -> bool {
        self.memory.has_embeddings()
    }

    /// Reset to a fresh session and context window.
    pub fn new_chat(&mut self) -> Result<String> {
        self.session_id = self.storage.create_session()?;
        self.history = vec![Message::system(prompt::build_persona())];
        info!("Started new session: {}", self.session_id);
        Ok(self.session_id.clone())
    }

    /// Load an old session into the context window, returning its messages
    /// for display.
    pub fn load_chat(&mut self, session_id: &str) -> Result<Vec<StoredMessage>> {
        let messages = self.storage.session_messages(session_id)?;

        self.session_id = session_id.to_string();
        self.history = vec![Message::system(prompt::build_persona())];
        for msg in &messages {
            let message = match msg.role.as_str() {
                "user" => Message::user(&msg.content),
                _ => Message::assistant(&msg.content),
            };
            self.history.push(message);
        }

        info!("Loaded session: {} ({} messages)", session_id, messages.len());
        Ok(messages)
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        self.storage.list_sessions()
    }

    /// Delete a session. Deleting the active one starts a fresh chat.
    pub fn delete_session(&mut self, session_id: &str) -> Result<()> {
        self.storage.delete_session(session_id)?;
        if session_id == self.session_id {
            self.new_chat()?;
        }
        Ok(())
    }

    pub fn wipe_memory(&self) -> Result<()> {
        self.memory.wipe()
    }

    /// Process one user turn and return the full reply.
    pub async fn chat(&mut self, input: &str) -> String {
        let mut response = String::new();
        {
            let mut events = pin!(self.chat_events(input.to_string()));
            while let Some(event) = events.next().await {
                if let EngineEvent::Content(chunk) = event {
                    response.push_str(&chunk);
                }
            }
        }
        response
    }

    /// Process one user turn, yielding progress and reply chunks as they
    /// happen. The concatenation of `Content` chunks is the stored reply.
    pub fn chat_events(&mut self, input: String) -> impl Stream<Item = EngineEvent> + '_ {
        async_stream::stream! {
            info!("Processing in [{}] mode", self.mode);

            if let Err(e) = self.storage.add_message(&self.session_id, "user", &input) {
                yield EngineEvent::Content(format!("**System error:** {}", e));
                yield EngineEvent::Done;
                return;
            }

            let deep_requested = self.mode == Mode::Deep || input.starts_with("/deep");
            let mut response = String::new();

            if deep_requested {
                let query = input
                    .strip_prefix("/deep")
                    .unwrap_or(&input)
                    .trim()
                    .to_string();
                let query = if query.is_empty() { input.clone() } else { query };

                for await event in self.run_deep(query) {
                    if let EngineEvent::Content(ref chunk) = event {
                        response.push_str(chunk);
                    }
                    yield event;
                }
            } else {
                match self.mode {
                    Mode::Context => {
                        yield EngineEvent::Progress("Recalling memories...".to_string());
                        let past = self.memory.recall(&input, self.recall_results).await;

                        self.history
                            .push(Message::user(prompt::context_prompt(&past, &input)));

                        for await event in stream_reply(&*self.provider, &self.history) {
                            if let EngineEvent::Content(ref chunk) = event {
                                response.push_str(chunk);
                            }
                            yield event;
                        }
                    }
                    Mode::Live => {
                        yield EngineEvent::Progress("Choosing a tool...".to_string());

                        match live::pick_tool(&*self.provider, &input).await {
                            Ok(choice) => {
                                yield EngineEvent::Progress(format!(
                                    "Consulting {}...",
                                    choice.source_label()
                                ));
                                let tool_result = live::execute_tool(
                                    &self.tools,
                                    choice,
                                    &input,
                                    self.search_max_results,
                                )
                                .await;

                                yield EngineEvent::Progress("Synthesizing answer...".to_string());
                                match live::synthesize(&*self.provider, &input, choice, &tool_result)
                                    .await
                                {
                                    Ok(answer) => {
                                        response.push_str(&answer);
                                        yield EngineEvent::Content(answer);
                                    }
                                    Err(e) => {
                                        let text = format!("**System error:** {}", e);
                                        response.push_str(&text);
                                        yield EngineEvent::Content(text);
                                    }
                                }
                            }
                            Err(e) => {
                                let text = format!("**System error:** {}", e);
                                response.push_str(&text);
                                yield EngineEvent::Content(text);
                            }
                        }
                    }
                    Mode::Quick | Mode::Deep => {
                        self.history.push(Message::user(&input));

                        for await event in stream_reply(&*self.provider, &self.history) {
                            if let EngineEvent::Content(ref chunk) = event {
                                response.push_str(chunk);
                            }
                            yield event;
                        }

                        self.history.push(Message::assistant(&response));
                    }
                }
            }

            if let Err(e) = self
                .storage
                .add_message(&self.session_id, "assistant", &response)
            {
                warn!("Failed to persist assistant message: {}", e);
            }

            // Deep reports would pollute the vector store, so skip them
            if self.mode != Mode::Deep
                && let Err(e) = self.memory.remember(&input, &response).await
            {
                warn!("Failed to store memory: {}", e);
            }

            yield EngineEvent::Done;
        }
    }

    /// The deep-research pipeline. Narration lines are part of the reply
    /// transcript, and the whole transcript is exported at the end.
    fn run_deep(&mut self, query: String) -> impl Stream<Item = EngineEvent> + '_ {
        async_stream::stream! {
            let mut transcript = String::new();

            let header = "### **Analyzing request...**\n".to_string();
            transcript.push_str(&header);
            yield EngineEvent::Content(header);

            let sub_queries = match deep::decompose(&*self.provider, &query).await {
                Ok(subs) if !subs.is_empty() => subs,
                Ok(_) => {
                    yield EngineEvent::Content(
                        "**System error:** the planner returned no research tasks.".to_string(),
                    );
                    return;
                }
                Err(e) => {
                    yield EngineEvent::Content(format!("**System error:** {}", e));
                    return;
                }
            };

            let plan = format!(
                "I have broken this down into {} research tasks:\n",
                sub_queries.len()
            );
            transcript.push_str(&plan);
            yield EngineEvent::Content(plan);
            for q in &sub_queries {
                let line = format!("- *{}*\n", q);
                transcript.push_str(&line);
                yield EngineEvent::Content(line);
            }

            let mut aggregated = String::new();
            for sub_q in &sub_queries {
                let line = format!("\n**Researching:** *{}*...\n", sub_q);
                transcript.push_str(&line);
                yield EngineEvent::Content(line);
                aggregated.push_str(&deep::gather(&self.tools, std::slice::from_ref(sub_q)).await);
            }

            let line = "\n**Writing final report...**\n".to_string();
            transcript.push_str(&line);
            yield EngineEvent::Content(line);

            match deep::write_report(&*self.provider, &query, &aggregated).await {
                Ok(report) => {
                    let tail = format!("\n---\n{}", report);
                    transcript.push_str(&tail);
                    yield EngineEvent::Content(tail);
                }
                Err(e) => {
                    yield EngineEvent::Content(format!("**System error:** {}", e));
                    return;
                }
            }

            // Reports are exported automatically
            let title_stub: String = query.chars().take(10).collect();
            let title = format!("Deep Research {}", title_stub);
            match export_report(&self.export_dir, &title, &transcript) {
                Ok(confirmation) => {
                    yield EngineEvent::Content(format!("\n\n_{}_", confirmation));
                }
                Err(e) => {
                    warn!("Failed to export report: {}", e);
                }
            }
        }
    }
}

/// Stream a plain chat reply from the provider, converting transport errors
/// into a system-error chunk.
fn stream_reply<'a>(
    provider: &'a dyn LlmProvider,
    history: &'a [Message],
) -> impl Stream<Item = EngineEvent> + 'a {
    async_stream::stream! {
        match provider.chat_stream(history).await {
            Ok(stream) => {
                let mut stream = pin!(stream);
                while let Some(chunk) = stream.next().await {
                    match chunk {
                        Ok(chunk) => {
                            if !chunk.delta.is_empty() {
                                yield EngineEvent::Content(chunk.delta);
                            }
                            if chunk.done {
                                break;
                            }
                        }
                        Err(e) => {
                            yield EngineEvent::Content(format!("\n**System error:** {}", e));
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                yield EngineEvent::Content(format!("**System error:** {}", e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::memory::{MemoryManager, MemoryStore};

    /// Provider that replays queued replies.
    struct ScriptedProvider {
        replies: Mutex<VecDeque<String>>,
    }

    impl ScriptedProvider {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn chat(&self, _messages: &[Message]) -> Result<String> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("no scripted reply left"))
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    fn test_engine(replies: &[&str]) -> Engine {
        let storage = ChatStorage::open_in_memory().unwrap();
        let memory = MemoryManager::with_store(MemoryStore::open_in_memory().unwrap(), None);
        Engine::new(
            &Config::default(),
            Box::new(ScriptedProvider::new(replies)),
            storage,
            memory,
        )
        .unwrap()
    }

    #[test]
    fn mode_roundtrips_through_strings() {
        for mode in Mode::ALL {
            assert_eq!(mode.as_str().parse::<Mode>().unwrap(), mode);
        }
        assert!("turbo".parse::<Mode>().is_err());
        assert_eq!("QUICK".parse::<Mode>().unwrap(), Mode::Quick);
    }

    #[tokio::test]
    async fn quick_mode_replies_and_persists_both_sides() {
        let mut engine = test_engine(&["Hello from the model"]);

        let response = engine.chat("hi there").await;
        assert_eq!(response, "Hello from the model");

        let messages = engine
            .storage
            .session_messages(engine.session_id())
            .unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[0].content, "hi there");
        assert_eq!(messages[1].role, "assistant");
        assert_eq!(messages[1].content, "Hello from the model");

        // The turn also landed in vector memory
        assert_eq!(engine.memory_count(), 1);
    }

    #[tokio::test]
    async fn quick_mode_keeps_history_across_turns() {
        let mut engine = test_engine(&["first", "second"]);

        engine.chat("one").await;
        engine.chat("two").await;

        // persona + (user, assistant) x2
        assert_eq!(engine.history.len(), 5);
        assert_eq!(engine.history[0].role, Role::System);
        assert_eq!(engine.history[3].content, "two");
        assert_eq!(engine.history[4].content, "second");
    }

    #[tokio::test]
    async fn context_mode_injects_recalled_memories() {
        let mut engine = test_engine(&["noted", "Max"]);

        // First turn (quick) seeds the memory store
        engine.chat("my dog is named Max").await;
        assert_eq!(engine.memory_count(), 1);

        engine.set_mode(Mode::Context);
        let response = engine.chat("what is my dog called? Max?").await;
        assert_eq!(response, "Max");

        // The second request carried the recall preamble with the stored turn
        let last_user = engine
            .history
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .unwrap();
        assert!(last_user.content.contains("memory of our past conversations"));
        assert!(last_user.content.contains("my dog is named Max"));
    }

    #[tokio::test]
    async fn provider_errors_become_system_error_replies() {
        // No scripted replies: the first chat call errors
        let mut engine = test_engine(&[]);

        let response = engine.chat("hello").await;
        assert!(response.starts_with("**System error:**"));

        // The failed turn is still persisted
        let messages = engine
            .storage
            .session_messages(engine.session_id())
            .unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[1].content.starts_with("**System error:**"));
    }

    #[tokio::test]
    async fn deep_prefix_triggers_research_pipeline() {
        // Planner returns nothing: the pipeline stops before any web search
        let mut engine = test_engine(&[""]);

        let response = engine.chat("/deep history of rust").await;
        assert!(response.contains("**Analyzing request...**"));
        assert!(response.contains("no research tasks"));
    }

    #[tokio::test]
    async fn deep_mode_skips_vector_memory() {
        let mut engine = test_engine(&[""]);
        engine.set_mode(Mode::Deep);

        engine.chat("anything").await;
        assert_eq!(engine.memory_count(), 0);
    }

    #[tokio::test]
    async fn new_chat_resets_session_and_history() {
        let mut engine = test_engine(&["reply"]);
        engine.chat("hello").await;
        let first_session = engine.session_id().to_string();

        let second_session = engine.new_chat().unwrap();
        assert_ne!(first_session, second_session);
        assert_eq!(engine.history.len(), 1); // persona only

        // Both sessions are listed
        assert_eq!(engine.list_sessions().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn load_chat_rebuilds_history() {
        let mut engine = test_engine(&["reply"]);
        engine.chat("remember this").await;
        let session = engine.session_id().to_string();

        engine.new_chat().unwrap();
        let messages = engine.load_chat(&session).unwrap();

        assert_eq!(engine.session_id(), session);
        assert_eq!(messages.len(), 2);
        // persona + user + assistant
        assert_eq!(engine.history.len(), 3);
        assert_eq!(engine.history[1].content, "remember this");
    }

    #[tokio::test]
    async fn deleting_active_session_starts_fresh() {
        let mut engine = test_engine(&[]);
        let doomed = engine.session_id().to_string();

        engine.delete_session(&doomed).unwrap();
        assert_ne!(engine.session_id(), doomed);

        let sessions = engine.list_sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, engine.session_id());
    }

    #[tokio::test]
    async fn progress_events_are_not_part_of_the_reply() {
        let mut engine = test_engine(&["noted", "answer"]);
        engine.chat("seed memory").await;
        engine.set_mode(Mode::Context);

        let mut progress = 0;
        let mut content = String::new();
        {
            let mut events = pin!(engine.chat_events("question".to_string()));
            while let Some(event) = events.next().await {
                match event {
                    EngineEvent::Progress(_) => progress += 1,
                    EngineEvent::Content(chunk) => content.push_str(&chunk),
                    EngineEvent::Done => {}
                }
            }
        }

        assert!(progress >= 1);
        assert_eq!(content, "answer");
    }
}
