//! One chat exchange: refresh the directive, ask the model, apply at most one
//! user data update, keep the transcript bounded.

use std::sync::Arc;

use chatsync_llm::LanguageModel;

use crate::document::DocumentStore;
use crate::error::{ChatError, ToolSpecError};
use crate::session::{SessionRegistry, Turn};
use crate::tool::{ToolSpec, UpdateUserDataInput};

/// Reply returned to the client after the model updated the user data.
pub const UPDATE_CONFIRMATION: &str = "更新完成！";

pub const EMPTY_MESSAGE: &str = "訊息不能為空";
pub const MISSING_SESSION_ID: &str = "缺少 sessionId";

/// Appended to the directive so the model knows how to save changes.
pub const TOOL_INSTRUCTION: &str =
    "當使用者要求新增、修改或刪除資料時，請呼叫 update_user_data 工具，並傳入更新後的完整資料。";

/// Sampling parameters forwarded on every model call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSettings {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            temperature: Some(0.7),
            max_tokens: Some(500),
        }
    }
}

/// The directive turn content: directive text, tool instruction, and a
/// snapshot of the current user data.
pub fn compose_directive(directive: &str, user_data: &str) -> String {
    format!("{directive}\n{TOOL_INSTRUCTION}\n目前使用者資料如下：\n{user_data}\n")
}

pub struct ConversationController {
    model: LanguageModel,
    documents: Arc<DocumentStore>,
    sessions: Arc<SessionRegistry>,
    tool: ToolSpec<UpdateUserDataInput>,
    settings: ModelSettings,
}

impl ConversationController {
    /// Fails only if the `update_user_data` descriptor does not validate.
    pub fn new(
        model: LanguageModel,
        documents: Arc<DocumentStore>,
        sessions: Arc<SessionRegistry>,
        settings: ModelSettings,
    ) -> Result<Self, ToolSpecError> {
        Ok(Self {
            model,
            documents,
            sessions,
            tool: ToolSpec::update_user_data()?,
            settings,
        })
    }

    pub fn documents(&self) -> &Arc<DocumentStore> {
        &self.documents
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    fn current_directive(&self) -> String {
        compose_directive(&self.documents.directive(), &self.documents.user_data())
    }

    /// Run one exchange on `session_id` and return the reply text.
    ///
    /// The user turn stays in the transcript even when the model call fails.
    pub async fn handle_message(
        &self,
        session_id: &str,
        user_text: &str,
    ) -> Result<String, ChatError> {
        if user_text.is_empty() {
            return Err(ChatError::Validation(EMPTY_MESSAGE));
        }
        if session_id.is_empty() {
            return Err(ChatError::Validation(MISSING_SESSION_ID));
        }

        let session = self.sessions.get_or_create(session_id);
        let mut transcript = session.transcript().lock().await;

        transcript.set_directive(self.current_directive());
        transcript.push_user(user_text);

        let mut request = chatsync_llm::request();
        request
            .messages(transcript.to_messages())
            .tool(self.tool.definition().clone())
            .parallel_tool_calls(false);
        if let Some(temperature) = self.settings.temperature {
            request.temperature(temperature);
        }
        if let Some(max_tokens) = self.settings.max_tokens {
            request.max_tokens(max_tokens);
        }

        tracing::debug!(
            session = session_id,
            turns = transcript.turns().len(),
            model = self.model.model_id(),
            "calling model"
        );

        let result = match self.model.generate(request).into_result().await {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(session = session_id, error = %err, "model call failed");
                return Err(err.into());
            }
        };

        tracing::debug!(
            session = session_id,
            input_tokens = result.usage.input_tokens,
            output_tokens = result.usage.output_tokens,
            tool_calls = result.tool_calls.len(),
            "model replied"
        );

        if let Some(call) = result.tool_calls.first() {
            if result.tool_calls.len() > 1 {
                tracing::warn!(
                    session = session_id,
                    calls = result.tool_calls.len(),
                    "model issued several tool calls, applying the first"
                );
            }

            let input = self.tool.parse(call)?;
            tracing::info!(session = session_id, bytes = input.data.len(), "updating user data");
            let persisted = self.documents.set_user_data(input.data).await;

            transcript.replace_directive(self.current_directive());
            transcript.trim();

            if !persisted {
                return Err(ChatError::Persist);
            }
            return Ok(UPDATE_CONFIRMATION.to_string());
        }

        transcript.push_assistant(result.text.clone());
        transcript.trim();
        Ok(result.text)
    }

    /// Forget a session. Unknown ids are fine.
    pub fn clear_session(&self, session_id: &str) {
        let removed = self.sessions.clear(session_id);
        tracing::debug!(session = session_id, removed, "session cleared");
    }

    /// Copy of a session's turns, if the session exists.
    pub async fn transcript(&self, session_id: &str) -> Option<Vec<Turn>> {
        let session = self.sessions.get(session_id)?;
        let transcript = session.transcript().lock().await;
        Some(transcript.turns().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use chatsync_llm::{
        Error as LlmError, FinishReason, GenerateRequest, LanguageModelBackend, Message,
        Response, StreamEvent, ToolCallPart,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::bus::NotificationBus;
    use crate::document::{DEFAULT_DIRECTIVE, DEFAULT_USER_DATA};
    use crate::event::ServerEvent;
    use crate::session::{MAX_EXCHANGE_TURNS, Role, SessionLimits};
    use crate::error::StoreError;
    use crate::store::{BlobStore, MemoryBlobStore, USER_DATA_RECORD};
    use crate::tool::UPDATE_USER_DATA;

    type Reply = Vec<Result<StreamEvent, LlmError>>;

    /// Replays queued replies in order and records every request.
    /// With nothing queued it answers "ok".
    #[derive(Default)]
    struct Script {
        replies: Mutex<VecDeque<Reply>>,
        requests: Mutex<Vec<GenerateRequest>>,
    }

    impl Script {
        fn push(&self, reply: Reply) {
            self.replies.lock().push_back(reply);
        }

        fn requests(&self) -> Vec<GenerateRequest> {
            self.requests.lock().clone()
        }
    }

    struct ScriptedModel(Arc<Script>);

    impl LanguageModelBackend for ScriptedModel {
        fn model_id(&self) -> &str {
            "scripted"
        }

        fn provider(&self) -> &str {
            "test"
        }

        fn generate(&self, request: GenerateRequest) -> Response {
            self.0.requests.lock().push(request);
            let reply = self
                .0
                .replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| text_reply("ok"));
            Response::new(tokio_stream::iter(reply))
        }
    }

    fn text_reply(text: &str) -> Reply {
        vec![
            Ok(StreamEvent::TextDelta(text.into())),
            Ok(StreamEvent::Finish {
                reason: FinishReason::Stop,
                usage: None,
            }),
        ]
    }

    fn tool_reply(calls: &[(&str, &str)]) -> Reply {
        let mut events: Reply = vec![Ok(StreamEvent::TextDelta("ignored".into()))];
        for (index, (name, arguments)) in calls.iter().enumerate() {
            events.push(Ok(StreamEvent::ToolCallEnd {
                index,
                call: ToolCallPart {
                    id: format!("call_{index}"),
                    name: (*name).into(),
                    arguments: (*arguments).into(),
                },
            }));
        }
        events.push(Ok(StreamEvent::Finish {
            reason: FinishReason::ToolCalls,
            usage: None,
        }));
        events
    }

    struct Harness {
        controller: ConversationController,
        script: Arc<Script>,
        blobs: Arc<MemoryBlobStore>,
    }

    /// Accepts reads as "never written" and refuses every write.
    struct ReadOnlyBlobStore;

    #[async_trait]
    impl BlobStore for ReadOnlyBlobStore {
        async fn read(&self, _name: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        async fn write(&self, _name: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Task("read-only".into()))
        }
    }

    fn controller_with(script: &Arc<Script>, blobs: Arc<dyn BlobStore>) -> ConversationController {
        let documents = Arc::new(DocumentStore::new(blobs, NotificationBus::default()));
        ConversationController::new(
            LanguageModel::new(ScriptedModel(Arc::clone(script))),
            documents,
            Arc::new(SessionRegistry::new(SessionLimits::unbounded())),
            ModelSettings::default(),
        )
        .unwrap()
    }

    fn harness() -> Harness {
        let script = Arc::new(Script::default());
        let blobs = Arc::new(MemoryBlobStore::new());
        let controller = controller_with(&script, blobs.clone());
        Harness {
            controller,
            script,
            blobs,
        }
    }

    fn directive_count(turns: &[Turn]) -> usize {
        turns.iter().filter(|t| t.role == Role::Directive).count()
    }

    #[tokio::test]
    async fn plain_reply_is_recorded_and_returned() {
        let h = harness();
        h.script.push(text_reply("你好！"));

        let reply = h.controller.handle_message("s1", "嗨").await.unwrap();
        assert_eq!(reply, "你好！");

        let turns = h.controller.transcript("s1").await.unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].role, Role::Directive);
        assert_eq!(turns[0].content, compose_directive(DEFAULT_DIRECTIVE, DEFAULT_USER_DATA));
        assert_eq!(turns[1], Turn::new(Role::User, "嗨"));
        assert_eq!(turns[2], Turn::new(Role::Assistant, "你好！"));
    }

    #[tokio::test]
    async fn request_carries_tool_and_settings() {
        let h = harness();
        h.controller.handle_message("s1", "hi").await.unwrap();

        let requests = h.script.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.tools.len(), 1);
        assert_eq!(request.tools[0].name, UPDATE_USER_DATA);
        assert_eq!(request.options.parallel_tool_calls, Some(false));
        assert_eq!(request.options.temperature, Some(0.7));
        assert_eq!(request.options.max_tokens, Some(500));
        assert!(matches!(request.messages[0], Message::System { .. }));
        assert_eq!(request.messages[1], Message::user("hi"));
    }

    #[tokio::test]
    async fn directive_reflects_current_user_data_on_every_call() {
        let h = harness();
        h.controller.handle_message("s1", "first").await.unwrap();
        h.controller.documents().set_user_data("雞蛋 3顆").await;
        h.controller.handle_message("s1", "second").await.unwrap();

        let requests = h.script.requests();
        let system = requests[1].messages[0].text();
        assert!(system.contains("雞蛋 3顆"));

        let turns = h.controller.transcript("s1").await.unwrap();
        assert_eq!(directive_count(&turns), 1);
        assert_eq!(turns[0].role, Role::Directive);
    }

    #[tokio::test]
    async fn long_conversations_keep_the_last_ten_pairs() {
        let h = harness();
        for i in 0..12 {
            h.script.push(text_reply(&format!("a{i}")));
            h.controller
                .handle_message("s1", &format!("u{i}"))
                .await
                .unwrap();
        }

        let turns = h.controller.transcript("s1").await.unwrap();
        assert_eq!(turns.len(), MAX_EXCHANGE_TURNS + 1);
        assert_eq!(directive_count(&turns), 1);
        assert_eq!(turns[0].role, Role::Directive);
        assert_eq!(turns[1], Turn::new(Role::User, "u2"));
        assert_eq!(turns[20], Turn::new(Role::Assistant, "a11"));
    }

    #[tokio::test]
    async fn tool_call_updates_user_data_and_broadcasts() {
        let h = harness();
        let mut sub = h.controller.documents().bus().subscribe();
        assert_eq!(sub.try_recv(), Some(ServerEvent::connected()));

        h.script
            .push(tool_reply(&[(UPDATE_USER_DATA, r#"{"data":"買牛奶"}"#)]));
        let reply = h
            .controller
            .handle_message("s1", "新增代辦事項：買牛奶")
            .await
            .unwrap();

        assert_eq!(reply, UPDATE_CONFIRMATION);
        assert_eq!(h.controller.documents().user_data(), "買牛奶");
        assert_eq!(h.blobs.get(USER_DATA_RECORD).as_deref(), Some("買牛奶"));
        assert_eq!(sub.try_recv(), Some(ServerEvent::user_data_updated("買牛奶")));
        assert_eq!(sub.try_recv(), None);

        let turns = h.controller.transcript("s1").await.unwrap();
        assert_eq!(directive_count(&turns), 1);
        assert!(turns[0].content.ends_with("買牛奶\n"));
        assert_eq!(turns.last(), Some(&Turn::new(Role::User, "新增代辦事項：買牛奶")));
    }

    #[tokio::test]
    async fn failed_save_still_updates_memory_and_subscribers() {
        let script = Arc::new(Script::default());
        let controller = controller_with(&script, Arc::new(ReadOnlyBlobStore));
        let mut sub = controller.documents().bus().subscribe();
        assert_eq!(sub.try_recv(), Some(ServerEvent::connected()));

        script.push(tool_reply(&[(UPDATE_USER_DATA, r#"{"data":"買牛奶"}"#)]));
        let err = controller.handle_message("s1", "新增代辦事項：買牛奶").await.unwrap_err();

        assert!(matches!(err, ChatError::Persist));
        assert_eq!(controller.documents().user_data(), "買牛奶");
        assert_eq!(sub.try_recv(), Some(ServerEvent::user_data_updated("買牛奶")));
        assert_eq!(sub.try_recv(), None);

        let turns = controller.transcript("s1").await.unwrap();
        assert_eq!(directive_count(&turns), 1);
        assert!(turns[0].content.ends_with("買牛奶\n"));
    }

    #[tokio::test]
    async fn only_the_first_of_several_tool_calls_is_applied() {
        let h = harness();
        h.script.push(tool_reply(&[
            (UPDATE_USER_DATA, r#"{"data":"first"}"#),
            (UPDATE_USER_DATA, r#"{"data":"second"}"#),
        ]));

        let reply = h.controller.handle_message("s1", "go").await.unwrap();
        assert_eq!(reply, UPDATE_CONFIRMATION);
        assert_eq!(h.controller.documents().user_data(), "first");
    }

    #[tokio::test]
    async fn model_failure_keeps_the_user_turn() {
        let h = harness();
        h.script.push(vec![Err(LlmError::Api {
            code: "server_error".into(),
            message: "boom".into(),
        })]);

        let err = h.controller.handle_message("s1", "hello").await.unwrap_err();
        assert!(matches!(err, ChatError::Model(_)));

        let turns = h.controller.transcript("s1").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1], Turn::new(Role::User, "hello"));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_and_leaves_data_alone() {
        let h = harness();
        h.script.push(tool_reply(&[("drop_tables", "{}")]));

        let err = h.controller.handle_message("s1", "hmm").await.unwrap_err();
        assert!(matches!(err, ChatError::UnknownTool(ref n) if n == "drop_tables"));
        assert_eq!(h.controller.documents().user_data(), DEFAULT_USER_DATA);
    }

    #[tokio::test]
    async fn empty_message_or_session_is_rejected_before_any_state_changes() {
        let h = harness();

        let err = h.controller.handle_message("s1", "").await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), EMPTY_MESSAGE);

        let err = h.controller.handle_message("", "hi").await.unwrap_err();
        assert!(err.is_validation());

        assert!(h.controller.sessions().is_empty());
        assert!(h.script.requests().is_empty());
    }

    #[tokio::test]
    async fn whitespace_only_message_reaches_the_model() {
        let h = harness();
        h.script.push(text_reply("有什麼需要幫忙的嗎？"));

        let reply = h.controller.handle_message("s1", "   ").await.unwrap();
        assert_eq!(reply, "有什麼需要幫忙的嗎？");

        let requests = h.script.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages.last(), Some(&Message::user("   ")));
    }

    #[tokio::test]
    async fn clear_session_forgets_history_and_tolerates_unknown_ids() {
        let h = harness();
        h.controller.clear_session("never-seen");

        h.controller.handle_message("s1", "remember me").await.unwrap();
        h.controller.clear_session("s1");
        assert!(h.controller.transcript("s1").await.is_none());

        h.controller.handle_message("s1", "again").await.unwrap();
        let turns = h.controller.transcript("s1").await.unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1], Turn::new(Role::User, "again"));
    }

    #[tokio::test]
    async fn sessions_do_not_share_transcripts() {
        let h = harness();
        h.controller.handle_message("a", "from a").await.unwrap();
        h.controller.handle_message("b", "from b").await.unwrap();

        let b = h.controller.transcript("b").await.unwrap();
        assert!(b.iter().all(|t| t.content != "from a"));
        assert_eq!(h.controller.sessions().len(), 2);
    }
}
