//! Core turn loop implementation.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::Config;
use crate::llm::{ChatMessage, LlmClient, LlmError, ToolCall};
use crate::store::{ItineraryStore, ThreadStore};
use crate::tools::{ToolContext, ToolRegistry};

use super::error::AgentError;
use super::intent::{Intent, IntentClassifier};
use super::prompt::build_system_prompt;

/// Generation runs exploratory, unlike the deterministic classifier.
const GENERATION_TEMPERATURE: f32 = 0.7;

/// Result of one completed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub thread_id: Uuid,
    pub reply: String,
    pub intent: Intent,
}

/// The conversational trip-planning agent.
pub struct Agent {
    config: Config,
    llm: Arc<dyn LlmClient>,
    classifier: IntentClassifier,
    tools: ToolRegistry,
    threads: Arc<dyn ThreadStore>,
    /// Serializes turns per thread so appends never interleave.
    turn_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
    /// Most recent classification per thread, fallback for vague follow-ups.
    last_intents: Mutex<HashMap<Uuid, Intent>>,
}

impl Agent {
    /// Create the agent with its collaborators injected.
    pub fn new(
        config: Config,
        llm: Arc<dyn LlmClient>,
        threads: Arc<dyn ThreadStore>,
        itineraries: Arc<dyn ItineraryStore>,
    ) -> Self {
        let tools = ToolRegistry::new(itineraries);
        Self::with_registry(config, llm, threads, tools)
    }

    /// Create the agent with a custom tool registry.
    pub fn with_registry(
        config: Config,
        llm: Arc<dyn LlmClient>,
        threads: Arc<dyn ThreadStore>,
        tools: ToolRegistry,
    ) -> Self {
        let classifier = IntentClassifier::new(llm.clone(), config.classifier_model.clone());
        Self {
            config,
            llm,
            classifier,
            tools,
            threads,
            turn_locks: Mutex::new(HashMap::new()),
            last_intents: Mutex::new(HashMap::new()),
        }
    }

    /// Run one turn: classify the message, generate a reply, executing any
    /// requested tool calls along the way, and append everything to the
    /// thread.
    ///
    /// A missing `thread_id` creates a fresh thread owned by `user_id`.
    /// Classification failures fall back to the general intent; generation
    /// failures and an exhausted tool-round budget surface as
    /// `AgentError::Generation` with the thread left consistent (every
    /// tool call already has its result).
    pub async fn run_turn(
        &self,
        user_id: &str,
        thread_id: Option<Uuid>,
        text: &str,
    ) -> Result<TurnOutcome, AgentError> {
        let thread_id = match thread_id {
            Some(id) => {
                // Validates existence and ownership before any append.
                self.threads.get(id, user_id).await?;
                id
            }
            None => self.threads.create(user_id).await?.id,
        };

        let lock = self.turn_lock(thread_id).await;
        let _guard = lock.lock().await;

        self.threads
            .append_message(thread_id, ChatMessage::user(text))
            .await?;
        let history = self.threads.get(thread_id, user_id).await?.messages;

        let previous = self.last_intents.lock().await.get(&thread_id).copied();
        let prior = &history[..history.len().saturating_sub(1)];
        let intent = match self.classifier.classify(prior, text, previous).await {
            Ok(intent) => intent,
            Err(err) => {
                tracing::warn!(error = %err, "classification failed, falling back to general");
                Intent::General
            }
        };
        self.last_intents.lock().await.insert(thread_id, intent);

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(build_system_prompt(intent, &self.tools)));
        messages.extend(history);

        let tool_schemas = self.tools.get_tool_schemas();
        let ctx = ToolContext {
            user_id: user_id.to_string(),
        };

        for round in 0..self.config.max_tool_rounds {
            let response = self
                .llm
                .chat_completion(
                    &self.config.chat_model,
                    &messages,
                    Some(&tool_schemas),
                    GENERATION_TEMPERATURE,
                )
                .await
                .map_err(AgentError::Generation)?;

            if response.has_tool_calls() {
                let calls = response.tool_calls.clone().unwrap_or_default();
                tracing::debug!(round, count = calls.len(), "executing tool calls");

                self.threads
                    .append_message(thread_id, response.clone())
                    .await?;
                messages.push(response);

                // One result per call, in request order, before the next
                // generation call.
                for call in &calls {
                    let result_text = match self.execute_tool_call(call, &ctx).await {
                        Ok(output) => output,
                        Err(err) => {
                            tracing::warn!(error = %err, "tool call failed");
                            format!("Error: {}", err)
                        }
                    };

                    let result = ChatMessage::tool_result(call.id.clone(), result_text);
                    self.threads
                        .append_message(thread_id, result.clone())
                        .await?;
                    messages.push(result);
                }

                continue;
            }

            if let Some(reply) = response.content.clone().filter(|c| !c.trim().is_empty()) {
                self.threads.append_message(thread_id, response).await?;
                return Ok(TurnOutcome {
                    thread_id,
                    reply,
                    intent,
                });
            }

            return Err(AgentError::Generation(LlmError::MalformedResponse(
                "model returned neither content nor tool calls".to_string(),
            )));
        }

        Err(AgentError::Generation(LlmError::MalformedResponse(format!(
            "tool-call round limit ({}) reached",
            self.config.max_tool_rounds
        ))))
    }

    /// Hard-delete a thread and drop its per-thread state.
    pub async fn delete_thread(&self, user_id: &str, thread_id: Uuid) -> Result<bool, AgentError> {
        let deleted = self.threads.delete(thread_id, user_id).await?;
        if deleted {
            self.turn_locks.lock().await.remove(&thread_id);
            self.last_intents.lock().await.remove(&thread_id);
        }
        Ok(deleted)
    }

    /// Execute a single tool call.
    async fn execute_tool_call(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
    ) -> Result<String, AgentError> {
        let args: serde_json::Value =
            serde_json::from_str(&call.function.arguments).unwrap_or(serde_json::Value::Null);

        self.tools
            .execute(&call.function.name, args, ctx)
            .await
            .map_err(|e| AgentError::ToolExecution {
                tool: call.function.name.clone(),
                message: e.to_string(),
            })
    }

    async fn turn_lock(&self, thread_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.turn_locks.lock().await;
        locks
            .entry(thread_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{FunctionCall, Role};
    use crate::store::{InMemoryItineraryStore, InMemoryThreadStore};
    use crate::tools::Tool;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;

    fn test_config() -> Config {
        Config {
            api_key: "test-key".to_string(),
            chat_model: "chat-model".to_string(),
            classifier_model: "classifier-model".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            max_tool_rounds: 5,
            llm_timeout_secs: 5,
            db_path: None,
        }
    }

    /// Scripted LLM: classifier and generator replies are separate FIFO
    /// queues, routed by model name. Generation inputs are recorded for
    /// asserting what the model saw.
    #[derive(Default)]
    struct ScriptedLlm {
        classify: Mutex<VecDeque<Result<ChatMessage, LlmError>>>,
        generate: Mutex<VecDeque<Result<ChatMessage, LlmError>>>,
        generation_calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedLlm {
        async fn push_classify(&self, reply: Result<ChatMessage, LlmError>) {
            self.classify.lock().await.push_back(reply);
        }

        async fn push_generate(&self, reply: Result<ChatMessage, LlmError>) {
            self.generate.lock().await.push_back(reply);
        }
    }

    fn upstream_down() -> LlmError {
        LlmError::Api {
            status: 503,
            body: "upstream unavailable".to_string(),
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat_completion(
            &self,
            model: &str,
            messages: &[ChatMessage],
            _tools: Option<&[serde_json::Value]>,
            _temperature: f32,
        ) -> Result<ChatMessage, LlmError> {
            if model == "classifier-model" {
                self.classify
                    .lock()
                    .await
                    .pop_front()
                    .expect("unexpected classifier call")
            } else {
                self.generation_calls.lock().await.push(messages.to_vec());
                self.generate
                    .lock()
                    .await
                    .pop_front()
                    .expect("unexpected generation call")
            }
        }
    }

    fn tool_call_message(calls: &[(&str, &str, serde_json::Value)]) -> ChatMessage {
        ChatMessage {
            role: Role::Assistant,
            content: None,
            tool_calls: Some(
                calls
                    .iter()
                    .map(|(id, name, args)| ToolCall {
                        id: id.to_string(),
                        call_type: "function".to_string(),
                        function: FunctionCall {
                            name: name.to_string(),
                            arguments: args.to_string(),
                        },
                    })
                    .collect(),
            ),
            tool_call_id: None,
        }
    }

    /// Deterministic tool for loop tests, no network.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input back."
        }

        fn parameters_schema(&self) -> serde_json::Value {
            json!({ "type": "object", "properties": { "text": { "type": "string" } } })
        }

        async fn execute(
            &self,
            args: serde_json::Value,
            _ctx: &ToolContext,
        ) -> anyhow::Result<String> {
            Ok(format!("echo: {}", args["text"].as_str().unwrap_or("")))
        }
    }

    struct Fixture {
        agent: Agent,
        llm: Arc<ScriptedLlm>,
        threads: Arc<InMemoryThreadStore>,
        itineraries: Arc<InMemoryItineraryStore>,
    }

    fn fixture_with_config(config: Config) -> Fixture {
        let llm = Arc::new(ScriptedLlm::default());
        let threads = Arc::new(InMemoryThreadStore::new());
        let itineraries = Arc::new(InMemoryItineraryStore::new());
        let tools = ToolRegistry::with_tools(vec![
            Box::new(EchoTool),
            Box::new(crate::tools::SaveItinerary::new(itineraries.clone())),
        ]);
        let agent = Agent::with_registry(config, llm.clone(), threads.clone(), tools);
        Fixture {
            agent,
            llm,
            threads,
            itineraries,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_config(test_config())
    }

    fn hue_days() -> serde_json::Value {
        json!([
            {
                "morning": { "description": "Tham quan Đại Nội", "cost": 200000.0 },
                "afternoon": { "description": "Chùa Thiên Mụ", "cost": 0.0 },
                "evening": { "description": "Ca Huế trên sông Hương", "cost": 150000.0 }
            },
            {
                "morning": { "description": "Lăng Tự Đức", "cost": 150000.0 },
                "afternoon": { "description": "Đồi Vọng Cảnh", "cost": 0.0 },
                "evening": { "description": "Chợ Đông Ba", "cost": 100000.0 }
            },
            {
                "morning": { "description": "Biển Thuận An", "cost": 0.0 },
                "afternoon": { "description": "Mua đặc sản", "cost": 300000.0 },
                "evening": { "description": "Về lại khách sạn", "cost": 0.0 }
            }
        ])
    }

    #[tokio::test]
    async fn greeting_turn_creates_thread_and_replies() {
        let fx = fixture();
        fx.llm
            .push_classify(Ok(ChatMessage::assistant("greeting")))
            .await;
        fx.llm
            .push_generate(Ok(ChatMessage::assistant(
                "Chào bạn! Mình có thể giúp gì cho chuyến đi của bạn?",
            )))
            .await;

        let outcome = fx
            .agent
            .run_turn("user-1", None, "xin chào")
            .await
            .expect("turn");

        assert_eq!(outcome.intent, Intent::Greeting);
        assert!(outcome.reply.starts_with("Chào bạn"));

        let thread = fx
            .threads
            .get(outcome.thread_id, "user-1")
            .await
            .expect("thread");
        let roles: Vec<Role> = thread.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn turns_without_thread_id_create_distinct_threads() {
        let fx = fixture();
        for _ in 0..2 {
            fx.llm
                .push_classify(Ok(ChatMessage::assistant("greeting")))
                .await;
            fx.llm
                .push_generate(Ok(ChatMessage::assistant("Chào bạn!")))
                .await;
        }

        let a = fx
            .agent
            .run_turn("user-1", None, "chào")
            .await
            .expect("turn");
        let b = fx
            .agent
            .run_turn("user-1", None, "chào")
            .await
            .expect("turn");
        assert_ne!(a.thread_id, b.thread_id);
    }

    #[tokio::test]
    async fn classifier_failure_falls_back_to_general() {
        let fx = fixture();
        fx.llm.push_classify(Err(upstream_down())).await;
        fx.llm
            .push_generate(Ok(ChatMessage::assistant("Mình vẫn ở đây, bạn cần gì?")))
            .await;

        let outcome = fx
            .agent
            .run_turn("user-1", None, "kể tôi nghe về Đà Lạt")
            .await
            .expect("turn proceeds despite classifier failure");

        assert_eq!(outcome.intent, Intent::General);

        // The general template drove generation.
        let calls = fx.llm.generation_calls.lock().await;
        let system = calls[0][0].content.as_deref().unwrap_or("");
        assert!(system.contains("không liên quan đến du lịch"));
    }

    #[tokio::test]
    async fn vague_followup_retains_previous_intent() {
        let fx = fixture();

        fx.llm
            .push_classify(Ok(ChatMessage::assistant("destination")))
            .await;
        fx.llm
            .push_generate(Ok(ChatMessage::assistant("Bạn nên ghé Hội An.")))
            .await;
        let first = fx
            .agent
            .run_turn("user-1", None, "nên đi đâu ở miền Trung?")
            .await
            .expect("turn");
        assert_eq!(first.intent, Intent::Destination);

        fx.llm
            .push_classify(Ok(ChatMessage::assistant("vague")))
            .await;
        fx.llm
            .push_generate(Ok(ChatMessage::assistant("Ngoài Hội An còn có Huế.")))
            .await;
        let second = fx
            .agent
            .run_turn("user-1", Some(first.thread_id), "tiếp tục")
            .await
            .expect("turn");

        assert_eq!(second.intent, Intent::Destination);
    }

    #[tokio::test]
    async fn tool_calls_get_paired_results_in_request_order() {
        let fx = fixture();
        fx.llm
            .push_classify(Ok(ChatMessage::assistant("save_itinerary")))
            .await;
        fx.llm
            .push_generate(Ok(tool_call_message(&[
                ("call-1", "echo", json!({ "text": "một" })),
                ("call-2", "echo", json!({ "text": "hai" })),
            ])))
            .await;
        fx.llm
            .push_generate(Ok(ChatMessage::assistant("Xong rồi nhé.")))
            .await;

        let outcome = fx
            .agent
            .run_turn("user-1", None, "làm cả hai việc giúp tôi")
            .await
            .expect("turn");

        // Both results were visible, in order, before the second generation.
        let calls = fx.llm.generation_calls.lock().await;
        assert_eq!(calls.len(), 2);
        let seen = &calls[1];
        let n = seen.len();
        assert!(seen[n - 3].has_tool_calls());
        assert_eq!(seen[n - 2].tool_call_id.as_deref(), Some("call-1"));
        assert_eq!(seen[n - 2].content.as_deref(), Some("echo: một"));
        assert_eq!(seen[n - 1].tool_call_id.as_deref(), Some("call-2"));
        assert_eq!(seen[n - 1].content.as_deref(), Some("echo: hai"));

        // Thread history mirrors the same pairing.
        let thread = fx
            .threads
            .get(outcome.thread_id, "user-1")
            .await
            .expect("thread");
        let roles: Vec<Role> = thread.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::User,
                Role::Assistant,
                Role::Tool,
                Role::Tool,
                Role::Assistant
            ]
        );
    }

    #[tokio::test]
    async fn itinerary_generation_never_saves_without_explicit_request() {
        let fx = fixture();
        fx.llm
            .push_classify(Ok(ChatMessage::assistant("generate_itinerary")))
            .await;
        fx.llm
            .push_generate(Ok(ChatMessage::assistant(
                "Ngày 1: Đại Nội... Ngày 2: Lăng Tự Đức... Ngày 3: Biển Thuận An...",
            )))
            .await;

        let outcome = fx
            .agent
            .run_turn("user-1", None, "Tạo giúp tôi lịch trình 3 ngày ở Huế")
            .await
            .expect("turn");

        assert_eq!(outcome.intent, Intent::GenerateItinerary);
        assert!(fx.itineraries.all().await.is_empty());
    }

    #[tokio::test]
    async fn explicit_save_invokes_tool_and_confirms_with_template() {
        let fx = fixture();

        fx.llm
            .push_classify(Ok(ChatMessage::assistant("generate_itinerary")))
            .await;
        fx.llm
            .push_generate(Ok(ChatMessage::assistant("Ngày 1: Đại Nội...")))
            .await;
        let first = fx
            .agent
            .run_turn("user-1", None, "Tạo giúp tôi lịch trình 3 ngày ở Huế")
            .await
            .expect("turn");

        fx.llm
            .push_classify(Ok(ChatMessage::assistant("save_itinerary")))
            .await;
        fx.llm
            .push_generate(Ok(tool_call_message(&[(
                "call-1",
                "save_itinerary",
                json!({
                    "destination": "Huế",
                    "duration": "3 ngày",
                    "days": hue_days()
                }),
            )])))
            .await;
        fx.llm
            .push_generate(Ok(ChatMessage::assistant(
                "Lịch trình cho Huế đã được thêm thành công.",
            )))
            .await;

        let second = fx
            .agent
            .run_turn("user-1", Some(first.thread_id), "Lưu lại lịch trình này giúp tôi")
            .await
            .expect("turn");

        assert_eq!(second.intent, Intent::SaveItinerary);
        assert_eq!(second.reply, "Lịch trình cho Huế đã được thêm thành công.");

        let saved = fx.itineraries.all().await;
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].destination, "Huế");
        assert_eq!(saved[0].user_id, "user-1");
        assert_eq!(saved[0].days.len(), 3);

        // The tool result carries the literal confirmation.
        let thread = fx
            .threads
            .get(second.thread_id, "user-1")
            .await
            .expect("thread");
        let tool_result = thread
            .messages
            .iter()
            .find(|m| m.tool_call_id.as_deref() == Some("call-1"))
            .expect("tool result present");
        assert_eq!(
            tool_result.content.as_deref(),
            Some("Lịch trình cho Huế đã được thêm thành công.")
        );
    }

    #[tokio::test]
    async fn failing_tool_surfaces_as_failure_result_not_abort() {
        let fx = fixture();
        fx.llm
            .push_classify(Ok(ChatMessage::assistant("save_itinerary")))
            .await;
        // Payload missing required fields: the save tool refuses it.
        fx.llm
            .push_generate(Ok(tool_call_message(&[(
                "call-1",
                "save_itinerary",
                json!({ "destination": "Huế" }),
            )])))
            .await;
        fx.llm
            .push_generate(Ok(ChatMessage::assistant(
                "Mình chưa lưu được, bạn bổ sung lịch trình chi tiết nhé.",
            )))
            .await;

        let outcome = fx
            .agent
            .run_turn("user-1", None, "lưu đi")
            .await
            .expect("turn completes despite tool failure");

        let thread = fx
            .threads
            .get(outcome.thread_id, "user-1")
            .await
            .expect("thread");
        let tool_result = thread
            .messages
            .iter()
            .find(|m| m.tool_call_id.as_deref() == Some("call-1"))
            .expect("tool result present");
        assert!(tool_result
            .content
            .as_deref()
            .unwrap_or("")
            .starts_with("Error:"));
        assert!(fx.itineraries.all().await.is_empty());
    }

    #[tokio::test]
    async fn generation_failure_leaves_history_consistent() {
        let fx = fixture();
        fx.llm
            .push_classify(Ok(ChatMessage::assistant("general")))
            .await;
        fx.llm.push_generate(Err(upstream_down())).await;

        // Capture the thread id via the store: the only thread there.
        let err = fx
            .agent
            .run_turn("user-1", None, "Đà Nẵng có gì vui?")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Generation(_)));

        let summaries = fx.threads.list("user-1").await.expect("list");
        assert_eq!(summaries.len(), 1);
        let thread = fx
            .threads
            .get(summaries[0].id, "user-1")
            .await
            .expect("thread");
        assert_eq!(thread.messages.len(), 1);
        assert_eq!(thread.messages[0].role, Role::User);
    }

    #[tokio::test]
    async fn tool_round_limit_is_enforced() {
        let mut config = test_config();
        config.max_tool_rounds = 2;
        let fx = fixture_with_config(config);

        fx.llm
            .push_classify(Ok(ChatMessage::assistant("search")))
            .await;
        for i in 0..2 {
            let id = format!("call-{}", i);
            fx.llm
                .push_generate(Ok(tool_call_message(&[(
                    id.as_str(),
                    "echo",
                    json!({ "text": "lặp" }),
                )])))
                .await;
        }

        let err = fx
            .agent
            .run_turn("user-1", None, "tìm mãi không xong")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Generation(_)));

        // Every tool call in history has its paired result.
        let summaries = fx.threads.list("user-1").await.expect("list");
        let thread = fx
            .threads
            .get(summaries[0].id, "user-1")
            .await
            .expect("thread");
        let calls: usize = thread
            .messages
            .iter()
            .filter_map(|m| m.tool_calls.as_ref().map(|c| c.len()))
            .sum();
        let results = thread
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .count();
        assert_eq!(calls, 2);
        assert_eq!(results, 2);
        assert_eq!(thread.messages.last().map(|m| m.role), Some(Role::Tool));
    }

    #[tokio::test]
    async fn unknown_thread_is_not_found() {
        let fx = fixture();
        let err = fx
            .agent
            .run_turn("user-1", Some(Uuid::new_v4()), "chào")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ThreadNotFound(_)));
    }

    #[tokio::test]
    async fn foreign_thread_reads_as_not_found() {
        let fx = fixture();
        let thread = fx.threads.create("user-a").await.expect("create");

        let err = fx
            .agent
            .run_turn("user-b", Some(thread.id), "chào")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ThreadNotFound(id) if id == thread.id));
    }

    #[tokio::test]
    async fn delete_thread_removes_state() {
        let fx = fixture();
        fx.llm
            .push_classify(Ok(ChatMessage::assistant("greeting")))
            .await;
        fx.llm
            .push_generate(Ok(ChatMessage::assistant("Chào bạn!")))
            .await;
        let outcome = fx
            .agent
            .run_turn("user-1", None, "chào")
            .await
            .expect("turn");

        assert!(fx
            .agent
            .delete_thread("user-1", outcome.thread_id)
            .await
            .expect("delete"));
        assert!(fx.threads.get(outcome.thread_id, "user-1").await.is_err());
        // Deleting again is a clean no-op.
        assert!(!fx
            .agent
            .delete_thread("user-1", outcome.thread_id)
            .await
            .expect("delete"));
    }
}
