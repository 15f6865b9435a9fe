//! The agent orchestrator. One call per user turn: discover which tools the
//! user's credentials unlock, prompt the model, normalize and canonicalize
//! its output, persist the proposed actions, and reply. Stateless between
//! turns; everything durable lives behind the `Store` seam.

use std::sync::Arc;

use serde_json::{Value, json};
use thiserror::Error;

use attache_core::actions::{ActionDraft, ActionStatus, PendingAction};
use attache_core::normalize::normalize_reply;

use crate::executors::ExecutorSet;
use crate::llm::{LanguageModel, LlmError};
use crate::store::{Store, StoreError};

/// Reply used when a model or store failure aborts the turn.
pub const INTERNAL_ERROR_REPLY: &str =
    "I encountered an internal error while thinking. Please try again.";

/// Tools the service knows how to execute. A tool is only advertised to the
/// model when the user holds a credential for its provider.
struct ToolSpec {
    tool: &'static str,
    provider: &'static str,
    blurb: &'static str,
}

const KNOWN_TOOLS: &[ToolSpec] = &[
    ToolSpec {
        tool: "create_asana_task",
        provider: "asana",
        blurb: "Create a task. Params: name, notes",
    },
    ToolSpec {
        tool: "send_gmail",
        provider: "google",
        blurb: "Send email. Params: to, subject, body",
    },
];

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Action not found")]
    NotFound,

    #[error("No {provider} token found")]
    MissingCredential { provider: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Result of one chat turn: the conversational reply plus the persisted
/// action plan, each entry annotated with its row id.
#[derive(Debug)]
pub struct AgentTurnResult {
    pub message: String,
    pub plan: Vec<ActionDraft>,
}

/// Outcome of an approval: the status that was written plus the provider's
/// response body (absent when no executor matched).
#[derive(Debug)]
pub struct ApprovalOutcome {
    pub status: ActionStatus,
    pub result: Option<Value>,
}

impl ApprovalOutcome {
    pub fn executed(&self) -> bool {
        self.status == ActionStatus::Executed
    }
}

pub struct AgentBrain {
    store: Arc<dyn Store>,
    llm: Arc<dyn LanguageModel>,
    executors: Arc<ExecutorSet>,
}

impl AgentBrain {
    pub fn new(
        store: Arc<dyn Store>,
        llm: Arc<dyn LanguageModel>,
        executors: Arc<ExecutorSet>,
    ) -> Self {
        Self {
            store,
            llm,
            executors,
        }
    }

    /// Process one user message. Never fails: model-output malformation is
    /// absorbed by the normalizer, and any model/store failure collapses the
    /// turn into a fixed apologetic reply with an empty plan. No retries.
    pub async fn respond(&self, user_id: i64, message: &str) -> AgentTurnResult {
        match self.try_respond(user_id, message).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::error!(%err, user_id, "agent turn failed");
                AgentTurnResult {
                    message: INTERNAL_ERROR_REPLY.to_string(),
                    plan: Vec::new(),
                }
            }
        }
    }

    async fn try_respond(&self, user_id: i64, message: &str) -> Result<AgentTurnResult, AgentError> {
        // ToolDiscovery: a provider without a stored credential is not offered.
        let mut available: Vec<&ToolSpec> = Vec::new();
        for spec in KNOWN_TOOLS {
            if self.store.user_token(user_id, spec.provider).await?.is_some() {
                available.push(spec);
            }
        }
        tracing::debug!(user_id, tools = available.len(), "discovered tools");

        // Chat log is a write-only sink; losing an entry never fails the turn.
        if let Err(err) = self.store.log_chat(user_id, "user", message).await {
            tracing::warn!(%err, user_id, "failed to record user chat log");
        }

        let prompt = build_prompt(message, &available);
        let raw = self.llm.complete_json(&prompt).await?;
        let normalized = normalize_reply(&raw);

        let mut plan = Vec::new();
        for raw_action in &normalized.actions {
            let Some(draft) = ActionDraft::from_raw(raw_action) else {
                tracing::warn!(user_id, %raw_action, "dropping non-object action from model output");
                continue;
            };
            let mut draft = draft.canonicalize();
            let payload = json!({
                "tool": draft.tool,
                "provider": draft.provider,
                "parameters": draft.parameters,
            });
            match self
                .store
                .create_pending_action(user_id, &draft.provider, draft.action_type(), &payload)
                .await
            {
                Ok(id) => {
                    draft.id = Some(id);
                    plan.push(draft);
                }
                // Dropped from the plan, not fatal to the turn.
                Err(err) => {
                    tracing::error!(%err, user_id, tool = %draft.tool, "failed to persist pending action");
                }
            }
        }

        if let Err(err) = self
            .store
            .log_chat(user_id, "assistant", &normalized.message)
            .await
        {
            tracing::warn!(%err, user_id, "failed to record assistant chat log");
        }

        Ok(AgentTurnResult {
            message: normalized.message,
            plan,
        })
    }

    pub async fn pending(&self, user_id: i64) -> Result<Vec<PendingAction>, AgentError> {
        Ok(self.store.pending_actions(user_id).await?)
    }

    /// Approve and execute one pending action. Lookup and credential failures
    /// leave the row untouched; once dispatch is attempted the status is
    /// written unconditionally: executed only when a result was produced and
    /// carries no error indicator. No in-flight state, no automatic retry.
    pub async fn approve(&self, action_id: i64) -> Result<ApprovalOutcome, AgentError> {
        let action = self
            .store
            .pending_action(action_id)
            .await?
            .ok_or(AgentError::NotFound)?;

        let token = self
            .store
            .user_token(action.user_id, &action.provider)
            .await?
            .ok_or_else(|| AgentError::MissingCredential {
                provider: action.provider.clone(),
            })?;

        let tool = action
            .draft_payload
            .get("tool")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let parameters = action
            .draft_payload
            .get("parameters")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let result = match self.executors.get(&action.provider, tool) {
            Some(executor) => Some(
                match executor.execute(&token.access_token, &parameters).await {
                    Ok(value) => value,
                    Err(err) => {
                        tracing::error!(%err, action_id, "action execution failed");
                        json!({ "error": err.to_string() })
                    }
                },
            ),
            None => {
                tracing::warn!(
                    action_id,
                    provider = %action.provider,
                    tool,
                    "no executor for provider/tool pair"
                );
                None
            }
        };

        let status = match &result {
            Some(value) if !carries_error(value) => ActionStatus::Executed,
            _ => ActionStatus::Rejected,
        };
        self.store.update_action_status(action_id, status).await?;

        Ok(ApprovalOutcome { status, result })
    }
}

/// An executor result that reports its own failure inline.
fn carries_error(result: &Value) -> bool {
    result.get("error").is_some()
}

/// Instruction block for one turn: the literal user message, the gated tool
/// list, and the strict output schema. Aliases are explicitly forbidden;
/// the mapper still canonicalizes whatever comes back.
fn build_prompt(user_message: &str, tools: &[&ToolSpec]) -> String {
    let tools_block = if tools.is_empty() {
        "No tools connected.".to_string()
    } else {
        tools
            .iter()
            .map(|t| format!("- {} (provider: '{}'): {}", t.tool, t.provider, t.blurb))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"You are Attache, an intelligent AI assistant for enterprise work.

USER SAYS: "{user_message}"

AVAILABLE TOOLS:
{tools_block}

INSTRUCTIONS:
1. If the user is just chatting (e.g., "Hi", "How are you", "Thanks"), reply naturally in the "message" field and keep "actions" empty.
2. If the user wants a task done (email, task), GENERATE the JSON object in "actions".
3. If you generate actions, set "message" to something like "I have prepared the actions for you."
4. ALWAYS return valid JSON.

RESPONSE FORMAT:
{{
    "message": "Your conversational reply here",
    "actions": [
        {{
            "tool": "tool_name",
            "provider": "google OR asana",
            "parameters": {{ "key": "value" }}
        }}
    ]
}}

Note: 'provider' must be exactly 'google' or 'asana'. Do not use 'gmail'.

Generate JSON response now:"#
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::Map;

    use attache_core::tokens::UserToken;

    use crate::executors::ActionExecutor;

    use super::*;

    #[derive(Default)]
    struct MemoryStore {
        tokens: Mutex<Vec<UserToken>>,
        actions: Mutex<Vec<PendingAction>>,
        chat: Mutex<Vec<(i64, String, String)>>,
        next_id: AtomicI64,
        /// When set, creates for this action_type fail (persistence-failure tests).
        fail_action_type: Mutex<Option<String>>,
    }

    impl MemoryStore {
        fn with_token(self, user_id: i64, provider: &str) -> Self {
            self.tokens.lock().unwrap().push(UserToken {
                user_id,
                provider: provider.to_string(),
                access_token: format!("{provider}-token"),
                refresh_token: None,
                expires_at: None,
            });
            self
        }

        fn with_pending(self, user_id: i64, provider: &str, tool: &str) -> Self {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            self.actions.lock().unwrap().push(PendingAction {
                id,
                user_id,
                provider: provider.to_string(),
                action_type: tool.to_string(),
                draft_payload: json!({
                    "tool": tool,
                    "provider": provider,
                    "parameters": {"name": "n"},
                }),
                status: ActionStatus::Pending,
                created_at: Utc::now(),
                executed_at: None,
            });
            self
        }

        fn status_of(&self, action_id: i64) -> Option<ActionStatus> {
            self.actions
                .lock()
                .unwrap()
                .iter()
                .find(|a| a.id == action_id)
                .map(|a| a.status)
        }
    }

    #[async_trait]
    impl Store for MemoryStore {
        async fn user_token(
            &self,
            user_id: i64,
            provider: &str,
        ) -> Result<Option<UserToken>, StoreError> {
            Ok(self
                .tokens
                .lock()
                .unwrap()
                .iter()
                .find(|t| t.user_id == user_id && t.provider == provider)
                .cloned())
        }

        async fn create_pending_action(
            &self,
            user_id: i64,
            provider: &str,
            action_type: &str,
            draft_payload: &Value,
        ) -> Result<i64, StoreError> {
            if self.fail_action_type.lock().unwrap().as_deref() == Some(action_type) {
                return Err(StoreError::Unavailable("insert failed".to_string()));
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            self.actions.lock().unwrap().push(PendingAction {
                id,
                user_id,
                provider: provider.to_string(),
                action_type: action_type.to_string(),
                draft_payload: draft_payload.clone(),
                status: ActionStatus::Pending,
                created_at: Utc::now(),
                executed_at: None,
            });
            Ok(id)
        }

        async fn pending_actions(&self, user_id: i64) -> Result<Vec<PendingAction>, StoreError> {
            let mut actions: Vec<PendingAction> = self
                .actions
                .lock()
                .unwrap()
                .iter()
                .filter(|a| a.user_id == user_id && a.status == ActionStatus::Pending)
                .cloned()
                .collect();
            actions.reverse();
            Ok(actions)
        }

        async fn pending_action(
            &self,
            action_id: i64,
        ) -> Result<Option<PendingAction>, StoreError> {
            Ok(self
                .actions
                .lock()
                .unwrap()
                .iter()
                .find(|a| a.id == action_id && a.status == ActionStatus::Pending)
                .cloned())
        }

        async fn update_action_status(
            &self,
            action_id: i64,
            status: ActionStatus,
        ) -> Result<(), StoreError> {
            let mut actions = self.actions.lock().unwrap();
            if let Some(action) = actions.iter_mut().find(|a| a.id == action_id) {
                action.status = status;
                if status == ActionStatus::Executed {
                    action.executed_at = Some(Utc::now());
                }
            }
            Ok(())
        }

        async fn log_chat(
            &self,
            user_id: i64,
            role: &str,
            content: &str,
        ) -> Result<(), StoreError> {
            self.chat
                .lock()
                .unwrap()
                .push((user_id, role.to_string(), content.to_string()));
            Ok(())
        }

        async fn ping(&self) -> bool {
            true
        }
    }

    /// Either replays a canned completion (recording the prompt) or fails.
    struct StubModel {
        reply: Option<String>,
        last_prompt: Mutex<Option<String>>,
    }

    impl StubModel {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                last_prompt: Mutex::new(None),
            }
        }

        fn failing() -> Self {
            Self {
                reply: None,
                last_prompt: Mutex::new(None),
            }
        }

        fn prompt(&self) -> String {
            self.last_prompt.lock().unwrap().clone().unwrap_or_default()
        }
    }

    #[async_trait]
    impl LanguageModel for StubModel {
        async fn complete_json(&self, prompt: &str) -> Result<String, LlmError> {
            *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
            match &self.reply {
                Some(reply) => Ok(reply.clone()),
                None => Err(LlmError::Http("connection refused".to_string())),
            }
        }
    }

    struct StubExecutor {
        calls: AtomicUsize,
        result: Result<Value, ()>,
    }

    impl StubExecutor {
        fn returning(result: Value) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                result: Ok(result),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                result: Err(()),
            })
        }
    }

    #[async_trait]
    impl ActionExecutor for StubExecutor {
        async fn execute(
            &self,
            _access_token: &str,
            _parameters: &Map<String, Value>,
        ) -> Result<Value, crate::executors::ExecutorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Ok(value) => Ok(value.clone()),
                Err(()) => Err(crate::executors::ExecutorError::Http(
                    "connection reset".to_string(),
                )),
            }
        }
    }

    fn brain_with(
        store: MemoryStore,
        model: StubModel,
        executors: ExecutorSet,
    ) -> (AgentBrain, Arc<MemoryStore>, Arc<StubModel>) {
        let store = Arc::new(store);
        let model = Arc::new(model);
        let brain = AgentBrain::new(store.clone(), model.clone(), Arc::new(executors));
        (brain, store, model)
    }

    #[tokio::test]
    async fn greeting_with_no_tools_yields_empty_plan() {
        let (brain, _store, model) = brain_with(
            MemoryStore::default(),
            StubModel::replying(r#"{"message":"Hello! How can I help?","actions":[]}"#),
            ExecutorSet::new(),
        );

        let reply = brain.respond(1, "Hi").await;
        assert_eq!(reply.message, "Hello! How can I help?");
        assert!(reply.plan.is_empty());
        assert!(model.prompt().contains("No tools connected."));
        assert!(model.prompt().contains(r#"USER SAYS: "Hi""#));
    }

    #[tokio::test]
    async fn connected_providers_gate_the_advertised_tools() {
        let (brain, _store, model) = brain_with(
            MemoryStore::default().with_token(1, "asana"),
            StubModel::replying(r#"{"message":"ok","actions":[]}"#),
            ExecutorSet::new(),
        );

        brain.respond(1, "what can you do?").await;
        let prompt = model.prompt();
        assert!(prompt.contains("create_asana_task"));
        assert!(!prompt.contains("send_gmail"));
    }

    #[tokio::test]
    async fn proposed_actions_are_canonicalized_and_persisted() {
        let (brain, store, _model) = brain_with(
            MemoryStore::default().with_token(7, "google"),
            StubModel::replying(
                r#"{"message":"ok","actions":[{"tool":"send_gmail","provider":"gmail","parameters":{"to":"a@b.com","subject":"s","body":"b"}}]}"#,
            ),
            ExecutorSet::new(),
        );

        let reply = brain.respond(7, "email bob").await;
        assert_eq!(reply.plan.len(), 1);
        assert_eq!(reply.plan[0].id, Some(1));
        assert_eq!(reply.plan[0].provider, "google");

        let actions = store.actions.lock().unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].provider, "google");
        assert_eq!(actions[0].action_type, "send_email");
        assert_eq!(actions[0].status, ActionStatus::Pending);
        assert_eq!(actions[0].draft_payload["provider"], json!("google"));
        assert_eq!(
            actions[0].draft_payload["parameters"]["to"],
            json!("a@b.com")
        );
    }

    #[tokio::test]
    async fn turn_records_user_and_assistant_chat_entries() {
        let (brain, store, _model) = brain_with(
            MemoryStore::default(),
            StubModel::replying(r#"{"message":"Hello!","actions":[]}"#),
            ExecutorSet::new(),
        );

        brain.respond(3, "Hi").await;
        let chat = store.chat.lock().unwrap();
        assert_eq!(chat.len(), 2);
        assert_eq!(chat[0], (3, "user".to_string(), "Hi".to_string()));
        assert_eq!(chat[1], (3, "assistant".to_string(), "Hello!".to_string()));
    }

    #[tokio::test]
    async fn model_failure_collapses_to_fallback_reply() {
        let (brain, store, _model) = brain_with(
            MemoryStore::default(),
            StubModel::failing(),
            ExecutorSet::new(),
        );

        let reply = brain.respond(1, "Hi").await;
        assert_eq!(reply.message, INTERNAL_ERROR_REPLY);
        assert!(reply.plan.is_empty());
        assert!(store.actions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unparseable_model_output_is_absorbed_not_errored() {
        let (brain, _store, _model) = brain_with(
            MemoryStore::default(),
            StubModel::replying("definitely not json"),
            ExecutorSet::new(),
        );

        let reply = brain.respond(1, "Hi").await;
        assert_eq!(reply.message, "I couldn't understand the AI output.");
        assert!(reply.plan.is_empty());
    }

    #[tokio::test]
    async fn persistence_failure_drops_only_that_action() {
        let store = MemoryStore::default().with_token(2, "google").with_token(2, "asana");
        *store.fail_action_type.lock().unwrap() = Some("create_task".to_string());

        let (brain, store, _model) = brain_with(
            store,
            StubModel::replying(
                r#"{"message":"ok","actions":[
                    {"tool":"create_asana_task","provider":"asana","parameters":{"name":"n"}},
                    {"tool":"send_gmail","provider":"gmail","parameters":{"to":"a@b.com"}}
                ]}"#,
            ),
            ExecutorSet::new(),
        );

        let reply = brain.respond(2, "do both").await;
        assert_eq!(reply.plan.len(), 1);
        assert_eq!(reply.plan[0].tool, "send_gmail");
        assert_eq!(store.actions.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn non_object_actions_are_dropped() {
        let (brain, store, _model) = brain_with(
            MemoryStore::default(),
            StubModel::replying(
                r#"{"message":"ok","actions":["send_gmail",{"tool":"send_gmail","provider":"google","parameters":{}}]}"#,
            ),
            ExecutorSet::new(),
        );

        let reply = brain.respond(1, "email").await;
        assert_eq!(reply.plan.len(), 1);
        assert_eq!(store.actions.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn approving_unknown_action_is_not_found() {
        let store = MemoryStore::default().with_pending(1, "asana", "create_asana_task");
        let (brain, store, _model) = brain_with(
            store,
            StubModel::replying("{}"),
            ExecutorSet::new(),
        );

        let err = brain.approve(99).await.unwrap_err();
        assert!(matches!(err, AgentError::NotFound));
        // No mutation on the action that does exist.
        assert_eq!(store.status_of(1), Some(ActionStatus::Pending));
    }

    #[tokio::test]
    async fn approving_without_credential_fails_and_leaves_status() {
        let store = MemoryStore::default().with_pending(1, "asana", "create_asana_task");
        let (brain, store, _model) =
            brain_with(store, StubModel::replying("{}"), ExecutorSet::new());

        let err = brain.approve(1).await.unwrap_err();
        match err {
            AgentError::MissingCredential { provider } => assert_eq!(provider, "asana"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.status_of(1), Some(ActionStatus::Pending));
    }

    #[tokio::test]
    async fn approval_executes_once_and_transitions_to_executed() {
        let executor = StubExecutor::returning(json!({"data": {"gid": "123"}}));
        let mut executors = ExecutorSet::new();
        executors.register("asana", "create_asana_task", executor.clone());

        let store = MemoryStore::default()
            .with_token(1, "asana")
            .with_pending(1, "asana", "create_asana_task");
        let (brain, store, _model) = brain_with(store, StubModel::replying("{}"), executors);

        let outcome = brain.approve(1).await.unwrap();
        assert!(outcome.executed());
        assert_eq!(outcome.result, Some(json!({"data": {"gid": "123"}})));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.status_of(1), Some(ActionStatus::Executed));

        // The row left the pending set; a second approval reads as unknown.
        assert!(matches!(
            brain.approve(1).await.unwrap_err(),
            AgentError::NotFound
        ));
    }

    #[tokio::test]
    async fn error_keyed_result_rejects_the_action() {
        let executor = StubExecutor::returning(json!({"error": "workspace missing"}));
        let mut executors = ExecutorSet::new();
        executors.register("asana", "create_asana_task", executor.clone());

        let store = MemoryStore::default()
            .with_token(1, "asana")
            .with_pending(1, "asana", "create_asana_task");
        let (brain, store, _model) = brain_with(store, StubModel::replying("{}"), executors);

        let outcome = brain.approve(1).await.unwrap();
        assert!(!outcome.executed());
        assert_eq!(store.status_of(1), Some(ActionStatus::Rejected));
    }

    #[tokio::test]
    async fn executor_transport_failure_rejects_the_action() {
        let executor = StubExecutor::failing();
        let mut executors = ExecutorSet::new();
        executors.register("asana", "create_asana_task", executor.clone());

        let store = MemoryStore::default()
            .with_token(1, "asana")
            .with_pending(1, "asana", "create_asana_task");
        let (brain, store, _model) = brain_with(store, StubModel::replying("{}"), executors);

        let outcome = brain.approve(1).await.unwrap();
        assert!(!outcome.executed());
        assert!(carries_error(outcome.result.as_ref().unwrap()));
        assert_eq!(store.status_of(1), Some(ActionStatus::Rejected));
    }

    #[tokio::test]
    async fn unrecognized_pair_still_writes_rejected() {
        let store = MemoryStore::default()
            .with_token(1, "asana")
            .with_pending(1, "asana", "frobnicate");
        let (brain, store, _model) =
            brain_with(store, StubModel::replying("{}"), ExecutorSet::new());

        let outcome = brain.approve(1).await.unwrap();
        assert!(!outcome.executed());
        assert_eq!(outcome.result, None);
        assert_eq!(store.status_of(1), Some(ActionStatus::Rejected));
    }

    #[test]
    fn prompt_carries_schema_and_alias_ban() {
        let prompt = build_prompt("send it", &[]);
        assert!(prompt.contains(r#""actions""#));
        assert!(prompt.contains("'provider' must be exactly 'google' or 'asana'"));
        assert!(prompt.contains("Do not use 'gmail'"));
    }
}
