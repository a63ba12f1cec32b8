use crate::agent::{ContextBuilder, ConversationState, CostEstimate, CostTracker, RetryPolicy, ToolRegistry, UsageTally};
use crate::error::{AgentError, ValidationError};
use crate::tools::ToolExecutor;
use crate::traits::{ChatMessage, ChatRequest, ChatResponse, Provider, ToolCall, ToolResult};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

pub const DEFAULT_MAX_ITERATIONS: usize = 10;

const EMPTY_ANSWER: &str = "I've analyzed the data but couldn't formulate a final answer.";

#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub answer: String,
    pub usage: UsageTally,
    pub estimated_cost: CostEstimate,
    /// Tool-calling rounds this query needed.
    pub iterations: usize,
}

pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    context_builder: ContextBuilder,
    tool_registry: Arc<ToolRegistry>,
    executor: ToolExecutor,
    max_iterations: usize,
    retry_policy: RetryPolicy,
    cost_tracker: CostTracker,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        context_builder: ContextBuilder,
        tool_registry: Arc<ToolRegistry>,
        executor: ToolExecutor,
    ) -> Self {
        Self {
            provider,
            context_builder,
            tool_registry,
            executor,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            retry_policy: RetryPolicy::default(),
            cost_tracker: CostTracker::default(),
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_cost_tracker(mut self, tracker: CostTracker) -> Self {
        self.cost_tracker = tracker;
        self
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    pub fn estimate_cost(&self, usage: &UsageTally) -> CostEstimate {
        self.cost_tracker.estimate_cost(usage)
    }

    /// Answer one question in a fresh conversation.
    pub async fn ask(&self, question: &str) -> Result<QueryOutcome, AgentError> {
        let mut conversation = ConversationState::new();
        self.run_query(question, &mut conversation, &CancellationToken::new())
            .await
    }

    /// Answer `question` as the next turn of `conversation`.
    ///
    /// The returned usage is the conversation's running tally, so it covers
    /// earlier questions of the same session too.
    pub async fn run_query(
        &self,
        question: &str,
        conversation: &mut ConversationState,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome, AgentError> {
        let span = info_span!("query", session = %conversation.session_id());
        self.drive(question, conversation, cancel)
            .instrument(span)
            .await
    }

    async fn drive(
        &self,
        question: &str,
        conversation: &mut ConversationState,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome, AgentError> {
        info!(question, "Processing query");
        self.seed(conversation, question).await;

        let mut iterations = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(cancelled(conversation));
            }

            let response = self.call_model(conversation, cancel).await?;
            conversation.record_usage(response.usage.prompt_tokens, response.usage.completion_tokens);
            info!(
                prompt_tokens = response.usage.prompt_tokens,
                completion_tokens = response.usage.completion_tokens,
                tool_calls = response.tool_calls.len(),
                "Model responded"
            );

            if !response.has_tool_calls() {
                let answer = match response.text {
                    Some(text) if !text.trim().is_empty() => text,
                    _ => EMPTY_ANSWER.to_string(),
                };
                conversation.append(ChatMessage::assistant(answer.clone()));

                let usage = conversation.usage();
                return Ok(QueryOutcome {
                    answer,
                    usage,
                    estimated_cost: self.cost_tracker.estimate_cost(&usage),
                    iterations,
                });
            }

            iterations += 1;
            if iterations > self.max_iterations {
                warn!(max_iterations = self.max_iterations, "Tool-calling limit exceeded");
                return Err(AgentError::BoundedIterationExceeded {
                    iterations: self.max_iterations,
                    usage: conversation.usage(),
                });
            }

            conversation.append(ChatMessage::assistant_with_tool_calls(
                response.text.unwrap_or_default(),
                response.tool_calls.clone(),
            ));

            let mut pending = response.tool_calls.into_iter();
            while let Some(call) = pending.next() {
                if cancel.is_cancelled() {
                    close_unanswered(
                        conversation,
                        std::iter::once(call).chain(pending),
                        "Cancelled",
                        "query cancelled",
                    );
                    return Err(cancelled(conversation));
                }

                match self.run_tool_call(&call).await {
                    Ok(result) => {
                        conversation.append(ChatMessage::tool_result(
                            call.id.clone(),
                            result.to_message_content(),
                        ));
                    }
                    Err(e) => {
                        error!(tool = %call.name, error = %e, "Tool call broke the executor contract");
                        close_unanswered(
                            conversation,
                            std::iter::once(call).chain(pending),
                            "InternalError",
                            "internal error",
                        );
                        return Err(e);
                    }
                }
            }
        }
    }

    /// First question of a session opens with the system prompt.
    async fn seed(&self, conversation: &mut ConversationState, question: &str) {
        if conversation.is_empty() {
            let files = match self.executor.source().list_files().await {
                Ok(files) => files,
                Err(e) => {
                    warn!(error = %e, "Could not list data files for the system prompt");
                    vec![]
                }
            };
            conversation.append(self.context_builder.build_system_message(&files));
        }
        conversation.append(ChatMessage::user(question));
    }

    async fn call_model(
        &self,
        conversation: &ConversationState,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, AgentError> {
        let tools = self.tool_registry.list_specs();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let request = ChatRequest {
                messages: conversation.snapshot(),
                tools: if tools.is_empty() { None } else { Some(tools) },
            };
            debug!(attempt, messages = request.messages.len(), "Calling model");

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(cancelled(conversation)),
                outcome = self.provider.chat(request) => outcome,
            };

            let err = match outcome {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            match self.retry_policy.backoff_for(attempt, &err) {
                Some(delay) => {
                    warn!(
                        provider = self.provider.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient model failure, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(cancelled(conversation)),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => {
                    error!(provider = self.provider.name(), attempt, error = %err, "Model call failed");
                    return Err(AgentError::Upstream(err));
                }
            }
        }
    }

    /// Validation failures become failed results so the model can correct
    /// its arguments.
    async fn run_tool_call(&self, call: &ToolCall) -> Result<ToolResult, AgentError> {
        let validated = match self.tool_registry.parse_and_validate(call) {
            Ok(validated) => validated,
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "Rejected tool call");
                let result = ToolResult::error(&call.id, e.kind(), e.to_string());
                return Ok(match e {
                    ValidationError::UnknownTool { .. } => {
                        let names: Vec<&str> = self
                            .tool_registry
                            .list_specs()
                            .iter()
                            .map(|s| s.name.as_str())
                            .collect();
                        result.with_hint("available_tools", json!(names))
                    }
                    _ => result,
                });
            }
        };

        info!(tool = %call.name, call_id = %call.id, arguments = %call.arguments, "Executing tool call");
        self.executor.execute(&call.id, &validated).await
    }
}

fn cancelled(conversation: &ConversationState) -> AgentError {
    info!("Query cancelled");
    AgentError::Cancelled {
        usage: conversation.usage(),
    }
}

/// Give every call that will not run a result, so the history stays valid
/// if the conversation is reused.
fn close_unanswered(
    conversation: &mut ConversationState,
    calls: impl Iterator<Item = ToolCall>,
    kind: &str,
    reason: &str,
) {
    for call in calls {
        let result = ToolResult::error(&call.id, kind, format!("tool call not executed: {}", reason));
        conversation.append(ChatMessage::tool_result(call.id, result.to_message_content()));
    }
}
