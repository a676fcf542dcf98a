//! Turn orchestrator
//!
//! INGEST → EXTRACT → CONTEXT → PROVIDER → TOOLS? → STREAM → PERSIST
//!
//! Every turn runs on its own task and holds the session lock from start to
//! finish, so turns on one session key queue instead of interleaving. The
//! caller receives fragments through a bounded channel; once the caller goes
//! away, the task stops at the next suspension point.

use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::config::StreamingConfig;
use crate::error::OrchestrationError;
use crate::extractor::extract;
use crate::memory::{ContextManager, ConversationSession, SessionStore};
use crate::models::{ConversationTurn, Role, Scenario, TurnEvent, TurnRequest};
use crate::provider::{ChatCompletion, ChatProvider, ChatRequest};
use crate::tools::{ToolDefinition, ToolDispatcher};
use crate::Result;

/// Fragment shown to the caller when the provider fails mid-turn
pub const FALLBACK_MESSAGE: &str =
    "Sorry, I couldn't reach the advisory service just now. Please try again in a moment.";

const CHANNEL_CAPACITY: usize = 32;

/// Fragments of one turn, terminated by `TurnEvent::Done`
pub type TurnStream = ReceiverStream<TurnEvent>;

/// The caller dropped its end of the turn stream
#[derive(Debug)]
struct Disconnected;

type Flow = std::result::Result<(), Disconnected>;

#[derive(Clone)]
pub struct Orchestrator {
    provider: Arc<dyn ChatProvider>,
    sessions: Arc<dyn SessionStore>,
    dispatcher: ToolDispatcher,
    context: ContextManager,
    streaming: StreamingConfig,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        sessions: Arc<dyn SessionStore>,
        dispatcher: ToolDispatcher,
        context: ContextManager,
        streaming: StreamingConfig,
    ) -> Self {
        Self {
            provider,
            sessions,
            dispatcher,
            context,
            streaming,
        }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Start one user turn.
    ///
    /// Fails up front with `InvalidRequest` or `ProviderUnavailable`. Once a
    /// stream is returned, every later failure is reported inside it and the
    /// stream still ends with `TurnEvent::Done`.
    pub async fn handle_turn(&self, request: TurnRequest) -> Result<TurnStream> {
        let session_key = request.session_key.trim().to_string();
        if session_key.is_empty() {
            return Err(OrchestrationError::InvalidRequest(
                "sessionKey must not be empty".to_string(),
            ));
        }

        let scenario: Scenario = request.scenario.parse()?;

        let message = request.message.trim().to_string();
        if message.is_empty() {
            return Err(OrchestrationError::InvalidRequest(
                "message must not be empty".to_string(),
            ));
        }

        if !self.provider.is_configured() {
            return Err(OrchestrationError::ProviderUnavailable(
                "no language model provider is configured".to_string(),
            ));
        }

        let handle = self.sessions.get_or_create(&session_key, scenario).await;
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let orchestrator = self.clone();

        tokio::spawn(async move {
            let mut session = handle.lock_owned().await;
            let started = Instant::now();

            info!(
                session_key = %session_key,
                scenario = %session.scenario(),
                turns = session.turn_count(),
                "Orchestrator: starting turn"
            );

            match orchestrator.run_turn(&mut session, message, &tx).await {
                Ok(()) => info!(
                    session_key = %session_key,
                    turns = session.turn_count(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Turn complete"
                ),
                Err(Disconnected) => warn!(
                    session_key = %session_key,
                    "Caller disconnected, turn abandoned"
                ),
            }
        });

        Ok(ReceiverStream::new(rx))
    }

    async fn run_turn(
        &self,
        session: &mut ConversationSession,
        message: String,
        tx: &mpsc::Sender<TurnEvent>,
    ) -> Flow {
        if tx.is_closed() {
            return Err(Disconnected);
        }

        let scenario = session.scenario();

        // === INGEST / EXTRACT ===
        let found = extract(&message);
        if !found.is_empty() {
            debug!(parameters = %found.describe(), "Extracted advisory parameters");
        }
        session.push(ConversationTurn::user(message));
        session.merge_parameters(found);

        // === PROVIDER (round 1) ===
        let tools = self.dispatcher.definitions(scenario);
        let request = self.build_request(session, tools);
        let first = tokio::select! {
            result = self.provider.complete(request) => result,
            _ = tx.closed() => return Err(Disconnected),
        };

        let mut narrative = String::new();

        match first {
            Ok(completion) if completion.tool_invocations.is_empty() => {
                match completion.content.filter(|text| !text.trim().is_empty()) {
                    Some(text) => {
                        debug!(chars = text.len(), "No tool requested, pacing reply");
                        self.pace(&text, tx).await?;
                        narrative = text;
                    }
                    None => {
                        warn!("Provider returned neither text nor tool calls");
                        self.fail_over(&mut narrative, None, tx).await?;
                    }
                }
            }
            Ok(completion) => {
                // === TOOLS ===
                if tx.is_closed() {
                    return Err(Disconnected);
                }
                let tool_used = self.run_tools(session, completion, scenario);

                // === PROVIDER (round 2, streaming) ===
                if tx.is_closed() {
                    return Err(Disconnected);
                }
                let request = self.build_request(session, Vec::new());
                self.stream_reply(request, &mut narrative, tool_used, tx)
                    .await?;
            }
            Err(error) => {
                warn!(%error, "Provider call failed");
                self.fail_over(&mut narrative, None, tx).await?;
            }
        }

        // === PERSIST ===
        session.push(ConversationTurn::assistant(narrative));
        emit(tx, TurnEvent::Done).await
    }

    /// Append the invocation turn, then one tool turn per invocation in
    /// emission order. Returns the name of the last tool actually dispatched.
    fn run_tools(
        &self,
        session: &mut ConversationSession,
        completion: ChatCompletion,
        scenario: Scenario,
    ) -> Option<String> {
        let invocations = completion.tool_invocations;
        info!(count = invocations.len(), "Provider requested tools");

        session.push(ConversationTurn::assistant_with_invocations(
            completion.content.unwrap_or_default(),
            invocations.clone(),
        ));

        let mut tool_used = None;
        for invocation in &invocations {
            let (result, arguments) = self.dispatcher.dispatch_invocation(invocation, scenario);

            if let Some(arguments) = &arguments {
                session.merge_raw_arguments(arguments);
            }
            if result.is_success() {
                tool_used = Some(invocation.name.clone());
            }

            debug!(
                tool = %invocation.name,
                call_id = %invocation.id,
                success = result.is_success(),
                "Tool result recorded"
            );
            session.push(ConversationTurn::tool(invocation, result.to_content()));
        }

        tool_used
    }

    async fn stream_reply(
        &self,
        request: ChatRequest,
        narrative: &mut String,
        tool_used: Option<String>,
        tx: &mpsc::Sender<TurnEvent>,
    ) -> Flow {
        let opened = tokio::select! {
            result = self.provider.stream(request) => result,
            _ = tx.closed() => return Err(Disconnected),
        };

        let mut tokens = match opened {
            Ok(tokens) => tokens,
            Err(error) => {
                warn!(%error, "Provider stream could not be opened");
                return self.fail_over(narrative, tool_used, tx).await;
            }
        };

        loop {
            let next = tokio::select! {
                item = tokens.next() => item,
                _ = tx.closed() => return Err(Disconnected),
            };

            match next {
                Some(Ok(text)) if text.is_empty() => continue,
                Some(Ok(text)) => {
                    narrative.push_str(&text);
                    emit(tx, TurnEvent::fragment(text, tool_used.clone())).await?;
                }
                Some(Err(error)) => {
                    warn!(%error, received = narrative.len(), "Provider stream broke");
                    return self.fail_over(narrative, tool_used, tx).await;
                }
                None => break,
            }
        }

        if narrative.trim().is_empty() {
            warn!("Provider stream ended without text");
            return self.fail_over(narrative, tool_used, tx).await;
        }

        Ok(())
    }

    /// Emit the fallback fragment and fold it into the narrative
    async fn fail_over(
        &self,
        narrative: &mut String,
        tool_used: Option<String>,
        tx: &mpsc::Sender<TurnEvent>,
    ) -> Flow {
        let text = if narrative.is_empty() {
            FALLBACK_MESSAGE.to_string()
        } else {
            format!("\n\n{}", FALLBACK_MESSAGE)
        };
        narrative.push_str(&text);
        emit(tx, TurnEvent::fragment(text, tool_used)).await
    }

    /// Deliver a complete reply as fixed-size fragments with a pause between
    async fn pace(&self, text: &str, tx: &mpsc::Sender<TurnEvent>) -> Flow {
        let chunks = chunk_text(text, self.streaming.chunk_chars);
        let last = chunks.len().saturating_sub(1);

        for (index, chunk) in chunks.into_iter().enumerate() {
            emit(tx, TurnEvent::fragment(chunk, None)).await?;
            if index < last && !self.streaming.chunk_delay.is_zero() {
                tokio::time::sleep(self.streaming.chunk_delay).await;
            }
        }
        Ok(())
    }

    /// Provider request over the current context window. Known parameters are
    /// appended to the system instructions of the outgoing copy only.
    fn build_request(&self, session: &ConversationSession, tools: Vec<ToolDefinition>) -> ChatRequest {
        let mut messages: Vec<ConversationTurn> = self
            .context
            .build_window(session.turns())
            .into_iter()
            .cloned()
            .collect();

        let parameters = session.parameters();
        if !parameters.is_empty() {
            if let Some(system) = messages.first_mut().filter(|t| t.role == Role::System) {
                system.content = format!(
                    "{}\n\nKnown (unverified) user details: {}",
                    system.content,
                    parameters.describe()
                );
            }
        }

        debug!(
            messages = messages.len(),
            transcript = session.turn_count(),
            tools = tools.len(),
            "Built provider request"
        );

        ChatRequest { messages, tools }
    }
}

async fn emit(tx: &mpsc::Sender<TurnEvent>, event: TurnEvent) -> Flow {
    tx.send(event).await.map_err(|_| Disconnected)
}

fn chunk_text(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySessionStore;
    use crate::models::ToolInvocation;
    use crate::provider::{ScriptedProvider, ScriptedReply};
    use serde_json::Value;
    use std::time::Duration;

    fn build(provider: Arc<ScriptedProvider>, window: usize) -> Orchestrator {
        Orchestrator::new(
            provider,
            Arc::new(InMemorySessionStore::default()),
            ToolDispatcher::new(),
            ContextManager::with_window_size(window),
            StreamingConfig {
                chunk_chars: 8,
                chunk_delay: Duration::ZERO,
            },
        )
    }

    fn turn(key: &str, scenario: &str, message: &str) -> TurnRequest {
        TurnRequest {
            session_key: key.to_string(),
            scenario: scenario.to_string(),
            message: message.to_string(),
        }
    }

    fn invocation(id: &str, name: &str, arguments: &str) -> ToolInvocation {
        ToolInvocation {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    async fn run(orchestrator: &Orchestrator, request: TurnRequest) -> Vec<TurnEvent> {
        orchestrator
            .handle_turn(request)
            .await
            .unwrap()
            .collect()
            .await
    }

    fn text_of(events: &[TurnEvent]) -> String {
        events
            .iter()
            .filter_map(|event| match event {
                TurnEvent::Fragment { text, .. } => Some(text.as_str()),
                TurnEvent::Done => None,
            })
            .collect()
    }

    async fn transcript(orchestrator: &Orchestrator, key: &str) -> Vec<ConversationTurn> {
        let handle = orchestrator.sessions().get(key).await.unwrap();
        let session = handle.lock().await;
        session.turns().to_vec()
    }

    fn roles(turns: &[ConversationTurn]) -> Vec<Role> {
        turns.iter().map(|t| t.role).collect()
    }

    #[test]
    fn test_chunk_text_respects_char_boundaries() {
        let chunks = chunk_text("AED ١٢٣ ok", 3);
        assert_eq!(chunks.concat(), "AED ١٢٣ ok");
        assert!(chunks.iter().all(|c| c.chars().count() <= 3));
    }

    #[tokio::test]
    async fn test_no_tool_reply_is_paced_in_fragments() {
        let reply = "Renting is usually better for stays under three years.";
        let provider = Arc::new(ScriptedProvider::new([ScriptedReply::Completion(
            ChatCompletion::text(reply),
        )]));
        let orchestrator = build(provider.clone(), 10);

        let events = run(&orchestrator, turn("s1", "buy-vs-rent", "should I rent?")).await;

        assert_eq!(events.last(), Some(&TurnEvent::Done));
        assert_eq!(text_of(&events), reply);
        assert!(events.len() > 2);
        for event in &events[..events.len() - 1] {
            match event {
                TurnEvent::Fragment { text, tool_used } => {
                    assert!(text.chars().count() <= 8);
                    assert!(tool_used.is_none());
                }
                TurnEvent::Done => panic!("done before the last event"),
            }
        }

        let turns = transcript(&orchestrator, "s1").await;
        assert_eq!(roles(&turns), vec![Role::System, Role::User, Role::Assistant]);
        assert_eq!(turns[2].content, reply);

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        let tool_names: Vec<&str> = requests[0].tools.iter().map(|t| t.name.as_str()).collect();
        assert!(tool_names.contains(&"analyze_buy_vs_rent"));
    }

    #[tokio::test]
    async fn test_tool_path_records_turns_in_order() {
        let provider = Arc::new(ScriptedProvider::new([
            ScriptedReply::Completion(ChatCompletion::with_invocations(vec![
                invocation(
                    "call_1",
                    "analyze_buy_vs_rent",
                    r#"{"propertyPrice":1200000,"monthlyRent":8000,"stayDuration":7}"#,
                ),
                invocation("call_2", "calculate_emi", "{not json"),
            ])),
            ScriptedReply::Stream(vec!["Buying ".into(), "wins over 7 years.".into()]),
        ]));
        let orchestrator = build(provider.clone(), 10);

        let events = run(&orchestrator, turn("s1", "buy-vs-rent", "1.2m flat, rent 8k, 7 years")).await;
        assert_eq!(text_of(&events), "Buying wins over 7 years.");
        assert_eq!(
            events[0],
            TurnEvent::fragment("Buying ", Some("analyze_buy_vs_rent".to_string()))
        );
        assert_eq!(events.last(), Some(&TurnEvent::Done));

        let turns = transcript(&orchestrator, "s1").await;
        assert_eq!(
            roles(&turns),
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::Tool,
                Role::Tool,
                Role::Assistant
            ]
        );
        assert_eq!(turns[2].tool_invocations.len(), 2);
        assert_eq!(turns[3].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(turns[4].tool_call_id.as_deref(), Some("call_2"));

        let analysis: Value = serde_json::from_str(&turns[3].content).unwrap();
        assert_eq!(analysis["recommendation"], "buy");
        let malformed: Value = serde_json::from_str(&turns[4].content).unwrap();
        assert_eq!(malformed["kind"], "malformed_arguments");

        assert_eq!(turns[5].content, "Buying wins over 7 years.");

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].tools.is_empty());
        assert_eq!(
            roles(&requests[1].messages),
            vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Tool]
        );

        let handle = orchestrator.sessions().get("s1").await.unwrap();
        let session = handle.lock().await;
        assert_eq!(session.parameters().get("propertyPrice"), Some(1_200_000.0));
        assert!(!session.has_dangling_invocations());
    }

    #[tokio::test]
    async fn test_zero_window_still_completes_turn() {
        let provider = Arc::new(ScriptedProvider::new([ScriptedReply::Completion(
            ChatCompletion::text("Hello there."),
        )]));
        let orchestrator = build(provider.clone(), 0);

        let events = run(&orchestrator, turn("s1", "affordability", "hi")).await;
        assert_eq!(text_of(&events), "Hello there.");
        assert_eq!(events.last(), Some(&TurnEvent::Done));

        let requests = provider.requests();
        assert_eq!(roles(&requests[0].messages), vec![Role::System, Role::User]);
    }

    #[tokio::test]
    async fn test_failed_tool_is_not_reported_as_used() {
        let provider = Arc::new(ScriptedProvider::new([
            ScriptedReply::Completion(ChatCompletion::with_invocations(vec![
                invocation("call_1", "calculate_emi", r#"{"loanAmount":500000}"#),
                invocation("call_2", "unknown_tool", "{}"),
            ])),
            ScriptedReply::Stream(vec!["I need a rate and a tenure.".into()]),
        ]));
        let orchestrator = build(provider, 10);

        let events = run(&orchestrator, turn("s1", "affordability", "what would my EMI be?")).await;
        assert_eq!(
            events[0],
            TurnEvent::fragment("I need a rate and a tenure.", None)
        );
        assert_eq!(events.last(), Some(&TurnEvent::Done));

        let turns = transcript(&orchestrator, "s1").await;
        let missing: Value = serde_json::from_str(&turns[3].content).unwrap();
        assert_eq!(missing["kind"], "validation");
        let unknown: Value = serde_json::from_str(&turns[4].content).unwrap();
        assert_eq!(unknown["kind"], "unknown_tool");
    }

    #[tokio::test]
    async fn test_provider_failure_degrades_to_fallback() {
        let provider = Arc::new(ScriptedProvider::new([ScriptedReply::Fail(
            "connection refused".into(),
        )]));
        let orchestrator = build(provider, 10);

        let events = run(&orchestrator, turn("s1", "affordability", "what can I afford?")).await;
        assert_eq!(
            events,
            vec![TurnEvent::fragment(FALLBACK_MESSAGE, None), TurnEvent::Done]
        );

        let turns = transcript(&orchestrator, "s1").await;
        assert_eq!(roles(&turns), vec![Role::System, Role::User, Role::Assistant]);
        assert_eq!(turns[2].content, FALLBACK_MESSAGE);
    }

    #[tokio::test]
    async fn test_broken_stream_keeps_partial_text_and_ends_turn() {
        let provider = Arc::new(ScriptedProvider::new([
            ScriptedReply::Completion(ChatCompletion::with_invocations(vec![invocation(
                "call_1",
                "calculate_emi",
                r#"{"loanAmount":960000,"rate":0.045,"tenure":25}"#,
            )])),
            ScriptedReply::BrokenStream {
                partial: vec!["Your EMI is ".into()],
                error: "connection reset".into(),
            },
        ]));
        let orchestrator = build(provider, 10);

        let events = run(&orchestrator, turn("s1", "affordability", "emi on 960k?")).await;
        assert_eq!(events.last(), Some(&TurnEvent::Done));
        assert!(text_of(&events).ends_with(FALLBACK_MESSAGE));

        let turns = transcript(&orchestrator, "s1").await;
        let last = turns.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, text_of(&events));
        assert!(last.tool_invocations.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_requests_create_no_session() {
        let orchestrator = build(Arc::new(ScriptedProvider::new(Vec::new())), 10);

        let err = orchestrator
            .handle_turn(turn("s1", "crypto-trading", "hi"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, OrchestrationError::InvalidRequest(_)));

        let err = orchestrator
            .handle_turn(turn("s1", "buy-vs-rent", "   "))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, OrchestrationError::InvalidRequest(_)));

        let offline = build(Arc::new(ScriptedProvider::unconfigured()), 10);
        let err = offline
            .handle_turn(turn("s1", "buy-vs-rent", "hi"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, OrchestrationError::ProviderUnavailable(_)));

        assert_eq!(orchestrator.sessions().len().await, 0);
        assert_eq!(offline.sessions().len().await, 0);
    }

    #[tokio::test]
    async fn test_existing_session_scenario_is_authoritative() {
        let provider = Arc::new(ScriptedProvider::new([
            ScriptedReply::Completion(ChatCompletion::text("Hello!")),
            ScriptedReply::Completion(ChatCompletion::text("Still buy-vs-rent.")),
        ]));
        let orchestrator = build(provider.clone(), 10);

        run(&orchestrator, turn("s1", "buy-vs-rent", "hi")).await;
        run(&orchestrator, turn("s1", "refinance-check", "refinance?")).await;

        let requests = provider.requests();
        let second: Vec<&str> = requests[1].tools.iter().map(|t| t.name.as_str()).collect();
        assert!(second.contains(&"analyze_buy_vs_rent"));
        assert!(!second.contains(&"analyze_refinance"));
    }

    #[tokio::test]
    async fn test_extracted_parameters_reach_the_provider() {
        let provider = Arc::new(ScriptedProvider::new([ScriptedReply::Completion(
            ChatCompletion::text("Let's look at that."),
        )]));
        let orchestrator = build(provider.clone(), 10);

        run(
            &orchestrator,
            turn("s1", "affordability", "can I afford something around AED 1.2m?"),
        )
        .await;

        let requests = provider.requests();
        let system = &requests[0].messages[0];
        assert!(system.content.contains("Known (unverified) user details"));
        assert!(system.content.contains("propertyPrice=1200000"));

        let stored = transcript(&orchestrator, "s1").await;
        assert!(!stored[0].content.contains("Known (unverified)"));
    }

    #[tokio::test]
    async fn test_context_window_bounds_provider_messages() {
        let provider = Arc::new(ScriptedProvider::new([
            ScriptedReply::Completion(ChatCompletion::text("one")),
            ScriptedReply::Completion(ChatCompletion::text("two")),
            ScriptedReply::Completion(ChatCompletion::text("three")),
        ]));
        let orchestrator = build(provider.clone(), 2);

        for message in ["first", "second", "third"] {
            run(&orchestrator, turn("s1", "buy-vs-rent", message)).await;
        }

        let requests = provider.requests();
        let last = &requests[2].messages;
        assert_eq!(roles(last), vec![Role::System, Role::Assistant, Role::User]);
        assert_eq!(last[2].content, "third");
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_session_turns_do_not_interleave() {
        let provider = Arc::new(
            ScriptedProvider::new([
                ScriptedReply::Completion(ChatCompletion::text("first answer")),
                ScriptedReply::Completion(ChatCompletion::text("second answer")),
            ])
            .with_latency(Duration::from_millis(50)),
        );
        let orchestrator = build(provider, 10);

        let first = orchestrator
            .handle_turn(turn("s1", "buy-vs-rent", "first"))
            .await
            .unwrap();
        let second = orchestrator
            .handle_turn(turn("s1", "buy-vs-rent", "second"))
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            first.collect::<Vec<_>>(),
            second.collect::<Vec<_>>()
        );
        assert_eq!(text_of(&a), "first answer");
        assert_eq!(text_of(&b), "second answer");

        let turns = transcript(&orchestrator, "s1").await;
        assert_eq!(
            roles(&turns),
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::User,
                Role::Assistant
            ]
        );
        assert_eq!(turns[1].content, "first");
        assert_eq!(turns[2].content, "first answer");
        assert_eq!(turns[3].content, "second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_caller_stops_production() {
        let long_reply = "x".repeat(400);
        let provider = Arc::new(ScriptedProvider::new([ScriptedReply::Completion(
            ChatCompletion::text(long_reply),
        )]));
        let orchestrator = Orchestrator::new(
            provider,
            Arc::new(InMemorySessionStore::default()),
            ToolDispatcher::new(),
            ContextManager::new(),
            StreamingConfig {
                chunk_chars: 4,
                chunk_delay: Duration::from_millis(10),
            },
        );

        let mut stream = orchestrator
            .handle_turn(turn("s1", "buy-vs-rent", "hello"))
            .await
            .unwrap();
        assert!(matches!(stream.next().await, Some(TurnEvent::Fragment { .. })));
        drop(stream);

        tokio::time::sleep(Duration::from_secs(5)).await;

        let turns = transcript(&orchestrator, "s1").await;
        assert_eq!(roles(&turns), vec![Role::System, Role::User]);
    }
}
