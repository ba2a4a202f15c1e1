//! End-to-end turns through the chat service with a scripted reasoning backend.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use waybill_ai::{
    Decision, Engine, EngineConfig, LlmError, ReasoningBackend, ReasoningRequest, ToolSelection,
};
use waybill_conversation::{
    FnTool, MessageRole, SessionConfig, SessionManager, ToolDefinition, ToolRegistry,
};
use waybill_server::chat::ChatService;
use waybill_server::error::ChatError;
use waybill_server::tools::shipping_tools;
use waybill_store::TtlStore;

/// Plays back a fixed script. Once the script runs out it replies with the
/// content of the last message it was shown.
struct ScriptedBackend {
    script: Mutex<VecDeque<Decision>>,
    seen: Mutex<Vec<ReasoningRequest>>,
}

impl ScriptedBackend {
    fn new(script: Vec<Decision>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ReasoningRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningBackend for ScriptedBackend {
    async fn decide(&self, request: &ReasoningRequest) -> Result<Decision, LlmError> {
        self.seen.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| Decision::Reply {
            text: request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default(),
        }))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

fn select(tool: &str, arguments: Value) -> Decision {
    Decision::ToolCall(ToolSelection {
        name: tool.to_string(),
        payload: json!({"name": tool, "arguments": arguments.to_string()}),
    })
}

fn order_lookup() -> FnTool<impl Fn(&Map<String, Value>) -> String + Send + Sync> {
    FnTool::new(
        ToolDefinition::new("orderLookup", "Look up an order's after-sale cases").with_parameters(
            json!({"type": "object", "properties": {"order_id": {"type": "string"}}}),
        ),
        |args| {
            let order_id = args.get("order_id").and_then(Value::as_str).unwrap_or("?");
            format!("order {order_id} has 1 aftersale case...")
        },
    )
}

async fn service(backend: Arc<ScriptedBackend>, tools: ToolRegistry) -> ChatService {
    let store = TtlStore::memory();
    store.initialize().await.unwrap();
    ChatService::new(
        SessionManager::new(store, SessionConfig::default()),
        Engine::new(backend, tools, EngineConfig::default()),
        None,
    )
}

#[tokio::test]
async fn order_lookup_turn_is_recorded() {
    let backend =
        ScriptedBackend::new(vec![select("orderLookup", json!({"order_id": "123456789"}))]);
    let service = service(backend.clone(), ToolRegistry::new().with(order_lookup())).await;
    let id = service.sessions().create_session(None).await.unwrap();

    let turn = service
        .chat(
            "please check insurance for order 123456789",
            Some(&id.to_string()),
            None,
        )
        .await
        .unwrap();

    assert_eq!(turn.session_id, id);
    assert_eq!(turn.reply, "order 123456789 has 1 aftersale case...");

    let record = service.sessions().get_session(&id).await.unwrap();
    assert_eq!(record.messages.len(), 2);
    assert_eq!(record.messages[0].role, MessageRole::User);
    assert_eq!(
        record.messages[0].content,
        "please check insurance for order 123456789"
    );
    assert_eq!(record.messages[1].role, MessageRole::Assistant);
    assert_eq!(record.messages[1].content, turn.reply);
    assert_eq!(record.state.last_tool.as_deref(), Some("orderLookup"));
    assert!(record.state.pending_tool.is_none());

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tools[0].name, "orderLookup");
    assert_eq!(
        requests[1].messages.last().unwrap().content,
        "order 123456789 has 1 aftersale case..."
    );
}

#[tokio::test]
async fn unregistered_tool_leaves_session_untouched() {
    let backend = ScriptedBackend::new(vec![
        Decision::Reply {
            text: "Which order?".to_string(),
        },
        select("doesNotExist", json!({})),
    ]);
    let service = service(backend, ToolRegistry::new().with(order_lookup())).await;

    let first = service.chat("hello", None, None).await.unwrap();
    let before = service.sessions().get_session(&first.session_id).await.unwrap();

    let err = service
        .chat("order 123456789", Some(&first.session_id.to_string()), None)
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::ToolDispatch { .. }));
    let after = service.sessions().get_session(&first.session_id).await.unwrap();
    assert_eq!(after.messages, before.messages);
    assert_eq!(after.state, before.state);
}

#[tokio::test]
async fn shipping_catalog_answers_order_questions() {
    let backend = ScriptedBackend::new(vec![
        Decision::Reply {
            text: "Please give me your order number.".to_string(),
        },
        select("query_aftersales_by_order", json!({"order_id": "123456789"})),
        Decision::Reply {
            text: "Order 123456789 has cases AS001 and AS002. Which one?".to_string(),
        },
        select("select_aftersale", json!({"aftersale_id": "AS001"})),
    ]);
    let service = service(backend, shipping_tools()).await;

    let first = service
        .chat("does my order have shipping insurance?", None, None)
        .await
        .unwrap();
    let id = first.session_id.to_string();
    let second = service.chat("123456789", Some(&id), None).await.unwrap();
    let third = service.chat("AS001", Some(&id), None).await.unwrap();

    assert!(second.reply.contains("AS001"));
    assert!(third.reply.contains("15 yuan"));

    let record = service.sessions().get_session(&first.session_id).await.unwrap();
    assert_eq!(record.messages.len(), 6);
    assert_eq!(record.state.turn_count(), 3);
    assert_eq!(record.state.last_tool.as_deref(), Some("select_aftersale"));
}
