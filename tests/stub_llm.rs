#![allow(dead_code)]

use axum::{extract::State, routing::post, Json, Router};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use halcyon::core::agent::{Agent, CouncilEngine, Scheduler, SubAgentManager};
use halcyon::core::llm::ChatClient;
use halcyon::core::store::Store;
use halcyon::tools::{RecallTool, RememberTool, TimeTool, ToolRegistry};

pub type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Clone)]
struct StubState {
    queue: Arc<Mutex<VecDeque<String>>>,
    default_response: Arc<String>,
    requests: Arc<Mutex<Vec<Value>>>,
}

async fn stub_chat(State(state): State<StubState>, Json(payload): Json<Value>) -> Json<Value> {
    let content = {
        let mut queue = state.queue.lock().unwrap_or_else(|e| e.into_inner());
        queue
            .pop_front()
            .unwrap_or_else(|| state.default_response.as_ref().clone())
    };

    state
        .requests
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .push(payload);

    Json(json!({
        "message": { "role": "assistant", "content": content },
        "done": true
    }))
}

/// Scripted stand-in for the chat endpoint. Scripted responses are served
/// in order; once the script runs dry, every call gets the default.
pub struct StubLlmServer {
    pub port: u16,
    queue: Arc<Mutex<VecDeque<String>>>,
    requests: Arc<Mutex<Vec<Value>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl StubLlmServer {
    pub async fn start(default_response: &str) -> TestResult<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();

        let queue = Arc::new(Mutex::new(VecDeque::new()));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = StubState {
            queue: Arc::clone(&queue),
            default_response: Arc::new(default_response.to_string()),
            requests: Arc::clone(&requests),
        };
        let app = Router::new()
            .route("/api/chat", post(stub_chat))
            .with_state(state);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Ok(Self {
            port,
            queue,
            requests,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn script(&self, responses: &[&str]) {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        for r in responses {
            queue.push_back(r.to_string());
        }
    }

    /// Raw request payloads seen so far, oldest first.
    pub fn requests(&self) -> Vec<Value> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Fully wired core against an in-memory store and the given stub endpoint.
pub struct Fixture {
    pub store: Store,
    pub client: ChatClient,
    pub tools: ToolRegistry,
    pub agent: Arc<tokio::sync::Mutex<Agent>>,
    pub sub_agents: SubAgentManager,
    pub councils: CouncilEngine,
    pub scheduler: Scheduler,
}

pub async fn fixture(base_url: &str) -> TestResult<Fixture> {
    let store = Store::open(":memory:")?;
    let client = ChatClient::new(base_url, "stub-model");
    let tools = ToolRegistry::new();
    tools.register(Arc::new(TimeTool));
    tools.register(Arc::new(RememberTool::new(store.clone())));
    tools.register(Arc::new(RecallTool::new(store.clone())));

    let agent = Arc::new(tokio::sync::Mutex::new(
        Agent::new(client.clone(), Some(store.clone()), tools.clone()).await,
    ));
    let sub_agents = SubAgentManager::new(client.clone(), store.clone(), tools.clone());
    let councils = CouncilEngine::new(client.clone(), store.clone(), tools.clone());
    let scheduler = Scheduler::new(
        agent.clone(),
        store.clone(),
        sub_agents.clone(),
        councils.clone(),
    )
    .await?;

    Ok(Fixture {
        store,
        client,
        tools,
        agent,
        sub_agents,
        councils,
        scheduler,
    })
}

/// Poll until `check` passes or the timeout elapses; returns whether it
/// passed.
pub async fn wait_for<F, Fut>(mut check: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = std::time::Instant::now() + std::time::Duration::from_millis(timeout_ms);
    loop {
        if check().await {
            return true;
        }
        if std::time::Instant::now() > deadline {
            return false;
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }
}
