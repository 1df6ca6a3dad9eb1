use axum::{
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::core::agent::{Agent, CouncilEngine, SubAgentManager, VisionContext};
use crate::core::store::Store;
use crate::tools::{Tool, ToolRegistry};

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Mutex<Agent>>,
    pub thinking: Arc<AtomicBool>,
    pub vision: VisionContext,
    pub tools: ToolRegistry,
    pub sub_agents: SubAgentManager,
    pub councils: CouncilEngine,
    pub store: Store,
    pub api_key: String,
}

pub struct ApiServer {
    state: AppState,
    addr: String,
}

impl ApiServer {
    pub fn new(state: AppState, addr: &str) -> Self {
        Self {
            state,
            addr: addr.to_string(),
        }
    }

    pub fn router(state: AppState) -> Router {
        let protected = Router::new()
            .route("/chat", post(chat))
            .route("/status", get(status))
            .route("/history", get(history))
            .route("/agents", get(agents))
            .route("/councils", get(councils))
            .route("/tools", get(tools))
            .route("/ui/schemas", get(ui_schemas))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                require_api_key,
            ));

        // The webhook id is the secret; no header auth on this path.
        Router::new()
            .merge(protected)
            .route("/webhooks/{id}", post(webhook))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    pub async fn serve(self) -> anyhow::Result<()> {
        let app = Self::router(self.state);
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        info!("API server running at http://{}", self.addr);
        axum::serve(listener, app).await?;
        Ok(())
    }
}

/// Byte-exact `x-api-key` check; an empty configured key disables auth.
async fn require_api_key(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if state.api_key.is_empty() {
        return next.run(req).await;
    }

    let supplied = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if supplied == state.api_key {
        next.run(req).await
    } else {
        (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
    }
}

#[derive(Deserialize)]
struct ChatRequest {
    text: String,
    #[serde(default)]
    images: Vec<String>,
}

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    info!("chat request: {}", req.text);

    // `/tool input` is the surface's escape hatch around the loop.
    let response = if let Some(rest) = req.text.strip_prefix('/') {
        let (tool_name, input) = match rest.split_once(' ') {
            Some((name, input)) => (name, input),
            None => (rest, ""),
        };

        match state.tools.get(tool_name) {
            Some(tool) => {
                if !req.images.is_empty() {
                    state.vision.set(req.images.clone());
                }
                tool.invoke(input)
                    .await
                    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
            }
            None => "Command not recognized.".to_string(),
        }
    } else {
        let mut agent = state.agent.lock().await;
        let result = if req.images.is_empty() {
            agent.run(&req.text).await
        } else {
            info!("running vision turn ({} images)", req.images.len());
            agent.run_vision(&req.text, req.images).await
        };
        result.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
    };

    Ok(Json(serde_json::json!({ "response": response })))
}

async fn status(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let active = state
        .sub_agents
        .list_active()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(serde_json::json!({
        "thinking": state.thinking.load(Ordering::Relaxed),
        "active_subagents": active,
    })))
}

async fn history(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let activity = state
        .store
        .recent_activity()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(serde_json::json!(activity)))
}

async fn agents(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let defs = state
        .sub_agents
        .list_definitions()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(serde_json::json!(defs)))
}

async fn councils(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let councils = state
        .councils
        .list_councils()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(serde_json::json!(councils)))
}

async fn tools(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!(state.tools.names()))
}

async fn ui_schemas(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.tools.schemas())
}

/// Resolve the hook, substitute the payload, dispatch in the background,
/// and acknowledge immediately.
async fn webhook(
    Path(id): Path<String>,
    State(state): State<AppState>,
    body: String,
) -> Response {
    let hook = match state.store.webhook(&id).await {
        Ok(Some(hook)) => hook,
        Ok(None) => return (StatusCode::NOT_FOUND, "Webhook not found").into_response(),
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    let prompt = hook.prompt_template.replace("{{payload}}", &body);
    info!("webhook '{}' triggered: {}", hook.name, prompt);

    let agent = state.agent.clone();
    let sub_agents = state.sub_agents.clone();
    tokio::spawn(async move {
        let outcome = if hook.target_agent == "main" {
            agent.lock().await.run(&prompt).await.map(|_| ())
        } else {
            sub_agents
                .spawn_named(&hook.target_agent, &prompt, None)
                .await
                .map(|_| ())
        };
        if let Err(e) = outcome {
            error!("webhook '{}' dispatch failed: {}", hook.name, e);
        }
    });

    (StatusCode::OK, "Webhook accepted").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::ChatClient;
    use crate::core::store::test_util::memory_store;

    async fn test_state(api_key: &str) -> AppState {
        let store = memory_store();
        let client = ChatClient::new("http://127.0.0.1:1", "test");
        let tools = crate::tools::test_util::registry_with(&["echo"]);
        let agent = Agent::new(client.clone(), Some(store.clone()), tools.clone()).await;
        let thinking = agent.thinking_handle();
        let vision = agent.vision_handle();
        AppState {
            agent: Arc::new(Mutex::new(agent)),
            thinking,
            vision,
            tools: tools.clone(),
            sub_agents: SubAgentManager::new(client.clone(), store.clone(), tools.clone()),
            councils: CouncilEngine::new(client, store.clone(), tools),
            store,
            api_key: api_key.to_string(),
        }
    }

    async fn send(
        router: Router,
        req: Request<Body>,
    ) -> (StatusCode, String) {
        let response = tower_service_call(router, req).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    async fn tower_service_call(router: Router, req: Request<Body>) -> Response {
        use tower::ServiceExt;
        router.oneshot(req).await.unwrap()
    }

    #[tokio::test]
    async fn missing_api_key_is_rejected() {
        let state = test_state("secret").await;
        let router = ApiServer::router(state);

        let req = Request::builder()
            .uri("/tools")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(router, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn matching_api_key_passes() {
        let state = test_state("secret").await;
        let router = ApiServer::router(state);

        let req = Request::builder()
            .uri("/tools")
            .header("x-api-key", "secret")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("echo"));
    }

    #[tokio::test]
    async fn empty_key_disables_auth() {
        let state = test_state("").await;
        let router = ApiServer::router(state);

        let req = Request::builder()
            .uri("/status")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("thinking"));
    }

    #[tokio::test]
    async fn slash_command_invokes_tool_directly() {
        let state = test_state("").await;
        let router = ApiServer::router(state);

        let req = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"text": "/echo hello"}"#))
            .unwrap();
        let (status, body) = send(router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("echo: hello"));
    }

    #[tokio::test]
    async fn unknown_slash_command_is_reported() {
        let state = test_state("").await;
        let router = ApiServer::router(state);

        let req = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"text": "/missing x"}"#))
            .unwrap();
        let (status, body) = send(router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Command not recognized."));
    }

    #[tokio::test]
    async fn unknown_webhook_is_404() {
        let state = test_state("secret").await;
        let router = ApiServer::router(state);

        // No x-api-key header on purpose: the path id is the secret.
        let req = Request::builder()
            .method("POST")
            .uri("/webhooks/nope")
            .body(Body::from("payload"))
            .unwrap();
        let (status, body) = send(router, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("Webhook not found"));
    }

    #[tokio::test]
    async fn known_webhook_is_accepted_immediately() {
        let state = test_state("").await;
        state
            .store
            .save_webhook("abc", "ci", "main", "echo {{payload}} please")
            .await
            .unwrap();
        let router = ApiServer::router(state);

        let req = Request::builder()
            .method("POST")
            .uri("/webhooks/abc")
            .body(Body::from("hello"))
            .unwrap();
        let (status, body) = send(router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Webhook accepted");
    }
}
