mod council;
mod manager;
mod scheduler;

pub use council::CouncilEngine;
pub use manager::SubAgentManager;
pub use scheduler::Scheduler;

use anyhow::Result;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::info;

use crate::core::llm::{ChatClient, ChatMessage};
use crate::core::store::Store;
use crate::tools::{Tool, ToolRegistry};

pub const DEFAULT_PERSONALITY: &str = "You are Halcyon, a pragmatic personal AI assistant.";

/// Returned instead of an error when the model produces no text at all.
pub const EMPTY_RESPONSE_DIAGNOSTIC: &str =
    "Error: The model returned an empty response. It may be too small for this task or experiencing an error.";

const MAX_ITERATIONS: usize = 12;
const MEMORY_CONTEXT_LIMIT: usize = 10;
const HISTORY_BOOTSTRAP: usize = 20;

/// The images attached to the current main-conversation turn, exposed so a
/// tool invoked inside that turn (a sub-agent spawn, typically) can inherit
/// them without the model re-specifying anything.
#[derive(Clone, Default)]
pub struct VisionContext {
    images: Arc<RwLock<Vec<String>>>,
}

impl VisionContext {
    pub fn set(&self, images: Vec<String>) {
        let mut guard = self.images.write().unwrap_or_else(|e| e.into_inner());
        *guard = images;
    }

    pub fn clear(&self) {
        self.set(Vec::new());
    }

    pub fn snapshot(&self) -> Vec<String> {
        let guard = self.images.read().unwrap_or_else(|e| e.into_inner());
        guard.clone()
    }
}

/// The structured reasoning step the model is instructed to emit.
#[derive(Debug, Default, Deserialize)]
pub struct ThoughtProcess {
    #[serde(default)]
    pub thought: String,
    #[serde(default)]
    pub tool: String,
    #[serde(default)]
    pub input: Option<serde_json::Value>,
    #[serde(default, rename = "final")]
    pub final_answer: String,
}

impl ThoughtProcess {
    fn is_empty(&self) -> bool {
        self.thought.is_empty() && self.tool.is_empty() && self.final_answer.is_empty()
    }

    /// The tool input as text: string payloads pass through verbatim,
    /// anything structured is re-serialized compactly.
    fn input_text(&self) -> String {
        match &self.input {
            None => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(value) => serde_json::to_string(value).unwrap_or_default(),
        }
    }
}

/// The think–act–observe loop driving one logical conversation. The main
/// conversation gets a store-backed instance; sub-agents and council turns
/// run storeless copies.
pub struct Agent {
    client: ChatClient,
    tools: ToolRegistry,
    history: Vec<ChatMessage>,
    store: Option<Store>,
    personality: String,
    model: String,
    thinking: Arc<AtomicBool>,
    vision: VisionContext,
}

impl Agent {
    pub async fn new(client: ChatClient, store: Option<Store>, tools: ToolRegistry) -> Self {
        let mut agent = Self {
            client,
            tools,
            history: Vec::new(),
            store,
            personality: String::new(),
            model: String::new(),
            thinking: Arc::new(AtomicBool::new(false)),
            vision: VisionContext::default(),
        };
        agent.load_history().await;
        agent
    }

    /// A detached loop with its own persona/model and no store association.
    pub fn detached(
        client: ChatClient,
        tools: ToolRegistry,
        personality: &str,
        model: &str,
    ) -> Self {
        Self {
            client,
            tools,
            history: Vec::new(),
            store: None,
            personality: personality.to_string(),
            model: model.to_string(),
            thinking: Arc::new(AtomicBool::new(false)),
            vision: VisionContext::default(),
        }
    }

    async fn load_history(&mut self) {
        let Some(store) = &self.store else { return };
        match store.load_last_messages(HISTORY_BOOTSTRAP).await {
            Ok(msgs) => {
                for m in msgs {
                    self.history.push(ChatMessage::new(&m.role, m.content));
                }
            }
            Err(e) => tracing::warn!("could not load history: {}", e),
        }
    }

    /// Shared flag readable while a turn holds the agent lock.
    pub fn thinking_handle(&self) -> Arc<AtomicBool> {
        self.thinking.clone()
    }

    /// Accessor for the current turn's attached images.
    pub fn vision_handle(&self) -> VisionContext {
        self.vision.clone()
    }

    pub fn set_personality(&mut self, personality: &str) {
        self.personality = personality.to_string();
    }

    /// Drive one turn from user prompt to final answer.
    pub async fn run(&mut self, prompt: &str) -> Result<String> {
        self.vision.clear();
        self.history.push(ChatMessage::new("user", prompt));
        if let Some(store) = &self.store {
            store.save_message("user", prompt).await?;
        }
        self.run_loop().await
    }

    /// Same as `run` with base64 images attached to the originating user
    /// message. Later iterations of the same turn do not resend them.
    pub async fn run_vision(&mut self, prompt: &str, images: Vec<String>) -> Result<String> {
        self.vision.set(images.clone());
        self.history
            .push(ChatMessage::with_images("user", prompt, images));
        if let Some(store) = &self.store {
            store
                .save_message("user", &format!("[Image Attached] {}", prompt))
                .await?;
        }
        self.run_loop().await
    }

    async fn run_loop(&mut self) -> Result<String> {
        self.thinking.store(true, Ordering::Relaxed);
        let result = self.iterate().await;
        self.thinking.store(false, Ordering::Relaxed);
        result
    }

    async fn iterate(&mut self) -> Result<String> {
        // The override is pinned on this loop's own handle for the whole
        // run; other loops keep their own defaults.
        let client = self.client.with_model(&self.model);
        let mut last_raw = String::new();

        for _ in 0..MAX_ITERATIONS {
            let system_prompt = self.build_system_prompt().await;
            let mut messages = Vec::with_capacity(self.history.len() + 1);
            messages.push(ChatMessage::new("system", system_prompt));
            messages.extend(self.history.iter().cloned());

            let raw = client.generate(&messages).await?;
            if raw.trim().is_empty() {
                return Ok(EMPTY_RESPONSE_DIAGNOSTIC.to_string());
            }
            last_raw = raw.clone();

            let parsed = extract_json(&raw)
                .and_then(|candidate| serde_json::from_str::<ThoughtProcess>(candidate).ok());
            let tp = match parsed {
                Some(tp) if !tp.is_empty() => tp,
                // The model is just talking; the raw text is the answer.
                _ => return self.finish(&raw).await,
            };

            if !tp.final_answer.is_empty() {
                return self.finish(&tp.final_answer).await;
            }

            if !tp.tool.is_empty() {
                let Some(tool) = self.tools.get(&tp.tool) else {
                    let observation = format!("Error: Tool '{}' not found.", tp.tool);
                    self.history.push(ChatMessage::new("assistant", observation));
                    continue;
                };

                if !tp.thought.is_empty() {
                    info!("thought: {}", tp.thought);
                }
                let input = tp.input_text();
                info!("invoking tool {} with input: {}", tp.tool, input);

                let observation = match tool.invoke(&input).await {
                    Ok(result) => format!("Observation: {}", result),
                    Err(e) => format!("Tool error: {}", e),
                };
                // Observations stay in-memory only; persisting them would
                // pollute every future system prompt.
                self.history.push(ChatMessage::new("assistant", observation));
                continue;
            }

            // A thought with no action keeps any conversational text around
            // the JSON intact by returning the raw response.
            return self.finish(&raw).await;
        }

        info!("iteration bound reached, returning last response");
        self.finish(&last_raw).await
    }

    async fn finish(&mut self, answer: &str) -> Result<String> {
        self.history.push(ChatMessage::new("assistant", answer));
        if let Some(store) = &self.store {
            store.save_message("assistant", answer).await?;
        }
        Ok(answer.to_string())
    }

    async fn build_system_prompt(&self) -> String {
        let mut personality = self.personality.clone();
        if personality.is_empty() {
            if let Some(store) = &self.store {
                personality = store.setting("personality").await.unwrap_or_default();
            }
        }
        if personality.is_empty() {
            personality = DEFAULT_PERSONALITY.to_string();
        }

        let mut memory_context = String::new();
        if let Some(store) = &self.store {
            if let Ok(memories) = store.search_memories("", MEMORY_CONTEXT_LIMIT).await {
                if !memories.is_empty() {
                    memory_context.push_str("\n\nRELEVANT MEMORIES:\n");
                    let lines: Vec<String> = memories
                        .iter()
                        .map(|m| format!("- [{}] {}", m.kind, m.content))
                        .collect();
                    memory_context.push_str(&lines.join("\n"));
                }
            }
        }

        format!(
            "{}\n\
             You operate in a strict Think -> Plan -> Act -> Observe loop.\n\
             You MUST wrap your response in a single <json> block. Do NOT include any text outside this block.\n\
             FORMAT:\n\
             <json>\n\
             {{\n\
               \"thought\": \"reasoning about the current state\",\n\
               \"tool\": \"tool_name\",\n\
               \"input\": \"tool_input\",\n\
               \"final\": \"final answer\"\n\
             }}\n\
             </json>\n\
             {}\n\n\
             INTERACTIVE MODE:\n\
             If a tool requires parameters you do not have, ask the user for them using the 'final' field.\n\n\
             IMAGE ANALYSIS:\n\
             You can analyze attached images directly or hand them to the 'subagent' tool.\n\n\
             Available Tools:\n\
             {}\n\n\
             If you have the final answer, use \"final\". If you need a tool, use \"tool\" and \"input\".",
            personality,
            memory_context,
            self.tools.describe().join("\n")
        )
    }
}

/// Pull the structured payload out of semi-structured model output: a
/// `<json>` block wins, then the widest brace span. Returns `None` when
/// neither exists.
fn extract_json(raw: &str) -> Option<&str> {
    if let Some(start) = raw.find("<json>") {
        if let Some(end) = raw[start..].find("</json>") {
            return Some(&raw[start + 6..start + end]);
        }
    }

    match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if end > start => Some(&raw[start..=end]),
        _ => None,
    }
}
