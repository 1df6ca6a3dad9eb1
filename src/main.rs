use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use halcyon::config::Config;
use halcyon::core::agent::{Agent, CouncilEngine, Scheduler, SubAgentManager};
use halcyon::core::llm::ChatClient;
use halcyon::core::store::Store;
use halcyon::server::{ApiServer, AppState};
use halcyon::tools::{
    AgentListTool, CompactTool, CouncilTool, DefineAgentTool, InboxTool, OptimizeMemoryTool,
    PersonalityTool, RecallTool, RememberTool, ScheduleTool, SendMessageTool, SubAgentTool,
    TimeTool, ToolRegistry, WebhookTool,
};

const CONFIG_PATH: &str = "halcyon.conf";

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    if let Err(e) = run().await {
        tracing::error!("fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let conf = Config::load(CONFIG_PATH);

    let model = conf.get_or("MODEL", "llama3.1");
    let chat_url = conf.get_or("CHAT_URL", "http://localhost:11434");
    let addr = conf.get_or("SERVER_ADDR", "0.0.0.0:8080");

    let mut api_key = conf.get("SERVER_API_KEY");
    if api_key.is_empty() {
        info!("no API key configured, generating one");
        api_key = uuid::Uuid::new_v4().to_string();
        conf.set("SERVER_API_KEY", &api_key);
        if let Err(e) = conf.save_to_file(CONFIG_PATH) {
            warn!("could not persist generated API key: {}", e);
        } else {
            info!("new API key saved to {}", CONFIG_PATH);
        }
    }

    let store = Store::open(conf.get_or("DB_PATH", "halcyon.db"))?;
    let client = ChatClient::new(&chat_url, &model);
    let tools = ToolRegistry::new();

    // The main agent; one conversation turn at a time holds this lock.
    let agent = Agent::new(client.clone(), Some(store.clone()), tools.clone()).await;
    let thinking = agent.thinking_handle();
    let vision = agent.vision_handle();
    let agent = Arc::new(Mutex::new(agent));

    let sub_agents = SubAgentManager::new(client.clone(), store.clone(), tools.clone());
    let councils = CouncilEngine::new(client.clone(), store.clone(), tools.clone());

    let scheduler = Scheduler::new(
        agent.clone(),
        store.clone(),
        sub_agents.clone(),
        councils.clone(),
    )
    .await?;
    scheduler.start().await?;

    tools.register(Arc::new(TimeTool));
    tools.register(Arc::new(RememberTool::new(store.clone())));
    tools.register(Arc::new(RecallTool::new(store.clone())));
    tools.register(Arc::new(CompactTool::new(store.clone(), client.clone())));
    tools.register(Arc::new(OptimizeMemoryTool::new(
        store.clone(),
        client.clone(),
    )));
    tools.register(Arc::new(ScheduleTool::new(scheduler.clone(), store.clone())));
    tools.register(Arc::new(PersonalityTool::new(store.clone())));
    tools.register(Arc::new(SubAgentTool::new(
        sub_agents.clone(),
        vision.clone(),
    )));
    tools.register(Arc::new(AgentListTool::new(sub_agents.clone())));
    tools.register(Arc::new(DefineAgentTool::new(sub_agents.clone())));
    tools.register(Arc::new(CouncilTool::new(councils.clone())));
    tools.register(Arc::new(WebhookTool::new(store.clone())));
    tools.register(Arc::new(SendMessageTool::new(store.clone())));
    tools.register(Arc::new(InboxTool::new(store.clone())));

    info!("model: {} via {}", model, chat_url);

    let state = AppState {
        agent,
        thinking,
        vision,
        tools,
        sub_agents,
        councils,
        store,
        api_key,
    };
    ApiServer::new(state, &addr).serve().await
}
