use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use cadre_agent::{
    build_root, typed_tool, AgentParts, CapabilityRegistry, HierarchyConfig, RunEvent, TypedTool,
};
use cadre_core::{CadreError, LlmRequest, LlmResponse, OutputType, ToolCallingLlm, ToolError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{mpsc, Mutex};
use tracing_subscriber::EnvFilter;

// --- Scripted models standing in for real providers ---

struct ScriptedModel {
    name: &'static str,
    responses: Mutex<VecDeque<LlmResponse>>,
}

impl ScriptedModel {
    fn new(name: &'static str, responses: Vec<LlmResponse>) -> Arc<Self> {
        Arc::new(Self {
            name,
            responses: Mutex::new(responses.into()),
        })
    }
}

#[async_trait]
impl ToolCallingLlm for ScriptedModel {
    async fn invoke(&self, request: LlmRequest) -> Result<LlmResponse, CadreError> {
        tracing::debug!(model = self.name, messages = request.messages.len(), "scripted turn");
        self.responses.lock().await.pop_front().ok_or_else(|| {
            CadreError::LlmProvider(format!("{} ran out of scripted responses", self.name))
        })
    }
}

fn call(id: &str, name: &str, args: serde_json::Value) -> LlmResponse {
    LlmResponse::tool_call(id, name, args)
}

// --- Stub tools ---

#[derive(Deserialize, JsonSchema)]
struct SearchArgs {
    /// Area or subject to look up.
    query: String,
}

struct SearchReports;

#[async_trait]
impl TypedTool for SearchReports {
    type Args = SearchArgs;
    type Output = Vec<String>;

    const NAME: &'static str = "search_reports";
    const DESCRIPTION: &'static str = "Full-text search over field reports.";

    fn output_type() -> OutputType {
        OutputType::Array
    }

    async fn run(&self, args: SearchArgs) -> Result<Vec<String>, ToolError> {
        if args.query.trim().is_empty() {
            return Err(ToolError::InvalidInput("query must not be empty".to_string()));
        }
        Ok(vec![
            format!("[0412] {}: bridge at Kessel repaired, open to heavy vehicles.", args.query),
            format!("[0415] {}: road north of Arlen flooded, expect 2 days.", args.query),
        ])
    }
}

#[derive(Deserialize, JsonSchema)]
struct InventoryArgs {
    item: String,
}

#[derive(Serialize)]
struct StockLevel {
    item: String,
    units: u32,
}

struct CheckInventory;

#[async_trait]
impl TypedTool for CheckInventory {
    type Args = InventoryArgs;
    type Output = StockLevel;

    const NAME: &'static str = "check_inventory";
    const DESCRIPTION: &'static str = "Returns the units in stock for a supply item.";

    fn output_type() -> OutputType {
        OutputType::Object
    }

    async fn run(&self, args: InventoryArgs) -> Result<StockLevel, ToolError> {
        let units = match args.item.as_str() {
            "fuel" => 1_800,
            "rations" => 12_000,
            _ => 0,
        };
        Ok(StockLevel {
            item: args.item,
            units,
        })
    }
}

#[derive(Deserialize, JsonSchema)]
struct BookingArgs {
    destination: String,
    vehicles: u32,
}

struct BookTransport;

#[async_trait]
impl TypedTool for BookTransport {
    type Args = BookingArgs;
    type Output = String;

    const NAME: &'static str = "book_transport";
    const DESCRIPTION: &'static str = "Books a convoy to a destination.";

    async fn run(&self, args: BookingArgs) -> Result<String, ToolError> {
        Ok(format!(
            "Convoy of {} vehicles booked to {}, departing 06:00.",
            args.vehicles, args.destination
        ))
    }
}

// --- Wiring ---

fn scripted_models() -> Vec<(&'static str, Arc<ScriptedModel>)> {
    let chief = ScriptedModel::new(
        "chief-scripted",
        vec![
            LlmResponse::text(
                "1. Ask the analyst about the northern corridor.\n\
                 2. Ask logistics to move fuel north.\n\
                 3. Brief the commander.\n<end_plan>",
            ),
            call(
                "c1",
                "intelligence_analyst",
                json!({"task": "Summarize the latest field reports on the northern corridor."}),
            ),
            call(
                "c2",
                "logistics_agent",
                json!({
                    "task": "Check fuel stock and book a convoy to the destination.",
                    "additional_args": {"destination": "Northern depot"}
                }),
            ),
            call(
                "c3",
                "final_answer",
                json!({"answer": "Briefing: Kessel bridge is open, the Arlen road is flooded for 2 days. \
                                 Fuel stock is 1800 units and a 4-vehicle convoy leaves for the northern depot at 06:00 via Kessel."}),
            ),
        ],
    );
    let analyst = ScriptedModel::new(
        "analyst-scripted",
        vec![
            call("a1", "search_reports", json!({"query": "northern corridor"})),
            call(
                "a2",
                "final_answer",
                json!({"answer": "Kessel bridge repaired; Arlen road flooded for about 2 days."}),
            ),
        ],
    );
    let logistics = ScriptedModel::new(
        "logistics-scripted",
        vec![
            call("l1", "check_inventory", json!("fuel")),
            call(
                "l2",
                "book_transport",
                json!({"destination": "destination", "vehicles": 4}),
            ),
            call("l3", "final_answer", json!({"answer": "Convoy booked; 1800 units of fuel available."})),
        ],
    );
    vec![
        ("chief-scripted", chief),
        ("analyst-scripted", analyst),
        ("logistics-scripted", logistics),
    ]
}

fn registry(events: mpsc::UnboundedSender<RunEvent>) -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    registry.register_tool(SearchReports::NAME, || Ok(typed_tool(SearchReports)));
    registry.register_tool(CheckInventory::NAME, || Ok(typed_tool(CheckInventory)));
    registry.register_tool(BookTransport::NAME, || Ok(typed_tool(BookTransport)));
    for (id, model) in scripted_models() {
        registry.register_model(id, model);
    }
    for agent in ["chief_of_staff", "intelligence_analyst", "logistics_agent"] {
        let events = events.clone();
        registry.register_agent(agent, move |parts: AgentParts| {
            parts
                .into_builder()
                .callback(Arc::new(events.clone()))
                .build()
        });
    }
    registry
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/hierarchy.yaml"));
    let config = HierarchyConfig::from_path(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let (sender, mut receiver) = mpsc::unbounded_channel::<RunEvent>();
    let printer = tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            match event {
                RunEvent::Planning { agent, plan, .. } => {
                    println!("[{agent}] plan:\n{plan}");
                }
                RunEvent::Action {
                    agent,
                    step_number,
                    tool,
                    observation,
                    failure,
                    ..
                } => {
                    let tool = tool.unwrap_or_else(|| "<none>".to_string());
                    let status = if failure.is_some() { "failed" } else { "ok" };
                    println!(
                        "[{agent}] step {step_number}: {tool} ({status}) -> {}",
                        observation.unwrap_or_default()
                    );
                }
                RunEvent::FinalAnswer { agent, answer } => {
                    println!("[{agent}] final answer: {answer}");
                }
            }
        }
    });

    let registry = registry(sender);
    let mut chief = build_root(&registry, &config)?;
    let output = chief
        .run("Can we move fuel to the northern depot this week?")
        .await?;

    // Dropping every sender lets the printer drain and stop.
    drop(chief);
    drop(registry);
    printer.await?;

    println!("\n{}", output.value.to_observation_text());
    println!("({} steps)", output.steps);
    Ok(())
}
