//! Tool definitions for personality-mcp.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::coordinator::{Contribution, Coordinator};
use crate::error::{Error, Result};
use crate::personality::PersonalityId;
use crate::protocol::{ToolCallResult, ToolDefinition};

/// Tool trait for implementing MCP tools.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool definition.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with the given arguments.
    ///
    /// Arguments are validated before the coordinator is touched.
    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<ToolCallResult>;
}

/// Context passed to tools during execution.
pub struct ToolContext {
    /// Personality coordinator.
    pub coordinator: Arc<Coordinator>,
}

impl ToolContext {
    /// Create a new tool context.
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

/// Registry of available tools, in listing order.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    context: ToolContext,
}

impl ToolRegistry {
    /// Create a new tool registry with default tools.
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        let mut registry = Self {
            tools: Vec::new(),
            context: ToolContext::new(coordinator),
        };
        registry.register_default_tools();
        registry
    }

    /// Register default tools.
    fn register_default_tools(&mut self) {
        self.register(Arc::new(StartSessionTool));
        self.register(Arc::new(ConsultTool));
        self.register(Arc::new(ConsensusTool));
        self.register(Arc::new(FeedbackTool));
        self.register(Arc::new(AssignTaskTool));
        self.register(Arc::new(StatusTool));
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        self.tools.retain(|t| t.definition().name != name);
        self.tools.push(tool);
    }

    /// Get all tool definitions.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Execute a tool by name.
    pub async fn execute(&self, name: &str, arguments: Value) -> Result<ToolCallResult> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.definition().name == name)
            .ok_or_else(|| Error::UnknownTool(name.to_string()))?;

        tool.execute(arguments, &self.context).await
    }
}

// =============================================================================
// Tool Implementations
// =============================================================================

fn personality_schema(description: &str) -> Value {
    let ids: Vec<&str> = PersonalityId::ALL.iter().map(|id| id.as_str()).collect();
    json!({
        "type": "string",
        "description": format!(
            "{}. One of {} or a role alias (manager, analyst, creative, critic, implementer)",
            description,
            ids.join(", ")
        )
    })
}

/// Tool for starting a collaborative session.
pub struct StartSessionTool;

#[derive(Debug, Deserialize)]
struct StartSessionArgs {
    topic: String,
    initial_request: Option<String>,
}

#[async_trait::async_trait]
impl Tool for StartSessionTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "start_collaborative_session".into(),
            description: "Start a new collaborative session with all personalities. Replaces any active session.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "topic": {
                        "type": "string",
                        "description": "The main topic or project to work on"
                    },
                    "initial_request": {
                        "type": "string",
                        "description": "The initial request or problem to solve"
                    }
                },
                "required": ["topic"]
            }),
        }
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<ToolCallResult> {
        let args: StartSessionArgs = parse_args(arguments)?;
        let topic = require_text("topic", args.topic)?;

        let started = context
            .coordinator
            .start_collaborative_session(topic, optional_text(args.initial_request))
            .await;

        let mut text = format!(
            "# Collaborative Session Started\n\n**ID:** `{}`\n**Topic:** {}\n",
            started.session.id, started.session.topic
        );
        if let Some(request) = &started.session.initial_request {
            text.push_str(&format!("**Initial request:** {}\n", request));
        }
        if let Some(previous) = &started.previous_session {
            text.push_str(&format!("**Replaced session:** `{}`\n", previous));
        }
        text.push_str("\n## Acknowledgements\n\n");
        text.push_str(&render_contributions(&started.acknowledgements));

        Ok(ToolCallResult::text_with_structure(
            text,
            serde_json::to_value(&started)?,
        ))
    }
}

/// Tool for consulting one personality.
pub struct ConsultTool;

#[derive(Debug, Deserialize)]
struct ConsultArgs {
    personality: String,
    question: String,
    context: Option<String>,
}

#[async_trait::async_trait]
impl Tool for ConsultTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "consult_personality".into(),
            description: "Consult a specific personality for their input.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "personality": personality_schema("The personality to consult"),
                    "question": {
                        "type": "string",
                        "description": "The question or request for the personality"
                    },
                    "context": {
                        "type": "string",
                        "description": "Additional context for the question"
                    }
                },
                "required": ["personality", "question"]
            }),
        }
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<ToolCallResult> {
        let args: ConsultArgs = parse_args(arguments)?;
        let personality = require_text("personality", args.personality)?;
        let question = require_text("question", args.question)?;

        let consultation = context
            .coordinator
            .consult_personality(&personality, question, optional_text(args.context))
            .await?;

        let answer = &consultation.answer;
        let text = format!(
            "**{} ({}):**\n\n{}\n\n_Status: {}_",
            answer.name,
            answer.role,
            answer.text(),
            consultation.state.state.status
        );

        Ok(ToolCallResult::text_with_structure(
            text,
            serde_json::to_value(&consultation)?,
        ))
    }
}

/// Tool for collecting every personality's view on a topic.
pub struct ConsensusTool;

#[derive(Debug, Deserialize)]
struct ConsensusArgs {
    topic: String,
    details: Option<String>,
}

#[async_trait::async_trait]
impl Tool for ConsensusTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_team_consensus".into(),
            description: "Get every personality's independent perspective on a topic.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "topic": {
                        "type": "string",
                        "description": "The topic to get consensus on"
                    },
                    "details": {
                        "type": "string",
                        "description": "Detailed description of the topic"
                    }
                },
                "required": ["topic"]
            }),
        }
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<ToolCallResult> {
        let args: ConsensusArgs = parse_args(arguments)?;
        let topic = require_text("topic", args.topic)?;

        let consensus = context
            .coordinator
            .get_team_consensus(topic, optional_text(args.details))
            .await;

        let text = format!(
            "# Team Consensus on: {}\n\n{}",
            consensus.topic,
            render_contributions(&consensus.contributions)
        );

        Ok(ToolCallResult::text_with_structure(
            text,
            serde_json::to_value(&consensus)?,
        ))
    }
}

/// Tool for collecting feedback on a proposal.
pub struct FeedbackTool;

#[derive(Debug, Deserialize)]
struct FeedbackArgs {
    proposal: String,
    #[serde(default)]
    focus_areas: Option<Vec<String>>,
}

#[async_trait::async_trait]
impl Tool for FeedbackTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "personality_feedback".into(),
            description: "Get feedback from every personality on a proposal or idea.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "proposal": {
                        "type": "string",
                        "description": "The proposal or idea to get feedback on"
                    },
                    "focus_areas": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Specific areas to focus feedback on"
                    }
                },
                "required": ["proposal"]
            }),
        }
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<ToolCallResult> {
        let args: FeedbackArgs = parse_args(arguments)?;
        let proposal = require_text("proposal", args.proposal)?;
        let focus_areas: Vec<String> = args
            .focus_areas
            .unwrap_or_default()
            .into_iter()
            .filter_map(|area| optional_text(Some(area)))
            .collect();

        let feedback = context
            .coordinator
            .personality_feedback(proposal, focus_areas)
            .await;

        let mut text = format!("# Feedback on Proposal\n\n{}\n\n", feedback.proposal);
        if !feedback.focus_areas.is_empty() {
            text.push_str(&format!("**Focus:** {}\n\n", feedback.focus_areas.join(", ")));
        }
        text.push_str(&render_contributions(&feedback.feedback));

        Ok(ToolCallResult::text_with_structure(
            text,
            serde_json::to_value(&feedback)?,
        ))
    }
}

/// Tool for assigning a task to a personality.
pub struct AssignTaskTool;

#[derive(Debug, Deserialize)]
struct AssignTaskArgs {
    personality: String,
    task: String,
    priority: Option<String>,
}

#[async_trait::async_trait]
impl Tool for AssignTaskTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "assign_task".into(),
            description: "Assign a specific task to a personality.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "personality": personality_schema("The personality to assign the task to"),
                    "task": {
                        "type": "string",
                        "description": "The task to assign"
                    },
                    "priority": {
                        "type": "string",
                        "description": "Task priority label, e.g. high, medium, low (default: medium)"
                    }
                },
                "required": ["personality", "task"]
            }),
        }
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<ToolCallResult> {
        let args: AssignTaskArgs = parse_args(arguments)?;
        let personality = require_text("personality", args.personality)?;
        let task = require_text("task", args.task)?;

        let assignment = context
            .coordinator
            .assign_task(&personality, task, args.priority)
            .await?;

        let ack = &assignment.acknowledgement;
        let text = format!(
            "Task assigned to {} [{}]: {}\n\n**{}'s Response:**\n\n{}",
            ack.name,
            assignment.priority.to_uppercase(),
            assignment.task,
            ack.name,
            ack.text()
        );

        Ok(ToolCallResult::text_with_structure(
            text,
            serde_json::to_value(&assignment)?,
        ))
    }
}

/// Tool for reporting the status of every personality.
pub struct StatusTool;

#[async_trait::async_trait]
impl Tool for StatusTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_personality_status".into(),
            description: "Get the current status of all personalities.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    async fn execute(&self, _arguments: Value, context: &ToolContext) -> Result<ToolCallResult> {
        let report = context.coordinator.get_personality_status().await;

        let mut text = String::from("# Personality Status Report\n\n");
        for p in &report.personalities {
            text.push_str(&format!(
                "## {} ({})\n\n- Status: {}\n- Current task: {}\n- Assigned tasks: {}\n- Interactions: {}\n- Last activity: {}\n",
                p.identity.display_name,
                p.identity.role,
                p.state.status,
                p.state.current_task.as_deref().unwrap_or("none"),
                p.state.tasks.len(),
                p.state.interactions,
                p.state
                    .last_activity
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "never".into()),
            ));
            for task in p.state.tasks.iter().rev().take(3) {
                text.push_str(&format!("  - [{}] {}\n", task.priority.to_uppercase(), task.task));
            }
            text.push('\n');
        }

        match &report.session {
            Some(session) => text.push_str(&format!(
                "## Current Session\n\n- Topic: {}\n- Status: {:?}\n- Started: {}\n",
                session.topic,
                session.status,
                session.started_at.format("%Y-%m-%d %H:%M:%S")
            )),
            None => text.push_str("## Current Session\n\nNo active session.\n"),
        }

        Ok(ToolCallResult::text_with_structure(
            text,
            serde_json::to_value(&report)?,
        ))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Deserialize tool arguments, treating a missing object as empty.
fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T> {
    let arguments = if arguments.is_null() { json!({}) } else { arguments };
    serde_json::from_value(arguments).map_err(|e| Error::Validation(e.to_string()))
}

/// Reject blank required strings.
fn require_text(field: &str, value: String) -> Result<String> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("`{}` must not be empty", field)));
    }
    Ok(value)
}

/// Blank optional strings count as absent.
fn optional_text(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn render_contributions(contributions: &[Contribution]) -> String {
    contributions
        .iter()
        .map(|c| format!("### {} ({})\n\n{}", c.name, c.role, c.text()))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
