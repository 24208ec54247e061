//! Multi-Personality Collaboration MCP Server
//!
//! This crate exposes five named personalities over the Model Context
//! Protocol. A client can:
//!
//! - Start a collaborative session with the whole team
//! - Consult one personality, or collect every personality's view at once
//! - Assign tasks and track each personality's runtime state
//! - Read personality state, the current session and the interaction history
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         MCP client                              │
//! └───────────────────────────┬─────────────────────────────────────┘
//!                             │ JSON-RPC 2.0 over stdio
//!                             ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  server (dispatch) ──► tools / resources                        │
//! │                              │                                  │
//! │                              ▼                                  │
//! │                        Coordinator                              │
//! │        ┌─────────────────────┼──────────────────────┐           │
//! │        ▼                     ▼                      ▼           │
//! │  PersonalityRegistry   SessionStore        ResponseGenerator    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # MCP Tools
//!
//! | Tool | Description |
//! |------|-------------|
//! | `start_collaborative_session` | Start a session with all personalities |
//! | `consult_personality` | Ask one personality (id or role alias) |
//! | `get_team_consensus` | Collate every personality's view on a topic |
//! | `personality_feedback` | Collate every personality's feedback on a proposal |
//! | `assign_task` | Hand a task to one personality |
//! | `get_personality_status` | Snapshot all personalities and the session |
//!
//! # MCP Resources
//!
//! `personality://{director|logic|spark|guardian|builder}`, `session://current`,
//! `session://history`.

pub mod coordinator;
pub mod error;
pub mod generator;
pub mod personality;
pub mod protocol;
pub mod resources;
pub mod server;
pub mod session;
pub mod tools;

pub use coordinator::{Coordinator, CoordinatorConfig};
pub use error::{Error, Result};
pub use generator::{InteractionKind, ResponseGenerator, TemplateGenerator};
pub use personality::{AliasTable, PersonalityId, PersonalityRegistry};
pub use protocol::{McpRequest, McpResponse};
pub use server::PersonalityMcpServer;
pub use session::{EventKind, InteractionEvent, Session, SessionStore};
