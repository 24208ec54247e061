//! Coordinator for multi-personality collaboration.
//!
//! Every public operation runs as one transaction under a single lock that
//! covers both the personality registry and the session store, so no partial
//! result is visible to a later request.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::generator::{InteractionKind, ResponseGenerator, TemplateGenerator};
use crate::personality::{
    PersonalityId, PersonalityIdentity, PersonalityRegistry, PersonalitySnapshot,
    PersonalityStatus,
};
use crate::session::{EventKind, InteractionEvent, Session, SessionStore};

/// Interactions per other personality included in a personality context.
const RECENT_TEAM_INTERACTIONS: usize = 3;

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Bounded wait for a single generator call.
    pub generation_timeout: Duration,
    /// Priority recorded when `assign_task` omits one.
    pub default_priority: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            generation_timeout: Duration::from_secs(30),
            default_priority: "medium".into(),
        }
    }
}

/// State mutated by operations. Always accessed as a unit.
struct CoordinatorState {
    registry: PersonalityRegistry,
    store: SessionStore,
}

/// Routes operations across the personalities and records history.
pub struct Coordinator {
    state: Arc<Mutex<CoordinatorState>>,
    generator: Arc<dyn ResponseGenerator>,
    config: CoordinatorConfig,
}

impl Coordinator {
    /// Create a coordinator with the templated generator and default configuration.
    pub fn new() -> Self {
        Self::with_generator(Arc::new(TemplateGenerator::new()))
    }

    /// Create a coordinator with a custom generator.
    pub fn with_generator(generator: Arc<dyn ResponseGenerator>) -> Self {
        Self::with_parts(
            PersonalityRegistry::new(),
            SessionStore::new(),
            generator,
            CoordinatorConfig::default(),
        )
    }

    /// Create a coordinator from explicitly constructed parts.
    pub fn with_parts(
        registry: PersonalityRegistry,
        store: SessionStore,
        generator: Arc<dyn ResponseGenerator>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(CoordinatorState { registry, store })),
            generator,
            config,
        }
    }

    /// Ask one personality for a reply. Failures and timeouts become a placeholder.
    async fn generate_one(
        &self,
        identity: &PersonalityIdentity,
        kind: InteractionKind,
        input: &str,
    ) -> Contribution {
        let call = self.generator.generate(identity, kind, input);
        let result = match tokio::time::timeout(self.config.generation_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "{} did not respond within {:?}",
                identity.display_name, self.config.generation_timeout
            ))),
        };

        match result {
            Ok(text) => Contribution::answered(identity, text),
            Err(e) => {
                if e.is_generation_failure() {
                    warn!("{} generation failed for {}: {}", kind, identity.id, e);
                } else {
                    error!("{} generator error for {}: {}", kind, identity.id, e);
                }
                Contribution::failed(identity, &e)
            }
        }
    }

    /// Ask every personality concurrently; results come back in registry order.
    async fn fan_out(
        &self,
        kind: InteractionKind,
        input_for: impl Fn(&PersonalityIdentity) -> String,
    ) -> Vec<Contribution> {
        let identities: Vec<PersonalityIdentity> =
            PersonalityId::ALL.iter().map(|id| id.identity()).collect();
        let inputs: Vec<String> = identities.iter().map(&input_for).collect();

        join_all(
            identities
                .iter()
                .zip(inputs.iter())
                .map(|(identity, input)| self.generate_one(identity, kind, input)),
        )
        .await
    }

    /// Start a collaborative session with all personalities.
    ///
    /// Any active session is archived. One personality failing to acknowledge
    /// does not prevent the session from starting.
    pub async fn start_collaborative_session(
        &self,
        topic: impl Into<String>,
        initial_request: Option<String>,
    ) -> SessionStarted {
        let topic = topic.into();
        let mut state = self.state.lock().await;

        let prompt = match &initial_request {
            Some(request) => format!(
                "A new collaborative session has started. Topic: {}. Initial request: {}",
                topic, request
            ),
            None => format!("A new collaborative session has started. Topic: {}", topic),
        };

        let priors = begin_all(&mut state.registry, PersonalityStatus::Consulting);
        let acknowledgements = self
            .fan_out(InteractionKind::SessionStart, |_| prompt.clone())
            .await;
        finish_all(&mut state.registry, priors);

        let previous_session = state
            .store
            .current_session()
            .filter(|s| s.is_active())
            .map(|s| s.id.clone());
        let session = state
            .store
            .start_session(topic, initial_request, json!(acknowledgements))
            .clone();

        info!(session_id = %session.id, topic = %session.topic, "Collaborative session started");

        SessionStarted {
            session,
            previous_session,
            acknowledgements,
        }
    }

    /// Ask a single personality a question.
    pub async fn consult_personality(
        &self,
        personality: &str,
        question: impl Into<String>,
        context: Option<String>,
    ) -> Result<Consultation> {
        let question = question.into();
        let mut state = self.state.lock().await;
        let id = state.registry.resolve(personality)?;

        let input = match &context {
            Some(ctx) => format!("{}\n\nContext: {}", question, ctx),
            None => question.clone(),
        };

        let prior = state
            .registry
            .begin_activity(id, PersonalityStatus::Consulting);
        let answer = self
            .generate_one(&id.identity(), InteractionKind::Consult, &input)
            .await;
        state.registry.finish_activity(id, prior);

        let event_index = state
            .store
            .append_event(
                EventKind::Consultation,
                Some(id),
                json!({
                    "input": { "question": question, "context": context },
                    "output": answer,
                }),
            )
            .index;

        info!(personality = %id, "Consultation complete");

        Ok(Consultation {
            personality: id,
            question,
            answer,
            state: state.registry.snapshot(id),
            event_index,
        })
    }

    /// Collect every personality's independent view on a topic.
    pub async fn get_team_consensus(
        &self,
        topic: impl Into<String>,
        details: Option<String>,
    ) -> TeamConsensus {
        let topic = topic.into();
        let mut state = self.state.lock().await;

        let subject = match &details {
            Some(d) => format!("Topic: {}\n\nDetails: {}", topic, d),
            None => format!("Topic: {}", topic),
        };

        let priors = begin_all(&mut state.registry, PersonalityStatus::Consulting);
        let contributions = self
            .fan_out(InteractionKind::Consensus, |identity| {
                format!(
                    "Please give your perspective as {} for team consensus.\n\n{}",
                    identity.role, subject
                )
            })
            .await;
        finish_all(&mut state.registry, priors);

        let event_index = state
            .store
            .append_team_event(
                EventKind::Consensus,
                PersonalityId::ALL.to_vec(),
                json!({
                    "input": { "topic": topic, "details": details },
                    "output": contributions,
                }),
            )
            .index;

        info!(topic = %topic, failed = count_failed(&contributions), "Team consensus collected");

        TeamConsensus {
            topic,
            details,
            contributions,
            event_index,
        }
    }

    /// Collect every personality's feedback on a proposal.
    pub async fn personality_feedback(
        &self,
        proposal: impl Into<String>,
        focus_areas: Vec<String>,
    ) -> TeamFeedback {
        let proposal = proposal.into();
        let mut state = self.state.lock().await;

        let input = if focus_areas.is_empty() {
            format!("Please provide feedback on this proposal: {}", proposal)
        } else {
            format!(
                "Please provide feedback on this proposal: {}\n\nPlease focus on: {}",
                proposal,
                focus_areas.join(", ")
            )
        };

        let priors = begin_all(&mut state.registry, PersonalityStatus::Reviewing);
        let feedback = self
            .fan_out(InteractionKind::Feedback, |_| input.clone())
            .await;
        finish_all(&mut state.registry, priors);

        let event_index = state
            .store
            .append_team_event(
                EventKind::Feedback,
                PersonalityId::ALL.to_vec(),
                json!({
                    "input": { "proposal": proposal, "focus_areas": focus_areas },
                    "output": feedback,
                }),
            )
            .index;

        info!(failed = count_failed(&feedback), "Team feedback collected");

        TeamFeedback {
            proposal,
            focus_areas,
            feedback,
            event_index,
        }
    }

    /// Hand a task to one personality.
    pub async fn assign_task(
        &self,
        personality: &str,
        task: impl Into<String>,
        priority: Option<String>,
    ) -> Result<TaskAssignment> {
        let task = task.into();
        let mut state = self.state.lock().await;
        let id = state.registry.resolve(personality)?;

        let priority = priority
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| self.config.default_priority.clone());

        state.registry.assign_task(id, task.clone(), priority.clone());

        let input = format!(
            "You have been assigned a new task: {}. Priority: {}. Please acknowledge and outline your approach.",
            task, priority
        );
        let acknowledgement = self
            .generate_one(&id.identity(), InteractionKind::Task, &input)
            .await;

        let event_index = state
            .store
            .append_event(
                EventKind::TaskAssignment,
                Some(id),
                json!({
                    "input": { "task": task, "priority": priority },
                    "output": acknowledgement,
                }),
            )
            .index;

        info!(personality = %id, priority = %priority, "Task assigned");

        Ok(TaskAssignment {
            personality: id,
            task,
            priority,
            acknowledgement,
            state: state.registry.snapshot(id),
            event_index,
        })
    }

    /// Snapshot every personality and the active session.
    ///
    /// Personality state is left untouched; the query itself is recorded in history.
    pub async fn get_personality_status(&self) -> StatusReport {
        let mut state = self.state.lock().await;

        let personalities = state.registry.snapshot_all();
        let session = state.store.current_session().cloned();

        let statuses: Vec<_> = personalities
            .iter()
            .map(|p| json!({ "id": p.identity.id, "status": p.state.status }))
            .collect();
        let session_id = session.as_ref().map(|s| s.id.clone());

        let event_index = state
            .store
            .append_event(
                EventKind::StatusQuery,
                None,
                json!({
                    "input": {},
                    "output": { "statuses": statuses, "session_id": session_id },
                }),
            )
            .index;

        debug!("Status query recorded at {}", event_index);

        StatusReport {
            personalities,
            session,
            history_len: state.store.len(),
        }
    }

    /// Identity, state and recent team activity for one personality. Read-only.
    pub async fn personality_context(&self, personality: &str) -> Result<PersonalityContext> {
        let state = self.state.lock().await;
        let id = state.registry.resolve(personality)?;

        // Team events involve several others; key by index so each appears once.
        let mut recent: BTreeMap<usize, &InteractionEvent> = BTreeMap::new();
        for other in PersonalityId::ALL.iter().filter(|other| **other != id) {
            let theirs: Vec<&InteractionEvent> = state
                .store
                .history()
                .filter(|e| e.involves(*other))
                .collect();
            let skip = theirs.len().saturating_sub(RECENT_TEAM_INTERACTIONS);
            recent.extend(theirs[skip..].iter().map(|e| (e.index, *e)));
        }
        let recent_team_interactions: Vec<InteractionEvent> =
            recent.into_values().cloned().collect();

        Ok(PersonalityContext {
            personality: state.registry.snapshot(id),
            aliases: state
                .registry
                .aliases()
                .aliases_for(id)
                .into_iter()
                .map(String::from)
                .collect(),
            recent_team_interactions,
            session: state.store.current_session().cloned(),
        })
    }

    /// Current session and the sessions it replaced. Read-only.
    pub async fn session_overview(&self) -> SessionOverview {
        let state = self.state.lock().await;
        SessionOverview {
            current: state.store.current_session().cloned(),
            previous_sessions: state.store.archived_sessions().to_vec(),
        }
    }

    /// History from `since` onwards. Read-only.
    pub async fn history(&self, since: usize) -> Vec<InteractionEvent> {
        let state = self.state.lock().await;
        state.store.history_since(since).cloned().collect()
    }

    /// Number of events recorded so far.
    pub async fn history_len(&self) -> usize {
        self.state.lock().await.store.len()
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Coordinator {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            generator: self.generator.clone(),
            config: self.config.clone(),
        }
    }
}

fn begin_all(
    registry: &mut PersonalityRegistry,
    status: PersonalityStatus,
) -> Vec<(PersonalityId, PersonalityStatus)> {
    PersonalityId::ALL
        .iter()
        .map(|id| (*id, registry.begin_activity(*id, status)))
        .collect()
}

fn finish_all(registry: &mut PersonalityRegistry, priors: Vec<(PersonalityId, PersonalityStatus)>) {
    for (id, prior) in priors {
        registry.finish_activity(id, prior);
    }
}

fn count_failed(contributions: &[Contribution]) -> usize {
    contributions.iter().filter(|c| c.is_failure()).count()
}

/// One personality's reply within an operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    /// Who answered.
    pub personality: PersonalityId,
    /// Display name.
    pub name: &'static str,
    /// Team role.
    pub role: &'static str,
    /// Generated text, absent when generation failed.
    pub response: Option<String>,
    /// Why generation failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Contribution {
    fn answered(identity: &PersonalityIdentity, text: String) -> Self {
        Self {
            personality: identity.id,
            name: identity.display_name,
            role: identity.role,
            response: Some(text),
            error: None,
        }
    }

    fn failed(identity: &PersonalityIdentity, error: &Error) -> Self {
        Self {
            personality: identity.id,
            name: identity.display_name,
            role: identity.role,
            response: None,
            error: Some(error.to_string()),
        }
    }

    /// Whether generation failed for this slot.
    pub fn is_failure(&self) -> bool {
        self.response.is_none()
    }

    /// Response text, or a placeholder for a failed slot.
    pub fn text(&self) -> String {
        match (&self.response, &self.error) {
            (Some(text), _) => text.clone(),
            (None, Some(error)) => format!("[no response: {}]", error),
            (None, None) => "[no response]".into(),
        }
    }
}

/// Result of starting a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStarted {
    pub session: Session,
    /// ID of the session this one replaced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_session: Option<String>,
    /// One acknowledgement per personality, in registry order.
    pub acknowledgements: Vec<Contribution>,
}

/// Result of consulting one personality.
#[derive(Debug, Clone, Serialize)]
pub struct Consultation {
    pub personality: PersonalityId,
    pub question: String,
    pub answer: Contribution,
    /// Personality state after the consultation.
    pub state: PersonalitySnapshot,
    pub event_index: usize,
}

/// Collated views of all personalities on a topic.
#[derive(Debug, Clone, Serialize)]
pub struct TeamConsensus {
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// One contribution per personality, in registry order.
    pub contributions: Vec<Contribution>,
    pub event_index: usize,
}

/// Collated feedback of all personalities on a proposal.
#[derive(Debug, Clone, Serialize)]
pub struct TeamFeedback {
    pub proposal: String,
    pub focus_areas: Vec<String>,
    /// One entry per personality, in registry order.
    pub feedback: Vec<Contribution>,
    pub event_index: usize,
}

/// Result of assigning a task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskAssignment {
    pub personality: PersonalityId,
    pub task: String,
    pub priority: String,
    pub acknowledgement: Contribution,
    pub state: PersonalitySnapshot,
    pub event_index: usize,
}

/// Status of every personality plus the active session.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub personalities: Vec<PersonalitySnapshot>,
    pub session: Option<Session>,
    pub history_len: usize,
}

/// Everything known about one personality.
#[derive(Debug, Clone, Serialize)]
pub struct PersonalityContext {
    pub personality: PersonalitySnapshot,
    pub aliases: Vec<String>,
    /// Latest interactions of the other personalities, oldest first.
    pub recent_team_interactions: Vec<InteractionEvent>,
    pub session: Option<Session>,
}

/// Current and archived sessions.
#[derive(Debug, Clone, Serialize)]
pub struct SessionOverview {
    pub current: Option<Session>,
    pub previous_sessions: Vec<Session>,
}
