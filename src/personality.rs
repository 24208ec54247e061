//! Personality registry: the five fixed identities and their runtime state.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identity tag of one of the five personalities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonalityId {
    /// Coordinator and final decision maker.
    Director,
    /// Analysis and risk assessment.
    Logic,
    /// Creative ideas and user experience.
    Spark,
    /// Quality assurance and review.
    Guardian,
    /// Practical implementation.
    Builder,
}

impl PersonalityId {
    /// All personalities in registry order.
    pub const ALL: [PersonalityId; 5] = [
        PersonalityId::Director,
        PersonalityId::Logic,
        PersonalityId::Spark,
        PersonalityId::Guardian,
        PersonalityId::Builder,
    ];

    /// Short id used in tool arguments and resource URIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonalityId::Director => "director",
            PersonalityId::Logic => "logic",
            PersonalityId::Spark => "spark",
            PersonalityId::Guardian => "guardian",
            PersonalityId::Builder => "builder",
        }
    }

    /// Position in registry order.
    pub fn index(&self) -> usize {
        match self {
            PersonalityId::Director => 0,
            PersonalityId::Logic => 1,
            PersonalityId::Spark => 2,
            PersonalityId::Guardian => 3,
            PersonalityId::Builder => 4,
        }
    }

    /// Immutable identity record for this personality.
    pub fn identity(&self) -> PersonalityIdentity {
        match self {
            PersonalityId::Director => PersonalityIdentity {
                id: *self,
                display_name: "Director",
                role: "Project Manager & Coordinator",
                style: "Professional, decisive, diplomatic",
                description: "Coordinates the team, delegates tasks and makes the final call \
                              once every voice has been heard.",
            },
            PersonalityId::Logic => PersonalityIdentity {
                id: *self,
                display_name: "Logic",
                role: "Data Analyst & Strategic Thinker",
                style: "Logical, precise, evidence-based",
                description: "Interprets data, assesses risk and plans strategy from facts \
                              rather than intuition.",
            },
            PersonalityId::Spark => PersonalityIdentity {
                id: *self,
                display_name: "Spark",
                role: "Creative Innovator & Solution Designer",
                style: "Imaginative, inspiring, enthusiastic",
                description: "Proposes unconventional ideas with an eye for user experience \
                              and aesthetics.",
            },
            PersonalityId::Guardian => PersonalityIdentity {
                id: *self,
                display_name: "Guardian",
                role: "Quality Assurance & Process Optimizer",
                style: "Constructive, thorough, quality-focused",
                description: "Challenges assumptions, finds flaws early and holds the work \
                              to a quality bar.",
            },
            PersonalityId::Builder => PersonalityIdentity {
                id: *self,
                display_name: "Builder",
                role: "Implementation Specialist & Problem Solver",
                style: "Practical, action-oriented, solution-focused",
                description: "Turns plans into working results and sorts out the technical \
                              details of delivery.",
            },
        }
    }
}

impl fmt::Display for PersonalityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersonalityId {
    type Err = Error;

    /// Parses a short id only; aliases go through [`AliasTable`].
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase();
        PersonalityId::ALL
            .into_iter()
            .find(|id| id.as_str() == normalized)
            .ok_or_else(|| Error::UnknownPersonality(s.to_string()))
    }
}

/// Immutable description of a personality.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonalityIdentity {
    /// Identity tag.
    pub id: PersonalityId,
    /// Name shown to users.
    #[serde(rename = "name")]
    pub display_name: &'static str,
    /// Team role.
    pub role: &'static str,
    /// Communication style.
    pub style: &'static str,
    /// Longer description of the personality's focus.
    pub description: &'static str,
}

/// Runtime status of a personality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonalityStatus {
    Idle,
    Consulting,
    Working,
    Reviewing,
}

impl PersonalityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonalityStatus::Idle => "idle",
            PersonalityStatus::Consulting => "consulting",
            PersonalityStatus::Working => "working",
            PersonalityStatus::Reviewing => "reviewing",
        }
    }
}

impl fmt::Display for PersonalityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task handed to a personality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignedTask {
    /// Task description.
    pub task: String,
    /// Priority label.
    pub priority: String,
    /// When the task was assigned.
    pub assigned_at: DateTime<Utc>,
}

/// Mutable state of one personality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityState {
    /// Current status.
    pub status: PersonalityStatus,
    /// Task currently being worked on.
    pub current_task: Option<String>,
    /// Priority of the current task.
    pub current_priority: Option<String>,
    /// Last time an operation touched this personality.
    pub last_activity: Option<DateTime<Utc>>,
    /// Every task assigned so far, oldest first.
    pub tasks: Vec<AssignedTask>,
    /// Number of operations that involved this personality.
    pub interactions: u64,
}

impl Default for PersonalityState {
    fn default() -> Self {
        Self {
            status: PersonalityStatus::Idle,
            current_task: None,
            current_priority: None,
            last_activity: None,
            tasks: Vec::new(),
            interactions: 0,
        }
    }
}

/// Identity and state of a personality at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonalitySnapshot {
    #[serde(flatten)]
    pub identity: PersonalityIdentity,
    #[serde(flatten)]
    pub state: PersonalityState,
}

/// Maps role aliases onto personality ids.
#[derive(Debug, Clone)]
pub struct AliasTable {
    aliases: HashMap<String, PersonalityId>,
}

impl AliasTable {
    /// Empty table; only short ids resolve.
    pub fn empty() -> Self {
        Self {
            aliases: HashMap::new(),
        }
    }

    /// Add or replace an alias.
    pub fn insert(&mut self, alias: impl AsRef<str>, id: PersonalityId) {
        self.aliases.insert(normalize(alias.as_ref()), id);
    }

    /// Parse a `NAME=ID` entry, e.g. `qa=guardian`.
    pub fn parse_entry(entry: &str) -> Result<(String, PersonalityId)> {
        let (alias, id) = entry
            .split_once('=')
            .ok_or_else(|| Error::Validation(format!("alias must be NAME=ID: {}", entry)))?;
        let alias = normalize(alias);
        if alias.is_empty() {
            return Err(Error::Validation(format!("empty alias name: {}", entry)));
        }
        Ok((alias, id.parse()?))
    }

    /// Resolve a short id or alias. Case and surrounding whitespace are ignored.
    pub fn resolve(&self, name: &str) -> Option<PersonalityId> {
        let normalized = normalize(name);
        normalized
            .parse::<PersonalityId>()
            .ok()
            .or_else(|| self.aliases.get(&normalized).copied())
    }

    /// Aliases pointing at `id`, sorted.
    pub fn aliases_for(&self, id: PersonalityId) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .aliases
            .iter()
            .filter(|(_, target)| **target == id)
            .map(|(alias, _)| alias.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.insert("manager", PersonalityId::Director);
        table.insert("analyst", PersonalityId::Logic);
        table.insert("creative", PersonalityId::Spark);
        table.insert("critic", PersonalityId::Guardian);
        table.insert("implementer", PersonalityId::Builder);
        table
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Owns the runtime state of all five personalities.
pub struct PersonalityRegistry {
    /// State per personality, indexed by [`PersonalityId::index`].
    states: Vec<PersonalityState>,
    aliases: AliasTable,
}

impl PersonalityRegistry {
    /// Create a registry with the default alias table.
    pub fn new() -> Self {
        Self::with_aliases(AliasTable::default())
    }

    /// Create a registry with a custom alias table.
    pub fn with_aliases(aliases: AliasTable) -> Self {
        Self {
            states: PersonalityId::ALL
                .iter()
                .map(|_| PersonalityState::default())
                .collect(),
            aliases,
        }
    }

    /// Alias table in use.
    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Resolve an id or alias to a personality.
    pub fn resolve(&self, name: &str) -> Result<PersonalityId> {
        self.aliases
            .resolve(name)
            .ok_or_else(|| Error::UnknownPersonality(name.to_string()))
    }

    /// Look up a personality's state by id or alias.
    pub fn get(&self, name: &str) -> Result<&PersonalityState> {
        let id = self.resolve(name)?;
        Ok(self.state(id))
    }

    /// State of a resolved personality.
    pub fn state(&self, id: PersonalityId) -> &PersonalityState {
        &self.states[id.index()]
    }

    fn state_mut(&mut self, id: PersonalityId) -> &mut PersonalityState {
        &mut self.states[id.index()]
    }

    /// Set a personality's status and record activity.
    pub fn set_status(&mut self, id: PersonalityId, status: PersonalityStatus) {
        let state = self.state_mut(id);
        state.status = status;
        state.last_activity = Some(Utc::now());
    }

    /// Mark the start of an operation involving `id`. Returns the status to restore.
    pub fn begin_activity(
        &mut self,
        id: PersonalityId,
        status: PersonalityStatus,
    ) -> PersonalityStatus {
        let prior = self.state(id).status;
        self.set_status(id, status);
        self.state_mut(id).interactions += 1;
        prior
    }

    /// Mark the end of an operation involving `id`.
    pub fn finish_activity(&mut self, id: PersonalityId, restore: PersonalityStatus) {
        self.set_status(id, restore);
    }

    /// Hand a task to a personality; it becomes the current task.
    pub fn assign_task(
        &mut self,
        id: PersonalityId,
        task: impl Into<String>,
        priority: impl Into<String>,
    ) -> &PersonalityState {
        let task = task.into();
        let priority = priority.into();
        let now = Utc::now();

        let state = self.state_mut(id);
        state.tasks.push(AssignedTask {
            task: task.clone(),
            priority: priority.clone(),
            assigned_at: now,
        });
        state.current_task = Some(task);
        state.current_priority = Some(priority);
        state.status = PersonalityStatus::Working;
        state.last_activity = Some(now);
        state.interactions += 1;
        state
    }

    /// Snapshot of one personality.
    pub fn snapshot(&self, id: PersonalityId) -> PersonalitySnapshot {
        PersonalitySnapshot {
            identity: id.identity(),
            state: self.state(id).clone(),
        }
    }

    /// Snapshot of every personality in registry order.
    pub fn snapshot_all(&self) -> Vec<PersonalitySnapshot> {
        PersonalityId::ALL
            .iter()
            .map(|id| self.snapshot(*id))
            .collect()
    }
}

impl Default for PersonalityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_order() {
        let registry = PersonalityRegistry::new();
        let ids: Vec<_> = registry
            .snapshot_all()
            .iter()
            .map(|s| s.identity.id.as_str())
            .collect();
        assert_eq!(ids, ["director", "logic", "spark", "guardian", "builder"]);
        for (i, id) in PersonalityId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i);
        }
    }

    #[test]
    fn test_alias_resolution() {
        let registry = PersonalityRegistry::new();
        let pairs = [
            ("manager", PersonalityId::Director),
            ("analyst", PersonalityId::Logic),
            ("creative", PersonalityId::Spark),
            ("critic", PersonalityId::Guardian),
            ("implementer", PersonalityId::Builder),
        ];
        for (alias, id) in pairs {
            assert_eq!(registry.resolve(alias).unwrap(), id);
            assert_eq!(registry.resolve(id.as_str()).unwrap(), id);
            // Resolving the resolved id is a fixed point.
            let once = registry.resolve(alias).unwrap();
            assert_eq!(registry.resolve(once.as_str()).unwrap(), once);
        }
        assert_eq!(registry.resolve("  Analyst ").unwrap(), PersonalityId::Logic);
    }

    #[test]
    fn test_unknown_personality() {
        let registry = PersonalityRegistry::new();
        assert!(matches!(
            registry.resolve("wizard"),
            Err(Error::UnknownPersonality(_))
        ));
        assert!(registry.get("").is_err());
    }

    #[test]
    fn test_custom_alias_entry() {
        let (alias, id) = AliasTable::parse_entry("QA=guardian").unwrap();
        assert_eq!(alias, "qa");
        assert_eq!(id, PersonalityId::Guardian);

        let mut table = AliasTable::default();
        table.insert(alias, id);
        assert_eq!(table.resolve("qa"), Some(PersonalityId::Guardian));
        assert_eq!(table.aliases_for(PersonalityId::Guardian), ["critic", "qa"]);

        assert!(AliasTable::parse_entry("qa").is_err());
        assert!(AliasTable::parse_entry("qa=nobody").is_err());
        assert!(AliasTable::parse_entry("=logic").is_err());
    }

    #[test]
    fn test_assign_task() {
        let mut registry = PersonalityRegistry::new();
        let state = registry.assign_task(PersonalityId::Builder, "build endpoint", "high");
        assert_eq!(state.status, PersonalityStatus::Working);
        assert_eq!(state.current_task.as_deref(), Some("build endpoint"));
        assert_eq!(state.current_priority.as_deref(), Some("high"));
        assert!(state.last_activity.is_some());
        assert_eq!(state.tasks.len(), 1);

        // Other personalities untouched.
        assert_eq!(registry.state(PersonalityId::Logic), &PersonalityState::default());
    }

    #[test]
    fn test_activity_restores_prior_status() {
        let mut registry = PersonalityRegistry::new();
        registry.assign_task(PersonalityId::Builder, "ship it", "medium");

        let prior = registry.begin_activity(PersonalityId::Builder, PersonalityStatus::Consulting);
        assert_eq!(registry.state(PersonalityId::Builder).status, PersonalityStatus::Consulting);
        registry.finish_activity(PersonalityId::Builder, prior);
        assert_eq!(registry.state(PersonalityId::Builder).status, PersonalityStatus::Working);
        assert_eq!(registry.state(PersonalityId::Builder).interactions, 2);
    }

    #[test]
    fn test_snapshot_serializes_flat() {
        let registry = PersonalityRegistry::new();
        let value = serde_json::to_value(registry.snapshot(PersonalityId::Spark)).unwrap();
        assert_eq!(value["id"], "spark");
        assert_eq!(value["name"], "Spark");
        assert_eq!(value["status"], "idle");
        assert!(value["current_task"].is_null());
    }
}
