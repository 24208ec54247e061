//! Response generation seam.
//!
//! The coordinator only talks to [`ResponseGenerator`]. The bundled
//! [`TemplateGenerator`] produces canned, personality-flavoured text; a
//! language-model backend can be dropped in by implementing the trait.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::personality::{PersonalityId, PersonalityIdentity};

/// Kind of request a personality is answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    SessionStart,
    Consult,
    Consensus,
    Feedback,
    Task,
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InteractionKind::SessionStart => "session_start",
            InteractionKind::Consult => "consult",
            InteractionKind::Consensus => "consensus",
            InteractionKind::Feedback => "feedback",
            InteractionKind::Task => "task",
        };
        f.write_str(s)
    }
}

/// Produces text on behalf of a personality.
#[async_trait::async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Generate a reply from `identity` to `input`.
    async fn generate(
        &self,
        identity: &PersonalityIdentity,
        kind: InteractionKind,
        input: &str,
    ) -> Result<String>;
}

/// Deterministic templated replies, one voice per personality.
#[derive(Debug, Clone, Default)]
pub struct TemplateGenerator;

/// Characters of the input echoed back in a templated reply.
const EXCERPT_CHARS: usize = 100;

impl TemplateGenerator {
    pub fn new() -> Self {
        Self
    }

    fn excerpt(input: &str) -> String {
        let mut chars = input.chars();
        let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
        if chars.next().is_some() {
            format!("{}...", head)
        } else {
            head
        }
    }

    fn opening(identity: &PersonalityIdentity, kind: InteractionKind, excerpt: &str) -> String {
        match kind {
            InteractionKind::SessionStart => format!(
                "{} ({}) joining the session on \"{}\".",
                identity.display_name, identity.role, excerpt
            ),
            InteractionKind::Consult => format!(
                "{} here, answering \"{}\".",
                identity.display_name, excerpt
            ),
            InteractionKind::Consensus => format!(
                "{}'s position on \"{}\":",
                identity.display_name, excerpt
            ),
            InteractionKind::Feedback => format!(
                "{}'s feedback on \"{}\":",
                identity.display_name, excerpt
            ),
            InteractionKind::Task => format!(
                "{} acknowledges the task \"{}\".",
                identity.display_name, excerpt
            ),
        }
    }

    fn body(id: PersonalityId) -> &'static str {
        match id {
            PersonalityId::Director => {
                "- Logic frames the problem and the risks\n\
                 - Spark explores alternatives\n\
                 - Guardian reviews quality\n\
                 - Builder plans delivery\n\
                 I will pull the threads together into a recommendation."
            }
            PersonalityId::Logic => {
                "- Scope: pin down what is actually being asked\n\
                 - Risks: identify failure modes and their likelihood\n\
                 - Metrics: decide how success will be measured\n\
                 More data before committing to a design."
            }
            PersonalityId::Spark => {
                "- Start from the user's experience and work backwards\n\
                 - Prototype two or three directions quickly\n\
                 - Keep room for an unconventional option\n\
                 There is a lot of potential here."
            }
            PersonalityId::Guardian => {
                "- Requirements need acceptance criteria\n\
                 - Error handling and edge cases are not yet covered\n\
                 - A rollback plan is missing\n\
                 I will keep reviewing as the work progresses."
            }
            PersonalityId::Builder => {
                "- Break the work into small deliverable pieces\n\
                 - Set up the project skeleton and tests first\n\
                 - Ship a working slice, then iterate\n\
                 Ready to start on the first piece."
            }
        }
    }
}

#[async_trait::async_trait]
impl ResponseGenerator for TemplateGenerator {
    async fn generate(
        &self,
        identity: &PersonalityIdentity,
        kind: InteractionKind,
        input: &str,
    ) -> Result<String> {
        let excerpt = Self::excerpt(input);
        Ok(format!(
            "{}\n\n{}\n\n_Style: {}_",
            Self::opening(identity, kind, &excerpt),
            Self::body(identity.id),
            identity.style
        ))
    }
}
