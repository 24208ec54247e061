//! Read-only MCP resources: personality state, the current session and history.

use serde::Serialize;

use crate::coordinator::Coordinator;
use crate::error::{Error, Result};
use crate::personality::PersonalityId;
use crate::protocol::{ResourceContents, ResourceDefinition};

const MIME_JSON: &str = "application/json";

/// A parsed resource URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceUri {
    /// `personality://<id or alias>`
    Personality(String),
    /// `session://current`
    CurrentSession,
    /// `session://history`, optionally `?since=<index>`
    History { since: usize },
}

impl ResourceUri {
    /// Parse a URI; anything unrecognized is an unknown resource.
    pub fn parse(uri: &str) -> Result<Self> {
        let unknown = || Error::UnknownResource(uri.to_string());

        if let Some(name) = uri.strip_prefix("personality://") {
            if name.is_empty() {
                return Err(unknown());
            }
            return Ok(ResourceUri::Personality(name.to_string()));
        }

        let rest = uri.strip_prefix("session://").ok_or_else(unknown)?;
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };

        match (path, query) {
            ("current", None) => Ok(ResourceUri::CurrentSession),
            ("history", None) => Ok(ResourceUri::History { since: 0 }),
            ("history", Some(query)) => {
                let since = query
                    .strip_prefix("since=")
                    .and_then(|v| v.parse::<usize>().ok())
                    .ok_or_else(|| {
                        Error::Validation(format!("expected ?since=<index> in {}", uri))
                    })?;
                Ok(ResourceUri::History { since })
            }
            _ => Err(unknown()),
        }
    }
}

/// Resources advertised by `resources/list`.
pub fn definitions() -> Vec<ResourceDefinition> {
    let mut resources: Vec<ResourceDefinition> = PersonalityId::ALL
        .iter()
        .map(|id| {
            let identity = id.identity();
            ResourceDefinition {
                uri: format!("personality://{}", id),
                name: format!("{} - {}", identity.display_name, identity.role),
                description: format!(
                    "{}'s state, assigned tasks and recent team activity",
                    identity.display_name
                ),
                mime_type: MIME_JSON.into(),
            }
        })
        .collect();

    resources.push(ResourceDefinition {
        uri: "session://current".into(),
        name: "Current Collaborative Session".into(),
        description: "The active session and the sessions it replaced".into(),
        mime_type: MIME_JSON.into(),
    });
    resources.push(ResourceDefinition {
        uri: "session://history".into(),
        name: "Session History".into(),
        description: "Every recorded interaction in order; append ?since=<index> for the tail"
            .into(),
        mime_type: MIME_JSON.into(),
    });

    resources
}

/// Read a resource. Never mutates state or appends history.
pub async fn read(coordinator: &Coordinator, uri: &str) -> Result<ResourceContents> {
    let text = match ResourceUri::parse(uri)? {
        ResourceUri::Personality(name) => {
            let context = coordinator
                .personality_context(&name)
                .await
                .map_err(|e| match e {
                    Error::UnknownPersonality(_) => Error::UnknownResource(uri.to_string()),
                    other => other,
                })?;
            to_pretty(&context)?
        }
        ResourceUri::CurrentSession => to_pretty(&coordinator.session_overview().await)?,
        ResourceUri::History { since } => to_pretty(&coordinator.history(since).await)?,
    };

    Ok(ResourceContents {
        uri: uri.to_string(),
        mime_type: MIME_JSON.into(),
        text,
    })
}

fn to_pretty<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
