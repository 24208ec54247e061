//! End-to-end tests driving the server with JSON-RPC messages.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use personality_mcp::personality::PersonalityIdentity;
use personality_mcp::{
    Coordinator, CoordinatorConfig, Error, InteractionKind, PersonalityMcpServer,
    PersonalityRegistry, ResponseGenerator, SessionStore,
};

const ORDER: [&str; 5] = ["director", "logic", "spark", "guardian", "builder"];

/// Fails every call for one personality.
struct BrokenVoice(&'static str);

#[async_trait::async_trait]
impl ResponseGenerator for BrokenVoice {
    async fn generate(
        &self,
        identity: &PersonalityIdentity,
        kind: InteractionKind,
        _input: &str,
    ) -> personality_mcp::Result<String> {
        if identity.id.as_str() == self.0 {
            return Err(Error::Generation("backend offline".into()));
        }
        Ok(format!("{} says hi ({})", identity.display_name, kind))
    }
}

struct Client {
    server: PersonalityMcpServer,
    next_id: u64,
}

impl Client {
    fn new(coordinator: Coordinator) -> Self {
        Self {
            server: PersonalityMcpServer::new(coordinator),
            next_id: 0,
        }
    }

    async fn request(&mut self, method: &str, params: Value) -> Value {
        self.next_id += 1;
        let message = json!({
            "jsonrpc": "2.0",
            "id": self.next_id,
            "method": method,
            "params": params,
        });
        let response = self
            .server
            .handle_message(&message.to_string())
            .await
            .expect("request should be answered");
        let response = serde_json::to_value(response).unwrap();
        assert_eq!(response["id"], json!(self.next_id));
        response
    }

    async fn tool(&mut self, name: &str, arguments: Value) -> Value {
        let response = self
            .request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await;
        assert!(response.get("error").is_none(), "{} failed: {}", name, response);
        response["result"]["structuredContent"].clone()
    }

    async fn history(&mut self) -> Vec<Value> {
        let response = self
            .request("resources/read", json!({ "uri": "session://history" }))
            .await;
        let text = response["result"]["contents"][0]["text"].as_str().unwrap();
        serde_json::from_str::<Vec<Value>>(text).unwrap()
    }
}

fn ids(entries: &Value) -> Vec<String> {
    entries
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["personality"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_collaboration_scenario() {
    let mut client = Client::new(Coordinator::new());

    let started = client
        .tool("start_collaborative_session", json!({ "topic": "Auth redesign" }))
        .await;
    assert_eq!(started["session"]["status"], "active");
    assert_eq!(started["session"]["participants"], json!(ORDER));
    assert_eq!(client.history().await.len(), 1);

    let consult = client
        .tool(
            "consult_personality",
            json!({ "personality": "analyst", "question": "risks?" }),
        )
        .await;
    assert_eq!(consult["personality"], "logic");
    assert_eq!(consult["state"]["status"], "idle");
    assert!(consult["state"]["last_activity"].is_string());
    assert_eq!(client.history().await.len(), 2);

    let task = client
        .tool(
            "assign_task",
            json!({ "personality": "builder", "task": "build endpoint" }),
        )
        .await;
    assert_eq!(task["priority"], "medium");
    assert_eq!(task["state"]["current_task"], "build endpoint");
    assert_eq!(client.history().await.len(), 3);

    let consensus = client
        .tool(
            "get_team_consensus",
            json!({ "topic": "stack", "details": "..." }),
        )
        .await;
    assert_eq!(ids(&consensus["contributions"]), ORDER);
    let history = client.history().await;
    assert_eq!(history.len(), 4);

    let kinds: Vec<_> = history.iter().map(|e| e["kind"].as_str().unwrap()).collect();
    assert_eq!(
        kinds,
        ["session_start", "consultation", "task_assignment", "consensus"]
    );
    let stamps: Vec<_> = history
        .iter()
        .map(|e| e["timestamp"].as_str().unwrap().parse::<chrono::DateTime<chrono::Utc>>().unwrap())
        .collect();
    assert!(stamps.windows(2).all(|w| w[0] < w[1]));

    let response = client
        .request("resources/read", json!({ "uri": "personality://analyst" }))
        .await;
    let context: Value =
        serde_json::from_str(response["result"]["contents"][0]["text"].as_str().unwrap()).unwrap();
    let seen: Vec<_> = context["recent_team_interactions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["kind"].as_str().unwrap())
        .collect();
    assert_eq!(seen, ["session_start", "task_assignment", "consensus"]);
}

#[tokio::test]
async fn test_aliases_resolve_to_same_personality() {
    let mut client = Client::new(Coordinator::new());
    let pairs = [
        ("manager", "director"),
        ("analyst", "logic"),
        ("creative", "spark"),
        ("critic", "guardian"),
        ("implementer", "builder"),
    ];
    for (alias, id) in pairs {
        let shouted = alias.to_uppercase();
        for name in [alias, id, shouted.as_str()] {
            let consult = client
                .tool(
                    "consult_personality",
                    json!({ "personality": name, "question": "ok?" }),
                )
                .await;
            assert_eq!(consult["personality"], id);
        }
    }
}

#[tokio::test]
async fn test_second_session_keeps_first_in_history() {
    let mut client = Client::new(Coordinator::new());
    let first = client
        .tool("start_collaborative_session", json!({ "topic": "one" }))
        .await;
    client
        .tool("consult_personality", json!({ "personality": "spark", "question": "?" }))
        .await;
    let second = client
        .tool(
            "start_collaborative_session",
            json!({ "topic": "two", "initial_request": "again" }),
        )
        .await;

    let history = client.history().await;
    assert_eq!(history.len(), 3);
    let starts: Vec<_> = history
        .iter()
        .filter(|e| e["kind"] == "session_start")
        .map(|e| e["session_id"].clone())
        .collect();
    assert_eq!(starts, vec![first["session"]["id"].clone(), second["session"]["id"].clone()]);

    let response = client
        .request("resources/read", json!({ "uri": "session://current" }))
        .await;
    let overview: Value =
        serde_json::from_str(response["result"]["contents"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(overview["current"]["topic"], "two");
    assert_eq!(overview["previous_sessions"][0]["status"], "closed");
}

#[tokio::test]
async fn test_failed_voice_degrades_gracefully() {
    let coordinator = Coordinator::with_parts(
        PersonalityRegistry::new(),
        SessionStore::new(),
        Arc::new(BrokenVoice("guardian")),
        CoordinatorConfig {
            generation_timeout: Duration::from_secs(1),
            ..Default::default()
        },
    );
    let mut client = Client::new(coordinator);

    let feedback = client
        .tool(
            "personality_feedback",
            json!({ "proposal": "rewrite in rust", "focus_areas": ["risk"] }),
        )
        .await;
    let entries = feedback["feedback"].as_array().unwrap();
    assert_eq!(ids(&feedback["feedback"]), ORDER);
    for entry in entries {
        if entry["personality"] == "guardian" {
            assert!(entry["response"].is_null());
            assert!(entry["error"].as_str().unwrap().contains("backend offline"));
        } else {
            assert!(entry["response"].is_string());
        }
    }

    let started = client
        .tool("start_collaborative_session", json!({ "topic": "t" }))
        .await;
    assert_eq!(started["session"]["status"], "active");
    assert_eq!(client.history().await.len(), 2);
}

#[tokio::test]
async fn test_rejected_requests_leave_no_trace() {
    let mut client = Client::new(Coordinator::new());

    let bad = [
        ("start_collaborative_session", json!({})),
        ("consult_personality", json!({ "personality": "nobody", "question": "?" })),
        ("assign_task", json!({ "task": "orphan" })),
        ("get_team_consensus", json!({ "topic": 42 })),
        ("not_a_tool", json!({})),
    ];
    for (name, arguments) in bad {
        let response = client
            .request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await;
        assert!(response["error"]["code"].is_i64(), "{} should fail", name);
    }

    let response = client
        .request("resources/read", json!({ "uri": "personality://nobody" }))
        .await;
    assert_eq!(response["error"]["code"], -32002);

    assert!(client.history().await.is_empty());
}

#[tokio::test]
async fn test_status_twice_is_stable() {
    let mut client = Client::new(Coordinator::new());
    client
        .tool("assign_task", json!({ "personality": "critic", "task": "review", "priority": "high" }))
        .await;

    let first = client.tool("get_personality_status", json!({})).await;
    let second = client.tool("get_personality_status", json!({})).await;

    assert_eq!(first["personalities"], second["personalities"]);
    assert_eq!(first["personalities"][3]["current_priority"], "high");
    assert_eq!(second["history_len"], 3);

    let tail = client
        .request("resources/read", json!({ "uri": "session://history?since=1" }))
        .await;
    let events: Vec<Value> =
        serde_json::from_str(tail["result"]["contents"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e["kind"] == "status_query"));
}
