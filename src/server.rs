//! MCP server: decodes JSON-RPC lines, dispatches them and writes responses.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::coordinator::Coordinator;
use crate::error::{Error, Result};
use crate::protocol::{
    error_codes, McpRequest, McpResponse, ResourceCapabilities, ServerCapabilities, ServerInfo,
    ToolCapabilities, PROTOCOL_VERSION,
};
use crate::resources;
use crate::tools::ToolRegistry;

/// Personality MCP Server.
pub struct PersonalityMcpServer {
    /// Coordinator shared with the tools.
    coordinator: Arc<Coordinator>,
    /// Tool registry.
    registry: ToolRegistry,
    /// Server info.
    server_info: ServerInfo,
    /// Whether the client has sent `notifications/initialized`.
    initialized: bool,
}

impl PersonalityMcpServer {
    /// Create a new MCP server.
    pub fn new(coordinator: Coordinator) -> Self {
        let coordinator = Arc::new(coordinator);
        Self {
            registry: ToolRegistry::new(coordinator.clone()),
            coordinator,
            server_info: ServerInfo::default(),
            initialized: false,
        }
    }

    /// Coordinator backing this server.
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Whether the client has completed initialization.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Run the server on stdio.
    pub async fn run_stdio(&mut self) -> Result<()> {
        info!("Starting Personality MCP Server on stdio");
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.run(stdin, stdout).await
    }

    /// Serve one request at a time until `reader` reaches end of input.
    pub async fn run<R, W>(&mut self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            debug!("Received: {}", line);

            let Some(response) = self.handle_message(line).await else {
                continue;
            };
            let response_json = serde_json::to_string(&response)?;

            debug!("Sending: {}", response_json);

            writer.write_all(response_json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }

        info!("Input closed, shutting down");
        Ok(())
    }

    /// Handle a single message. Notifications produce no response.
    pub async fn handle_message(&mut self, message: &str) -> Option<McpResponse> {
        let value: Value = match serde_json::from_str(message) {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                return Some(McpResponse::error(
                    None,
                    error_codes::PARSE_ERROR,
                    format!("parse error: {}", e),
                ));
            }
        };

        // Kept so a malformed request can still be answered under its own id.
        let raw_id = value.get("id").cloned();
        let request: McpRequest = match serde_json::from_value(value) {
            Ok(req) => req,
            Err(e) => {
                warn!("Invalid request: {}", e);
                return Some(McpResponse::error(
                    raw_id,
                    error_codes::INVALID_REQUEST,
                    format!("invalid request: {}", e),
                ));
            }
        };

        if request.is_notification() {
            if request.jsonrpc == "2.0" {
                self.handle_notification(&request);
            } else {
                warn!(
                    "Dropping {} notification with jsonrpc version {}",
                    request.method, request.jsonrpc
                );
            }
            return None;
        }

        if request.jsonrpc != "2.0" {
            return Some(McpResponse::error(
                request.id,
                error_codes::INVALID_REQUEST,
                format!("unsupported jsonrpc version: {}", request.jsonrpc),
            ));
        }

        let id = request.id.clone();
        let result = match request.method.as_str() {
            "initialize" => Ok(self.handle_initialize()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.registry.definitions() })),
            "tools/call" => self.handle_tools_call(&request.params).await,
            "resources/list" => Ok(json!({ "resources": resources::definitions() })),
            "resources/read" => self.handle_resources_read(&request.params).await,
            other => Err(Error::UnknownMethod(other.to_string())),
        };

        Some(match result {
            Ok(value) => McpResponse::success(id, value),
            Err(e) => {
                warn!("{} failed: {}", request.method, e);
                McpResponse::error(id, e.code(), e.to_string())
            }
        })
    }

    /// Handle a notification.
    fn handle_notification(&mut self, request: &McpRequest) {
        match request.method.as_str() {
            "notifications/initialized" | "initialized" => {
                self.initialized = true;
                info!("MCP client initialized");
            }
            other => debug!("Ignoring notification: {}", other),
        }
    }

    /// Handle initialize request.
    fn handle_initialize(&self) -> Value {
        info!("Initializing MCP server");

        let capabilities = ServerCapabilities {
            tools: Some(ToolCapabilities { list_changed: false }),
            resources: Some(ResourceCapabilities {
                subscribe: false,
                list_changed: false,
            }),
        };

        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": capabilities,
            "serverInfo": self.server_info
        })
    }

    /// Handle tools/call request.
    async fn handle_tools_call(&self, params: &Value) -> Result<Value> {
        let name = params
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Validation("missing tool name".into()))?;
        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        info!("Calling tool: {}", name);

        let result = self.registry.execute(name, arguments).await?;
        Ok(serde_json::to_value(result)?)
    }

    /// Handle resources/read request.
    async fn handle_resources_read(&self, params: &Value) -> Result<Value> {
        let uri = params
            .get("uri")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Validation("missing resource uri".into()))?;

        debug!("Reading resource: {}", uri);

        let contents = resources::read(&self.coordinator, uri).await?;
        Ok(json!({ "contents": [contents] }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> PersonalityMcpServer {
        PersonalityMcpServer::new(Coordinator::new())
    }

    async fn call(server: &mut PersonalityMcpServer, message: Value) -> McpResponse {
        server
            .handle_message(&message.to_string())
            .await
            .expect("request should be answered")
    }

    #[tokio::test]
    async fn test_initialize() {
        let mut server = server();
        let resp = call(
            &mut server,
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
        )
        .await;
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "personality-mcp");
        assert!(result["capabilities"]["resources"].is_object());
        assert_eq!(resp.id, json!(1));
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let mut server = server();
        let resp = server
            .handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(resp.is_none());
        assert!(server.is_initialized());
    }

    #[tokio::test]
    async fn test_parse_error() {
        let mut server = server();
        let resp = server.handle_message("{not json").await.unwrap();
        assert_eq!(resp.id, Value::Null);
        assert_eq!(resp.error.unwrap().code, error_codes::PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_null_id_is_answered() {
        let mut server = server();
        let resp = call(
            &mut server,
            json!({"jsonrpc": "2.0", "id": null, "method": "tools/call",
                   "params": {"name": "get_personality_status", "arguments": {}}}),
        )
        .await;
        assert_eq!(resp.id, Value::Null);
        assert!(resp.result.is_some());
        assert_eq!(server.coordinator().history_len().await, 1);
    }

    #[tokio::test]
    async fn test_invalid_request_echoes_id() {
        let mut server = server();
        let resp = call(&mut server, json!({"jsonrpc": "2.0", "id": 7, "params": {}})).await;
        assert_eq!(resp.id, json!(7));
        assert_eq!(resp.error.unwrap().code, error_codes::INVALID_REQUEST);

        let resp = call(&mut server, json!({"jsonrpc": "2.0", "id": "m", "method": 5})).await;
        assert_eq!(resp.id, json!("m"));
        assert_eq!(resp.error.unwrap().code, error_codes::INVALID_REQUEST);

        let resp = server.handle_message("42").await.unwrap();
        assert_eq!(resp.id, Value::Null);
        assert_eq!(resp.error.unwrap().code, error_codes::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_wrong_version() {
        let mut server = server();
        let resp = call(&mut server, json!({"jsonrpc": "1.0", "id": 9, "method": "ping"})).await;
        assert_eq!(resp.id, json!(9));
        assert_eq!(resp.error.unwrap().code, error_codes::INVALID_REQUEST);

        let resp = server
            .handle_message(r#"{"jsonrpc":"1.0","method":"notifications/initialized"}"#)
            .await;
        assert!(resp.is_none());
        assert!(!server.is_initialized());
    }

    #[tokio::test]
    async fn test_unknown_method_and_tool() {
        let mut server = server();
        let resp = call(
            &mut server,
            json!({"jsonrpc": "2.0", "id": "a", "method": "prompts/list"}),
        )
        .await;
        assert_eq!(resp.error.unwrap().code, error_codes::METHOD_NOT_FOUND);

        let resp = call(
            &mut server,
            json!({"jsonrpc": "2.0", "id": "b", "method": "tools/call",
                   "params": {"name": "summon", "arguments": {}}}),
        )
        .await;
        assert_eq!(resp.id, json!("b"));
        assert_eq!(resp.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
        assert_eq!(server.coordinator().history_len().await, 0);
    }

    #[tokio::test]
    async fn test_validation_error_leaves_no_history() {
        let mut server = server();
        let resp = call(
            &mut server,
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call",
                   "params": {"name": "assign_task", "arguments": {"personality": "builder"}}}),
        )
        .await;
        assert_eq!(resp.error.unwrap().code, error_codes::INVALID_PARAMS);

        let resp = call(
            &mut server,
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call",
                   "params": {"name": "consult_personality",
                              "arguments": {"personality": "oracle", "question": "?"}}}),
        )
        .await;
        let err = resp.error.unwrap();
        assert_eq!(err.code, error_codes::INVALID_PARAMS);
        assert!(err.message.contains("oracle"));

        assert_eq!(server.coordinator().history_len().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_resource() {
        let mut server = server();
        let resp = call(
            &mut server,
            json!({"jsonrpc": "2.0", "id": 4, "method": "resources/read",
                   "params": {"uri": "session://tomorrow"}}),
        )
        .await;
        assert_eq!(resp.error.unwrap().code, error_codes::RESOURCE_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_run_over_stream() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
        );
        let mut output = Vec::new();
        let mut server = server();
        server.run(input.as_bytes(), &mut output).await.unwrap();

        let responses: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[1]["result"]["tools"].as_array().unwrap().len(), 6);
    }
}
