use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use rust_mcp_schema::schema_utils::{
    ClientMessage, FromMessage, MessageFromClient, NotificationFromClient, RequestFromClient,
    ServerMessage,
};
use rust_mcp_schema::{
    CallToolRequestParams, CallToolResult, Implementation, ListPromptsResult,
    ListResourcesResult, ListToolsResult, PaginatedRequestParams, Prompt, ReadResourceRequestParams,
    ReadResourceResult, RequestId, Resource, Tool,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::protocol::{self, is_method_not_found, paginated_params};
use super::sse::{is_event_stream_content_type, next_sse_server_message};
use super::{McpBackend, McpError, McpSettings};

pub const MCP_JSON_CONTENT_TYPE: &str = "application/json";
pub const MCP_JSON_AND_SSE_ACCEPT: &str = "application/json, text/event-stream";
pub const MCP_PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";
pub const MCP_SESSION_ID_HEADER: &str = "mcp-session-id";
pub const MCP_MAX_LIST_PAGES: usize = 20;

const MCP_HTTP_CONNECT_TIMEOUT_SECONDS: u64 = 10;
const MCP_HTTP_REQUEST_TIMEOUT_SECONDS: u64 = 60;
const MCP_HTTP_POOL_IDLE_TIMEOUT_SECONDS: u64 = 90;
const MCP_HTTP_POOL_MAX_IDLE_PER_HOST: usize = 8;

fn build_http_client() -> Result<reqwest::Client, McpError> {
    Ok(reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(MCP_HTTP_CONNECT_TIMEOUT_SECONDS))
        .timeout(Duration::from_secs(MCP_HTTP_REQUEST_TIMEOUT_SECONDS))
        .pool_idle_timeout(Duration::from_secs(MCP_HTTP_POOL_IDLE_TIMEOUT_SECONDS))
        .pool_max_idle_per_host(MCP_HTTP_POOL_MAX_IDLE_PER_HOST)
        .build()?)
}

#[derive(Debug, Default, Clone)]
struct SessionState {
    session_id: Option<String>,
    protocol_version: Option<String>,
    server_info: Option<Implementation>,
}

struct ClientInner {
    http: reqwest::Client,
    url: String,
    auth_header: String,
    session: RwLock<SessionState>,
    next_request_id: AtomicI64,
}

/// Connected MCP session. Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct McpClient {
    inner: Arc<ClientInner>,
}

impl McpClient {
    /// Builds the HTTP client and performs the initialize handshake.
    pub async fn connect(settings: &McpSettings) -> Result<McpClient, McpError> {
        let client = McpClient {
            inner: Arc::new(ClientInner {
                http: build_http_client()?,
                url: settings.url.clone(),
                auth_header: format!("Bearer {}", settings.token),
                session: RwLock::new(SessionState::default()),
                next_request_id: AtomicI64::new(0),
            }),
        };
        client.initialize().await?;
        Ok(client)
    }

    async fn initialize(&self) -> Result<(), McpError> {
        let response = self
            .send_request(RequestFromClient::InitializeRequest(protocol::client_details()))
            .await?;
        let initialize = protocol::parse_initialize_result(response)?;

        let has_session = {
            let mut session = self.session_write();
            session.protocol_version = Some(initialize.protocol_version.clone());
            session.server_info = Some(initialize.server_info.clone());
            session.session_id.is_some()
        };
        if !has_session {
            debug!("server did not assign an MCP session id");
        }
        info!(
            server = %initialize.server_info.name,
            protocol = %initialize.protocol_version,
            "MCP session initialized"
        );

        self.send_notification(NotificationFromClient::InitializedNotification(None))
            .await
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_read().session_id.clone()
    }

    pub fn protocol_version(&self) -> String {
        protocol::effective_protocol_version(self.session_read().protocol_version.as_deref())
    }

    pub fn server_name(&self) -> Option<String> {
        self.session_read()
            .server_info
            .as_ref()
            .map(|info| info.name.clone())
    }

    fn session_read(&self) -> std::sync::RwLockReadGuard<'_, SessionState> {
        self.inner
            .session
            .read()
            .unwrap_or_else(|err| err.into_inner())
    }

    fn session_write(&self) -> std::sync::RwLockWriteGuard<'_, SessionState> {
        self.inner
            .session
            .write()
            .unwrap_or_else(|err| err.into_inner())
    }

    pub async fn list_tools(&self) -> Result<Vec<Tool>, McpError> {
        self.list_paginated(
            "tools",
            RequestFromClient::ListToolsRequest,
            |page: ListToolsResult| (page.tools, page.next_cursor),
        )
        .await
    }

    pub async fn list_resources(&self) -> Result<Vec<Resource>, McpError> {
        self.list_paginated(
            "resources",
            RequestFromClient::ListResourcesRequest,
            |page: ListResourcesResult| (page.resources, page.next_cursor),
        )
        .await
    }

    pub async fn list_prompts(&self) -> Result<Vec<Prompt>, McpError> {
        self.list_paginated(
            "prompts",
            RequestFromClient::ListPromptsRequest,
            |page: ListPromptsResult| (page.prompts, page.next_cursor),
        )
        .await
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<CallToolResult, McpError> {
        let mut params = CallToolRequestParams::new(name);
        if !arguments.is_empty() {
            params = params.with_arguments(arguments);
        }
        debug!(tool = name, "calling MCP tool");
        let response = self
            .send_request(RequestFromClient::CallToolRequest(params))
            .await?;
        protocol::parse_response(response)
    }

    pub async fn read_resource(&self, uri: &str) -> Result<ReadResourceResult, McpError> {
        let params = ReadResourceRequestParams {
            meta: None,
            uri: uri.to_string(),
        };
        let response = self
            .send_request(RequestFromClient::ReadResourceRequest(params))
            .await?;
        protocol::parse_response(response)
    }

    /// Follows `nextCursor` for up to [`MCP_MAX_LIST_PAGES`] pages. A server
    /// that does not implement the method yields an empty list.
    async fn list_paginated<P, T>(
        &self,
        label: &'static str,
        request: fn(Option<PaginatedRequestParams>) -> RequestFromClient,
        split: fn(P) -> (Vec<T>, Option<String>),
    ) -> Result<Vec<T>, McpError>
    where
        P: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut cursor = None;

        for _ in 0..MCP_MAX_LIST_PAGES {
            let response = self.send_request(request(paginated_params(cursor.take()))).await?;
            if is_method_not_found(&response) {
                debug!(list = label, "server does not implement listing");
                return Ok(items);
            }

            let (mut page, next_cursor) = split(protocol::parse_response(response)?);
            items.append(&mut page);
            match next_cursor.filter(|next| !next.is_empty()) {
                Some(next) => cursor = Some(next),
                None => {
                    debug!(list = label, count = items.len(), "listing complete");
                    return Ok(items);
                }
            }
        }

        warn!(
            list = label,
            pages = MCP_MAX_LIST_PAGES,
            count = items.len(),
            "listing truncated at page limit"
        );
        Ok(items)
    }

    async fn send_request(&self, request: RequestFromClient) -> Result<ServerMessage, McpError> {
        let request_id = self.inner.next_request_id.fetch_add(1, Ordering::SeqCst);
        let message = ClientMessage::from_message(
            MessageFromClient::RequestFromClient(request),
            Some(RequestId::Integer(request_id)),
        )
        .map_err(|err| McpError::Protocol(err.to_string()))?;

        let response = self.post(&message).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();

        if is_event_stream_content_type(&content_type) {
            next_sse_server_message(response).await
        } else {
            let body = response.bytes().await?;
            if body.iter().all(u8::is_ascii_whitespace) {
                return Err(McpError::Protocol("Empty MCP response body.".to_string()));
            }
            Ok(serde_json::from_slice::<ServerMessage>(&body)?)
        }
    }

    async fn send_notification(&self, notification: NotificationFromClient) -> Result<(), McpError> {
        let message = ClientMessage::from_message(
            MessageFromClient::NotificationFromClient(notification),
            None,
        )
        .map_err(|err| McpError::Protocol(err.to_string()))?;
        self.post(&message).await?;
        Ok(())
    }

    /// POSTs one message with the streamable-HTTP headers and records the
    /// session id from the reply.
    async fn post(&self, message: &ClientMessage) -> Result<reqwest::Response, McpError> {
        let payload = serde_json::to_string(message)?;
        let (session_id, protocol_version) = {
            let session = self.session_read();
            (
                session.session_id.clone(),
                protocol::effective_protocol_version(session.protocol_version.as_deref()),
            )
        };

        debug!(url = %self.inner.url, "sending MCP HTTP request");
        let mut request = self
            .inner
            .http
            .post(&self.inner.url)
            .header(reqwest::header::CONTENT_TYPE, MCP_JSON_CONTENT_TYPE)
            .header(reqwest::header::ACCEPT, MCP_JSON_AND_SSE_ACCEPT)
            .header(MCP_PROTOCOL_VERSION_HEADER, protocol_version)
            .header(reqwest::header::AUTHORIZATION, &self.inner.auth_header)
            .body(payload);
        if let Some(session_id) = session_id {
            request = request.header(MCP_SESSION_ID_HEADER, session_id);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(McpError::Status(response.status()));
        }

        if let Some(session_id) = response
            .headers()
            .get(MCP_SESSION_ID_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            self.session_write().session_id = Some(session_id.to_string());
        }
        Ok(response)
    }
}

#[async_trait]
impl McpBackend for McpClient {
    async fn list_tools(&self) -> Result<Vec<Tool>, McpError> {
        McpClient::list_tools(self).await
    }

    async fn list_resources(&self) -> Result<Vec<Resource>, McpError> {
        McpClient::list_resources(self).await
    }

    async fn list_prompts(&self) -> Result<Vec<Prompt>, McpError> {
        McpClient::list_prompts(self).await
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Value, McpError> {
        let result = McpClient::call_tool(self, name, arguments).await?;
        Ok(serde_json::to_value(result)?)
    }

    async fn read_resource(&self, uri: &str) -> Result<Value, McpError> {
        let result = McpClient::read_resource(self, uri).await?;
        Ok(serde_json::to_value(result)?)
    }
}
