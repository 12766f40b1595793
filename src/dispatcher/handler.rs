//! Dispatcher command handlers
//!
//! Store operations run on the blocking worker pool so a slow adapter cannot
//! stall the command socket; agent lifecycle operations delegate to the
//! supervisor. Every failure comes back as a reply with an HTTP-analogous
//! status code — handlers never raise across the process boundary.

use crate::agent::types::AgentKind;
use crate::dispatcher::request::{
    AgentCommandParams, CreateParams, DeleteParams, ReadParams, Request, StartAgentParams,
    StopAgentParams, UpdateParams,
};
use crate::error::Error;
use crate::store::Store;
use crate::supervisor::{StopReport, Supervisor};
use crate::wire::ReplyEnvelope;

use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// How long `start_agent` lets a fresh process settle before reporting it
const SPAWN_SETTLE: Duration = Duration::from_millis(100);

/// The dispatcher's handler set
pub struct CommandHandlers {
    store: Arc<dyn Store>,
    supervisor: Arc<Supervisor>,
}

impl CommandHandlers {
    /// Create the handler set
    pub fn new(store: Arc<dyn Store>, supervisor: Arc<Supervisor>) -> Self {
        Self { store, supervisor }
    }

    /// The injected supervisor
    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    /// Route one decoded request to its handler
    pub async fn handle(&self, request: Request) -> ReplyEnvelope {
        match request {
            Request::Create(params) => self.create_document(params).await,
            Request::Read(params) => self.read_document(params).await,
            Request::Update(params) => self.update_document(params).await,
            Request::Delete(params) => self.delete_document(params).await,
            Request::Status => status_probe(),
            Request::StartAgent(params) => self.start_agent(params).await,
            Request::GetAgents => self.get_agents().await,
            Request::StopAgent(params) => self.stop_agent(params).await,
            Request::AgentCommand(params) => self.agent_command(params).await,
            Request::Exit => ReplyEnvelope::ok(json!({ "status": "shutdown" })),
        }
    }

    async fn create_document(&self, params: CreateParams) -> ReplyEnvelope {
        if !params.document_data.is_object() {
            return ReplyEnvelope::error("document_data must be a mapping", 400);
        }

        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || {
            store.create(
                &params.collection_name,
                params.document_id.as_deref(),
                params.document_data,
            )
        })
        .await;

        match result {
            Ok(Ok(id)) => ReplyEnvelope::new(
                json!(format!("Success: Document added successfully with name: {}", id)),
                200,
            ),
            Ok(Err(e)) => ReplyEnvelope::error(format!("Error adding document: {}", e), 500),
            Err(e) => ReplyEnvelope::error(format!("Error adding document: {}", e), 500),
        }
    }

    async fn read_document(&self, params: ReadParams) -> ReplyEnvelope {
        let store = Arc::clone(&self.store);
        let document_id = params
            .document_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        let result = tokio::task::spawn_blocking(move || match document_id {
            // No id: the whole collection
            None => store.read_all(params.collection_name.trim()).map(Some),
            Some(id) => store.read(params.collection_name.trim(), &id),
        })
        .await;

        match result {
            Ok(Ok(Some(doc))) => ReplyEnvelope::ok(doc),
            Ok(Ok(None)) => ReplyEnvelope::error("Document does not exist", 404),
            Ok(Err(e)) => ReplyEnvelope::error(format!("Error reading document(s): {}", e), 500),
            Err(e) => ReplyEnvelope::error(format!("Error reading document(s): {}", e), 500),
        }
    }

    async fn update_document(&self, params: UpdateParams) -> ReplyEnvelope {
        let store = Arc::clone(&self.store);
        let document_id = params.document_id.clone();
        let result = tokio::task::spawn_blocking(move || {
            store.update(
                &params.collection_name,
                &params.document_id,
                params.document_data,
                params.merge,
            )
        })
        .await;

        match result {
            Ok(Ok(true)) => ReplyEnvelope::new(
                json!(format!(
                    "Success: Document \"{}\" updated successfully",
                    document_id
                )),
                200,
            ),
            Ok(Ok(false)) => ReplyEnvelope::error(
                format!("Document \"{}\" does not exist", document_id),
                404,
            ),
            Ok(Err(e)) => ReplyEnvelope::error(format!("Error updating document: {}", e), 500),
            Err(e) => ReplyEnvelope::error(format!("Error updating document: {}", e), 500),
        }
    }

    async fn delete_document(&self, params: DeleteParams) -> ReplyEnvelope {
        let store = Arc::clone(&self.store);
        let document_id = params.document_id.clone();
        let result = tokio::task::spawn_blocking(move || {
            store.delete(&params.collection_name, &params.document_id)
        })
        .await;

        match result {
            Ok(Ok(true)) => {
                ReplyEnvelope::new(json!("Success: Document deleted successfully."), 200)
            }
            Ok(Ok(false)) => ReplyEnvelope::error(
                format!("Document \"{}\" does not exist", document_id),
                404,
            ),
            Ok(Err(e)) => ReplyEnvelope::error(format!("Error deleting document: {}", e), 500),
            Err(e) => ReplyEnvelope::error(format!("Error deleting document: {}", e), 500),
        }
    }

    async fn start_agent(&self, params: StartAgentParams) -> ReplyEnvelope {
        let kind = match AgentKind::from_str(&params.agent_type) {
            Ok(kind) => kind,
            Err(_) => {
                return ReplyEnvelope::error(
                    format!("Invalid agent type: {}", params.agent_type),
                    400,
                );
            }
        };

        let record = self.supervisor.create(kind).await;
        if let Err(e) = self.supervisor.start(record.id).await {
            return ReplyEnvelope::error(format!("Agent creation failed: {}", e), 500);
        }

        // Give the process a moment to come up before reporting pid/liveness
        tokio::time::sleep(SPAWN_SETTLE).await;

        let info = self
            .supervisor
            .agent_infos()
            .await
            .into_iter()
            .find(|info| info.id == record.id);

        match info {
            Some(info) => ReplyEnvelope::new(
                serde_json::to_value(&info).unwrap_or(Value::Null),
                201,
            ),
            None => ReplyEnvelope::error("Agent creation failed: record vanished", 500),
        }
    }

    async fn get_agents(&self) -> ReplyEnvelope {
        let infos = self.supervisor.agent_infos().await;
        ReplyEnvelope::ok(serde_json::to_value(&infos).unwrap_or(Value::Null))
    }

    async fn stop_agent(&self, params: StopAgentParams) -> ReplyEnvelope {
        match self.supervisor.stop(params.agent_id).await {
            StopReport::Stopped => ReplyEnvelope::new(
                json!(format!("Agent {} stopped", params.agent_id)),
                200,
            ),
            StopReport::NotRunning => ReplyEnvelope::new(
                json!(format!("Agent {} not running", params.agent_id)),
                200,
            ),
        }
    }

    async fn agent_command(&self, params: AgentCommandParams) -> ReplyEnvelope {
        let outcome = self
            .supervisor
            .send_command(params.agent_id, &params.command)
            .await;

        let status_code = if outcome.is_success() {
            200
        } else if outcome.message.contains("not running")
            || outcome.message.contains("not alive")
        {
            409
        } else if outcome.message.contains("Timeout") {
            504
        } else {
            502
        };

        ReplyEnvelope::new(
            serde_json::to_value(&outcome).unwrap_or(Value::Null),
            status_code,
        )
    }
}

/// Liveness probe
fn status_probe() -> ReplyEnvelope {
    ReplyEnvelope::ok(json!({
        "message": "Server is online!",
        "timestamp": chrono::Utc::now().timestamp_millis(),
    }))
}

/// Map a decode failure onto the structured error reply
pub fn decode_error_reply(error: &Error) -> ReplyEnvelope {
    match error {
        Error::UnknownCommand(name) => {
            ReplyEnvelope::error(format!("Unknown command \"{}\"", name), 400)
        }
        Error::MalformedParams(message) => ReplyEnvelope::error(message.clone(), 400),
        other => ReplyEnvelope::error(format!("Invalid request: {}", other), 400),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentsConfig;
    use crate::store::MemoryStore;
    use crate::wire::Envelope;

    fn handlers(base_port: u16) -> CommandHandlers {
        let config = AgentsConfig {
            base_command_port: base_port,
            command_timeout_secs: 1,
            join_timeout_secs: 1,
            ..AgentsConfig::default()
        };
        CommandHandlers::new(
            Arc::new(MemoryStore::new()),
            Arc::new(Supervisor::new(config)),
        )
    }

    async fn run(handlers: &CommandHandlers, command: &str, params: Value) -> ReplyEnvelope {
        let envelope = Envelope::new(command, params);
        let request = Request::decode(&envelope).unwrap();
        handlers.handle(request).await
    }

    #[tokio::test]
    async fn test_crud_roundtrip() {
        let handlers = handlers(48500);

        let reply = run(
            &handlers,
            "create",
            json!({
                "collection_name": "Tenders",
                "document_id": "t-1",
                "document_data": {"title": "Bridge", "open": true},
            }),
        )
        .await;
        assert_eq!(reply.status_code, 200);
        assert!(reply.data.as_str().unwrap().contains("t-1"));

        let reply = run(
            &handlers,
            "read",
            json!({"collection_name": "Tenders", "document_id": "t-1"}),
        )
        .await;
        assert_eq!(reply.status_code, 200);
        assert_eq!(reply.data["title"], "Bridge");

        let reply = run(
            &handlers,
            "update",
            json!({
                "collection_name": "Tenders",
                "document_id": "t-1",
                "document_data": {"open": false},
            }),
        )
        .await;
        assert_eq!(reply.status_code, 200);

        // Merge preserved the title
        let reply = run(
            &handlers,
            "read",
            json!({"collection_name": "Tenders", "document_id": "t-1"}),
        )
        .await;
        assert_eq!(reply.data["title"], "Bridge");
        assert_eq!(reply.data["open"], false);

        let reply = run(
            &handlers,
            "delete",
            json!({"collection_name": "Tenders", "document_id": "t-1"}),
        )
        .await;
        assert_eq!(reply.status_code, 200);

        let reply = run(
            &handlers,
            "read",
            json!({"collection_name": "Tenders", "document_id": "t-1"}),
        )
        .await;
        assert_eq!(reply.status_code, 404);
    }

    #[tokio::test]
    async fn test_read_without_id_returns_collection() {
        let handlers = handlers(48510);
        run(
            &handlers,
            "create",
            json!({"collection_name": "Tenders", "document_id": "a", "document_data": {"n": 1}}),
        )
        .await;
        run(
            &handlers,
            "create",
            json!({"collection_name": "Tenders", "document_id": "b", "document_data": {"n": 2}}),
        )
        .await;

        let reply = run(&handlers, "read", json!({"collection_name": "Tenders"})).await;
        assert_eq!(reply.status_code, 200);
        assert_eq!(reply.data["a"]["n"], 1);
        assert_eq!(reply.data["b"]["n"], 2);
    }

    #[tokio::test]
    async fn test_create_rejects_non_mapping_data() {
        let handlers = handlers(48520);
        let reply = run(
            &handlers,
            "create",
            json!({"collection_name": "Tenders", "document_data": "nope"}),
        )
        .await;
        assert_eq!(reply.status_code, 400);
    }

    #[tokio::test]
    async fn test_status_probe() {
        let handlers = handlers(48530);
        let reply = run(&handlers, "status", json!({})).await;
        assert_eq!(reply.status_code, 200);
        assert_eq!(reply.data["message"], "Server is online!");
        assert!(reply.data["timestamp"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_start_agent_invalid_type() {
        let handlers = handlers(48540);
        let reply = run(&handlers, "start_agent", json!({"agent_type": "submarine"})).await;
        assert_eq!(reply.status_code, 400);
        assert!(reply.data["error"]
            .as_str()
            .unwrap()
            .contains("Invalid agent type"));
    }

    #[tokio::test]
    async fn test_get_agents_empty() {
        let handlers = handlers(48550);
        let reply = run(&handlers, "get_agents", json!({})).await;
        assert_eq!(reply.status_code, 200);
        assert_eq!(reply.data.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_stop_agent_not_running_is_reported() {
        let handlers = handlers(48560);
        let reply = run(&handlers, "stop_agent", json!({"agent_id": 3})).await;
        assert_eq!(reply.status_code, 200);
        assert!(reply.data.as_str().unwrap().contains("not running"));
    }

    #[tokio::test]
    async fn test_agent_command_not_running_maps_to_409() {
        let handlers = handlers(48570);
        let reply = run(
            &handlers,
            "agent_command",
            json!({"agent_id": 1, "command": "test"}),
        )
        .await;
        assert_eq!(reply.status_code, 409);
        assert_eq!(reply.data["status"], "error");
        assert!(reply.data["message"].as_str().unwrap().contains("not running"));
    }

    #[tokio::test]
    async fn test_exit_reply() {
        let handlers = handlers(48580);
        let reply = run(&handlers, "exit", json!({})).await;
        assert_eq!(reply.data["status"], "shutdown");
    }
}
