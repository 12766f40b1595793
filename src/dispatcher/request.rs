//! Dispatcher request decoding
//!
//! The `{command, params}` envelope is decoded exactly once, here, into the
//! closed [`Request`] enum; handlers match it exhaustively. Unknown command
//! names and missing or ill-typed params become structured errors, never
//! transport faults.

use crate::error::{Error, Result};
use crate::wire::Envelope;

use serde::Deserialize;
use serde_json::Value;

/// Parameters for `create`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateParams {
    pub collection_name: String,
    #[serde(default)]
    pub document_id: Option<String>,
    pub document_data: Value,
}

/// Parameters for `read`
#[derive(Debug, Clone, Deserialize)]
pub struct ReadParams {
    pub collection_name: String,
    #[serde(default)]
    pub document_id: Option<String>,
}

/// Parameters for `update`
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateParams {
    pub collection_name: String,
    pub document_id: String,
    pub document_data: Value,
    #[serde(default = "default_merge")]
    pub merge: bool,
}

fn default_merge() -> bool {
    true
}

/// Parameters for `delete`
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteParams {
    pub collection_name: String,
    pub document_id: String,
}

/// Parameters for `start_agent`
#[derive(Debug, Clone, Deserialize)]
pub struct StartAgentParams {
    pub agent_type: String,
}

/// Parameters for `stop_agent`
#[derive(Debug, Clone, Deserialize)]
pub struct StopAgentParams {
    pub agent_id: u32,
}

/// Parameters for `agent_command`
#[derive(Debug, Clone, Deserialize)]
pub struct AgentCommandParams {
    pub agent_id: u32,
    pub command: String,
}

/// Every command the dispatcher answers
#[derive(Debug, Clone)]
pub enum Request {
    Create(CreateParams),
    Read(ReadParams),
    Update(UpdateParams),
    Delete(DeleteParams),
    Status,
    StartAgent(StartAgentParams),
    GetAgents,
    StopAgent(StopAgentParams),
    AgentCommand(AgentCommandParams),
    Exit,
}

impl Request {
    /// Decode an envelope into a request
    pub fn decode(envelope: &Envelope) -> Result<Self> {
        let command = envelope.command.to_lowercase();
        match command.as_str() {
            "create" => Ok(Self::Create(params(envelope)?)),
            "read" => Ok(Self::Read(params(envelope)?)),
            "update" => Ok(Self::Update(params(envelope)?)),
            "delete" => Ok(Self::Delete(params(envelope)?)),
            "status" => Ok(Self::Status),
            "start_agent" => Ok(Self::StartAgent(params(envelope)?)),
            "get_agents" => Ok(Self::GetAgents),
            "stop_agent" => Ok(Self::StopAgent(params(envelope)?)),
            "agent_command" => Ok(Self::AgentCommand(params(envelope)?)),
            "exit" => Ok(Self::Exit),
            _ => Err(Error::UnknownCommand(envelope.command.clone())),
        }
    }
}

/// Decode the params mapping for one command
fn params<T: for<'de> Deserialize<'de>>(envelope: &Envelope) -> Result<T> {
    serde_json::from_value(envelope.params.clone()).map_err(|e| {
        Error::MalformedParams(format!(
            "Invalid params for \"{}\": {}",
            envelope.command, e
        ))
    })
}
