//! Agent registry and process lifecycle
//!
//! The supervisor owns both maps — agent records and live process handles —
//! and is the only component that spawns or terminates agent processes.
//! Everyone else goes through its operations or through an agent's own
//! command channel.
//!
//! Liveness authority is the OS process, never the advisory `status` field:
//! `is_alive` asks the kernel, and `cleanup_processes` reconciles the maps
//! with reality at any time.

use crate::agent::types::{AgentInfo, AgentKind, AgentRecord, AgentStatus};
use crate::config::AgentsConfig;
use crate::error::{Error, Result};
use crate::wire::CommandClient;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::RwLock;
use tokio::time::timeout;

/// Structured result of relaying a command to an agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutcome {
    /// `success` or `error`
    pub status: OutcomeStatus,

    /// The agent's reply, or a human-readable failure description
    pub message: String,
}

/// Outcome tag for [`CommandOutcome`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Error,
}

impl CommandOutcome {
    fn success(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Success,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Error,
            message: message.into(),
        }
    }

    /// Whether the relay succeeded
    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// What a stop request actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReport {
    /// The process was stopped (gracefully or by force)
    Stopped,

    /// Nothing to stop; reported, not fatal
    NotRunning,
}

/// The process-wide agent registry
pub struct Supervisor {
    config: AgentsConfig,
    /// Program + leading args used to spawn an agent process; defaults to
    /// `current_exe() agent`, overridable for packaging and tests
    agent_command: (PathBuf, Vec<String>),
    records: RwLock<HashMap<u32, AgentRecord>>,
    children: RwLock<HashMap<u32, Child>>,
}

impl Supervisor {
    /// Create a supervisor
    pub fn new(config: AgentsConfig) -> Self {
        let program = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("crawlhive"));
        Self {
            config,
            agent_command: (program, vec!["agent".to_string()]),
            records: RwLock::new(HashMap::new()),
            children: RwLock::new(HashMap::new()),
        }
    }

    /// Override the program used to spawn agent processes
    pub fn with_agent_command(mut self, program: PathBuf, leading_args: Vec<String>) -> Self {
        self.agent_command = (program, leading_args);
        self
    }

    /// Channel configuration in effect
    pub fn config(&self) -> &AgentsConfig {
        &self.config
    }

    /// Allocate the next id and register a record with status `Idle`.
    ///
    /// No process is spawned here. Ids count up from 1 and are never
    /// reused. Unknown type strings are rejected before this point, when
    /// parsing [`AgentKind`].
    pub async fn create(&self, kind: AgentKind) -> AgentRecord {
        let mut records = self.records.write().await;
        let id = records.len() as u32 + 1;
        let record = AgentRecord {
            id,
            kind,
            status: AgentStatus::Idle,
        };
        records.insert(id, record.clone());
        tracing::info!(agent_id = id, kind = %kind, "Agent created");
        record
    }

    /// Spawn the agent's process. Idempotent: a live process makes this a
    /// no-op.
    pub async fn start(&self, agent_id: u32) -> Result<()> {
        let kind = {
            let records = self.records.read().await;
            records
                .get(&agent_id)
                .map(|record| record.kind)
                .ok_or(Error::AgentNotFound(agent_id))?
        };

        let mut children = self.children.write().await;
        if let Some(child) = children.get_mut(&agent_id) {
            if process_running(child) {
                tracing::info!(agent_id = agent_id, "Agent already running");
                return Ok(());
            }
            children.remove(&agent_id);
        }

        let (program, leading_args) = &self.agent_command;
        let child = Command::new(program)
            .args(leading_args)
            .arg("--id")
            .arg(agent_id.to_string())
            .arg("--kind")
            .arg(kind.to_string())
            .arg("--host")
            .arg(&self.config.host)
            .arg("--base-port")
            .arg(self.config.base_command_port.to_string())
            .arg("--status-port")
            .arg(self.config.status_port.to_string())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Internal(format!(
                    "Failed to spawn agent {} from {}: {}",
                    agent_id,
                    program.display(),
                    e
                ))
            })?;

        tracing::info!(
            agent_id = agent_id,
            pid = ?child.id(),
            port = self.config.base_command_port as u32 + agent_id,
            "Agent started"
        );

        children.insert(agent_id, child);
        drop(children);

        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(&agent_id) {
            record.status = AgentStatus::Idle;
        }

        Ok(())
    }

    /// Stop an agent: protocol-level `stop` first, then process join with a
    /// bounded timeout, then force kill. The record is marked `Stopped`.
    pub async fn stop(&self, agent_id: u32) -> StopReport {
        let child = {
            let mut children = self.children.write().await;
            children.remove(&agent_id)
        };

        let Some(mut child) = child else {
            tracing::warn!(agent_id = agent_id, "Agent not running");
            return StopReport::NotRunning;
        };

        // Graceful: ask the agent to stop itself. The agent may already be
        // gone; a refused connect or lost reply just moves us to the join.
        let command_timeout = Duration::from_secs(self.config.command_timeout_secs);
        match CommandClient::connect(&self.config.command_addr(agent_id), command_timeout).await {
            Ok(mut client) => {
                if let Err(e) = client.send_command("stop").await {
                    tracing::debug!(agent_id = agent_id, "Stop command got no reply: {}", e);
                }
                client.close().await;
            }
            Err(e) => {
                tracing::debug!(agent_id = agent_id, "Stop command not deliverable: {}", e);
            }
        }

        let join_timeout = Duration::from_secs(self.config.join_timeout_secs);
        match timeout(join_timeout, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!(agent_id = agent_id, status = ?status.code(), "Agent stopped");
            }
            Ok(Err(e)) => {
                tracing::warn!(agent_id = agent_id, "Error joining agent process: {}", e);
            }
            Err(_) => {
                tracing::warn!(agent_id = agent_id, "Force-terminating agent");
                if let Err(e) = child.kill().await {
                    tracing::warn!(agent_id = agent_id, "Force kill failed: {}", e);
                }
            }
        }

        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(&agent_id) {
            record.status = AgentStatus::Stopped;
        }

        StopReport::Stopped
    }

    /// Reap exited processes: remove their handles and mark their records
    /// `Stopped`. Safe to call at any time. Returns the reaped ids.
    pub async fn cleanup_processes(&self) -> Vec<u32> {
        let mut reaped = Vec::new();

        {
            let mut children = self.children.write().await;
            children.retain(|agent_id, child| match child.try_wait() {
                Ok(Some(_)) => {
                    reaped.push(*agent_id);
                    false
                }
                Ok(None) => true,
                Err(e) => {
                    tracing::warn!(agent_id = agent_id, "try_wait failed: {}", e);
                    true
                }
            });
        }

        if !reaped.is_empty() {
            let mut records = self.records.write().await;
            for agent_id in &reaped {
                if let Some(record) = records.get_mut(agent_id) {
                    record.status = AgentStatus::Stopped;
                }
            }
            tracing::info!(count = reaped.len(), "Cleaned up terminated agents");
        }

        reaped
    }

    /// Relay one command to a running agent over a short-lived client.
    ///
    /// Never raises across the boundary: every failure mode — not running,
    /// not alive, timeout, transport — comes back as a distinct
    /// [`CommandOutcome`] message.
    pub async fn send_command(&self, agent_id: u32, command: &str) -> CommandOutcome {
        {
            let mut children = self.children.write().await;
            let Some(child) = children.get_mut(&agent_id) else {
                return CommandOutcome::error(Error::AgentNotRunning(agent_id).to_string());
            };
            if !process_running(child) {
                return CommandOutcome::error(Error::AgentNotAlive(agent_id).to_string());
            }
        }

        let command_timeout = Duration::from_secs(self.config.command_timeout_secs);
        let addr = self.config.command_addr(agent_id);

        let mut client = match CommandClient::connect(&addr, command_timeout).await {
            Ok(client) => client,
            Err(e) => {
                return CommandOutcome::error(format!(
                    "Error sending command to agent {}: {}",
                    agent_id, e
                ));
            }
        };

        let outcome = match client.send_command(command).await {
            Ok(reply) => CommandOutcome::success(reply),
            Err(Error::Timeout(_)) => CommandOutcome::error(format!(
                "Timeout waiting for response from agent {}",
                agent_id
            )),
            Err(e) => CommandOutcome::error(format!(
                "Error sending command to agent {}: {}",
                agent_id, e
            )),
        };
        client.close().await;
        outcome
    }

    /// Whether an agent's process is alive right now
    pub async fn is_alive(&self, agent_id: u32) -> bool {
        let mut children = self.children.write().await;
        children
            .get_mut(&agent_id)
            .map(process_running)
            .unwrap_or(false)
    }

    /// Snapshot one record
    pub async fn record(&self, agent_id: u32) -> Option<AgentRecord> {
        self.records.read().await.get(&agent_id).cloned()
    }

    /// Snapshot all records, ordered by id
    pub async fn records(&self) -> Vec<AgentRecord> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by_key(|record| record.id);
        records
    }

    /// Snapshot all agents with live process facts, ordered by id
    pub async fn agent_infos(&self) -> Vec<AgentInfo> {
        let records = self.records().await;
        let mut children = self.children.write().await;

        records
            .into_iter()
            .map(|record| {
                let (alive, pid) = match children.get_mut(&record.id) {
                    Some(child) => (process_running(child), child.id()),
                    None => (false, None),
                };
                AgentInfo {
                    id: record.id,
                    kind: record.kind,
                    alive,
                    status: record.status,
                    port: (self.config.base_command_port as u32 + record.id) as u16,
                    pid,
                }
            })
            .collect()
    }
}

/// Liveness of an owned child. `try_wait` reaps and answers for our own
/// children; the signal-0 probe covers a pid that `try_wait` cannot see.
fn process_running(child: &mut Child) -> bool {
    match child.try_wait() {
        Ok(Some(_)) => false,
        Ok(None) => true,
        Err(_) => child
            .id()
            .map(|pid| is_process_alive(pid))
            .unwrap_or(false),
    }
}

/// Check if a process is alive by sending signal 0
fn is_process_alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as i32, 0) == 0 }
}
