//! Agent behavior capability interface
//!
//! The runtime owns the channels and the state machine; a behavior supplies
//! the domain action. Composition replaces subclassing: the runtime asks
//! `handles` whether a decoded command belongs to the behavior, sends the
//! `accept` acknowledgement on the command channel, and only then runs
//! `execute` — the protocol replies before the work, and the work blocks the
//! command loop until it finishes.

use crate::agent::command::AgentCommand;
use crate::agent::types::AgentKind;
use crate::error::Result;
use crate::status::StatusPublisher;

use async_trait::async_trait;

/// Domain capability composed into an [`crate::agent::AgentRuntime`]
#[async_trait]
pub trait AgentBehavior: Send {
    /// The variant this behavior implements
    fn kind(&self) -> AgentKind;

    /// Startup hook, run before the main loop. A failure aborts startup;
    /// the runtime reports it on the status channel and never enters the
    /// loop.
    fn initialize(&mut self, agent_id: u32) -> Result<()>;

    /// Whether this behavior executes the given command
    fn handles(&self, command: &AgentCommand) -> bool;

    /// Acknowledgement text sent on the command channel before `execute`
    fn accept(&self, command: &AgentCommand) -> String;

    /// Run the command. Publishes progress on the status channel; any error
    /// is reported by the runtime without leaving the main loop.
    async fn execute(
        &mut self,
        command: &AgentCommand,
        status: &mut StatusPublisher,
    ) -> Result<()>;
}
