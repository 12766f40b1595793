//! Agent module — per-process runtime, behaviors, and shared types
//!
//! An agent is one OS process owning one command server (bound at
//! `base_command_port + agent_id`) and one status publisher. The runtime
//! drives the state machine `Idle → Running → (Crawling ⇄ Idle) → Stopped`
//! and delegates work commands to a composed [`AgentBehavior`].

pub mod behavior;
pub mod command;
pub mod crawler;
pub mod runtime;
pub mod types;

pub use behavior::AgentBehavior;
pub use command::{AgentCommand, CommandParseError, CrawlLimits};
pub use crawler::WebCrawler;
pub use runtime::AgentRuntime;
pub use types::{AgentInfo, AgentKind, AgentRecord, AgentStatus};
