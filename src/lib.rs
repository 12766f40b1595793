//! CrawlHive - Agent process supervision and messaging for web-crawler fleets
//!
//! CrawlHive launches independent worker processes ("agents"), controls them
//! over a per-agent command channel, collects their activity over a shared
//! broadcast status channel, and fronts everything with a single command
//! dispatcher that callers reach through a pooled client connection.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Front end (caller)                        │
//! │   ┌──────────────────────────────────────────────────────────┐   │
//! │   │    Connection Pool (N reusable command-channel sockets)   │   │
//! │   └────────────────────────────┬─────────────────────────────┘   │
//! └────────────────────────────────┼─────────────────────────────────┘
//!                                  │ {command, params} / {data, status_code}
//! ┌────────────────────────────────▼─────────────────────────────────┐
//! │                     Backend Command Dispatcher                    │
//! │   store CRUD · status · start_agent · get_agents · stop_agent    │
//! │   agent_command                     │                            │
//! │   ┌────────────────┐   ┌────────────▼────────────┐               │
//! │   │  Store adapter │   │     Agent Supervisor     │               │
//! │   └────────────────┘   │  records + process map   │               │
//! │                        └──────┬──────────┬────────┘               │
//! │   ┌──────────────────────────┐│          │ spawn / stop / relay  │
//! │   │        Status Hub        ││          │                       │
//! │   └───────────▲──────────────┘│          │                       │
//! └───────────────┼───────────────┼──────────┼───────────────────────┘
//!                 │ publish       │          │ command channel
//!         ┌───────┴───────────────▼──────────▼───────┐
//!         │        Agent process (one per agent)      │
//!         │   AgentRuntime ∘ AgentBehavior (crawler)  │
//!         └───────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`wire`]: the synchronous command channel (framed request/reply)
//! - [`status`]: the asynchronous status broadcast channel
//! - [`agent`]: the per-process runtime, behaviors, and shared types
//! - [`supervisor`]: the agent registry and process lifecycle owner
//! - [`dispatcher`]: the backend command process
//! - [`pool`]: the bounded client-side connection pool
//! - [`store`]: the persistent-store collaborator interface
//! - [`config`]: configuration management

pub mod agent;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod pool;
pub mod status;
pub mod store;
pub mod supervisor;
pub mod wire;

pub use config::CrawlHiveConfig;
pub use error::{Error, Result};
