//! Shared agent types

use serde::{Deserialize, Serialize};

/// Business status of an agent.
///
/// `Running` is the main-loop condition itself; `Idle`/`Crawling` are the
/// business states reported while the loop runs. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Running,
    Stopped,
    Crawling,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Running => write!(f, "RUNNING"),
            Self::Stopped => write!(f, "STOPPED"),
            Self::Crawling => write!(f, "CRAWLING"),
        }
    }
}

/// Agent variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentKind {
    WebCrawler,
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WebCrawler => write!(f, "web-crawler"),
        }
    }
}

impl std::str::FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "web-crawler" | "webcrawler" => Ok(Self::WebCrawler),
            other => Err(format!("unsupported agent type: {}", other)),
        }
    }
}

/// Identity and bookkeeping for one logical agent.
///
/// Owned exclusively by the supervisor. `status` mirrors the live process's
/// state only at explicit start/stop/cleanup points; process liveness, not
/// this field, decides whether an agent is alive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Positive, unique, never reused
    pub id: u32,

    /// Agent variant
    #[serde(rename = "type")]
    pub kind: AgentKind,

    /// Advisory status
    pub status: AgentStatus,
}

/// Wire shape for listing agents, including live process facts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: u32,

    #[serde(rename = "type")]
    pub kind: AgentKind,

    pub alive: bool,

    pub status: AgentStatus,

    /// The agent's derived command port
    pub port: u16,

    pub pid: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_display() {
        assert_eq!(AgentStatus::Idle.to_string(), "IDLE");
        assert_eq!(AgentStatus::Crawling.to_string(), "CRAWLING");
    }

    #[test]
    fn test_kind_roundtrip() {
        let kind = AgentKind::from_str("web-crawler").unwrap();
        assert_eq!(kind, AgentKind::WebCrawler);
        assert_eq!(kind.to_string(), "web-crawler");
        assert!(AgentKind::from_str("submarine").is_err());
    }

    #[test]
    fn test_record_serializes_kind_as_type() {
        let record = AgentRecord {
            id: 1,
            kind: AgentKind::WebCrawler,
            status: AgentStatus::Idle,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"type\":\"web-crawler\""));
        assert!(json.contains("\"status\":\"idle\""));
    }
}
