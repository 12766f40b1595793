//! Agent command decoding
//!
//! Commands arrive as bare text and are decoded exactly once, at the
//! transport boundary, into the closed [`AgentCommand`] enum. Handlers match
//! it exhaustively; the "unknown command" path lives here in the decoder.

use std::str::FromStr;

/// Commands an agent runtime understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentCommand {
    /// Stop the runtime and exit the process
    Stop,

    /// Liveness probe
    Test,

    /// Run the domain action with default limits
    Crawl,

    /// Run the domain action with explicit limits
    CrawlLimited(CrawlLimits),
}

impl AgentCommand {
    /// Decode a received command string
    pub fn parse(input: &str) -> Result<Self, CommandParseError> {
        let trimmed = input.trim();
        match trimmed {
            "stop" => Ok(Self::Stop),
            "test" => Ok(Self::Test),
            "crawl" => Ok(Self::Crawl),
            _ => {
                if let Some(body) = trimmed.strip_prefix("crawl:") {
                    let limits = CrawlLimits::from_str(body).map_err(|reason| {
                        CommandParseError::MalformedLimits {
                            input: body.trim().to_string(),
                            reason,
                        }
                    })?;
                    Ok(Self::CrawlLimited(limits))
                } else {
                    Err(CommandParseError::Unknown(trimmed.to_string()))
                }
            }
        }
    }
}

impl std::fmt::Display for AgentCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stop => write!(f, "stop"),
            Self::Test => write!(f, "test"),
            Self::Crawl => write!(f, "crawl"),
            Self::CrawlLimited(limits) => write!(f, "crawl:{}", limits),
        }
    }
}

/// Why a command string failed to decode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    /// Not a recognized command; the exchange still completes with an
    /// "Unknown command" reply
    Unknown(String),

    /// A `crawl:` command whose limits do not parse
    MalformedLimits { input: String, reason: String },
}

impl std::fmt::Display for CommandParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown(command) => write!(f, "Unknown command: {}", command),
            Self::MalformedLimits { input, reason } => {
                write!(f, "Error parsing crawl limits \"{}\": {}", input, reason)
            }
        }
    }
}

/// Crawl limits: `<max_listings>,<max_documents>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlLimits {
    /// Maximum listings to visit
    pub max_listings: u32,

    /// Maximum documents to fetch per listing
    pub max_documents: u32,
}

impl FromStr for CrawlLimits {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.trim();
        if body.is_empty() {
            return Err("expected two comma-separated integers, got nothing".to_string());
        }

        let mut parts = body.split(',');
        let first = parts.next().unwrap_or("").trim();
        let second = parts
            .next()
            .ok_or_else(|| "expected two comma-separated integers".to_string())?
            .trim();
        if parts.next().is_some() {
            return Err("expected exactly two comma-separated integers".to_string());
        }

        let max_listings = first
            .parse::<u32>()
            .map_err(|e| format!("bad listing limit \"{}\": {}", first, e))?;
        let max_documents = second
            .parse::<u32>()
            .map_err(|e| format!("bad document limit \"{}\": {}", second, e))?;

        Ok(Self {
            max_listings,
            max_documents,
        })
    }
}

impl std::fmt::Display for CrawlLimits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.max_listings, self.max_documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_commands() {
        assert_eq!(AgentCommand::parse("stop").unwrap(), AgentCommand::Stop);
        assert_eq!(AgentCommand::parse("test").unwrap(), AgentCommand::Test);
        assert_eq!(AgentCommand::parse("crawl").unwrap(), AgentCommand::Crawl);
        assert_eq!(AgentCommand::parse(" crawl ").unwrap(), AgentCommand::Crawl);
    }

    #[test]
    fn test_parse_limited_crawl() {
        let command = AgentCommand::parse("crawl:3,2").unwrap();
        assert_eq!(
            command,
            AgentCommand::CrawlLimited(CrawlLimits {
                max_listings: 3,
                max_documents: 2,
            })
        );
    }

    #[test]
    fn test_parse_limited_crawl_with_spaces() {
        let command = AgentCommand::parse("crawl: 10 , 4").unwrap();
        assert_eq!(
            command,
            AgentCommand::CrawlLimited(CrawlLimits {
                max_listings: 10,
                max_documents: 4,
            })
        );
    }

    #[test]
    fn test_empty_limits_rejected() {
        match AgentCommand::parse("crawl:") {
            Err(CommandParseError::MalformedLimits { reason, .. }) => {
                assert!(reason.contains("got nothing"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_limits_rejected() {
        match AgentCommand::parse("crawl:abc,xyz") {
            Err(CommandParseError::MalformedLimits { input, reason }) => {
                assert_eq!(input, "abc,xyz");
                assert!(reason.contains("abc"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_command() {
        match AgentCommand::parse("fly") {
            Err(CommandParseError::Unknown(text)) => assert_eq!(text, "fly"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_display_roundtrip() {
        let command = AgentCommand::parse("crawl:3,2").unwrap();
        assert_eq!(command.to_string(), "crawl:3,2");
    }
}
