//! Web-crawler agent behavior
//!
//! The crawl body here is a stub that walks the configured limits and
//! publishes progress; the site-specific extraction pipeline plugs into
//! [`WebCrawler::crawl`] without touching the runtime or the channels.

use crate::agent::behavior::AgentBehavior;
use crate::agent::command::{AgentCommand, CrawlLimits};
use crate::agent::types::AgentKind;
use crate::config::CrawlerConfig;
use crate::error::Result;
use crate::status::StatusPublisher;

use async_trait::async_trait;
use std::time::Duration;

/// Crawler variant of [`AgentBehavior`]
pub struct WebCrawler {
    agent_id: u32,
    config: CrawlerConfig,
}

impl WebCrawler {
    /// Create a crawler behavior
    pub fn new(config: CrawlerConfig) -> Self {
        Self {
            agent_id: 0,
            config,
        }
    }

    fn default_limits(&self) -> CrawlLimits {
        CrawlLimits {
            max_listings: self.config.default_max_listings,
            max_documents: self.config.default_max_documents,
        }
    }

    /// The crawl body. Walks up to `max_listings` listings, fetching up to
    /// `max_documents` documents each, publishing progress as it goes.
    async fn crawl(&mut self, limits: CrawlLimits, status: &mut StatusPublisher) -> Result<()> {
        tracing::info!(
            agent_id = self.agent_id,
            max_listings = limits.max_listings,
            max_documents = limits.max_documents,
            "Starting crawl operation"
        );
        status.publish("Starting crawl operation").await;

        for listing in 1..=limits.max_listings {
            // TODO: wire in the extraction pipeline once the target portal
            // adapter lands; until then simulate the visit
            tokio::time::sleep(Duration::from_millis(self.config.item_delay_ms)).await;
            status
                .publish(format!(
                    "Visited listing {}/{}",
                    listing, limits.max_listings
                ))
                .await;

            for _ in 0..limits.max_documents {
                tokio::time::sleep(Duration::from_millis(self.config.item_delay_ms)).await;
            }
        }

        status.publish("Crawl operation complete").await;
        Ok(())
    }
}

#[async_trait]
impl AgentBehavior for WebCrawler {
    fn kind(&self) -> AgentKind {
        AgentKind::WebCrawler
    }

    fn initialize(&mut self, agent_id: u32) -> Result<()> {
        self.agent_id = agent_id;
        tracing::info!(agent_id = agent_id, "Initializing WebCrawler");
        Ok(())
    }

    fn handles(&self, command: &AgentCommand) -> bool {
        matches!(
            command,
            AgentCommand::Crawl | AgentCommand::CrawlLimited(_)
        )
    }

    fn accept(&self, command: &AgentCommand) -> String {
        match command {
            AgentCommand::CrawlLimited(limits) => {
                format!("Crawling with limits: {}", limits)
            }
            _ => "Crawling".to_string(),
        }
    }

    async fn execute(
        &mut self,
        command: &AgentCommand,
        status: &mut StatusPublisher,
    ) -> Result<()> {
        let limits = match command {
            AgentCommand::CrawlLimited(limits) => *limits,
            _ => self.default_limits(),
        };
        self.crawl(limits, status).await
    }
}
