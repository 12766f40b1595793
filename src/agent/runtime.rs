//! Per-process agent execution loop
//!
//! One runtime per OS process. Owns the process's command server and status
//! publisher, drives the lifecycle state machine, and dispatches decoded
//! commands either to its own lifecycle handling (`stop`, `test`) or to the
//! composed behavior (`crawl`, `crawl:<limits>`).
//!
//! Entering the main loop is the `Running` condition; `running: false` is
//! the only way to reach the terminal `Stopped` state from inside the
//! process. Errors inside the loop are logged, mirrored to the status
//! channel, and followed by a short backoff; they never terminate the loop.

use crate::agent::behavior::AgentBehavior;
use crate::agent::command::{AgentCommand, CommandParseError};
use crate::agent::types::AgentStatus;
use crate::config::AgentsConfig;
use crate::error::{Error, Result};
use crate::status::StatusPublisher;
use crate::wire::{CommandServer, Exchange};

use std::time::Duration;

/// The per-process agent runtime
pub struct AgentRuntime {
    id: u32,
    config: AgentsConfig,
    behavior: Box<dyn AgentBehavior>,
    status: AgentStatus,
    running: bool,
}

impl AgentRuntime {
    /// Create a runtime for one agent id and behavior
    pub fn new(id: u32, config: AgentsConfig, behavior: Box<dyn AgentBehavior>) -> Self {
        Self {
            id,
            config,
            behavior,
            status: AgentStatus::Idle,
            running: false,
        }
    }

    /// Current business status
    pub fn status(&self) -> AgentStatus {
        self.status
    }

    /// Run until a `stop` command arrives.
    ///
    /// Startup: connect the status publisher, run the behavior's
    /// initialization hook, bind the command server, announce. An
    /// initialization or bind failure aborts before the main loop, with a
    /// status message saying so.
    pub async fn run(mut self) -> Result<()> {
        let mut status = StatusPublisher::connect(
            &self.config.status_addr(),
            self.id.to_string(),
        )
        .await;

        if let Err(e) = self.behavior.initialize(self.id) {
            tracing::error!(agent_id = self.id, "Agent initialization failed: {}", e);
            status
                .publish(format!("Agent {} initialization failed: {}", self.id, e))
                .await;
            status.close().await;
            return Err(Error::Init(format!("Agent {} failed to initialize: {}", self.id, e)));
        }

        let addr = self.config.command_addr(self.id);
        let mut server = match CommandServer::bind(&addr).await {
            Ok(server) => server,
            Err(e) => {
                tracing::error!(agent_id = self.id, "Command server bind failed: {}", e);
                status
                    .publish(format!("Agent {} initialization failed: {}", self.id, e))
                    .await;
                status.close().await;
                return Err(Error::Init(format!(
                    "Agent {} could not bind {}: {}",
                    self.id, addr, e
                )));
            }
        };

        tracing::info!(agent_id = self.id, addr = %server.local_addr(), "Agent starting");
        status.publish(format!("Agent {} started", self.id)).await;
        self.running = true;

        let poll_slice = Duration::from_millis(self.config.poll_interval_ms);
        let backoff = Duration::from_millis(self.config.error_backoff_ms);

        while self.running {
            match server.poll(poll_slice).await {
                Ok(Some(exchange)) => {
                    if let Err(e) = self.handle_exchange(exchange, &mut status).await {
                        tracing::error!(agent_id = self.id, "Error processing command: {}", e);
                        status
                            .publish(format!("Agent {} error: {}", self.id, e))
                            .await;
                        tokio::time::sleep(backoff).await;
                    }
                }
                Ok(None) => {
                    // Idle slice; emit the periodic heartbeat
                    status
                        .publish(format!("Agent {} is running", self.id))
                        .await;
                }
                Err(e) => {
                    tracing::error!(agent_id = self.id, "Error polling commands: {}", e);
                    status
                        .publish(format!("Agent {} error: {}", self.id, e))
                        .await;
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        status
            .publish(format!("Agent {} shutting down", self.id))
            .await;
        status.close().await;
        drop(server);
        tracing::info!(agent_id = self.id, "Agent closed");

        Ok(())
    }

    /// Serve one decoded exchange
    async fn handle_exchange(
        &mut self,
        exchange: Exchange,
        status: &mut StatusPublisher,
    ) -> Result<()> {
        match AgentCommand::parse(exchange.text()) {
            Ok(command) => match command {
                AgentCommand::Stop => {
                    exchange.respond("Stopping").await?;
                    status.publish(format!("Agent {} stopping", self.id)).await;
                    self.running = false;
                    self.set_status(AgentStatus::Stopped, status).await;
                }
                AgentCommand::Test => {
                    exchange.respond("Test received").await?;
                    status
                        .publish(format!("Agent {} acknowledged test", self.id))
                        .await;
                }
                AgentCommand::Crawl | AgentCommand::CrawlLimited(_) => {
                    self.run_work_command(command, exchange, status).await?;
                }
            },
            Err(CommandParseError::Unknown(text)) => {
                exchange
                    .respond(&format!("Unknown command: {}", text))
                    .await?;
                status
                    .publish(format!(
                        "Agent {} received unknown command: {}",
                        self.id, text
                    ))
                    .await;
            }
            Err(error @ CommandParseError::MalformedLimits { .. }) => {
                // Reported back without crashing the runtime or touching
                // the business status
                exchange.respond(&format!("Error: {}", error)).await?;
                status
                    .publish(format!("Agent {} rejected command: {}", self.id, error))
                    .await;
            }
        }
        Ok(())
    }

    /// Acknowledge, run the behavior synchronously, restore `Idle`.
    ///
    /// The reply goes out before the work starts; the work then blocks the
    /// command loop, so no concurrent command is served mid-crawl.
    async fn run_work_command(
        &mut self,
        command: AgentCommand,
        exchange: Exchange,
        status: &mut StatusPublisher,
    ) -> Result<()> {
        if !self.behavior.handles(&command) {
            let text = command.to_string();
            exchange
                .respond(&format!("Unknown command: {}", text))
                .await?;
            status
                .publish(format!(
                    "Agent {} received unknown command: {}",
                    self.id, text
                ))
                .await;
            return Ok(());
        }

        let ack = self.behavior.accept(&command);
        exchange.respond(&ack).await?;
        status
            .publish("Crawling command received and acknowledged")
            .await;

        self.set_status(AgentStatus::Crawling, status).await;
        if let Err(e) = self.behavior.execute(&command, status).await {
            tracing::error!(agent_id = self.id, "Work command failed: {}", e);
            status
                .publish(format!("Agent {} error: {}", self.id, e))
                .await;
        }
        self.set_status(AgentStatus::Idle, status).await;

        Ok(())
    }

    async fn set_status(&mut self, new: AgentStatus, status: &mut StatusPublisher) {
        self.status = new;
        status.publish(format!("Status changed to {}", new)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::crawler::WebCrawler;
    use crate::agent::types::AgentKind;
    use crate::config::CrawlerConfig;
    use crate::status::{StatusHub, StatusSubscriber};
    use crate::wire::CommandClient;
    use async_trait::async_trait;

    fn test_config(base_port: u16, status_port: u16) -> AgentsConfig {
        AgentsConfig {
            base_command_port: base_port,
            status_port,
            poll_interval_ms: 50,
            error_backoff_ms: 10,
            ..AgentsConfig::default()
        }
    }

    fn fast_crawler() -> Box<WebCrawler> {
        Box::new(WebCrawler::new(CrawlerConfig {
            default_max_listings: 1,
            default_max_documents: 1,
            item_delay_ms: 0,
        }))
    }

    async fn client_for(config: &AgentsConfig, id: u32) -> CommandClient {
        // The runtime binds asynchronously; retry briefly
        for _ in 0..50 {
            if let Ok(client) =
                CommandClient::connect(&config.command_addr(id), Duration::from_secs(2)).await
            {
                return client;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("agent never bound its command port");
    }

    #[tokio::test]
    async fn test_test_command_roundtrip() {
        let config = test_config(47110, 47210);
        let runtime = AgentRuntime::new(1, config.clone(), fast_crawler());
        let handle = tokio::spawn(runtime.run());

        let mut client = client_for(&config, 1).await;
        assert_eq!(client.send_command("test").await.unwrap(), "Test received");

        let mut client = client_for(&config, 1).await;
        assert_eq!(client.send_command("stop").await.unwrap(), "Stopping");
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_unknown_command_leaves_loop_running() {
        let config = test_config(47120, 47220);
        let runtime = AgentRuntime::new(1, config.clone(), fast_crawler());
        let handle = tokio::spawn(runtime.run());

        let mut client = client_for(&config, 1).await;
        let reply = client.send_command("fly").await.unwrap();
        assert_eq!(reply, "Unknown command: fly");

        // Still serving after the unknown command
        let mut client = client_for(&config, 1).await;
        assert_eq!(client.send_command("test").await.unwrap(), "Test received");

        let mut client = client_for(&config, 1).await;
        client.send_command("stop").await.unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_malformed_limits_report_error_without_crash() {
        let config = test_config(47130, 47230);
        let runtime = AgentRuntime::new(1, config.clone(), fast_crawler());
        let handle = tokio::spawn(runtime.run());

        let mut client = client_for(&config, 1).await;
        let reply = client.send_command("crawl:abc,xyz").await.unwrap();
        assert!(reply.starts_with("Error:"), "got: {}", reply);
        assert!(reply.contains("abc"));

        let mut client = client_for(&config, 1).await;
        let reply = client.send_command("crawl:").await.unwrap();
        assert!(reply.starts_with("Error:"), "got: {}", reply);

        let mut client = client_for(&config, 1).await;
        client.send_command("stop").await.unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_crawl_acknowledges_then_transitions() {
        let hub = StatusHub::bind("127.0.0.1:0").await.unwrap();
        let status_port = hub.local_addr().port();
        let config = test_config(47140, status_port);

        let mut subscriber = StatusSubscriber::connect(
            &hub.local_addr().to_string(),
            Some("1"),
        )
        .await
        .unwrap();

        let runtime = AgentRuntime::new(1, config.clone(), fast_crawler());
        let handle = tokio::spawn(runtime.run());

        let mut client = client_for(&config, 1).await;
        assert_eq!(client.send_command("crawl").await.unwrap(), "Crawling");

        // Status stream shows Crawling then back to Idle, in emission order
        let mut saw_crawling = false;
        let mut saw_idle_after = false;
        for _ in 0..20 {
            match subscriber.recv_timeout(Duration::from_secs(2)).await.unwrap() {
                Some(message) if message.text == "Status changed to CRAWLING" => {
                    saw_crawling = true;
                }
                Some(message) if message.text == "Status changed to IDLE" => {
                    if saw_crawling {
                        saw_idle_after = true;
                        break;
                    }
                }
                Some(_) => {}
                None => break,
            }
        }
        assert!(saw_crawling, "never saw CRAWLING transition");
        assert!(saw_idle_after, "never saw IDLE after CRAWLING");

        let mut client = client_for(&config, 1).await;
        client.send_command("stop").await.unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_limited_crawl_ack_text() {
        let config = test_config(47150, 47250);
        let runtime = AgentRuntime::new(2, config.clone(), fast_crawler());
        let handle = tokio::spawn(runtime.run());

        let mut client = client_for(&config, 2).await;
        let reply = client.send_command("crawl:3,2").await.unwrap();
        assert_eq!(reply, "Crawling with limits: 3,2");

        let mut client = client_for(&config, 2).await;
        client.send_command("stop").await.unwrap();
        handle.await.unwrap().unwrap();
    }

    struct FailingInit;

    #[async_trait]
    impl AgentBehavior for FailingInit {
        fn kind(&self) -> AgentKind {
            AgentKind::WebCrawler
        }

        fn initialize(&mut self, _agent_id: u32) -> Result<()> {
            Err(Error::Internal("no browser available".to_string()))
        }

        fn handles(&self, _command: &AgentCommand) -> bool {
            false
        }

        fn accept(&self, _command: &AgentCommand) -> String {
            String::new()
        }

        async fn execute(
            &mut self,
            _command: &AgentCommand,
            _status: &mut StatusPublisher,
        ) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_initialization_aborts_before_loop() {
        let hub = StatusHub::bind("127.0.0.1:0").await.unwrap();
        let mut rx = hub.subscribe();
        let config = test_config(47160, hub.local_addr().port());

        let runtime = AgentRuntime::new(3, config.clone(), Box::new(FailingInit));
        let result = runtime.run().await;
        assert!(matches!(result, Err(Error::Init(_))));

        let message = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(message.text.contains("initialization failed"));

        // The command port was never bound
        let connect =
            CommandClient::connect(&config.command_addr(3), Duration::from_millis(200)).await;
        assert!(connect.is_err());
    }
}
