use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::bus::EventBus;
use crate::config::Config;
use crate::error::{ClientError, GatewayError};
use crate::gateway::{GatewayConnection, GatewayHandle};
use crate::rest::RestClient;

/// Owns one gateway connection, the REST client and the event bus they
/// share. Nothing here is process-wide; build as many clients as needed.
pub struct Client {
    config: Arc<Config>,
    events: Arc<EventBus>,
    rest: Arc<RestClient>,
    gateway: GatewayHandle,
    connection: Option<GatewayConnection>,
    task: Option<JoinHandle<Result<(), GatewayError>>>,
}

impl Client {
    pub fn new(config: Config) -> Self {
        Self::with_http(config, reqwest::Client::new())
    }

    pub fn with_http(config: Config, http: reqwest::Client) -> Self {
        let config = Arc::new(config);
        let events = Arc::new(EventBus::new());
        let rest = Arc::new(RestClient::with_http(&config, http));
        let connection = GatewayConnection::new(config.clone(), events.clone());
        Self {
            gateway: connection.handle(),
            connection: Some(connection),
            config,
            events,
            rest,
            task: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn rest(&self) -> &Arc<RestClient> {
        &self.rest
    }

    pub fn gateway(&self) -> &GatewayHandle {
        &self.gateway
    }

    /// Spawn the gateway loop. Register listeners before calling this to
    /// see the first events.
    pub fn start(&mut self) -> Result<(), ClientError> {
        let mut connection = self.connection.take().ok_or(ClientError::AlreadyStarted)?;
        self.task = Some(tokio::spawn(async move { connection.run().await }));
        Ok(())
    }

    pub fn disconnect(&self) {
        self.gateway.disconnect();
    }

    /// Wait for the gateway loop to end.
    pub async fn join(&mut self) -> Result<(), ClientError> {
        let task = self.task.take().ok_or(ClientError::NotStarted)?;
        task.await??;
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<(), ClientError> {
        self.disconnect();
        self.join().await
    }
}
