use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::events::GatewayFrame;
use super::writer::{Outbound, OutboundSender};

/// Last time the server acknowledged a heartbeat.
#[derive(Debug, Default)]
pub struct AckTracker {
    last_ack: Option<Instant>,
}

impl AckTracker {
    pub fn record_ack(&mut self, at: Instant) {
        self.last_ack = Some(at);
    }

    /// Never stale before the first ack.
    pub fn is_stale(&self, now: Instant, interval: Duration) -> bool {
        match self.last_ack {
            Some(last) => now > last + interval,
            None => false,
        }
    }
}

pub type SharedAcks = Arc<Mutex<AckTracker>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatExit {
    Zombied,
    WriterClosed,
}

/// Sends a heartbeat every interval and watches for missing acks.
pub struct HeartbeatMonitor {
    interval: Duration,
    acks: SharedAcks,
    outbound: OutboundSender,
}

impl HeartbeatMonitor {
    pub fn new(interval: Duration, acks: SharedAcks, outbound: OutboundSender) -> Self {
        Self {
            interval,
            acks,
            outbound,
        }
    }

    pub async fn run(self) -> HeartbeatExit {
        loop {
            if self
                .outbound
                .send(Outbound::Frame(GatewayFrame::heartbeat()))
                .is_err()
            {
                return HeartbeatExit::WriterClosed;
            }

            if self.acks.lock().await.is_stale(Instant::now(), self.interval) {
                tracing::error!("zombied connection detected");
                return HeartbeatExit::Zombied;
            }

            tracing::debug!("heartbeat sent, next in {:?}", self.interval);
            tokio::time::sleep(self.interval).await;
        }
    }

    pub fn spawn(self) -> HeartbeatHandle {
        let (zombied_tx, zombied_rx) = oneshot::channel();
        let acks = self.acks.clone();
        let task = tokio::spawn(async move {
            if self.run().await == HeartbeatExit::Zombied {
                let _ = zombied_tx.send(());
            }
        });
        HeartbeatHandle {
            task,
            acks,
            zombied: zombied_rx,
        }
    }
}

/// Running heartbeat task. Dropping the handle aborts the task.
pub struct HeartbeatHandle {
    task: JoinHandle<()>,
    acks: SharedAcks,
    zombied: oneshot::Receiver<()>,
}

impl HeartbeatHandle {
    /// Where HEARTBEAT_ACK arrivals are recorded for this monitor.
    pub fn acks(&self) -> &SharedAcks {
        &self.acks
    }

    /// `true` once the monitor reports a zombied connection, `false` if it
    /// stopped for any other reason. Do not call again after it resolves.
    pub async fn zombied(&mut self) -> bool {
        (&mut self.zombied).await.is_ok()
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
