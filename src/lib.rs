pub mod bus;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod rest;

pub use bus::event::{ConnectionClosed, DispatchEvent, Event, EventKind, SessionReady, SessionResumed};
pub use bus::EventBus;
pub use client::Client;
pub use config::Config;
pub use error::{ClientError, ConfigError, GatewayError, RestError};
