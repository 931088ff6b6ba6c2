//! Locate and copy test-identifier declarations from live web pages
//!
//! A persistent daemon talks to a browser extension over a local WebSocket,
//! keeps a per-tab agent working over DOM snapshots, and turns
//! identifier-carrying elements into ready-to-paste Playwright page object
//! properties.

pub mod agent;
pub mod bridge;
pub mod browser_script;
pub mod clipboard;
pub mod codegen;
pub mod config;
pub mod controller;
pub mod dom;
pub mod errors;
pub mod inspect;
pub mod pick;
pub mod protocol;
#[cfg(test)]
mod tests;

pub use agent::{AgentEffect, AgentOutput, PageAgent};
pub use bridge::{Bridge, BridgeHost, DEFAULT_PORT};
pub use clipboard::{ClipboardSink, SystemClipboard};
pub use codegen::{kebab_to_camel, property_line};
pub use config::{default_config_path, Config, ConfigStore, DEFAULT_ATTRIBUTE};
pub use controller::{BrowserHost, ControlEvent, Controller, MENU_ID, MENU_TITLE};
pub use dom::{Bounds, DomNode, DomSnapshot, NodeId, Viewport, MAX_SNAPSHOT_NODES};
pub use errors::{Error, Result};
pub use inspect::InspectedElement;
pub use pick::{PickEngine, PickOutcome, PickSession};
pub use protocol::{
    AgentRequest, AgentResponse, ClientKind, DecorationClass, Frame, InputEvent, PageCommand,
    TabId, TooltipCmd,
};
pub use tokio_util::sync::CancellationToken;
