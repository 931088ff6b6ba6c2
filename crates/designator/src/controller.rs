//! Daemon-side coordinator
//!
//! Owns the agent registry and drives every end-to-end flow: the context menu
//! copy, pick mode, scans, and config edits. Browser I/O goes through the
//! [`BrowserHost`] seam so the whole controller runs against a fake host in
//! tests, and clipboard writes go through [`ClipboardSink`] for the same
//! reason.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::agent::{AgentEffect, PageAgent};
use crate::browser_script::{PAGE_SHIM_CSS, PAGE_SHIM_JS};
use crate::clipboard::ClipboardSink;
use crate::codegen;
use crate::config::{Config, ConfigStore};
use crate::dom::DomSnapshot;
use crate::errors::{Error, Result};
use crate::inspect::InspectedElement;
use crate::pick::PickOutcome;
use crate::protocol::{AgentRequest, AgentResponse, Frame, InputEvent, PageCommand, TabId};

/// Context menu entry registered with the extension on every connect.
pub const MENU_ID: &str = "copy-data-id";
pub const MENU_TITLE: &str = "Copy as TypeScript property";

/// Everything the controller needs from the browser side of the bridge.
#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// True while a browser extension connection is live.
    fn is_connected(&self) -> bool;

    /// The tab currently focused in the browser.
    async fn active_tab(&self) -> Result<TabId>;

    /// Probe for a live shim in a tab. `Ok(false)` means the probe timed out
    /// or nothing answered, not that the bridge itself failed.
    async fn ping(&self, tab: TabId) -> Result<bool>;

    /// Inject the shim script and stylesheet into a tab.
    async fn inject_agent(&self, tab: TabId, script: &str, css: &str) -> Result<()>;

    /// Capture a snapshot with identifier values for `attr` baked in.
    async fn snapshot(&self, tab: TabId, attr: &str) -> Result<DomSnapshot>;

    /// Apply decoration commands in a tab.
    async fn page_commands(&self, tab: TabId, commands: Vec<PageCommand>) -> Result<()>;

    /// (Re-)register the right-click menu entry.
    async fn register_menu(&self, id: &str, title: &str) -> Result<()>;
}

/// Asynchronous happenings connected panels may want to surface.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    PickCancelled { tab: TabId },
}

pub struct Controller {
    config: Arc<ConfigStore>,
    host: Arc<dyn BrowserHost>,
    clipboard: Arc<dyn ClipboardSink>,
    agents: Mutex<HashMap<TabId, PageAgent>>,
    events: broadcast::Sender<ControlEvent>,
}

impl Controller {
    pub fn new(
        config: Arc<ConfigStore>,
        host: Arc<dyn BrowserHost>,
        clipboard: Arc<dyn ClipboardSink>,
    ) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            config,
            host,
            clipboard,
            agents: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.events.subscribe()
    }

    /// Called by the bridge whenever a browser extension finishes its hello.
    pub async fn on_browser_connected(&self) {
        // Tab ids from a previous browser session are meaningless now.
        self.agents.lock().await.clear();
        if let Err(e) = self.host.register_menu(MENU_ID, MENU_TITLE).await {
            warn!(error = %e, "context menu registration failed");
        }
    }

    /// Full context menu flow for one click: resolve the right-clicked owner,
    /// copy its declaration line, confirm with a page toast.
    pub async fn menu_clicked(&self, tab: TabId) -> Result<()> {
        let config = self.config.get();
        self.ensure_agent(tab).await?;
        let dom = self.host.snapshot(tab, &config.attribute_name).await?;

        let (teardown, out) = {
            let mut agents = self.agents.lock().await;
            let agent = agents.entry(tab).or_insert_with(|| PageAgent::new(tab));
            let teardown = agent.set_snapshot(dom);
            let out = agent.handle(AgentRequest::GetRightClickedElement);
            (teardown, out)
        };
        self.flush_cancelled_session(tab, teardown).await?;
        if !out.commands.is_empty() {
            self.host.page_commands(tab, out.commands).await?;
        }
        let element = match out.response {
            AgentResponse::RightClicked { element } => element,
            other => {
                warn!(tab, ?other, "unexpected agent response to right-click lookup");
                return Ok(());
            }
        };

        match element.identifier {
            Some(identifier) => {
                let line = codegen::property_line(
                    &identifier,
                    element.tag.as_deref().unwrap_or_default(),
                    element.is_duplicate.unwrap_or(false),
                    &config.attribute_name,
                );
                info!(tab, identifier = %identifier, "context menu copy");
                self.copy_with_toast(tab, line, "Copied to clipboard!").await
            }
            None => {
                self.notify(tab, "No data attribute found on this element", true)
                    .await
            }
        }
    }

    /// Scan a tab for identifier carriers. Returns the elements along with the
    /// attribute name they were matched against, so callers render declaration
    /// lines from the same config snapshot.
    pub async fn scan(&self, tab: Option<TabId>) -> Result<(Vec<InspectedElement>, String)> {
        let tab = self.resolve_tab(tab).await?;
        let config = self.config.get();
        self.ensure_agent(tab).await?;
        let dom = self.host.snapshot(tab, &config.attribute_name).await?;

        let (teardown, out) = {
            let mut agents = self.agents.lock().await;
            let agent = agents.entry(tab).or_insert_with(|| PageAgent::new(tab));
            let teardown = agent.set_snapshot(dom);
            let out = agent.handle(AgentRequest::Scan {
                allowed_tags: config.allowed_tags.clone(),
            });
            (teardown, out)
        };
        self.flush_cancelled_session(tab, teardown).await?;
        match out.response {
            AgentResponse::Elements { elements } => {
                info!(tab, count = elements.len(), "scan complete");
                Ok((elements, config.attribute_name))
            }
            other => {
                warn!(tab, ?other, "unexpected agent response to scan");
                Ok((Vec::new(), config.attribute_name))
            }
        }
    }

    /// Start pick mode in a tab. The session keeps the attribute name read
    /// here; later config edits do not retarget it. Starting while a session
    /// is already running restarts it against the fresh capture.
    pub async fn start_pick(&self, tab: Option<TabId>) -> Result<TabId> {
        let tab = self.resolve_tab(tab).await?;
        let config = self.config.get();
        self.ensure_agent(tab).await?;
        let dom = self.host.snapshot(tab, &config.attribute_name).await?;

        let (teardown, commands) = {
            let mut agents = self.agents.lock().await;
            let agent = agents.entry(tab).or_insert_with(|| PageAgent::new(tab));
            let teardown = agent.set_snapshot(dom);
            let commands = agent
                .handle(AgentRequest::StartPick {
                    attr: config.attribute_name,
                })
                .commands;
            (teardown, commands)
        };
        self.flush_cancelled_session(tab, teardown).await?;
        if !commands.is_empty() {
            self.host.page_commands(tab, commands).await?;
        }
        info!(tab, "pick mode started");
        Ok(tab)
    }

    /// Stop pick mode in a tab. Idempotent: a tab without a session, or
    /// without an agent at all, is already stopped.
    pub async fn stop_pick(&self, tab: Option<TabId>) -> Result<TabId> {
        let tab = self.resolve_tab(tab).await?;
        let commands = {
            let mut agents = self.agents.lock().await;
            match agents.get_mut(&tab) {
                Some(agent) => agent.handle(AgentRequest::StopPick).commands,
                None => Vec::new(),
            }
        };
        if !commands.is_empty() {
            self.host.page_commands(tab, commands).await?;
            info!(tab, "pick mode stopped");
        }
        Ok(tab)
    }

    /// One synthetic input event from a tab's shim.
    pub async fn on_input(&self, tab: TabId, event: InputEvent) -> Result<()> {
        let (commands, outcome) = {
            let mut agents = self.agents.lock().await;
            match agents.get_mut(&tab) {
                Some(agent) => agent.on_input(event),
                // Straggler from a torn-down shim; nothing to route it to.
                None => return Ok(()),
            }
        };
        if !commands.is_empty() {
            self.host.page_commands(tab, commands).await?;
        }
        match outcome {
            Some(PickOutcome::Committed {
                identifier, line, ..
            }) => {
                info!(tab, identifier = %identifier, "pick committed");
                let toast = format!("Copied: {identifier}");
                self.copy_with_toast(tab, line, &toast).await
            }
            Some(PickOutcome::Cancelled) => {
                debug!(tab, "pick cancelled");
                let _ = self.events.send(ControlEvent::PickCancelled { tab });
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub fn config(&self) -> Config {
        self.config.get()
    }

    pub fn set_config(&self, config: Config) -> Result<Config> {
        self.config.set(config)
    }

    /// Dispatch one panel request and produce its reply frame. Errors become
    /// `error` frames; panels never see a dropped request.
    pub async fn handle_panel_frame(&self, frame: Frame) -> Frame {
        let result = match frame {
            Frame::Scan { tab } => self.scan(tab).await.map(|(elements, attribute_name)| {
                Frame::ScanResult {
                    elements,
                    attribute_name,
                }
            }),
            Frame::StartPick { tab } => self.start_pick(tab).await.map(|_| Frame::Ok),
            Frame::StopPick { tab } => self.stop_pick(tab).await.map(|_| Frame::Ok),
            Frame::GetConfig => Ok(Frame::Config {
                config: self.config.get(),
            }),
            Frame::SetConfig { config } => {
                self.set_config(config).map(|config| Frame::Config { config })
            }
            other => Err(Error::InvalidArgument(format!(
                "unsupported panel frame: {other:?}"
            ))),
        };
        result.unwrap_or_else(|e| {
            warn!(error = %e, "panel request failed");
            Frame::Error {
                message: e.to_string(),
            }
        })
    }

    /// Dispatch one unsolicited browser frame. Response frames are paired off
    /// inside the bridge and never reach here.
    pub async fn handle_browser_frame(&self, frame: Frame) {
        match frame {
            Frame::MenuClicked { tab } => {
                if let Err(e) = self.menu_clicked(tab).await {
                    warn!(tab, error = %e, "context menu flow failed");
                }
            }
            Frame::Input { tab, event } => {
                if let Err(e) = self.on_input(tab, event).await {
                    warn!(tab, error = %e, "input dispatch failed");
                }
            }
            other => debug!(?other, "unhandled browser frame"),
        }
    }

    /// Make sure a live shim and a registered agent exist for a tab. Probes
    /// first; injects and re-probes when the probe misses. Injection replaces
    /// any previous agent since its snapshot indices are stale.
    async fn ensure_agent(&self, tab: TabId) -> Result<()> {
        if !self.host.is_connected() {
            return Err(Error::BridgeUnavailable(
                "no browser extension connected".to_string(),
            ));
        }
        if self.host.ping(tab).await? {
            let mut agents = self.agents.lock().await;
            agents.entry(tab).or_insert_with(|| PageAgent::new(tab));
            return Ok(());
        }
        debug!(tab, "no live shim, injecting");
        self.host
            .inject_agent(tab, PAGE_SHIM_JS, PAGE_SHIM_CSS)
            .await?;
        if !self.host.ping(tab).await? {
            return Err(Error::AgentUnreachable(format!(
                "tab {tab} did not answer after injection"
            )));
        }
        self.agents.lock().await.insert(tab, PageAgent::new(tab));
        Ok(())
    }

    async fn resolve_tab(&self, tab: Option<TabId>) -> Result<TabId> {
        match tab {
            Some(tab) => Ok(tab),
            None => self.host.active_tab().await,
        }
    }

    /// Finishes off a pick session that a snapshot replacement cancelled:
    /// pushes its teardown to the page and lets panels know, the same way an
    /// Escape does.
    async fn flush_cancelled_session(
        &self,
        tab: TabId,
        teardown: Vec<PageCommand>,
    ) -> Result<()> {
        if teardown.is_empty() {
            return Ok(());
        }
        info!(tab, "pick session cancelled by snapshot refresh");
        self.host.page_commands(tab, teardown).await?;
        let _ = self.events.send(ControlEvent::PickCancelled { tab });
        Ok(())
    }

    /// Copy text through the tab's agent, then confirm with a toast. A failed
    /// write still tells the user, via an error toast.
    async fn copy_with_toast(&self, tab: TabId, text: String, toast: &str) -> Result<()> {
        let effect = {
            let mut agents = self.agents.lock().await;
            let agent = agents.entry(tab).or_insert_with(|| PageAgent::new(tab));
            agent.handle(AgentRequest::CopyToClipboard { text }).effect
        };
        let Some(AgentEffect::Clipboard { text }) = effect else {
            return Ok(());
        };
        match self.clipboard.set_text(&text).await {
            Ok(()) => self.notify(tab, toast, false).await,
            Err(e) => {
                warn!(tab, error = %e, "clipboard write failed");
                self.notify(tab, "Copy failed", true).await?;
                Err(e)
            }
        }
    }

    async fn notify(&self, tab: TabId, message: &str, is_error: bool) -> Result<()> {
        let commands = {
            let mut agents = self.agents.lock().await;
            let agent = agents.entry(tab).or_insert_with(|| PageAgent::new(tab));
            agent
                .handle(AgentRequest::ShowNotification {
                    message: message.to_string(),
                    is_error,
                })
                .commands
        };
        self.host.page_commands(tab, commands).await
    }
}
