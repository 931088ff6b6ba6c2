//! WebSocket bridge between the daemon, the browser extension, and panels
//!
//! One listener on a fixed local port. Each connection opens with a `hello`
//! frame naming the client kind. The browser extension gets a reader loop
//! that pairs response frames with in-flight requests and queues the rest for
//! the controller in arrival order; panels get a simple request/reply loop
//! plus forwarded control events. All sends that can observe an absent peer
//! return errors that are logged, never panics.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::controller::{BrowserHost, ControlEvent, Controller};
use crate::dom::DomSnapshot;
use crate::errors::{Error, Result};
use crate::protocol::{ClientKind, Frame, PageCommand, TabId};

pub const DEFAULT_PORT: u16 = 17431;

/// Probe window for a shim that may simply not be there.
const PROBE_TIMEOUT: Duration = Duration::from_millis(1500);
/// Window for requests where the other side is known to be alive.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// How long a fresh connection gets to identify itself.
const HELLO_TIMEOUT: Duration = Duration::from_secs(5);

/// One in-flight request toward the extension. Only one request of a kind is
/// outstanding per tab at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PendKey {
    Ping(TabId),
    Inject(TabId),
    Snapshot(TabId),
    ActiveTab,
}

impl PendKey {
    fn describe(self) -> String {
        match self {
            PendKey::Ping(tab) => format!("shim probe in tab {tab}"),
            PendKey::Inject(tab) => format!("shim injection in tab {tab}"),
            PendKey::Snapshot(tab) => format!("snapshot of tab {tab}"),
            PendKey::ActiveTab => "active tab lookup".to_string(),
        }
    }
}

struct Client {
    sender: mpsc::UnboundedSender<Message>,
    connected_at: Instant,
}

type PendingMap = HashMap<PendKey, oneshot::Sender<Frame>>;

/// Transport state shared between the accept loop and the host handle.
#[derive(Default)]
struct BridgeState {
    /// The active browser extension connection; the most recent hello wins.
    browser: std::sync::Mutex<Option<Client>>,
    pending: Mutex<PendingMap>,
}

impl BridgeState {
    fn set_browser(&self, client: Client) {
        let mut slot = self
            .browser
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = slot.replace(client) {
            warn!(
                connected_at = ?previous.connected_at,
                "replacing an existing browser extension connection"
            );
        }
    }

    /// Drops the browser slot if it still belongs to this connection and says
    /// whether it did. A reader unwinding after a quick reconnect finds the
    /// slot owned by its replacement and must leave the replacement's
    /// in-flight requests alone.
    fn clear_browser(&self, sender: &mpsc::UnboundedSender<Message>) -> bool {
        let mut slot = self
            .browser
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot
            .as_ref()
            .map_or(false, |c| c.sender.same_channel(sender))
        {
            *slot = None;
            return true;
        }
        false
    }

    fn browser_connected(&self) -> bool {
        self.browser
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map_or(false, |c| !c.sender.is_closed())
    }

    fn send_to_browser(&self, frame: &Frame) -> Result<()> {
        let payload = serde_json::to_string(frame)?;
        let slot = self
            .browser
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match slot.as_ref() {
            Some(client) if !client.sender.is_closed() => client
                .sender
                .send(Message::Text(payload))
                .map_err(|_| Error::BridgeUnavailable("extension send channel closed".into())),
            _ => Err(Error::BridgeUnavailable(
                "no browser extension connected".into(),
            )),
        }
    }

    async fn complete(&self, key: PendKey, frame: Frame) {
        let waiter = self.pending.lock().await.remove(&key);
        match waiter {
            Some(tx) => {
                let _ = tx.send(frame);
            }
            None => debug!(?key, "response with no waiter"),
        }
    }

    /// Every pending request is extension-bound, so a disconnect fails them
    /// all at once.
    async fn abort_pending(&self) {
        let mut pending = self.pending.lock().await;
        if !pending.is_empty() {
            warn!(
                count = pending.len(),
                "dropping in-flight requests after extension disconnect"
            );
        }
        pending.clear();
    }
}

/// The controller's view of the transport. Cheap to clone via the shared
/// state; usable before the accept loop starts.
pub struct BridgeHost {
    state: Arc<BridgeState>,
}

impl BridgeHost {
    async fn request(&self, key: PendKey, frame: Frame, window: Duration) -> Result<Frame> {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.state.pending.lock().await;
            if pending.contains_key(&key) {
                return Err(Error::InvalidArgument(format!(
                    "already waiting for {}",
                    key.describe()
                )));
            }
            pending.insert(key, tx);
        }
        if let Err(e) = self.state.send_to_browser(&frame) {
            self.state.pending.lock().await.remove(&key);
            return Err(e);
        }
        match tokio::time::timeout(window, rx).await {
            Ok(Ok(frame)) => Ok(frame),
            Ok(Err(_)) => Err(Error::BridgeUnavailable(
                "extension disconnected mid-request".into(),
            )),
            Err(_) => {
                self.state.pending.lock().await.remove(&key);
                Err(Error::Timeout(key.describe()))
            }
        }
    }
}

#[async_trait]
impl BrowserHost for BridgeHost {
    fn is_connected(&self) -> bool {
        self.state.browser_connected()
    }

    async fn active_tab(&self) -> Result<TabId> {
        match self
            .request(PendKey::ActiveTab, Frame::GetActiveTab, REQUEST_TIMEOUT)
            .await?
        {
            Frame::ActiveTab { tab } => Ok(tab),
            other => Err(Error::BridgeUnavailable(format!(
                "mismatched active tab response: {other:?}"
            ))),
        }
    }

    async fn ping(&self, tab: TabId) -> Result<bool> {
        match self
            .request(PendKey::Ping(tab), Frame::Ping { tab }, PROBE_TIMEOUT)
            .await
        {
            Ok(Frame::PingResult { ok, .. }) => Ok(ok),
            Ok(other) => {
                warn!(?other, "mismatched ping response");
                Ok(false)
            }
            // A silent tab is a miss, not a failure.
            Err(Error::Timeout(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn inject_agent(&self, tab: TabId, script: &str, css: &str) -> Result<()> {
        let frame = Frame::InjectAgent {
            tab,
            script: script.to_string(),
            css: css.to_string(),
        };
        match self
            .request(PendKey::Inject(tab), frame, REQUEST_TIMEOUT)
            .await?
        {
            Frame::InjectResult { ok: true, .. } => Ok(()),
            Frame::InjectResult { ok: false, error, .. } => Err(Error::AgentUnreachable(
                error.unwrap_or_else(|| format!("tab {tab} refused injection")),
            )),
            other => Err(Error::AgentUnreachable(format!(
                "mismatched injection response: {other:?}"
            ))),
        }
    }

    async fn snapshot(&self, tab: TabId, attr: &str) -> Result<DomSnapshot> {
        let frame = Frame::SnapshotRequest {
            tab,
            attr: attr.to_string(),
        };
        match self
            .request(PendKey::Snapshot(tab), frame, REQUEST_TIMEOUT)
            .await?
        {
            Frame::Snapshot { dom, .. } => Ok(dom),
            other => Err(Error::AgentUnreachable(format!(
                "mismatched snapshot response: {other:?}"
            ))),
        }
    }

    async fn page_commands(&self, tab: TabId, commands: Vec<PageCommand>) -> Result<()> {
        self.state.send_to_browser(&Frame::Page { tab, commands })
    }

    async fn register_menu(&self, id: &str, title: &str) -> Result<()> {
        self.state.send_to_browser(&Frame::RegisterMenu {
            id: id.to_string(),
            title: title.to_string(),
        })
    }
}

/// The WebSocket server. Bind first, wire the host into a controller, then
/// run the accept loop.
pub struct Bridge {
    listener: TcpListener,
    state: Arc<BridgeState>,
}

impl Bridge {
    pub async fn bind(port: u16) -> Result<Self> {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                Error::BridgeUnavailable(format!(
                    "port {port} is already in use (is another designator daemon running?)"
                ))
            } else {
                Error::IoError(e)
            }
        })?;
        info!(%addr, "bridge listening");
        Ok(Self {
            listener,
            state: Arc::new(BridgeState::default()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn host(&self) -> Arc<BridgeHost> {
        Arc::new(BridgeHost {
            state: self.state.clone(),
        })
    }

    /// Accept loop. Returns once the shutdown token fires.
    pub async fn run(self, controller: Arc<Controller>, shutdown: CancellationToken) {
        loop {
            let (stream, peer) = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("bridge shutting down");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                },
            };
            debug!(%peer, "connection accepted");
            tokio::spawn(handle_connection(
                stream,
                self.state.clone(),
                controller.clone(),
                shutdown.clone(),
            ));
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<BridgeState>,
    controller: Arc<Controller>,
    shutdown: CancellationToken,
) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(error = %e, "websocket handshake failed");
            return;
        }
    };
    let (mut sink, mut stream) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = sink.send(msg).await {
                warn!(error = %e, "websocket send failed");
                break;
            }
        }
    });

    match tokio::time::timeout(HELLO_TIMEOUT, next_frame(&mut stream)).await {
        Ok(Some(Frame::Hello {
            client: ClientKind::Browser,
            browser,
        })) => {
            info!(
                browser = browser.as_deref().unwrap_or("unknown"),
                "browser extension connected"
            );
            state.set_browser(Client {
                sender: tx.clone(),
                connected_at: Instant::now(),
            });
            controller.on_browser_connected().await;
            browser_loop(&mut stream, &state, &controller, &shutdown).await;
            if state.clear_browser(&tx) {
                state.abort_pending().await;
                info!("browser extension disconnected");
            } else {
                debug!("stale browser connection unwound after a reconnect");
            }
        }
        Ok(Some(Frame::Hello {
            client: ClientKind::Panel,
            ..
        })) => {
            debug!("panel connected");
            panel_loop(&mut stream, &tx, &controller, &shutdown).await;
            debug!("panel disconnected");
        }
        Ok(Some(other)) => warn!(?other, "client skipped hello, dropping connection"),
        Ok(None) => {}
        Err(_) => warn!("client sent no hello in time, dropping connection"),
    }
    writer.abort();
}

/// Browser reader loop. Response frames complete their waiters directly; all
/// other frames go through a single dispatcher task so events for one tab are
/// handled in arrival order even while the menu flow awaits round trips.
async fn browser_loop(
    stream: &mut SplitStream<WebSocketStream<TcpStream>>,
    state: &Arc<BridgeState>,
    controller: &Arc<Controller>,
    shutdown: &CancellationToken,
) {
    let (dispatch_tx, mut dispatch_rx) = mpsc::unbounded_channel::<Frame>();
    let dispatcher = {
        let controller = controller.clone();
        tokio::spawn(async move {
            while let Some(frame) = dispatch_rx.recv().await {
                controller.handle_browser_frame(frame).await;
            }
        })
    };

    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => break,
            frame = next_frame(stream) => match frame {
                Some(frame) => frame,
                None => break,
            },
        };
        match frame {
            Frame::PingResult { tab, .. } => state.complete(PendKey::Ping(tab), frame).await,
            Frame::InjectResult { tab, .. } => state.complete(PendKey::Inject(tab), frame).await,
            Frame::Snapshot { tab, .. } => state.complete(PendKey::Snapshot(tab), frame).await,
            Frame::ActiveTab { .. } => state.complete(PendKey::ActiveTab, frame).await,
            other => {
                let _ = dispatch_tx.send(other);
            }
        }
    }

    drop(dispatch_tx);
    let _ = dispatcher.await;
}

async fn panel_loop(
    stream: &mut SplitStream<WebSocketStream<TcpStream>>,
    tx: &mpsc::UnboundedSender<Message>,
    controller: &Arc<Controller>,
    shutdown: &CancellationToken,
) {
    let mut events = controller.subscribe();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => match event {
                Ok(ControlEvent::PickCancelled { tab }) => {
                    if send_frame(tx, &Frame::PickCancelled { tab }).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "panel event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            frame = next_frame(stream) => {
                let Some(frame) = frame else { break };
                let reply = controller.handle_panel_frame(frame).await;
                if send_frame(tx, &reply).is_err() {
                    break;
                }
            }
        }
    }
}

fn send_frame(tx: &mpsc::UnboundedSender<Message>, frame: &Frame) -> Result<()> {
    let payload = serde_json::to_string(frame)?;
    tx.send(Message::Text(payload))
        .map_err(|_| Error::BridgeUnavailable("client send channel closed".into()))
}

/// Next parseable frame, skipping non-text messages and invalid JSON the way
/// the wire actually produces them.
async fn next_frame(stream: &mut SplitStream<WebSocketStream<TcpStream>>) -> Option<Frame> {
    while let Some(msg) = stream.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "websocket receive failed");
                return None;
            }
        };
        if !msg.is_text() {
            continue;
        }
        let txt = msg.into_text().unwrap_or_default();
        match serde_json::from_str::<Frame>(&txt) {
            Ok(frame) => return Some(frame),
            Err(e) => warn!(error = %e, "invalid frame json"),
        }
    }
    None
}
