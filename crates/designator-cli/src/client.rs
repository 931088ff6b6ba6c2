//! Panel-side bridge client
//!
//! Every invocation opens a fresh WebSocket to the daemon, identifies itself
//! as a panel, performs its exchange, and disconnects. Broadcast frames meant
//! for long-lived panels (pick cancellations) are skipped while waiting for a
//! reply.

use std::future::Future;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use designator::{
    ClientKind, ClipboardSink, Config, Frame, InspectedElement, SystemClipboard, TabId,
};

use crate::cli::{ConfigCommands, ScanArgs, TabArgs};
use crate::output;

const REPLY_TIMEOUT: Duration = Duration::from_secs(15);

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub fn run_scan(port: u16, args: ScanArgs) -> Result<()> {
    block_on(scan(port, args))
}

pub fn run_pick(port: u16, args: TabArgs) -> Result<()> {
    block_on(pick(port, args))
}

pub fn run_stop(port: u16, args: TabArgs) -> Result<()> {
    block_on(stop(port, args))
}

pub fn run_config(port: u16, cmd: ConfigCommands) -> Result<()> {
    block_on(config(port, cmd))
}

fn block_on<F, T>(fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let _guard = crate::init_logging(None)?;
    let rt = tokio::runtime::Runtime::new().context("failed to create Tokio runtime")?;
    rt.block_on(fut)
}

async fn scan(port: u16, args: ScanArgs) -> Result<()> {
    let mut client = PanelClient::connect(port).await?;
    let (elements, attribute_name) = client.scan(args.tab).await?;
    client.close().await;

    let rows = output::filter_rows(&elements, args.filter.as_deref());

    if args.json {
        println!("{}", output::render_json(&attribute_name, &rows)?);
    } else {
        print!("{}", output::render_table(elements.len(), &rows));
    }

    if args.copy {
        if rows.is_empty() {
            bail!("No elements selected");
        }
        let spec = args.select.as_deref().unwrap_or("all");
        let picked = output::parse_selection(spec, rows.len())?;
        let payload = output::clipboard_payload(&rows, &picked, &attribute_name);
        SystemClipboard.set_text(&payload).await?;
        let feedback = format!("Copied {} element(s)", picked.len());
        // Keep stdout parseable in JSON mode.
        if args.json {
            eprintln!("{feedback}");
        } else {
            println!("{feedback}");
        }
    }

    Ok(())
}

async fn pick(port: u16, args: TabArgs) -> Result<()> {
    let mut client = PanelClient::connect(port).await?;
    client.expect_ok(&Frame::StartPick { tab: args.tab }).await?;
    client.close().await;
    println!("Pick mode started. Click a highlighted element in the browser to copy it; Escape cancels.");
    Ok(())
}

async fn stop(port: u16, args: TabArgs) -> Result<()> {
    let mut client = PanelClient::connect(port).await?;
    client.expect_ok(&Frame::StopPick { tab: args.tab }).await?;
    client.close().await;
    println!("Pick mode stopped.");
    Ok(())
}

async fn config(port: u16, cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            let mut client = PanelClient::connect(port).await?;
            let config = client.get_config().await?;
            client.close().await;
            print!("{}", output::render_config(&config));
        }
        ConfigCommands::SetAttribute { name } => {
            // Rejected locally before the daemon sees it.
            let name = name.trim().to_string();
            if name.is_empty() {
                bail!("Attribute name cannot be empty");
            }
            let mut client = PanelClient::connect(port).await?;
            let mut config = client.get_config().await?;
            config.attribute_name = name;
            let saved = client.set_config(config).await?;
            client.close().await;
            println!("Settings saved");
            println!("Now tracking: {}", saved.attribute_name);
        }
        ConfigCommands::AddType { tag } => {
            let tag = tag.trim().to_lowercase();
            if tag.is_empty() {
                bail!("Element type cannot be empty");
            }
            let mut client = PanelClient::connect(port).await?;
            let mut config = client.get_config().await?;
            if config.allowed_tags.contains(&tag) {
                client.close().await;
                bail!("\"{tag}\" already added");
            }
            config.allowed_tags.push(tag.clone());
            client.set_config(config).await?;
            client.close().await;
            println!("Added: {tag}");
        }
        ConfigCommands::RemoveType { tag } => {
            let tag = tag.trim().to_lowercase();
            let mut client = PanelClient::connect(port).await?;
            let mut config = client.get_config().await?;
            if !config.allowed_tags.iter().any(|t| t == &tag) {
                client.close().await;
                println!("\"{tag}\" was not in the list");
                return Ok(());
            }
            config.allowed_tags.retain(|t| t != &tag);
            client.set_config(config).await?;
            client.close().await;
            println!("Removed: {tag}");
        }
    }
    Ok(())
}

struct PanelClient {
    ws: WsStream,
}

impl PanelClient {
    async fn connect(port: u16) -> Result<Self> {
        let (ws, _) = connect_async(format!("ws://127.0.0.1:{port}"))
            .await
            .with_context(|| {
                format!("no daemon answering on port {port} (start one with `designator serve`)")
            })?;
        let mut client = Self { ws };
        client
            .send(&Frame::Hello {
                client: ClientKind::Panel,
                browser: None,
            })
            .await?;
        Ok(client)
    }

    async fn send(&mut self, frame: &Frame) -> Result<()> {
        let payload = serde_json::to_string(frame)?;
        self.ws
            .send(Message::Text(payload))
            .await
            .context("daemon connection dropped")?;
        Ok(())
    }

    /// One request, one reply. Daemon-side failures arrive as `error` frames
    /// and surface as plain errors here.
    async fn request(&mut self, frame: &Frame) -> Result<Frame> {
        self.send(frame).await?;
        loop {
            let msg = tokio::time::timeout(REPLY_TIMEOUT, self.ws.next())
                .await
                .context("timed out waiting for the daemon")?
                .context("daemon closed the connection")?
                .context("receive failed")?;
            if !msg.is_text() {
                continue;
            }
            let reply: Frame = serde_json::from_str(msg.to_text()?)?;
            match reply {
                Frame::PickCancelled { tab } => {
                    debug!(tab, "skipping pick-cancelled broadcast");
                    continue;
                }
                Frame::Error { message } => bail!(message),
                reply => return Ok(reply),
            }
        }
    }

    async fn expect_ok(&mut self, frame: &Frame) -> Result<()> {
        match self.request(frame).await? {
            Frame::Ok => Ok(()),
            other => bail!("unexpected reply: {other:?}"),
        }
    }

    async fn scan(&mut self, tab: Option<TabId>) -> Result<(Vec<InspectedElement>, String)> {
        match self.request(&Frame::Scan { tab }).await? {
            Frame::ScanResult {
                elements,
                attribute_name,
            } => Ok((elements, attribute_name)),
            other => bail!("unexpected reply to scan: {other:?}"),
        }
    }

    async fn get_config(&mut self) -> Result<Config> {
        match self.request(&Frame::GetConfig).await? {
            Frame::Config { config } => Ok(config),
            other => bail!("unexpected reply to getConfig: {other:?}"),
        }
    }

    async fn set_config(&mut self, config: Config) -> Result<Config> {
        match self.request(&Frame::SetConfig { config }).await? {
            Frame::Config { config } => Ok(config),
            other => bail!("unexpected reply to setConfig: {other:?}"),
        }
    }

    async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}
