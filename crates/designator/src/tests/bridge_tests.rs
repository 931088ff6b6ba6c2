//! Socket round trips against a live bridge on an ephemeral port

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::bridge::Bridge;
use crate::clipboard::ClipboardSink;
use crate::config::ConfigStore;
use crate::controller::Controller;
use crate::dom::{Bounds, DomNode, DomSnapshot, Viewport};
use crate::errors::Result;
use crate::protocol::{ClientKind, Frame};

type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

struct NullClipboard;

#[async_trait]
impl ClipboardSink for NullClipboard {
    async fn set_text(&self, _text: &str) -> Result<()> {
        Ok(())
    }
}

async fn send_frame(ws: &mut WsClient, frame: &Frame) {
    let payload = serde_json::to_string(frame).expect("serialize frame");
    ws.send(Message::Text(payload)).await.expect("send frame");
}

async fn recv_frame(ws: &mut WsClient) -> Frame {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream closed")
            .expect("receive failed");
        if msg.is_text() {
            let txt = msg.into_text().expect("text payload");
            return serde_json::from_str(&txt).expect("frame json");
        }
    }
}

async fn start_daemon() -> (u16, CancellationToken, tempfile::TempDir) {
    let bridge = Bridge::bind(0).await.expect("bind ephemeral port");
    let port = bridge.local_addr().expect("local addr").port();
    let dir = tempfile::tempdir().expect("tempdir");
    let config = Arc::new(ConfigStore::open(dir.path().join("config.json")));
    let controller = Arc::new(Controller::new(config, bridge.host(), Arc::new(NullClipboard)));
    let shutdown = CancellationToken::new();
    tokio::spawn(bridge.run(controller, shutdown.clone()));
    (port, shutdown, dir)
}

async fn connect(port: u16, kind: ClientKind) -> WsClient {
    let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{port}"))
        .await
        .expect("connect");
    send_frame(
        &mut ws,
        &Frame::Hello {
            client: kind,
            browser: match kind {
                ClientKind::Browser => Some("chrome".to_string()),
                ClientKind::Panel => None,
            },
        },
    )
    .await;
    ws
}

fn tiny_page() -> DomSnapshot {
    DomSnapshot {
        nodes: vec![
            DomNode {
                parent: None,
                tag: "html".to_string(),
                attr: None,
                input_type: None,
                text: String::new(),
                bounds: Bounds::new(0.0, 0.0, 800.0, 600.0),
            },
            DomNode {
                parent: Some(0),
                tag: "button".to_string(),
                attr: Some("save-btn".to_string()),
                input_type: None,
                text: "Save".to_string(),
                bounds: Bounds::new(10.0, 10.0, 100.0, 30.0),
            },
        ],
        viewport: Viewport {
            width: 800.0,
            height: 600.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
        },
        right_clicked: None,
    }
}

#[tokio::test]
async fn test_browser_hello_triggers_menu_registration() {
    let (port, shutdown, _dir) = start_daemon().await;
    let mut ext = connect(port, ClientKind::Browser).await;

    let frame = recv_frame(&mut ext).await;
    assert_eq!(
        frame,
        Frame::RegisterMenu {
            id: "copy-data-id".to_string(),
            title: "Copy as TypeScript property".to_string(),
        }
    );

    shutdown.cancel();
}

#[tokio::test]
async fn test_panel_config_round_trip() {
    let (port, shutdown, _dir) = start_daemon().await;
    let mut panel = connect(port, ClientKind::Panel).await;

    send_frame(&mut panel, &Frame::GetConfig).await;
    match recv_frame(&mut panel).await {
        Frame::Config { config } => {
            assert_eq!(config.attribute_name, "data-element-id");
        }
        other => panic!("expected config frame, got {other:?}"),
    }

    shutdown.cancel();
}

#[tokio::test]
async fn test_panel_scan_fails_cleanly_without_browser() {
    let (port, shutdown, _dir) = start_daemon().await;
    let mut panel = connect(port, ClientKind::Panel).await;

    send_frame(&mut panel, &Frame::Scan { tab: Some(1) }).await;
    match recv_frame(&mut panel).await {
        Frame::Error { message } => assert!(message.contains("extension")),
        other => panic!("expected error frame, got {other:?}"),
    }

    shutdown.cancel();
}

#[tokio::test]
async fn test_scan_round_trip_through_extension() {
    let (port, shutdown, _dir) = start_daemon().await;
    let mut ext = connect(port, ClientKind::Browser).await;
    // Swallow the menu registration.
    let _ = recv_frame(&mut ext).await;

    let mut panel = connect(port, ClientKind::Panel).await;
    send_frame(&mut panel, &Frame::Scan { tab: Some(9) }).await;

    // Play the extension side: probe misses, injection succeeds, the second
    // probe hits, then the snapshot is served.
    let mut injected = false;
    loop {
        match recv_frame(&mut ext).await {
            Frame::Ping { tab } => {
                send_frame(&mut ext, &Frame::PingResult { tab, ok: injected }).await;
            }
            Frame::InjectAgent { tab, script, css } => {
                assert!(script.contains("__designatorShim"));
                assert!(css.contains("dsg-highlight"));
                injected = true;
                send_frame(
                    &mut ext,
                    &Frame::InjectResult {
                        tab,
                        ok: true,
                        error: None,
                    },
                )
                .await;
            }
            Frame::SnapshotRequest { tab, attr } => {
                assert_eq!(tab, 9);
                assert_eq!(attr, "data-element-id");
                send_frame(
                    &mut ext,
                    &Frame::Snapshot {
                        tab,
                        dom: tiny_page(),
                    },
                )
                .await;
                break;
            }
            other => panic!("unexpected daemon frame: {other:?}"),
        }
    }

    match recv_frame(&mut panel).await {
        Frame::ScanResult {
            elements,
            attribute_name,
        } => {
            assert_eq!(attribute_name, "data-element-id");
            assert_eq!(elements.len(), 1);
            assert_eq!(elements[0].identifier, "save-btn");
            assert_eq!(elements[0].tag, "button");
        }
        other => panic!("expected scan result, got {other:?}"),
    }

    shutdown.cancel();
}
