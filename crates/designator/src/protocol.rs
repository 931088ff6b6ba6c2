//! Wire protocol between the daemon, the browser extension, and panels
//!
//! Every frame is a JSON object tagged by `type`, fields in camelCase. The
//! extension relays shim-originated frames (snapshots, input events) and
//! daemon-originated page commands between the daemon socket and the page.
//! Request/response pairing is by `(tab, request kind)`: only one request of a
//! kind is in flight per tab at a time.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::dom::{DomSnapshot, NodeId};
use crate::inspect::InspectedElement;

/// Browser tab identifier, as assigned by the browser.
pub type TabId = i32;

/// What a connecting client claims to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    /// The browser extension. At most one is active at a time.
    Browser,
    /// A transient control surface (the CLI).
    Panel,
}

/// All frames that cross the WebSocket, both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    /// First frame on every connection.
    #[serde(rename = "hello")]
    Hello {
        client: ClientKind,
        /// Browser name for browser clients (e.g. "chrome", "firefox").
        #[serde(default, skip_serializing_if = "Option::is_none")]
        browser: Option<String>,
    },

    // daemon -> extension
    #[serde(rename = "ping")]
    Ping { tab: TabId },
    #[serde(rename = "injectAgent")]
    InjectAgent {
        tab: TabId,
        script: String,
        css: String,
    },
    #[serde(rename = "registerMenu")]
    RegisterMenu { id: String, title: String },
    #[serde(rename = "getActiveTab")]
    GetActiveTab,
    #[serde(rename = "snapshotRequest")]
    SnapshotRequest { tab: TabId, attr: String },
    #[serde(rename = "page")]
    Page {
        tab: TabId,
        commands: Vec<PageCommand>,
    },

    // extension -> daemon
    #[serde(rename = "pingResult")]
    PingResult { tab: TabId, ok: bool },
    #[serde(rename = "injectResult")]
    InjectResult {
        tab: TabId,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename = "activeTab")]
    ActiveTab { tab: TabId },
    #[serde(rename = "snapshot")]
    Snapshot { tab: TabId, dom: DomSnapshot },
    #[serde(rename = "menuClicked")]
    MenuClicked { tab: TabId },
    #[serde(rename = "input")]
    Input { tab: TabId, event: InputEvent },

    // panel -> daemon
    #[serde(rename = "scan")]
    Scan {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tab: Option<TabId>,
    },
    #[serde(rename = "startPick")]
    StartPick {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tab: Option<TabId>,
    },
    #[serde(rename = "stopPick")]
    StopPick {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tab: Option<TabId>,
    },
    #[serde(rename = "getConfig")]
    GetConfig,
    #[serde(rename = "setConfig")]
    SetConfig {
        #[serde(flatten)]
        config: Config,
    },

    // daemon -> panel
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "scanResult")]
    ScanResult {
        elements: Vec<InspectedElement>,
        #[serde(rename = "attributeName")]
        attribute_name: String,
    },
    #[serde(rename = "config")]
    Config {
        #[serde(flatten)]
        config: Config,
    },
    #[serde(rename = "error")]
    Error { message: String },
    #[serde(rename = "pickCancelled")]
    PickCancelled { tab: TabId },
}

/// Synthetic input event forwarded by the shim while capture is enabled.
///
/// Coordinates are viewport-relative, matching element bounds in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum InputEvent {
    #[serde(rename = "pointerMove")]
    PointerMove { x: f64, y: f64 },
    #[serde(rename = "click")]
    Click { x: f64, y: f64 },
    #[serde(rename = "keyDown")]
    KeyDown { key: String },
}

/// Decoration classes the shim maps to its `dsg-*` stylesheet rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecorationClass {
    /// Steady outline on every matching element while pick mode is active.
    Highlight,
    /// Stronger outline on the element currently under the pointer.
    Hover,
    /// Brief confirmation outline after a copy.
    Copied,
}

/// Tooltip visibility and placement, computed daemon-side in page coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tip")]
pub enum TooltipCmd {
    #[serde(rename = "hidden")]
    Hidden,
    #[serde(rename = "shown")]
    Shown {
        x: f64,
        y: f64,
        tag: String,
        identifier: String,
        duplicate: bool,
    },
}

/// One instruction for the page shim to apply to the live document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum PageCommand {
    /// Enable or disable capture-phase forwarding of pointer/key events.
    #[serde(rename = "captureInput")]
    CaptureInput { enabled: bool },
    /// Install or remove the full-page overlay backdrop.
    #[serde(rename = "overlay")]
    Overlay { present: bool },
    #[serde(rename = "tooltip")]
    Tooltip {
        #[serde(flatten)]
        tip: TooltipCmd,
    },
    #[serde(rename = "addClass")]
    AddClass {
        node: NodeId,
        #[serde(rename = "class")]
        class_name: DecorationClass,
    },
    #[serde(rename = "removeClass")]
    RemoveClass {
        node: NodeId,
        #[serde(rename = "class")]
        class_name: DecorationClass,
    },
    /// Remove a decoration class from every element carrying it.
    #[serde(rename = "clearClass")]
    ClearClass {
        #[serde(rename = "class")]
        class_name: DecorationClass,
    },
    /// Briefly show the copied decoration on a node (shim handles the timer).
    #[serde(rename = "flash")]
    Flash { node: NodeId },
    /// Transient toast in the page corner.
    #[serde(rename = "notify")]
    Notify {
        message: String,
        #[serde(rename = "isError")]
        is_error: bool,
    },
}

/// Requests the controller dispatches to a page agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgentRequest {
    #[serde(rename = "getRightClickedElement")]
    GetRightClickedElement,
    #[serde(rename = "copyToClipboard")]
    CopyToClipboard { text: String },
    #[serde(rename = "showNotification")]
    ShowNotification {
        message: String,
        #[serde(rename = "isError")]
        is_error: bool,
    },
    #[serde(rename = "startPick")]
    StartPick { attr: String },
    #[serde(rename = "stopPick")]
    StopPick,
    #[serde(rename = "scan")]
    Scan {
        #[serde(rename = "allowedTags")]
        allowed_tags: Vec<String>,
    },
}

/// Agent replies to [`AgentRequest`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgentResponse {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "rightClickedElement")]
    RightClicked {
        #[serde(flatten)]
        element: RightClickedReply,
    },
    #[serde(rename = "elements")]
    Elements { elements: Vec<InspectedElement> },
}

/// Resolution of the most recent right click. `identifier` serializes as an
/// explicit `null` when nothing tracked was found, so callers can always read
/// the field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RightClickedReply {
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(
        rename = "isDuplicate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub is_duplicate: Option<bool>,
}

impl RightClickedReply {
    pub fn found(identifier: String, tag: String, is_duplicate: bool) -> Self {
        Self {
            identifier: Some(identifier),
            tag: Some(tag),
            is_duplicate: Some(is_duplicate),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn frames_carry_type_tags() {
        let frame = Frame::SnapshotRequest {
            tab: 7,
            attr: "data-qa".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({ "type": "snapshotRequest", "tab": 7, "attr": "data-qa" })
        );

        let frame = Frame::MenuClicked { tab: 3 };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({ "type": "menuClicked", "tab": 3 })
        );
    }

    #[test]
    fn hello_round_trips() {
        let raw = r#"{"type":"hello","client":"browser","browser":"chrome"}"#;
        let frame: Frame = serde_json::from_str(raw).unwrap();
        assert_eq!(
            frame,
            Frame::Hello {
                client: ClientKind::Browser,
                browser: Some("chrome".to_string()),
            }
        );
        let back: Frame = serde_json::from_str(&serde_json::to_string(&frame).unwrap()).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn set_config_flattens_fields() {
        let frame = Frame::SetConfig {
            config: Config::new("data-qa", vec!["input".into(), "button".into()]),
        };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({
                "type": "setConfig",
                "attributeName": "data-qa",
                "allowedTags": ["input", "button"],
            })
        );
    }

    #[test]
    fn input_events_use_kind_tags() {
        let ev: InputEvent =
            serde_json::from_str(r#"{"kind":"pointerMove","x":10.5,"y":20.0}"#).unwrap();
        assert_eq!(ev, InputEvent::PointerMove { x: 10.5, y: 20.0 });

        let ev: InputEvent = serde_json::from_str(r#"{"kind":"keyDown","key":"Escape"}"#).unwrap();
        assert_eq!(
            ev,
            InputEvent::KeyDown {
                key: "Escape".to_string()
            }
        );
    }

    #[test]
    fn page_commands_serialize_for_the_shim() {
        let cmd = PageCommand::AddClass {
            node: 12,
            class_name: DecorationClass::Hover,
        };
        assert_eq!(
            serde_json::to_value(&cmd).unwrap(),
            json!({ "kind": "addClass", "node": 12, "class": "hover" })
        );

        let cmd = PageCommand::Tooltip {
            tip: TooltipCmd::Shown {
                x: 104.0,
                y: 66.0,
                tag: "button".to_string(),
                identifier: "save-item".to_string(),
                duplicate: false,
            },
        };
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value["kind"], "tooltip");
        assert_eq!(value["tip"], "shown");
        assert_eq!(value["identifier"], "save-item");

        let cmd = PageCommand::Tooltip {
            tip: TooltipCmd::Hidden,
        };
        assert_eq!(
            serde_json::to_value(&cmd).unwrap(),
            json!({ "kind": "tooltip", "tip": "hidden" })
        );
    }

    #[test]
    fn right_clicked_miss_serializes_null_identifier() {
        let resp = AgentResponse::RightClicked {
            element: RightClickedReply::none(),
        };
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({ "type": "rightClickedElement", "identifier": null })
        );

        let resp = AgentResponse::RightClicked {
            element: RightClickedReply::found("user-name".into(), "input".into(), true),
        };
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({
                "type": "rightClickedElement",
                "identifier": "user-name",
                "tag": "input",
                "isDuplicate": true,
            })
        );
    }

    #[test]
    fn inspected_elements_use_camel_case_keys() {
        let el = InspectedElement {
            identifier: "user-name".to_string(),
            tag: "input".to_string(),
            preview_text: String::new(),
            input_type: Some("text".to_string()),
            is_duplicate: true,
        };
        let value = serde_json::to_value(&el).unwrap();
        assert_eq!(value["isDuplicate"], true);
        assert_eq!(value["inputType"], "text");
        assert_eq!(value["previewText"], "");
    }
}
