//! Per-tab page agent
//!
//! One agent owns the daemon-side state for a single tab: the latest DOM
//! snapshot and the pick-mode engine. Requests and input events go in,
//! decoration commands and effects come out. The agent never touches the
//! browser or the clipboard, which keeps it runnable in tests without either.

use tracing::{debug, warn};

use crate::dom::DomSnapshot;
use crate::inspect;
use crate::pick::{PickEngine, PickOutcome};
use crate::protocol::{
    AgentRequest, AgentResponse, InputEvent, PageCommand, RightClickedReply, TabId,
};

/// Side effect the controller must carry out after a request.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEffect {
    /// Write text to the system clipboard.
    Clipboard { text: String },
}

/// What a request produced: the reply for the caller, decoration commands
/// for the page, and any side effect.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutput {
    pub response: AgentResponse,
    pub commands: Vec<PageCommand>,
    pub effect: Option<AgentEffect>,
}

impl AgentOutput {
    fn ok() -> Self {
        Self {
            response: AgentResponse::Ok,
            commands: Vec::new(),
            effect: None,
        }
    }

    fn with_commands(commands: Vec<PageCommand>) -> Self {
        Self {
            commands,
            ..Self::ok()
        }
    }
}

pub struct PageAgent {
    tab: TabId,
    snapshot: Option<DomSnapshot>,
    engine: PickEngine,
}

impl PageAgent {
    pub fn new(tab: TabId) -> Self {
        Self {
            tab,
            snapshot: None,
            engine: PickEngine::new(),
        }
    }

    pub fn tab(&self) -> TabId {
        self.tab
    }

    pub fn is_picking(&self) -> bool {
        self.engine.is_active()
    }

    /// Replaces the working snapshot. Oversized captures are truncated to the
    /// node cap before anything hit-tests against them.
    ///
    /// An active pick session is cancelled first: its hover state, highlight
    /// node ids, and recorded attribute name all describe the outgoing
    /// snapshot, so letting it run on would commit a line mixing two captures.
    /// The returned commands tear the session's artifacts down; empty when no
    /// session was running.
    pub fn set_snapshot(&mut self, mut dom: DomSnapshot) -> Vec<PageCommand> {
        let teardown = self.engine.stop();
        if !teardown.is_empty() {
            debug!(tab = self.tab, "snapshot replaced mid-pick, session cancelled");
        }
        dom.enforce_cap();
        self.snapshot = Some(dom);
        teardown
    }

    pub fn snapshot(&self) -> Option<&DomSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn handle(&mut self, request: AgentRequest) -> AgentOutput {
        match request {
            AgentRequest::GetRightClickedElement => self.right_clicked(),
            AgentRequest::CopyToClipboard { text } => AgentOutput {
                effect: Some(AgentEffect::Clipboard { text }),
                ..AgentOutput::ok()
            },
            AgentRequest::ShowNotification { message, is_error } => {
                AgentOutput::with_commands(vec![PageCommand::Notify { message, is_error }])
            }
            AgentRequest::StartPick { attr } => {
                let Some(dom) = self.snapshot.as_ref() else {
                    warn!(tab = self.tab, "start pick requested before any snapshot");
                    return AgentOutput::ok();
                };
                AgentOutput::with_commands(self.engine.start(&attr, dom))
            }
            AgentRequest::StopPick => AgentOutput::with_commands(self.engine.stop()),
            AgentRequest::Scan { allowed_tags } => {
                let Some(dom) = self.snapshot.as_ref() else {
                    warn!(tab = self.tab, "scan requested before any snapshot");
                    return AgentOutput {
                        response: AgentResponse::Elements {
                            elements: Vec::new(),
                        },
                        ..AgentOutput::ok()
                    };
                };
                AgentOutput {
                    response: AgentResponse::Elements {
                        elements: inspect::scan(dom, &allowed_tags),
                    },
                    ..AgentOutput::ok()
                }
            }
        }
    }

    /// Feeds one synthetic input event into the pick engine. Outside an
    /// active session this is a no-op.
    pub fn on_input(&mut self, event: InputEvent) -> (Vec<PageCommand>, Option<PickOutcome>) {
        let Some(dom) = self.snapshot.as_ref() else {
            debug!(tab = self.tab, "input event without a snapshot");
            return (Vec::new(), None);
        };
        self.engine.handle_input(dom, event)
    }

    fn right_clicked(&self) -> AgentOutput {
        let found = self.snapshot.as_ref().and_then(|dom| {
            let start = dom.right_clicked?;
            let owner = inspect::resolve_owner(dom, start)?;
            let node = dom.node(owner)?;
            let identifier = node.attr.clone()?;
            let is_duplicate = inspect::count_matches(dom, &identifier) > 1;
            Some((
                owner,
                RightClickedReply::found(identifier, node.tag.clone(), is_duplicate),
            ))
        });
        match found {
            Some((owner, element)) => AgentOutput {
                response: AgentResponse::RightClicked { element },
                // The resolved element gets the copied flash even before the
                // clipboard write lands.
                commands: vec![PageCommand::Flash { node: owner }],
                effect: None,
            },
            None => AgentOutput {
                response: AgentResponse::RightClicked {
                    element: RightClickedReply::none(),
                },
                ..AgentOutput::ok()
            },
        }
    }
}
