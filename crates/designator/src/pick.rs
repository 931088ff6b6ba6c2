//! Pick-mode interaction engine
//!
//! A pure state machine: it consumes synthetic input events plus the agent's
//! current snapshot and emits page commands for the shim, never touching I/O
//! or timers itself. The shim owns capture-phase interception; the engine owns
//! every decision about what the interception means.

use tracing::debug;

use crate::codegen;
use crate::dom::{Bounds, DomSnapshot, NodeId, Viewport};
use crate::inspect;
use crate::protocol::{DecorationClass, InputEvent, PageCommand, TooltipCmd};

// Rough glyph metrics for the shim's 12px single-row tooltip
// ("<tag> identifier DUP Click to copy"), in the spirit of estimating a label
// box instead of measuring rendered text.
const TIP_CHAR_W: f64 = 7.0;
const TIP_PAD_W: f64 = 20.0;
const TIP_H: f64 = 28.0;
const TIP_GAP: f64 = 8.0;
const TIP_MARGIN: f64 = 4.0;
const TIP_DUP_BADGE: &str = "DUP";
const TIP_HINT: &str = "Click to copy";

/// Live state while pick mode is active.
#[derive(Debug, Clone, PartialEq)]
pub struct PickSession {
    /// Attribute name recorded at start; config changes mid-session do not
    /// retarget the session.
    pub attr_name: String,
    /// Owner currently carrying the hover decoration.
    pub hovered: Option<NodeId>,
    /// Whether the tooltip is currently shown.
    pub tooltip_present: bool,
}

/// How a pick session ended, when the caller needs to act on it.
#[derive(Debug, Clone, PartialEq)]
pub enum PickOutcome {
    /// The user clicked an owned element; `line` is ready for the clipboard.
    Committed {
        node: NodeId,
        identifier: String,
        line: String,
    },
    /// The user pressed Escape; the initiator gets notified.
    Cancelled,
}

/// `Inactive` ⇄ `Active` state machine driving one page's pick mode.
#[derive(Debug, Default)]
pub struct PickEngine {
    session: Option<PickSession>,
}

impl PickEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&PickSession> {
        self.session.as_ref()
    }

    /// Enter pick mode. No-op while already active, so a double start leaves
    /// exactly one overlay and one tooltip.
    ///
    /// Emits, in order: overlay install, hidden tooltip creation, a highlight
    /// for every element with a non-empty identifier, and finally the
    /// capture-input enable — input events only start flowing once all visuals
    /// are in place.
    pub fn start(&mut self, attr_name: &str, snapshot: &DomSnapshot) -> Vec<PageCommand> {
        if self.session.is_some() {
            debug!("pick session already active, ignoring start");
            return Vec::new();
        }
        self.session = Some(PickSession {
            attr_name: attr_name.to_string(),
            hovered: None,
            tooltip_present: false,
        });

        let mut commands = vec![
            PageCommand::Overlay { present: true },
            PageCommand::Tooltip {
                tip: TooltipCmd::Hidden,
            },
        ];
        for (id, node) in snapshot.nodes.iter().enumerate() {
            if node.attr.as_deref().map_or(false, |v| !v.is_empty()) {
                commands.push(PageCommand::AddClass {
                    node: id,
                    class_name: DecorationClass::Highlight,
                });
            }
        }
        commands.push(PageCommand::CaptureInput { enabled: true });
        commands
    }

    /// Leave pick mode, tearing down every visual artifact. Idempotent: a
    /// second stop emits nothing.
    pub fn stop(&mut self) -> Vec<PageCommand> {
        match self.session.take() {
            Some(_) => teardown_commands(),
            None => Vec::new(),
        }
    }

    /// Feed one synthetic input event. Returns the page commands to apply and
    /// an outcome when the session ended in a way the caller must act on.
    pub fn handle_input(
        &mut self,
        snapshot: &DomSnapshot,
        event: InputEvent,
    ) -> (Vec<PageCommand>, Option<PickOutcome>) {
        if self.session.is_none() {
            // Capture is disabled when inactive; anything arriving anyway is
            // a straggler from teardown and gets dropped.
            return (Vec::new(), None);
        }
        match event {
            InputEvent::PointerMove { x, y } => (self.pointer_move(snapshot, x, y), None),
            InputEvent::Click { x, y } => self.click(snapshot, x, y),
            InputEvent::KeyDown { key } => self.key_down(&key),
        }
    }

    fn pointer_move(&mut self, snapshot: &DomSnapshot, x: f64, y: f64) -> Vec<PageCommand> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        let owner = owner_at(snapshot, x, y);
        if owner == session.hovered {
            // Same owner, nothing to redraw: the tooltip is element-anchored.
            return Vec::new();
        }

        let mut commands = Vec::new();
        if let Some(prev) = session.hovered.take() {
            commands.push(PageCommand::RemoveClass {
                node: prev,
                class_name: DecorationClass::Hover,
            });
        }
        match owner {
            Some(node) => {
                commands.push(PageCommand::AddClass {
                    node,
                    class_name: DecorationClass::Hover,
                });
                if let Some(tip) = tooltip_for(snapshot, node) {
                    commands.push(PageCommand::Tooltip { tip });
                    session.tooltip_present = true;
                }
                session.hovered = Some(node);
            }
            None => {
                if session.tooltip_present {
                    commands.push(PageCommand::Tooltip {
                        tip: TooltipCmd::Hidden,
                    });
                    session.tooltip_present = false;
                }
            }
        }
        commands
    }

    fn click(
        &mut self,
        snapshot: &DomSnapshot,
        x: f64,
        y: f64,
    ) -> (Vec<PageCommand>, Option<PickOutcome>) {
        let Some(session) = self.session.take() else {
            return (Vec::new(), None);
        };

        let mut commands = Vec::new();
        let mut outcome = None;
        if let Some(node) = owner_at(snapshot, x, y) {
            // resolve_owner only returns nodes with a non-empty identifier.
            if let Some(identifier) = snapshot.node(node).and_then(|n| n.attr.clone()) {
                let tag = snapshot.node(node).map(|n| n.tag.clone()).unwrap_or_default();
                let duplicate = inspect::count_matches(snapshot, &identifier) > 1;
                let line = codegen::property_line(&identifier, &tag, duplicate, &session.attr_name);
                commands.push(PageCommand::Flash { node });
                outcome = Some(PickOutcome::Committed {
                    node,
                    identifier,
                    line,
                });
            }
        }
        // A click ends the session whether or not it landed on an owner.
        commands.extend(teardown_commands());
        (commands, outcome)
    }

    fn key_down(&mut self, key: &str) -> (Vec<PageCommand>, Option<PickOutcome>) {
        if key != "Escape" {
            return (Vec::new(), None);
        }
        match self.session.take() {
            Some(_) => (teardown_commands(), Some(PickOutcome::Cancelled)),
            None => (Vec::new(), None),
        }
    }
}

/// Shared teardown for every path out of `Active`. The copied flash is
/// shim-timed and not cleared here: a commit's flash outlives its teardown.
fn teardown_commands() -> Vec<PageCommand> {
    vec![
        PageCommand::Overlay { present: false },
        PageCommand::Tooltip {
            tip: TooltipCmd::Hidden,
        },
        PageCommand::ClearClass {
            class_name: DecorationClass::Highlight,
        },
        PageCommand::ClearClass {
            class_name: DecorationClass::Hover,
        },
        PageCommand::CaptureInput { enabled: false },
    ]
}

fn owner_at(snapshot: &DomSnapshot, x: f64, y: f64) -> Option<NodeId> {
    let hit = snapshot.hit_test(x, y)?;
    inspect::resolve_owner(snapshot, hit)
}

fn tooltip_for(snapshot: &DomSnapshot, node: NodeId) -> Option<TooltipCmd> {
    let n = snapshot.node(node)?;
    let identifier = n.attr.clone()?;
    let duplicate = inspect::count_matches(snapshot, &identifier) > 1;
    let size = tooltip_size(&n.tag, &identifier, duplicate);
    let (x, y) = place_tooltip(&n.bounds, &snapshot.viewport, size);
    Some(TooltipCmd::Shown {
        x,
        y,
        tag: n.tag.clone(),
        identifier,
        duplicate,
    })
}

/// Estimated rendered size of the tooltip row for placement purposes.
pub(crate) fn tooltip_size(tag: &str, identifier: &str, duplicate: bool) -> (f64, f64) {
    let mut text = format!("<{tag}> {identifier} {TIP_HINT}");
    if duplicate {
        text.push(' ');
        text.push_str(TIP_DUP_BADGE);
    }
    let width = text.chars().count() as f64 * TIP_CHAR_W + TIP_PAD_W;
    (width, TIP_H)
}

/// Place a tooltip of the given size above an element, in page coordinates.
///
/// Flips below the element when the preferred spot would clip the top of the
/// visible viewport, and clamps horizontally so the tooltip stays fully inside
/// it, with a 4px margin on every side.
pub(crate) fn place_tooltip(
    bounds: &Bounds,
    viewport: &Viewport,
    (tip_w, tip_h): (f64, f64),
) -> (f64, f64) {
    let mut top = bounds.y + viewport.scroll_y - tip_h - TIP_GAP;
    if top < viewport.scroll_y + TIP_MARGIN {
        top = bounds.y + bounds.height + viewport.scroll_y + TIP_GAP;
    }
    let left = bounds.x + viewport.scroll_x + (bounds.width - tip_w) / 2.0;
    let min_left = viewport.scroll_x + TIP_MARGIN;
    let max_left = viewport.scroll_x + viewport.width - tip_w - TIP_MARGIN;
    (left.min(max_left).max(min_left), top)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        Viewport {
            width: 1280.0,
            height: 800.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }

    #[test]
    fn tooltip_sits_above_with_gap() {
        let bounds = Bounds::new(200.0, 300.0, 120.0, 40.0);
        let (x, y) = place_tooltip(&bounds, &viewport(), (100.0, 28.0));
        assert_eq!(y, 300.0 - 28.0 - 8.0);
        assert_eq!(x, 200.0 + (120.0 - 100.0) / 2.0);
    }

    #[test]
    fn tooltip_flips_below_near_viewport_top() {
        let bounds = Bounds::new(200.0, 10.0, 120.0, 40.0);
        let (_, y) = place_tooltip(&bounds, &viewport(), (100.0, 28.0));
        assert_eq!(y, 10.0 + 40.0 + 8.0);
    }

    #[test]
    fn tooltip_flip_accounts_for_scroll() {
        // Element 10px below the fold of a page scrolled down 500px: the spot
        // above it is fine in page coordinates (510 - tip - gap > 4) only when
        // the scroll offset is taken into account.
        let vp = Viewport {
            scroll_y: 500.0,
            ..viewport()
        };
        let bounds = Bounds::new(200.0, 10.0, 120.0, 40.0);
        let (_, y) = place_tooltip(&bounds, &vp, (100.0, 28.0));
        // Preferred top = 10 + 500 - 28 - 8 = 474 < 500 + 4, so it flips.
        assert_eq!(y, 10.0 + 40.0 + 500.0 + 8.0);
    }

    #[test]
    fn tooltip_clamps_to_viewport_sides() {
        let vp = viewport();
        let left_edge = Bounds::new(0.0, 300.0, 20.0, 20.0);
        let (x, _) = place_tooltip(&left_edge, &vp, (200.0, 28.0));
        assert_eq!(x, 4.0);

        let right_edge = Bounds::new(1260.0, 300.0, 20.0, 20.0);
        let (x, _) = place_tooltip(&right_edge, &vp, (200.0, 28.0));
        assert_eq!(x, 1280.0 - 200.0 - 4.0);
    }

    #[test]
    fn tooltip_clamp_follows_horizontal_scroll() {
        let vp = Viewport {
            scroll_x: 100.0,
            ..viewport()
        };
        let bounds = Bounds::new(0.0, 300.0, 20.0, 20.0);
        let (x, _) = place_tooltip(&bounds, &vp, (200.0, 28.0));
        assert_eq!(x, 100.0 + 4.0);
    }

    #[test]
    fn duplicate_badge_widens_estimate() {
        let (w1, _) = tooltip_size("input", "user-name", false);
        let (w2, _) = tooltip_size("input", "user-name", true);
        assert!(w2 > w1);
    }
}
