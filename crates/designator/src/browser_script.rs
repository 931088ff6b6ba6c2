//! Embedded page shim and decoration stylesheet
//!
//! The extension injects these into a tab when the daemon cannot reach a live
//! shim there. The shim is deliberately dumb: it captures DOM snapshots,
//! forwards input while capture is enabled, and applies decoration commands.
//! Every decision — hit testing, hover resolution, tooltip placement, what a
//! click means — stays in the daemon.

/// Injected once per page; guards itself against double-injection. Element
/// indices in commands refer to the most recent snapshot this shim captured.
pub const PAGE_SHIM_JS: &str = r#"
(function () {
  if (window.__designatorShim) { return; }
  window.__designatorShim = { version: 1 };

  var ATTR_ARTIFACT = 'data-dsg-artifact';
  var CLASSES = { highlight: 'dsg-highlight', hover: 'dsg-hover', copied: 'dsg-copied' };
  var MAX_NODES = 5000;
  var FLASH_MS = 800;
  var NOTIFY_MS = 2000;
  var NOTIFY_FADE_MS = 300;

  var lastElements = [];
  var lastRightClicked = null;
  var overlay = null;
  var tooltip = null;
  var capturing = false;
  var pendingMove = null;

  document.addEventListener('contextmenu', function (e) {
    lastRightClicked = e.target;
  }, true);

  function send(msg) {
    try { chrome.runtime.sendMessage(msg); } catch (err) { /* extension gone */ }
  }

  function captureSnapshot(attrName) {
    var nodes = [];
    var elements = [];
    var indexOf = new Map();
    var rightClicked = null;
    var walker = document.createTreeWalker(document.documentElement, NodeFilter.SHOW_ELEMENT, {
      acceptNode: function (node) {
        return node.hasAttribute(ATTR_ARTIFACT) ? NodeFilter.FILTER_REJECT : NodeFilter.FILTER_ACCEPT;
      }
    });
    var el = document.documentElement;
    while (el) {
      if (nodes.length >= MAX_NODES) { break; }
      var rect = el.getBoundingClientRect();
      var node = {
        tag: el.tagName.toLowerCase(),
        text: (el.textContent || '').trim().slice(0, 60),
        bounds: { x: rect.left, y: rect.top, width: rect.width, height: rect.height }
      };
      var parentIdx = el.parentElement ? indexOf.get(el.parentElement) : undefined;
      if (parentIdx !== undefined) { node.parent = parentIdx; }
      var value = el.getAttribute(attrName);
      if (value !== null) { node.attr = value; }
      var inputType = el.getAttribute('type');
      if (inputType) { node.inputType = inputType; }
      if (el === lastRightClicked) { rightClicked = nodes.length; }
      indexOf.set(el, nodes.length);
      elements.push(el);
      nodes.push(node);
      el = walker.nextNode();
    }
    lastElements = elements;
    var dom = {
      nodes: nodes,
      viewport: {
        width: window.innerWidth,
        height: window.innerHeight,
        scrollX: window.scrollX,
        scrollY: window.scrollY
      }
    };
    if (rightClicked !== null) { dom.rightClicked = rightClicked; }
    return dom;
  }

  function onMove(e) {
    if (!capturing) { return; }
    var first = pendingMove === null;
    pendingMove = { kind: 'pointerMove', x: e.clientX, y: e.clientY };
    if (first) {
      requestAnimationFrame(function () {
        if (pendingMove && capturing) { send({ type: 'input', event: pendingMove }); }
        pendingMove = null;
      });
    }
  }

  function onClick(e) {
    if (!capturing) { return; }
    e.preventDefault();
    e.stopPropagation();
    e.stopImmediatePropagation();
    send({ type: 'input', event: { kind: 'click', x: e.clientX, y: e.clientY } });
  }

  function onKeyDown(e) {
    if (!capturing) { return; }
    send({ type: 'input', event: { kind: 'keyDown', key: e.key } });
  }

  function setCapture(enabled) {
    if (enabled === capturing) { return; }
    capturing = enabled;
    if (enabled) {
      document.addEventListener('mousemove', onMove, true);
      document.addEventListener('click', onClick, true);
      document.addEventListener('keydown', onKeyDown, true);
    } else {
      document.removeEventListener('mousemove', onMove, true);
      document.removeEventListener('click', onClick, true);
      document.removeEventListener('keydown', onKeyDown, true);
      pendingMove = null;
    }
  }

  function elementAt(index) {
    var el = lastElements[index];
    return el && el.isConnected ? el : null;
  }

  function showOverlay() {
    if (overlay) { return; }
    overlay = document.createElement('div');
    overlay.className = 'dsg-overlay';
    overlay.setAttribute(ATTR_ARTIFACT, '');
    document.body.appendChild(overlay);
  }

  function hideOverlay() {
    if (overlay) { overlay.remove(); overlay = null; }
  }

  function showTooltip(cmd) {
    hideTooltip();
    tooltip = document.createElement('div');
    tooltip.className = 'dsg-tooltip';
    tooltip.setAttribute(ATTR_ARTIFACT, '');
    var tag = document.createElement('span');
    tag.className = 'dsg-tooltip-tag';
    tag.textContent = '<' + cmd.tag + '>';
    tooltip.appendChild(tag);
    var id = document.createElement('span');
    id.className = 'dsg-tooltip-id';
    id.textContent = cmd.identifier;
    tooltip.appendChild(id);
    if (cmd.duplicate) {
      var dup = document.createElement('span');
      dup.className = 'dsg-tooltip-dup';
      dup.textContent = 'DUP';
      tooltip.appendChild(dup);
    }
    var hint = document.createElement('span');
    hint.className = 'dsg-tooltip-hint';
    hint.textContent = 'Click to copy';
    tooltip.appendChild(hint);
    tooltip.style.top = cmd.y + 'px';
    tooltip.style.left = cmd.x + 'px';
    document.body.appendChild(tooltip);
  }

  function hideTooltip() {
    if (tooltip) { tooltip.remove(); tooltip = null; }
  }

  function showNotification(message, isError) {
    var existing = document.querySelector('.dsg-notification');
    if (existing) { existing.remove(); }
    var notif = document.createElement('div');
    notif.className = 'dsg-notification' + (isError ? ' dsg-notification-error' : '');
    notif.setAttribute(ATTR_ARTIFACT, '');
    notif.textContent = message;
    document.body.appendChild(notif);
    setTimeout(function () {
      notif.classList.add('dsg-notification-hide');
      setTimeout(function () { notif.remove(); }, NOTIFY_FADE_MS);
    }, NOTIFY_MS);
  }

  function applyCommand(cmd) {
    switch (cmd.kind) {
      case 'captureInput':
        setCapture(!!cmd.enabled);
        break;
      case 'overlay':
        if (cmd.present) { showOverlay(); } else { hideOverlay(); }
        break;
      case 'tooltip':
        if (cmd.tip === 'shown') { showTooltip(cmd); } else { hideTooltip(); }
        break;
      case 'addClass': {
        var el = elementAt(cmd.node);
        if (el) { el.classList.add(CLASSES[cmd['class']]); }
        break;
      }
      case 'removeClass': {
        var el2 = elementAt(cmd.node);
        if (el2) { el2.classList.remove(CLASSES[cmd['class']]); }
        break;
      }
      case 'clearClass': {
        var cls = CLASSES[cmd['class']];
        document.querySelectorAll('.' + cls).forEach(function (marked) {
          marked.classList.remove(cls);
        });
        break;
      }
      case 'flash': {
        var el3 = elementAt(cmd.node);
        if (el3) {
          el3.classList.add(CLASSES.copied);
          setTimeout(function () { el3.classList.remove(CLASSES.copied); }, FLASH_MS);
        }
        break;
      }
      case 'notify':
        showNotification(cmd.message, !!cmd.isError);
        break;
    }
  }

  chrome.runtime.onMessage.addListener(function (msg, sender, sendResponse) {
    if (!msg || typeof msg.type !== 'string') { return; }
    if (msg.type === 'ping') {
      sendResponse({ ok: true });
    } else if (msg.type === 'snapshotRequest') {
      sendResponse(captureSnapshot(msg.attr));
    } else if (msg.type === 'page') {
      (msg.commands || []).forEach(applyCommand);
      sendResponse({ ok: true });
    }
  });
})();
"#;

/// Stylesheet backing the `dsg-*` decoration classes the shim applies.
pub const PAGE_SHIM_CSS: &str = r#"
.dsg-overlay {
  position: fixed;
  inset: 0;
  z-index: 2147483645;
  pointer-events: none;
  background: rgba(15, 23, 42, 0.08);
}
.dsg-highlight {
  outline: 2px dashed #3b82f6 !important;
  outline-offset: 2px !important;
}
.dsg-hover {
  outline: 3px solid #f59e0b !important;
  outline-offset: 2px !important;
  cursor: crosshair !important;
}
.dsg-copied {
  outline: 3px solid #22c55e !important;
  outline-offset: 2px !important;
}
.dsg-tooltip {
  position: absolute;
  z-index: 2147483647;
  display: flex;
  align-items: center;
  gap: 6px;
  padding: 5px 10px;
  border-radius: 6px;
  background: #0f172a;
  color: #e2e8f0;
  font: 12px/1.3 ui-monospace, SFMono-Regular, Menlo, monospace;
  box-shadow: 0 4px 12px rgba(0, 0, 0, 0.35);
  pointer-events: none;
  white-space: nowrap;
}
.dsg-tooltip-tag { color: #7dd3fc; }
.dsg-tooltip-id { font-weight: 600; }
.dsg-tooltip-dup {
  background: #b45309;
  color: #fff7ed;
  padding: 1px 5px;
  border-radius: 4px;
  font-size: 10px;
}
.dsg-tooltip-hint {
  color: #94a3b8;
  font-size: 10px;
}
.dsg-notification {
  position: fixed;
  bottom: 20px;
  right: 20px;
  z-index: 2147483647;
  padding: 10px 16px;
  border-radius: 8px;
  background: #16a34a;
  color: #f0fdf4;
  font: 13px/1.4 system-ui, sans-serif;
  box-shadow: 0 6px 18px rgba(0, 0, 0, 0.25);
  transition: opacity 0.3s ease;
  pointer-events: none;
}
.dsg-notification-error { background: #dc2626; color: #fef2f2; }
.dsg-notification-hide { opacity: 0; }
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shim_guards_against_double_injection() {
        assert!(PAGE_SHIM_JS.contains("window.__designatorShim"));
    }

    #[test]
    fn shim_speaks_the_wire_vocabulary() {
        // Field names the daemon serializes must appear verbatim in the shim.
        for token in [
            "'snapshotRequest'",
            "'ping'",
            "'page'",
            "'pointerMove'",
            "'click'",
            "'keyDown'",
            "scrollX",
            "scrollY",
            "inputType",
            "rightClicked",
            "'captureInput'",
            "'overlay'",
            "'tooltip'",
            "'shown'",
            "'addClass'",
            "'removeClass'",
            "'clearClass'",
            "'flash'",
            "'notify'",
        ] {
            assert!(PAGE_SHIM_JS.contains(token), "shim is missing {token}");
        }
    }

    #[test]
    fn stylesheet_covers_every_decoration_class() {
        for class in ["dsg-highlight", "dsg-hover", "dsg-copied"] {
            assert!(PAGE_SHIM_JS.contains(class));
            assert!(PAGE_SHIM_CSS.contains(class));
        }
    }
}
