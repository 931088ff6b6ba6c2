//! Page Inspector: scan a snapshot for tracked elements and resolve owners
//!
//! The tracked attribute's name is fixed at snapshot time (the shim captures
//! each element's value for exactly one attribute), so every function here
//! works over one configuration snapshot by construction.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::dom::{DomSnapshot, NodeId};

/// Longest preview text kept per scanned element.
pub const PREVIEW_MAX_CHARS: usize = 60;

/// One element found by [`scan`], ready for display and codegen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectedElement {
    pub identifier: String,
    pub tag: String,
    pub preview_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    pub is_duplicate: bool,
}

/// Collect every element carrying a non-empty tracked-attribute value, in
/// document order.
///
/// A non-empty `allowed_tags` list restricts results to those tag names; an
/// empty list admits everything. `is_duplicate` is computed within this result
/// set: true iff at least two returned elements share the identifier.
pub fn scan(snapshot: &DomSnapshot, allowed_tags: &[String]) -> Vec<InspectedElement> {
    let mut found: Vec<InspectedElement> = Vec::new();
    for node in &snapshot.nodes {
        let Some(identifier) = node.attr.as_deref().filter(|v| !v.is_empty()) else {
            continue;
        };
        if !allowed_tags.is_empty() && !allowed_tags.iter().any(|t| t == &node.tag) {
            continue;
        }
        found.push(InspectedElement {
            identifier: identifier.to_string(),
            tag: node.tag.clone(),
            preview_text: preview(&node.text),
            input_type: node.input_type.clone(),
            is_duplicate: false,
        });
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    for el in &found {
        *counts.entry(el.identifier.clone()).or_default() += 1;
    }
    for el in &mut found {
        el.is_duplicate = counts.get(&el.identifier).copied().unwrap_or(0) > 1;
    }
    found
}

/// Walk from `start` up through its ancestors (inclusive) and return the first
/// node with a non-empty tracked-attribute value.
pub fn resolve_owner(snapshot: &DomSnapshot, start: NodeId) -> Option<NodeId> {
    std::iter::once(start)
        .chain(snapshot.ancestors(start))
        .find(|&id| has_identifier(snapshot, id))
}

/// Count nodes whose tracked-attribute value equals `identifier`.
///
/// Unlike [`scan`] this ignores the tag allow-list: live duplicate status
/// during hover and commit reflects the whole document.
pub fn count_matches(snapshot: &DomSnapshot, identifier: &str) -> usize {
    snapshot
        .nodes
        .iter()
        .filter(|n| n.attr.as_deref() == Some(identifier))
        .count()
}

fn has_identifier(snapshot: &DomSnapshot, id: NodeId) -> bool {
    snapshot
        .node(id)
        .and_then(|n| n.attr.as_deref())
        .map_or(false, |v| !v.is_empty())
}

fn preview(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(PREVIEW_MAX_CHARS) {
        Some((byte_idx, _)) => trimmed[..byte_idx].to_string(),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Bounds, DomNode, Viewport};

    fn node(parent: Option<NodeId>, tag: &str, attr: Option<&str>, text: &str) -> DomNode {
        DomNode {
            parent,
            tag: tag.to_string(),
            attr: attr.map(str::to_string),
            input_type: None,
            text: text.to_string(),
            bounds: Bounds::new(0.0, 0.0, 10.0, 10.0),
        }
    }

    fn snapshot(nodes: Vec<DomNode>) -> DomSnapshot {
        DomSnapshot {
            nodes,
            viewport: Viewport::default(),
            right_clicked: None,
        }
    }

    #[test]
    fn scan_skips_untracked_and_empty_values() {
        let snap = snapshot(vec![
            node(None, "body", None, ""),
            node(Some(0), "button", Some("save-item"), "Save"),
            node(Some(0), "button", Some(""), "Empty"),
            node(Some(0), "div", None, "Plain"),
        ]);
        let found = scan(&snap, &[]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].identifier, "save-item");
        assert_eq!(found[0].tag, "button");
        assert_eq!(found[0].preview_text, "Save");
        assert!(!found[0].is_duplicate);
    }

    #[test]
    fn scan_respects_tag_allow_list() {
        let snap = snapshot(vec![
            node(None, "body", None, ""),
            node(Some(0), "button", Some("go"), "Go"),
            node(Some(0), "a", Some("nav-home"), "Home"),
        ]);
        let found = scan(&snap, &["button".to_string()]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].identifier, "go");
    }

    #[test]
    fn scan_marks_duplicates_within_result_set() {
        let snap = snapshot(vec![
            node(None, "body", None, ""),
            node(Some(0), "button", Some("submit-btn"), ""),
            node(Some(0), "button", Some("submit-btn"), ""),
            node(Some(0), "button", Some("submit-btn"), ""),
            node(Some(0), "button", Some("cancel-btn"), ""),
        ]);
        let found = scan(&snap, &[]);
        let dups: Vec<bool> = found.iter().map(|e| e.is_duplicate).collect();
        assert_eq!(dups, vec![true, true, true, false]);
    }

    #[test]
    fn scan_trims_and_truncates_preview() {
        let long = format!("  {}  ", "x".repeat(80));
        let snap = snapshot(vec![node(None, "button", Some("b"), &long)]);
        let found = scan(&snap, &[]);
        assert_eq!(found[0].preview_text.chars().count(), PREVIEW_MAX_CHARS);

        // Truncation lands on a char boundary for multibyte text.
        let emoji = "🦀".repeat(70);
        let snap = snapshot(vec![node(None, "button", Some("c"), &emoji)]);
        let found = scan(&snap, &[]);
        assert_eq!(found[0].preview_text.chars().count(), PREVIEW_MAX_CHARS);
    }

    #[test]
    fn owner_resolves_through_ancestors() {
        let snap = snapshot(vec![
            node(None, "body", None, ""),
            node(Some(0), "div", Some("card"), ""),
            node(Some(1), "span", None, ""),
            node(Some(2), "b", None, ""),
        ]);
        assert_eq!(resolve_owner(&snap, 3), Some(1));
        assert_eq!(resolve_owner(&snap, 1), Some(1));
    }

    #[test]
    fn owner_absent_when_no_tagged_ancestor() {
        let snap = snapshot(vec![
            node(None, "body", None, ""),
            node(Some(0), "div", None, ""),
            node(Some(1), "span", Some(""), ""),
        ]);
        assert_eq!(resolve_owner(&snap, 2), None);
    }

    #[test]
    fn count_matches_ignores_allow_list() {
        let snap = snapshot(vec![
            node(None, "body", None, ""),
            node(Some(0), "input", Some("user-name"), ""),
            node(Some(0), "div", Some("user-name"), ""),
            node(Some(0), "input", Some("email"), ""),
        ]);
        assert_eq!(count_matches(&snap, "user-name"), 2);
        assert_eq!(count_matches(&snap, "email"), 1);
        assert_eq!(count_matches(&snap, "missing"), 0);
    }
}
