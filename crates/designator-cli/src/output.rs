//! Scan output rendering and row selection
//!
//! Pure string work, kept apart from the socket client so every format
//! detail is unit-testable.

use std::collections::HashSet;

use anyhow::{bail, Result};

use designator::{property_line, Config, InspectedElement};

/// Keep rows whose identifier or tag contains `filter`, case-insensitively.
/// A missing or blank filter keeps everything.
pub fn filter_rows<'a>(
    elements: &'a [InspectedElement],
    filter: Option<&str>,
) -> Vec<&'a InspectedElement> {
    let Some(query) = filter.map(str::trim).filter(|q| !q.is_empty()) else {
        return elements.iter().collect();
    };
    let query = query.to_lowercase();
    elements
        .iter()
        .filter(|el| {
            el.identifier.to_lowercase().contains(&query) || el.tag.to_lowercase().contains(&query)
        })
        .collect()
}

/// Indexed table plus a summary line. `total` is the unfiltered element
/// count, used to tell an empty page from an over-narrow filter.
pub fn render_table(total: usize, rows: &[&InspectedElement]) -> String {
    if total == 0 {
        return "No elements found\n".to_string();
    }
    if rows.is_empty() {
        return "No matching elements\n".to_string();
    }

    let idx_w = rows.len().to_string().len().max(1);
    let tag_w = header_width("TAG", rows.iter().map(|el| el.tag.len()));
    let type_w = header_width(
        "TYPE",
        rows.iter().map(|el| el.input_type.as_deref().unwrap_or("").len()),
    );
    let id_w = header_width("IDENTIFIER", rows.iter().map(|el| el.identifier.len()));

    let mut out = String::new();
    push_row(
        &mut out,
        &format!(
            "{:>iw$}  {:<tw$}  {:<yw$}  {:<dw$}  {:<3}  {}",
            "#",
            "TAG",
            "TYPE",
            "IDENTIFIER",
            "DUP",
            "TEXT",
            iw = idx_w,
            tw = tag_w,
            yw = type_w,
            dw = id_w,
        ),
    );
    for (i, el) in rows.iter().enumerate() {
        push_row(
            &mut out,
            &format!(
                "{:>iw$}  {:<tw$}  {:<yw$}  {:<dw$}  {:<3}  {}",
                i + 1,
                el.tag,
                el.input_type.as_deref().unwrap_or(""),
                el.identifier,
                if el.is_duplicate { "DUP" } else { "" },
                el.preview_text,
                iw = idx_w,
                tw = tag_w,
                yw = type_w,
                dw = id_w,
            ),
        );
    }
    out.push('\n');
    out.push_str(&summary_line(rows));
    out.push('\n');
    out
}

fn header_width(header: &str, lens: impl Iterator<Item = usize>) -> usize {
    lens.max().unwrap_or(0).max(header.len())
}

fn push_row(out: &mut String, line: &str) {
    out.push_str(line.trim_end());
    out.push('\n');
}

/// `Found N element(s)` with a duplicate clause only when duplicates exist.
/// Duplicates are counted as distinct identifiers, not rows.
pub fn summary_line(rows: &[&InspectedElement]) -> String {
    let dup_ids: HashSet<&str> = rows
        .iter()
        .filter(|el| el.is_duplicate)
        .map(|el| el.identifier.as_str())
        .collect();
    if dup_ids.is_empty() {
        format!("Found {} element(s)", rows.len())
    } else {
        format!(
            "Found {} element(s), {} duplicate ID(s)",
            rows.len(),
            dup_ids.len()
        )
    }
}

/// Parse `all` or 1-based indices like `1,3-5` into sorted, deduplicated
/// 0-based indices over a list of `len` rows.
pub fn parse_selection(spec: &str, len: usize) -> Result<Vec<usize>> {
    let spec = spec.trim();
    if spec.eq_ignore_ascii_case("all") {
        return Ok((0..len).collect());
    }
    let mut picked = Vec::new();
    for part in spec.split(',') {
        let part = part.trim();
        let (lo, hi) = match part.split_once('-') {
            Some((a, b)) => (parse_index(a, spec)?, parse_index(b, spec)?),
            None => {
                let i = parse_index(part, spec)?;
                (i, i)
            }
        };
        if lo > hi {
            bail!("invalid range '{part}' (start exceeds end)");
        }
        for i in lo..=hi {
            if i == 0 || i > len {
                bail!("selection index {i} is out of range (1-{len})");
            }
            picked.push(i - 1);
        }
    }
    picked.sort_unstable();
    picked.dedup();
    Ok(picked)
}

fn parse_index(raw: &str, spec: &str) -> Result<usize> {
    match raw.trim().parse() {
        Ok(i) => Ok(i),
        Err(_) => bail!("invalid selection '{spec}' (use `all` or indices like `1,3-5`)"),
    }
}

/// Declaration lines for the picked rows, newline-joined for the clipboard.
pub fn clipboard_payload(
    rows: &[&InspectedElement],
    picked: &[usize],
    attribute_name: &str,
) -> String {
    picked
        .iter()
        .map(|&i| {
            let el = rows[i];
            property_line(&el.identifier, &el.tag, el.is_duplicate, attribute_name)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Wire-shaped JSON: the same camelCase keys the daemon speaks.
pub fn render_json(attribute_name: &str, rows: &[&InspectedElement]) -> Result<String> {
    let value = serde_json::json!({
        "attributeName": attribute_name,
        "elements": rows,
    });
    Ok(serde_json::to_string_pretty(&value)?)
}

pub fn render_config(config: &Config) -> String {
    let tags = if config.allowed_tags.is_empty() {
        "(all)".to_string()
    } else {
        config.allowed_tags.join(", ")
    };
    format!(
        "Attribute name: {}\nElement types:  {}\n",
        config.attribute_name, tags
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(identifier: &str, tag: &str, input_type: Option<&str>, dup: bool) -> InspectedElement {
        InspectedElement {
            identifier: identifier.to_string(),
            tag: tag.to_string(),
            preview_text: String::new(),
            input_type: input_type.map(str::to_string),
            is_duplicate: dup,
        }
    }

    fn sample() -> Vec<InspectedElement> {
        vec![
            element("user-name", "input", Some("text"), false),
            element("save-btn", "button", None, true),
            element("save-btn", "button", None, true),
            element("main-nav", "a", None, false),
        ]
    }

    #[test]
    fn filter_matches_identifier_and_tag_case_insensitively() {
        let elements = sample();

        let by_id = filter_rows(&elements, Some("SAVE"));
        assert_eq!(by_id.len(), 2);

        let by_tag = filter_rows(&elements, Some("inp"));
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].identifier, "user-name");

        assert_eq!(filter_rows(&elements, Some("  ")).len(), 4);
        assert_eq!(filter_rows(&elements, None).len(), 4);
        assert!(filter_rows(&elements, Some("zzz")).is_empty());
    }

    #[test]
    fn selection_all_and_lists_and_ranges() {
        assert_eq!(parse_selection("all", 4).unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(parse_selection("ALL", 2).unwrap(), vec![0, 1]);
        assert_eq!(parse_selection("2", 4).unwrap(), vec![1]);
        assert_eq!(parse_selection("1,3-4", 4).unwrap(), vec![0, 2, 3]);
        assert_eq!(parse_selection("3, 1", 4).unwrap(), vec![0, 2]);
        assert_eq!(parse_selection("2,2,2", 4).unwrap(), vec![1]);
    }

    #[test]
    fn selection_rejects_garbage_and_out_of_range() {
        assert!(parse_selection("0", 4).is_err());
        assert!(parse_selection("5", 4).is_err());
        assert!(parse_selection("4-2", 4).is_err());
        assert!(parse_selection("a,b", 4).is_err());
        assert!(parse_selection("1,,3", 4).is_err());

        let err = parse_selection("9", 4).unwrap_err().to_string();
        assert_eq!(err, "selection index 9 is out of range (1-4)");
    }

    #[test]
    fn summary_counts_distinct_duplicate_ids() {
        let elements = sample();
        let rows: Vec<&InspectedElement> = elements.iter().collect();
        assert_eq!(summary_line(&rows), "Found 4 element(s), 1 duplicate ID(s)");

        let unique: Vec<&InspectedElement> = elements.iter().filter(|el| !el.is_duplicate).collect();
        assert_eq!(summary_line(&unique), "Found 2 element(s)");
    }

    #[test]
    fn table_renders_indices_badges_and_summary() {
        let elements = vec![
            element("user-name", "input", Some("text"), false),
            element("save-btn", "button", None, true),
        ];
        let rows: Vec<&InspectedElement> = elements.iter().collect();
        let table = render_table(2, &rows);

        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "#  TAG     TYPE  IDENTIFIER  DUP  TEXT");
        assert_eq!(lines[1], "1  input   text  user-name");
        assert_eq!(lines[2], "2  button        save-btn    DUP");
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "Found 2 element(s), 1 duplicate ID(s)");
    }

    #[test]
    fn empty_page_and_empty_filter_render_differently() {
        assert_eq!(render_table(0, &[]), "No elements found\n");
        assert_eq!(render_table(3, &[]), "No matching elements\n");
    }

    #[test]
    fn payload_joins_declarations_with_newlines() {
        let elements = sample();
        let rows: Vec<&InspectedElement> = elements.iter().collect();
        let payload = clipboard_payload(&rows, &[0, 1], "data-element-id");
        assert_eq!(
            payload,
            "private readonly userName = this.page.getByTestId('user-name');\n\
             private readonly saveBtnButton = this.page.locator('button[data-element-id=\"save-btn\"]');"
        );
    }

    #[test]
    fn config_rendering_names_every_tag() {
        let config = Config::new("data-qa", vec!["input".to_string(), "button".to_string()]);
        assert_eq!(
            render_config(&config),
            "Attribute name: data-qa\nElement types:  input, button\n"
        );

        let open = Config::new("data-qa", Vec::new());
        assert!(render_config(&open).contains("(all)"));
    }
}
