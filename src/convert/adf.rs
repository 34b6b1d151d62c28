//! Markdown to ADF
//!
//! Builds Atlassian Document Format trees from the markdown subset the
//! generation prompts are constrained to: headings (1-3), bullet and
//! ordered lists, paragraphs, bold runs, and inline links. Also extracts
//! plain text back out of arbitrary ADF, which is how page bodies and
//! comments are read.

use serde_json::{Value, json};

/// Wrap content nodes into a full ADF document.
pub fn adf_doc(content: Vec<Value>) -> Value {
    json!({ "version": 1, "type": "doc", "content": content })
}

/// Convert markdown into ADF content nodes.
///
/// Blank lines separate blocks; consecutive list lines fold into one list
/// node. Empty input yields a single blank paragraph, which Jira requires
/// over an empty content array.
pub fn markdown_to_adf(md: &str) -> Vec<Value> {
    let mut nodes: Vec<Value> = Vec::new();

    for line in md.lines() {
        let stripped = line.trim();
        if stripped.is_empty() {
            continue;
        }

        if let Some(rest) = stripped.strip_prefix("### ") {
            nodes.push(heading(3, rest));
        } else if let Some(rest) = stripped.strip_prefix("## ") {
            nodes.push(heading(2, rest));
        } else if let Some(rest) = stripped.strip_prefix("# ") {
            nodes.push(heading(1, rest));
        } else if let Some(rest) = bullet_item(stripped) {
            push_list_item(&mut nodes, "bulletList", rest);
        } else if let Some(rest) = ordered_item(stripped) {
            push_list_item(&mut nodes, "orderedList", rest);
        } else {
            nodes.push(json!({
                "type": "paragraph",
                "content": parse_inline(stripped),
            }));
        }
    }

    if nodes.is_empty() {
        nodes.push(json!({
            "type": "paragraph",
            "content": [{ "type": "text", "text": " " }],
        }));
    }
    nodes
}

fn heading(level: u8, text: &str) -> Value {
    json!({
        "type": "heading",
        "attrs": { "level": level },
        "content": parse_inline(text),
    })
}

fn bullet_item(line: &str) -> Option<&str> {
    line.strip_prefix("- ")
        .or_else(|| line.strip_prefix("* ").filter(|_| !line.starts_with("**")))
}

fn ordered_item(line: &str) -> Option<&str> {
    let dot = line.find(". ")?;
    if dot > 0 && dot <= 3 && line[..dot].chars().all(|c| c.is_ascii_digit()) {
        Some(&line[dot + 2..])
    } else {
        None
    }
}

/// Append a list item, folding into the previous node when it is already a
/// list of the same kind.
fn push_list_item(nodes: &mut Vec<Value>, list_type: &str, item_text: &str) {
    let item = json!({
        "type": "listItem",
        "content": [{ "type": "paragraph", "content": parse_inline(item_text) }],
    });

    if let Some(last) = nodes.last_mut()
        && last["type"] == list_type
        && let Some(content) = last["content"].as_array_mut()
    {
        content.push(item);
        return;
    }

    let mut node = json!({ "type": list_type, "content": [item] });
    if list_type == "orderedList" {
        node["attrs"] = json!({ "order": 1 });
    }
    nodes.push(node);
}

/// Parse inline markdown into ADF text nodes. Handles `**bold**` runs and
/// `[text](url)` links; everything else passes through as plain text.
pub fn parse_inline(text: &str) -> Vec<Value> {
    let mut nodes: Vec<Value> = Vec::new();
    let mut plain = String::new();
    let bytes = text.as_bytes();
    let mut i = 0;

    let flush = |plain: &mut String, nodes: &mut Vec<Value>| {
        if !plain.is_empty() {
            nodes.push(json!({ "type": "text", "text": std::mem::take(plain) }));
        }
    };

    while i < bytes.len() {
        if text[i..].starts_with("**")
            && let Some(end) = text[i + 2..].find("**")
        {
            let inner = &text[i + 2..i + 2 + end];
            if !inner.trim().is_empty() {
                flush(&mut plain, &mut nodes);
                nodes.push(json!({
                    "type": "text",
                    "text": inner,
                    "marks": [{ "type": "strong" }],
                }));
                i += end + 4;
                continue;
            }
        }

        if bytes[i] == b'['
            && let Some((label, href, consumed)) = parse_link(&text[i..])
        {
            flush(&mut plain, &mut nodes);
            nodes.push(json!({
                "type": "text",
                "text": label,
                "marks": [{ "type": "link", "attrs": { "href": href } }],
            }));
            i += consumed;
            continue;
        }

        let ch_len = text[i..].chars().next().map_or(1, char::len_utf8);
        plain.push_str(&text[i..i + ch_len]);
        i += ch_len;
    }

    flush(&mut plain, &mut nodes);
    if nodes.is_empty() {
        nodes.push(json!({ "type": "text", "text": " " }));
    }
    nodes
}

fn parse_link(s: &str) -> Option<(&str, &str, usize)> {
    let close = s.find("](")?;
    let label = &s[1..close];
    let rest = &s[close + 2..];
    let end = rest.find(')')?;
    let href = &rest[..end];
    if label.is_empty() || href.is_empty() {
        return None;
    }
    Some((label, href, close + 2 + end + 1))
}

/// Recursively extract plain text from an ADF node (document, node array,
/// or single node).
pub fn adf_to_text(node: &Value) -> String {
    match node {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(adf_to_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(map) => {
            let mut parts = Vec::new();
            if let Some(Value::String(text)) = map.get("text") {
                parts.push(text.clone());
            }
            if let Some(content) = map.get("content") {
                let inner = adf_to_text(content);
                if !inner.is_empty() {
                    parts.push(inner);
                }
            }
            parts.join(" ")
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headings_levels() {
        let nodes = markdown_to_adf("# One\n## Two\n### Three");
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0]["attrs"]["level"], 1);
        assert_eq!(nodes[1]["attrs"]["level"], 2);
        assert_eq!(nodes[2]["attrs"]["level"], 3);
        assert_eq!(nodes[0]["content"][0]["text"], "One");
    }

    #[test]
    fn test_bullet_list_folds() {
        let nodes = markdown_to_adf("- first\n- second\n- third");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0]["type"], "bulletList");
        assert_eq!(nodes[0]["content"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_ordered_list() {
        let nodes = markdown_to_adf("1. alpha\n2. beta");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0]["type"], "orderedList");
        assert_eq!(nodes[0]["attrs"]["order"], 1);
        assert_eq!(nodes[0]["content"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_bold_marks() {
        let inline = parse_inline("plain **bold** after");
        assert_eq!(inline.len(), 3);
        assert_eq!(inline[0]["text"], "plain ");
        assert_eq!(inline[1]["text"], "bold");
        assert_eq!(inline[1]["marks"][0]["type"], "strong");
        assert_eq!(inline[2]["text"], " after");
    }

    #[test]
    fn test_link_marks() {
        let inline = parse_inline("see [the PRD](https://example.com/prd) here");
        assert_eq!(inline[1]["text"], "the PRD");
        assert_eq!(
            inline[1]["marks"][0]["attrs"]["href"],
            "https://example.com/prd"
        );
    }

    #[test]
    fn test_unclosed_bold_is_plain() {
        let inline = parse_inline("a ** dangling");
        assert_eq!(inline.len(), 1);
        assert_eq!(inline[0]["text"], "a ** dangling");
    }

    #[test]
    fn test_empty_input_yields_blank_paragraph() {
        let nodes = markdown_to_adf("");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0]["type"], "paragraph");
    }

    #[test]
    fn test_text_round_trip() {
        let md = "## Goals\n- ship **fast**\n- stay [aligned](https://example.com)\n\nDone.";
        let doc = adf_doc(markdown_to_adf(md));
        let text = adf_to_text(&doc);
        assert!(text.contains("Goals"));
        assert!(text.contains("ship"));
        assert!(text.contains("fast"));
        assert!(text.contains("aligned"));
        assert!(text.contains("Done."));
    }
}
