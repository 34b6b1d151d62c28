//! Markdown to Confluence Wiki Markup
//!
//! PRD pages are created with `representation: wiki`, so the generated
//! markdown has to be rewritten into Confluence wiki markup first.

/// Convert markdown into Confluence wiki markup.
pub fn markdown_to_wiki(md: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut in_code = false;
    let mut in_table = false;
    let mut table_header_done = false;

    for line in md.lines() {
        let stripped = line.trim_end();

        if stripped.trim_start().starts_with("```") {
            if in_code {
                out.push("{code}".to_string());
            } else {
                let lang = stripped.trim_start().trim_start_matches("```").trim();
                if lang.is_empty() {
                    out.push("{code}".to_string());
                } else {
                    out.push(format!("{{code:{}}}", lang));
                }
            }
            in_code = !in_code;
            continue;
        }
        if in_code {
            out.push(stripped.to_string());
            continue;
        }

        let trimmed = stripped.trim_start();

        if trimmed.starts_with('|') && trimmed.ends_with('|') && trimmed.len() > 1 {
            let cells: Vec<&str> = trimmed[1..trimmed.len() - 1]
                .split('|')
                .map(str::trim)
                .collect();
            // Markdown separator rows (|---|---|) carry no content
            if cells.iter().all(|c| {
                !c.is_empty() && c.chars().all(|ch| ch == '-' || ch == ':')
            }) {
                continue;
            }
            if !in_table {
                in_table = true;
                table_header_done = false;
            }
            let rewritten: Vec<String> =
                cells.iter().map(|c| convert_inline(c)).collect();
            if !table_header_done {
                out.push(format!("||{}||", rewritten.join("||")));
                table_header_done = true;
            } else {
                out.push(format!("|{}|", rewritten.join("|")));
            }
            continue;
        }
        in_table = false;

        if let Some(converted) = convert_heading(trimmed) {
            out.push(converted);
        } else if trimmed == "---" || trimmed == "***" {
            out.push("----".to_string());
        } else if let Some(rest) = trimmed.strip_prefix("- ") {
            out.push(format!("* {}", convert_inline(rest)));
        } else if let Some(rest) = numbered_rest(trimmed) {
            out.push(format!("# {}", convert_inline(rest)));
        } else {
            out.push(convert_inline(stripped));
        }
    }

    out.join("\n")
}

fn convert_heading(line: &str) -> Option<String> {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    if (1..=6).contains(&hashes) && line[hashes..].starts_with(' ') {
        Some(format!(
            "h{}. {}",
            hashes,
            convert_inline(line[hashes + 1..].trim())
        ))
    } else {
        None
    }
}

fn numbered_rest(line: &str) -> Option<&str> {
    let dot = line.find(". ")?;
    if dot > 0 && dot <= 3 && line[..dot].chars().all(|c| c.is_ascii_digit()) {
        Some(&line[dot + 2..])
    } else {
        None
    }
}

/// Inline conversions: `**bold**` -> `*bold*`, `` `code` `` -> `{{code}}`,
/// `[text](url)` -> `[text|url]`.
fn convert_inline(text: &str) -> String {
    let mut s = String::with_capacity(text.len());
    let mut i = 0;

    while i < text.len() {
        if text[i..].starts_with("**")
            && let Some(end) = text[i + 2..].find("**")
        {
            s.push('*');
            s.push_str(&text[i + 2..i + 2 + end]);
            s.push('*');
            i += end + 4;
            continue;
        }
        if text[i..].starts_with('`')
            && let Some(end) = text[i + 1..].find('`')
        {
            s.push_str("{{");
            s.push_str(&text[i + 1..i + 1 + end]);
            s.push_str("}}");
            i += end + 2;
            continue;
        }
        if text[i..].starts_with('[')
            && let Some(close) = text[i..].find("](")
        {
            let after = i + close + 2;
            if let Some(end) = text[after..].find(')') {
                let label = &text[i + 1..i + close];
                let url = &text[after..after + end];
                if !label.is_empty() && !url.is_empty() {
                    s.push('[');
                    s.push_str(label);
                    s.push('|');
                    s.push_str(url);
                    s.push(']');
                    i = after + end + 1;
                    continue;
                }
            }
        }

        let ch_len = text[i..].chars().next().map_or(1, char::len_utf8);
        s.push_str(&text[i..i + ch_len]);
        i += ch_len;
    }

    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headings() {
        assert_eq!(markdown_to_wiki("# Title"), "h1. Title");
        assert_eq!(markdown_to_wiki("### Sub"), "h3. Sub");
        assert_eq!(markdown_to_wiki("###### Deep"), "h6. Deep");
    }

    #[test]
    fn test_bold_and_code() {
        assert_eq!(markdown_to_wiki("a **bold** word"), "a *bold* word");
        assert_eq!(markdown_to_wiki("run `make all` now"), "run {{make all}} now");
    }

    #[test]
    fn test_links() {
        assert_eq!(
            markdown_to_wiki("see [docs](https://example.com)"),
            "see [docs|https://example.com]"
        );
    }

    #[test]
    fn test_lists() {
        assert_eq!(markdown_to_wiki("- item one\n- item two"), "* item one\n* item two");
        assert_eq!(markdown_to_wiki("1. first\n2. second"), "# first\n# second");
    }

    #[test]
    fn test_table_with_header() {
        let md = "| Name | Role |\n|------|------|\n| Ana | PM |";
        assert_eq!(markdown_to_wiki(md), "||Name||Role||\n|Ana|PM|");
    }

    #[test]
    fn test_code_block() {
        let md = "```sql\nSELECT 1;\n```";
        assert_eq!(markdown_to_wiki(md), "{code:sql}\nSELECT 1;\n{code}");
    }

    #[test]
    fn test_code_block_preserves_markdown_inside() {
        let md = "```\n# not a heading\n```";
        assert_eq!(markdown_to_wiki(md), "{code}\n# not a heading\n{code}");
    }

    #[test]
    fn test_rule() {
        assert_eq!(markdown_to_wiki("---"), "----");
    }
}
