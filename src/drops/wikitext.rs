use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static SLOT_KEY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+|item.*)$").unwrap());

const DROP_TABLE_TEMPLATE: &str = "droptable";
const NESTED_TABLE_KEYS: &[&str] = &["droptable", "subtable"];

/// One `{{name|key=value|...}}` invocation. Unnamed parameters get their
/// 1-based position as key. Values are kept raw so nested templates can be
/// reparsed later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateNode {
    pub name: String,
    pub params: Vec<(String, String)>,
}

impl TemplateNode {
    pub fn is_drop_table(&self) -> bool {
        self.name.trim().to_lowercase() == DROP_TABLE_TEMPLATE
    }
}

/// Item names from every top-level drop table template in `source`.
pub fn extract(source: &str) -> BTreeSet<String> {
    parse_templates(source)
        .iter()
        .filter(|t| t.is_drop_table())
        .flat_map(slot_names)
        .collect()
}

/// Collect item names from a template's slots, following `droptable`/`subtable`
/// parameters into the first template they contain.
pub fn slot_names(node: &TemplateNode) -> Vec<String> {
    let mut names = Vec::new();

    for (key, value) in &node.params {
        let key = key.trim().to_lowercase();
        if SLOT_KEY_RE.is_match(&key) {
            names.extend(item_slot(value));
        } else if NESTED_TABLE_KEYS.contains(&key.as_str()) {
            // Only the first nested template is followed.
            if let Some(nested) = parse_templates(value).first() {
                names.extend(slot_names(nested));
            }
        }
    }

    names
}

fn item_slot(value: &str) -> Option<String> {
    let name = value.trim().split('|').next().unwrap_or("").trim();
    if name.is_empty() || name.starts_with("{{") {
        return None;
    }
    Some(name.to_string())
}

/// Scan `source` for top-level templates. Templates nested inside another
/// template's parameters are left in the raw parameter value. A `{{` that
/// never closes is read as plain text.
pub fn parse_templates(source: &str) -> Vec<TemplateNode> {
    let source = COMMENT_RE.replace_all(source, "");
    let bytes = source.as_bytes();
    let mut templates = Vec::new();
    let mut i = 0;

    while i + 1 < bytes.len() {
        if &bytes[i..i + 2] != b"{{" {
            i += 1;
            continue;
        }
        let Some(end) = find_close(bytes, i) else {
            i += 2;
            continue;
        };
        templates.push(parse_body(&source[i + 2..end - 2]));
        i = end;
    }

    templates
}

/// Index just past the `}}` matching the `{{` at `start`.
fn find_close(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = start;

    while i + 1 < bytes.len() {
        match &bytes[i..i + 2] {
            b"{{" => {
                depth += 1;
                i += 2;
            }
            b"}}" => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => i += 1,
        }
    }
    None
}

fn parse_body(body: &str) -> TemplateNode {
    let mut parts = split_top_level(body, b'|').into_iter();
    let name = parts.next().unwrap_or("").trim().to_string();
    let mut params = Vec::new();
    let mut position = 0;

    for part in parts {
        match find_top_level(part, b'=') {
            Some(eq) => params.push((part[..eq].trim().to_string(), part[eq + 1..].to_string())),
            None => {
                position += 1;
                params.push((position.to_string(), part.to_string()));
            }
        }
    }

    TemplateNode { name, params }
}

/// Byte offsets of `sep` outside nested `{{ }}` and `[[ ]]`. A `[[` without a
/// later `]]` is plain text.
fn top_level_positions(s: &str, sep: u8) -> Vec<usize> {
    let bytes = s.as_bytes();
    let mut positions = Vec::new();
    let mut braces = 0usize;
    let mut brackets = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        let pair = bytes.get(i..i + 2);
        match pair {
            Some(b"{{") => {
                braces += 1;
                i += 2;
                continue;
            }
            Some(b"}}") if braces > 0 => {
                braces -= 1;
                i += 2;
                continue;
            }
            Some(b"[[") if has_link_close(&bytes[i + 2..]) => {
                brackets += 1;
                i += 2;
                continue;
            }
            Some(b"]]") if brackets > 0 => {
                brackets -= 1;
                i += 2;
                continue;
            }
            _ => {}
        }
        if bytes[i] == sep && braces == 0 && brackets == 0 {
            positions.push(i);
        }
        i += 1;
    }

    positions
}

fn has_link_close(rest: &[u8]) -> bool {
    rest.windows(2).any(|w| w == b"]]")
}

fn split_top_level(s: &str, sep: u8) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut last = 0;
    for pos in top_level_positions(s, sep) {
        parts.push(&s[last..pos]);
        last = pos + 1;
    }
    parts.push(&s[last..]);
    parts
}

fn find_top_level(s: &str, sep: u8) -> Option<usize> {
    top_level_positions(s, sep).first().copied()
}
