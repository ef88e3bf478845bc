//! Markdown subset to HTML.
//!
//! Handles what narrative services actually emit: pipe tables, `#`-`###`
//! headings, bold, italics, inline and fenced code, blockquotes, `-` and
//! `N.` lists, horizontal rules, links and paragraphs. Rules run in a fixed
//! order, each over the output of the previous one, and every rule except
//! the last leaves its output on a single line so the paragraph pass can
//! tell block markup from prose.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use super::html_escape;

/// Marks a line standing in for a stashed fenced code block
const CODE_SENTINEL: char = '\u{1}';

/// Delimit a stashed inline code span
const SPAN_OPEN: char = '\u{2}';
const SPAN_CLOSE: char = '\u{3}';

static H3: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^###\s+(.+?)\s*$").expect("valid regex"));
static H2: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^##\s+(.+?)\s*$").expect("valid regex"));
static H1: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#\s+(.+?)\s*$").expect("valid regex"));
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*([^*\n]+?)\*\*").expect("valid regex"));
static ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*([^*\n]+?)\*").expect("valid regex"));
static INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`\n]+)`").expect("valid regex"));
static BLOCKQUOTE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^&gt;\s?(.*)$").expect("valid regex"));
static UNORDERED_ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*-\s+(.*)$").expect("valid regex"));
static ORDERED_ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\d+\.\s+(.*)$").expect("valid regex"));
static RULE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*(?:-{3,}|\*{3,})\s*$").expect("valid regex"));
static LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]\n]+)\]\(([^)\s]+)\)").expect("valid regex"));
static SPAN_SLOT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\x02(\d+)\x03").expect("valid regex"));
static SEPARATOR_CELL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^:?-+:?$").expect("valid regex"));

const BLOCK_PREFIXES: [&str; 9] = [
    "<h1>", "<h2>", "<h3>", "<table>", "<ul>", "<ol>", "<blockquote>", "<hr>", "<pre>",
];

/// Convert markdown-like narrative text into HTML
pub fn markdown_to_html(input: &str) -> String {
    let text = input
        .replace("\r\n", "\n")
        .replace([CODE_SENTINEL, SPAN_OPEN, SPAN_CLOSE], "");
    let (text, code_blocks) = stash_code_blocks(&text);
    let mut code_spans = Vec::new();

    let text = html_escape(&text);
    let text = convert_tables(&text);
    let text = convert_headings(&text);
    let text = convert_inline(&text, &mut code_spans);
    let text = BLOCKQUOTE
        .replace_all(&text, "<blockquote>$1</blockquote>")
        .into_owned();
    let text = convert_lists(&text);
    let text = RULE.replace_all(&text, "<hr>").into_owned();
    let text = convert_links(&text);
    let text = convert_paragraphs(&text);

    let text = restore_code_spans(&text, &code_spans);
    restore_code_blocks(&text, &code_blocks)
}

/// Pull fenced code blocks out so no later rule touches their contents. An
/// unterminated fence runs to the end of input.
fn stash_code_blocks(text: &str) -> (String, Vec<String>) {
    let mut out = Vec::new();
    let mut blocks = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in text.lines() {
        let is_fence = line.trim_start().starts_with("```");
        match (current.take(), is_fence) {
            (Some(body), true) => {
                blocks.push(body.join("\n"));
                out.push(format!("{CODE_SENTINEL}{}", blocks.len() - 1));
            }
            (Some(mut body), false) => {
                body.push(line);
                current = Some(body);
            }
            (None, true) => current = Some(Vec::new()),
            (None, false) => out.push(line.to_string()),
        }
    }
    if let Some(body) = current {
        blocks.push(body.join("\n"));
        out.push(format!("{CODE_SENTINEL}{}", blocks.len() - 1));
    }

    (out.join("\n"), blocks)
}

fn restore_code_blocks(text: &str, blocks: &[String]) -> String {
    text.lines()
        .map(|line| {
            line.strip_prefix(CODE_SENTINEL)
                .and_then(|index| index.parse::<usize>().ok())
                .and_then(|index| blocks.get(index))
                .map(|code| format!("<pre><code>{}</code></pre>", html_escape(code)))
                .unwrap_or_else(|| line.to_string())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn split_row(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('|').unwrap_or(trimmed);
    trimmed.split('|').map(|cell| cell.trim().to_string()).collect()
}

fn is_separator(line: &str) -> bool {
    let cells = split_row(line);
    !cells.is_empty() && cells.iter().all(|cell| SEPARATOR_CELL.is_match(cell))
}

/// Render accumulated table lines, or give them back untouched when they
/// are not a table after all (no separator row).
fn flush_table(lines: &mut Vec<&str>, out: &mut Vec<String>) {
    if lines.is_empty() {
        return;
    }

    if lines.len() < 2 || !is_separator(lines[1]) {
        out.extend(lines.drain(..).map(str::to_string));
        return;
    }

    let header = split_row(lines[0]);
    let width = header.len();
    let head: String = header.iter().map(|h| format!("<th>{h}</th>")).collect();
    let body: String = lines[2..]
        .iter()
        .map(|line| {
            let mut cells = split_row(line);
            cells.resize(width, String::new());
            let cells: String = cells.iter().map(|c| format!("<td>{c}</td>")).collect();
            format!("<tr>{cells}</tr>")
        })
        .collect();

    out.push(format!(
        "<table><thead><tr>{head}</tr></thead><tbody>{body}</tbody></table>"
    ));
    lines.clear();
}

fn convert_tables(text: &str) -> String {
    let mut out = Vec::new();
    let mut table: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.contains('|') && !line.starts_with(CODE_SENTINEL) {
            table.push(line);
        } else {
            flush_table(&mut table, &mut out);
            out.push(line.to_string());
        }
    }
    flush_table(&mut table, &mut out);

    out.join("\n")
}

fn convert_headings(text: &str) -> String {
    let text = H3.replace_all(text, "<h3>$1</h3>");
    let text = H2.replace_all(&text, "<h2>$1</h2>");
    H1.replace_all(&text, "<h1>$1</h1>").into_owned()
}

/// Bold and italics. Inline code spans are stashed into `spans` first so
/// no later rule rewrites their contents.
fn convert_inline(text: &str, spans: &mut Vec<String>) -> String {
    let text = INLINE_CODE.replace_all(text, |c: &Captures<'_>| {
        spans.push(c[1].to_string());
        format!("{SPAN_OPEN}{}{SPAN_CLOSE}", spans.len() - 1)
    });
    let text = BOLD.replace_all(&text, "<strong>$1</strong>");
    ITALIC.replace_all(&text, "<em>$1</em>").into_owned()
}

/// Spans were escaped along with the rest of the text before stashing
fn restore_code_spans(text: &str, spans: &[String]) -> String {
    SPAN_SLOT
        .replace_all(text, |c: &Captures<'_>| {
            c[1].parse::<usize>()
                .ok()
                .and_then(|index| spans.get(index))
                .map(|code| format!("<code>{code}</code>"))
                .unwrap_or_default()
        })
        .into_owned()
}

/// Wrap runs of consecutive list lines in one container per run
fn convert_lists(text: &str) -> String {
    #[derive(PartialEq, Clone, Copy)]
    enum Kind {
        Unordered,
        Ordered,
    }

    fn close(kind: Kind, items: &mut Vec<String>, out: &mut Vec<String>) {
        if items.is_empty() {
            return;
        }
        let tag = match kind {
            Kind::Unordered => "ul",
            Kind::Ordered => "ol",
        };
        let body: String = items.drain(..).map(|i| format!("<li>{i}</li>")).collect();
        out.push(format!("<{tag}>{body}</{tag}>"));
    }

    let mut out = Vec::new();
    let mut items = Vec::new();
    let mut open: Option<Kind> = None;

    for line in text.lines() {
        let item = if let Some(c) = UNORDERED_ITEM.captures(line).filter(|_| !RULE.is_match(line)) {
            Some((Kind::Unordered, c[1].to_string()))
        } else {
            ORDERED_ITEM
                .captures(line)
                .map(|c| (Kind::Ordered, c[1].to_string()))
        };

        match item {
            Some((kind, content)) => {
                if let Some(current) = open.filter(|current| *current != kind) {
                    close(current, &mut items, &mut out);
                }
                open = Some(kind);
                items.push(content);
            }
            None => {
                if let Some(current) = open.take() {
                    close(current, &mut items, &mut out);
                }
                out.push(line.to_string());
            }
        }
    }
    if let Some(current) = open {
        close(current, &mut items, &mut out);
    }

    out.join("\n")
}

fn convert_links(text: &str) -> String {
    LINK.replace_all(text, |c: &Captures<'_>| {
        let url = &c[2];
        if url.trim_start().to_ascii_lowercase().starts_with("javascript:") {
            c[1].to_string()
        } else {
            format!(r#"<a href="{}" target="_blank">{}</a>"#, url, &c[1])
        }
    })
    .into_owned()
}

/// Blank lines separate paragraphs; single newlines inside a paragraph
/// become `<br>`. Block markup passes through unwrapped.
fn convert_paragraphs(text: &str) -> String {
    fn flush(paragraph: &mut Vec<&str>, out: &mut Vec<String>) {
        if !paragraph.is_empty() {
            out.push(format!("<p>{}</p>", paragraph.join("<br>")));
            paragraph.clear();
        }
    }

    let mut out = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            flush(&mut paragraph, &mut out);
        } else if line.starts_with(CODE_SENTINEL)
            || BLOCK_PREFIXES.iter().any(|prefix| line.starts_with(prefix))
        {
            flush(&mut paragraph, &mut out);
            out.push(line.to_string());
        } else {
            paragraph.push(line);
        }
    }
    flush(&mut paragraph, &mut out);

    out.join("\n")
}
