//! In-place edits of existing report documents.
//!
//! Every edit here can be applied any number of times: the second
//! application sees its own output and leaves the document alone.

use regex::{Captures, NoExpand, Regex};
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::models::TpsSummary;
use crate::render::{TPS_SECTION_MARKER, html_escape, render_tps_section};
use crate::utils::{read_file, write_file};

/// The summary's analysis card before any report exists
static UNPATCHED_CARD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?s)<div\s+class="stat-card"\s+style="background-color:\s*#fff3cd;">\s*"#,
        r#"<div\s+class="stat-value"\s+style="color:\s*#666;">\s*AI分析\s*</div>\s*"#,
        r#"<div\s+style="font-size:\s*12px;\s*color:\s*#dc3545;\s*margin-top:\s*5px;">\s*无\s*</div>\s*"#,
        r#"</div>"#,
    ))
    .expect("valid regex")
});

/// The analysis card once it links to a companion report
static PATCHED_CARD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?s)<div\s+class="stat-card"\s+style="background-color:\s*#fff3cd;">\s*"#,
        r#"<div\s+class="stat-value"\s+style="color:\s*#666;">\s*"#,
        r#"<a\s+href="(.*?)"\s+style="color:\s*#28a745;\s*text-decoration:\s*none;"\s+target="_blank">AI分析</a>\s*</div>\s*"#,
        r#"<div\s+style="font-size:\s*12px;\s*color:\s*#666;\s*margin-top:\s*5px;">\s*点击查看\s*</div>\s*"#,
        r#"</div>"#,
    ))
    .expect("valid regex")
});

static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title>.*?</title>").expect("valid regex"));

/// An element whose whole text is a caption naming some test
static NAMED_CAPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r">(\s*)[^<>]*? - Load Test Report(\s*)<").expect("valid regex")
});

static BODY_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<body[^>]*>").expect("valid regex"));

const REPORT_CAPTION: &str = "Load Test Report";
const SUMMARY_HEADING_END: &str = "Summary</h3>";

/// What a patch attempt did to the summary document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The placeholder card was replaced with a link
    Applied,
    /// The card already links to a report; nothing changed
    AlreadyPatched,
    /// Neither card shape was found; nothing changed
    PlaceholderMissing,
}

impl fmt::Display for PatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PatchOutcome::Applied => "applied",
            PatchOutcome::AlreadyPatched => "already patched",
            PatchOutcome::PlaceholderMissing => "placeholder missing",
        };
        f.write_str(text)
    }
}

fn linked_card(link: &str) -> String {
    format!(
        r#"<div class="stat-card" style="background-color: #fff3cd;">
                    <div class="stat-value" style="color: #666;">
                        <a href="{href}" style="color: #28a745; text-decoration: none;" target="_blank">AI分析</a>
                    </div>
                    <div style="font-size: 12px; color: #666; margin-top: 5px;">
                        点击查看
                    </div>
                </div>"#,
        href = html_escape(link)
    )
}

/// Point the summary's analysis card at `link`.
///
/// An unpatched card is rewritten; a card that already links somewhere is
/// left as is, whatever its target.
pub fn patch_summary(html: &str, link: &str) -> (String, PatchOutcome) {
    if UNPATCHED_CARD.is_match(html) {
        let card = linked_card(link);
        let patched = UNPATCHED_CARD.replace_all(html, NoExpand(&card)).into_owned();
        return (patched, PatchOutcome::Applied);
    }

    if let Some(existing) = PATCHED_CARD.captures(html).and_then(|c| c.get(1)) {
        debug!(link = existing.as_str(), "Analysis card already linked");
        return (html.to_string(), PatchOutcome::AlreadyPatched);
    }

    (html.to_string(), PatchOutcome::PlaceholderMissing)
}

/// Patch a summary file on disk. The file is rewritten only when the
/// document actually changed.
pub fn patch_summary_file(path: &Path, link: &str) -> Result<PatchOutcome> {
    let html = read_file(path)?;
    let (patched, outcome) = patch_summary(&html, link);

    match outcome {
        PatchOutcome::Applied => {
            write_file(path, &patched)?;
            info!(path = %path.display(), link, "Linked analysis report from summary");
        }
        PatchOutcome::AlreadyPatched => {
            info!(path = %path.display(), "Summary already links an analysis report");
        }
        PatchOutcome::PlaceholderMissing => {
            warn!(path = %path.display(), "No analysis placeholder found in summary");
        }
    }

    Ok(outcome)
}

/// Insert a TPS block into a rendered report.
///
/// The block goes after the first table following the `Summary` heading,
/// else straight after `<body>`, else at the end. Documents that already
/// carry a TPS block are returned unchanged.
pub fn inject_tps_section(html: &str, tps: &TpsSummary) -> String {
    if html.contains(TPS_SECTION_MARKER) {
        debug!("TPS section already present");
        return html.to_string();
    }

    let section = render_tps_section(tps);
    let position = html
        .find(SUMMARY_HEADING_END)
        .and_then(|heading| {
            html[heading..]
                .find("</table>")
                .map(|end| heading + end + "</table>".len())
        })
        .or_else(|| BODY_OPEN.find(html).map(|m| m.end()))
        .unwrap_or(html.len());

    let mut out = String::with_capacity(html.len() + section.len());
    out.push_str(&html[..position]);
    out.push_str(&section);
    out.push_str(&html[position..]);
    out
}

/// Caption a report after its test: `<title>` and every visible
/// "Load Test Report" become `<test_name> - Load Test Report`. A caption
/// that already names a test is renamed, not prefixed again.
pub fn retitle_report(html: &str, test_name: &str) -> String {
    const HOLD: char = '\u{0}';

    let caption = format!("{} - {REPORT_CAPTION}", html_escape(test_name));
    let titled = TITLE.replace(html, NoExpand(&format!("<title>{caption}</title>")));
    let renamed = NAMED_CAPTION.replace_all(&titled, |c: &Captures<'_>| {
        format!(">{}{caption}{}<", &c[1], &c[2])
    });

    // Park captions that are already complete so they are not prefixed twice
    renamed
        .replace(&caption, &HOLD.to_string())
        .replace(REPORT_CAPTION, &caption)
        .replace(HOLD, &caption)
}
