//! Check-run output text assembly.
//!
//! Job logs may frame sections with `:::` marker lines
//! (`::: Title` ... `:::`). Those become collapsible
//! `<details><summary>` blocks so a long section folds away in the
//! check UI. Output without markers is fenced whole.

/// Full check-run text for a finished job.
pub fn format_check_text(command: &str, output: &str) -> String {
    if has_stanzas(output) {
        // Details blocks fence their own bodies; an outer fence would
        // neutralize the HTML.
        format!(
            "**Command:** `{}`\n\n**Output:**\n\n{}",
            command,
            collapse_stanzas(output)
        )
    } else {
        format!(
            "**Command:** `{}`\n\n**Output:**\n\n```\n{}\n```",
            command, output
        )
    }
}

fn has_stanzas(text: &str) -> bool {
    text.lines().any(|line| stanza_title(line).is_some())
}

/// A line opens a stanza when, trimmed, it is `:::` alone or `:::`
/// followed by whitespace and a title. Returns the title, defaulting
/// to "Details".
fn stanza_title(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix(":::")?;
    if rest.is_empty() {
        return Some("Details");
    }
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let title = rest.trim();
    Some(if title.is_empty() { "Details" } else { title })
}

/// A line closes an open stanza under the same marker rule.
fn closes_stanza(line: &str) -> bool {
    stanza_title(line).is_some()
}

/// Rewrite `:::`-framed sections as collapsible details blocks with
/// fenced bodies. Lines outside stanzas pass through unchanged; an
/// unterminated stanza runs to the end of the text.
pub fn collapse_stanzas(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        match stanza_title(line) {
            Some(title) => {
                i += 1;
                let mut body_lines: Vec<&str> = Vec::new();
                while i < lines.len() && !closes_stanza(lines[i]) {
                    body_lines.push(lines[i]);
                    i += 1;
                }
                out.push("<details>".to_string());
                out.push(format!("<summary>{}</summary>", escape_html(title)));
                out.push(String::new());
                out.push("```".to_string());
                out.push(body_lines.join("\n"));
                out.push("```".to_string());
                out.push(String::new());
                out.push("</details>".to_string());
                if i < lines.len() {
                    i += 1; // consume the closing marker
                }
            }
            None => {
                out.push(line.to_string());
                i += 1;
            }
        }
    }

    out.join("\n")
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
