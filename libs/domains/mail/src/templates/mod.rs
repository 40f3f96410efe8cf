//! Template rendering via Handlebars in strict mode.
//!
//! Strict mode turns any unresolved variable into a render error, which the
//! delivery state machine treats as a permanent failure. When a template has
//! no plain-text body, one is derived by stripping markup from the rendered
//! HTML.

use handlebars::Handlebars;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::error::{MailError, MailResult};

static BR_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<\s*br\s*/?>").expect("valid regex"));
static HTML_TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Render subject, HTML and text bodies against a variable mapping.
pub fn render_template(
    subject_template: &str,
    html_template: &str,
    text_template: Option<&str>,
    variables: &Value,
) -> MailResult<RenderedEmail> {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(true);

    let subject = render_one(&handlebars, subject_template, variables)?;
    let html = render_one(&handlebars, html_template, variables)?;
    let text = match text_template {
        Some(template) => render_one(&handlebars, template, variables)?,
        None => html_to_text(&html),
    };

    Ok(RenderedEmail {
        subject,
        html,
        text,
    })
}

fn render_one(handlebars: &Handlebars<'_>, template: &str, variables: &Value) -> MailResult<String> {
    handlebars
        .render_template(template, variables)
        .map_err(|e| MailError::TemplateRender(format!("unresolved variable or bad template: {e}")))
}

/// Derive a plain-text fallback from rendered HTML: line breaks survive,
/// other markup is stripped, blank runs collapse.
pub fn html_to_text(html: &str) -> String {
    let with_breaks = BR_TAGS.replace_all(html, "\n");
    let stripped = HTML_TAGS.replace_all(&with_breaks, "");
    BLANK_RUNS.replace_all(&stripped, "\n\n").trim().to_string()
}
