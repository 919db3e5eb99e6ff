//! Final document assembly and on-disk rendering.
//!
//! Every run gets its own directory, `<root>/<topic-slug>/<timestamp>-<suffix>`,
//! holding `report.md` and `report.html`. The timestamp has millisecond
//! resolution and the suffix is random, so concurrent runs on the same topic
//! never share a directory.

use std::path::{Path, PathBuf};

use chrono::Utc;
use pulldown_cmark::{html, Options, Parser};
use pulldown_cmark_escape::escape_html;

use super::GeneratedFiles;
use crate::core::{PipelineError, PipelineResult};

/// Markdown output file name.
pub const MARKDOWN_FILE: &str = "report.md";

/// HTML output file name.
pub const HTML_FILE: &str = "report.html";

const MAX_SLUG_LEN: usize = 60;

/// Join introduction, sections and conclusion into the document body.
pub fn assemble_body(introduction: &str, sections: &[String], conclusion: &str) -> String {
    std::iter::once(introduction)
        .chain(sections.iter().map(String::as_str))
        .chain(std::iter::once(conclusion))
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
        + "\n"
}

/// Lowercase, dash-separated directory name for a topic.
pub fn slugify(topic: &str) -> String {
    let mut slug = String::with_capacity(topic.len());
    for c in topic.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let slug: String = slug.trim_end_matches('-').chars().take(MAX_SLUG_LEN).collect();
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "report".to_string()
    } else {
        slug.to_string()
    }
}

/// Render markdown into a standalone HTML page titled `title`.
pub fn to_html(title: &str, markdown: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_HEADING_ATTRIBUTES;
    let parser = Parser::new_ext(markdown, options);

    let mut body = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut body, parser);

    let mut escaped_title = String::with_capacity(title.len());
    // Writing into a String is infallible.
    let _ = escape_html(&mut escaped_title, title);

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n</head>\n<body>\n<main>\n{}</main>\n</body>\n</html>\n",
        escaped_title, body
    )
}

/// Writes finished reports below a root directory.
#[derive(Debug, Clone)]
pub struct DocumentRenderer {
    root: PathBuf,
}

impl DocumentRenderer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the output root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fresh, collision-free run directory for `topic`. Not created yet.
    pub fn run_dir(&self, topic: &str) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        self.root.join(slugify(topic)).join(format!("{stamp}-{}", &suffix[..8]))
    }

    /// Write both formats into a fresh run directory.
    pub async fn render(&self, topic: &str, body: &str) -> PipelineResult<GeneratedFiles> {
        self.render_into(self.run_dir(topic), topic, body).await
    }

    /// Write both formats into `directory`. Markdown is written first; a
    /// failed HTML write leaves the markdown file behind.
    pub async fn render_into(
        &self,
        directory: PathBuf,
        topic: &str,
        body: &str,
    ) -> PipelineResult<GeneratedFiles> {
        tokio::fs::create_dir_all(&directory).await.map_err(|e| render_error(&directory, &e))?;

        let markdown = directory.join(MARKDOWN_FILE);
        tokio::fs::write(&markdown, body).await.map_err(|e| render_error(&markdown, &e))?;

        let html = directory.join(HTML_FILE);
        tokio::fs::write(&html, to_html(topic, body)).await.map_err(|e| render_error(&html, &e))?;

        tracing::info!(directory = %directory.display(), "Report written");
        Ok(GeneratedFiles { directory, markdown, html })
    }
}

fn render_error(path: &Path, error: &std::io::Error) -> PipelineError {
    PipelineError::Render { path: path.to_path_buf(), message: error.to_string() }
}
