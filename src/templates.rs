//! Generated shell helpers and the browser landing page

use crate::db::ScriptRecord;

const HELP_SH: &str = include_str!("../templates/help.sh");
const SEARCH_SH: &str = include_str!("../templates/search.sh");
const UNLOCK_PROMPT_SH: &str = include_str!("../templates/unlock_prompt.sh");
const INDEX_HTML: &str = include_str!("../templates/index.html");

/// Lines of content shown by `?preview=1`
pub const PREVIEW_LINES: usize = 20;

/// Renders templates against the public base URL (`https://host`)
#[derive(Debug, Clone)]
pub struct Templates {
    base_url: String,
}

impl Templates {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn render(&self, template: &str) -> String {
        template.replace("{{BASE_URL}}", &self.base_url)
    }

    /// Two-line answer to `curl /`
    pub fn root_hint(&self) -> String {
        format!(
            "curl -fsSL {base}/help.sh | sh\ncurl -fsSL {base}/search.sh | sh\n",
            base = self.base_url
        )
    }

    pub fn help(&self) -> String {
        self.render(HELP_SH)
    }

    pub fn search(&self) -> String {
        self.render(SEARCH_SH)
    }

    pub fn index_html(&self) -> String {
        self.render(INDEX_HTML)
    }

    /// Prompt served in place of a locked script. `script_path` has already
    /// passed path validation, so it is safe inside double quotes.
    pub fn unlock_prompt(&self, script_path: &str) -> String {
        self.render(UNLOCK_PROMPT_SH)
            .replace("{{SCRIPT_PATH}}", script_path)
    }
}

/// Plain-text preview: name, description, tags, then the head of the content.
///
/// Content of a locked script is withheld.
pub fn render_preview(script: &ScriptRecord) -> String {
    let mut out = format!("# {}\n", script.name);
    if let Some(description) = script.description.as_deref().filter(|d| !d.is_empty()) {
        out.push_str(&format!("# {description}\n"));
    }
    if let Some(tags) = script.tags.as_deref().filter(|t| !t.is_empty()) {
        out.push_str(&format!("# Tags: {tags}\n"));
    }

    if script.locked {
        out.push_str("\n# Locked: content is available after unlocking\n");
        return out;
    }

    out.push_str("\n# Content:\n");
    let lines: Vec<&str> = script.content.split('\n').collect();
    for line in lines.iter().take(PREVIEW_LINES) {
        out.push_str(line);
        out.push('\n');
    }
    if lines.len() > PREVIEW_LINES {
        out.push_str(&format!("\n... ({} more lines)\n", lines.len() - PREVIEW_LINES));
    }
    out
}
