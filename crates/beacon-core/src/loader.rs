//! Client loader markup
//!
//! Produces the `<script>` snippet placed in the page head so the visitor's
//! browser fetches the tracker script. Inert: no network call happens here.

use crate::config::{CollectorConfig, PLUGIN_VERSION};

/// DOM id of the injected script element
pub const LOADER_SCRIPT_ID: &str = "smalk-analytics-dynamic";

/// Renders loader markup against a tracker script URL
#[derive(Debug, Clone)]
pub struct LoaderScript {
    tracker_js_url: String,
    version: String,
}

impl LoaderScript {
    /// Loader for the given tracker script URL
    pub fn new(tracker_js_url: impl Into<String>) -> Self {
        Self {
            tracker_js_url: tracker_js_url.into(),
            version: PLUGIN_VERSION.to_string(),
        }
    }

    /// Loader pointing at the collector's tracker script
    pub fn from_config(config: &CollectorConfig) -> Self {
        Self::new(config.tracker_js_url())
    }

    /// Full script URL for a project
    pub fn script_url(&self, project_id: &str) -> String {
        format!(
            "{}?PROJECT_KEY={}&ver={}",
            self.tracker_js_url,
            urlencoding::encode(project_id),
            urlencoding::encode(&self.version)
        )
    }

    /// Markup for the page head
    pub fn render(&self, project_id: &str) -> String {
        format!(
            "<!-- Smalk AI Agent Analytics (https://smalk.ai) -->\n\
             <script type=\"text/javascript\" id=\"{}\" async src=\"{}\" \
             data-no-minify=\"1\" data-cfasync=\"false\" data-no-optimize=\"1\"></script>\n",
            LOADER_SCRIPT_ID,
            escape_attribute(&self.script_url(project_id)),
        )
    }
}

/// Loader markup against the default collector
pub fn render_client_loader_markup(project_id: &str) -> String {
    LoaderScript::from_config(&CollectorConfig::default()).render(project_id)
}

fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_url_carries_project_key_and_version() {
        let loader = LoaderScript::new("https://api.smalk.ai/tracker.js");
        assert_eq!(
            loader.script_url("proj_42"),
            format!("https://api.smalk.ai/tracker.js?PROJECT_KEY=proj_42&ver={}", PLUGIN_VERSION)
        );
    }

    #[test]
    fn render_escapes_query_separator() {
        let markup = render_client_loader_markup("proj_42");
        assert!(markup.contains("src=\"https://api.smalk.ai/tracker.js?PROJECT_KEY=proj_42&amp;ver="));
        assert!(markup.contains("id=\"smalk-analytics-dynamic\""));
        assert!(markup.trim_end().ends_with("</script>"));
    }

    #[test]
    fn hostile_project_id_cannot_break_out() {
        let markup = render_client_loader_markup("\"><script>alert(1)</script>");
        assert!(!markup.contains("<script>alert"));
        assert_eq!(markup.matches("<script").count(), 1);
    }

    #[test]
    fn loader_follows_configured_host() {
        let config = CollectorConfig::new("https://api.smalk.me");
        let markup = LoaderScript::from_config(&config).render("p");
        assert!(markup.contains("https://api.smalk.me/tracker.js?PROJECT_KEY=p"));
    }
}
