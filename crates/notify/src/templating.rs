//! Minijinja template rendering for notification messages.
//!
//! The subject template is configurable; the body uses a fixed layout with
//! one block per failing source. Templates are arbitrary strings, so a fresh
//! [`minijinja::Environment`] is created per render call.

use sourcewatch_core::Advertiser;

use crate::traits::{Notification, NotifyError};

/// Plain-text body: a header line, a blank line, then one block per source
/// separated by blank lines.
pub const DEFAULT_BODY_TEMPLATE: &str = "Advertiser: {{ advertiser.name }}\n\n\
{% for source in sources %}{% if not loop.first %}\n{% endif %}\
- Source: {{ source.name }} ({{ source.source_type }})\n  \
Disconnected at: {{ source.sync_failed_at }}\n\
{% endfor %}";

/// Context data available to notification templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TemplateContext {
    pub advertiser: AdvertiserContext,
    /// Sources that need attention, in feed order.
    pub sources: Vec<SourceContext>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AdvertiserContext {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SourceContext {
    pub id: String,
    pub name: String,
    pub source_type: String,
    pub sync_failed_at: String,
}

impl TemplateContext {
    pub fn new(advertiser_id: &str, advertiser: &Advertiser) -> Self {
        Self {
            advertiser: AdvertiserContext {
                id: advertiser_id.to_string(),
                name: advertiser.name.clone(),
            },
            sources: advertiser
                .sources
                .iter()
                .map(|(id, source)| SourceContext {
                    id: id.clone(),
                    name: source.name.clone(),
                    source_type: source.source_type.clone(),
                    sync_failed_at: source.sync_failed_at.clone().unwrap_or_default(),
                })
                .collect(),
        }
    }
}

/// Renders the subject and body of failure notifications.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    subject_template: String,
    body_template: String,
}

impl TemplateRenderer {
    /// Create a renderer, checking both templates for syntax errors.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if either template fails to parse.
    pub fn new(subject_template: impl Into<String>) -> Result<Self, NotifyError> {
        let renderer = Self {
            subject_template: subject_template.into(),
            body_template: DEFAULT_BODY_TEMPLATE.to_string(),
        };
        validate(&renderer.subject_template)?;
        validate(&renderer.body_template)?;
        Ok(renderer)
    }

    /// Render the notification for an advertiser. Every source in
    /// `advertiser` is listed, so callers pass the pending subset.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if rendering fails.
    pub fn render(
        &self,
        advertiser_id: &str,
        advertiser: &Advertiser,
    ) -> Result<Notification, NotifyError> {
        let ctx = TemplateContext::new(advertiser_id, advertiser);
        let env = build_env();
        let subject = env
            .render_str(&self.subject_template, &ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        let body = env
            .render_str(&self.body_template, &ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))?;

        Ok(Notification {
            advertiser_id: advertiser_id.to_string(),
            // Header values must stay on one line.
            subject: subject.lines().collect::<Vec<_>>().join(" "),
            body,
        })
    }
}

fn build_env<'a>() -> minijinja::Environment<'a> {
    minijinja::Environment::new()
}

/// Check that a template string parses without evaluating it.
fn validate(template_str: &str) -> Result<(), NotifyError> {
    let env = build_env();
    env.template_from_str(template_str)
        .map_err(|e| NotifyError::Template(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sourcewatch_core::config::DEFAULT_SUBJECT_TEMPLATE;
    use sourcewatch_core::Source;

    fn source(name: &str, kind: &str, at: &str) -> Source {
        Source {
            name: name.to_string(),
            source_type: kind.to_string(),
            sync_failed_at: Some(at.to_string()),
        }
    }

    fn acme() -> Advertiser {
        Advertiser::new("Acme Bikes")
            .with_source("S1", source("Main feed", "facebook_ads", "2024-01-02T00:00"))
            .with_source("S2", source("Search", "google_ads", "2024-01-03T08:30"))
    }

    #[test]
    fn default_subject() {
        let renderer = TemplateRenderer::new(DEFAULT_SUBJECT_TEMPLATE).unwrap();
        let adv = acme();
        let n = renderer.render("A1", &adv).unwrap();
        assert_eq!(n.subject, "Source error for Acme Bikes");
        assert_eq!(n.advertiser_id, "A1");
    }

    #[test]
    fn body_single_source() {
        let renderer = TemplateRenderer::new(DEFAULT_SUBJECT_TEMPLATE).unwrap();
        let adv = Advertiser::new("Acme Bikes")
            .with_source("S1", source("Main feed", "facebook_ads", "2024-01-02T00:00"));
        let n = renderer.render("A1", &adv).unwrap();
        assert_eq!(
            n.body,
            "Advertiser: Acme Bikes\n\n- Source: Main feed (facebook_ads)\n  Disconnected at: 2024-01-02T00:00\n"
        );
    }

    #[test]
    fn body_multiple_sources_separated_by_blank_line() {
        let renderer = TemplateRenderer::new(DEFAULT_SUBJECT_TEMPLATE).unwrap();
        let adv = acme();
        let n = renderer.render("A1", &adv).unwrap();
        assert_eq!(
            n.body,
            "Advertiser: Acme Bikes\n\n\
             - Source: Main feed (facebook_ads)\n  Disconnected at: 2024-01-02T00:00\n\n\
             - Source: Search (google_ads)\n  Disconnected at: 2024-01-03T08:30\n"
        );
    }

    #[test]
    fn names_are_not_html_escaped() {
        let renderer = TemplateRenderer::new(DEFAULT_SUBJECT_TEMPLATE).unwrap();
        let adv = Advertiser::new("Smith & <Sons>")
            .with_source("S1", source("Feed", "rss", "2024-01-01T00:00"));
        let n = renderer.render("A9", &adv).unwrap();
        assert_eq!(n.subject, "Source error for Smith & <Sons>");
    }

    #[test]
    fn custom_subject_template() {
        let renderer =
            TemplateRenderer::new("[{{ advertiser.id }}] {{ sources | length }} failing for {{ advertiser.name | upper }}")
                .unwrap();
        let adv = acme();
        let n = renderer.render("A1", &adv).unwrap();
        assert_eq!(n.subject, "[A1] 2 failing for ACME BIKES");
    }

    #[test]
    fn multiline_subject_is_flattened() {
        let renderer = TemplateRenderer::new("Error\n{{ advertiser.name }}").unwrap();
        let adv = acme();
        let n = renderer.render("A1", &adv).unwrap();
        assert_eq!(n.subject, "Error Acme Bikes");
    }

    #[test]
    fn invalid_subject_template_rejected() {
        match TemplateRenderer::new("{{ unclosed") {
            Err(NotifyError::Template(msg)) => assert!(!msg.is_empty()),
            other => panic!("expected Template error, got: {other:?}"),
        }
    }
}
