//! Content generation - turns an accepted posting into a publishable artifact
//!
//! The broadcast message and the HTML document come from fixed templates;
//! every slot fails closed, so a posting missing a field renders an empty
//! section rather than aborting the run.

use askama::Template;

use crate::model::RawPosting;

/// Configuration for the content generator
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Static channel-promotion line appended to every broadcast (WhatsApp)
    pub promo_whatsapp: String,
    /// Static channel-promotion line appended to every broadcast (Telegram)
    pub promo_telegram: String,
    /// Cap on bulleted requirement lines in the broadcast message
    pub max_requirements: usize,
    /// Cap on document description length, in characters
    pub max_description_chars: usize,
    /// Header-image catalog for keyword-to-asset matching
    pub assets: AssetCatalog,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            promo_whatsapp: String::new(),
            promo_telegram: String::new(),
            max_requirements: 6,
            max_description_chars: 500,
            assets: AssetCatalog::empty(),
        }
    }
}

/// Known header-image assets, matched to keywords best-effort.
///
/// Built by the caller from a directory listing; matching itself is pure.
#[derive(Debug, Clone, Default)]
pub struct AssetCatalog {
    base_url: String,
    files: Vec<String>,
}

impl AssetCatalog {
    pub fn new(base_url: impl Into<String>, files: Vec<String>) -> Self {
        Self {
            base_url: base_url.into(),
            files,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Resolve a keyword to an asset URL.
    ///
    /// Tries, in order: exact stem match, separator-insensitive match, then
    /// the stem sharing the most words with the keyword. No match is fine;
    /// the document simply omits its header image.
    pub fn resolve(&self, keyword: &str) -> Option<String> {
        if keyword.trim().is_empty() || self.files.is_empty() {
            return None;
        }

        let keyword_lower = keyword.trim().to_lowercase();
        let keyword_clean = squash(&keyword_lower);

        for file in &self.files {
            if stem(file).to_lowercase() == keyword_lower {
                return Some(self.url_for(file));
            }
        }

        for file in &self.files {
            if squash(&stem(file).to_lowercase()) == keyword_clean {
                return Some(self.url_for(file));
            }
        }

        let keyword_words: Vec<&str> = keyword_lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() >= 3)
            .collect();
        let mut best: Option<(usize, &String)> = None;
        for file in &self.files {
            let stem_lower = stem(file).to_lowercase();
            let overlap = stem_lower
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| w.len() >= 3 && keyword_words.contains(w))
                .count();
            if overlap > 0 && best.map_or(true, |(score, _)| overlap > score) {
                best = Some((overlap, file));
            }
        }

        best.map(|(_, file)| self.url_for(file))
    }

    fn url_for(&self, file: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), file)
    }
}

fn stem(file_name: &str) -> &str {
    file_name
        .rsplit_once('.')
        .map(|(stem, _ext)| stem)
        .unwrap_or(file_name)
}

/// Drop every non-alphanumeric character, for separator-insensitive matching
fn squash(s: &str) -> String {
    s.chars().filter(|c| c.is_alphanumeric()).collect()
}

#[derive(Template)]
#[template(path = "job_post.html")]
struct JobPostTemplate {
    header_image: Option<String>,
    title: String,
    company: String,
    location: String,
    description: String,
    technical_requirements: Vec<String>,
    qualifications: Vec<String>,
    apply_link: String,
}

/// The content generator
#[derive(Debug, Clone)]
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Render the HTML document for the content host.
    ///
    /// Template substitution fails closed: a render error yields a minimal
    /// document instead of aborting the posting.
    pub fn render_document(&self, posting: &RawPosting) -> String {
        let cleaned: Vec<String> = posting
            .requirements
            .iter()
            .map(|r| clean_bullet(r))
            .filter(|r| !r.is_empty())
            .collect();
        let (technical_requirements, qualifications) = split_requirements(&cleaned);

        let template = JobPostTemplate {
            header_image: self.config.assets.resolve(&posting.keyword),
            title: posting.title.clone(),
            company: posting
                .company
                .clone()
                .unwrap_or_else(|| "Not specified".to_string()),
            location: posting.location.clone(),
            description: truncate_chars(&posting.description, self.config.max_description_chars),
            technical_requirements,
            qualifications,
            apply_link: posting.link.clone(),
        };

        match template.render() {
            Ok(html) => html,
            Err(error) => {
                tracing::warn!(%error, title = %posting.title, "Document render failed");
                format!(
                    "<article class=\"job-post\"><h2>{}</h2></article>",
                    posting.title
                )
            }
        }
    }

    /// Render the broadcast message with the final canonical link.
    ///
    /// Called after the blog publish so the apply link reflects the
    /// verified-blog-over-source precedence.
    pub fn render_broadcast(&self, posting: &RawPosting, canonical_link: &str) -> String {
        let mut parts: Vec<String> = Vec::new();
        parts.push(format!("*{}*", posting.title));
        parts.push(String::new());
        parts.push(format!("📍 *Location:* {}", posting.location));
        parts.push(String::new());

        let requirements: Vec<String> = posting
            .requirements
            .iter()
            .map(|r| clean_bullet(r))
            .filter(|r| !r.is_empty())
            .take(self.config.max_requirements)
            .collect();
        if !requirements.is_empty() {
            parts.push(format!("*{}:*", posting.section_label.as_str()));
            for requirement in &requirements {
                parts.push(format!("🔹 {}", requirement));
            }
            parts.push(String::new());
        }

        parts.push(format!("🔗 *Apply Here:* {}", canonical_link));
        parts.push(String::new());
        if !self.config.promo_whatsapp.is_empty() {
            parts.push(format!("⚡ WhatsApp Channel: {}", self.config.promo_whatsapp));
        }
        if !self.config.promo_telegram.is_empty() {
            parts.push(format!("💬 Telegram Channel: {}", self.config.promo_telegram));
        }

        while parts.last().is_some_and(|p| p.is_empty()) {
            parts.pop();
        }
        parts.join("\n")
    }
}

/// URL-safe slug from a posting title
pub fn make_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' {
            pending_dash = true;
        }
    }
    slug
}

/// Strip a leading bullet glyph a source may have baked into the text
fn clean_bullet(text: &str) -> String {
    text.trim()
        .trim_start_matches(['🔹', '•', '▪', '✓', '-'])
        .trim()
        .to_string()
}

/// First half feeds Technical Requirements, second half Qualifications;
/// short lists go entirely under the first heading.
fn split_requirements(requirements: &[String]) -> (Vec<String>, Vec<String>) {
    if requirements.len() > 3 {
        let mid = requirements.len() / 2;
        (requirements[..mid].to_vec(), requirements[mid..].to_vec())
    } else {
        (requirements.to_vec(), Vec::new())
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{}...", truncated.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SectionLabel, SourceId};

    fn sample_posting() -> RawPosting {
        RawPosting {
            title: "Senior QA Engineer".to_string(),
            company: Some("Acme Corp".to_string()),
            location: "Cairo, Egypt".to_string(),
            description: "Testing web applications end to end.".to_string(),
            requirements: vec![
                "🔹 3+ years of testing experience".to_string(),
                "- ISTQB certification".to_string(),
                "Strong SQL knowledge".to_string(),
                "Automation with Selenium".to_string(),
            ],
            section_label: SectionLabel::Requirements,
            skills: vec!["Selenium".to_string()],
            link: "https://wuzzuf.net/jobs/p/123-senior-qa".to_string(),
            source: SourceId::Wuzzuf,
            keyword: "QA".to_string(),
            posted: Some("2 hours ago".to_string()),
        }
    }

    fn renderer() -> Renderer {
        Renderer::new(RenderConfig {
            promo_whatsapp: "https://chat.example/wa".to_string(),
            promo_telegram: "https://t.me/example".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn broadcast_has_fixed_sections_in_order() {
        let text = renderer().render_broadcast(&sample_posting(), "https://short.example/abc");

        let title_pos = text.find("*Senior QA Engineer*").unwrap();
        let location_pos = text.find("📍 *Location:* Cairo, Egypt").unwrap();
        let section_pos = text.find("*Requirements:*").unwrap();
        let link_pos = text.find("🔗 *Apply Here:* https://short.example/abc").unwrap();
        let promo_pos = text.find("💬 Telegram Channel:").unwrap();

        assert!(title_pos < location_pos);
        assert!(location_pos < section_pos);
        assert!(section_pos < link_pos);
        assert!(link_pos < promo_pos);
    }

    #[test]
    fn broadcast_normalizes_bullets() {
        let text = renderer().render_broadcast(&sample_posting(), "https://example.com");
        assert!(text.contains("🔹 3+ years of testing experience"));
        assert!(text.contains("🔹 ISTQB certification"));
        assert!(!text.contains("- ISTQB"));
    }

    #[test]
    fn broadcast_section_label_follows_extractor() {
        let mut posting = sample_posting();
        posting.section_label = SectionLabel::Responsibilities;
        let text = renderer().render_broadcast(&posting, "https://example.com");
        assert!(text.contains("*Responsibilities:*"));
    }

    #[test]
    fn broadcast_omits_requirements_section_when_empty() {
        let mut posting = sample_posting();
        posting.requirements.clear();
        let text = renderer().render_broadcast(&posting, "https://example.com");
        assert!(!text.contains("*Requirements:*"));
        assert!(text.contains("🔗 *Apply Here:*"));
    }

    #[test]
    fn document_contains_split_requirement_sections() {
        let html = renderer().render_document(&sample_posting());

        assert!(html.contains("<h2>Senior QA Engineer</h2>"));
        assert!(html.contains("Technical Requirements"));
        assert!(html.contains("Qualifications"));
        assert!(html.contains("3+ years of testing experience"));
        assert!(html.contains("Automation with Selenium"));
        assert!(html.contains("https://wuzzuf.net/jobs/p/123-senior-qa"));
    }

    #[test]
    fn document_renders_empty_sections_when_fields_missing() {
        let mut posting = sample_posting();
        posting.description.clear();
        posting.requirements.clear();
        posting.company = None;

        let html = renderer().render_document(&posting);

        assert!(!html.contains("Technical Requirements"));
        assert!(!html.contains("job-description"));
        assert!(html.contains("Not specified"));
        assert!(html.contains("Apply Now"));
    }

    #[test]
    fn document_header_image_is_best_effort() {
        let mut config = RenderConfig::default();
        config.assets = AssetCatalog::new(
            "https://cdn.example/img",
            vec!["qa.png".to_string(), "devops.jpg".to_string()],
        );
        let renderer = Renderer::new(config);

        let html = renderer.render_document(&sample_posting());
        assert!(html.contains("https://cdn.example/img/qa.png"));

        let mut other = sample_posting();
        other.keyword = "Underwater Welding".to_string();
        let html = renderer.render_document(&other);
        assert!(!html.contains("job-header-image"));
    }

    #[test]
    fn asset_catalog_matching_strategies() {
        let catalog = AssetCatalog::new(
            "https://cdn.example",
            vec![
                "cyber_security.png".to_string(),
                "uiux.png".to_string(),
                "data scientist.jpg".to_string(),
            ],
        );

        // Separator-insensitive match.
        assert_eq!(
            catalog.resolve("Cyber Security"),
            Some("https://cdn.example/cyber_security.png".to_string())
        );
        assert_eq!(
            catalog.resolve("UI/UX"),
            Some("https://cdn.example/uiux.png".to_string())
        );
        // Word-overlap match.
        assert_eq!(
            catalog.resolve("Data Scientist (Remote)"),
            Some("https://cdn.example/data scientist.jpg".to_string())
        );
        assert_eq!(catalog.resolve("Forklift Operator"), None);
        assert_eq!(catalog.resolve(""), None);
    }

    #[test]
    fn slug_is_url_safe() {
        assert_eq!(make_slug("Senior QA Engineer"), "senior-qa-engineer");
        assert_eq!(make_slug(".NET Developer (Remote!)"), "net-developer-remote");
        assert_eq!(make_slug("  spaced   out  "), "spaced-out");
    }

    #[test]
    fn description_truncates_on_char_boundary() {
        let long = "x".repeat(600);
        let truncated = truncate_chars(&long, 500);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 503);
    }
}
