//! Wuzzuf search extractor
//!
//! Parses the search listing page into raw postings and, in enhanced mode,
//! follows each posting to its detail page for requirements and skills.
//! Card discovery and every field use strategy chains so a markup change
//! degrades one strategy, not the adapter.

use std::collections::HashSet;

use async_trait::async_trait;
use jobcast_domain::{
    Extraction, FetchOptions, JobSource, RawPosting, SectionLabel, SourceError, SourceId,
};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use url::Url;

use super::sections::{
    element_text, extract_bulleted_section, find_time_marker, items_after_heading,
};

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const MAX_SKILLS: usize = 10;

/// Extractor for wuzzuf.net search results
pub struct WuzzufSource {
    client: Client,
    base_url: Url,
}

impl WuzzufSource {
    pub fn new() -> Self {
        Self::with_base_url("https://wuzzuf.net")
    }

    pub fn with_base_url(base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent(BROWSER_UA)
            .build()
            .expect("Failed to build HTTP client");

        let base_url = Url::parse(base_url).expect("invalid base URL");

        Self { client, base_url }
    }

    fn search_url(&self, keyword: &str) -> Result<Url, SourceError> {
        let mut url = self
            .base_url
            .join("/search/jobs/")
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("q", keyword)
            .append_pair("a", "hpb")
            .append_pair("filters[post_date][0]", "within_24_hours");
        Ok(url)
    }

    async fn get_text(&self, url: &str) -> Result<String, SourceError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        if response.status() == 429 {
            return Err(SourceError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(SourceError::Unavailable(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        response
            .text()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))
    }
}

impl Default for WuzzufSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobSource for WuzzufSource {
    async fn fetch(
        &self,
        query: &str,
        options: &FetchOptions,
    ) -> Result<Extraction, SourceError> {
        let url = self.search_url(query)?;
        let html = self.get_text(url.as_str()).await?;
        let mut extraction = parse_search_page(&html, &self.base_url, query);

        if options.enhanced {
            // Detail pages are only worth fetching for as many postings as
            // the run can still accept.
            for posting in extraction.postings.iter_mut().take(options.limit) {
                match self.get_text(&posting.link).await {
                    Ok(detail_html) => apply_detail_page(posting, &detail_html),
                    Err(error) => {
                        tracing::debug!(
                            link = %posting.link,
                            %error,
                            "Detail page fetch failed, keeping card data"
                        );
                    }
                }
            }
        }

        Ok(extraction)
    }

    fn id(&self) -> SourceId {
        SourceId::Wuzzuf
    }
}

fn parse_search_page(html: &str, base_url: &Url, keyword: &str) -> Extraction {
    let document = Html::parse_document(html);
    let cards = find_cards(&document);

    let mut extraction = Extraction {
        cards_seen: cards.len() as u32,
        ..Default::default()
    };

    for card in cards {
        match parse_card(card, base_url, keyword) {
            Ok(posting) => extraction.postings.push(posting),
            Err(CardError::MissingLink) => extraction.skipped.missing_link += 1,
            Err(CardError::MissingTitle) => extraction.skipped.missing_title += 1,
            Err(CardError::Unparseable) => extraction.skipped.parse_error += 1,
        }
    }

    extraction
}

enum CardError {
    MissingLink,
    MissingTitle,
    Unparseable,
}

/// Card discovery: known card class first, then any div wrapping a heading
/// that links to a posting page.
fn find_cards(document: &Html) -> Vec<ElementRef<'_>> {
    let known_class = Selector::parse("div.css-pkv5jc").unwrap();
    let cards: Vec<_> = document.select(&known_class).collect();
    if !cards.is_empty() {
        return cards;
    }

    let heading_selector = Selector::parse("h2, h3").unwrap();
    let posting_link = Selector::parse("a[href*='/jobs/p/']").unwrap();

    let mut found = Vec::new();
    let mut seen = HashSet::new();
    for heading in document.select(&heading_selector) {
        if heading.select(&posting_link).next().is_none() {
            continue;
        }
        let Some(card) = heading
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "div")
        else {
            continue;
        };
        if seen.insert(card.id()) {
            found.push(card);
        }
    }
    found
}

fn parse_card(
    card: ElementRef<'_>,
    base_url: &Url,
    keyword: &str,
) -> Result<RawPosting, CardError> {
    let heading_link = Selector::parse("h2 a[href*='/jobs/p/'], h3 a[href*='/jobs/p/']").unwrap();
    let any_link = Selector::parse("a[href*='/jobs/p/']").unwrap();

    let link_el = card
        .select(&heading_link)
        .next()
        .or_else(|| card.select(&any_link).next())
        .ok_or(CardError::MissingLink)?;

    let href = link_el.value().attr("href").unwrap_or_default();
    if href.is_empty() {
        return Err(CardError::MissingLink);
    }
    let link = base_url
        .join(href)
        .map_err(|_| CardError::Unparseable)?
        .to_string();

    let title = element_text(link_el);
    if title.is_empty() {
        return Err(CardError::MissingTitle);
    }

    let company_link = Selector::parse("a[href*='/jobs/careers/']").unwrap();
    let company = card
        .select(&company_link)
        .next()
        .map(element_text)
        .map(|name| name.trim_end_matches('-').trim().to_string())
        .filter(|name| !name.is_empty());

    Ok(RawPosting {
        title,
        company,
        location: extract_location(card),
        description: String::new(),
        requirements: Vec::new(),
        section_label: SectionLabel::Requirements,
        skills: Vec::new(),
        link,
        source: SourceId::Wuzzuf,
        keyword: keyword.to_string(),
        posted: find_time_marker(card),
    })
}

/// First span reading like "City, Region"; the site lists Egyptian postings
/// so the bare region is the fallback.
fn extract_location(card: ElementRef<'_>) -> String {
    let span = Selector::parse("span").unwrap();
    for element in card.select(&span) {
        let text = element_text(element);
        if text.contains(',') && text.len() < 60 && !text.to_lowercase().contains("ago") {
            return text;
        }
    }
    "Egypt".to_string()
}

/// Fold detail-page fields into a card posting
fn apply_detail_page(posting: &mut RawPosting, html: &str) {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let description_items = items_after_heading(root, "job description");
    if !description_items.is_empty() {
        posting.description = description_items.join("\n");
    }

    if let Some(section) = extract_bulleted_section(root) {
        posting.section_label = section.label;
        posting.requirements = section.items;
    } else if !description_items.is_empty() {
        // No requirements-like section; the description bullets are the
        // next best thing.
        posting.requirements = description_items.into_iter().take(5).collect();
        posting.section_label = SectionLabel::Requirements;
    }

    posting.skills = extract_skills(root);
}

/// Skill badges: dedicated skill links first, then badges under a skills
/// heading.
fn extract_skills(root: ElementRef<'_>) -> Vec<String> {
    let skill_link = Selector::parse("a[href*='/skill']").unwrap();
    let mut skills: Vec<String> = Vec::new();
    for element in root.select(&skill_link) {
        let text = element_text(element);
        if text.len() >= 2 && text.len() <= 40 && !skills.contains(&text) {
            skills.push(text);
            if skills.len() >= MAX_SKILLS {
                return skills;
            }
        }
    }
    if !skills.is_empty() {
        return skills;
    }

    let heading = Selector::parse("h2, h3, h4").unwrap();
    let badge = Selector::parse("a, span").unwrap();
    for element in root.select(&heading) {
        let text = element_text(element).to_lowercase();
        if !text.contains("skill") && !text.contains("مهارات") {
            continue;
        }
        let Some(container) = element
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| matches!(el.value().name(), "div" | "section" | "ul"))
        else {
            continue;
        };
        for candidate in container.select(&badge) {
            let text = element_text(candidate);
            let lower = text.to_lowercase();
            if text.len() < 2
                || text.len() > 40
                || text.split_whitespace().count() > 6
                || matches!(lower.as_str(), "view" | "view all" | "see more" | "see less")
                || skills.contains(&text)
            {
                continue;
            }
            skills.push(text);
            if skills.len() >= MAX_SKILLS {
                return skills;
            }
        }
        if !skills.is_empty() {
            break;
        }
    }
    skills
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SEARCH_PAGE: &str = r#"
        <html><body>
          <span>Past 24 hours</span>
          <div class="css-pkv5jc">
            <h2><a href="/jobs/p/123-senior-qa-engineer">Senior QA Engineer</a></h2>
            <a href="/jobs/careers/acme-corp">Acme Corp -</a>
            <span>Maadi, Cairo, Egypt</span>
            <span>2 hours ago</span>
          </div>
          <div class="css-pkv5jc">
            <h2><a href="/jobs/p/456-backend-developer">Backend Developer</a></h2>
            <span>Giza, Egypt</span>
            <span>5 hours ago</span>
          </div>
          <div class="css-pkv5jc">
            <h2><span>Promoted listing without a link</span></h2>
            <span>Cairo, Egypt</span>
          </div>
        </body></html>
    "#;

    const UNSTYLED_SEARCH_PAGE: &str = r#"
        <html><body>
          <div class="listing">
            <div class="row">
              <h3><a href="/jobs/p/789-flutter-developer">Flutter Developer</a></h3>
              <span>Nasr City, Cairo, Egypt</span>
              <span>1 hour ago</span>
            </div>
          </div>
        </body></html>
    "#;

    const DETAIL_PAGE: &str = r#"
        <html><body>
          <h2>Job Description</h2>
          <ul>
            <li>Design and execute test plans for our products</li>
            <li>Automate regression suites</li>
          </ul>
          <h2>Job Requirements</h2>
          <ul>
            <li>3+ years in software testing</li>
            <li>Experience with Selenium</li>
          </ul>
          <h4>Skills And Tools</h4>
          <div>
            <a href="/skill/selenium">Selenium</a>
            <a href="/skill/postman">Postman</a>
            <a href="/a/view">View</a>
          </div>
        </body></html>
    "#;

    fn base() -> Url {
        Url::parse("https://wuzzuf.net").unwrap()
    }

    #[test]
    fn search_page_parses_cards_and_counts_unparseable_ones() {
        let extraction = parse_search_page(SEARCH_PAGE, &base(), "QA");

        assert_eq!(extraction.cards_seen, 3);
        assert_eq!(extraction.postings.len(), 2);
        assert_eq!(extraction.skipped.missing_link, 1);

        let first = &extraction.postings[0];
        assert_eq!(first.title, "Senior QA Engineer");
        assert_eq!(first.company.as_deref(), Some("Acme Corp"));
        assert_eq!(first.location, "Maadi, Cairo, Egypt");
        assert_eq!(
            first.link,
            "https://wuzzuf.net/jobs/p/123-senior-qa-engineer"
        );
        assert_eq!(first.posted.as_deref(), Some("2 hours ago"));
        assert_eq!(first.keyword, "QA");
        assert_eq!(first.source, SourceId::Wuzzuf);
    }

    #[test]
    fn card_discovery_falls_back_when_class_names_change() {
        let extraction = parse_search_page(UNSTYLED_SEARCH_PAGE, &base(), "Flutter");

        assert_eq!(extraction.cards_seen, 1);
        assert_eq!(extraction.postings.len(), 1);
        assert_eq!(extraction.postings[0].title, "Flutter Developer");
        assert_eq!(extraction.postings[0].posted.as_deref(), Some("1 hour ago"));
    }

    #[test]
    fn detail_page_fills_description_requirements_and_skills() {
        let mut posting = parse_search_page(SEARCH_PAGE, &base(), "QA")
            .postings
            .remove(0);
        apply_detail_page(&mut posting, DETAIL_PAGE);

        assert!(posting.description.contains("Design and execute test plans"));
        assert_eq!(posting.section_label, SectionLabel::Requirements);
        assert_eq!(posting.requirements.len(), 2);
        assert!(posting.requirements[0].contains("3+ years"));
        assert_eq!(posting.skills, vec!["Selenium", "Postman"]);
    }

    #[test]
    fn detail_page_without_requirements_uses_description_bullets() {
        let mut posting = parse_search_page(SEARCH_PAGE, &base(), "QA")
            .postings
            .remove(0);
        let html = r#"
            <html><body>
              <h2>Job Description</h2>
              <ul><li>Own the testing roadmap</li><li>Mentor junior testers</li></ul>
            </body></html>
        "#;
        apply_detail_page(&mut posting, html);

        assert_eq!(posting.requirements.len(), 2);
        assert!(posting.requirements[0].contains("testing roadmap"));
    }

    #[tokio::test]
    async fn fetch_parses_served_search_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/jobs/"))
            .and(query_param("q", "QA"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SEARCH_PAGE))
            .mount(&server)
            .await;

        let source = WuzzufSource::with_base_url(&server.uri());
        let extraction = source
            .fetch(
                "QA",
                &FetchOptions {
                    limit: 6,
                    enhanced: false,
                },
            )
            .await
            .unwrap();

        assert_eq!(extraction.postings.len(), 2);
        // Links resolve against the adapter's base URL.
        assert!(extraction.postings[0].link.starts_with(&server.uri()));
    }

    #[tokio::test]
    async fn enhanced_fetch_follows_detail_pages() {
        let server = MockServer::start().await;
        let search_page = r#"<html><body><div class="css-pkv5jc">
                 <h2><a href="/jobs/p/123-qa">QA Engineer</a></h2>
                 <span>Cairo, Egypt</span><span>2 hours ago</span>
               </div></body></html>"#;
        Mock::given(method("GET"))
            .and(path("/search/jobs/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(search_page))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/jobs/p/123-qa"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DETAIL_PAGE))
            .mount(&server)
            .await;

        let source = WuzzufSource::with_base_url(&server.uri());
        let extraction = source
            .fetch(
                "QA",
                &FetchOptions {
                    limit: 6,
                    enhanced: true,
                },
            )
            .await
            .unwrap();

        assert_eq!(extraction.postings[0].requirements.len(), 2);
        assert_eq!(extraction.postings[0].skills.len(), 2);
    }

    #[tokio::test]
    async fn robot_block_maps_to_source_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/jobs/"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let source = WuzzufSource::with_base_url(&server.uri());
        let result = source
            .fetch(
                "QA",
                &FetchOptions {
                    limit: 6,
                    enhanced: false,
                },
            )
            .await;

        assert!(matches!(result, Err(SourceError::Unavailable(_))));
    }
}
