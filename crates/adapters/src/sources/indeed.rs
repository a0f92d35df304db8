//! Indeed search extractor
//!
//! Indeed serves stable `data-*` hooks on its cards, so the strategy chains
//! here lean on those before falling back to tag structure. Detail pages put
//! everything inside one description container with `<b>` section headings.

use async_trait::async_trait;
use jobcast_domain::{
    Extraction, FetchOptions, JobSource, RawPosting, SectionLabel, SourceError, SourceId,
};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use url::Url;

use super::sections::{element_text, extract_bulleted_section, find_time_marker};

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const MAX_DESCRIPTION_CHARS: usize = 500;

/// Extractor for eg.indeed.com search results
pub struct IndeedSource {
    client: Client,
    base_url: Url,
}

impl IndeedSource {
    pub fn new() -> Self {
        Self::with_base_url("https://eg.indeed.com")
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
            .join("/jobs")
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("q", keyword)
            .append_pair("l", "Egypt")
            .append_pair("fromage", "1");
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

impl Default for IndeedSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobSource for IndeedSource {
    async fn fetch(
        &self,
        query: &str,
        options: &FetchOptions,
    ) -> Result<Extraction, SourceError> {
        let url = self.search_url(query)?;
        let html = self.get_text(url.as_str()).await?;
        let mut extraction = parse_search_page(&html, &self.base_url, query);

        if options.enhanced {
            for posting in extraction.postings.iter_mut().take(options.limit) {
                match self.get_text(&posting.link).await {
                    Ok(detail_html) => apply_detail_page(posting, &detail_html),
                    Err(error) => {
                        tracing::debug!(
                            link = %posting.link,
                            %error,
                            "Detail page fetch failed, keeping card snippet"
                        );
                    }
                }
            }
        }

        Ok(extraction)
    }

    fn id(&self) -> SourceId {
        SourceId::Indeed
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

fn find_cards(document: &Html) -> Vec<ElementRef<'_>> {
    let beacon = Selector::parse("div.job_seen_beacon").unwrap();
    let cards: Vec<_> = document.select(&beacon).collect();
    if !cards.is_empty() {
        return cards;
    }

    let keyed = Selector::parse("div[data-jk]").unwrap();
    document.select(&keyed).collect()
}

fn parse_card(
    card: ElementRef<'_>,
    base_url: &Url,
    keyword: &str,
) -> Result<RawPosting, CardError> {
    let keyed_link = Selector::parse("a[data-jk]").unwrap();

    let job_key = card
        .select(&keyed_link)
        .next()
        .and_then(|el| el.value().attr("data-jk"))
        .or_else(|| card.value().attr("data-jk"))
        .unwrap_or_default();
    if job_key.is_empty() {
        return Err(CardError::MissingLink);
    }
    let mut link = base_url
        .join("/viewjob")
        .map_err(|_| CardError::Unparseable)?;
    link.query_pairs_mut().append_pair("jk", job_key);
    let link = link.to_string();

    let title_heading = Selector::parse("h2.jobTitle").unwrap();
    let title = card
        .select(&title_heading)
        .next()
        .map(element_text)
        .or_else(|| card.select(&keyed_link).next().map(element_text))
        .unwrap_or_default();
    if title.is_empty() {
        return Err(CardError::MissingTitle);
    }

    let company_span = Selector::parse("span[data-testid='company-name']").unwrap();
    let company = card
        .select(&company_span)
        .next()
        .map(element_text)
        .filter(|name| !name.is_empty());

    let location_div = Selector::parse("div[data-testid='text-location']").unwrap();
    let location = card
        .select(&location_div)
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| "Egypt".to_string());

    let snippet = Selector::parse("div.job-snippet, div[data-testid='job-snippet']").unwrap();
    let description = card.select(&snippet).next().map(element_text).unwrap_or_default();

    Ok(RawPosting {
        title,
        company,
        location,
        description,
        requirements: Vec::new(),
        section_label: SectionLabel::Requirements,
        skills: Vec::new(),
        link,
        source: SourceId::Indeed,
        keyword: keyword.to_string(),
        posted: find_time_marker(card),
    })
}

/// Fold the detail page's description container into a card posting
fn apply_detail_page(posting: &mut RawPosting, html: &str) {
    let document = Html::parse_document(html);
    let container = Selector::parse("#jobDescriptionText, div[class*='jobDescriptionText']")
        .unwrap();

    let Some(description_root) = document.select(&container).next() else {
        return;
    };

    let full_text = element_text(description_root);
    if !full_text.is_empty() {
        posting.description = truncate_chars(&full_text, MAX_DESCRIPTION_CHARS);
    }

    if let Some(section) = extract_bulleted_section(description_root) {
        posting.section_label = section.label;
        posting.requirements = section.items;
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SEARCH_PAGE: &str = r#"
        <html><body>
          <div class="job_seen_beacon">
            <h2 class="jobTitle"><a data-jk="abc123">DevOps Engineer</a></h2>
            <span data-testid="company-name">Cloudy Ltd</span>
            <div data-testid="text-location">Cairo</div>
            <div class="job-snippet">Automate infrastructure pipelines.</div>
            <span class="date">Just posted</span>
          </div>
          <div class="job_seen_beacon">
            <h2 class="jobTitle"><a data-jk="">Sponsored thing</a></h2>
          </div>
        </body></html>
    "#;

    const DETAIL_PAGE: &str = r#"
        <html><body>
          <div id="jobDescriptionText">
            <p>We run a large Kubernetes estate.</p>
            <p><b>Requirements</b></p>
            <ul>
              <li>Terraform in production</li>
              <li>CI/CD ownership</li>
            </ul>
            <p><b>Responsibilities</b></p>
            <ul><li>On-call rotation</li></ul>
          </div>
        </body></html>
    "#;

    fn base() -> Url {
        Url::parse("https://eg.indeed.com").unwrap()
    }

    #[test]
    fn search_page_parses_cards_with_data_hooks() {
        let extraction = parse_search_page(SEARCH_PAGE, &base(), "DevOps");

        assert_eq!(extraction.cards_seen, 2);
        assert_eq!(extraction.postings.len(), 1);
        assert_eq!(extraction.skipped.missing_link, 1);

        let posting = &extraction.postings[0];
        assert_eq!(posting.title, "DevOps Engineer");
        assert_eq!(posting.company.as_deref(), Some("Cloudy Ltd"));
        assert_eq!(posting.location, "Cairo");
        assert_eq!(posting.link, "https://eg.indeed.com/viewjob?jk=abc123");
        assert_eq!(posting.posted.as_deref(), Some("Just posted"));
        assert_eq!(posting.description, "Automate infrastructure pipelines.");
        assert_eq!(posting.source, SourceId::Indeed);
    }

    #[test]
    fn fallback_card_discovery_uses_data_jk_divs() {
        let html = r#"
            <html><body>
              <div data-jk="xyz789">
                <a data-jk="xyz789">QA Analyst</a>
                <div data-testid="text-location">Giza, Egypt</div>
              </div>
            </body></html>
        "#;
        let extraction = parse_search_page(html, &base(), "QA");
        assert_eq!(extraction.postings.len(), 1);
        assert_eq!(extraction.postings[0].title, "QA Analyst");
    }

    #[test]
    fn detail_page_prefers_requirements_over_responsibilities() {
        let mut posting = parse_search_page(SEARCH_PAGE, &base(), "DevOps")
            .postings
            .remove(0);
        apply_detail_page(&mut posting, DETAIL_PAGE);

        assert_eq!(posting.section_label, SectionLabel::Requirements);
        assert_eq!(
            posting.requirements,
            vec!["Terraform in production", "CI/CD ownership"]
        );
        assert!(posting.description.contains("Kubernetes estate"));
    }

    #[test]
    fn detail_page_without_container_keeps_card_snippet() {
        let mut posting = parse_search_page(SEARCH_PAGE, &base(), "DevOps")
            .postings
            .remove(0);
        apply_detail_page(&mut posting, "<html><body><p>nothing here</p></body></html>");

        assert_eq!(posting.description, "Automate infrastructure pipelines.");
        assert!(posting.requirements.is_empty());
    }

    #[tokio::test]
    async fn fetch_queries_the_search_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs"))
            .and(query_param("q", "DevOps"))
            .and(query_param("fromage", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SEARCH_PAGE))
            .mount(&server)
            .await;

        let source = IndeedSource::with_base_url(&server.uri());
        let extraction = source
            .fetch(
                "DevOps",
                &FetchOptions {
                    limit: 6,
                    enhanced: false,
                },
            )
            .await
            .unwrap();

        assert_eq!(extraction.postings.len(), 1);
    }

    #[tokio::test]
    async fn network_failure_maps_to_unavailable() {
        // Nothing listens on this port.
        let source = IndeedSource::with_base_url("http://127.0.0.1:9");
        let result = source
            .fetch(
                "DevOps",
                &FetchOptions {
                    limit: 6,
                    enhanced: false,
                },
            )
            .await;

        assert!(matches!(result, Err(SourceError::Unavailable(_))));
    }
}
