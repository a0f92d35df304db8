//! Section extraction shared by the source adapters
//!
//! Listing sites restructure their markup constantly, so nothing here keys
//! off a single class name. Each field is an ordered strategy chain over the
//! parsed document; the first strategy that yields content wins.

use jobcast_domain::SectionLabel;
use scraper::{ElementRef, Selector};

/// A bulleted section found on a detail page
#[derive(Debug, Clone)]
pub(crate) struct BulletedSection {
    pub label: SectionLabel,
    pub items: Vec<String>,
}

const MAX_ITEMS: usize = 10;
const MAX_SIBLING_HOPS: usize = 6;

/// Find the best requirements-like section under `root`.
///
/// Headings are classified by priority (Requirements/Qualifications >
/// Skills/Experience > Responsibilities/Duties) and the list following the
/// best-classified heading is taken. A Requirements match wins outright.
pub(crate) fn extract_bulleted_section(root: ElementRef<'_>) -> Option<BulletedSection> {
    let heading_selector = Selector::parse("h1, h2, h3, h4, h5, b, strong").unwrap();

    let mut best: Option<(u8, BulletedSection)> = None;
    for heading in root.select(&heading_selector) {
        let text = element_text(heading);
        let Some((label, priority)) = classify_heading(&text) else {
            continue;
        };
        if best.as_ref().is_some_and(|(found, _)| *found >= priority) {
            continue;
        }
        let Some(list) = following_list(heading) else {
            continue;
        };
        let items = list_items(list);
        if items.is_empty() {
            continue;
        }
        let is_top = priority == 3;
        best = Some((priority, BulletedSection { label, items }));
        if is_top {
            break;
        }
    }

    best.map(|(_, section)| section)
}

fn classify_heading(text: &str) -> Option<(SectionLabel, u8)> {
    let text = text.to_lowercase();
    let requirements = ["requirement", "qualification", "متطلبات", "مؤهلات"];
    let skills = ["skill", "experience", "مهارات", "خبرة"];
    let responsibilities = ["responsibilit", "duties", "مسؤوليات", "واجبات"];

    if requirements.iter().any(|k| text.contains(k))
        && !responsibilities.iter().any(|k| text.contains(k))
    {
        return Some((SectionLabel::Requirements, 3));
    }
    if skills.iter().any(|k| text.contains(k)) {
        return Some((SectionLabel::Skills, 2));
    }
    if responsibilities.iter().any(|k| text.contains(k)) {
        return Some((SectionLabel::Responsibilities, 1));
    }
    None
}

/// Items of the list following a heading matching `needle`, e.g. the
/// "Job Description" bullets on a detail page.
pub(crate) fn items_after_heading(root: ElementRef<'_>, needle: &str) -> Vec<String> {
    let heading_selector = Selector::parse("h1, h2, h3, h4, h5, b, strong").unwrap();
    for heading in root.select(&heading_selector) {
        if !element_text(heading).to_lowercase().contains(needle) {
            continue;
        }
        if let Some(list) = following_list(heading) {
            let items = list_items(list);
            if !items.is_empty() {
                return items;
            }
        }
    }
    Vec::new()
}

/// Walk forward from a heading to the list it introduces.
///
/// Checks the heading's own siblings first, then (for `<b>` wrapped in a
/// paragraph) the wrapper's siblings. Stops at the next section heading.
fn following_list<'a>(heading: ElementRef<'a>) -> Option<ElementRef<'a>> {
    let list_selector = Selector::parse("ul, ol").unwrap();
    let bold_selector = Selector::parse("b, strong").unwrap();

    let mut starts = vec![heading];
    if let Some(parent) = heading.parent().and_then(ElementRef::wrap) {
        if parent.value().name() == "p" {
            starts.push(parent);
        }
    }

    for start in starts {
        let mut hops = 0;
        for node in start.next_siblings() {
            let Some(element) = ElementRef::wrap(node) else {
                continue;
            };
            hops += 1;
            if hops > MAX_SIBLING_HOPS {
                break;
            }
            match element.value().name() {
                "ul" | "ol" => return Some(element),
                "div" | "section" => {
                    if let Some(list) = element.select(&list_selector).next() {
                        return Some(list);
                    }
                }
                "h1" | "h2" | "h3" | "h4" | "h5" | "b" | "strong" => break,
                "p" => {
                    // A paragraph opening another bold heading ends this
                    // section.
                    if element.select(&bold_selector).next().is_some() {
                        break;
                    }
                }
                _ => {}
            }
        }
    }
    None
}

fn list_items(list: ElementRef<'_>) -> Vec<String> {
    let item_selector = Selector::parse("li").unwrap();
    list.select(&item_selector)
        .map(element_text)
        .filter(|text| text.len() > 3)
        .take(MAX_ITEMS)
        .collect()
}

/// A card's recency marker ("2 hours ago", "Today"), if one is shown
pub(crate) fn find_time_marker(card: ElementRef<'_>) -> Option<String> {
    const TIME_HINTS: &[&str] = &[
        "ago",
        "today",
        "just now",
        "just posted",
        "ساعة",
        "اليوم",
        "دقيقة",
    ];

    let candidate_selector = Selector::parse("time, span, div, p").unwrap();
    for element in card.select(&candidate_selector) {
        let text = element_text(element);
        if text.is_empty() || text.len() > 60 {
            continue;
        }
        let lower = text.to_lowercase();
        // Search-filter chrome, not a posting timestamp.
        if lower.contains("past 24 hours") || lower.contains("filter") {
            continue;
        }
        if TIME_HINTS.iter().any(|hint| lower.contains(hint)) {
            return Some(text);
        }
    }
    None
}

/// Element text with whitespace collapsed
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    collapse_ws(&element.text().collect::<String>())
}

pub(crate) fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
