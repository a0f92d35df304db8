//! Pure posting filters: keyword relevance, locale eligibility, recency
//!
//! The three predicates run in a fixed order and short-circuit; each failure
//! maps to a distinct [`SkipReason`] so run statistics stay conservative.

use crate::model::{RawPosting, SkipReason};

/// A search keyword and its lexical variants ("qa" ≡ "quality assurance")
#[derive(Debug, Clone)]
pub struct KeywordEntry {
    pub keyword: String,
    pub variants: Vec<String>,
}

impl KeywordEntry {
    pub fn new(keyword: impl Into<String>, variants: &[&str]) -> Self {
        let keyword = keyword.into();
        let mut variants: Vec<String> = variants.iter().map(|v| v.to_lowercase()).collect();
        let lower = keyword.to_lowercase();
        if !variants.contains(&lower) {
            variants.insert(0, lower);
        }
        Self { keyword, variants }
    }
}

/// The configured keyword list; doubles as the set of search queries
#[derive(Debug, Clone)]
pub struct KeywordTable {
    entries: Vec<KeywordEntry>,
}

impl KeywordTable {
    pub fn new(entries: Vec<KeywordEntry>) -> Self {
        Self { entries }
    }

    /// Keyword table mirroring the default deployment
    pub fn default_table() -> Self {
        Self::new(vec![
            KeywordEntry::new("Flutter", &["flutter developer", "dart developer"]),
            KeywordEntry::new(
                "Backend",
                &["back-end", "back end", "backend engineer", "server side"],
            ),
            KeywordEntry::new(
                "Frontend",
                &["front-end", "front end", "frontend developer", "ui developer"],
            ),
            KeywordEntry::new(
                "Data Analyst",
                &["data analysis", "business analyst", "system analyst"],
            ),
            KeywordEntry::new("Data Engineer", &["etl developer", "big data engineer"]),
            KeywordEntry::new("Data Scientist", &["data science", "ml engineer"]),
            KeywordEntry::new(
                "UI/UX",
                &["ux/ui", "user experience", "user interface", "product designer"],
            ),
            KeywordEntry::new(
                "QA",
                &[
                    "tester",
                    "quality assurance",
                    "quality control",
                    "test engineer",
                    "sqa",
                ],
            ),
            KeywordEntry::new("DevOps", &["dev ops", "site reliability", "sre"]),
            KeywordEntry::new("Full Stack", &["full-stack", "fullstack"]),
            KeywordEntry::new(
                "Mobile Developer",
                &["ios developer", "android developer", "app developer"],
            ),
            KeywordEntry::new(
                "Cloud Engineer",
                &["aws engineer", "azure engineer", "gcp engineer"],
            ),
            KeywordEntry::new(
                "Software Engineer",
                &["software developer", "programmer", "developer"],
            ),
            KeywordEntry::new("Python", &["django", "flask", "fastapi"]),
            KeywordEntry::new("Java", &["spring boot", "java developer"]),
            KeywordEntry::new("JavaScript", &["typescript", "node.js", "nodejs", "react"]),
            KeywordEntry::new(".NET", &["dotnet", "c#", "asp.net"]),
            KeywordEntry::new("PHP", &["laravel", "symfony", "wordpress"]),
            KeywordEntry::new(
                "Cyber Security",
                &["cybersecurity", "information security", "security engineer"],
            ),
            KeywordEntry::new("Machine Learning", &["deep learning", "ai engineer"]),
            KeywordEntry::new("Product Manager", &["product owner", "product management"]),
            KeywordEntry::new(
                "Network Engineer",
                &["network administrator", "ccna", "ccnp"],
            ),
        ])
    }

    /// Search queries, in configured order
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.keyword.as_str())
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = KeywordEntry>) {
        self.entries.extend(entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive substring match of any variant against the title
    pub fn matches(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        self.entries
            .iter()
            .flat_map(|e| e.variants.iter())
            .any(|variant| title.contains(variant.as_str()))
    }
}

/// Target region and its known localities
#[derive(Debug, Clone)]
pub struct LocaleRule {
    pub region: String,
    pub localities: Vec<String>,
}

impl LocaleRule {
    pub fn new(region: impl Into<String>, localities: Vec<String>) -> Self {
        Self {
            region: region.into(),
            localities,
        }
    }

    /// Egypt with its major cities and tech districts
    pub fn egypt() -> Self {
        Self::new(
            "Egypt",
            [
                "Cairo",
                "Alexandria",
                "Giza",
                "Port Said",
                "Suez",
                "Luxor",
                "Mansoura",
                "Tanta",
                "Asyut",
                "Ismailia",
                "Zagazig",
                "Aswan",
                "Damietta",
                "Minya",
                "Hurghada",
                "6th of October",
                "Nasr City",
                "Heliopolis",
                "Maadi",
                "New Cairo",
                "Sheikh Zayed",
                "10th of Ramadan",
                "Obour",
                "مصر",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        )
    }

    /// Whether a location references the region by name or a known locality
    pub fn matches(&self, location: &str) -> bool {
        let location_lower = location.to_lowercase();
        if location_lower.contains(&self.region.to_lowercase()) {
            return true;
        }
        self.localities
            .iter()
            .any(|city| location_lower.contains(&city.to_lowercase()))
    }

    /// Append the region name when the location only names a locality
    pub fn normalize(&self, location: &str) -> String {
        let location_lower = location.to_lowercase();
        if location_lower.contains(&self.region.to_lowercase()) {
            location.to_string()
        } else {
            format!("{}, {}", location.trim(), self.region)
        }
    }
}

/// Classification of a posting's recency marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recency {
    /// Posted within roughly the last day
    Fresh,
    /// Carries a multi-day / week / month marker
    Stale,
    /// No recognizable marker; treated as not recent (fail-closed)
    Unknown,
}

const STALE_MARKERS: &[&str] = &["days ago", "week", "month", "أيام", "أسبوع", "شهر"];

const FRESH_MARKERS: &[&str] = &[
    "just now",
    "just posted",
    "minute",
    "hour",
    "today",
    "1 day ago",
    "a day ago",
    "ساعة",
    "ساعات",
    "اليوم",
    "دقيقة",
    "دقائق",
];

/// Classify a raw recency marker.
///
/// Stale markers win over fresh ones, and an absent or unrecognized marker
/// is Unknown: when the marker format changes upstream we stop publishing
/// rather than risk republishing stale postings.
pub fn classify_recency(marker: Option<&str>) -> Recency {
    let Some(marker) = marker else {
        return Recency::Unknown;
    };
    let marker = marker.to_lowercase();
    if marker.is_empty() {
        return Recency::Unknown;
    }
    if STALE_MARKERS.iter().any(|m| marker.contains(m)) {
        return Recency::Stale;
    }
    if FRESH_MARKERS.iter().any(|m| marker.contains(m)) {
        return Recency::Fresh;
    }
    Recency::Unknown
}

/// Outcome of running all three predicates over a posting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVerdict {
    Accepted,
    Rejected(SkipReason),
}

/// The composed filter applied to every extracted posting
#[derive(Debug, Clone)]
pub struct PostingFilter {
    pub keywords: KeywordTable,
    pub locale: LocaleRule,
}

impl PostingFilter {
    pub fn new(keywords: KeywordTable, locale: LocaleRule) -> Self {
        Self { keywords, locale }
    }

    /// Apply keyword, locale, and recency checks in order, short-circuiting
    pub fn check(&self, posting: &RawPosting) -> FilterVerdict {
        if !self.keywords.matches(&posting.title) {
            return FilterVerdict::Rejected(SkipReason::NoKeywordMatch);
        }
        if !self.locale.matches(&posting.location) {
            return FilterVerdict::Rejected(SkipReason::WrongLocale);
        }
        if classify_recency(posting.posted.as_deref()) != Recency::Fresh {
            return FilterVerdict::Rejected(SkipReason::NotRecent);
        }
        FilterVerdict::Accepted
    }
}
