use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

// Patterns and selectors below are literals; parsing them cannot fail.
static EMAIL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b").expect("email regex"),
        Regex::new(r#"mailto:([^"'>\s]+)"#).expect("mailto regex"),
    ]
});

static PHONE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"\+?\d{1,3}[-.\s]?\d{1,3}[-.\s]?\d{1,4}[-.\s]?\d{1,4}[-.\s]?\d{1,9}").expect("phone regex"),
        Regex::new(r#"tel:([^"'>\s]+)"#).expect("tel regex"),
    ]
});

static ADDRESS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![Regex::new(r"\d+\s+[A-Za-z0-9\s,.-]+").expect("address regex")]
});

static EMAIL_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    vec![
        Selector::parse(r#"[href^="mailto:"]"#).expect("mailto selector"),
        Selector::parse("[data-email]").expect("data-email selector"),
    ]
});

static PHONE_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    vec![
        Selector::parse(r#"[href^="tel:"]"#).expect("tel selector"),
        Selector::parse("[data-phone]").expect("data-phone selector"),
    ]
});

static ADDRESS_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    vec![
        Selector::parse("[data-address]").expect("data-address selector"),
        Selector::parse(".address").expect("address class selector"),
    ]
});

/// Fields with dedicated extraction heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractField {
    Email,
    Phone,
    Address,
}

impl ExtractField {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "email" => Some(ExtractField::Email),
            "phone" => Some(ExtractField::Phone),
            "address" => Some(ExtractField::Address),
            _ => None,
        }
    }

    /// Tried in order; the first pattern with any match wins.
    fn patterns(&self) -> &'static [Regex] {
        match self {
            ExtractField::Email => EMAIL_PATTERNS.as_slice(),
            ExtractField::Phone => PHONE_PATTERNS.as_slice(),
            ExtractField::Address => ADDRESS_PATTERNS.as_slice(),
        }
    }

    fn selectors(&self) -> &'static [Selector] {
        match self {
            ExtractField::Email => EMAIL_SELECTORS.as_slice(),
            ExtractField::Phone => PHONE_SELECTORS.as_slice(),
            ExtractField::Address => ADDRESS_SELECTORS.as_slice(),
        }
    }

    fn data_attribute(&self) -> &'static str {
        match self {
            ExtractField::Email => "data-email",
            ExtractField::Phone => "data-phone",
            ExtractField::Address => "data-address",
        }
    }

    fn match_text(&self, text: &str) -> Option<String> {
        self.patterns().iter().find_map(|pattern| {
            pattern.captures(text).map(|caps| {
                caps.get(1)
                    .or_else(|| caps.get(0))
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default()
            })
        })
    }

    fn match_markup(&self, document: &Html) -> Option<String> {
        self.selectors().iter().find_map(|selector| {
            let element = document.select(selector).next()?;

            let text = element.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }

            let href = element
                .value()
                .attr("href")
                .map(|href| href.replace("mailto:", "").replace("tel:", ""))
                .filter(|href| !href.trim().is_empty());
            if href.is_some() {
                return href;
            }

            element
                .value()
                .attr(self.data_attribute())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        })
    }
}

pub fn not_found(field_name: &str) -> String {
    format!("No {} found", field_name)
}

/// Extracts one requested field: regexes over the visible text first, then
/// markup selectors, else the "not found" sentinel.
pub fn extract_field(document: &Html, text: &str, field_name: &str) -> String {
    let field = match ExtractField::from_name(field_name) {
        Some(field) => field,
        None => return not_found(field_name),
    };

    field
        .match_text(text)
        .or_else(|| field.match_markup(document))
        .unwrap_or_else(|| not_found(field_name))
}
