pub mod fields;

use std::collections::BTreeMap;

use chrono::Utc;
use once_cell::sync::Lazy;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::models::{ExtractedPage, PageImage, PageLink};

pub use fields::ExtractField;

const DESCRIPTION_CHARS: usize = 200;
const EXCERPT_CHARS: usize = 1000;
const LINK_TEXT_CHARS: usize = 100;
const MAX_LINKS: usize = 10;
const MAX_IMAGES: usize = 5;
const ELLIPSIS: &str = "...";

pub const NO_TITLE: &str = "No title found";
pub const NO_DESCRIPTION: &str = "No description found";

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("title selector"));
static META_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="description"]"#).expect("meta description selector"));
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("p selector"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("a selector"));
static IMAGE: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src]").expect("img selector"));
static META: Lazy<Selector> = Lazy::new(|| Selector::parse("meta").expect("meta selector"));

/// Turns already-fetched markup into an [`ExtractedPage`]. Does no I/O.
pub struct ContentExtractor;

impl ContentExtractor {
    pub fn extract(&self, url: &str, html: &str, extract_fields: &[String]) -> ExtractedPage {
        let document = Html::parse_document(html);
        let base = Url::parse(url).ok();
        let base_netloc = if base.is_some() { netloc(url) } else { String::new() };
        let text = visible_text(&document);

        let specific_fields = if extract_fields.is_empty() {
            None
        } else {
            Some(
                extract_fields
                    .iter()
                    .map(|field| (field.clone(), fields::extract_field(&document, &text, field)))
                    .collect(),
            )
        };

        let page = ExtractedPage {
            url: url.to_string(),
            title: extract_title(&document),
            description: extract_description(&document),
            text_excerpt: excerpt(&text),
            links: extract_links(&document, base.as_ref(), &base_netloc),
            images: extract_images(&document, base.as_ref()),
            metadata: extract_metadata(&document),
            specific_fields,
            extraction_timestamp: Utc::now().to_rfc3339(),
        };

        debug!(
            "Extracted {} links, {} images, {} meta tags from {}",
            page.links.len(),
            page.images.len(),
            page.metadata.len(),
            url
        );
        page
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn truncate_chars(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}

fn extract_title(document: &Html) -> String {
    document
        .select(&TITLE)
        .next()
        .map(element_text)
        .unwrap_or_else(|| NO_TITLE.to_string())
}

fn extract_description(document: &Html) -> String {
    let meta = document
        .select(&META_DESCRIPTION)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(str::trim)
        .filter(|content| !content.is_empty());
    if let Some(content) = meta {
        return content.to_string();
    }

    match document.select(&PARAGRAPH).next() {
        Some(paragraph) => format!("{}{}", truncate_chars(&element_text(paragraph), DESCRIPTION_CHARS), ELLIPSIS),
        None => NO_DESCRIPTION.to_string(),
    }
}

/// Text of every node outside `<script>` and `<style>`, unnormalized.
fn visible_text(document: &Html) -> String {
    let mut text = String::new();
    for node in document.root_element().descendants() {
        if let Some(chunk) = node.value().as_text() {
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .map_or(false, |el| matches!(el.name(), "script" | "style"))
            });
            if !hidden {
                text.push_str(chunk);
            }
        }
    }
    text
}

fn excerpt(text: &str) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.chars().count() > EXCERPT_CHARS {
        format!("{}{}", truncate_chars(&normalized, EXCERPT_CHARS), ELLIPSIS)
    } else {
        normalized
    }
}

fn resolve(base: Option<&Url>, href: &str) -> String {
    let joined = match base {
        Some(base) => base.join(href),
        None => Url::parse(href),
    };
    joined.map(|u| u.to_string()).unwrap_or_else(|_| href.to_string())
}

/// Authority as written, so `acme.test:443` and `acme.test` differ. Parsed
/// `Url`s drop default ports, so this reads the raw string.
fn netloc(url: &str) -> String {
    let url = url.trim();
    let rest = match url.strip_prefix("//").or_else(|| url.split_once("://").map(|(_, rest)| rest)) {
        Some(rest) => rest,
        None => return String::new(),
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    authority.to_lowercase()
}

fn is_absolute(href: &str) -> bool {
    let href = href.trim();
    href.starts_with("//") || Url::parse(href).is_ok()
}

fn extract_links(document: &Html, base: Option<&Url>, base_netloc: &str) -> Vec<PageLink> {

    document
        .select(&ANCHOR)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            let text = element_text(anchor);
            if text.is_empty() {
                return None;
            }
            let url = resolve(base, href);
            // Relative links inherit the base authority.
            let is_external = is_absolute(href) && netloc(href) != base_netloc;
            Some(PageLink {
                is_external,
                url,
                text: truncate_chars(&text, LINK_TEXT_CHARS),
            })
        })
        .take(MAX_LINKS)
        .collect()
}

fn extract_images(document: &Html, base: Option<&Url>) -> Vec<PageImage> {
    document
        .select(&IMAGE)
        .filter_map(|img| {
            let element = img.value();
            let src = element.attr("src")?;
            Some(PageImage {
                url: resolve(base, src),
                alt: element.attr("alt").unwrap_or_default().to_string(),
                width: element.attr("width").map(str::to_string),
                height: element.attr("height").map(str::to_string),
            })
        })
        .take(MAX_IMAGES)
        .collect()
}

fn extract_metadata(document: &Html) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    for meta in document.select(&META) {
        let element = meta.value();
        let name = element
            .attr("name")
            .filter(|n| !n.is_empty())
            .or_else(|| element.attr("property").filter(|p| !p.is_empty()));
        let content = element.attr("content").filter(|c| !c.is_empty());

        if let (Some(name), Some(content)) = (name, content) {
            metadata.insert(name.to_string(), content.to_string());
        }
    }
    metadata
}
