//! HTML reduction: noise removal, container scoring, linearization.
//!
//! The reducer turns a raw listings page into compact text:
//!
//! 1. Noise removal - structural tags (scripts, nav, forms, media) and
//!    elements whose `class`/`id` carries a non-content keyword are
//!    skipped wherever text is read.
//! 2. Container selection - an ordered candidate list (semantic
//!    containers first, `body` last) is scored by keyword density over a
//!    fixed real-estate lexicon; the best node wins, with an early stop
//!    once a non-generic candidate is convincing.
//! 3. Linearization - depth-first text emission with line breaks around
//!    block tags and anchor targets kept in bracket notation.
//!
//! The DOM is read-only (`scraper`), so removal is enforced during the
//! scoring and linearization walks instead of by mutation; the output is
//! the same as delete-then-walk.

use ego_tree::NodeRef;
use scraper::node::{Element, Node};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Structural tags whose subtrees never contribute text.
const REMOVE_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "object", "embed", "svg", "canvas", "video", "audio",
    "nav", "form", "button", "input", "select", "textarea", "img", "picture", "source", "link",
    "meta", "head",
];

/// Non-content keywords matched against `class` and `id` attributes.
const NOISE_KEYWORDS: &[&str] = &[
    "cookie",
    "banner",
    "modal",
    "popup",
    "navbar",
    "menu",
    "navigation",
    "sidebar",
    "advert",
    "social",
    "share",
    "pagination",
    "breadcrumb",
    "sticky",
    "newsletter",
    "subscribe",
    "footer",
];

/// Ordered container candidates: semantic first, generic last.
const CANDIDATE_SELECTORS: &[&str] = &[
    "main",
    "[class*='listing']",
    "[class*='result']",
    "[class*='propert']",
    "[class*='inmueble']",
    "#content",
    "[class*='content']",
    "[class*='container']",
    "article",
    "section",
    "body",
];

/// Last-resort candidates that never trigger the early stop.
const GENERIC_SELECTORS: &[&str] = &["article", "section", "body"];

/// Real-estate keyword lexicon for relevance scoring.
const LEXICON: &[&str] = &[
    "bedroom",
    "bathroom",
    "dormitorio",
    "baño",
    "banos",
    "m²",
    "m2",
    "price",
    "precio",
    "uf ",
    "clp",
    "$",
    "casa",
    "house",
    "departamento",
    "apartment",
    "terreno",
    "propiedad",
    "property",
    "venta",
    "arriendo",
    "sale",
    "rent",
];

/// A non-generic candidate at or above this score wins immediately.
const EARLY_STOP_SCORE: u32 = 10;

/// Tags that get a line break around their content when linearizing.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "li", "ul", "ol", "br", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "table",
    "section", "article", "main", "blockquote", "figcaption", "dt", "dd",
];

/// Whether an element (and its whole subtree) is noise.
fn is_noise(element: &Element) -> bool {
    let name = element.name();
    if REMOVE_TAGS.contains(&name) {
        return true;
    }

    for attr in ["class", "id"] {
        if let Some(value) = element.attr(attr) {
            let lowered = value.to_lowercase();
            if NOISE_KEYWORDS.iter().any(|k| lowered.contains(k)) {
                return true;
            }
        }
    }

    false
}

/// Collect visible text below a node, skipping noise subtrees.
fn collect_text(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => {
            out.push_str(&text.text);
            out.push(' ');
        }
        Node::Element(element) => {
            if is_noise(element) {
                return;
            }
            for child in node.children() {
                collect_text(child, out);
            }
        }
        _ => {}
    }
}

/// Score a candidate container by lexicon keyword density.
///
/// `body`/`html` scores are divided by 3 to discourage picking the
/// whole page over a focused container.
pub fn score_element(element: ElementRef<'_>) -> u32 {
    let mut text = String::new();
    collect_text(*element, &mut text);
    let lowered = text.to_lowercase();

    let raw: u32 = LEXICON
        .iter()
        .map(|k| lowered.matches(k).count() as u32)
        .sum();

    match element.value().name() {
        "body" | "html" => raw / 3,
        _ => raw,
    }
}

/// Pick the listings container: the best-scoring candidate, or `None`
/// when nothing scores at all (caller falls back to the whole document).
pub fn select_container(document: &Html) -> Option<ElementRef<'_>> {
    let mut best: Option<(u32, ElementRef<'_>)> = None;

    for selector_str in CANDIDATE_SELECTORS {
        let selector = Selector::parse(selector_str).expect("static selector");
        let generic = GENERIC_SELECTORS.contains(selector_str);

        for candidate in document.select(&selector) {
            let score = score_element(candidate);
            if score == 0 {
                continue;
            }

            if !generic && score >= EARLY_STOP_SCORE {
                debug!(selector = selector_str, score, "container early stop");
                return Some(candidate);
            }

            if best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
                best = Some((score, candidate));
            }
        }
    }

    best.map(|(score, element)| {
        debug!(score, tag = element.value().name(), "container selected");
        element
    })
}

/// Depth-first linearization of a subtree into plain text.
///
/// Text nodes are emitted verbatim (the parser already decoded
/// entities); block tags get surrounding line breaks; anchor hrefs
/// survive in bracket notation right after the anchor text.
fn linearize(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => out.push_str(&text.text),
        Node::Element(element) => {
            if is_noise(element) {
                return;
            }
            let name = element.name();
            let block = BLOCK_TAGS.contains(&name);

            if block {
                out.push('\n');
            }
            for child in node.children() {
                linearize(child, out);
            }
            if name == "a" {
                if let Some(href) = element.attr("href") {
                    let href = href.trim();
                    if !href.is_empty() && !href.starts_with("javascript:") {
                        out.push_str(&format!(" [{href}]"));
                    }
                }
            }
            if block {
                out.push('\n');
            }
        }
        _ => {}
    }
}

/// Collapse repeated whitespace and blank lines.
fn normalize_whitespace(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut blank_pending = false;

    for line in text.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            blank_pending = !lines.is_empty();
        } else {
            if blank_pending {
                lines.push(String::new());
                blank_pending = false;
            }
            lines.push(collapsed);
        }
    }

    lines.join("\n")
}

/// Reduce a raw HTML document to compact text.
///
/// Selects the listings container (or the whole document when nothing
/// scores), linearizes it, and normalizes whitespace.
pub fn reduce_to_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut out = String::new();
    match select_container(&document) {
        Some(container) => linearize(*container, &mut out),
        None => {
            for child in document.tree.root().children() {
                linearize(child, &mut out);
            }
        }
    }

    normalize_whitespace(&out)
}
