//! Text helpers shared by the listing and detail extractors.

use scraper::{ElementRef, Node};

/// Elements whose boundaries become line breaks in [`cell_text`].
const BLOCK_ELEMENTS: &[&str] = &["br", "p", "div", "li", "tr", "dd", "dt"];

/// Collapse every whitespace run to a single space and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// All text under an element, whitespace-collapsed.
///
/// Text nodes are concatenated as-is, so inline markup inside a word adds no space.
pub fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

/// Text under a table cell with line structure kept.
///
/// `<br>` and block elements start a new line; each line is collapsed on its
/// own and blank lines are dropped.
pub fn cell_text(el: ElementRef<'_>) -> String {
    let mut raw = String::new();
    for node in el.descendants().skip(1) {
        match node.value() {
            // Source newlines are layout noise, not line breaks.
            Node::Text(text) => {
                raw.extend(text.chars().map(|c| if c.is_whitespace() { ' ' } else { c }))
            }
            Node::Element(e) if BLOCK_ELEMENTS.contains(&e.name()) => raw.push('\n'),
            _ => {}
        }
    }
    raw.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
