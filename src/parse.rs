use scraper::{ElementRef, Html, Selector};
use tokio::task::spawn_blocking;

use crate::{Error, Result};

/// Runs a markup-parsing closure on the blocking pool.
/// `Html` isn't `Send`, so the document has to be built and dropped inside the closure.
pub(crate) async fn parse_blocking<T, F>(parse: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    spawn_blocking(parse).await?
}

#[inline]
pub(crate) fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseMissingSelector(sel_str.into()))
}

/// Collapses whitespace runs (non-breaking spaces included) into single spaces and trims.
pub(crate) fn clean_text(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercased `clean_text`, used for label and heading comparisons.
pub(crate) fn normalize_label(text: &str) -> String {
    clean_text(text).to_lowercase()
}

/// Visible text of an element with its text nodes concatenated as-is, then whitespace-collapsed.
/// Inline markup like `Computer <em>Science</em>, BS` keeps its original spacing.
pub(crate) fn raw_text(el: ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<String>())
}

/// Visible text of an element, each text node trimmed and joined with a space.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    let joined = el
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    clean_text(&joined)
}

#[inline]
pub(crate) fn has_class(el: ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

#[inline]
pub(crate) fn is_named(el: ElementRef<'_>, names: &[&str]) -> bool {
    names.contains(&el.value().name())
}

/// Nearest ancestor element (excluding `el` itself) that satisfies `pred`.
pub(crate) fn find_ancestor<'a>(
    el: ElementRef<'a>,
    pred: impl Fn(ElementRef<'a>) -> bool,
) -> Option<ElementRef<'a>> {
    el.ancestors().filter_map(ElementRef::wrap).find(|a| pred(*a))
}

/// First element after `anchor` in document order that satisfies `pred`.
/// Like a forward search in the source, this includes the anchor's own descendants.
pub(crate) fn find_next<'a>(
    doc: &'a Html,
    anchor: ElementRef<'a>,
    pred: impl Fn(ElementRef<'a>) -> bool,
) -> Option<ElementRef<'a>> {
    doc.tree
        .root()
        .descendants()
        .skip_while(|node| *node != *anchor)
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|el| pred(*el))
}
