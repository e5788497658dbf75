use scraper::{ElementRef, Html};
use url::Url;

use crate::normalize::resolve;
use crate::parse::{
    create_selector, find_ancestor, find_next, has_class, is_named, normalize_label, raw_text,
};
use crate::{Error, Result};

const PROGRAM_LIST_CLASS: &str = "program-list";

/// A program's display name and its absolute detail page URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramLink {
    pub name: String,
    pub url: Url,
}

/// A way of locating a category's program list. Tried in order until one matches.
type ListStrategy = for<'a> fn(&'a Html, &[String]) -> Result<Option<ElementRef<'a>>>;

const LIST_STRATEGIES: [ListStrategy; 2] = [strong_label_list, any_label_list];

/// Extracts the ordered `(name, url)` pairs listed under `category_label` on the index page.
pub fn extract_program_links(
    index_html: &str,
    category_label: &str,
    base_url: &Url,
) -> Result<Vec<ProgramLink>> {
    let doc = Html::parse_document(index_html);
    let aliases = label_aliases(category_label);

    let mut list = None;
    for strategy in LIST_STRATEGIES {
        list = strategy(&doc, &aliases)?;
        if list.is_some() {
            break;
        }
    }
    let list = list.ok_or_else(|| Error::CategoryNotFound(category_label.to_string()))?;

    let anchor_selector = create_selector("a[href]")?;
    let links = list
        .select(&anchor_selector)
        .filter_map(|a| {
            let name = raw_text(a);
            let url = resolve(base_url, a.value().attr("href")?)?;
            (!name.is_empty()).then_some(ProgramLink { name, url })
        })
        .collect();
    Ok(links)
}

/// The label itself plus its singular or plural form.
fn label_aliases(category_label: &str) -> Vec<String> {
    let label = normalize_label(category_label);
    let alias = match label.strip_suffix('s') {
        Some(singular) => singular.to_string(),
        None => format!("{label}s"),
    };
    vec![label, alias]
}

fn is_program_list(el: ElementRef<'_>) -> bool {
    is_named(el, &["ul"]) && has_class(el, PROGRAM_LIST_CLASS)
}

fn matches_label(el: ElementRef<'_>, aliases: &[String]) -> bool {
    let text = normalize_label(&raw_text(el));
    aliases.iter().any(|alias| *alias == text)
}

/// `<p><strong>Majors</strong></p>` followed by `<ul class="program-list">`.
fn strong_label_list<'a>(doc: &'a Html, aliases: &[String]) -> Result<Option<ElementRef<'a>>> {
    let strong_selector = create_selector("strong")?;
    let found = doc
        .select(&strong_selector)
        .filter(|strong| matches_label(*strong, aliases))
        .filter_map(|strong| find_ancestor(strong, |a| is_named(a, &["p", "div", "td"])))
        .find_map(|block| find_next(doc, block, is_program_list));
    Ok(found)
}

/// Any block whose whole text is the label, followed by a program list.
fn any_label_list<'a>(doc: &'a Html, aliases: &[String]) -> Result<Option<ElementRef<'a>>> {
    let label_selector = create_selector("p, div, span, td")?;
    let found = doc
        .select(&label_selector)
        .filter(|el| matches_label(*el, aliases))
        .find_map(|el| find_next(doc, el, is_program_list));
    Ok(found)
}
