use scraper::{ElementRef, Html};
use serde::Serialize;
use url::Url;

use crate::normalize::{course_url_from_inline_call, has_inline_course_call, resolve};
use crate::parse::{
    create_selector, element_text, find_ancestor, has_class, is_named, normalize_label,
};
use crate::{Result, STOP_HEADING_PREFIX};

const CONTENT_ANCHOR_SELECTOR: &str = "#acalog-content";
const CONTENT_CELL_CLASS: &str = "block_content";
/// Tried in order when the content anchor can't be climbed from.
const CONTAINER_FALLBACKS: [&str; 3] = ["td.block_content", "div#content", "body"];
const COURSE_ITEM_CLASS: &str = "acalog-course";
const DEFAULT_SECTION_TITLE: &str = "Overview";
const DEFAULT_SECTION_LEVEL: u8 = 2;

/// A titled block of a program page, nested under shallower headings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub title: String,
    pub level: u8,
    pub paragraphs: Vec<String>,
    pub lists: Vec<Vec<ListItem>>,
    pub subsections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListItem {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// Turns a program page into a forest of sections.
///
/// Walks headings (`h2`-`h6`), paragraphs and lists of the page's content container in
/// document order. The walk ends for good at the first heading starting with the
/// four-year degree plan marker; that heading and everything after it are dropped.
pub fn build_sections(page_html: &str, page_url: &Url) -> Result<Vec<Section>> {
    let doc = Html::parse_document(page_html);
    let container = content_container(&doc)?;

    let mut tree = SectionTree::default();
    // `descendants` starts with the container itself, which is never walked.
    for el in container.descendants().skip(1).filter_map(ElementRef::wrap) {
        match el.value().name() {
            name @ ("h2" | "h3" | "h4" | "h5" | "h6") => {
                let title = element_text(el);
                if title.is_empty() {
                    continue;
                }
                if normalize_label(&title).starts_with(STOP_HEADING_PREFIX) {
                    break;
                }
                let level = name[1..].parse().unwrap_or(DEFAULT_SECTION_LEVEL);
                tree.open(title, level);
            }
            "p" => {
                let text = element_text(el);
                let section = tree.current();
                if !text.is_empty() {
                    section.paragraphs.push(text);
                }
            }
            "ul" | "ol" => {
                let items = list_items(el, page_url);
                let section = tree.current();
                if !items.is_empty() {
                    section.lists.push(items);
                }
            }
            _ => {}
        }
    }

    Ok(tree.into_forest())
}

/// Narrowest element holding the program content, without navigation and header chrome.
fn content_container(doc: &Html) -> Result<ElementRef<'_>> {
    // The anchor id usually sits on the program title, not on a wrapper.
    let anchor_selector = create_selector(CONTENT_ANCHOR_SELECTOR)?;
    if let Some(anchor) = doc.select(&anchor_selector).next() {
        let cell = find_ancestor(anchor, |a| {
            is_named(a, &["td"]) && has_class(a, CONTENT_CELL_CLASS)
        });
        if let Some(container) = cell.or_else(|| anchor.parent().and_then(ElementRef::wrap)) {
            return Ok(container);
        }
    }

    for sel_str in CONTAINER_FALLBACKS {
        let selector = create_selector(sel_str)?;
        if let Some(container) = doc.select(&selector).next() {
            return Ok(container);
        }
    }
    Ok(doc.root_element())
}

/// Direct `<li>` children of a list. Items without text are dropped.
fn list_items(list: ElementRef<'_>, page_url: &Url) -> Vec<ListItem> {
    list.children()
        .filter_map(ElementRef::wrap)
        .filter(|child| is_named(*child, &["li"]))
        .filter_map(|li| {
            let text = element_text(li);
            if text.is_empty() {
                return None;
            }
            let href = li
                .descendants()
                .filter_map(ElementRef::wrap)
                .find(|a| is_named(*a, &["a"]) && a.value().attr("href").is_some())
                .and_then(|a| item_href(li, a, page_url));
            Some(ListItem { text, href })
        })
        .collect()
}

/// Course entries usually carry `href="#"` plus a `showCourse(...)` onclick,
/// everything else is a plain link.
fn item_href(li: ElementRef<'_>, a: ElementRef<'_>, page_url: &Url) -> Option<String> {
    let onclick = a.value().attr("onclick");
    let is_course =
        has_class(li, COURSE_ITEM_CLASS) || onclick.is_some_and(has_inline_course_call);
    let url = if is_course {
        course_url_from_inline_call(onclick?)
    } else {
        resolve(page_url, a.value().attr("href")?)
    };
    url.map(String::from)
}

/// A section without its children, which are kept as indexes into the arena.
#[derive(Debug)]
struct Node {
    title: String,
    level: u8,
    paragraphs: Vec<String>,
    lists: Vec<Vec<ListItem>>,
    children: Vec<usize>,
}

/// Arena of sections plus the stack of currently open `(level, node)` pairs.
#[derive(Debug, Default)]
struct SectionTree {
    nodes: Vec<Node>,
    roots: Vec<usize>,
    stack: Vec<(u8, usize)>,
}

impl SectionTree {
    /// Closes every open section at the same or a deeper level, then opens a new one
    /// under whatever is left on top of the stack.
    fn open(&mut self, title: String, level: u8) -> usize {
        while self.stack.last().is_some_and(|(top, _)| *top >= level) {
            self.stack.pop();
        }

        let idx = self.nodes.len();
        self.nodes.push(Node {
            title,
            level,
            paragraphs: Vec::new(),
            lists: Vec::new(),
            children: Vec::new(),
        });
        match self.stack.last() {
            Some(&(_, parent)) => self.nodes[parent].children.push(idx),
            None => self.roots.push(idx),
        }
        self.stack.push((level, idx));
        idx
    }

    /// Innermost open section. Content before the first heading gets an "Overview" section.
    fn current(&mut self) -> &mut Node {
        let idx = match self.stack.last() {
            Some(&(_, idx)) => idx,
            None => self.open(DEFAULT_SECTION_TITLE.to_string(), DEFAULT_SECTION_LEVEL),
        };
        &mut self.nodes[idx]
    }

    fn into_forest(self) -> Vec<Section> {
        let mut nodes: Vec<Option<Node>> = self.nodes.into_iter().map(Some).collect();
        self.roots
            .iter()
            .filter_map(|&idx| take_section(&mut nodes, idx))
            .collect()
    }
}

fn take_section(nodes: &mut [Option<Node>], idx: usize) -> Option<Section> {
    let node = nodes.get_mut(idx)?.take()?;
    let subsections = node
        .children
        .iter()
        .filter_map(|&child| take_section(nodes, child))
        .collect();
    Some(Section {
        title: node.title,
        level: node.level,
        paragraphs: node.paragraphs,
        lists: node.lists,
        subsections,
    })
}
