use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::{COURSE_URL_BASE, PROGRAM_ID_PARAM, TRACKING_QUERY_PARAM};

static COURSE_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)showCourse\(\s*['"](?P<catoid>\d+)['"]\s*,\s*['"](?P<coid>\d+)['"]"#)
        .unwrap()
});

/// Resolves `href` against `base` and drops the tracking query parameter.
/// Returns `None` for empty hrefs and the bare `#` placeholder.
pub fn resolve(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href == "#" {
        return None;
    }
    let joined = base.join(href).ok()?;
    Some(strip_query_param(joined, TRACKING_QUERY_PARAM))
}

/// Removes every `name=...` pair from the query string.
///
/// The URL is returned untouched when the parameter isn't present. Otherwise the
/// remaining pairs are re-encoded with values grouped under their key, keys in
/// order of first appearance.
pub fn strip_query_param(mut url: Url, name: &str) -> Url {
    if !url.query_pairs().any(|(key, _)| key == name) {
        return url;
    }

    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for (key, value) in url.query_pairs() {
        if key == name {
            continue;
        }
        match grouped.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value.into_owned()),
            None => grouped.push((key.into_owned(), vec![value.into_owned()])),
        }
    }

    if grouped.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(
            grouped
                .iter()
                .flat_map(|(key, values)| values.iter().map(move |v| (key.as_str(), v.as_str()))),
        );
    }
    url
}

/// Builds a course detail URL out of a `showCourse('<catoid>', '<coid>', ...)` call.
/// Both ids are required.
pub fn course_url_from_inline_call(call_text: &str) -> Option<Url> {
    let caps = COURSE_CALL_RE.captures(call_text)?;
    let mut url = Url::parse(COURSE_URL_BASE).ok()?;
    url.query_pairs_mut()
        .append_pair("catoid", &caps["catoid"])
        .append_pair("coid", &caps["coid"]);
    Some(url)
}

/// True when an attribute looks like it holds a course call.
pub(crate) fn has_inline_course_call(attr: &str) -> bool {
    attr.to_ascii_lowercase().contains("showcourse(")
}

/// Stable disambiguator like `(18528)` taken from the program id in the query string.
pub fn program_id_suffix(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == PROGRAM_ID_PARAM)
        .map(|(_, poid)| poid.into_owned())
        .filter(|poid| !poid.is_empty())
        .map(|poid| format!("({poid})"))
}
