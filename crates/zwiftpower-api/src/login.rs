//! Login-page scraping helpers
//!
//! Pure functions kept out of the client so the HTML document never crosses
//! an await point (`scraper::Html` is not `Send`).

use scraper::{Html, Selector};
use url::Url;

/// Extract the first `<form action="...">` URL from a login page.
///
/// Attribute values come back entity-unescaped from the HTML parser
/// (`&amp;` → `&`).
pub(crate) fn extract_form_action(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("form[action]").ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|form| form.value().attr("action"))
        .map(str::to_string)
}

/// Resolve a `Location` header value against the portal origin.
///
/// Absolute URLs pass through; anything else is treated as a path relative
/// to `base`.
pub(crate) fn resolve_location(base: &str, location: &str) -> String {
    if Url::parse(location).is_ok() {
        location.to_string()
    } else {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            location.trim_start_matches('/')
        )
    }
}

/// Whether a response body that should have been JSON is an HTML page
/// (the portal serves its login page with a 200 when the session lapses).
pub(crate) fn looks_like_html(body: &str) -> bool {
    body.trim_start().starts_with('<')
}
