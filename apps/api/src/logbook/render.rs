//! Note body rendering: markdown to HTML, and HTML to searchable plain text.

use std::sync::LazyLock;

use pulldown_cmark::{html, CowStr, Event, LinkType, Options, Parser, Tag};
use regex::Regex;

static LEADING_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*<[A-Za-z!/]").expect("valid regex"));

static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

static ANCHOR_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<a(\s[^>]*)?>").expect("valid regex"));

static TARGET_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s+(?:target|rel)\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#).expect("valid regex")
});

const NEW_TAB: &str = r#"target="_blank" rel="noopener noreferrer""#;

pub fn looks_like_html(text: &str) -> bool {
    LEADING_TAG.is_match(text)
}

/// Renders a stored body for display. Bodies that already start with a tag
/// are passed through untouched; everything else is treated as markdown and
/// every link is made to open in a new tab.
pub fn render_body(text: &str) -> String {
    if looks_like_html(text) {
        return text.to_string();
    }

    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    let events = Parser::new_ext(text, options).map(|event| match event {
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            ..
        }) => Event::InlineHtml(CowStr::from(link_open(link_type, &dest_url, &title))),
        Event::Html(raw) => Event::Html(CowStr::from(open_in_new_tab(&raw))),
        Event::InlineHtml(raw) => Event::InlineHtml(CowStr::from(open_in_new_tab(&raw))),
        other => other,
    });

    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

fn link_open(link_type: LinkType, dest: &str, title: &str) -> String {
    let scheme = if link_type == LinkType::Email { "mailto:" } else { "" };
    let mut tag = format!(r#"<a href="{scheme}{}""#, escape_attr(dest));
    if !title.is_empty() {
        tag.push_str(&format!(r#" title="{}""#, escape_attr(title)));
    }
    tag.push_str(&format!(" {NEW_TAB}>"));
    tag
}

/// Rewrites every `<a ...>` opening tag in a raw HTML fragment so that it
/// carries our target and rel, replacing any it already had.
fn open_in_new_tab(fragment: &str) -> String {
    ANCHOR_OPEN
        .replace_all(fragment, |caps: &regex::Captures| {
            let attrs = caps.get(1).map_or("", |m| m.as_str());
            let attrs = TARGET_ATTR.replace_all(attrs, "");
            format!("<a{} {NEW_TAB}>", attrs.trim_end())
        })
        .into_owned()
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Tag-stripped, entity-decoded, whitespace-collapsed view of rendered HTML.
pub fn plain_text(html: &str) -> String {
    let stripped = ANY_TAG.replace_all(html, " ");
    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&");
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}
