//! Minimal HTML scanning over `action=parse` output.
//!
//! The parse API returns rendered article HTML; the pipeline only needs
//! two things from it — the `/wiki/` hrefs of a section, and whether the
//! article body carries a real link to a hub page outside navigation and
//! infobox furniture — so a linear tag scan is enough, no DOM.

/// Container classes whose links do not count as editorial references.
const EXCLUDED_CLASSES: [&str; 5] = ["navbox", "succession-box", "metadata", "infobox", "boite"];

/// Href prefix of internal article links.
const WIKI_PREFIX: &str = "/wiki/";

/// Extract an attribute value from the inside of a tag.
fn attr<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let pattern = format!("{name}=\"");
    let start = tag.find(&pattern)? + pattern.len();
    let rest = &tag[start..];
    rest.find('"').map(|end| &rest[..end])
}

/// First token of a tag body: its element name, lowercased ASCII.
fn tag_name(tag: &str) -> String {
    tag.chars()
        .take_while(|c| !c.is_whitespace() && *c != '>' && *c != '/')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Whether a tag opens one of the excluded container classes.
fn opens_excluded(tag: &str) -> bool {
    attr(tag, "class").is_some_and(|classes| {
        classes
            .split_whitespace()
            .any(|c| EXCLUDED_CLASSES.contains(&c))
    })
}

/// Normalized `/wiki/...` href for a page title, matching MediaWiki's own
/// link rendering (spaces as underscores, percent-encoded).
pub fn wiki_href(title: &str) -> String {
    let normalized = title.replace(' ', "_").replace('’', "'");
    format!("{WIKI_PREFIX}{}", urlencoding::encode(&normalized))
}

/// All internal article links of a rendered fragment, raw hrefs in
/// document order, media pages excluded.
pub fn wiki_links(html: &str) -> Vec<String> {
    let mut links = Vec::new();
    let mut rest = html;
    while let Some(lt) = rest.find('<') {
        rest = &rest[lt + 1..];
        let Some(gt) = rest.find('>') else { break };
        let tag = &rest[..gt];
        rest = &rest[gt + 1..];
        if tag_name(tag) != "a" {
            continue;
        }
        if let Some(href) = attr(tag, "href") {
            if href.starts_with(WIKI_PREFIX) && !href.starts_with("/wiki/Fichier:") {
                links.push(href.to_string());
            }
        }
    }
    links
}

/// Strip the `/wiki/` prefix from a link and decode it back into a page
/// title (underscores as spaces). Empty string for foreign links.
pub fn link_title(href: &str) -> String {
    let Some(raw) = href.strip_prefix(WIKI_PREFIX) else {
        return String::new();
    };
    let raw = raw.split(['#', '?']).next().unwrap_or(raw);
    urlencoding::decode(raw)
        .map(|t| t.into_owned())
        .unwrap_or_else(|_| raw.to_string())
        .replace('_', " ")
        .trim()
        .to_string()
}

/// Whether the rendered article body carries a link to `target` outside
/// the excluded navigation/infobox containers.
///
/// Tracks open excluded containers with a small stack; nested same-name
/// tags inside a container are depth-counted so its closing tag is not
/// consumed early. Anchors seen while any container is open are ignored.
pub fn contains_body_link(html: &str, target: &str) -> bool {
    let needle = wiki_href(target);
    // (element name, count of nested same-name tags still open)
    let mut excluded: Vec<(String, u32)> = Vec::new();
    let mut rest = html;

    while let Some(lt) = rest.find('<') {
        rest = &rest[lt + 1..];
        let Some(gt) = rest.find('>') else { break };
        let tag = &rest[..gt];
        rest = &rest[gt + 1..];

        if let Some(closing) = tag.strip_prefix('/') {
            let name = tag_name(closing);
            if let Some(top) = excluded.last_mut() {
                if top.0 == name {
                    if top.1 > 0 {
                        top.1 -= 1;
                    } else {
                        excluded.pop();
                    }
                }
            }
            continue;
        }
        if tag.starts_with('!') {
            continue;
        }

        let name = tag_name(tag);
        let self_closing = tag.ends_with('/');

        if let Some(top) = excluded.last_mut() {
            if top.0 == name && !self_closing {
                top.1 += 1;
            }
            continue;
        }

        if opens_excluded(tag) && !self_closing {
            excluded.push((name, 0));
            continue;
        }

        if name == "a" {
            if let Some(href) = attr(tag, "href") {
                if href.contains(&needle) {
                    return true;
                }
            }
        }
    }
    false
}
