use crate::heuristics::{HeuristicTable, LinkPattern};
use crate::logging;
use crate::models::{ElementHandle, NextLink};
use crate::page::{Document, Page};
use scraper::Selector;
use std::collections::HashSet;

/// Anchors matched by the structural table, in table order.
pub fn structural_matches(doc: &Document, table: &HeuristicTable) -> Vec<ego_tree::NodeId> {
    let mut matches = Vec::new();
    for pattern in &table.link_patterns {
        match pattern {
            LinkPattern::Selector { selector, .. } => matches.extend(doc.select(selector)),
            LinkPattern::Text { base, needle, .. } => matches.extend(
                doc.select(base)
                    .into_iter()
                    .filter(|node| doc.text(*node).to_lowercase().contains(needle.as_str())),
            ),
        }
    }
    matches
}

/// Anchors whose `href` carries the episode number after the one in `url`.
pub fn numeric_matches(doc: &Document, table: &HeuristicTable, url: &str) -> Vec<ego_tree::NodeId> {
    let Some(current) = table.episode_number(url) else {
        return Vec::new();
    };
    let next = current.saturating_add(1);
    let css = format!(r#"a[href*="{next}"]"#);
    match Selector::parse(&css) {
        Ok(selector) => doc.select(&selector),
        Err(err) => {
            logging::warn("next", format!("selector error {css:?}: {err:?}"));
            Vec::new()
        }
    }
}

/// The URL without its `#fragment`.
fn page_part(url: &str) -> &str {
    url.split_once('#').map_or(url, |(page, _)| page)
}

/// Candidate next-episode links: structural matches first, then numeric
/// ones, resolved against the page URL, de-duplicated by target and never
/// pointing back at the page itself (fragments ignored).
pub fn find_next_episode_links(page: &Page, table: &HeuristicTable) -> Vec<NextLink> {
    let doc = page.main();
    let current_url = page.url().as_str();

    let mut nodes = structural_matches(doc, table);
    nodes.extend(numeric_matches(doc, table, current_url));

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for node in nodes {
        let Some(href) = doc.attr(node, "href") else {
            continue;
        };
        if href.trim().is_empty() {
            continue;
        }
        let Some(url) = page.resolve(&href) else {
            continue;
        };
        if page_part(&url) == page_part(current_url) || !seen.insert(url.clone()) {
            continue;
        }
        links.push(NextLink {
            element: ElementHandle::main(node),
            url,
            label: doc.text(node).trim().to_string(),
        });
    }
    logging::debug("next", format!("{} next-episode candidate(s)", links.len()));
    links
}
