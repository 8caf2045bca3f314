//! GitHub `Link` response-header handling.
//!
//! The header is a comma-separated list of `<url>; rel="name"` entries. The
//! processor consumes `next` and `last` to fan the remaining pages of a
//! collection out in one bulk push; `prev` is parsed but unused.

use std::collections::HashMap;

use anyhow::bail;
use regex::Regex;
use url::Url;

use crate::Result;

/// Every page request overwrites `per_page`; GitHub caps at 100.
pub const PER_PAGE: u32 = 100;

#[derive(Debug, Eq, PartialEq, Hash)]
pub enum LinkRel {
    First,
    Prev,
    Next,
    Last,
    Other(String),
}

pub fn parse_link_header(content: &str) -> Result<HashMap<LinkRel, String>> {
    lazy_static! {
        static ref REGEX: Regex = Regex::new(r#"<([^>]+)>; *rel="([^"]+)""#).unwrap();
    }

    let mut result = HashMap::new();
    for entry in content.split(',') {
        if let Some(captures) = REGEX.captures(entry.trim()) {
            let rel = match &captures[2] {
                "first" => LinkRel::First,
                "prev" => LinkRel::Prev,
                "next" => LinkRel::Next,
                "last" => LinkRel::Last,
                other => LinkRel::Other(other.into()),
            };
            result.insert(rel, captures[1].into());
        } else {
            bail!("invalid link header entry: {}", entry);
        }
    }
    Ok(result)
}

/// URLs for the remaining pages of a paginated response: `next..=last`, in
/// order, each derived from `current_url` with `page` set and `per_page`
/// overwritten to 100. Returns an empty list when there is no next page.
pub fn remaining_pages(current_url: &str, link_header: &str) -> Result<Vec<String>> {
    let rels = parse_link_header(link_header)?;

    let next = match rels.get(&LinkRel::Next) {
        Some(next) => page_number(next)?,
        None => return Ok(Vec::new()),
    };
    let last = match rels.get(&LinkRel::Last) {
        Some(last) => page_number(last)?,
        // A `next` without a `last` still yields that one page.
        None => next,
    };

    (next..=last)
        .map(|page| with_page(current_url, page))
        .collect()
}

/// `url` with `page` set and `per_page` forced to 100. Any existing values
/// for either parameter are dropped; all other query parameters survive.
pub fn with_page(url: &str, page: u64) -> Result<String> {
    let mut url = Url::parse(url)?;

    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| name != "page" && name != "per_page")
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (name, value) in &retained {
            pairs.append_pair(name, value);
        }
        pairs.append_pair("page", &page.to_string());
        pairs.append_pair("per_page", &PER_PAGE.to_string());
    }

    Ok(url.into())
}

fn page_number(url: &str) -> Result<u64> {
    let url = Url::parse(url)?;
    match url
        .query_pairs()
        .find(|(name, _)| name == "page")
        .map(|(_, value)| value.parse::<u64>())
    {
        Some(Ok(page)) => Ok(page),
        _ => bail!("no page number in link header url: {}", url),
    }
}
