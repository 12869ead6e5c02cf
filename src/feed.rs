//! Parsing of the trends RSS feed.
//!
//! The feed is an RSS 2.0 document whose items carry `ht:` extension
//! elements (approximate traffic, picture and nested news items). Each item
//! is read into an explicit raw structure first and then normalized into a
//! [`ParsedTrend`]. Structural problems reject the whole feed; optional
//! fields fall back to defaults.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};

pub const DEFAULT_TRAFFIC: &str = "N/A";

/// How many news item URLs are scanned for an image when nothing better exists.
const IMAGE_SCAN_LIMIT: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("document is not an RSS feed with a <channel>")]
    MissingChannel,
    #[error("item {index} is missing <{field}>")]
    MissingField { index: usize, field: &'static str },
    #[error("item {index} has an unparseable pubDate {value:?}")]
    InvalidDate { index: usize, value: String },
    #[error("document ended inside <{0}>")]
    UnexpectedEof(String),
}

/// A news story attached to a trend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub picture: Option<String>,
}

/// A normalized feed item, ready to be stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedTrend {
    pub title: String,
    pub approx_traffic: String,
    pub publication_date: DateTime<Utc>,
    pub picture: Option<String>,
    pub news_items: String,
    pub hash: String,
}

#[derive(Debug, Default)]
struct RawItem {
    title: Option<String>,
    pub_date: Option<String>,
    approx_traffic: Option<String>,
    picture: Option<String>,
    media_content_url: Option<String>,
    enclosure_image_url: Option<String>,
    news_items: Vec<NewsItem>,
}

/// Parse the raw feed XML into trends, in feed order.
pub fn parse_trends_feed(xml: &str) -> Result<Vec<ParsedTrend>, FeedError> {
    let raw_items = read_items(xml)?;

    raw_items
        .into_iter()
        .enumerate()
        .map(|(index, raw)| normalize(index, raw))
        .collect()
}

fn read_items(xml: &str) -> Result<Vec<RawItem>, FeedError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut saw_channel = false;
    let mut items = Vec::new();
    let mut current: Option<RawItem> = None;
    let mut news: Option<NewsItem> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = element_name(&e);
                match name.as_str() {
                    "channel" if stack.last().map(String::as_str) == Some("rss") => {
                        saw_channel = true;
                    }
                    "item" if saw_channel => current = Some(RawItem::default()),
                    "ht:news_item" if current.is_some() => news = Some(NewsItem::default()),
                    _ => {
                        if let Some(item) = current.as_mut() {
                            read_link_attributes(&name, &e, item);
                        }
                    }
                }
                stack.push(name);
                text.clear();
            }
            Event::Empty(e) => {
                if let Some(item) = current.as_mut() {
                    read_link_attributes(&element_name(&e), &e, item);
                }
            }
            Event::Text(e) => {
                let unescaped = e.unescape().map_err(quick_xml::Error::from)?;
                text.push_str(&unescaped);
            }
            Event::CData(e) => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Event::End(_) => {
                let Some(name) = stack.pop() else {
                    return Err(FeedError::MissingChannel);
                };
                let value = std::mem::take(&mut text).trim().to_string();

                if let Some(story) = news.as_mut() {
                    match name.as_str() {
                        "ht:news_item_title" => story.title = value,
                        "ht:news_item_url" => story.url = value,
                        "ht:news_item_picture" => story.picture = non_empty(value),
                        "ht:news_item" => {
                            if let (Some(story), Some(item)) = (news.take(), current.as_mut()) {
                                item.news_items.push(story);
                            }
                        }
                        _ => {}
                    }
                    continue;
                }

                if let Some(item) = current.as_mut() {
                    match name.as_str() {
                        "title" => item.title = non_empty(value),
                        "pubDate" => item.pub_date = non_empty(value),
                        "ht:approx_traffic" => item.approx_traffic = non_empty(value),
                        "ht:picture" => item.picture = non_empty(value),
                        "item" => {
                            if let Some(item) = current.take() {
                                items.push(item);
                            }
                        }
                        _ => {}
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(FeedError::UnexpectedEof(open));
    }
    if !saw_channel {
        return Err(FeedError::MissingChannel);
    }

    Ok(items)
}

fn element_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

/// Picks up `<media:content url>` and image `<enclosure>` URLs.
fn read_link_attributes(name: &str, e: &BytesStart, item: &mut RawItem) {
    match name {
        "media:content" if item.media_content_url.is_none() => {
            item.media_content_url = attribute(e, "url");
        }
        "enclosure" if item.enclosure_image_url.is_none() => {
            let is_image = attribute(e, "type")
                .map(|t| t.starts_with("image/"))
                .unwrap_or(false);
            if is_image {
                item.enclosure_image_url = attribute(e, "url");
            }
        }
        _ => {}
    }
}

fn attribute(e: &BytesStart, key: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key.as_bytes())
        .and_then(|attr| attr.unescape_value().ok())
        .and_then(|value| non_empty(value.trim().to_string()))
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn normalize(index: usize, raw: RawItem) -> Result<ParsedTrend, FeedError> {
    let title = raw.title.clone().ok_or(FeedError::MissingField {
        index,
        field: "title",
    })?;
    let raw_date = raw.pub_date.clone().ok_or(FeedError::MissingField {
        index,
        field: "pubDate",
    })?;
    let publication_date =
        parse_pub_date(&raw_date).ok_or_else(|| FeedError::InvalidDate {
            index,
            value: raw_date.clone(),
        })?;

    Ok(ParsedTrend {
        hash: trend_hash(&title, &raw_date),
        approx_traffic: raw
            .approx_traffic
            .clone()
            .unwrap_or_else(|| DEFAULT_TRAFFIC.to_string()),
        picture: extract_picture(&raw),
        news_items: news_items_markdown(&raw.news_items),
        publication_date,
        title,
    })
}

fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Fingerprint used to recognise the same trend across feed refreshes.
pub fn trend_hash(title: &str, raw_pub_date: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(raw_pub_date.as_bytes());
    hex::encode(hasher.finalize())
}

/// Render news items as a markdown bullet list.
pub fn news_items_markdown(items: &[NewsItem]) -> String {
    items
        .iter()
        .map(|item| format!("- **{}**: [Link]({})", item.title, item.url))
        .collect::<Vec<_>>()
        .join("\n")
}

fn image_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\.(jpe?g|png|gif|webp)(\?[^#]*)?(#.*)?$").expect("valid image regex")
    })
}

fn extract_picture(raw: &RawItem) -> Option<String> {
    raw.picture
        .clone()
        .or_else(|| raw.media_content_url.clone())
        .or_else(|| raw.enclosure_image_url.clone())
        .or_else(|| raw.news_items.first().and_then(|n| n.picture.clone()))
        .or_else(|| {
            raw.news_items
                .iter()
                .take(IMAGE_SCAN_LIMIT)
                .find(|n| image_url_pattern().is_match(&n.url))
                .map(|n| n.url.clone())
        })
}
