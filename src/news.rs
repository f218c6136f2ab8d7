//! News ingestion. The pipeline only sees the [`NewsSource`] trait; the
//! Google News RSS search feed is the production implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::{Config, NEWS_SOURCE_NAME};
use crate::error::{AppError, Result};
use crate::http::{build_client, send_with_retry, RetryPolicy};
use crate::types::{Asset, NewArticle};

#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn fetch(&self, asset: &Asset) -> Result<Vec<NewArticle>>;
}

pub struct GoogleNewsRss {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl GoogleNewsRss {
    pub fn new(cfg: &Config) -> Result<Self> {
        Ok(Self {
            client: build_client(cfg.http_timeout_secs)?,
            base_url: cfg.news_feed_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::from_config(cfg),
        })
    }
}

#[async_trait]
impl NewsSource for GoogleNewsRss {
    async fn fetch(&self, asset: &Asset) -> Result<Vec<NewArticle>> {
        let url = format!("{}/rss/search", self.base_url);
        let query = format!("{} stock", asset.ticker);

        let resp = send_with_retry(self.retry, "news feed", || {
            self.client.get(&url).query(&[
                ("q", query.as_str()),
                ("hl", "en-CA"),
                ("gl", "CA"),
                ("ceid", "CA:en"),
            ])
        })
        .await?;
        let body = resp.bytes().await?;

        let (articles, skipped) = parse_feed(asset, &body)?;
        debug!(
            ticker = %asset.ticker,
            articles = articles.len(),
            skipped,
            "feed parsed for {}",
            asset.ticker
        );
        Ok(articles)
    }
}

/// Parse an RSS document into articles for `asset`. Entries without a title,
/// link or parsable `pubDate` are skipped; the skip count is returned.
pub fn parse_feed(asset: &Asset, xml: &[u8]) -> Result<(Vec<NewArticle>, usize)> {
    let channel = rss::Channel::read_from(xml).map_err(|e| AppError::Feed(e.to_string()))?;

    let mut articles = Vec::new();
    let mut skipped = 0usize;

    for item in channel.items() {
        let (Some(title), Some(link), Some(published_at)) = (
            item.title().map(str::trim).filter(|t| !t.is_empty()),
            item.link().map(str::trim).filter(|l| !l.is_empty()),
            item.pub_date().and_then(parse_pub_date),
        ) else {
            skipped += 1;
            continue;
        };
        let title = decode_entities(title);

        let content = item
            .description()
            .map(strip_tags)
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| title.clone());

        articles.push(NewArticle {
            asset_id: asset.asset_id,
            source: NEWS_SOURCE_NAME.to_string(),
            title,
            content,
            url: link.to_string(),
            published_at,
        });
    }

    Ok((articles, skipped))
}

/// RFC 2822 `pubDate` → `YYYY-MM-DDTHH:MM:SS` in UTC.
pub fn parse_pub_date(raw: &str) -> Option<String> {
    DateTime::parse_from_rfc2822(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc).format("%Y-%m-%dT%H:%M:%S").to_string())
}

/// Drop markup from a feed description and collapse whitespace.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    decode_entities(&out)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode the HTML entities feeds leave in descriptions after XML unescaping:
/// the named XML set, `&nbsp;`, and decimal or hex character references.
/// Unknown or malformed entities are kept as written.
fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest[1..]
            .char_indices()
            .take(12)
            .find(|&(_, c)| c == ';')
            .and_then(|(semi, _)| decode_entity(&rest[1..=semi]).map(|c| (c, semi + 2)));
        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let num = entity.strip_prefix('#')?;
            let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
