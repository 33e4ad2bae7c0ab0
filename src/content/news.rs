//! News items and where they come from.
//!
//! * [`FeedFile`] — a local JSON array of [`NewsItem`]s (offline runs).
//! * [`RedditSource`] — top posts and top comments of a subreddit, read from
//!   Reddit's public JSON listing (no OAuth).
//!
//! A post's summary is its title followed by its self text; linked pages
//! are not fetched.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ContentError;
use crate::config::NewsConfig;

// ---------------------------------------------------------------------------
// NewsItem
// ---------------------------------------------------------------------------

/// One top-level comment on a news post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub body: String,
}

/// A news story as fed to the transcript writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    #[serde(default)]
    pub url: String,
    /// Text the transcript is written from; defaults to the title.
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl NewsItem {
    /// Item whose summary is just its title.
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            summary: title.clone(),
            title,
            url: url.into(),
            comments: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// NewsSource trait
// ---------------------------------------------------------------------------

/// Async source of the news items for one show.
#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<NewsItem>, ContentError>;
}

// ---------------------------------------------------------------------------
// FeedFile
// ---------------------------------------------------------------------------

/// Reads news items from a JSON file.
///
/// The file holds an array of objects with at least a `title`; `url`,
/// `summary` and `comments` are optional.
#[derive(Debug, Clone)]
pub struct FeedFile {
    path: PathBuf,
}

impl FeedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl NewsSource for FeedFile {
    async fn fetch(&self) -> Result<Vec<NewsItem>, ContentError> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        parse_feed(&text)
    }
}

/// Parse a JSON feed, filling empty summaries from titles.
pub fn parse_feed(text: &str) -> Result<Vec<NewsItem>, ContentError> {
    let mut items: Vec<NewsItem> = serde_json::from_str(text)?;
    for item in &mut items {
        if item.summary.trim().is_empty() {
            item.summary = item.title.clone();
        }
    }
    Ok(items)
}

// ---------------------------------------------------------------------------
// RedditSource
// ---------------------------------------------------------------------------

const REDDIT_BASE_URL: &str = "https://www.reddit.com";

/// Fetches top posts of a subreddit plus their top comments.
pub struct RedditSource {
    client: reqwest::Client,
    base_url: String,
    config: NewsConfig,
}

impl RedditSource {
    /// Build from the `[news]` config section.
    ///
    /// Falls back to a default client if the builder fails (it does not in
    /// practice).
    pub fn from_config(config: &NewsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: REDDIT_BASE_URL.to_string(),
            config: config.clone(),
        }
    }

    /// Point at a different host (tests, mirrors).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn listing_url(&self) -> String {
        format!(
            "{}/r/{}/top.json?t={}&limit={}",
            self.base_url, self.config.subreddit, self.config.timeframe, self.config.limit
        )
    }

    fn comments_url(&self, permalink: &str) -> String {
        format!(
            "{}{}.json?sort=top&limit={}",
            self.base_url,
            permalink.trim_end_matches('/'),
            self.config.comment_limit
        )
    }

    async fn get_json(&self, url: &str) -> Result<Value, ContentError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ContentError::Request(format!("{url} returned {status}")));
        }
        response
            .json()
            .await
            .map_err(|e| ContentError::Parse(e.to_string()))
    }
}

#[async_trait]
impl NewsSource for RedditSource {
    async fn fetch(&self) -> Result<Vec<NewsItem>, ContentError> {
        log::info!(
            "news: fetching {} top posts from r/{} ({})",
            self.config.limit,
            self.config.subreddit,
            self.config.timeframe
        );
        let listing = self.get_json(&self.listing_url()).await?;
        let posts = parse_listing(&listing);

        let mut items = Vec::with_capacity(posts.len());
        for post in posts {
            let comments = match self.get_json(&self.comments_url(&post.permalink)).await {
                Ok(thread) => parse_comments(&thread, self.config.comment_limit as usize),
                Err(e) => {
                    log::warn!("news: comments for '{}' unavailable: {e}", post.title);
                    Vec::new()
                }
            };
            items.push(post.into_item(comments));
        }

        log::info!("news: fetched {} items", items.len());
        Ok(items)
    }
}

/// The fields of a listing entry that matter here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedditPost {
    pub title: String,
    pub url: String,
    pub selftext: String,
    pub permalink: String,
}

impl RedditPost {
    fn into_item(self, comments: Vec<Comment>) -> NewsItem {
        let summary = if self.selftext.trim().is_empty() {
            self.title.clone()
        } else {
            format!("{}\n\n{}", self.title, self.selftext.trim())
        };
        NewsItem {
            title: self.title,
            url: self.url,
            summary,
            comments,
        }
    }
}

/// Posts from a `top.json` listing, skipping stickied and untitled entries.
pub fn parse_listing(listing: &Value) -> Vec<RedditPost> {
    let Some(children) = listing["data"]["children"].as_array() else {
        return Vec::new();
    };

    children
        .iter()
        .map(|child| &child["data"])
        .filter(|data| !data["stickied"].as_bool().unwrap_or(false))
        .filter_map(|data| {
            let title = data["title"].as_str()?.trim();
            if title.is_empty() {
                return None;
            }
            Some(RedditPost {
                title: title.to_string(),
                url: data["url"].as_str().unwrap_or_default().to_string(),
                selftext: data["selftext"].as_str().unwrap_or_default().to_string(),
                permalink: data["permalink"].as_str().unwrap_or_default().to_string(),
            })
        })
        .collect()
}

/// Up to `limit` top-level comments from a comments-page response
/// (`[post_listing, comment_listing]`), skipping stickied, deleted and
/// removed ones.
pub fn parse_comments(thread: &Value, limit: usize) -> Vec<Comment> {
    let Some(children) = thread[1]["data"]["children"].as_array() else {
        return Vec::new();
    };

    children
        .iter()
        .filter(|child| child["kind"].as_str() == Some("t1"))
        .map(|child| &child["data"])
        .filter(|data| !data["stickied"].as_bool().unwrap_or(false))
        .filter_map(|data| {
            let author = data["author"].as_str()?;
            let body = data["body"].as_str()?.trim();
            if author == "[deleted]" || body.is_empty() || body == "[deleted]" || body == "[removed]"
            {
                return None;
            }
            Some(Comment {
                author: author.to_string(),
                body: body.to_string(),
            })
        })
        .take(limit)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn feed_fills_missing_summary_from_title() {
        let feed = r#"[
            {"title": "Snow in the valley", "url": "https://example.org/snow"},
            {"title": "Quiet harbour", "summary": "Boats rest at anchor.",
             "comments": [{"author": "ann", "body": "lovely"}]}
        ]"#;

        let items = parse_feed(feed).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].summary, "Snow in the valley");
        assert_eq!(items[1].url, "");
        assert_eq!(items[1].summary, "Boats rest at anchor.");
        assert_eq!(items[1].comments[0].author, "ann");
    }

    #[test]
    fn malformed_feed_is_parse_error() {
        let err = parse_feed("{not json").unwrap_err();
        assert!(matches!(err, ContentError::Parse(_)));
    }

    #[tokio::test]
    async fn feed_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.json");
        std::fs::write(&path, r#"[{"title": "Tea prices steady"}]"#).unwrap();

        let items = FeedFile::new(&path).fetch().await.unwrap();
        assert_eq!(items, vec![NewsItem::new("Tea prices steady", "")]);
    }

    #[tokio::test]
    async fn missing_feed_file_is_io_error() {
        let err = FeedFile::new("/no/such/feed.json").fetch().await.unwrap_err();
        assert!(matches!(err, ContentError::Io(_)));
    }

    #[test]
    fn listing_skips_stickied_and_untitled_posts() {
        let listing = json!({
            "data": { "children": [
                { "data": { "title": "Pinned rules", "stickied": true, "permalink": "/r/x/1/" } },
                { "data": { "title": "Rivers run gently", "url": "https://example.org/r",
                            "selftext": "", "permalink": "/r/x/2/" } },
                { "data": { "title": "  ", "permalink": "/r/x/3/" } },
                { "data": { "title": "Library extends hours", "url": "https://example.org/l",
                            "selftext": "Open until midnight.", "permalink": "/r/x/4/" } }
            ]}
        });

        let posts = parse_listing(&listing);

        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].title, "Rivers run gently");
        assert_eq!(posts[1].permalink, "/r/x/4/");
    }

    #[test]
    fn listing_without_children_is_empty() {
        assert!(parse_listing(&json!({"error": 429})).is_empty());
    }

    #[test]
    fn summary_joins_title_and_selftext() {
        let post = RedditPost {
            title: "Library extends hours".into(),
            url: "u".into(),
            selftext: " Open until midnight. ".into(),
            permalink: "p".into(),
        };
        let item = post.into_item(Vec::new());
        assert_eq!(item.summary, "Library extends hours\n\nOpen until midnight.");
    }

    #[test]
    fn comments_skip_deleted_stickied_and_more_entries() {
        let thread = json!([
            { "data": { "children": [] } },
            { "data": { "children": [
                { "kind": "t1", "data": { "author": "AutoModerator", "body": "Rules", "stickied": true } },
                { "kind": "t1", "data": { "author": "[deleted]", "body": "[deleted]" } },
                { "kind": "t1", "data": { "author": "owl", "body": "  hoot  " } },
                { "kind": "t1", "data": { "author": "mod", "body": "[removed]" } },
                { "kind": "t1", "data": { "author": "cat", "body": "purr" } },
                { "kind": "t1", "data": { "author": "dog", "body": "woof" } },
                { "kind": "more", "data": { "count": 40 } }
            ]}}
        ]);

        let comments = parse_comments(&thread, 2);

        assert_eq!(
            comments,
            vec![
                Comment { author: "owl".into(), body: "hoot".into() },
                Comment { author: "cat".into(), body: "purr".into() },
            ]
        );
    }

    #[test]
    fn urls_follow_reddit_layout() {
        let source = RedditSource::from_config(&NewsConfig::default())
            .with_base_url("http://localhost:9/");

        assert_eq!(
            source.listing_url(),
            "http://localhost:9/r/worldnews/top.json?t=day&limit=10"
        );
        assert_eq!(
            source.comments_url("/r/worldnews/comments/abc/title/"),
            "http://localhost:9/r/worldnews/comments/abc/title.json?sort=top&limit=5"
        );
    }
}
