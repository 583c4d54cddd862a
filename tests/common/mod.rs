//! Shared fixtures for the integration tests: a small saved forum and the
//! profile that crawls it.

#![allow(dead_code)]

use kodegen_tools_threadscrape::config::{ExtractionConfigBuilder, WithStartUrl};
use kodegen_tools_threadscrape::field_parser::{BlockAnchor, BlockSchema, FieldRule, LineSlot};
use kodegen_tools_threadscrape::locator::{LocatorStrategy, TextPredicate};
use kodegen_tools_threadscrape::{
    ExtractionConfig, SemanticTarget, Selector, SnapshotSite, TargetSpec,
};
use std::path::Path;
use std::time::Duration;

pub const BASE: &str = "https://forum.test/r/demo/";
pub const PAGE_2: &str = "https://forum.test/r/demo/?page=2";
pub const A1: &str = "https://forum.test/r/demo/comments/a1/first";
pub const A2: &str = "https://forum.test/r/demo/comments/a2/second";
pub const A3: &str = "https://forum.test/r/demo/comments/a3/third";
pub const A3_FULL: &str = "https://forum.test/r/demo/comments/a3/third?full=1";

/// Records the full fixture crawl produces.
pub const TOTAL_RECORDS: usize = 7;

pub struct Reply<'a> {
    pub author: &'a str,
    pub when: &'a str,
    pub body: &'a str,
}

pub const fn reply<'a>(author: &'a str, when: &'a str, body: &'a str) -> Reply<'a> {
    Reply { author, when, body }
}

pub fn listing_page(links: &[(Option<&str>, &str)], next: Option<&str>) -> String {
    let mut html = String::from("<html><body><div class=\"listing\">");
    for (href, title) in links {
        match href {
            Some(href) => html.push_str(&format!(
                "<div class=\"post\"><a data-click-id=\"body\" href=\"{href}\">{title}</a></div>"
            )),
            // promoted entries carry no link
            None => html.push_str(&format!(
                "<div class=\"post promoted\"><a data-click-id=\"body\">{title}</a></div>"
            )),
        }
    }
    html.push_str("</div>");
    if let Some(next) = next {
        html.push_str(&format!("<div class=\"nav\"><a class=\"next\" href=\"{next}\">Next ›</a></div>"));
    }
    html.push_str("</body></html>");
    html
}

pub fn discussion_page(
    author: &str,
    title: &str,
    when: &str,
    paragraphs: &[&str],
    replies: &[Reply<'_>],
    expand: Option<&str>,
) -> String {
    let mut html = String::from("<html><body>");
    html.push_str("<div data-test-id=\"post-content\">");
    html.push_str(&format!("<div class=\"byline\"><a href=\"/user/{author}\">u/{author}</a></div>"));
    html.push_str(&format!("<div><a data-click-id=\"timestamp\">{when}</a></div>"));
    html.push_str(&format!("<h1>{title}</h1><div class=\"body\">"));
    for p in paragraphs {
        html.push_str(&format!("<p>{p}</p>"));
    }
    html.push_str("</div></div>");

    if let Some(href) = expand {
        html.push_str(&format!("<a class=\"expand\" href=\"{href}\">View entire discussion</a>"));
    }

    html.push_str("<div class=\"comments\">");
    for (i, r) in replies.iter().enumerate() {
        html.push_str(&format!(
            "<div class=\"comment\"><div class=\"meta\">level {}</div>\
             <div class=\"author\"><a href=\"/user/{a}\">{a}</a></div><div>·</div>\
             <div><a data-click-id=\"timestamp\">{w}</a></div>\
             <div class=\"body\"><p>{b}</p></div></div>",
            i + 1,
            a = r.author,
            w = r.when,
            b = r.body,
        ));
    }
    html.push_str("</div></body></html>");
    html
}

/// Two listing pages, three discussions.
///
/// - `a1`: three replies, the second with an unparseable timestamp
/// - `a2`: one reply
/// - `a3`: collapsed; its expand control leads to a version with one reply
pub fn forum_site() -> SnapshotSite {
    SnapshotSite::new()
        .with_page(
            BASE,
            listing_page(
                &[
                    (Some("/r/demo/comments/a1/first"), "First thread"),
                    (None, "Sponsored"),
                    (Some("/r/demo/comments/a2/second"), "Second thread"),
                ],
                Some("/r/demo/?page=2"),
            ),
        )
        .with_page(
            PAGE_2,
            listing_page(&[(Some("/r/demo/comments/a3/third"), "Third thread")], None),
        )
        .with_page(
            A1,
            discussion_page(
                "alice",
                "First thread",
                "3 years ago",
                &["Hello there.", "Second paragraph."],
                &[
                    reply("bob", "5 days ago", "Agreed."),
                    reply("mallory", "an hour ago", "Broken timestamp."),
                    reply("carol", "2 hours ago", "Late reply."),
                ],
                None,
            ),
        )
        .with_page(
            A2,
            discussion_page(
                "dave",
                "Second thread",
                "1 month ago",
                &["Question?"],
                &[reply("erin", "3 weeks ago", "Answer.")],
                None,
            ),
        )
        .with_page(
            A3,
            discussion_page("frank", "Third thread", "4 days ago", &["Collapsed."], &[], Some("?full=1")),
        )
        .with_page(
            A3_FULL,
            discussion_page(
                "frank",
                "Third thread",
                "4 days ago",
                &["Collapsed."],
                &[reply("grace", "1 day ago", "Hidden until expanded.")],
                None,
            ),
        )
}

/// Reply layout as rendered text: level, author, separator, time, body.
pub fn reply_block_schema() -> BlockSchema {
    BlockSchema::new(vec![
        FieldRule::new("author", LineSlot::AnchorOffset(-2)),
        FieldRule::new("timestamp", LineSlot::AnchorOffset(0)),
        FieldRule::new("body", LineSlot::AfterAnchor),
    ])
    .with_anchor(BlockAnchor::RelativeTime)
}

/// Thread-page targets and fast test timings, without a discussion link
/// target: on its own this crawls in single mode.
pub fn thread_builder(storage: &Path, start_url: &str) -> ExtractionConfigBuilder<WithStartUrl> {
    ExtractionConfig::builder()
        .storage_dir(storage)
        .start_url(start_url)
        .target(
            SemanticTarget::RootPost,
            TargetSpec::new([
                Selector::css("div.post-container"),
                Selector::css("div[data-test-id=post-content]"),
            ]),
        )
        .target(
            SemanticTarget::Author,
            TargetSpec::new([Selector::css("a[href*='/user/']")]),
        )
        .target(SemanticTarget::Title, TargetSpec::new([Selector::TagName("h1".into())]))
        .target(
            SemanticTarget::Timestamp,
            TargetSpec::new([Selector::css("a[data-click-id=timestamp]")]),
        )
        .target(SemanticTarget::Body, TargetSpec::new([Selector::css("div.body p")]))
        .target(
            SemanticTarget::Comment,
            TargetSpec::new([Selector::css("div.comments div.comment")]).optional(),
        )
        .target(
            SemanticTarget::NextPage,
            TargetSpec::new([LocatorStrategy::new(Selector::css("div.nav a"))
                .with_text(TextPredicate::Contains("Next".into()))]),
        )
        .target(
            SemanticTarget::ExpandThread,
            TargetSpec::new([Selector::PartialLinkText("View entire discussion".into())]).optional(),
        )
        .no_pacing()
        .page_retry_backoff(Duration::from_millis(5))
        .element_wait_timeout(Duration::from_millis(20))
        .navigation_timeout(Duration::from_secs(2))
        .checkpoint_every_discussions(1)
}

/// Listing-mode builder for the fixture forum starting at `start_url`.
pub fn forum_builder_at(storage: &Path, start_url: &str) -> ExtractionConfigBuilder<WithStartUrl> {
    thread_builder(storage, start_url).target(
        SemanticTarget::DiscussionLink,
        TargetSpec::new([Selector::css("a[data-click-id=body]")]).attribute("href"),
    )
}

/// Builder with every target the fixture forum needs and no pacing.
pub fn forum_builder(storage: &Path) -> ExtractionConfigBuilder<WithStartUrl> {
    forum_builder_at(storage, BASE)
}

/// The fixture config with reply fields read by per-field locators.
pub fn forum_config(storage: &Path) -> ExtractionConfig {
    forum_builder(storage).build().expect("fixture config is valid")
}

/// The fixture config with replies parsed as positional text blocks.
pub fn forum_block_config(storage: &Path) -> ExtractionConfig {
    forum_builder(storage)
        .comment_block(reply_block_schema())
        .build()
        .expect("fixture config is valid")
}
