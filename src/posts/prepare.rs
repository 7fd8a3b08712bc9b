use chrono::{DateTime, Local, NaiveDate, Utc};
use std::collections::HashSet;
use std::fmt::Write as _;

use super::model::{MediaKind, Post};
use crate::export::ExportItem;

/// `YYYYMMDD_<id>`, the folder holding everything exported for one post.
pub fn folder_name(post: &Post) -> String {
    format!("{}_{}", post.created_at.format("%Y%m%d"), post.id)
}

/// Items for a single post, in archive order:
///
/// 1. `post.txt` with author, time, link, text and counters
/// 2. `image_<n>.jpg` downloads for every photo with a URL (`n` is the
///    1-based position in the post's media list)
/// 3. `media_links.txt` listing every media URL, when there is at least one
pub fn post_items(post: &Post) -> Vec<ExportItem> {
    let folder = folder_name(post);
    let modified = post.created_at.with_timezone(&Local).naive_local();
    let mut items = vec![ExportItem::text(format!("{folder}/post.txt"), render_post(post)).with_modified(modified)];

    for (i, media) in post.media.iter().enumerate() {
        if let (MediaKind::Photo, Some(url)) = (media.kind, &media.url) {
            items.push(
                ExportItem::remote(format!("{folder}/image_{}.jpg", i + 1), url.clone())
                    .with_modified(modified),
            );
        }
    }

    if let Some(links) = render_media_links(post) {
        items.push(ExportItem::text(format!("{folder}/media_links.txt"), links).with_modified(modified));
    }

    items
}

/// Items for a batch of posts. Posts repeating an earlier id are skipped,
/// so every item name is unique.
pub fn prepare_items(posts: &[Post]) -> Vec<ExportItem> {
    let mut seen = HashSet::new();
    posts
        .iter()
        .filter(|post| seen.insert(post.id.as_str()))
        .flat_map(post_items)
        .collect()
}

/// Keep posts created on or after the start of `since` (UTC).
///
/// The cutoff is midnight UTC, not local time, so the result does not
/// depend on the machine's time zone. Posts from the whole of `since` are
/// kept; a filter anchored at the end of the day in local time would drop
/// most of that day instead.
pub fn filter_since(posts: Vec<Post>, since: NaiveDate) -> Vec<Post> {
    let cutoff = since.and_time(chrono::NaiveTime::MIN).and_utc();
    posts.into_iter().filter(|p| p.created_at >= cutoff).collect()
}

/// Default archive name, e.g. `alice_posts_2024-05-01T10-20-30-123Z.zip`.
pub fn archive_file_name(user_name: &str, now: DateTime<Utc>, extension: &str) -> String {
    let user = if user_name.is_empty() { "export" } else { user_name };
    format!("{user}_posts_{}.{extension}", now.format("%Y-%m-%dT%H-%M-%S-%3fZ"))
}

fn render_post(post: &Post) -> String {
    let local = post.created_at.with_timezone(&Local);
    [
        format!("User: @{} ({})", post.user_name, post.user_display_name),
        format!("Time: {}", local.format("%Y-%m-%d %H:%M:%S")),
        format!("Link: {}", post.url),
        String::new(),
        "Content:".to_string(),
        post.full_text.clone(),
        String::new(),
        format!(
            "Reposts: {} | Likes: {} | Replies: {}",
            post.retweet_count, post.favorite_count, post.reply_count
        ),
    ]
    .join("\n")
}

fn render_media_links(post: &Post) -> Option<String> {
    let mut links = String::new();
    for (i, media) in post.media.iter().enumerate() {
        if let Some(url) = &media.url {
            let _ = writeln!(links, "{}. [{}] {}", i + 1, media.kind.as_str(), url);
        }
    }
    if links.is_empty() {
        return None;
    }
    Some(format!("# Media links\n{links}\n# Post link\n{}", post.url))
}
