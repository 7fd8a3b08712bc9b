use chrono::Local;

use super::model::Post;

/// Render posts as a single plain-text document: one block per post, then
/// every media URL with the post it came from.
pub fn render_text_export(posts: &[Post]) -> String {
    let body = posts
        .iter()
        .map(|post| {
            format!(
                "===== {} - @{} =====\n{}\n{}\n\n",
                post.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
                post.user_name,
                post.full_text,
                post.url
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let media = posts
        .iter()
        .flat_map(|post| {
            post.media.iter().map(move |m| {
                format!(
                    "{}: {}\nFrom: {}",
                    m.kind.as_str(),
                    m.url.as_deref().unwrap_or(""),
                    post.url
                )
            })
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{body}\n\n======= Media links =======\n\n{media}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posts::model::{Media, MediaKind};
    use chrono::{TimeZone, Utc};

    #[test]
    fn lists_posts_then_media() {
        let post = Post {
            id: "1".into(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            user_name: "bob".into(),
            user_display_name: String::new(),
            full_text: "gm".into(),
            url: "https://x.com/bob/status/1".into(),
            retweet_count: 0,
            favorite_count: 0,
            reply_count: 0,
            media: vec![Media {
                kind: MediaKind::Video,
                url: Some("https://video/1.mp4".into()),
            }],
        };

        let text = render_text_export(&[post]);
        assert!(text.contains(" - @bob =====\ngm\nhttps://x.com/bob/status/1\n"));
        assert!(text.ends_with(
            "======= Media links =======\n\nvideo: https://video/1.mp4\nFrom: https://x.com/bob/status/1"
        ));
    }

    #[test]
    fn empty_input_still_has_the_media_section() {
        assert_eq!(render_text_export(&[]), "\n\n======= Media links =======\n\n");
    }
}
