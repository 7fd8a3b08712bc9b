//! Captured posts and their conversion into export items.

mod model;
mod prepare;
mod text;

pub use model::{Media, MediaKind, Post, parse_posts, parse_timestamp};
pub use prepare::{archive_file_name, filter_since, folder_name, post_items, prepare_items};
pub use text::render_text_export;
