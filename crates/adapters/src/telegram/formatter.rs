//! HTML rendering of posts for Telegram

use crosspost_domain::Post;

use crate::text::{char_len, escape_html};

/// Captions at or over this length go out as a text message instead
pub(crate) const CAPTION_MAX_LEN: usize = 1000;
/// Captions longer than this get an author credit line
pub(crate) const LONG_TEXT_THRESHOLD: usize = 500;

pub(crate) struct TelegramFormatter {
    excluded_author: Option<String>,
}

impl TelegramFormatter {
    pub(crate) fn new(excluded_author: Option<String>) -> Self {
        Self { excluded_author }
    }

    /// Escaped text with videos above it and links below it
    pub(crate) fn body(&self, post: &Post) -> String {
        let mut text = String::new();
        for url in &post.videos {
            text.push_str(&anchor(url, url));
            text.push('\n');
        }
        text.push_str(&escape_html(&post.text));
        for (title, url) in &post.links {
            text.push('\n');
            text.push_str(&anchor(url, title));
        }
        text
    }

    /// Caption for a single captioned photo, if the post qualifies for one
    pub(crate) fn photo_caption(&self, post: &Post) -> Option<String> {
        if post.photos.len() != 1 {
            return None;
        }

        let body = self.body(post);
        let len = char_len(&body);
        if len >= CAPTION_MAX_LEN {
            return None;
        }

        match self.credited_author(post) {
            Some(author) if len > LONG_TEXT_THRESHOLD => {
                Some(format!("{}\n© {}", body, escape_html(author)))
            }
            _ => Some(body),
        }
    }

    /// Full message text with every photo linked below the body
    pub(crate) fn message_text(&self, post: &Post) -> String {
        let mut text = self.body(post);
        for (index, url) in post.photos.iter().enumerate() {
            let label = match (&post.author, index) {
                (Some(author), 0) => author.clone(),
                _ => format!("Image {}", index + 1),
            };
            text.push('\n');
            text.push_str(&anchor(url, &label));
        }
        text
    }

    fn credited_author<'p>(&self, post: &'p Post) -> Option<&'p str> {
        post.author
            .as_deref()
            .filter(|author| self.excluded_author.as_deref() != Some(*author))
    }
}

fn anchor(url: &str, label: &str) -> String {
    format!(
        "<a href='{}'>{}</a>",
        escape_html(url).replace('\'', "&#39;"),
        escape_html(label)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosspost_domain::PostId;

    fn post(text: &str) -> Post {
        Post::new(PostId::new("1", "vk"), text)
    }

    #[test]
    fn test_body_wraps_videos_and_links() {
        let mut post = post("Fish & chips <3");
        post.videos = vec!["https://vk.com/video1_2".to_string()];
        post.links = vec![("Menu".to_string(), "https://example.com/menu".to_string())];

        assert_eq!(
            TelegramFormatter::new(None).body(&post),
            "<a href='https://vk.com/video1_2'>https://vk.com/video1_2</a>\n\
             Fish &amp; chips &lt;3\n\
             <a href='https://example.com/menu'>Menu</a>"
        );
    }

    #[test]
    fn test_short_single_photo_gets_plain_caption() {
        let mut post = post("Short caption");
        post.photos = vec!["https://example.com/a.jpg".to_string()];
        post.author = Some("Jane Doe".to_string());

        assert_eq!(
            TelegramFormatter::new(None).photo_caption(&post).as_deref(),
            Some("Short caption")
        );
    }

    #[test]
    fn test_long_caption_credits_author_unless_excluded() {
        let mut post = post(&"a".repeat(600));
        post.photos = vec!["https://example.com/a.jpg".to_string()];
        post.author = Some("Jane Doe".to_string());

        let caption = TelegramFormatter::new(None).photo_caption(&post).unwrap();
        assert!(caption.ends_with("\n© Jane Doe"));

        let caption = TelegramFormatter::new(Some("Jane Doe".to_string()))
            .photo_caption(&post)
            .unwrap();
        assert!(!caption.contains('©'));
    }

    #[test]
    fn test_no_caption_for_many_photos_or_long_text() {
        let formatter = TelegramFormatter::new(None);

        let mut many = post("text");
        many.photos = vec!["p1".to_string(), "p2".to_string()];
        assert!(formatter.photo_caption(&many).is_none());

        let mut long = post(&"б".repeat(CAPTION_MAX_LEN));
        long.photos = vec!["p1".to_string()];
        assert!(formatter.photo_caption(&long).is_none());
    }

    #[test]
    fn test_message_text_links_photos() {
        let mut post = post("Gallery");
        post.photos = vec!["https://e.com/1.jpg".to_string(), "https://e.com/2.jpg".to_string()];
        post.author = Some("Jane".to_string());

        assert_eq!(
            TelegramFormatter::new(None).message_text(&post),
            "Gallery\n<a href='https://e.com/1.jpg'>Jane</a>\n<a href='https://e.com/2.jpg'>Image 2</a>"
        );
    }
}
