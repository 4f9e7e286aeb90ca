//! Opt-out marker authors put in a post to keep it from being cross-posted

use regex::Regex;

/// Tag used when none is configured
pub const DEFAULT_IGNORE_TAG: &str = "#local";

/// Case-insensitive, whitespace-delimited tag matcher
#[derive(Debug, Clone)]
pub struct IgnoreTag {
    tag: String,
    pattern: Regex,
}

impl IgnoreTag {
    pub fn new(tag: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(r"(?i)(?:^|\s){}(?:\s|$)", regex::escape(tag)))?;
        Ok(Self {
            tag: tag.to_string(),
            pattern,
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_whole_tag_only() {
        let tag = IgnoreTag::new(DEFAULT_IGNORE_TAG).unwrap();

        assert!(tag.is_match("#local"));
        assert!(tag.is_match("News for neighbours #LOCAL"));
        assert!(tag.is_match("#Local\nnext line"));
        assert!(!tag.is_match("#localnews today"));
        assert!(!tag.is_match("see foo#local"));
    }

    #[test]
    fn test_escapes_regex_characters() {
        let tag = IgnoreTag::new("+skip.").unwrap();

        assert!(tag.is_match("text +skip."));
        assert!(!tag.is_match("text +skipx"));
    }
}
