//! Splitting of long marked-up messages into tag-balanced chunks
//!
//! Lengths are counted in characters. Each emitted chunk closes every tag it
//! leaves open and the following chunk reopens them, so chunks can be sent as
//! independent messages. Tags are never cut; a single tag longer than the
//! limit is emitted whole and is the only case where a chunk may exceed it.

/// Splits text into chunks of at most `max_len` characters
#[derive(Debug, Clone, Copy)]
pub struct MessageSplitter {
    max_len: usize,
}

impl Default for MessageSplitter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_LEN)
    }
}

impl MessageSplitter {
    pub const DEFAULT_MAX_LEN: usize = 4096;

    pub fn new(max_len: usize) -> Self {
        Self {
            max_len: max_len.max(1),
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Split `text` into trimmed, non-blank chunks
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.chars().count() <= self.max_len {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return vec![];
            }
            return vec![trimmed.to_string()];
        }

        let tokens = tokenize(text);
        let mut builder = ChunkBuilder::new(self.max_len);
        for unit in sentence_units(&tokens) {
            builder.push_unit(unit);
        }
        builder.finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Tag(&'a str),
    Char(char),
}

impl Token<'_> {
    fn len(&self) -> usize {
        match self {
            Token::Tag(raw) => raw.chars().count(),
            Token::Char(_) => 1,
        }
    }
}

enum TagKind<'a> {
    Open(&'a str),
    Close(&'a str),
    Other,
}

#[derive(Debug, Clone)]
struct OpenTag {
    name: String,
    raw: String,
}

#[derive(Debug, Clone)]
struct BreakPoint {
    byte_idx: usize,
    char_len: usize,
    stack: Vec<OpenTag>,
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices();

    while let Some((start, c)) = chars.next() {
        if c == '<' {
            if let Some(offset) = text[start..].find('>') {
                let end = start + offset + 1;
                tokens.push(Token::Tag(&text[start..end]));
                // Skip the rest of the tag
                while chars.offset() < end {
                    chars.next();
                }
                continue;
            }
        }
        tokens.push(Token::Char(c));
    }

    tokens
}

/// Cut after each run of `.`, `!` or `?` followed by whitespace or the end
fn sentence_units<'t, 'a>(tokens: &'t [Token<'a>]) -> Vec<&'t [Token<'a>]> {
    let mut units = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < tokens.len() {
        if !matches!(tokens[i], Token::Char('.' | '!' | '?')) {
            i += 1;
            continue;
        }

        while i < tokens.len() && matches!(tokens[i], Token::Char('.' | '!' | '?')) {
            i += 1;
        }

        if i == tokens.len() {
            break;
        }

        if matches!(tokens[i], Token::Char(c) if c.is_whitespace()) {
            while i < tokens.len() && matches!(tokens[i], Token::Char(c) if c.is_whitespace()) {
                i += 1;
            }
            units.push(&tokens[start..i]);
            start = i;
        }
    }

    if start < tokens.len() {
        units.push(&tokens[start..]);
    }

    units
}

fn classify_tag(raw: &str) -> TagKind<'_> {
    let inner = &raw[1..raw.len() - 1];

    if let Some(rest) = inner.strip_prefix('/') {
        let name = tag_name(rest.trim_start());
        return if name.is_empty() {
            TagKind::Other
        } else {
            TagKind::Close(name)
        };
    }

    if inner.ends_with('/') {
        return TagKind::Other;
    }

    let name = tag_name(inner);
    if name.is_empty() {
        TagKind::Other
    } else {
        TagKind::Open(name)
    }
}

fn tag_name(s: &str) -> &str {
    let end = s
        .find(|c: char| !c.is_ascii_alphanumeric() && c != '-')
        .unwrap_or(s.len());
    &s[..end]
}

fn apply_tag(stack: &mut Vec<OpenTag>, raw: &str) {
    match classify_tag(raw) {
        TagKind::Open(name) => stack.push(OpenTag {
            name: name.to_ascii_lowercase(),
            raw: raw.to_string(),
        }),
        TagKind::Close(name) => {
            if let Some(pos) = stack
                .iter()
                .rposition(|open| open.name.eq_ignore_ascii_case(name))
            {
                stack.remove(pos);
            }
        }
        TagKind::Other => {}
    }
}

fn closing_tags(stack: &[OpenTag]) -> String {
    stack
        .iter()
        .rev()
        .map(|open| format!("</{}>", open.name))
        .collect()
}

fn closing_len(stack: &[OpenTag]) -> usize {
    stack.iter().map(|open| open.name.chars().count() + 3).sum()
}

fn reopening_tags(stack: &[OpenTag]) -> String {
    stack.iter().map(|open| open.raw.as_str()).collect()
}

fn is_break_char(c: char) -> bool {
    c.is_whitespace() || matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | '-')
}

/// Accumulates chunks; after every append `current_len + closing_len(stack)`
/// stays within `max_len` unless an oversized tag forced its way in.
struct ChunkBuilder {
    max_len: usize,
    chunks: Vec<String>,
    current: String,
    current_len: usize,
    prefix_len: usize,
    has_content: bool,
    stack: Vec<OpenTag>,
    last_break: Option<BreakPoint>,
}

impl ChunkBuilder {
    fn new(max_len: usize) -> Self {
        Self {
            max_len,
            chunks: Vec::new(),
            current: String::new(),
            current_len: 0,
            prefix_len: 0,
            has_content: false,
            stack: Vec::new(),
            last_break: None,
        }
    }

    fn push_unit(&mut self, unit: &[Token<'_>]) {
        let unit_len: usize = unit.iter().map(Token::len).sum();
        let mut stack_after = self.stack.clone();
        for token in unit {
            if let Token::Tag(raw) = token {
                apply_tag(&mut stack_after, raw);
            }
        }

        if self.fits(unit_len, &stack_after) {
            self.append_all(unit);
            return;
        }

        if self.has_content {
            self.flush();
            if self.fits(unit_len, &stack_after) {
                self.append_all(unit);
                return;
            }
        }

        self.force_split(unit);
    }

    fn fits(&self, extra: usize, stack: &[OpenTag]) -> bool {
        self.current_len + extra + closing_len(stack) <= self.max_len
    }

    fn append_all(&mut self, tokens: &[Token<'_>]) {
        for token in tokens {
            self.append(token);
        }
    }

    fn append(&mut self, token: &Token<'_>) {
        match token {
            Token::Tag(raw) => {
                self.current.push_str(raw);
                self.current_len += token.len();
                apply_tag(&mut self.stack, raw);
            }
            Token::Char(c) => {
                self.current.push(*c);
                self.current_len += 1;
                self.has_content = true;
            }
        }
    }

    fn force_split(&mut self, unit: &[Token<'_>]) {
        self.last_break = None;

        for token in unit {
            match token {
                Token::Tag(raw) => {
                    let mut next = self.stack.clone();
                    apply_tag(&mut next, raw);
                    if !self.fits(token.len(), &next) && self.has_pending() {
                        self.flush();
                    }
                    self.append(token);
                }
                Token::Char(c) => {
                    if !self.fits(1, &self.stack) {
                        self.break_line();
                    }
                    self.append(token);
                    if is_break_char(*c) {
                        self.last_break = Some(BreakPoint {
                            byte_idx: self.current.len(),
                            char_len: self.current_len,
                            stack: self.stack.clone(),
                        });
                    }
                }
            }
        }
    }

    /// Start a new chunk, preferring the last break character in the final
    /// fifth of the budget over a hard cut at the current position
    fn break_line(&mut self) {
        let budget = self.max_len.saturating_sub(self.prefix_len);
        let min_break = self.prefix_len + budget * 4 / 5;

        if let Some(point) = self.last_break.take() {
            if point.char_len > self.prefix_len
                && point.char_len >= min_break
                && point.byte_idx < self.current.len()
            {
                let tail = self.current.split_off(point.byte_idx);
                let mut head = std::mem::take(&mut self.current);
                head.push_str(&closing_tags(&point.stack));
                self.chunks.push(head);

                let stack = std::mem::take(&mut self.stack);
                self.start_chunk(&point.stack);
                self.current_len += tail.chars().count();
                self.current.push_str(&tail);
                self.stack = stack;
                self.has_content = true;

                if self.fits(1, &self.stack) {
                    return;
                }
            }
        }

        if self.has_pending() {
            self.flush();
        }
    }

    /// Anything beyond the reopened tags, visible or not
    fn has_pending(&self) -> bool {
        self.current_len > self.prefix_len
    }

    fn flush(&mut self) {
        let mut chunk = std::mem::take(&mut self.current);
        chunk.push_str(&closing_tags(&self.stack));
        self.chunks.push(chunk);

        let stack = std::mem::take(&mut self.stack);
        self.start_chunk(&stack);
    }

    fn start_chunk(&mut self, stack: &[OpenTag]) {
        self.current = reopening_tags(stack);
        self.current_len = self.current.chars().count();
        self.prefix_len = self.current_len;
        self.has_content = false;
        self.stack = stack.to_vec();
        self.last_break = None;
    }

    fn finish(mut self) -> Vec<String> {
        if self.has_content {
            self.flush();
        }

        self.chunks
            .into_iter()
            .map(|chunk| chunk.trim().to_string())
            .filter(|chunk| !visible_text(chunk).trim().is_empty())
            .collect()
    }
}

/// Text with all tags removed
pub fn visible_text(text: &str) -> String {
    tokenize(text)
        .into_iter()
        .filter_map(|token| match token {
            Token::Char(c) => Some(c),
            Token::Tag(_) => None,
        })
        .collect()
}
