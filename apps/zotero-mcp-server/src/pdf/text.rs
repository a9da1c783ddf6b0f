//! Text normalization for extracted PDF pages
//!
//! Raw page text from the extractor carries layout artifacts: hard line
//! breaks inside sentences, words split by hyphenation, runs of spaces,
//! ligature code points and stray control characters. [`format_pdf_text`]
//! turns a sequence of raw pages into plain paragraphs:
//!
//! 1. `\r\n`, `\r` and form feeds become line breaks, other control
//!    characters and soft hyphens are dropped, ligatures are expanded.
//! 2. Horizontal whitespace collapses to a single space; lines are trimmed.
//! 3. Consecutive non-blank lines form one paragraph, joined with a space.
//!    A line ending in `letter-` followed by a lowercase start is rejoined
//!    without the hyphen.
//! 4. Paragraphs are separated by one blank line.
//! 5. Between two pages a `--- Page N ---` paragraph is inserted, N being the
//!    1-based number of the page that follows.
//!
//! The output is a fixed point: formatting it again returns it unchanged.

const PARAGRAPH_BREAK: &str = "\n\n";

/// Marker paragraph placed before page `number` (1-based)
pub fn page_marker(number: usize) -> String {
    format!("--- Page {number} ---")
}

/// Normalize raw per-page text into a single readable string
pub fn format_pdf_text<S: AsRef<str>>(pages: &[S]) -> String {
    let mut paragraphs = Vec::new();
    for (index, page) in pages.iter().enumerate() {
        if index > 0 {
            paragraphs.push(page_marker(index + 1));
        }
        paragraphs.extend(page_paragraphs(page.as_ref()));
    }
    paragraphs.join(PARAGRAPH_BREAK)
}

fn page_paragraphs(raw: &str) -> Vec<String> {
    let cleaned = clean_characters(raw);
    let mut paragraphs = Vec::new();
    let mut current = String::new();

    for line in cleaned.split('\n') {
        let line = collapse_whitespace(line);
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
            continue;
        }
        append_line(&mut current, &line);
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }
    paragraphs
}

fn append_line(paragraph: &mut String, line: &str) {
    if paragraph.is_empty() {
        paragraph.push_str(line);
        return;
    }
    let continues_word = ends_with_word_hyphen(paragraph)
        && line.chars().next().is_some_and(char::is_lowercase);
    if continues_word {
        paragraph.pop();
    } else {
        paragraph.push(' ');
    }
    paragraph.push_str(line);
}

fn ends_with_word_hyphen(text: &str) -> bool {
    let mut chars = text.chars().rev();
    chars.next() == Some('-') && chars.next().is_some_and(char::is_alphabetic)
}

fn collapse_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clean_characters(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() != Some(&'\n') {
                    out.push('\n');
                }
            }
            '\n' | '\u{c}' | '\u{2028}' | '\u{2029}' => out.push('\n'),
            '\u{ad}' => {}
            '\u{fb00}' => out.push_str("ff"),
            '\u{fb01}' => out.push_str("fi"),
            '\u{fb02}' => out.push_str("fl"),
            '\u{fb03}' => out.push_str("ffi"),
            '\u{fb04}' => out.push_str("ffl"),
            c if c.is_whitespace() => out.push(' '),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}
