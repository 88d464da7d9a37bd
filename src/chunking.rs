//! Structure-aware document chunking.
//!
//! Splitting happens in two stages:
//!
//! 1. Section detection: a [`SectionMatcher`] locates section header lines,
//!    and the text is cut into labeled sections when at least two headers
//!    match. With fewer matches the document is treated as unstructured.
//! 2. Sentence packing: sections longer than the configured maximum are
//!    split into sentences and packed greedily, carrying the trailing
//!    sentences of each chunk into the next one as overlap.
//!
//! All sizes are measured in characters, not bytes.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::config::ChunkConfig;
use crate::document::ChunkKind;

/// Zero-width characters stripped during normalization.
const ZERO_WIDTH: [char; 4] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}'];

/// Normalize raw document text before chunking.
///
/// Converts CRLF and bare CR line endings to LF, strips zero-width
/// characters, collapses runs of spaces and tabs into a single space,
/// caps consecutive newlines at two, and trims the result.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    let mut newline_run = 0usize;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        let ch = match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                '\n'
            }
            other => other,
        };
        if ZERO_WIDTH.contains(&ch) {
            continue;
        }
        match ch {
            '\n' => {
                pending_space = false;
                if newline_run < 2 {
                    out.push('\n');
                }
                newline_run += 1;
            }
            ' ' | '\t' => {
                pending_space = true;
            }
            other => {
                if pending_space && !out.is_empty() && !out.ends_with('\n') {
                    out.push(' ');
                }
                pending_space = false;
                newline_run = 0;
                out.push(other);
            }
        }
    }

    out.trim().to_string()
}

// ── Sentence splitting ──────────────────────────────────────────────────────

/// Minimum length in characters a fragment must reach before a terminator
/// may close it. Shorter fragments are merged into the next sentence.
const MIN_SENTENCE_CHARS: usize = 10;

/// Hangul syllables that legitimately end a Korean sentence before a
/// period. A period after any other syllable is treated as mid-sentence
/// punctuation (list numbering, versions, and similar).
const SENTENCE_FINAL_SYLLABLES: [char; 9] =
    ['다', '요', '죠', '까', '니', '함', '음', '임', '됨'];

/// Latin abbreviations that do not terminate a sentence.
const ABBREVIATIONS: [&str; 10] =
    ["etc", "e.g", "i.e", "vs", "dr", "mr", "ms", "jr", "sr", "no"];

fn is_terminator(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | '。' | '！' | '？')
}

fn is_hangul_syllable(ch: char) -> bool {
    ('\u{AC00}'..='\u{D7A3}').contains(&ch)
}

/// The lowercased Latin word (possibly with inner periods, as in `e.g`)
/// immediately preceding the fragment's trailing period.
fn trailing_word(fragment: &str) -> String {
    // The fragment ends with an ASCII '.', safe to slice off one byte.
    let body = &fragment[..fragment.len() - 1];
    let mut reversed: Vec<char> = Vec::new();
    for ch in body.chars().rev() {
        if ch.is_ascii_alphabetic() || ch == '.' {
            reversed.push(ch.to_ascii_lowercase());
        } else {
            break;
        }
    }
    reversed.into_iter().rev().collect()
}

/// Whether the fragment's trailing terminator is a true sentence end.
fn ends_sentence(fragment: &str) -> bool {
    let mut rev = fragment.chars().rev();
    let terminator = match rev.next() {
        Some(ch) => ch,
        None => return false,
    };
    if terminator != '.' {
        return true;
    }
    let prev = match rev.next() {
        Some(ch) => ch,
        None => return false,
    };
    if prev.is_ascii_digit() {
        // Decimal or list numbering, as in "3.5" or "1.".
        return false;
    }
    if is_hangul_syllable(prev) {
        return SENTENCE_FINAL_SYLLABLES.contains(&prev);
    }
    if prev.is_ascii_alphabetic() {
        let word = trailing_word(fragment);
        if word.chars().filter(|ch| ch.is_ascii_alphabetic()).count() <= 1 {
            // A single initial, as in "J.".
            return false;
        }
        return !ABBREVIATIONS.contains(&word.as_str());
    }
    true
}

/// Split text into sentences.
///
/// A sentence ends at a terminator (`.`, `!`, `?`, and their fullwidth
/// forms) once the fragment has reached a minimum length, with guards
/// against decimals, single initials, common Latin abbreviations, and
/// periods following non-final Hangul syllables. Newlines always end the
/// current sentence. Returned sentences are trimmed and non-empty.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut buf = String::new();
    let mut buf_chars = 0usize;

    for ch in text.chars() {
        if ch == '\n' {
            flush_sentence(&mut buf, &mut sentences);
            buf_chars = 0;
            continue;
        }
        buf.push(ch);
        buf_chars += 1;
        if is_terminator(ch) && buf_chars >= MIN_SENTENCE_CHARS && ends_sentence(&buf) {
            flush_sentence(&mut buf, &mut sentences);
            buf_chars = 0;
        }
    }
    flush_sentence(&mut buf, &mut sentences);
    sentences
}

fn flush_sentence(buf: &mut String, out: &mut Vec<String>) {
    let trimmed = buf.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
    buf.clear();
}

// ── Section detection ───────────────────────────────────────────────────────

/// A detected section header within normalized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionBoundary {
    /// Byte offset of the header line's start within the text.
    pub offset: usize,
    /// Trimmed text of the matched header line, used as the section label.
    pub label: String,
}

/// A strategy for locating section headers in a document.
///
/// Implementations encapsulate the language- and convention-specific
/// header patterns; the packing algorithm never inspects the text itself,
/// so new document conventions only need a new matcher.
pub trait SectionMatcher: Send + Sync {
    /// Locate section header lines, in document order.
    fn boundaries(&self, text: &str) -> Vec<SectionBoundary>;

    /// Label applied to text that precedes the first matched header.
    fn intro_label(&self) -> &str {
        "introduction"
    }
}

/// Section headers conventional in Korean job application documents.
///
/// Matches a line consisting of one of the standard headings (지원동기,
/// 성장과정, 경력/경험, 입사 후 포부, 장단점), optionally preceded by
/// numbering (`1.`, `2)`) or a bullet, and optionally followed by a colon.
pub struct KoreanSectionMatcher {
    header: Regex,
}

/// A line that is exactly a known heading, with optional numbering or
/// bullet prefix and optional trailing colon.
const KOREAN_HEADER_PATTERN: &str = r"(?x)
    ^\s*
    (?: \d+ \s* [.)] \s* | [-*•] \s* )?
    (?:
        지원\s*동기
      | 성장\s*과정
      | (?: 주요\s* | 업무\s* )? 경[력험] (?: \s* (?: 및 | · | / ) \s* 경[력험] )?
      | (?: 입사\s*후\s* )? 포부
      | (?: 성격의?\s* )? 장단점
    )
    \s* [:：]? \s*$";

impl KoreanSectionMatcher {
    /// Create a matcher for the standard Korean application headings.
    pub fn new() -> Self {
        let header = Regex::new(KOREAN_HEADER_PATTERN).expect("header pattern compiles");
        Self { header }
    }
}

impl Default for KoreanSectionMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl SectionMatcher for KoreanSectionMatcher {
    fn boundaries(&self, text: &str) -> Vec<SectionBoundary> {
        let mut found = Vec::new();
        let mut offset = 0;
        for raw_line in text.split_inclusive('\n') {
            let line = raw_line.strip_suffix('\n').unwrap_or(raw_line);
            if !line.is_empty() && self.header.is_match(line) {
                found.push(SectionBoundary { offset, label: line.trim().to_string() });
            }
            offset += raw_line.len();
        }
        found
    }
}

// ── Chunking ────────────────────────────────────────────────────────────────

/// A chunk cut from a document, before embedding and persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkDraft {
    /// The text content of the chunk.
    pub text: String,
    /// Zero-based position of this chunk within the document.
    pub index: usize,
    /// Total number of chunks produced from the document.
    pub total: usize,
    /// Label of the section this chunk was cut from, if any.
    pub section: Option<String>,
    /// Whether the chunk is a header, body content, or both.
    pub kind: ChunkKind,
    /// Character count of `text`.
    pub char_count: usize,
    /// Estimated token count of `text`.
    pub token_estimate: usize,
}

/// A labeled region of the document produced by section detection.
struct Section {
    label: Option<String>,
    /// The header line at the start of `text`, when the section has one.
    header: Option<String>,
    text: String,
}

/// Splits documents into retrieval-sized chunks along section and sentence
/// boundaries.
///
/// Text is normalized, cut into sections by the configured
/// [`SectionMatcher`], and each section is packed into chunks of at most
/// `max_chunk_size` characters; only a single sentence longer than the
/// maximum is ever emitted whole. Re-chunking identical text yields an
/// identical chunk sequence.
#[derive(Clone)]
pub struct StructuredChunker {
    config: ChunkConfig,
    matcher: Arc<dyn SectionMatcher>,
}

impl fmt::Debug for StructuredChunker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuredChunker").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Default for StructuredChunker {
    fn default() -> Self {
        Self::new(ChunkConfig::default())
    }
}

impl StructuredChunker {
    /// Create a chunker with the given sizing and the Korean section matcher.
    pub fn new(config: ChunkConfig) -> Self {
        Self { config, matcher: Arc::new(KoreanSectionMatcher::new()) }
    }

    /// Replace the section matcher.
    pub fn with_matcher(mut self, matcher: Arc<dyn SectionMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    /// The sizing configuration this chunker was built with.
    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Split a document's text into chunks.
    ///
    /// Returns an empty `Vec` when the text is empty or whitespace-only.
    pub fn chunk(&self, text: &str) -> Vec<ChunkDraft> {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return Vec::new();
        }

        let boundaries = self.matcher.boundaries(&normalized);
        let mut packed = Vec::new();
        if boundaries.len() >= 2 {
            for section in cut_sections(&normalized, &boundaries, self.matcher.intro_label()) {
                self.pack_section(&section, &mut packed);
            }
        } else {
            let section = Section { label: None, header: None, text: normalized };
            self.pack_section(&section, &mut packed);
        }

        let total = packed.len();
        packed
            .into_iter()
            .enumerate()
            .map(|(index, (text, section, kind))| {
                let char_count = text.chars().count();
                let token_estimate = estimate_tokens(char_count, self.config.chars_per_token);
                ChunkDraft { text, index, total, section, kind, char_count, token_estimate }
            })
            .collect()
    }

    /// Pack one section into chunks, whole when it fits, otherwise by
    /// greedy sentence packing with overlap.
    fn pack_section(&self, section: &Section, out: &mut Vec<(String, Option<String>, ChunkKind)>) {
        if section.text.chars().count() <= self.config.max_chunk_size {
            let kind = classify(&section.text, section.header.as_deref());
            out.push((section.text.clone(), section.label.clone(), kind));
            return;
        }

        let sentences = split_sentences(&section.text);
        let mut current: Vec<String> = Vec::new();
        let mut current_chars = 0usize;

        let emit =
            |buf: &mut Vec<String>, chars: &mut usize, out: &mut Vec<_>, seed_window: usize| {
                if buf.is_empty() {
                    return;
                }
                let text = buf.join(" ");
                let kind = classify(&text, section.header.as_deref());
                out.push((text, section.label.clone(), kind));
                let (seed, seed_chars) = overlap_tail(buf, seed_window);
                *buf = seed;
                *chars = seed_chars;
            };

        for sentence in sentences {
            let sentence_chars = sentence.chars().count();

            // An over-long sentence becomes its own chunk, never split.
            if sentence_chars >= self.config.max_chunk_size {
                if !current.is_empty() {
                    emit(&mut current, &mut current_chars, out, self.config.overlap_size);
                }
                current.clear();
                current.push(sentence);
                current_chars = sentence_chars;
                emit(&mut current, &mut current_chars, out, self.config.overlap_size);
                continue;
            }

            let prospective = if current.is_empty() {
                sentence_chars
            } else {
                current_chars + 1 + sentence_chars
            };
            if !current.is_empty() && prospective > self.config.max_chunk_size {
                // The seed keeps only what leaves room for the closing
                // sentence; the maximum wins over the minimum here.
                let seed_window = self
                    .config
                    .overlap_size
                    .min(self.config.max_chunk_size - sentence_chars - 1);
                emit(&mut current, &mut current_chars, out, seed_window);
            }

            if current.is_empty() {
                current_chars = sentence_chars;
            } else {
                current_chars += 1 + sentence_chars;
            }
            current.push(sentence);
        }

        if !current.is_empty() {
            let text = current.join(" ");
            let kind = classify(&text, section.header.as_deref());
            out.push((text, section.label.clone(), kind));
        }
    }
}

/// Cut normalized text into labeled sections at the matched boundaries.
/// Text before the first boundary becomes an intro section.
fn cut_sections(text: &str, boundaries: &[SectionBoundary], intro_label: &str) -> Vec<Section> {
    let mut sections = Vec::new();

    let first_offset = boundaries[0].offset;
    if first_offset > 0 {
        let lead = text[..first_offset].trim();
        if !lead.is_empty() {
            sections.push(Section {
                label: Some(intro_label.to_string()),
                header: None,
                text: lead.to_string(),
            });
        }
    }

    for (i, boundary) in boundaries.iter().enumerate() {
        let end = boundaries.get(i + 1).map_or(text.len(), |next| next.offset);
        let body = text[boundary.offset..end].trim();
        if body.is_empty() {
            continue;
        }
        sections.push(Section {
            label: Some(boundary.label.clone()),
            header: Some(boundary.label.clone()),
            text: body.to_string(),
        });
    }

    sections
}

/// The trailing sentences of `sentences` whose joined length stays within
/// `window` characters. May be empty when the last sentence alone exceeds
/// the window.
fn overlap_tail(sentences: &[String], window: usize) -> (Vec<String>, usize) {
    let mut seed: Vec<String> = Vec::new();
    let mut seed_chars = 0usize;
    for sentence in sentences.iter().rev() {
        let sentence_chars = sentence.chars().count();
        let prospective =
            if seed.is_empty() { sentence_chars } else { seed_chars + 1 + sentence_chars };
        if prospective > window {
            break;
        }
        seed.push(sentence.clone());
        seed_chars = prospective;
    }
    seed.reverse();
    (seed, seed_chars)
}

/// Classify a chunk against its section's header line.
fn classify(text: &str, header: Option<&str>) -> ChunkKind {
    match header {
        Some(h) if text == h => ChunkKind::Header,
        Some(h) if text.starts_with(h) => ChunkKind::Mixed,
        _ => ChunkKind::Content,
    }
}

fn estimate_tokens(char_count: usize, chars_per_token: f32) -> usize {
    (char_count as f32 / chars_per_token).ceil() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_unifies_line_endings() {
        assert_eq!(normalize_text("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn normalize_strips_zero_width_and_collapses_spaces() {
        assert_eq!(normalize_text("지원\u{200B}동기   및\t 포부"), "지원동기 및 포부");
    }

    #[test]
    fn normalize_caps_blank_lines() {
        assert_eq!(normalize_text("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn normalize_drops_trailing_and_leading_whitespace() {
        assert_eq!(normalize_text("  안녕하세요  \n\n"), "안녕하세요");
    }

    #[test]
    fn sentences_split_on_korean_finals() {
        let sentences = split_sentences("저는 백엔드 개발자입니다. 서울에서 일하고 있어요.");
        assert_eq!(sentences, vec!["저는 백엔드 개발자입니다.", "서울에서 일하고 있어요."]);
    }

    #[test]
    fn sentences_keep_decimals_together() {
        let sentences = split_sentences("매출을 약 3.5배 성장시켰습니다. 다음 목표가 있습니다.");
        assert_eq!(sentences.len(), 2);
        assert!(sentences[0].contains("3.5배"));
    }

    #[test]
    fn sentences_keep_abbreviations_together() {
        let sentences = split_sentences("Worked on infra, e.g. CI pipelines and deploys.");
        assert_eq!(sentences.len(), 1);
    }

    #[test]
    fn sentences_keep_initials_together() {
        let sentences = split_sentences("Reported to J. Kim during the internship period.");
        assert_eq!(sentences.len(), 1);
    }

    #[test]
    fn period_after_non_final_syllable_does_not_split() {
        let sentences = split_sentences("React 3년차. 주요 업무는 프론트엔드 개발이었습니다.");
        assert_eq!(sentences.len(), 1);
    }

    #[test]
    fn short_fragments_merge_into_next_sentence() {
        let sentences = split_sentences("좋다. 정말 좋은 회사라고 생각합니다.");
        assert_eq!(sentences.len(), 1);
    }

    #[test]
    fn newline_is_a_hard_sentence_break() {
        let sentences = split_sentences("1. 지원동기\n열정적인 개발자입니다.");
        assert_eq!(sentences, vec!["1. 지원동기", "열정적인 개발자입니다."]);
    }

    #[test]
    fn matcher_finds_numbered_and_bulleted_headers() {
        let matcher = KoreanSectionMatcher::new();
        let text = "1. 지원동기\n본문\n- 성장과정\n본문\n입사 후 포부:\n본문";
        let found = matcher.boundaries(text);
        let labels: Vec<&str> = found.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["1. 지원동기", "- 성장과정", "입사 후 포부:"]);
    }

    #[test]
    fn matcher_ignores_inline_mentions() {
        let matcher = KoreanSectionMatcher::new();
        let found = matcher.boundaries("지원동기에 대해 길게 설명하자면 다음과 같습니다.");
        assert!(found.is_empty());
    }

    #[test]
    fn matcher_finds_career_header_variants() {
        let matcher = KoreanSectionMatcher::new();
        let text = "2) 주요 경력\n내용\n3. 경력 및 경험\n내용";
        assert_eq!(matcher.boundaries(text).len(), 2);
    }

    #[test]
    fn chunker_returns_empty_for_blank_input() {
        let chunker = StructuredChunker::default();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n\n  ").is_empty());
    }

    #[test]
    fn single_section_header_falls_back_to_plain_packing() {
        let chunker = StructuredChunker::default();
        let chunks = chunker.chunk("1. 지원동기\n열정적인 개발자입니다.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section, None);
        assert_eq!(chunks[0].kind, ChunkKind::Content);
    }

    #[test]
    fn two_sections_become_labeled_chunks() {
        let chunker = StructuredChunker::default();
        let chunks = chunker.chunk("1. 지원동기\n열정적인 개발자입니다.\n\n2. 경력\nReact 3년차.");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].section.as_deref(), Some("1. 지원동기"));
        assert_eq!(chunks[0].kind, ChunkKind::Mixed);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].total, 2);
        assert_eq!(chunks[1].section.as_deref(), Some("2. 경력"));
        assert_eq!(chunks[1].text, "2. 경력\nReact 3년차.");
    }

    #[test]
    fn text_before_first_header_gets_intro_label() {
        let chunker = StructuredChunker::default();
        let chunks = chunker.chunk("안녕하세요, 소개글입니다.\n\n1. 지원동기\n내용\n\n2. 포부\n내용");
        assert_eq!(chunks[0].section.as_deref(), Some("introduction"));
        assert_eq!(chunks[0].kind, ChunkKind::Content);
    }

    #[test]
    fn header_only_section_is_classified_as_header() {
        let chunker = StructuredChunker::default();
        let chunks = chunker.chunk("1. 지원동기\n\n2. 경력\n내용이 이어집니다.");
        assert_eq!(chunks[0].kind, ChunkKind::Header);
        assert_eq!(chunks[0].text, "1. 지원동기");
    }

    #[test]
    fn over_long_sentence_is_emitted_verbatim() {
        let config = ChunkConfig::builder()
            .max_chunk_size(50)
            .min_chunk_size(10)
            .overlap_size(10)
            .build()
            .unwrap();
        let chunker = StructuredChunker::new(config);
        let long = "가".repeat(120);
        let chunks = chunker.chunk(&long);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].char_count, 120);
    }

    #[test]
    fn char_counts_use_characters_not_bytes() {
        let chunker = StructuredChunker::default();
        let chunks = chunker.chunk("한국어 텍스트입니다.");
        assert_eq!(chunks[0].char_count, "한국어 텍스트입니다.".chars().count());
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(5, 2.5), 2);
        assert_eq!(estimate_tokens(6, 2.5), 3);
        assert_eq!(estimate_tokens(1, 2.5), 1);
        assert_eq!(estimate_tokens(0, 2.5), 0);
    }

    #[test]
    fn long_section_packs_with_overlap() {
        let config = ChunkConfig::builder()
            .max_chunk_size(80)
            .min_chunk_size(20)
            .overlap_size(30)
            .build()
            .unwrap();
        let chunker = StructuredChunker::new(config);
        let text = (0..8)
            .map(|i| format!("문장 번호 {i}번이 여기에 있습니다."))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunker.chunk(&text);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let first_sentence = split_sentences(&pair[1].text).remove(0);
            assert!(
                pair[0].text.ends_with(&first_sentence),
                "expected overlap between consecutive chunks"
            );
        }
    }

    #[test]
    fn overlap_seed_leaves_room_for_the_closing_sentence() {
        let config = ChunkConfig::builder()
            .max_chunk_size(80)
            .min_chunk_size(20)
            .overlap_size(40)
            .build()
            .unwrap();
        let chunker = StructuredChunker::new(config);
        let first = format!("{}.", ["gale"; 6].join(" "));
        let second = format!("{}.", ["rain"; 6].join(" "));
        let third = format!("{}.", ["breeze"; 9].join(" "));
        let chunks = chunker.chunk(&format!("{first} {second} {third}"));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, format!("{first} {second}"));
        assert_eq!(chunks[1].text, third);
        for chunk in &chunks {
            assert!(chunk.char_count <= 80, "chunk of {} chars exceeds max", chunk.char_count);
        }
    }

    #[test]
    fn undersized_chunk_closes_rather_than_exceed_max() {
        let config = ChunkConfig::builder()
            .max_chunk_size(80)
            .min_chunk_size(20)
            .overlap_size(40)
            .build()
            .unwrap();
        let chunker = StructuredChunker::new(config);
        let long = format!("{}.", ["stream"; 10].join(" "));
        let chunks = chunker.chunk(&format!("tiny fork. {long}"));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "tiny fork.");
        assert_eq!(chunks[1].text, long);
        assert!(chunks.iter().all(|chunk| chunk.char_count <= 80));
    }
}
