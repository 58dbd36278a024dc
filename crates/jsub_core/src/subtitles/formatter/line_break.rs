//! Japanese-aware line breaking.
//!
//! A break position `p` means "the line ends after `chars[p - 1]`".
//! Candidates are ranked by [`BreakClass`]; within the best class the
//! latest position wins, which keeps early lines full. Breaking never
//! drops characters, so the lines rejoin to the input text. The one
//! exception is a lone space that would form a line of its own, which can
//! only happen with one-char lines.

/// Sentence-final marks.
const SENTENCE_FINAL: &[char] = &['。', '！', '？', '!', '?', '．'];

/// Comma-like pauses.
const COMMAS: &[char] = &['、', '，', ','];

/// Closing brackets and quotes.
const CLOSING: &[char] = &[
    '」', '』', '）', ')', '】', '〉', '》', '〕', '］', ']', '｝', '”', '’',
];

/// Opening brackets and quotes.
const OPENING: &[char] = &[
    '「', '『', '（', '(', '【', '〈', '《', '〔', '［', '[', '｛', '“', '‘',
];

/// Other punctuation a line may end after.
const OTHER_PUNCT: &[char] = &['…', '‥', '・', '：', '；', ':', ';', '〜', '～', '―'];

/// Particles that commonly end a phrase.
const PARTICLES: &[char] = &['は', 'が', 'を', 'に', 'で', 'と', 'も', 'へ', 'の', 'や', 'か'];

/// Characters that must not start a line (kinsoku shori).
const NO_LINE_START: &[char] = &[
    '、', '。', '，', '．', ',', '.', '！', '？', '!', '?', '…', '‥', '・', '：', '；', 'ー',
    '〜', '～', 'ぁ', 'ぃ', 'ぅ', 'ぇ', 'ぉ', 'っ', 'ゃ', 'ゅ', 'ょ', 'ゎ', 'ゕ', 'ゖ', 'ァ',
    'ィ', 'ゥ', 'ェ', 'ォ', 'ッ', 'ャ', 'ュ', 'ョ', 'ヮ', 'ヵ', 'ヶ', 'ㇰ', 'ㇱ', 'ㇲ', 'ㇳ',
    'ㇴ', 'ㇵ', 'ㇶ', 'ㇷ', 'ㇸ', 'ㇹ', 'ㇺ', 'ㇻ', 'ㇼ', 'ㇽ', 'ㇾ', 'ㇿ', '々', 'ゝ', 'ゞ',
    'ヽ', 'ヾ',
];

/// Break quality, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BreakClass {
    SentenceEnd,
    Comma,
    Punctuation,
    Particle,
    ScriptChange,
    Space,
    Hard,
}

pub fn is_sentence_final(c: char) -> bool {
    SENTENCE_FINAL.contains(&c)
}

pub fn is_closing(c: char) -> bool {
    CLOSING.contains(&c)
}

fn is_opening(c: char) -> bool {
    OPENING.contains(&c)
}

fn is_hiragana(c: char) -> bool {
    ('\u{3041}'..='\u{309F}').contains(&c)
}

fn is_katakana(c: char) -> bool {
    ('\u{30A0}'..='\u{30FF}').contains(&c) || ('\u{31F0}'..='\u{31FF}').contains(&c)
}

fn is_kanji(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
        || ('\u{3400}'..='\u{4DBF}').contains(&c)
        || ('\u{F900}'..='\u{FAFF}').contains(&c)
        || c == '々'
}

/// Japanese script or full-width punctuation (not space separated).
pub fn is_cjk(c: char) -> bool {
    is_hiragana(c)
        || is_katakana(c)
        || is_kanji(c)
        || ('\u{3000}'..='\u{303F}').contains(&c)
        || ('\u{FF00}'..='\u{FFEF}').contains(&c)
}

fn no_line_start(c: char) -> bool {
    NO_LINE_START.contains(&c) || is_closing(c)
}

/// Classify the break between `chars[p - 1]` and `chars[p]`.
fn classify(chars: &[char], p: usize) -> BreakClass {
    let prev = chars[p - 1];
    let next = chars[p];
    let before_prev = p.checked_sub(2).map(|i| chars[i]);

    if is_sentence_final(prev)
        || (is_closing(prev) && before_prev.is_some_and(is_sentence_final))
    {
        BreakClass::SentenceEnd
    } else if COMMAS.contains(&prev) {
        BreakClass::Comma
    } else if OTHER_PUNCT.contains(&prev) || is_closing(prev) || is_opening(next) {
        BreakClass::Punctuation
    } else if PARTICLES.contains(&prev) && before_prev.is_some_and(|c| !is_hiragana(c)) {
        BreakClass::Particle
    } else if is_hiragana(prev)
        && (is_kanji(next) || is_katakana(next) || next.is_ascii_alphanumeric())
    {
        BreakClass::ScriptChange
    } else if prev.is_whitespace() {
        BreakClass::Space
    } else {
        BreakClass::Hard
    }
}

/// Whether breaking at `p` would leave a line with nothing visible on it.
fn blank_prefix(chars: &[char], p: usize) -> bool {
    chars[..p].iter().all(|c| c.is_whitespace())
}

/// Best soft break in `lo..=hi`, latest within the best class.
fn best_candidate(chars: &[char], lo: usize, hi: usize) -> Option<usize> {
    (lo..=hi)
        .filter(|&p| p > 0 && p < chars.len())
        .filter(|&p| !no_line_start(chars[p]) && !blank_prefix(chars, p))
        .map(|p| (classify(chars, p), p))
        .filter(|(class, _)| *class != BreakClass::Hard)
        .min_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
        .map(|(_, p)| p)
}

/// Pick a break position within `lo..=hi` (`1 <= lo <= hi < chars.len()`).
///
/// The upper two thirds of the window are searched first so lines stay
/// reasonably full; then the whole window; then a hard break at `hi`,
/// moved back while the next line would start with a forbidden character.
pub fn find_break(chars: &[char], lo: usize, hi: usize) -> usize {
    let upper = lo + (hi - lo) / 3;
    if let Some(p) = best_candidate(chars, upper, hi) {
        return p;
    }
    if let Some(p) = best_candidate(chars, lo, upper) {
        return p;
    }

    let mut p = hi;
    while p > lo && (no_line_start(chars[p]) || blank_prefix(chars, p)) {
        p -= 1;
    }
    if no_line_start(chars[p]) || blank_prefix(chars, p) {
        hi
    } else {
        p
    }
}

/// Split text into at most `max_lines` lines of at most `max_len` chars.
///
/// The caller guarantees the text fits (`len <= max_len * max_lines`).
/// No line is blank: SRT readers take a whitespace-only line as the end of
/// the entry.
pub fn break_lines(text: &str, max_len: usize, max_lines: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut lines = Vec::with_capacity(max_lines);
    let mut pos = 0;

    while pos < chars.len() {
        let remaining = chars.len() - pos;
        if remaining <= max_len || lines.len() + 1 >= max_lines {
            push_line(&mut lines, &chars[pos..]);
            break;
        }

        let lines_after = max_lines - lines.len() - 1;
        let lo = remaining.saturating_sub(lines_after * max_len).max(1);
        let hi = max_len;
        let cut = find_break(&chars[pos..], lo, hi);

        push_line(&mut lines, &chars[pos..pos + cut]);
        pos += cut;
    }

    lines
}

/// A whitespace-only piece (only possible with one-char lines) is dropped.
fn push_line(lines: &mut Vec<String>, chars: &[char]) {
    if chars.iter().any(|c| !c.is_whitespace()) {
        lines.push(chars.iter().collect());
    }
}

/// Cut text longer than `capacity` into chunks of at most `capacity` chars
/// at the best available break points. Chunks are trimmed; empty ones are
/// dropped.
pub fn split_chunks(text: &str, capacity: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut pos = 0;

    while chars.len() - pos > capacity {
        let cut = find_break(&chars[pos..], 1, capacity);
        push_trimmed(&mut chunks, &chars[pos..pos + cut]);
        pos += cut;
    }
    push_trimmed(&mut chunks, &chars[pos..]);

    chunks
}

fn push_trimmed(chunks: &mut Vec<String>, chars: &[char]) {
    let s: String = chars.iter().collect();
    let s = s.trim();
    if !s.is_empty() {
        chunks.push(s.to_string());
    }
}

/// Cut text to `capacity` chars ending in an ellipsis.
pub fn truncate(text: &str, capacity: usize) -> String {
    let keep = capacity.saturating_sub(1);
    let prefix: String = text.chars().take(keep).collect();
    format!("{}…", prefix.trim_end())
}
