//! Tonal pinyin transliteration and phonetic sort keys.

use crate::poem::PoemRecord;
use pinyin::ToPinyin;
use unicode_normalization::UnicodeNormalization;

/// Transliterate `text` into tone-marked pinyin.
///
/// Each Han character becomes one syllable. Runs of anything else (latin,
/// digits, punctuation) are kept verbatim as a single token. Tokens are joined
/// with one space, so `"床前明月光，"` becomes `"chuáng qián míng yuè guāng ，"`.
pub fn transliterate(text: &str) -> String {
    tokens(text).join(" ")
}

/// Phonetic comparison key. Orders by the toneless reading first; tones only
/// break ties between identical readings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey {
    base: String,
    tones: String,
}

/// Build the key for `text`: syllables concatenated, NFKC-folded and
/// lowercased, once without tones and once with tone numbers.
pub fn sort_key(text: &str) -> SortKey {
    let mut base = String::new();
    let mut tones = String::new();
    let mut run = String::new();
    for ch in text.chars() {
        match ch.to_pinyin() {
            Some(syllable) => {
                push_folded(&mut run, &mut base, &mut tones);
                base.push_str(syllable.plain());
                tones.push_str(syllable.with_tone_num_end());
            }
            None => run.push(ch),
        }
    }
    push_folded(&mut run, &mut base, &mut tones);
    SortKey { base, tones }
}

fn push_folded(run: &mut String, base: &mut String, tones: &mut String) {
    let trimmed = run.trim();
    if !trimmed.is_empty() {
        let folded = trimmed.nfkc().collect::<String>().to_lowercase();
        base.push_str(&folded);
        tones.push_str(&folded);
    }
    run.clear();
}

/// Fill in missing pinyin on a record.
///
/// `title_pinyin` is derived when empty. `content_pinyin` is derived line by
/// line when it is empty, all blank, or not aligned with `content`. Existing
/// usable annotations are never touched, so applying this twice is the same
/// as applying it once.
pub fn ensure_pinyin(mut record: PoemRecord) -> PoemRecord {
    if record.title_pinyin.trim().is_empty() {
        record.title_pinyin = transliterate(&record.title);
    }
    if !record.has_aligned_pinyin() {
        record.content_pinyin = record.content.iter().map(|line| transliterate(line)).collect();
    }
    record
}

fn tokens(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut run = String::new();
    for ch in text.chars() {
        match ch.to_pinyin() {
            Some(syllable) => {
                flush_run(&mut run, &mut out);
                out.push(syllable.with_tone().to_string());
            }
            None => run.push(ch),
        }
    }
    flush_run(&mut run, &mut out);
    out
}

fn flush_run(run: &mut String, out: &mut Vec<String>) {
    let trimmed = run.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
    run.clear();
}
