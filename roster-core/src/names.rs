//! Display-name cleanup.
//!
//! Published names carry decoration the directory does not: an age suffix
//! like `（24）`, stray spaces, emoji, full- and half-width forms, and katakana
//! where the directory spells the name in hiragana. [`lookup_key`] folds all
//! of that away; [`strip_annotation`] only removes the suffix and surrounding
//! whitespace, for the label that gets stored.

use unicode_normalization::UnicodeNormalization;

/// Remove trailing parenthetical annotations and surrounding whitespace.
///
/// `"みか（24）"` → `"みか"`, `" Rin (new) "` → `"Rin"`.
pub fn strip_annotation(raw: &str) -> &str {
    let mut s = raw.trim();
    loop {
        let Some(last) = s.chars().last() else { return s };
        let open = match last {
            ')' => '(',
            '）' => '（',
            ']' => '[',
            '】' => '【',
            _ => return s,
        };
        match s.rfind(open) {
            Some(idx) => s = s[..idx].trim_end(),
            None => return s,
        }
    }
}

/// Normalise a display name into the key used for directory lookup.
///
/// NFKC runs first, so `ＲＩＮ` becomes `RIN` and `ﾐｶ` becomes `ミカ` before
/// the kana fold.
pub fn lookup_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut depth = 0usize;
    for ch in raw.nfkc() {
        match ch {
            '(' | '[' | '【' => depth += 1,
            ')' | ']' | '】' => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            c if c.is_whitespace() || c.is_ascii_digit() => {}
            c if c.is_alphanumeric() => out.push(katakana_to_hiragana(c).to_ascii_lowercase()),
            _ => {}
        }
    }
    out
}

/// Whether an unmatched candidate is a label rather than a person's name.
pub fn looks_like_label(raw: &str) -> bool {
    raw.contains("時間") || raw.chars().count() >= 15
}

fn katakana_to_hiragana(c: char) -> char {
    match c {
        '\u{30A1}'..='\u{30F6}' => char::from_u32(c as u32 - 0x60).unwrap_or(c),
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("みか（24）", "みか")]
    #[case("みか (24)", "みか")]
    #[case("  Rin (new) ", "Rin")]
    #[case("あい【体験】（20）", "あい")]
    #[case("(24)", "")]
    #[case("ゆき", "ゆき")]
    #[case("Mi(k)a", "Mi(k)a")]
    fn strips_trailing_annotations(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(strip_annotation(raw), expected);
    }

    #[rstest]
    #[case("ミカ", "みか")]
    #[case("みか（24）", "みか")]
    #[case("み か", "みか")]
    #[case("みか\u{3000}", "みか")]
    #[case("みか♡", "みか")]
    #[case("ＲＩＮ", "rin")]
    #[case("Rin 22", "rin")]
    #[case("ユーリ", "ゆーり")]
    #[case("[NEW]さくら", "さくら")]
    #[case("ﾐｶ", "みか")]
    #[case("ｶﾞｸ", "がく")]
    #[case("【体験】ﾕｷ（２２）", "ゆき")]
    fn folds_names_into_lookup_keys(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(lookup_key(raw), expected);
    }

    #[test]
    fn katakana_and_hiragana_share_a_key() {
        assert_eq!(lookup_key("サクラ（19）"), lookup_key("さくら"));
        assert_eq!(lookup_key("ｻｸﾗ"), lookup_key("さくら"));
    }

    #[test]
    fn labels_are_recognised() {
        assert!(looks_like_label("出勤時間"));
        assert!(looks_like_label("本日の出勤キャスト一覧はこちらになります"));
        assert!(!looks_like_label("みか"));
    }
}
