//! OCR output cleanup.
//!
//! Recognised text regularly arrives with UTF-8-decoded-as-Latin-1 mojibake
//! (scanner firmware and older OCR layers both produce it) plus the usual
//! recognition noise. The rules run in a fixed order: mojibake repair first,
//! because every later rule assumes the text is already sane UTF-8, then
//! whitespace normalisation, then garbage-line removal.

use once_cell::sync::Lazy;
use regex::Regex;

/// Mojibake sequences and their intended characters. The left-hand side is
/// what a UTF-8 byte sequence looks like after a wrong Latin-1 decode.
const MOJIBAKE: &[(&str, &str)] = &[
    ("\u{e2}\u{20ac}\u{153}", "\u{201c}"),  // â€œ → "
    ("\u{e2}\u{20ac}\u{9d}", "\u{201d}"),   // â€? → "
    ("\u{e2}\u{20ac}\u{2122}", "\u{2019}"), // â€™ → '
    ("\u{e2}\u{20ac}\u{2dc}", "\u{2018}"),  // â€˜ → '
    ("\u{e2}\u{20ac}\u{201d}", "\u{2014}"), // â€" → em dash
    ("\u{e2}\u{20ac}\u{201c}", "\u{2013}"), // â€" → en dash
    ("\u{e2}\u{20ac}\u{a6}", "\u{2026}"),   // â€¦ → …
    ("\u{e2}\u{20ac}\u{a2}", "\u{2022}"),   // â€¢ → •
    ("\u{e2}\u{201a}\u{ac}", "\u{20ac}"),   // â‚¬ → €
    ("\u{c2}\u{ab}", "\u{ab}"),             // Â« → «
    ("\u{c2}\u{bb}", "\u{bb}"),             // Â» → »
    ("\u{c2}\u{a9}", "\u{a9}"),             // Â© → ©
    ("\u{c2}\u{ae}", "\u{ae}"),             // Â® → ®
    ("\u{c2}\u{a3}", "\u{a3}"),             // Â£ → £
    ("\u{c2}\u{b0}", "\u{b0}"),             // Â° → °
    ("\u{c2}\u{bd}", "\u{bd}"),             // Â½ → ½
    ("\u{c2}\u{bc}", "\u{bc}"),             // Â¼ → ¼
    ("\u{c2}\u{be}", "\u{be}"),             // Â¾ → ¾
];

static STRAY_A_CIRCUMFLEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\u{c2}([A-Za-z])").expect("valid regex"));
static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").expect("valid regex"));

/// A line kept only if at least this fraction of its characters are
/// alphanumeric, unless it is short enough to be a heading or figure label.
const GARBAGE_ALNUM_RATIO: f64 = 0.30;
const GARBAGE_MIN_LEN: usize = 50;

/// Clean one page of recognised text.
pub fn clean_ocr_text(text: &str) -> String {
    let mut s = text.replace("\r\n", "\n");

    for (broken, fixed) in MOJIBAKE {
        if s.contains(broken) {
            s = s.replace(broken, fixed);
        }
    }
    // A leftover Â glued to a letter is a half-repaired sequence; drop it.
    s = STRAY_A_CIRCUMFLEX.replace_all(&s, "$1").into_owned();
    s = s.replace('\u{c2}', "");

    let cleaned: Vec<String> = s
        .lines()
        .map(|line| MULTI_SPACE.replace_all(line.trim_end(), " ").into_owned())
        .filter(|line| !is_garbage_line(line))
        .collect();

    cleaned.join("\n").trim().to_string()
}

/// Long lines that are mostly symbols are recognition noise (table rules,
/// scanner artefacts along page edges), not content.
fn is_garbage_line(line: &str) -> bool {
    let chars = line.chars().count();
    if chars < GARBAGE_MIN_LEN {
        return false;
    }
    let alnum = line.chars().filter(|c| c.is_alphanumeric()).count();
    (alnum as f64 / chars as f64) < GARBAGE_ALNUM_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repairs_common_mojibake() {
        let broken = "the report \u{e2}\u{20ac}\u{153}Q3 results\u{e2}\u{20ac}\u{9d} shows \u{e2}\u{201a}\u{ac}100";
        let fixed = clean_ocr_text(broken);
        assert_eq!(fixed, "the report \u{201c}Q3 results\u{201d} shows \u{20ac}100");
    }

    #[test]
    fn strips_stray_a_circumflex() {
        assert_eq!(clean_ocr_text("price: \u{c2}\u{a3}40"), "price: \u{a3}40");
        assert_eq!(clean_ocr_text("le\u{c2}ttre"), "lettre");
    }

    #[test]
    fn collapses_runs_of_spaces() {
        assert_eq!(clean_ocr_text("a    b  c"), "a b c");
    }

    #[test]
    fn drops_long_symbol_lines_keeps_short_ones() {
        let text = "Heading\n----\n|___|___|===|___|---|___|===|___|---|___|===|___|\nBody text";
        let cleaned = clean_ocr_text(text);
        assert!(cleaned.contains("Heading"));
        assert!(cleaned.contains("----")); // short, could be a rule under a heading
        assert!(!cleaned.contains("|___|"));
        assert!(cleaned.contains("Body text"));
    }

    #[test]
    fn normalises_line_endings_and_trims() {
        assert_eq!(clean_ocr_text("line one\r\nline two\r\n\n"), "line one\nline two");
    }

    #[test]
    fn clean_text_passes_through() {
        let text = "An ordinary paragraph with nothing wrong in it.";
        assert_eq!(clean_ocr_text(text), text);
    }
}
