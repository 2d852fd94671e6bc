//! Normalization of LLM output to ASCII-safe text. Generated documents
//! end up in practice-management systems that mangle typographic unicode,
//! so common punctuation is mapped to plain equivalents before anything
//! is stored or returned.

const REPLACEMENTS: &[(char, &str)] = &[
    ('\u{2013}', "-"),   // en-dash
    ('\u{2014}', "--"),  // em-dash
    ('\u{2018}', "'"),   // left single quote
    ('\u{2019}', "'"),   // right single quote
    ('\u{201c}', "\""),  // left double quote
    ('\u{201d}', "\""),  // right double quote
    ('\u{2026}', "..."), // ellipsis
    ('\u{00a0}', " "),   // non-breaking space
    ('\u{2022}', "*"),   // bullet
    ('\u{00b0}', " deg"), // degree symbol
];

/// Replace common typographic unicode with ASCII equivalents.
pub fn normalize_to_ascii(text: &str) -> String {
    if text.is_ascii() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match REPLACEMENTS.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => out.push_str(to),
            None => out.push(c),
        }
    }
    out
}
