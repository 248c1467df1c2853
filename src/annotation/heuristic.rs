//! Rule-based annotator: capitalised-span entity extraction and lexicon sentiment.
//!
//! Good enough to drive cascade detection on English news headlines and
//! bodies without a model download. Entities are runs of capitalised tokens
//! (joined across `of`/`and`/`the`/`de`/`for`) classified by suffix, keyword
//! and small gazetteers.

use anyhow::Result;
use std::collections::HashSet;

use super::Annotator;
use crate::articles::types::{EntityKind, EntityMention};

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "this", "that", "these", "those", "it", "its", "he", "she", "they", "we",
    "i", "you", "his", "her", "their", "our", "my", "in", "on", "at", "for", "but", "and", "or",
    "if", "when", "while", "after", "before", "as", "by", "with", "from", "to", "of", "so", "yet",
    "also", "however", "meanwhile", "there", "here", "what", "why", "how", "who", "where", "new",
    "said", "says", "according", "today", "yesterday", "tomorrow", "monday", "tuesday",
    "wednesday", "thursday", "friday", "saturday", "sunday", "january", "february", "march",
    "april", "may", "june", "july", "august", "september", "october", "november", "december",
    "mr", "mrs", "ms", "dr", "read", "more", "update", "breaking", "watch", "live", "photo",
];

const CONNECTORS: &[&str] = &["of", "and", "the", "de", "for", "on"];

const ORG_SUFFIXES: &[&str] = &[
    "inc", "corp", "corporation", "ltd", "llc", "plc", "group", "company", "co", "university",
    "institute", "agency", "bank", "association", "foundation", "labs", "technologies", "systems",
    "motors", "commission", "department", "ministry", "council", "party", "reserve", "fund",
    "capital", "ventures", "holdings", "network", "times", "news", "studios", "federation",
];

const LAW_MARKERS: &[&str] = &[
    "act", "law", "bill", "treaty", "regulation", "directive", "amendment", "accord", "code",
];

const EVENT_MARKERS: &[&str] = &[
    "summit", "conference", "olympics", "war", "championship", "festival", "expo", "election",
    "cup", "games", "week", "forum", "hackathon", "keynote", "crisis",
];

const PRODUCTS: &[&str] = &[
    "iphone", "ipad", "android", "windows", "chatgpt", "pixel", "xbox", "playstation", "galaxy",
    "macbook", "copilot", "gemini", "kindle", "alexa", "siri", "linux", "tesla model",
];

const GPE: &[&str] = &[
    "us", "usa", "united states", "america", "uk", "united kingdom", "britain", "england",
    "china", "india", "japan", "germany", "france", "italy", "spain", "canada", "mexico",
    "brazil", "russia", "ukraine", "israel", "iran", "taiwan", "korea", "south korea",
    "north korea", "australia", "europe", "africa", "asia", "washington", "new york",
    "california", "texas", "ohio", "florida", "london", "paris", "berlin", "beijing", "tokyo",
    "seoul", "moscow", "kyiv", "brussels", "san francisco", "silicon valley", "seattle",
    "boston", "chicago", "delhi", "singapore", "hong kong", "dubai", "toronto",
];

const NORP: &[&str] = &[
    "american", "americans", "chinese", "european", "europeans", "british", "russian",
    "russians", "ukrainian", "israeli", "palestinian", "japanese", "german", "french",
    "indian", "canadian", "democrat", "democrats", "democratic", "republican", "republicans",
    "christian", "muslim", "jewish", "catholic", "korean", "mexican", "australian",
];

const POSITIVE: &[&str] = &[
    "gain", "gains", "growth", "grow", "grows", "surge", "surges", "record", "win", "wins",
    "won", "success", "successful", "improve", "improved", "improves", "strong", "stronger",
    "boost", "boosts", "breakthrough", "innovative", "launch", "launches", "profit", "profits",
    "rise", "rises", "rising", "beat", "beats", "best", "better", "good", "great", "positive",
    "approve", "approved", "agreement", "expand", "expands", "expansion", "celebrate", "hope",
    "recover", "recovery", "upgrade", "leading", "popular", "secure", "safe", "benefit",
];

const NEGATIVE: &[&str] = &[
    "loss", "losses", "lose", "fall", "falls", "fell", "decline", "declines", "drop", "drops",
    "crash", "crashes", "fail", "fails", "failed", "failure", "weak", "weaker", "cut", "cuts",
    "layoff", "layoffs", "lawsuit", "sue", "sues", "fine", "fined", "breach", "hack", "hacked",
    "attack", "attacks", "war", "crisis", "risk", "risks", "concern", "concerns", "worst",
    "worse", "bad", "negative", "ban", "banned", "probe", "investigation", "fraud", "scandal",
    "outage", "delay", "delayed", "recall", "warning", "threat", "threats", "killed", "dead",
];

struct Token<'a> {
    text: &'a str,
    start: usize,
    end: usize,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '\'' || c == '\u{2019}'
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices().chain(std::iter::once((text.len(), ' '))) {
        match (start, is_word_char(c)) {
            (None, true) => start = Some(i),
            (Some(s), false) => {
                let mut word = &text[s..i];
                for suffix in ["'s", "\u{2019}s", "'", "\u{2019}"] {
                    if let Some(stripped) = word.strip_suffix(suffix) {
                        word = stripped;
                        break;
                    }
                }
                let word = word.trim_matches('-');
                if !word.is_empty() {
                    let offset = text[s..i].find(word).unwrap_or(0);
                    tokens.push(Token {
                        text: word,
                        start: s + offset,
                        end: s + offset + word.len(),
                    });
                }
                start = None;
            }
            _ => {}
        }
    }
    tokens
}

fn lower(s: &str) -> String {
    s.to_lowercase()
}

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&lower(token).as_str())
}

/// Starts uppercase, or is camel-cased like `iPhone`.
fn is_capitalized(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(c) if c.is_uppercase() => true,
        Some(c) if c.is_lowercase() => chars.any(|c| c.is_uppercase()),
        _ => false,
    }
}

fn is_numeric(token: &str) -> bool {
    token.chars().all(|c| c.is_ascii_digit())
}

fn is_acronym(token: &str) -> bool {
    (2..=6).contains(&token.chars().count())
        && token.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        && token.chars().any(|c| c.is_ascii_uppercase())
}

/// Only spaces (no punctuation or line break) separate the two byte positions.
fn joined(text: &str, left_end: usize, right_start: usize) -> bool {
    let gap = &text[left_end..right_start];
    !gap.is_empty() && gap.chars().all(|c| c == ' ' || c == '\t')
}

fn classify(tokens: &[&Token<'_>], surface: &str) -> EntityKind {
    let key = lower(surface);
    let words: Vec<String> = tokens.iter().map(|t| lower(t.text)).collect();
    let last = words.last().map(String::as_str).unwrap_or("");

    if GPE.contains(&key.as_str()) {
        return EntityKind::Gpe;
    }
    if NORP.contains(&key.as_str()) {
        return EntityKind::Norp;
    }
    if words.len() > 1 && LAW_MARKERS.contains(&last) {
        return EntityKind::Law;
    }
    if words.len() > 1 && words.iter().any(|w| EVENT_MARKERS.contains(&w.as_str())) {
        return EntityKind::Event;
    }
    if words.iter().any(|w| ORG_SUFFIXES.contains(&w.as_str())) {
        return EntityKind::Org;
    }
    if PRODUCTS.iter().any(|p| key.starts_with(p))
        || (words.len() > 1 && tokens.iter().any(|t| t.text.chars().any(|c| c.is_ascii_digit())))
        || tokens.first().is_some_and(|t| t.text.starts_with(char::is_lowercase))
    {
        return EntityKind::Product;
    }
    if tokens.len() == 1 && is_acronym(tokens[0].text) {
        return EntityKind::Org;
    }
    match tokens.len() {
        2 | 3 => EntityKind::Person,
        _ => EntityKind::Org,
    }
}

/// Cut `text` to at most `max_chars` characters on a char boundary.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub struct HeuristicAnnotator {
    max_text_chars: usize,
}

impl HeuristicAnnotator {
    pub fn new(max_text_chars: usize) -> Self {
        Self { max_text_chars }
    }

    fn spans<'a>(text: &str, tokens: &'a [Token<'a>]) -> Vec<Vec<&'a Token<'a>>> {
        let entity_token = |t: &Token<'_>| is_capitalized(t.text) && !is_stopword(t.text);
        let mut spans = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            if !entity_token(&tokens[i]) {
                i += 1;
                continue;
            }
            let mut span = vec![&tokens[i]];
            let mut k = i + 1;
            while k < tokens.len() && joined(text, tokens[k - 1].end, tokens[k].start) {
                let tok = &tokens[k];
                if entity_token(tok) || is_numeric(tok.text) {
                    span.push(tok);
                    k += 1;
                } else if CONNECTORS.contains(&lower(tok.text).as_str())
                    && k + 1 < tokens.len()
                    && joined(text, tok.end, tokens[k + 1].start)
                    && entity_token(&tokens[k + 1])
                {
                    span.push(tok);
                    span.push(&tokens[k + 1]);
                    k += 2;
                } else {
                    break;
                }
            }
            spans.push(span);
            i = k;
        }
        spans
    }
}

impl Annotator for HeuristicAnnotator {
    fn extract_entities(&self, text: &str) -> Result<Vec<EntityMention>> {
        let text = truncate_chars(text, self.max_text_chars);
        let tokens = tokenize(text);
        let mut seen = HashSet::new();
        let mut mentions = Vec::new();

        for span in Self::spans(text, &tokens) {
            let (Some(first), Some(last)) = (span.first(), span.last()) else {
                continue;
            };
            let surface = &text[first.start..last.end];
            if surface.chars().count() < 2 {
                continue;
            }
            let kind = classify(&span, surface);
            if seen.insert((lower(surface), kind)) {
                mentions.push(EntityMention::new(surface, kind.as_str(), first.start, last.end));
            }
        }
        Ok(mentions)
    }

    fn sentiment(&self, text: &str) -> Result<f64> {
        let text = truncate_chars(text, self.max_text_chars);
        let (mut pos, mut neg) = (0u32, 0u32);
        for token in tokenize(text) {
            let word = lower(token.text);
            if POSITIVE.contains(&word.as_str()) {
                pos += 1;
            } else if NEGATIVE.contains(&word.as_str()) {
                neg += 1;
            }
        }
        if pos + neg == 0 {
            return Ok(0.0);
        }
        Ok((f64::from(pos) - f64::from(neg)) / f64::from(pos + neg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotator() -> HeuristicAnnotator {
        HeuristicAnnotator::new(1_000_000)
    }

    fn found(text: &str) -> Vec<(String, String)> {
        annotator()
            .extract_entities(text)
            .unwrap()
            .into_iter()
            .map(|m| (m.text, m.entity_type))
            .collect()
    }

    #[test]
    fn classifies_common_shapes() {
        let got = found("Acme Corp hired Jane Doe in Ohio after the Paris Climate Summit.");
        assert!(got.contains(&("Acme Corp".into(), "ORG".into())));
        assert!(got.contains(&("Jane Doe".into(), "PERSON".into())));
        assert!(got.contains(&("Ohio".into(), "GPE".into())));
        assert!(got.contains(&("Paris Climate Summit".into(), "EVENT".into())));
    }

    #[test]
    fn connectors_and_possessives() {
        let got = found("Bank of America's profits rose. The Digital Markets Act passed.");
        assert!(got.contains(&("Bank of America".into(), "ORG".into())));
        assert!(got.contains(&("Digital Markets Act".into(), "LAW".into())));
        assert!(!got.iter().any(|(t, _)| t == "The"));
    }

    #[test]
    fn products_and_groups() {
        let got = found("Americans lined up for the iPhone 16 while NASA watched.");
        assert!(got.contains(&("Americans".into(), "NORP".into())));
        assert!(got.contains(&("iPhone 16".into(), "PRODUCT".into())));
        assert!(got.contains(&("NASA".into(), "ORG".into())));
    }

    #[test]
    fn offsets_point_at_surface_text() {
        let text = "Shares of Acme Corp fell.";
        for m in annotator().extract_entities(text).unwrap() {
            assert_eq!(&text[m.start..m.end], m.text);
        }
    }

    #[test]
    fn dedups_on_lowercase_text_and_type() {
        let got = found("Acme Corp grew. ACME CORP grew again. Acme Corp!");
        assert_eq!(got.iter().filter(|(t, _)| lower(t) == "acme corp").count(), 1);
    }

    #[test]
    fn punctuation_breaks_spans() {
        let got = found("Reporters met Alice Smith, Bob Jones.");
        assert!(got.contains(&("Alice Smith".into(), "PERSON".into())));
        assert!(got.contains(&("Bob Jones".into(), "PERSON".into())));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let a = HeuristicAnnotator::new(4);
        assert!(a.extract_entities("Zürich Über Alles").is_ok());
        assert_eq!(truncate_chars("héllo", 2), "hé");
    }

    #[test]
    fn sentiment_is_bounded() {
        let a = annotator();
        assert_eq!(a.sentiment("The meeting is on Tuesday.").unwrap(), 0.0);
        assert_eq!(a.sentiment("Record growth and strong profits").unwrap(), 1.0);
        assert_eq!(a.sentiment("Outage and lawsuit after the hack").unwrap(), -1.0);
        let mixed = a.sentiment("Profits rise despite layoffs").unwrap();
        assert!((-1.0..=1.0).contains(&mixed));
        assert!((mixed - 1.0 / 3.0).abs() < 1e-9);
    }
}
