use crate::TranslationError;
use regex::Regex;
use std::collections::HashMap;

/// First character tried as a token sentinel; the search walks up the private use area.
const SENTINEL_FIRST: u32 = 0xE000;
const SENTINEL_LAST: u32 = 0xF8FF;

/// A region of the document that must never reach the translator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedBlock {
    pub token: String,
    pub original: String,
}

/// Blocks removed from one document, grouped by kind in protection order.
#[derive(Debug, Clone)]
pub struct Protection {
    marker: char,
    blocks: Vec<(String, Vec<ProtectedBlock>)>,
}

impl Protection {
    /// Sentinel character delimiting every token of this document.
    pub fn marker(&self) -> char {
        self.marker
    }

    pub fn blocks(&self) -> &[(String, Vec<ProtectedBlock>)] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.iter().map(|(_, b)| b.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Regex matching any token minted with `marker`.
pub fn token_regex(marker: char) -> Regex {
    let m = regex::escape(&marker.to_string());
    Regex::new(&format!("{m}@@[^{m}]*?@@{m}")).expect("valid regex")
}

/// Replaces comments and opaque elements with tokens.
///
/// `kinds` are applied in order. `comment` (or `!--`) stands for `<!-- ... -->`,
/// any other name for the whole `<name ...>...</name>` element.
pub fn protect(html: &str, kinds: &[String]) -> Result<(String, Protection), TranslationError> {
    let marker = pick_marker(html).ok_or_else(|| {
        TranslationError::OtherError(anyhow::anyhow!(
            "Document uses every private use character, cannot mint protection tokens"
        ))
    })?;

    let mut html = html.to_owned();
    let mut blocks = Vec::with_capacity(kinds.len());

    for kind in kinds {
        let (label, pattern) = kind_pattern(kind)?;
        let mut saved = Vec::<ProtectedBlock>::new();
        html = pattern
            .replace_all(&html, |caps: &regex::Captures| {
                let token = format!("{marker}@@{label}_{}@@{marker}", saved.len());
                saved.push(ProtectedBlock {
                    token: token.clone(),
                    original: caps[0].to_owned(),
                });
                token
            })
            .into_owned();
        log::debug!("Protected {} {} block(s)", saved.len(), label);
        blocks.push((label, saved));
    }

    Ok((html, Protection { marker, blocks }))
}

/// Puts protected blocks back in a single pass over the document.
///
/// A block may hold tokens of kinds protected before it (a comment inside a script), so
/// restored originals are expanded in turn.
pub fn restore(html: &str, protection: &Protection) -> String {
    if protection.is_empty() {
        return html.to_owned();
    }
    let originals = protection
        .blocks
        .iter()
        .flat_map(|(_, saved)| saved)
        .map(|b| (b.token.as_str(), b.original.as_str()))
        .collect::<HashMap<_, _>>();
    expand_tokens(html, &token_regex(protection.marker), &originals)
}

fn expand_tokens(text: &str, token_re: &Regex, originals: &HashMap<&str, &str>) -> String {
    token_re
        .replace_all(text, |caps: &regex::Captures| match originals.get(&caps[0]) {
            Some(original) => expand_tokens(original, token_re, originals),
            None => caps[0].to_owned(),
        })
        .into_owned()
}

fn pick_marker(html: &str) -> Option<char> {
    (SENTINEL_FIRST..=SENTINEL_LAST)
        .filter_map(char::from_u32)
        .find(|c| !html.contains(*c))
}

fn kind_pattern(kind: &str) -> Result<(String, Regex), TranslationError> {
    let kind = kind.trim();
    if kind.eq_ignore_ascii_case("comment") || kind == "!--" {
        let re = Regex::new(r"<!--[\s\S]*?-->").expect("valid regex");
        return Ok(("COMMENT".to_owned(), re));
    }
    if kind.is_empty() || !kind.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(TranslationError::ConfigError(format!(
            "Invalid protected tag name: {kind:?}"
        )));
    }
    let tag = regex::escape(kind);
    let re = Regex::new(&format!(r"(?is)<{tag}\b.*?</{tag}\s*>")).expect("valid regex");
    Ok((kind.to_ascii_uppercase(), re))
}
