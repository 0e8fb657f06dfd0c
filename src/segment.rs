use crate::TranslationConfig;
use crate::protect::token_regex;
use regex::{Captures, Regex};
use serde::Deserialize;

/// Writing system used to decide whether a piece of text is worth translating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Script {
    Latin,
    Cyrillic,
    Greek,
    Arabic,
    Hebrew,
    Thai,
    Cjk,
    /// Any alphabetic character.
    Any,
}

impl Script {
    pub fn contains(self, c: char) -> bool {
        match self {
            Script::Latin => {
                c.is_ascii_alphabetic()
                    || matches!(c, 'À'..='Ö' | 'Ø'..='ö' | 'ø'..='ÿ' | '\u{0100}'..='\u{024F}')
            }
            Script::Cyrillic => matches!(c, '\u{0400}'..='\u{04FF}' | '\u{0500}'..='\u{052F}'),
            Script::Greek => matches!(c, '\u{0370}'..='\u{03FF}' | '\u{1F00}'..='\u{1FFF}'),
            Script::Arabic => matches!(c, '\u{0600}'..='\u{06FF}' | '\u{0750}'..='\u{077F}'),
            Script::Hebrew => matches!(c, '\u{0590}'..='\u{05FF}'),
            Script::Thai => matches!(c, '\u{0E00}'..='\u{0E7F}'),
            Script::Cjk => matches!(
                c,
                '\u{3040}'..='\u{30FF}' | '\u{3400}'..='\u{4DBF}' | '\u{4E00}'..='\u{9FFF}' | '\u{AC00}'..='\u{D7AF}'
            ),
            Script::Any => c.is_alphabetic(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKind {
    TextNode,
    Attribute { name: String, quote: char },
}

/// A located piece of translatable text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub raw: String,
    pub leading: String,
    pub core: String,
    pub trailing: String,
}

impl Segment {
    fn new(kind: SegmentKind, raw: &str) -> Self {
        let (leading, core, trailing) = split_whitespace(raw);
        Segment {
            kind,
            raw: raw.to_owned(),
            leading: leading.to_owned(),
            core: core.to_owned(),
            trailing: trailing.to_owned(),
        }
    }

    /// Wraps a translated core in this segment's original whitespace.
    pub fn rewrap(&self, translated_core: &str) -> String {
        format!("{}{}{}", self.leading, translated_core, self.trailing)
    }
}

/// Splits `s` into leading whitespace, core and trailing whitespace.
pub fn split_whitespace(s: &str) -> (&str, &str, &str) {
    let rest = s.trim_start();
    let leading = &s[..s.len() - rest.len()];
    let core = rest.trim_end();
    let trailing = &rest[core.len()..];
    (leading, core, trailing)
}

/// Finds translatable segments in a protected document and rewrites them in place.
pub trait Segmenter {
    /// Text-node segments first, then attribute segments, each in document order.
    fn segments(&self, html: &str) -> Vec<Segment>;

    /// Rewrites every text node in one pass. `replace` returns `None` to keep the original.
    fn rewrite_text_nodes(
        &self,
        html: &str,
        replace: &mut dyn FnMut(&Segment) -> Option<String>,
    ) -> String;

    /// Rewrites every visible attribute value in one pass.
    fn rewrite_attributes(
        &self,
        html: &str,
        replace: &mut dyn FnMut(&Segment) -> Option<String>,
    ) -> String;
}

/// Decides whether a whitespace-stripped core is translatable.
#[derive(Debug, Clone)]
pub struct SegmentFilter {
    pub source_script: Script,
    pub skip_target_script: Option<Script>,
    pub skip_substrings: Vec<String>,
}

impl SegmentFilter {
    pub fn from_config(cfg: &TranslationConfig) -> Self {
        SegmentFilter {
            source_script: cfg.source_script,
            skip_target_script: cfg.skip_target_script,
            skip_substrings: cfg.skip_substrings.clone(),
        }
    }

    pub fn accepts(&self, core: &str) -> bool {
        if core.is_empty() {
            return false;
        }
        if !core.chars().any(|c| self.source_script.contains(c)) {
            return false;
        }
        if let Some(target) = self.skip_target_script {
            let mut alphabetic = core.chars().filter(|c| c.is_alphabetic()).peekable();
            if alphabetic.peek().is_some() && alphabetic.all(|c| target.contains(c)) {
                return false;
            }
        }
        !self
            .skip_substrings
            .iter()
            .any(|s| !s.is_empty() && core.contains(s.as_str()))
    }
}

/// Regex-driven segmentation over raw text, no DOM involved.
pub struct PatternSegmenter {
    text_node_re: Regex,
    start_tag_re: Regex,
    attr_re: Option<Regex>,
    token_re: Regex,
    filter: SegmentFilter,
}

impl PatternSegmenter {
    /// `marker` is the protection sentinel of the document being processed.
    pub fn new(cfg: &TranslationConfig, marker: char) -> Self {
        let names = cfg
            .visible_attributes
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .map(regex::escape)
            .collect::<Vec<_>>();

        let attr_re = (!names.is_empty()).then(|| {
            Regex::new(&format!(
                r#"(?i)(\s({})\s*=\s*)(?:"([^"]*)"|'([^']*)')"#,
                names.join("|")
            ))
            .expect("valid regex")
        });

        PatternSegmenter {
            text_node_re: Regex::new(r">([^<>]+)<").expect("valid regex"),
            // quoted values may hold `>`
            start_tag_re: Regex::new(r#"<[A-Za-z](?:[^<>"']|"[^"]*"|'[^']*')*>"#)
                .expect("valid regex"),
            attr_re,
            token_re: token_regex(marker),
            filter: SegmentFilter::from_config(cfg),
        }
    }

    /// Builds a candidate segment, or `None` when it isn't translatable.
    fn candidate(&self, kind: SegmentKind, raw: &str) -> Option<Segment> {
        let (_, core, _) = split_whitespace(raw);
        if self.token_re.is_match(core) || !self.filter.accepts(core) {
            return None;
        }
        Some(Segment::new(kind, raw))
    }

    fn attribute_value<'h>(caps: &Captures<'h>) -> (char, &'h str) {
        match caps.get(3) {
            Some(v) => ('"', v.as_str()),
            None => ('\'', caps.get(4).map_or("", |v| v.as_str())),
        }
    }
}

impl Segmenter for PatternSegmenter {
    fn segments(&self, html: &str) -> Vec<Segment> {
        let mut segments = Vec::new();

        for caps in self.text_node_re.captures_iter(html) {
            // a token never becomes part of a segment
            for piece in self.token_re.split(&caps[1]) {
                segments.extend(self.candidate(SegmentKind::TextNode, piece));
            }
        }

        if let Some(attr_re) = &self.attr_re {
            for tag in self.start_tag_re.find_iter(html) {
                for caps in attr_re.captures_iter(tag.as_str()) {
                    let (quote, value) = Self::attribute_value(&caps);
                    let kind = SegmentKind::Attribute {
                        name: caps[2].to_ascii_lowercase(),
                        quote,
                    };
                    segments.extend(self.candidate(kind, value));
                }
            }
        }

        segments
    }

    fn rewrite_text_nodes(
        &self,
        html: &str,
        replace: &mut dyn FnMut(&Segment) -> Option<String>,
    ) -> String {
        self.text_node_re
            .replace_all(html, |caps: &Captures| {
                let text = &caps[1];
                let mut out = String::with_capacity(text.len() + 2);
                out.push('>');

                let mut last = 0;
                for token in self.token_re.find_iter(text) {
                    out.push_str(&self.rewrite_piece(&text[last..token.start()], replace));
                    out.push_str(token.as_str());
                    last = token.end();
                }
                out.push_str(&self.rewrite_piece(&text[last..], replace));

                out.push('<');
                out
            })
            .into_owned()
    }

    fn rewrite_attributes(
        &self,
        html: &str,
        replace: &mut dyn FnMut(&Segment) -> Option<String>,
    ) -> String {
        let Some(attr_re) = &self.attr_re else {
            return html.to_owned();
        };

        self.start_tag_re
            .replace_all(html, |tag: &Captures| {
                attr_re
                    .replace_all(&tag[0], |caps: &Captures| {
                        let (quote, value) = Self::attribute_value(caps);
                        let kind = SegmentKind::Attribute {
                            name: caps[2].to_ascii_lowercase(),
                            quote,
                        };
                        let value = self
                            .candidate(kind, value)
                            .and_then(|segment| replace(&segment))
                            .map(|v| escape_attribute(&v, quote))
                            .unwrap_or_else(|| value.to_owned());
                        format!("{}{quote}{value}{quote}", &caps[1])
                    })
                    .into_owned()
            })
            .into_owned()
    }
}

impl PatternSegmenter {
    fn rewrite_piece(
        &self,
        piece: &str,
        replace: &mut dyn FnMut(&Segment) -> Option<String>,
    ) -> String {
        self.candidate(SegmentKind::TextNode, piece)
            .and_then(|segment| replace(&segment))
            .map(|v| escape_text(&v))
            .unwrap_or_else(|| piece.to_owned())
    }
}

fn escape_text(s: &str) -> String {
    s.replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attribute(s: &str, quote: char) -> String {
    match quote {
        '"' => s.replace('"', "&quot;"),
        _ => s.replace('\'', "&#39;"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKER: char = '\u{E000}';

    fn segmenter() -> PatternSegmenter {
        PatternSegmenter::new(&TranslationConfig::default(), MARKER)
    }

    fn cores(segments: &[Segment]) -> Vec<&str> {
        segments.iter().map(|s| s.core.as_str()).collect()
    }

    #[test]
    fn splits_surrounding_whitespace() {
        assert_eq!(split_whitespace("  Ciao mondo \n"), ("  ", "Ciao mondo", " \n"));
        assert_eq!(split_whitespace("   "), ("   ", "", ""));
        assert_eq!(split_whitespace("x"), ("", "x", ""));
    }

    #[test]
    fn extracts_text_nodes_then_attributes() {
        let html = r#"<div title="Titolo"><p>  Buongiorno </p><img alt='Gatto' src="a.png"></div>"#;

        let segments = segmenter().segments(html);

        assert_eq!(cores(&segments), vec!["Buongiorno", "Titolo", "Gatto"]);
        assert_eq!(segments[0].leading, "  ");
        assert_eq!(segments[0].trailing, " ");
        assert_eq!(
            segments[2].kind,
            SegmentKind::Attribute {
                name: "alt".to_owned(),
                quote: '\''
            }
        );
    }

    #[test]
    fn skips_non_alphabetic_and_blank_runs() {
        let html = "<p>123 -- 456</p><p>   </p><p>!!</p><span>© 2024</span><b>Fine</b>";

        let segments = segmenter().segments(html);

        assert_eq!(cores(&segments), vec!["Fine"]);
    }

    #[test]
    fn tokens_split_text_runs() {
        let html = format!("<p>Prima {MARKER}@@COMMENT_0@@{MARKER} dopo</p><div>{MARKER}@@SCRIPT_0@@{MARKER}</div>");

        let segments = segmenter().segments(&html);

        assert_eq!(cores(&segments), vec!["Prima", "dopo"]);
        assert!(segments.iter().all(|s| !s.raw.contains(MARKER)));
    }

    #[test]
    fn attribute_names_need_a_boundary() {
        let html = r#"<a data-title="Uno" title="Due" subtitle="Tre" ALT = "Quattro"></a>"#;

        let segments = segmenter().segments(html);

        assert_eq!(cores(&segments), vec!["Uno", "Due", "Quattro"]);
        assert!(matches!(&segments[0].kind, SegmentKind::Attribute { name, .. } if name == "data-title"));
        assert!(matches!(&segments[2].kind, SegmentKind::Attribute { name, .. } if name == "alt"));
    }

    #[test]
    fn attribute_value_with_gt_is_translated() {
        let html = r#"<a title="Avanti >" alt='Ciao'>x</a>"#;
        let segmenter = segmenter();

        let segments = segmenter.segments(html);
        assert_eq!(cores(&segments), vec!["x", "Avanti >", "Ciao"]);

        let out = segmenter.rewrite_attributes(html, &mut |s| match s.core.as_str() {
            "Avanti >" => Some("Next >".to_owned()),
            "Ciao" => Some("Hi".to_owned()),
            _ => None,
        });
        assert_eq!(out, r#"<a title="Next >" alt='Hi'>x</a>"#);
    }

    #[test]
    fn attributes_outside_tags_are_ignored() {
        let html = r#"<p>Scrivi title="Ciao" nel campo</p>"#;

        let segments = segmenter().segments(html);

        assert_eq!(cores(&segments), vec![r#"Scrivi title="Ciao" nel campo"#]);
    }

    #[test]
    fn source_script_filters_foreign_text() {
        let mut cfg = TranslationConfig::default();
        cfg.source_script = Script::Latin;
        let segmenter = PatternSegmenter::new(&cfg, MARKER);

        let segments = segmenter.segments("<p>Привет</p><p>Ciao</p>");

        assert_eq!(cores(&segments), vec!["Ciao"]);
    }

    #[test]
    fn target_script_skip_is_configurable() {
        let mut cfg = TranslationConfig::default();
        cfg.source_script = Script::Any;
        cfg.skip_target_script = Some(Script::Cyrillic);
        let segmenter = PatternSegmenter::new(&cfg, MARKER);

        let segments = segmenter.segments("<p>Привет</p><p>Ciao</p><p>Привет Mario</p>");

        assert_eq!(cores(&segments), vec!["Ciao", "Привет Mario"]);
    }

    #[test]
    fn skip_substrings_drop_matching_cores() {
        let mut cfg = TranslationConfig::default();
        cfg.skip_substrings = vec!["https://".to_owned(), "{{".to_owned()];
        let segmenter = PatternSegmenter::new(&cfg, MARKER);

        let segments =
            segmenter.segments("<p>https://example.com</p><p>{{ nome }}</p><p>Benvenuti</p>");

        assert_eq!(cores(&segments), vec!["Benvenuti"]);
    }

    #[test]
    fn rewrites_keep_whitespace_and_quotes() {
        let html = r#"<p title='Ciao'>  Ciao  </p><img alt="Ciao">"#;
        let segmenter = segmenter();

        let html = segmenter.rewrite_text_nodes(html, &mut |s| Some(s.rewrap("Hello")));
        let html = segmenter.rewrite_attributes(&html, &mut |s| Some(s.rewrap("Hello")));

        assert_eq!(html, r#"<p title='Hello'>  Hello  </p><img alt="Hello">"#);
    }

    #[test]
    fn rewrites_escape_structural_characters() {
        let html = r#"<p>Ciao</p><img alt='Ciao' title="Ciao">"#;
        let segmenter = segmenter();

        let html = segmenter.rewrite_text_nodes(html, &mut |_| Some("a < b".to_owned()));
        let html = segmenter.rewrite_attributes(&html, &mut |s| match &s.kind {
            SegmentKind::Attribute { quote: '\'', .. } => Some("l'immagine".to_owned()),
            _ => Some(r#"il "titolo""#.to_owned()),
        });

        assert_eq!(
            html,
            r#"<p>a &lt; b</p><img alt='l&#39;immagine' title="il &quot;titolo&quot;">"#
        );
    }

    #[test]
    fn rejected_candidates_are_never_offered_for_rewrite() {
        let html = format!("<p>42</p><p>{MARKER}@@STYLE_0@@{MARKER}</p><img alt=''>");
        let segmenter = segmenter();
        let mut offered = 0;

        let out = segmenter.rewrite_text_nodes(&html, &mut |_| {
            offered += 1;
            None
        });
        let out = segmenter.rewrite_attributes(&out, &mut |_| {
            offered += 1;
            None
        });

        assert_eq!(offered, 0);
        assert_eq!(out, html);
    }
}
