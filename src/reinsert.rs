use crate::segment::{Segment, Segmenter};
use crate::translator::TranslationMap;

/// Replaces every segment of the protected document with its translation.
///
/// Text nodes and attributes are each rewritten in a single pass, so replacements never
/// shift the positions later matches depend on. Segments without a translation stay as they were.
pub fn reinsert<S: Segmenter + ?Sized>(segmenter: &S, html: &str, map: &TranslationMap) -> String {
    let mut lookup = |segment: &Segment| map.lookup(segment).map(|t| segment.rewrap(t));

    let html = segmenter.rewrite_text_nodes(html, &mut lookup);
    segmenter.rewrite_attributes(&html, &mut lookup)
}
