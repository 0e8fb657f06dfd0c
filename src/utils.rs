use unicode_segmentation::UnicodeSegmentation;

/// First line of `s`, cut to `max_len` graphemes, for log messages.
pub fn preview(s: &str, max_len: usize) -> String {
    let line = s.trim().lines().next().unwrap_or_default();
    let mut graphemes = line.graphemes(true);
    let head = graphemes.by_ref().take(max_len).collect::<String>();
    if graphemes.next().is_some() || line.len() < s.trim().len() {
        head + "…"
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_kept() {
        assert_eq!(preview("  Ciao  ", 10), "Ciao");
    }

    #[test]
    fn long_text_is_cut_on_graphemes() {
        assert_eq!(preview("สวัสดีครับ", 2), "สวั…");
        assert_eq!(preview("Prima riga\nseconda", 20), "Prima riga…");
    }
}
