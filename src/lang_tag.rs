use regex::{Captures, Regex};

/// Sets the `lang` attribute of the root `<html>` element to `lang`, keeping its quote style.
///
/// Only the first `<html>` start tag is touched; `lang` attributes elsewhere stay as they are.
/// A root element without a `lang` attribute is left alone.
pub fn rewrite_lang(html: &str, lang: &str) -> String {
    let root_re = Regex::new(r"(?i)<html\b[^>]*>").expect("valid regex");
    let lang_re =
        Regex::new(r#"(?i)(\slang\s*=\s*)(?:"([^"]*)"|'([^']*)')"#).expect("valid regex");

    let Some(root) = root_re.find(html) else {
        return html.to_owned();
    };

    let tag = lang_re.replacen(root.as_str(), 1, |caps: &Captures| {
        let quote = if caps.get(2).is_some() { '"' } else { '\'' };
        format!("{}{quote}{lang}{quote}", &caps[1])
    });

    let mut out = String::with_capacity(html.len());
    out.push_str(&html[..root.start()]);
    out.push_str(&tag);
    out.push_str(&html[root.end()..]);
    out
}
