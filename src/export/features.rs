//! Derived feature families: URL domains, sanitized free text, sparse vector lines.

use std::collections::HashMap;

use once_cell::sync::OnceCell;
use regex::Regex;
use url::Url;

/// Collapses every run of line breaks into one space.
#[must_use]
pub fn sanitize_line(text: &str) -> String {
    static LINE_BREAKS: OnceCell<std::result::Result<Regex, String>> = OnceCell::new();
    let regex = LINE_BREAKS.get_or_init(|| Regex::new(r"[\r\n]+").map_err(|err| err.to_string()));
    match regex {
        Ok(re) => re.replace_all(text, " ").into_owned(),
        Err(_) => text.replace(['\r', '\n'], " "),
    }
}

/// Host of `raw` without a leading `www.`; surrounding double quotes are ignored.
#[must_use]
pub fn url_domain(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim().trim_matches('"')).ok()?;
    let host = url.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    (!host.is_empty()).then(|| host.to_string())
}

/// Sparse per-document vector; each term id appears once, in first-added order.
#[derive(Debug, Clone, Default)]
pub struct DocVector {
    entries: Vec<(usize, u32)>,
    positions: HashMap<usize, usize>,
}

impl DocVector {
    pub fn add(&mut self, id: usize, freq: u32) {
        match self.positions.get(&id) {
            Some(&pos) => self.entries[pos].1 += freq,
            None => {
                self.positions.insert(id, self.entries.len());
                self.entries.push((id, freq));
            }
        }
    }

    #[must_use]
    pub fn contains(&self, id: usize) -> bool {
        self.positions.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    /// `id:freq` entries separated by spaces.
    #[must_use]
    pub fn tf_line(&self) -> String {
        join(self.entries.iter().map(|(id, freq)| format!("{id}:{freq}")))
    }

    /// `id:1` entries separated by spaces.
    #[must_use]
    pub fn binary_line(&self) -> String {
        join(self.entries.iter().map(|(id, _)| format!("{id}:1")))
    }

    /// Binary entries with `expansion` spliced in after the first `split` entries.
    #[must_use]
    pub fn smoothed_line(&self, split: usize, expansion: &[usize], weight: f64) -> String {
        let split = split.min(self.entries.len());
        let weight = format_weight(weight);
        let head = self.entries[..split].iter().map(|(id, _)| format!("{id}:1"));
        let extra = expansion.iter().map(|id| format!("{id}:{weight}"));
        let tail = self.entries[split..].iter().map(|(id, _)| format!("{id}:1"));
        join(head.chain(extra).chain(tail))
    }
}

fn join(parts: impl Iterator<Item = String>) -> String {
    parts.collect::<Vec<_>>().join(" ")
}

/// Always renders a fractional part, so `1.0` stays `1.0`.
fn format_weight(weight: f64) -> String {
    let rendered = weight.to_string();
    if rendered.contains(['.', 'e', 'i', 'N']) {
        rendered
    } else {
        format!("{rendered}.0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_strips_www_and_quotes() {
        assert_eq!(
            url_domain("\"https://www.example.com/path?q=1\"").as_deref(),
            Some("example.com")
        );
        assert_eq!(url_domain("http://blog.example.org").as_deref(), Some("blog.example.org"));
        assert_eq!(url_domain("not a url"), None);
        assert_eq!(url_domain("mailto:someone@example.com"), None);
    }

    #[test]
    fn line_breaks_collapse_to_one_space() {
        assert_eq!(sanitize_line("a\r\n\nb\nc"), "a b c");
    }

    #[test]
    fn vector_lines_list_each_id_once() {
        let mut vector = DocVector::default();
        vector.add(3, 2);
        vector.add(0, 1);
        vector.add(3, 1);
        vector.add(7, 1);
        assert_eq!(vector.tf_line(), "3:3 0:1 7:1");
        assert_eq!(vector.binary_line(), "3:1 0:1 7:1");
        assert_eq!(vector.smoothed_line(2, &[9], 1.0), "3:1 0:1 9:1.0 7:1");
        assert_eq!(vector.smoothed_line(2, &[9], 0.5), "3:1 0:1 9:0.5 7:1");
    }
}
