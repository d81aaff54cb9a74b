//! Citation and URL extraction from wikitext
//!
//! Ref tags are found by a small tokenizer that understands a subset of the
//! markup: `<ref ...>content</ref>`, `<ref .../>`, and attributes with
//! quoted or bare values. URLs inside ref content are found with regexes,
//! both bare `http(s)://` tokens and `|url=` style template parameters.

use crate::cli::{print_output, OutputFormat};
use crate::schema::{Citation, CitationIndex};
use anyhow::{Context, Result};
use clap::Args;
use regex::Regex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::LazyLock;

static BARE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s<>"\]\|{}\[]+"#).expect("valid regex")
});

static TEMPLATE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\|\s*(?:url|archive-url|archiveurl)\s*=\s*([^\s\|\}]+)").expect("valid regex")
});

/// Body of a recognized ref tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefBody<'a> {
    SelfClosing,
    Content(&'a str),
}

/// One `<ref>` occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefTag<'a> {
    pub name: Option<&'a str>,
    pub body: RefBody<'a>,
}

/// Iterator over the ref tags of a wikitext document, in document order.
///
/// Anything that does not parse as a complete tag (unterminated content,
/// broken attributes, `<references/>`) is skipped and scanning resumes one
/// byte after the `<`.
pub struct RefTokenizer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> RefTokenizer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }
}

impl<'a> Iterator for RefTokenizer<'a> {
    type Item = RefTag<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let start = find_ignore_case(self.src, "<ref", self.pos)?;
            let Some((name, self_closing, after_open)) = parse_open_tag(self.src, start + 4) else {
                self.pos = start + 1;
                continue;
            };

            if self_closing {
                self.pos = after_open;
                return Some(RefTag {
                    name,
                    body: RefBody::SelfClosing,
                });
            }

            match find_close_tag(self.src, after_open) {
                Some((content_end, after_close)) => {
                    self.pos = after_close;
                    return Some(RefTag {
                        name,
                        body: RefBody::Content(&self.src[after_open..content_end]),
                    });
                }
                None => {
                    self.pos = start + 1;
                }
            }
        }
    }
}

/// ASCII case-insensitive search. `needle` must be ASCII.
fn find_ignore_case(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if from >= hay.len() || needle.len() > hay.len() - from {
        return None;
    }
    (from..=hay.len() - needle.len())
        .find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Parse the rest of an opening tag after `<ref`.
///
/// Returns the name attribute, whether the tag self-closes, and the byte
/// offset just past the tag.
fn parse_open_tag(src: &str, mut i: usize) -> Option<(Option<&str>, bool, usize)> {
    let bytes = src.as_bytes();
    match bytes.get(i) {
        Some(b) if b.is_ascii_whitespace() || *b == b'/' || *b == b'>' => {}
        _ => return None,
    }

    let mut name = None;
    loop {
        i = skip_whitespace(bytes, i);
        match bytes.get(i)? {
            b'/' if bytes.get(i + 1) == Some(&b'>') => return Some((name, true, i + 2)),
            b'>' => return Some((name, false, i + 1)),
            _ => {}
        }

        let attr_start = i;
        while i < bytes.len()
            && (bytes[i].is_ascii_alphanumeric() || matches!(bytes[i], b'-' | b'_'))
        {
            i += 1;
        }
        if i == attr_start {
            return None;
        }
        let attr = &src[attr_start..i];

        i = skip_whitespace(bytes, i);
        let mut value = "";
        if bytes.get(i) == Some(&b'=') {
            i = skip_whitespace(bytes, i + 1);
            match bytes.get(i)? {
                quote @ (b'"' | b'\'') => {
                    let close = src[i + 1..].find(*quote as char)? + i + 1;
                    value = &src[i + 1..close];
                    i = close + 1;
                }
                _ => {
                    let value_start = i;
                    while i < bytes.len()
                        && !bytes[i].is_ascii_whitespace()
                        && bytes[i] != b'>'
                        && !(bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'>'))
                    {
                        i += 1;
                    }
                    value = &src[value_start..i];
                }
            }
        }

        if name.is_none() && attr.eq_ignore_ascii_case("name") {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                name = Some(trimmed);
            }
        }
    }
}

/// Find `</ref>` (optional whitespace before `>`), returning the content end
/// and the offset past the closing tag.
fn find_close_tag(src: &str, from: usize) -> Option<(usize, usize)> {
    let bytes = src.as_bytes();
    let mut search = from;
    loop {
        let close = find_ignore_case(src, "</ref", search)?;
        let i = skip_whitespace(bytes, close + 5);
        if bytes.get(i) == Some(&b'>') {
            return Some((close, i + 1));
        }
        search = close + 1;
    }
}

/// Parse wikitext into citations and URL lookups.
///
/// Every definition consumes a citation number, even one without URLs, so
/// later numbers line up with the rendered article. Reuse tags
/// (`<ref name="x"/>`) and repeated definitions of a known name consume
/// nothing.
pub fn parse_citations(wikitext: &str) -> CitationIndex {
    let mut index = CitationIndex::default();
    let mut number = 0;

    for tag in RefTokenizer::new(wikitext) {
        let content = match tag.body {
            RefBody::SelfClosing => "",
            RefBody::Content(c) => c,
        };

        if let Some(name) = tag.name {
            if content.is_empty() || index.name_to_number.contains_key(name) {
                continue;
            }
        }

        number += 1;
        if let Some(name) = tag.name {
            index.name_to_number.insert(name.to_string(), number);
        }

        let urls = extract_citation_urls(content);
        if urls.is_empty() {
            continue;
        }

        index.push(Citation {
            number,
            name: tag.name.map(str::to_string),
            urls,
        });
    }

    index
}

/// Build an index from a plain external-links list (no citation numbers)
pub fn index_external_links(links: &[String]) -> CitationIndex {
    let mut index = CitationIndex::default();
    for link in links {
        let url = clean_url(link);
        if url.starts_with("http") && !is_ignored_url(url) {
            index.insert_uncited(url.to_string());
        }
    }
    index
}

/// Extract unique URLs from ref content: bare URLs first, then template
/// parameters
pub fn extract_citation_urls(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    let bare = BARE_URL.find_iter(content).map(|m| m.as_str());
    let templated = TEMPLATE_URL
        .captures_iter(content)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str())
        .filter(|u| u.starts_with("http"));

    for candidate in bare.chain(templated) {
        let url = clean_url(candidate);
        if url.is_empty() || is_ignored_url(url) {
            continue;
        }
        if seen.insert(url.to_string()) {
            urls.push(url.to_string());
        }
    }

    urls
}

/// Trailing punctuation that belongs to the prose, not the link
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', ')', ']', '\'', '"'];

/// Strip surrounding whitespace and trailing punctuation
pub fn clean_url(url: &str) -> &str {
    url.trim().trim_end_matches(TRAILING_PUNCTUATION)
}

/// Wiki-internal links are not external references
pub fn is_ignored_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.contains("wikipedia.org/wiki/")
        || lower.contains("wikimedia.org")
        || lower.contains("wikidata.org")
}

#[derive(Args)]
pub struct ExtractArgs {
    /// Wikitext file to parse
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

pub async fn run_extract(args: ExtractArgs) -> Result<()> {
    let wikitext = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let index = parse_citations(&wikitext);
    eprintln!(
        "{} citations, {} unique URLs",
        index.citations.len(),
        index.url_to_citations.len()
    );
    print_output(&index, args.format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reuse_tag_does_not_create_citation() {
        let text = r#"<ref name="a">http://x</ref> text <ref name="a"/>"#;
        let index = parse_citations(text);
        assert_eq!(index.citations.len(), 1);
        assert_eq!(index.citations[0].number, 1);
        assert_eq!(index.citations[0].name.as_deref(), Some("a"));
        assert_eq!(index.citations[0].urls, vec!["http://x".to_string()]);
    }

    #[test]
    fn test_numbering_counts_refs_without_urls() {
        let text = concat!(
            "<ref>Smith, J. (1999). A Book.</ref>",
            "<ref name=\"w\">{{cite web |url=https://example.com/a |title=A}}</ref>",
            "<ref name=\"w\" />",
            "<ref>See https://example.org/b.</ref>",
        );
        let index = parse_citations(text);
        let numbers: Vec<usize> = index.citations.iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec![2, 3]);
        assert_eq!(index.citation_numbers("https://example.com/a"), &[2]);
        assert_eq!(index.citation_numbers("https://example.org/b"), &[3]);
        assert_eq!(index.name_to_number.get("w"), Some(&2));
    }

    #[test]
    fn test_disjoint_urls_map_to_their_citation() {
        let text = concat!(
            "<ref>http://one.example/a http://one.example/b</ref>",
            " and <ref>http://two.example/c</ref>",
        );
        let index = parse_citations(text);
        assert_eq!(index.citation_numbers("http://one.example/a"), &[1]);
        assert_eq!(index.citation_numbers("http://one.example/b"), &[1]);
        assert_eq!(index.citation_numbers("http://two.example/c"), &[2]);
        assert_eq!(index.unique_urls().len(), 3);
    }

    #[test]
    fn test_shared_url_maps_to_both_citations() {
        let text = "<ref>http://shared.example</ref><ref>http://shared.example</ref>";
        let index = parse_citations(text);
        assert_eq!(index.citation_numbers("http://shared.example"), &[1, 2]);
    }

    #[test]
    fn test_duplicate_named_definition_is_skipped() {
        let text = concat!(
            r#"<ref name="a">http://first</ref>"#,
            r#"<ref name="a">http://second</ref>"#,
            "<ref>http://third</ref>",
        );
        let index = parse_citations(text);
        assert_eq!(index.citations.len(), 2);
        assert_eq!(index.citations[1].number, 2);
        assert!(index.citation_numbers("http://second").is_empty());
    }

    #[test]
    fn test_named_ref_without_urls_reserves_number() {
        let text = r#"<ref name="book">A printed book</ref><ref name="book"/><ref>http://x</ref>"#;
        let index = parse_citations(text);
        assert_eq!(index.citations.len(), 1);
        assert_eq!(index.citations[0].number, 2);
        assert_eq!(index.name_to_number.get("book"), Some(&1));
    }

    #[test]
    fn test_case_insensitive_tags() {
        let text = "<REF Name='x'>http://upper.example</Ref >";
        let index = parse_citations(text);
        assert_eq!(index.citations.len(), 1);
        assert_eq!(index.citations[0].name.as_deref(), Some("x"));
    }

    #[test]
    fn test_references_tag_is_not_a_ref() {
        let text = "<ref>http://a.example</ref>\n== Notes ==\n<references />";
        let tags: Vec<_> = RefTokenizer::new(text).collect();
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn test_open_tag_inside_content_runs_to_first_close() {
        let text = "<ref>http://lost.example <ref name=b>http://b.example</ref>";
        let index = parse_citations(text);
        // The first <ref> runs to the only </ref>, swallowing the second open tag.
        assert_eq!(index.citations.len(), 1);
        assert_eq!(index.citations[0].urls.len(), 2);
    }

    #[test]
    fn test_tokenizer_attributes() {
        let tags: Vec<_> = RefTokenizer::new(
            r#"<ref group="n" name="multi word">c</ref><ref name=bare/><ref/>"#,
        )
        .collect();
        assert_eq!(tags.len(), 3);
        assert_eq!(tags[0].name, Some("multi word"));
        assert_eq!(tags[0].body, RefBody::Content("c"));
        assert_eq!(tags[1].name, Some("bare"));
        assert_eq!(tags[1].body, RefBody::SelfClosing);
        assert_eq!(tags[2].name, None);
    }

    #[test]
    fn test_unnamed_self_closing_consumes_number() {
        let index = parse_citations("<ref/><ref>http://x</ref>");
        assert_eq!(index.citations[0].number, 2);
    }

    #[test]
    fn test_extract_template_urls() {
        let content = concat!(
            "{{cite web |url=https://news.example/story ",
            "|archive-url=https://web.archive.org/web/2020/https://news.example/story ",
            "|archiveurl=ftp://nope |title=Story}}",
        );
        let urls = extract_citation_urls(content);
        assert_eq!(
            urls,
            vec![
                "https://news.example/story".to_string(),
                "https://web.archive.org/web/2020/https://news.example/story".to_string(),
            ]
        );
    }

    #[test]
    fn test_bare_url_stops_at_disallowed_chars() {
        let urls = extract_citation_urls(
            "[http://a.example/x Title] {{x|http://b.example/y}} <http://c.example>",
        );
        assert_eq!(
            urls,
            vec![
                "http://a.example/x".to_string(),
                "http://b.example/y".to_string(),
                "http://c.example".to_string(),
            ]
        );
    }

    #[test]
    fn test_clean_url() {
        assert_eq!(clean_url("http://x.org/a)."), "http://x.org/a");
        assert_eq!(clean_url("  http://x.org/a\"';: "), "http://x.org/a");
        assert_eq!(clean_url("http://x.org/a_(b)"), "http://x.org/a_(b");
        assert_eq!(clean_url("http://x.org/"), "http://x.org/");
    }

    #[test]
    fn test_ignored_urls() {
        assert!(is_ignored_url("https://en.wikipedia.org/wiki/Rust"));
        assert!(is_ignored_url("https://upload.WIKIMEDIA.org/a.png"));
        assert!(is_ignored_url("https://www.wikidata.org/wiki/Q1"));
        assert!(!is_ignored_url(
            "https://en.wikipedia.org/w/index.php?title=X"
        ));
        assert!(!is_ignored_url("https://example.com"));

        let text = "<ref>https://en.wikipedia.org/wiki/Foo</ref><ref>http://x</ref>";
        let index = parse_citations(text);
        assert_eq!(index.citations.len(), 1);
        assert_eq!(index.citations[0].number, 2);
    }

    #[test]
    fn test_index_external_links() {
        let links = vec![
            "https://example.com/a.".to_string(),
            "https://commons.wikimedia.org/x".to_string(),
            "//protocol-relative.example".to_string(),
            "https://example.com/a".to_string(),
        ];
        let index = index_external_links(&links);
        assert_eq!(
            index.unique_urls(),
            vec!["https://example.com/a".to_string()]
        );
        assert!(index.citations.is_empty());
        assert!(index.citation_numbers("https://example.com/a").is_empty());
    }

    #[test]
    fn test_multibyte_text_around_tags() {
        let text = "Überblick — <ref>「引用」 https://例え.jp/パス 。</ref> ✓";
        let index = parse_citations(text);
        assert_eq!(index.citations.len(), 1);
        assert_eq!(
            index.citations[0].urls,
            vec!["https://例え.jp/パス".to_string()]
        );
    }
}
