//! Lenient HTML scanning.
//!
//! Builds a flat element table (tag, classes, parent, text span) from a page
//! in one pass. Roster pages are hand-written markup with unclosed `<li>`s and
//! stray end tags, so the scanner never fails: unknown end tags are ignored,
//! implicitly closed elements are closed when a sibling opens, and anything
//! still open at EOF ends there.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_TAGS: &[&str] = &["script", "style"];

/// Tags that do not separate words in rendered text.
const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "em", "font", "i", "small", "span", "strong", "sub", "sup", "u",
];

/// Tags closed by an opening sibling of the same name.
const IMPLICIT_CLOSE_TAGS: &[&str] = &["li", "p", "dt", "dd", "tr", "td", "th", "option"];

/// Open elements an implicit close never reaches past.
const SCOPE_TAGS: &[&str] = &[
    "ul", "ol", "dl", "table", "tbody", "thead", "select", "div", "section", "article", "body",
];

#[derive(Debug)]
struct Node {
    tag: String,
    classes: Vec<String>,
    parent: Option<usize>,
    text_start: usize,
    text_end: usize,
}

/// A scanned page.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    text: String,
}

/// Borrowed view of one element.
#[derive(Debug, Clone, Copy)]
pub struct Element<'a> {
    doc: &'a Document,
    index: usize,
}

impl Document {
    pub fn parse(html: &str) -> Self {
        let mut doc = Document {
            nodes: Vec::new(),
            text: String::new(),
        };
        let mut stack: Vec<usize> = Vec::new();
        let mut rest = html;

        while !rest.is_empty() {
            let Some(lt) = rest.find('<') else {
                doc.push_text(rest);
                break;
            };
            doc.push_text(&rest[..lt]);
            rest = &rest[lt..];

            if let Some(after) = rest.strip_prefix("<!--") {
                rest = after.find("-->").map_or("", |end| &after[end + 3..]);
                continue;
            }
            let Some(gt) = rest.find('>') else {
                doc.push_text(rest);
                break;
            };
            let inner = &rest[1..gt];
            let name = tag_name(inner.strip_prefix('/').unwrap_or(inner));
            if name.is_empty() && !inner.starts_with(['!', '?']) {
                // `a < b` in body text, not a tag.
                doc.push_text("<");
                rest = &rest[1..];
                continue;
            }
            rest = &rest[gt + 1..];

            if inner.starts_with(['!', '?']) {
                continue;
            }
            if inner.starts_with('/') {
                doc.separate(&name);
                doc.close(&mut stack, &name);
                continue;
            }

            doc.separate(&name);
            if IMPLICIT_CLOSE_TAGS.contains(&name.as_str()) {
                doc.close_open_sibling(&mut stack, &name);
            }

            let index = doc.nodes.len();
            doc.nodes.push(Node {
                classes: parse_classes(inner),
                parent: stack.last().copied(),
                text_start: doc.text.len(),
                text_end: doc.text.len(),
                tag: name.clone(),
            });

            if inner.trim_end().ends_with('/') || VOID_TAGS.contains(&name.as_str()) {
                continue;
            }
            if RAW_TEXT_TAGS.contains(&name.as_str()) {
                let lowered = rest.to_ascii_lowercase();
                rest = match lowered.find(&format!("</{name}")) {
                    Some(pos) => &rest[pos..],
                    None => "",
                };
            }
            stack.push(index);
        }

        let end = doc.text.len();
        for index in stack {
            doc.nodes[index].text_end = end;
        }
        doc
    }

    /// All elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = Element<'_>> {
        (0..self.nodes.len()).map(move |index| Element { doc: self, index })
    }

    fn push_text(&mut self, raw: &str) {
        self.text.push_str(&decode_entities(raw));
    }

    fn separate(&mut self, tag: &str) {
        if !INLINE_TAGS.contains(&tag) {
            self.text.push(' ');
        }
    }

    fn close(&mut self, stack: &mut Vec<usize>, name: &str) {
        let Some(pos) = stack.iter().rposition(|&i| self.nodes[i].tag == name) else {
            return;
        };
        let end = self.text.len();
        for index in stack.drain(pos..) {
            self.nodes[index].text_end = end;
        }
    }

    fn close_open_sibling(&mut self, stack: &mut Vec<usize>, name: &str) {
        for (pos, &index) in stack.iter().enumerate().rev() {
            let tag = self.nodes[index].tag.as_str();
            if tag == name {
                let end = self.text.len();
                for index in stack.drain(pos..) {
                    self.nodes[index].text_end = end;
                }
                return;
            }
            if SCOPE_TAGS.contains(&tag) {
                return;
            }
        }
    }
}

impl<'a> Element<'a> {
    fn node(&self) -> &'a Node {
        &self.doc.nodes[self.index]
    }

    pub fn tag(&self) -> &'a str {
        &self.node().tag
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.node().classes.iter().any(|c| c == class)
    }

    pub fn parent(&self) -> Option<Element<'a>> {
        self.node().parent.map(|index| Element {
            doc: self.doc,
            index,
        })
    }

    /// Rendered text with whitespace runs collapsed to single spaces.
    pub fn text(&self) -> String {
        let node = self.node();
        self.doc.text[node.text_start..node.text_end]
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn tag_name(inner: &str) -> String {
    let inner = inner.trim_start();
    if !inner.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return String::new();
    }
    inner
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect::<String>()
        .to_ascii_lowercase()
}

fn parse_classes(inner: &str) -> Vec<String> {
    static CLASS_ATTR: OnceLock<Regex> = OnceLock::new();
    let re = CLASS_ATTR.get_or_init(|| {
        Regex::new(r#"(?i)\sclass\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>/]+))"#)
            .expect("class attribute pattern is valid")
    });
    let Some(caps) = re.captures(inner) else {
        return Vec::new();
    };
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default()
}

/// Decode the character references roster pages actually use.
pub fn decode_entities(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&rest[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(doc: &'a Document, tag: &str) -> Vec<Element<'a>> {
        doc.elements().filter(|e| e.tag() == tag).collect()
    }

    #[test]
    fn collects_text_and_parents() {
        let doc = Document::parse("<ul><li><h3>みか（24）</h3><p>20:00-05:00</p></li></ul>");
        let h3 = find(&doc, "h3");
        assert_eq!(h3.len(), 1);
        assert_eq!(h3[0].text(), "みか（24）");
        let li = h3[0].parent().expect("li");
        assert_eq!(li.tag(), "li");
        assert_eq!(li.text(), "みか（24） 20:00-05:00");
        assert_eq!(li.parent().map(|e| e.tag()), Some("ul"));
    }

    #[test]
    fn unclosed_list_items_close_at_next_sibling() {
        let doc = Document::parse("<ul><li>a 10:00<li>b 11:00</ul>");
        let items = find(&doc, "li");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text(), "a 10:00");
        assert_eq!(items[1].text(), "b 11:00");
        assert_eq!(items[1].parent().map(|e| e.tag()), Some("ul"));
    }

    #[test]
    fn classes_are_parsed_in_any_quote_style() {
        let doc = Document::parse(
            r#"<div class="cast name">a</div><span class='cast_name'>b</span><i class=name>c</i>"#,
        );
        let els: Vec<_> = doc.elements().collect();
        assert!(els[0].has_class("name") && els[0].has_class("cast"));
        assert!(els[1].has_class("cast_name"));
        assert!(els[2].has_class("name"));
        assert!(!els[0].has_class("cast_name"));
    }

    #[test]
    fn data_class_attribute_is_not_a_class() {
        let doc = Document::parse(r#"<div data-class="name">a</div>"#);
        assert!(!doc.elements().next().unwrap().has_class("name"));
    }

    #[test]
    fn scripts_styles_and_comments_are_skipped() {
        let doc = Document::parse(
            "<div><script>var t = '<h3>x</h3>';</script><style>h3{}</style><!-- <h3>y</h3> -->z</div>",
        );
        assert!(find(&doc, "h3").is_empty());
        assert_eq!(find(&doc, "div")[0].text(), "z");
    }

    #[test]
    fn inline_tags_do_not_split_words() {
        let doc = Document::parse("<p><b>20</b>:00-<span>05:00</span></p>");
        assert_eq!(find(&doc, "p")[0].text(), "20:00-05:00");
    }

    #[test]
    fn stray_end_tags_and_void_elements_are_tolerated() {
        let doc = Document::parse("<div>a<br>b</span><img src=x>c</div>");
        assert_eq!(find(&doc, "div")[0].text(), "a b c");
        assert_eq!(find(&doc, "br")[0].text(), "");
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(decode_entities("a &amp; b&nbsp;&#12354;&#x3042;"), "a & b あ\u{3042}");
        assert_eq!(decode_entities("R&D &unknown; &"), "R&D &unknown; &");
    }

    #[test]
    fn less_than_in_text_is_kept() {
        let doc = Document::parse("<p>1 < 2</p>");
        assert_eq!(find(&doc, "p")[0].text(), "1 < 2");
    }
}
