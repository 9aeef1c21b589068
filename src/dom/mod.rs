//! Parsed page model.
//!
//! [`Document`] wraps the arena built by html5ever and adds the queries the
//! rule builder and extractor need: element-only traversal in either
//! direction, full and direct text, attribute lookup and URL resolution
//! against the page's base URL.
//!
//! Parsing never fails. Garbage input produces the skeleton html5ever always
//! builds (`html`, `head`, `body`) with whatever text it could salvage.

mod arena;
mod tree_sink;

use std::cell::OnceCell;

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use url::Url;

pub use arena::{ArenaDom, Attribute, NodeData, NodeId};
use tree_sink::ArenaSink;

use crate::util::normalize_in_place;

/// Traversal direction for [`Document::descendants`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Document order (pre-order, parents before children).
    Forward,
    /// Exact reverse of document order.
    Reverse,
}

/// A parsed HTML page.
pub struct Document {
    dom: ArenaDom,
    base_url: Option<Url>,
    /// Untrimmed recursive text per node, filled on first request.
    text_cache: Vec<OnceCell<String>>,
}

impl Document {
    /// Parse markup into a document. `base_url` is used to resolve relative
    /// `href`/`src` values.
    ///
    /// Text and attribute values are NFKD-normalized after entity decoding,
    /// so `&nbsp;` reads as a plain space and `&eacute;` as `e` plus accent.
    pub fn parse(html: &str, base_url: Option<Url>) -> Self {
        let sink = ArenaSink::new();
        let mut dom = parse_document(sink, ParseOpts::default())
            .from_utf8()
            .one(html.as_bytes())
            .into_dom();
        for node in dom.nodes_mut() {
            match &mut node.data {
                NodeData::Text(text) => normalize_in_place(text),
                NodeData::Element { attrs, .. } => {
                    for attr in attrs {
                        normalize_in_place(&mut attr.value);
                    }
                }
                _ => {}
            }
        }
        let text_cache = (0..dom.len()).map(|_| OnceCell::new()).collect();
        Self {
            dom,
            base_url,
            text_cache,
        }
    }

    /// The document root. It has no tag and no parent.
    pub fn root(&self) -> NodeId {
        self.dom.document()
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Parent of a node, `None` for the root.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.dom
            .get(id)
            .map(|n| n.parent)
            .filter(|p| p.is_some())
    }

    /// Tag name of an element.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.dom.element_name(id)
    }

    /// Attributes of an element in source order.
    pub fn attrs(&self, id: NodeId) -> &[Attribute] {
        self.dom.attrs(id)
    }

    /// Single attribute lookup.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.dom.get_attr(id, name)
    }

    /// Element children of a node, in document order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.dom
            .children(id)
            .filter(move |&c| self.dom.is_element(c))
    }

    /// All element descendants of `id` (excluding `id` itself).
    pub fn descendants(&self, id: NodeId, order: Order) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).collect();
        stack.reverse();
        while let Some(node) = stack.pop() {
            out.push(node);
            let len = stack.len();
            stack.extend(self.children(node));
            stack[len..].reverse();
        }
        if order == Order::Reverse {
            out.reverse();
        }
        out
    }

    /// All text under a node, concatenated in document order and trimmed.
    pub fn text(&self, id: NodeId) -> &str {
        match self.text_cache.get(id.0 as usize) {
            Some(cell) => cell.get_or_init(|| self.collect_text(id)).trim(),
            None => "",
        }
    }

    /// Text written directly under a node, ignoring sub-elements, trimmed.
    pub fn direct_text(&self, id: NodeId) -> String {
        let text: String = self
            .dom
            .children(id)
            .filter_map(|c| self.dom.text_content(c))
            .collect();
        text.trim().to_string()
    }

    /// Resolve an attribute value against the base URL.
    ///
    /// Without a base URL the value is returned unchanged; a value the URL
    /// parser rejects resolves to `None`.
    pub fn resolve_url(&self, value: &str) -> Option<String> {
        match &self.base_url {
            Some(base) => base.join(value).ok().map(String::from),
            None => Some(value.to_string()),
        }
    }

    fn collect_text(&self, id: NodeId) -> String {
        let mut text = String::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if let Some(t) = self.dom.text_content(node) {
                text.push_str(t);
                continue;
            }
            let len = stack.len();
            stack.extend(self.dom.children(node));
            stack[len..].reverse();
        }
        text
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.dom.len())
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(doc: &Document, tag: &str) -> NodeId {
        doc.descendants(doc.root(), Order::Forward)
            .into_iter()
            .find(|&n| doc.tag(n) == Some(tag))
            .expect("tag present")
    }

    #[test]
    fn test_descendants_orders() {
        let doc = Document::parse("<div><p><b>x</b></p><span>y</span></div>", None);
        let forward: Vec<_> = doc
            .descendants(doc.root(), Order::Forward)
            .into_iter()
            .filter_map(|n| doc.tag(n))
            .collect();
        assert_eq!(forward, vec!["html", "head", "body", "div", "p", "b", "span"]);

        let reverse: Vec<_> = doc
            .descendants(doc.root(), Order::Reverse)
            .into_iter()
            .filter_map(|n| doc.tag(n))
            .collect();
        assert_eq!(reverse, vec!["span", "b", "p", "div", "body", "head", "html"]);
    }

    #[test]
    fn test_text_and_direct_text() {
        let doc = Document::parse("<div> Posted <b>today</b> by admin </div>", None);
        let div = find(&doc, "div");

        assert_eq!(doc.text(div), "Posted today by admin");
        assert_eq!(doc.direct_text(div), "Posted  by admin");
    }

    #[test]
    fn test_children_skip_text_nodes() {
        let doc = Document::parse("<ul> <li>a</li> text <li>b</li> </ul>", None);
        let ul = find(&doc, "ul");
        let tags: Vec<_> = doc.children(ul).filter_map(|c| doc.tag(c)).collect();
        assert_eq!(tags, vec!["li", "li"]);
    }

    #[test]
    fn test_parent_of_html_is_root() {
        let doc = Document::parse("<p>x</p>", None);
        let html = find(&doc, "html");
        assert_eq!(doc.parent(html), Some(doc.root()));
        assert_eq!(doc.parent(doc.root()), None);
    }

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://example.com/news/").unwrap();
        let doc = Document::parse("", Some(base));
        assert_eq!(
            doc.resolve_url("2023/06/post.html").as_deref(),
            Some("https://example.com/news/2023/06/post.html")
        );
        assert_eq!(
            doc.resolve_url("/about").as_deref(),
            Some("https://example.com/about")
        );
        assert_eq!(
            doc.resolve_url("https://other.org/x").as_deref(),
            Some("https://other.org/x")
        );

        let bare = Document::parse("", None);
        assert_eq!(bare.resolve_url("/about").as_deref(), Some("/about"));
    }

    #[test]
    fn test_entities_are_normalized_after_decoding() {
        let doc = Document::parse(
            r#"<p title="Caf&eacute;">Hello&nbsp;world&hellip;</p>"#,
            None,
        );
        let p = find(&doc, "p");
        assert_eq!(doc.text(p), "Hello world...");
        assert_eq!(doc.attr(p, "title"), Some("Cafe\u{301}"));
    }

    #[test]
    fn test_garbage_input_still_parses() {
        let doc = Document::parse("hffhfhfhfhfhfhhfh", None);
        let body = find(&doc, "body");
        assert_eq!(doc.text(body), "hffhfhfhfhfhfhhfh");
    }
}
