//! HTML snapshots of the live DOM.
//!
//! Serializes a subtree of the [`Dom`] store to an HTML string, for test
//! assertions and diagnostics. Attribute order is insertion order, so
//! snapshots are deterministic.

use crate::dom::{Dom, DomId, DomKind};

/// Serialize a node and its subtree (outer HTML).
pub fn to_html(dom: &Dom, node: DomId) -> String {
    let mut out = String::new();
    write_node(dom, node, &mut out);
    out
}

/// Serialize an element's children only (inner HTML).
pub fn inner_html(dom: &Dom, node: DomId) -> String {
    let mut out = String::new();
    for &child in dom.children(node) {
        write_node(dom, child, &mut out);
    }
    out
}

fn write_node(dom: &Dom, id: DomId, out: &mut String) {
    let Ok(kind) = dom.kind(id) else {
        return;
    };
    match kind {
        DomKind::Element { tag, attrs, children, .. } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&html_escape(value));
                out.push('"');
            }
            out.push('>');

            for &child in children {
                write_node(dom, child, out);
            }

            if !is_void_element(tag) {
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
        DomKind::Text(content) => out.push_str(&html_escape(content)),
        DomKind::Comment(content) => {
            out.push_str("<!--");
            out.push_str(content);
            out.push_str("-->");
        }
    }
}

/// Escape HTML special characters.
fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            _ => result.push(c),
        }
    }
    result
}

/// Check if tag is a void element (no closing tag).
fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_snapshot() {
        let mut dom = Dom::new();
        let div = dom.create_element("div");
        dom.set_attr(div, "class", "box").unwrap();
        let span = dom.create_element("span");
        let text = dom.create_text("hi");
        dom.insert_before(div, span, None).unwrap();
        dom.insert_before(span, text, None).unwrap();

        assert_eq!(to_html(&dom, div), "<div class=\"box\"><span>hi</span></div>");
        assert_eq!(inner_html(&dom, div), "<span>hi</span>");
    }

    #[test]
    fn test_comment_and_void() {
        let mut dom = Dom::new();
        let div = dom.create_element("div");
        let c = dom.create_comment("marker");
        let br = dom.create_element("br");
        dom.insert_before(div, c, None).unwrap();
        dom.insert_before(div, br, None).unwrap();

        assert_eq!(inner_html(&dom, div), "<!--marker--><br>");
    }

    #[test]
    fn test_escaping() {
        let mut dom = Dom::new();
        let div = dom.create_element("div");
        let text = dom.create_text("a < b & \"c\"");
        dom.insert_before(div, text, None).unwrap();

        assert_eq!(inner_html(&dom, div), "a &lt; b &amp; &quot;c&quot;");
    }
}
