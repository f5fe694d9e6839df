//! Re-serialization of rendered HTML as well-formed XHTML for EPUB chapters.

use std::borrow::Cow;
use std::fmt::Write;

use ego_tree::NodeRef;
use scraper::node::{Element, Node};
use scraper::Html;

const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";
const SVG_NS: &str = "http://www.w3.org/2000/svg";
const MATHML_NS: &str = "http://www.w3.org/1998/Math/MathML";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Parse `html` the way a browser would and write the tree back as XML:
/// void elements self-closed, entities as literal characters, every value
/// escaped, the XHTML namespace on the root. Comments are dropped.
pub(crate) fn to_xhtml(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::with_capacity(html.len() + 256);
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE html>\n");
    write_node(document.tree.root(), &mut out);
    out.push('\n');
    out
}

fn write_node(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Element(element) => write_element(node, element, out),
        Node::Text(text) => out.push_str(&html_escape::encode_text(&xml_chars(text))),
        Node::Document | Node::Fragment => write_children(node, out),
        _ => {}
    }
}

fn write_children(node: NodeRef<'_, Node>, out: &mut String) {
    for child in node.children() {
        write_node(child, out);
    }
}

fn write_element(node: NodeRef<'_, Node>, element: &Element, out: &mut String) {
    let name = element.name();
    // Prefixed tags such as Word's `<o:p>` have no namespace binding; keep their content only.
    if !is_xml_name(name) {
        write_children(node, out);
        return;
    }

    out.push('<');
    out.push_str(name);
    if let Some(ns) = namespace_for(name) {
        let _ = write!(out, " xmlns=\"{ns}\"");
    }
    let mut seen: Vec<&str> = Vec::new();
    for (attr, value) in element.attrs() {
        if attr == "xmlns" || !is_xml_name(attr) || seen.contains(&attr) {
            continue;
        }
        seen.push(attr);
        let _ = write!(
            out,
            " {attr}=\"{}\"",
            html_escape::encode_double_quoted_attribute(&xml_chars(value))
        );
    }

    if VOID_ELEMENTS.contains(&name) {
        out.push_str("/>");
        return;
    }
    out.push('>');
    write_children(node, out);
    let _ = write!(out, "</{name}>");
}

fn namespace_for(name: &str) -> Option<&'static str> {
    match name {
        "html" => Some(XHTML_NS),
        "svg" => Some(SVG_NS),
        "math" => Some(MATHML_NS),
        _ => None,
    }
}

/// Unprefixed XML name.
fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Drop characters XML 1.0 does not allow, even as references.
fn xml_chars(text: &str) -> Cow<'_, str> {
    let allowed = |c: char| {
        matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
    };
    if text.chars().all(allowed) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.chars().filter(|c| allowed(*c)).collect())
    }
}
