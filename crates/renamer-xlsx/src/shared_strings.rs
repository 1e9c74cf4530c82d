use roxmltree::{Document, Node};

use crate::XlsxError;

/// Decode `xl/sharedStrings.xml` into display strings, indexed by `<si>` position.
///
/// Rich runs (`<r><t>`) are concatenated; phonetic guides (`<rPh>`) are not part of the displayed
/// text and are skipped.
pub fn parse_shared_strings(xml: &str) -> Result<Vec<String>, XlsxError> {
    let doc = Document::parse(xml)?;
    let root = doc.root_element();
    if root.tag_name().name() != "sst" {
        return Err(XlsxError::Invalid(format!(
            "sharedStrings root is <{}>, expected <sst>",
            root.tag_name().name()
        )));
    }

    Ok(root
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "si")
        .map(si_text)
        .collect())
}

fn si_text(si: Node<'_, '_>) -> String {
    let mut out = String::new();
    for child in si.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "t" => out.push_str(child.text().unwrap_or_default()),
            "r" => {
                for t in child
                    .children()
                    .filter(|n| n.is_element() && n.tag_name().name() == "t")
                {
                    out.push_str(t.text().unwrap_or_default());
                }
            }
            _ => {}
        }
    }
    out
}
