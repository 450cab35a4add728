use scraper::Html;

/// Convert an HTML document to plain text by concatenating its text nodes
/// in document order.
///
/// Parsing is the lenient html5ever kind: broken markup still yields a tree,
/// so the caller always gets a string back. Text content is taken literally,
/// with entities already decoded by the parser; no whitespace is collapsed
/// and no line breaks are inserted.
pub fn convert(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut text = String::new();
    for chunk in doc.root_element().text() {
        text.push_str(chunk);
    }
    text
}
