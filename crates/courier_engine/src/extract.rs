use scraper::{Html, Selector};

/// Text of the document's `<title>` element, trimmed; `None` when missing or blank.
pub fn document_title(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let title_sel = Selector::parse("title").ok()?;
    doc.select(&title_sel)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}
