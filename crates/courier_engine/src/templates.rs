//! Fixed document templates. Every function here is a pure `(data) -> markup`
//! builder; metadata is escaped, article bodies are inserted verbatim.

use std::fmt::Write;

use chrono::NaiveDateTime;
use html_escape::{encode_double_quoted_attribute, encode_text};

pub const COMPILATION_TITLE: &str = "Karakeep Articles Collection";

const SINGLE_STYLE: &str = r#"        body { font-family: Arial, sans-serif; line-height: 1.6; margin: 40px; max-width: 800px; }
        h1 { color: #333; border-bottom: 2px solid #333; }
        .meta { color: #666; font-style: italic; margin-bottom: 20px; }
        .content { margin-top: 20px; }
        .main-image { text-align: center; margin: 20px 0; }
        img { max-width: 100%; height: auto; display: block; margin: 10px auto; }
        a { color: #0066cc; }
        figure { margin: 20px 0; text-align: center; }
        figcaption { font-style: italic; color: #666; margin-top: 5px; }
        table { border-collapse: collapse; width: 100%; margin: 20px 0; }
        th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
        th { background-color: #f2f2f2; }
        blockquote { border-left: 4px solid #ccc; margin: 20px 0; padding-left: 20px; font-style: italic; }
        pre { background-color: #f4f4f4; padding: 15px; border-radius: 5px; overflow-x: auto; }
        code { background-color: #f4f4f4; padding: 2px 4px; border-radius: 3px; }
"#;

const COMPILATION_STYLE: &str = r#"        body { font-family: Arial, sans-serif; line-height: 1.6; max-width: 1000px; margin: 0 auto; padding: 20px; }
        .cover { text-align: center; margin-bottom: 3em; padding: 2em; border-bottom: 3px solid #333; }
        .cover h1 { font-size: 2.5em; color: #333; margin-bottom: 0.5em; }
        .cover p { color: #666; font-size: 1.1em; }
        .article { margin-bottom: 3em; padding-bottom: 2em; border-bottom: 1px solid #eee; }
        .article-title { font-size: 1.8em; color: #333; border-bottom: 2px solid #333; padding-bottom: 0.5em; margin-bottom: 1em; }
        .article-meta { background-color: #f9f9f9; padding: 1em; margin-bottom: 1.5em; border-left: 4px solid #ccc; color: #666; }
        .article-content { margin-top: 1em; }
        img { max-width: 100%; height: auto; display: block; margin: 1em auto; }
        figure { margin: 1.5em 0; text-align: center; }
        figcaption { font-style: italic; color: #666; margin-top: 0.5em; }
        blockquote { border-left: 4px solid #ccc; margin: 1.5em 0; padding-left: 1em; font-style: italic; }
        pre { background-color: #f4f4f4; padding: 1em; border-radius: 5px; overflow-x: auto; }
        code { background-color: #f4f4f4; padding: 0.2em 0.4em; border-radius: 3px; }
        table { border-collapse: collapse; width: 100%; margin: 1em 0; }
        th, td { border: 1px solid #ddd; padding: 0.5em; text-align: left; }
        th { background-color: #f2f2f2; }
        .toc { background-color: #f9f9f9; padding: 1.5em; margin-bottom: 2em; border-radius: 5px; }
        .toc h2 { margin-top: 0; color: #333; }
        .toc ul { list-style-type: none; padding-left: 0; }
        .toc li { margin-bottom: 0.5em; }
        .toc a { color: #0066cc; text-decoration: none; }
        .toc a:hover { text-decoration: underline; }
"#;

/// Metadata and embedded body of one article, as shown in a document.
#[derive(Debug, Clone, Copy)]
pub struct ArticleView<'a> {
    pub title: &'a str,
    pub author: &'a str,
    pub publisher: &'a str,
    pub url: &'a str,
    pub body: &'a str,
}

pub fn single_document(article: &ArticleView<'_>, retrieved: NaiveDateTime) -> String {
    let title = encode_text(article.title);
    let mut html = String::with_capacity(article.body.len() + 4096);
    head(&mut html, &title, SINGLE_STYLE);
    let _ = write!(
        html,
        r#"<body>
    <h1>{title}</h1>
    <div class="meta">
{meta}        <p><strong>Retrieved:</strong> {retrieved}</p>
    </div>
    <div class="content">
        {body}
    </div>
</body>
</html>
"#,
        meta = meta_lines(article),
        retrieved = retrieved.format("%Y-%m-%d %H:%M:%S"),
        body = article.body,
    );
    html
}

pub fn compilation_document(articles: &[ArticleView<'_>], generated: NaiveDateTime) -> String {
    let body_len: usize = articles.iter().map(|a| a.body.len()).sum();
    let mut html = String::with_capacity(body_len + 8192);
    head(&mut html, COMPILATION_TITLE, COMPILATION_STYLE);
    let _ = write!(
        html,
        r#"<body>
    <div class="cover">
        <h1>Karakeep Articles</h1>
        <p>Collection of saved articles</p>
        <p>Generated on {generated}</p>
        <p>{count} articles</p>
    </div>

    <div class="toc">
        <h2>Table of Contents</h2>
        <ul>
"#,
        generated = generated.format("%B %d, %Y at %H:%M"),
        count = articles.len(),
    );
    for (i, article) in articles.iter().enumerate() {
        html.push_str(&toc_entry(i + 1, article.title));
    }
    html.push_str("        </ul>\n    </div>\n");

    for (i, article) in articles.iter().enumerate() {
        let _ = write!(
            html,
            r#"
    <div class="article" id="{anchor}">
        <h1 class="article-title">{title}</h1>
        <div class="article-meta">
{meta}        </div>
        <div class="article-content">
            {body}
        </div>
    </div>
"#,
            anchor = anchor(i + 1),
            title = encode_text(article.title),
            meta = meta_lines(article),
            body = article.body,
        );
    }
    html.push_str("</body>\n</html>\n");
    html
}

/// Anchor id of the 1-based `position` in a compilation.
pub fn anchor(position: usize) -> String {
    format!("article-{position}")
}

fn toc_entry(position: usize, title: &str) -> String {
    format!(
        "            <li><a href=\"#{}\">{}. {}</a></li>\n",
        anchor(position),
        position,
        encode_text(title)
    )
}

fn head(html: &mut String, title: &str, style: &str) {
    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
    <style>
{style}    </style>
</head>
"#
    );
}

fn meta_lines(article: &ArticleView<'_>) -> String {
    format!(
        r#"        <p><strong>Author:</strong> {author}</p>
        <p><strong>Publisher:</strong> {publisher}</p>
        <p><strong>Source:</strong> <a href="{href}">{url}</a></p>
"#,
        author = encode_text(article.author),
        publisher = encode_text(article.publisher),
        href = encode_double_quoted_attribute(article.url),
        url = encode_text(article.url),
    )
}
