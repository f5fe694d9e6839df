#![cfg(unix)]

use std::fs;
use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use courier_engine::{
    ChainOutcome, ConverterSettings, ExternalTool, FallbackChain, FormatConverter, OutputFormat,
    RenderedDocument, ToolNames,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";
const DC_NS: &str = "http://purl.org/dc/elements/1.1/";

const HTML: &str = "<!DOCTYPE html><html><head><title>Converted Piece</title></head><body><p>hi</p></body></html>";

fn rendered(dir: &Path) -> RenderedDocument {
    let path = dir.join("Converted Piece_20240101_120000.html");
    fs::write(&path, HTML).unwrap();
    RenderedDocument {
        title: "Converted Piece".into(),
        path,
        html: HTML.into(),
    }
}

fn script(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}

fn missing(name: &str) -> String {
    format!("courier-test-missing-{name}")
}

fn no_tools() -> ToolNames {
    ToolNames {
        weasyprint: missing("weasyprint"),
        wkhtmltopdf: missing("wkhtmltopdf"),
        chrome: vec![missing("chromium"), missing("chrome")],
        ebook_convert: missing("ebook-convert"),
        kindlegen: missing("kindlegen"),
    }
}

fn settings(tools: ToolNames, embedded_epub: bool) -> ConverterSettings {
    ConverterSettings {
        timeout: Duration::from_secs(10),
        embedded_epub,
        tools,
    }
}

#[tokio::test]
async fn html_is_returned_as_is() {
    let temp = TempDir::new().unwrap();
    let doc = rendered(temp.path());
    let converter = FormatConverter::new(&settings(no_tools(), true));

    let out = converter.convert(&doc, OutputFormat::Html).await;
    assert_eq!(out.path, doc.path);
    assert_eq!(out.format, OutputFormat::Html);
    assert!(!out.is_degraded());
}

#[tokio::test]
async fn mobi_with_no_converters_degrades_to_the_original_html() {
    let temp = TempDir::new().unwrap();
    let doc = rendered(temp.path());
    let converter = FormatConverter::new(&settings(no_tools(), false));

    let out = converter.convert(&doc, OutputFormat::Mobi).await;

    assert_eq!(out.path, doc.path);
    assert_eq!(out.format, OutputFormat::Html);
    assert_eq!(out.requested, OutputFormat::Mobi);
    assert!(out.is_degraded());
    assert_eq!(fs::read_to_string(&out.path).unwrap(), HTML);
    assert!(!doc.path.with_extension("mobi").exists());
    assert!(!doc.path.with_extension("epub").exists());
}

#[tokio::test]
async fn pdf_with_no_converters_degrades_to_html() {
    let temp = TempDir::new().unwrap();
    let doc = rendered(temp.path());
    let out = FormatConverter::new(&settings(no_tools(), true))
        .convert(&doc, OutputFormat::Pdf)
        .await;
    assert_eq!(OutputFormat::from_path(&out.path), Some(OutputFormat::Html));
}

/// Chapter XHTML and OPF `dc:title` of a generated EPUB.
fn epub_parts(path: &Path) -> (String, String) {
    let mut archive = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    let mut read = |name: &str| {
        let mut text = String::new();
        archive.by_name(name).unwrap().read_to_string(&mut text).unwrap();
        text
    };
    let chapter = read("OEBPS/article.xhtml");
    let opf = read("OEBPS/content.opf");

    let doc = roxmltree::Document::parse(&opf).unwrap();
    let title = doc
        .descendants()
        .find(|n| n.tag_name().name() == "title" && n.tag_name().namespace() == Some(DC_NS))
        .and_then(|n| n.text())
        .unwrap_or_default()
        .to_string();
    (chapter, title)
}

#[tokio::test]
async fn epub_is_built_in_process() {
    let temp = TempDir::new().unwrap();
    let doc = rendered(temp.path());
    let out = FormatConverter::new(&settings(no_tools(), true))
        .convert(&doc, OutputFormat::Epub)
        .await;

    assert_eq!(out.format, OutputFormat::Epub);
    assert_eq!(out.path, doc.path.with_extension("epub"));
    let (chapter, title) = epub_parts(&out.path);
    assert_eq!(title, "Converted Piece");
    let xml = roxmltree::Document::parse_with_options(
        &chapter,
        roxmltree::ParsingOptions { allow_dtd: true, ..Default::default() },
    )
    .unwrap();
    assert_eq!(xml.root_element().tag_name().namespace(), Some(XHTML_NS));
}

#[tokio::test]
async fn epub_chapter_is_xml_even_for_loose_html() {
    let temp = TempDir::new().unwrap();
    let html = r#"<!DOCTYPE html><html><head><meta charset="UTF-8"></head><body><p>a&nbsp;b<br><img src="x.png"></p></body></html>"#;
    let path = temp.path().join("Loose Notes_20240101_120000.html");
    fs::write(&path, html).unwrap();
    let doc = RenderedDocument {
        title: "Loose Notes".into(),
        path,
        html: html.into(),
    };

    let out = FormatConverter::new(&settings(no_tools(), true))
        .convert(&doc, OutputFormat::Epub)
        .await;

    assert_eq!(out.format, OutputFormat::Epub);
    let (chapter, title) = epub_parts(&out.path);
    // No <title>: the file stem names the book.
    assert_eq!(title, "Loose Notes_20240101_120000");
    let xml = roxmltree::Document::parse_with_options(
        &chapter,
        roxmltree::ParsingOptions { allow_dtd: true, ..Default::default() },
    )
    .unwrap();
    let p = xml.descendants().find(|n| n.has_tag_name((XHTML_NS, "p"))).unwrap();
    assert_eq!(p.text(), Some("a\u{a0}b"));
    let img = xml.descendants().find(|n| n.has_tag_name((XHTML_NS, "img"))).unwrap();
    assert_eq!(img.attribute("src"), Some("x.png"));
    assert!(xml.descendants().any(|n| n.has_tag_name((XHTML_NS, "br"))));
}

#[tokio::test]
async fn first_mobi_stage_wins_when_available() {
    let temp = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    let doc = rendered(temp.path());
    let tools = ToolNames {
        ebook_convert: script(bin.path(), "ebook-convert", r#"cp "$1" "$2""#),
        ..no_tools()
    };

    let out = FormatConverter::new(&settings(tools, false))
        .convert(&doc, OutputFormat::Mobi)
        .await;
    assert_eq!(out.format, OutputFormat::Mobi);
    assert_eq!(fs::read_to_string(&out.path).unwrap(), HTML);
}

#[tokio::test]
async fn kindlegen_warning_exit_code_counts_as_success() {
    let temp = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    let doc = rendered(temp.path());
    // kindlegen writes the named output into its working directory.
    let tools = ToolNames {
        kindlegen: script(bin.path(), "kindlegen", r#"cp "$1" "$3"; exit 1"#),
        ..no_tools()
    };

    let out = FormatConverter::new(&settings(tools, false))
        .convert(&doc, OutputFormat::Mobi)
        .await;
    assert_eq!(out.format, OutputFormat::Mobi);
    assert!(out.path.is_file());
}

#[tokio::test]
async fn mobi_falls_back_to_epub_then_ebook_convert() {
    let temp = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    let doc = rendered(temp.path());
    // Refuses HTML input, converts EPUB input.
    let tools = ToolNames {
        ebook_convert: script(
            bin.path(),
            "ebook-convert",
            r#"case "$1" in *.epub) cp "$1" "$2" ;; *) echo "no html" >&2; exit 2 ;; esac"#,
        ),
        ..no_tools()
    };

    let out = FormatConverter::new(&settings(tools, true))
        .convert(&doc, OutputFormat::Mobi)
        .await;

    assert_eq!(out.format, OutputFormat::Mobi);
    assert_eq!(&fs::read(&out.path).unwrap()[..2], b"PK");
    assert!(!doc.path.with_extension("epub").exists(), "intermediate epub removed");
}

#[tokio::test]
async fn intermediate_epub_is_removed_when_the_last_step_fails() {
    let temp = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    let doc = rendered(temp.path());
    let tools = ToolNames {
        ebook_convert: script(bin.path(), "ebook-convert", r#"echo "broken" >&2; exit 2"#),
        ..no_tools()
    };

    let out = FormatConverter::new(&settings(tools, true))
        .convert(&doc, OutputFormat::Mobi)
        .await;

    assert!(out.is_degraded());
    assert_eq!(out.path, doc.path);
    assert!(!doc.path.with_extension("epub").exists());
    assert!(!doc.path.with_extension("mobi").exists());
}

#[tokio::test]
async fn hung_tool_is_killed_and_chain_moves_on() {
    let temp = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    let doc = rendered(temp.path());
    let tools = ToolNames {
        weasyprint: script(bin.path(), "weasyprint", "sleep 30"),
        wkhtmltopdf: script(bin.path(), "wkhtmltopdf", r#"cp "$2" "$3""#),
        ..no_tools()
    };
    let settings = ConverterSettings {
        timeout: Duration::from_millis(500),
        ..settings(tools, false)
    };

    let started = std::time::Instant::now();
    let out = FormatConverter::new(&settings).convert(&doc, OutputFormat::Pdf).await;
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(out.format, OutputFormat::Pdf);
}

#[tokio::test]
async fn success_without_output_file_is_a_failure() {
    let temp = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    let doc = rendered(temp.path());
    let liar: PathBuf = script(bin.path(), "liar", "exit 0").into();

    let chain = FallbackChain::new(OutputFormat::Pdf).then(ExternalTool::new(
        liar.to_string_lossy(),
        &["{input}", "{output}"],
        Duration::from_secs(5),
    ));
    match chain.run(&doc.path).await {
        ChainOutcome::Exhausted { attempts } => assert_eq!(attempts.len(), 1),
        other => panic!("expected exhaustion, got {other:?}"),
    }
}
