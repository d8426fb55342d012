//! HTML document assembly for the rendering backend.

use comrak::{Options, markdown_to_html};

use crate::toc::escape_html;

/// Inline stylesheet embedded in every rendered document.
pub const STYLESHEET: &str = r#"
    body {
        font-family: Arial, sans-serif;
        line-height: 1.6;
        max-width: 800px;
        margin: 0 auto;
        padding: 20px;
        counter-reset: page;
    }
    h1 {
        color: #2c3e50;
        margin-top: 30px;
        margin-bottom: 20px;
        font-size: 24px;
        font-weight: bold;
    }
    h2 { color: #34495e; margin-top: 25px; }
    h3 { color: #7f8c8d; margin-top: 20px; }
    a { color: #3498db; text-decoration: none; }
    a:hover { text-decoration: underline; }
    code { background-color: #f8f9fa; padding: 2px 4px; border-radius: 3px; }
    pre { background-color: #f8f9fa; padding: 15px; border-radius: 5px; }
    table { border-collapse: collapse; }
    th, td { border: 1px solid #ddd; padding: 4px 8px; }
    .toc { margin-bottom: 40px; }
    .toc a { color: #2c3e50; }
    .toc li { margin-bottom: 5px; }
    ul.toc { list-style-type: none; padding-left: 0; }
    ul.toc ul { list-style-type: none; padding-left: 20px; }
    .main-title {
        color: #2c3e50;
        font-size: 24px;
        font-weight: bold;
        margin-bottom: 40px;
    }
    span[id] {
        display: inline;
        position: relative;
    }
    .highlight {
        color: blue !important;
        font-weight: bold !important;
        text-decoration: underline !important;
    }
"#;

fn markdown_options() -> Options<'static> {
    let mut options = Options::default();
    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;

    // Injected anchor spans are raw HTML and must survive rendering.
    options.render.r#unsafe = true;
    options
}

/// Convert Markdown (already carrying anchor markers) to an HTML fragment.
pub fn markdown_to_html_fragment(markdown: &str) -> String {
    markdown_to_html(markdown, &markdown_options())
}

/// Assemble the complete HTML document handed to the rendering backend.
pub fn render_document_html(title_line: &str, toc_html: &str, content_markdown: &str) -> String {
    let content_html = markdown_to_html_fragment(content_markdown);
    let title_line = escape_html(title_line);

    format!(
        r#"<!DOCTYPE html>
<html>
    <head>
        <meta charset="UTF-8">
        <style>{STYLESHEET}</style>
    </head>
    <body>
        <div class="main-title">{title_line}</div>
        {toc_html}
        {content_html}
        <div id="footer"></div>
    </body>
</html>
"#
    )
}
