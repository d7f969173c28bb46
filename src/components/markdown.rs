use leptos::prelude::*;
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use std::fmt::Write;

/// Live preview of a streamed markdown document.
#[component]
pub fn MarkdownPreview(
    #[prop(into)] content: Signal<String>,
    #[prop(optional)] class: &'static str,
) -> impl IntoView {
    let rendered_html = Memo::new(move |_| markdown_to_html(&content.get()));

    view! {
        <div
            class=format!("markdown-content {} min-w-0 max-w-full overflow-hidden", class)
            inner_html=move || rendered_html.get()
        ></div>
    }
}

fn heading_class(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "text-2xl font-bold mb-4 mt-6 text-gray-900 dark:text-gray-100",
        HeadingLevel::H2 => "text-xl font-semibold mb-3 mt-5 border-b border-gray-300 dark:border-gray-700 pb-1",
        HeadingLevel::H3 => "text-lg font-medium mb-2 mt-4",
        _ => "text-base font-medium mb-2 mt-3",
    }
}

/// Whether `url` may be used as a link or image target: relative, or one of
/// the `http`, `https` and `mailto` schemes.
pub fn is_safe_url(url: &str) -> bool {
    // browsers ignore whitespace and control characters inside a scheme
    let normalized: String = url
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    let scheme_end = normalized.find(':');
    let path_start = normalized.find(['/', '?', '#']);
    match (scheme_end, path_start) {
        (Some(colon), Some(path)) if path < colon => true,
        (Some(colon), _) => matches!(&normalized[..colon], "http" | "https" | "mailto"),
        (None, _) => true,
    }
}

/// Renders GitHub-flavoured markdown to HTML. Raw HTML in the source is
/// shown as text, never injected.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut html = String::new();
    let mut code_lang: Option<String> = None;
    // set while inside a link whose target was refused
    let mut unsafe_link = false;
    // alt text of the image being rendered, collected from its Text events
    let mut image: Option<(String, String)> = None;

    for event in Parser::new_ext(markdown, options) {
        if let Some((_, alt)) = image.as_mut() {
            match event {
                Event::Text(text) | Event::Code(text) => {
                    alt.push_str(&text);
                    continue;
                }
                Event::End(TagEnd::Image) => {}
                _ => continue,
            }
        }

        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(lang) => lang.to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                if lang == "mermaid" {
                    html.push_str(r#"<pre class="mermaid">"#);
                } else {
                    let _ = write!(
                        html,
                        r#"<pre class="bg-gray-100 dark:bg-gray-900 rounded-lg p-4 my-4 overflow-x-auto"><code class="language-{} text-sm font-mono">"#,
                        html_escape(if lang.is_empty() { "text" } else { &lang })
                    );
                }
                code_lang = Some(lang);
            }
            Event::End(TagEnd::CodeBlock) => {
                match code_lang.take().as_deref() {
                    Some("mermaid") => html.push_str("</pre>"),
                    _ => html.push_str("</code></pre>"),
                }
            }
            Event::Start(Tag::Paragraph) => html.push_str(r#"<p class="mb-4 leading-relaxed">"#),
            Event::End(TagEnd::Paragraph) => html.push_str("</p>"),
            Event::Start(Tag::Heading { level, .. }) => {
                let _ = write!(html, r#"<h{} class="{}">"#, level as u8, heading_class(level));
            }
            Event::End(TagEnd::Heading(level)) => {
                let _ = write!(html, "</h{}>", level as u8);
            }
            Event::Start(Tag::Strong) => html.push_str("<strong>"),
            Event::End(TagEnd::Strong) => html.push_str("</strong>"),
            Event::Start(Tag::Emphasis) => html.push_str("<em>"),
            Event::End(TagEnd::Emphasis) => html.push_str("</em>"),
            Event::Start(Tag::Strikethrough) => html.push_str("<del>"),
            Event::End(TagEnd::Strikethrough) => html.push_str("</del>"),
            Event::Start(Tag::Link { dest_url, .. }) if !is_safe_url(&dest_url) => {
                unsafe_link = true;
            }
            Event::End(TagEnd::Link) if unsafe_link => unsafe_link = false,
            Event::Start(Tag::Link { dest_url, title, .. }) => {
                let _ = write!(
                    html,
                    r#"<a href="{}" title="{}" class="text-sky-600 dark:text-sky-400 underline" target="_blank" rel="noopener noreferrer">"#,
                    html_escape(&dest_url),
                    html_escape(&title)
                );
            }
            Event::End(TagEnd::Link) => html.push_str("</a>"),
            Event::Start(Tag::Image { dest_url, .. }) => {
                image = Some((dest_url.to_string(), String::new()));
            }
            Event::End(TagEnd::Image) => {
                if let Some((src, alt)) = image.take() {
                    if !is_safe_url(&src) {
                        html.push_str(&html_escape(&alt));
                        continue;
                    }
                    let _ = write!(
                        html,
                        r#"<img src="{}" alt="{}" class="inline-block max-w-full">"#,
                        html_escape(&src),
                        html_escape(&alt)
                    );
                }
            }
            Event::Start(Tag::List(None)) => html.push_str(r#"<ul class="list-disc ml-6 mb-4">"#),
            Event::Start(Tag::List(Some(_))) => html.push_str(r#"<ol class="list-decimal ml-6 mb-4">"#),
            Event::End(TagEnd::List(false)) => html.push_str("</ul>"),
            Event::End(TagEnd::List(true)) => html.push_str("</ol>"),
            Event::Start(Tag::Item) => html.push_str("<li>"),
            Event::End(TagEnd::Item) => html.push_str("</li>"),
            Event::TaskListMarker(checked) => {
                html.push_str(if checked {
                    r#"<input type="checkbox" checked disabled> "#
                } else {
                    r#"<input type="checkbox" disabled> "#
                });
            }
            Event::Start(Tag::BlockQuote(_)) => {
                html.push_str(r#"<blockquote class="border-l-4 border-gray-300 pl-4 my-4 italic">"#);
            }
            Event::End(TagEnd::BlockQuote(_)) => html.push_str("</blockquote>"),
            Event::Start(Tag::Table(_)) => html.push_str(r#"<table class="my-4 border-collapse">"#),
            Event::End(TagEnd::Table) => html.push_str("</table>"),
            Event::Start(Tag::TableHead) => html.push_str("<thead><tr>"),
            Event::End(TagEnd::TableHead) => html.push_str("</tr></thead>"),
            Event::Start(Tag::TableRow) => html.push_str("<tr>"),
            Event::End(TagEnd::TableRow) => html.push_str("</tr>"),
            Event::Start(Tag::TableCell) => html.push_str(r#"<td class="border px-3 py-1">"#),
            Event::End(TagEnd::TableCell) => html.push_str("</td>"),
            Event::Code(text) => {
                let _ = write!(
                    html,
                    r#"<code class="bg-gray-200 dark:bg-gray-800 px-1 rounded font-mono text-sm">{}</code>"#,
                    html_escape(&text)
                );
            }
            Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => {
                html.push_str(&html_escape(&text));
            }
            Event::SoftBreak => html.push(if code_lang.is_some() { '\n' } else { ' ' }),
            Event::HardBreak => html.push_str("<br>"),
            Event::Rule => html.push_str("<hr>"),
            _ => {}
        }
    }

    html
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_markdown() {
        let html = markdown_to_html("# Hi, I'm Ada\n\nI build **compilers** and *tools*.");
        assert!(html.contains("<h1"));
        assert!(html.contains("<strong>compilers</strong>"));
        assert!(html.contains("<em>tools</em>"));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let html = markdown_to_html("<script>alert(1)</script>\n\nhello <b>there</b>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn test_badges_render_as_images() {
        let html = markdown_to_html("![Rust](https://img.shields.io/badge/-Rust-black)");
        assert!(html.contains(r#"<img src="https://img.shields.io/badge/-Rust-black" alt="Rust""#));
    }

    #[test]
    fn test_mermaid_blocks_are_left_for_the_diagram_renderer() {
        let html = markdown_to_html("```mermaid\ngraph TD\n  A-->B\n```");
        assert!(html.contains(r#"<pre class="mermaid">graph TD"#));
        assert!(html.contains("A--&gt;B"));
        assert!(!html.contains("<code"));
    }

    #[test]
    fn test_script_links_render_as_text() {
        let html = markdown_to_html("[my site](javascript:alert(document.cookie)) and [b](JavaScript:x)");
        assert!(!html.contains("<a"));
        assert!(!html.to_lowercase().contains("javascript:"));
        assert!(html.contains("my site"));

        let html = markdown_to_html("![logo](data:image/svg+xml;base64,AAAA)");
        assert!(!html.contains("<img"));
        assert!(html.contains("logo"));
    }

    #[test]
    fn test_safe_urls() {
        assert!(is_safe_url("https://github.com/octocat"));
        assert!(is_safe_url("mailto:ada@example.com"));
        assert!(is_safe_url("/docs/setup.md"));
        assert!(is_safe_url("docs/a:b.md"));
        assert!(is_safe_url("#install"));
        assert!(!is_safe_url("javascript:alert(1)"));
        assert!(!is_safe_url(" java\tscript:alert(1)"));
        assert!(!is_safe_url("vbscript:msgbox"));
        assert!(!is_safe_url("data:text/html,hi"));
    }

    #[test]
    fn test_code_indentation() {
        let html = markdown_to_html("```rust\nfn main() {\n    run();\n}\n```");
        assert!(html.contains("language-rust"));
        assert!(html.contains("    run();"));
    }
}
