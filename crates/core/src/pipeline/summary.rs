//! Local text rendering: the statistical summary used when no language model
//! answers, and the section appendix.

use std::fmt::Write;

use super::ExtractedPage;
use crate::cache::ExtractedSections;

const KEY_PARAGRAPHS: usize = 3;
const PARAGRAPH_PREVIEW_CHARS: usize = 200;
const SECTION_ITEMS: usize = 5;

fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn depth_label(chars: usize) -> &'static str {
    match chars {
        n if n > 5000 => "detailed",
        n if n > 1000 => "substantial",
        _ => "brief",
    }
}

/// Summarize a page without a language model.
pub fn fallback_summary(page: &ExtractedPage) -> String {
    let chars = page.content.chars().count();
    let words = page.content.split_whitespace().count();
    let paragraphs: Vec<&str> = page.content.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    let mut out = String::new();
    let _ = writeln!(out, "## {}", page.title.as_deref().unwrap_or("Untitled page"));
    let _ = writeln!(out, "URL: {}", page.url);
    let _ = writeln!(
        out,
        "Length: {chars} characters, {words} words, {} paragraphs ({})",
        paragraphs.len(),
        depth_label(chars)
    );

    if !paragraphs.is_empty() {
        out.push_str("\nKey passages:\n");
        for paragraph in paragraphs.iter().take(KEY_PARAGRAPHS) {
            let _ = writeln!(out, "- {}", preview(paragraph, PARAGRAPH_PREVIEW_CHARS));
        }
    }

    out.trim_end().to_string()
}

/// Render extracted sections as an appendix. Empty sections render nothing.
pub fn render_sections(sections: &ExtractedSections) -> String {
    let mut out = String::new();

    if !sections.meta.is_empty() {
        out.push_str("\n\n### Metadata\n");
        for (name, value) in &sections.meta {
            let _ = writeln!(out, "- {name}: {value}");
        }
    }
    if !sections.links.is_empty() {
        out.push_str("\n\n### Links\n");
        for link in sections.links.iter().take(SECTION_ITEMS) {
            let _ = writeln!(out, "- [{}]({})", link.text, link.url);
        }
    }
    if !sections.images.is_empty() {
        out.push_str("\n\n### Images\n");
        for image in sections.images.iter().take(SECTION_ITEMS) {
            let _ = writeln!(out, "- {image}");
        }
    }
    if !sections.code_blocks.is_empty() {
        out.push_str("\n\n### Code\n");
        for block in sections.code_blocks.iter().take(SECTION_ITEMS) {
            let _ = writeln!(out, "```\n{}\n```", preview(block, 500));
        }
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SectionLink;

    fn page(content: &str) -> ExtractedPage {
        ExtractedPage {
            url: "https://example.com/post".into(),
            title: Some("A Post".into()),
            content: content.into(),
            sections: None,
        }
    }

    #[test]
    fn test_fallback_summary_counts() {
        let summary = fallback_summary(&page("first line\n\nsecond line\nthird\nfourth"));
        assert!(summary.starts_with("## A Post"));
        assert!(summary.contains("URL: https://example.com/post"));
        assert!(summary.contains("4 paragraphs (brief)"));
        assert!(summary.contains("- third"));
        assert!(!summary.contains("- fourth"));
    }

    #[test]
    fn test_fallback_summary_untitled_and_empty() {
        let mut p = page("");
        p.title = None;
        let summary = fallback_summary(&p);
        assert!(summary.contains("Untitled page"));
        assert!(!summary.contains("Key passages"));
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("héllo wörld", 5), "héllo...");
        assert_eq!(preview("short", 10), "short");
    }

    #[test]
    fn test_render_sections() {
        let sections = ExtractedSections {
            links: vec![SectionLink { text: "Docs".into(), url: "https://example.com/docs".into() }],
            code_blocks: vec!["fn main() {}".into()],
            ..Default::default()
        };
        let rendered = render_sections(&sections);
        assert!(rendered.contains("### Links\n- [Docs](https://example.com/docs)"));
        assert!(rendered.contains("```\nfn main() {}\n```"));
        assert!(!rendered.contains("### Images"));
        assert!(render_sections(&ExtractedSections::default()).is_empty());
    }
}
