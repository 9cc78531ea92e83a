use scraper::{Html, Selector};

// likely article containers, most specific first
const CANDIDATES: [&str; 7] = [
    "article",
    "[itemprop=articleBody]",
    "main",
    "[role=main]",
    "#content",
    ".post-content",
    ".entry-content",
];

const MIN_CONTAINER_CHARS: usize = 200;

/// Readable text from a fetched body. Non-HTML bodies pass through trimmed.
pub fn extract_text(content_type: &str, body: &str) -> Option<String> {
    if content_type.is_empty() || content_type.contains("html") {
        scrape_html(body)
    } else if content_type.starts_with("text/") {
        let text = normalize(body);
        if text.is_empty() { None } else { Some(text) }
    } else {
        None
    }
}

fn scrape_html(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);

    for sel in CANDIDATES.iter() {
        if let Some(text) = scrape_with_selector(&doc, sel) {
            if text.chars().count() >= MIN_CONTAINER_CHARS { return Some(text); }
        }
    }

    // fallback: paragraphs, then the whole body
    let p_sel = Selector::parse("p").ok()?;
    let paragraphs: Vec<String> = doc
        .select(&p_sel)
        .map(|p| normalize(&p.text().collect::<String>()))
        .filter(|s| !s.is_empty())
        .collect();
    if !paragraphs.is_empty() {
        return Some(paragraphs.join("\n"));
    }
    scrape_with_selector(&doc, "body")
}

fn scrape_with_selector(doc: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    let node = doc.select(&sel).next()?;
    let skip = Selector::parse("script, style, noscript").ok()?;
    let hidden: Vec<_> = node.select(&skip).map(|n| n.id()).collect();

    let text: String = node
        .descendants()
        .filter(|n| !n.ancestors().any(|a| hidden.contains(&a.id())))
        .filter_map(|n| n.value().as_text().map(|t| String::from(&**t)))
        .collect::<Vec<_>>()
        .join("\n");
    let s = normalize(&text);
    if s.is_empty() { None } else { Some(s) }
}

fn normalize(s: &str) -> String {
    // collapse whitespace and drop blank lines
    let mut out = String::new();
    for line in s.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() { continue; }
        if !out.is_empty() { out.push('\n'); }
        out.push_str(&collapsed);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_paragraph() -> String {
        "Quarterly revenue grew on strong demand for the company's core products. ".repeat(4)
    }

    #[test]
    fn prefers_article_container() {
        let html = format!(
            "<html><body><nav>Home | About</nav><article><h1>Title</h1><p>{}</p></article><footer>(c)</footer></body></html>",
            long_paragraph()
        );
        let text = extract_text("text/html; charset=utf-8", &html).unwrap();
        assert!(text.starts_with("Title"));
        assert!(!text.contains("Home | About"));
        assert!(!text.contains("(c)"));
    }

    #[test]
    fn skips_scripts_inside_container() {
        let html = format!(
            "<article><script>var tracking = 1;</script><p>{}</p></article>",
            long_paragraph()
        );
        let text = extract_text("text/html", &html).unwrap();
        assert!(!text.contains("tracking"));
    }

    #[test]
    fn falls_back_to_paragraphs() {
        let html = "<html><body><div><p>First   paragraph.</p><p>Second paragraph.</p></div></body></html>";
        let text = extract_text("text/html", html).unwrap();
        assert_eq!(text, "First paragraph.\nSecond paragraph.");
    }

    #[test]
    fn plain_text_passes_through() {
        let text = extract_text("text/plain", "  line one \n\n line two ").unwrap();
        assert_eq!(text, "line one\nline two");
    }

    #[test]
    fn binary_content_is_rejected() {
        assert!(extract_text("application/pdf", "%PDF-1.4").is_none());
    }
}
