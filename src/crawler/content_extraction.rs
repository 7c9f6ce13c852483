//! Content extraction functionality for the crawler module

use crate::crawler::error::CrawlError;
use scraper::{Html, Selector};

/// Extract the visible text of an HTML document
///
/// Every text node outside the excluded elements is kept, its whitespace
/// collapsed, and the nodes are joined with single spaces.
///
/// # Arguments
///
/// * `html` - The HTML to extract text from
/// * `exclude_selectors` - CSS selectors for elements whose text is dropped
///
/// # Returns
///
/// The plain text of the document, possibly empty
pub fn extract_text(html: &str, exclude_selectors: &[String]) -> Result<String, CrawlError> {
    let document = Html::parse_document(html);

    let mut excluded = Vec::new();
    for selector_str in exclude_selectors {
        let selector = Selector::parse(selector_str).map_err(|e| {
            CrawlError::HtmlParse(format!("Failed to parse selector '{}': {}", selector_str, e))
        })?;
        excluded.extend(document.select(&selector).map(|element| element.id()));
    }

    let words: Vec<&str> = document
        .tree
        .root()
        .descendants()
        .filter_map(|node| node.value().as_text().map(|text| (node, text)))
        .filter(|(node, _)| !node.ancestors().any(|ancestor| excluded.contains(&ancestor.id())))
        .flat_map(|(_, text)| text.split_whitespace())
        .collect();

    Ok(words.join(" "))
}

/// Extract the raw `href` values of all anchors, in document order
pub fn extract_hrefs(html: &str) -> Result<Vec<String>, CrawlError> {
    let document = Html::parse_document(html);
    let anchor_selector = Selector::parse("a[href]")
        .map_err(|e| CrawlError::HtmlParse(format!("Failed to parse anchor selector: {}", e)))?;

    Ok(document
        .select(&anchor_selector)
        .filter_map(|element| element.value().attr("href"))
        .map(|href| href.trim().to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::CrawlerConfig;

    #[test]
    fn test_extract_text_strips_tags_and_scripts() {
        let html = r#"<html>
            <head><title>Acme Corp</title><style>body { color: red; }</style></head>
            <body>
                <h1>Welcome   to
                    Acme</h1>
                <script>var tracking = "ignore me";</script>
                <p>We build <b>rockets</b>.</p>
                <noscript>Enable JavaScript</noscript>
            </body>
        </html>"#;

        let text = extract_text(html, &CrawlerConfig::default().exclude_selectors).unwrap();

        assert_eq!(text, "Acme Corp Welcome to Acme We build rockets .");
        assert!(!text.contains("tracking"));
        assert!(!text.contains("color"));
        assert!(!text.contains("JavaScript"));
    }

    #[test]
    fn test_extract_text_custom_exclusions() {
        let html = "<body><nav>Home About</nav><main>Real content</main></body>";

        let text = extract_text(html, &["nav".to_string()]).unwrap();

        assert_eq!(text, "Real content");
    }

    #[test]
    fn test_extract_text_empty_document() {
        assert_eq!(extract_text("", &[]).unwrap(), "");
    }

    #[test]
    fn test_extract_text_invalid_selector() {
        let result = extract_text("<p>x</p>", &["<<".to_string()]);
        assert!(matches!(result, Err(CrawlError::HtmlParse(_))));
    }

    #[test]
    fn test_extract_hrefs_in_order() {
        let html = r##"<body>
            <a href="/b">B</a>
            <a>no href</a>
            <a href=" /a ">A</a>
            <a href="#top">Top</a>
        </body>"##;

        let hrefs = extract_hrefs(html).unwrap();

        assert_eq!(hrefs, vec!["/b", "/a", "#top"]);
    }
}
