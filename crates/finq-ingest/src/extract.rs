//! Plain-text extraction from filing HTML.

use tracing::warn;

/// Extract the visible text of a filing document. Returns `None` when the
/// document has no body or yields no text, in which case the filing is
/// skipped.
#[must_use]
pub fn extract_text(html: &str) -> Option<String> {
    let soup = scrape_core::Soup::parse(html);
    let bodies = match soup.find_all("body") {
        Ok(tags) => tags,
        Err(e) => {
            warn!(error = %e, "failed to parse filing html");
            return None;
        }
    };

    let text: String = bodies
        .into_iter()
        .map(|tag| tag.text())
        .collect::<Vec<_>>()
        .join("\n");
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_body_text() {
        let html = "<html><body><p>Revenue grew 10%.</p><p>Margins held.</p></body></html>";
        let text = extract_text(html).unwrap();
        assert!(text.contains("Revenue grew 10%."));
        assert!(text.contains("Margins held."));
    }

    #[test]
    fn markup_is_stripped() {
        let html = "<body><div><b>Net</b> income <i>declined</i></div></body>";
        let text = extract_text(html).unwrap();
        assert!(!text.contains('<'));
        assert!(text.contains("income"));
    }

    #[test]
    fn empty_body_is_none() {
        assert!(extract_text("<html><body>   </body></html>").is_none());
    }

    #[test]
    fn empty_document_is_none() {
        assert!(extract_text("").is_none());
    }
}
