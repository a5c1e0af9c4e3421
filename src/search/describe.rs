use crate::models::Description;
use crate::search::resolver::UrlResolver;

/// Short description of the document behind `url`: its lowest-ordinal chunk,
/// cut to `max_chars` characters (ellipsis included) when longer.
pub fn describe(
    resolver: &UrlResolver<'_>,
    url: &str,
    document_extensions: &[String],
    max_chars: usize,
) -> Description {
    let document = match resolver.locate(url, document_extensions) {
        Ok(Some(document)) => document,
        Ok(None) => return Description::FileNotFound,
        Err(e) => {
            tracing::error!(stage = "describe", "Document lookup failed: {e}");
            return Description::Error;
        }
    };

    match resolver.store().first_chunk(&document.id) {
        Ok(Some(chunk)) => Description::Text(truncate_description(&chunk.text, max_chars)),
        Ok(None) => Description::NotFound,
        Err(e) => {
            tracing::error!(stage = "describe", document_id = %document.id, "First chunk lookup failed: {e}");
            Description::Error
        }
    }
}

const ELLIPSIS: &str = "...";

fn truncate_description(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}
