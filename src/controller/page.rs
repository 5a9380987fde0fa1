//! Reading the correlation id from the page URL.

use url::Url;

/// Query parameter carrying the host's user id.
pub const CORRELATION_PARAM: &str = "tgid";

/// Parse the `tgid` query parameter of `page_url` as an integer.
///
/// A missing parameter, an unparsable URL or a non-numeric value all yield
/// `None`; the payload then omits the field.
pub fn correlation_id(page_url: &str) -> Option<i64> {
    let url = match Url::parse(page_url) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!(error = %e, "page url not parsable, no correlation id");
            return None;
        }
    };

    let (_, value) = url
        .query_pairs()
        .find(|(name, _)| name == CORRELATION_PARAM)?;

    match value.trim().parse::<i64>() {
        Ok(id) => Some(id),
        Err(_) => {
            tracing::warn!(value = %value, "ignoring non-numeric {CORRELATION_PARAM}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_tgid() {
        assert_eq!(
            correlation_id("https://gate.example/index.html?tgid=12345"),
            Some(12345)
        );
        assert_eq!(
            correlation_id("https://gate.example/?lang=en&tgid=-7#top"),
            Some(-7)
        );
    }

    #[test]
    fn test_missing_or_invalid_tgid() {
        assert_eq!(correlation_id("https://gate.example/"), None);
        assert_eq!(correlation_id("https://gate.example/?tgid=abc"), None);
        assert_eq!(correlation_id("https://gate.example/?tgid="), None);
        assert_eq!(correlation_id("not a url"), None);
    }
}
