//! Accept header parsing.
//!
//! Media ranges are ordered by quality value (highest first). Ranges with
//! `q=0` are kept at the end: they refuse the types they match. Ties keep
//! header order.

/// One entry of an Accept header.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRange {
    pub media_type: String,
    pub quality: f32,
}

impl MediaRange {
    /// `*/*` or `type/*`.
    pub fn is_wildcard(&self) -> bool {
        self.media_type == "*/*" || self.media_type.ends_with("/*")
    }

    /// `q=0`: the client will not take what this range matches.
    pub fn is_refused(&self) -> bool {
        self.quality <= 0.0
    }

    pub fn matches(&self, media_type: &str) -> bool {
        if self.media_type == "*/*" {
            return true;
        }
        match self.media_type.strip_suffix("/*") {
            Some(main) => media_type
                .split_once('/')
                .map_or(false, |(m, _)| m.eq_ignore_ascii_case(main)),
            None => self.media_type.eq_ignore_ascii_case(media_type),
        }
    }

    fn specificity(&self) -> u8 {
        if self.media_type == "*/*" {
            0
        } else if self.is_wildcard() {
            1
        } else {
            2
        }
    }
}

/// Parse an Accept header into media ranges, best first.
pub fn parse_accept(accept: &str) -> Vec<MediaRange> {
    let mut ranges: Vec<MediaRange> = accept
        .split(',')
        .filter_map(|s| {
            let mut parts = s.split(';');
            let media_type = parts.next()?.trim().to_ascii_lowercase();
            if media_type.is_empty() {
                return None;
            }

            // Parse quality value (default 1.0)
            let quality = parts
                .find_map(|p| {
                    let p = p.trim();
                    p.strip_prefix("q=").and_then(|q| q.trim().parse::<f32>().ok())
                })
                .unwrap_or(1.0);

            Some(MediaRange {
                media_type,
                quality,
            })
        })
        .collect();

    // Stable sort keeps header order among equal qualities
    ranges.sort_by(|a, b| b.quality.partial_cmp(&a.quality).unwrap_or(std::cmp::Ordering::Equal));
    ranges
}

/// Whether the most specific range matching `media_type` refuses it.
pub fn refuses(ranges: &[MediaRange], media_type: &str) -> bool {
    ranges
        .iter()
        .filter(|r| r.matches(media_type))
        .max_by_key(|r| r.specificity())
        .map_or(false, MediaRange::is_refused)
}

/// Pick the first acceptable media type from `supported`.
///
/// No header, or one whose best acceptable range is a wildcard, yields
/// `default` unless the header refuses it. Returns `None` when nothing
/// acceptable is supported.
pub fn negotiate<'a>(accept: Option<&str>, supported: &[&'a str], default: &'a str) -> Option<&'a str> {
    let ranges = match accept.map(parse_accept) {
        Some(ranges) if !ranges.is_empty() => ranges,
        _ => return Some(default),
    };

    for range in ranges.iter().filter(|r| !r.is_refused()) {
        if range.is_wildcard() {
            return (!refuses(&ranges, default)).then_some(default);
        }
        if let Some(found) = supported
            .iter()
            .find(|s| s.eq_ignore_ascii_case(&range.media_type) && !refuses(&ranges, s))
        {
            return Some(*found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_orders_by_quality() {
        let ranges = parse_accept("text/html, application/json;q=0.5, application/xml;q=0.9");
        let types: Vec<_> = ranges.iter().map(|r| r.media_type.as_str()).collect();
        assert_eq!(types, vec!["text/html", "application/xml", "application/json"]);
    }

    #[test]
    fn test_parse_keeps_refused_ranges_last() {
        let ranges = parse_accept("application/json;q=0, ,text/xml");
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].media_type, "text/xml");
        assert!(ranges[1].is_refused());
    }

    #[test]
    fn test_most_specific_range_decides() {
        let ranges = parse_accept("*/*;q=0, application/json");
        assert!(!refuses(&ranges, "application/json"));
        assert!(refuses(&ranges, "application/xml"));

        let ranges = parse_accept("application/*, application/xml;q=0");
        assert!(refuses(&ranges, "application/xml"));
        assert!(!refuses(&ranges, "application/json"));
        assert!(!refuses(&ranges, "text/xml"));
    }

    #[test]
    fn test_negotiate() {
        let supported = ["application/xml", "application/json"];
        assert_eq!(negotiate(None, &supported, "application/xml"), Some("application/xml"));
        assert_eq!(
            negotiate(Some("application/json"), &supported, "application/xml"),
            Some("application/json")
        );
        assert_eq!(
            negotiate(Some("text/html, */*;q=0.8"), &supported, "application/xml"),
            Some("application/xml")
        );
        assert_eq!(negotiate(Some("image/png"), &supported, "application/xml"), None);
    }

    #[test]
    fn test_negotiate_respects_refusals() {
        let supported = ["application/xml", "application/json"];
        assert_eq!(negotiate(Some("application/json;q=0"), &supported, "application/json"), None);
        assert_eq!(
            negotiate(Some("*/*, application/json;q=0"), &supported, "application/json"),
            None
        );
        assert_eq!(
            negotiate(Some("application/json;q=0, application/xml"), &supported, "application/json"),
            Some("application/xml")
        );
    }

    #[test]
    fn test_browser_accept_header() {
        let accept = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
        let supported = ["application/json", "application/xml"];
        assert_eq!(
            negotiate(Some(accept), &supported, "application/json"),
            Some("application/xml")
        );
    }
}
