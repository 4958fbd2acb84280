//! Typed access to the custom request headers.

use axum::http::HeaderMap;

use super::error::{ApiError, ApiResult};

pub const PUBLISH_KEY: &str = "x-publish-key";
pub const RUN_ID: &str = "x-run-id";
pub const CONTENT_HASHES: &str = "x-content-hashes";
pub const COMMENT: &str = "x-comment";
pub const COMPACT: &str = "x-compact";
pub const BIN: &str = "x-bin";
pub const UPLOAD_ID: &str = "x-upload-id";
pub const PART_NUMBER: &str = "x-part-number";

pub fn optional<'a>(headers: &'a HeaderMap, name: &str) -> ApiResult<Option<&'a str>> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(str::trim)
                .map_err(|_| ApiError::malformed(format!("Header {name} is not valid text")))
        })
        .transpose()
}

pub fn required<'a>(headers: &'a HeaderMap, name: &str) -> ApiResult<&'a str> {
    optional(headers, name)?
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::malformed(format!("Missing {name} header")))
}

pub fn optional_u64(headers: &HeaderMap, name: &str) -> ApiResult<Option<u64>> {
    optional(headers, name)?
        .map(|value| {
            value
                .parse()
                .map_err(|_| ApiError::malformed(format!("Header {name} must be a number")))
        })
        .transpose()
}

/// Boolean flag; absent means false.
pub fn flag(headers: &HeaderMap, name: &str) -> ApiResult<bool> {
    match optional(headers, name)?.map(str::to_ascii_lowercase).as_deref() {
        None | Some("" | "false" | "0") => Ok(false),
        Some("true" | "1") => Ok(true),
        Some(other) => Err(ApiError::malformed(format!(
            "Header {name} must be true or false, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_required_header() {
        let map = headers(&[(PUBLISH_KEY, " abc ")]);
        assert_eq!(required(&map, PUBLISH_KEY).unwrap(), "abc");
        assert!(required(&map, UPLOAD_ID).is_err());
        assert!(required(&headers(&[(PUBLISH_KEY, "")]), PUBLISH_KEY).is_err());
    }

    #[test]
    fn test_numbers() {
        let map = headers(&[(RUN_ID, "42"), (PART_NUMBER, "two")]);
        assert_eq!(optional_u64(&map, RUN_ID).unwrap(), Some(42));
        assert_eq!(optional_u64(&map, "x-missing").unwrap(), None);
        assert!(optional_u64(&map, PART_NUMBER).is_err());
    }

    #[test]
    fn test_flags() {
        let map = headers(&[(COMPACT, "TRUE"), (BIN, "0"), (COMMENT, "maybe")]);
        assert!(flag(&map, COMPACT).unwrap());
        assert!(!flag(&map, BIN).unwrap());
        assert!(!flag(&map, "x-missing").unwrap());
        assert!(flag(&map, COMMENT).is_err());
    }
}
