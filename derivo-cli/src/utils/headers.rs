use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, warn};

/// Parse a header string in format "Name: Value" and add it to the HeaderMap
pub fn parse_and_add_header(headers: &mut HeaderMap, header_str: &str) {
    let Some((name, value)) = header_str.split_once(':') else {
        warn!(header = %header_str, "Invalid header format, expected 'Name: Value'");
        return;
    };

    let name = name.trim();
    let value = value.trim();

    let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
        warn!(name = %name, "Invalid header name");
        return;
    };

    let Ok(mut header_value) = HeaderValue::from_str(value) else {
        warn!(name = %name, "Invalid header value");
        return;
    };

    // Values may carry credentials; keep them out of logs.
    if header_name == reqwest::header::AUTHORIZATION || header_name == reqwest::header::COOKIE {
        header_value.set_sensitive(true);
    }

    debug!(name = %name, "Adding header");
    headers.append(header_name, header_value);
}

/// Parse a collection of header strings and return a HeaderMap
pub fn parse_headers(header_strings: &[String]) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for header_str in header_strings {
        parse_and_add_header(&mut headers, header_str);
    }

    headers
}
