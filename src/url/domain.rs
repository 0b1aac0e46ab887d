use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use gov_harvest::url::extract_domain;
///
/// let url = Url::parse("https://WWW.ABS.GOV.AU/statistics").unwrap();
/// assert_eq!(extract_domain(&url), Some("www.abs.gov.au".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the key used for per-host politeness: `host` or `host:port` when the port is explicit
///
/// Two servers on the same machine but different ports are treated as different hosts.
pub fn host_key(url: &Url) -> Option<String> {
    let host = extract_domain(url)?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

/// Returns the `scheme://host[:port]` origin that owns a robots.txt file
pub fn origin_of(url: &Url) -> Option<String> {
    let host = host_key(url)?;
    Some(format!("{}://{}", url.scheme(), host))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        let url = Url::parse("https://data.gov.au/dataset/abc").unwrap();
        assert_eq!(extract_domain(&url), Some("data.gov.au".to_string()));
    }

    #[test]
    fn test_extract_ignores_port() {
        let url = Url::parse("https://data.gov.au:8443/").unwrap();
        assert_eq!(extract_domain(&url), Some("data.gov.au".to_string()));
    }

    #[test]
    fn test_host_key_includes_explicit_port() {
        let url = Url::parse("http://127.0.0.1:8080/page").unwrap();
        assert_eq!(host_key(&url), Some("127.0.0.1:8080".to_string()));

        // Default ports are not explicit in the parsed URL
        let url = Url::parse("https://www.abs.gov.au:443/").unwrap();
        assert_eq!(host_key(&url), Some("www.abs.gov.au".to_string()));
    }

    #[test]
    fn test_origin() {
        let url = Url::parse("https://www.abs.gov.au/statistics?x=1").unwrap();
        assert_eq!(origin_of(&url), Some("https://www.abs.gov.au".to_string()));

        let url = Url::parse("http://localhost:3000/a").unwrap();
        assert_eq!(origin_of(&url), Some("http://localhost:3000".to_string()));
    }

    #[test]
    fn test_no_host() {
        let url = Url::parse("mailto:someone@abs.gov.au").unwrap();
        assert_eq!(extract_domain(&url), None);
        assert_eq!(origin_of(&url), None);
    }
}
