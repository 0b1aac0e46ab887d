use crate::UrlError;
use url::Url;

/// Query parameter prefixes that only carry click tracking
///
/// Matched case-insensitively against the start of each parameter key.
const TRACKING_PREFIXES: &[&str] = &["utm_", "gclid", "fbclid", "mc_eid", "msclkid"];

/// Normalizes a URL into the crawl's dedup key
///
/// # Normalization Steps
///
/// 1. Resolve against `base` when given (relative references)
/// 2. Require an `http`/`https` scheme and a host
/// 3. Lowercase the host
/// 4. Remove the fragment
/// 5. Drop tracking query parameters (`utm_*`, `gclid`, `fbclid`, ...)
/// 6. Stable-sort the remaining parameters by key and re-encode them
/// 7. Remove an empty query string
///
/// Scheme, `www.` prefix and trailing slashes are left alone: those can name
/// different resources on the servers this crawler targets.
///
/// # Arguments
///
/// * `raw` - The URL or reference to normalize
/// * `base` - Base URL for resolving relative references
///
/// # Returns
///
/// * `Ok(Url)` - Normalized URL
/// * `Err(UrlError)` - The input cannot be turned into an absolute HTTP(S) URL
pub fn try_normalize_url(raw: &str, base: Option<&Url>) -> Result<Url, UrlError> {
    let raw = raw.trim();

    let mut url = match base {
        Some(base) => base.join(raw),
        None => Url::parse(raw),
    }
    .map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {
            let lowered = host.to_lowercase();
            if lowered != host {
                url.set_host(Some(&lowered))
                    .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;
            }
        }
        _ => return Err(UrlError::MissingDomain),
    }

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

/// Normalizes a URL string, returning the input unchanged if it cannot be normalized
///
/// Malformed or non-HTTP(S) input passes through untouched; the scope filter
/// rejects it later.
///
/// # Examples
///
/// ```
/// use gov_harvest::url::normalize_url;
///
/// let url = normalize_url("https://WWW.ABS.GOV.AU/stats?utm_source=x&b=2&a=1#top", None);
/// assert_eq!(url, "https://www.abs.gov.au/stats?a=1&b=2");
///
/// assert_eq!(normalize_url("not a url", None), "not a url");
/// ```
pub fn normalize_url(raw: &str, base: Option<&Url>) -> String {
    match try_normalize_url(raw, base) {
        Ok(url) => url.into(),
        Err(_) => raw.to_string(),
    }
}

/// Filters out tracking parameters and stable-sorts the rest by key
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    // Stable: repeated keys keep their relative order
    params.sort_by(|a, b| a.0.cmp(&b.0));

    params
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    TRACKING_PREFIXES.iter().any(|prefix| key.starts_with(prefix))
}
