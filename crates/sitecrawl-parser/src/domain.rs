use url::Url;

/// Tells whether `link` stays on the site `base` belongs to.
///
/// Relative links always do. Absolute links must share the host of `base`, ignoring one
/// leading `www.` on either side. A link or base that cannot be parsed is rejected.
pub fn is_same_domain(base: &str, link: &str) -> bool {
    let base = match Url::parse(base) {
        Ok(base) => base,
        Err(_) => return false,
    };
    let link = match Url::parse(link) {
        Ok(link) => link,
        Err(url::ParseError::RelativeUrlWithoutBase) => return true,
        Err(_) => return false,
    };
    strip_www(link.host_str().unwrap_or_default()) == strip_www(base.host_str().unwrap_or_default())
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}
