use std::sync::LazyLock;

use regex::Regex;

static SERVER_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\w+://(?:\[(?P<v6>[^\]/]+)\]|(?P<host>[^:/?#\s\[\]]+))(?::\d+)?(?:[/?#]|$)")
        .expect("server url pattern is valid")
});

/// Pulls the host out of `scheme://host[:port][/...]`. Purely lexical: no
/// DNS, no validation. Bracketed IPv6 literals are returned without the
/// brackets.
pub fn parse_hostname(server_url: &str) -> Option<String> {
    let caps = SERVER_URL_RE.captures(server_url.trim())?;
    caps.name("host")
        .or_else(|| caps.name("v6"))
        .map(|m| m.as_str().to_string())
}
