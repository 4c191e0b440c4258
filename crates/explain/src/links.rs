use vinolink_model::LinkType;

pub const VIVINO_BASE: &str = "https://www.vivino.com";
pub const LCBO_BASE: &str = "https://www.lcbo.com";

/// Vivino search link for a wine. The producer is left out when the name
/// already carries it ("Cloudy Bay" + "Cloudy Bay Sauvignon Blanc").
pub fn build_vivino_search_url(name: &str, producer: Option<&str>, country: Option<&str>) -> String {
    let producer = producer
        .map(str::trim)
        .filter(|p| !p.is_empty() && !name.to_lowercase().contains(&p.to_lowercase()));

    let query = [producer, Some(name.trim()), country.map(str::trim)]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    format!("{}/search/wines?q={}", VIVINO_BASE, urlencoding::encode(&query))
}

/// Bottle-level Vivino page (`/w/123`, `/wines/...`, `/<winery>/<wine>`),
/// as opposed to a search link.
pub fn is_direct_vivino_url(url: Option<&str>) -> bool {
    match url {
        Some(url) => url.starts_with(&format!("{}/", VIVINO_BASE)) && !url.contains("/search/wines"),
        None => false,
    }
}

/// The stored link when it is a direct page, otherwise a fresh search link.
pub fn resolve_vivino_url(
    stored: Option<&str>,
    name: &str,
    producer: Option<&str>,
    country: &str,
) -> String {
    match stored {
        Some(url) if is_direct_vivino_url(Some(url)) => url.to_string(),
        _ => build_vivino_search_url(name, producer, Some(country)),
    }
}

/// LCBO catalog search for a quoted name (and producer when known).
pub fn lcbo_search_url(name: &str, producer: Option<&str>) -> String {
    let phrase = match producer {
        Some(producer) => format!("\"{} {}\"", name, producer),
        None => format!("\"{}\"", name),
    };
    format!(
        "{}/en/catalogsearch/result/?q={}",
        LCBO_BASE,
        urlencoding::encode(&phrase)
    )
}

/// The LCBO link to show and whether it is a verified product page.
pub fn lcbo_link(stored: Option<&str>, name: &str, producer: Option<&str>) -> (String, LinkType) {
    match stored {
        Some(url) if url.contains("/en/") && !url.contains("catalogsearch") => {
            (url.to_string(), LinkType::VerifiedProduct)
        }
        Some(url) => (url.to_string(), LinkType::SearchFallback),
        None => (lcbo_search_url(name, producer), LinkType::SearchFallback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_url_includes_producer_and_country() {
        assert_eq!(
            build_vivino_search_url("Cabernet Franc Icewine VQA", Some("Tawse"), Some("Canada")),
            "https://www.vivino.com/search/wines?q=Tawse%20Cabernet%20Franc%20Icewine%20VQA%20Canada"
        );
    }

    #[test]
    fn test_search_url_skips_producer_already_in_name() {
        assert_eq!(
            build_vivino_search_url("Cloudy Bay Sauvignon Blanc", Some("Cloudy Bay"), None),
            "https://www.vivino.com/search/wines?q=Cloudy%20Bay%20Sauvignon%20Blanc"
        );
        assert_eq!(
            build_vivino_search_url("Mystery Red", None, Some("Chile")),
            "https://www.vivino.com/search/wines?q=Mystery%20Red%20Chile"
        );
    }

    #[test]
    fn test_direct_url_detection() {
        assert!(is_direct_vivino_url(Some("https://www.vivino.com/w/12345")));
        assert!(is_direct_vivino_url(Some("https://www.vivino.com/US/en/wines/34801")));
        assert!(!is_direct_vivino_url(Some("https://www.vivino.com/search/wines?q=tawse")));
        assert!(!is_direct_vivino_url(Some("https://example.com/w/1")));
        assert!(!is_direct_vivino_url(None));
    }

    #[test]
    fn test_resolve_keeps_direct_and_rebuilds_search() {
        let direct = "https://www.vivino.com/w/12345";
        assert_eq!(
            resolve_vivino_url(Some(direct), "Cabernet Franc Icewine VQA", Some("Tawse"), "Canada"),
            direct
        );
        assert_eq!(
            resolve_vivino_url(
                Some("https://www.vivino.com/search/wines?q=tawse"),
                "Cabernet Franc Icewine VQA",
                Some("Tawse"),
                "Canada"
            ),
            "https://www.vivino.com/search/wines?q=Tawse%20Cabernet%20Franc%20Icewine%20VQA%20Canada"
        );
    }

    #[test]
    fn test_lcbo_link_type() {
        let (url, kind) = lcbo_link(
            Some("https://www.lcbo.com/en/gato-negro-chardonnay-12345"),
            "Gato Negro Chardonnay",
            None,
        );
        assert_eq!(kind, LinkType::VerifiedProduct);
        assert!(url.ends_with("12345"));

        let (url, kind) = lcbo_link(None, "Gato Negro Chardonnay", Some("Gato Negro"));
        assert_eq!(kind, LinkType::SearchFallback);
        assert_eq!(
            url,
            "https://www.lcbo.com/en/catalogsearch/result/?q=%22Gato%20Negro%20Chardonnay%20Gato%20Negro%22"
        );
    }
}
