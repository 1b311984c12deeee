//! Adapter that reads promo codes out of public promotion pages.

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use couponhub_core::{NormalizedCoupon, ProviderConfig, ScraperResult};
use regex::Regex;

use crate::error::ProviderError;
use crate::fetch::{FetchOptions, Fetcher};
use crate::normalize::normalize_code;
use crate::parse::parse_coupon_details;
use crate::provider::Provider;

static SCRIPT_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|noscript)[^>]*>.*?</(script|style|noscript)>")
        .expect("valid script/style regex")
});

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("valid tags regex"));

static CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i:use\s+(?:promo\s+|coupon\s+)?code|promo\s+code|coupon\s+code|code|use)\s*[:\-]?\s*([A-Z0-9]{3,20})\b",
    )
    .expect("valid promo code regex")
});

/// Uppercase words the code pattern can capture that are never codes.
const CODE_KEYWORDS: [&str; 4] = ["CODE", "PROMO", "COUPON", "USE"];

/// Longest preceding line still treated as a headline for the code line.
const MAX_TITLE_LEN: usize = 120;

#[derive(Debug, Clone)]
pub struct PromoPageProvider {
    config: ProviderConfig,
    fetcher: Fetcher,
}

impl PromoPageProvider {
    #[must_use]
    pub fn new(config: ProviderConfig, fetcher: Fetcher) -> Self {
        Self { config, fetcher }
    }

    fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: Some(Duration::from_millis(self.config.timeout_ms)),
            use_browser: self.config.use_browser,
            ..FetchOptions::default()
        }
    }
}

#[async_trait]
impl Provider for PromoPageProvider {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn scrape(&self) -> Result<ScraperResult, ProviderError> {
        let name = &self.config.name;
        let options = self.fetch_options();
        let mut coupons = Vec::new();
        let mut errors = Vec::new();

        for url in &self.config.promo_urls {
            let page = self.fetcher.fetch(url, &options).await;
            if !page.success {
                let reason = page.error.unwrap_or_else(|| "unknown error".to_string());
                tracing::warn!(provider = %name, url, error = %reason, "promo page fetch failed");
                errors.push(format!("{url}: {reason}"));
                continue;
            }

            let found = extract_promotions(&page.content, name);
            tracing::debug!(provider = %name, url, found = found.len(), "parsed promo page");
            coupons.extend(found.into_iter().map(|mut c| {
                c.terms_url = Some(url.clone());
                c
            }));
        }

        if !self.config.promo_urls.is_empty() && errors.len() == self.config.promo_urls.len() {
            return Err(ProviderError::AllSourcesFailed {
                provider: name.clone(),
                count: errors.len(),
                errors: errors.join("; "),
            });
        }

        let unique = dedupe_by_code(coupons);
        tracing::info!(provider = %name, unique = unique.len(), "promo page scrape complete");
        Ok(ScraperResult::succeeded(unique))
    }
}

/// Extracts coupons from an HTML (or plain text) page.
///
/// The page is flattened to text lines. Every line carrying a code
/// (`code: X`, `promo code X`, `use X`) becomes a coupon whose description is
/// that line and whose title is the line before it when that line is a short
/// headline without its own code.
#[must_use]
pub fn extract_promotions(html: &str, vendor: &str) -> Vec<NormalizedCoupon> {
    let lines = page_lines(html);
    let mut coupons = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let Some(code) = find_code(line) else {
            continue;
        };

        let title = idx
            .checked_sub(1)
            .map(|prev| lines[prev].as_str())
            .filter(|prev| prev.len() <= MAX_TITLE_LEN && find_code(prev).is_none())
            .map_or_else(|| format!("{vendor} promo"), str::to_string);

        coupons.push(parse_coupon_details(code, &title, line, vendor));
    }

    coupons
}

fn find_code(line: &str) -> Option<&str> {
    CODE_RE
        .captures_iter(line)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|code| !CODE_KEYWORDS.contains(code))
}

fn page_lines(html: &str) -> Vec<String> {
    let without_scripts = SCRIPT_STYLE_RE.replace_all(html, "\n");
    let text = TAG_RE.replace_all(&without_scripts, "\n");

    text.lines()
        .map(|line| decode_entities(line).split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&#36;", "$")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Keeps the first coupon seen for each normalized code.
fn dedupe_by_code(coupons: Vec<NormalizedCoupon>) -> Vec<NormalizedCoupon> {
    let mut seen = HashSet::new();
    coupons
        .into_iter()
        .filter(|c| seen.insert(normalize_code(&c.code)))
        .collect()
}

#[cfg(test)]
mod tests {
    use couponhub_core::DiscountType;

    use super::*;

    const PAGE: &str = r#"
        <html><head><style>.promo { color: red }</style>
        <script>var code = "NOTACODE";</script></head>
        <body>
          <div class="promo-card">
            <h3>$5 off orders of $15+</h3>
            <p>Use code EATS5 at checkout. Expires 12/31/2030</p>
          </div>
          <div class="promo-card">
            <h3>Free delivery this weekend</h3>
            <p>Promo code: FREEDEL</p>
          </div>
          <div><p>Use code eats5 again for the same deal</p></div>
        </body></html>
    "#;

    #[test]
    fn extracts_codes_titles_and_details() {
        let coupons = extract_promotions(PAGE, "UberEats");
        assert_eq!(coupons.len(), 2, "lowercase repeat should not match: {coupons:?}");

        assert_eq!(coupons[0].code, "EATS5");
        assert_eq!(coupons[0].title, "$5 off orders of $15+");
        assert_eq!(coupons[0].discount_type, DiscountType::Fixed);
        assert_eq!(coupons[0].discount_value, Some(5.0));
        assert!(coupons[0].expires_at.is_some());

        assert_eq!(coupons[1].code, "FREEDEL");
        assert_eq!(coupons[1].discount_type, DiscountType::FreeDelivery);
        assert_eq!(coupons[1].vendor, "UberEats");
    }

    #[test]
    fn ignores_script_contents() {
        let coupons = extract_promotions(PAGE, "UberEats");
        assert!(coupons.iter().all(|c| c.code != "NOTACODE"));
    }

    #[test]
    fn falls_back_to_vendor_title() {
        let coupons = extract_promotions("<p>Code: SAVE10 for 10% off</p>", "GrubHub");
        assert_eq!(coupons.len(), 1);
        assert_eq!(coupons[0].title, "GrubHub promo");
        assert_eq!(coupons[0].discount_type, DiscountType::Percentage);
        assert_eq!(coupons[0].discount_value, Some(10.0));
    }

    #[test]
    fn uppercase_headlines_capture_the_code_not_the_keyword() {
        let coupons = extract_promotions("<p>USE CODE SAVE10 for 10% off</p>", "UberEats");
        assert_eq!(coupons.len(), 1);
        assert_eq!(coupons[0].code, "SAVE10");

        let coupons = extract_promotions("<p>USE PROMO CODE DASH20 today</p>", "DoorDash");
        assert_eq!(coupons.len(), 1);
        assert_eq!(coupons[0].code, "DASH20");
    }

    #[test]
    fn keyword_only_lines_yield_nothing() {
        assert!(extract_promotions("<p>USE CODE below</p>", "UberEats").is_empty());
    }

    #[test]
    fn decodes_common_entities() {
        let coupons = extract_promotions("<p>&#36;7 off&nbsp;with code&nbsp;SEVEN7</p>", "UberEats");
        assert_eq!(coupons.len(), 1);
        assert_eq!(coupons[0].code, "SEVEN7");
        assert_eq!(coupons[0].discount_value, Some(7.0));
    }

    #[test]
    fn dedupe_by_code_keeps_first() {
        let mut a = parse_coupon_details("save 10", "first", "", "UberEats");
        a.code = "save 10".to_string();
        let b = parse_coupon_details("SAVE10", "second", "", "UberEats");
        let kept = dedupe_by_code(vec![a, b]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "first");
    }
}
