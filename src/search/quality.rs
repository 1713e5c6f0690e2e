//! Source quality scoring
//!
//! Heuristic, pure scoring of search results: a base score, a bonus for
//! educational or reference domains, and small bonuses for substantial
//! content, a sensible title and HTTPS.

use super::RawSearchResult;
use reqwest::Url;
use serde::{Deserialize, Serialize};

const BASE_SCORE: f64 = 0.5;
const DOMAIN_BONUS: f64 = 0.3;
const LONG_CONTENT_BONUS: f64 = 0.1;
const MEDIUM_CONTENT_BONUS: f64 = 0.05;
const TITLE_BONUS: f64 = 0.05;
const HTTPS_BONUS: f64 = 0.05;

/// Domain suffixes considered educational or reference sources
const TRUSTED_SUFFIXES: &[&str] = &[".edu", ".org"];
const TRUSTED_DOMAINS: &[&str] = &[
    "wikipedia.org",
    "britannica.com",
    "khanacademy.org",
    "musictheory.net",
    "teoria.com",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    High,
    Medium,
    Low,
}

impl QualityTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            QualityTier::High
        } else if score >= 0.6 {
            QualityTier::Medium
        } else {
            QualityTier::Low
        }
    }
}

/// A validated search result with its quality assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub score: f64,
    pub tier: QualityTier,
}

fn is_trusted_host(host: &str) -> bool {
    TRUSTED_SUFFIXES.iter().any(|s| host.ends_with(s))
        || TRUSTED_DOMAINS
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{d}")))
}

pub fn score(result: &RawSearchResult) -> f64 {
    let mut score = BASE_SCORE;

    let parsed = Url::parse(result.url.trim()).ok();
    let host = parsed
        .as_ref()
        .and_then(Url::host_str)
        .map(str::to_ascii_lowercase);

    if host.as_deref().is_some_and(is_trusted_host) {
        score += DOMAIN_BONUS;
    }

    let content_len = result.content.chars().count();
    if content_len > 500 {
        score += LONG_CONTENT_BONUS;
    } else if content_len > 200 {
        score += MEDIUM_CONTENT_BONUS;
    }

    let title_len = result.title.trim().chars().count();
    if (11..100).contains(&title_len) {
        score += TITLE_BONUS;
    }

    if parsed.is_some_and(|u| u.scheme() == "https") {
        score += HTTPS_BONUS;
    }

    score.min(1.0)
}

/// Drop results without a title or URL, score the rest, and keep the best
/// `limit` in descending score order. Ties keep provider order.
pub fn rank(raw: Vec<RawSearchResult>, limit: usize) -> Vec<ScoredResult> {
    let mut scored: Vec<ScoredResult> = raw
        .into_iter()
        .filter(|r| !r.title.trim().is_empty() && !r.url.trim().is_empty())
        .map(|r| {
            let score = score(&r);
            ScoredResult {
                title: r.title.trim().to_string(),
                url: r.url.trim().to_string(),
                snippet: r.content,
                score,
                tier: QualityTier::from_score(score),
            }
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(limit);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(title: &str, url: &str, content_len: usize) -> RawSearchResult {
        RawSearchResult {
            title: title.to_string(),
            url: url.to_string(),
            content: "x".repeat(content_len),
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_trusted_domain_scores_high() {
        let r = result(
            "History of the Blues",
            "https://en.wikipedia.org/wiki/Blues",
            600,
        );
        assert!(approx(score(&r), 1.0));
        assert_eq!(QualityTier::from_score(score(&r)), QualityTier::High);
    }

    #[test]
    fn test_plain_http_short_result_scores_low() {
        let r = result("Blues", "http://example.com/blues", 10);
        assert!(approx(score(&r), 0.5));
        assert_eq!(QualityTier::from_score(score(&r)), QualityTier::Low);
    }

    #[test]
    fn test_medium_tier() {
        // 0.5 + 0.05 content + 0.05 title + 0.05 https
        let r = result("A decent page title", "https://example.com/page", 300);
        assert!(approx(score(&r), 0.65));
        assert_eq!(QualityTier::from_score(score(&r)), QualityTier::Medium);
    }

    #[test]
    fn test_lookalike_domain_not_trusted() {
        let r = result("Blues", "http://notwikipedia.org.example.com/", 0);
        assert!(approx(score(&r), 0.5));
        let r = result("Blues", "http://music.teoria.com/", 0);
        assert!(approx(score(&r), 0.8));
    }

    #[test]
    fn test_rank_filters_sorts_and_truncates() {
        let ranked = rank(
            vec![
                result("Low scoring page", "http://example.com/a", 0),
                result("", "https://example.com/untitled", 0),
                result("Missing url", "   ", 0),
                result("Encyclopedia entry", "https://britannica.com/x", 700),
                result("Course notes here", "https://music.example.edu/x", 0),
                result("Another low page", "http://example.com/b", 0),
            ],
            3,
        );
        let urls: Vec<_> = ranked.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://britannica.com/x",
                "https://music.example.edu/x",
                "http://example.com/a",
            ]
        );
    }
}
