//! Referral token parsing for the start command argument.
//!
//! Tokens look like `st500_meta` or `tiktok-st50`: parts split on `_` or `-`,
//! each part independently matched against a small source vocabulary and the
//! strategy keys. Unknown parts are ignored.

use super::strategy::Strategy;

/// Source tag recorded when no referral source is recognized.
pub const ORGANIC_SOURCE: &str = "organic";

/// Acquisition sources a token may carry.
const SOURCES: &[&str] = &["meta", "tiktok", "instagram", "youtube"];

/// What a referral token encodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Referral {
    pub source: Option<String>,
    pub strategy: Option<Strategy>,
}

/// Parse an optional start-command argument. The first recognized part of
/// each kind wins.
pub fn parse_referral(token: Option<&str>) -> Referral {
    let mut referral = Referral::default();
    let Some(token) = token else {
        return referral;
    };

    for part in token
        .trim()
        .to_lowercase()
        .split(['_', '-'])
        .filter(|p| !p.is_empty())
    {
        if referral.source.is_none() && SOURCES.contains(&part) {
            referral.source = Some(part.to_string());
            continue;
        }
        if referral.strategy.is_none()
            && let Ok(strategy) = part.parse::<Strategy>()
        {
            referral.strategy = Some(strategy);
        }
    }

    referral
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_and_source() {
        let r = parse_referral(Some("st500_meta"));
        assert_eq!(r.source.as_deref(), Some("meta"));
        assert_eq!(r.strategy, Some(Strategy::St500));
    }

    #[test]
    fn hyphen_and_case() {
        let r = parse_referral(Some("TikTok-ST50"));
        assert_eq!(r.source.as_deref(), Some("tiktok"));
        assert_eq!(r.strategy, Some(Strategy::St50));
    }

    #[test]
    fn st500_is_not_st50() {
        let r = parse_referral(Some("st500"));
        assert_eq!(r.strategy, Some(Strategy::St500));
        assert!(r.source.is_none());
    }

    #[test]
    fn unknown_parts_ignored() {
        let r = parse_referral(Some("promo_2024_meta"));
        assert_eq!(r.source.as_deref(), Some("meta"));
        assert!(r.strategy.is_none());
    }

    #[test]
    fn garbage_token_is_unqualified() {
        assert_eq!(parse_referral(Some("%%%")), Referral::default());
        assert_eq!(parse_referral(Some("__")), Referral::default());
        assert_eq!(parse_referral(Some("")), Referral::default());
    }

    #[test]
    fn absent_token() {
        assert_eq!(parse_referral(None), Referral::default());
    }

    #[test]
    fn first_recognized_part_wins() {
        let r = parse_referral(Some("meta_tiktok_st50_st500"));
        assert_eq!(r.source.as_deref(), Some("meta"));
        assert_eq!(r.strategy, Some(Strategy::St50));
    }
}
