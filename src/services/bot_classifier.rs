// Bot classifier. Heuristic, never fails; consulted on the
// redirect hot path before a click event is emitted for tracking.

use std::collections::HashMap;
use std::sync::Mutex;

use rand::{thread_rng, Rng};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCategory {
    Search,
    Social,
    Monitoring,
    Seo,
}

const PATTERNS: &[(&str, BotCategory)] = &[
    ("googlebot", BotCategory::Search),
    ("bingbot", BotCategory::Search),
    ("slurp", BotCategory::Search),
    ("duckduckbot", BotCategory::Search),
    ("baiduspider", BotCategory::Search),
    ("yandexbot", BotCategory::Search),
    ("sogou", BotCategory::Search),
    ("exabot", BotCategory::Search),
    ("facebookexternalhit", BotCategory::Social),
    ("facebot", BotCategory::Social),
    ("twitterbot", BotCategory::Social),
    ("linkedinbot", BotCategory::Social),
    ("slackbot", BotCategory::Social),
    ("whatsapp", BotCategory::Social),
    ("telegrambot", BotCategory::Social),
    ("discordbot", BotCategory::Social),
    ("pingdom", BotCategory::Monitoring),
    ("uptimerobot", BotCategory::Monitoring),
    ("statuscake", BotCategory::Monitoring),
    ("datadog", BotCategory::Monitoring),
    ("site24x7", BotCategory::Monitoring),
    ("ahrefsbot", BotCategory::Seo),
    ("semrushbot", BotCategory::Seo),
    ("mj12bot", BotCategory::Seo),
    ("dotbot", BotCategory::Seo),
    ("rogerbot", BotCategory::Seo),
    ("headlesschrome", BotCategory::Monitoring),
    ("phantomjs", BotCategory::Monitoring),
    ("curl/", BotCategory::Monitoring),
    ("wget/", BotCategory::Monitoring),
    ("python-requests", BotCategory::Monitoring),
];

pub struct BotClassifier {
    cache: Mutex<HashMap<String, Option<BotCategory>>>,
    cache_size: usize,
    min_ua_length: usize,
}

impl BotClassifier {
    pub fn new(cache_size: usize, min_ua_length: usize) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            cache_size,
            min_ua_length,
        }
    }

    pub fn is_bot(&self, user_agent: &str) -> bool {
        self.identify_bot(user_agent).is_some()
    }

    /// Returns a category tag when a curated pattern matches; `None` means
    /// the UA is classified as human (the default for anything unrecognized).
    pub fn identify_bot(&self, user_agent: &str) -> Option<BotCategory> {
        if user_agent.len() < self.min_ua_length {
            return Some(BotCategory::Monitoring);
        }

        {
            let cache = self.cache.lock().expect("bot classifier cache poisoned");
            if let Some(cached) = cache.get(user_agent) {
                return *cached;
            }
        }

        let lower = user_agent.to_lowercase();
        let category = PATTERNS
            .iter()
            .find(|(pattern, _)| lower.contains(pattern))
            .map(|(_, category)| *category);

        let mut cache = self.cache.lock().expect("bot classifier cache poisoned");
        if cache.len() >= self.cache_size {
            evict_half(&mut cache);
        }
        cache.insert(user_agent.to_string(), category);

        category
    }
}

/// Coarse random eviction: good enough for a heuristic cache, avoids tracking
/// access order for a structure that only needs to stay roughly bounded.
fn evict_half(cache: &mut HashMap<String, Option<BotCategory>>) {
    let mut rng = thread_rng();
    let target = cache.len() / 2;
    let keys_to_drop: Vec<String> = cache
        .keys()
        .filter(|_| rng.gen_bool(0.5))
        .take(target)
        .cloned()
        .collect();
    for key in keys_to_drop {
        cache.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_user_agent_is_classified_bot() {
        let classifier = BotClassifier::new(10_000, 20);
        assert!(classifier.is_bot("curl"));
    }

    #[test]
    fn known_crawler_is_classified_bot() {
        let classifier = BotClassifier::new(10_000, 20);
        assert!(classifier.is_bot("Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)"));
        assert_eq!(
            classifier.identify_bot("Mozilla/5.0 (compatible; Googlebot/2.1)"),
            Some(BotCategory::Search)
        );
    }

    #[test]
    fn ordinary_browser_ua_is_human() {
        let classifier = BotClassifier::new(10_000, 20);
        let ua = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
        assert!(!classifier.is_bot(ua));
    }

    #[test]
    fn classification_is_cached() {
        let classifier = BotClassifier::new(10_000, 20);
        let ua = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 Safari/537.36";
        assert_eq!(classifier.is_bot(ua), classifier.is_bot(ua));
    }
}
