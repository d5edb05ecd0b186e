//! Shared rule storage with atomic hot reload.

use super::rule::{parse_update, RewriteRule, RuleError};
use std::sync::RwLock;

/// Holds the active rewrite rule.
///
/// `reload` parses before it publishes, so a rejected update leaves
/// the active rule untouched. Readers snapshot the rule by value
/// under a short read lock and never see a mix of old and new fields.
#[derive(Debug)]
pub struct RuleStore {
    rule: RwLock<RewriteRule>,
}

impl RuleStore {
    pub fn new(initial: RewriteRule) -> Self {
        Self {
            rule: RwLock::new(initial),
        }
    }

    /// Snapshot of the active rule
    pub fn current(&self) -> RewriteRule {
        *self.rule.read().unwrap()
    }

    /// Parse `text` against the active rule and publish the result.
    ///
    /// Key=value updates overlay the current rule; the whitespace
    /// triple replaces it wholesale.
    pub fn reload(&self, text: &str) -> Result<RewriteRule, RuleError> {
        let next = parse_update(text, &self.current())?;
        *self.rule.write().unwrap() = next;
        Ok(next)
    }

    /// Replace the rule outright (startup configuration path)
    pub fn replace(&self, rule: RewriteRule) {
        *self.rule.write().unwrap() = rule;
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new(RewriteRule::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_current_returns_initial() {
        let store = RuleStore::default();
        assert_eq!(store.current(), RewriteRule::default());
    }

    #[test]
    fn test_reload_replaces_rule() {
        let store = RuleStore::default();
        let applied = store.reload("4000 10.0.0.9 443").unwrap();

        assert_eq!(applied.match_port, 4000);
        assert_eq!(store.current(), applied);
    }

    #[test]
    fn test_rejected_reload_leaves_rule_untouched() {
        let store = RuleStore::default();
        let before = store.current();

        assert!(store.reload("8080 999.999.0.1 80").is_err());
        assert_eq!(store.current(), before);

        assert!(store.reload("garbage").is_err());
        assert_eq!(store.current(), before);
    }

    #[test]
    fn test_reload_overlay() {
        let store = RuleStore::default();
        store.reload("target_ip=10.9.8.7").unwrap();

        let rule = store.current();
        assert_eq!(rule.target_addr, Ipv4Addr::new(10, 9, 8, 7));
        assert_eq!(rule.match_port, 8080);
        assert_eq!(rule.target_port, 80);
    }

    #[test]
    fn test_replace() {
        let store = RuleStore::default();
        let rule = RewriteRule {
            match_port: 1,
            target_addr: Ipv4Addr::new(1, 2, 3, 4),
            target_port: 2,
        };
        store.replace(rule);
        assert_eq!(store.current(), rule);
    }

    #[test]
    fn test_readers_never_see_torn_rule() {
        let store = Arc::new(RuleStore::default());
        let rule_a = store.current();
        let rule_b = parse_update("4000 10.0.0.9 443", &rule_a).unwrap();

        let mut readers = Vec::new();
        for _ in 0..4 {
            let store = Arc::clone(&store);
            readers.push(thread::spawn(move || {
                for _ in 0..10_000 {
                    let seen = store.current();
                    assert!(
                        seen == rule_a || seen == rule_b,
                        "torn rule observed: {seen:?}"
                    );
                }
            }));
        }

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..1_000 {
                    let text = if i % 2 == 0 {
                        "4000 10.0.0.9 443"
                    } else {
                        "8080 192.168.1.100 80"
                    };
                    store.reload(text).unwrap();
                }
            })
        };

        for reader in readers {
            reader.join().unwrap();
        }
        writer.join().unwrap();
    }
}
