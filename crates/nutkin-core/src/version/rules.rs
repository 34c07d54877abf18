//! Branch rules: which release policy applies to which branch.

use regex::Regex;
use tracing::debug;

use super::{VersionError, VersionResult};
use crate::config::RuleConfig;

/// A single branch rule.
///
/// The pattern is matched anchored at the start of the branch name. A rule
/// with a prerelease tag puts the branch on a prerelease track; the
/// `build_metadata` flag appends branch-derived metadata to the result.
#[derive(Debug, Clone)]
pub struct VersionRule {
    raw: String,
    pattern: Regex,
    /// Prerelease tag for this track (`None` = stable releases).
    pub prerelease_tag: Option<String>,
    /// Whether to append build metadata derived from the branch name.
    pub build_metadata: bool,
}

impl VersionRule {
    /// Compile a rule from its pattern text.
    pub fn new(
        pattern: &str,
        prerelease_tag: Option<String>,
        build_metadata: bool,
    ) -> VersionResult<Self> {
        let anchored = format!("^(?:{pattern})");
        let compiled =
            Regex::new(&anchored).map_err(|e| VersionError::InvalidPattern(Box::new(e)))?;
        Ok(Self {
            raw: pattern.to_string(),
            pattern: compiled,
            prerelease_tag,
            build_metadata,
        })
    }

    fn matches(&self, branch: &str) -> bool {
        self.pattern.is_match(branch)
    }

    /// The pattern text as written, for display.
    pub fn pattern(&self) -> &str {
        &self.raw
    }
}

/// An ordered list of branch rules; the first match wins.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<VersionRule>,
}

impl RuleSet {
    /// The default policy: stable releases from `main`, release candidates
    /// from `dev`, alpha prereleases with branch metadata from anywhere else.
    pub fn default_policy() -> Self {
        Self {
            rules: vec![
                VersionRule::new("main", None, false).expect("default pattern compiles"),
                VersionRule::new("dev", Some("rc".into()), false)
                    .expect("default pattern compiles"),
                VersionRule::new(".*", Some("alpha".into()), true)
                    .expect("default pattern compiles"),
            ],
        }
    }

    /// Compile a rule set from configuration, in the configured order.
    pub fn from_config(configs: &[RuleConfig]) -> VersionResult<Self> {
        let rules = configs
            .iter()
            .map(|c| VersionRule::new(&c.branch, c.prerelease_tag.clone(), c.build_metadata))
            .collect::<VersionResult<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Find the first rule matching `branch`, if any.
    pub fn matching(&self, branch: &str) -> Option<&VersionRule> {
        let rule = self.rules.iter().find(|rule| rule.matches(branch));
        match rule {
            Some(rule) => debug!(branch, pattern = rule.pattern(), "matched version rule"),
            None => debug!(branch, "no version rule matched"),
        }
        rule
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::default_policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_main_is_stable() {
        let rules = RuleSet::default_policy();
        let rule = rules.matching("main").unwrap();
        assert_eq!(rule.prerelease_tag, None);
        assert!(!rule.build_metadata);
    }

    #[test]
    fn default_policy_dev_is_rc() {
        let rules = RuleSet::default_policy();
        let rule = rules.matching("dev").unwrap();
        assert_eq!(rule.prerelease_tag.as_deref(), Some("rc"));
    }

    #[test]
    fn default_policy_catch_all_is_alpha_with_metadata() {
        let rules = RuleSet::default_policy();
        let rule = rules.matching("feature/x-y").unwrap();
        assert_eq!(rule.prerelease_tag.as_deref(), Some("alpha"));
        assert!(rule.build_metadata);
    }

    #[test]
    fn first_match_wins() {
        let rules = RuleSet::from_config(&[
            RuleConfig {
                branch: "release/.*".into(),
                prerelease_tag: Some("rc".into()),
                build_metadata: false,
            },
            RuleConfig {
                branch: ".*".into(),
                prerelease_tag: Some("alpha".into()),
                build_metadata: true,
            },
        ])
        .unwrap();

        let rule = rules.matching("release/1.x").unwrap();
        assert_eq!(rule.prerelease_tag.as_deref(), Some("rc"));
    }

    #[test]
    fn patterns_anchor_at_start() {
        let rules = RuleSet::from_config(&[RuleConfig {
            branch: "dev".into(),
            prerelease_tag: Some("rc".into()),
            build_metadata: false,
        }])
        .unwrap();

        assert!(rules.matching("dev").is_some());
        // Anchored at the start only; a suffix still matches
        assert!(rules.matching("dev-2").is_some());
        assert!(rules.matching("my-dev").is_none());
    }

    #[test]
    fn no_catch_all_means_no_match() {
        let rules = RuleSet::from_config(&[RuleConfig {
            branch: "main".into(),
            prerelease_tag: None,
            build_metadata: false,
        }])
        .unwrap();

        assert!(rules.matching("feature/z").is_none());
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let result = RuleSet::from_config(&[RuleConfig {
            branch: "(unclosed".into(),
            prerelease_tag: None,
            build_metadata: false,
        }]);
        assert!(matches!(result, Err(VersionError::InvalidPattern(_))));
    }
}
