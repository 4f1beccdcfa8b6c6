//! Platform selection.
//!
//! A selection is a comma separated list of platform names. A plain name
//! tracks live commits; `name@revision` freezes the platform to one revision;
//! `all` tracks every configured platform.

use crate::{ConfigError, ConfigResult};
use medic_core::{Platform, Revision};
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

static PLATFORM_SPEC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_-]+)(?:@([^\s@]+))?$").expect("Invalid regex")
});

/// Which platforms to build and how.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Platforms following live upstream commits.
    pub tracked: Vec<Platform>,
    /// Platforms pinned to a single revision.
    pub frozen: Vec<(Platform, Revision)>,
}

impl Selection {
    /// Track every known platform.
    pub fn all(known: &[Platform]) -> Self {
        Self {
            tracked: known.to_vec(),
            frozen: Vec::new(),
        }
    }

    /// Parse a selection string against the configured platforms.
    ///
    /// Unknown platform names are dropped with a warning. A platform may not
    /// be both tracked and frozen.
    pub fn parse(raw: &str, known: &[Platform]) -> ConfigResult<Self> {
        let mut selection = Selection::default();

        for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if token == "all" {
                for platform in known {
                    selection.track(platform.clone());
                }
                continue;
            }

            let caps = PLATFORM_SPEC
                .captures(token)
                .ok_or_else(|| ConfigError::InvalidValue {
                    field: "platforms".to_string(),
                    message: format!("cannot parse '{}'", token),
                })?;
            let platform = Platform::new(&caps[1]);

            if !known.contains(&platform) {
                warn!(platform = %platform, "Ignoring unknown platform");
                continue;
            }

            match caps.get(2) {
                Some(rev) => selection.freeze(platform, Revision::new(rev.as_str()))?,
                None => selection.track(platform),
            }
        }

        if let Some(platform) = selection
            .tracked
            .iter()
            .find(|p| selection.frozen.iter().any(|(f, _)| f == *p))
        {
            return Err(ConfigError::InvalidValue {
                field: "platforms".to_string(),
                message: format!("'{}' is both tracked and frozen", platform),
            });
        }

        Ok(selection)
    }

    pub fn is_tracked(&self, platform: &Platform) -> bool {
        self.tracked.contains(platform)
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty() && self.frozen.is_empty()
    }

    fn track(&mut self, platform: Platform) {
        if !self.tracked.contains(&platform) {
            self.tracked.push(platform);
        }
    }

    fn freeze(&mut self, platform: Platform, revision: Revision) -> ConfigResult<()> {
        match self.frozen.iter().find(|(p, _)| *p == platform) {
            Some((_, existing)) if *existing == revision => Ok(()),
            Some((_, existing)) => Err(ConfigError::Duplicate(format!(
                "'{}' pinned to both {} and {}",
                platform, existing, revision
            ))),
            None => {
                self.frozen.push((platform, revision));
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> Vec<Platform> {
        vec![
            Platform::new("android"),
            Platform::new("ios"),
            Platform::new("blackberry"),
        ]
    }

    #[test]
    fn test_parse_tracked_and_frozen() {
        let selection = Selection::parse("android, ios@2.9.0", &known()).unwrap();
        assert_eq!(selection.tracked, vec![Platform::new("android")]);
        assert_eq!(
            selection.frozen,
            vec![(Platform::new("ios"), Revision::new("2.9.0"))]
        );
        assert!(selection.is_tracked(&Platform::new("android")));
        assert!(!selection.is_tracked(&Platform::new("ios")));
    }

    #[test]
    fn test_all_tracks_everything() {
        let selection = Selection::parse("all", &known()).unwrap();
        assert_eq!(selection, Selection::all(&known()));
    }

    #[test]
    fn test_unknown_platforms_are_dropped() {
        let selection = Selection::parse("android,wp8,bada@1.0", &known()).unwrap();
        assert_eq!(selection.tracked, vec![Platform::new("android")]);
        assert!(selection.frozen.is_empty());
    }

    #[test]
    fn test_tracked_and_frozen_conflict() {
        let err = Selection::parse("android,android@3.0.0", &known()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_conflicting_pins() {
        let err = Selection::parse("ios@2.9.0,ios@3.0.0", &known()).unwrap_err();
        assert!(matches!(err, ConfigError::Duplicate(_)));
    }

    #[test]
    fn test_malformed_token() {
        let err = Selection::parse("ios@", &known()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_duplicates_collapse() {
        let selection = Selection::parse("android,android,,", &known()).unwrap();
        assert_eq!(selection.tracked.len(), 1);
    }
}
