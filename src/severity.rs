//! # Severity Classifier
//! Bag-of-keywords scoring of free text against a fixed, ordered severity
//! taxonomy. Pure and deterministic: the same text always yields the same
//! `(level, confidence)` pair.
//!
//! Matching is case-insensitive substring presence. A keyword occurrence that
//! sits entirely inside an occurrence of a longer matched keyword (e.g.
//! "contained" inside "quickly contained") is subsumed and does not count.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered severity scale. `Critical` sorts first, `Unknown` last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    Critical,
    High,
    Medium,
    Low,
    Unknown,
}

impl SeverityLevel {
    /// Every level, most severe first.
    pub const ALL: [SeverityLevel; 5] = [
        SeverityLevel::Critical,
        SeverityLevel::High,
        SeverityLevel::Medium,
        SeverityLevel::Low,
        SeverityLevel::Unknown,
    ];

    /// Levels that carry keywords (everything except `Unknown`).
    pub const RANKED: [SeverityLevel; 4] = [
        SeverityLevel::Critical,
        SeverityLevel::High,
        SeverityLevel::Medium,
        SeverityLevel::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityLevel::Critical => "critical",
            SeverityLevel::High => "high",
            SeverityLevel::Medium => "medium",
            SeverityLevel::Low => "low",
            SeverityLevel::Unknown => "unknown",
        }
    }

    /// Position in the total order (0 = most severe).
    pub fn rank(&self) -> usize {
        *self as usize
    }

    /// True if `self` is as severe as, or more severe than, `threshold`.
    pub fn meets(&self, threshold: SeverityLevel) -> bool {
        *self <= threshold
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeverityLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_ascii_lowercase();
        SeverityLevel::ALL
            .into_iter()
            .find(|l| l.as_str() == needle)
            .ok_or_else(|| {
                anyhow!("unrecognized severity level {s:?} (expected critical|high|medium|low|unknown)")
            })
    }
}

/// Outcome of classifying one text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub level: SeverityLevel,
    /// Matched keywords / total keywords of the winning level, 2 decimals.
    pub confidence: f32,
}

impl Classification {
    pub fn unknown() -> Self {
        Self {
            level: SeverityLevel::Unknown,
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct Tier {
    level: SeverityLevel,
    keywords: Vec<String>,
}

/// Keyword taxonomy, fixed at construction.
#[derive(Debug, Clone)]
pub struct SeverityClassifier {
    // Always most-severe first; the tie-break relies on it.
    tiers: Vec<Tier>,
}

impl Default for SeverityClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SeverityClassifier {
    /// Built-in fire-incident taxonomy.
    pub fn new() -> Self {
        Self::with_keywords([
            (
                SeverityLevel::Critical,
                vec![
                    "major",
                    "massive",
                    "explosive",
                    "evacuation",
                    "multiple alarm",
                    "deaths",
                    "fatalities",
                    "catastrophic",
                    "out of control",
                ],
            ),
            (
                SeverityLevel::High,
                vec![
                    "large",
                    "spreading",
                    "structural",
                    "injuries",
                    "homes threatened",
                    "buildings damaged",
                    "widespread",
                ],
            ),
            (
                SeverityLevel::Medium,
                vec![
                    "contained",
                    "under control",
                    "brush fire",
                    "vehicle fire",
                    "limited damage",
                    "minor injuries",
                ],
            ),
            (
                SeverityLevel::Low,
                vec![
                    "small",
                    "controlled",
                    "extinguished",
                    "minor",
                    "no injuries",
                    "quickly contained",
                ],
            ),
        ])
    }

    /// Custom taxonomy. `Unknown` entries and blank keywords are ignored;
    /// keywords are lower-cased and de-duplicated per level, order kept.
    pub fn with_keywords<I, K, S>(table: I) -> Self
    where
        I: IntoIterator<Item = (SeverityLevel, K)>,
        K: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tiers: Vec<Tier> = SeverityLevel::RANKED
            .iter()
            .map(|&level| Tier {
                level,
                keywords: Vec::new(),
            })
            .collect();

        for (level, kws) in table {
            let Some(tier) = tiers.iter_mut().find(|t| t.level == level) else {
                continue;
            };
            for kw in kws {
                let kw = kw.as_ref().trim().to_lowercase();
                if !kw.is_empty() && !tier.keywords.contains(&kw) {
                    tier.keywords.push(kw);
                }
            }
        }

        Self { tiers }
    }

    /// Keywords configured for `level` (empty for `Unknown`).
    pub fn keywords(&self, level: SeverityLevel) -> &[String] {
        self.tiers
            .iter()
            .find(|t| t.level == level)
            .map(|t| t.keywords.as_slice())
            .unwrap_or(&[])
    }

    /// Score `text` and pick the best level.
    ///
    /// Highest match count wins; equal counts go to the more severe level.
    /// No matches at all gives `(Unknown, 0.0)`.
    pub fn classify(&self, text: &str) -> Classification {
        let lower = text.to_lowercase();
        let hits = self.occurrences(&lower);

        let mut best: Option<(SeverityLevel, usize, usize)> = None;
        for (ti, tier) in self.tiers.iter().enumerate() {
            let count = (0..tier.keywords.len())
                .filter(|&ki| {
                    hits.iter()
                        .any(|h| h.tier == ti && h.keyword == ki && !h.subsumed)
                })
                .count();
            // Strict `>` keeps the earlier (more severe) tier on ties.
            if count > 0 && best.map_or(true, |(_, c, _)| count > c) {
                best = Some((tier.level, count, tier.keywords.len()));
            }
        }

        match best {
            Some((level, matched, total)) => Classification {
                level,
                confidence: round2(matched as f32 / total as f32),
            },
            None => Classification::unknown(),
        }
    }

    fn occurrences(&self, lower: &str) -> Vec<Hit> {
        let mut hits = Vec::new();
        for (ti, tier) in self.tiers.iter().enumerate() {
            for (ki, kw) in tier.keywords.iter().enumerate() {
                for (start, _) in lower.match_indices(kw.as_str()) {
                    hits.push(Hit {
                        tier: ti,
                        keyword: ki,
                        start,
                        end: start + kw.len(),
                        subsumed: false,
                    });
                }
            }
        }

        let spans: Vec<(usize, usize)> = hits.iter().map(|h| (h.start, h.end)).collect();
        for h in hits.iter_mut() {
            h.subsumed = spans.iter().any(|&(s, e)| {
                s <= h.start && h.end <= e && (e - s) > (h.end - h.start)
            });
        }
        hits
    }
}

#[derive(Debug, Clone, Copy)]
struct Hit {
    tier: usize,
    keyword: usize,
    start: usize,
    end: usize,
    subsumed: bool,
}

fn round2(x: f32) -> f32 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_is_critical_first_unknown_last() {
        let mut v = vec![
            SeverityLevel::Unknown,
            SeverityLevel::Low,
            SeverityLevel::Critical,
            SeverityLevel::Medium,
            SeverityLevel::High,
        ];
        v.sort();
        assert_eq!(v, SeverityLevel::ALL.to_vec());
        assert!(SeverityLevel::High.meets(SeverityLevel::Medium));
        assert!(SeverityLevel::Medium.meets(SeverityLevel::Medium));
        assert!(!SeverityLevel::Low.meets(SeverityLevel::Medium));
    }

    #[test]
    fn parse_is_case_insensitive_and_strict() {
        assert_eq!(" HIGH ".parse::<SeverityLevel>().unwrap(), SeverityLevel::High);
        assert!("severe".parse::<SeverityLevel>().is_err());
    }

    #[test]
    fn longer_keyword_subsumes_shorter() {
        let c = SeverityClassifier::new();
        // "contained" sits inside "quickly contained" and must not score for medium.
        let out = c.classify("Blaze quickly contained");
        assert_eq!(out.level, SeverityLevel::Low);
        assert_eq!(out.confidence, 0.17);
    }

    #[test]
    fn custom_taxonomy_ignores_unknown_and_blanks() {
        let c = SeverityClassifier::with_keywords([
            (SeverityLevel::Unknown, vec!["fire"]),
            (SeverityLevel::High, vec!["Inferno", " ", "inferno"]),
        ]);
        assert!(c.keywords(SeverityLevel::Unknown).is_empty());
        assert_eq!(c.keywords(SeverityLevel::High), ["inferno".to_string()]);
        assert_eq!(c.classify("fire").level, SeverityLevel::Unknown);
        let hit = c.classify("An INFERNO downtown");
        assert_eq!(hit.level, SeverityLevel::High);
        assert_eq!(hit.confidence, 1.0);
    }
}
