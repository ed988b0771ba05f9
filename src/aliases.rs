use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::CombineError;

pub const DATE: &str = "Date";
pub const HOME_TEAM: &str = "HomeTeam";
pub const AWAY_TEAM: &str = "AwayTeam";
pub const HOME_GOALS: &str = "FTHG";
pub const AWAY_GOALS: &str = "FTAG";

const FOOTBALL_GROUPS: &[(&str, &[&str])] = &[
    (DATE, &["MatchDate", "match_date", "Kickoff"]),
    ("Season", &["season_name"]),
    (HOME_TEAM, &["Home", "home_team", "HomeSide"]),
    (AWAY_TEAM, &["Away", "away_team", "AwaySide"]),
    (HOME_GOALS, &["HG", "HomeGoals", "home_goals", "home_score"]),
    (AWAY_GOALS, &["AG", "AwayGoals", "away_goals", "away_score"]),
    ("FTR", &["Res", "Result"]),
    ("Squad", &["Team"]),
    ("MP", &["Matches", "played"]),
    ("W", &["Wins"]),
    ("D", &["Draws"]),
    ("L", &["Losses", "loses"]),
    ("GF", &["Goals", "goals_for"]),
    ("GA", &["goals_against"]),
    ("Pts", &["Points"]),
    ("xGA", &["xg_against"]),
];

const TEAM_VARIANTS: &[(&str, &str)] = &[
    ("Manchester Utd", "Manchester United"),
    ("Man United", "Manchester United"),
    ("Man Utd", "Manchester United"),
    ("Man City", "Manchester City"),
    ("Newcastle Utd", "Newcastle United"),
    ("Nott'ham Forest", "Nottingham Forest"),
    ("Nott'm Forest", "Nottingham Forest"),
    ("West Ham", "West Ham United"),
    ("Tottenham", "Tottenham Hotspur"),
    ("Spurs", "Tottenham Hotspur"),
    ("Brighton", "Brighton and Hove Albion"),
    ("Wolves", "Wolverhampton Wanderers"),
    ("Internazionale", "Inter"),
    ("AC Milan", "Milan"),
    ("Athletic", "Athletic Club"),
    ("Ath Bilbao", "Athletic Club"),
    ("Betis", "Real Betis"),
    ("Sociedad", "Real Sociedad"),
    ("M'Gladbach", "Borussia Mönchengladbach"),
    ("Mönchengladbach", "Borussia Mönchengladbach"),
    ("Bayern", "Bayern Munich"),
    ("Bayern München", "Bayern Munich"),
    ("Paris S-G", "Paris Saint-Germain"),
    ("Paris SG", "Paris Saint-Germain"),
    ("PSG", "Paris Saint-Germain"),
];

static DEFAULT_ALIASES: Lazy<AliasMap> = Lazy::new(|| {
    AliasMap::new(
        FOOTBALL_GROUPS
            .iter()
            .map(|(canonical, synonyms)| AliasGroup {
                canonical: canonical.to_string(),
                synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
            })
            .collect(),
    )
});

static DEFAULT_TEAMS: Lazy<TeamNames> = Lazy::new(|| {
    TeamNames::new(
        TEAM_VARIANTS
            .iter()
            .map(|(variant, canonical)| (variant.to_string(), canonical.to_string())),
    )
});

/// One set of interchangeable column headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasGroup {
    pub canonical: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

impl AliasGroup {
    fn matches(&self, key: &str) -> bool {
        header_key(&self.canonical) == key || self.synonyms.iter().any(|s| header_key(s) == key)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasMap {
    groups: Vec<AliasGroup>,
}

impl AliasMap {
    pub fn new(groups: Vec<AliasGroup>) -> Self {
        Self { groups }
    }

    /// Header synonyms used by football-data style season files and
    /// fbref-style team tables.
    pub fn default_football() -> &'static AliasMap {
        &DEFAULT_ALIASES
    }

    pub fn groups(&self) -> &[AliasGroup] {
        &self.groups
    }

    /// Canonical name of the group `header` belongs to, `None` when no group
    /// claims it. A header claimed by two groups is ambiguous.
    pub fn resolve(&self, header: &str) -> Result<Option<&str>, CombineError> {
        let key = header_key(header);
        let mut hits = self.groups.iter().filter(|g| g.matches(&key));
        let Some(first) = hits.next() else {
            return Ok(None);
        };
        let rest: Vec<&AliasGroup> = hits.collect();
        if !rest.is_empty() {
            let mut groups = vec![first.canonical.clone()];
            groups.extend(rest.iter().map(|g| g.canonical.clone()));
            return Err(CombineError::SchemaConflict {
                column: header.trim().to_string(),
                groups,
            });
        }
        Ok(Some(first.canonical.as_str()))
    }

    /// The name a header is stored under after reconciliation.
    pub fn canonical_name(&self, header: &str) -> Result<String, CombineError> {
        Ok(self
            .resolve(header)?
            .map(str::to_string)
            .unwrap_or_else(|| header.trim().to_string()))
    }
}

/// Lookup key for header comparison: trimmed, ASCII case folded.
pub fn header_key(header: &str) -> String {
    header.trim().to_ascii_lowercase()
}

/// Maps spelling variants of club names onto one display name.
#[derive(Debug, Clone, Default)]
pub struct TeamNames {
    variants: HashMap<String, String>,
}

impl TeamNames {
    pub fn new(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            variants: pairs
                .into_iter()
                .map(|(variant, canonical)| (team_key(&variant), canonical))
                .collect(),
        }
    }

    pub fn default_football() -> &'static TeamNames {
        &DEFAULT_TEAMS
    }

    pub fn canonical(&self, name: &str) -> String {
        let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");
        self.variants
            .get(&team_key(&collapsed))
            .cloned()
            .unwrap_or(collapsed)
    }

    pub fn same_team(&self, a: &str, b: &str) -> bool {
        team_key(&self.canonical(a)) == team_key(&self.canonical(b))
    }
}

fn team_key(name: &str) -> String {
    name.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::{AliasGroup, AliasMap, TeamNames};
    use crate::error::CombineError;

    #[test]
    fn resolves_synonyms_case_insensitively() {
        let map = AliasMap::default_football();
        assert_eq!(map.resolve(" home ").unwrap(), Some("HomeTeam"));
        assert_eq!(map.resolve("hg").unwrap(), Some("FTHG"));
        assert_eq!(map.resolve("Referee").unwrap(), None);
        assert_eq!(map.canonical_name(" Referee ").unwrap(), "Referee");
    }

    #[test]
    fn header_in_two_groups_is_a_conflict() {
        let map = AliasMap::new(vec![
            AliasGroup {
                canonical: "HomeTeam".to_string(),
                synonyms: vec!["Home".to_string()],
            },
            AliasGroup {
                canonical: "FTHG".to_string(),
                synonyms: vec!["home".to_string()],
            },
        ]);
        let err = map.resolve("HOME").unwrap_err();
        let CombineError::SchemaConflict { column, groups } = err;
        assert_eq!(column, "HOME");
        assert_eq!(groups, vec!["HomeTeam".to_string(), "FTHG".to_string()]);
    }

    #[test]
    fn team_variants_collapse() {
        let names = TeamNames::default_football();
        assert_eq!(names.canonical("Man  Utd"), "Manchester United");
        assert!(names.same_team("spurs", "Tottenham Hotspur"));
        assert_eq!(names.canonical(" Team A "), "Team A");
        assert!(!names.same_team("Team A", "Team B"));
    }
}
