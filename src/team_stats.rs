use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aliases::{AWAY_GOALS, AWAY_TEAM, AliasMap, DATE, HOME_GOALS, HOME_TEAM, TeamNames};
use crate::csv_table::{Cell, Table, parse_date};
use crate::error::StatsError;
use crate::probability::{Outcome, classify_outcome};

const DEFAULT_GOALS_PER_TEAM: f64 = 1.35;
const DEFAULT_HOME_GOALS: f64 = 1.50;
const DEFAULT_AWAY_GOALS: f64 = 1.20;
// Below this many matches league averages are shrunk toward the defaults.
const LEAGUE_MIN_N: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FormConfig {
    /// How many of the most recent matches feed the form score.
    pub window: usize,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self { window: 5 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueSplit {
    pub matches: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub goals_for: u32,
    pub goals_against: u32,
    pub points: u32,
}

impl VenueSplit {
    fn record(&mut self, goals_for: u32, goals_against: u32) {
        self.matches += 1;
        self.goals_for += goals_for;
        self.goals_against += goals_against;
        match team_outcome(goals_for, goals_against) {
            Outcome::Home => self.wins += 1,
            Outcome::Draw => self.draws += 1,
            Outcome::Away => self.losses += 1,
        }
        self.points += match_points(goals_for, goals_against);
    }

    fn absorb(&mut self, other: &VenueSplit) {
        self.matches += other.matches;
        self.wins += other.wins;
        self.draws += other.draws;
        self.losses += other.losses;
        self.goals_for += other.goals_for;
        self.goals_against += other.goals_against;
        self.points += other.points;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamStats {
    pub team: String,
    pub matches_played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub goals_for: u32,
    pub goals_against: u32,
    pub points: u32,
    pub home: VenueSplit,
    pub away: VenueSplit,
    /// Decay-weighted points per match over the form window, in [0, 3].
    pub recent_form: f64,
    /// Decay-weighted goal difference per match over the form window.
    pub recent_goal_diff: f64,
    pub form_matches: u32,
    pub insufficient_data: bool,
}

impl TeamStats {
    pub fn empty(team: &str) -> Self {
        Self {
            team: team.to_string(),
            matches_played: 0,
            wins: 0,
            draws: 0,
            losses: 0,
            goals_for: 0,
            goals_against: 0,
            points: 0,
            home: VenueSplit::default(),
            away: VenueSplit::default(),
            recent_form: 0.0,
            recent_goal_diff: 0.0,
            form_matches: 0,
            insufficient_data: true,
        }
    }

    pub fn goal_difference(&self) -> i64 {
        self.goals_for as i64 - self.goals_against as i64
    }

    pub fn points_per_match(&self) -> f64 {
        per_match(self.points as f64, self.matches_played)
    }

    pub fn goal_difference_per_match(&self) -> f64 {
        per_match(self.goal_difference() as f64, self.matches_played)
    }

    pub fn goals_for_per_match(&self) -> f64 {
        per_match(self.goals_for as f64, self.matches_played)
    }

    pub fn goals_against_per_match(&self) -> f64 {
        per_match(self.goals_against as f64, self.matches_played)
    }

    pub fn win_rate(&self) -> f64 {
        per_match(self.wins as f64, self.matches_played)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    pub adjustment: f64,
}

impl Threshold {
    fn at_least(min: f64, adjustment: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
            adjustment,
        }
    }

    fn at_most(max: f64, adjustment: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
            adjustment,
        }
    }

    fn hits(&self, value: f64) -> bool {
        self.min.is_some_and(|m| value >= m) || self.max.is_some_and(|m| value <= m)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormRatingConfig {
    /// Checked in order against recent goal difference per match; first hit applies.
    pub goal_diff: Vec<Threshold>,
    /// Checked in order against recent points per match; first hit applies.
    pub points: Vec<Threshold>,
    pub excellent: f64,
    pub good: f64,
    pub average: f64,
    pub poor: f64,
}

impl Default for FormRatingConfig {
    fn default() -> Self {
        Self {
            goal_diff: vec![
                Threshold::at_least(0.5, 2.0),
                Threshold::at_least(0.2, 1.0),
                Threshold::at_most(-0.5, -2.0),
                Threshold::at_most(-0.2, -1.0),
            ],
            points: vec![
                Threshold::at_least(2.0, 2.0),
                Threshold::at_least(1.5, 1.0),
                Threshold::at_most(0.5, -2.0),
                Threshold::at_most(0.8, -1.0),
            ],
            excellent: 7.5,
            good: 6.0,
            average: 4.0,
            poor: 2.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormStatus {
    Excellent,
    Good,
    Average,
    Poor,
    VeryPoor,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FormRating {
    /// 0..=10, 5 is neutral.
    pub rating: f64,
    pub status: FormStatus,
}

pub fn form_rating(stats: &TeamStats, cfg: &FormRatingConfig) -> FormRating {
    let mut rating = 5.0;
    if stats.form_matches > 0 {
        if let Some(t) = cfg.goal_diff.iter().find(|t| t.hits(stats.recent_goal_diff)) {
            rating += t.adjustment;
        }
        if let Some(t) = cfg.points.iter().find(|t| t.hits(stats.recent_form)) {
            rating += t.adjustment;
        }
    }
    let rating = f64::clamp(rating, 0.0, 10.0);
    let status = if rating >= cfg.excellent {
        FormStatus::Excellent
    } else if rating >= cfg.good {
        FormStatus::Good
    } else if rating >= cfg.average {
        FormStatus::Average
    } else if rating >= cfg.poor {
        FormStatus::Poor
    } else {
        FormStatus::VeryPoor
    };
    FormRating { rating, status }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeagueAverages {
    pub matches: usize,
    pub goals_per_team: f64,
    pub home_goals: f64,
    pub away_goals: f64,
}

impl LeagueAverages {
    pub fn defaults() -> Self {
        Self {
            matches: 0,
            goals_per_team: DEFAULT_GOALS_PER_TEAM,
            home_goals: DEFAULT_HOME_GOALS,
            away_goals: DEFAULT_AWAY_GOALS,
        }
    }
}

/// Column positions of the match fields inside one table.
#[derive(Debug, Clone, Copy)]
struct MatchColumns {
    date: Option<usize>,
    home_team: usize,
    away_team: usize,
    home_goals: usize,
    away_goals: usize,
}

impl MatchColumns {
    fn resolve(table: &Table) -> Result<Self, StatsError> {
        let aliases = AliasMap::default_football();
        let mut found: [Option<usize>; 5] = [None; 5];
        let wanted = [DATE, HOME_TEAM, AWAY_TEAM, HOME_GOALS, AWAY_GOALS];
        for (idx, column) in table.columns().iter().enumerate() {
            let name = aliases.canonical_name(&column.name)?;
            if let Some(slot) = wanted.iter().position(|w| w.eq_ignore_ascii_case(&name)) {
                found[slot].get_or_insert(idx);
            }
        }
        Ok(Self {
            date: found[0],
            home_team: found[1].ok_or(StatsError::MissingColumn(HOME_TEAM))?,
            away_team: found[2].ok_or(StatsError::MissingColumn(AWAY_TEAM))?,
            home_goals: found[3].ok_or(StatsError::MissingColumn(HOME_GOALS))?,
            away_goals: found[4].ok_or(StatsError::MissingColumn(AWAY_GOALS))?,
        })
    }
}

#[derive(Debug, Clone)]
struct PlayedMatch {
    date: Option<NaiveDate>,
    position: usize,
    home: String,
    away: String,
    home_goals: u32,
    away_goals: u32,
}

pub fn aggregate(table: &Table, team: &str, form: &FormConfig) -> Result<TeamStats, StatsError> {
    let cols = MatchColumns::resolve(table)?;
    let matches = played_matches(table, &cols);
    Ok(aggregate_matches(&matches, team, TeamNames::default_football(), form))
}

/// Stats for every team in the table, ordered like a league table.
pub fn aggregate_all(table: &Table, form: &FormConfig) -> Result<Vec<TeamStats>, StatsError> {
    let cols = MatchColumns::resolve(table)?;
    let matches = played_matches(table, &cols);
    let names = TeamNames::default_football();

    let mut teams: Vec<String> = Vec::new();
    for m in &matches {
        for side in [&m.home, &m.away] {
            if !teams.iter().any(|t| names.same_team(t, side)) {
                teams.push(names.canonical(side));
            }
        }
    }

    let mut out: Vec<TeamStats> = teams
        .par_iter()
        .map(|team| aggregate_matches(&matches, team, names, form))
        .collect();
    out.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then(b.goal_difference().cmp(&a.goal_difference()))
            .then(b.goals_for.cmp(&a.goals_for))
            .then(a.team.cmp(&b.team))
    });
    Ok(out)
}

pub fn league_averages(table: &Table) -> Result<LeagueAverages, StatsError> {
    let cols = MatchColumns::resolve(table)?;
    let matches = played_matches(table, &cols);
    if matches.is_empty() {
        return Ok(LeagueAverages::defaults());
    }
    let n = matches.len() as f64;
    let home: f64 = matches.iter().map(|m| m.home_goals as f64).sum();
    let away: f64 = matches.iter().map(|m| m.away_goals as f64).sum();

    let raw = LeagueAverages {
        matches: matches.len(),
        goals_per_team: (home + away) / (2.0 * n),
        home_goals: home / n,
        away_goals: away / n,
    };

    // Small samples lean on the defaults to avoid wild swings.
    let w = (n / LEAGUE_MIN_N).clamp(0.0, 1.0);
    let d = LeagueAverages::defaults();
    Ok(LeagueAverages {
        matches: raw.matches,
        goals_per_team: (1.0 - w) * d.goals_per_team + w * raw.goals_per_team,
        home_goals: (1.0 - w) * d.home_goals + w * raw.home_goals,
        away_goals: (1.0 - w) * d.away_goals + w * raw.away_goals,
    })
}

fn played_matches(table: &Table, cols: &MatchColumns) -> Vec<PlayedMatch> {
    let mut out = Vec::with_capacity(table.len());
    for row in table.rows() {
        let cells = row.cells();
        let home = cells[cols.home_team].to_string();
        let away = cells[cols.away_team].to_string();
        if home.trim().is_empty() || away.trim().is_empty() {
            continue;
        }
        // Unplayed fixtures carry no score.
        let (Some(home_goals), Some(away_goals)) = (
            goals(&cells[cols.home_goals]),
            goals(&cells[cols.away_goals]),
        ) else {
            continue;
        };
        let date = cols
            .date
            .and_then(|i| cells[i].as_date().or_else(|| cells[i].as_str().and_then(parse_date)));
        out.push(PlayedMatch {
            date,
            position: row.index(),
            home,
            away,
            home_goals,
            away_goals,
        });
    }
    debug!(rows = table.len(), played = out.len(), "collected played matches");
    out
}

fn aggregate_matches(
    matches: &[PlayedMatch],
    team: &str,
    names: &TeamNames,
    form: &FormConfig,
) -> TeamStats {
    let canonical = names.canonical(team);
    let mut home = VenueSplit::default();
    let mut away = VenueSplit::default();
    // (date, position, goals_for, goals_against)
    let mut history: Vec<(Option<NaiveDate>, usize, u32, u32)> = Vec::new();

    for m in matches {
        if names.same_team(&m.home, &canonical) {
            home.record(m.home_goals, m.away_goals);
            history.push((m.date, m.position, m.home_goals, m.away_goals));
        } else if names.same_team(&m.away, &canonical) {
            away.record(m.away_goals, m.home_goals);
            history.push((m.date, m.position, m.away_goals, m.home_goals));
        }
    }

    if history.is_empty() {
        debug!(team = %canonical, "no matches found");
        return TeamStats::empty(&canonical);
    }

    let mut total = VenueSplit::default();
    total.absorb(&home);
    total.absorb(&away);

    // Most recent first; undated rows count as oldest, later rows win ties.
    history.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
    let mut weight_sum = 0.0;
    let mut points_sum = 0.0;
    let mut diff_sum = 0.0;
    let recent = &history[..form.window.min(history.len())];
    for (rank, (_, _, gf, ga)) in recent.iter().enumerate() {
        let w = 1.0 / (1.0 + rank as f64);
        weight_sum += w;
        points_sum += w * match_points(*gf, *ga) as f64;
        diff_sum += w * (*gf as f64 - *ga as f64);
    }
    let (recent_form, recent_goal_diff) = if weight_sum > 0.0 {
        (points_sum / weight_sum, diff_sum / weight_sum)
    } else {
        (0.0, 0.0)
    };

    TeamStats {
        team: canonical,
        matches_played: total.matches,
        wins: total.wins,
        draws: total.draws,
        losses: total.losses,
        goals_for: total.goals_for,
        goals_against: total.goals_against,
        points: total.points,
        home,
        away,
        recent_form,
        recent_goal_diff,
        form_matches: recent.len() as u32,
        insufficient_data: false,
    }
}

fn goals(cell: &Cell) -> Option<u32> {
    cell.as_i64()
        .or_else(|| cell.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
        .and_then(|g| u32::try_from(g).ok())
}

/// Result from the team's side: `Home` is a win, `Away` a loss.
fn team_outcome(goals_for: u32, goals_against: u32) -> Outcome {
    classify_outcome(i64::from(goals_for), i64::from(goals_against))
}

fn match_points(goals_for: u32, goals_against: u32) -> u32 {
    match team_outcome(goals_for, goals_against) {
        Outcome::Home => 3,
        Outcome::Draw => 1,
        Outcome::Away => 0,
    }
}

fn per_match(total: f64, matches: u32) -> f64 {
    if matches == 0 {
        0.0
    } else {
        total / matches as f64
    }
}
