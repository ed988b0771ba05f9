use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aliases::TeamNames;
use crate::error::PredictError;
use crate::probability::{Outcome, Prob3, outcome_probs_poisson_dc, sigmoid};
use crate::profile::{FormulaFamily, ModelProfile};
use crate::team_stats::{TeamStats, form_rating};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
    /// (home, away) expected goals.
    pub expected_goals: (f64, f64),
    pub profile: String,
}

impl PredictionResult {
    fn from_probs(p: Prob3, expected_goals: (f64, f64), profile: &str) -> Self {
        Self {
            home: p.home,
            draw: p.draw,
            away: p.away,
            expected_goals,
            profile: profile.to_string(),
        }
    }

    pub fn probs(&self) -> Prob3 {
        Prob3 {
            home: self.home,
            draw: self.draw,
            away: self.away,
        }
    }

    pub fn probability(&self, outcome: Outcome) -> f64 {
        self.probs().get(outcome)
    }

    pub fn most_likely(&self) -> Outcome {
        self.probs().argmax()
    }

    /// Copy with every number rounded to `decimals` places. Display only.
    pub fn rounded(&self, decimals: u32) -> Self {
        let scale = 10f64.powi(decimals as i32);
        let r = |v: f64| (v * scale).round() / scale;
        Self {
            home: r(self.home),
            draw: r(self.draw),
            away: r(self.away),
            expected_goals: (r(self.expected_goals.0), r(self.expected_goals.1)),
            profile: self.profile.clone(),
        }
    }

    /// Percentages to one decimal that add up to exactly 100.
    pub fn percentages(&self) -> Prob3 {
        let r = |v: f64| (v * 1000.0).round() / 10.0;
        let home = r(self.home);
        let away = r(self.away);
        // Rounding residue goes into the draw.
        let draw = ((100.0 - home - away) * 10.0).round() / 10.0;
        Prob3 { home, draw, away }
    }

    pub fn confidence(&self) -> Confidence {
        let top = self.home.max(self.draw).max(self.away);
        if top >= 0.7 {
            Confidence::High
        } else if top >= 0.5 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

pub fn predict(
    home: &TeamStats,
    away: &TeamStats,
    profile: &ModelProfile,
) -> Result<PredictionResult, PredictError> {
    if TeamNames::default_football().same_team(&home.team, &away.team) {
        return Err(PredictError::SameTeam(home.team.clone()));
    }
    for side in [home, away] {
        if side.insufficient_data {
            return Err(PredictError::InsufficientData {
                team: side.team.clone(),
            });
        }
    }

    let (probs, expected_goals) = match profile.family {
        FormulaFamily::Strength => strength_model(home, away, profile),
        FormulaFamily::DixonColes => dixon_coles_model(home, away, profile),
    };
    debug!(
        home = %home.team,
        away = %away.team,
        profile = %profile.name,
        lambda_home = expected_goals.0,
        lambda_away = expected_goals.1,
        "predicted fixture"
    );
    Ok(PredictionResult::from_probs(
        probs,
        expected_goals,
        &profile.name,
    ))
}

/// Mixes model and no-vig market probabilities; `weight` is the model's share.
pub fn blend_with_market(
    prediction: &PredictionResult,
    market: &Prob3,
    weight: f64,
) -> PredictionResult {
    let w = if weight.is_finite() {
        weight.clamp(0.0, 1.0)
    } else {
        1.0
    };
    let m = market.normalized();
    let mixed = Prob3 {
        home: w * prediction.home + (1.0 - w) * m.home,
        draw: w * prediction.draw + (1.0 - w) * m.draw,
        away: w * prediction.away + (1.0 - w) * m.away,
    }
    .normalized();
    PredictionResult::from_probs(mixed, prediction.expected_goals, &prediction.profile)
}

fn strength_model(home: &TeamStats, away: &TeamStats, p: &ModelProfile) -> (Prob3, (f64, f64)) {
    let s = p.home_advantage
        + p.w_goal_diff * (home.goal_difference_per_match() - away.goal_difference_per_match())
        + p.w_points * (home.points_per_match() - away.points_per_match())
        + p.w_form * (home.recent_form - away.recent_form);
    let x = p.k * s;

    let probs = Prob3 {
        home: sigmoid(x),
        draw: p.draw_weight * (-(x * x) / 2.0).exp(),
        away: sigmoid(-x),
    }
    .normalized();

    let lambda_home = ((p.goals_total_base / 2.0) + (s / 2.0)).clamp(p.lambda_min, p.lambda_max);
    let lambda_away = ((p.goals_total_base / 2.0) - (s / 2.0)).clamp(p.lambda_min, p.lambda_max);
    (probs, (lambda_home, lambda_away))
}

fn dixon_coles_model(home: &TeamStats, away: &TeamStats, p: &ModelProfile) -> (Prob3, (f64, f64)) {
    let avg = p.league_goals_per_team;
    let attack_home = home.goals_for_per_match() / avg;
    let defence_home = home.goals_against_per_match() / avg;
    let attack_away = away.goals_for_per_match() / avg;
    let defence_away = away.goals_against_per_match() / avg;

    let lambda_home = (avg * attack_home * defence_away * p.home_advantage * form_factor(home, p))
        .clamp(p.lambda_min, p.lambda_max);
    let lambda_away =
        (avg * attack_away * defence_home * form_factor(away, p)).clamp(p.lambda_min, p.lambda_max);

    let probs = outcome_probs_poisson_dc(lambda_home, lambda_away, p.max_goals, p.rho);
    (probs, (lambda_home, lambda_away))
}

/// Form rating mapped into the profile's factor range, pulled toward 1 when
/// the form window is short.
fn form_factor(stats: &TeamStats, p: &ModelProfile) -> f64 {
    let rating = form_rating(stats, &p.form_rating).rating;
    let raw = p.form_factor_min + (rating / 10.0) * (p.form_factor_max - p.form_factor_min);
    let weight = (stats.form_matches as f64 / p.form_full_weight_matches)
        .sqrt()
        .min(1.0);
    1.0 + (raw - 1.0) * weight
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::{Confidence, PredictionResult, blend_with_market, predict};
    use crate::error::PredictError;
    use crate::probability::{Outcome, Prob3};
    use crate::profile::ModelProfile;
    use crate::team_stats::TeamStats;

    fn team(name: &str, w: u32, d: u32, l: u32, gf: u32, ga: u32, form: f64) -> TeamStats {
        let mut s = TeamStats::empty(name);
        s.matches_played = w + d + l;
        s.wins = w;
        s.draws = d;
        s.losses = l;
        s.goals_for = gf;
        s.goals_against = ga;
        s.points = 3 * w + d;
        s.recent_form = form;
        s.recent_goal_diff = (gf as f64 - ga as f64) / s.matches_played as f64;
        s.form_matches = s.matches_played.min(5);
        s.insufficient_data = false;
        s
    }

    #[test]
    fn both_profiles_produce_distributions() {
        let strong = team("Strong", 8, 1, 1, 25, 8, 2.6);
        let weak = team("Weak", 1, 2, 7, 7, 22, 0.4);
        for profile in [ModelProfile::strength(), ModelProfile::poisson()] {
            let r = predict(&strong, &weak, &profile).unwrap();
            assert_relative_eq!(r.home + r.draw + r.away, 1.0, epsilon = 1e-6);
            for v in [r.home, r.draw, r.away] {
                assert!((0.0..=1.0).contains(&v));
            }
            assert!(r.home > r.away, "{}: {r:?}", profile.name);
            assert_eq!(r.most_likely(), Outcome::Home);
            assert_eq!(r.profile, profile.name);
        }
    }

    #[test]
    fn home_advantage_breaks_symmetry() {
        let a = team("A", 3, 3, 3, 10, 10, 1.3);
        let b = team("B", 3, 3, 3, 10, 10, 1.3);
        let r = predict(&a, &b, &ModelProfile::strength()).unwrap();
        assert!(r.home > r.away);
        assert!(r.expected_goals.0 > r.expected_goals.1);
    }

    #[test]
    fn expected_goals_are_clamped() {
        let strong = team("Strong", 10, 0, 0, 60, 0, 3.0);
        let weak = team("Weak", 0, 0, 10, 0, 60, 0.0);
        let profile = ModelProfile::poisson();
        let r = predict(&strong, &weak, &profile).unwrap();
        assert_relative_eq!(r.expected_goals.0, profile.lambda_max);
        assert_relative_eq!(r.expected_goals.1, profile.lambda_min);
    }

    #[test]
    fn insufficient_data_fails_without_partial_result() {
        let a = team("A", 3, 3, 3, 10, 10, 1.3);
        let empty = TeamStats::empty("Nobody");
        assert_eq!(
            predict(&a, &empty, &ModelProfile::strength()),
            Err(PredictError::InsufficientData {
                team: "Nobody".to_string()
            })
        );
    }

    #[test]
    fn same_team_is_rejected() {
        let a = team("Man Utd", 3, 3, 3, 10, 10, 1.3);
        let b = team("Manchester United", 3, 3, 3, 10, 10, 1.3);
        assert!(matches!(
            predict(&a, &b, &ModelProfile::strength()),
            Err(PredictError::SameTeam(_))
        ));
    }

    #[test]
    fn presentation_helpers() {
        let r = PredictionResult {
            home: 0.45678,
            draw: 0.27777,
            away: 0.26545,
            expected_goals: (1.56789, 1.01234),
            profile: "strength".to_string(),
        };
        let rounded = r.rounded(3);
        assert_eq!(rounded.home, 0.457);
        assert_eq!(rounded.expected_goals.0, 1.568);
        let pct = r.percentages();
        assert_relative_eq!(pct.sum(), 100.0, epsilon = 1e-9);
        assert_eq!(pct.home, 45.7);
        assert_eq!(r.confidence(), Confidence::Low);
    }

    #[test]
    fn blend_moves_toward_market() {
        let r = PredictionResult {
            home: 0.6,
            draw: 0.25,
            away: 0.15,
            expected_goals: (1.8, 0.9),
            profile: "strength".to_string(),
        };
        let market = Prob3 {
            home: 0.4,
            draw: 0.3,
            away: 0.3,
        };
        let mixed = blend_with_market(&r, &market, 0.5);
        assert_relative_eq!(mixed.home, 0.5, epsilon = 1e-12);
        assert_relative_eq!(mixed.away, 0.225, epsilon = 1e-12);
        let model_only = blend_with_market(&r, &market, 1.0);
        assert_relative_eq!(model_only.home, 0.6, epsilon = 1e-12);
    }
}
