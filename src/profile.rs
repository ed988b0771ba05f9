use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ProfileError;
use crate::team_stats::{FormRatingConfig, LeagueAverages};

pub const STRENGTH: &str = "strength";
pub const POISSON: &str = "poisson";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormulaFamily {
    /// Logistic on a relative strength score, draw from a bell on the same score.
    Strength,
    /// Attack/defence Poisson grid with the Dixon-Coles low-score correction.
    DixonColes,
}

/// Every constant a prediction formula uses. Profiles are data, so a tuned
/// profile can be saved and reloaded without touching code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    pub name: String,
    pub family: FormulaFamily,
    // Additive on the strength score, multiplicative on the home lambda for DixonColes.
    pub home_advantage: f64,
    pub w_goal_diff: f64,
    pub w_points: f64,
    pub w_form: f64,
    pub k: f64,
    pub draw_weight: f64,
    pub goals_total_base: f64,
    pub league_goals_per_team: f64,
    /// Re-estimate `league_goals_per_team` from the table before predicting.
    #[serde(default)]
    pub calibrate_from_table: bool,
    pub rho: f64,
    pub max_goals: u32,
    pub lambda_min: f64,
    pub lambda_max: f64,
    pub form_factor_min: f64,
    pub form_factor_max: f64,
    /// Matches needed before the form factor applies at full strength.
    pub form_full_weight_matches: f64,
    #[serde(default)]
    pub form_rating: FormRatingConfig,
}

impl ModelProfile {
    pub fn strength() -> Self {
        Self {
            name: STRENGTH.to_string(),
            family: FormulaFamily::Strength,
            home_advantage: 0.20,
            w_goal_diff: 0.50,
            w_points: 0.60,
            w_form: 0.40,
            k: 1.0,
            draw_weight: 0.60,
            goals_total_base: 2.60,
            league_goals_per_team: 1.35,
            calibrate_from_table: false,
            rho: 0.0,
            max_goals: 10,
            lambda_min: 0.20,
            lambda_max: 3.80,
            form_factor_min: 1.0,
            form_factor_max: 1.0,
            form_full_weight_matches: 5.0,
            form_rating: FormRatingConfig::default(),
        }
    }

    pub fn poisson() -> Self {
        Self {
            name: POISSON.to_string(),
            family: FormulaFamily::DixonColes,
            home_advantage: 1.25,
            w_goal_diff: 0.0,
            w_points: 0.0,
            w_form: 0.0,
            k: 0.0,
            draw_weight: 0.0,
            goals_total_base: 2.70,
            league_goals_per_team: 1.35,
            calibrate_from_table: true,
            rho: -0.15,
            max_goals: 10,
            lambda_min: 0.20,
            lambda_max: 3.80,
            form_factor_min: 0.90,
            form_factor_max: 1.10,
            form_full_weight_matches: 5.0,
            form_rating: FormRatingConfig::default(),
        }
    }

    pub fn named(name: &str) -> Result<Self, ProfileError> {
        match name.trim().to_ascii_lowercase().as_str() {
            STRENGTH => Ok(Self::strength()),
            POISSON => Ok(Self::poisson()),
            _ => Err(ProfileError::UnknownProfile(name.trim().to_string())),
        }
    }

    pub fn with_league_goals(mut self, averages: &LeagueAverages) -> Self {
        self.league_goals_per_team = averages.goals_per_team;
        self.goals_total_base = averages.home_goals + averages.away_goals;
        self
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        let finite = [
            self.home_advantage,
            self.w_goal_diff,
            self.w_points,
            self.w_form,
            self.k,
            self.draw_weight,
            self.goals_total_base,
            self.league_goals_per_team,
            self.rho,
            self.lambda_min,
            self.lambda_max,
            self.form_factor_min,
            self.form_factor_max,
            self.form_full_weight_matches,
        ];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err(ProfileError::Invalid(format!(
                "{}: constants must be finite",
                self.name
            )));
        }
        if self.lambda_min <= 0.0 || self.lambda_min > self.lambda_max {
            return Err(ProfileError::Invalid(format!(
                "{}: lambda range [{}, {}]",
                self.name, self.lambda_min, self.lambda_max
            )));
        }
        if self.form_factor_min <= 0.0 || self.form_factor_min > self.form_factor_max {
            return Err(ProfileError::Invalid(format!(
                "{}: form factor range [{}, {}]",
                self.name, self.form_factor_min, self.form_factor_max
            )));
        }
        if self.form_full_weight_matches <= 0.0 {
            return Err(ProfileError::Invalid(format!(
                "{}: form_full_weight_matches must be positive",
                self.name
            )));
        }
        match self.family {
            FormulaFamily::Strength if self.draw_weight < 0.0 => Err(ProfileError::Invalid(
                format!("{}: draw_weight must be non-negative", self.name),
            )),
            FormulaFamily::DixonColes
                if self.league_goals_per_team <= 0.0 || self.home_advantage <= 0.0 =>
            {
                Err(ProfileError::Invalid(format!(
                    "{}: league average and home advantage must be positive",
                    self.name
                )))
            }
            FormulaFamily::DixonColes if self.max_goals == 0 => Err(ProfileError::Invalid(
                format!("{}: max_goals must be at least 1", self.name),
            )),
            _ => Ok(()),
        }
    }
}

impl Default for ModelProfile {
    fn default() -> Self {
        Self::strength()
    }
}

#[derive(Debug, Clone)]
pub struct ProfileConfig {
    pub name: String,
    pub path: Option<PathBuf>,
}

impl ProfileConfig {
    pub fn from_env() -> Self {
        let name = env::var("PREDICTOR_PROFILE")
            .ok()
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| STRENGTH.to_string());
        let path = env::var("PREDICTOR_PROFILE_PATH")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        Self { name, path }
    }

    /// A profile file wins over the built-in name.
    pub fn resolve(&self) -> Result<ModelProfile> {
        if let Some(path) = &self.path {
            return load_profile(path);
        }
        Ok(ModelProfile::named(&self.name)?)
    }
}

pub fn load_profile(path: &Path) -> Result<ModelProfile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read model profile {}", path.display()))?;
    let profile: ModelProfile = serde_json::from_str(&raw)
        .with_context(|| format!("parse model profile {}", path.display()))?;
    profile.validate()?;
    debug!(name = %profile.name, path = %path.display(), "loaded model profile");
    Ok(profile)
}

pub fn save_profile(path: &Path, profile: &ModelProfile) -> Result<()> {
    profile.validate()?;
    if let Some(parent) = path.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            warn!(%err, dir = %parent.display(), "could not create profile directory");
        }
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(profile).context("serialize model profile")?;
    fs::write(&tmp, json).context("write model profile")?;
    fs::rename(&tmp, path).context("swap model profile")?;
    Ok(())
}
