use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::Home, Outcome::Draw, Outcome::Away];

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Home => "home",
            Outcome::Draw => "draw",
            Outcome::Away => "away",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prob3 {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl Prob3 {
    pub fn uniform() -> Self {
        Self {
            home: 1.0 / 3.0,
            draw: 1.0 / 3.0,
            away: 1.0 / 3.0,
        }
    }

    pub fn get(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Home => self.home,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away,
        }
    }

    pub fn sum(&self) -> f64 {
        self.home + self.draw + self.away
    }

    /// Scale to sum 1. Negative or non-finite parts count as zero; an all-zero
    /// input falls back to uniform.
    pub fn normalized(self) -> Self {
        let clean = |v: f64| if v.is_finite() && v > 0.0 { v } else { 0.0 };
        let (h, d, a) = (clean(self.home), clean(self.draw), clean(self.away));
        let sum = h + d + a;
        if sum <= 1e-12 {
            return Self::uniform();
        }
        Self {
            home: h / sum,
            draw: d / sum,
            away: a / sum,
        }
    }

    pub fn argmax(&self) -> Outcome {
        if self.home >= self.draw && self.home >= self.away {
            Outcome::Home
        } else if self.away >= self.draw {
            Outcome::Away
        } else {
            Outcome::Draw
        }
    }
}

pub fn classify_outcome(home_goals: i64, away_goals: i64) -> Outcome {
    if home_goals > away_goals {
        Outcome::Home
    } else if home_goals < away_goals {
        Outcome::Away
    } else {
        Outcome::Draw
    }
}

/// Home/draw/away split of an independent-Poisson scoreline grid with the
/// Dixon-Coles low-score adjustment. `rho = 0` is plain Poisson.
pub fn outcome_probs_poisson_dc(
    lambda_home: f64,
    lambda_away: f64,
    max_goals: u32,
    rho: f64,
) -> Prob3 {
    let home_pmf: Vec<f64> = (0..=max_goals).map(|k| poisson_pmf(k, lambda_home)).collect();
    let away_pmf: Vec<f64> = (0..=max_goals).map(|k| poisson_pmf(k, lambda_away)).collect();

    let mut p_home = 0.0_f64;
    let mut p_draw = 0.0_f64;
    let mut p_away = 0.0_f64;

    for (h, ph) in home_pmf.iter().enumerate() {
        for (a, pa) in away_pmf.iter().enumerate() {
            let tau = dc_tau(h as u32, a as u32, lambda_home, lambda_away, rho);
            let p = (ph * pa * tau).max(0.0);
            if h > a {
                p_home += p;
            } else if h == a {
                p_draw += p;
            } else {
                p_away += p;
            }
        }
    }

    Prob3 {
        home: p_home,
        draw: p_draw,
        away: p_away,
    }
    .normalized()
}

fn dc_tau(home_goals: u32, away_goals: u32, lambda_home: f64, lambda_away: f64, rho: f64) -> f64 {
    match (home_goals, away_goals) {
        (0, 0) => 1.0 - lambda_home * lambda_away * rho,
        (0, 1) => 1.0 + lambda_home * rho,
        (1, 0) => 1.0 + lambda_away * rho,
        (1, 1) => 1.0 - rho,
        _ => 1.0,
    }
}

pub fn poisson_pmf(goals: u32, lambda: f64) -> f64 {
    let numer = lambda.powi(goals as i32) * (-lambda).exp();
    let denom = (1..=goals).fold(1.0_f64, |acc, k| acc * k as f64);
    numer / denom
}

pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}
