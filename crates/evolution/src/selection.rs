//! Parent selection strategies.

use evolab_core::Individual;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How parents are drawn from the current population.
///
/// Unknown names fall back to [`SelectionMethod::Tournament`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SelectionMethod {
    /// Best of `tournament_size` uniform draws with replacement
    #[default]
    Tournament,
    /// Fitness-proportionate
    Roulette,
    /// Proportionate to rank weight `size - index`
    Rank,
}

impl SelectionMethod {
    /// Resolve a method name, falling back to tournament.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "roulette" => Self::Roulette,
            "rank" => Self::Rank,
            _ => Self::Tournament,
        }
    }

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tournament => "tournament",
            Self::Roulette => "roulette",
            Self::Rank => "rank",
        }
    }

    /// Draw `count` parents from `population`.
    ///
    /// Returns an empty vector when the population is empty.
    pub fn select<'a, R: Rng + ?Sized>(
        &self,
        population: &'a [Individual],
        count: usize,
        tournament_size: usize,
        rng: &mut R,
    ) -> Vec<&'a Individual> {
        if population.is_empty() {
            return Vec::new();
        }

        match self {
            Self::Tournament => (0..count)
                .map(|_| tournament(population, tournament_size, rng))
                .collect(),
            Self::Roulette => {
                let weights: Vec<f64> = population.iter().map(|ind| ind.fitness.max(0.0)).collect();
                (0..count)
                    .map(|_| &population[weighted_index(&weights, rng)])
                    .collect()
            }
            Self::Rank => {
                let mut ranked: Vec<&Individual> = population.iter().collect();
                ranked.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
                let n = ranked.len();
                let weights: Vec<f64> = (0..n).map(|i| (n - i) as f64).collect();
                (0..count)
                    .map(|_| ranked[weighted_index(&weights, rng)])
                    .collect()
            }
        }
    }
}

impl From<String> for SelectionMethod {
    fn from(s: String) -> Self {
        Self::from_name(&s)
    }
}

impl From<SelectionMethod> for String {
    fn from(m: SelectionMethod) -> Self {
        m.as_str().to_string()
    }
}

impl std::str::FromStr for SelectionMethod {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

impl std::fmt::Display for SelectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keep the fittest of `size` uniform draws; the first one seen wins ties.
fn tournament<'a, R: Rng + ?Sized>(
    population: &'a [Individual],
    size: usize,
    rng: &mut R,
) -> &'a Individual {
    let mut best = &population[rng.gen_range(0..population.len())];
    for _ in 1..size.max(1) {
        let candidate = &population[rng.gen_range(0..population.len())];
        if candidate.fitness > best.fitness {
            best = candidate;
        }
    }
    best
}

/// Walk `weights` until the running total passes a uniform cursor in
/// `[0, total)`. Falls back to the last index when nothing is reached.
pub(crate) fn weighted_index<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> usize {
    let total: f64 = weights.iter().sum();
    let cursor = rng.gen::<f64>() * total;
    pick_at(weights, cursor)
}

fn pick_at(weights: &[f64], cursor: f64) -> usize {
    let mut acc = 0.0;
    for (i, w) in weights.iter().enumerate() {
        acc += w;
        if acc > cursor {
            return i;
        }
    }
    weights.len().saturating_sub(1)
}
