//! Survivor selection: who makes it into the next generation.

use evolab_core::Individual;
use serde::{Deserialize, Serialize};

/// Policy for building the next population from the current one plus
/// offspring.
///
/// Unknown names fall back to [`SurvivorMethod::Elitism`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SurvivorMethod {
    /// Top `elitism_rate` of the current population, rest from top offspring
    #[default]
    Elitism,
    /// Offspring only
    Replacement,
    /// Best of current and offspring pooled together
    Mixed,
}

impl SurvivorMethod {
    /// Resolve a method name, falling back to elitism.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "replacement" => Self::Replacement,
            "mixed" => Self::Mixed,
            _ => Self::Elitism,
        }
    }

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Elitism => "elitism",
            Self::Replacement => "replacement",
            Self::Mixed => "mixed",
        }
    }

    /// Pick exactly `size` survivors, provided `current` and `offspring`
    /// together hold at least that many individuals.
    ///
    /// When the method's own pool runs short, the best remaining individuals
    /// from the other source top it up.
    pub fn select(
        &self,
        current: Vec<Individual>,
        offspring: Vec<Individual>,
        size: usize,
        elitism_rate: f64,
    ) -> Vec<Individual> {
        let mut current = sorted_desc(current);
        let mut offspring = sorted_desc(offspring);

        let mut survivors = match self {
            Self::Elitism => {
                let elites = ((elitism_rate * current.len() as f64).floor() as usize)
                    .min(current.len())
                    .min(size);
                let mut survivors: Vec<Individual> = current.drain(..elites).collect();
                let take = (size - survivors.len()).min(offspring.len());
                survivors.extend(offspring.drain(..take));
                survivors
            }
            Self::Replacement => {
                let take = size.min(offspring.len());
                offspring.drain(..take).collect()
            }
            Self::Mixed => {
                let mut pooled = current;
                pooled.append(&mut offspring);
                current = Vec::new();
                let mut pooled = sorted_desc(pooled);
                pooled.truncate(size);
                pooled
            }
        };

        if survivors.len() < size {
            let mut leftovers = current;
            leftovers.append(&mut offspring);
            let leftovers = sorted_desc(leftovers);
            let missing = size - survivors.len();
            survivors.extend(leftovers.into_iter().take(missing));
        }
        survivors
    }
}

impl From<String> for SurvivorMethod {
    fn from(s: String) -> Self {
        Self::from_name(&s)
    }
}

impl From<SurvivorMethod> for String {
    fn from(m: SurvivorMethod) -> Self {
        m.as_str().to_string()
    }
}

impl std::str::FromStr for SurvivorMethod {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

impl std::fmt::Display for SurvivorMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable sort, highest fitness first.
fn sorted_desc(mut individuals: Vec<Individual>) -> Vec<Individual> {
    individuals.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
    individuals
}
