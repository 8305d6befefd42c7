//! Recombination of two parent genomes.

use evolab_core::Individual;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How a child genome is assembled from two parents.
///
/// Unknown names fall back to [`CrossoverMethod::Uniform`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CrossoverMethod {
    /// Each gene from either parent with equal probability
    #[default]
    Uniform,
    /// Genes before a split from A, the rest from B
    OnePoint,
    /// Middle segment from B, outer segments from A
    TwoPoint,
}

impl CrossoverMethod {
    /// Resolve a method name, falling back to uniform.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().replace(|c: char| c == '-' || c == '_', "").as_str() {
            "onepoint" => Self::OnePoint,
            "twopoint" => Self::TwoPoint,
            _ => Self::Uniform,
        }
    }

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::OnePoint => "onepoint",
            Self::TwoPoint => "twopoint",
        }
    }

    /// Produce one child of `a` and `b`, born into `generation`.
    pub fn crossover<R: Rng + ?Sized>(
        &self,
        a: &Individual,
        b: &Individual,
        generation: u64,
        rng: &mut R,
    ) -> Individual {
        let len = a.genome.len().min(b.genome.len());
        let genome = match self {
            Self::Uniform => (0..len)
                .map(|i| if rng.gen_bool(0.5) { a.genome[i] } else { b.genome[i] })
                .collect(),
            Self::OnePoint => {
                let point = random_point(len, rng);
                one_point(&a.genome, &b.genome, point)
            }
            Self::TwoPoint => {
                let p1 = random_point(len, rng);
                let p2 = random_point(len, rng);
                two_point(&a.genome, &b.genome, p1, p2)
            }
        };
        Individual::with_parents(genome, generation, vec![a.id, b.id])
    }
}

impl From<String> for CrossoverMethod {
    fn from(s: String) -> Self {
        Self::from_name(&s)
    }
}

impl From<CrossoverMethod> for String {
    fn from(m: CrossoverMethod) -> Self {
        m.as_str().to_string()
    }
}

impl std::str::FromStr for CrossoverMethod {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

impl std::fmt::Display for CrossoverMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn random_point<R: Rng + ?Sized>(len: usize, rng: &mut R) -> usize {
    if len == 0 {
        0
    } else {
        rng.gen_range(0..len)
    }
}

/// Genes `[0, point)` from `a`, `[point, len)` from `b`.
///
/// `point` is clamped to the genome length, so `0` yields a copy of `b` and
/// `len` a copy of `a`.
pub fn one_point(a: &[f64], b: &[f64], point: usize) -> Vec<f64> {
    let len = a.len().min(b.len());
    let point = point.min(len);
    a[..point].iter().chain(&b[point..len]).copied().collect()
}

/// Genes `[lo, hi)` from `b`, everything else from `a`. The two points may be
/// given in either order.
pub fn two_point(a: &[f64], b: &[f64], p1: usize, p2: usize) -> Vec<f64> {
    let len = a.len().min(b.len());
    let (lo, hi) = if p1 <= p2 { (p1, p2) } else { (p2, p1) };
    let (lo, hi) = (lo.min(len), hi.min(len));
    (0..len)
        .map(|i| if (lo..hi).contains(&i) { b[i] } else { a[i] })
        .collect()
}
