//! Gene-wise perturbation.

use evolab_core::Individual;
use rand::Rng;

/// Adds a bounded uniform perturbation to each gene with probability `rate`,
/// then clamps the gene back into `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mutator {
    /// Per-gene mutation probability
    pub rate: f64,
    /// Maximum absolute perturbation
    pub amount: f64,
}

impl Mutator {
    /// Create a mutator.
    pub fn new(rate: f64, amount: f64) -> Self {
        Self {
            rate: rate.clamp(0.0, 1.0),
            amount: amount.abs(),
        }
    }

    /// Mutate `individual` in place. Returns how many genes were perturbed.
    pub fn mutate<R: Rng + ?Sized>(&self, individual: &mut Individual, rng: &mut R) -> usize {
        let mut mutated = 0;
        for gene in individual.genome.iter_mut() {
            if rng.gen::<f64>() < self.rate {
                let delta = rng.gen_range(-self.amount..=self.amount);
                *gene = (*gene + delta).clamp(0.0, 1.0);
                mutated += 1;
            }
        }
        mutated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_zero_rate_leaves_genome_untouched() {
        let mut ind = Individual::new(vec![0.2, 0.4, 0.6], 0);
        let before = ind.genome.clone();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(Mutator::new(0.0, 0.5).mutate(&mut ind, &mut rng), 0);
        assert_eq!(ind.genome, before);
    }

    #[test]
    fn test_full_rate_stays_within_bounds() {
        let mut ind = Individual::new(vec![0.0, 0.05, 0.5, 0.95, 1.0], 0);
        let before = ind.genome.clone();
        let mut rng = StdRng::seed_from_u64(2);
        let mutator = Mutator::new(1.0, 0.1);

        assert_eq!(mutator.mutate(&mut ind, &mut rng), 5);
        for (old, new) in before.iter().zip(&ind.genome) {
            assert!((0.0..=1.0).contains(new));
            assert!((new - old).abs() <= 0.1 + 1e-12);
        }
    }

    #[test]
    fn test_large_amount_is_clamped() {
        let mut rng = StdRng::seed_from_u64(3);
        let mutator = Mutator::new(1.0, 10.0);
        for _ in 0..100 {
            let mut ind = Individual::new(vec![0.5; 4], 0);
            mutator.mutate(&mut ind, &mut rng);
            assert!(ind.genome.iter().all(|g| (0.0..=1.0).contains(g)));
        }
    }
}
