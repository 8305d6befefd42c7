//! evolab CLI - evolutionary optimization and knowledge transfer.

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use evolab_core::{AgentId, Individual, KnowledgePayload};
use evolab_evolution::EvolutionaryOptimizer;
use evolab_knowledge::{KnowledgeRegistry, KnowledgeTransferBroker, MergeStrategy};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::LabConfig;

#[derive(Parser)]
#[command(name = "evolab")]
#[command(about = "Evolutionary optimization and knowledge transfer lab", long_about = None)]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evolve a population that maximizes its mean gene value
    Evolve {
        /// Number of generations
        #[arg(long, default_value = "10")]
        generations: usize,
        /// JSON config file
        #[arg(long)]
        config: Option<PathBuf>,
        /// RNG seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Merge one agent's knowledge file into another's
    Transfer {
        /// Source payload (JSON)
        #[arg(long)]
        source: PathBuf,
        /// Target payload (JSON)
        #[arg(long)]
        target: PathBuf,
        /// replace | weighted | max | average
        #[arg(long)]
        strategy: Option<String>,
        /// Source share for the weighted strategy
        #[arg(long)]
        weight: Option<f64>,
        /// Minimum compatibility score
        #[arg(long)]
        threshold: Option<f64>,
        /// JSON config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Evolve { generations, config, seed } => {
            let config = LabConfig::load_or_default(config.as_deref())?;
            run_evolve(config, generations, seed)
        }
        Commands::Transfer { source, target, strategy, weight, threshold, config } => {
            let mut options = LabConfig::load_or_default(config.as_deref())?.transfer;
            if let Some(strategy) = strategy {
                options.merge_strategy = MergeStrategy::from_name(&strategy);
            }
            if let Some(weight) = weight {
                options.merge_weight = weight;
            }
            if let Some(threshold) = threshold {
                options.compatibility_threshold = threshold;
            }

            let broker = KnowledgeTransferBroker::new(Arc::new(KnowledgeRegistry::new()));
            let (source_id, target_id) = (agent_id(&source), agent_id(&target));
            if source_id == target_id {
                bail!("source and target resolve to the same agent id '{source_id}'");
            }
            broker.register_knowledge(source_id.clone(), read_payload(&source)?, None);
            broker.register_knowledge(target_id.clone(), read_payload(&target)?, None);

            let outcome = broker.transfer_knowledge(&source_id, &target_id, &options);
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if outcome.success {
                let record = broker.registry().require(&target_id)?;
                println!("{}", serde_json::to_string_pretty(&record.knowledge)?);
            }
            Ok(())
        }
    }
}

/// Benchmark fitness: mean gene value, so the optimum is all ones.
fn mean_gene(individual: &Individual) -> f64 {
    if individual.genome.is_empty() {
        return 0.0;
    }
    individual.genome.iter().sum::<f64>() / individual.genome.len() as f64
}

fn run_evolve(config: LabConfig, generations: usize, seed: Option<u64>) -> Result<()> {
    let mut optimizer = match seed {
        Some(seed) => EvolutionaryOptimizer::with_seed(config.evolution, mean_gene, seed)?,
        None => EvolutionaryOptimizer::new(config.evolution, mean_gene)?,
    };

    let run = optimizer.evolve_multiple(generations)?;
    println!("{:>10} {:>6} {:>10} {:>10}", "generation", "size", "best", "average");
    for result in &run.results {
        println!(
            "{:>10} {:>6} {:>10.4} {:>10.4}",
            result.generation, result.population_size, result.best_fitness, result.average_fitness
        );
    }

    if let Some(best) = &run.best_individual {
        info!(id = %best.id, fitness = best.fitness, "Best individual");
        let genes: Vec<String> = best.genome.iter().map(|g| format!("{g:.3}")).collect();
        println!("best {} fitness {:.4} genome [{}]", best.id, best.fitness, genes.join(", "));
    }
    Ok(())
}

/// Agent id from the payload file's stem.
fn agent_id(path: &Path) -> AgentId {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    AgentId::new(stem)
}

fn read_payload(path: &Path) -> Result<KnowledgePayload> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    KnowledgePayload::from_value(value)
        .with_context(|| format!("invalid knowledge payload in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_gene() {
        assert_eq!(mean_gene(&Individual::new(vec![0.0, 1.0, 0.5, 0.5], 0)), 0.5);
        assert_eq!(mean_gene(&Individual::new(vec![], 0)), 0.0);
    }

    #[test]
    fn test_agent_id_from_file_stem() {
        assert_eq!(agent_id(Path::new("/tmp/agents/scout.json")), AgentId::from("scout"));
    }

    #[test]
    fn test_read_payload_rejects_untagged_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.json");
        std::fs::write(&path, r#"{ "qTable": {} }"#).unwrap();
        assert!(read_payload(&path).is_err());

        std::fs::write(&path, r#"{ "type": "tabular", "qTable": { "s0": { "a": 1.0 } } }"#).unwrap();
        assert!(read_payload(&path).unwrap().has_kind());
    }
}
