//! Pipeline benchmark over synthetic corpora.
//!
//! Times a forced recompute, a cache hit and a message search per round
//! with the keyword fixture embedder, so the numbers cover grouping,
//! linkage, labeling and caching rather than model inference.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use clap::{Parser, ValueEnum};
use serde::Serialize;

use clustergraph_orchestrator::SearchFilters;
use e2e_tests::{synthetic_messages, KeywordEmbedder, TestHarness};

#[derive(Parser, Debug)]
#[command(name = "perf_bench", about = "Time the clustergraph pipeline on synthetic chat")]
struct Args {
    /// Corpus size
    #[arg(long, value_enum, default_value = "small")]
    corpus: Corpus,
    /// Timed rounds per phase
    #[arg(long, default_value_t = 3)]
    rounds: usize,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Write `<corpus>.json` into this directory
    #[arg(long)]
    report_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Serialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Corpus {
    Small,
    Medium,
    Large,
}

impl Corpus {
    fn name(self) -> &'static str {
        match self {
            Corpus::Small => "small",
            Corpus::Medium => "medium",
            Corpus::Large => "large",
        }
    }

    fn conversations(self) -> usize {
        match self {
            Corpus::Small => 20,
            Corpus::Medium => 80,
            Corpus::Large => 300,
        }
    }

    fn max_conversation_len(self) -> usize {
        match self {
            Corpus::Small => 5,
            Corpus::Medium => 8,
            Corpus::Large => 10,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    Cold,
    Warm,
    Search,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::Cold => "cold",
            Phase::Warm => "warm",
            Phase::Search => "search",
        }
    }
}

#[derive(Debug, Serialize)]
struct PhaseSummary {
    rounds: usize,
    median_ms: f64,
    worst_ms: f64,
    messages_per_second: f64,
}

impl PhaseSummary {
    fn from_timings(timings: &[Duration], messages: usize) -> Self {
        let mut ms: Vec<f64> = timings.iter().map(|d| d.as_secs_f64() * 1e3).collect();
        ms.sort_by(f64::total_cmp);
        let median_ms = ms.get(ms.len() / 2).copied().unwrap_or(0.0);
        let throughput = if median_ms > 0.0 {
            messages as f64 * 1e3 / median_ms
        } else {
            0.0
        };
        Self {
            rounds: ms.len(),
            median_ms,
            worst_ms: ms.last().copied().unwrap_or(0.0),
            messages_per_second: throughput,
        }
    }
}

#[derive(Debug, Serialize)]
struct Report {
    corpus: Corpus,
    messages: usize,
    topics: usize,
    started_at: String,
    phases: BTreeMap<&'static str, PhaseSummary>,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let args = Args::parse();
    let corpus = synthetic_messages(
        args.seed,
        args.corpus.conversations(),
        args.corpus.max_conversation_len(),
    );
    let started_at = Utc::now().to_rfc3339();

    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator(Arc::new(KeywordEmbedder::new(0.05)));

    let mut timings: BTreeMap<Phase, Vec<Duration>> = BTreeMap::new();
    let mut topics = 0;
    for _ in 0..args.rounds {
        for (phase, force) in [(Phase::Cold, true), (Phase::Warm, false)] {
            let clock = Instant::now();
            let output = orchestrator
                .process_messages(corpus.clone(), force, None, None)
                .await
                .map_err(|e| format!("{} pass failed: {e}", phase.name()))?;
            timings.entry(phase).or_default().push(clock.elapsed());
            topics = output.metadata.total_topics;

            if phase == Phase::Warm {
                let clock = Instant::now();
                orchestrator
                    .search(
                        "deploy failing",
                        &output.messages_with_tags,
                        &SearchFilters::default(),
                        10,
                    )
                    .await
                    .map_err(|e| format!("search failed: {e}"))?;
                timings.entry(Phase::Search).or_default().push(clock.elapsed());
            }
        }
    }

    let report = Report {
        corpus: args.corpus,
        messages: corpus.len(),
        topics,
        started_at,
        phases: timings
            .iter()
            .map(|(phase, t)| (phase.name(), PhaseSummary::from_timings(t, corpus.len())))
            .collect(),
    };

    println!("{:<8}{:>12}{:>12}{:>14}", "phase", "median_ms", "worst_ms", "msgs/s");
    for (name, summary) in &report.phases {
        println!(
            "{:<8}{:>12.2}{:>12.2}{:>14.0}",
            name, summary.median_ms, summary.worst_ms, summary.messages_per_second
        );
    }

    let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
    match &args.report_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| format!("{}: {e}", dir.display()))?;
            let path = dir.join(format!("{}.json", args.corpus.name()));
            std::fs::write(&path, json).map_err(|e| format!("{}: {e}", path.display()))?;
        }
        None => println!("{json}"),
    }
    Ok(())
}
