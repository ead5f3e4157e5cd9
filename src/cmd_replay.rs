//! Replay subcommand: drive the engine from recorded inputs.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info};

use harvester_config::HarvesterConfig;
use harvester_core::{
    topics, AppendLog, ContextEngine, Event, LogSlot, ManualFrames, MemoryDocument,
    MetricsSnapshot, Node, Section, Snapshot,
};
use harvester_extractor_product_detail::ProductDetailExtractor;

/// Receives one output line per published event.
pub(crate) type LineSink = Arc<dyn Fn(String) + Send + Sync>;

/// Final state of a replay.
pub(crate) struct ReplayOutcome {
    pub snapshot: Snapshot,
    pub metrics: MetricsSnapshot,
    pub fully_ready: bool,
}

/// Handle `harvester replay`.
pub(crate) fn handle_replay(
    config: &HarvesterConfig,
    log: &Path,
    document: &Path,
    print_metrics: bool,
) -> Result<()> {
    let log_text = std::fs::read_to_string(log)
        .with_context(|| format!("Failed to read log {}", log.display()))?;
    let document_text = std::fs::read_to_string(document)
        .with_context(|| format!("Failed to read document {}", document.display()))?;

    let sink: LineSink = Arc::new(|line| println!("{line}"));
    let outcome = replay(config, &log_text, &document_text, sink)?;

    println!(
        "{}",
        json!({ "event": "snapshot", "snapshot": outcome.snapshot })
    );
    if print_metrics {
        println!(
            "{}",
            json!({ "event": "metrics", "metrics": outcome.metrics })
        );
    }
    if !outcome.fully_ready {
        info!("Replay finished before all sections were ready");
    }
    Ok(())
}

/// Parse newline-delimited JSON records. Blank lines are skipped.
pub(crate) fn parse_log(text: &str) -> Result<Vec<JsonValue>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("Invalid JSON on log line {}", index + 1))
        })
        .collect()
}

/// Run the recorded inputs through a fresh engine stepped by [`ManualFrames`].
pub(crate) fn replay(
    config: &HarvesterConfig,
    log_text: &str,
    document_text: &str,
    sink: LineSink,
) -> Result<ReplayOutcome> {
    let records = parse_log(log_text)?;
    let root: Node =
        serde_json::from_str(document_text).context("Document is not a valid node tree")?;

    let log = AppendLog::new();
    let frames = ManualFrames::new();
    let engine = ContextEngine::builder()
        .config(config.engine.clone())
        .frames(frames.clone())
        .document(MemoryDocument::new(root))
        .log_slot(LogSlot::with_log(log.clone()))
        .extractor(Arc::new(ProductDetailExtractor::new()))
        .build()?;

    let mut topic_names = vec![topics::UPDATED.to_string(), topics::FULLY_READY.to_string()];
    topic_names.extend(Section::ALL.iter().map(|section| topics::section_ready(*section)));
    let subscriptions: Vec<_> = topic_names
        .into_iter()
        .map(|topic| {
            let sink = sink.clone();
            engine.subscribe(topic, move |event: &Event| {
                sink(serde_json::to_string(event)?);
                Ok(())
            })
        })
        .collect();

    engine.start()?;
    let max_frames = config.replay.max_frames;
    frames.run_until_idle(max_frames);

    let total = records.len();
    for record in records {
        log.push_one(record);
        if config.replay.frame_per_record {
            frames.run_until_idle(max_frames);
        }
    }
    let drained = frames.run_until_idle(max_frames);
    debug!(records = total, drained, "Replay drained");

    let outcome = ReplayOutcome {
        snapshot: engine.read(),
        metrics: engine.metrics(),
        fully_ready: engine.is_fully_ready(),
    };
    for subscription in &subscriptions {
        subscription.unsubscribe();
    }
    engine.dispose();
    Ok(outcome)
}
