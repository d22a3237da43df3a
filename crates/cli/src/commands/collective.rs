//! `agora collective`: Run recon, coordinator, and watchdog for a fixed time.

use std::sync::Arc;
use std::time::Duration;

use agora_agents::{Collective, CollectiveSenses, OperationSummary};
use agora_bus::LocalBus;
use agora_core::{LogSink, MessageLog, MessageLogEntry, TracingSink};
use anyhow::Context;
use tracing::info;

use super::{GlobalOpts, run_for};

pub async fn run(opts: &GlobalOpts, secs: Option<u64>, json: bool) -> anyhow::Result<()> {
    let config = opts.load_config()?;
    let secs = secs.unwrap_or(config.collective.run_secs);
    let bus = LocalBus::new(config.bus.clone());

    let sinks: Vec<Box<dyn LogSink>> = if config.collective.log_messages {
        vec![Box::new(TracingSink)]
    } else {
        Vec::new()
    };
    let log = Arc::new(MessageLog::with_sinks(sinks));

    let senses = CollectiveSenses::random(&config.collective, config.seed);
    let mut collective = Collective::new(&config, senses, None, Some(log.clone()))?;
    collective
        .start(&bus)
        .await
        .context("Failed to start the collective")?;

    info!(secs, "Collective running");
    run_for(Duration::from_secs(secs)).await;
    collective.stop().await;

    let summary = collective.summary();
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
        print_log(&log.entries());
    }
    Ok(())
}

fn print_summary(summary: &OperationSummary) {
    let c = &summary.coordinator;
    println!();
    println!("═══ OPERATION SUMMARY ═══");
    println!("  Targets scanned:     {}", summary.targets_scanned);
    println!("  Operations planned:  {}", c.operations_planned);
    println!("  Targets skipped:     {}", c.targets_skipped);
    println!("  Executed:            {}", c.operations_executed);
    println!("    ✅ Successful:      {}", c.successful_ops);
    println!("    ❌ Failed:          {}", c.failed_ops);
    println!("  Aborted:             {}", c.operations_aborted);
    println!("  ⚠️  Heat alerts:       {}", c.heat_alerts);
    println!("  Heat checks:         {}", summary.watchdog.requests_handled);
    println!("  Watchdog alerts:     {}", summary.watchdog.alerts_sent);
    if let Some(heat) = summary.watchdog.current_heat {
        println!("  Last heat level:     {heat}%");
    }
    println!("  Messages exchanged:  {}", summary.total_messages);
}

fn print_log(entries: &[MessageLogEntry]) {
    if entries.is_empty() {
        return;
    }
    println!();
    println!("═══ MESSAGE LOG ═══");
    for entry in entries {
        println!(
            "  [{}] {} → {} {}: {}",
            entry.timestamp.format("%H:%M:%S%.3f"),
            entry.from,
            entry.to,
            entry.performative,
            entry.summary
        );
    }
}
