//! Subcommand implementations.

use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cimon_core::record::MetricGroup;
use cimon_core::sources::platform_sources;
use cimon_core::{
    CollectionEvent, Dispatcher, SessionConfig, SessionSummary, SourceSchedule, time,
};
use cimon_storage::MetricStore;
use cimon_upload::{UploadConfig, Uploader};

type CliResult = Result<(), Box<dyn Error>>;

/// Default sampling period per group, used when no schedule file is given.
fn default_period_ms(group: MetricGroup) -> u64 {
    match group {
        MetricGroup::Battery | MetricGroup::Location => 60_000,
        MetricGroup::CpuLoad | MetricGroup::Memory | MetricGroup::NetTraffic => 30_000,
        MetricGroup::Accelerometer
        | MetricGroup::Gyroscope
        | MetricGroup::Magnetometer
        | MetricGroup::LinearAcceleration
        | MetricGroup::Orientation => 100,
        MetricGroup::Screen => 0,
        MetricGroup::SmsLog
        | MetricGroup::MmsLog
        | MetricGroup::CallLog
        | MetricGroup::BrowserHistory => 60_000,
    }
}

pub fn sources() -> CliResult {
    println!(
        "{:<20} {:<9} {:>8} {:>11}  {}",
        "Source", "Kind", "Metrics", "Supported", "Description"
    );
    println!("{}", "-".repeat(78));
    for mut source in platform_sources() {
        let info = source.info();
        let supported = source.init(default_period_ms(info.group).max(1));
        println!(
            "{:<20} {:<9} {:>8} {:>11}  {}",
            info.group.name(),
            info.kind.to_string(),
            info.metrics.len(),
            if supported { "yes" } else { "no" },
            info.description,
        );
    }
    Ok(())
}

fn load_schedules(path: Option<&str>) -> Result<Vec<SourceSchedule>, Box<dyn Error>> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&text)?)
        }
        None => Ok(platform_sources()
            .iter()
            .map(|source| SourceSchedule {
                group: source.group(),
                period_ms: default_period_ms(source.group()),
                duration_ms: None,
            })
            .collect()),
    }
}

pub fn run(
    db: &str,
    schedule_path: Option<&str>,
    duration_secs: Option<u64>,
    batch_size: usize,
    tick_ms: u64,
) -> CliResult {
    let store = Arc::new(MetricStore::open(Path::new(db))?);

    let mut dispatcher = Dispatcher::new(store.clone(), store.clone());
    for source in platform_sources() {
        dispatcher.add_source(source)?;
    }

    let config = SessionConfig {
        schedules: load_schedules(schedule_path)?,
        batch_threshold: batch_size,
        ..Default::default()
    };
    let monitor = dispatcher.start_session(&config)?;

    // Declared schema and probed support, refreshed at session start.
    for status in dispatcher.source_statuses() {
        store.upsert_schema(status.info, status.supported)?;
    }

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))?;
    }

    println!("collecting into {db} (monitor {monitor}); Ctrl-C to stop");
    let started = time::uptime_ms();
    let tick = Duration::from_millis(tick_ms.max(10));
    loop {
        dispatcher.on_event(&CollectionEvent::poll_tick(time::uptime_ms()));
        if stop.load(Ordering::SeqCst) {
            break;
        }
        if let Some(secs) = duration_secs {
            if time::uptime_ms().saturating_sub(started) >= secs * 1000 {
                break;
            }
        }
        std::thread::sleep(tick);
    }

    let summary = dispatcher.stop_session()?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &SessionSummary) {
    println!("\n{}", "=".repeat(64));
    println!("SESSION SUMMARY — monitor {}", summary.monitor);
    println!("{}", "=".repeat(64));
    println!("Duration: {:.1}s", summary.duration_ms as f64 / 1000.0);
    println!(
        "\n{:<20} {:>8} {:>9} {:>6} {:>9}",
        "Source", "Events", "Records", "Fail", "Rate"
    );
    println!("{}", "-".repeat(58));
    for s in &summary.sources {
        let rate = s
            .observed_hz
            .map(|hz| format!("{hz:.2}/s"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<20} {:>8} {:>9} {:>6} {:>9}",
            s.group.name(),
            s.events_routed,
            s.records_produced,
            s.failures,
            rate
        );
    }
}

pub fn upload(
    db: &str,
    endpoint: &str,
    device_id: &str,
    window: usize,
    repeat_secs: Option<u64>,
) -> CliResult {
    let store = Arc::new(MetricStore::open(Path::new(db))?);
    let uploader = Uploader::new(
        store,
        UploadConfig {
            endpoint: endpoint.to_string(),
            device_id: device_id.to_string(),
            window,
        },
    )?;

    let mut total = 0usize;
    loop {
        let sent = uploader.run_once()?;
        total += sent;
        println!("uploaded {sent} rows ({total} total)");
        match repeat_secs {
            Some(secs) if sent > 0 => std::thread::sleep(Duration::from_secs(secs)),
            _ => break,
        }
    }
    Ok(())
}
