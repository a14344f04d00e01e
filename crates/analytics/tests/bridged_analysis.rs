use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tradechat_analytics::{InsightKind, MarketEngine};
use tradechat_core::{AppConfig, PollStatus, TaskBridge};

fn write_source(dir: &std::path::Path) {
    let mut lines = Vec::new();
    for minute in 0..9 {
        lines.push(format!(
            r#"{{"timestamp": "2025-01-01 10:{minute:02}:00", "operation": "WTS", "item": "iron lump", "price": "1c"}}"#
        ));
    }
    lines.push(
        r#"{"timestamp": "2025-01-01 10:30:00", "operation": "WTS", "item": "iron lump", "price": "5c"}"#
            .to_string(),
    );
    lines.push(r#"{"operation": "WTS", "item": "casket of rare things", "price": "1g"}"#.to_string());
    lines.push("not even json".to_string());
    fs::write(dir.join("trade.log"), lines.join("\n")).unwrap();
}

#[test]
fn test_engine_detects_anomaly_through_bridge() {
    let dir = TempDir::new().unwrap();
    let logs = dir.path().join("logs");
    fs::create_dir_all(&logs).unwrap();
    write_source(&logs);

    let mut config = AppConfig::default();
    config.data.cache_dir = dir.path().join("cache");
    let engine = Arc::new(MarketEngine::from_config(config, Some(&logs), false).unwrap());
    assert_eq!(engine.raw().len(), 11);
    assert_eq!(engine.cleaned().len(), 10);

    let bridge = TaskBridge::new("analytics-test");
    let worker_engine = Arc::clone(&engine);
    let results = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&results);

    let mut poll = bridge
        .submit(move |_cancel| Ok(worker_engine.detect_anomalies()))
        .into_poller(
            move |insights| sink.lock().unwrap().extend(insights),
            Some(|e| panic!("analysis failed: {e}")),
        );

    let mut status = poll();
    for _ in 0..500 {
        if status == PollStatus::Finished {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
        status = poll();
    }

    assert_eq!(status, PollStatus::Finished);
    let insights = results.lock().unwrap();
    assert_eq!(insights.len(), 1);
    assert_eq!(insights[0].item, "iron lump");
    assert_eq!(insights[0].classification, InsightKind::Alert);
}
