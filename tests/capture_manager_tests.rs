// Capture manager tests
//
// Time is paused in these tests so the recording limit elapses instantly.

mod common;

use anyhow::Result;
use common::ScriptedDevice;
use interview_coach::capture::{
    CaptureConfig, CaptureEvent, CaptureManager, CaptureState, StopReason,
};
use interview_coach::error::CaptureError;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Collect capture events until `done` matches one
async fn collect_until(
    mut events: broadcast::Receiver<CaptureEvent>,
    done: impl Fn(&CaptureEvent) -> bool,
) -> Vec<CaptureEvent> {
    let mut seen = Vec::new();
    loop {
        match events.recv().await {
            Ok(event) => {
                let finished = done(&event);
                seen.push(event);
                if finished {
                    return seen;
                }
            }
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => return seen,
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_auto_stop_at_max_duration() -> Result<()> {
    let (device, _counters) = ScriptedDevice::new();
    let device = device.frames(Duration::from_secs(1), 16);
    let mut manager = CaptureManager::new(device.boxed(), CaptureConfig::default())?;

    manager.request_permission().await?;
    let events = manager.subscribe();
    manager.start_recording().await?;

    let seen = collect_until(events, |e| {
        matches!(e, CaptureEvent::StateChanged(CaptureState::Stopped(_)))
    })
    .await;

    let warnings: Vec<_> = seen
        .iter()
        .filter_map(|e| match e {
            CaptureEvent::ApproachingLimit {
                elapsed_secs,
                remaining_secs,
            } => Some((*elapsed_secs, *remaining_secs)),
            _ => None,
        })
        .collect();
    assert_eq!(warnings, vec![(570, 30)]);

    assert!(seen.contains(&CaptureEvent::MaxDurationReached { duration_secs: 600 }));
    let last_tick = seen
        .iter()
        .filter_map(|e| match e {
            CaptureEvent::Tick { elapsed_secs, .. } => Some(*elapsed_secs),
            _ => None,
        })
        .max();
    assert_eq!(last_tick, Some(600));

    assert_eq!(
        manager.state(),
        CaptureState::Stopped(StopReason::MaxDurationReached)
    );

    let artifact = manager.stop_recording().await?;
    assert_eq!(artifact.duration, Duration::from_secs(600));
    assert_eq!(artifact.stop_reason, StopReason::MaxDurationReached);
    assert!(artifact.max_time_reached());
    assert!(!artifact.is_empty());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_user_stop_before_limit() -> Result<()> {
    let (device, counters) = ScriptedDevice::new();
    let mut manager = CaptureManager::new(device.boxed(), CaptureConfig::default())?;

    manager.request_permission().await?;
    let mut events = manager.subscribe();
    manager.start_recording().await?;

    tokio::time::sleep(Duration::from_secs(5)).await;
    let artifact = manager.stop_recording().await?;

    assert_eq!(artifact.stop_reason, StopReason::UserStopped);
    assert!(!artifact.max_time_reached());
    let secs = artifact.duration_secs();
    assert!((4.0..=6.0).contains(&secs), "unexpected duration {}", secs);
    assert!(!artifact.audio.is_empty());
    assert_eq!(artifact.audio_mime, "audio/wav");

    assert_eq!(manager.state(), CaptureState::Stopped(StopReason::UserStopped));
    assert_eq!(counters.stops(), 1);

    while let Ok(event) = events.try_recv() {
        assert!(!matches!(event, CaptureEvent::ApproachingLimit { .. }));
    }

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_warning_fires_once_with_short_limit() -> Result<()> {
    let (device, _counters) = ScriptedDevice::new();
    let config = CaptureConfig {
        max_duration_secs: 10,
        warning_threshold_secs: 3,
        ..Default::default()
    };
    let mut manager = CaptureManager::new(device.boxed(), config)?;

    manager.request_permission().await?;
    let events = manager.subscribe();
    manager.start_recording().await?;

    let seen = collect_until(events, |e| {
        matches!(e, CaptureEvent::StateChanged(CaptureState::Stopped(_)))
    })
    .await;

    let warnings = seen
        .iter()
        .filter(|e| matches!(e, CaptureEvent::ApproachingLimit { .. }))
        .count();
    assert_eq!(warnings, 1);
    assert!(seen.contains(&CaptureEvent::ApproachingLimit {
        elapsed_secs: 7,
        remaining_secs: 3
    }));

    let artifact = manager.stop_recording().await?;
    assert_eq!(artifact.duration, Duration::from_secs(10));

    Ok(())
}

#[tokio::test]
async fn test_permission_denied_then_retry() -> Result<()> {
    let (device, counters) = ScriptedDevice::new();
    let device = device.deny_once("user declined");
    let mut manager = CaptureManager::new(device.boxed(), CaptureConfig::default())?;

    let err = manager.request_permission().await.unwrap_err();
    assert_eq!(err, CaptureError::PermissionDenied("user declined".to_string()));
    assert_eq!(
        manager.state(),
        CaptureState::PermissionDenied("user declined".to_string())
    );

    // Recording is impossible without permission
    assert!(matches!(
        manager.start_recording().await,
        Err(CaptureError::InvalidState { .. })
    ));

    manager.request_permission().await?;
    assert_eq!(manager.state(), CaptureState::Ready);
    assert_eq!(
        counters
            .permission_requests
            .load(std::sync::atomic::Ordering::SeqCst),
        2
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_device_fault_aborts_attempt() -> Result<()> {
    let (device, _counters) = ScriptedDevice::new();
    let device = device.fault_after(3);
    let mut manager = CaptureManager::new(device.boxed(), CaptureConfig::default())?;

    manager.request_permission().await?;
    let events = manager.subscribe();
    manager.start_recording().await?;

    let seen = collect_until(events, |e| matches!(e, CaptureEvent::Aborted { .. })).await;
    assert!(seen.contains(&CaptureEvent::Aborted {
        reason: "microphone unplugged".to_string()
    }));
    assert_eq!(manager.state(), CaptureState::Ready);

    // The failed attempt yields no artifact
    assert!(matches!(
        manager.stop_recording().await,
        Err(CaptureError::Device(_))
    ));

    // A fresh attempt can start from Ready
    manager.start_recording().await?;
    assert_eq!(manager.state(), CaptureState::Recording);
    assert_eq!(manager.reset().await, CaptureState::Ready);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_reset_discards_and_allows_rerecording() -> Result<()> {
    let (device, _counters) = ScriptedDevice::new();
    let mut manager = CaptureManager::new(device.boxed(), CaptureConfig::default())?;

    manager.request_permission().await?;
    manager.start_recording().await?;
    tokio::time::sleep(Duration::from_secs(2)).await;
    manager.stop_recording().await?;

    assert_eq!(manager.reset().await, CaptureState::Ready);
    assert!(matches!(
        manager.stop_recording().await,
        Err(CaptureError::InvalidState { .. })
    ));

    manager.start_recording().await?;
    tokio::time::sleep(Duration::from_secs(1)).await;
    let artifact = manager.stop_recording().await?;
    assert_eq!(artifact.stop_reason, StopReason::UserStopped);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_releases_device() -> Result<()> {
    let (device, counters) = ScriptedDevice::new();
    let mut manager = CaptureManager::new(device.boxed(), CaptureConfig::default())?;

    manager.request_permission().await?;
    manager.start_recording().await?;
    tokio::time::sleep(Duration::from_secs(2)).await;

    manager.shutdown().await;

    assert_eq!(manager.state(), CaptureState::Idle);
    assert_eq!(counters.stops(), 1);
    assert_eq!(counters.releases(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_drop_mid_recording_releases_device() -> Result<()> {
    let (device, counters) = ScriptedDevice::new();
    let mut manager = CaptureManager::new(device.boxed(), CaptureConfig::default())?;

    manager.request_permission().await?;
    manager.start_recording().await?;
    tokio::time::sleep(Duration::from_secs(1)).await;

    drop(manager);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(counters.releases(), 1);

    Ok(())
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let (device, _counters) = ScriptedDevice::new();
    let config = CaptureConfig {
        max_duration_secs: 30,
        warning_threshold_secs: 30,
        ..Default::default()
    };

    assert!(matches!(
        CaptureManager::new(device.boxed(), config),
        Err(CaptureError::Config(_))
    ));
}
