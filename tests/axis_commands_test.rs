//! Integration tests for axis binding and the motion primitives
//!
//! These tests drive an `Axis` against the simulated controller and check
//! which registers were written, not just the returned result.

mod common;

use common::{bind, simulator, AXIS};
use rust_motion_test::axis::{Axis, AxisField};
use rust_motion_test::error::{MotionError, Rejection};
use std::time::Duration;

fn rejection(err: &MotionError) -> Option<Rejection> {
    match err {
        MotionError::Rejected { reason, .. } => Some(*reason),
        _ => None,
    }
}

// =============================================================================
// Preconditions
// =============================================================================

#[tokio::test]
async fn test_not_running_rejects_without_writes() {
    let sim = simulator(-10.0, 10.0, 0.0);
    let axis = bind(&sim).await;
    sim.set_running(false);

    let err = axis.move_absolute(5.0, 10.0).await.unwrap_err();
    assert_eq!(rejection(&err), Some(Rejection::ControllerNotRunning));
    assert!(!axis.is_valid());
    assert_eq!(sim.total_writes(), 0);

    sim.set_running(true);
    axis.move_absolute(5.0, 10.0).await.unwrap();
    assert!(axis.is_valid());
}

#[tokio::test]
async fn test_busy_axis_rejects_second_move() {
    let sim = simulator(-10.0, 10.0, 0.0);
    let axis = bind(&sim).await;

    axis.move_velocity(1.0).await.unwrap();
    let writes = sim.total_writes();
    let err = axis.move_absolute(2.0, 1.0).await.unwrap_err();
    assert_eq!(rejection(&err), Some(Rejection::Busy));
    assert_eq!(sim.total_writes(), writes);

    axis.stop().await.unwrap();
}

#[tokio::test]
async fn test_axis_in_error_rejects_until_reset() {
    let sim = simulator(-10.0, 10.0, 0.0);
    let axis = bind(&sim).await;
    sim.inject_fault(AXIS);

    let err = axis.move_relative(1.0, 5.0).await.unwrap_err();
    assert_eq!(rejection(&err), Some(Rejection::InError));
    assert_eq!(sim.total_writes(), 0);

    axis.reset().await.unwrap();
    assert_eq!(sim.write_count(AXIS, AxisField::Reset), 1);
    axis.move_relative(1.0, 5.0).await.unwrap();
}

#[tokio::test]
async fn test_zero_velocity_never_touches_the_bus() {
    let sim = simulator(-10.0, 10.0, 0.0);
    let axis = bind(&sim).await;

    for err in [
        axis.move_absolute(1.0, 0.0).await.unwrap_err(),
        axis.move_relative(1.0, 0.0).await.unwrap_err(),
        axis.move_velocity(0.0).await.unwrap_err(),
    ] {
        assert_eq!(rejection(&err), Some(Rejection::ZeroVelocity));
    }
    assert_eq!(sim.total_writes(), 0);
    assert_eq!(sim.read_count(), 0);
}

#[tokio::test]
async fn test_unknown_axis_binds_invalid() {
    let sim = simulator(-10.0, 10.0, 0.0);
    let axis = Axis::bind(7, sim.clone(), common::fast_timing()).await;

    assert!(!axis.is_valid());
    let err = axis.stop().await.unwrap_err();
    assert_eq!(rejection(&err), Some(Rejection::AxisInvalid));
    let err = axis.move_velocity(1.0).await.unwrap_err();
    assert_eq!(rejection(&err), Some(Rejection::AxisInvalid));
}

#[tokio::test]
async fn test_rebind_after_reconnect() {
    let sim = simulator(-10.0, 10.0, 0.0);
    sim.set_connected(false);
    let mut axis = Axis::bind(AXIS, sim.clone(), common::fast_timing()).await;
    assert!(!axis.is_valid());

    sim.set_connected(true);
    axis.rebind(sim.clone()).await.unwrap();
    assert!(axis.is_valid());
    axis.move_absolute(1.0, 10.0).await.unwrap();
}

// =============================================================================
// Command writes
// =============================================================================

#[tokio::test]
async fn test_velocity_move_writes_zero_position() {
    let sim = simulator(-10.0, 10.0, 0.0);
    let axis = bind(&sim).await;

    axis.move_velocity(-2.0).await.unwrap();
    assert_eq!(sim.total_writes(), 4);
    for field in [
        AxisField::Command,
        AxisField::Velocity,
        AxisField::Position,
        AxisField::Execute,
    ] {
        assert_eq!(sim.write_count(AXIS, field), 1, "{field:?}");
    }
    let status = axis.status().await.unwrap();
    assert!(status.busy);

    axis.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_is_not_gated_on_state() {
    let sim = simulator(-10.0, 10.0, 0.0);
    let axis = bind(&sim).await;
    sim.inject_fault(AXIS);
    sim.set_running(false);

    axis.stop().await.unwrap();
    assert_eq!(sim.write_count(AXIS, AxisField::Halt), 1);
    assert_eq!(sim.total_writes(), 1);
}

#[tokio::test]
async fn test_disable_then_move_raises_error() {
    let sim = simulator(-10.0, 10.0, 0.0);
    let axis = bind(&sim).await;

    axis.set_enable(false).await.unwrap();
    axis.move_absolute(3.0, 10.0).await.unwrap();
    let status = axis.status().await.unwrap();
    assert!(status.error);
    assert!(!status.busy);

    axis.set_enable(true).await.unwrap();
    axis.reset().await.unwrap();
    axis.move_absolute_and_wait(3.0, 100.0, Some(Duration::from_secs(2)))
        .await
        .unwrap();
    assert_eq!(axis.read_position().await.unwrap(), 3.0);
}

#[tokio::test]
async fn test_position_monitor_refreshes_cache() {
    let sim = simulator(-10.0, 10.0, 0.0);
    let axis = std::sync::Arc::new(bind(&sim).await);
    sim.place_axis(AXIS, 4.5);

    let monitor = axis.spawn_position_monitor(Duration::from_millis(5));
    tokio::time::sleep(Duration::from_millis(40)).await;
    monitor.stop().await;

    assert_eq!(axis.cached_position(), 4.5);
}
