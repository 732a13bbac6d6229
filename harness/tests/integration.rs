//! End-to-end tests driving the sandbox service through the harness

mod common;

use assert_matches::assert_matches;
use futures_util::FutureExt;
use std::path::PathBuf;
use std::time::Duration;

use common::{ProbeFailingService, TestFixtures, TestHelpers};
use harness::{
    EnrichOptions, EventCorrelator, HarnessConfig, HarnessContext, HarnessError, HarnessState,
    TestOutcome,
};
use sandbox::{InMemoryBus, SandboxConfig};
use shared::{Payload, ResultCode, ServiceError, TopicPath, UnitId, UnitRecord};

fn unit(id: u64) -> UnitRecord {
    UnitRecord {
        unitid: UnitId(id),
        number: id,
        scheduler: "force".into(),
        state_string: "finished".into(),
        results: Some(ResultCode::Success),
        started_at: chrono::Utc::now(),
        complete_at: None,
    }
}

fn started(bus: &InMemoryBus, id: u64) {
    bus.publish(TopicPath::unit_started(UnitId(id)), Payload::Unit(unit(id)));
}

fn finished(bus: &InMemoryBus, id: u64) {
    bus.publish(TopicPath::unit_finished(UnitId(id)), Payload::Unit(unit(id)));
}

/// Test that a forced unit completes and carries its steps, logs and properties
#[tokio::test]
async fn test_force_unit_is_enriched() {
    // Arrange
    let service = TestHelpers::default_sandbox();
    let mut ctx = HarnessContext::setup(service.clone(), TestFixtures::harness_config())
        .await
        .unwrap();
    assert_eq!(ctx.state(), HarnessState::Ready);

    // Act
    let unit = ctx.force_unit(EnrichOptions::all()).await.unwrap();

    // Assert
    assert_eq!(unit.unit.results, Some(ResultCode::Success));
    assert_eq!(unit.unit.scheduler, TestFixtures::FORCE_SCHEDULER);
    let steps = unit.steps.as_ref().unwrap();
    assert_eq!(steps.len(), 2);
    for step in steps {
        let logs = step.logs.as_ref().unwrap();
        assert_eq!(logs.len(), 1);
        assert!(!logs[0].content.as_ref().unwrap().content.is_empty());
    }
    let properties = unit.properties.as_ref().unwrap();
    assert_eq!(properties["scheduler"].source, "Scheduler");

    ctx.teardown(TestOutcome::Passed).await.unwrap();
    assert!(!service.is_running().await);
}

/// Test that enrichment only fetches what was asked for
#[tokio::test]
async fn test_force_unit_without_options_is_bare() {
    let service = TestHelpers::default_sandbox();
    let mut ctx = HarnessContext::setup(service, TestFixtures::harness_config())
        .await
        .unwrap();

    let unit = ctx.force_unit(EnrichOptions::none()).await.unwrap();
    assert!(unit.steps.is_none());
    assert!(unit.properties.is_none());

    ctx.teardown(TestOutcome::Passed).await.unwrap();
}

/// Test the state history of a passing run
#[tokio::test]
async fn test_passing_run_history() {
    let service = TestHelpers::default_sandbox();
    let mut ctx = HarnessContext::setup(service, TestFixtures::harness_config())
        .await
        .unwrap();
    ctx.force_unit(EnrichOptions::none()).await.unwrap();

    assert_eq!(
        ctx.history(),
        [
            HarnessState::Unconfigured,
            HarnessState::Starting,
            HarnessState::Ready,
            HarnessState::Active,
        ]
    );
    ctx.teardown(TestOutcome::Passed).await.unwrap();
}

/// Test that setup waits for a change consumer that attaches late
#[tokio::test(start_paused = true)]
async fn test_readiness_waits_for_late_consumer() {
    // Arrange
    TestHelpers::init_tracing();
    let service = TestHelpers::sandbox(TestFixtures::late_consumer(Duration::from_millis(2500)));

    // Act
    let mut ctx = HarnessContext::setup(service.clone(), TestFixtures::harness_config())
        .await
        .unwrap();

    // Assert
    let report = ctx.readiness().unwrap();
    assert!(report.polled);
    assert!(report.ticks >= 3);
    assert_eq!(report.satisfied.len(), 1);
    assert_eq!(report.satisfied[0].0, TestFixtures::CHANGE_CONSUMER);

    let unit = ctx
        .submit_change(TestFixtures::change(), EnrichOptions::none().with_properties())
        .await
        .unwrap();
    assert_eq!(unit.unit.scheduler, TestFixtures::CHANGE_CONSUMER);
    let branch = unit
        .properties
        .as_ref()
        .and_then(|p| p.get("branch"))
        .and_then(|p| p.value.as_str());
    assert_eq!(branch, Some("main"));

    ctx.teardown(TestOutcome::Passed).await.unwrap();
}

/// Test that a service without consumers is ready without polling
#[tokio::test]
async fn test_no_consumers_means_immediate_readiness() {
    let service = TestHelpers::sandbox(TestFixtures::force_only());
    let ctx = HarnessContext::setup(service, TestFixtures::harness_config())
        .await
        .unwrap();

    let report = ctx.readiness().unwrap();
    assert!(!report.polled);
    assert_eq!(report.ticks, 0);

    ctx.teardown(TestOutcome::Passed).await.unwrap();
}

/// Test that readiness gives up after the configured timeout
#[tokio::test(start_paused = true)]
async fn test_readiness_timeout_stops_service() {
    // Arrange
    let service = TestHelpers::sandbox(TestFixtures::late_consumer(Duration::from_secs(3600)));
    let config = HarnessConfig::builder()
        .poll_interval(TestFixtures::POLL_INTERVAL)
        .readiness_timeout(Duration::from_secs(5))
        .build();

    // Act
    let result = HarnessContext::setup(service.clone(), config).await;

    // Assert
    assert_matches!(
        result,
        Err(HarnessError::ReadinessTimeout { pending }) if pending == [TestFixtures::CHANGE_CONSUMER]
    );
    assert!(!service.is_running().await);
}

/// Test that a zero poll interval is refused before the service starts
#[tokio::test(start_paused = true)]
async fn test_zero_poll_interval_rejected_at_setup() {
    // Arrange
    let service = TestHelpers::sandbox(TestFixtures::late_consumer(Duration::from_millis(500)));
    let config = HarnessConfig::builder().poll_interval(Duration::ZERO).build();

    // Act
    let result = HarnessContext::setup(service.clone(), config).await;

    // Assert
    assert_matches!(
        result,
        Err(HarnessError::InvalidConfig { field, .. }) if field == "poll_interval"
    );
    assert!(!service.is_running().await);
}

/// Test that a probe error aborts setup and stops the started service
#[tokio::test]
async fn test_probe_failure_stops_service() {
    let inner = TestHelpers::default_sandbox();
    let service = std::sync::Arc::new(ProbeFailingService::new(inner.clone()));

    let result = HarnessContext::setup(service, TestFixtures::harness_config()).await;

    assert_matches!(
        result,
        Err(HarnessError::ReadinessProbe { listener, source: ServiceError::ProbeFailed { .. } })
            if listener == "broken-consumer"
    );
    assert!(!inner.is_running().await);
}

/// Test that a service which refuses to start fails setup
#[tokio::test]
async fn test_start_failure_is_setup_failure() {
    let service = TestHelpers::default_sandbox();
    shared::ServiceLifecycle::start(service.as_ref()).await.unwrap();

    let result = HarnessContext::setup(service.clone(), TestFixtures::harness_config()).await;

    assert_matches!(result, Err(HarnessError::SetupFailed { .. }));
    assert!(!service.is_running().await);
}

/// Test that a failed test dumps the unit database and still stops the service
#[tokio::test]
async fn test_failed_teardown_dumps_units() {
    // Arrange
    TestHelpers::init_tracing();
    let service = TestHelpers::sandbox(TestFixtures::failing_steps());
    let mut ctx = HarnessContext::setup(service.clone(), TestFixtures::harness_config())
        .await
        .unwrap();
    let unit = ctx.force_unit(EnrichOptions::none()).await.unwrap();
    assert_eq!(unit.unit.results, Some(ResultCode::Failure));

    // Act
    let result = ctx.teardown(TestOutcome::failed("unit did not succeed")).await;

    // Assert
    let err = result.unwrap_err();
    let dump = err.dump().unwrap();
    assert!(dump.starts_with(harness::testing::DUMP_HEADER));
    assert!(dump.contains("*** UNIT 1 *** ==> finished (failure)"));
    assert!(dump.contains("    *** STEP test *** ==> failure (failure)"));
    assert!(dump.contains(&format!("\x1b[31m{}\x1b[0m", TestFixtures::FAILURE_MARKER)));
    assert!(!dump.contains("Updated 3 files"));
    assert!(!service.is_running().await);
}

/// Test that the dump can be switched off
#[tokio::test]
async fn test_failed_teardown_without_dump() {
    let service = TestHelpers::sandbox(TestFixtures::failing_steps());
    let config = HarnessConfig::builder().dump_on_failure(false).build();
    let ctx = HarnessContext::setup(service, config).await.unwrap();

    let err = ctx
        .teardown(TestOutcome::failed("nothing to see"))
        .await
        .unwrap_err();

    assert_matches!(err, HarnessError::TestFailed { ref reason, ref dump } if reason == "nothing to see" && dump.is_empty());
}

/// Test the setup/body/teardown helper on both outcomes
#[tokio::test]
async fn test_run_helper() {
    let passing = HarnessContext::run(
        TestHelpers::default_sandbox(),
        TestFixtures::harness_config(),
        |ctx| {
            async move {
                let unit = ctx.force_unit(EnrichOptions::none()).await?;
                anyhow::ensure!(unit.unit.results == Some(ResultCode::Success), "unit failed");
                Ok(())
            }
            .boxed()
        },
    )
    .await;
    assert!(passing.is_ok());

    let failing = HarnessContext::run(
        TestHelpers::default_sandbox(),
        TestFixtures::harness_config(),
        |_ctx| {
            async move {
                let verdict: anyhow::Result<()> = Err(anyhow::anyhow!("expected three steps"));
                verdict
            }
            .boxed()
        },
    )
    .await;
    assert_matches!(failing, Err(HarnessError::TestFailed { reason, .. }) if reason == "expected three steps");
}

/// Test that the base directory only lives as long as the test
#[tokio::test]
async fn test_basedir_removed_on_teardown() {
    let service = TestHelpers::default_sandbox();
    let ctx = HarnessContext::setup(service, TestFixtures::harness_config())
        .await
        .unwrap();

    let basedir: PathBuf = ctx.basedir().unwrap().to_path_buf();
    assert!(basedir.is_dir());

    ctx.teardown(TestOutcome::Passed).await.unwrap();
    assert!(!basedir.exists());
}

/// Test that a rejected trigger fails without leaking subscriptions
#[tokio::test]
async fn test_unknown_force_scheduler_is_trigger_failure() {
    let service = TestHelpers::default_sandbox();
    let config = HarnessConfig::builder().force_scheduler("nightly").build();
    let mut ctx = HarnessContext::setup(service.clone(), config).await.unwrap();
    let baseline = service.bus().subscriber_count();

    let result = ctx.force_unit(EnrichOptions::none()).await;

    assert_matches!(
        result,
        Err(HarnessError::TriggerFailed { source: ServiceError::UnknownScheduler { .. }, .. })
    );
    assert_eq!(service.bus().subscriber_count(), baseline);
    ctx.teardown(TestOutcome::Passed).await.unwrap();
}

/// Test that dropping a context without teardown still stops the service
#[tokio::test]
async fn test_drop_without_teardown_stops_service() {
    let service = TestHelpers::default_sandbox();
    let ctx = HarnessContext::setup(service.clone(), TestFixtures::harness_config())
        .await
        .unwrap();

    drop(ctx);

    for _ in 0..100 {
        if !service.is_running().await {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(!service.is_running().await);
}

/// Test that correlation ignores stale and concurrent units
#[tokio::test]
async fn test_correlator_matches_first_started_unit() {
    // Arrange
    let bus = InMemoryBus::new();
    let correlator = EventCorrelator::default();
    let publisher = bus.clone();

    // Act
    let unit = correlator
        .trigger_and_wait(&bus, "force", || async move {
            finished(&publisher, 5);
            started(&publisher, 7);
            started(&publisher, 8);
            finished(&publisher, 8);
            finished(&publisher, 7);
            Ok(())
        })
        .await
        .unwrap();

    // Assert
    assert_eq!(unit.unitid, UnitId(7));
    assert_eq!(bus.subscriber_count(), 0);
}

/// Test that a completion received before its start still matches
#[tokio::test]
async fn test_correlator_accepts_finish_before_start() {
    // Arrange
    let bus = InMemoryBus::new();
    let publisher = bus.clone();

    // Act
    let unit = EventCorrelator::default()
        .trigger_and_wait(&bus, "force", || async move {
            finished(&publisher, 3);
            // Runs only once the waiter has drained `finished` and parked
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                started(&publisher, 3);
            });
            Ok(())
        })
        .await
        .unwrap();

    // Assert
    assert_eq!(unit.unitid, UnitId(3));
    assert_eq!(bus.subscriber_count(), 0);
}

/// Test that a failing action releases both subscriptions
#[tokio::test]
async fn test_correlator_trigger_failure_releases_subscriptions() {
    let bus = InMemoryBus::new();

    let result = EventCorrelator::default()
        .trigger_and_wait(&bus, "force", || async {
            Err(ServiceError::TriggerRejected {
                message: "queue full".into(),
            })
        })
        .await;

    assert_matches!(result, Err(HarnessError::TriggerFailed { trigger, .. }) if trigger == "force");
    assert_eq!(bus.subscriber_count(), 0);
}

/// Test that an optional timeout bounds the wait
#[tokio::test(start_paused = true)]
async fn test_correlator_timeout() {
    let bus = InMemoryBus::new();
    let publisher = bus.clone();

    let result = EventCorrelator::default()
        .with_timeout(Some(Duration::from_secs(10)))
        .trigger_and_wait(&bus, "force", || async move {
            started(&publisher, 2);
            Ok(())
        })
        .await;

    assert_matches!(result, Err(HarnessError::CorrelationTimeout { timeout }) if timeout == Duration::from_secs(10));
    assert_eq!(bus.subscriber_count(), 0);
}

/// Test that closing the bus ends the wait
#[tokio::test]
async fn test_correlator_bus_closed() {
    let bus = InMemoryBus::new();
    let publisher = bus.clone();

    let result = EventCorrelator::default()
        .trigger_and_wait(&bus, "force", || async move {
            publisher.close();
            Ok(())
        })
        .await;

    assert_matches!(result, Err(HarnessError::SubscriptionClosed { .. }));
}

/// Test that sandbox defaults stay usable for the harness
#[test]
fn test_default_sandbox_config_is_valid() {
    assert!(SandboxConfig::default().validate().is_ok());
}
