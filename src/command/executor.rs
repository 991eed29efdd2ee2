//! Command execution pipeline.
//!
//! Every execution makes one attempt: breaker gate, pool admission, then
//! `run()` on a detached task bounded by the command timeout. The outcome is
//! fed to the breaker before any fallback runs, so a slow fallback never
//! delays the breaker's view of the dependency.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::command::error::{BoxError, ExecutionError, NoFallback, RejectionReason};
use crate::command::{Command, CommandKeys, CommandRegistry};
use crate::config::{CommandSettings, ConfigProvider};
use crate::resilience::{run_detached, DetachError, Outcome};

/// The queued execution's deadline passed before it got a slot.
#[derive(Debug, thiserror::Error)]
#[error("execution abandoned before start")]
struct Abandoned;

/// Everything known about one finished execution.
#[derive(Debug)]
pub struct ExecutionReport<T> {
    /// Outcome of the primary attempt.
    pub outcome: Outcome,
    /// Whether `result` came from the fallback.
    pub from_fallback: bool,
    pub elapsed: Duration,
    /// Why the fallback was used. Only set when the fallback succeeded; on
    /// fallback failure the cause travels inside the error.
    pub cause: Option<ExecutionError>,
    pub result: Result<T, ExecutionError>,
}

/// Runs commands against the shared per-key state.
#[derive(Clone)]
pub struct CommandExecutor {
    registry: Arc<CommandRegistry>,
    config: Arc<dyn ConfigProvider>,
}

impl CommandExecutor {
    pub fn new(registry: Arc<CommandRegistry>, config: Arc<dyn ConfigProvider>) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &Arc<dyn ConfigProvider> {
        &self.config
    }

    /// Run `command`, falling back on any non-success outcome.
    pub async fn execute<C: Command>(&self, command: Arc<C>) -> Result<C::Output, ExecutionError> {
        self.execute_report(command).await.result
    }

    pub async fn execute_report<C: Command>(&self, command: Arc<C>) -> ExecutionReport<C::Output> {
        let started = Instant::now();
        let keys = command.keys().clone();
        let settings = self.config.command(keys.command());
        let metrics = self.registry.metrics(&keys);
        let breaker = self.registry.breaker(keys.command());

        let attempt = match breaker.try_acquire(&settings.circuit_breaker) {
            None => Err(ExecutionError::Rejected {
                command: keys.command().to_string(),
                reason: RejectionReason::CircuitOpen,
            }),
            Some(permit) => {
                let result = self.run_isolated(&command, &keys, &settings).await;
                let outcome = result.as_ref().map_or_else(ExecutionError::outcome, |_| Outcome::Success);
                permit.record(outcome, &settings.circuit_breaker);
                result
            }
        };

        let outcome = attempt.as_ref().map_or_else(ExecutionError::outcome, |_| Outcome::Success);
        metrics.record(outcome);
        metrics.record_latency(started.elapsed());

        let cause = match attempt {
            Ok(value) => {
                return ExecutionReport {
                    outcome,
                    from_fallback: false,
                    elapsed: started.elapsed(),
                    cause: None,
                    result: Ok(value),
                }
            }
            Err(cause) => cause,
        };

        tracing::debug!(
            command = %keys.command(),
            outcome = outcome.as_str(),
            error = %cause,
            "Command did not succeed, trying fallback"
        );

        match command.fallback().await {
            Ok(value) => {
                metrics.record_fallback(true);
                ExecutionReport {
                    outcome,
                    from_fallback: true,
                    elapsed: started.elapsed(),
                    cause: Some(cause),
                    result: Ok(value),
                }
            }
            Err(fallback) => {
                if !fallback.is::<NoFallback>() {
                    metrics.record_fallback(false);
                    tracing::warn!(command = %keys.command(), error = %fallback, "Fallback failed");
                }
                ExecutionReport {
                    outcome,
                    from_fallback: false,
                    elapsed: started.elapsed(),
                    cause: None,
                    result: Err(ExecutionError::FallbackFailed {
                        command: keys.command().to_string(),
                        cause: Box::new(cause),
                        fallback,
                    }),
                }
            }
        }
    }

    async fn run_isolated<C: Command>(
        &self,
        command: &Arc<C>,
        keys: &CommandKeys,
        settings: &CommandSettings,
    ) -> Result<C::Output, ExecutionError> {
        let pool = self.registry.pool(keys.pool());
        let admission = pool
            .try_admit(self.config.pool(keys.pool()))
            .map_err(|_| ExecutionError::Rejected {
                command: keys.command().to_string(),
                reason: RejectionReason::PoolSaturated,
            })?;

        let abandoned = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&abandoned);
        let command = Arc::clone(command);
        let work = async move {
            let _slot = admission.ready().await;
            if flag.load(Ordering::Acquire) {
                return Err(BoxError::from(Abandoned));
            }
            command.run().await
        };

        match run_detached(settings.timeout(), work).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(ExecutionError::RunFailure {
                command: keys.command().to_string(),
                source,
            }),
            Err(DetachError::TimedOut(after)) => {
                abandoned.store(true, Ordering::Release);
                Err(ExecutionError::Timeout {
                    command: keys.command().to_string(),
                    after,
                })
            }
            Err(DetachError::Panicked(message)) => Err(ExecutionError::RunFailure {
                command: keys.command().to_string(),
                source: message.into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BreakerSettings, PoolSettings};
    use crate::resilience::CircuitState;
    use std::sync::atomic::AtomicUsize;

    struct FixedConfig {
        command: CommandSettings,
        pool: PoolSettings,
    }

    impl ConfigProvider for FixedConfig {
        fn command(&self, _: &str) -> CommandSettings {
            self.command.clone()
        }

        fn pool(&self, _: &str) -> PoolSettings {
            self.pool
        }
    }

    fn executor(timeout_ms: u64, pool: PoolSettings) -> CommandExecutor {
        let config = FixedConfig {
            command: CommandSettings {
                timeout_ms,
                circuit_breaker: BreakerSettings {
                    request_volume_threshold: 3,
                    ..BreakerSettings::default()
                },
            },
            pool,
        };
        CommandExecutor::new(Arc::new(CommandRegistry::new()), Arc::new(config))
    }

    enum Behavior {
        Succeed,
        Fail,
        Sleep(Duration),
    }

    struct Probe {
        keys: CommandKeys,
        behavior: Behavior,
        fallback: Option<&'static str>,
        broken_fallback: bool,
        runs: Arc<AtomicUsize>,
    }

    impl Probe {
        fn new(behavior: Behavior, fallback: Option<&'static str>) -> Self {
            Self {
                keys: CommandKeys::new("Group", "Probe", "Pool").unwrap(),
                behavior,
                fallback,
                broken_fallback: false,
                runs: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Command for Probe {
        type Output = String;

        fn keys(&self) -> &CommandKeys {
            &self.keys
        }

        async fn run(&self) -> Result<String, BoxError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Succeed => Ok("primary".into()),
                Behavior::Fail => Err("backend down".into()),
                Behavior::Sleep(d) => {
                    tokio::time::sleep(d).await;
                    Ok("late".into())
                }
            }
        }

        async fn fallback(&self) -> Result<String, BoxError> {
            if self.broken_fallback {
                return Err("fallback down".into());
            }
            match self.fallback {
                Some(v) => Ok(v.to_string()),
                None => Err(NoFallback.into()),
            }
        }
    }

    #[tokio::test]
    async fn test_success_skips_fallback() {
        let exec = executor(1000, PoolSettings::default());
        let report = exec.execute_report(Arc::new(Probe::new(Behavior::Succeed, Some("fb")))).await;
        assert_eq!(report.outcome, Outcome::Success);
        assert!(!report.from_fallback);
        assert_eq!(report.result.unwrap(), "primary");
    }

    #[tokio::test]
    async fn test_failure_uses_fallback_and_keeps_cause() {
        let exec = executor(1000, PoolSettings::default());
        let report = exec.execute_report(Arc::new(Probe::new(Behavior::Fail, Some("fb")))).await;
        assert_eq!(report.outcome, Outcome::Failure);
        assert!(report.from_fallback);
        assert_eq!(report.result.unwrap(), "fb");
        let cause = report.cause.unwrap();
        assert_eq!(cause.run_error().unwrap().to_string(), "backend down");
    }

    #[tokio::test]
    async fn test_missing_fallback_surfaces_fallback_failed() {
        let exec = executor(1000, PoolSettings::default());
        let err = exec
            .execute(Arc::new(Probe::new(Behavior::Fail, None)))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::FallbackFailed { .. }));
        assert_eq!(err.outcome(), Outcome::Failure);

        let counts = exec.registry().metrics(&CommandKeys::new("Group", "Probe", "Pool").unwrap()).counts();
        assert_eq!(counts.failure_count, 1);
        assert_eq!(counts.fallback_failure_count, 0);
    }

    #[tokio::test]
    async fn test_failing_fallback_keeps_both_errors() {
        let exec = executor(1000, PoolSettings::default());
        let command = Probe {
            broken_fallback: true,
            ..Probe::new(Behavior::Fail, Some("fb"))
        };
        let err = exec.execute(Arc::new(command)).await.unwrap_err();
        match &err {
            ExecutionError::FallbackFailed { cause, fallback, .. } => {
                assert!(matches!(**cause, ExecutionError::RunFailure { .. }));
                assert_eq!(fallback.to_string(), "fallback down");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.run_error().unwrap().to_string(), "backend down");

        let counts = exec.registry().metrics(&CommandKeys::new("Group", "Probe", "Pool").unwrap()).counts();
        assert_eq!(counts.failure_count, 1);
        assert_eq!(counts.fallback_failure_count, 1);
        assert_eq!(counts.fallback_success_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_rejected_half_open_call_reopens_circuit() {
        let exec = executor(
            60_000,
            PoolSettings {
                max_concurrency: 1,
                queue_size: 0,
            },
        );
        let failing = Arc::new(Probe::new(Behavior::Fail, Some("fb")));
        for _ in 0..3 {
            exec.execute(Arc::clone(&failing)).await.unwrap();
        }
        assert_eq!(exec.registry().breaker("Probe").state(), CircuitState::Open);

        // Another command on the same pool holds the only slot.
        let holder = Arc::new(Probe {
            keys: CommandKeys::new("Group", "Holder", "Pool").unwrap(),
            ..Probe::new(Behavior::Sleep(Duration::from_secs(30)), Some("fb"))
        });
        let _held = {
            let exec = exec.clone();
            tokio::spawn(async move { exec.execute_report(holder).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(exec.registry().pool("Pool").active(), 1);

        tokio::time::advance(Duration::from_millis(5000)).await;
        let report = exec.execute_report(Arc::clone(&failing)).await;
        assert_eq!(report.outcome, Outcome::Rejected);
        assert_eq!(report.result.unwrap(), "fb");
        assert_eq!(failing.runs.load(Ordering::SeqCst), 3);
        assert_eq!(exec.registry().breaker("Probe").state(), CircuitState::Open);

        // The sleep window starts over from the rejection.
        tokio::time::advance(Duration::from_millis(4999)).await;
        let report = exec.execute_report(Arc::clone(&failing)).await;
        assert_eq!(report.outcome, Outcome::ShortCircuited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_returns_at_deadline() {
        let exec = executor(100, PoolSettings::default());
        let started = Instant::now();
        let report = exec
            .execute_report(Arc::new(Probe::new(
                Behavior::Sleep(Duration::from_millis(200)),
                Some("fb"),
            )))
            .await;
        assert_eq!(report.outcome, Outcome::Timeout);
        assert_eq!(report.result.unwrap(), "fb");
        assert_eq!(started.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_saturation_rejects_extra_call() {
        let exec = executor(
            1000,
            PoolSettings {
                max_concurrency: 1,
                queue_size: 0,
            },
        );
        let slow = Arc::new(Probe::new(Behavior::Sleep(Duration::from_millis(500)), Some("fb")));

        let first = {
            let exec = exec.clone();
            let slow = Arc::clone(&slow);
            tokio::spawn(async move { exec.execute_report(slow).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = exec.execute_report(Arc::clone(&slow)).await;
        assert_eq!(second.outcome, Outcome::Rejected);
        assert_eq!(second.result.unwrap(), "fb");

        let first = first.await.unwrap();
        assert_eq!(first.outcome, Outcome::Success);
        assert_eq!(slow.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_call_abandoned_on_timeout_never_runs() {
        let exec = executor(
            100,
            PoolSettings {
                max_concurrency: 1,
                queue_size: 1,
            },
        );
        let slow = Arc::new(Probe::new(Behavior::Sleep(Duration::from_millis(300)), Some("fb")));

        let first = {
            let exec = exec.clone();
            let slow = Arc::clone(&slow);
            tokio::spawn(async move { exec.execute_report(slow).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let queued = exec.execute_report(Arc::clone(&slow)).await;
        assert_eq!(queued.outcome, Outcome::Timeout);
        assert_eq!(first.await.unwrap().outcome, Outcome::Timeout);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(slow.runs.load(Ordering::SeqCst), 1);
        assert_eq!(exec.registry().pool("Pool").active(), 0);
        assert_eq!(exec.registry().pool("Pool").queued(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_short_circuits_without_running() {
        let exec = executor(1000, PoolSettings::default());
        let failing = Arc::new(Probe::new(Behavior::Fail, Some("fb")));
        for _ in 0..3 {
            exec.execute(Arc::clone(&failing)).await.unwrap();
        }
        assert_eq!(exec.registry().breaker("Probe").state(), CircuitState::Open);

        let report = exec.execute_report(Arc::clone(&failing)).await;
        assert_eq!(report.outcome, Outcome::ShortCircuited);
        assert_eq!(report.result.unwrap(), "fb");
        assert_eq!(failing.runs.load(Ordering::SeqCst), 3);
    }
}
