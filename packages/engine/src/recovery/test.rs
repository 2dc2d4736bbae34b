// Recovery Tests
//
// Tests for classification, strategy selection, backoff and the breaker.

#[cfg(test)]
mod tests {
    use crate::config::RecoveryConfig;
    use crate::error::EngineError;
    use crate::recovery::*;
    use std::io;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn io_error(kind: io::ErrorKind) -> EngineError {
        EngineError::io(Path::new("src/a.tsx"), io::Error::from(kind))
    }

    fn fast_config() -> RecoveryConfig {
        RecoveryConfig {
            base_delay_ms: 1,
            max_delay_ms: 4,
            ..RecoveryConfig::default()
        }
    }

    mod classify_tests {
        use super::*;

        #[test]
        fn should_classify_typed_variants_first() {
            assert_eq!(
                classify(&io_error(io::ErrorKind::PermissionDenied)),
                ErrorCategory::Permission
            );
            assert_eq!(classify(&io_error(io::ErrorKind::NotFound)), ErrorCategory::Io);
            assert_eq!(classify(&io_error(io::ErrorKind::TimedOut)), ErrorCategory::Timeout);
            assert_eq!(
                classify(&io_error(io::ErrorKind::ConnectionReset)),
                ErrorCategory::Network
            );
            let integrity = EngineError::Integrity {
                path: "x".into(),
                expected: "a".into(),
                actual: "b".into(),
            };
            assert_eq!(classify(&integrity), ErrorCategory::DataIntegrity);
            assert_eq!(
                classify(&EngineError::validation("tree", "bad output")),
                ErrorCategory::Validation
            );
        }

        #[test]
        fn should_route_disk_full_to_capacity() {
            let error = EngineError::io(Path::new("a"), io::Error::from_raw_os_error(28));
            assert!(matches!(error, EngineError::Capacity { .. }));
            assert_eq!(classify(&error), ErrorCategory::Capacity);
        }

        #[test]
        fn should_fall_back_to_message_patterns() {
            assert_eq!(classify_message("ENOSPC: no space left"), ErrorCategory::Capacity);
            assert_eq!(classify_message("gzip stream ended early"), ErrorCategory::Compression);
            assert_eq!(classify_message("failed to decrypt payload"), ErrorCategory::Crypto);
            assert_eq!(classify_message("socket hang up"), ErrorCategory::Network);
            assert_eq!(classify_message("something odd"), ErrorCategory::Unknown);
            assert_eq!(
                classify(&EngineError::Backup("checksum mismatch".into())),
                ErrorCategory::DataIntegrity
            );
        }

        #[test]
        fn should_map_severity() {
            assert_eq!(ErrorCategory::Validation.severity(), Severity::Low);
            assert_eq!(ErrorCategory::Io.severity(), Severity::Medium);
            assert_eq!(ErrorCategory::Permission.severity(), Severity::High);
            assert_eq!(ErrorCategory::DataIntegrity.severity(), Severity::Critical);
        }
    }

    mod strategy_tests {
        use super::*;

        #[test]
        fn should_pair_primary_and_secondary() {
            let io = plan_for(ErrorCategory::Io);
            assert_eq!(io.primary, RecoveryStrategy::Retry { max_attempts: 3 });
            assert_eq!(
                io.secondary,
                RecoveryStrategy::Fallback {
                    action: FallbackAction::AlternateLocation
                }
            );
            assert_eq!(plan_for(ErrorCategory::Validation).primary, RecoveryStrategy::Skip);
            assert_eq!(
                plan_for(ErrorCategory::Permission).secondary,
                RecoveryStrategy::ManualIntervention
            );
            assert_eq!(
                plan_for(ErrorCategory::Memory).primary,
                RecoveryStrategy::Fallback {
                    action: FallbackAction::Stream
                }
            );
        }

        #[test]
        fn should_double_and_cap_backoff() {
            let backoff = Backoff::new(100, 1000);
            assert_eq!(backoff.base_delay(0), Duration::from_millis(100));
            assert_eq!(backoff.base_delay(1), Duration::from_millis(200));
            assert_eq!(backoff.base_delay(2), Duration::from_millis(400));
            assert_eq!(backoff.base_delay(10), Duration::from_millis(1000));
            assert_eq!(backoff.base_delay(200), Duration::from_millis(1000));
        }

        #[test]
        fn should_keep_jitter_within_bounds() {
            let backoff = Backoff::new(100, 1000);
            for _ in 0..50 {
                let delay = backoff.delay(1);
                assert!(delay >= Duration::from_millis(200));
                assert!(delay <= Duration::from_millis(250));
            }
            assert!(backoff.delay(8) <= Duration::from_millis(1000));
        }
    }

    mod breaker_tests {
        use super::*;

        fn breaker() -> CircuitBreaker {
            CircuitBreaker::new(
                ErrorCategory::Io,
                5,
                Duration::from_secs(30),
                Duration::from_secs(300),
            )
        }

        #[test]
        fn should_open_on_threshold_failure() {
            let start = Instant::now();
            let mut breaker = breaker();
            for i in 0..4 {
                assert!(breaker.try_acquire(start));
                breaker.record_failure(start + Duration::from_millis(i));
                assert_eq!(breaker.state(), BreakerState::Closed);
            }
            assert!(breaker.try_acquire(start));
            breaker.record_failure(start + Duration::from_millis(5));
            assert_eq!(breaker.state(), BreakerState::Open);
            assert!(!breaker.try_acquire(start + Duration::from_secs(1)));
        }

        #[test]
        fn should_admit_exactly_one_trial_after_timeout() {
            let start = Instant::now();
            let mut breaker = breaker();
            for _ in 0..5 {
                breaker.record_failure(start);
            }
            let later = start + Duration::from_secs(31);
            assert!(breaker.try_acquire(later));
            assert_eq!(breaker.state(), BreakerState::HalfOpen);
            assert!(!breaker.try_acquire(later));
            assert!(!breaker.try_acquire(later + Duration::from_millis(1)));
        }

        #[test]
        fn should_close_after_successful_trial() {
            let start = Instant::now();
            let mut breaker = breaker();
            for _ in 0..5 {
                breaker.record_failure(start);
            }
            let later = start + Duration::from_secs(31);
            assert!(breaker.try_acquire(later));
            breaker.record_success(later);
            assert_eq!(breaker.state(), BreakerState::Closed);
            assert_eq!(breaker.failure_count(), 0);
            assert!(breaker.try_acquire(later));
        }

        #[test]
        fn should_reopen_after_failed_trial() {
            let start = Instant::now();
            let mut breaker = breaker();
            for _ in 0..5 {
                breaker.record_failure(start);
            }
            let later = start + Duration::from_secs(31);
            assert!(breaker.try_acquire(later));
            breaker.record_failure(later);
            assert_eq!(breaker.state(), BreakerState::Open);
            assert!(!breaker.try_acquire(later + Duration::from_secs(1)));
        }

        #[test]
        fn should_forget_failures_outside_window() {
            let start = Instant::now();
            let mut breaker = breaker();
            for _ in 0..4 {
                breaker.record_failure(start);
            }
            breaker.record_failure(start + Duration::from_secs(301));
            assert_eq!(breaker.state(), BreakerState::Closed);
            assert_eq!(breaker.failure_count(), 1);
        }
    }

    mod resource_tests {
        use super::*;

        #[test]
        fn should_treat_missing_values_as_healthy() {
            let limits = ResourceLimits::default();
            assert!(ResourceSnapshot::default().is_healthy(&limits));
            assert!(!FixedProbe::under_pressure().sample().is_healthy(&limits));
        }
    }

    mod handler_tests {
        use super::*;

        #[test]
        fn should_succeed_after_retries() {
            let handler = ErrorHandler::with_probe(fast_config(), Arc::new(FixedProbe::healthy()));
            let mut calls = 0;
            let execution = handler.run(ErrorCategory::Io, ErrorContext::new("write"), |attempt| {
                calls += 1;
                if attempt < 2 {
                    Err(io_error(io::ErrorKind::Interrupted))
                } else {
                    Ok(attempt)
                }
            });
            assert_eq!(execution.outcome(), Outcome::Retried);
            assert!(matches!(execution, Execution::Retried { value: 2, attempts: 3 }));
            assert_eq!(calls, 3);
            assert_eq!(handler.stats().total, 2);
        }

        #[test]
        fn should_skip_validation_failures_without_retry() {
            let handler = ErrorHandler::with_probe(fast_config(), Arc::new(FixedProbe::healthy()));
            let mut calls = 0;
            let execution: Execution<()> =
                handler.run(ErrorCategory::Validation, ErrorContext::new("rule"), |_| {
                    calls += 1;
                    Err(EngineError::validation("rule", "invalid output"))
                });
            assert_eq!(execution.outcome(), Outcome::Skipped);
            assert_eq!(calls, 1);
        }

        #[test]
        fn should_use_fallback_after_exhausting_retries() {
            let handler = ErrorHandler::with_probe(fast_config(), Arc::new(FixedProbe::healthy()));
            let mut calls = 0;
            let execution = handler.execute(
                ErrorCategory::Io,
                ErrorContext::new("backup"),
                |_| -> crate::error::Result<&str> {
                    calls += 1;
                    Err(io_error(io::ErrorKind::NotFound))
                },
                Some(|record: &ErrorRecord| {
                    assert_eq!(record.category, ErrorCategory::Io);
                    Ok("alternate")
                }),
            );
            assert_eq!(calls, 4);
            match execution {
                Execution::RecoveredViaFallback { value, record } => {
                    assert_eq!(value, "alternate");
                    assert!(record.resolved);
                }
                other => panic!("unexpected outcome {:?}", other.outcome()),
            }
        }

        #[test]
        fn should_downgrade_retry_under_pressure() {
            let handler =
                ErrorHandler::with_probe(fast_config(), Arc::new(FixedProbe::under_pressure()));
            let mut calls = 0;
            let execution = handler.execute(
                ErrorCategory::Io,
                ErrorContext::new("write"),
                |_| -> crate::error::Result<u8> {
                    calls += 1;
                    Err(io_error(io::ErrorKind::Interrupted))
                },
                Some(|_: &ErrorRecord| Ok(7)),
            );
            assert_eq!(calls, 1);
            assert_eq!(execution.outcome(), Outcome::RecoveredViaFallback);
        }

        #[test]
        fn should_escalate_manual_intervention() {
            let handler = ErrorHandler::with_probe(fast_config(), Arc::new(FixedProbe::healthy()));
            let execution: Execution<()> =
                handler.run(ErrorCategory::Io, ErrorContext::new("write"), |_| {
                    Err(io_error(io::ErrorKind::PermissionDenied))
                });
            assert_eq!(execution.outcome(), Outcome::Escalated);
            let record = execution.record().cloned().expect("record");
            assert_eq!(record.category, ErrorCategory::Permission);
            assert_eq!(record.recovery_strategy, RecoveryStrategy::ManualIntervention);
        }

        #[test]
        fn should_reject_calls_while_open() {
            let config = RecoveryConfig {
                failure_threshold: 5,
                ..fast_config()
            };
            let handler = ErrorHandler::with_probe(config, Arc::new(FixedProbe::healthy()));
            for _ in 0..5 {
                let _: Execution<()> = handler.run(
                    ErrorCategory::Validation,
                    ErrorContext::new("parse"),
                    |_| Err(EngineError::validation("tree", "bad")),
                );
            }
            assert_eq!(handler.breaker_state(ErrorCategory::Validation), BreakerState::Open);

            let mut executed = false;
            let execution: Execution<()> =
                handler.run(ErrorCategory::Validation, ErrorContext::new("parse"), |_| {
                    executed = true;
                    Ok(())
                });
            assert!(!executed);
            assert!(matches!(
                execution,
                Execution::Aborted {
                    error: EngineError::CircuitOpen { .. },
                    ..
                }
            ));
        }
    }
}
