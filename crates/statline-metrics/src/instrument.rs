//! Timing wrappers for closures
//!
//! [`Instrumented`] times every call of a wrapped closure under one timer.
//! The timer is looked up on each call, so a registry that was cleared in
//! between starts a fresh metric.

use std::future::Future;
use tracing::warn;

use crate::error::Result;
use crate::registry::MetricsRegistry;
use crate::timer::Timer;
use crate::types::SummaryConfig;

/// Compose a timer name from an owning type and an operation
///
/// ```ignore
/// assert_eq!(instrumented_name("OrderService", "place"), "OrderService_place");
/// ```
pub fn instrumented_name(owner: &str, operation: &str) -> String {
    format!("{}_{}", owner, operation)
}

/// Closure whose calls are recorded by a timer
pub struct Instrumented<F> {
    registry: MetricsRegistry,
    name: String,
    config: SummaryConfig,
    f: F,
}

impl<F> Instrumented<F> {
    /// Logical timer name, without kind or project prefix
    pub fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self) -> Option<Timer> {
        match self.registry.timer_with(&self.name, self.config.clone()) {
            Ok(timer) => Some(timer),
            Err(e) => {
                warn!(timer = %self.name, error = %e, "Running instrumented call untimed");
                None
            }
        }
    }

    /// Call a synchronous closure and record its duration
    pub fn call<A, R>(&self, args: A) -> R
    where
        F: Fn(A) -> R,
    {
        match self.resolve() {
            Some(timer) => timer.time(|| (self.f)(args)),
            None => (self.f)(args),
        }
    }

    /// Call an asynchronous closure; the duration covers the whole future
    pub async fn call_async<A, Fut>(&self, args: A) -> Fut::Output
    where
        F: Fn(A) -> Fut,
        Fut: Future,
    {
        match self.resolve() {
            Some(timer) => timer.time_async((self.f)(args)).await,
            None => (self.f)(args).await,
        }
    }
}

impl MetricsRegistry {
    /// Wrap `f` so each call is timed under the timer `name`
    ///
    /// The name is validated up front by creating the timer.
    pub fn instrument<F>(&self, name: &str, config: SummaryConfig, f: F) -> Result<Instrumented<F>> {
        self.timer_with(name, config.clone())?;

        Ok(Instrumented {
            registry: self.clone(),
            name: name.to_string(),
            config,
            f,
        })
    }
}
