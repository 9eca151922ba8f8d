//! Deferred, composable units of asynchronous work
//!
//! An [`Effect`] pairs a [`Context`] with a thunk: a function from the
//! ambient [`Env`] to a boxed future that eventually resolves to an outcome.
//! Construction is pure data — no thunk runs until the executor forces the
//! tree. The two variants track whether the effect was built on the success
//! or failure path; combinators branch on the tag exhaustively and never
//! invoke user functions on the failure track.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::context::Context;
use crate::env::Env;
use crate::error::{panic_value, Stage, StageTaggedError};
use crate::outcome::{Cause, Outcome, Resolved};
use crate::summary::summarize;

/// The deferred computation held by an effect
pub type Thunk<T> = Arc<dyn Fn(Env) -> BoxFuture<'static, Resolved<T>> + Send + Sync>;

/// A not-yet-executed description of work plus its tracing context
pub enum Effect<T> {
    /// Built on the success path
    Success { context: Context, thunk: Thunk<T> },
    /// Built on the failure path; combinators pass it through untouched
    Failure { context: Context, thunk: Thunk<T> },
}

impl<T> Clone for Effect<T> {
    fn clone(&self) -> Self {
        match self {
            Effect::Success { context, thunk } => Effect::Success {
                context: context.clone(),
                thunk: Arc::clone(thunk),
            },
            Effect::Failure { context, thunk } => Effect::Failure {
                context: context.clone(),
                thunk: Arc::clone(thunk),
            },
        }
    }
}

// Debug without requiring T: Debug; thunks are opaque.
impl<T> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (variant, context) = match self {
            Effect::Success { context, .. } => ("Success", context),
            Effect::Failure { context, .. } => ("Failure", context),
        };
        f.debug_struct("Effect")
            .field("track", &variant)
            .field("trace_id", &context.trace_id)
            .field("span_name", &context.span_name)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Effect<T> {
    /// The context this effect carries
    pub fn context(&self) -> &Context {
        match self {
            Effect::Success { context, .. } | Effect::Failure { context, .. } => context,
        }
    }

    /// Check if this effect was built on the success path
    pub fn is_success_track(&self) -> bool {
        matches!(self, Effect::Success { .. })
    }

    /// Check if this effect was built on the failure path
    pub fn is_failure_track(&self) -> bool {
        matches!(self, Effect::Failure { .. })
    }

    /// Replace the attached context
    pub fn with_context(self, context: Context) -> Self {
        match self {
            Effect::Success { thunk, .. } => Effect::Success { context, thunk },
            Effect::Failure { thunk, .. } => Effect::Failure { context, thunk },
        }
    }

    pub(crate) fn thunk_clone(&self) -> Thunk<T> {
        match self {
            Effect::Success { thunk, .. } | Effect::Failure { thunk, .. } => Arc::clone(thunk),
        }
    }

    /// Executor primitive: invoke the thunk and normalize what it yields.
    ///
    /// Combinators use this to force nested effects during the single
    /// execution owned by the outer `run`; it carries no telemetry and no
    /// timeout of its own.
    pub(crate) async fn resolve(&self, env: Env) -> Outcome<T> {
        normalize((self.thunk_clone())(env).await)
    }
}

/// Turn a raw resolution into a canonical outcome.
///
/// Unrecognized shapes become run-staged `InvalidResult` failures carrying a
/// bounded summary of the offending value.
pub(crate) fn normalize<T>(resolved: Resolved<T>) -> Outcome<T> {
    match resolved {
        Resolved::Done(outcome) => outcome,
        Resolved::Raw(value) => {
            Outcome::Failure(Cause::Staged(StageTaggedError::invalid_result(summarize(&value))))
        }
    }
}

/// Await a spawned thunk, normalizing join errors (panics, aborts) into
/// run-staged failures.
pub(crate) async fn join_normalized<T: Send + 'static>(
    handle: JoinHandle<Resolved<T>>,
) -> Outcome<T> {
    match handle.await {
        Ok(resolved) => normalize(resolved),
        Err(join_err) => Outcome::failure(StageTaggedError::caught(
            Stage::Run,
            Value::String(join_err.to_string()),
        )),
    }
}

/// Success-track effect resolving immediately to `value`
pub fn succeed<T>(value: T) -> Effect<T>
where
    T: Clone + Send + Sync + 'static,
{
    succeed_with(value, Context::new())
}

/// [`succeed`] with an explicit context
pub fn succeed_with<T>(value: T, context: Context) -> Effect<T>
where
    T: Clone + Send + Sync + 'static,
{
    Effect::Success {
        context,
        thunk: Arc::new(move |_env| {
            let value = value.clone();
            async move { Resolved::Done(Outcome::Success(value)) }.boxed()
        }),
    }
}

/// Failure-track effect resolving immediately to `cause`
pub fn fail<T>(cause: impl Into<Cause>) -> Effect<T>
where
    T: Send + 'static,
{
    fail_with(cause, Context::new())
}

/// [`fail`] with an explicit context
pub fn fail_with<T>(cause: impl Into<Cause>, context: Context) -> Effect<T>
where
    T: Send + 'static,
{
    let cause = cause.into();
    Effect::Failure {
        context,
        thunk: Arc::new(move |_env| {
            let cause = cause.clone();
            async move { Resolved::Done(Outcome::Failure(cause)) }.boxed()
        }),
    }
}

/// Success-track effect whose thunk applies `f` to the environment.
///
/// An `Err` return or a panic inside `f` is captured as a
/// `lift_function`-staged failure.
pub fn from_env<T, F>(f: F) -> Effect<T>
where
    T: Send + 'static,
    F: Fn(&Env) -> Result<T, Value> + Send + Sync + 'static,
{
    from_env_with(f, Context::new())
}

/// [`from_env`] with an explicit context
pub fn from_env_with<T, F>(f: F, context: Context) -> Effect<T>
where
    T: Send + 'static,
    F: Fn(&Env) -> Result<T, Value> + Send + Sync + 'static,
{
    // the function must run inside the returned future, not while building
    // it, so the executor's timeout bounds the call
    let f = Arc::new(f);
    Effect::Success {
        context,
        thunk: Arc::new(move |env| {
            let f = Arc::clone(&f);
            async move {
                match catch_unwind(AssertUnwindSafe(|| f(&env))) {
                    Ok(Ok(value)) => Resolved::Done(Outcome::Success(value)),
                    Ok(Err(error)) => Resolved::Done(Outcome::failure(
                        StageTaggedError::caught(Stage::LiftFunction, error),
                    )),
                    Err(payload) => Resolved::Done(Outcome::failure(StageTaggedError::caught(
                        Stage::LiftFunction,
                        panic_value(payload),
                    ))),
                }
            }
            .boxed()
        }),
    }
}

/// Wrap a thunk that already produces an outcome-shaped asynchronous result.
///
/// `f` is called with the environment each time the effect is forced; panics
/// raised synchronously while constructing the future are captured as
/// `lift_outcome`-staged failures. The awaited result is anything
/// convertible into [`Resolved`] — a raw, unrecognized shape surfaces at run
/// time as an `invalid_result` failure.
pub fn from_outcome_thunk<T, F, Fut, R>(f: F) -> Effect<T>
where
    T: Send + 'static,
    F: Fn(Env) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = R> + Send + 'static,
    R: Into<Resolved<T>>,
{
    from_outcome_thunk_with(f, Context::new())
}

/// [`from_outcome_thunk`] with an explicit context
pub fn from_outcome_thunk_with<T, F, Fut, R>(f: F, context: Context) -> Effect<T>
where
    T: Send + 'static,
    F: Fn(Env) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = R> + Send + 'static,
    R: Into<Resolved<T>>,
{
    Effect::Success {
        context,
        thunk: Arc::new(move |env| match catch_unwind(AssertUnwindSafe(|| f(env))) {
            Ok(fut) => async move { fut.await.into() }.boxed(),
            Err(payload) => {
                let outcome = Outcome::failure(StageTaggedError::caught(
                    Stage::LiftOutcome,
                    panic_value(payload),
                ));
                async move { Resolved::Done(outcome) }.boxed()
            }
        }),
    }
}
