//! map / bind / apply
//!
//! Each combinator builds a new effect whose thunk sequentially composes its
//! operands' thunks and derives a promoted context for the composed step.
//! User-supplied functions are invoked at exactly one guarded boundary per
//! combinator: an `Err` return or a panic there becomes a stage-tagged
//! failure, while failures arriving from operands keep their original tags.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use futures::future::FutureExt;
use serde_json::Value;

use crate::effect::{join_normalized, normalize, Effect, Thunk};
use crate::error::{panic_value, Stage, StageTaggedError};
use crate::outcome::{Outcome, Resolved};

/// The payload shape accepted by [`apply`]'s function-side effect
pub type ApplyFn<A, U> = Arc<dyn Fn(A) -> Result<U, Value> + Send + Sync>;

/// Call a user function under the panic guard, tagging any failure with the
/// given stage.
fn guarded<U>(stage: Stage, call: impl FnOnce() -> Result<U, Value>) -> Outcome<U> {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(value)) => Outcome::Success(value),
        Ok(Err(error)) => Outcome::failure(StageTaggedError::caught(stage, error)),
        Err(payload) => Outcome::failure(StageTaggedError::caught(stage, panic_value(payload))),
    }
}

/// Re-type a failure-track thunk without invoking user code.
///
/// Failure outcomes pass through untouched. A success resolution on the
/// failure track is unreachable through the public constructors; it is
/// normalized to a run-staged invalid result instead of panicking.
fn recast_failure<T, U>(thunk: Thunk<T>) -> Thunk<U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    Arc::new(move |env| {
        let thunk = Arc::clone(&thunk);
        async move {
            match normalize(thunk(env).await) {
                Outcome::Failure(cause) => Resolved::Done(Outcome::Failure(cause)),
                Outcome::Success(_) => Resolved::Done(Outcome::failure(
                    StageTaggedError::invalid_result(Value::String(
                        "success resolution on failure track".to_string(),
                    )),
                )),
            }
        }
        .boxed()
    })
}

impl<T: Send + Sync + 'static> Effect<T> {
    /// Transform the success value of this effect.
    ///
    /// On the failure track the transform is never invoked and failures flow
    /// through untouched. On the success track the composed thunk awaits
    /// this effect, then applies `f` under the guard; `Err`/panic become a
    /// `map`-staged failure. The composed step runs under
    /// `promote(context, "map")`.
    pub fn map<U, F>(self, f: F) -> Effect<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Result<U, Value> + Send + Sync + 'static,
    {
        match self {
            Effect::Failure { context, thunk } => Effect::Failure {
                context,
                thunk: recast_failure(thunk),
            },
            Effect::Success { context, thunk } => {
                let promoted = context.promote("map");
                let f = Arc::new(f);
                Effect::Success {
                    context: promoted,
                    thunk: Arc::new(move |env| {
                        let thunk = Arc::clone(&thunk);
                        let f = Arc::clone(&f);
                        async move {
                            match normalize(thunk(env).await) {
                                Outcome::Success(value) => {
                                    Resolved::Done(guarded(Stage::Map, move || f(value)))
                                }
                                Outcome::Failure(cause) => {
                                    Resolved::Done(Outcome::Failure(cause))
                                }
                            }
                        }
                        .boxed()
                    }),
                }
            }
        }
    }

    /// Chain an effect-returning continuation on the success value.
    ///
    /// The continuation's effect is resolved recursively inside the single
    /// execution owned by the outer run. Panics raised by `f` itself are
    /// `bind`-staged; failures of the returned sub-effect keep their own
    /// tags. The composed step runs under `promote(context, "bind")`.
    pub fn bind<U, F>(self, f: F) -> Effect<U>
    where
        U: Send + Sync + 'static,
        F: Fn(T) -> Effect<U> + Send + Sync + 'static,
    {
        match self {
            Effect::Failure { context, thunk } => Effect::Failure {
                context,
                thunk: recast_failure(thunk),
            },
            Effect::Success { context, thunk } => {
                let promoted = context.promote("bind");
                let f = Arc::new(f);
                Effect::Success {
                    context: promoted,
                    thunk: Arc::new(move |env| {
                        let thunk = Arc::clone(&thunk);
                        let f = Arc::clone(&f);
                        async move {
                            let value = match normalize(thunk(env.clone()).await) {
                                Outcome::Success(value) => value,
                                Outcome::Failure(cause) => {
                                    return Resolved::Done(Outcome::Failure(cause))
                                }
                            };
                            let next = match catch_unwind(AssertUnwindSafe(|| f(value))) {
                                Ok(effect) => effect,
                                Err(payload) => {
                                    return Resolved::Done(Outcome::failure(
                                        StageTaggedError::caught(Stage::Bind, panic_value(payload)),
                                    ))
                                }
                            };
                            Resolved::Done(next.resolve(env).await)
                        }
                        .boxed()
                    }),
                }
            }
        }
    }
}

/// Apply a function-carrying effect to a value-carrying effect.
///
/// Both operands' thunks are spawned before either is awaited, so
/// independent work overlaps and each side keeps its own traceability. The
/// reported failure is deterministic by priority: the function side wins
/// when both fail, otherwise whichever side failed. Applying the function is
/// guarded; `Err`/panic become an `apply`-staged failure. The composed step
/// runs under `promote(value.context, "apply")`.
pub fn apply<A, U>(func: Effect<ApplyFn<A, U>>, value: Effect<A>) -> Effect<U>
where
    A: Send + Sync + 'static,
    U: Send + 'static,
{
    let context = value.context().promote("apply");
    let failure_track = func.is_failure_track() || value.is_failure_track();
    let func_thunk = func.thunk_clone();
    let value_thunk = value.thunk_clone();

    let thunk: Thunk<U> = Arc::new(move |env| {
        let func_thunk = Arc::clone(&func_thunk);
        let value_thunk = Arc::clone(&value_thunk);
        async move {
            // spawn both sides before awaiting either; thunk invocation
            // itself happens on the spawned tasks
            let func_handle = {
                let env = env.clone();
                tokio::spawn(async move { func_thunk(env).await })
            };
            let value_handle = tokio::spawn(async move { value_thunk(env).await });

            let func_outcome = join_normalized(func_handle).await;
            let value_outcome = join_normalized(value_handle).await;

            match (func_outcome, value_outcome) {
                // function-side failure takes precedence
                (Outcome::Failure(cause), _) => Resolved::Done(Outcome::Failure(cause)),
                (_, Outcome::Failure(cause)) => Resolved::Done(Outcome::Failure(cause)),
                (Outcome::Success(f), Outcome::Success(a)) => {
                    Resolved::Done(guarded(Stage::Apply, move || f(a)))
                }
            }
        }
        .boxed()
    });

    if failure_track {
        Effect::Failure { context, thunk }
    } else {
        Effect::Success { context, thunk }
    }
}
