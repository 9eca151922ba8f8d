//! List sequencing and validation
//!
//! Folds a list of effects into one effect. The short-circuiting variants
//! stop at the first failure — later thunks are never invoked; the
//! accumulating variants spawn every element before awaiting any, preserve
//! input order on both sides, and collect every failure into one flat list.

use std::sync::Arc;

use futures::future::FutureExt;

use crate::combine::ApplyFn;
use crate::context::Context;
use crate::effect::{join_normalized, succeed, Effect, Thunk};
use crate::outcome::{Cause, Outcome, Resolved};

/// A validator: inspects a value and returns an effect that echoes it on
/// success or fails with the violation
pub type ValidatorFn<T> = Box<dyn Fn(&T) -> Effect<T> + Send + Sync>;

fn composed_context<T: Send + 'static>(effects: &[Effect<T>], label: &str) -> Context {
    match effects.first() {
        Some(first) => first.context().promote(label),
        None => Context::new(),
    }
}

fn any_failure_track<T: Send + 'static>(effects: &[Effect<T>]) -> bool {
    effects.iter().any(Effect::is_failure_track)
}

/// Fold effects left-to-right, stopping at the first failure.
///
/// The first failure becomes the overall failure and later elements are
/// never invoked. Success accumulates the unwrapped values in input order.
/// The empty list succeeds with an empty vector.
pub fn sequence<T>(effects: Vec<Effect<T>>) -> Effect<Vec<T>>
where
    T: Send + Sync + 'static,
{
    let context = composed_context(&effects, "sequence");
    let failure_track = any_failure_track(&effects);
    let effects = Arc::new(effects);

    let thunk: Thunk<Vec<T>> = Arc::new(move |env| {
        let effects = Arc::clone(&effects);
        async move {
            let mut values = Vec::with_capacity(effects.len());
            for effect in effects.iter() {
                match effect.resolve(env.clone()).await {
                    Outcome::Success(value) => values.push(value),
                    Outcome::Failure(cause) => return Resolved::Done(Outcome::Failure(cause)),
                }
            }
            Resolved::Done(Outcome::Success(values))
        }
        .boxed()
    });

    if failure_track {
        Effect::Failure { context, thunk }
    } else {
        Effect::Success { context, thunk }
    }
}

/// Map each item to an effect, then [`sequence`] the results
pub fn traverse<A, T, F>(items: Vec<A>, f: F) -> Effect<Vec<T>>
where
    T: Send + Sync + 'static,
    F: Fn(A) -> Effect<T>,
{
    sequence(items.into_iter().map(f).collect())
}

/// Fold effects while accumulating every failure.
///
/// Every element's thunk is spawned before any is awaited, so independent
/// elements genuinely overlap. Successes and failures are both collected in
/// input order regardless of resolution order; failure causes that are
/// already list-shaped flatten one level. Any failure makes the composed
/// effect fail with the collected list, otherwise it succeeds with the value
/// list.
pub fn sequence_a<T>(effects: Vec<Effect<T>>) -> Effect<Vec<T>>
where
    T: Send + Sync + 'static,
{
    let context = composed_context(&effects, "sequence_a");
    let failure_track = any_failure_track(&effects);
    let effects = Arc::new(effects);

    let thunk: Thunk<Vec<T>> = Arc::new(move |env| {
        let effects = Arc::clone(&effects);
        async move {
            // spawn everything before awaiting anything; thunk invocation
            // itself happens on the spawned tasks
            let handles: Vec<_> = effects
                .iter()
                .map(|effect| {
                    let thunk = effect.thunk_clone();
                    let env = env.clone();
                    tokio::spawn(async move { thunk(env).await })
                })
                .collect();

            let mut values = Vec::new();
            let mut causes: Vec<Cause> = Vec::new();
            for handle in handles {
                match join_normalized(handle).await {
                    Outcome::Success(value) => values.push(value),
                    Outcome::Failure(cause) => cause.flatten_into(&mut causes),
                }
            }

            if causes.is_empty() {
                Resolved::Done(Outcome::Success(values))
            } else {
                Resolved::Done(Outcome::Failure(Cause::Many(causes)))
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

/// Map each item to an effect, then [`sequence_a`] the results
pub fn traverse_a<A, T, F>(items: Vec<A>, f: F) -> Effect<Vec<T>>
where
    T: Send + Sync + 'static,
    F: Fn(A) -> Effect<T>,
{
    sequence_a(items.into_iter().map(f).collect())
}

/// Run every validator against `value`, accumulating all violations.
///
/// Validators are applied through [`sequence_a`], so every one runs even
/// after earlier failures. On overall success the composed effect resolves
/// to the original `value`, not the per-validator echoes.
pub fn validate<T>(value: T, validators: &[ValidatorFn<T>]) -> Effect<T>
where
    T: Clone + Send + Sync + 'static,
{
    if validators.is_empty() {
        return succeed(value);
    }
    let effects: Vec<Effect<T>> = validators.iter().map(|v| v(&value)).collect();
    sequence_a(effects).map(move |_echoes| Ok(value.clone()))
}

/// Convenience for lifting a plain function into [`apply`]'s function shape
pub fn apply_fn<A, U>(
    f: impl Fn(A) -> Result<U, serde_json::Value> + Send + Sync + 'static,
) -> ApplyFn<A, U> {
    Arc::new(f)
}
