//! Two-variant success/failure container
//!
//! [`Outcome`] is the terminal value produced by forcing an effect. The
//! engine needs only to construct it, refine it into its two variants, and
//! combine it; everything else lives in the combinators.
//!
//! Failures carry a [`Cause`] tree: a plain value, a stage-tagged engine
//! error, or an ordered list of causes (from accumulating sequencing).

use serde::Serialize;
use serde_json::Value;

use crate::error::StageTaggedError;

/// The payload of a failure outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cause {
    /// A caller-supplied failure value
    Value(Value),
    /// A failure captured inside the engine
    Staged(StageTaggedError),
    /// An ordered collection of causes from accumulating sequencing
    Many(Vec<Cause>),
}

impl Cause {
    /// Append this cause to `out`, flattening one level of nesting.
    ///
    /// Accumulating sequences collect per-element failures; when an element
    /// itself failed with a list (e.g. a nested `sequence_a`), its causes are
    /// spliced in rather than nested, so error lists stay flat.
    pub fn flatten_into(self, out: &mut Vec<Cause>) {
        match self {
            Cause::Many(causes) => out.extend(causes),
            other => out.push(other),
        }
    }

    /// Borrow the stage-tagged error if this cause was captured in-engine
    pub fn as_staged(&self) -> Option<&StageTaggedError> {
        match self {
            Cause::Staged(err) => Some(err),
            _ => None,
        }
    }
}

impl From<Value> for Cause {
    fn from(value: Value) -> Self {
        Cause::Value(value)
    }
}

impl From<&str> for Cause {
    fn from(value: &str) -> Self {
        Cause::Value(Value::String(value.to_string()))
    }
}

impl From<String> for Cause {
    fn from(value: String) -> Self {
        Cause::Value(Value::String(value))
    }
}

impl From<StageTaggedError> for Cause {
    fn from(err: StageTaggedError) -> Self {
        Cause::Staged(err)
    }
}

impl From<Vec<Cause>> for Cause {
    fn from(causes: Vec<Cause>) -> Self {
        Cause::Many(causes)
    }
}

/// The result of a unit of work: success wrapping a value, or failure
/// wrapping a [`Cause`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Outcome<T> {
    Success(T),
    Failure(Cause),
}

impl<T> Outcome<T> {
    /// Construct a success outcome
    pub fn success(value: T) -> Self {
        Outcome::Success(value)
    }

    /// Construct a failure outcome
    pub fn failure(cause: impl Into<Cause>) -> Self {
        Outcome::Failure(cause.into())
    }

    /// Check if this is a success
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Check if this is a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    /// Refine into either branch, consuming the outcome
    pub fn fold<R>(
        self,
        on_success: impl FnOnce(T) -> R,
        on_failure: impl FnOnce(Cause) -> R,
    ) -> R {
        match self {
            Outcome::Success(value) => on_success(value),
            Outcome::Failure(cause) => on_failure(cause),
        }
    }

    /// Transform the success value, passing failures through
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Failure(cause) => Outcome::Failure(cause),
        }
    }

    /// Chain an outcome-producing function on the success value
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Outcome<U>) -> Outcome<U> {
        match self {
            Outcome::Success(value) => f(value),
            Outcome::Failure(cause) => Outcome::Failure(cause),
        }
    }
}

/// What a thunk actually resolved to, before normalization.
///
/// Primitive constructors and combinators always yield `Done`; only a thunk
/// lifted from caller code via `from_outcome_thunk` can yield `Raw`, a value
/// that does not conform to the outcome contract. `Raw` is normalized by the
/// executor into a run-staged `InvalidResult` failure.
#[derive(Debug, Clone)]
pub enum Resolved<T> {
    Done(Outcome<T>),
    Raw(Value),
}

impl<T> Resolved<T> {
    /// An unrecognized return shape
    pub fn raw(value: impl Into<Value>) -> Self {
        Resolved::Raw(value.into())
    }
}

impl<T> From<Outcome<T>> for Resolved<T> {
    fn from(outcome: Outcome<T>) -> Self {
        Resolved::Done(outcome)
    }
}

impl<T> From<Result<T, Value>> for Resolved<T> {
    fn from(result: Result<T, Value>) -> Self {
        match result {
            Ok(value) => Resolved::Done(Outcome::Success(value)),
            Err(error) => Resolved::Done(Outcome::Failure(Cause::Value(error))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;
    use serde_json::json;

    #[test]
    fn success_and_failure_refine() {
        let ok: Outcome<i64> = Outcome::success(7);
        assert!(ok.is_success());
        assert!(!ok.is_failure());

        let bad: Outcome<i64> = Outcome::failure("nope");
        assert!(bad.is_failure());
    }

    #[test]
    fn fold_selects_the_matching_branch() {
        let ok: Outcome<i64> = Outcome::success(2);
        assert_eq!(ok.fold(|v| v * 10, |_| -1), 20);

        let bad: Outcome<i64> = Outcome::failure("err");
        assert_eq!(bad.fold(|v| v * 10, |_| -1), -1);
    }

    #[test]
    fn map_passes_failures_through() {
        let bad: Outcome<i64> = Outcome::failure(json!({"code": 401}));
        let mapped = bad.map(|v| v + 1);
        assert_eq!(mapped, Outcome::failure(json!({"code": 401})));
    }

    #[test]
    fn and_then_chains_on_success_only() {
        let ok: Outcome<i64> = Outcome::success(3);
        let chained = ok.and_then(|v| Outcome::success(v.to_string()));
        assert_eq!(chained, Outcome::success("3".to_string()));

        let bad: Outcome<i64> = Outcome::failure("err");
        let chained = bad.and_then(|v| Outcome::success(v.to_string()));
        assert_eq!(chained, Outcome::failure("err"));
    }

    #[test]
    fn flatten_into_splices_one_level() {
        let mut out = Vec::new();
        Cause::from("a").flatten_into(&mut out);
        Cause::Many(vec![Cause::from("b"), Cause::from("c")]).flatten_into(&mut out);
        assert_eq!(
            out,
            vec![Cause::from("a"), Cause::from("b"), Cause::from("c")]
        );
    }

    #[test]
    fn flatten_keeps_deeper_nesting_intact() {
        // Only one level flattens; a list inside a list survives.
        let nested = Cause::Many(vec![Cause::Many(vec![Cause::from("x")])]);
        let mut out = Vec::new();
        nested.flatten_into(&mut out);
        assert_eq!(out, vec![Cause::Many(vec![Cause::from("x")])]);
    }

    #[test]
    fn as_staged_exposes_engine_errors() {
        let cause = Cause::from(StageTaggedError::caught(Stage::Map, json!("boom")));
        assert_eq!(cause.as_staged().unwrap().stage, Stage::Map);
        assert!(Cause::from("plain").as_staged().is_none());
    }

    #[test]
    fn resolved_from_result() {
        let ok: Resolved<i64> = Ok(5).into();
        assert!(matches!(ok, Resolved::Done(Outcome::Success(5))));

        let bad: Resolved<i64> = Err(json!("e")).into();
        assert!(matches!(bad, Resolved::Done(Outcome::Failure(_))));
    }
}
