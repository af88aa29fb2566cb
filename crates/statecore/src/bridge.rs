//! Glue between typed node code and the type-erased scheduler.
//!
//! The scheduler only ever sees [`AnyValue`]s and boxed futures; node authors
//! only ever see their own `Input`/`Output` types. These helpers perform the
//! one conversion needed at each crossing.

use crate::{AnyValue, ContractError, NodeError, StateData, TypeDescriptor};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;

/// Future produced by an erased invocation.
pub type ErasedInvocation<'a> = BoxFuture<'a, Result<AnyValue, NodeError>>;

/// Box a typed asynchronous invocation so its output arrives as an [`AnyValue`].
pub fn erase<'a, T, F>(invocation: F) -> ErasedInvocation<'a>
where
    T: StateData,
    F: Future<Output = Result<T, NodeError>> + Send + 'a,
{
    invocation.map(|result| result.map(AnyValue::new)).boxed()
}

/// Check that an opaque value wraps a `T` and unwrap it.
pub fn expect_value<T: StateData>(value: AnyValue) -> Result<T, ContractError> {
    value.take::<T>()
}

/// Unwrap an input handed to a node, reporting a mismatch as a node failure.
pub fn expect_input<T: StateData>(value: AnyValue) -> Result<T, NodeError> {
    let actual = value.type_descriptor();
    value.take::<T>().map_err(|_| NodeError::InvalidInputType {
        expected: TypeDescriptor::of::<T>().short_name(),
        actual: actual.short_name(),
    })
}
