//! Polymorphic equality and ordering over handles.
//!
//! `equal` and `less` are primitive; the other four predicates derive from
//! them. Class instances participate by overriding `__eq__`/`__lt__`.

use crate::runtime::context::Context;
use crate::runtime::error::RuntimeError;
use crate::runtime::object::{EQ_METHOD, Handle, LT_METHOD};

/// The six comparison operators of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Equal,
    NotEqual,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
}

impl Comparator {
    pub fn apply(
        self,
        lhs: &Handle,
        rhs: &Handle,
        ctx: &mut dyn Context,
    ) -> Result<bool, RuntimeError> {
        match self {
            Comparator::Equal => equal(lhs, rhs, ctx),
            Comparator::NotEqual => not_equal(lhs, rhs, ctx),
            Comparator::Less => less(lhs, rhs, ctx),
            Comparator::Greater => greater(lhs, rhs, ctx),
            Comparator::LessOrEqual => less_or_equal(lhs, rhs, ctx),
            Comparator::GreaterOrEqual => greater_or_equal(lhs, rhs, ctx),
        }
    }
}

pub fn equal(lhs: &Handle, rhs: &Handle, ctx: &mut dyn Context) -> Result<bool, RuntimeError> {
    if lhs.is_none() && rhs.is_none() {
        return Ok(true);
    }
    if let (Some(left), Some(right)) = (lhs.as_number(), rhs.as_number()) {
        return Ok(left == right);
    }
    if let (Some(left), Some(right)) = (lhs.as_string(), rhs.as_string()) {
        return Ok(left == right);
    }
    if let (Some(left), Some(right)) = (lhs.as_bool(), rhs.as_bool()) {
        return Ok(left == right);
    }
    if lhs.has_method(EQ_METHOD, 1) {
        return Ok(lhs.call(EQ_METHOD, &[rhs.clone()], ctx)?.is_true());
    }
    Err(RuntimeError::IncomparableTypes {
        operation: "equality",
    })
}

/// Natural order per kind: numeric for numbers, lexicographic for strings,
/// `False < True` for booleans. Two empty handles do not order.
pub fn less(lhs: &Handle, rhs: &Handle, ctx: &mut dyn Context) -> Result<bool, RuntimeError> {
    if let (Some(left), Some(right)) = (lhs.as_number(), rhs.as_number()) {
        return Ok(left < right);
    }
    if let (Some(left), Some(right)) = (lhs.as_string(), rhs.as_string()) {
        return Ok(left < right);
    }
    if let (Some(left), Some(right)) = (lhs.as_bool(), rhs.as_bool()) {
        return Ok(!left && right);
    }
    if lhs.has_method(LT_METHOD, 1) {
        return Ok(lhs.call(LT_METHOD, &[rhs.clone()], ctx)?.is_true());
    }
    Err(RuntimeError::IncomparableTypes { operation: "less" })
}

pub fn not_equal(lhs: &Handle, rhs: &Handle, ctx: &mut dyn Context) -> Result<bool, RuntimeError> {
    Ok(!equal(lhs, rhs, ctx)?)
}

pub fn less_or_equal(
    lhs: &Handle,
    rhs: &Handle,
    ctx: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    Ok(less(lhs, rhs, ctx)? || equal(lhs, rhs, ctx)?)
}

pub fn greater(lhs: &Handle, rhs: &Handle, ctx: &mut dyn Context) -> Result<bool, RuntimeError> {
    Ok(!less_or_equal(lhs, rhs, ctx)?)
}

pub fn greater_or_equal(
    lhs: &Handle,
    rhs: &Handle,
    ctx: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    Ok(!less(lhs, rhs, ctx)?)
}
