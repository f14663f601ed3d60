//! Per-invocation context shared by filters and the function body

use std::{fmt, sync::Arc};

use once_cell::sync::OnceCell;
use uuid::Uuid;

use crate::{
    param::ParamSlot, Error, FunctionName, FunctionNameRef, HttpParam, HttpRequest, HttpUser,
};

/// Uniquely identifies one invocation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InvocationId(Uuid);

impl InvocationId {
    /// A new random identifier
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for InvocationId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The value passed for one declared parameter
#[derive(Clone, Debug)]
pub enum Argument {
    /// The triggering request
    Request(Arc<HttpRequest>),
    /// A holder bound from the request
    Param(Arc<dyn ParamSlot>),
    /// The holder for the authenticated identity
    User(HttpUser),
}

/// The ordered, named arguments of an invocation
#[derive(Clone, Debug, Default)]
pub struct Arguments {
    entries: Vec<(String, Argument)>,
}

impl Arguments {
    /// Iterates over all arguments, in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Argument)> {
        self.entries.iter().map(|(n, a)| (n.as_str(), a))
    }

    /// The argument with the given parameter name
    pub fn get(&self, name: &str) -> Option<&Argument> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, a)| a)
    }

    /// The typed holder for the named parameter
    ///
    /// Returns `None` if no such parameter exists or it was declared with a
    /// different type.
    pub fn param<T: 'static>(&self, name: &str) -> Option<HttpParam<T>> {
        match self.get(name)? {
            Argument::Param(slot) => slot.as_any().downcast_ref::<HttpParam<T>>().cloned(),
            _ => None,
        }
    }

    /// All request-bound holders, in declaration order
    pub fn params(&self) -> impl Iterator<Item = (&str, &Arc<dyn ParamSlot>)> {
        self.iter().filter_map(|(n, a)| match a {
            Argument::Param(slot) => Some((n, slot)),
            _ => None,
        })
    }

    /// The first identity holder, if one was declared
    pub fn user(&self) -> Option<&HttpUser> {
        self.entries.iter().find_map(|(_, a)| match a {
            Argument::User(user) => Some(user),
            _ => None,
        })
    }

    /// The triggering request, if it was declared as a parameter
    pub fn request(&self) -> Option<&Arc<HttpRequest>> {
        self.entries.iter().find_map(|(_, a)| match a {
            Argument::Request(req) => Some(req),
            _ => None,
        })
    }
}

impl FromIterator<(String, Argument)> for Arguments {
    fn from_iter<I: IntoIterator<Item = (String, Argument)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// A failure raised by a pre-invocation filter, held until the exception
/// stage reports it
#[derive(Debug)]
pub struct PendingFailure {
    filter: &'static str,
    error: Error,
}

impl PendingFailure {
    /// The name of the filter that failed
    pub const fn filter(&self) -> &'static str {
        self.filter
    }

    /// The error raised
    pub const fn error(&self) -> &Error {
        &self.error
    }
}

#[derive(Debug)]
struct Inner {
    id: InvocationId,
    function_name: FunctionName,
    request: Arc<HttpRequest>,
    arguments: Arguments,
    failure: OnceCell<PendingFailure>,
}

/// One execution of a hosted function
///
/// Cloning is cheap and every clone observes the same holders and pending
/// failure.
#[derive(Clone, Debug)]
pub struct Invocation {
    inner: Arc<Inner>,
}

impl Invocation {
    /// Constructs an invocation with a fresh identifier
    pub fn new(function_name: FunctionName, request: Arc<HttpRequest>, arguments: Arguments) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: InvocationId::new_random(),
                function_name,
                request,
                arguments,
                failure: OnceCell::new(),
            }),
        }
    }

    /// The invocation identifier
    pub fn id(&self) -> InvocationId {
        self.inner.id
    }

    /// The invoked function's public name
    pub fn function_name(&self) -> &FunctionNameRef {
        &self.inner.function_name
    }

    /// The triggering request
    pub fn request(&self) -> &Arc<HttpRequest> {
        &self.inner.request
    }

    /// The declared arguments
    pub fn arguments(&self) -> &Arguments {
        &self.inner.arguments
    }

    /// Records a filter failure
    ///
    /// Only the first failure is kept. Returns `false` if a failure had
    /// already been recorded.
    pub fn stash_failure(&self, filter: &'static str, error: Error) -> bool {
        self.inner
            .failure
            .set(PendingFailure { filter, error })
            .is_ok()
    }

    /// The recorded filter failure, if any
    pub fn pending_failure(&self) -> Option<&PendingFailure> {
        self.inner.failure.get()
    }
}
