//! Explicit descriptions of the functions hosted in a process

use std::sync::Arc;

use aliri_braid::braid;
use serde::de::DeserializeOwned;

use crate::{
    invocation::{Argument, Arguments},
    marker::{Authorize, Scheme},
    param::{make_slot, ParamSlot},
    HttpRequest, HttpUser, Invocation, Source,
};

/// The public name of a hosted function
#[braid(serde, ref_doc = "A borrowed reference to a [`FunctionName`]")]
pub struct FunctionName;

#[derive(Clone, Debug)]
enum DeclarationKind {
    Trigger,
    Param {
        source: Source,
        make: fn(Source) -> Arc<dyn ParamSlot>,
    },
    User,
}

/// A single declared parameter of a function
#[derive(Clone, Debug)]
pub struct ParameterDeclaration {
    name: String,
    kind: DeclarationKind,
}

impl ParameterDeclaration {
    /// The parameter name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared source, for request-bound parameters
    pub fn source(&self) -> Option<&Source> {
        match &self.kind {
            DeclarationKind::Param { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Whether this parameter receives the triggering request
    pub fn is_trigger(&self) -> bool {
        matches!(self.kind, DeclarationKind::Trigger)
    }

    /// Whether this parameter receives the authenticated identity
    pub fn is_user(&self) -> bool {
        matches!(self.kind, DeclarationKind::User)
    }

    fn instantiate(&self, request: &Arc<HttpRequest>) -> Argument {
        match &self.kind {
            DeclarationKind::Trigger => Argument::Request(Arc::clone(request)),
            DeclarationKind::Param { source, make } => Argument::Param(make(source.clone())),
            DeclarationKind::User => Argument::User(HttpUser::new()),
        }
    }
}

/// The signature and markers of one hosted function
///
/// ```
/// use fnhttp::{FunctionDescriptor, Scheme, Source};
///
/// let descriptor = FunctionDescriptor::new("get_order")
///     .renamed("orders-get")
///     .trigger("req")
///     .param::<u64>("id", Source::query().required())
///     .user("user")
///     .authorize(Scheme::Jwt);
///
/// assert_eq!(descriptor.name().as_str(), "orders-get");
/// assert!(descriptor.has_trigger());
/// ```
#[derive(Clone, Debug)]
#[must_use]
pub struct FunctionDescriptor {
    method: String,
    name: FunctionName,
    authorize: Vec<Authorize>,
    parameters: Vec<ParameterDeclaration>,
}

impl FunctionDescriptor {
    /// Describes the function implemented by `method`
    ///
    /// The public name defaults to the method name.
    pub fn new(method: impl Into<String>) -> Self {
        let method = method.into();
        Self {
            name: FunctionName::new(method.clone()),
            method,
            authorize: Vec::new(),
            parameters: Vec::new(),
        }
    }

    /// Overrides the public function name
    pub fn renamed(mut self, name: impl Into<FunctionName>) -> Self {
        self.name = name.into();
        self
    }

    /// Declares the parameter receiving the triggering request
    pub fn trigger(mut self, name: impl Into<String>) -> Self {
        self.parameters.push(ParameterDeclaration {
            name: name.into(),
            kind: DeclarationKind::Trigger,
        });
        self
    }

    /// Declares a parameter bound from the request
    pub fn param<T>(mut self, name: impl Into<String>, source: Source) -> Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.parameters.push(ParameterDeclaration {
            name: name.into(),
            kind: DeclarationKind::Param {
                source,
                make: make_slot::<T>,
            },
        });
        self
    }

    /// Declares a parameter receiving the authenticated identity
    pub fn user(mut self, name: impl Into<String>) -> Self {
        self.parameters.push(ParameterDeclaration {
            name: name.into(),
            kind: DeclarationKind::User,
        });
        self
    }

    /// Requires authentication with `scheme`
    pub fn authorize(mut self, scheme: Scheme) -> Self {
        self.authorize.push(Authorize::new(scheme));
        self
    }

    /// The implementing method name
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The public function name
    pub fn name(&self) -> &FunctionNameRef {
        &self.name
    }

    /// The declared authorization markers
    pub fn authorizations(&self) -> &[Authorize] {
        &self.authorize
    }

    /// The declared parameters, in order
    pub fn parameters(&self) -> &[ParameterDeclaration] {
        &self.parameters
    }

    /// Whether the function is triggered by an HTTP request
    pub fn has_trigger(&self) -> bool {
        self.parameters.iter().any(ParameterDeclaration::is_trigger)
    }

    /// Creates the arguments for one invocation of this function
    pub fn instantiate(&self, request: Arc<HttpRequest>) -> Invocation {
        let arguments = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.instantiate(&request)))
            .collect::<Arguments>();

        Invocation::new(self.name.clone(), request, arguments)
    }
}
