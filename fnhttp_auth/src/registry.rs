//! The set of functions that declare authorization requirements

use std::collections::{hash_map::Entry, HashMap};

use fnhttp::{FunctionDescriptor, FunctionName, FunctionNameRef};
use thiserror::Error;

/// Failure to build a [`FunctionRegistry`]
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Two functions were registered under the same public name
    #[error("function name `{name}` is declared by both `{first}` and `{second}`")]
    DuplicateFunctionName {
        /// The shared public name
        name: FunctionName,
        /// The method registered first
        first: String,
        /// The method registered second
        second: String,
    },
}

/// Functions that require authorization, keyed by public name
///
/// Built once at startup and immutable afterwards. Functions absent from the
/// registry run without authentication.
#[derive(Clone, Debug, Default)]
pub struct FunctionRegistry {
    functions: HashMap<FunctionName, FunctionDescriptor>,
}

impl FunctionRegistry {
    /// Builds the registry from every hosted function
    ///
    /// Only functions with a request trigger and at least one authorization
    /// marker are kept.
    ///
    /// # Errors
    ///
    /// Fails if two kept functions share a public name.
    pub fn discover<I>(descriptors: I) -> Result<Self, DiscoveryError>
    where
        I: IntoIterator<Item = FunctionDescriptor>,
    {
        let mut functions = HashMap::new();

        for descriptor in descriptors {
            if !descriptor.has_trigger() || descriptor.authorizations().is_empty() {
                tracing::trace!(function = %descriptor.name(), "function does not require authorization");
                continue;
            }

            match functions.entry(descriptor.name().to_owned()) {
                Entry::Occupied(existing) => {
                    let existing: &FunctionDescriptor = existing.get();
                    return Err(DiscoveryError::DuplicateFunctionName {
                        name: descriptor.name().to_owned(),
                        first: existing.method().to_owned(),
                        second: descriptor.method().to_owned(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(descriptor);
                }
            }
        }

        tracing::info!(functions = functions.len(), "function registry built");
        Ok(Self { functions })
    }

    /// Looks up a function by public name
    pub fn get(&self, name: &FunctionNameRef) -> Option<&FunctionDescriptor> {
        self.functions.get(name)
    }

    /// The number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether no function requires authorization
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
