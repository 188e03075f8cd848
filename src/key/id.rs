// ABOUTME: Type-parameter-less identifiers for keys
// ABOUTME: A KeyId is a (namespace, name) pair with a renderer-safe string form

use std::fmt;

/// Identifies a key independently of its value type. Two keys created with the
/// same namespace and name address the same binding slot, whatever their type
/// parameters say.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId {
    namespace: String,
    name: String,
}

impl KeyId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            namespace: String::new(),
            name: name.into(),
        }
    }

    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            // Double underscore is unconventional, but it is safe for graphviz
            // node identifiers.
            write!(f, "{}__{}", self.namespace, self.name)
        }
    }
}
