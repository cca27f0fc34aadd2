//! Cassette naming derived from test identity

use std::fmt;

use crate::{Result, VcrError};

/// Extension appended to every cassette name
pub const CASSETTE_EXTENSION: &str = "yaml";

/// Maximum cassette name length accepted as a file name
pub const MAX_NAME_LEN: usize = 255;

/// The type a test method belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Owner(String);

impl Owner {
    /// Owner given as a type, e.g. an associated function with no receiver
    #[must_use]
    pub fn of<T: ?Sized>() -> Self {
        Self(short_type_name(std::any::type_name::<T>()).to_string())
    }

    /// Owner given as an instance; its type supplies the name
    #[must_use]
    pub fn of_val<T: ?Sized>(_receiver: &T) -> Self {
        Self::of::<T>()
    }

    /// Owner with an explicit name
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The owner's type name
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Strip module path and generic arguments from a `type_name` string
fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Identity of one test: defining module, owning type, method name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestTarget {
    module: String,
    owner: Owner,
    method: String,
}

impl TestTarget {
    /// Create a test target
    pub fn new(module: impl Into<String>, owner: Owner, method: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            owner,
            method: method.into(),
        }
    }

    /// Defining module path as given
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Owning type
    #[must_use]
    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    /// Method name
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Top-level cassette name for this test
    #[must_use]
    pub fn cassette_name(&self) -> CassetteName {
        CassetteName::for_method(&self.module, &self.owner, &self.method)
    }
}

/// Build a [`TestTarget`] for the current module
///
/// ```
/// struct ApiTests;
/// let target = vcrwrap::test_target!(ApiTests, test_lookup);
/// assert!(target.cassette_name().as_str().ends_with(".ApiTests.test_lookup.yaml"));
/// ```
#[macro_export]
macro_rules! test_target {
    ($owner:ty, $method:ident) => {
        $crate::TestTarget::new(
            ::std::module_path!(),
            $crate::Owner::of::<$owner>(),
            ::std::stringify!($method),
        )
    };
}

/// Dot-separated cassette identifier, e.g. `pkg.tests.Foo.test_bar.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CassetteName(String);

impl CassetteName {
    /// `<module>.<owner>.<method>.yaml`; Rust `::` module separators become `.`
    #[must_use]
    pub fn for_method(module: &str, owner: &Owner, method: &str) -> Self {
        let module = module.replace("::", ".");
        Self(format!(
            "{module}.{}.{method}.{CASSETTE_EXTENSION}",
            owner.as_str()
        ))
    }

    /// Wrap an existing name verbatim
    pub fn from_raw(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Namespace `name` under this cassette by inserting it just before the
    /// final (extension) component
    #[must_use]
    pub fn subcassette(&self, name: &str) -> Self {
        let mut components: Vec<&str> = self.0.split('.').collect();
        let at = components.len().saturating_sub(1);
        components.insert(at, name);
        Self(components.join("."))
    }

    /// Name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check that the name is safe to use as a file name
    ///
    /// # Errors
    ///
    /// Returns error if the name is empty, too long, or could escape the
    /// cassette directory
    pub fn validate(&self) -> Result<()> {
        let name = self.0.as_str();

        if name.is_empty() {
            return Err(VcrError::InvalidCassetteName(
                "Cassette name cannot be empty".to_string(),
            ));
        }

        if name.len() > MAX_NAME_LEN {
            return Err(VcrError::InvalidCassetteName(format!(
                "Cassette name too long: {} > {MAX_NAME_LEN}",
                name.len()
            )));
        }

        if name.contains('/') || name.contains('\\') {
            return Err(VcrError::InvalidCassetteName(format!(
                "Cassette name cannot contain path separators: {name}"
            )));
        }

        if name.starts_with('.') {
            return Err(VcrError::InvalidCassetteName(format!(
                "Cassette name cannot start with dot: {name}"
            )));
        }

        if name.contains('\0') {
            return Err(VcrError::InvalidCassetteName(
                "Cassette name cannot contain null bytes".to_string(),
            ));
        }

        if name.contains("..") {
            return Err(VcrError::InvalidCassetteName(format!(
                "Cassette name cannot contain '..': {name}"
            )));
        }

        Ok(())
    }
}

impl fmt::Display for CassetteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CassetteName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
