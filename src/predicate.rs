use std::fmt;
use std::sync::Arc;

use regex::Regex;

/// A described, pure test over a fetched value.
///
/// The description reads as a verb phrase ("match regex `...`") so that a
/// timeout can report "waiting for X to match regex `...`".
pub struct Predicate<T: ?Sized> {
    description: String,
    check: Arc<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T: ?Sized> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        Self {
            description: self.description.clone(),
            check: Arc::clone(&self.check),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("description", &self.description)
            .finish()
    }
}

impl<T: ?Sized> Predicate<T> {
    pub fn new(
        description: impl Into<String>,
        check: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            description: description.into(),
            check: Arc::new(check),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn holds(&self, value: &T) -> bool {
        (self.check)(value)
    }

    pub fn negate(self) -> Self
    where
        T: 'static,
    {
        let inner = self.check;
        Self {
            description: format!("not {}", self.description),
            check: Arc::new(move |v: &T| !inner(v)),
        }
    }
}

impl<T: fmt::Debug + PartialEq + Send + Sync + 'static> Predicate<T> {
    pub fn equals(expected: T) -> Self {
        let description = format!("equal {expected:?}");
        Self::new(description, move |v: &T| *v == expected)
    }
}

impl<T: 'static> Predicate<T> {
    /// Holds for any successfully fetched value.
    pub fn exists() -> Self {
        Self::new("exist", |_: &T| true)
    }
}

impl Predicate<String> {
    /// Unanchored regex search, so `.*Mapping not found.*` matches anywhere.
    pub fn matches_regex(pattern: &str) -> Result<Self, regex::Error> {
        let re = Regex::new(pattern)?;
        Ok(Self::new(format!("match regex `{pattern}`"), move |v: &String| {
            re.is_match(v)
        }))
    }

    pub fn not_matches_regex(pattern: &str) -> Result<Self, regex::Error> {
        let re = Regex::new(pattern)?;
        Ok(Self::new(
            format!("not match regex `{pattern}`"),
            move |v: &String| !re.is_match(v),
        ))
    }
}
