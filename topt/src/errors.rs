//! Collation of verification failures.

/// An ordered bag of failure messages with insertion order preserved.
/// No deduplication; a single verification may report several failures.
#[derive(Debug, Clone, Default)]
pub struct Errors {
    errs: Vec<String>,
}

impl Errors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, msg: impl Into<String>) {
        self.errs.push(msg.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errs.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.errs.iter().map(String::as_str)
    }
}

impl std::fmt::Display for Errors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for e in &self.errs {
            writeln!(f, "{e}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Errors {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.errs.iter()
    }
}
