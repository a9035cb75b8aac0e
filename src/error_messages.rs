// Author: dWallet Labs, Ltd.
// SPDX-License-Identifier: BSD-3-Clause-Clear
use std::fmt;

use tracing::warn;

/// Accumulates verification failures under a tree of named locations, so that a decryption can
/// report every proof it failed to verify instead of just the first.
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct ErrorMessages {
    location: String,
    messages: Vec<String>,
    nested: Vec<ErrorMessages>,
}

impl ErrorMessages {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Default::default()
        }
    }

    pub fn add(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(location = %self.location, "{message}");

        self.messages.push(message);
    }

    /// Opens a child location and returns it for recording.
    pub fn nested(&mut self, location: impl Into<String>) -> &mut ErrorMessages {
        let index = self.nested.len();
        self.nested.push(Self::new(location));

        &mut self.nested[index]
    }

    pub fn has_errors(&self) -> bool {
        !self.messages.is_empty() || self.nested.iter().any(ErrorMessages::has_errors)
    }

    /// Every recorded message, paired with the full path of the location it was recorded under.
    pub fn errors(&self) -> Vec<(String, String)> {
        let mut errors = Vec::new();
        self.collect_errors(&self.location, &mut errors);

        errors
    }

    fn collect_errors(&self, path: &str, errors: &mut Vec<(String, String)>) {
        errors.extend(
            self.messages
                .iter()
                .map(|message| (path.to_string(), message.clone())),
        );

        for nested in &self.nested {
            nested.collect_errors(&format!("{path}/{}", nested.location), errors);
        }
    }
}

impl fmt::Display for ErrorMessages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_errors() {
            return write!(f, "{}: no errors", self.location);
        }

        for (i, (path, message)) in self.errors().iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{path}: {message}")?;
        }

        Ok(())
    }
}
