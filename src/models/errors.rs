//! Validation errors attached to records and login attempts

use serde::Serialize;

/// A single validation message, either on a field or on the object as a whole
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: Option<String>,
    pub message: String,
}

/// Ordered collection of validation messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    entries: Vec<ValidationError>,
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a message to a field
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.entries.push(ValidationError {
            field: Some(field.to_string()),
            message: message.into(),
        });
    }

    /// Attach a message to the object as a whole
    pub fn add_to_base(&mut self, message: impl Into<String>) {
        self.entries.push(ValidationError {
            field: None,
            message: message.into(),
        });
    }

    /// Messages attached to `field`
    #[must_use]
    pub fn on(&self, field: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.field.as_deref() == Some(field))
            .map(|e| e.message.as_str())
            .collect()
    }

    /// Messages attached to the object as a whole
    #[must_use]
    pub fn on_base(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.field.is_none())
            .map(|e| e.message.as_str())
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.entries.iter()
    }

    /// Human readable messages, field messages prefixed with the field name
    #[must_use]
    pub fn full_messages(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| match &e.field {
                Some(field) => format!("{} {}", humanize(field), e.message),
                None => e.message.clone(),
            })
            .collect()
    }
}

fn humanize(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
