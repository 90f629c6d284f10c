//! Simple-registration profile data returned by the provider

use crate::models::record::UserRecord;
use crate::models::schema::{FIRST_NAME_FIELD, LAST_NAME_FIELD, NAME_FIELD};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const FULLNAME: &str = "fullname";
pub const EMAIL: &str = "email";
pub const NICKNAME: &str = "nickname";

/// Profile fields keyed by their registration name (`fullname`, `email`, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileFields(BTreeMap<String, String>);

impl ProfileFields {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.0.insert(key.to_string(), value.to_string());
    }

    /// Value of a registration field, ignoring blank values
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy profile data onto `record` without overwriting anything already
    /// filled in. Returns the record fields that were set.
    pub fn fill_absent(&self, record: &mut UserRecord) -> Vec<String> {
        let mut filled = Vec::new();
        let schema = record.schema_handle();

        if let Some(fullname) = self.get(FULLNAME) {
            let (first, last) = split_full_name(fullname);
            fill(record, NAME_FIELD, Some(fullname), &mut filled);
            fill(record, FIRST_NAME_FIELD, first, &mut filled);
            fill(record, LAST_NAME_FIELD, last, &mut filled);
        }
        if let Some(field) = schema.email_field() {
            fill(record, field, self.get(EMAIL), &mut filled);
        }
        if let Some(field) = schema.login_field() {
            fill(record, field, self.get(NICKNAME), &mut filled);
        }

        if !filled.is_empty() {
            debug!("Filled {filled:?} from OpenID registration data");
        }
        filled
    }
}

fn fill(record: &mut UserRecord, field: &str, value: Option<&str>, filled: &mut Vec<String>) {
    let Some(value) = value else { return };
    if !record.schema().has_field(field) || !record.is_blank(field) {
        return;
    }
    if record.set(field, Some(value.to_string())).is_ok() {
        filled.push(field.to_string());
    }
}

/// Split a full name at its first run of whitespace
fn split_full_name(fullname: &str) -> (Option<&str>, Option<&str>) {
    let trimmed = fullname.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some((first, rest)) => {
            let rest = rest.trim_start();
            (Some(first), (!rest.is_empty()).then_some(rest))
        }
        None if trimmed.is_empty() => (None, None),
        None => (Some(trimmed), None),
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ProfileFields {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::schema::RecordSchema;
    use std::sync::Arc;

    fn user() -> UserRecord {
        UserRecord::new(Arc::new(RecordSchema::users()))
    }

    #[test]
    fn test_split_full_name() {
        assert_eq!(split_full_name("Ada Lovelace"), (Some("Ada"), Some("Lovelace")));
        assert_eq!(
            split_full_name("Ada   King Lovelace"),
            (Some("Ada"), Some("King Lovelace"))
        );
        assert_eq!(split_full_name("Ada"), (Some("Ada"), None));
        assert_eq!(split_full_name("   "), (None, None));
    }

    #[test]
    fn test_fullname_fills_empty_name_fields() {
        let mut record = user();
        let profile = ProfileFields::new().with(FULLNAME, "Ada Lovelace");

        let filled = profile.fill_absent(&mut record);

        assert_eq!(record.get("name"), Some("Ada Lovelace"));
        assert_eq!(record.get("first_name"), Some("Ada"));
        assert_eq!(record.get("last_name"), Some("Lovelace"));
        assert_eq!(filled, vec!["name", "first_name", "last_name"]);
    }

    #[test]
    fn test_existing_values_are_never_overwritten() {
        let mut record = user();
        record.set("name", Some("A. L.".to_string())).unwrap();
        record.set("last_name", Some("King".to_string())).unwrap();
        let profile = ProfileFields::new().with(FULLNAME, "Ada Lovelace");

        profile.fill_absent(&mut record);

        assert_eq!(record.get("name"), Some("A. L."));
        assert_eq!(record.get("first_name"), Some("Ada"));
        assert_eq!(record.get("last_name"), Some("King"));
    }

    #[test]
    fn test_email_and_nickname_map_to_schema_fields() {
        let mut record = user();
        record.set("login", Some("countess".to_string())).unwrap();
        let profile: ProfileFields = [(EMAIL, "ada@example.com"), (NICKNAME, "ada")]
            .into_iter()
            .collect();

        profile.fill_absent(&mut record);

        assert_eq!(record.get("email"), Some("ada@example.com"));
        assert_eq!(record.get("login"), Some("countess"));
    }

    #[test]
    fn test_missing_columns_are_ignored() {
        let schema = RecordSchema::new("members", ["email", "openid_identifier"]);
        let mut record = UserRecord::new(Arc::new(schema));
        let profile = ProfileFields::new().with(FULLNAME, "Ada Lovelace");

        assert!(profile.fill_absent(&mut record).is_empty());
        assert!(record.get("name").is_none());
    }
}
