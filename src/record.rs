//! Display records produced by the catalog.
//!
//! A [`Record`] is an ordered list of named display values. It is what every
//! catalog stream yields and what the picker renders as one table row.

use std::fmt;

use serde_json::Value;

/// One row of named display fields, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Append a field, keeping insertion order.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Look up a field value by column name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Build a record from one element of an operation's result collection.
    ///
    /// Objects become one field per property, in response order. Any other
    /// value becomes a single field called `name`.
    pub fn from_json(value: &Value, name: &str) -> Self {
        match value {
            Value::Object(map) => map
                .iter()
                .map(|(key, value)| (key.clone(), display_value(value)))
                .collect(),
            other => Self::new().with(name, display_value(other)),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}}")
    }
}

/// Strings are shown verbatim, everything else as compact JSON.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_display_matches_key_value_form() {
        let record = Record::new().with("Name", "b");
        assert_eq!(record.to_string(), "{Name: b}");

        let record = Record::new().with("Service", "demo").with("Description", "Demo Service");
        assert_eq!(record.to_string(), "{Service: demo, Description: Demo Service}");

        assert_eq!(Record::new().to_string(), "{}");
    }

    #[test]
    fn test_from_json_object_keeps_response_order() {
        let value = json!({"Zeta": "z", "Alpha": 1, "Tags": [{"Key": "env"}], "Gone": null});
        let record = Record::from_json(&value, "Things");

        let names: Vec<&str> = record.names().collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Tags", "Gone"]);
        assert_eq!(record.get("Zeta"), Some("z"));
        assert_eq!(record.get("Alpha"), Some("1"));
        assert_eq!(record.get("Tags"), Some(r#"[{"Key":"env"}]"#));
        assert_eq!(record.get("Gone"), Some(""));
    }

    #[test]
    fn test_from_json_scalar_uses_collection_name() {
        let record = Record::from_json(&json!("orders-table"), "TableNames");
        assert_eq!(record, Record::new().with("TableNames", "orders-table"));
    }

    #[test]
    fn test_get_missing_field() {
        let record: Record = [("Operation", "ListThings")].into_iter().collect();
        assert_eq!(record.get("Operation"), Some("ListThings"));
        assert_eq!(record.get("Service"), None);
    }
}
