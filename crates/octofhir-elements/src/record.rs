//! Typed composite records produced by coercion.

use serde_json::{Map, Value};

use crate::schema::SchemaId;

/// One bound field value.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    Null,
    Primitive(Value),
    Composite(CompositeRecord),
    List(Vec<ElementValue>),
    Open(Value),
}

static NULL: ElementValue = ElementValue::Null;

impl ElementValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Primitive(v) => v.as_str(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Primitive(v) => v.as_f64(),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&CompositeRecord> {
        match self {
            Self::Composite(r) => Some(r),
            _ => None,
        }
    }

    /// Items of a list; a single value is treated as a one-item list.
    pub fn items(&self) -> &[ElementValue] {
        match self {
            Self::List(items) => items,
            Self::Null => &[],
            other => std::slice::from_ref(other),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Primitive(v) | Self::Open(v) => v.clone(),
            Self::Composite(r) => r.to_json(),
            Self::List(items) => Value::Array(items.iter().map(ElementValue::to_json).collect()),
        }
    }
}

/// An immutable instance of one composite datatype. Holds every declared
/// field in schema order; absent optionals are [`ElementValue::Null`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeRecord {
    schema: SchemaId,
    type_name: String,
    fields: Vec<(String, ElementValue)>,
}

impl CompositeRecord {
    pub(crate) fn new(schema: SchemaId, type_name: impl Into<String>, fields: Vec<(String, ElementValue)>) -> Self {
        Self {
            schema,
            type_name: type_name.into(),
            fields,
        }
    }

    pub fn schema(&self) -> SchemaId {
        self.schema
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &ElementValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == name)
    }

    /// Value of `name`, or `Null` for absent and undeclared fields.
    pub fn get(&self, name: &str) -> &ElementValue {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
            .unwrap_or(&NULL)
    }

    pub fn is_present(&self, name: &str) -> bool {
        !self.get(name).is_null()
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).as_str()
    }

    pub fn decimal(&self, name: &str) -> Option<f64> {
        self.get(name).as_f64()
    }

    pub fn record(&self, name: &str) -> Option<&CompositeRecord> {
        self.get(name).as_record()
    }

    pub fn items(&self, name: &str) -> &[ElementValue] {
        self.get(name).items()
    }

    /// String items of a `string 0..*` field (or a single string).
    pub fn strings(&self, name: &str) -> Vec<&str> {
        self.items(name).iter().filter_map(ElementValue::as_str).collect()
    }

    pub fn records(&self, name: &str) -> Vec<&CompositeRecord> {
        self.items(name).iter().filter_map(ElementValue::as_record).collect()
    }

    /// Column form: every declared field, `null` where absent.
    pub fn to_json(&self) -> Value {
        let mut map = Map::with_capacity(self.fields.len());
        for (k, v) in &self.fields {
            map.insert(k.clone(), v.to_json());
        }
        Value::Object(map)
    }
}

/// Drops `null` members and empty containers left behind, recursively.
pub fn prune_nulls(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let pruned: Map<String, Value> = map
                .iter()
                .filter_map(|(k, v)| prune_nulls(v).map(|v| (k.clone(), v)))
                .collect();
            (!pruned.is_empty()).then_some(Value::Object(pruned))
        }
        Value::Array(items) => {
            let pruned: Vec<Value> = items.iter().filter_map(prune_nulls).collect();
            (!pruned.is_empty()).then_some(Value::Array(pruned))
        }
        other => Some(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn period() -> CompositeRecord {
        CompositeRecord::new(
            SchemaId(0),
            "Period",
            vec![
                ("id".into(), ElementValue::Null),
                ("start".into(), ElementValue::Primitive(json!("2020-01-01"))),
                ("end".into(), ElementValue::Null),
            ],
        )
    }

    #[test]
    fn accessors() {
        let p = period();
        assert_eq!(p.str("start"), Some("2020-01-01"));
        assert!(p.get("end").is_null());
        assert!(p.get("undeclared").is_null());
        assert!(p.has_field("end"));
        assert!(!p.has_field("undeclared"));
        assert!(p.items("end").is_empty());
        assert_eq!(p.items("start").len(), 1);
    }

    #[test]
    fn column_form_keeps_nulls_and_prune_removes_them() {
        let p = period();
        let column = p.to_json();
        assert_eq!(column, json!({"id": null, "start": "2020-01-01", "end": null}));
        assert_eq!(prune_nulls(&column), Some(json!({"start": "2020-01-01"})));
        assert_eq!(prune_nulls(&json!({"a": {"b": null}, "c": [null]})), None);
    }
}
