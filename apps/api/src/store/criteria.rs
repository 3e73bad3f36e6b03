use std::collections::{BTreeMap, HashMap};

use bson::{doc, oid::ObjectId, Bson, Document};
use serde_json::Value;

use crate::store::StoreError;

/// Equality criteria for listing Farmers, built from a URL query string.
///
/// Values arrive as text; a term matches a stored string equal to it, or a
/// stored number/boolean whose value it parses to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    terms: BTreeMap<String, String>,
}

impl Criteria {
    pub fn from_query(params: HashMap<String, String>) -> Result<Self, StoreError> {
        let mut terms = BTreeMap::new();
        for (key, value) in params {
            if key.is_empty() || key.starts_with('$') || key.contains('.') {
                return Err(StoreError::Validation(format!(
                    "Invalid query field \"{key}\""
                )));
            }
            terms.insert(key, value);
        }
        Ok(Self { terms })
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Evaluates the criteria against a record rendered as JSON.
    pub fn matches(&self, record: &serde_json::Map<String, Value>) -> bool {
        self.terms.iter().all(|(key, raw)| {
            record
                .get(key)
                .is_some_and(|field| value_matches(field, raw))
        })
    }

    /// Equivalent MongoDB filter.
    pub fn to_filter(&self) -> Document {
        let mut filter = Document::new();
        for (key, raw) in &self.terms {
            filter.insert(key.clone(), doc! { "$in": candidates(key, raw) });
        }
        filter
    }
}

fn value_matches(field: &Value, raw: &str) -> bool {
    match field {
        Value::String(s) => s == raw,
        Value::Bool(b) => raw.parse::<bool>().is_ok_and(|r| r == *b),
        Value::Number(n) => match (n.as_f64(), raw.parse::<f64>()) {
            (Some(stored), Ok(wanted)) => stored == wanted,
            _ => false,
        },
        _ => false,
    }
}

fn candidates(key: &str, raw: &str) -> Vec<Bson> {
    let mut out = vec![Bson::String(raw.to_string())];
    if key == "_id" {
        if let Ok(oid) = ObjectId::parse_str(raw) {
            out.push(Bson::ObjectId(oid));
        }
    }
    if let Ok(n) = raw.parse::<i64>() {
        out.push(Bson::Int64(n));
    } else if let Ok(n) = raw.parse::<f64>() {
        if n.is_finite() {
            out.push(Bson::Double(n));
        }
    }
    if let Ok(b) = raw.parse::<bool>() {
        out.push(Bson::Boolean(b));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn criteria(pairs: &[(&str, &str)]) -> Result<Criteria, StoreError> {
        Criteria::from_query(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_operator_keys_are_rejected() {
        assert!(matches!(
            criteria(&[("$where", "1")]),
            Err(StoreError::Validation(_))
        ));
        assert!(criteria(&[("fr_farms.fr_name", "x")]).is_err());
    }

    #[test]
    fn test_matches_strings_numbers_and_bools() {
        let record = json!({"fa_parish": "Clarendon", "fa_acres": 12, "fa_active": true});
        let record = record.as_object().unwrap();

        assert!(criteria(&[("fa_parish", "Clarendon")]).unwrap().matches(record));
        assert!(criteria(&[("fa_acres", "12")]).unwrap().matches(record));
        assert!(criteria(&[("fa_active", "true")]).unwrap().matches(record));
        assert!(!criteria(&[("fa_parish", "Manchester")]).unwrap().matches(record));
        assert!(!criteria(&[("fa_missing", "x")]).unwrap().matches(record));
    }

    #[test]
    fn test_empty_criteria_matches_everything() {
        let c = criteria(&[]).unwrap();
        assert!(c.is_empty());
        assert!(c.matches(json!({}).as_object().unwrap()));
        assert!(c.to_filter().is_empty());
    }

    #[test]
    fn test_filter_offers_typed_candidates() {
        let filter = criteria(&[("fa_acres", "12")]).unwrap().to_filter();
        let wanted = filter.get_document("fa_acres").unwrap().get_array("$in").unwrap();
        assert_eq!(wanted, &vec![Bson::String("12".into()), Bson::Int64(12)]);
    }
}
