use prost_types::value::Kind;

/// Extract a string field from a prost_types::Struct.
pub fn get_string(struct_value: &prost_types::Struct, field_name: &str) -> Option<String> {
    struct_value.fields.get(field_name).and_then(|f| match &f.kind {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    })
}

/// Extract a u64 field. The fullnode renders u64 as a decimal string, but
/// small numbers may arrive as doubles.
pub fn get_u64(struct_value: &prost_types::Struct, field_name: &str) -> Option<u64> {
    struct_value.fields.get(field_name).and_then(|f| match &f.kind {
        Some(Kind::StringValue(s)) => s.parse::<u64>().ok(),
        Some(Kind::NumberValue(n)) => Some(n.round() as u64),
        _ => None,
    })
}

/// Extract a boolean field, accepting string renderings.
pub fn get_bool(struct_value: &prost_types::Struct, field_name: &str) -> Option<bool> {
    struct_value.fields.get(field_name).and_then(|f| match &f.kind {
        Some(Kind::BoolValue(b)) => Some(*b),
        Some(Kind::StringValue(s)) => Some(s.to_lowercase() == "true"),
        _ => None,
    })
}

/// Extract a nested struct field (e.g. the `media` sub-object of a moment).
pub fn get_struct<'a>(
    struct_value: &'a prost_types::Struct,
    field_name: &str,
) -> Option<&'a prost_types::Struct> {
    struct_value.fields.get(field_name).and_then(|f| match &f.kind {
        Some(Kind::StructValue(s)) => Some(s),
        _ => None,
    })
}

/// Convert a proto value to serde_json::Value.
pub fn proto_to_json(value: &prost_types::Value) -> serde_json::Value {
    match &value.kind {
        Some(Kind::StringValue(s)) => serde_json::Value::String(s.clone()),
        Some(Kind::NumberValue(n)) => serde_json::Value::Number(
            serde_json::Number::from_f64(*n).unwrap_or_else(|| serde_json::Number::from(0)),
        ),
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(*b),
        Some(Kind::NullValue(_)) => serde_json::Value::Null,
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.iter().map(proto_to_json).collect())
        }
        Some(Kind::StructValue(s)) => {
            let map: serde_json::Map<String, serde_json::Value> = s
                .fields
                .iter()
                .map(|(k, v)| (k.clone(), proto_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
        None => serde_json::Value::Null,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use prost_types::value::Kind;
    use std::collections::BTreeMap;

    pub fn string_value(s: &str) -> prost_types::Value {
        prost_types::Value {
            kind: Some(Kind::StringValue(s.to_string())),
        }
    }

    pub fn bool_value(b: bool) -> prost_types::Value {
        prost_types::Value {
            kind: Some(Kind::BoolValue(b)),
        }
    }

    pub fn struct_value(fields: Vec<(&str, prost_types::Value)>) -> prost_types::Struct {
        let fields: BTreeMap<String, prost_types::Value> = fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        prost_types::Struct { fields }
    }

    pub fn nested(fields: Vec<(&str, prost_types::Value)>) -> prost_types::Value {
        prost_types::Value {
            kind: Some(Kind::StructValue(struct_value(fields))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn reads_typed_fields() {
        let s = struct_value(vec![
            ("name", string_value("KO")),
            ("max_supply", string_value("1000")),
            ("is_active", bool_value(true)),
        ]);
        assert_eq!(get_string(&s, "name").as_deref(), Some("KO"));
        assert_eq!(get_u64(&s, "max_supply"), Some(1000));
        assert_eq!(get_bool(&s, "is_active"), Some(true));
        assert_eq!(get_string(&s, "missing"), None);
        assert_eq!(get_u64(&s, "name"), None);
    }

    #[test]
    fn reads_nested_struct() {
        let s = struct_value(vec![(
            "media",
            nested(vec![("video_uri", string_value("walrus://abc"))]),
        )]);
        let media = get_struct(&s, "media").unwrap();
        assert_eq!(get_string(media, "video_uri").as_deref(), Some("walrus://abc"));
        assert!(get_struct(&s, "missing").is_none());
    }

    #[test]
    fn proto_json_conversion() {
        let s = struct_value(vec![
            ("id", string_value("0x1")),
            ("flags", nested(vec![("active", bool_value(false))])),
        ]);
        let json = proto_to_json(&prost_types::Value {
            kind: Some(prost_types::value::Kind::StructValue(s)),
        });
        assert_eq!(json["id"], "0x1");
        assert_eq!(json["flags"]["active"], false);
    }
}
