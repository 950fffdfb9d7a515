use hopflow::{EngineError, ErrorFields, ErrorRow, FieldType, Row, RowSchema, Value};
use std::sync::Arc;

fn schema() -> Arc<RowSchema> {
    RowSchema::of(&[
        ("id", FieldType::Integer),
        ("name", FieldType::String),
        ("price", FieldType::Decimal),
    ])
}

fn row() -> Row {
    Row::new(
        schema(),
        vec![
            Value::Integer(1),
            Value::from("widget"),
            Value::Decimal {
                mantissa: 1999,
                scale: 2,
            },
        ],
    )
    .unwrap()
}

// --- Row ---

#[test]
fn test_row_checks_arity() {
    let err = Row::new(schema(), vec![Value::Integer(1)]).unwrap_err();
    assert!(matches!(err, EngineError::InvalidRow(_)));
}

#[test]
fn test_row_checks_types() {
    let err = Row::new(
        schema(),
        vec![Value::from("1"), Value::from("widget"), Value::Null],
    )
    .unwrap_err();
    assert!(err.to_string().contains("'id'"));
}

#[test]
fn test_null_conforms_to_any_type() {
    let r = Row::new(schema(), vec![Value::Null, Value::Null, Value::Null]).unwrap();
    assert!(r.values().iter().all(Value::is_null));
}

#[test]
fn test_row_lookup_and_display() {
    let r = row();
    assert_eq!(r.get_by_name("name").and_then(Value::as_str), Some("widget"));
    assert!(r.get_by_name("missing").is_none());
    assert_eq!(r.to_string(), "id=1, name=widget, price=19.99");
}

#[test]
fn test_decimal_display() {
    let small = Value::Decimal {
        mantissa: -5,
        scale: 3,
    };
    assert_eq!(small.to_string(), "-0.005");
    let whole = Value::Decimal {
        mantissa: 42,
        scale: 0,
    };
    assert_eq!(whole.to_string(), "42");
}

// --- ErrorRow ---

#[test]
fn test_error_row_appends_error_fields() {
    let mut err = ErrorRow::new(row(), "E42", "price out of range").with_field("price");
    err.node = "validate".to_string();
    let flat = err.clone().into_row().unwrap();

    assert_eq!(flat.len(), 3 + ErrorFields::metas().len());
    assert_eq!(
        flat.get_by_name(ErrorFields::CODE).and_then(Value::as_str),
        Some("E42")
    );
    assert_eq!(
        flat.get_by_name(ErrorFields::COUNT).and_then(Value::as_i64),
        Some(1)
    );
    assert_eq!(ErrorRow::from_row(&flat), Some(err));
}

#[test]
fn test_from_row_ignores_plain_rows() {
    assert!(ErrorRow::from_row(&row()).is_none());
}

#[test]
fn test_error_field_is_null_when_unknown() {
    let flat = ErrorRow::new(row(), "E1", "bad").into_row().unwrap();
    assert_eq!(flat.get_by_name(ErrorFields::FIELD), Some(&Value::Null));
    assert_eq!(ErrorRow::from_row(&flat).unwrap().field, None);
}

#[test]
fn test_schema_extended_keeps_order() {
    let extended = ErrorRow::schema_for(&schema());
    assert_eq!(extended.index_of("id"), Some(0));
    assert_eq!(extended.index_of(ErrorFields::NODE), Some(3));
    assert_eq!(extended.field(7).map(|f| f.name.as_str()), Some(ErrorFields::FIELD));
}
