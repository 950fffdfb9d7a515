//! Row data model: values, field descriptors, schemas, rows and error rows.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::EngineError;

/// Type of a field in a [`RowSchema`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Binary,
    Decimal,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Binary => "binary",
            FieldType::Decimal => "decimal",
        };
        f.write_str(s)
    }
}

/// One typed value in a row. `Null` conforms to every [`FieldType`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDateTime),
    Binary(Vec<u8>),
    /// Fixed-point decimal: `mantissa * 10^-scale`.
    Decimal { mantissa: i128, scale: u32 },
}

impl Value {
    /// Field type of this value, or `None` for `Null`.
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            Value::Null => None,
            Value::String(_) => Some(FieldType::String),
            Value::Integer(_) => Some(FieldType::Integer),
            Value::Float(_) => Some(FieldType::Float),
            Value::Boolean(_) => Some(FieldType::Boolean),
            Value::Date(_) => Some(FieldType::Date),
            Value::Binary(_) => Some(FieldType::Binary),
            Value::Decimal { .. } => Some(FieldType::Decimal),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True if this value may be stored in a field of type `ty`.
    pub fn conforms_to(&self, ty: FieldType) -> bool {
        self.field_type().is_none_or(|t| t == ty)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("<null>"),
            Value::String(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y/%m/%d %H:%M:%S%.3f")),
            Value::Binary(b) => write!(f, "<{} bytes>", b.len()),
            Value::Decimal { mantissa, scale } => {
                if *scale == 0 {
                    return write!(f, "{mantissa}");
                }
                let sign = if *mantissa < 0 { "-" } else { "" };
                let digits = mantissa.unsigned_abs().to_string();
                let scale = *scale as usize;
                let padded = format!("{digits:0>width$}", width = scale + 1);
                let (int_part, frac_part) = padded.split_at(padded.len() - scale);
                write!(f, "{sign}{int_part}.{frac_part}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

/// Named, typed field descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl FieldMeta {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Ordered field layout shared by every row on one channel.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowSchema {
    fields: Vec<FieldMeta>,
}

impl RowSchema {
    pub fn new(fields: Vec<FieldMeta>) -> Self {
        Self { fields }
    }

    /// Convenience for building a schema from `(name, type)` pairs.
    pub fn of(fields: &[(&str, FieldType)]) -> Arc<Self> {
        Arc::new(Self::new(
            fields
                .iter()
                .map(|(name, ty)| FieldMeta::new(*name, *ty))
                .collect(),
        ))
    }

    pub fn fields(&self) -> &[FieldMeta] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field(&self, idx: usize) -> Option<&FieldMeta> {
        self.fields.get(idx)
    }

    /// New schema with `extra` appended after this schema's fields.
    pub fn extended(&self, extra: &[FieldMeta]) -> RowSchema {
        let mut fields = self.fields.clone();
        fields.extend(extra.iter().cloned());
        RowSchema { fields }
    }
}

impl fmt::Display for RowSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", field.name, field.field_type)?;
        }
        f.write_str("]")
    }
}

/// An immutable, schema-conforming row.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    schema: Arc<RowSchema>,
    values: Arc<[Value]>,
}

impl Row {
    /// Build a row, checking arity and types against `schema`.
    pub fn new(schema: Arc<RowSchema>, values: Vec<Value>) -> Result<Self, EngineError> {
        if values.len() != schema.len() {
            return Err(EngineError::InvalidRow(format!(
                "row has {} values but schema {} has {} fields",
                values.len(),
                schema,
                schema.len()
            )));
        }
        for (value, field) in values.iter().zip(schema.fields()) {
            if !value.conforms_to(field.field_type) {
                return Err(EngineError::InvalidRow(format!(
                    "field '{}' is {} but got value {:?}",
                    field.name, field.field_type, value
                )));
            }
        }
        Ok(Self {
            schema,
            values: values.into(),
        })
    }

    pub fn schema(&self) -> &Arc<RowSchema> {
        &self.schema
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Value of the field called `name`.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.schema.index_of(name).and_then(|i| self.values.get(i))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, value)) in self.schema.fields().iter().zip(self.values.iter()).enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", field.name, value)?;
        }
        Ok(())
    }
}

/// Names of the fields appended to a row when it travels down an error hop.
pub struct ErrorFields;

impl ErrorFields {
    pub const NODE: &'static str = "error_node";
    pub const COUNT: &'static str = "error_count";
    pub const CODE: &'static str = "error_code";
    pub const MESSAGE: &'static str = "error_message";
    pub const FIELD: &'static str = "error_field";

    pub fn metas() -> [FieldMeta; 5] {
        [
            FieldMeta::new(Self::NODE, FieldType::String),
            FieldMeta::new(Self::COUNT, FieldType::Integer),
            FieldMeta::new(Self::CODE, FieldType::String),
            FieldMeta::new(Self::MESSAGE, FieldType::String),
            FieldMeta::new(Self::FIELD, FieldType::String),
        ]
    }
}

/// A row that failed node-local processing, with failure metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorRow {
    pub row: Row,
    /// Name of the node that rejected the row. Filled in by the engine if left empty.
    pub node: String,
    pub nr_errors: u64,
    pub code: String,
    pub message: String,
    /// Offending field, when known.
    pub field: Option<String>,
}

impl ErrorRow {
    pub fn new(row: Row, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            row,
            node: String::new(),
            nr_errors: 1,
            code: code.into(),
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Schema of rows produced by [`Self::into_row`] for input rows of `schema`.
    pub fn schema_for(schema: &RowSchema) -> RowSchema {
        schema.extended(&ErrorFields::metas())
    }

    /// Flatten into an ordinary row: the original values followed by the error fields.
    /// `schema` must be [`Self::schema_for`] of the original row's schema.
    pub fn into_row_with(self, schema: Arc<RowSchema>) -> Result<Row, EngineError> {
        let mut values = self.row.values().to_vec();
        values.push(Value::String(self.node));
        values.push(Value::Integer(self.nr_errors as i64));
        values.push(Value::String(self.code));
        values.push(Value::String(self.message));
        values.push(self.field.map(Value::String).unwrap_or(Value::Null));
        Row::new(schema, values)
    }

    pub fn into_row(self) -> Result<Row, EngineError> {
        let schema = Arc::new(Self::schema_for(self.row.schema()));
        self.into_row_with(schema)
    }

    /// Split a row received from an error hop back into the original row and its failure metadata.
    pub fn from_row(row: &Row) -> Option<ErrorRow> {
        let n = row.len();
        let metas = ErrorFields::metas();
        if n < metas.len() {
            return None;
        }
        let base = n - metas.len();
        let tail = &row.schema().fields()[base..];
        if tail != metas.as_slice() {
            return None;
        }
        let values = row.values();
        let schema = Arc::new(RowSchema::new(row.schema().fields()[..base].to_vec()));
        let original = Row::new(schema, values[..base].to_vec()).ok()?;
        Some(ErrorRow {
            row: original,
            node: values[base].as_str()?.to_string(),
            nr_errors: values[base + 1].as_i64()? as u64,
            code: values[base + 2].as_str()?.to_string(),
            message: values[base + 3].as_str()?.to_string(),
            field: values[base + 4].as_str().map(str::to_string),
        })
    }
}
