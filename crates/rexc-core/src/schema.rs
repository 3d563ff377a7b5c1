//! Internal value types and output schemas. Pure data.
//!
//! `TypeInfo` is what every converted expression node carries; `NodeSchema`
//! is the ordered output row shape handed to the plan-node builder.

use serde::{Deserialize, Serialize};

use crate::expr::Expr;

/// Engine value-type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Not resolved yet. Never survives a finished conversion.
    Invalid,
    Null,
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Decimal,
    String,
    VarBinary,
    /// Microseconds since the Unix epoch.
    Timestamp,
}

impl ValueType {
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ValueType::TinyInt | ValueType::SmallInt | ValueType::Integer | ValueType::BigInt
        )
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || matches!(self, ValueType::Float | ValueType::Decimal)
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::Invalid => "INVALID",
            ValueType::Null => "NULL",
            ValueType::Boolean => "BOOLEAN",
            ValueType::TinyInt => "TINYINT",
            ValueType::SmallInt => "SMALLINT",
            ValueType::Integer => "INTEGER",
            ValueType::BigInt => "BIGINT",
            ValueType::Float => "FLOAT",
            ValueType::Decimal => "DECIMAL",
            ValueType::String => "VARCHAR",
            ValueType::VarBinary => "VARBINARY",
            ValueType::Timestamp => "TIMESTAMP",
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A value type plus its width/precision/scale and unit convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeInfo {
    pub value_type: ValueType,
    /// Declared width for VARCHAR (characters) and VARBINARY (bytes).
    pub width: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub nullable: bool,
    /// Set for interval types: the value is a BIGINT count of microseconds
    /// and arithmetic against a TIMESTAMP needs microsecond wrapping.
    pub interval: bool,
}

impl TypeInfo {
    pub const fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            width: None,
            precision: None,
            scale: None,
            nullable: true,
            interval: false,
        }
    }

    pub const fn invalid() -> Self {
        Self::new(ValueType::Invalid)
    }

    pub const fn boolean() -> Self {
        Self::new(ValueType::Boolean)
    }

    pub const fn bigint() -> Self {
        Self::new(ValueType::BigInt)
    }

    pub const fn timestamp() -> Self {
        Self::new(ValueType::Timestamp)
    }

    pub const fn decimal(precision: u32, scale: u32) -> Self {
        Self {
            precision: Some(precision),
            scale: Some(scale),
            ..Self::new(ValueType::Decimal)
        }
    }

    pub const fn interval() -> Self {
        Self {
            interval: true,
            ..Self::new(ValueType::BigInt)
        }
    }

    pub fn with_width(mut self, width: Option<u32>) -> Self {
        self.width = width;
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn is_invalid(&self) -> bool {
        self.value_type == ValueType::Invalid
    }

    pub fn is_timestamp(&self) -> bool {
        self.value_type == ValueType::Timestamp
    }
}

impl Default for TypeInfo {
    fn default() -> Self {
        Self::invalid()
    }
}

/// One output column of a plan node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaColumn {
    /// Output name (alias) of the column.
    pub name: String,
    /// Originating table; empty when the column is computed.
    pub table_name: String,
    /// Originating column; empty when the column is computed.
    pub column_name: String,
    /// Position in the output row, always equal to the index in `NodeSchema`.
    pub ordinal: usize,
    pub expr: Expr,
}

impl SchemaColumn {
    pub fn computed(name: impl Into<String>, ordinal: usize, expr: Expr) -> Self {
        Self {
            name: name.into(),
            table_name: String::new(),
            column_name: String::new(),
            ordinal,
            expr,
        }
    }

    pub fn value_type(&self) -> TypeInfo {
        self.expr.type_info()
    }
}

/// Ordered output columns. Order is the output row shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSchema {
    pub columns: Vec<SchemaColumn>,
}

impl NodeSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column; its ordinal is forced to the next position.
    pub fn push(&mut self, mut column: SchemaColumn) {
        column.ordinal = self.columns.len();
        self.columns.push(column);
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, idx: usize) -> Option<&SchemaColumn> {
        self.columns.get(idx)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;

    #[test]
    fn push_assigns_positional_ordinals() {
        let mut schema = NodeSchema::new();
        schema.push(SchemaColumn::computed(
            "a",
            7,
            Expr::tuple_ref("", "a", 0, 0, TypeInfo::bigint()),
        ));
        schema.push(SchemaColumn::computed(
            "b",
            0,
            Expr::tuple_ref("", "b", 1, 0, TypeInfo::boolean()),
        ));
        let ordinals: Vec<usize> = schema.columns.iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1]);
        assert_eq!(schema.index_of("b"), Some(1));
        assert_eq!(schema.column(1).unwrap().value_type(), TypeInfo::boolean());
    }

    #[test]
    fn interval_is_tagged_bigint() {
        let t = TypeInfo::interval();
        assert_eq!(t.value_type, ValueType::BigInt);
        assert!(t.interval);
        assert!(t.value_type.is_integer());
    }
}
