//! The optimizer's relational-expression model, as the compiler sees it.
//!
//! This is the input side: a closed set of node kinds, read-only during
//! conversion. It is serde-friendly so statements can be described in YAML
//! or JSON and fed to the planner without the optimizer in the loop.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// External SQL type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlTypeName {
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Decimal,
    Float,
    Real,
    Double,
    Date,
    Time,
    Timestamp,
    #[serde(rename = "INTERVAL_YEAR_MONTH")]
    IntervalYearMonth,
    #[serde(rename = "INTERVAL_DAY_TIME")]
    IntervalDayTime,
    Char,
    Varchar,
    Binary,
    Varbinary,
    Null,
    Any,
    Symbol,
    Array,
    Map,
}

impl SqlTypeName {
    pub fn is_interval(self) -> bool {
        matches!(
            self,
            SqlTypeName::IntervalYearMonth | SqlTypeName::IntervalDayTime
        )
    }
}

fn default_nullable() -> bool {
    true
}

/// External type descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelType {
    pub kind: SqlTypeName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

impl RelType {
    pub const fn new(kind: SqlTypeName) -> Self {
        Self {
            kind,
            precision: None,
            scale: None,
            nullable: true,
        }
    }

    pub const fn decimal(precision: u32, scale: u32) -> Self {
        Self {
            kind: SqlTypeName::Decimal,
            precision: Some(precision),
            scale: Some(scale),
            nullable: true,
        }
    }

    pub const fn varchar(width: u32) -> Self {
        Self {
            kind: SqlTypeName::Varchar,
            precision: Some(width),
            scale: None,
            nullable: true,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn is_interval(&self) -> bool {
        self.kind.is_interval()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: RelType,
}

impl RelField {
    pub fn new(name: impl Into<String>, ty: RelType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Row type of a relation: ordered named fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowType {
    pub fields: Vec<RelField>,
}

impl RowType {
    pub fn new(fields: Vec<RelField>) -> Self {
        Self { fields }
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// Operator kinds reported by the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SqlKind {
    And,
    Or,
    Equals,
    NotEquals,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    Like,
    Plus,
    Minus,
    Times,
    Divide,
    Mod,
    Cast,
    Not,
    IsNull,
    IsNotNull,
    Exists,
    Case,
    Coalesce,
    /// Functions and operators without a dedicated kind; identified by name.
    Other,
    OtherFunction,
}

impl SqlKind {
    pub fn name(self) -> &'static str {
        match self {
            SqlKind::And => "AND",
            SqlKind::Or => "OR",
            SqlKind::Equals => "EQUALS",
            SqlKind::NotEquals => "NOT_EQUALS",
            SqlKind::LessThan => "LESS_THAN",
            SqlKind::GreaterThan => "GREATER_THAN",
            SqlKind::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
            SqlKind::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
            SqlKind::Like => "LIKE",
            SqlKind::Plus => "PLUS",
            SqlKind::Minus => "MINUS",
            SqlKind::Times => "TIMES",
            SqlKind::Divide => "DIVIDE",
            SqlKind::Mod => "MOD",
            SqlKind::Cast => "CAST",
            SqlKind::Not => "NOT",
            SqlKind::IsNull => "IS_NULL",
            SqlKind::IsNotNull => "IS_NOT_NULL",
            SqlKind::Exists => "EXISTS",
            SqlKind::Case => "CASE",
            SqlKind::Coalesce => "COALESCE",
            SqlKind::Other => "OTHER",
            SqlKind::OtherFunction => "OTHER_FUNCTION",
        }
    }

    /// Conventional operator spelling, used when a document omits `name`.
    fn default_symbol(self) -> &'static str {
        match self {
            SqlKind::And => "AND",
            SqlKind::Or => "OR",
            SqlKind::Equals => "=",
            SqlKind::NotEquals => "<>",
            SqlKind::LessThan => "<",
            SqlKind::GreaterThan => ">",
            SqlKind::LessThanOrEqual => "<=",
            SqlKind::GreaterThanOrEqual => ">=",
            SqlKind::Like => "LIKE",
            SqlKind::Plus => "+",
            SqlKind::Minus => "-",
            SqlKind::Times => "*",
            SqlKind::Divide => "/",
            SqlKind::Mod => "MOD",
            SqlKind::Cast => "CAST",
            SqlKind::Not => "NOT",
            SqlKind::IsNull => "IS NULL",
            SqlKind::IsNotNull => "IS NOT NULL",
            SqlKind::Exists => "EXISTS",
            SqlKind::Case => "CASE",
            SqlKind::Coalesce => "COALESCE",
            SqlKind::Other | SqlKind::OtherFunction => "",
        }
    }
}

impl fmt::Display for SqlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub kind: SqlKind,
    #[serde(default)]
    pub name: String,
}

impl Operator {
    pub fn new(kind: SqlKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn of(kind: SqlKind) -> Self {
        Self::new(kind, kind.default_symbol())
    }
}

/// Literal payload, by value category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiteralValue {
    Null,
    /// Character string.
    Char(String),
    /// Exact numeric. Interval literals use this category too, in
    /// milliseconds (day-time) or months (year-month).
    Exact(#[serde(with = "exact_text")] Decimal),
    /// Calendar value as milliseconds since the Unix epoch.
    Calendar(i64),
    Boolean(bool),
    Binary(Vec<u8>),
    /// Flag values such as TRIM's LEADING/TRAILING.
    Symbol(String),
}

impl LiteralValue {
    pub fn category(&self) -> &'static str {
        match self {
            LiteralValue::Null => "null",
            LiteralValue::Char(_) => "char",
            LiteralValue::Exact(_) => "exact",
            LiteralValue::Calendar(_) => "calendar",
            LiteralValue::Boolean(_) => "boolean",
            LiteralValue::Binary(_) => "binary",
            LiteralValue::Symbol(_) => "symbol",
        }
    }
}

/// Exact literals travel as text so their scale survives: `"12.50"` stays
/// `12.50`. Integers are accepted as-is; floats are refused because they
/// have already lost the scale.
mod exact_text {
    use std::fmt;
    use std::str::FromStr;

    use rust_decimal::Decimal;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        deserializer.deserialize_any(ExactVisitor)
    }

    struct ExactVisitor;

    impl<'de> Visitor<'de> for ExactVisitor {
        type Value = Decimal;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an exact numeric as a string (e.g. \"12.50\") or an integer")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Decimal, E> {
            Decimal::from_str(v.trim())
                .map_err(|e| E::custom(format!("invalid exact literal '{}': {}", v, e)))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Decimal, E> {
            Ok(Decimal::from(v))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Decimal, E> {
            Ok(Decimal::from(v))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Decimal, E> {
            Err(E::custom(format!(
                "exact literal {} was read as a float and lost its scale; quote it",
                v
            )))
        }
    }
}

/// One external scalar expression node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rex", rename_all = "snake_case")]
pub enum RexNode {
    InputRef {
        index: usize,
        #[serde(rename = "type")]
        ty: RelType,
    },
    DynamicParam {
        #[serde(rename = "type")]
        ty: RelType,
    },
    Literal {
        value: LiteralValue,
        #[serde(rename = "type")]
        ty: RelType,
    },
    Call {
        op: Operator,
        operands: Vec<RexNode>,
        #[serde(rename = "type")]
        ty: RelType,
    },
    /// Positional reference into the enclosing program's expression list.
    LocalRef {
        index: usize,
        #[serde(rename = "type")]
        ty: RelType,
    },
}

impl RexNode {
    pub fn input_ref(index: usize, ty: RelType) -> Self {
        RexNode::InputRef { index, ty }
    }

    pub fn dynamic_param(ty: RelType) -> Self {
        RexNode::DynamicParam { ty }
    }

    pub fn literal(value: LiteralValue, ty: RelType) -> Self {
        RexNode::Literal { value, ty }
    }

    pub fn local_ref(index: usize, ty: RelType) -> Self {
        RexNode::LocalRef { index, ty }
    }

    pub fn call(kind: SqlKind, operands: Vec<RexNode>, ty: RelType) -> Self {
        RexNode::Call {
            op: Operator::of(kind),
            operands,
            ty,
        }
    }

    pub fn call_named(op: Operator, operands: Vec<RexNode>, ty: RelType) -> Self {
        RexNode::Call { op, operands, ty }
    }

    pub fn ty(&self) -> &RelType {
        match self {
            RexNode::InputRef { ty, .. }
            | RexNode::DynamicParam { ty }
            | RexNode::Literal { ty, .. }
            | RexNode::Call { ty, .. }
            | RexNode::LocalRef { ty, .. } => ty,
        }
    }
}

/// A named output of a program, pointing at one of its expressions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedProject {
    #[serde(rename = "ref")]
    pub local_ref: usize,
    pub name: String,
}

/// Shared sub-expressions plus the named projections that reference them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RexProgram {
    pub exprs: Vec<RexNode>,
    pub projects: Vec<NamedProject>,
    /// Optional filter, as an index into `exprs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<usize>,
}

impl RexProgram {
    pub fn new(exprs: Vec<RexNode>) -> Self {
        Self {
            exprs,
            projects: vec![],
            condition: None,
        }
    }

    pub fn project(mut self, local_ref: usize, name: impl Into<String>) -> Self {
        self.projects.push(NamedProject {
            local_ref,
            name: name.into(),
        });
        self
    }

    pub fn with_condition(mut self, local_ref: usize) -> Self {
        self.condition = Some(local_ref);
        self
    }
}

/// Aggregate function kinds reported by the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggKind {
    Count,
    Sum,
    Sum0,
    Min,
    Max,
    Avg,
    StddevPop,
    StddevSamp,
    VarPop,
    VarSamp,
    SingleValue,
}

impl fmt::Display for AggKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One aggregate call: function kind plus input field references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateCall {
    pub kind: AggKind,
    #[serde(default)]
    pub distinct: bool,
    #[serde(default)]
    pub args: Vec<usize>,
    #[serde(rename = "type")]
    pub ty: RelType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl AggregateCall {
    pub fn new(kind: AggKind, args: Vec<usize>, ty: RelType) -> Self {
        Self {
            kind,
            distinct: false,
            args,
            ty,
            name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rex_json_shape() {
        let node = RexNode::call(
            SqlKind::Equals,
            vec![
                RexNode::input_ref(0, RelType::new(SqlTypeName::Integer)),
                RexNode::dynamic_param(RelType::new(SqlTypeName::Integer)),
            ],
            RelType::new(SqlTypeName::Boolean),
        );
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["rex"], "call");
        assert_eq!(json["op"]["kind"], "EQUALS");
        assert_eq!(json["operands"][0]["rex"], "input_ref");
        assert_eq!(json["operands"][1]["type"]["kind"], "INTEGER");

        let back: RexNode = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn exact_literal_keeps_its_scale() {
        let v: LiteralValue = serde_json::from_str(r#"{"exact": "12.50"}"#).unwrap();
        match &v {
            LiteralValue::Exact(d) => assert_eq!(d.to_string(), "12.50"),
            other => panic!("expected exact, got {:?}", other),
        }
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"{"exact":"12.50"}"#);

        let int: LiteralValue = serde_json::from_str(r#"{"exact": 86400000}"#).unwrap();
        assert_eq!(int, LiteralValue::Exact(Decimal::from(86_400_000)));
    }

    #[test]
    fn float_exact_literal_is_refused() {
        let err = serde_json::from_str::<LiteralValue>(r#"{"exact": 12.50}"#).unwrap_err();
        assert!(err.to_string().contains("quote it"));
    }

    #[test]
    fn type_defaults_to_nullable() {
        let ty: RelType = serde_json::from_str(r#"{"kind": "INTERVAL_DAY_TIME"}"#).unwrap();
        assert!(ty.nullable);
        assert!(ty.is_interval());
    }

    #[test]
    fn operator_of_fills_symbol() {
        assert_eq!(Operator::of(SqlKind::Plus).name, "+");
        assert_eq!(Operator::of(SqlKind::Other).name, "");
    }
}
