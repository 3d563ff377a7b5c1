//! Typed, tree-shaped execution expressions.
//!
//! This is the compiler's output model. Every node owns its operands and
//! carries a `TypeInfo`; only nodes still waiting for type finalization hold
//! `ValueType::Invalid`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{TypeInfo, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConjunctionOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    Like,
    /// Right operand is always a `ValueList`.
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithmeticOp {
    Plus,
    Minus,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    IsNull,
    Exists,
}

/// Built-in functions the converter emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Function {
    Concat,
    /// TIMESTAMP -> BIGINT microseconds since epoch.
    SinceEpochMicros,
    /// BIGINT microseconds since epoch -> TIMESTAMP.
    ToTimestampMicros,
}

impl Function {
    pub fn name(self) -> &'static str {
        match self {
            Function::Concat => "concat",
            Function::SinceEpochMicros => "since_epoch",
            Function::ToTimestampMicros => "to_timestamp",
        }
    }
}

/// "Column K of table/side T."
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TupleRef {
    pub table_name: String,
    pub column_name: String,
    pub column_index: usize,
    /// 0 for the outer (left) input, 1 for the inner (right) input of a join.
    pub table_index: usize,
    pub ty: TypeInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    TupleRef(TupleRef),
    Parameter {
        index: usize,
        ty: TypeInfo,
    },
    Constant {
        value: String,
        ty: TypeInfo,
    },
    Conjunction {
        op: ConjunctionOp,
        left: Box<Expr>,
        right: Box<Expr>,
        ty: TypeInfo,
    },
    Comparison {
        op: ComparisonOp,
        left: Box<Expr>,
        right: Box<Expr>,
        ty: TypeInfo,
    },
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expr>,
        right: Box<Expr>,
        ty: TypeInfo,
    },
    Cast {
        operand: Box<Expr>,
        ty: TypeInfo,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        ty: TypeInfo,
    },
    Function {
        func: Function,
        args: Vec<Expr>,
        ty: TypeInfo,
    },
    ValueList {
        items: Vec<Expr>,
        ty: TypeInfo,
    },
}

impl Expr {
    pub fn tuple_ref(
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        column_index: usize,
        table_index: usize,
        ty: TypeInfo,
    ) -> Self {
        Expr::TupleRef(TupleRef {
            table_name: table_name.into(),
            column_name: column_name.into(),
            column_index,
            table_index,
            ty,
        })
    }

    pub fn conjunction(op: ConjunctionOp, left: Expr, right: Expr) -> Self {
        Expr::Conjunction {
            op,
            left: Box::new(left),
            right: Box::new(right),
            ty: TypeInfo::boolean(),
        }
    }

    pub fn comparison(op: ComparisonOp, left: Expr, right: Expr) -> Self {
        Expr::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
            ty: TypeInfo::boolean(),
        }
    }

    /// Arithmetic starts untyped; type finalization infers it from operands.
    pub fn arithmetic(op: ArithmeticOp, left: Expr, right: Expr) -> Self {
        Expr::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
            ty: TypeInfo::invalid(),
        }
    }

    pub fn type_info(&self) -> TypeInfo {
        match self {
            Expr::TupleRef(t) => t.ty,
            Expr::Parameter { ty, .. }
            | Expr::Constant { ty, .. }
            | Expr::Conjunction { ty, .. }
            | Expr::Comparison { ty, .. }
            | Expr::Arithmetic { ty, .. }
            | Expr::Cast { ty, .. }
            | Expr::Unary { ty, .. }
            | Expr::Function { ty, .. }
            | Expr::ValueList { ty, .. } => *ty,
        }
    }

    pub fn value_type(&self) -> ValueType {
        self.type_info().value_type
    }

    pub fn set_type(&mut self, new_ty: TypeInfo) {
        match self {
            Expr::TupleRef(t) => t.ty = new_ty,
            Expr::Parameter { ty, .. }
            | Expr::Constant { ty, .. }
            | Expr::Conjunction { ty, .. }
            | Expr::Comparison { ty, .. }
            | Expr::Arithmetic { ty, .. }
            | Expr::Cast { ty, .. }
            | Expr::Unary { ty, .. }
            | Expr::Function { ty, .. }
            | Expr::ValueList { ty, .. } => *ty = new_ty,
        }
    }

    /// Direct operands, left to right.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::TupleRef(_) | Expr::Parameter { .. } | Expr::Constant { .. } => vec![],
            Expr::Conjunction { left, right, .. }
            | Expr::Comparison { left, right, .. }
            | Expr::Arithmetic { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expr::Cast { operand, .. } | Expr::Unary { operand, .. } => vec![operand.as_ref()],
            Expr::Function { args, .. } => args.iter().collect(),
            Expr::ValueList { items, .. } => items.iter().collect(),
        }
    }

    pub fn children_mut(&mut self) -> Vec<&mut Expr> {
        match self {
            Expr::TupleRef(_) | Expr::Parameter { .. } | Expr::Constant { .. } => vec![],
            Expr::Conjunction { left, right, .. }
            | Expr::Comparison { left, right, .. }
            | Expr::Arithmetic { left, right, .. } => vec![left.as_mut(), right.as_mut()],
            Expr::Cast { operand, .. } | Expr::Unary { operand, .. } => vec![operand.as_mut()],
            Expr::Function { args, .. } => args.iter_mut().collect(),
            Expr::ValueList { items, .. } => items.iter_mut().collect(),
        }
    }

    /// Parameter indices in depth-first, left-to-right order.
    pub fn parameter_indices(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect_parameters(&mut out);
        out
    }

    fn collect_parameters(&self, out: &mut Vec<usize>) {
        if let Expr::Parameter { index, .. } = self {
            out.push(*index);
        }
        for child in self.children() {
            child.collect_parameters(out);
        }
    }

    /// True when no node in the tree is still `Invalid`.
    pub fn is_fully_typed(&self) -> bool {
        !self.type_info().is_invalid() && self.children().iter().all(|c| c.is_fully_typed())
    }
}

impl fmt::Display for ConjunctionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConjunctionOp::And => "AND",
            ConjunctionOp::Or => "OR",
        })
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ComparisonOp::Equal => "=",
            ComparisonOp::NotEqual => "<>",
            ComparisonOp::LessThan => "<",
            ComparisonOp::GreaterThan => ">",
            ComparisonOp::LessThanOrEqual => "<=",
            ComparisonOp::GreaterThanOrEqual => ">=",
            ComparisonOp::Like => "LIKE",
            ComparisonOp::In => "IN",
        })
    }
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArithmeticOp::Plus => "+",
            ArithmeticOp::Minus => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "/",
        })
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::TupleRef(t) => {
                if t.table_name.is_empty() {
                    write!(f, "${}.{}", t.table_index, t.column_name)
                } else {
                    write!(f, "{}.{}", t.table_name, t.column_name)
                }
            }
            Expr::Parameter { index, .. } => write!(f, "?{}", index),
            Expr::Constant { value, ty } => match ty.value_type {
                ValueType::String => write!(f, "'{}'", value),
                _ => f.write_str(value),
            },
            Expr::Conjunction { op, left, right, .. } => write!(f, "({} {} {})", left, op, right),
            Expr::Comparison { op, left, right, .. } => write!(f, "({} {} {})", left, op, right),
            Expr::Arithmetic { op, left, right, .. } => write!(f, "({} {} {})", left, op, right),
            Expr::Cast { operand, ty } => write!(f, "CAST({} AS {})", operand, ty.value_type),
            Expr::Unary { op, operand, .. } => match op {
                UnaryOp::Not => write!(f, "NOT {}", operand),
                UnaryOp::IsNull => write!(f, "{} IS NULL", operand),
                UnaryOp::Exists => write!(f, "EXISTS {}", operand),
            },
            Expr::Function { func, args, .. } => {
                write!(f, "{}(", func.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            Expr::ValueList { items, .. } => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(idx: usize) -> Expr {
        Expr::tuple_ref("", format!("{:03}", idx), idx, 0, TypeInfo::bigint())
    }

    #[test]
    fn arithmetic_starts_unresolved() {
        let e = Expr::arithmetic(ArithmeticOp::Plus, col(0), col(1));
        assert!(e.type_info().is_invalid());
        assert!(!e.is_fully_typed());
    }

    #[test]
    fn parameters_are_collected_depth_first() {
        let p = |i| Expr::Parameter {
            index: i,
            ty: TypeInfo::bigint(),
        };
        let e = Expr::conjunction(
            ConjunctionOp::And,
            Expr::comparison(ComparisonOp::Equal, col(0), p(0)),
            Expr::comparison(ComparisonOp::LessThan, p(1), p(2)),
        );
        assert_eq!(e.parameter_indices(), vec![0, 1, 2]);
        assert!(e.is_fully_typed());
    }

    #[test]
    fn display_renders_infix() {
        let e = Expr::comparison(
            ComparisonOp::GreaterThan,
            col(7),
            Expr::Constant {
                value: "5".into(),
                ty: TypeInfo::bigint(),
            },
        );
        assert_eq!(e.to_string(), "($0.007 > 5)");
    }
}
