//! Expression conversion: one `RexNode` tree into one typed `Expr` tree.
//!
//! Operands are converted before their parent. Every call node goes through
//! type finalization before it is returned, so a finished tree never holds
//! `ValueType::Invalid`.

use rust_decimal::Decimal;

use rexc_core::config::PlannerConfig;
use rexc_core::error::{Error, Result};
use rexc_core::expr::{ArithmeticOp, ComparisonOp, ConjunctionOp, Expr, Function, UnaryOp};
use rexc_core::rex::{LiteralValue, Operator, RelType, RexNode, SqlKind};
use rexc_core::schema::{TypeInfo, ValueType};

use crate::context::CompileContext;
use crate::types::{promote_arithmetic, resolve_type};

/// Operator name the optimizer uses for string concatenation.
const CONCAT_OPERATOR: &str = "||";

/// Splits a flattened join input index into (side, local index).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinSplit {
    pub left_field_count: usize,
}

impl JoinSplit {
    pub fn new(left_field_count: usize) -> Self {
        Self { left_field_count }
    }

    /// `(0, index)` for left-side fields, `(1, index - left_field_count)` for
    /// right-side fields.
    pub fn split(&self, index: usize) -> (usize, usize) {
        if index >= self.left_field_count {
            (1, index - self.left_field_count)
        } else {
            (0, index)
        }
    }
}

/// Catalog naming for tuple references that would otherwise be anonymous.
#[derive(Debug, Clone, Copy)]
struct CatalogNames<'a> {
    table: &'a str,
    columns: &'a [String],
}

/// Recursive converter. Build one per expression (or per program) and drop
/// it afterwards; the parameter counter lives in the borrowed context.
pub struct ExprConverter<'a> {
    ctx: &'a mut CompileContext,
    join_split: Option<JoinSplit>,
    locals: Option<&'a [RexNode]>,
    catalog: Option<CatalogNames<'a>>,
}

impl<'a> ExprConverter<'a> {
    pub fn new(ctx: &'a mut CompileContext) -> Self {
        Self {
            ctx,
            join_split: None,
            locals: None,
            catalog: None,
        }
    }

    /// Treat input refs as ranging over `left ++ right`.
    pub fn with_join_split(mut self, left_field_count: usize) -> Self {
        self.join_split = Some(JoinSplit::new(left_field_count));
        self
    }

    /// Resolve `LocalRef`s against a program's expression list.
    pub fn with_locals(mut self, exprs: &'a [RexNode]) -> Self {
        self.locals = Some(exprs);
        self
    }

    /// Name input refs from a catalog table and its column list.
    pub fn with_catalog(mut self, table: &'a str, columns: &'a [String]) -> Self {
        self.catalog = Some(CatalogNames { table, columns });
        self
    }

    pub fn convert(&mut self, node: &RexNode) -> Result<Expr> {
        self.visit(node, 1)
    }

    fn config(&self) -> &PlannerConfig {
        self.ctx.config()
    }

    fn resolve(&self, ty: &RelType) -> Result<TypeInfo> {
        resolve_type(ty, self.config())
    }

    fn visit(&mut self, node: &RexNode, depth: usize) -> Result<Expr> {
        self.ctx.check_depth(depth)?;
        match node {
            RexNode::InputRef { index, ty } => self.visit_input_ref(*index, ty),
            RexNode::DynamicParam { ty } => self.visit_dynamic_param(ty),
            RexNode::Literal { value, ty } => self.visit_literal(value, ty),
            RexNode::LocalRef { index, .. } => self.visit_local_ref(*index, depth),
            RexNode::Call { op, operands, ty } => self.visit_call(op, operands, ty, depth),
        }
    }

    fn visit_input_ref(&mut self, index: usize, ty: &RelType) -> Result<Expr> {
        let (table_index, column_index) = match self.join_split {
            Some(split) => split.split(index),
            None => (0, index),
        };

        let (table_name, column_name) = match self.catalog {
            Some(cat) => (cat.table.to_string(), cat.columns.get(index).cloned()),
            None => (String::new(), None),
        };
        // Anonymous columns are named after their index: 7 -> "007".
        let column_name = column_name.unwrap_or_else(|| format!("{:03}", column_index));

        let ty = self.resolve(ty)?;
        Ok(Expr::tuple_ref(
            table_name,
            column_name,
            column_index,
            table_index,
            ty,
        ))
    }

    fn visit_dynamic_param(&mut self, ty: &RelType) -> Result<Expr> {
        let ty = self.resolve(ty)?;
        let index = self.ctx.next_parameter_index();
        #[cfg(feature = "tracing")]
        tracing::trace!(index, value_type = %ty.value_type, "assigned parameter index");
        Ok(Expr::Parameter { index, ty })
    }

    fn visit_literal(&mut self, value: &LiteralValue, ty: &RelType) -> Result<Expr> {
        let text = match value {
            LiteralValue::Char(s) => s.clone(),
            LiteralValue::Boolean(b) => b.to_string(),
            LiteralValue::Exact(d) => {
                if ty.is_interval() {
                    // Intervals arrive in milliseconds; the engine stores microseconds.
                    d.checked_mul(Decimal::from(1000))
                        .ok_or_else(|| {
                            Error::invariant(format!("interval literal {} overflows microseconds", d))
                        })?
                        .to_string()
                } else {
                    d.to_string()
                }
            }
            LiteralValue::Calendar(millis) => millis
                .checked_mul(1000)
                .ok_or_else(|| {
                    Error::invariant(format!(
                        "calendar literal {}ms overflows microseconds",
                        millis
                    ))
                })?
                .to_string(),
            LiteralValue::Null | LiteralValue::Binary(_) | LiteralValue::Symbol(_) => {
                return Err(Error::invariant(format!(
                    "cannot materialize a {} literal as a constant",
                    value.category()
                )))
            }
        };

        let ty = self.resolve(ty)?;
        Ok(Expr::Constant { value: text, ty })
    }

    fn visit_local_ref(&mut self, index: usize, depth: usize) -> Result<Expr> {
        let locals = self.locals.ok_or_else(|| {
            Error::invariant(format!("local ref ${} outside of a program", index))
        })?;
        let target = locals.get(index).ok_or_else(|| {
            Error::invariant(format!(
                "local ref ${} out of range ({} program expressions)",
                index,
                locals.len()
            ))
        })?;
        // Inline: every reference gets its own copy of the converted subtree.
        self.visit(target, depth + 1)
    }

    fn visit_call(
        &mut self,
        op: &Operator,
        operands: &[RexNode],
        ty: &RelType,
        depth: usize,
    ) -> Result<Expr> {
        let mut args = Vec::with_capacity(operands.len());
        for operand in operands {
            args.push(self.visit(operand, depth + 1)?);
        }

        let mut expr = match op.kind {
            SqlKind::And => fold_and(args)?,
            SqlKind::Or => match args.len() {
                2 => {
                    let (l, r) = binary(op.kind, args)?;
                    Expr::conjunction(ConjunctionOp::Or, l, r)
                }
                n if n > 2 => rewrite_or_as_in(args)?,
                n => {
                    return Err(Error::invariant(format!("OR with {} operand(s)", n)));
                }
            },

            SqlKind::Equals => comparison(op.kind, ComparisonOp::Equal, args)?,
            SqlKind::NotEquals => comparison(op.kind, ComparisonOp::NotEqual, args)?,
            SqlKind::LessThan => comparison(op.kind, ComparisonOp::LessThan, args)?,
            SqlKind::GreaterThan => comparison(op.kind, ComparisonOp::GreaterThan, args)?,
            SqlKind::LessThanOrEqual => {
                comparison(op.kind, ComparisonOp::LessThanOrEqual, args)?
            }
            SqlKind::GreaterThanOrEqual => {
                comparison(op.kind, ComparisonOp::GreaterThanOrEqual, args)?
            }
            SqlKind::Like => comparison(op.kind, ComparisonOp::Like, args)?,

            SqlKind::Plus => datetime_or_arithmetic(op.kind, ArithmeticOp::Plus, args, ty)?,
            SqlKind::Minus => datetime_or_arithmetic(op.kind, ArithmeticOp::Minus, args, ty)?,
            SqlKind::Times => {
                let (l, r) = binary(op.kind, args)?;
                Expr::arithmetic(ArithmeticOp::Multiply, l, r)
            }
            SqlKind::Divide => {
                let (l, r) = binary(op.kind, args)?;
                Expr::arithmetic(ArithmeticOp::Divide, l, r)
            }

            SqlKind::Cast => Expr::Cast {
                operand: Box::new(unary(op.kind, args)?),
                ty: self.resolve(ty)?,
            },
            SqlKind::Not => self.unary_op(op.kind, UnaryOp::Not, args, ty)?,
            SqlKind::IsNull => self.unary_op(op.kind, UnaryOp::IsNull, args, ty)?,
            SqlKind::Exists => self.unary_op(op.kind, UnaryOp::Exists, args, ty)?,

            SqlKind::Other if op.name == CONCAT_OPERATOR => Expr::Function {
                func: Function::Concat,
                args,
                ty: self.resolve(ty)?,
            },

            SqlKind::Other
            | SqlKind::OtherFunction
            | SqlKind::Mod
            | SqlKind::IsNotNull
            | SqlKind::Case
            | SqlKind::Coalesce => {
                return Err(Error::unsupported(format!(
                    "unsupported expression type: {}",
                    op.kind
                )));
            }
        };

        finalize_value_types(&mut expr, self.config())?;

        #[cfg(feature = "tracing")]
        tracing::trace!(
            kind = %op.kind,
            operands = operands.len(),
            value_type = %expr.value_type(),
            "converted call"
        );

        Ok(expr)
    }

    fn unary_op(
        &self,
        kind: SqlKind,
        op: UnaryOp,
        args: Vec<Expr>,
        ty: &RelType,
    ) -> Result<Expr> {
        Ok(Expr::Unary {
            op,
            operand: Box::new(unary(kind, args)?),
            ty: self.resolve(ty)?,
        })
    }
}

/// Convert a single expression with a fresh converter.
pub fn convert(ctx: &mut CompileContext, node: &RexNode) -> Result<Expr> {
    ExprConverter::new(ctx).convert(node)
}

fn unary(kind: SqlKind, args: Vec<Expr>) -> Result<Expr> {
    let n = args.len();
    let mut it = args.into_iter();
    match (it.next(), it.next()) {
        (Some(operand), None) => Ok(operand),
        _ => Err(Error::invariant(format!(
            "{} expects 1 operand, got {}",
            kind, n
        ))),
    }
}

fn binary(kind: SqlKind, args: Vec<Expr>) -> Result<(Expr, Expr)> {
    let n = args.len();
    let mut it = args.into_iter();
    match (it.next(), it.next(), it.next()) {
        (Some(l), Some(r), None) => Ok((l, r)),
        _ => Err(Error::invariant(format!(
            "{} expects 2 operands, got {}",
            kind, n
        ))),
    }
}

fn comparison(kind: SqlKind, op: ComparisonOp, args: Vec<Expr>) -> Result<Expr> {
    let (l, r) = binary(kind, args)?;
    Ok(Expr::comparison(op, l, r))
}

/// AND over n >= 2 operands, folded left-deep into binary conjunctions.
fn fold_and(args: Vec<Expr>) -> Result<Expr> {
    if args.len() < 2 {
        return Err(Error::invariant(format!(
            "AND expects at least 2 operands, got {}",
            args.len()
        )));
    }
    let mut it = args.into_iter();
    let first = it.next().ok_or_else(|| Error::invariant("AND without operands"))?;
    Ok(it.fold(first, |acc, next| {
        Expr::conjunction(ConjunctionOp::And, acc, next)
    }))
}

/// `x = a OR x = b OR c = x` becomes `x IN [a, b, c]`.
///
/// Only sound when every operand is an equality test and all of them share
/// one compared expression, on either side. Anything else is rejected rather
/// than rewritten.
fn rewrite_or_as_in(args: Vec<Expr>) -> Result<Expr> {
    let pairs = args
        .into_iter()
        .map(|arg| match arg {
            Expr::Comparison {
                op: ComparisonOp::Equal,
                left,
                right,
                ..
            } => Ok((*left, *right)),
            other => Err(Error::unsupported(format!(
                "OR operand {} is not an equality comparison; cannot rewrite as IN",
                other
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    let shared = {
        let (first_left, first_right) = pairs
            .first()
            .ok_or_else(|| Error::invariant("OR rewrite without operands"))?;
        [first_left, first_right]
            .into_iter()
            .find(|candidate| pairs.iter().all(|(l, r)| l == *candidate || r == *candidate))
            .cloned()
            .ok_or_else(|| {
                Error::unsupported(format!(
                    "OR operands share no compared expression with ({} = {}); cannot rewrite as IN",
                    first_left, first_right
                ))
            })?
    };

    // Mirrored equalities contribute their other side.
    let items = pairs
        .into_iter()
        .map(|(l, r)| if l == shared { r } else { l })
        .collect();
    let list = Expr::ValueList {
        ty: shared.type_info(),
        items,
    };
    Ok(Expr::comparison(ComparisonOp::In, shared, list))
}

/// PLUS/MINUS, or the microsecond timestamp form when one side is a TIMESTAMP
/// and the other an interval:
/// `to_timestamp(since_epoch(ts) op interval)`.
fn datetime_or_arithmetic(
    kind: SqlKind,
    op: ArithmeticOp,
    args: Vec<Expr>,
    call_ty: &RelType,
) -> Result<Expr> {
    let (l, r) = binary(kind, args)?;
    let (lt, rt) = (l.type_info(), r.type_info());
    let datetime = (lt.is_timestamp() && rt.interval) || (lt.interval && rt.is_timestamp());
    if !datetime {
        return Ok(Expr::arithmetic(op, l, r));
    }

    let micros = |e: Expr| {
        if e.type_info().is_timestamp() {
            let nullable = e.type_info().nullable;
            Expr::Function {
                func: Function::SinceEpochMicros,
                args: vec![e],
                ty: TypeInfo::bigint().with_nullable(nullable),
            }
        } else {
            e
        }
    };

    Ok(Expr::Function {
        func: Function::ToTimestampMicros,
        args: vec![Expr::arithmetic(op, micros(l), micros(r))],
        ty: TypeInfo::timestamp().with_nullable(call_ty.nullable),
    })
}

/// Fill unresolved value types bottom-up by inference, then insist that
/// nothing is left `Invalid`.
pub fn finalize_value_types(expr: &mut Expr, config: &PlannerConfig) -> Result<()> {
    for child in expr.children_mut() {
        finalize_value_types(child, config)?;
    }

    if expr.type_info().is_invalid() {
        let inferred = infer_type(expr, config);
        expr.set_type(inferred);
    }

    if expr.type_info().is_invalid() {
        return Err(Error::invariant(format!(
            "no valid value type for {}",
            expr
        )));
    }
    Ok(())
}

fn infer_type(expr: &Expr, config: &PlannerConfig) -> TypeInfo {
    match expr {
        Expr::Arithmetic { left, right, .. } => {
            promote_arithmetic(&left.type_info(), &right.type_info(), config)
        }
        Expr::Conjunction { .. } | Expr::Comparison { .. } | Expr::Unary { .. } => {
            TypeInfo::boolean()
        }
        Expr::Function { func, .. } => match func {
            Function::Concat => TypeInfo::new(ValueType::String),
            Function::SinceEpochMicros => TypeInfo::bigint(),
            Function::ToTimestampMicros => TypeInfo::timestamp(),
        },
        Expr::ValueList { items, .. } => items
            .first()
            .map(|e| e.type_info())
            .unwrap_or_else(TypeInfo::invalid),
        Expr::TupleRef(_) | Expr::Parameter { .. } | Expr::Constant { .. } | Expr::Cast { .. } => {
            expr.type_info()
        }
    }
}
