//! Two-sided predicate conversion.
//!
//! A join condition addresses `left ++ right` with one flat index space.
//! The converter runs with a `JoinSplit` so every tuple reference comes out
//! as (side, local index).

use rexc_core::error::Result;
use rexc_core::expr::Expr;
use rexc_core::rex::RexNode;

use crate::context::CompileContext;
use crate::convert::ExprConverter;

/// Convert `condition`, where the left relation has `left_field_count` fields.
pub fn convert_join_predicate(
    ctx: &mut CompileContext,
    left_field_count: usize,
    condition: &RexNode,
) -> Result<Expr> {
    let expr = ExprConverter::new(ctx)
        .with_join_split(left_field_count)
        .convert(condition)?;

    #[cfg(feature = "tracing")]
    tracing::debug!(left_field_count, predicate = %expr, "converted join predicate");
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rexc_core::expr::{ComparisonOp, TupleRef};
    use rexc_core::rex::{RelType, SqlKind, SqlTypeName};

    fn int() -> RelType {
        RelType::new(SqlTypeName::Integer)
    }

    fn sides(expr: &Expr) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        fn walk(e: &Expr, out: &mut Vec<(usize, usize)>) {
            if let Expr::TupleRef(TupleRef {
                table_index,
                column_index,
                ..
            }) = e
            {
                out.push((*table_index, *column_index));
            }
            for c in e.children() {
                walk(c, out);
            }
        }
        walk(expr, &mut out);
        out
    }

    #[test]
    fn refs_split_at_the_left_field_count() {
        let mut ctx = CompileContext::default();
        let cond = RexNode::call(
            SqlKind::And,
            vec![
                RexNode::call(
                    SqlKind::Equals,
                    vec![RexNode::input_ref(2, int()), RexNode::input_ref(3, int())],
                    RelType::new(SqlTypeName::Boolean),
                ),
                RexNode::call(
                    SqlKind::LessThan,
                    vec![RexNode::input_ref(0, int()), RexNode::input_ref(5, int())],
                    RelType::new(SqlTypeName::Boolean),
                ),
            ],
            RelType::new(SqlTypeName::Boolean),
        );
        let e = convert_join_predicate(&mut ctx, 3, &cond).unwrap();
        assert_eq!(sides(&e), vec![(0, 2), (1, 0), (0, 0), (1, 2)]);
    }

    #[test]
    fn right_side_names_use_the_local_index() {
        let mut ctx = CompileContext::default();
        let cond = RexNode::call(
            SqlKind::Equals,
            vec![RexNode::input_ref(1, int()), RexNode::input_ref(4, int())],
            RelType::new(SqlTypeName::Boolean),
        );
        let e = convert_join_predicate(&mut ctx, 3, &cond).unwrap();
        match e {
            Expr::Comparison {
                op: ComparisonOp::Equal,
                right,
                ..
            } => match *right {
                Expr::TupleRef(t) => {
                    assert_eq!(t.column_name, "001");
                    assert_eq!(t.table_index, 1);
                }
                other => panic!("expected tuple ref, got {:?}", other),
            },
            other => panic!("expected equality, got {:?}", other),
        }
    }

    #[test]
    fn zero_width_left_puts_everything_on_the_right() {
        let mut ctx = CompileContext::default();
        let e = convert_join_predicate(&mut ctx, 0, &RexNode::input_ref(0, int())).unwrap();
        assert_eq!(sides(&e), vec![(1, 0)]);
    }
}
