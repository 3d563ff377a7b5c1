//! Schema builders: programs, row types and projection lists to `NodeSchema`.
//!
//! Local refs are inlined while converting, so each output column owns a
//! complete expression tree even when the program shared sub-expressions.

use rexc_core::error::Result;
use rexc_core::expr::Expr;
use rexc_core::rex::{RexNode, RexProgram, RowType};
use rexc_core::schema::{NodeSchema, SchemaColumn};

use crate::context::CompileContext;
use crate::convert::ExprConverter;
use crate::types::resolve_type;

/// One column per named projection of `program`, in projection order.
pub fn program_to_schema(ctx: &mut CompileContext, program: &RexProgram) -> Result<NodeSchema> {
    let mut converter = ExprConverter::new(ctx).with_locals(&program.exprs);
    let mut schema = NodeSchema::new();

    for (ordinal, project) in program.projects.iter().enumerate() {
        let target = RexNode::local_ref(
            project.local_ref,
            *program
                .exprs
                .get(project.local_ref)
                .map(RexNode::ty)
                .ok_or_else(|| {
                    rexc_core::Error::invariant(format!(
                        "projection '{}' references ${} but the program has {} expressions",
                        project.name,
                        project.local_ref,
                        program.exprs.len()
                    ))
                })?,
        );
        let expr = converter.convert(&target)?;
        schema.push(SchemaColumn::computed(project.name.clone(), ordinal, expr));
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(columns = schema.len(), "converted program schema");
    Ok(schema)
}

/// Convert a program's filter condition, if it has one.
pub fn program_condition(ctx: &mut CompileContext, program: &RexProgram) -> Result<Option<Expr>> {
    let Some(idx) = program.condition else {
        return Ok(None);
    };
    let ty = *program
        .exprs
        .get(idx)
        .map(RexNode::ty)
        .ok_or_else(|| {
            rexc_core::Error::invariant(format!(
                "program condition ${} out of range ({} expressions)",
                idx,
                program.exprs.len()
            ))
        })?;
    let expr = ExprConverter::new(ctx)
        .with_locals(&program.exprs)
        .convert(&RexNode::local_ref(idx, ty))?;
    Ok(Some(expr))
}

/// N fields become N tuple references named after the fields.
pub fn row_type_to_schema(ctx: &mut CompileContext, row_type: &RowType) -> Result<NodeSchema> {
    let mut schema = NodeSchema::new();
    for (i, field) in row_type.fields.iter().enumerate() {
        let ty = resolve_type(&field.ty, ctx.config())?;
        let tve = Expr::tuple_ref("", field.name.clone(), i, 0, ty);
        schema.push(SchemaColumn::computed(field.name.clone(), i, tve));
    }
    Ok(schema)
}

/// Direct (non-program) projections, in order.
pub fn named_projects_to_schema(
    ctx: &mut CompileContext,
    projects: &[(RexNode, String)],
) -> Result<NodeSchema> {
    let mut converter = ExprConverter::new(ctx);
    let mut schema = NodeSchema::new();
    for (ordinal, (node, name)) in projects.iter().enumerate() {
        let expr = converter.convert(node)?;
        schema.push(SchemaColumn::computed(name.clone(), ordinal, expr));
    }
    Ok(schema)
}

/// Convert a condition such as `$1 > $2` whose local refs point into `exprs`,
/// naming input refs after the catalog table and its columns.
pub fn convert_ref_expression(
    ctx: &mut CompileContext,
    table: &str,
    catalog_columns: &[String],
    condition: &RexNode,
    exprs: &[RexNode],
) -> Result<Expr> {
    ExprConverter::new(ctx)
        .with_catalog(table, catalog_columns)
        .with_locals(exprs)
        .convert(condition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rexc_core::config::PlannerConfig;
    use rexc_core::error::Error;
    use rexc_core::rex::{LiteralValue, RelField, RelType, SqlKind, SqlTypeName};
    use rexc_core::schema::ValueType;

    fn int() -> RelType {
        RelType::new(SqlTypeName::Integer)
    }

    #[test]
    fn row_type_columns_follow_fields() {
        let mut ctx = CompileContext::default();
        let row = RowType::new(vec![
            RelField::new("id", int()),
            RelField::new("name", RelType::varchar(32)),
            RelField::new("price", RelType::decimal(10, 2)),
        ]);
        let schema = row_type_to_schema(&mut ctx, &row).unwrap();
        assert_eq!(schema.len(), 3);
        let names: Vec<&str> = schema.names().collect();
        assert_eq!(names, vec!["id", "name", "price"]);
        for (i, col) in schema.columns.iter().enumerate() {
            assert_eq!(col.ordinal, i);
        }
        assert_eq!(schema.columns[2].value_type().value_type, ValueType::Decimal);
    }

    #[test]
    fn program_inlines_shared_expressions() {
        let mut ctx = CompileContext::default();
        // $0, $1 are inputs; $2 = $0 + $1; $3 = $2 * $2
        let program = RexProgram::new(vec![
            RexNode::input_ref(0, int()),
            RexNode::input_ref(1, int()),
            RexNode::call(
                SqlKind::Plus,
                vec![RexNode::local_ref(0, int()), RexNode::local_ref(1, int())],
                int(),
            ),
            RexNode::call(
                SqlKind::Times,
                vec![RexNode::local_ref(2, int()), RexNode::local_ref(2, int())],
                int(),
            ),
        ])
        .project(0, "a")
        .project(3, "sq");

        let schema = program_to_schema(&mut ctx, &program).unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.columns[0].expr.to_string(), "$0.000");
        assert_eq!(
            schema.columns[1].expr.to_string(),
            "(($0.000 + $0.001) * ($0.000 + $0.001))"
        );
        assert_eq!(schema.columns[1].ordinal, 1);
        assert_eq!(schema.columns[1].name, "sq");
    }

    #[test]
    fn projection_out_of_range_fails() {
        let mut ctx = CompileContext::default();
        let program = RexProgram::new(vec![RexNode::input_ref(0, int())]).project(4, "x");
        assert!(matches!(
            program_to_schema(&mut ctx, &program),
            Err(Error::Invariant(_))
        ));
    }

    #[test]
    fn cyclic_local_refs_hit_the_depth_guard() {
        let mut ctx = CompileContext::new(PlannerConfig::default().with_max_expression_depth(32));
        let program = RexProgram::new(vec![
            RexNode::local_ref(1, int()),
            RexNode::local_ref(0, int()),
        ])
        .project(0, "loop");
        assert!(matches!(
            program_to_schema(&mut ctx, &program),
            Err(Error::Invariant(_))
        ));
    }

    #[test]
    fn program_condition_is_converted() {
        let mut ctx = CompileContext::default();
        let program = RexProgram::new(vec![
            RexNode::input_ref(0, int()),
            RexNode::literal(LiteralValue::Exact("10".parse().unwrap()), int()),
            RexNode::call(
                SqlKind::GreaterThan,
                vec![RexNode::local_ref(0, int()), RexNode::local_ref(1, int())],
                RelType::new(SqlTypeName::Boolean),
            ),
        ])
        .project(0, "a")
        .with_condition(2);
        let cond = program_condition(&mut ctx, &program).unwrap().unwrap();
        assert_eq!(cond.to_string(), "($0.000 > 10)");
    }

    #[test]
    fn named_projects_get_positional_ordinals() {
        let mut ctx = CompileContext::default();
        let projects = vec![
            (RexNode::input_ref(1, int()), "b".to_string()),
            (RexNode::dynamic_param(int()), "p".to_string()),
        ];
        let schema = named_projects_to_schema(&mut ctx, &projects).unwrap();
        let ordinals: Vec<usize> = schema.columns.iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1]);
        assert_eq!(schema.columns[1].expr.parameter_indices(), vec![0]);
    }

    #[test]
    fn ref_expression_uses_catalog_names() {
        let mut ctx = CompileContext::default();
        let columns = vec!["ID".to_string(), "AGE".to_string()];
        let exprs = vec![
            RexNode::input_ref(0, int()),
            RexNode::input_ref(1, int()),
            RexNode::input_ref(5, int()),
        ];
        let cond = RexNode::call(
            SqlKind::GreaterThan,
            vec![RexNode::local_ref(1, int()), RexNode::local_ref(2, int())],
            RelType::new(SqlTypeName::Boolean),
        );
        let e = convert_ref_expression(&mut ctx, "PERSON", &columns, &cond, &exprs).unwrap();
        // Index 5 has no catalog column and falls back to its padded index.
        assert_eq!(e.to_string(), "(PERSON.AGE > PERSON.005)");
    }
}
