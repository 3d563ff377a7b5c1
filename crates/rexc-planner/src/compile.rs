//! Statement driver: YAML statement -> plan tree.
//!
//! Each statement compiles inside its own `CompileContext`, so parameter
//! indices restart at zero per statement.

use serde::{Deserialize, Serialize};

use rexc_core::config::PlannerConfig;
use rexc_core::error::{Error, Result};
use rexc_core::expr::{ConjunctionOp, Expr};
use rexc_core::hash::{hash_serde, Hash256};
use rexc_core::plan::PlanNode;
use rexc_core::rex::RexNode;
use rexc_core::schema::NodeSchema;

use crate::aggregate::{AggregateRel, TraitSet};
use crate::context::CompileContext;
use crate::dsl::yaml::Statement;
use crate::join::convert_join_predicate;
use crate::program::{
    convert_ref_expression, named_projects_to_schema, program_condition, program_to_schema,
    row_type_to_schema,
};

/// A compiled statement: the root plan node plus how many `?` parameters
/// the executor has to bind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledStatement {
    pub plan: PlanNode,
    pub parameter_count: usize,
}

impl CompiledStatement {
    pub fn fingerprint(&self) -> Result<Hash256> {
        hash_serde(self)
    }
}

/// Compile one statement.
///
/// Parameters are numbered in SQL text order: the projection list first,
/// then the join condition, then the scan and program conditions (WHERE),
/// then the aggregate's post predicate (HAVING).
pub fn compile_statement(stmt: &Statement, config: &PlannerConfig) -> Result<CompiledStatement> {
    stmt.validate()?;
    let mut ctx = CompileContext::try_new(config.clone())?;

    let mut plan = input_plan(&mut ctx, stmt)?;

    // SELECT list
    let projection = if let Some(program) = &stmt.program {
        Some(program_to_schema(&mut ctx, program)?)
    } else if !stmt.projects.is_empty() {
        let projects: Vec<(RexNode, String)> = stmt
            .projects
            .iter()
            .map(|p| (p.expr.clone(), p.name.clone()))
            .collect();
        Some(named_projects_to_schema(&mut ctx, &projects)?)
    } else {
        None
    };

    // JOIN ... ON
    if let Some(join) = &stmt.join {
        if let Some(cond) = &join.condition {
            let converted = convert_join_predicate(&mut ctx, join.left_fields, cond)?;
            if let PlanNode::NestLoopJoin { predicate, .. } = &mut plan {
                *predicate = Some(converted);
            }
        }
    }

    // WHERE
    if let Some(cond) = &stmt.condition {
        let columns = stmt.column_names();
        let converted = convert_ref_expression(&mut ctx, &stmt.table, &columns, cond, &[])?;
        push_scan_predicate(&mut plan, converted)?;
    }
    if let Some(program) = &stmt.program {
        if let Some(cond) = program_condition(&mut ctx, program)? {
            push_scan_predicate(&mut plan, cond)?;
        }
    }

    if let Some(schema) = projection {
        plan = PlanNode::Projection {
            input: Box::new(plan),
            schema,
        };
    }

    if let Some(agg) = &stmt.aggregate {
        let mut rel = AggregateRel::new(
            agg.strategy,
            TraitSet::default(),
            plan,
            agg.group_set.clone(),
            agg.calls.clone(),
        )
        .with_group_sets(agg.group_sets.clone());
        if let Some(pred) = &agg.post_predicate {
            rel = rel.with_post_predicate(pred.clone());
        }
        plan = rel.to_plan_node(&mut ctx)?;
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        root = plan.name(),
        parameters = ctx.parameter_count(),
        "compiled statement"
    );

    Ok(CompiledStatement {
        plan,
        parameter_count: ctx.parameter_count(),
    })
}

/// The scan, or the two scans under a nest-loop join. Predicates are
/// attached later.
fn input_plan(ctx: &mut CompileContext, stmt: &Statement) -> Result<PlanNode> {
    let Some(join) = &stmt.join else {
        return Ok(PlanNode::Scan {
            table: stmt.table.clone(),
            schema: row_type_to_schema(ctx, &stmt.input)?,
            predicate: None,
        });
    };

    let (left, right) = stmt
        .join_sides()
        .ok_or_else(|| Error::invariant("join without sides"))?;
    let left = PlanNode::Scan {
        table: stmt.table.clone(),
        schema: row_type_to_schema(ctx, &left)?,
        predicate: None,
    };
    let right = PlanNode::Scan {
        table: join.right_table.clone(),
        schema: row_type_to_schema(ctx, &right)?,
        predicate: None,
    };
    let schema = concat_schemas(left.output_schema(), right.output_schema());
    Ok(PlanNode::NestLoopJoin {
        left: Box::new(left),
        right: Box::new(right),
        predicate: None,
        schema,
    })
}

/// Output of a join: left columns, then right columns, renumbered. Right-side
/// tuple refs are re-pointed at side 1.
fn concat_schemas(left: &NodeSchema, right: &NodeSchema) -> NodeSchema {
    let mut out = NodeSchema::new();
    for col in &left.columns {
        out.push(col.clone());
    }
    for col in &right.columns {
        let mut col = col.clone();
        if let Expr::TupleRef(t) = &mut col.expr {
            t.table_index = 1;
        }
        out.push(col);
    }
    out
}

/// AND `cond` into the predicate of a scan.
fn push_scan_predicate(plan: &mut PlanNode, cond: Expr) -> Result<()> {
    match plan {
        PlanNode::Scan { predicate, .. } => {
            *predicate = Some(match predicate.take() {
                Some(existing) => Expr::conjunction(ConjunctionOp::And, existing, cond),
                None => cond,
            });
            Ok(())
        }
        other => Err(Error::invariant(format!(
            "a filter needs a scan input, got {}",
            other.name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::yaml::parse_yaml_statement;
    use rexc_core::plan::AggregateStrategy;

    const FILTERED: &str = r#"
table: T
input:
  - { name: A, type: { kind: INTEGER } }
  - { name: B, type: { kind: INTEGER } }
condition:
  rex: call
  op: { kind: EQUALS }
  type: { kind: BOOLEAN }
  operands:
    - { rex: input_ref, index: 0, type: { kind: INTEGER } }
    - { rex: dynamic_param, type: { kind: INTEGER } }
projects:
  - name: B
    expr: { rex: input_ref, index: 1, type: { kind: INTEGER } }
  - name: P
    expr: { rex: dynamic_param, type: { kind: INTEGER } }
"#;

    #[test]
    fn scan_then_projection() {
        let stmt = parse_yaml_statement(FILTERED).unwrap();
        let compiled = compile_statement(&stmt, &PlannerConfig::default()).unwrap();
        assert_eq!(compiled.parameter_count, 2);

        let PlanNode::Projection { input, schema } = &compiled.plan else {
            panic!("expected projection root");
        };
        assert_eq!(schema.names().collect::<Vec<_>>(), vec!["B", "P"]);
        assert_eq!(schema.columns[1].expr.parameter_indices(), vec![0]);
        match input.as_ref() {
            PlanNode::Scan { predicate, .. } => {
                assert_eq!(predicate.as_ref().unwrap().to_string(), "(T.A = ?1)");
            }
            other => panic!("expected scan, got {:?}", other),
        }
    }

    #[test]
    fn parameters_restart_per_statement() {
        let stmt = parse_yaml_statement(FILTERED).unwrap();
        let cfg = PlannerConfig::default();
        let a = compile_statement(&stmt, &cfg).unwrap();
        let b = compile_statement(&stmt, &cfg).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn join_statement_builds_nest_loop() {
        let src = r#"
table: L
input:
  - { name: id, type: { kind: INTEGER } }
  - { name: rid, type: { kind: INTEGER } }
join:
  left_fields: 1
  right_table: R
  condition:
    rex: call
    op: { kind: EQUALS }
    type: { kind: BOOLEAN }
    operands:
      - { rex: input_ref, index: 0, type: { kind: INTEGER } }
      - { rex: input_ref, index: 1, type: { kind: INTEGER } }
"#;
        let stmt = parse_yaml_statement(src).unwrap();
        let compiled = compile_statement(&stmt, &PlannerConfig::default()).unwrap();
        let PlanNode::NestLoopJoin {
            predicate, schema, ..
        } = &compiled.plan
        else {
            panic!("expected join root");
        };
        assert_eq!(predicate.as_ref().unwrap().to_string(), "($0.000 = $1.000)");
        let ordinals: Vec<usize> = schema.columns.iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1]);

        let sides: Vec<(usize, usize)> = schema
            .columns
            .iter()
            .map(|c| match &c.expr {
                Expr::TupleRef(t) => (t.table_index, t.column_index),
                other => panic!("expected tuple ref, got {}", other),
            })
            .collect();
        assert_eq!(sides, vec![(0, 0), (1, 0)]);
    }

    #[test]
    fn program_projection_numbers_before_condition() {
        let src = r#"
input:
  - { name: a, type: { kind: INTEGER } }
program:
  exprs:
    - { rex: input_ref, index: 0, type: { kind: INTEGER } }
    - { rex: dynamic_param, type: { kind: INTEGER } }
    - rex: call
      op: { kind: LESS_THAN }
      type: { kind: BOOLEAN }
      operands:
        - { rex: local_ref, index: 0, type: { kind: INTEGER } }
        - { rex: local_ref, index: 1, type: { kind: INTEGER } }
    - { rex: dynamic_param, type: { kind: INTEGER } }
  projects: [ { ref: 3, name: p } ]
  condition: 2
"#;
        let stmt = parse_yaml_statement(src).unwrap();
        let compiled = compile_statement(&stmt, &PlannerConfig::default()).unwrap();
        assert_eq!(compiled.parameter_count, 2);
        let PlanNode::Projection { input, schema } = &compiled.plan else {
            panic!("expected projection root");
        };
        assert_eq!(schema.columns[0].expr.to_string(), "?0");
        match input.as_ref() {
            PlanNode::Scan { predicate, .. } => {
                assert_eq!(predicate.as_ref().unwrap().to_string(), "($0.000 < ?1)");
            }
            other => panic!("expected scan, got {:?}", other),
        }
    }

    #[test]
    fn program_condition_lands_on_the_scan() {
        let src = r#"
input:
  - { name: a, type: { kind: INTEGER } }
program:
  exprs:
    - { rex: input_ref, index: 0, type: { kind: INTEGER } }
    - { rex: literal, value: { exact: 3 }, type: { kind: INTEGER } }
    - rex: call
      op: { kind: LESS_THAN }
      type: { kind: BOOLEAN }
      operands:
        - { rex: local_ref, index: 0, type: { kind: INTEGER } }
        - { rex: local_ref, index: 1, type: { kind: INTEGER } }
  projects: [ { ref: 0, name: a } ]
  condition: 2
aggregate:
  strategy: serial
  calls:
    - { kind: COUNT, type: { kind: BIGINT, nullable: false } }
"#;
        let stmt = parse_yaml_statement(src).unwrap();
        let compiled = compile_statement(&stmt, &PlannerConfig::default()).unwrap();
        let PlanNode::Aggregate(agg) = &compiled.plan else {
            panic!("expected aggregate root");
        };
        assert_eq!(agg.strategy, AggregateStrategy::Serial);
        let PlanNode::Projection { input, .. } = agg.input.as_ref() else {
            panic!("expected projection under aggregate");
        };
        match input.as_ref() {
            PlanNode::Scan { predicate, .. } => {
                assert_eq!(predicate.as_ref().unwrap().to_string(), "($0.000 < 3)");
            }
            other => panic!("expected scan, got {:?}", other),
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let stmt = parse_yaml_statement(FILTERED).unwrap();
        let cfg = PlannerConfig::default().with_max_expression_depth(0);
        assert!(matches!(
            compile_statement(&stmt, &cfg),
            Err(Error::Config(_))
        ));
    }
}
