//! YAML statement documents: one input relation plus the relational pieces
//! to compile over it.
//!
//! Example:
//! ```yaml
//! table: ORDERS
//! input:
//!   - { name: id,     type: { kind: INTEGER, nullable: false } }
//!   - { name: amount, type: { kind: DECIMAL, precision: 12, scale: 2 } }
//! condition:
//!   rex: call
//!   op: { kind: GREATER_THAN }
//!   type: { kind: BOOLEAN }
//!   operands:
//!     - { rex: input_ref, index: 1, type: { kind: DECIMAL, precision: 12, scale: 2 } }
//!     - { rex: dynamic_param, type: { kind: DECIMAL, precision: 12, scale: 2 } }
//! aggregate:
//!   strategy: hash
//!   group_set: [0]
//!   calls:
//!     - { kind: SUM, args: [1], type: { kind: DECIMAL, precision: 38, scale: 2 }, name: total }
//! ```

use serde::{Deserialize, Serialize};

use rexc_core::error::{Error, Result};
use rexc_core::plan::AggregateStrategy;
use rexc_core::rex::{AggregateCall, RexNode, RexProgram, RowType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Statement {
    /// Name of the scanned table; also qualifies column names in `condition`.
    #[serde(default)]
    pub table: String,
    pub input: RowType,
    /// Filter evaluated by the scan itself.
    #[serde(default)]
    pub condition: Option<RexNode>,
    #[serde(default)]
    pub program: Option<RexProgram>,
    #[serde(default)]
    pub projects: Vec<ProjectDef>,
    #[serde(default)]
    pub join: Option<JoinDef>,
    #[serde(default)]
    pub aggregate: Option<AggregateDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDef {
    pub name: String,
    pub expr: RexNode,
}

/// Splits `input` into a left relation (the first `left_fields` fields) and
/// a right relation (the rest), joined on `condition`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinDef {
    pub left_fields: usize,
    #[serde(default)]
    pub right_table: String,
    #[serde(default)]
    pub condition: Option<RexNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateDef {
    #[serde(default = "default_strategy")]
    pub strategy: AggregateStrategy,
    #[serde(default)]
    pub group_set: Vec<usize>,
    #[serde(default)]
    pub group_sets: Vec<Vec<usize>>,
    #[serde(default)]
    pub calls: Vec<AggregateCall>,
    #[serde(default)]
    pub post_predicate: Option<RexNode>,
}

fn default_strategy() -> AggregateStrategy {
    AggregateStrategy::Hash
}

impl Statement {
    /// Catalog column names of the scanned table, in field order.
    pub fn column_names(&self) -> Vec<String> {
        self.input.field_names().map(str::to_string).collect()
    }

    /// Left and right row types of the join, if there is one.
    pub fn join_sides(&self) -> Option<(RowType, RowType)> {
        let join = self.join.as_ref()?;
        let (left, right) = self.input.fields.split_at(join.left_fields);
        Some((
            RowType::new(left.to_vec()),
            RowType::new(right.to_vec()),
        ))
    }

    /// Checks that need more than one field at a time.
    pub fn validate(&self) -> Result<()> {
        if self.input.fields.is_empty() {
            return Err(Error::Parse("input must declare at least one field".into()));
        }
        if self.program.is_some() && !self.projects.is_empty() {
            return Err(Error::Parse(
                "'program' and 'projects' are mutually exclusive".into(),
            ));
        }
        if let Some(join) = &self.join {
            if join.left_fields > self.input.field_count() {
                return Err(Error::Parse(format!(
                    "join.left_fields = {} but input has {} fields",
                    join.left_fields,
                    self.input.field_count()
                )));
            }
            if self.condition.is_some() {
                return Err(Error::Parse(
                    "a scan 'condition' cannot be combined with 'join'; use join.condition".into(),
                ));
            }
            if self.program.as_ref().is_some_and(|p| p.condition.is_some()) {
                return Err(Error::Parse(
                    "a program condition needs a scan input, not a join".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Parse and validate a statement document.
pub fn parse_yaml_statement(yaml_src: &str) -> Result<Statement> {
    let doc: Statement =
        serde_yaml::from_str(yaml_src).map_err(|e| Error::Parse(e.to_string()))?;
    doc.validate()?;
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rexc_core::rex::{AggKind, SqlKind, SqlTypeName};

    const ORDERS: &str = r#"
table: ORDERS
input:
  - { name: id,     type: { kind: INTEGER, nullable: false } }
  - { name: amount, type: { kind: DECIMAL, precision: 12, scale: 2 } }
condition:
  rex: call
  op: { kind: GREATER_THAN }
  type: { kind: BOOLEAN }
  operands:
    - { rex: input_ref, index: 1, type: { kind: DECIMAL, precision: 12, scale: 2 } }
    - { rex: dynamic_param, type: { kind: DECIMAL, precision: 12, scale: 2 } }
aggregate:
  strategy: serial
  group_set: [0]
  calls:
    - { kind: SUM, args: [1], type: { kind: DECIMAL, precision: 38, scale: 2 }, name: total }
"#;

    #[test]
    fn parses_a_full_statement() {
        let s = parse_yaml_statement(ORDERS).unwrap();
        assert_eq!(s.table, "ORDERS");
        assert_eq!(s.column_names(), vec!["id", "amount"]);
        assert!(!s.input.fields[0].ty.nullable);
        assert_eq!(s.input.fields[1].ty.kind, SqlTypeName::Decimal);

        match s.condition.as_ref().unwrap() {
            RexNode::Call { op, operands, .. } => {
                assert_eq!(op.kind, SqlKind::GreaterThan);
                assert_eq!(operands.len(), 2);
            }
            other => panic!("expected call, got {:?}", other),
        }

        let agg = s.aggregate.unwrap();
        assert_eq!(agg.strategy, AggregateStrategy::Serial);
        assert_eq!(agg.calls[0].kind, AggKind::Sum);
        assert_eq!(agg.calls[0].name.as_deref(), Some("total"));
    }

    #[test]
    fn strategy_defaults_to_hash() {
        let src = r#"
input:
  - { name: a, type: { kind: BIGINT } }
aggregate:
  calls:
    - { kind: COUNT, type: { kind: BIGINT } }
"#;
        let s = parse_yaml_statement(src).unwrap();
        assert_eq!(s.aggregate.unwrap().strategy, AggregateStrategy::Hash);
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = parse_yaml_statement("input: [ { name: a").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let src = "input: [ { name: a, type: { kind: INTEGER } } ]\nsteps: []\n";
        assert!(matches!(parse_yaml_statement(src), Err(Error::Parse(_))));
    }

    #[test]
    fn program_and_projects_are_exclusive() {
        let src = r#"
input:
  - { name: a, type: { kind: INTEGER } }
program:
  exprs: [ { rex: input_ref, index: 0, type: { kind: INTEGER } } ]
  projects: [ { ref: 0, name: a } ]
projects:
  - { name: b, expr: { rex: input_ref, index: 0, type: { kind: INTEGER } } }
"#;
        assert!(matches!(parse_yaml_statement(src), Err(Error::Parse(_))));
    }

    #[test]
    fn join_split_must_fit_the_input() {
        let src = r#"
input:
  - { name: a, type: { kind: INTEGER } }
join: { left_fields: 3 }
"#;
        assert!(matches!(parse_yaml_statement(src), Err(Error::Parse(_))));
    }

    #[test]
    fn join_sides_split_the_input() {
        let src = r#"
input:
  - { name: a, type: { kind: INTEGER } }
  - { name: b, type: { kind: INTEGER } }
  - { name: c, type: { kind: VARCHAR, precision: 8 } }
join: { left_fields: 2, right_table: T2 }
"#;
        let s = parse_yaml_statement(src).unwrap();
        let (left, right) = s.join_sides().unwrap();
        assert_eq!(left.field_count(), 2);
        assert_eq!(right.field_names().collect::<Vec<_>>(), vec!["c"]);
    }
}
