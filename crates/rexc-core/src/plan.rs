//! Physical plan nodes that carry converted expressions and schemas.
//!
//! The plan-node builder consumes these verbatim; nothing downstream
//! re-resolves types.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::schema::{NodeSchema, TypeInfo};

/// Physical aggregate strategy. Chosen by the optimizer, never inferred here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateStrategy {
    /// Input arrives ordered by the grouping columns; groups end when the
    /// grouping values change.
    Serial,
    /// Keyed accumulator table; any input order.
    Hash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateFunction {
    CountStar,
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl AggregateFunction {
    pub fn name(self) -> &'static str {
        match self {
            AggregateFunction::CountStar => "COUNT(*)",
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
            AggregateFunction::Avg => "AVG",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateColumn {
    pub func: AggregateFunction,
    pub distinct: bool,
    /// None only for COUNT(*).
    pub operand: Option<Expr>,
    pub name: String,
    pub ty: TypeInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatePlanNode {
    pub strategy: AggregateStrategy,
    pub group_by: Vec<Expr>,
    /// Grouping sets as positions into `group_by`. Empty for plain GROUP BY.
    pub grouping_sets: Vec<Vec<usize>>,
    pub aggregates: Vec<AggregateColumn>,
    pub post_predicate: Option<Expr>,
    pub output_schema: NodeSchema,
    pub input: Box<PlanNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanNode {
    Scan {
        table: String,
        schema: NodeSchema,
        predicate: Option<Expr>,
    },
    Projection {
        input: Box<PlanNode>,
        schema: NodeSchema,
    },
    NestLoopJoin {
        left: Box<PlanNode>,
        right: Box<PlanNode>,
        predicate: Option<Expr>,
        schema: NodeSchema,
    },
    Aggregate(AggregatePlanNode),
}

impl PlanNode {
    pub fn name(&self) -> &'static str {
        match self {
            PlanNode::Scan { .. } => "SeqScan",
            PlanNode::Projection { .. } => "Projection",
            PlanNode::NestLoopJoin { .. } => "NestLoopJoin",
            PlanNode::Aggregate(agg) => match agg.strategy {
                AggregateStrategy::Serial => "SerialAggregate",
                AggregateStrategy::Hash => "HashAggregate",
            },
        }
    }

    pub fn output_schema(&self) -> &NodeSchema {
        match self {
            PlanNode::Scan { schema, .. }
            | PlanNode::Projection { schema, .. }
            | PlanNode::NestLoopJoin { schema, .. } => schema,
            PlanNode::Aggregate(agg) => &agg.output_schema,
        }
    }

    pub fn children(&self) -> Vec<&PlanNode> {
        match self {
            PlanNode::Scan { .. } => vec![],
            PlanNode::Projection { input, .. } => vec![input.as_ref()],
            PlanNode::NestLoopJoin { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            PlanNode::Aggregate(agg) => vec![agg.input.as_ref()],
        }
    }

    /// Returns the number of inputs for this node.
    pub fn inputs(&self) -> usize {
        self.children().len()
    }

    pub fn is_unary(&self) -> bool {
        self.inputs() == 1
    }

    pub fn is_binary(&self) -> bool {
        self.inputs() == 2
    }

    /// Indented, human-readable rendering of the tree (one node per line,
    /// children below their parent).
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_into(&mut out, 0);
        out
    }

    fn explain_into(&self, out: &mut String, indent: usize) {
        let pad = "  ".repeat(indent);
        let _ = write!(out, "{}{}", pad, self.name());
        match self {
            PlanNode::Scan {
                table, predicate, ..
            } => {
                let _ = write!(out, " {}", table);
                if let Some(p) = predicate {
                    let _ = write!(out, " filter={}", p);
                }
            }
            PlanNode::NestLoopJoin {
                predicate: Some(p), ..
            } => {
                let _ = write!(out, " on={}", p);
            }
            PlanNode::Aggregate(agg) => {
                let keys: Vec<String> = agg.group_by.iter().map(|e| e.to_string()).collect();
                let _ = write!(out, " group=[{}]", keys.join(", "));
                if let Some(p) = &agg.post_predicate {
                    let _ = write!(out, " having={}", p);
                }
            }
            _ => {}
        }
        out.push('\n');
        for col in &self.output_schema().columns {
            let _ = writeln!(
                out,
                "{}  #{} {}: {} = {}",
                pad,
                col.ordinal,
                col.name,
                col.value_type().value_type,
                col.expr
            );
        }
        for child in self.children() {
            child.explain_into(out, indent + 1);
        }
    }
}
