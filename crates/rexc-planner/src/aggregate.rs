//! Physical aggregate adapter.
//!
//! `AggregateRel` is the optimizer-side physical aggregate: group set,
//! aggregate calls, optional post-aggregate predicate, and a strategy the
//! optimizer has already picked. `to_plan_node` lowers it into an
//! `AggregatePlanNode`; serial and hashed variants share every conversion step
//! and differ only in the strategy tag they carry.

use serde::{Deserialize, Serialize};

use rexc_core::error::{Error, Result};
use rexc_core::expr::Expr;
use rexc_core::hash::{hash_serde, Hash256};
use rexc_core::plan::{
    AggregateColumn, AggregateFunction, AggregatePlanNode, AggregateStrategy, PlanNode,
};
use rexc_core::rex::{AggKind, AggregateCall, RexNode};
use rexc_core::schema::{NodeSchema, SchemaColumn};

use crate::context::CompileContext;
use crate::convert::ExprConverter;
use crate::types::resolve_type;

/// How rows are spread across partitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    #[default]
    Any,
    Single,
    Hashed(Vec<usize>),
}

/// Physical traits the optimizer attaches to a rel: ordering and distribution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitSet {
    /// Output ordering as field indices, most significant first.
    #[serde(default)]
    pub collation: Vec<usize>,
    #[serde(default)]
    pub distribution: Distribution,
}

impl TraitSet {
    pub fn sorted_on(fields: Vec<usize>) -> Self {
        Self {
            collation: fields,
            distribution: Distribution::Any,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRel {
    pub strategy: AggregateStrategy,
    pub traits: TraitSet,
    pub input: PlanNode,
    pub group_set: Vec<usize>,
    pub group_sets: Vec<Vec<usize>>,
    pub agg_calls: Vec<AggregateCall>,
    pub post_predicate: Option<RexNode>,
}

impl AggregateRel {
    pub fn new(
        strategy: AggregateStrategy,
        traits: TraitSet,
        input: PlanNode,
        group_set: Vec<usize>,
        agg_calls: Vec<AggregateCall>,
    ) -> Self {
        Self {
            strategy,
            traits,
            input,
            group_set,
            group_sets: vec![],
            agg_calls,
            post_predicate: None,
        }
    }

    pub fn with_group_sets(mut self, group_sets: Vec<Vec<usize>>) -> Self {
        self.group_sets = group_sets;
        self
    }

    pub fn with_post_predicate(mut self, predicate: RexNode) -> Self {
        self.post_predicate = Some(predicate);
        self
    }

    /// Same aggregate over a different input and trait set. Strategy, groups,
    /// calls and post predicate carry over unchanged.
    pub fn copy(&self, traits: TraitSet, input: PlanNode) -> Self {
        Self {
            strategy: self.strategy,
            traits,
            input,
            group_set: self.group_set.clone(),
            group_sets: self.group_sets.clone(),
            agg_calls: self.agg_calls.clone(),
            post_predicate: self.post_predicate.clone(),
        }
    }

    /// Fingerprint of the aggregate configuration, ignoring input and traits.
    pub fn config_fingerprint(&self) -> Result<Hash256> {
        hash_serde(&(
            &self.strategy,
            &self.group_set,
            &self.group_sets,
            &self.agg_calls,
            &self.post_predicate,
        ))
    }

    pub fn to_plan_node(&self, ctx: &mut CompileContext) -> Result<PlanNode> {
        let input_schema = self.input.output_schema();
        let group_set = normalized_group_set(&self.group_set);
        let mut output = NodeSchema::new();

        let mut group_by = Vec::with_capacity(group_set.len());
        for &idx in &group_set {
            let (col, tve) = input_column_ref(input_schema, idx)?;
            let name = col.name.clone();
            group_by.push(tve.clone());
            output.push(SchemaColumn {
                name: name.clone(),
                table_name: String::new(),
                column_name: name,
                ordinal: output.len(),
                expr: tve,
            });
        }

        let grouping_sets = self.grouping_set_positions(&group_set)?;

        let mut aggregates = Vec::with_capacity(self.agg_calls.len());
        for call in &self.agg_calls {
            let ordinal = output.len();
            let func = aggregate_function(call)?;
            let operand = match call.args.as_slice() {
                [] => None,
                [arg] => Some(input_column_ref(input_schema, *arg)?.1),
                args => {
                    return Err(Error::unsupported(format!(
                        "{} over {} arguments",
                        call.kind,
                        args.len()
                    )));
                }
            };
            if operand.is_none() && func != AggregateFunction::CountStar {
                return Err(Error::invariant(format!(
                    "{} without an argument",
                    call.kind
                )));
            }

            let ty = resolve_type(&call.ty, ctx.config())?;
            // Unnamed calls follow the optimizer's `$f<ordinal>` convention.
            let name = call
                .name
                .clone()
                .unwrap_or_else(|| format!("$f{}", ordinal));

            output.push(SchemaColumn::computed(
                name.clone(),
                ordinal,
                Expr::tuple_ref("", name.clone(), ordinal, 0, ty),
            ));
            aggregates.push(AggregateColumn {
                func,
                distinct: call.distinct,
                operand,
                name,
                ty,
            });
        }

        let post_predicate = match &self.post_predicate {
            Some(pred) => Some(ExprConverter::new(ctx).convert(pred)?),
            None => None,
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            strategy = ?self.strategy,
            group_by = group_by.len(),
            aggregates = aggregates.len(),
            having = post_predicate.is_some(),
            "built aggregate plan node"
        );

        Ok(PlanNode::Aggregate(AggregatePlanNode {
            strategy: self.strategy,
            group_by,
            grouping_sets,
            aggregates,
            post_predicate,
            output_schema: output,
            input: Box::new(self.input.clone()),
        }))
    }

    /// Grouping sets as positions into the (sorted) group-by list. A single
    /// set equal to the group set is plain GROUP BY and yields no sets.
    fn grouping_set_positions(&self, group_set: &[usize]) -> Result<Vec<Vec<usize>>> {
        match self.group_sets.as_slice() {
            [] => return Ok(vec![]),
            [only] if normalized_group_set(only) == group_set => return Ok(vec![]),
            _ => {}
        }

        self.group_sets
            .iter()
            .map(|set| {
                normalized_group_set(set)
                    .into_iter()
                    .map(|field| {
                        group_set.iter().position(|g| *g == field).ok_or_else(|| {
                            Error::invariant(format!(
                                "grouping set field {} is not in the group set {:?}",
                                field, group_set
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect()
    }
}

/// Group sets are bit sets upstream: ascending and duplicate-free.
fn normalized_group_set(fields: &[usize]) -> Vec<usize> {
    let mut out = fields.to_vec();
    out.sort_unstable();
    out.dedup();
    out
}

/// The input column at `idx` and a tuple ref reading it.
fn input_column_ref(schema: &NodeSchema, idx: usize) -> Result<(&SchemaColumn, Expr)> {
    let col = schema.column(idx).ok_or_else(|| {
        Error::invariant(format!(
            "aggregate references input field {} but the input has {} columns",
            idx,
            schema.len()
        ))
    })?;
    let tve = Expr::tuple_ref("", col.name.clone(), idx, 0, col.value_type());
    Ok((col, tve))
}

fn aggregate_function(call: &AggregateCall) -> Result<AggregateFunction> {
    Ok(match call.kind {
        AggKind::Count if call.args.is_empty() => AggregateFunction::CountStar,
        AggKind::Count => AggregateFunction::Count,
        AggKind::Sum | AggKind::Sum0 => AggregateFunction::Sum,
        AggKind::Min => AggregateFunction::Min,
        AggKind::Max => AggregateFunction::Max,
        AggKind::Avg => AggregateFunction::Avg,
        AggKind::StddevPop
        | AggKind::StddevSamp
        | AggKind::VarPop
        | AggKind::VarSamp
        | AggKind::SingleValue => {
            return Err(Error::unsupported(format!(
                "unsupported aggregate function: {}",
                call.kind
            )));
        }
    })
}
