//! Hash-grouped aggregation.
//!
//! Grouping keys are the `Keep` aggregators' input IUs; without any `Keep`
//! the whole input is one global group. Each aggregator carries init / step
//! / finalize state; group emission order is unspecified. Cancellation is
//! polled at every emission.

use crate::algebra::logical::Aggregation;
use crate::algebra::physical::{Consumer, PhysicalOp};
use crate::error::Error;
use crate::exec::context::ExecutionContext;
use crate::plan::expr::ValueMap;
use crate::types::Value;
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::hash::{Hash, Hasher};

pub struct GroupByOp {
    pub child: Box<PhysicalOp>,
    pub aggregations: Vec<Aggregation>,
}

impl GroupByOp {
    pub fn produce(&self, ctx: &ExecutionContext<'_>, out: &mut Consumer<'_>) -> Result<(), Error> {
        let key_ius: Vec<_> = self
            .aggregations
            .iter()
            .filter_map(|agg| match agg {
                Aggregation::Keep { iu, .. } => Some(*iu),
                _ => None,
            })
            .collect();

        let mut groups: HashMap<GroupKey, Vec<AggState>> = HashMap::new();

        self.child.produce(ctx, &mut |values| {
            let key = GroupKey(
                key_ius
                    .iter()
                    .map(|iu| {
                        values
                            .get(*iu)
                            .cloned()
                            .unwrap_or(Value::Null)
                            .into_owned()
                    })
                    .collect(),
            );
            let states = groups
                .entry(key)
                .or_insert_with(|| self.aggregations.iter().map(AggState::init).collect());
            for (state, agg) in states.iter_mut().zip(&self.aggregations) {
                state.step(agg, values)?;
            }
            Ok(())
        })?;

        for states in groups.values() {
            ctx.check_cancelled()?;
            let mut values = ValueMap::new();
            for (state, agg) in states.iter().zip(&self.aggregations) {
                values.insert(agg.produced(), state.finalize()?);
            }
            out(&values)?;
        }
        Ok(())
    }
}

/// Grouping key; nulls group together, text compares by content.
struct GroupKey(SmallVec<[Value; 4]>);

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(&other.0)
                .all(|(a, b)| (a.is_null() && b.is_null()) || a.equals(b))
    }
}

impl Eq for GroupKey {}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for value in &self.0 {
            state.write_u64(value.hash());
        }
    }
}

/// Per-group aggregator state.
enum AggState {
    Keep(Option<Value>),
    Sum(Option<Value>),
    Avg { sum: Option<Value>, count: i64 },
    Count(i64),
    Min(Option<Value>),
}

impl AggState {
    fn init(agg: &Aggregation) -> AggState {
        match agg {
            Aggregation::Keep { .. } => AggState::Keep(None),
            Aggregation::Sum { .. } => AggState::Sum(None),
            Aggregation::Avg { .. } => AggState::Avg { sum: None, count: 0 },
            Aggregation::CountAll { .. } => AggState::Count(0),
            Aggregation::Min { .. } => AggState::Min(None),
        }
    }

    fn step(&mut self, agg: &Aggregation, values: &ValueMap) -> Result<(), Error> {
        match (self, agg) {
            (AggState::Keep(slot), Aggregation::Keep { iu, .. }) => {
                if slot.is_none() {
                    *slot = Some(
                        values
                            .get(*iu)
                            .cloned()
                            .unwrap_or(Value::Null)
                            .into_owned(),
                    );
                }
            }
            (AggState::Sum(acc), Aggregation::Sum { expr, .. }) => {
                let v = expr.eval(values)?;
                if !v.is_null() {
                    *acc = Some(match acc.take() {
                        None => v.into_owned(),
                        Some(prev) => prev.add(&v).map_err(Error::Runtime)?,
                    });
                }
            }
            (AggState::Avg { sum, count }, Aggregation::Avg { expr, .. }) => {
                let v = expr.eval(values)?;
                if !v.is_null() {
                    *sum = Some(match sum.take() {
                        None => v.into_owned(),
                        Some(prev) => prev.add(&v).map_err(Error::Runtime)?,
                    });
                    *count += 1;
                }
            }
            (AggState::Count(n), Aggregation::CountAll { .. }) => *n += 1,
            (AggState::Min(acc), Aggregation::Min { expr, .. }) => {
                let v = expr.eval(values)?;
                if !v.is_null() {
                    let replace = match acc {
                        None => true,
                        Some(prev) => matches!(
                            v.compare(prev),
                            Some(std::cmp::Ordering::Less)
                        ),
                    };
                    if replace {
                        *acc = Some(v.into_owned());
                    }
                }
            }
            _ => unreachable!("aggregator state mismatch"),
        }
        Ok(())
    }

    fn finalize(&self) -> Result<Value, Error> {
        Ok(match self {
            AggState::Keep(slot) => slot.clone().unwrap_or(Value::Null),
            AggState::Sum(acc) => acc.clone().unwrap_or(Value::Null),
            AggState::Avg { sum, count } => match sum {
                None => Value::Null,
                Some(sum) => sum
                    .divide(&Value::LongInteger(*count))
                    .map_err(Error::Runtime)?,
            },
            AggState::Count(n) => Value::Integer(*n as i32),
            AggState::Min(acc) => acc.clone().unwrap_or(Value::Null),
        })
    }
}
