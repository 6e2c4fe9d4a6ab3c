//! Scalar expression trees.
//!
//! Each node knows its static [`SqlType`]. Evaluation takes an IU → value
//! mapping and yields a value:
//!
//! - logical connectives follow SQL ternary logic (`null AND false = false`,
//!   `null AND true = null`, `null OR true = true`, ...),
//! - arithmetic and comparisons are NULL-poisoned: any null operand yields
//!   null,
//! - division raises `DivisionByZero` at evaluation time.
//!
//! Constants are already typed values — literal casting happens once during
//! semantic analysis, not per tuple.

use crate::error::{Error, RuntimeError};
use crate::plan::iu::{IuId, IuSet};
use crate::types::{SqlType, Value};
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonMode {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonMode {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonMode::Eq => "=",
            ComparisonMode::Ne => "<>",
            ComparisonMode::Lt => "<",
            ComparisonMode::Le => "<=",
            ComparisonMode::Gt => ">",
            ComparisonMode::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    Constant(Value, SqlType),
    NullConstant(SqlType),
    Identifier(IuId, SqlType),
    Cast(Box<Expr>, SqlType),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Addition(Box<Expr>, Box<Expr>, SqlType),
    Subtraction(Box<Expr>, Box<Expr>, SqlType),
    Multiplication(Box<Expr>, Box<Expr>, SqlType),
    Division(Box<Expr>, Box<Expr>, SqlType),
    Comparison(ComparisonMode, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn equals(left: Expr, right: Expr) -> Expr {
        Expr::Comparison(ComparisonMode::Eq, Box::new(left), Box::new(right))
    }

    /// Static result type of this expression.
    pub fn sql_type(&self) -> SqlType {
        match self {
            Expr::Constant(_, ty) | Expr::NullConstant(ty) | Expr::Identifier(_, ty) => *ty,
            Expr::Cast(_, ty) => *ty,
            Expr::Not(_) | Expr::And(..) | Expr::Or(..) | Expr::Comparison(..) => {
                SqlType::bool_ty(true)
            }
            Expr::Addition(_, _, ty)
            | Expr::Subtraction(_, _, ty)
            | Expr::Multiplication(_, _, ty)
            | Expr::Division(_, _, ty) => *ty,
        }
    }

    /// Evaluates against one tuple's IU → value mapping.
    pub fn eval(&self, values: &ValueMap) -> Result<Value, Error> {
        match self {
            Expr::Constant(value, _) => Ok(value.clone()),
            Expr::NullConstant(_) => Ok(Value::Null),
            Expr::Identifier(iu, _) => {
                debug_assert!(values.get(*iu).is_some(), "iu {iu} missing from tuple");
                Ok(values.get(*iu).cloned().unwrap_or(Value::Null))
            }
            Expr::Cast(child, ty) => {
                let v = child.eval(values)?;
                v.cast_to(*ty).map_err(Error::Runtime)
            }
            Expr::Not(child) => match child.eval(values)? {
                Value::Null => Ok(Value::Null),
                Value::Bool(b) => Ok(Value::Bool(!b)),
                other => Err(Error::Runtime(RuntimeError::InvalidCast {
                    value: other.to_string(),
                    target: "bool".to_string(),
                })),
            },
            Expr::And(l, r) => {
                let lv = truth(l.eval(values)?)?;
                let rv = truth(r.eval(values)?)?;
                Ok(match (lv, rv) {
                    (Some(false), _) | (_, Some(false)) => Value::Bool(false),
                    (Some(true), Some(true)) => Value::Bool(true),
                    _ => Value::Null,
                })
            }
            Expr::Or(l, r) => {
                let lv = truth(l.eval(values)?)?;
                let rv = truth(r.eval(values)?)?;
                Ok(match (lv, rv) {
                    (Some(true), _) | (_, Some(true)) => Value::Bool(true),
                    (Some(false), Some(false)) => Value::Bool(false),
                    _ => Value::Null,
                })
            }
            Expr::Addition(l, r, _) => l.eval(values)?.add(&r.eval(values)?).map_err(Error::Runtime),
            Expr::Subtraction(l, r, _) => l
                .eval(values)?
                .subtract(&r.eval(values)?)
                .map_err(Error::Runtime),
            Expr::Multiplication(l, r, _) => l
                .eval(values)?
                .multiply(&r.eval(values)?)
                .map_err(Error::Runtime),
            Expr::Division(l, r, _) => l
                .eval(values)?
                .divide(&r.eval(values)?)
                .map_err(Error::Runtime),
            Expr::Comparison(mode, l, r) => {
                let lv = l.eval(values)?;
                let rv = r.eval(values)?;
                Ok(match lv.compare(&rv) {
                    None => Value::Null,
                    Some(ord) => Value::Bool(match mode {
                        ComparisonMode::Eq => ord.is_eq(),
                        ComparisonMode::Ne => !ord.is_eq(),
                        ComparisonMode::Lt => ord.is_lt(),
                        ComparisonMode::Le => ord.is_le(),
                        ComparisonMode::Gt => ord.is_gt(),
                        ComparisonMode::Ge => ord.is_ge(),
                    }),
                })
            }
        }
    }

    /// Predicate evaluation: null counts as not-satisfied.
    pub fn eval_predicate(&self, values: &ValueMap) -> Result<bool, Error> {
        Ok(matches!(self.eval(values)?, Value::Bool(true)))
    }

    /// Collects every IU referenced below this expression.
    pub fn collect_required(&self, out: &mut IuSet) {
        match self {
            Expr::Constant(..) | Expr::NullConstant(_) => {}
            Expr::Identifier(iu, _) => {
                out.insert(*iu);
            }
            Expr::Cast(child, _) | Expr::Not(child) => child.collect_required(out),
            Expr::And(l, r)
            | Expr::Or(l, r)
            | Expr::Addition(l, r, _)
            | Expr::Subtraction(l, r, _)
            | Expr::Multiplication(l, r, _)
            | Expr::Division(l, r, _)
            | Expr::Comparison(_, l, r) => {
                l.collect_required(out);
                r.collect_required(out);
            }
        }
    }

    pub fn required(&self) -> IuSet {
        let mut set = IuSet::new();
        self.collect_required(&mut set);
        set
    }
}

fn truth(v: Value) -> Result<Option<bool>, Error> {
    match v {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(b)),
        other => Err(Error::Runtime(RuntimeError::InvalidCast {
            value: other.to_string(),
            target: "bool".to_string(),
        })),
    }
}

/// IU → value mapping for one tuple, live for the duration of a consume
/// call.
#[derive(Debug, Clone, Default)]
pub struct ValueMap {
    entries: SmallVec<[(IuId, Value); 12]>,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, iu: IuId) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(id, _)| *id == iu)
            .map(|(_, v)| v)
    }

    /// Inserts or replaces the binding for `iu`.
    pub fn insert(&mut self, iu: IuId, value: Value) {
        for entry in &mut self.entries {
            if entry.0 == iu {
                entry.1 = value;
                return;
            }
        }
        self.entries.push((iu, value));
    }

    /// Merges `other`'s bindings into this map (used at join matches).
    pub fn merge(&mut self, other: &ValueMap) {
        for (iu, value) in &other.entries {
            self.insert(*iu, value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (IuId, &Value)> {
        self.entries.iter().map(|(id, v)| (*id, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
