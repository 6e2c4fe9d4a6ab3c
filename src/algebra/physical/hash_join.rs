//! Hash join: build left, probe right.
//!
//! `produce` drains the build (left) child into bucket chains keyed by the
//! combined hash of all build keys, then drives the probe (right) child;
//! every probe tuple hashes its keys, walks the matching bucket, and
//! recomputes all join equalities per candidate to guard against hash
//! collisions. Matches emit the union of both sides' IU maps.
//!
//! Build rows are packed into the statement arena as slot images (null mask
//! plus fixed-width fields in stored-IU order); long strings spill into a
//! join-local text pool. Everything is released when `produce` returns.
//!
//! Null join keys never match: the equality recheck uses SQL equality, so a
//! hash coincidence on null still fails the candidate test.

use crate::algebra::physical::{Consumer, PhysicalOp};
use crate::error::Error;
use crate::exec::context::ExecutionContext;
use crate::plan::expr::{Expr, ValueMap};
use crate::plan::iu::IuId;
use crate::storage::TextPool;
use crate::types::value::hash_combine;
use crate::types::{SqlType, Value};
use bumpalo::Bump;
use hashbrown::HashMap;
use smallvec::SmallVec;

enum Side {
    Build,
    Probe,
}

pub struct HashJoinOp {
    pub left: Box<PhysicalOp>,
    pub right: Box<PhysicalOp>,
    /// Equality pairs: (build-side expression, probe-side expression).
    pub pairs: Vec<(Expr, Expr)>,
    /// Build-side IUs carried across the join, with their types.
    pub stored: Vec<(IuId, SqlType)>,
}

impl HashJoinOp {
    pub fn produce(&self, ctx: &ExecutionContext<'_>, out: &mut Consumer<'_>) -> Result<(), Error> {
        let pool = TextPool::new();
        let mut rows: Vec<&[u8]> = Vec::new();
        let mut buckets: HashMap<u64, SmallVec<[u32; 2]>> = HashMap::new();

        self.left.produce(ctx, &mut |values| {
            let hash = self.key_hash(values, Side::Build)?;
            let image = pack_row(values, &self.stored, &ctx.arena, &pool);
            buckets
                .entry(hash)
                .or_default()
                .push(rows.len() as u32);
            rows.push(image);
            Ok(())
        })?;

        self.right.produce(ctx, &mut |values| {
            ctx.check_cancelled()?;
            let hash = self.key_hash(values, Side::Probe)?;
            let Some(bucket) = buckets.get(&hash) else {
                return Ok(());
            };
            for &index in bucket {
                let build = unpack_row(rows[index as usize], &self.stored);
                let mut matched = true;
                for (build_expr, probe_expr) in &self.pairs {
                    let lv = build_expr.eval(&build)?;
                    let rv = probe_expr.eval(values)?;
                    if !lv.equals(&rv) {
                        matched = false;
                        break;
                    }
                }
                if matched {
                    let mut merged = build;
                    merged.merge(values);
                    out(&merged)?;
                }
            }
            Ok(())
        })
    }

    /// Joint hash of all key expressions on one side, combined with a
    /// commutative mixer applied left-to-right.
    fn key_hash(&self, values: &ValueMap, side: Side) -> Result<u64, Error> {
        let mut seed = 0u64;
        let mut first = true;
        for (build_expr, probe_expr) in &self.pairs {
            let expr = match side {
                Side::Build => build_expr,
                Side::Probe => probe_expr,
            };
            let hash = expr.eval(values)?.hash();
            seed = if first { hash } else { hash_combine(seed, hash) };
            first = false;
        }
        Ok(seed)
    }
}

fn row_size(stored: &[(IuId, SqlType)]) -> usize {
    stored.len().div_ceil(8) + stored.iter().map(|(_, ty)| ty.slot_size()).sum::<usize>()
}

fn pack_row<'b>(
    values: &ValueMap,
    stored: &[(IuId, SqlType)],
    arena: &'b Bump,
    pool: &TextPool,
) -> &'b [u8] {
    let image = arena.alloc_slice_fill_copy(row_size(stored), 0u8);
    let mut offset = stored.len().div_ceil(8);
    for (i, (iu, ty)) in stored.iter().enumerate() {
        let width = ty.slot_size();
        match values.get(*iu) {
            None | Some(Value::Null) => image[i / 8] |= 1 << (i % 8),
            Some(value) => value.store(&mut image[offset..offset + width], pool),
        }
        offset += width;
    }
    image
}

fn unpack_row(image: &[u8], stored: &[(IuId, SqlType)]) -> ValueMap {
    let mut values = ValueMap::new();
    let mut offset = stored.len().div_ceil(8);
    for (i, (iu, ty)) in stored.iter().enumerate() {
        let width = ty.slot_size();
        if image[i / 8] >> (i % 8) & 1 != 0 {
            values.insert(*iu, Value::Null);
        } else {
            values.insert(*iu, Value::load(&image[offset..offset + width], *ty));
        }
        offset += width;
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_rows_round_trip() {
        let stored = vec![
            (0 as IuId, SqlType::integer(false)),
            (1, SqlType::text(true)),
        ];
        let arena = Bump::new();
        let pool = TextPool::new();
        let mut values = ValueMap::new();
        values.insert(0, Value::Integer(42));
        values.insert(1, Value::str("a long string that exceeds the inline bound"));
        let image = pack_row(&values, &stored, &arena, &pool);
        let back = unpack_row(image, &stored);
        assert!(back.get(0).unwrap().equals(&Value::Integer(42)));
        assert!(back
            .get(1)
            .unwrap()
            .equals(&Value::str("a long string that exceeds the inline bound")));
    }

    #[test]
    fn packed_rows_round_trip_null() {
        let stored = vec![(5 as IuId, SqlType::integer(true))];
        let arena = Bump::new();
        let pool = TextPool::new();
        let mut values = ValueMap::new();
        values.insert(5, Value::Null);
        let image = pack_row(&values, &stored, &arena, &pool);
        let back = unpack_row(image, &stored);
        assert!(back.get(5).unwrap().is_null());
    }
}
