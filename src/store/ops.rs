// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Atomic document operators.
//!
//! Every store mutation is expressed as a small operator program applied in
//! a single backend call (the `$set`/`$inc`/`$bit`/`$push`/`$pop` family), so
//! interleaved HSS instances sharing one backend stay correct. The store
//! layer never does read-modify-write on its own.

use anyhow::Result;
use tracing::debug;

use crate::store::document::{AvDocument, SubscriberDocument};

/// Queue bound for precomputed vectors.
pub const AV_QUEUE_DEPTH: usize = 10;

#[derive(Debug, Clone)]
pub enum UpdateOp {
    /// `$set security.rand, security.sqn`
    SetRandSqn { rand: [u8; 16], sqn: u64 },
    /// `$inc security.sqn`
    IncSqn { delta: u64 },
    /// `$bit {and}` on `security.sqn`
    MaskSqn { mask: u64 },
    /// `$push security.authvectors` (honours depth bound and SQN ordering)
    PushAv(Box<AvDocument>),
    /// `$pop -1` on `security.authvectors`, returning the removed head
    PopFrontAv,
    /// `$set security.authvectors: []`
    ClearAvs,
}

/// What a single `apply` call did.
#[derive(Debug, Default)]
pub struct ApplyOutcome {
    /// A document with the requested IMSI existed.
    pub matched: bool,
    /// At least one operator changed the document.
    pub mutated: bool,
    /// Head removed by `PopFrontAv`, if any.
    pub popped: Option<AvDocument>,
}

/// One-document-per-IMSI backend. Implementations must make each
/// [`DocumentBackend::apply`] call atomic with respect to every other call
/// on the same IMSI.
pub trait DocumentBackend: Send + Sync {
    fn find(&self, imsi: &str) -> Result<Option<SubscriberDocument>>;
    fn apply(&self, imsi: &str, ops: &[UpdateOp]) -> Result<ApplyOutcome>;
    fn insert(&self, doc: SubscriberDocument) -> Result<()>;
}

/// Shared operator interpreter used by the embedded backends.
pub fn run_ops(doc: &mut SubscriberDocument, ops: &[UpdateOp]) -> ApplyOutcome {
    let mut outcome = ApplyOutcome { matched: true, ..ApplyOutcome::default() };
    for op in ops {
        match op {
            UpdateOp::SetRandSqn { rand, sqn } => {
                doc.security.rand = hex::encode(rand);
                doc.security.sqn = (*sqn & crate::auc::SQN_MAX) as i64;
                outcome.mutated = true;
            },
            UpdateOp::IncSqn { delta } => {
                doc.security.sqn = doc.security.sqn.wrapping_add(*delta as i64);
                outcome.mutated = true;
            },
            UpdateOp::MaskSqn { mask } => {
                doc.security.sqn &= *mask as i64;
                outcome.mutated = true;
            },
            UpdateOp::PushAv(av) => {
                let queue = &mut doc.security.authvectors;
                if queue.len() >= AV_QUEUE_DEPTH {
                    debug!(
                        "IMSI {}: AV queue full ({AV_QUEUE_DEPTH}), push skipped",
                        doc.imsi
                    );
                    continue;
                }
                if queue.last().is_some_and(|tail| tail.sqn >= av.sqn) {
                    debug!(
                        "IMSI {}: AV with SQN {:#x} would break queue ordering, push \
                         skipped",
                        doc.imsi, av.sqn
                    );
                    continue;
                }
                queue.push(av.as_ref().clone());
                outcome.mutated = true;
            },
            UpdateOp::PopFrontAv => {
                if !doc.security.authvectors.is_empty() {
                    outcome.popped = Some(doc.security.authvectors.remove(0));
                    outcome.mutated = true;
                }
            },
            UpdateOp::ClearAvs => {
                if !doc.security.authvectors.is_empty() {
                    doc.security.authvectors.clear();
                    outcome.mutated = true;
                }
            },
        }
    }
    outcome
}
