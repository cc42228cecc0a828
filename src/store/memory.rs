// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! In-process backend: one map entry per IMSI. Mutations go through the
//! entry guard, so each `apply` is atomic per document.

use anyhow::Result;
use dashmap::DashMap;

use crate::store::{
    document::SubscriberDocument,
    ops::{ApplyOutcome, DocumentBackend, UpdateOp, run_ops},
};

#[derive(Debug, Default)]
pub struct MemoryBackend {
    docs: DashMap<String, SubscriberDocument>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentBackend for MemoryBackend {
    fn find(&self, imsi: &str) -> Result<Option<SubscriberDocument>> {
        Ok(self.docs.get(imsi).map(|doc| doc.value().clone()))
    }

    fn apply(&self, imsi: &str, ops: &[UpdateOp]) -> Result<ApplyOutcome> {
        match self.docs.get_mut(imsi) {
            Some(mut entry) => Ok(run_ops(entry.value_mut(), ops)),
            None => Ok(ApplyOutcome::default()),
        }
    }

    fn insert(&self, doc: SubscriberDocument) -> Result<()> {
        self.docs.insert(doc.imsi.clone(), doc);
        Ok(())
    }
}
