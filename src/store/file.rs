// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Spool-directory backend: one JSON document per IMSI, written with a
//! tmp-file rename so a crash never leaves a torn document. Cached vectors
//! therefore survive a restart.

use std::{fs, io::ErrorKind, path::PathBuf};

use anyhow::{Context, Result, ensure};

use crate::store::{
    document::SubscriberDocument,
    ops::{ApplyOutcome, DocumentBackend, UpdateOp, run_ops},
};

#[derive(Debug)]
pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("cannot create spool dir {dir:?}"))?;
        Ok(Self { dir })
    }

    fn path(&self, imsi: &str) -> Result<PathBuf> {
        // The IMSI doubles as the file name; restrict it to its wire alphabet.
        ensure!(
            !imsi.is_empty()
                && imsi.len() <= 15
                && imsi.bytes().all(|b| b.is_ascii_digit()),
            "invalid IMSI `{imsi}`"
        );
        Ok(self.dir.join(format!("{imsi}.json")))
    }

    fn read(&self, imsi: &str) -> Result<Option<SubscriberDocument>> {
        let path = self.path(imsi)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("cannot read {path:?}")),
        };
        let doc = serde_json::from_str(&raw)
            .with_context(|| format!("corrupt subscriber document {path:?}"))?;
        Ok(Some(doc))
    }

    fn write(&self, doc: &SubscriberDocument) -> Result<()> {
        let path = self.path(&doc.imsi)?;
        let tmp = path.with_extension("json.tmp");
        let raw = serde_json::to_string_pretty(doc)
            .context("cannot serialize subscriber document")?;
        fs::write(&tmp, raw).with_context(|| format!("cannot write {tmp:?}"))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("cannot move {tmp:?} into place"))?;
        Ok(())
    }
}

impl DocumentBackend for JsonFileBackend {
    fn find(&self, imsi: &str) -> Result<Option<SubscriberDocument>> {
        self.read(imsi)
    }

    fn apply(&self, imsi: &str, ops: &[UpdateOp]) -> Result<ApplyOutcome> {
        let Some(mut doc) = self.read(imsi)? else {
            return Ok(ApplyOutcome::default());
        };
        let outcome = run_ops(&mut doc, ops);
        if outcome.mutated {
            self.write(&doc)?;
        }
        Ok(outcome)
    }

    fn insert(&self, doc: SubscriberDocument) -> Result<()> {
        self.write(&doc)
    }
}
