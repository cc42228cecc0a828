// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Process-wide HSS context: Diameter identity and listen configuration,
//! the store handle and the vector pool. Built once at startup and threaded
//! into the handlers, which close over it at registration time.

use std::sync::{Arc, Mutex};

use anyhow::{Result, bail, ensure};
use dashmap::DashMap;

use crate::{
    cfg::config::{Config, Extension, FreeDiameter, Peer},
    pool::AvPool,
    store::SubscriberStore,
};

pub struct HssContext {
    origin_host: String,
    origin_realm: String,
    listen_on: String,
    port: u16,
    sec_port: u16,
    peers: Vec<Peer>,
    extensions: Vec<Extension>,
    log_keys: bool,
    store: Arc<dyn SubscriberStore>,
    pool: AvPool,
    // One writer per IMSI across a whole AIR transaction.
    imsi_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl HssContext {
    pub fn new(cfg: &Config, store: Arc<dyn SubscriberStore>) -> Result<Arc<Self>> {
        let node = match &cfg.hss.free_diameter {
            FreeDiameter::Inline(node) => node,
            FreeDiameter::ConfPath(path) => bail!(
                "hss.freeDiameter points at an external config ({path}); the embedded \
                 dispatch shell needs the mapping form with identity/realm/listen_on"
            ),
        };
        ensure!(!node.identity.is_empty(), "hss.freeDiameter.identity is required");
        ensure!(!node.realm.is_empty(), "hss.freeDiameter.realm is required");

        Ok(Arc::new(Self {
            origin_host: node.identity.clone(),
            origin_realm: node.realm.clone(),
            listen_on: node.listen_on.clone(),
            port: node.port,
            sec_port: node.sec_port,
            peers: node.connect.clone(),
            extensions: node.load_extension.clone(),
            log_keys: cfg.hss.log_keys,
            pool: AvPool::new(store.clone()),
            store,
            imsi_locks: DashMap::new(),
        }))
    }

    pub fn store(&self) -> &Arc<dyn SubscriberStore> {
        &self.store
    }

    pub fn pool(&self) -> &AvPool {
        &self.pool
    }

    pub fn origin_host(&self) -> &str {
        &self.origin_host
    }

    pub fn origin_realm(&self) -> &str {
        &self.origin_realm
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_on, self.port)
    }

    pub fn sec_port(&self) -> u16 {
        self.sec_port
    }

    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    /// Hex for the log line, or a placeholder unless key logging was
    /// explicitly enabled in the config.
    pub fn display_key(&self, bytes: &[u8]) -> String {
        crate::utils::hex_or_redacted(self.log_keys, bytes)
    }

    /// Serialises writers per IMSI for the span of one transaction.
    pub fn imsi_lock(&self, imsi: &str) -> Arc<Mutex<()>> {
        self.imsi_locks
            .entry(imsi.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
