// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use hss_s6a_rs::{
    auc::SQN_STEP,
    errors::HssError,
    pool::{AV_REFILL_COUNT, AvPool},
    store::SubscriberStore,
};

use crate::unit_tests::{IMSI, PLMN_ID, SQN_START, memory_store, subscriber_doc};

#[test]
fn refill_on_empty_queue_returns_the_head_vector() -> Result<()> {
    let store = memory_store();
    let pool = AvPool::new(store.clone());

    let info = store.load(IMSI)?;
    let av = pool.acquire(&info, &PLMN_ID)?;

    // Head of the fresh batch: one IND step past the stored base.
    assert_eq!(av.sqn, SQN_START + SQN_STEP);
    assert_eq!(av.xres.len(), 8);

    // The rest of the batch stays queued, strictly increasing.
    let mut sqns = vec![av.sqn];
    while let Some(queued) = store.pop_av(IMSI)? {
        sqns.push(queued.sqn);
    }
    assert_eq!(sqns.len(), AV_REFILL_COUNT as usize);
    assert!(sqns.windows(2).all(|w| w[0] < w[1]));
    Ok(())
}

#[test]
fn refill_uses_a_fresh_challenge_per_vector() -> Result<()> {
    let store = memory_store();
    let pool = AvPool::new(store.clone());

    let info = store.load(IMSI)?;
    let head = pool.acquire(&info, &PLMN_ID)?;

    let mut rands = vec![head.rand];
    while let Some(queued) = store.pop_av(IMSI)? {
        rands.push(queued.rand);
    }
    rands.sort_unstable();
    rands.dedup();
    assert_eq!(rands.len(), AV_REFILL_COUNT as usize);
    Ok(())
}

#[test]
fn consecutive_acquires_drain_the_queue_before_refilling() -> Result<()> {
    let store = memory_store();
    let pool = AvPool::new(store.clone());

    let info = store.load(IMSI)?;
    let first = pool.acquire(&info, &PLMN_ID)?;
    let second = pool.acquire(&info, &PLMN_ID)?;

    assert_eq!(second.sqn, first.sqn + SQN_STEP);
    assert_ne!(first.rand, second.rand);
    Ok(())
}

#[test]
fn remote_subscriber_never_derives_locally() -> Result<()> {
    let store = memory_store();

    let mut doc = subscriber_doc("999990000000001");
    doc.remote = Some(true);
    store.provision(doc)?;

    let pool = AvPool::new(store.clone());
    let info = store.load("999990000000001")?;
    assert!(!info.is_local());

    let err = pool.acquire(&info, &PLMN_ID).expect_err("queue is empty");
    assert!(matches!(
        err.downcast_ref::<HssError>(),
        Some(HssError::PoolEmpty { .. })
    ));
    Ok(())
}
