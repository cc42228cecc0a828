// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use hss_s6a_rs::{
    auc::{SQN_MAX, SQN_STEP, sqn_to_bytes},
    crypto::milenage,
    diameter::dispatcher::{Dispatcher, build_dispatcher},
    models::{
        avp::{Avp, AvpValue},
        dict,
        message::Message,
    },
    store::{SubscriberStore, document::AvDocument},
};

use crate::unit_tests::{
    IMSI, K, OPC, PLMN_ID, SQN_START, memory_store, subscriber_doc, test_context,
};

fn air_request(imsi: &str) -> Message {
    let mut req = Message::request(dict::CMD_AUTHENTICATION_INFORMATION, dict::APP_S6A);
    req.push(Avp::base(
        dict::AVP_SESSION_ID,
        AvpValue::Utf8String("mme.localdomain;1;1;app_s6a".to_string()),
    ));
    req.push(Avp::base(
        dict::AVP_USER_NAME,
        AvpValue::Utf8String(imsi.to_string()),
    ));
    req.push(Avp::vendor(
        dict::AVP_VISITED_PLMN_ID,
        AvpValue::OctetString(Bytes::copy_from_slice(&PLMN_ID)),
    ));
    req.push(Avp::grouped(
        dict::AVP_REQUESTED_EUTRAN_AUTH_INFO,
        vec![Avp::vendor(
            dict::AVP_NUMBER_OF_REQUESTED_VECTORS,
            AvpValue::Unsigned32(1),
        )],
    ));
    req
}

/// Sends the request through the wire codec and the dispatcher, the way the
/// shell does.
fn roundtrip(dispatcher: &Dispatcher, req: &Message) -> Result<Message> {
    let raw = dispatcher.dispatch_bytes(&req.encode()?)?;
    Message::decode(&raw)
}

fn e_utran_vectors(ans: &Message) -> Result<Vec<Vec<Avp>>> {
    let Some(auth_info) = ans.find(dict::AVP_AUTHENTICATION_INFO, Some(dict::VENDOR_3GPP))
    else {
        return Ok(Vec::new());
    };
    auth_info
        .children()?
        .iter()
        .filter(|child| child.code == dict::AVP_E_UTRAN_VECTOR)
        .map(|vector| vector.children())
        .collect()
}

fn result_code(ans: &Message) -> Result<u32> {
    ans.find(dict::AVP_RESULT_CODE, None)
        .context("no Result-Code")?
        .as_u32()
}

fn experimental_code(ans: &Message) -> Result<u32> {
    ans.find(dict::AVP_EXPERIMENTAL_RESULT, None)
        .context("no Experimental-Result")?
        .find_child(dict::AVP_EXPERIMENTAL_RESULT_CODE, None)?
        .context("no Experimental-Result-Code")?
        .as_u32()
}

#[test]
fn air_answer_carries_exactly_one_complete_vector() -> Result<()> {
    let store = memory_store();
    let dispatcher = build_dispatcher(&test_context(store));

    let ans = roundtrip(&dispatcher, &air_request(IMSI))?;
    assert_eq!(result_code(&ans)?, dict::RC_SUCCESS);

    let vectors = e_utran_vectors(&ans)?;
    assert_eq!(vectors.len(), 1);

    let vector = &vectors[0];
    let len_of = |code: u32| -> Result<usize> {
        Ok(vector
            .iter()
            .find(|a| a.code == code)
            .with_context(|| format!("vector is missing AVP {code}"))?
            .octets()?
            .len())
    };
    assert_eq!(len_of(dict::AVP_RAND)?, 16);
    assert_eq!(len_of(dict::AVP_XRES)?, 8);
    assert_eq!(len_of(dict::AVP_AUTN)?, 16);
    assert_eq!(len_of(dict::AVP_KASME)?, 32);

    // Session state and application id ride on every answer.
    assert!(ans.find(dict::AVP_AUTH_SESSION_STATE, None).is_some());
    assert!(
        ans.find(dict::AVP_VENDOR_SPECIFIC_APPLICATION_ID, None).is_some()
    );
    assert!(ans.find(dict::AVP_ORIGIN_HOST, None).is_some());
    Ok(())
}

#[test]
fn stored_sqn_advances_by_exactly_one_ind_step_per_air() -> Result<()> {
    let store = memory_store();
    let dispatcher = build_dispatcher(&test_context(store.clone()));

    let before = store.load(IMSI)?.sqn;
    let ans = roundtrip(&dispatcher, &air_request(IMSI))?;
    assert_eq!(result_code(&ans)?, dict::RC_SUCCESS);

    let after = store.load(IMSI)?.sqn;
    assert_eq!(after, (before + SQN_STEP) & SQN_MAX);

    let ans = roundtrip(&dispatcher, &air_request(IMSI))?;
    assert_eq!(result_code(&ans)?, dict::RC_SUCCESS);
    assert_eq!(store.load(IMSI)?.sqn, (before + 2 * SQN_STEP) & SQN_MAX);
    Ok(())
}

#[test]
fn unknown_imsi_answers_user_unknown_without_vectors() -> Result<()> {
    let store = memory_store();
    let dispatcher = build_dispatcher(&test_context(store));

    let ans = roundtrip(&dispatcher, &air_request("001010000000000"))?;
    assert_eq!(experimental_code(&ans)?, dict::ERR_USER_UNKNOWN);
    assert!(ans.find(dict::AVP_RESULT_CODE, None).is_none());
    assert!(e_utran_vectors(&ans)?.is_empty());
    assert!(ans.find(dict::AVP_AUTH_SESSION_STATE, None).is_some());
    Ok(())
}

#[test]
fn missing_user_name_answers_missing_avp() -> Result<()> {
    let store = memory_store();
    let dispatcher = build_dispatcher(&test_context(store));

    let mut req = Message::request(dict::CMD_AUTHENTICATION_INFORMATION, dict::APP_S6A);
    req.push(Avp::vendor(
        dict::AVP_VISITED_PLMN_ID,
        AvpValue::OctetString(Bytes::copy_from_slice(&PLMN_ID)),
    ));
    let ans = roundtrip(&dispatcher, &req)?;
    assert_eq!(result_code(&ans)?, dict::RC_MISSING_AVP);
    Ok(())
}

fn resync_blob(sqn_ms: u64) -> Vec<u8> {
    let rand = [0x5a; 16];
    let sqn_ms_bytes = sqn_to_bytes(sqn_ms);
    let keys = milenage::f2345(&OPC, &K, &rand);

    let mut blob = Vec::with_capacity(30);
    blob.extend_from_slice(&rand);
    for i in 0..6 {
        blob.push(sqn_ms_bytes[i] ^ keys.ak_star[i]);
    }
    let (_, mac_s) = milenage::f1(&OPC, &K, &rand, &sqn_ms_bytes, &[0, 0]);
    blob.extend_from_slice(&mac_s);
    blob
}

fn air_request_with_resync(imsi: &str, blob: &[u8]) -> Message {
    let mut req = air_request(imsi);
    req.avps.retain(|a| a.code != dict::AVP_REQUESTED_EUTRAN_AUTH_INFO);
    req.push(Avp::grouped(
        dict::AVP_REQUESTED_EUTRAN_AUTH_INFO,
        vec![
            Avp::vendor(dict::AVP_NUMBER_OF_REQUESTED_VECTORS, AvpValue::Unsigned32(1)),
            Avp::vendor(
                dict::AVP_RE_SYNCHRONIZATION_INFO,
                AvpValue::OctetString(Bytes::copy_from_slice(blob)),
            ),
        ],
    ));
    req
}

#[test]
fn valid_resync_restarts_the_sqn_series_past_sqn_ms() -> Result<()> {
    let store = memory_store();
    let dispatcher = build_dispatcher(&test_context(store.clone()));

    let sqn_ms: u64 = 0x0000_00ab_cd00;
    let ans =
        roundtrip(&dispatcher, &air_request_with_resync(IMSI, &resync_blob(sqn_ms)))?;
    assert_eq!(result_code(&ans)?, dict::RC_SUCCESS);

    // Re-sync lands on SQN_MS + 33, and serving the answer vector consumes
    // one more IND step.
    let stored = store.load(IMSI)?.sqn;
    assert_eq!(stored, (sqn_ms + SQN_STEP + 1 + SQN_STEP) & SQN_MAX);
    Ok(())
}

#[test]
fn resync_with_wrong_mac_answers_authentication_data_unavailable() -> Result<()> {
    let store = memory_store();
    let dispatcher = build_dispatcher(&test_context(store.clone()));

    let before = store.load(IMSI)?.sqn;
    let mut blob = resync_blob(0x0000_00ab_cd00);
    blob[29] ^= 0xff;

    let ans = roundtrip(&dispatcher, &air_request_with_resync(IMSI, &blob))?;
    assert_eq!(
        experimental_code(&ans)?,
        dict::ERR_AUTHENTICATION_DATA_UNAVAILABLE
    );
    assert!(e_utran_vectors(&ans)?.is_empty());
    // Nothing was persisted on the failed path.
    assert_eq!(store.load(IMSI)?.sqn, before);
    Ok(())
}

#[test]
fn remote_subscriber_with_empty_queue_answers_4181() -> Result<()> {
    let store = memory_store();
    let remote_imsi = "999990000000001";
    let mut doc = subscriber_doc(remote_imsi);
    doc.remote = Some(true);
    store.provision(doc)?;

    let dispatcher = build_dispatcher(&test_context(store));
    let ans = roundtrip(&dispatcher, &air_request(remote_imsi))?;
    assert_eq!(
        experimental_code(&ans)?,
        dict::ERR_AUTHENTICATION_DATA_UNAVAILABLE
    );
    Ok(())
}

#[test]
fn remote_subscriber_consumes_queued_vectors_only() -> Result<()> {
    let store = memory_store();
    let remote_imsi = "999990000000002";
    let mut doc = subscriber_doc(remote_imsi);
    doc.remote = Some(true);
    doc.security.authvectors = vec![AvDocument {
        rand: hex::encode([0x0a; 16]),
        sqn: (SQN_START + SQN_STEP) as i64,
        xres: hex::encode([0x0b; 8]),
        kasme: hex::encode([0x0c; 32]),
        autn: hex::encode([0x0d; 16]),
        ck: hex::encode([0x0e; 16]),
        ak: hex::encode([0x0f; 6]),
        ik: hex::encode([0x01; 16]),
    }];
    store.provision(doc)?;

    let dispatcher = build_dispatcher(&test_context(store.clone()));
    let ans = roundtrip(&dispatcher, &air_request(remote_imsi))?;
    assert_eq!(result_code(&ans)?, dict::RC_SUCCESS);

    let vectors = e_utran_vectors(&ans)?;
    assert_eq!(vectors.len(), 1);
    let rand = vectors[0]
        .iter()
        .find(|a| a.code == dict::AVP_RAND)
        .context("no RAND")?
        .octets()?
        .to_vec();
    assert_eq!(rand, vec![0x0a; 16]);

    // Queue was drained and nothing got derived locally.
    assert_eq!(store.pop_av(remote_imsi)?, None);
    let ans = roundtrip(&dispatcher, &air_request(remote_imsi))?;
    assert_eq!(
        experimental_code(&ans)?,
        dict::ERR_AUTHENTICATION_DATA_UNAVAILABLE
    );
    Ok(())
}

#[test]
fn concurrent_airs_never_hand_out_the_same_challenge() -> Result<()> {
    let store = memory_store();
    let dispatcher = Arc::new(build_dispatcher(&test_context(store)));

    let mut workers = Vec::new();
    for _ in 0..4 {
        let dispatcher = dispatcher.clone();
        workers.push(std::thread::spawn(move || -> Result<Vec<Vec<u8>>> {
            let mut rands = Vec::new();
            for _ in 0..5 {
                let ans = roundtrip(&dispatcher, &air_request(IMSI))?;
                assert_eq!(result_code(&ans)?, dict::RC_SUCCESS);
                let vectors = e_utran_vectors(&ans)?;
                let rand = vectors[0]
                    .iter()
                    .find(|a| a.code == dict::AVP_RAND)
                    .context("no RAND")?
                    .octets()?
                    .to_vec();
                rands.push(rand);
            }
            Ok(rands)
        }));
    }

    let mut all = Vec::new();
    for worker in workers {
        all.extend(worker.join().expect("worker panicked")?);
    }
    let total = all.len();
    all.sort();
    all.dedup();
    assert_eq!(all.len(), total, "duplicate RAND handed out");
    Ok(())
}
