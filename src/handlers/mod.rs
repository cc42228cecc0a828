// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! S6a command handlers and the answer scaffolding they share. Every answer,
//! success or failure, carries `Auth-Session-State`, the origin AVPs and the
//! `Vendor-Specific-Application-Id` group.

pub mod air;
pub mod ulr;

pub use air::AirHandler;
pub use ulr::UlrHandler;

use anyhow::Result;
use tracing::warn;

use crate::{
    context::HssContext,
    errors::{AnswerCode, HssError, answer_code_for},
    models::{
        avp::{Avp, AvpValue},
        dict,
        message::Message,
    },
};

const MAX_IMSI_DIGITS: usize = 15;

/// `User-Name` holds the IMSI in ASCII; anything past 15 digits is dropped.
pub(crate) fn user_name(req: &Message) -> Result<String> {
    let avp = req
        .find(dict::AVP_USER_NAME, None)
        .ok_or(HssError::MalformedRequest { avp: "User-Name" })?;
    let s = avp.as_utf8()?;
    Ok(s.chars().take(MAX_IMSI_DIGITS).collect())
}

pub(crate) fn visited_plmn_id(req: &Message) -> Result<[u8; 3]> {
    let avp = req
        .find(dict::AVP_VISITED_PLMN_ID, Some(dict::VENDOR_3GPP))
        .ok_or(HssError::MalformedRequest { avp: "Visited-PLMN-Id" })?;
    let data = avp.octets()?;
    if data.len() < 3 {
        return Err(HssError::MalformedRequest { avp: "Visited-PLMN-Id" }.into());
    }
    Ok([data[0], data[1], data[2]])
}

pub(crate) fn vendor_specific_app_id() -> Avp {
    Avp::base(
        dict::AVP_VENDOR_SPECIFIC_APPLICATION_ID,
        AvpValue::Grouped(vec![
            Avp::base(dict::AVP_VENDOR_ID, AvpValue::Unsigned32(dict::VENDOR_3GPP)),
            Avp::base(
                dict::AVP_AUTH_APPLICATION_ID,
                AvpValue::Unsigned32(dict::APP_S6A),
            ),
        ]),
    )
}

pub(crate) fn set_answer_code(ans: &mut Message, code: AnswerCode) {
    match code {
        AnswerCode::Base(rc) => {
            ans.push(Avp::base(dict::AVP_RESULT_CODE, AvpValue::Unsigned32(rc)));
        },
        AnswerCode::Experimental(rc) => {
            ans.push(Avp::base(
                dict::AVP_EXPERIMENTAL_RESULT,
                AvpValue::Grouped(vec![
                    Avp::base(
                        dict::AVP_VENDOR_ID,
                        AvpValue::Unsigned32(dict::VENDOR_3GPP),
                    ),
                    Avp::base(
                        dict::AVP_EXPERIMENTAL_RESULT_CODE,
                        AvpValue::Unsigned32(rc),
                    ),
                ]),
            ));
        },
    }
}

pub(crate) fn finish_answer(ctx: &HssContext, ans: &mut Message) {
    ans.push(Avp::base(
        dict::AVP_AUTH_SESSION_STATE,
        AvpValue::Integer32(dict::NO_STATE_MAINTAINED),
    ));
    ans.push(Avp::base(
        dict::AVP_ORIGIN_HOST,
        AvpValue::Utf8String(ctx.origin_host().to_string()),
    ));
    ans.push(Avp::base(
        dict::AVP_ORIGIN_REALM,
        AvpValue::Utf8String(ctx.origin_realm().to_string()),
    ));
    ans.push(vendor_specific_app_id());
}

/// Turns any handler failure into a complete error answer; nothing fails
/// silently and nothing propagates to the dispatch façade.
pub(crate) fn error_answer(
    ctx: &HssContext,
    req: &Message,
    err: &anyhow::Error,
) -> Message {
    let code = answer_code_for(err);
    warn!("command {} failed with {code:?}: {err:#}", req.code);
    let mut ans = Message::answer_to(req);
    set_answer_code(&mut ans, code);
    finish_answer(ctx, &mut ans);
    ans
}
