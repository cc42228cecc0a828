// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Update-Location-Request (command 316).
//!
//! Stateless: loads the subscription profile and encodes it into a
//! `Subscription-Data` group, unless the MME asked to skip it via
//! `ULR-Flags`.

use std::{net::IpAddr, sync::Arc};

use anyhow::Result;
use bitflags::bitflags;
use tracing::debug;

use crate::{
    context::HssContext,
    diameter::dispatcher::S6aHandler,
    errors::{AnswerCode, HssError},
    handlers::{error_answer, finish_answer, set_answer_code, user_name, visited_plmn_id},
    models::{
        avp::{Avp, AvpValue},
        dict,
        message::Message,
    },
    store::{Ambr, Pdn, SubscriptionProfile},
};

bitflags! {
    /// ULR-Flags (TS 29.272 §7.3.7).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UlrFlags: u32 {
        const SINGLE_REGISTRATION_INDICATION = 1 << 0;
        const S6A_S6D_INDICATOR = 1 << 1;
        const SKIP_SUBSCRIBER_DATA = 1 << 2;
        const GPRS_SUBSCRIPTION_DATA_INDICATOR = 1 << 3;
        const NODE_TYPE_INDICATOR = 1 << 4;
        const INITIAL_ATTACH_INDICATOR = 1 << 5;
        const PS_LCS_NOT_SUPPORTED_BY_UE = 1 << 6;
    }
}

pub struct UlrHandler {
    ctx: Arc<HssContext>,
}

impl UlrHandler {
    pub fn new(ctx: Arc<HssContext>) -> Self {
        Self { ctx }
    }

    fn process(&self, req: &Message) -> Result<Message> {
        let imsi = user_name(req)?;
        let _plmn_id = visited_plmn_id(req)?;
        let flags = ulr_flags(req)?;

        let profile = self.ctx.store().load_profile(&imsi)?;
        debug!(
            "IMSI {imsi}: ULR flags {flags:?}, {} PDN entries",
            profile.pdns.len()
        );

        let mut ans = Message::answer_to(req);
        set_answer_code(&mut ans, AnswerCode::Base(dict::RC_SUCCESS));
        ans.push(Avp::vendor(
            dict::AVP_ULA_FLAGS,
            AvpValue::Unsigned32(dict::ULA_FLAGS_MME_REGISTERED_FOR_SMS),
        ));
        if !flags.contains(UlrFlags::SKIP_SUBSCRIBER_DATA) {
            ans.push(subscription_data(&profile));
        }
        finish_answer(&self.ctx, &mut ans);
        Ok(ans)
    }
}

impl S6aHandler for UlrHandler {
    fn handle(&self, req: &Message) -> Result<Message> {
        debug!("[HSS] Update-Location-Request");
        let ans = match self.process(req) {
            Ok(ans) => ans,
            Err(e) => error_answer(&self.ctx, req, &e),
        };
        debug!("[HSS] Update-Location-Answer");
        Ok(ans)
    }
}

fn ulr_flags(req: &Message) -> Result<UlrFlags> {
    let avp = req
        .find(dict::AVP_ULR_FLAGS, Some(dict::VENDOR_3GPP))
        .ok_or(HssError::MalformedRequest { avp: "ULR-Flags" })?;
    Ok(UlrFlags::from_bits_retain(avp.as_u32()?))
}

fn ambr_avp(ambr: &Ambr) -> Avp {
    Avp::vendor(
        dict::AVP_AMBR,
        AvpValue::Grouped(vec![
            Avp::base(
                dict::AVP_MAX_BANDWIDTH_UL,
                AvpValue::Unsigned32(ambr.uplink.min(u32::MAX as u64) as u32),
            ),
            Avp::base(
                dict::AVP_MAX_BANDWIDTH_DL,
                AvpValue::Unsigned32(ambr.downlink.min(u32::MAX as u64) as u32),
            ),
        ]),
    )
}

fn subscription_data(profile: &SubscriptionProfile) -> Avp {
    let mut children = Vec::new();

    if profile.access_restriction_data != 0 {
        children.push(Avp::vendor(
            dict::AVP_ACCESS_RESTRICTION_DATA,
            AvpValue::Unsigned32(profile.access_restriction_data as u32),
        ));
    }
    children.push(Avp::vendor(
        dict::AVP_SUBSCRIBER_STATUS,
        AvpValue::Integer32(profile.subscriber_status),
    ));
    children.push(Avp::vendor(
        dict::AVP_NETWORK_ACCESS_MODE,
        AvpValue::Integer32(profile.network_access_mode),
    ));
    children.push(ambr_avp(&profile.ambr));
    children.push(Avp::vendor(
        dict::AVP_SUBSCRIBED_RAU_TAU_TIMER,
        AvpValue::Integer32(profile.subscribed_rau_tau_timer_min * 60),
    ));

    if !profile.pdns.is_empty() {
        let mut apn_children = vec![
            Avp::vendor(dict::AVP_CONTEXT_IDENTIFIER, AvpValue::Unsigned32(1)),
            Avp::vendor(
                dict::AVP_ALL_APN_CONFIGURATIONS_INCLUDED,
                AvpValue::Integer32(0),
            ),
        ];
        for (index, pdn) in profile.pdns.iter().enumerate() {
            apn_children.push(apn_configuration(index, pdn));
        }
        children.push(Avp::grouped(dict::AVP_APN_CONFIGURATION_PROFILE, apn_children));
    }

    Avp::grouped(dict::AVP_SUBSCRIPTION_DATA, children)
}

fn apn_configuration(index: usize, pdn: &Pdn) -> Avp {
    let mut children = vec![
        Avp::vendor(
            dict::AVP_CONTEXT_IDENTIFIER,
            AvpValue::Unsigned32(index as u32 + 1),
        ),
        Avp::vendor(dict::AVP_PDN_TYPE, AvpValue::Integer32(pdn.pdn_type.as_i32())),
    ];

    if pdn.pdn_type.has_v4()
        && let Some(addr) = pdn.ue_addr
    {
        children.push(Avp::base(
            dict::AVP_SERVED_PARTY_IP_ADDRESS,
            AvpValue::Address(IpAddr::V4(addr)),
        ));
    }
    if pdn.pdn_type.has_v6()
        && let Some(addr6) = pdn.ue_addr6
    {
        children.push(Avp::base(
            dict::AVP_SERVED_PARTY_IP_ADDRESS,
            AvpValue::Address(IpAddr::V6(addr6)),
        ));
    }

    children.push(Avp::base(
        dict::AVP_SERVICE_SELECTION,
        AvpValue::Utf8String(pdn.apn.clone()),
    ));

    children.push(Avp::vendor(
        dict::AVP_EPS_SUBSCRIBED_QOS_PROFILE,
        AvpValue::Grouped(vec![
            Avp::vendor(
                dict::AVP_QOS_CLASS_IDENTIFIER,
                AvpValue::Integer32(pdn.qos.qci),
            ),
            Avp::vendor(
                dict::AVP_ALLOCATION_RETENTION_PRIORITY,
                AvpValue::Grouped(vec![
                    Avp::vendor(
                        dict::AVP_PRIORITY_LEVEL,
                        AvpValue::Unsigned32(pdn.qos.arp.priority_level),
                    ),
                    Avp::vendor(
                        dict::AVP_PRE_EMPTION_CAPABILITY,
                        AvpValue::Unsigned32(pdn.qos.arp.pre_emption_capability),
                    ),
                    Avp::vendor(
                        dict::AVP_PRE_EMPTION_VULNERABILITY,
                        AvpValue::Unsigned32(pdn.qos.arp.pre_emption_vulnerability),
                    ),
                ]),
            ),
        ]),
    ));

    if pdn.pgw_addr.is_some() || pdn.pgw_addr6.is_some() {
        let mut agents = Vec::new();
        if let Some(addr) = pdn.pgw_addr {
            agents.push(Avp::base(
                dict::AVP_MIP_HOME_AGENT_ADDRESS,
                AvpValue::Address(IpAddr::V4(addr)),
            ));
        }
        if let Some(addr6) = pdn.pgw_addr6 {
            agents.push(Avp::base(
                dict::AVP_MIP_HOME_AGENT_ADDRESS,
                AvpValue::Address(IpAddr::V6(addr6)),
            ));
        }
        children.push(Avp::base(dict::AVP_MIP6_AGENT_INFO, AvpValue::Grouped(agents)));
    }

    if let Some(ambr) = &pdn.ambr
        && !ambr.is_zero()
    {
        children.push(ambr_avp(ambr));
    }

    Avp::grouped(dict::AVP_APN_CONFIGURATION, children)
}
