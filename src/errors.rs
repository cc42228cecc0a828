// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error;

use crate::models::dict;

/// Internal failure taxonomy of the authentication core. Every variant maps
/// to the Diameter result code carried on the answer; nothing here ever
/// reaches the dispatch façade as an error.
#[derive(Debug, Error)]
pub enum HssError {
    #[error("subscriber {imsi} is not provisioned")]
    NotProvisioned { imsi: String },

    #[error("subscriber store failure: {0}")]
    StoreTransient(String),

    #[error("re-synchronisation MAC_S mismatch for IMSI {imsi}")]
    ResyncMacMismatch { imsi: String },

    #[error("authentication vector pool is empty for IMSI {imsi}")]
    PoolEmpty { imsi: String },

    #[error("missing mandatory AVP {avp}")]
    MalformedRequest { avp: &'static str },
}

/// Where a result code goes on the answer: the base `Result-Code` AVP or a
/// 3GPP `Experimental-Result` group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerCode {
    Base(u32),
    Experimental(u32),
}

impl HssError {
    pub fn answer_code(&self) -> AnswerCode {
        match self {
            HssError::NotProvisioned { .. } => {
                AnswerCode::Experimental(dict::ERR_USER_UNKNOWN)
            },
            HssError::StoreTransient(_)
            | HssError::ResyncMacMismatch { .. }
            | HssError::PoolEmpty { .. } => {
                AnswerCode::Experimental(dict::ERR_AUTHENTICATION_DATA_UNAVAILABLE)
            },
            HssError::MalformedRequest { .. } => {
                AnswerCode::Base(dict::RC_MISSING_AVP)
            },
        }
    }
}

/// Maps any handler failure to the code its answer must carry. Unrecognised
/// errors are treated as transient store trouble, matching the reference
/// behaviour of answering 4181 for backend I/O failures.
pub fn answer_code_for(err: &anyhow::Error) -> AnswerCode {
    match err.downcast_ref::<HssError>() {
        Some(e) => e.answer_code(),
        None => AnswerCode::Experimental(dict::ERR_AUTHENTICATION_DATA_UNAVAILABLE),
    }
}
