// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Message-dispatch façade.
//!
//! The base-stack concerns (peer state machine, capability exchange,
//! routing) live outside this crate; what the core needs is a registry that
//! takes a decoded request to the matching callback and always produces an
//! answer. Handlers are registered per command code with a fallback for
//! everything else, mirroring how the reference wires its three callbacks.

use std::{collections::HashMap, sync::Arc};

use anyhow::{Result, ensure};
use bytes::Bytes;
use tracing::{error, warn};

use crate::{
    context::HssContext,
    errors::AnswerCode,
    handlers::{AirHandler, UlrHandler, finish_answer, set_answer_code},
    models::{
        dict,
        message::{FLAG_ERROR, Message},
    },
};

/// A registered S6a callback. Implementations are invoked from worker tasks
/// and must be thread-safe; they must always return an answer (failures are
/// encoded as result codes, never surfaced as `Err`).
pub trait S6aHandler: Send + Sync {
    fn handle(&self, req: &Message) -> Result<Message>;
}

pub struct Dispatcher {
    handlers: HashMap<u32, Arc<dyn S6aHandler>>,
    fallback: Arc<dyn S6aHandler>,
}

impl Dispatcher {
    pub fn new(fallback: Arc<dyn S6aHandler>) -> Self {
        Self { handlers: HashMap::new(), fallback }
    }

    pub fn register(&mut self, command: u32, handler: Arc<dyn S6aHandler>) {
        self.handlers.insert(command, handler);
    }

    pub fn dispatch(&self, req: &Message) -> Message {
        let handler = self.handlers.get(&req.code).unwrap_or(&self.fallback);
        match handler.handle(req) {
            Ok(ans) => ans,
            Err(e) => {
                // Handlers answer their own failures; reaching this branch
                // means the callback itself is broken.
                error!("handler for command {} returned an error: {e:#}", req.code);
                let mut ans = Message::answer_to(req);
                ans.flags |= FLAG_ERROR;
                set_answer_code(&mut ans, AnswerCode::Base(dict::RC_UNABLE_TO_COMPLY));
                ans
            },
        }
    }

    /// Transport entry point: decode, dispatch, encode. Decode failures are
    /// connection-level errors and bubble up to the shell.
    pub fn dispatch_bytes(&self, raw: &[u8]) -> Result<Bytes> {
        let req = Message::decode(raw)?;
        ensure!(
            req.is_request(),
            "unsolicited answer for command {} dropped",
            req.code
        );
        self.dispatch(&req).encode()
    }
}

/// "Unsupported command" terminal, registered application-wide.
pub struct FallbackHandler {
    ctx: Arc<HssContext>,
}

impl FallbackHandler {
    pub fn new(ctx: Arc<HssContext>) -> Self {
        Self { ctx }
    }
}

impl S6aHandler for FallbackHandler {
    fn handle(&self, req: &Message) -> Result<Message> {
        warn!("unexpected command {} received", req.code);
        let mut ans = Message::answer_to(req);
        ans.flags |= FLAG_ERROR;
        set_answer_code(&mut ans, AnswerCode::Base(dict::RC_COMMAND_UNSUPPORTED));
        finish_answer(&self.ctx, &mut ans);
        Ok(ans)
    }
}

/// Wires the three S6a callbacks the way `hss_fd_init` registers them:
/// fallback first, then AIR and ULR by command code.
pub fn build_dispatcher(ctx: &Arc<HssContext>) -> Dispatcher {
    let mut dispatcher = Dispatcher::new(Arc::new(FallbackHandler::new(ctx.clone())));
    dispatcher.register(
        dict::CMD_AUTHENTICATION_INFORMATION,
        Arc::new(AirHandler::new(ctx.clone())),
    );
    dispatcher.register(dict::CMD_UPDATE_LOCATION, Arc::new(UlrHandler::new(ctx.clone())));
    dispatcher
}
