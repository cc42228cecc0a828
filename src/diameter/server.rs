// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Length-framed TCP shell feeding the dispatcher.
//!
//! This is deliberately thin: one task per accepted connection, reading the
//! 20-byte Diameter header, then the rest of the message, then writing the
//! answer back. Peer negotiation is not done here; anything the dispatcher
//! does not know gets the fallback answer.

use std::sync::Arc;

use anyhow::{Context, Result, bail, ensure};
use bytes::BytesMut;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    select,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{diameter::dispatcher::Dispatcher, models::message};

/// Upper bound on one inbound message; S6a traffic stays far below this.
const MAX_MESSAGE_LEN: usize = 1 << 20;

pub struct DiameterServer {
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
}

impl DiameterServer {
    pub fn new(dispatcher: Arc<Dispatcher>, cancel: CancellationToken) -> Self {
        Self { dispatcher, cancel }
    }

    pub async fn serve(&self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("cannot bind diameter listener on {addr}"))?;
        self.serve_listener(listener).await
    }

    pub async fn serve_listener(&self, listener: TcpListener) -> Result<()> {
        info!("diameter shell listening on {}", listener.local_addr()?);

        loop {
            select! {
                _ = self.cancel.cancelled() => {
                    info!("diameter shell shutting down");
                    return Ok(());
                },
                accepted = listener.accept() => {
                    let (stream, peer) = accepted.context("accept failed")?;
                    debug!("accepted diameter connection from {peer}");
                    stream.set_nodelay(true)?;

                    let dispatcher = self.dispatcher.clone();
                    let cancel = self.cancel.clone();
                    tokio::spawn(async move {
                        if let Err(e) = connection_loop(stream, dispatcher, cancel).await {
                            warn!("connection from {peer} closed: {e}");
                        }
                    });
                },
            }
        }
    }
}

async fn connection_loop(
    mut stream: TcpStream,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut scratch = BytesMut::with_capacity(4096);

    loop {
        scratch.clear();
        scratch.resize(message::HEADER_LEN, 0);

        select! {
            _ = cancel.cancelled() => bail!("cancelled"),
            read = stream.read_exact(&mut scratch[..message::HEADER_LEN]) => {
                match read {
                    Ok(_) => {},
                    // Clean close between messages.
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                        return Ok(());
                    },
                    Err(e) => return Err(e.into()),
                }
            },
        }

        let total = message::RawHeader::parse(&scratch[..message::HEADER_LEN])?
            .message_length();
        ensure!(
            (message::HEADER_LEN..=MAX_MESSAGE_LEN).contains(&total),
            "framed message length {total} out of bounds"
        );

        if total > message::HEADER_LEN {
            let old = scratch.len();
            scratch.resize(total, 0);
            select! {
                _ = cancel.cancelled() => bail!("cancelled"),
                read = stream.read_exact(&mut scratch[old..total]) => { read?; },
            }
        }

        let answer = dispatcher.dispatch_bytes(&scratch[..total])?;
        stream.write_all(&answer).await?;
    }
}
