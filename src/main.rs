// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::{Context, Result};
use hss_s6a_rs::{
    cfg::{cli::resolve_config_path, config::Config, logger::init_logger},
    context::HssContext,
    diameter::{dispatcher::build_dispatcher, server::DiameterServer},
    store::DocumentStore,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let arg = std::env::args().nth(1).unwrap_or_else(|| "config/hss.yaml".to_string());
    let config_path = resolve_config_path(&arg)?;
    let config_str = config_path
        .to_str()
        .context("config path is not valid UTF-8")?
        .to_string();

    let _logger_guard = init_logger(&config_str)?;

    let cfg = Config::load_from_file(&config_path)
        .with_context(|| format!("failed to load config {config_path:?}"))?;

    let store = DocumentStore::open(&cfg.db_uri)
        .with_context(|| format!("failed to open subscriber store at {}", cfg.db_uri))?;

    let ctx = HssContext::new(&cfg, store)?;
    info!(
        "HSS starting as {} ({}), {} static peer(s)",
        ctx.origin_host(),
        ctx.origin_realm(),
        ctx.peers().len()
    );

    let dispatcher = Arc::new(build_dispatcher(&ctx));
    let cancel = CancellationToken::new();
    let server = DiameterServer::new(dispatcher, cancel.clone());
    let addr = ctx.listen_addr();

    tokio::select! {
        res = server.serve(&addr) => res,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            cancel.cancel();
            Ok(())
        },
    }
}
