// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Hex for the log line when key logging is enabled, a placeholder
/// otherwise. Everything that could rebuild a key hierarchy goes through
/// this before reaching a sink.
pub fn hex_or_redacted(enabled: bool, bytes: &[u8]) -> String {
    if enabled {
        hex::encode(bytes)
    } else {
        "<redacted>".to_string()
    }
}
