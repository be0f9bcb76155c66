// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wires the engine's debug channels (spec §6, §7: `reason`, `run`,
//! `script`, `scan`) onto `tracing` targets, following `SPEC_FULL.md`'s
//! ambient-logging section.

use odb_engine::{DebugChannel, EngineOptions};
use tracing_subscriber::EnvFilter;

const ALL_CHANNELS: [DebugChannel; 4] =
    [DebugChannel::Reason, DebugChannel::Run, DebugChannel::Script, DebugChannel::Scan];

/// Installs a `tracing-subscriber` `fmt` layer whose filter reflects
/// `--silent` and `--debug <channels>`, then layers `RUST_LOG` on top so an
/// operator can always widen it further.
pub fn init(options: &EngineOptions) {
    let base = if options.silent { "odb=error" } else { "odb=info" };
    let mut filter = EnvFilter::new(base);

    for channel in ALL_CHANNELS {
        if options.channel_enabled(channel) {
            let directive = format!("{}=debug", channel.tracing_target());
            if let Ok(directive) = directive.parse() {
                filter = filter.add_directive(directive);
            }
        }
    }

    if let Ok(env) = std::env::var("RUST_LOG") {
        for part in env.split(',') {
            if let Ok(directive) = part.parse() {
                filter = filter.add_directive(directive);
            }
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
