// SPDX-License-Identifier: GPL-3.0-only

//! Capture filename policy
//!
//! Names are `{stem}_{YYYYMMDD-HHMMSS}_{seq}.{ext}` where the stem is the
//! caller's sample identifier when provided, or the media category noun.
//! The process-wide sequence counter makes names from rapid repeated
//! captures within the same second distinct, so destination collisions on
//! the removable volume are a policy invariant rather than a runtime
//! check.

use crate::storage::MediaCategory;
use chrono::Local;
use std::sync::atomic::{AtomicU32, Ordering};

static CAPTURE_SEQ: AtomicU32 = AtomicU32::new(0);

/// Unique filename for a new capture
pub fn capture_filename(
    category: MediaCategory,
    sample_id: Option<&str>,
    extension: &str,
) -> String {
    let stem = sample_id
        .map(sanitize_sample_id)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| category.singular().to_string());
    let timestamp = Local::now().format("%Y%m%d-%H%M%S");
    let seq = CAPTURE_SEQ.fetch_add(1, Ordering::Relaxed) % 10_000;

    format!("{}_{}_{:04}.{}", stem, timestamp, seq, extension)
}

/// Restrict sample identifiers to filesystem-safe characters
fn sanitize_sample_id(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}
