//! Shared UI icons.
//!
//! Each icon falls back to plain ASCII on terminals without emoji support.

use console::Emoji;

pub static SPEECH: Emoji<'_, '_> = Emoji("💬 ", "> ");
pub static EYES: Emoji<'_, '_> = Emoji("👀 ", "* ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR] ");
