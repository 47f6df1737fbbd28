use std::time::Instant;

#[cfg(feature = "profiling")]
use std::collections::BTreeSet;
#[cfg(feature = "profiling")]
use std::sync::{OnceLock, RwLock};

#[cfg(feature = "profiling")]
use crate::telemetry::tags;

/// Converts elapsed time since `started_at` to microseconds, clamped to `u64::MAX`.
#[inline]
pub fn elapsed_us(started_at: Instant) -> u64 {
    started_at.elapsed().as_micros().min(u64::MAX as u128) as u64
}

#[cfg(feature = "profiling")]
const PROFILE_TAGS_ENV: &str = "PBGZF_PROFILE_TAGS";

// None means every tag is enabled.
#[cfg(feature = "profiling")]
type TagFilter = Option<BTreeSet<String>>;

#[cfg(feature = "profiling")]
fn parse_tags<'a>(tokens: impl Iterator<Item = &'a str>) -> TagFilter {
    let mut enabled = BTreeSet::new();
    for token in tokens.map(str::trim).filter(|token| !token.is_empty()) {
        let normalized = token.to_ascii_lowercase();
        if normalized == "*" || normalized == "all" {
            return None;
        }
        enabled.insert(normalized);
    }
    if enabled.is_empty() {
        None
    } else {
        Some(enabled)
    }
}

#[cfg(feature = "profiling")]
fn filter_state() -> &'static RwLock<TagFilter> {
    static STATE: OnceLock<RwLock<TagFilter>> = OnceLock::new();
    STATE.get_or_init(|| {
        let filter = std::env::var(PROFILE_TAGS_ENV)
            .ok()
            .and_then(|raw| parse_tags(raw.split(',')));
        RwLock::new(filter)
    })
}

#[cfg(feature = "profiling")]
fn store_filter(filter: TagFilter) {
    let mut guard = match filter_state().write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    *guard = filter;
}

/// Enables all profiling tags.
#[cfg(feature = "profiling")]
pub fn enable_all_tags() {
    store_filter(None);
}

#[cfg(not(feature = "profiling"))]
pub fn enable_all_tags() {}

/// Sets the enabled profiling tags. An empty slice enables all tags.
#[cfg(feature = "profiling")]
pub fn set_enabled_tags(tags: &[&str]) {
    store_filter(parse_tags(tags.iter().copied()));
}

#[cfg(not(feature = "profiling"))]
pub fn set_enabled_tags(_tags: &[&str]) {}

/// Returns true when at least one tag in the stack is enabled.
#[cfg(feature = "profiling")]
pub fn is_tag_stack_enabled(tag_stack: &[&str]) -> bool {
    let guard = match filter_state().read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    match guard.as_ref() {
        None => true,
        Some(enabled) => tag_stack
            .iter()
            .any(|tag| enabled.contains(&tag.to_ascii_lowercase())),
    }
}

#[cfg(not(feature = "profiling"))]
pub fn is_tag_stack_enabled(_tag_stack: &[&str]) -> bool {
    false
}

#[cfg(feature = "profiling")]
#[inline]
pub fn event(
    target: &'static str,
    tag_stack: &[&str],
    op: &'static str,
    result: &'static str,
    elapsed_us: u64,
    message: &'static str,
) {
    if !is_tag_stack_enabled(tag_stack) {
        return;
    }

    // tracing targets must be literals
    match target {
        tags::PROFILE_POOL => {
            tracing::debug!(target: "pbgzf.profile.pool", op, result, elapsed_us, tags = ?tag_stack, "{message}");
        }
        tags::PROFILE_QUEUE => {
            tracing::debug!(target: "pbgzf.profile.queue", op, result, elapsed_us, tags = ?tag_stack, "{message}");
        }
        tags::PROFILE_READER => {
            tracing::debug!(target: "pbgzf.profile.reader", op, result, elapsed_us, tags = ?tag_stack, "{message}");
        }
        tags::PROFILE_WORKER => {
            tracing::debug!(target: "pbgzf.profile.worker", op, result, elapsed_us, tags = ?tag_stack, "{message}");
        }
        tags::PROFILE_WRITER => {
            tracing::debug!(target: "pbgzf.profile.writer", op, result, elapsed_us, tags = ?tag_stack, "{message}");
        }
        tags::PROFILE_CODEC => {
            tracing::debug!(target: "pbgzf.profile.codec", op, result, elapsed_us, tags = ?tag_stack, "{message}");
        }
        tags::PROFILE_PIPELINE => {
            tracing::debug!(target: "pbgzf.profile.pipeline", op, result, elapsed_us, tags = ?tag_stack, "{message}");
        }
        _ => {
            tracing::debug!(target: "pbgzf.profile", op, result, elapsed_us, original_target = target, tags = ?tag_stack, "{message}");
        }
    }
}

#[cfg(not(feature = "profiling"))]
#[inline]
pub fn event(
    _target: &'static str,
    _tag_stack: &[&str],
    _op: &'static str,
    _result: &'static str,
    _elapsed_us: u64,
    _message: &'static str,
) {
}
