// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Decides whether a timestamp is older than a named update policy
//! string against a last-updated timestamp.

use chrono::{DateTime, Local, Utc};

/// Symbolic TTL controlling staleness of cached items.
pub struct UpdatePolicyAnalyzer;

impl UpdatePolicyAnalyzer {
    /// `policy` is one of `"never"`, `"always"`, `""`, `"daily"`, or
    /// `"interval:N"` (N minutes); anything else is treated as `"daily"`.
    pub fn is_update_required(now: DateTime<Utc>, last_modified: DateTime<Utc>, policy: &str) -> bool {
        match classify(policy) {
            Policy::Never => false,
            Policy::Always => true,
            Policy::Daily => last_modified < local_midnight(now),
            Policy::Interval(minutes) => {
                let elapsed = now.signed_duration_since(last_modified);
                elapsed.num_milliseconds() >= minutes as i64 * 60_000
            }
        }
    }

    /// Returns the stricter (more-frequent-update) of two policies, used when
    /// merging mirror policies.
    pub fn effective_policy(a: &str, b: &str) -> String {
        let (pa, pb) = (classify(a), classify(b));
        match (pa, pb) {
            (Policy::Always, _) | (_, Policy::Always) => "always".to_owned(),
            (Policy::Interval(x), Policy::Interval(y)) => format!("interval:{}", x.min(y)),
            (Policy::Interval(x), _) | (_, Policy::Interval(x)) => format!("interval:{x}"),
            (Policy::Daily, Policy::Daily) => "daily".to_owned(),
            (Policy::Daily, Policy::Never) | (Policy::Never, Policy::Daily) => "daily".to_owned(),
            (Policy::Never, Policy::Never) => "never".to_owned(),
        }
    }
}

enum Policy {
    Never,
    Always,
    Daily,
    Interval(u64),
}

fn classify(policy: &str) -> Policy {
    if policy == "never" {
        Policy::Never
    } else if policy.is_empty() || policy == "always" {
        Policy::Always
    } else if policy == "daily" {
        Policy::Daily
    } else if let Some(minutes) = policy.strip_prefix("interval:").and_then(|n| n.parse().ok()) {
        Policy::Interval(minutes)
    } else {
        Policy::Daily
    }
}

fn local_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let local_now = now.with_timezone(&Local);
    let midnight_naive = local_now.date_naive().and_hms_opt(0, 0, 0).unwrap();
    midnight_naive
        .and_local_timezone(Local)
        .single()
        .unwrap_or(local_now)
        .with_timezone(&Utc)
}
