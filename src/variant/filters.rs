//! Support filters: features a variant's provisioning agent rejects even
//! though the target schema can express them.

use anyhow::Context;
use butane_api::{
    error::SupportError,
    path::{Path, PathPattern, JSON},
    translation::is_zero,
    Report, TranslationSet,
};
use log::trace;
use serde::Serialize;
use serde_json::Value;

use crate::error::TranslateError;

/// Rejects target nodes matching `pattern` for which `check` holds.
pub(crate) struct Filter {
    pub pattern: &'static str,
    pub error: SupportError,
    pub check: fn(&Value) -> bool,
}

impl Filter {
    /// Rejects any non-empty value at `pattern`.
    pub const fn present(pattern: &'static str, error: SupportError) -> Self {
        Self {
            pattern,
            error,
            check: is_present,
        }
    }
}

fn is_present(value: &Value) -> bool {
    !is_zero(value)
}

/// Checks `target` against `filters` and reports matches at the source
/// positions `ts` attributes them to. A match is not descended into.
pub(crate) fn apply<T: Serialize>(
    filters: &[Filter],
    target: &T,
    ts: &TranslationSet,
) -> Result<Report, TranslateError> {
    let value = serde_json::to_value(target).context("Failed to serialize config for filtering")?;
    let compiled: Vec<(PathPattern, &Filter)> = filters
        .iter()
        .map(|f| (PathPattern::new(f.pattern), f))
        .collect();
    let mut r = Report::new();
    walk(&value, &Path::root(JSON), &compiled, &mut r);
    Ok(ts.translate_report(r))
}

fn walk(value: &Value, at: &Path, filters: &[(PathPattern, &Filter)], r: &mut Report) {
    if let Some((pattern, filter)) = filters
        .iter()
        .find(|(pattern, filter)| pattern.matches(at) && (filter.check)(value))
    {
        trace!("Filter {pattern} rejects {at}");
        r.add_error(at.clone(), filter.error.clone());
        return;
    }
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                walk(child, &at.append(key), filters, r);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                walk(child, &at.append(i), filters, r);
            }
        }
        _ => {}
    }
}
