//! Operator stats report.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::error::DatabaseError;
use crate::funnel::messages::RESTRICTED_MESSAGE;
use crate::store::{LeadField, LeadStore};

/// Build the stats text for `caller_id`.
///
/// Anyone but the operator gets the restricted notice without touching the
/// store.
pub async fn report(
    store: &dyn LeadStore,
    caller_id: &str,
    operator_id: &str,
) -> Result<String, DatabaseError> {
    if caller_id != operator_id {
        tracing::info!(caller_id, "Stats requested by non-operator");
        return Ok(RESTRICTED_MESSAGE.to_string());
    }

    let total = store.count_all().await?;
    let mut out = format!("Leads: {total}");
    for (title, field) in [
        ("By stage", LeadField::Stage),
        ("By source", LeadField::Source),
        ("By strategy", LeadField::Strategy),
    ] {
        push_section(&mut out, title, &store.count_by(field).await?);
    }
    Ok(out)
}

fn push_section(out: &mut String, title: &str, counts: &BTreeMap<String, u64>) {
    if counts.is_empty() {
        return;
    }
    let _ = write!(out, "\n\n{title}:");
    for (label, count) in counts {
        let _ = write!(out, "\n{label}: {count}");
    }
}
