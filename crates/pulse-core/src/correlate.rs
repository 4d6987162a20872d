//! Join of the two streams on context id

use crate::record::{InspectionRecord, LogRecord};
use serde::Serialize;
use std::collections::BTreeMap;

/// Everything written under one context id
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorrelatedContext {
    pub context_id: String,
    pub logs: Vec<LogRecord>,
    pub inspections: Vec<InspectionRecord>,
}

impl CorrelatedContext {
    /// Whether both streams contributed to this context.
    pub fn is_joined(&self) -> bool {
        !self.logs.is_empty() && !self.inspections.is_empty()
    }

    /// Inspection records whose stored values disagree.
    pub fn divergent_inspections(&self) -> impl Iterator<Item = &InspectionRecord> {
        self.inspections
            .iter()
            .filter(|r| r.matches() == Some(false) || r.kind.is_divergent())
    }
}

/// Group both streams by context id, keeping each stream's file order.
///
/// Ids seen only in the inspection stream get an entry with no logs.
pub fn correlate(logs: &[LogRecord], inspections: &[InspectionRecord]) -> BTreeMap<String, CorrelatedContext> {
    let mut contexts: BTreeMap<String, CorrelatedContext> = BTreeMap::new();
    for record in logs {
        entry(&mut contexts, &record.context_id).logs.push(record.clone());
    }
    for record in inspections {
        entry(&mut contexts, &record.context_id).inspections.push(record.clone());
    }
    contexts
}

fn entry<'a>(contexts: &'a mut BTreeMap<String, CorrelatedContext>, id: &str) -> &'a mut CorrelatedContext {
    contexts
        .entry(id.to_string())
        .or_insert_with(|| CorrelatedContext {
            context_id: id.to_string(),
            ..Default::default()
        })
}
