use crate::config::MetricField;
use crate::fingerprint::fingerprint;
use crate::model::SourceRecord;
use crate::state::PersistentState;

#[derive(Debug, Clone)]
pub struct ChangedRecord {
    pub record: SourceRecord,
    pub fingerprint: String
}

#[derive(Debug, Default)]
pub struct ChangeSet {
    pub changed: Vec<ChangedRecord>,
    pub unchanged: Vec<SourceRecord>
}

/// Split managed records by whether their fingerprint matches the stored one.
///
/// Records without an external key are not sync-managed and appear in neither
/// partition. Source order is preserved within each partition.
pub fn select_changes(
    records: &[SourceRecord],
    state: &PersistentState,
    metric_fields: &[MetricField]
) -> ChangeSet {
    let mut set = ChangeSet::default();

    for record in records.iter().filter(|r| r.is_managed()) {
        let fingerprint = fingerprint(record, metric_fields);
        if state.fingerprint_matches(&record.external_key, &fingerprint) {
            set.unchanged.push(record.clone());
        } else {
            set.changed.push(ChangedRecord {
                record: record.clone(),
                fingerprint
            });
        }
    }

    set
}
