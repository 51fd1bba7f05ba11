use crate::config::MetricField;
use crate::model::SourceRecord;
use utils::compute_fingerprint;

/// Content signature of the sync-relevant fields of one record.
///
/// Field order: title, parent key, assignee, due date, status, then every
/// configured metric column in configuration order. Absent values hash as
/// the empty string. Row position is deliberately excluded.
pub fn fingerprint(record: &SourceRecord, metric_fields: &[MetricField]) -> String {
    let fixed = [
        record.title.as_str(),
        record.parent_key.as_deref().unwrap_or(""),
        record.assignee.as_deref().unwrap_or(""),
        record.due_date.as_deref().unwrap_or(""),
        record.status.as_deref().unwrap_or("")
    ];
    let metrics = metric_fields.iter().map(|field| {
        record
            .metrics
            .get(&field.column)
            .map(String::as_str)
            .unwrap_or("")
    });

    compute_fingerprint(fixed.into_iter().chain(metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricFormat;
    use crate::model::HierarchyLevel;

    fn metric(column: &str) -> MetricField {
        MetricField {
            column: column.to_string(),
            remote_field: format!("customfield_{column}"),
            placeholder: "TBD".to_string(),
            format: MetricFormat::Text
        }
    }

    fn epic() -> SourceRecord {
        let mut record = SourceRecord::new("E-1", HierarchyLevel::Top, "Launch site");
        record.assignee = Some("ana@example.com".to_string());
        record.due_date = Some("01/02/2025".to_string());
        record.status = Some("In Progress".to_string());
        record
            .metrics
            .insert("Impact".to_string(), "High".to_string());
        record
    }

    #[test]
    fn test_ignores_row_position() {
        let metrics = [metric("Impact")];
        let a = epic();
        let mut b = epic();
        b.row_number = 42;
        assert_eq!(fingerprint(&a, &metrics), fingerprint(&b, &metrics));
    }

    #[test]
    fn test_sensitive_to_each_field() {
        let metrics = [metric("Impact")];
        let base = fingerprint(&epic(), &metrics);

        let mutations: Vec<Box<dyn Fn(&mut SourceRecord)>> = vec![
            Box::new(|r| r.title.push('!')),
            Box::new(|r| r.parent_key = Some("X".to_string())),
            Box::new(|r| r.assignee = None),
            Box::new(|r| r.due_date = Some("02/02/2025".to_string())),
            Box::new(|r| r.status = Some("Done".to_string())),
            Box::new(|r| {
                r.metrics.insert("Impact".to_string(), "Low".to_string());
            }),
        ];

        for mutate in mutations {
            let mut record = epic();
            mutate(&mut record);
            assert_ne!(fingerprint(&record, &metrics), base);
        }
    }

    #[test]
    fn test_unconfigured_metric_ignored() {
        let mut record = epic();
        let base = fingerprint(&record, &[metric("Impact")]);
        record
            .metrics
            .insert("Notes".to_string(), "anything".to_string());
        assert_eq!(fingerprint(&record, &[metric("Impact")]), base);
    }

    #[test]
    fn test_moving_value_between_fields_changes_fingerprint() {
        let mut a = SourceRecord::new("S-1", HierarchyLevel::Mid, "Task");
        a.assignee = Some("x".to_string());
        let mut b = SourceRecord::new("S-1", HierarchyLevel::Mid, "Task");
        b.due_date = Some("x".to_string());
        assert_ne!(fingerprint(&a, &[]), fingerprint(&b, &[]));
    }
}
