use super::model::{CellValue, Metric, RawTable, StreamerDataset, StreamerRecord, TextField};

/// Convert a raw cell to a metric value.
///
/// Total: numbers pass through, strings are trimmed and parsed, booleans map
/// to 1/0, and anything that does not yield a finite number becomes `0.0`.
/// Missing data must not leak into sums and ranges as NaN.
pub fn coerce_numeric(value: &CellValue) -> f64 {
    let v = match value {
        CellValue::Integer(i) => *i as f64,
        CellValue::Float(f) => *f,
        CellValue::Bool(b) => f64::from(u8::from(*b)),
        CellValue::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        CellValue::Null => 0.0,
    };
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Build one typed record from a raw row. Null extra cells are not stored, so
/// a field set to null and a missing field produce the same record.
pub fn coerce_record(row: &std::collections::BTreeMap<String, CellValue>) -> StreamerRecord {
    let mut record = StreamerRecord::default();
    for (column, value) in row {
        if let Some(field) = TextField::from_column(column) {
            record.set_text(field, value.as_text());
        } else if let Some(metric) = Metric::from_column(column) {
            record.set_metric(metric, coerce_numeric(value));
        } else if !value.is_null() {
            record.extra.insert(column.clone(), value.clone());
        }
    }
    record
}

/// Turn a raw table into the typed dataset the filter and view layers use.
pub fn coerce(table: RawTable) -> StreamerDataset {
    let records = table.rows.iter().map(coerce_record).collect();
    StreamerDataset::new(records, table.columns)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn unparseable_values_become_zero() {
        assert_eq!(coerce_numeric(&CellValue::String("n/a".into())), 0.0);
        assert_eq!(coerce_numeric(&CellValue::String("".into())), 0.0);
        assert_eq!(coerce_numeric(&CellValue::Null), 0.0);
        assert_eq!(coerce_numeric(&CellValue::Float(f64::NAN)), 0.0);
        assert_eq!(coerce_numeric(&CellValue::String("inf".into())), 0.0);
    }

    #[test]
    fn numeric_text_is_parsed() {
        assert_eq!(coerce_numeric(&CellValue::String(" 1200 ".into())), 1200.0);
        assert_eq!(coerce_numeric(&CellValue::String("3.5".into())), 3.5);
        assert_eq!(coerce_numeric(&CellValue::Integer(-4)), -4.0);
        assert_eq!(coerce_numeric(&CellValue::Bool(true)), 1.0);
    }

    #[test]
    fn record_splits_typed_and_extra_columns() {
        let mut row = BTreeMap::new();
        row.insert("username".to_string(), CellValue::String("a".into()));
        row.insert("is_live".to_string(), CellValue::String("Yes".into()));
        row.insert("current_viewers".to_string(), CellValue::String("42".into()));
        row.insert("twitter_verified".to_string(), CellValue::Bool(false));
        row.insert("language".to_string(), CellValue::Null);

        let rec = coerce_record(&row);
        assert_eq!(rec.username.as_deref(), Some("a"));
        assert_eq!(rec.is_live.as_deref(), Some("Yes"));
        assert_eq!(rec.language, None);
        assert_eq!(rec.metric(Metric::CurrentViewers), 42.0);
        assert_eq!(rec.metric(Metric::Views), 0.0);
        assert_eq!(rec.extra.get("twitter_verified"), Some(&CellValue::Bool(false)));
    }

    #[test]
    fn coerce_keeps_columns_and_order() {
        let table = RawTable::from_ordered_rows(vec![
            vec![("views".into(), CellValue::String("bad".into()))],
            vec![("views".into(), CellValue::Integer(7))],
        ]);
        let ds = coerce(table);
        assert_eq!(ds.columns, vec!["views"]);
        let views: Vec<f64> = ds.records.iter().map(|r| r.metric(Metric::Views)).collect();
        assert_eq!(views, vec![0.0, 7.0]);
    }
}
