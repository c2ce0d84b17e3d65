
use crate::types::NewRecord;
use chrono::NaiveDate;

pub(super) fn new_record(source: &str, external_id: &str, date: &str) -> NewRecord {
    NewRecord {
        source: source.to_string(),
        external_id: external_id.to_string(),
        title: None,
        publish_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        origin_url: format!("https://example.test/{}/{}", source, external_id),
    }
}
