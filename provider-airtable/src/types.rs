//! Airtable API response types

use remote_traits::FieldMap;
use serde::Deserialize;

/// Response from the list-records endpoint
#[derive(Debug, Deserialize)]
pub struct ListRecordsResponse {
    /// Records in this page
    pub records: Vec<ApiRecord>,

    /// Pagination offset, present when more pages remain
    pub offset: Option<String>,
}

/// One record as serialized by the Airtable API
#[derive(Debug, Deserialize)]
pub struct ApiRecord {
    /// Record identifier ("rec...")
    pub id: String,

    /// Field bag; empty fields are omitted by the API
    #[serde(default)]
    pub fields: FieldMap,

    /// Creation timestamp in RFC 3339
    #[serde(rename = "createdTime")]
    pub created_time: Option<String>,
}

/// Response from the base metadata tables endpoint
#[derive(Debug, Deserialize)]
pub struct TablesResponse {
    pub tables: Vec<ApiTable>,
}

/// Table descriptor from the metadata API
#[derive(Debug, Deserialize)]
pub struct ApiTable {
    /// Table identifier ("tbl...")
    pub id: String,

    /// Table display name
    pub name: String,

    /// Field descriptors
    pub fields: Vec<ApiField>,
}

/// Field descriptor from the metadata API
#[derive(Debug, Deserialize)]
pub struct ApiField {
    /// Field identifier ("fld...")
    pub id: String,

    /// Field display name (the key used in record field bags)
    pub name: String,

    /// Airtable field type tag
    #[serde(rename = "type")]
    pub field_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_list_response() {
        let json = r#"{
            "records": [
                {
                    "id": "recXYZ",
                    "fields": {"Name": "Widget", "Qty": 3},
                    "createdTime": "2024-05-01T12:00:00.000Z"
                },
                {
                    "id": "recEmpty"
                }
            ],
            "offset": "itrNext/recXYZ"
        }"#;

        let parsed: ListRecordsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].id, "recXYZ");
        assert_eq!(
            parsed.records[0].fields.get("Qty"),
            Some(&serde_json::json!(3))
        );
        assert!(parsed.records[1].fields.is_empty());
        assert_eq!(parsed.offset.as_deref(), Some("itrNext/recXYZ"));
    }

    #[test]
    fn test_deserialize_tables_response() {
        let json = r#"{
            "tables": [
                {
                    "id": "tblOrders",
                    "name": "Orders",
                    "fields": [
                        {"id": "fldA", "name": "Name", "type": "singleLineText"},
                        {"id": "fldB", "name": "Qty", "type": "number"}
                    ]
                }
            ]
        }"#;

        let parsed: TablesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.tables[0].fields[1].field_type, "number");
    }
}
