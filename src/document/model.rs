use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered string-keyed mapping used for document and table metadata.
pub type Metadata = Map<String, Value>;

/// The canonical form every extractor produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(default)]
    pub formulas: Vec<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    Markdown,
    Rst,
}

/// Table cells, either positional rows or header-keyed records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableData {
    Rows(Vec<Vec<String>>),
    Records(Vec<Metadata>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<TableFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<TableData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<(usize, usize)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtypes: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

impl Table {
    pub fn new(index: usize) -> Self {
        Self {
            id: table_id(index),
            ..Default::default()
        }
    }

    /// A table of positional cell rows.
    pub fn from_rows(index: usize, rows: Vec<Vec<String>>, columns: usize) -> Self {
        Self {
            shape: Some((rows.len(), columns)),
            data: Some(TableData::Rows(rows)),
            ..Self::new(index)
        }
    }
}

/// Zero-padded sequential table id: `table_000`, `table_001`, ...
pub fn table_id(index: usize) -> String {
    format!("table_{:03}", index)
}

/// An image reference located on a page or slide.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_id_padding() {
        assert_eq!(table_id(0), "table_000");
        assert_eq!(table_id(42), "table_042");
        assert_eq!(table_id(1234), "table_1234");
    }

    #[test]
    fn test_document_defaults_when_fields_missing() {
        let doc: Document = serde_json::from_value(json!({ "text": "hello" })).unwrap();
        assert_eq!(doc.text, "hello");
        assert!(doc.tables.is_empty());
        assert!(doc.images.is_empty());
        assert!(doc.formulas.is_empty());
        assert!(doc.metadata.is_empty());
    }

    #[test]
    fn test_document_serializes_empty_collections() {
        let value = serde_json::to_value(Document::default()).unwrap();
        assert_eq!(value["tables"], json!([]));
        assert_eq!(value["images"], json!([]));
        assert_eq!(value["formulas"], json!([]));
        assert_eq!(value["metadata"], json!({}));
    }

    #[test]
    fn test_table_data_shapes() {
        let table = Table::from_rows(1, vec![vec!["a".into(), "b".into()]], 2);
        let value = serde_json::to_value(&table).unwrap();
        assert_eq!(value["id"], "table_001");
        assert_eq!(value["data"], json!([["a", "b"]]));
        assert_eq!(value["shape"], json!([1, 2]));
        assert!(value.get("sheet_name").is_none());

        let parsed: Table = serde_json::from_value(json!({
            "id": "table_000",
            "data": [{ "name": "x", "qty": 3 }],
        }))
        .unwrap();
        assert!(matches!(parsed.data, Some(TableData::Records(ref r)) if r.len() == 1));
    }
}
