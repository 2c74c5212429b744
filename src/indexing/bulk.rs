use serde_json::json;

use super::types::IndexDocument;

/// Serialize documents as alternating action and source lines, newline terminated.
pub fn bulk_body(index: &str, documents: &[IndexDocument]) -> String {
    let mut body = String::new();
    for document in documents {
        let action = json!({ "index": { "_index": index, "_id": document.id } });
        body.push_str(&action.to_string());
        body.push('\n');
        body.push_str(&document.source.to_string());
        body.push('\n');
    }
    body
}
