use super::models::{
    ArrayValue, CommitRequest, CommitResponse, Document, DocumentMask, FieldTransform, MapValue,
    Precondition, Value, ValueType, Write, WriteResult,
};
use super::snapshot::DocumentSnapshot;
use super::FirestoreError;
use crate::core::parse_error_response;
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use serde::de::Error;
use serde::ser::Error as SerError;
use serde::Serialize;
use serde_json::map::Map;
use serde_json::Value as SerdeValue;
use std::collections::HashMap;

// Helper to convert Firestore's value map to a standard serde_json::Value
pub(crate) fn convert_fields_to_serde_value(
    fields: &HashMap<String, Value>,
) -> Result<SerdeValue, FirestoreError> {
    let mut map = Map::new();
    for (key, value) in fields {
        map.insert(key.clone(), convert_value_to_serde_value(value)?);
    }
    Ok(SerdeValue::Object(map))
}

pub(crate) fn convert_value_to_serde_value(value: &Value) -> Result<SerdeValue, FirestoreError> {
    use serde_json::json;
    Ok(match &value.value_type {
        ValueType::StringValue(s) => SerdeValue::String(s.clone()),
        ValueType::IntegerValue(s) => {
            let i: i64 = s.parse().map_err(|e| {
                <serde_json::Error as Error>::custom(format!(
                    "Failed to parse integer string '{}': {}",
                    s, e
                ))
            })?;
            SerdeValue::Number(i.into())
        }
        // JSON has no NaN or infinities; keep them readable instead of failing.
        ValueType::DoubleValue(d) => match serde_json::Number::from_f64(*d) {
            Some(n) => SerdeValue::Number(n),
            None => SerdeValue::String(d.to_string()),
        },
        ValueType::BooleanValue(b) => SerdeValue::Bool(*b),
        ValueType::MapValue(map_value) => convert_fields_to_serde_value(&map_value.fields)?,
        ValueType::ArrayValue(array_value) => {
            let values = array_value
                .values
                .iter()
                .map(convert_value_to_serde_value)
                .collect::<Result<Vec<_>, _>>()?;
            SerdeValue::Array(values)
        }
        ValueType::NullValue(_) => SerdeValue::Null,
        ValueType::TimestampValue(s) => SerdeValue::String(s.clone()),
        ValueType::GeoPointValue(gp) => {
            json!({ "latitude": gp.latitude, "longitude": gp.longitude })
        }
        ValueType::BytesValue(s) => SerdeValue::String(s.clone()),
        ValueType::ReferenceValue(s) => SerdeValue::String(s.clone()),
    })
}

// Helper to convert a serializable Rust struct to Firestore's value map
pub(crate) fn convert_serializable_to_fields<T: Serialize>(
    value: &T,
) -> Result<HashMap<String, Value>, FirestoreError> {
    let serde_value = serde_json::to_value(value)?;
    if let SerdeValue::Object(map) = serde_value {
        let mut fields = HashMap::new();
        for (k, v) in map {
            fields.insert(k, convert_serde_value_to_firestore_value(v)?);
        }
        Ok(fields)
    } else {
        Err(FirestoreError::SerializationError(SerError::custom(
            "Can only write objects as document fields",
        )))
    }
}

pub(crate) fn convert_serde_value_to_firestore_value(
    value: SerdeValue,
) -> Result<Value, FirestoreError> {
    let value_type = match value {
        SerdeValue::Null => ValueType::NullValue(()),
        SerdeValue::Bool(b) => ValueType::BooleanValue(b),
        SerdeValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                ValueType::IntegerValue(i.to_string())
            } else if let Some(f) = n.as_f64() {
                ValueType::DoubleValue(f)
            } else {
                return Err(FirestoreError::SerializationError(SerError::custom(format!(
                    "Unsupported number type: {}",
                    n
                ))));
            }
        }
        SerdeValue::String(s) => ValueType::StringValue(s),
        SerdeValue::Array(a) => {
            let values = a
                .into_iter()
                .map(convert_serde_value_to_firestore_value)
                .collect::<Result<Vec<_>, _>>()?;
            ValueType::ArrayValue(ArrayValue { values })
        }
        SerdeValue::Object(o) => {
            let mut fields = HashMap::new();
            for (k, v) in o {
                fields.insert(k, convert_serde_value_to_firestore_value(v)?);
            }
            ValueType::MapValue(MapValue { fields })
        }
    };
    Ok(Value { value_type })
}

/// A reference to a single document.
#[derive(Clone, Debug)]
pub struct DocumentReference<'a> {
    pub(crate) client: &'a ClientWithMiddleware,
    /// Full REST URL of the document.
    pub(crate) path: String,
    /// Resource name, `projects/{p}/databases/{d}/documents/{path}`.
    pub(crate) name: String,
    /// `.../documents:commit` endpoint of the owning database.
    pub(crate) commit_url: String,
}

impl<'a> DocumentReference<'a> {
    /// The document ID, i.e. the last path segment.
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }

    /// The full resource name of the document.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads the document. A missing document yields a snapshot whose `exists()` is `false`.
    pub async fn get(&self) -> Result<DocumentSnapshot, FirestoreError> {
        let response = self.client.get(&self.path).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(DocumentSnapshot::missing(self.id()));
        }

        if !response.status().is_success() {
            let failure = parse_error_response(response, "Get document failed").await;
            return Err(FirestoreError::ApiError(failure.to_string()));
        }

        let doc: Document = response.json().await?;
        Ok(DocumentSnapshot::found(self.id(), doc))
    }

    /// Updates the given fields of the document in a single atomic commit.
    ///
    /// Only the fields present in `value` are written; every path in
    /// `server_timestamps` is set to the commit time by the server. The write
    /// is rejected with [`FirestoreError::PreconditionFailed`] when
    /// `precondition` does not hold.
    pub async fn update<T: Serialize>(
        &self,
        value: &T,
        server_timestamps: &[&str],
        precondition: Precondition,
    ) -> Result<WriteResult, FirestoreError> {
        let fields = convert_serializable_to_fields(value)?;

        let mut field_paths: Vec<String> = fields.keys().cloned().collect();
        field_paths.sort();

        let transforms: Vec<FieldTransform> = server_timestamps
            .iter()
            .map(|path| FieldTransform::server_timestamp(*path))
            .collect();

        let write = Write {
            update: Document {
                name: self.name.clone(),
                fields,
                create_time: None,
                update_time: None,
            },
            update_mask: Some(DocumentMask { field_paths }),
            update_transforms: if transforms.is_empty() {
                None
            } else {
                Some(transforms)
            },
            current_document: Some(precondition),
        };

        let request = CommitRequest {
            writes: vec![write],
            transaction: None,
        };

        let response = self
            .client
            .post(&self.commit_url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        if !response.status().is_success() {
            let failure = parse_error_response(response, "Update document failed").await;
            if failure.is_precondition_failure() {
                return Err(FirestoreError::PreconditionFailed(failure.to_string()));
            }
            return Err(FirestoreError::ApiError(failure.to_string()));
        }

        let mut result: CommitResponse = response.json().await?;
        Ok(result.write_results.pop().unwrap_or_default())
    }
}

/// A reference to a collection of documents.
#[derive(Clone, Debug)]
pub struct CollectionReference<'a> {
    pub(crate) client: &'a ClientWithMiddleware,
    pub(crate) base_url: String,
    pub(crate) database: String,
    pub(crate) collection_path: String,
}

impl<'a> CollectionReference<'a> {
    pub fn doc(&self, document_id: &str) -> DocumentReference<'a> {
        let relative = format!("{}/{}", self.collection_path, document_id);
        DocumentReference {
            client: self.client,
            path: format!("{}/{}", self.base_url, relative),
            name: format!("{}/documents/{}", self.database, relative),
            commit_url: format!("{}:commit", self.base_url),
        }
    }
}
