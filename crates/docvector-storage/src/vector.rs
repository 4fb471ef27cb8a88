//! Vector index adapter (spec §4.7), grounded in `src/db/mod.rs`'s
//! `ensure_collection` and `src/search/mod.rs`'s `SearchPointsBuilder` /
//! `ScoredPoint` usage, extended with upsert/delete/get/count and a small
//! filter DSL translated onto `qdrant_client::qdrant::{Filter, Condition,
//! Range}`.

use std::collections::BTreeMap;

use docvector_common::error::{DocVectorError, Result};
use qdrant_client::qdrant::{
    point_id::PointIdOptions, r#match::MatchValue, value::Kind as ValueKind, Condition,
    CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, GetPointsBuilder, PointId,
    PointStruct, Range, ScoredPoint, ScrollPointsBuilder, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::Value as JsonValue;
use uuid::Uuid;

pub type Payload = BTreeMap<String, JsonValue>;

/// A single equality/`$in`/range condition on a payload field. Built by
/// [`FilterSpec::parse`] from the JSON filter object callers pass in.
#[derive(Debug, Clone)]
enum FieldFilter {
    Eq(JsonValue),
    In(Vec<JsonValue>),
    Gt(f64),
    Gte(f64),
    Lt(f64),
    Lte(f64),
}

/// The filter language from spec §4.7: equality, `$in`, and `{$gt, $gte,
/// $lt, $lte}` range operators, keyed by payload field name.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec(BTreeMap<String, FieldFilter>);

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.0.insert(field.into(), FieldFilter::Eq(value.into()));
        self
    }

    pub fn is_in(mut self, field: impl Into<String>, values: Vec<JsonValue>) -> Self {
        self.0.insert(field.into(), FieldFilter::In(values));
        self
    }

    pub fn range(
        mut self,
        field: impl Into<String>,
        gt: Option<f64>,
        gte: Option<f64>,
        lt: Option<f64>,
        lte: Option<f64>,
    ) -> Self {
        let field = field.into();
        if let Some(v) = gt {
            self.0.insert(field.clone(), FieldFilter::Gt(v));
        }
        if let Some(v) = gte {
            self.0.insert(field.clone(), FieldFilter::Gte(v));
        }
        if let Some(v) = lt {
            self.0.insert(field.clone(), FieldFilter::Lt(v));
        }
        if let Some(v) = lte {
            self.0.insert(field, FieldFilter::Lte(v));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn into_qdrant(self) -> Option<Filter> {
        if self.0.is_empty() {
            return None;
        }
        let mut must = Vec::new();
        for (field, condition) in self.0 {
            match condition {
                FieldFilter::Eq(value) => must.push(Condition::matches(&field, json_to_match(&value))),
                FieldFilter::In(values) => {
                    let keywords: Vec<String> = values
                        .iter()
                        .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                        .collect();
                    must.push(Condition::matches(&field, keywords));
                }
                FieldFilter::Gt(v) => must.push(Condition::range(&field, Range { gt: Some(v), ..Default::default() })),
                FieldFilter::Gte(v) => must.push(Condition::range(&field, Range { gte: Some(v), ..Default::default() })),
                FieldFilter::Lt(v) => must.push(Condition::range(&field, Range { lt: Some(v), ..Default::default() })),
                FieldFilter::Lte(v) => must.push(Condition::range(&field, Range { lte: Some(v), ..Default::default() })),
            }
        }
        Some(Filter::must(must))
    }
}

fn json_to_match(value: &JsonValue) -> MatchValue {
    match value {
        JsonValue::String(s) => MatchValue::Keyword(s.clone()),
        JsonValue::Bool(b) => MatchValue::Boolean(*b),
        JsonValue::Number(n) if n.is_i64() => MatchValue::Integer(n.as_i64().unwrap()),
        other => MatchValue::Keyword(other.to_string()),
    }
}

/// One hit from [`VectorIndex::search`]: opaque point id, similarity
/// score, and the hydrated payload map.
#[derive(Debug, Clone)]
pub struct ScoredPayload {
    pub id: Uuid,
    pub score: f32,
    pub payload: Payload,
}

fn point_id_to_uuid(id: &PointId) -> Option<Uuid> {
    match &id.point_id_options {
        Some(PointIdOptions::Uuid(s)) => Uuid::parse_str(s).ok(),
        Some(PointIdOptions::Num(n)) => Some(Uuid::from_u128(*n as u128)),
        None => None,
    }
}

fn qdrant_value_to_json(value: &QdrantValue) -> JsonValue {
    match &value.kind {
        Some(ValueKind::StringValue(s)) => JsonValue::String(s.clone()),
        Some(ValueKind::IntegerValue(i)) => JsonValue::from(*i),
        Some(ValueKind::DoubleValue(d)) => serde_json::Number::from_f64(*d).map(JsonValue::Number).unwrap_or(JsonValue::Null),
        Some(ValueKind::BoolValue(b)) => JsonValue::Bool(*b),
        Some(ValueKind::ListValue(list)) => {
            JsonValue::Array(list.values.iter().map(qdrant_value_to_json).collect())
        }
        _ => JsonValue::Null,
    }
}

fn payload_from_qdrant(map: std::collections::HashMap<String, QdrantValue>) -> Payload {
    map.into_iter().map(|(k, v)| (k, qdrant_value_to_json(&v))).collect()
}

fn payload_to_qdrant(payload: &Payload) -> std::collections::HashMap<String, QdrantValue> {
    payload.iter().map(|(k, v)| (k.clone(), json_to_qdrant_value(v))).collect()
}

fn json_to_qdrant_value(value: &JsonValue) -> QdrantValue {
    let kind = match value {
        JsonValue::String(s) => ValueKind::StringValue(s.clone()),
        JsonValue::Bool(b) => ValueKind::BoolValue(*b),
        JsonValue::Number(n) if n.is_i64() => ValueKind::IntegerValue(n.as_i64().unwrap()),
        JsonValue::Number(n) => ValueKind::DoubleValue(n.as_f64().unwrap_or_default()),
        JsonValue::Array(items) => ValueKind::ListValue(qdrant_client::qdrant::ListValue {
            values: items.iter().map(json_to_qdrant_value).collect(),
        }),
        JsonValue::Null | JsonValue::Object(_) => ValueKind::StringValue(value.to_string()),
    };
    QdrantValue { kind: Some(kind) }
}

/// Thin wrapper over `qdrant_client::Qdrant` implementing spec §4.7's
/// collection lifecycle and filtered CRUD.
pub struct VectorIndex {
    client: Qdrant,
}

impl VectorIndex {
    pub fn connect(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| DocVectorError::Database(format!("qdrant connect failed: {e}")))?;
        Ok(Self { client })
    }

    /// Idempotent: an existing collection of the same name is left as-is.
    pub async fn create_collection(&self, name: &str, dim: u64) -> Result<()> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))?;

        let exists = collections.collections.iter().any(|c| c.name == name);
        if exists {
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dim, Distance::Cosine)),
            )
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))?;
        Ok(())
    }

    /// `ids.len() == vectors.len() == payloads.len()`; an empty input is a
    /// no-op (spec §4.7).
    pub async fn upsert(
        &self,
        collection: &str,
        ids: &[Uuid],
        vectors: &[Vec<f32>],
        payloads: &[Payload],
    ) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        if ids.len() != vectors.len() || ids.len() != payloads.len() {
            return Err(DocVectorError::Validation(
                "upsert: ids, vectors, and payloads must have equal length".into(),
            ));
        }

        let points: Vec<PointStruct> = ids
            .iter()
            .zip(vectors.iter())
            .zip(payloads.iter())
            .map(|((id, vector), payload)| {
                PointStruct::new(id.to_string(), vector.clone(), payload_to_qdrant(payload))
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points))
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn search(
        &self,
        collection: &str,
        query_vector: Vec<f32>,
        limit: u64,
        filter: FilterSpec,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPayload>> {
        let mut builder = SearchPointsBuilder::new(collection, query_vector, limit).with_payload(true);
        if let Some(filter) = filter.into_qdrant() {
            builder = builder.filter(filter);
        }
        if let Some(threshold) = score_threshold {
            builder = builder.score_threshold(threshold);
        }

        let result = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))?;

        Ok(result.result.into_iter().filter_map(scored_point_to_payload).collect())
    }

    pub async fn delete_by_ids(&self, collection: &str, ids: &[Uuid]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let points: Vec<PointId> = ids.iter().map(|id| PointId::from(id.to_string())).collect();
        self.client
            .delete_points(DeletePointsBuilder::new(collection).points(points))
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))?;
        Ok(())
    }

    /// Used by the reconciliation sweep (spec §7) to delete orphan vectors
    /// left by a document that failed after the vector upsert but before
    /// the relational write recorded its embedding ids.
    pub async fn delete_by_filter(&self, collection: &str, filter: FilterSpec) -> Result<()> {
        let Some(filter) = filter.into_qdrant() else {
            return Ok(());
        };
        self.client
            .delete_points(DeletePointsBuilder::new(collection).points(filter))
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn get(&self, collection: &str, ids: &[Uuid]) -> Result<Vec<ScoredPayload>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let points: Vec<PointId> = ids.iter().map(|id| PointId::from(id.to_string())).collect();
        let result = self
            .client
            .get_points(GetPointsBuilder::new(collection, points).with_payload(true))
            .await
            .map_err(|e| DocVectorError::Database(e.to_string()))?;

        Ok(result
            .result
            .into_iter()
            .filter_map(|point| {
                let id = point.id.as_ref().and_then(point_id_to_uuid)?;
                Some(ScoredPayload { id, score: 1.0, payload: payload_from_qdrant(point.payload) })
            })
            .collect())
    }

    /// Scrolls every point in `collection` and collects the distinct
    /// `document_id` payload values seen — the input the orphan-vector
    /// reconciliation sweep (spec §7) diffs against the relational store's
    /// known document ids.
    pub async fn distinct_document_ids(&self, collection: &str) -> Result<std::collections::HashSet<Uuid>> {
        let mut seen = std::collections::HashSet::new();
        let mut offset: Option<PointId> = None;
        loop {
            let mut builder = ScrollPointsBuilder::new(collection).limit(1000).with_payload(true);
            if let Some(offset) = offset.take() {
                builder = builder.offset(offset);
            }
            let page = self
                .client
                .scroll(builder)
                .await
                .map_err(|e| DocVectorError::Database(e.to_string()))?;

            for point in &page.result {
                if let Some(value) = point.payload.get("document_id") {
                    if let Some(JsonValue::String(s)) = Some(qdrant_value_to_json(value)) {
                        if let Ok(id) = Uuid::parse_str(&s) {
                            seen.insert(id);
                        }
                    }
                }
            }

            match page.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }
        Ok(seen)
    }

    /// Approximate count via a scroll pass; Qdrant's `count` endpoint
    /// doesn't accept the builder filter type used elsewhere here, so this
    /// paginates with a generous batch size instead.
    pub async fn count(&self, collection: &str, filter: FilterSpec) -> Result<u64> {
        let mut total = 0u64;
        let mut offset: Option<PointId> = None;
        loop {
            let mut builder = ScrollPointsBuilder::new(collection).limit(1000).with_payload(false);
            if let Some(filter) = filter.clone().into_qdrant() {
                builder = builder.filter(filter);
            }
            if let Some(offset) = offset.take() {
                builder = builder.offset(offset);
            }
            let page = self
                .client
                .scroll(builder)
                .await
                .map_err(|e| DocVectorError::Database(e.to_string()))?;

            total += page.result.len() as u64;
            match page.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }
        Ok(total)
    }

    /// No explicit teardown is needed for the gRPC client; kept so callers
    /// have a symmetric lifecycle with the spec's `close()` operation.
    pub async fn close(&self) -> Result<()> {
        Ok(())
    }
}

fn scored_point_to_payload(point: ScoredPoint) -> Option<ScoredPayload> {
    let id = point.id.as_ref().and_then(point_id_to_uuid)?;
    Some(ScoredPayload { id, score: point.score, payload: payload_from_qdrant(point.payload) })
}
