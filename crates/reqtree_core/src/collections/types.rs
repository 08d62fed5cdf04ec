//! Collection tree data types.
//!
//! This module contains the node types stored in a collection forest:
//! - `Collection` - A root collection or folder, generic over its request kind
//! - `RestRequest` / `GqlRequest` - The two request kinds a forest can hold
//! - `CollectionData` - The backend-opaque `{auth, headers, variables, _ref_id}` payload
//! - `CollectionPatch` - A partial collection used by the edit dispatchers

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::error::Result;

/// Generate a fresh correlation id for a collection node (`coll_<uuid>`).
pub fn generate_ref_id() -> String {
    format!("coll_{}", Uuid::new_v4().simple())
}

// ============================================================================
// Request kinds
// ============================================================================

/// Request-type tag sent alongside bulk imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReqType {
    /// REST requests.
    #[serde(rename = "REST")]
    Rest,
    /// GraphQL requests.
    #[serde(rename = "GQL")]
    Gql,
}

impl ReqType {
    /// The wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReqType::Rest => "REST",
            ReqType::Gql => "GQL",
        }
    }
}

impl fmt::Display for ReqType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request stored in a collection.
///
/// The payload is opaque to the tree and the sync engine apart from the name
/// and the backend id.
pub trait RequestNode:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Tag identifying this request kind to the backend.
    const REQ_TYPE: ReqType;

    /// Display name of the request.
    fn name(&self) -> &str;

    /// Server-assigned id, if the request has been created server-side.
    fn backend_id(&self) -> Option<&str>;

    /// Replace the server-assigned id.
    fn set_backend_id(&mut self, id: Option<String>);
}

/// A query parameter on a REST request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParam {
    /// Parameter name.
    pub key: String,
    /// Parameter value.
    pub value: String,
    /// Whether the parameter is sent.
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Body of a REST request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    /// MIME type of the body, `None` for no body.
    pub content_type: Option<String>,
    /// Raw body text.
    pub body: Option<String>,
}

/// A REST request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestRequest {
    /// Server-assigned id.
    #[serde(rename = "id", default, skip_serializing_if = "Option::is_none")]
    pub backend_id: Option<String>,
    /// Display name.
    pub name: String,
    /// HTTP method.
    pub method: String,
    /// Request URL, possibly containing variable placeholders.
    pub endpoint: String,
    /// Query parameters.
    #[serde(default)]
    pub params: Vec<QueryParam>,
    /// Request headers.
    #[serde(default)]
    pub headers: Vec<HeaderEntry>,
    /// Request body.
    #[serde(default)]
    pub body: RequestBody,
    /// Request auth.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Script run before the request is sent.
    #[serde(default)]
    pub pre_request_script: String,
    /// Script run against the response.
    #[serde(default)]
    pub test_script: String,
}

impl RestRequest {
    /// Create an unsynced request with empty params, headers and scripts.
    pub fn new(name: impl Into<String>, method: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            backend_id: None,
            name: name.into(),
            method: method.into(),
            endpoint: endpoint.into(),
            params: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::default(),
            auth: AuthConfig::default(),
            pre_request_script: String::new(),
            test_script: String::new(),
        }
    }
}

impl RequestNode for RestRequest {
    const REQ_TYPE: ReqType = ReqType::Rest;

    fn name(&self) -> &str {
        &self.name
    }

    fn backend_id(&self) -> Option<&str> {
        self.backend_id.as_deref()
    }

    fn set_backend_id(&mut self, id: Option<String>) {
        self.backend_id = id;
    }
}

/// A GraphQL request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GqlRequest {
    /// Server-assigned id.
    #[serde(rename = "id", default, skip_serializing_if = "Option::is_none")]
    pub backend_id: Option<String>,
    /// Display name.
    pub name: String,
    /// GraphQL endpoint.
    pub url: String,
    /// Query document.
    pub query: String,
    /// Query variables as a JSON string.
    #[serde(default)]
    pub variables: String,
    /// Request headers.
    #[serde(default)]
    pub headers: Vec<HeaderEntry>,
    /// Request auth.
    #[serde(default)]
    pub auth: AuthConfig,
}

impl GqlRequest {
    /// Create an unsynced request with no variables or headers.
    pub fn new(name: impl Into<String>, url: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            backend_id: None,
            name: name.into(),
            url: url.into(),
            query: query.into(),
            variables: String::new(),
            headers: Vec::new(),
            auth: AuthConfig::default(),
        }
    }
}

impl RequestNode for GqlRequest {
    const REQ_TYPE: ReqType = ReqType::Gql;

    fn name(&self) -> &str {
        &self.name
    }

    fn backend_id(&self) -> Option<&str> {
        self.backend_id.as_deref()
    }

    fn set_backend_id(&mut self, id: Option<String>) {
        self.backend_id = id;
    }
}

// ============================================================================
// Collection properties
// ============================================================================

fn default_true() -> bool {
    true
}

fn default_auth_type() -> String {
    "inherit".to_string()
}

/// Auth settings of a collection or request.
///
/// Only the type and the active flag are interpreted; type-specific fields
/// (tokens, key names, ...) are kept as-is in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// Auth scheme, `inherit` to use the parent's.
    #[serde(default = "default_auth_type")]
    pub auth_type: String,
    /// Whether auth is applied.
    #[serde(default = "default_true")]
    pub auth_active: bool,
    /// Scheme-specific fields.
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            auth_type: default_auth_type(),
            auth_active: true,
            extra: Map::new(),
        }
    }
}

/// A header defined on a collection or request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    /// Header name.
    pub key: String,
    /// Header value.
    pub value: String,
    /// Whether the header is sent.
    #[serde(default = "default_true")]
    pub active: bool,
    /// Free-form note.
    #[serde(default)]
    pub description: String,
}

/// A variable scoped to a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionVariable {
    /// Variable name.
    pub key: String,
    /// Value shared with the backend.
    #[serde(default)]
    pub initial_value: String,
    /// Local value.
    #[serde(default)]
    pub current_value: String,
    /// Whether the value is masked.
    #[serde(default)]
    pub secret: bool,
}

/// The backend-opaque part of a collection, sent as a JSON string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionData {
    /// Collection auth.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Collection headers.
    #[serde(default)]
    pub headers: Vec<HeaderEntry>,
    /// Collection variables.
    #[serde(default)]
    pub variables: Vec<CollectionVariable>,
    /// Correlation id.
    #[serde(rename = "_ref_id", default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
}

impl CollectionData {
    /// Default properties plus a freshly generated ref id.
    ///
    /// Used when the backend acknowledges a creation without echoing data.
    pub fn synthesized() -> Self {
        Self {
            ref_id: Some(generate_ref_id()),
            ..Self::default()
        }
    }

    /// Serialize to the JSON string the backend stores.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the JSON string returned by the backend.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ============================================================================
// Collection
// ============================================================================

/// A root collection or a folder.
///
/// Folders are collections nested in another collection's `folders`; the two
/// only differ by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection<R> {
    /// Display name.
    pub name: String,
    /// Auth applied to requests that inherit it.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Headers applied to every request below.
    #[serde(default)]
    pub headers: Vec<HeaderEntry>,
    /// Collection variables.
    #[serde(default)]
    pub variables: Vec<CollectionVariable>,
    /// Child folders, in display order.
    #[serde(default = "Vec::new")]
    pub folders: Vec<Collection<R>>,
    /// Requests, in display order.
    #[serde(default = "Vec::new")]
    pub requests: Vec<R>,
    /// Server-assigned id, absent until created server-side.
    #[serde(rename = "id", default, skip_serializing_if = "Option::is_none")]
    pub backend_id: Option<String>,
    /// Correlation id used to find this node before it has a backend id.
    #[serde(rename = "_ref_id", default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
}

impl<R> Collection<R> {
    /// Create an empty, unsynced collection with a fresh ref id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            auth: AuthConfig::default(),
            headers: Vec::new(),
            variables: Vec::new(),
            folders: Vec::new(),
            requests: Vec::new(),
            backend_id: None,
            ref_id: Some(generate_ref_id()),
        }
    }

    /// Builder-style: append a child folder.
    pub fn with_folder(mut self, folder: Collection<R>) -> Self {
        self.folders.push(folder);
        self
    }

    /// Builder-style: append a request.
    pub fn with_request(mut self, request: R) -> Self {
        self.requests.push(request);
        self
    }

    /// Builder-style: set the backend id.
    pub fn with_backend_id(mut self, id: impl Into<String>) -> Self {
        self.backend_id = Some(id.into());
        self
    }

    /// The properties sent to the backend for this node.
    pub fn data(&self) -> CollectionData {
        CollectionData {
            auth: self.auth.clone(),
            headers: self.headers.clone(),
            variables: self.variables.clone(),
            ref_id: self.ref_id.clone(),
        }
    }

    /// Overwrite local properties with authoritative ones.
    ///
    /// A missing ref id is replaced with a fresh one rather than cleared.
    pub fn apply_data(&mut self, data: CollectionData) {
        self.auth = data.auth;
        self.headers = data.headers;
        self.variables = data.variables;
        self.ref_id = Some(data.ref_id.unwrap_or_else(generate_ref_id));
    }

    /// Number of collections in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.folders.iter().map(Collection::subtree_len).sum::<usize>()
    }
}

/// A partial collection, merged field-by-field by the edit dispatchers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionPatch {
    /// New name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New auth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
    /// New headers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<HeaderEntry>>,
    /// New variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Vec<CollectionVariable>>,
    /// New ref id.
    #[serde(rename = "_ref_id", skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
}

impl CollectionPatch {
    /// A patch that only renames.
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Merge into `target`, leaving fields absent from the patch untouched.
    pub fn apply_to<R>(&self, target: &mut Collection<R>) {
        if let Some(name) = &self.name {
            target.name = name.clone();
        }
        if let Some(auth) = &self.auth {
            target.auth = auth.clone();
        }
        if let Some(headers) = &self.headers {
            target.headers = headers.clone();
        }
        if let Some(variables) = &self.variables {
            target.variables = variables.clone();
        }
        if let Some(ref_id) = &self.ref_id {
            target.ref_id = Some(ref_id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_id_format() {
        let id = generate_ref_id();
        assert!(id.starts_with("coll_"));
        assert_ne!(id, generate_ref_id());
    }

    #[test]
    fn test_collection_serializes_ids_with_wire_names() {
        let collection: Collection<RestRequest> = Collection::new("Users").with_backend_id("C1");
        let json = serde_json::to_value(&collection).unwrap();

        assert_eq!(json["id"], "C1");
        assert!(json["_ref_id"].as_str().unwrap().starts_with("coll_"));
        assert_eq!(json["auth"]["authType"], "inherit");
        assert_eq!(json["auth"]["authActive"], true);
    }

    #[test]
    fn test_collection_deserializes_with_missing_fields() {
        let collection: Collection<RestRequest> =
            serde_json::from_str(r#"{ "name": "Bare" }"#).unwrap();

        assert_eq!(collection.name, "Bare");
        assert!(collection.folders.is_empty());
        assert!(collection.backend_id.is_none());
        assert!(collection.ref_id.is_none());
        assert_eq!(collection.auth, AuthConfig::default());
    }

    #[test]
    fn test_auth_keeps_scheme_fields() {
        let auth: AuthConfig = serde_json::from_str(
            r#"{ "authType": "bearer", "authActive": true, "token": "abc" }"#,
        )
        .unwrap();

        assert_eq!(auth.auth_type, "bearer");
        assert_eq!(auth.extra.get("token").and_then(|v| v.as_str()), Some("abc"));

        let back = serde_json::to_value(&auth).unwrap();
        assert_eq!(back["token"], "abc");
    }

    #[test]
    fn test_apply_data_generates_missing_ref_id() {
        let mut collection: Collection<RestRequest> = Collection::new("A");
        collection.apply_data(CollectionData {
            headers: vec![HeaderEntry {
                key: "X-Team".to_string(),
                value: "core".to_string(),
                active: true,
                description: String::new(),
            }],
            ..CollectionData::default()
        });

        assert_eq!(collection.headers.len(), 1);
        assert!(collection.ref_id.as_deref().unwrap().starts_with("coll_"));
    }

    #[test]
    fn test_collection_data_json() {
        let data = CollectionData {
            ref_id: Some("coll_fixed".to_string()),
            ..CollectionData::default()
        };
        let json = data.to_json().unwrap();
        assert!(json.contains(r#""_ref_id":"coll_fixed""#));
        assert_eq!(CollectionData::from_json(&json).unwrap(), data);
    }

    #[test]
    fn test_patch_leaves_absent_fields() {
        let mut collection: Collection<GqlRequest> = Collection::new("Old");
        let ref_id = collection.ref_id.clone();
        CollectionPatch::rename("New").apply_to(&mut collection);

        assert_eq!(collection.name, "New");
        assert_eq!(collection.ref_id, ref_id);
    }

    #[test]
    fn test_request_backend_id_accessors() {
        let mut request = RestRequest::new("List users", "GET", "https://api.example.com/users");
        assert!(RequestNode::backend_id(&request).is_none());

        request.set_backend_id(Some("R9".to_string()));
        assert_eq!(RequestNode::backend_id(&request), Some("R9"));
        assert_eq!(serde_json::to_value(&request).unwrap()["id"], "R9");
    }

    #[test]
    fn test_subtree_len() {
        let tree: Collection<RestRequest> = Collection::new("root")
            .with_folder(Collection::new("a").with_folder(Collection::new("a1")))
            .with_folder(Collection::new("b"));
        assert_eq!(tree.subtree_len(), 4);
    }
}
