//! Sans-IO HTTP surface.
//!
//! [`ChatLockApi::handle`] takes an already-authenticated owner and a parsed
//! [`ApiRequest`] and returns an [`ApiResponse`]. The host web framework owns
//! sockets, TLS and authentication; this layer owns routing, body validation,
//! status mapping and grant cookies.
//!
//! # Routes
//!
//! ```text
//! GET  /chatlock/status/:peerId        { locked, cooldownRemaining }
//! GET  /chatlock/list                  { locked: [{ peerId, username?, fullName?, profilePic? }] }
//! POST /chatlock/lock   { peerId, pin }
//! POST /chatlock/unlock { peerId, pin }   clears chat_unlock_<peerId>
//! POST /chatlock/verify { peerId, pin }   sets chat_unlock_<peerId>
//! POST /chatlock/pin    { pin }           set or overwrite the PIN
//! PUT  /chatlock/pin    { oldPin, newPin }
//! GET  /chatlock/pin                      { hasPin }
//! GET  /messages/image/:messageId?peer=:peerId            ciphertext || tag
//! GET  /messages/image/:messageId/metadata?peer=:peerId   MediaMetadata
//! ```

use std::{collections::HashMap, time::Duration};

use chatlock_core::{AccessGate, Environment, GateError, PinHasher, Reference, Storage, UserId};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::{
    config::ServerConfig,
    cookie::{SetCookie, grant_cookie_name, parse_cookie_header},
    directory::{CachedDirectory, PeerDirectory, PeerProfile},
    error::ApiError,
    media::{MediaService, MediaStore},
};

/// Content type of attachment blobs
pub const OCTET_STREAM: &str = "application/octet-stream";

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl Method {
    /// Parse a method name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// A request as handed over by the host framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// Method
    pub method: Method,
    /// Path without the query string
    pub path: String,
    /// Query parameters, values taken verbatim
    pub query: HashMap<String, String>,
    /// Raw body (JSON for the chatlock routes)
    pub body: Vec<u8>,
    /// Request cookies
    pub cookies: HashMap<String, String>,
}

impl ApiRequest {
    /// Request for `target` (`path` or `path?query`) with an empty body.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        let query = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        Self {
            method,
            path: path.to_string(),
            query,
            body: Vec::new(),
            cookies: HashMap::new(),
        }
    }

    /// GET `target`.
    pub fn get(target: &str) -> Self {
        Self::new(Method::Get, target)
    }

    /// POST `target` with a JSON body.
    pub fn post(target: &str, body: &Value) -> Self {
        Self::new(Method::Post, target).with_json(body)
    }

    /// PUT `target` with a JSON body.
    pub fn put(target: &str, body: &Value) -> Self {
        Self::new(Method::Put, target).with_json(body)
    }

    /// Replace the body with serialized JSON.
    #[must_use]
    pub fn with_json(mut self, body: &Value) -> Self {
        self.body = body.to_string().into_bytes();
        self
    }

    /// Replace the body with raw bytes.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Add one cookie.
    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Add every cookie of a `Cookie` header.
    #[must_use]
    pub fn with_cookie_header(mut self, header: &str) -> Self {
        self.cookies.extend(parse_cookie_header(header));
        self
    }
}

/// Response payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// JSON document
    Json(Value),
    /// Binary payload
    Bytes {
        /// `Content-Type` header
        content_type: String,
        /// Payload
        data: Vec<u8>,
    },
}

/// A response for the host framework to write out.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status
    pub status: u16,
    /// Payload
    pub body: ResponseBody,
    /// `Set-Cookie` headers to emit
    pub set_cookies: Vec<SetCookie>,
}

impl ApiResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body: ResponseBody::Json(body), set_cookies: Vec::new() }
    }

    fn with_cookie(mut self, cookie: SetCookie) -> Self {
        self.set_cookies.push(cookie);
        self
    }

    fn from_error(err: &ApiError) -> Self {
        let mut body = json!({ "code": err.code(), "message": err.public_message() });
        if let (Some(remaining), Value::Object(map)) = (err.cooldown_remaining(), &mut body) {
            map.insert("cooldownRemaining".to_string(), json!(millis(remaining)));
        }
        Self { status: err.status(), body: ResponseBody::Json(body), set_cookies: Vec::new() }
    }

    /// JSON payload, if this is a JSON response.
    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Bytes { .. } => None,
        }
    }

    /// Error code of an error response.
    pub fn error_code(&self) -> Option<&str> {
        self.json()?.get("code")?.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route<'a> {
    Status(&'a str),
    List,
    Lock,
    Unlock,
    Verify,
    SetPin,
    ChangePin,
    HasPin,
    Image(&'a str),
    ImageMetadata(&'a str),
}

fn route(method: Method, path: &str) -> Option<Route<'_>> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    match (method, segments.as_slice()) {
        (Method::Get, ["chatlock", "status", peer]) => Some(Route::Status(*peer)),
        (Method::Get, ["chatlock", "list"]) => Some(Route::List),
        (Method::Post, ["chatlock", "lock"]) => Some(Route::Lock),
        (Method::Post, ["chatlock", "unlock"]) => Some(Route::Unlock),
        (Method::Post, ["chatlock", "verify"]) => Some(Route::Verify),
        (Method::Post, ["chatlock", "pin"]) => Some(Route::SetPin),
        (Method::Put, ["chatlock", "pin"]) => Some(Route::ChangePin),
        (Method::Get, ["chatlock", "pin"]) => Some(Route::HasPin),
        (Method::Get, ["messages", "image", id]) => Some(Route::Image(*id)),
        (Method::Get, ["messages", "image", id, "metadata"]) => Some(Route::ImageMetadata(*id)),
        _ => None,
    }
}

/// A PIN as sent by clients: a JSON string, or a bare number.
#[derive(Deserialize)]
#[serde(untagged)]
enum PinInput {
    Text(String),
    Number(u64),
}

impl PinInput {
    fn into_pin(self) -> Result<String, ApiError> {
        let pin = match self {
            Self::Text(text) => text.trim().to_string(),
            Self::Number(number) => number.to_string(),
        };
        if pin.is_empty() {
            return Err(ApiError::BadRequest("pin is required".to_string()));
        }
        Ok(pin)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PeerPinBody {
    peer_id: Reference<PeerProfile>,
    pin: PinInput,
}

#[derive(Deserialize)]
struct SetPinBody {
    pin: PinInput,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePinBody {
    old_pin: PinInput,
    new_pin: PinInput,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LockedChat {
    peer_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile_pic: Option<String>,
}

/// The Chat-Lock HTTP API.
#[derive(Debug, Clone)]
pub struct ChatLockApi<E, S, H, D, M> {
    gate: AccessGate<E, S, H>,
    media: MediaService<E, S, H, M>,
    directory: D,
}

impl<E, S, H, D, M> ChatLockApi<E, S, H, CachedDirectory<D, E>, M>
where
    E: Environment,
    S: Storage,
    H: PinHasher,
    D: PeerDirectory,
    M: MediaStore,
{
    /// Wire up the API from configuration, fronting `directory` with a cache.
    pub fn from_config(
        env: E,
        storage: S,
        hasher: H,
        directory: D,
        media_store: M,
        config: &ServerConfig,
    ) -> Self {
        let directory = CachedDirectory::new(
            directory,
            env.clone(),
            config.directory_cache_capacity,
            config.directory_cache_ttl,
        );
        let gate = AccessGate::new(env, storage, hasher, config.grant_secret.clone(), config.gate);
        let media = MediaService::new(gate.clone(), media_store, config.media_master_key);
        Self::new(gate, media, directory)
    }
}

impl<E, S, H, D, M> ChatLockApi<E, S, H, D, M>
where
    E: Environment,
    S: Storage,
    H: PinHasher,
    D: PeerDirectory,
    M: MediaStore,
{
    /// API over an existing gate and media service.
    pub fn new(gate: AccessGate<E, S, H>, media: MediaService<E, S, H, M>, directory: D) -> Self {
        Self { gate, media, directory }
    }

    /// The access gate.
    pub fn gate(&self) -> &AccessGate<E, S, H> {
        &self.gate
    }

    /// The media service.
    pub fn media(&self) -> &MediaService<E, S, H, M> {
        &self.media
    }

    /// Handle one request on behalf of `owner`.
    ///
    /// Never panics; every failure becomes an error response.
    pub fn handle(&self, owner: &UserId, request: &ApiRequest) -> ApiResponse {
        let result = match route(request.method, &request.path) {
            Some(route) => self.dispatch(owner, route, request),
            None => Err(ApiError::RouteNotFound),
        };

        let response = result.unwrap_or_else(|err| {
            if err.is_internal() {
                tracing::error!(
                    owner = %owner,
                    method = ?request.method,
                    path = %request.path,
                    error = %err,
                    "Request failed"
                );
            }
            ApiResponse::from_error(&err)
        });

        tracing::debug!(
            owner = %owner,
            method = ?request.method,
            path = %request.path,
            status = response.status,
            "Handled request"
        );
        response
    }

    fn dispatch(
        &self,
        owner: &UserId,
        route: Route<'_>,
        request: &ApiRequest,
    ) -> Result<ApiResponse, ApiError> {
        match route {
            Route::Status(peer) => {
                let status = self.gate.status(owner, &peer_id(peer)?)?;
                Ok(ApiResponse::ok(json!({
                    "locked": status.locked,
                    "cooldownRemaining": millis(status.cooldown_remaining),
                })))
            },
            Route::List => self.list(owner),
            Route::Lock => {
                let (peer, pin) = peer_and_pin(request)?;
                self.gate.lock(owner, &peer, &pin)?;
                Ok(success())
            },
            Route::Unlock => {
                let (peer, pin) = peer_and_pin(request)?;
                self.gate.unlock(owner, &peer, &pin).map_err(|err| match err {
                    GateError::InvalidPin => ApiError::Unauthorized,
                    other => ApiError::Gate(other),
                })?;
                Ok(success().with_cookie(SetCookie::clear_grant(&peer)))
            },
            Route::Verify => {
                let (peer, pin) = peer_and_pin(request)?;
                let issued = self.gate.verify_pin(owner, &peer, &pin)?;
                let body = json!({
                    "success": true,
                    "expiresAt": issued.grant.expires_at().as_millis(),
                });
                let cookie = SetCookie::grant(&peer, issued.token, self.gate.config().grant_ttl);
                Ok(ApiResponse::ok(body).with_cookie(cookie))
            },
            Route::SetPin => {
                let body: SetPinBody = parse_body(request)?;
                self.gate.set_pin(owner, &body.pin.into_pin()?)?;
                Ok(success())
            },
            Route::ChangePin => {
                let body: ChangePinBody = parse_body(request)?;
                self.gate.change_pin(owner, &body.old_pin.into_pin()?, &body.new_pin.into_pin()?)?;
                Ok(success())
            },
            Route::HasPin => Ok(ApiResponse::ok(json!({ "hasPin": self.gate.has_pin(owner)? }))),
            Route::Image(message_id) => {
                let peer = query_peer(request)?;
                let token = grant_token(request, &peer);
                let object = self.media.read(owner, &peer, message_id, token)?;
                Ok(ApiResponse {
                    status: 200,
                    body: ResponseBody::Bytes {
                        content_type: OCTET_STREAM.to_string(),
                        data: object.combined(),
                    },
                    set_cookies: Vec::new(),
                })
            },
            Route::ImageMetadata(message_id) => {
                let peer = query_peer(request)?;
                let token = grant_token(request, &peer);
                let metadata = self.media.metadata(owner, &peer, message_id, token)?;
                Ok(ApiResponse::ok(to_json(&metadata)?))
            },
        }
    }

    fn list(&self, owner: &UserId) -> Result<ApiResponse, ApiError> {
        let mut locked = Vec::new();
        for peer in self.gate.list_locked(owner)? {
            // Profile metadata is decoration; the lock list itself must not fail
            let profile = self.directory.profile(&peer).unwrap_or_else(|err| {
                tracing::warn!(owner = %owner, peer = %peer, error = %err, "Peer profile lookup failed");
                None
            });
            let profile = profile.unwrap_or_else(|| PeerProfile::bare(peer.clone()));

            locked.push(LockedChat {
                peer_id: peer,
                username: profile.username,
                full_name: profile.full_name,
                profile_pic: profile.profile_pic,
            });
        }

        Ok(ApiResponse::ok(json!({ "locked": to_json(&locked)? })))
    }
}

fn success() -> ApiResponse {
    ApiResponse::ok(json!({ "success": true }))
}

fn parse_body<T: DeserializeOwned>(request: &ApiRequest) -> Result<T, ApiError> {
    // Position only: serde messages can echo field values, including PINs
    serde_json::from_slice(&request.body).map_err(|e| {
        ApiError::BadRequest(format!(
            "malformed request body (line {}, column {})",
            e.line(),
            e.column()
        ))
    })
}

fn peer_and_pin(request: &ApiRequest) -> Result<(UserId, String), ApiError> {
    let body: PeerPinBody = parse_body(request)?;
    Ok((body.peer_id.into_id(), body.pin.into_pin()?))
}

fn peer_id(raw: &str) -> Result<UserId, ApiError> {
    UserId::new(raw).map_err(ApiError::Gate)
}

fn query_peer(request: &ApiRequest) -> Result<UserId, ApiError> {
    let raw = request
        .query
        .get("peer")
        .ok_or_else(|| ApiError::BadRequest("peer is required".to_string()))?;
    peer_id(raw)
}

fn grant_token<'r>(request: &'r ApiRequest, peer: &UserId) -> Option<&'r str> {
    request.cookies.get(&grant_cookie_name(peer)).map(String::as_str)
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Gate(GateError::Internal(e.to_string())))
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
