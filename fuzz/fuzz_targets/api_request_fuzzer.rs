//! Fuzz target for the HTTP API surface
//!
//! # Strategy
//!
//! - Arbitrary method, path, query, body, and cookies against a gate with one
//!   locked conversation and one stored attachment
//!
//! # Invariants
//!
//! - Handling NEVER panics
//! - In-memory storage never produces a 500
//! - Content is never served before the right PIN has been sent

#![no_main]

use arbitrary::Arbitrary;
use chatlock_harness::{PIN, SimEnv, cheap_hasher, user};
use chatlock_server::{
    ApiRequest, ChatLockApi, MemoryMediaStore, Method, ResponseBody, ServerConfig,
    StaticDirectory, storage::MemoryStorage,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
struct Request {
    method: u8,
    target: String,
    body: Vec<u8>,
    cookie_header: String,
}

fuzz_target!(|requests: Vec<Request>| {
    let config = ServerConfig::new(vec![0x11; 32], [0x22; 32]).unwrap();
    let api = ChatLockApi::from_config(
        SimEnv::with_seed(0),
        MemoryStorage::new(),
        cheap_hasher().unwrap(),
        StaticDirectory::new(),
        MemoryMediaStore::new(),
        &config,
    );
    let (owner, peer) = (user("owner").unwrap(), user("peer").unwrap());
    api.gate().register_owner(&owner).unwrap();
    api.gate().set_pin(&owner, PIN).unwrap();
    api.gate().lock(&owner, &peer, PIN).unwrap();
    api.media().upload("m1", &peer, &owner, b"secret", "image/png").unwrap();

    let mut pin_sent = false;
    for request in requests.into_iter().take(16) {
        let method = match request.method % 4 {
            0 => Method::Get,
            1 => Method::Post,
            2 => Method::Put,
            _ => Method::Delete,
        };
        pin_sent |= String::from_utf8_lossy(&request.body).contains(PIN);
        let api_request = ApiRequest::new(method, &request.target)
            .with_body(request.body.clone())
            .with_cookie_header(&request.cookie_header);

        let response = api.handle(&owner, &api_request);
        assert_ne!(response.status, 500);

        if matches!(response.body, ResponseBody::Bytes { .. }) {
            assert!(pin_sent, "content served for {api_request:?}");
        }
    }
});
