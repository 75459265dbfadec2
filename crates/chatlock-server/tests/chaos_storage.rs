//! Chaos tests: the API over failing storage.
//!
//! Wrapping storage in `ChaoticStorage` injects I/O failures at random. The
//! API must answer every request (500 for injected failures, never a panic),
//! leak no internal detail, and never reveal locked content.

use chatlock_core::{AccessGate, GateConfig, MemoryStorage, Storage};
use chatlock_harness::{PIN, SimEnv, WRONG_PIN, cheap_hasher, user};
use chatlock_server::{
    ApiRequest, ChatLockApi, MediaService, MemoryMediaStore, StaticDirectory,
    storage::ChaoticStorage,
};
use proptest::prelude::*;
use serde_json::json;

const SECRET: &[u8] = b"chaos-grant-secret-0123456789abc";

fn requests(peer: &str) -> Vec<ApiRequest> {
    vec![
        ApiRequest::post("/chatlock/lock", &json!({ "peerId": peer, "pin": PIN })),
        ApiRequest::post("/chatlock/verify", &json!({ "peerId": peer, "pin": WRONG_PIN })),
        ApiRequest::post("/chatlock/verify", &json!({ "peerId": peer, "pin": PIN })),
        ApiRequest::post("/chatlock/unlock", &json!({ "peerId": peer, "pin": PIN })),
        ApiRequest::get(&format!("/chatlock/status/{peer}")),
        ApiRequest::get("/chatlock/list"),
        ApiRequest::get(&format!("/messages/image/m1?peer={peer}")),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_failing_storage_never_breaks_the_api(
        failure_rate in 0.0..0.9,
        seed in any::<u64>(),
        script in prop::collection::vec(0usize..7, 1..40),
    ) {
        let env = SimEnv::with_seed(seed);
        let owner = user("alice").unwrap();
        let peer = user("bob").unwrap();

        // Set up on reliable storage, then route everything through chaos
        let inner = MemoryStorage::new();
        let setup = AccessGate::new(env.clone(), inner.clone(), cheap_hasher().unwrap(), SECRET, GateConfig::default());
        setup.register_owner(&owner).unwrap();
        setup.set_pin(&owner, PIN).unwrap();

        let storage = ChaoticStorage::with_seed(inner.clone(), failure_rate, seed);
        let gate = AccessGate::new(env.clone(), storage, cheap_hasher().unwrap(), SECRET, GateConfig::default());
        let media = MediaService::new(gate.clone(), MemoryMediaStore::new(), [7; 32]);
        media.upload("m1", &peer, &owner, b"guarded", "image/png").unwrap();
        let api = ChatLockApi::new(gate, media, StaticDirectory::new());

        let catalogue = requests(peer.as_str());
        for index in script {
            let response = api.handle(&owner, &catalogue[index]);

            prop_assert!(
                matches!(response.status, 200 | 400 | 401 | 423 | 429 | 500),
                "unexpected status {}", response.status
            );
            if response.status == 500 {
                prop_assert_eq!(response.error_code(), Some("INTERNAL"));
                prop_assert!(!response.json().unwrap().to_string().contains("chaotic"));
            }

            // Content is never served while the durable state says locked
            if index == 6 && response.status == 200 {
                let record = inner.load_owner(&owner).unwrap().unwrap();
                prop_assert!(!record.entry(&peer).is_some_and(|e| e.is_locked()));
            }
        }
    }
}
