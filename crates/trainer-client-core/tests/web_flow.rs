//! Runs the client's page flow in a browser against the in memory backend so
//! the `spawn_local` paths get exercised.
//! From the folder "crates/trainer-client-core" run one of the following
//! - `wasm-pack test --headless --firefox --features test_helpers`
//! - `wasm-pack test --headless --chrome --features test_helpers`
#![cfg(target_arch = "wasm32")]

use std::sync::Arc;
use trainer_client_core::{testing::FakeBackend, Client, PageFlow, QueryCache};
use trainer_time::Seconds;
use wasm_bindgen_test::wasm_bindgen_test;
use wasm_bindgen_test::wasm_bindgen_test_configure;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
async fn login_then_onboard() {
    let backend = Arc::new(FakeBackend::default());
    let client = Client::new(
        backend.clone(),
        QueryCache::default(),
        Seconds::from_minutes(5),
    );

    let session = client
        .login_password("coach@example.com".into(), "pw".to_string().into(), no_cb)
        .await
        .expect("failed to receive on rx")
        .unwrap();
    assert_eq!(session.user.email(), Some("coach@example.com"));

    client
        .create_organization("Squad".into(), vec![], no_cb)
        .await
        .expect("failed to receive on rx")
        .unwrap();
    assert_eq!(client.page_flow(), PageFlow::Routed);

    let target = client.logout(no_cb).await.expect("failed to receive on rx");
    assert_eq!(target, "/auth");
}

fn no_cb() {}
