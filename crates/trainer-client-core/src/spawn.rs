//! Runs background work on whatever executor the platform has
//!
//! NB: Natively a tokio runtime must already be entered on the calling thread

use std::future::Future;

#[cfg(not(target_arch = "wasm32"))]
pub trait BackgroundTask: Future<Output = ()> + Send + 'static {}
#[cfg(not(target_arch = "wasm32"))]
impl<T> BackgroundTask for T where T: Future<Output = ()> + Send + 'static {}

#[cfg(target_arch = "wasm32")]
pub trait BackgroundTask: Future<Output = ()> + 'static {}
#[cfg(target_arch = "wasm32")]
impl<T> BackgroundTask for T where T: Future<Output = ()> + 'static {}

#[cfg(not(target_arch = "wasm32"))]
pub fn spawn<F: BackgroundTask>(task: F) {
    tokio::spawn(task);
}

#[cfg(target_arch = "wasm32")]
pub fn spawn<F: BackgroundTask>(task: F) {
    wasm_bindgen_futures::spawn_local(task);
}
