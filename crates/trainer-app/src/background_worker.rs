//! Natively the client's background work runs on a tokio runtime driven from
//! its own thread so the UI thread is never blocked

#[cfg(not(target_arch = "wasm32"))]
pub fn create_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("trainer-worker")
        .build()
}

#[cfg(not(target_arch = "wasm32"))]
pub fn start_background_worker(rt: tokio::runtime::Runtime) {
    // Execute the runtime in its own thread.
    std::thread::spawn(move || {
        tracing::info!("Background worker started");
        rt.block_on(std::future::pending::<()>())
    });
}
