//! Log setup for the native build. The web build hands `log` records to the
//! browser console instead (see `main`).

#[cfg(not(target_arch = "wasm32"))]
const APP_NAME: &str = "trainer_app";

/// Default directives, `RUST_LOG` takes precedence when set
#[cfg(not(target_arch = "wasm32"))]
const DEFAULT_FILTER: &str = "zbus=warn,hyper_util=warn,reqwest=warn,info";

#[cfg(not(target_arch = "wasm32"))]
pub fn init(cli: &super::cli::Cli) -> anyhow::Result<()> {
    use anyhow::Context as _;

    if !cli.is_to_std_out {
        match init_to_file() {
            Ok(filename) => {
                println!("Tracing started to file {filename:?}");
                return Ok(());
            }
            // Fall through to stdout
            Err(e) => eprintln!("Failed to start logging to file: {e:#}"),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER)),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to start tracing to stdout")
}

#[cfg(not(target_arch = "wasm32"))]
fn init_to_file() -> anyhow::Result<std::path::PathBuf> {
    use trainer_shared::telemetry;

    let (file, filename) = telemetry::create_trace_file(APP_NAME)?;
    let subscriber = telemetry::get_subscriber(APP_NAME.into(), DEFAULT_FILTER, file);
    telemetry::init_subscriber(subscriber)?;
    Ok(filename)
}
