#![warn(clippy::all, rust_2018_idioms)]
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

// When compiling natively:
#[cfg(not(target_arch = "wasm32"))]
fn main() -> eframe::Result<()> {
    use clap::Parser;
    use trainer_app::{mobile_guard::MobileGuard, navigation::Location};
    use trainer_client_core::Client;

    let args = trainer_app::cli::Cli::parse();

    if let Err(e) = trainer_app::tracing::init(&args) {
        eprintln!("Failed to start tracing: {e}");
    }

    let config = match trainer_shared::config::get_configuration(&args.config_dir) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(?e, "unable to start without configuration");
            eprintln!("Unable to start: {e}");
            std::process::exit(1);
        }
    };

    let rt = match trainer_app::background_worker::create_runtime() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Unable to start the async runtime: {e}");
            std::process::exit(1);
        }
    };
    let _enter = rt.enter(); // This Guard must be held to call `tokio::spawn` anywhere in the program
    trainer_app::background_worker::start_background_worker(rt); // This is also needed to prevent the runtime from stopping

    let client = match Client::from_config(&config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Unable to create the backend client: {e:#}");
            std::process::exit(1);
        }
    };

    let guard = MobileGuard::default().with_edge_spacing(config.ui.edge_spacing);
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([390.0, 780.0])
            .with_min_inner_size([280.0, 400.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Squad Trainer",
        native_options,
        Box::new(|cc| {
            Ok(Box::new(trainer_app::TrainerApp::new(
                cc,
                client,
                Location::default(),
                guard,
            )))
        }),
    )
}

// When compiling to web using trunk
#[cfg(target_arch = "wasm32")]
fn main() {
    use eframe::wasm_bindgen::JsCast as _;
    use trainer_app::{mobile_guard::MobileGuard, navigation::Location};
    use trainer_client_core::Client;

    // Redirect `log` message to `console.log` and friends:
    eframe::WebLogger::init(trainer_app::wasm_log_level()).ok();

    let web_options = eframe::WebOptions::default();

    wasm_bindgen_futures::spawn_local(async {
        let document = web_sys::window()
            .expect("No window found")
            .document()
            .expect("No document found (No DOM)");

        let started = trainer_shared::config::ClientConfig::from_build_env()
            .map_err(|e| e.to_string())
            .and_then(|config| {
                let guard = MobileGuard::default().with_edge_spacing(config.ui.edge_spacing);
                let client = Client::from_config(&config).map_err(|e| format!("{e:#}"))?;
                Ok((client, guard))
            });
        let (client, guard) = match started {
            Ok(started) => started,
            Err(msg) => {
                if let Some(loading_text) = document.get_element_by_id("loading_text") {
                    loading_text.set_inner_html(&format!("<p> Unable to start: {msg} </p>"));
                }
                log::error!("Unable to start: {msg}");
                return;
            }
        };

        let canvas = document
            .get_element_by_id("the_canvas_id")
            .expect("Failed to find the_canvas_id")
            .dyn_into::<web_sys::HtmlCanvasElement>()
            .expect("the_canvas_id was not a HtmlCanvasElement");

        let start_result = eframe::WebRunner::new()
            .start(
                canvas,
                web_options,
                Box::new(|cc| {
                    Ok(Box::new(trainer_app::TrainerApp::new(
                        cc,
                        client,
                        Location::from_browser(),
                        guard,
                    )))
                }),
            )
            .await;

        // Remove the loading text and spinner:
        if let Some(loading_text) = document.get_element_by_id("loading_text") {
            match start_result {
                Ok(_) => {
                    loading_text.remove();
                }
                Err(e) => {
                    loading_text.set_inner_html(
                        "<p> The app has crashed. See the developer console for details. </p>",
                    );
                    panic!("Failed to start eframe: {e:?}");
                }
            }
        }
    });
}

