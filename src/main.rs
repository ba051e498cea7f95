//! Minimal frame-loop host for [`data_runloop::DataRunloop`].
//!
//! A real frontend drives `iterate()` once per rendered frame and interleaves
//! it with its own work; a full CLI/frontend is a separate concern, so this
//! binary just wires the production adapters together, optionally loads
//! `config.yaml`, and pumps the loop on a fixed cadence so the crate is
//! runnable standalone.

use std::sync::Arc;
use std::time::Duration;

use data_runloop::adapters::{ChunkPngBackend, MioHttpBackend, StdNbioBackend};
use data_runloop::callbacks::{FsCoreUpdaterSink, NullMenuUi};
use data_runloop::{DataRunloop, RequestType, Result, Settings};

const CONFIG_PATH: &str = "config.yaml";
const FRAME_INTERVAL: Duration = Duration::from_millis(16);
const DEMO_FRAMES: u32 = 120;

fn load_settings() -> Settings {
    match Settings::load(CONFIG_PATH) {
        Ok(settings) => settings,
        Err(e) => {
            proxy_log::warn!("no usable {CONFIG_PATH} ({e}), falling back to defaults");
            Settings::default()
        }
    }
}

fn main() -> Result<()> {
    let settings = load_settings();
    proxy_log::info!(
        "starting data runloop (threaded={}, queue_capacity={})",
        settings.threaded_data_runloop_enable,
        settings.queue_capacity
    );

    let mut runloop = DataRunloop::new(
        Arc::new(StdNbioBackend::default()),
        Arc::new(ChunkPngBackend),
        Arc::new(NullMenuUi),
        Arc::new(MioHttpBackend),
        Arc::new(FsCoreUpdaterSink { download_dir: std::env::temp_dir() }),
        settings,
    );

    runloop.init();
    runloop.init_queues();

    for arg in std::env::args().skip(1) {
        let (kind, primary, secondary) = match arg.split_once('=') {
            Some(("file", path)) => (RequestType::File, path.to_string(), String::new()),
            Some(("image", path)) => (RequestType::Image, path.to_string(), "cb_menu_wallpaper".to_string()),
            Some(("http", url)) => (RequestType::Http, url.to_string(), "cb_core_updater_list".to_string()),
            _ => {
                proxy_log::warn!("ignoring unrecognized argument '{arg}' (expected file=/image=/http=)");
                continue;
            }
        };
        runloop.push(kind, &primary, &secondary, 0, 0, false);
    }

    for _ in 0..DEMO_FRAMES {
        runloop.iterate();
        std::thread::sleep(FRAME_INTERVAL);
    }

    runloop.deinit();
    Ok(())
}
