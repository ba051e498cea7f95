//! End-to-end scenarios driven purely through `DataRunloop`'s public API
//! (`push`/`iterate`) against the deterministic mock adapters.

use std::sync::Arc;
use std::time::{Duration, Instant};

use data_runloop::adapters::testing::{
    MockHttpBackend, MockNbioBackend, MockPngBackend, RecordingCoreUpdaterSink, RecordingMenuUi,
};
use data_runloop::{DataRunloop, RequestType, Settings};

type TestRunloop = DataRunloop<MockNbioBackend, MockPngBackend, RecordingMenuUi, MockHttpBackend, RecordingCoreUpdaterSink>;

fn build(
    nbio: MockNbioBackend,
    png: MockPngBackend,
    http: MockHttpBackend,
    settings: Settings,
) -> (TestRunloop, Arc<RecordingMenuUi>, Arc<RecordingCoreUpdaterSink>) {
    let ui = Arc::new(RecordingMenuUi::default());
    let sink = Arc::new(RecordingCoreUpdaterSink::default());
    let runloop = DataRunloop::new(Arc::new(nbio), Arc::new(png), ui.clone(), Arc::new(http), sink.clone(), settings);
    (runloop, ui, sink)
}

fn pump(runloop: &mut TestRunloop, frames: usize) {
    for _ in 0..frames {
        runloop.iterate();
    }
}

/// Scenario 1: file load, default cb. Nothing but absence of a panic and a
/// clean return to idle (exercised indirectly by successfully reusing the
/// same pipeline for a second unrelated request) is externally observable
/// for a bare file load, since `DataRunloop` intentionally exposes no
/// pipeline-state getters beyond its public inbound API.
#[test]
fn scenario_1_file_load_default_callback_then_pipeline_is_reusable() {
    let (mut runloop, _ui, _sink) = build(
        MockNbioBackend { bytes_per_step: 4, fail_open: false, file: vec![0u8; 20] },
        MockPngBackend::default(),
        MockHttpBackend::default(),
        Settings::default(),
    );
    runloop.init();
    runloop.push(RequestType::File, "/tmp/a.bin", "", 0, 0, false);
    pump(&mut runloop, 10);

    // Pipeline must have drained back to idle: a second file request, on a
    // fresh runloop tick budget, also completes without panicking.
    runloop.push(RequestType::File, "/tmp/b.bin", "", 0, 0, false);
    pump(&mut runloop, 10);
    runloop.deinit();
}

/// Scenario 2: image load via NBIO. The image Request is re-routed through
/// the NBIO queue first; only the NBIO-completion callback installs the
/// decoder. The upload callback eventually calls `load_background`.
#[test]
fn scenario_2_image_load_routes_through_nbio_and_uploads_texture() {
    let (mut runloop, ui, _sink) = build(
        MockNbioBackend { bytes_per_step: 8, fail_open: false, file: vec![0u8; 8] },
        MockPngBackend { iterate_steps: 2, process_result: data_runloop::adapters::ProcessResult::End, width: 4, height: 4 },
        MockHttpBackend::default(),
        Settings::default(),
    );
    runloop.init();
    runloop.push(RequestType::Image, "/tmp/a.png", "cb_menu_wallpaper", 0, 0, false);
    pump(&mut runloop, 12);
    runloop.deinit();

    let loaded = ui.loaded.lock().unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!((loaded[0].width, loaded[0].height), (4, 4));
    assert_eq!(*ui.freed.lock().unwrap(), 1);
}

/// Scenario 3: image decode error. The upload callback must not call
/// `load_background`, but it must still free the texture.
#[test]
fn scenario_3_image_decode_error_skips_upload_but_still_frees() {
    let (mut runloop, ui, _sink) = build(
        MockNbioBackend { bytes_per_step: 8, fail_open: false, file: vec![0u8; 8] },
        MockPngBackend {
            iterate_steps: 1,
            process_result: data_runloop::adapters::ProcessResult::Error,
            width: 4,
            height: 4,
        },
        MockHttpBackend::default(),
        Settings::default(),
    );
    runloop.init();
    runloop.push(RequestType::Image, "/tmp/bad.png", "cb_menu_wallpaper", 0, 0, false);
    pump(&mut runloop, 12);
    runloop.deinit();

    assert!(ui.loaded.lock().unwrap().is_empty());
    assert_eq!(*ui.freed.lock().unwrap(), 1);
}

/// Scenario 4: HTTP list fetch invokes `cb_core_updater_list` exactly once.
#[test]
fn scenario_4_http_list_fetch_invokes_callback_once() {
    let (mut runloop, _ui, sink) = build(
        MockNbioBackend { bytes_per_step: 4, fail_open: false, file: Vec::new() },
        MockPngBackend::default(),
        MockHttpBackend { connection_steps: 1, transfer_steps: 2, body: b"core-a\ncore-b".to_vec(), fail_connect: false },
        Settings::default(),
    );
    runloop.init();
    runloop.push(RequestType::Http, "http://x/list", "cb_core_updater_list", 0, 0, false);
    pump(&mut runloop, 8);
    runloop.deinit();

    let listed = sink.listed.lock().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0], vec!["core-a".to_string(), "core-b".to_string()]);
}

/// Scenario 5: flush semantics. Rapidly pushing with `flush=true` never lets
/// more than one Request accumulate on the queue, observed by only ever
/// seeing one completion even though five were enqueued.
#[test]
fn scenario_5_flush_collapses_rapid_pushes_to_at_most_one_completion() {
    let (mut runloop, _ui, sink) = build(
        MockNbioBackend { bytes_per_step: 4, fail_open: false, file: Vec::new() },
        MockPngBackend::default(),
        MockHttpBackend { connection_steps: 1, transfer_steps: 1, body: b"only-one".to_vec(), fail_connect: false },
        Settings::default(),
    );
    runloop.init();
    for i in 0..5 {
        runloop.push(RequestType::Http, &format!("http://x/{i}"), "cb_core_updater_list", 0, 0, true);
    }
    pump(&mut runloop, 8);
    runloop.deinit();

    assert_eq!(sink.listed.lock().unwrap().len(), 1);
}

/// Scenario 6: threaded mode. Foreground `iterate()` must be a no-op; the
/// worker thread drives completions; `deinit()` must join cleanly.
#[test]
fn scenario_6_threaded_mode_foreground_iterate_is_a_noop_and_deinit_joins() {
    let mut settings = Settings::default();
    settings.threaded_data_runloop_enable = true;
    let (mut runloop, _ui, sink) = build(
        MockNbioBackend { bytes_per_step: 4, fail_open: false, file: Vec::new() },
        MockPngBackend::default(),
        MockHttpBackend { connection_steps: 1, transfer_steps: 1, body: b"threaded-body".to_vec(), fail_connect: false },
        settings,
    );
    runloop.init();
    runloop.push(RequestType::Http, "http://x/list", "cb_core_updater_list", 0, 0, false);

    // Foreground iterate() must not itself drive completion in threaded mode.
    runloop.iterate();

    let deadline = Instant::now() + Duration::from_secs(2);
    while sink.listed.lock().unwrap().is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(sink.listed.lock().unwrap().len(), 1);

    runloop.deinit();
    assert!(!runloop.is_inited());
}
