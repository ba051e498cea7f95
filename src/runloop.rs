//! The data runloop. Owns the NBIO pipeline (and, transitively, the
//! image sub-pipeline) and the HTTP pipeline, plus the optional worker
//! thread for threaded mode.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crate::adapters::http::HttpBackend;
use crate::adapters::nbio::NbioBackend;
use crate::adapters::png::PngBackend;
use crate::callbacks::{CoreUpdaterSink, MenuUi};
use crate::pipelines::{HttpPipeline, NbioPipeline};
use crate::prelude::*;

/// `push()`'s request type tag. `None` and `Overlay` are accepted but
/// currently route nowhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    None,
    File,
    Image,
    Http,
    Overlay,
}

struct Inner<B, P, M, H, S>
where
    B: NbioBackend,
    P: PngBackend,
    M: MenuUi,
    H: HttpBackend,
    S: CoreUpdaterSink,
{
    nbio: NbioPipeline<B, P, M>,
    http: HttpPipeline<H, S>,
}

impl<B, P, M, H, S> Inner<B, P, M, H, S>
where
    B: NbioBackend,
    P: PngBackend,
    M: MenuUi,
    H: HttpBackend,
    S: CoreUpdaterSink,
{
    /// Inner iterator order: overlay, NBIO, HTTP, DB. Overlay and the
    /// database writer are peer lifecycles out of scope here; NBIO running
    /// before HTTP is the only ordering the contract actually promises.
    fn tick(&mut self) {
        self.nbio.tick();
        self.http.tick();
    }
}

pub struct DataRunloop<B, P, M, H, S>
where
    B: NbioBackend,
    P: PngBackend,
    M: MenuUi,
    H: HttpBackend,
    S: CoreUpdaterSink,
{
    inner: Arc<Mutex<Inner<B, P, M, H, S>>>,
    settings: Settings,
    inited: bool,
    worker: Option<JoinHandle<()>>,
    quit: Arc<(Mutex<bool>, Condvar)>,
}

impl<B, P, M, H, S> DataRunloop<B, P, M, H, S>
where
    B: NbioBackend + 'static,
    P: PngBackend + 'static,
    M: MenuUi + 'static,
    H: HttpBackend + 'static,
    S: CoreUpdaterSink + 'static,
{
    pub fn new(
        nbio_backend: Arc<B>,
        png_backend: Arc<P>,
        ui: Arc<M>,
        http_backend: Arc<H>,
        core_updater_sink: Arc<S>,
        settings: Settings,
    ) -> Self {
        let capacity = settings.queue_capacity;
        let nbio = NbioPipeline::new(
            nbio_backend,
            png_backend,
            ui,
            capacity,
            settings.nbio_pos_increment(),
            settings.image_pos_increment_override(),
            settings.image_processing_pos_increment_override(),
        );
        let http = HttpPipeline::new(http_backend, core_updater_sink, capacity);
        Self {
            inner: Arc::new(Mutex::new(Inner { nbio, http })),
            settings,
            inited: false,
            worker: None,
            quit: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    pub fn is_inited(&self) -> bool {
        self.inited
    }

    /// Idempotent: spawns the worker (threaded mode only) and marks the
    /// runloop initialized. Calling twice without an intervening
    /// `deinit()` is a no-op.
    pub fn init(&mut self) {
        if self.inited {
            return;
        }
        *self.quit.0.lock().unwrap() = false;
        if self.settings.threaded_data_runloop_enable {
            let inner = self.inner.clone();
            let quit = self.quit.clone();
            self.worker = Some(thread::spawn(move || loop {
                if *quit.0.lock().unwrap() {
                    break;
                }
                inner.lock().unwrap().tick();
            }));
        }
        self.inited = true;
    }

    /// Resets all three queues to the configured capacity. A no-op beyond
    /// construction time in this implementation, since each pipeline
    /// already allocates its queue in `new()`; kept as an explicit,
    /// callable step to match the inbound API.
    pub fn init_queues(&mut self) {
        let capacity = self.settings.queue_capacity;
        let mut inner = self.inner.lock().unwrap();
        inner.nbio.queue = MessageQueue::new(capacity);
        inner.nbio.image.queue = MessageQueue::new(capacity);
        inner.http.queue = MessageQueue::new(capacity);
    }

    pub fn push(
        &mut self,
        kind: RequestType,
        msg: &str,
        msg2: &str,
        priority: i32,
        duration: u32,
        flush: bool,
    ) {
        let text = format!("{msg}|{msg2}");
        let mut inner = self.inner.lock().unwrap();
        match kind {
            RequestType::File => inner.nbio.queue.push(text, priority, duration, flush),
            RequestType::Image => inner.nbio.image.queue.push(text, priority, duration, flush),
            RequestType::Http => inner.http.queue.push(text, priority, duration, flush),
            RequestType::None | RequestType::Overlay => {
                trace!("push(): {:?} request currently routes nowhere", kind);
            }
        }
    }

    /// A no-op in threaded mode: the worker drives the tick loop instead.
    pub fn iterate(&mut self) {
        if self.settings.threaded_data_runloop_enable {
            return;
        }
        self.inner.lock().unwrap().tick();
    }

    pub fn deinit(&mut self) {
        if !self.inited {
            return;
        }
        if let Some(worker) = self.worker.take() {
            *self.quit.0.lock().unwrap() = true;
            self.quit.1.notify_all();
            let _ = worker.join();
        }
        self.inited = false;
    }

    pub fn clear_state(&mut self) {
        self.deinit();
        self.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::{MockHttpBackend, MockNbioBackend, MockPngBackend, RecordingCoreUpdaterSink, RecordingMenuUi};

    fn runloop(settings: Settings) -> DataRunloop<MockNbioBackend, MockPngBackend, RecordingMenuUi, MockHttpBackend, RecordingCoreUpdaterSink> {
        DataRunloop::new(
            Arc::new(MockNbioBackend { bytes_per_step: 8, fail_open: false, file: vec![0u8; 8] }),
            Arc::new(MockPngBackend::default()),
            Arc::new(RecordingMenuUi::default()),
            Arc::new(MockHttpBackend::default()),
            Arc::new(RecordingCoreUpdaterSink::default()),
            settings,
        )
    }

    #[test]
    fn init_is_idempotent() {
        let mut r = runloop(Settings::default());
        assert!(!r.is_inited());
        r.init();
        assert!(r.is_inited());
        r.init();
        assert!(r.is_inited());
    }

    #[test]
    fn inline_mode_drives_ticks_via_iterate() {
        let mut r = runloop(Settings::default());
        r.init();
        r.push(RequestType::File, "/tmp/a.bin", "", 0, 0, false);
        for _ in 0..5 {
            r.iterate();
        }
    }

    #[test]
    fn deinit_resets_inited_flag() {
        let mut r = runloop(Settings::default());
        r.init();
        r.deinit();
        assert!(!r.is_inited());
    }

    #[test]
    fn unrouted_request_types_do_not_panic() {
        let mut r = runloop(Settings::default());
        r.push(RequestType::None, "ignored", "", 0, 0, false);
        r.push(RequestType::Overlay, "ignored", "", 0, 0, false);
    }
}
