//! C7: HTTP pipeline — two-stage state machine over a C4
//! transport adapter: build a connection, then run the body transfer,
//! then deliver to a named completion callback.

use std::sync::Arc;

use crate::adapters::http::{HttpBackend, HttpConnection, HttpTransfer};
use crate::callbacks::{resolve_http_callback, CoreUpdaterSink, HttpCallbackKind};
use crate::prelude::*;

pub struct HttpPipeline<H: HttpBackend, S: CoreUpdaterSink> {
    backend: Arc<H>,
    sink: Arc<S>,
    connection: Option<H::Connection>,
    connection_callback_name: String,
    url: String,
    transfer: Option<H::Transfer>,
    cb: HttpCallbackKind,
    pub queue: MessageQueue,
}

impl<H: HttpBackend, S: CoreUpdaterSink> HttpPipeline<H, S> {
    pub fn new(backend: Arc<H>, sink: Arc<S>, queue_capacity: usize) -> Self {
        Self {
            backend,
            sink,
            connection: None,
            connection_callback_name: String::new(),
            url: String::new(),
            transfer: None,
            cb: HttpCallbackKind::Default,
            queue: MessageQueue::new(queue_capacity),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.connection.is_none() && self.transfer.is_none()
    }

    pub fn tick(&mut self) {
        if let Some(connection) = self.connection.as_mut() {
            if connection.iterate() {
                self.connection_done();
            }
        }
        if self.transfer.is_some() {
            self.tick_transfer();
        } else {
            self.poll();
        }
    }

    fn connection_done(&mut self) {
        let connection = self.connection.take().unwrap();
        if !connection.is_done() {
            errors!("OpenFailed: connection settled without completing, discarding");
            self.connection_callback_name.clear();
            self.url.clear();
            return;
        }
        match self.backend.new_transfer(connection) {
            Some(transfer) => {
                self.cb = resolve_http_callback(&self.connection_callback_name);
                self.transfer = Some(transfer);
            }
            None => {
                errors!("OpenFailed: transport refused to promote connection to transfer");
            }
        }
        self.connection_callback_name.clear();
    }

    fn tick_transfer(&mut self) {
        let mut pos = 0usize;
        let mut total = 0usize;
        let done = self.transfer.as_mut().unwrap().update(&mut pos, &mut total);
        if !done {
            info!("http transfer progress: {}/{}", pos, total);
            return;
        }

        let body = self.transfer.as_mut().unwrap().data(true).unwrap_or_default();
        match self.cb {
            HttpCallbackKind::CoreUpdaterDownload => self.sink.on_download(&self.url, &body),
            HttpCallbackKind::CoreUpdaterList => {
                let entries = String::from_utf8_lossy(&body)
                    .lines()
                    .map(str::to_string)
                    .collect();
                self.sink.on_list(entries);
            }
            HttpCallbackKind::Default => {}
        }

        self.transfer = None;
        self.cb = HttpCallbackKind::Default;
        self.url.clear();
        self.queue.clear();
    }

    /// Pulls the next Request regardless of busy state so the queue never
    /// silently fills up behind a held handle, then refuses (drops it) if a
    /// connection or transfer is still in flight. The alternative
    /// (re-queue) was considered and rejected: see the HandleBusy entry
    /// in the design ledger.
    fn poll(&mut self) {
        let Some(queued) = self.queue.pull() else { return };
        if self.connection.is_some() || self.transfer.is_some() {
            return;
        }
        let request = match Request::parse(&queued.text) {
            Ok(r) => r,
            Err(_) => {
                warn!("BadRequest: dropping malformed http request '{}'", queued.text);
                return;
            }
        };

        let Some(connection) = self.backend.connection_new(&request.primary) else {
            errors!("OpenFailed: could not open connection to '{}'", request.primary);
            return;
        };
        self.url = request.primary;
        self.connection_callback_name = request.secondary;
        self.connection = Some(connection);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::{MockHttpBackend, RecordingCoreUpdaterSink};

    fn pipeline(
        backend: MockHttpBackend,
    ) -> HttpPipeline<MockHttpBackend, RecordingCoreUpdaterSink> {
        HttpPipeline::new(Arc::new(backend), Arc::new(RecordingCoreUpdaterSink::default()), 8)
    }

    #[test]
    fn list_fetch_invokes_on_list_exactly_once() {
        let mut p = pipeline(MockHttpBackend {
            connection_steps: 1,
            transfer_steps: 1,
            body: b"core-a\ncore-b".to_vec(),
            fail_connect: false,
        });
        p.queue.push("http://x/list|cb_core_updater_list", 0, 0, false);

        p.tick(); // poll -> connection
        assert!(p.connection.is_some());

        p.tick(); // connection settles, promotes to transfer same tick,
                  // transfer settles and completes same tick too
        assert!(p.transfer.is_none());
        assert!(p.is_idle());
        assert!(p.queue.is_empty());

        let listed = p.sink.listed.lock().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], vec!["core-a".to_string(), "core-b".to_string()]);
    }

    #[test]
    fn download_invokes_on_download_with_url_as_destination() {
        let mut p = pipeline(MockHttpBackend {
            connection_steps: 1,
            transfer_steps: 1,
            body: b"binary-bytes".to_vec(),
            fail_connect: false,
        });
        p.queue.push("http://x/core.so|cb_core_updater_download", 0, 0, false);

        p.tick();
        p.tick();

        let downloaded = p.sink.downloaded.lock().unwrap();
        assert_eq!(downloaded.len(), 1);
        assert_eq!(downloaded[0].0, "http://x/core.so");
        assert_eq!(downloaded[0].1, b"binary-bytes");
    }

    #[test]
    fn busy_handle_drops_new_requests_silently() {
        let mut p = pipeline(MockHttpBackend {
            connection_steps: 3,
            transfer_steps: 1,
            body: Vec::new(),
            fail_connect: false,
        });
        p.queue.push("http://x/a|cb_core_updater_list", 0, 0, false);
        p.tick(); // connection opened, still settling
        assert!(p.connection.is_some());

        p.queue.push("http://x/b|cb_core_updater_list", 0, 0, false);
        p.tick(); // poll would run but connection is held: request dropped
        assert!(p.queue.is_empty());
    }

    #[test]
    fn failed_connect_leaves_pipeline_idle() {
        let mut p = pipeline(MockHttpBackend { fail_connect: true, ..MockHttpBackend::default() });
        p.queue.push("http://x/a|cb_core_updater_list", 0, 0, false);
        p.tick();
        assert!(p.is_idle());
    }

    #[test]
    fn connection_settled_but_not_done_is_discarded_not_promoted() {
        let mut p = pipeline(MockHttpBackend {
            connection_steps: 1,
            connect_settles_as_error: true,
            ..MockHttpBackend::default()
        });
        p.queue.push("http://x/a|cb_core_updater_list", 0, 0, false);

        p.tick(); // poll -> connection
        assert!(p.connection.is_some());

        p.tick(); // connection.iterate() settles but is_done() is false
        assert!(p.is_idle());
        assert!(p.sink.listed.lock().unwrap().is_empty());
    }
}
