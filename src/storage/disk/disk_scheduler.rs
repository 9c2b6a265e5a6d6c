use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::{Bytes, BytesMut};
use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, warn};

use crate::common::{PageId, Result, StratumError, DISK_SCHEDULER_QUEUE_DEPTH, PAGE_SIZE};

use super::DiskManager;

/// A disk I/O request, answered on its own completion channel.
pub enum DiskRequest {
    Read {
        page_id: PageId,
        done: Sender<Result<BytesMut>>,
    },
    Write {
        page_id: PageId,
        data: Bytes,
        done: Sender<Result<()>>,
    },
    Deallocate {
        page_id: PageId,
        done: Sender<Result<()>>,
    },
}

/// DiskScheduler owns a background worker thread that performs all disk I/O.
///
/// Callers hand over owned buffers and block on a completion channel, so no
/// frame memory is ever shared with the worker.
pub struct DiskScheduler {
    disk_manager: Arc<dyn DiskManager>,
    /// Dropped on shutdown to disconnect the worker
    request_sender: Option<Sender<DiskRequest>>,
    worker_handle: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    pub fn new(disk_manager: Arc<dyn DiskManager>) -> Self {
        let (sender, receiver) = bounded::<DiskRequest>(DISK_SCHEDULER_QUEUE_DEPTH);

        let dm_clone = Arc::clone(&disk_manager);
        let worker_handle = thread::Builder::new()
            .name("disk-scheduler".into())
            .spawn(move || Self::run_worker(dm_clone, receiver))
            .ok();

        Self {
            disk_manager,
            request_sender: Some(sender),
            worker_handle,
        }
    }

    fn schedule(&self, request: DiskRequest) -> Result<()> {
        let sender = self
            .request_sender
            .as_ref()
            .ok_or_else(|| StratumError::DiskScheduler("scheduler is shut down".into()))?;
        if self.worker_handle.is_none() {
            return Err(StratumError::DiskScheduler(
                "worker thread failed to start".into(),
            ));
        }
        sender
            .send(request)
            .map_err(|e| StratumError::DiskScheduler(format!("Failed to schedule request: {}", e)))
    }

    fn wait<T>(rx: Receiver<Result<T>>) -> Result<T> {
        rx.recv().map_err(|e| {
            StratumError::DiskScheduler(format!("Failed to receive completion: {}", e))
        })?
    }

    /// Reads `page_id` and waits for the bytes.
    pub fn read_sync(&self, page_id: PageId) -> Result<BytesMut> {
        let (done, rx) = bounded(1);
        self.schedule(DiskRequest::Read { page_id, done })?;
        Self::wait(rx)
    }

    /// Writes `data` as `page_id` and waits for completion.
    pub fn write_sync(&self, page_id: PageId, data: Bytes) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);
        let (done, rx) = bounded(1);
        self.schedule(DiskRequest::Write {
            page_id,
            data,
            done,
        })?;
        Self::wait(rx)
    }

    pub fn deallocate_sync(&self, page_id: PageId) -> Result<()> {
        let (done, rx) = bounded(1);
        self.schedule(DiskRequest::Deallocate { page_id, done })?;
        Self::wait(rx)
    }

    fn run_worker(disk_manager: Arc<dyn DiskManager>, receiver: Receiver<DiskRequest>) {
        // Exits once every sender is gone and the queue is drained
        for request in receiver.iter() {
            Self::process_request(disk_manager.as_ref(), request);
        }
        debug!("disk scheduler worker exiting");
    }

    fn process_request(disk_manager: &dyn DiskManager, request: DiskRequest) {
        match request {
            DiskRequest::Read { page_id, done } => {
                let mut buf = BytesMut::zeroed(PAGE_SIZE);
                let result = disk_manager.read_page(page_id, &mut buf).map(|_| buf);
                if let Err(e) = &result {
                    warn!(page_id = %page_id, error = %e, "disk read failed");
                }
                let _ = done.send(result);
            }
            DiskRequest::Write {
                page_id,
                data,
                done,
            } => {
                let result = disk_manager.write_page(page_id, &data);
                if let Err(e) = &result {
                    warn!(page_id = %page_id, error = %e, "disk write failed");
                }
                let _ = done.send(result);
            }
            DiskRequest::Deallocate { page_id, done } => {
                let _ = done.send(disk_manager.deallocate_page(page_id));
            }
        }
    }

    pub fn disk_manager(&self) -> &Arc<dyn DiskManager> {
        &self.disk_manager
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        self.request_sender.take();
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}
