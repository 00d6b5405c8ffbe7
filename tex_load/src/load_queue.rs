/*
Background decode of custom textures.

The render thread hands out a placeholder texture to the game right away.  A worker thread
decodes the real image into system memory, waits for the render thread to say which
placeholder it belongs to, and queues a copy job.  Once per frame the render thread pops one
job and copies the decoded image over the placeholder.

The placeholder carries an extra reference from the moment it is handed off until its job is
committed, so the game can't free it underneath the copy.
 */
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use shared_dx::defs::{succeeded, HRESULT, S_OK};
use shared_dx::error::{DxResult, HookError, Result};
use shared_dx::types::{D3D9Device, DevicePtr, TexPtr};
use shared_dx::util::write_log_file;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadJob {
    pub checksum: u32,
    /// Decoded system memory copy; None if the decode failed.
    pub src: Option<TexPtr>,
    /// Placeholder to copy into; None if the render thread never provided one in time.
    pub dest: Option<TexPtr>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DestSlot {
    Waiting,
    Ready(TexPtr),
    /// The render thread couldn't create the placeholder.
    Abandoned,
    /// The worker gave up waiting.
    TimedOut,
}

/// One-shot hand-off of the placeholder from the render thread to a worker.
pub struct DestHandoff {
    slot: Mutex<DestSlot>,
    cv: Condvar,
}

impl DestHandoff {
    fn new() -> Self {
        DestHandoff {
            slot: Mutex::new(DestSlot::Waiting),
            cv: Condvar::new(),
        }
    }

    /// Give the worker its destination.  Returns false if the worker already gave up, in which
    /// case the caller must not take the extra reference.
    pub fn provide(&self, dest: TexPtr) -> bool {
        let mut slot = match self.slot.lock() {
            Ok(s) => s,
            Err(_) => return false,
        };
        if *slot != DestSlot::Waiting {
            return false;
        }
        *slot = DestSlot::Ready(dest);
        self.cv.notify_all();
        true
    }

    pub fn abandon(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            if *slot == DestSlot::Waiting {
                *slot = DestSlot::Abandoned;
                self.cv.notify_all();
            }
        }
    }

    /// Block until a destination arrives, the render thread abandons the load, or `timeout`
    /// elapses.
    pub fn wait(&self, timeout: Duration) -> Option<TexPtr> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock().ok()?;
        loop {
            match *slot {
                DestSlot::Ready(t) => return Some(t),
                DestSlot::Abandoned | DestSlot::TimedOut => return None,
                DestSlot::Waiting => {}
            }
            let now = Instant::now();
            if now >= deadline {
                *slot = DestSlot::TimedOut;
                return None;
            }
            slot = match self.cv.wait_timeout(slot, deadline - now) {
                Ok((s, _)) => s,
                Err(_) => return None,
            };
        }
    }
}

#[derive(Default)]
pub struct LoadQueue {
    jobs: Mutex<VecDeque<LoadJob>>,
}

impl LoadQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(LoadQueue::default())
    }

    pub fn push(&self, job: LoadJob) {
        match self.jobs.lock() {
            Ok(mut q) => q.push_back(job),
            Err(e) => write_log_file(&format!(
                "[Custom Tex] >> ERROR: load queue lock poisoned, dropping job {:08x}: {}",
                job.checksum, e
            )),
        }
    }

    pub fn pop(&self) -> Option<LoadJob> {
        self.jobs.lock().ok()?.pop_front()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start a worker that runs `decode` and then waits up to `timeout` for the destination.
    /// The job is queued even if either half is missing, so the render thread can release
    /// whatever did get created.
    pub fn spawn_load<F>(
        self: &Arc<Self>,
        checksum: u32,
        timeout: Duration,
        decode: F,
    ) -> Result<Arc<DestHandoff>>
    where
        F: FnOnce() -> DxResult<TexPtr> + Send + 'static,
    {
        let handoff = Arc::new(DestHandoff::new());
        let worker_handoff = handoff.clone();
        let queue = self.clone();

        std::thread::Builder::new()
            .name(format!("tex_load_{:08x}", checksum))
            .spawn(move || {
                let src = match decode() {
                    Ok(t) => Some(t),
                    Err(hr) => {
                        write_log_file(&format!(
                            "[Custom Tex] >> ERROR: background decode of {:08x} failed (hr: {:x})",
                            checksum, hr
                        ));
                        None
                    }
                };
                let dest = worker_handoff.wait(timeout);
                if dest.is_none() {
                    write_log_file(&format!(
                        "[Custom Tex] >> WARNING: no destination for {:08x} after {} ms",
                        checksum,
                        timeout.as_millis()
                    ));
                }
                if src.is_some() || dest.is_some() {
                    queue.push(LoadJob {
                        checksum,
                        src,
                        dest,
                    });
                }
            })
            .map_err(|e| HookError::ThreadSpawnFailed(format!("{}", e)))?;

        Ok(handoff)
    }

    /// Commit at most one job.  Returns the copy result, or None if nothing was queued.
    pub fn drain_one(&self, dev: &mut dyn D3D9Device, device: DevicePtr) -> Option<HRESULT> {
        let job = self.pop()?;

        let hr = match (job.src, job.dest) {
            (Some(src), Some(dest)) => {
                let hr = dev.update_texture(device, src, dest);
                if succeeded(hr) {
                    write_log_file(&format!(
                        "[Custom Tex] Finished loading custom texture {:x}...",
                        job.checksum
                    ));
                } else {
                    write_log_file(&format!(
                        "[Custom Tex] >> ERROR: copy of custom texture {:x} failed (hr: {:x})",
                        job.checksum, hr
                    ));
                }
                hr
            }
            _ => S_OK,
        };

        if let Some(src) = job.src {
            dev.release_texture(src);
        }
        if let Some(dest) = job.dest {
            dev.release_texture(dest);
        }
        Some(hr)
    }
}
