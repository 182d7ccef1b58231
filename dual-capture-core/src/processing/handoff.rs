use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};

use crate::models::error::CaptureError;
use crate::processing::chunk_queue::ChunkQueue;
use crate::traits::callback::AudioDataCallback;

struct HandoffState {
    queue: ChunkQueue,
    closed: bool,
}

struct Shared {
    state: Mutex<HandoffState>,
    ready: Condvar,
}

/// Moves captured buffers off the capture thread.
///
/// ```text
/// [worker thread] ── callback() ──▶ [ChunkQueue] ──▶ [consumer thread] ──▶ consumer
/// ```
///
/// The capture-side callback copies each buffer into a bounded queue and
/// returns; it never waits on the consumer. When the queue is full the oldest
/// chunk is dropped. The consumer thread receives chunks in capture order.
pub struct BufferedHandoff {
    shared: Arc<Shared>,
    consumer: Option<thread::JoinHandle<()>>,
}

impl BufferedHandoff {
    /// Spawn the consumer thread (named `<label>-handoff`).
    pub fn spawn<C>(label: &str, capacity: usize, mut consumer: C) -> Result<Self, CaptureError>
    where
        C: FnMut(Vec<u8>) + Send + 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(HandoffState {
                queue: ChunkQueue::new(capacity),
                closed: false,
            }),
            ready: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(format!("{}-handoff", label))
            .spawn(move || loop {
                let batch = {
                    let mut state = worker_shared.state.lock();
                    while state.queue.is_empty() && !state.closed {
                        worker_shared.ready.wait(&mut state);
                    }
                    if state.queue.is_empty() {
                        break;
                    }
                    state.queue.drain()
                };
                for chunk in batch {
                    consumer(chunk);
                }
            })
            .map_err(|e| CaptureError::ThreadSpawn(format!("handoff thread: {}", e)))?;

        Ok(Self {
            shared,
            consumer: Some(handle),
        })
    }

    /// Capture callback feeding this hand-off. Buffers arriving after
    /// [`close`](Self::close) are discarded.
    pub fn callback(&self) -> AudioDataCallback {
        let shared = Arc::clone(&self.shared);
        Arc::new(move |data: &[u8]| {
            let mut state = shared.state.lock();
            if state.closed {
                return;
            }
            if !state.queue.push(data.to_vec()) {
                let dropped = state.queue.dropped();
                if dropped == 1 {
                    log::warn!("Handoff queue full; dropping oldest buffers");
                } else {
                    log::debug!("Handoff queue overflow ({} buffers dropped)", dropped);
                }
            }
            drop(state);
            shared.ready.notify_one();
        })
    }

    /// Chunks waiting for the consumer.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Chunks dropped because the consumer fell behind.
    pub fn dropped(&self) -> u64 {
        self.shared.state.lock().queue.dropped()
    }

    /// Deliver what is still queued, then join the consumer thread.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(handle) = self.consumer.take() else {
            return;
        };
        self.shared.state.lock().closed = true;
        self.shared.ready.notify_all();
        if handle.join().is_err() {
            log::error!("handoff consumer panicked");
        }
    }
}

impl Drop for BufferedHandoff {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn delivers_in_order_on_close() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let handoff = BufferedHandoff::spawn("test", 16, move |chunk| sink.lock().push(chunk)).unwrap();

        let callback = handoff.callback();
        for i in 0..5u8 {
            callback(&[i; 4]);
        }
        handoff.close();

        let received = received.lock();
        assert_eq!(received.len(), 5);
        for (i, chunk) in received.iter().enumerate() {
            assert_eq!(chunk, &vec![i as u8; 4]);
        }
    }

    #[test]
    fn slow_consumer_never_blocks_capture_side() {
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let handoff = BufferedHandoff::spawn("slow", 2, move |chunk| {
            // Hold the consumer until the test releases it.
            let _ = gate_rx.recv_timeout(Duration::from_secs(5));
            sink.lock().push(chunk);
        })
        .unwrap();

        let callback = handoff.callback();
        for i in 0..10u8 {
            callback(&[i]);
        }
        assert!(handoff.dropped() > 0);

        drop(gate_tx);
        handoff.close();

        let received = received.lock();
        assert!(received.len() < 10);
        assert_eq!(received.last(), Some(&vec![9u8]));
    }

    #[test]
    fn buffers_after_close_are_discarded() {
        let count = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&count);
        let handoff = BufferedHandoff::spawn("late", 4, move |_| *counter.lock() += 1).unwrap();
        let callback = handoff.callback();

        callback(&[1]);
        handoff.close();
        callback(&[2]);

        assert_eq!(*count.lock(), 1);
    }
}
