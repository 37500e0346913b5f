//! Worker thread shared by the capture handles.
//!
//! The transport side pushes items into a bounded channel; a dedicated thread
//! owns the sink and consumes them in order. Stopping is two-phase: the handle
//! refuses further input, then queues a stop marker behind everything already
//! accepted and joins the thread.

use crate::error::{Result, StreamLogError};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Item queued for a capture worker
#[derive(Debug)]
pub(crate) enum Input<T> {
    /// Data to write
    Item(T),
    /// Drain what is queued and finish
    Stop,
}

/// Sink driven by a capture worker
pub(crate) trait Sink<T>: Send + 'static {
    /// Value returned once the sink is finished
    type Report: Send + 'static;

    /// Consume one item; an error ends the worker
    fn consume(&mut self, item: T) -> Result<()>;

    /// Final flush after the last item
    fn finish(self) -> Result<Self::Report>;

    /// Release resources after a fatal error
    fn abort(self);
}

/// Owning handle of a capture thread
#[derive(Debug)]
pub(crate) struct WorkerHandle<T, R> {
    name: String,
    tx: Sender<Input<T>>,
    stopped: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<R>>>,
}

impl<T: Send + 'static, R: Send + 'static> WorkerHandle<T, R> {
    /// Start a thread named `name` feeding `sink`
    pub(crate) fn spawn<S>(name: impl Into<String>, capacity: usize, sink: S) -> Result<Self>
    where
        S: Sink<T, Report = R>,
    {
        let name = name.into();
        let (tx, rx) = bounded(capacity.max(1));
        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || run(rx, sink))?;
        tracing::debug!("Started capture worker {:?} (capacity {})", name, capacity);

        Ok(Self {
            name,
            tx,
            stopped: Arc::new(AtomicBool::new(false)),
            thread: Some(thread),
        })
    }

    /// Queue one item, blocking while the channel is full
    pub(crate) fn push(&self, item: T) -> Result<()> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(StreamLogError::Channel(format!("{} is stopped", self.name)));
        }
        self.tx.send(Input::Item(item)).map_err(|_| {
            StreamLogError::Channel(format!("{} worker has exited", self.name))
        })
    }

    /// Whether `stop` has been requested
    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Items queued but not yet consumed
    pub(crate) fn queued(&self) -> usize {
        self.tx.len()
    }

    /// Refuse new input, drain the queue and join the thread
    pub(crate) fn stop(mut self) -> Result<R> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<R> {
        self.stopped.store(true, Ordering::Release);
        // Fails only when the worker already exited on an error
        let _ = self.tx.send(Input::Stop);

        let thread = self.thread.take().ok_or_else(|| {
            StreamLogError::Channel(format!("{} was already stopped", self.name))
        })?;
        let result = thread
            .join()
            .map_err(|_| StreamLogError::Channel(format!("{} worker panicked", self.name)))?;
        tracing::debug!("Stopped capture worker {:?}", self.name);
        result
    }
}

impl<T, R> Drop for WorkerHandle<T, R> {
    fn drop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.stopped.store(true, Ordering::Release);
        let _ = self.tx.send(Input::Stop);
        match thread.join() {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::error!("{} failed: {}", self.name, e),
            Err(_) => tracing::error!("{} worker panicked", self.name),
        }
    }
}

fn run<T, S: Sink<T>>(rx: Receiver<Input<T>>, mut sink: S) -> Result<S::Report> {
    let mut stopping = false;
    loop {
        let input = if stopping {
            // Items that raced the stop marker
            match rx.try_recv() {
                Ok(input) => input,
                Err(_) => break,
            }
        } else {
            match rx.recv() {
                Ok(input) => input,
                Err(_) => break,
            }
        };

        match input {
            Input::Item(item) => {
                if let Err(e) = sink.consume(item) {
                    tracing::error!("Capture worker stopping on error: {}", e);
                    sink.abort();
                    return Err(e);
                }
            }
            Input::Stop => stopping = true,
        }
    }
    sink.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Collect {
        seen: Arc<Mutex<Vec<u32>>>,
        fail_on: Option<u32>,
    }

    impl Sink<u32> for Collect {
        type Report = usize;

        fn consume(&mut self, item: u32) -> Result<()> {
            if self.fail_on == Some(item) {
                return Err(StreamLogError::Io(std::io::Error::other("disk full")));
            }
            self.seen.lock().unwrap().push(item);
            Ok(())
        }

        fn finish(self) -> Result<usize> {
            Ok(self.seen.lock().unwrap().len())
        }

        fn abort(self) {}
    }

    fn collect(fail_on: Option<u32>) -> (Collect, Arc<Mutex<Vec<u32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Collect {
                seen: seen.clone(),
                fail_on,
            },
            seen,
        )
    }

    #[test]
    fn test_stop_drains_in_order() {
        let (sink, seen) = collect(None);
        let handle = WorkerHandle::spawn("test", 4, sink).unwrap();
        for i in 0..100 {
            handle.push(i).unwrap();
        }
        assert_eq!(handle.stop().unwrap(), 100);
        assert_eq!(*seen.lock().unwrap(), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_push_refused_once_stopping() {
        let (sink, _seen) = collect(None);
        let handle = WorkerHandle::spawn("test", 4, sink).unwrap();
        handle.push(1).unwrap();
        handle.stopped.store(true, Ordering::Release);
        assert!(handle.is_stopped());
        assert!(matches!(handle.push(2), Err(StreamLogError::Channel(_))));
        assert_eq!(handle.stop().unwrap(), 1);
    }

    #[test]
    fn test_error_ends_worker() {
        let (sink, _seen) = collect(Some(3));
        let handle = WorkerHandle::spawn("test", 16, sink).unwrap();
        for i in 0..5 {
            // Pushes after the failing item may already be refused
            let _ = handle.push(i);
        }
        let err = handle.stop().unwrap_err();
        assert!(matches!(err, StreamLogError::Io(_)));
    }

    #[test]
    fn test_push_after_worker_exit_fails() {
        let (sink, _seen) = collect(Some(0));
        let handle = WorkerHandle::spawn("test", 1, sink).unwrap();
        handle.push(0).unwrap();
        // The worker drops its receiver once it has failed
        let mut refused = false;
        for i in 1..1000 {
            if handle.push(i).is_err() {
                refused = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert!(refused);
        assert!(handle.stop().is_err());
    }
}
