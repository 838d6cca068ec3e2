use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use dataframe::DataFrame;
use log::error;
use parking_lot::Mutex;

use crate::config::SamplerConfig;
use crate::error::{Error, Result};

/// A stage a frame passes through once it is complete. `run` returns `false`
/// on a fatal error, at which point the scheduler marks the frame inactive
/// and stops dispatching further runners to it (spec §4.7).
pub trait FrameRunner: Send {
    fn name(&self) -> &str;
    fn run(&mut self, frame: &mut DataFrame) -> bool;
    fn release(&mut self) {}
}

/// Posts a frame's serialized columns onto a named publisher channel.
pub struct FrameSender {
    name: String,
    publisher: Sender<Vec<u8>>,
}

impl FrameSender {
    pub fn new(name: impl Into<String>, publisher: Sender<Vec<u8>>) -> Self {
        FrameSender { name: name.into(), publisher }
    }
}

impl FrameRunner for FrameSender {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, frame: &mut DataFrame) -> bool {
        for record in dataframe::serialize_frame(frame) {
            let Ok(bytes) = record.serialize() else { return false };
            if self.publisher.send(bytes).is_err() {
                return false;
            }
        }
        let Ok(eof) = dataframe::eof_record(frame).serialize() else { return false };
        self.publisher.send(eof).is_ok()
    }
}

/// Single-threaded-per-frame FIFO scheduler: drains a bounded queue of
/// runners, applying each to the frame in order and tracking cumulative
/// run time (spec §4.7). `None` on the queue is the shutdown sentinel.
pub struct Scheduler {
    queue: Receiver<Option<Box<dyn FrameRunner>>>,
    active: Arc<AtomicBool>,
    run_time: Mutex<Duration>,
    sys_timeout: Duration,
}

impl Scheduler {
    pub fn new(queue: Receiver<Option<Box<dyn FrameRunner>>>, active: Arc<AtomicBool>, config: SamplerConfig) -> Self {
        Scheduler {
            queue,
            active,
            run_time: Mutex::new(Duration::ZERO),
            sys_timeout: config.sys_timeout,
        }
    }

    pub fn run_time(&self) -> Duration {
        *self.run_time.lock()
    }

    fn update_run_time(&self, delta: Duration) {
        *self.run_time.lock() += delta;
    }

    /// Drives `frame` through every queued runner, in FIFO order, until the
    /// shutdown sentinel arrives or the queue disconnects.
    pub fn drain(&self, frame: &mut DataFrame) -> Result<()> {
        loop {
            match self.queue.recv_timeout(self.sys_timeout) {
                Ok(Some(mut runner)) => {
                    if !self.active.load(Ordering::SeqCst) {
                        runner.release();
                        continue;
                    }
                    if frame.num_rows() > 0 {
                        let start = std::time::Instant::now();
                        let ok = runner.run(frame);
                        self.update_run_time(start.elapsed());
                        if !ok {
                            self.active.store(false, Ordering::SeqCst);
                            error!("frame runner stage '{}' failed", runner.name());
                            runner.release();
                            return Err(Error::RunnerError { stage: runner.name().to_string() });
                        }
                    }
                    runner.release();
                }
                Ok(None) => return Ok(()),
                Err(RecvTimeoutError::Timeout) => {
                    if !self.active.load(Ordering::SeqCst) {
                        return Ok(());
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataframe::{role, Column, Encoding, ElementType};

    struct CountingRunner {
        calls: Arc<AtomicBool>,
    }

    impl FrameRunner for CountingRunner {
        fn name(&self) -> &str {
            "counting"
        }
        fn run(&mut self, _frame: &mut DataFrame) -> bool {
            self.calls.store(true, Ordering::SeqCst);
            true
        }
    }

    struct FailingRunner;

    impl FrameRunner for FailingRunner {
        fn name(&self) -> &str {
            "failing"
        }
        fn run(&mut self, _frame: &mut DataFrame) -> bool {
            false
        }
    }

    fn one_row_frame() -> DataFrame {
        let mut frame = DataFrame::new();
        let mut x = Column::scalar(Encoding::scalar(ElementType::F64).with_roles(role::X));
        x.push_scalar(1.0);
        frame.add_column("x", x).unwrap();
        frame
    }

    #[test]
    fn drains_runners_in_order_and_stops_on_sentinel() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let active = Arc::new(AtomicBool::new(true));
        let scheduler = Scheduler::new(rx, active, SamplerConfig::default().with_sys_timeout(Duration::from_millis(50)));

        let called = Arc::new(AtomicBool::new(false));
        tx.send(Some(Box::new(CountingRunner { calls: called.clone() }) as Box<dyn FrameRunner>)).unwrap();
        tx.send(None).unwrap();

        let mut frame = one_row_frame();
        scheduler.drain(&mut frame).unwrap();
        assert!(called.load(Ordering::SeqCst));
    }

    #[test]
    fn fatal_runner_error_marks_inactive_and_propagates() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let active = Arc::new(AtomicBool::new(true));
        let scheduler = Scheduler::new(rx, active.clone(), SamplerConfig::default().with_sys_timeout(Duration::from_millis(50)));

        tx.send(Some(Box::new(FailingRunner) as Box<dyn FrameRunner>)).unwrap();

        let mut frame = one_row_frame();
        let result = scheduler.drain(&mut frame);
        assert!(matches!(result, Err(Error::RunnerError { .. })));
        assert!(!active.load(Ordering::SeqCst));
    }
}
