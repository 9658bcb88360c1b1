//! Background tick thread for hosts without a frame loop of their own.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::DriverError;
use crate::scheduler::RequestScheduler;

#[derive(Debug)]
pub struct DispatchDriver {
    scheduler: Arc<RequestScheduler>,
    tick_interval: Duration,
    thread_name: String,
    running: Arc<AtomicBool>,
    stop_tx: Option<mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl DispatchDriver {
    pub fn new(scheduler: Arc<RequestScheduler>) -> Self {
        let tick_interval = scheduler.config().tick_interval;
        Self {
            scheduler,
            tick_interval,
            thread_name: "agent-dispatch".to_string(),
            running: Arc::new(AtomicBool::new(false)),
            stop_tx: None,
            worker: None,
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn start(&mut self) -> Result<(), DriverError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(DriverError::AlreadyRunning);
        }

        let tick_interval = self.tick_interval.max(Duration::from_millis(1));
        let scheduler = Arc::clone(&self.scheduler);
        let running = Arc::clone(&self.running);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let worker = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(tick_interval) {
                        Ok(()) => break,
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            scheduler.run_one_cycle();
                        }
                        Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    }
                }
                running.store(false, Ordering::SeqCst);
            })
            .map_err(|err| {
                self.running.store(false, Ordering::SeqCst);
                DriverError::ThreadSpawnFailed {
                    reason: err.to_string(),
                }
            })?;

        tracing::info!(
            thread = %self.thread_name,
            tick_ms = tick_interval.as_millis() as u64,
            "dispatch driver started"
        );
        self.stop_tx = Some(stop_tx);
        self.worker = Some(worker);
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), DriverError> {
        if !self.running.load(Ordering::SeqCst) && self.worker.is_none() {
            return Err(DriverError::NotRunning);
        }
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(worker) = self.worker.take() {
            worker.join().map_err(|_| DriverError::ThreadJoinFailed)?;
        }
        self.running.store(false, Ordering::SeqCst);
        tracing::info!(thread = %self.thread_name, "dispatch driver stopped");
        Ok(())
    }
}

impl Drop for DispatchDriver {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use serde_json::json;

    #[test]
    fn driver_resolves_synchronous_submissions() {
        let scheduler = Arc::new(RequestScheduler::new(SchedulerConfig::default()));
        let mut driver = DispatchDriver::new(Arc::clone(&scheduler))
            .with_tick_interval(Duration::from_millis(2));
        driver.start().expect("start driver");

        let value = scheduler
            .submit_and_wait("agent-a", "gameobject/create", || {
                Ok::<_, String>(json!({"created": "Cube"}))
            })
            .expect("request result");
        assert_eq!(value, json!({"created": "Cube"}));

        driver.stop().expect("stop driver");
        assert!(!driver.is_running());
        assert!(scheduler.get_queue_info().tick_count > 0);
    }

    #[test]
    fn driver_rejects_double_start_and_stop() {
        let scheduler = Arc::new(RequestScheduler::default());
        let mut driver = DispatchDriver::new(scheduler).with_thread_name("dispatch-test");
        assert_eq!(driver.stop(), Err(DriverError::NotRunning));
        driver.start().expect("start driver");
        assert_eq!(driver.start(), Err(DriverError::AlreadyRunning));
        driver.stop().expect("stop driver");
        assert_eq!(driver.stop(), Err(DriverError::NotRunning));
    }
}
