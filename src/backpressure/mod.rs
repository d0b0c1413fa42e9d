//! Adaptive backpressure controller
//!
//! Protects the host by advising the queue dispatcher of an inter-task
//! delay. Pressure is the worst of four normalized readings (queue fill,
//! RSS, CPU proxy, rolling error rate); a two-threshold hysteresis keeps
//! the controller from flapping. The controller only advises; the
//! dispatcher decides when to consult it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sysinfo::{Pid, ProcessRefreshKind, RefreshKind, System};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Controller configuration
#[derive(Debug, Clone)]
pub struct BackpressureConfig {
    /// Master switch; disabled means every advised delay is zero
    pub enabled: bool,
    /// Queue length treated as 100% pressure
    pub max_queue: usize,
    /// RSS treated as 100% memory pressure (MB)
    pub max_memory_mb: f64,
    /// CPU percentage treated as 100% pressure
    pub max_cpu_percent: f64,
    /// Rolling error rate treated as 100% pressure
    pub max_error_rate: f64,
    /// Pressure at which the controller activates
    pub activation_threshold: f64,
    /// Pressure at which the controller deactivates
    pub deactivation_threshold: f64,
    /// Smallest non-zero advised delay
    pub min_delay: Duration,
    /// Largest advised delay
    pub max_delay: Duration,
    /// Exponential growth base for the delay curve
    pub growth: f64,
    /// Sliding window for the error rate
    pub error_window: Duration,
    /// Sampler interval
    pub sample_interval: Duration,
    /// How long the critical state may persist before the run aborts
    pub critical_abort_window: Duration,
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_queue: 1000,
            max_memory_mb: 2048.0,
            max_cpu_percent: 90.0,
            max_error_rate: 0.5,
            activation_threshold: 0.85,
            deactivation_threshold: 0.65,
            min_delay: Duration::from_millis(25),
            max_delay: Duration::from_secs(5),
            growth: 1.6,
            error_window: Duration::from_secs(60),
            sample_interval: Duration::from_secs(1),
            critical_abort_window: Duration::from_secs(60),
        }
    }
}

impl BackpressureConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

/// One reading of the pressure inputs
#[derive(Debug, Clone, Copy, Default)]
pub struct PressureSample {
    pub queue_len: usize,
    pub rss_mb: f64,
    pub cpu_percent: f64,
    pub error_rate: f64,
}

/// State transitions and threshold crossings the controller reports
#[derive(Debug, Clone, PartialEq)]
pub enum BackpressureEvent {
    Activated { pressure: f64 },
    Deactivated { pressure: f64 },
    MemoryWarning { rss_mb: f64 },
    MemoryCritical { rss_mb: f64 },
}

#[derive(Debug)]
struct ControllerState {
    active: bool,
    current_delay_ms: f64,
    memory_warned: bool,
    memory_critical: bool,
    critical_since: Option<Instant>,
}

/// The backpressure controller. Thread-safe; shared between the sampler
/// task and the queue dispatcher.
pub struct BackpressureController {
    config: BackpressureConfig,
    state: Mutex<ControllerState>,
    queue_len: AtomicUsize,
    error_window: Mutex<VecDeque<(Instant, bool)>>,
    peak_rss_mb: AtomicU64,
}

impl BackpressureController {
    pub fn new(config: BackpressureConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ControllerState {
                active: false,
                current_delay_ms: 0.0,
                memory_warned: false,
                memory_critical: false,
                critical_since: None,
            }),
            queue_len: AtomicUsize::new(0),
            error_window: Mutex::new(VecDeque::new()),
            peak_rss_mb: AtomicU64::new(0),
        }
    }

    /// Current advised inter-dispatch delay. Zero when disabled or
    /// inactive.
    pub fn current_delay(&self) -> Duration {
        if !self.config.enabled {
            return Duration::ZERO;
        }
        let state = self.state.lock().unwrap();
        if state.active {
            Duration::from_millis(state.current_delay_ms as u64)
        } else {
            Duration::ZERO
        }
    }

    pub fn is_active(&self) -> bool {
        self.config.enabled && self.state.lock().unwrap().active
    }

    /// Highest RSS seen by the sampler, in MB.
    pub fn peak_rss_mb(&self) -> f64 {
        self.peak_rss_mb.load(Ordering::Relaxed) as f64
    }

    /// The dispatcher reports queue length after each enqueue/dispatch.
    pub fn note_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// The dispatcher reports each terminal item for the error window.
    pub fn note_item(&self, failed: bool) {
        let mut window = self.error_window.lock().unwrap();
        let now = Instant::now();
        window.push_back((now, failed));
        let horizon = self.config.error_window;
        while window
            .front()
            .is_some_and(|(t, _)| now.duration_since(*t) > horizon)
        {
            window.pop_front();
        }
    }

    fn rolling_error_rate(&self) -> f64 {
        let window = self.error_window.lock().unwrap();
        if window.is_empty() {
            return 0.0;
        }
        let failures = window.iter().filter(|(_, failed)| *failed).count();
        failures as f64 / window.len() as f64
    }

    /// Overall pressure: the worst of the normalized factors.
    fn pressure(&self, sample: &PressureSample) -> f64 {
        let queue = sample.queue_len as f64 / self.config.max_queue.max(1) as f64;
        let memory = sample.rss_mb / self.config.max_memory_mb;
        let cpu = sample.cpu_percent / self.config.max_cpu_percent;
        let errors = sample.error_rate / self.config.max_error_rate;
        queue.max(memory).max(cpu).max(errors).clamp(0.0, 1.5)
    }

    /// Feed one sample through the state machine. Returns any events the
    /// crossing produced; the caller decides how to surface them.
    pub fn observe(&self, sample: PressureSample) -> Vec<BackpressureEvent> {
        if !self.config.enabled {
            return Vec::new();
        }

        let pressure = self.pressure(&sample);
        let mut events = Vec::new();
        let mut state = self.state.lock().unwrap();

        if !state.active && pressure >= self.config.activation_threshold {
            state.active = true;
            state.current_delay_ms = self.config.min_delay.as_millis() as f64;
            events.push(BackpressureEvent::Activated { pressure });
        } else if state.active && pressure <= self.config.deactivation_threshold {
            state.active = false;
            state.current_delay_ms = 0.0;
            events.push(BackpressureEvent::Deactivated { pressure });
        }

        if state.active {
            let min = self.config.min_delay.as_millis() as f64;
            let max = self.config.max_delay.as_millis() as f64;
            let target = (min * self.config.growth.powf(10.0 * pressure)).clamp(min, max);
            state.current_delay_ms = 0.7 * state.current_delay_ms + 0.3 * target;
        }

        // Memory thresholds are edge-triggered.
        let warn_at = self.config.max_memory_mb * 0.8;
        let critical_at = self.config.max_memory_mb * 0.95;
        if sample.rss_mb >= critical_at {
            if !state.memory_critical {
                state.memory_critical = true;
                events.push(BackpressureEvent::MemoryCritical {
                    rss_mb: sample.rss_mb,
                });
            }
        } else {
            state.memory_critical = false;
            if sample.rss_mb >= warn_at {
                if !state.memory_warned {
                    state.memory_warned = true;
                    events.push(BackpressureEvent::MemoryWarning {
                        rss_mb: sample.rss_mb,
                    });
                }
            } else {
                state.memory_warned = false;
            }
        }

        // The critical window drives the graceful-abort decision.
        let critical_now = state.memory_critical || pressure >= 1.0;
        match (critical_now, state.critical_since) {
            (true, None) => state.critical_since = Some(Instant::now()),
            (false, Some(_)) => state.critical_since = None,
            _ => {}
        }

        events
    }

    /// Whether the run should abort: the critical state has persisted
    /// past the configured window without relief.
    pub fn should_abort(&self) -> bool {
        if !self.config.enabled {
            return false;
        }
        self.state
            .lock()
            .unwrap()
            .critical_since
            .is_some_and(|since| since.elapsed() > self.config.critical_abort_window)
    }

    /// Spawn the sampler task: reads RSS and CPU via sysinfo, merges in
    /// the dispatcher-reported queue length and error rate, and feeds the
    /// state machine. Returns immediately when disabled.
    pub fn spawn_sampler(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if !self.config.enabled {
            return None;
        }

        let controller = Arc::clone(self);
        let interval = self.config.sample_interval;
        Some(tokio::spawn(async move {
            let pid = Pid::from_u32(std::process::id());
            let refresh = RefreshKind::new()
                .with_processes(ProcessRefreshKind::new().with_memory().with_cpu());
            let mut system = System::new_with_specifics(refresh);
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                system.refresh_processes_specifics(
                    ProcessRefreshKind::new().with_memory().with_cpu(),
                );

                let (rss_mb, cpu_percent) = match system.process(pid) {
                    Some(process) => (
                        process.memory() as f64 / 1_000_000.0,
                        process.cpu_usage() as f64,
                    ),
                    None => (0.0, 0.0),
                };

                let peak = controller.peak_rss_mb.load(Ordering::Relaxed);
                if rss_mb as u64 > peak {
                    controller.peak_rss_mb.store(rss_mb as u64, Ordering::Relaxed);
                }

                let sample = PressureSample {
                    queue_len: controller.queue_len.load(Ordering::Relaxed),
                    rss_mb,
                    cpu_percent,
                    error_rate: controller.rolling_error_rate(),
                };

                for event in controller.observe(sample) {
                    match event {
                        BackpressureEvent::Activated { pressure } => {
                            info!("Backpressure activated (pressure {:.2})", pressure);
                        }
                        BackpressureEvent::Deactivated { pressure } => {
                            info!("Backpressure deactivated (pressure {:.2})", pressure);
                        }
                        BackpressureEvent::MemoryWarning { rss_mb } => {
                            warn!("Memory warning: RSS {:.0} MB", rss_mb);
                        }
                        BackpressureEvent::MemoryCritical { rss_mb } => {
                            warn!("Memory critical: RSS {:.0} MB", rss_mb);
                        }
                    }
                }

                debug!(
                    "Pressure sample: rss {:.0} MB, cpu {:.0}%, queue {}",
                    rss_mb,
                    cpu_percent,
                    controller.queue_len.load(Ordering::Relaxed)
                );
            }
        }))
    }
}
