#[cfg(feature = "cli")]
use sysinfo::{Pid, RefreshKind, System};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// 單一階段（read、resolve、populate…）的耗時
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseTiming {
    pub phase: String,
    pub elapsed: Duration,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct SystemStats {
    pub cpu_usage: f32,
    pub memory_usage_mb: u64,
    pub peak_memory_mb: u64,
    pub elapsed_time: Duration,
}

#[cfg(feature = "cli")]
struct ProcessSampler {
    system: Mutex<System>,
    pid: Pid,
    peak_memory: Mutex<u64>,
}

#[cfg(feature = "cli")]
impl ProcessSampler {
    fn new() -> Option<Self> {
        let pid = sysinfo::get_current_pid().ok()?;
        let mut system = System::new_with_specifics(RefreshKind::everything());
        system.refresh_all();

        Some(Self {
            system: Mutex::new(system),
            pid,
            peak_memory: Mutex::new(0),
        })
    }

    fn sample(&self, elapsed_time: Duration) -> Option<SystemStats> {
        let mut system = self.system.lock().ok()?;
        system.refresh_all();

        let process = system.process(self.pid)?;
        let memory_mb = process.memory() / 1024 / 1024;

        let mut peak = self.peak_memory.lock().ok()?;
        if memory_mb > *peak {
            *peak = memory_mb;
        }

        Some(SystemStats {
            cpu_usage: process.cpu_usage(),
            memory_usage_mb: memory_mb,
            peak_memory_mb: *peak,
            elapsed_time,
        })
    }
}

pub struct SystemMonitor {
    enabled: bool,
    start_time: Instant,
    phase_start: Mutex<Instant>,
    timings: Mutex<Vec<PhaseTiming>>,
    #[cfg(feature = "cli")]
    sampler: Option<ProcessSampler>,
}

impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let now = Instant::now();
        Self {
            enabled,
            start_time: now,
            phase_start: Mutex::new(now),
            timings: Mutex::new(Vec::new()),
            #[cfg(feature = "cli")]
            sampler: if enabled { ProcessSampler::new() } else { None },
        }
    }

    /// 結束目前階段並記錄耗時；啟用監控時一併輸出系統狀態
    pub fn finish_phase(&self, phase: &str) -> Duration {
        let now = Instant::now();
        let elapsed = match self.phase_start.lock() {
            Ok(mut start) => {
                let elapsed = now.duration_since(*start);
                *start = now;
                elapsed
            }
            Err(_) => Duration::ZERO,
        };

        if let Ok(mut timings) = self.timings.lock() {
            timings.push(PhaseTiming {
                phase: phase.to_string(),
                elapsed,
            });
        }

        self.log_stats(phase, elapsed);
        elapsed
    }

    pub fn timings(&self) -> Vec<PhaseTiming> {
        self.timings
            .lock()
            .map(|timings| timings.clone())
            .unwrap_or_default()
    }

    #[cfg(feature = "cli")]
    fn log_stats(&self, phase: &str, elapsed: Duration) {
        if !self.enabled {
            return;
        }
        if let Some(stats) = self
            .sampler
            .as_ref()
            .and_then(|sampler| sampler.sample(self.start_time.elapsed()))
        {
            tracing::info!(
                "📊 {} took {:?} - CPU: {:.1}%, Memory: {}MB, Peak: {}MB, Total: {:?}",
                phase,
                elapsed,
                stats.cpu_usage,
                stats.memory_usage_mb,
                stats.peak_memory_mb,
                stats.elapsed_time
            );
        }
    }

    #[cfg(not(feature = "cli"))]
    fn log_stats(&self, phase: &str, elapsed: Duration) {
        if self.enabled {
            tracing::info!("📊 {} took {:?}", phase, elapsed);
        }
    }

    pub fn log_final_stats(&self) {
        if self.enabled {
            tracing::info!("📊 Final Stats - Total Time: {:?}", self.start_time.elapsed());
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}
