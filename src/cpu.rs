//! Thread count hint for whisper inference

use std::fs;
use std::io;
use std::path::Path;

use log::debug;
use once_cell::sync::Lazy;

use crate::error::Result;

/// Whisper never gets fewer worker threads than this.
pub const MIN_THREADS: usize = 2;

/// Logical cores left free for the rest of the system on the fallback path.
const FALLBACK_RESERVED_CORES: usize = 4;

const CPUINFO_PATH: &str = "/proc/cpuinfo";
const CPU_SYSFS_DIR: &str = "/sys/devices/system/cpu";

static HIGH_PERF_CORES: Lazy<std::result::Result<usize, String>> =
    Lazy::new(|| high_perf_cpu_count().map_err(|e| e.to_string()));

/// Preferred `n_threads` for whisper: the number of high-performance cores,
/// or logical cores minus four when topology can't be read. Always >= 2.
pub fn preferred_thread_count() -> usize {
    let logical = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let high_perf = HIGH_PERF_CORES.as_ref().map(|n| *n).map_err(|e| e.as_str());
    thread_count_from(high_perf, logical)
}

pub fn thread_count_from(
    high_perf: std::result::Result<usize, &str>,
    logical_cores: usize,
) -> usize {
    match high_perf {
        Ok(count) => {
            debug!("High-perf CPUs: {}", count);
            count.max(MIN_THREADS)
        }
        Err(reason) => {
            debug!("Fallback thread count ({})", reason);
            logical_cores
                .saturating_sub(FALLBACK_RESERVED_CORES)
                .max(MIN_THREADS)
        }
    }
}

/// Counts the cores that are faster than the slowest cluster, trying
/// max frequencies first and `CPU variant` second.
pub fn high_perf_cpu_count() -> Result<usize> {
    high_perf_cpu_count_at(Path::new(CPU_SYSFS_DIR), Path::new(CPUINFO_PATH))
}

fn high_perf_cpu_count_at(cpu_dir: &Path, cpuinfo_path: &Path) -> Result<usize> {
    match read_max_frequencies(cpu_dir).and_then(|freqs| count_dropping_min(&freqs)) {
        Ok(count) => Ok(count),
        Err(e) => {
            debug!("CPU frequencies unavailable ({}), reading variants", e);
            let info = fs::read_to_string(cpuinfo_path)?;
            count_dropping_min(&parse_cpu_variants(&info))
        }
    }
}

/// Per-core `CPU variant` values from `/proc/cpuinfo` (ARM only).
pub fn parse_cpu_variants(cpuinfo: &str) -> Vec<u64> {
    cpuinfo
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            if key.trim() != "CPU variant" {
                return None;
            }
            let value = value.trim();
            let digits = value
                .strip_prefix("0x")
                .or_else(|| value.strip_prefix("0X"))
                .unwrap_or(value);
            u64::from_str_radix(digits, 16).ok()
        })
        .collect()
}

/// `cpuinfo_max_freq` of every `cpuN` directory under `cpu_dir`.
pub fn read_max_frequencies(cpu_dir: &Path) -> Result<Vec<u64>> {
    let mut freqs = Vec::new();
    for entry in fs::read_dir(cpu_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let is_core = name
            .strip_prefix("cpu")
            .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()));
        if !is_core {
            continue;
        }
        let freq_file = entry.path().join("cpufreq").join("cpuinfo_max_freq");
        if let Ok(raw) = fs::read_to_string(&freq_file) {
            if let Ok(freq) = raw.trim().parse::<u64>() {
                freqs.push(freq);
            }
        }
    }
    Ok(freqs)
}

/// Number of values strictly above the minimum. Empty input is an error.
pub fn count_dropping_min(values: &[u64]) -> Result<usize> {
    let min = values
        .iter()
        .min()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no CPU topology values"))?;
    Ok(values.iter().filter(|v| *v > min).count())
}
