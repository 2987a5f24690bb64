// Convert a raw Docker stats API response into a resource sample.

use crate::models::ContainerStatsSample;
use bollard::models::ContainerStatsResponse;

/// Derive CPU and memory figures from a one-shot stats response. Returns None
/// when the response is missing the cpu/precpu sections (first sample after a
/// container start can be incomplete).
pub(crate) fn sample_from_response(s: &ContainerStatsResponse) -> Option<ContainerStatsSample> {
    let cpu_stats = s.cpu_stats.as_ref()?;
    let precpu_stats = s.precpu_stats.as_ref()?;

    let cpu_usage = cpu_stats.cpu_usage.as_ref()?;
    let precpu_usage = precpu_stats.cpu_usage.as_ref()?;

    let cpu_delta =
        cpu_usage.total_usage.unwrap_or(0) as i64 - precpu_usage.total_usage.unwrap_or(0) as i64;
    let system_delta = cpu_stats.system_cpu_usage.unwrap_or(0) as i64
        - precpu_stats.system_cpu_usage.unwrap_or(0) as i64;
    let online = cpu_stats.online_cpus.unwrap_or(1) as f64;
    let cpu_percent = if system_delta > 0 && online > 0.0 {
        (cpu_delta as f64 / system_delta as f64) * online * 100.0
    } else {
        0.0
    };

    let memory_usage_bytes = s.memory_stats.as_ref().and_then(|m| m.usage).unwrap_or(0);
    let memory_limit_bytes = s.memory_stats.as_ref().and_then(|m| m.limit).unwrap_or(0);
    let memory_percent = if memory_limit_bytes > 0 {
        (memory_usage_bytes as f64 / memory_limit_bytes as f64) * 100.0
    } else {
        0.0
    };

    Some(ContainerStatsSample {
        cpu_percent,
        memory_usage_bytes,
        memory_limit_bytes,
        memory_percent,
    })
}
