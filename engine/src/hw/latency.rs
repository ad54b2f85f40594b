use std::time::Duration;

/// Device buffer length, in frames, that covers `latency` at `rate`.
pub fn latency_frames(latency: Duration, rate: f64) -> usize {
    ((latency.as_secs_f64() * rate).round() as usize).max(1)
}

pub fn frames_latency(frames: usize, rate: f64) -> Duration {
    if rate <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(frames as f64 / rate)
}
