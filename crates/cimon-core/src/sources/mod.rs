//! Built-in data-source implementations.

pub mod helpers;

pub mod battery;
pub mod cpu;
pub mod location;
pub mod memory;
pub mod motion;
pub mod network;
pub mod orientation;
pub mod provider;
pub mod screen;

use crate::source::DataSource;

/// All platform-backed source constructors. Each returns a boxed source.
///
/// Content-log sources (SMS, MMS, call log, browser history) are not
/// included: they need a [`provider::RowProvider`] supplied by the
/// embedder.
pub fn platform_sources() -> Vec<Box<dyn DataSource>> {
    vec![
        // Poll-driven
        Box::new(battery::BatterySource::new()),
        Box::new(cpu::CpuLoadSource::new()),
        Box::new(memory::MemInfoSource::new()),
        Box::new(network::NetTrafficSource::new()),
        Box::new(location::LocationSource::new()),
        // Sensor-callback-driven
        Box::new(motion::VectorSensorSource::accelerometer()),
        Box::new(motion::VectorSensorSource::gyroscope()),
        Box::new(motion::VectorSensorSource::magnetometer()),
        Box::new(motion::VectorSensorSource::linear_acceleration()),
        Box::new(orientation::OrientationSource::new()),
        // Broadcast-driven
        Box::new(screen::ScreenSource::new()),
    ]
}
