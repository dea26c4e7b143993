//! Simulated players for the CLI and tests.
//!
//! Each [`SimulatedStream`] advances its position on [`Simulator::tick`] at its
//! own speed and answers transport requests immediately. Every state change
//! comes back as [`Telemetry`], the same way a real decoder would report.

use log::trace;
use std::time::Duration;

use crate::core::adapter::{Telemetry, TransportRequest};

/// Frame duration used for stepping (25 fps)
pub const FRAME: Duration = Duration::from_millis(40);

#[derive(Clone, Debug, PartialEq)]
pub struct SimulatedStream {
    pub name: String,
    pub length: Duration,
    pub position: Duration,
    pub playing: bool,
    pub speed: f64,
}

impl SimulatedStream {
    pub fn new(name: impl Into<String>, length: Duration) -> Self {
        Self {
            name: name.into(),
            length,
            position: Duration::ZERO,
            playing: false,
            speed: 1.0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Simulator {
    streams: Vec<SimulatedStream>,
}

impl Simulator {
    pub fn new(streams: Vec<SimulatedStream>) -> Self {
        Self { streams }
    }

    pub fn streams(&self) -> &[SimulatedStream] {
        &self.streams
    }

    /// Length telemetry for every stream (sent once after initialize)
    pub fn lengths(&self) -> Vec<Telemetry> {
        self.streams
            .iter()
            .enumerate()
            .map(|(stream, s)| Telemetry::Length {
                stream,
                length: s.length,
            })
            .collect()
    }

    /// Execute one request; returns the resulting telemetry
    pub fn apply(&mut self, index: usize, request: TransportRequest) -> Vec<Telemetry> {
        let Some(s) = self.streams.get_mut(index) else {
            return Vec::new();
        };
        trace!("sim {} <- {:?}", s.name, request);
        match request {
            TransportRequest::Play => {
                s.playing = true;
                Vec::new()
            }
            TransportRequest::Pause => {
                s.playing = false;
                Vec::new()
            }
            TransportRequest::Seek(position) => {
                s.position = position.min(s.length);
                vec![position_of(index, s)]
            }
            TransportRequest::StepFrame(direction) => {
                s.playing = false;
                s.position = if direction < 0 {
                    s.position.saturating_sub(FRAME)
                } else {
                    (s.position + FRAME).min(s.length)
                };
                vec![position_of(index, s)]
            }
            TransportRequest::SetSpeed(speed) => {
                s.speed = speed;
                Vec::new()
            }
        }
    }

    /// Advance playing streams by `dt` wall time
    pub fn tick(&mut self, dt: Duration) -> Vec<Telemetry> {
        let mut out = Vec::new();
        for (index, s) in self.streams.iter_mut().enumerate() {
            if !s.playing {
                continue;
            }
            // Huge ticks saturate instead of overflowing
            let advanced =
                Duration::try_from_secs_f64(dt.as_secs_f64() * s.speed).unwrap_or(Duration::MAX);
            s.position = s.position.saturating_add(advanced).min(s.length);
            out.push(position_of(index, s));
            if s.position >= s.length {
                s.playing = false;
                out.push(Telemetry::Ended { stream: index });
            }
        }
        out
    }
}

fn position_of(stream: usize, s: &SimulatedStream) -> Telemetry {
    Telemetry::Position {
        stream,
        position: s.position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim() -> Simulator {
        Simulator::new(vec![
            SimulatedStream::new("a", Duration::from_secs(10)),
            SimulatedStream::new("b", Duration::from_secs(4)),
        ])
    }

    #[test]
    fn test_tick_advances_at_speed() {
        let mut sim = sim();
        sim.apply(0, TransportRequest::Play);
        sim.apply(0, TransportRequest::SetSpeed(2.0));
        let out = sim.tick(Duration::from_secs(1));
        assert_eq!(
            out,
            vec![Telemetry::Position {
                stream: 0,
                position: Duration::from_secs(2)
            }]
        );
        assert_eq!(sim.streams()[1].position, Duration::ZERO);
    }

    #[test]
    fn test_tick_reports_end() {
        let mut sim = sim();
        sim.apply(1, TransportRequest::Play);
        let out = sim.tick(Duration::from_secs(5));
        assert_eq!(out.last(), Some(&Telemetry::Ended { stream: 1 }));
        assert!(!sim.streams()[1].playing);
        assert_eq!(sim.streams()[1].position, Duration::from_secs(4));
    }

    #[test]
    fn test_huge_tick_saturates() {
        let mut sim = sim();
        sim.apply(0, TransportRequest::SetSpeed(16.0));
        sim.apply(0, TransportRequest::Play);
        sim.tick(Duration::from_secs(1));
        let out = sim.tick(Duration::from_secs_f64(1e19));
        assert_eq!(sim.streams()[0].position, Duration::from_secs(10));
        assert_eq!(out.last(), Some(&Telemetry::Ended { stream: 0 }));

        // Position near Duration::MAX must not overflow either
        let mut sim = Simulator::new(vec![SimulatedStream::new("max", Duration::MAX)]);
        sim.apply(0, TransportRequest::Seek(Duration::MAX - Duration::from_secs(1)));
        sim.apply(0, TransportRequest::Play);
        sim.tick(Duration::from_secs(5));
        assert_eq!(sim.streams()[0].position, Duration::MAX);
    }

    #[test]
    fn test_step_and_seek() {
        let mut sim = sim();
        sim.apply(0, TransportRequest::Play);
        sim.apply(0, TransportRequest::StepFrame(1));
        assert!(!sim.streams()[0].playing);
        assert_eq!(sim.streams()[0].position, FRAME);
        sim.apply(0, TransportRequest::StepFrame(-1));
        sim.apply(0, TransportRequest::StepFrame(-1));
        assert_eq!(sim.streams()[0].position, Duration::ZERO);

        sim.apply(0, TransportRequest::Seek(Duration::from_secs(99)));
        assert_eq!(sim.streams()[0].position, Duration::from_secs(10));
        assert!(sim.apply(7, TransportRequest::Play).is_empty());
    }
}
