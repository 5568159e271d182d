// In-process stream network
//
// Streams live in a shared registry for as long as their outlet exists.
// Every inlet gets its own unbounded queue so samples are delivered in push
// order and a slow reader never blocks the writer. Dropping the outlet
// unregisters the stream and disconnects its inlets once they are drained.

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::transport::{Inlet, Outlet, Transport};
use crate::types::{RawSample, SampleData, StreamInfo, TransportError};

#[derive(Clone)]
pub struct LocalNetwork {
    registry: Arc<Registry>,
}

struct Registry {
    streams: Mutex<Vec<Arc<LocalStream>>>,
    changed: Condvar,
    next_id: AtomicU64,
    epoch: Instant,
}

struct LocalStream {
    id: u64,
    info: StreamInfo,
    inlets: Mutex<Vec<Sender<RawSample>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                streams: Mutex::new(Vec::new()),
                changed: Condvar::new(),
                next_id: AtomicU64::new(1),
                epoch: Instant::now(),
            }),
        }
    }

    /// Names of all currently advertised streams.
    pub fn stream_names(&self) -> Vec<String> {
        lock(&self.registry.streams)
            .iter()
            .map(|s| s.info.name.clone())
            .collect()
    }

    fn matching(streams: &[Arc<LocalStream>], name: &str) -> Vec<StreamInfo> {
        streams
            .iter()
            .filter(|s| s.info.name == name)
            .map(|s| s.info.clone())
            .collect()
    }
}

impl Default for LocalNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for LocalNetwork {
    fn resolve(&self, name: &str, timeout: Duration) -> Result<Vec<StreamInfo>, TransportError> {
        // A timeout past the end of the clock waits without a deadline.
        let deadline = Instant::now().checked_add(timeout);
        let mut streams = lock(&self.registry.streams);
        loop {
            let found = Self::matching(&streams, name);
            if !found.is_empty() || timeout.is_zero() {
                return Ok(found);
            }
            streams = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(TransportError::Timeout);
                    }
                    self.registry
                        .changed
                        .wait_timeout(streams, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .registry
                    .changed
                    .wait(streams)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    fn open_inlet(&self, info: &StreamInfo) -> Result<Box<dyn Inlet>, TransportError> {
        let streams = lock(&self.registry.streams);
        let stream = streams
            .iter()
            .find(|s| s.info.name == info.name && s.info.source_id == info.source_id)
            .ok_or(TransportError::Lost)?;
        let (tx, rx) = unbounded();
        lock(&stream.inlets).push(tx);
        Ok(Box::new(LocalInlet {
            info: stream.info.clone(),
            rx,
        }))
    }

    fn open_outlet(&self, info: StreamInfo) -> Result<Box<dyn Outlet>, TransportError> {
        if info.name.is_empty() {
            return Err(TransportError::Rejected("stream name is empty".into()));
        }
        if info.channel_count == 0 {
            return Err(TransportError::Rejected("stream has no channels".into()));
        }
        let stream = Arc::new(LocalStream {
            id: self.registry.next_id.fetch_add(1, Ordering::Relaxed),
            info,
            inlets: Mutex::new(Vec::new()),
        });
        lock(&self.registry.streams).push(Arc::clone(&stream));
        self.registry.changed.notify_all();
        log::debug!("Local stream '{}' advertised", stream.info.name);
        Ok(Box::new(LocalOutlet {
            stream,
            registry: Arc::clone(&self.registry),
        }))
    }

    fn local_clock(&self) -> f64 {
        self.registry.epoch.elapsed().as_secs_f64()
    }
}

struct LocalInlet {
    info: StreamInfo,
    rx: Receiver<RawSample>,
}

impl Inlet for LocalInlet {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn try_pull(&mut self) -> Result<Option<RawSample>, TransportError> {
        match self.rx.try_recv() {
            Ok(sample) => Ok(Some(sample)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TransportError::Lost),
        }
    }
}

struct LocalOutlet {
    stream: Arc<LocalStream>,
    registry: Arc<Registry>,
}

impl Outlet for LocalOutlet {
    fn info(&self) -> &StreamInfo {
        &self.stream.info
    }

    fn push(&self, data: SampleData, timestamp: f64) -> Result<(), TransportError> {
        let info = &self.stream.info;
        if data.format() != info.channel_format {
            return Err(TransportError::Rejected(format!(
                "expected {:?} sample, got {:?}",
                info.channel_format,
                data.format()
            )));
        }
        if data.len() != info.channel_count {
            return Err(TransportError::Rejected(format!(
                "expected {} channels, got {}",
                info.channel_count,
                data.len()
            )));
        }
        let sample = RawSample { data, timestamp };
        // Inlets that were dropped are pruned here.
        lock(&self.stream.inlets).retain(|tx| tx.send(sample.clone()).is_ok());
        Ok(())
    }
}

impl Drop for LocalOutlet {
    fn drop(&mut self) {
        lock(&self.registry.streams).retain(|s| s.id != self.stream.id);
        lock(&self.stream.inlets).clear();
        self.registry.changed.notify_all();
        log::debug!("Local stream '{}' withdrawn", self.stream.info.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn snapshot_resolve_of_unknown_name_is_empty() {
        let net = LocalNetwork::new();
        assert!(net.resolve("missing", Duration::ZERO).unwrap().is_empty());
    }

    #[test]
    fn waiting_resolve_times_out() {
        let net = LocalNetwork::new();
        let err = net.resolve("missing", Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, TransportError::Timeout));
    }

    #[test]
    fn waiting_resolve_wakes_when_stream_appears() {
        let net = LocalNetwork::new();
        let publisher = net.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            publisher
                .open_outlet(StreamInfo::numeric("late", 2, 100.0))
                .unwrap()
        });
        let found = net.resolve("late", Duration::from_secs(5)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].channel_count, 2);
        drop(handle.join().unwrap());
    }

    #[test]
    fn unbounded_timeout_resolves_without_overflow() {
        let net = LocalNetwork::new();
        let publisher = net.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            publisher
                .open_outlet(StreamInfo::numeric("forever", 1, 0.0))
                .unwrap()
        });
        let found = net.resolve("forever", Duration::MAX).unwrap();
        assert_eq!(found.len(), 1);
        drop(handle.join().unwrap());
    }

    #[test]
    fn samples_fan_out_to_every_inlet_in_order() {
        let net = LocalNetwork::new();
        let outlet = net.open_outlet(StreamInfo::numeric("fb", 1, 0.0)).unwrap();
        let info = net.resolve("fb", Duration::ZERO).unwrap().remove(0);
        let mut a = net.open_inlet(&info).unwrap();
        let mut b = net.open_inlet(&info).unwrap();

        outlet.push(SampleData::Float32(vec![1.0]), 0.1).unwrap();
        outlet.push(SampleData::Float32(vec![2.0]), 0.2).unwrap();

        for inlet in [&mut a, &mut b] {
            assert_eq!(inlet.try_pull().unwrap().unwrap().timestamp, 0.1);
            assert_eq!(inlet.try_pull().unwrap().unwrap().timestamp, 0.2);
            assert!(inlet.try_pull().unwrap().is_none());
        }
    }

    #[test]
    fn outlet_rejects_wrong_width_and_format() {
        let net = LocalNetwork::new();
        let outlet = net.open_outlet(StreamInfo::numeric("fb", 2, 0.0)).unwrap();
        assert!(outlet.push(SampleData::Float32(vec![1.0]), 0.0).is_err());
        assert!(outlet.push(SampleData::Text(vec!["a".into(), "b".into()]), 0.0).is_err());
    }

    #[test]
    fn dropping_outlet_disconnects_inlets_after_drain() {
        let net = LocalNetwork::new();
        let outlet = net.open_outlet(StreamInfo::numeric("fb", 1, 0.0)).unwrap();
        let info = net.resolve("fb", Duration::ZERO).unwrap().remove(0);
        let mut inlet = net.open_inlet(&info).unwrap();
        outlet.push(SampleData::Float32(vec![1.0]), 0.0).unwrap();
        drop(outlet);

        assert!(net.stream_names().is_empty());
        assert!(inlet.try_pull().unwrap().is_some());
        assert!(matches!(inlet.try_pull(), Err(TransportError::Lost)));
    }
}
