//! Simulated advertisement loss.
//!
//! Wraps any channel and silently discards outgoing datagrams according to a
//! drop policy. A dropped send still reports success, exactly like a UDP
//! datagram lost on the wire.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rand::Rng;

use crate::observability::metrics;
use crate::routing::channel::{AdvertisementChannel, ChannelError, Datagram};

pub trait DropPolicy: Send + Sync + 'static {
    fn should_drop(&self, target: SocketAddr) -> bool;
}

#[derive(Debug, Default)]
pub struct NeverDrop;

impl DropPolicy for NeverDrop {
    #[inline]
    fn should_drop(&self, _target: SocketAddr) -> bool {
        false
    }
}

/// Drops 1 datagram every `factor` sends. A factor of 0 drops nothing.
#[derive(Debug)]
pub struct DropFactor {
    factor: usize,
    count: AtomicUsize,
}

impl DropFactor {
    pub fn new(factor: usize) -> Self {
        Self {
            factor,
            count: AtomicUsize::new(0),
        }
    }
}

impl DropPolicy for DropFactor {
    #[inline]
    fn should_drop(&self, _target: SocketAddr) -> bool {
        if self.factor == 0 {
            return false;
        }
        let count = self.count.fetch_add(1, Ordering::Relaxed);
        count % self.factor == 0
    }
}

/// Drops each datagram independently with probability `rate`.
#[derive(Debug)]
pub struct RandomDrop {
    rate: f64,
}

impl RandomDrop {
    pub fn new(rate: f64) -> Self {
        Self {
            rate: rate.clamp(0.0, 1.0),
        }
    }
}

impl DropPolicy for RandomDrop {
    fn should_drop(&self, _target: SocketAddr) -> bool {
        rand::thread_rng().gen_bool(self.rate)
    }
}

/// Pick a policy from router settings. A deterministic factor wins over a random rate.
pub fn policy_for(drop_every: usize, loss_rate: f64) -> Box<dyn DropPolicy> {
    if drop_every > 0 {
        Box::new(DropFactor::new(drop_every))
    } else if loss_rate > 0.0 {
        Box::new(RandomDrop::new(loss_rate))
    } else {
        Box::new(NeverDrop)
    }
}

/// Channel decorator applying a `DropPolicy` to outgoing datagrams.
pub struct LossyChannel<C> {
    inner: C,
    policy: Box<dyn DropPolicy>,
}

impl<C: AdvertisementChannel> LossyChannel<C> {
    pub fn new(inner: C, policy: Box<dyn DropPolicy>) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<C: AdvertisementChannel> AdvertisementChannel for LossyChannel<C> {
    async fn send_to(&self, payload: &[u8], target: SocketAddr) -> Result<(), ChannelError> {
        if self.policy.should_drop(target) {
            tracing::trace!(target = %target, bytes = payload.len(), "Advertisement dropped");
            metrics::record_advertisement_dropped();
            return Ok(());
        }
        self.inner.send_to(payload, target).await
    }

    async fn recv(&self) -> Result<Datagram, ChannelError> {
        self.inner.recv().await
    }

    fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::channel::MemoryNetwork;

    fn target() -> SocketAddr {
        "127.0.0.1:9".parse().unwrap()
    }

    #[test]
    fn drop_rate() {
        // drop 20% of datagrams, or once every 5.
        let dropper = DropFactor::new(5);

        let iters = 1_000_000;
        let dropped = (0..iters).filter(|_| dropper.should_drop(target())).count();

        assert_eq!(dropped as f64, (iters as f64 * 0.2).floor());
    }

    #[test]
    fn zero_factor_never_drops() {
        let dropper = DropFactor::new(0);
        assert!((0..1000).all(|_| !dropper.should_drop(target())));
    }

    #[test]
    fn random_drop_extremes() {
        let never = RandomDrop::new(0.0);
        let always = RandomDrop::new(1.0);
        assert!((0..1000).all(|_| !never.should_drop(target())));
        assert!((0..1000).all(|_| always.should_drop(target())));
    }

    #[tokio::test]
    async fn lossy_channel_drops_silently() {
        let network = MemoryNetwork::new();
        let sender = LossyChannel::new(
            network.attach("127.0.0.1:7101".parse().unwrap()),
            Box::new(DropFactor::new(2)),
        );
        let receiver = network.attach("127.0.0.1:7102".parse().unwrap());

        for i in 0..4u8 {
            sender.send_to(&[i], receiver.local_addr()).await.unwrap();
        }

        // sends 0 and 2 are dropped
        assert_eq!(receiver.try_recv().map(|d| d.payload), Some(vec![1]));
        assert_eq!(receiver.try_recv().map(|d| d.payload), Some(vec![3]));
        assert!(receiver.try_recv().is_none());
    }
}
