//! Simulated broadcast network with seeded latency and packet loss.
//!
//! Every actor can reach every other one. Draws come from the caller's
//! generator, so a fixed seed gives a fixed delivery schedule.

use {
    crate::{
        config::NetworkConfig,
        message::Envelope,
        scheduler::{Scheduler, SimEvent},
    },
    log::*,
    rand::Rng,
    rand_chacha::ChaCha8Rng,
    tendersim_consensus_bft::NodeId,
};

/// Delivery counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NetworkStats {
    /// Envelopes scheduled for delivery.
    pub messages_sent: u64,
    /// Envelopes dropped by packet loss.
    pub messages_dropped_loss: u64,
}

impl NetworkStats {
    /// Share of envelopes that were scheduled rather than dropped.
    pub fn delivery_rate(&self) -> f64 {
        let total = self.messages_sent + self.messages_dropped_loss;
        if total == 0 {
            1.0
        } else {
            self.messages_sent as f64 / total as f64
        }
    }
}

#[derive(Debug)]
pub struct SimulatedNetwork {
    config: NetworkConfig,
    stats: NetworkStats,
}

impl SimulatedNetwork {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            stats: NetworkStats::default(),
        }
    }

    /// Whether the next packet is lost.
    pub fn should_drop_packet(&self, rng: &mut ChaCha8Rng) -> bool {
        self.config.packet_loss_rate > 0.0 && rng.random::<f64>() < self.config.packet_loss_rate
    }

    /// Latency in ticks, uniform over the configured range.
    pub fn sample_latency(&self, rng: &mut ChaCha8Rng) -> u64 {
        rng.random_range(self.config.min_latency..=self.config.max_latency)
    }

    /// `None` if the packet is dropped, otherwise its latency.
    pub fn should_deliver(&self, rng: &mut ChaCha8Rng) -> Option<u64> {
        if self.should_drop_packet(rng) {
            return None;
        }
        Some(self.sample_latency(rng))
    }

    /// Schedule delivery of `envelope` from `from` to `to`, unless lost.
    pub fn send(
        &mut self,
        scheduler: &mut Scheduler,
        rng: &mut ChaCha8Rng,
        from: NodeId,
        to: NodeId,
        envelope: Envelope,
    ) {
        match self.should_deliver(rng) {
            Some(latency) => {
                scheduler.schedule_once(SimEvent::Deliver { from, to, envelope }, latency);
                self.stats.messages_sent += 1;
            }
            None => {
                trace!("{from} -> {to}: dropped {envelope}");
                self.stats.messages_dropped_loss += 1;
            }
        }
    }

    pub fn set_packet_loss_rate(&mut self, rate: f64) {
        self.config.packet_loss_rate = rate.clamp(0.0, 1.0);
    }

    pub fn packet_loss_rate(&self) -> f64 {
        self.config.packet_loss_rate
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }
}
