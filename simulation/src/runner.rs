//! Deterministic simulation runner.
//!
//! Owns every actor, the scheduler and the network. Events are processed
//! one at a time in `(time, sequence)` order, so a seed fully determines a
//! run.

use {
    crate::{
        client::ClientActor,
        config::SimulationConfig,
        error::Result,
        genesis::GenesisInitiator,
        message::{Envelope, Outbox},
        network::{NetworkStats, SimulatedNetwork},
        scheduler::{Scheduler, SimEvent},
        seed::SeedNode,
        validator::{ValidatorActor, ValidatorOutput},
    },
    log::*,
    rand::{Rng, SeedableRng},
    rand_chacha::ChaCha8Rng,
    std::collections::{BTreeMap, VecDeque},
    tendersim_consensus_bft::{error::EngineError, ConsensusEngine, NodeId, Transaction},
};

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A validator passed the maximum height.
    Halted(NodeId),
    /// The next event lay beyond `max_ticks`.
    MaxTicks,
    /// Nothing was left to do.
    QueueEmpty,
}

/// Counters collected during a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SimulationStats {
    pub events_processed: u64,
    pub timeouts_fired: u64,
    pub blocks_committed: u64,
    /// Events an engine rejected.
    pub engine_errors: u64,
    pub network: NetworkStats,
}

/// Final state of a run, handed to the report.
pub struct SimulationOutcome {
    /// Engines in validator order.
    pub validators: Vec<ConsensusEngine>,
    /// Every transaction sent by a client.
    pub client_transactions: Vec<Transaction>,
    pub stats: SimulationStats,
    pub final_time: u64,
    pub stop_reason: StopReason,
    /// Height of the genesis chain every validator started from.
    pub genesis_height: u64,
}

pub struct Simulation {
    config: SimulationConfig,
    scheduler: Scheduler,
    network: SimulatedNetwork,
    /// Network conditions only. Actors draw from their own generators.
    rng: ChaCha8Rng,
    validators: BTreeMap<NodeId, ValidatorActor>,
    seeds: BTreeMap<NodeId, SeedNode>,
    clients: BTreeMap<NodeId, ClientActor>,
    genesis_height: u64,
    stats: SimulationStats,
    stop_reason: Option<StopReason>,
}

impl Simulation {
    /// Validate `config`, build the genesis chain and create every actor.
    ///
    /// Validators get ids `0..validators`, then seed nodes, then clients,
    /// then late seed nodes.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

        let counts = config.actor_counts()?;
        let seeds_end = counts.validators + counts.seed_nodes;
        let clients_end = seeds_end + counts.clients;
        let validator_ids: Vec<NodeId> = (0..counts.validators).map(NodeId).collect();
        let seed_ids: Vec<NodeId> = (counts.validators..seeds_end).map(NodeId).collect();
        let client_ids = (seeds_end..clients_end).map(NodeId);
        let late_seed_ids = (clients_end..clients_end + counts.late_seed_nodes).map(NodeId);

        let ledger = GenesisInitiator::new(&config.genesis, config.bft.max_block_size)
            .build(&validator_ids, &mut rng)?;
        if ledger.current_height() >= config.bft.max_height {
            warn!(
                "genesis chain height {} already reaches max height {}",
                ledger.current_height(),
                config.bft.max_height
            );
        }

        let validators = validator_ids
            .iter()
            .map(|id| {
                let actor =
                    ValidatorActor::new(config.bft.clone(), *id, ledger.clone(), seed_ids.clone());
                (*id, actor)
            })
            .collect();
        let seeds = seed_ids
            .iter()
            .map(|id| (*id, SeedNode::new(*id)))
            .chain(late_seed_ids.map(|id| (id, SeedNode::late(id, seed_ids.clone()))))
            .collect();
        let clients = client_ids
            .map(|id| {
                let actor = ClientActor::new(
                    id,
                    config.client.clone(),
                    seed_ids.clone(),
                    actor_rng(config.seed, id),
                );
                (id, actor)
            })
            .collect();
        let genesis_height = ledger.current_height();

        Ok(Self {
            network: SimulatedNetwork::new(config.network.clone()),
            config,
            scheduler: Scheduler::new(),
            rng,
            validators,
            seeds,
            clients,
            genesis_height,
            stats: SimulationStats::default(),
            stop_reason: None,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn validator(&self, id: NodeId) -> Option<&ValidatorActor> {
        self.validators.get(&id)
    }

    /// Bootstrap discovery, start every engine at time 0, schedule the late
    /// seed nodes and process events
    /// until a validator halts, `max_ticks` is passed or the queue drains.
    pub fn run(mut self) -> Result<SimulationOutcome> {
        info!(
            "starting simulation: seed={} validators={} seed_nodes={} clients={} max_height={}",
            self.config.seed,
            self.validators.len(),
            self.config.seed_nodes,
            self.clients.len(),
            self.config.bft.max_height
        );
        self.bootstrap();
        self.schedule_late_seeds();

        let ids: Vec<NodeId> = self.validators.keys().copied().collect();
        for id in ids {
            let output = match self.validators.get_mut(&id) {
                Some(validator) => validator.start(0)?,
                None => continue,
            };
            let outbox = self.apply_output(id, output);
            self.send_all(id, outbox);
        }
        for client in self.clients.values_mut() {
            let delay = client.next_delay();
            self.scheduler.schedule_once(
                SimEvent::ClientTick {
                    client: client.id(),
                },
                delay,
            );
        }

        while self.stop_reason.is_none() {
            match self.scheduler.peek_time() {
                None => break,
                Some(time) if time > self.config.max_ticks => {
                    self.stop_reason = Some(StopReason::MaxTicks);
                    break;
                }
                Some(_) => {}
            }
            let Some((_, event)) = self.scheduler.pop_next() else {
                break;
            };
            self.stats.events_processed += 1;
            self.process(event);
        }

        let stop_reason = self.stop_reason.unwrap_or(StopReason::QueueEmpty);
        self.stats.network = self.network.stats().clone();
        info!(
            "simulation stopped at tick {} ({stop_reason:?}) after {} events",
            self.scheduler.now(),
            self.stats.events_processed
        );

        Ok(SimulationOutcome {
            validators: self
                .validators
                .into_values()
                .map(ValidatorActor::into_engine)
                .collect(),
            client_transactions: self
                .clients
                .into_values()
                .flat_map(ClientActor::into_sent)
                .collect(),
            stats: self.stats,
            final_time: self.scheduler.now(),
            stop_reason,
            genesis_height: self.genesis_height,
        })
    }

    /// Each late seed node starts at a random time in the configured range.
    fn schedule_late_seeds(&mut self) {
        let discovery = &self.config.discovery;
        for seed in self.seeds.values().filter(|seed| !seed.is_started()) {
            let delay = actor_rng(self.config.seed, seed.id())
                .random_range(discovery.min_start_delay..=discovery.max_start_delay);
            debug!("{} starts at tick {delay}", seed.id());
            self.scheduler
                .schedule_once(SimEvent::StartSeedNode { node: seed.id() }, delay);
        }
    }

    /// Registrations, then directory requests, dispatched in order at time 0
    /// without going through the network.
    fn bootstrap(&mut self) {
        let mut pending: VecDeque<(NodeId, NodeId, Envelope)> = VecDeque::new();
        for validator in self.validators.values() {
            pending.extend(
                validator
                    .registrations()
                    .into_iter()
                    .map(|(to, envelope)| (validator.id(), to, envelope)),
            );
        }
        for validator in self.validators.values() {
            pending.extend(
                validator
                    .directory_requests()
                    .into_iter()
                    .map(|(to, envelope)| (validator.id(), to, envelope)),
            );
        }
        for client in self.clients.values() {
            pending.extend(
                client
                    .directory_requests()
                    .into_iter()
                    .map(|(to, envelope)| (client.id(), to, envelope)),
            );
        }

        while let Some((from, to, envelope)) = pending.pop_front() {
            let replies = self.dispatch(from, to, envelope, 0);
            pending.extend(replies.into_iter().map(|(next, envelope)| (to, next, envelope)));
        }
        debug!("bootstrap complete");
    }

    fn process(&mut self, event: SimEvent) {
        let now = self.scheduler.now();
        match event {
            SimEvent::Deliver { from, to, envelope } => {
                let outbox = self.dispatch(from, to, envelope, now);
                self.send_all(to, outbox);
            }
            SimEvent::Timeout { node, event } => {
                let result = match self.validators.get_mut(&node) {
                    Some(validator) => validator.on_timeout(event, now),
                    None => return,
                };
                self.stats.timeouts_fired += 1;
                let outbox = self.apply_result(node, result);
                self.send_all(node, outbox);
            }
            SimEvent::ClientTick { client } => {
                let Some(actor) = self.clients.get_mut(&client) else {
                    return;
                };
                let (outbox, more) = actor.on_tick(now);
                if more {
                    let delay = actor.next_delay();
                    self.scheduler
                        .schedule_once(SimEvent::ClientTick { client }, delay);
                }
                self.send_all(client, outbox);
            }
            SimEvent::StartSeedNode { node } => {
                let Some(seed) = self.seeds.get_mut(&node) else {
                    return;
                };
                let outbox = seed.start();
                self.send_all(node, outbox);
            }
        }
    }

    /// Hand `envelope` to actor `to` and return what it wants sent.
    fn dispatch(&mut self, from: NodeId, to: NodeId, envelope: Envelope, now: u64) -> Outbox {
        if let Some(validator) = self.validators.get_mut(&to) {
            let result = validator.handle(from, envelope, now);
            self.apply_result(to, result)
        } else if let Some(seed) = self.seeds.get_mut(&to) {
            seed.handle(from, envelope)
        } else if let Some(client) = self.clients.get_mut(&to) {
            client.handle(from, envelope)
        } else {
            warn!("{from} sent {} to unknown actor {to}", envelope.kind());
            Vec::new()
        }
    }

    fn apply_result(
        &mut self,
        id: NodeId,
        result: std::result::Result<ValidatorOutput, EngineError>,
    ) -> Outbox {
        match result {
            Ok(output) => self.apply_output(id, output),
            Err(err) => {
                error!("{id} rejected an event: {err}");
                self.stats.engine_errors += 1;
                Vec::new()
            }
        }
    }

    /// Arm timers and record commits. A halt stops the whole run.
    fn apply_output(&mut self, id: NodeId, output: ValidatorOutput) -> Outbox {
        let ValidatorOutput {
            outbox,
            timeouts,
            committed,
            halted,
        } = output;
        self.stats.blocks_committed += committed.len() as u64;
        if halted {
            if self.stop_reason.is_none() {
                info!(
                    "{id} halted at tick {}, stopping the simulation",
                    self.scheduler.now()
                );
                self.stop_reason = Some(StopReason::Halted(id));
                self.scheduler.kill();
            }
            return Vec::new();
        }
        for timeout in timeouts {
            self.scheduler.schedule_once(
                SimEvent::Timeout {
                    node: id,
                    event: timeout.event,
                },
                timeout.delay,
            );
        }
        outbox
    }

    fn send_all(&mut self, from: NodeId, outbox: Outbox) {
        if self.scheduler.is_killed() {
            return;
        }
        for (to, envelope) in outbox {
            self.network
                .send(&mut self.scheduler, &mut self.rng, from, to, envelope);
        }
    }
}

/// Generator of an actor's own draws, derived from the run seed and its id.
fn actor_rng(seed: u64, id: NodeId) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(
        seed.wrapping_add(u64::from(id.0))
            .wrapping_mul(0x517c_c1b7_2722_0a95),
    )
}
