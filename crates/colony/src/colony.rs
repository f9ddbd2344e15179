//! Colony - streaming occupancy engine.
//!
//! Owns the clock, one [`Tube`] per board and one [`AnimalTracker`] per tag.
//! Events must arrive in non-decreasing time per board; the colony never
//! re-sorts.

use std::collections::{BTreeMap, HashMap};

use contracts::{
    AnimalProfile, ChaseMatrix, ChaseRecord, ColonyBlueprint, ColonyConfig,
    ColonyLayout, ContractError, DiagnosticSink, Event, EventPayload, OccupancyRecord,
    RfidSignal, TagId, TeleportRecord, TubeId,
};
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::animal::{AnimalTracker, ReadOutcome, ReadPoint};
use crate::clock::Clock;
use crate::tube::Tube;

/// Event counters kept by the colony
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventCounters {
    pub events: u64,
    pub valid_reads: u64,
    pub invalid_reads: u64,
    pub edge_markers: u64,
    pub beam_events: u64,
    pub other_events: u64,
    /// Events from a board id outside the layout
    pub unknown_board: u64,
}

/// End-of-run overview
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColonySummary {
    pub n_tubes: usize,
    pub n_cages: usize,
    pub n_animals: usize,
    pub counters: EventCounters,
    pub occupancy_records: usize,
    pub chases: usize,
    pub teleports: usize,
    pub merge_threshold_ms: f64,
    pub clock_synced: bool,
    pub rollovers: u32,
}

/// Streaming occupancy engine
#[derive(Debug)]
pub struct Colony {
    config: ColonyConfig,
    layout: ColonyLayout,
    clock: Clock,
    tubes: Vec<Tube>,
    animals: BTreeMap<TagId, AnimalTracker>,
    /// Profiles registered before the animal was first read
    profiles: HashMap<TagId, AnimalProfile>,
    pending_sinks: HashMap<TagId, Box<dyn DiagnosticSink>>,
    merge_threshold: f64,
    min_transit: Option<f64>,
    n_transits: usize,
    counters: EventCounters,
}

impl Colony {
    pub fn new(config: ColonyConfig) -> Self {
        let layout = config.layout();
        let multi = config.multi_animal_threshold_ms();
        let tubes = (0..layout.n_tubes)
            .map(|i| Tube::new(i, &layout, multi))
            .collect();
        let merge_threshold = config.rfid_merge_threshold_ms;
        gauge!("colony_merge_threshold_ms").set(merge_threshold);
        Self {
            config,
            layout,
            clock: Clock::new(),
            tubes,
            animals: BTreeMap::new(),
            profiles: HashMap::new(),
            pending_sinks: HashMap::new(),
            merge_threshold,
            min_transit: None,
            n_transits: 0,
            counters: EventCounters::default(),
        }
    }

    /// Colony with every animal of the blueprint registered
    pub fn from_blueprint(blueprint: &ColonyBlueprint) -> Result<Self, ContractError> {
        let mut colony = Self::new(blueprint.colony.clone());
        for profile in &blueprint.animals {
            colony.register_animal(profile.clone())?;
        }
        Ok(colony)
    }

    pub fn layout(&self) -> &ColonyLayout {
        &self.layout
    }

    pub fn config(&self) -> &ColonyConfig {
        &self.config
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    /// Fit the clock to `(device_ticks, world_ms)` samples
    pub fn sync_clock(&mut self, samples: &[(f64, f64)]) -> bool {
        self.clock.sync(samples)
    }

    /// Mark a segment boundary (resets rollover tracking)
    pub fn begin_segment(&mut self) {
        self.clock.reset_rollover();
    }

    pub fn tube(&self, tube: TubeId) -> Option<&Tube> {
        self.tubes.get(tube)
    }

    /// Effective merge threshold (ms), after autotuning
    pub fn merge_threshold(&self) -> f64 {
        self.merge_threshold
    }

    /// Attach a display name and metadata to a tag
    pub fn register_animal(&mut self, profile: AnimalProfile) -> Result<(), ContractError> {
        profile.check_meta()?;
        match self.animals.get_mut(&profile.tag) {
            Some(tracker) => tracker.set_profile(profile),
            None => {
                self.profiles.insert(profile.tag.clone(), profile);
            }
        }
        Ok(())
    }

    /// Route one animal's tracker diagnostics to `sink`
    pub fn attach_diagnostics(&mut self, tag: impl Into<TagId>, sink: Box<dyn DiagnosticSink>) {
        let tag = tag.into();
        match self.animals.get_mut(&tag) {
            Some(tracker) => tracker.attach_diagnostics(sink),
            None => {
                self.pending_sinks.insert(tag, sink);
            }
        }
    }

    /// Stamp an event with world time and feed it to the trackers.
    ///
    /// An event that already carries a world timestamp keeps it; its tick
    /// still advances rollover tracking.
    #[instrument(
        level = "trace",
        name = "colony_process_event",
        skip(self, event),
        fields(board = event.board(), ts = event.timestamp())
    )]
    pub fn process_event(&mut self, event: &mut Event) {
        let world = self.clock.teensy_to_world(event.timestamp());
        let time = match event.world_timestamp() {
            Some(t) => t,
            None => {
                event.annotate_world_timestamp(world);
                world
            }
        };
        self.counters.events += 1;
        counter!("colony_events_processed_total", "type" => event.event_type().as_str())
            .increment(1);

        let board = event.board();
        if board >= self.tubes.len() {
            self.counters.unknown_board += 1;
            warn!(board, n_tubes = self.tubes.len(), "event from unknown board");
            return;
        }

        match event.payload() {
            EventPayload::Rfid(RfidSignal::Tag { tag, valid: true }) => {
                let tag = tag.clone();
                self.process_read(tag, board, time);
            }
            EventPayload::Rfid(RfidSignal::Tag { valid: false, .. }) => {
                self.counters.invalid_reads += 1;
                self.tubes[board].record_invalid_read();
            }
            EventPayload::Rfid(RfidSignal::Edge(_)) => {
                self.counters.edge_markers += 1;
                self.tubes[board].record_edge_marker();
            }
            EventPayload::Beam { side, state } => {
                self.counters.beam_events += 1;
                self.tubes[board].record_beam(*side, *state);
            }
            _ => {
                self.counters.other_events += 1;
                self.tubes[board].record_other();
            }
        }
    }

    fn process_read(&mut self, tag: TagId, board: TubeId, time: f64) {
        self.counters.valid_reads += 1;
        counter!("colony_rfid_reads_total").increment(1);

        let chases = self.tubes[board].read_animal(&tag, time);
        if !chases.is_empty() {
            counter!("colony_chases_total").increment(chases.len() as u64);
        }

        let profiles = &mut self.profiles;
        let pending_sinks = &mut self.pending_sinks;
        let tracker = self.animals.entry(tag.clone()).or_insert_with(|| {
            let profile = profiles
                .remove(&tag)
                .unwrap_or_else(|| AnimalProfile::anonymous(tag.clone()));
            let mut tracker = AnimalTracker::new(profile);
            if let Some(sink) = pending_sinks.remove(&tag) {
                tracker.attach_diagnostics(sink);
            }
            debug!(%tag, tube = board, "new animal");
            tracker
        });

        let outcome = tracker.observe(
            ReadPoint { tube: board, time },
            &self.layout,
            self.merge_threshold,
        );
        match outcome {
            ReadOutcome::Crossing { transit, .. } => {
                counter!("colony_occupancy_records_total").increment(1);
                histogram!("colony_transit_ms").record(transit);
                self.autotune(transit);
            }
            ReadOutcome::Teleport => {
                counter!("colony_teleports_total").increment(1);
                warn!(%tag, tube = board, time, "teleport");
            }
            _ => {}
        }
    }

    /// Raise the merge threshold to the shortest observed transit once
    /// enough transits have been seen. Never drops below the configured value.
    fn autotune(&mut self, transit: f64) {
        if !self.config.autotune_merge_threshold || transit <= 0.0 {
            return;
        }
        self.n_transits += 1;
        let min = self.min_transit.map_or(transit, |m| m.min(transit));
        self.min_transit = Some(min);
        if self.n_transits < self.config.autotune_min_samples {
            return;
        }
        let tuned = self.config.rfid_merge_threshold_ms.max(min);
        if tuned != self.merge_threshold {
            debug!(
                from = self.merge_threshold,
                to = tuned,
                transits = self.n_transits,
                "merge threshold autotuned"
            );
            self.merge_threshold = tuned;
            gauge!("colony_merge_threshold_ms").set(tuned);
        }
    }

    pub fn animal(&self, tag: &str) -> Option<&AnimalTracker> {
        self.animals.get(tag)
    }

    /// All trackers in tag order
    pub fn animals(&self) -> impl Iterator<Item = &AnimalTracker> {
        self.animals.values()
    }

    /// Tags of animals with at least `n` valid reads
    pub fn animals_with_min_reads(&self, n: u64) -> Vec<TagId> {
        self.animals
            .values()
            .filter(|a| a.n_reads() >= n)
            .map(|a| a.tag().clone())
            .collect()
    }

    /// Confirmed occupancy of the selected animals (all when `None`),
    /// sorted by enter time
    pub fn get_occupancy(&self, filter: Option<&[TagId]>) -> Vec<OccupancyRecord> {
        let mut records: Vec<OccupancyRecord> = self
            .selected(filter)
            .into_iter()
            .flat_map(|a| a.occupancy())
            .collect();
        records.sort_by(|a, b| a.enter_time.total_cmp(&b.enter_time));
        records
    }

    /// Chaser x chasee counts over every tube
    pub fn get_chase_matrix(&self, filter: Option<&[TagId]>) -> ChaseMatrix {
        ChaseMatrix::from_records(
            self.matrix_order(filter),
            self.tubes.iter().flat_map(|t| t.chases()),
        )
    }

    /// Chaser x chasee counts for one tube
    pub fn chase_matrix_for_tube(
        &self,
        tube: TubeId,
        filter: Option<&[TagId]>,
    ) -> Option<ChaseMatrix> {
        let tube = self.tubes.get(tube)?;
        Some(ChaseMatrix::from_records(
            self.matrix_order(filter),
            tube.chases(),
        ))
    }

    /// Every chase, by time
    pub fn chase_events(&self) -> Vec<ChaseRecord> {
        let mut chases: Vec<ChaseRecord> = self
            .tubes
            .iter()
            .flat_map(|t| t.chases().iter().cloned())
            .collect();
        chases.sort_by(|a, b| a.time.total_cmp(&b.time));
        chases
    }

    /// Every teleport with its animal, by time
    pub fn teleports(&self) -> Vec<(TagId, TeleportRecord)> {
        let mut out: Vec<(TagId, TeleportRecord)> = self
            .animals
            .values()
            .flat_map(|a| a.teleports().iter().map(|t| (a.tag().clone(), t.clone())))
            .collect();
        out.sort_by(|a, b| a.1.time.total_cmp(&b.1.time));
        out
    }

    pub fn counters(&self) -> &EventCounters {
        &self.counters
    }

    #[instrument(name = "colony_summary", skip(self))]
    pub fn summary(&self) -> ColonySummary {
        let summary = ColonySummary {
            n_tubes: self.layout.n_tubes,
            n_cages: self.layout.n_cages(),
            n_animals: self.animals.len(),
            counters: self.counters,
            occupancy_records: self.animals.values().map(|a| a.confirmed_occupancy().len()).sum(),
            chases: self.tubes.iter().map(|t| t.chases().len()).sum(),
            teleports: self.animals.values().map(|a| a.teleports().len()).sum(),
            merge_threshold_ms: self.merge_threshold,
            clock_synced: self.clock.is_synced(),
            rollovers: self.clock.rollover_count(),
        };
        info!(
            animals = summary.n_animals,
            events = summary.counters.events,
            occupancy = summary.occupancy_records,
            chases = summary.chases,
            teleports = summary.teleports,
            "colony summary"
        );
        summary
    }

    fn selected(&self, filter: Option<&[TagId]>) -> Vec<&AnimalTracker> {
        match filter {
            Some(tags) => tags.iter().filter_map(|t| self.animals.get(t)).collect(),
            None => self.animals.values().collect(),
        }
    }

    fn matrix_order(&self, filter: Option<&[TagId]>) -> Vec<TagId> {
        match filter {
            Some(tags) => tags.to_vec(),
            None => self.animals.keys().cloned().collect(),
        }
    }
}
