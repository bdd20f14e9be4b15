//! Slip-spring topology: the data the hopping scheme reads and the mutations
//! it asks the topology collaborator to apply.
//!
//! The collaborator owns the slip-springs and decides whether a mutation is
//! structurally legal; the scheme only decides which event fires and when.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use crate::error::{KmcError, Result};

/// Index of a bead in the BD position array.
pub type BeadId = usize;

/// Unique identifier of a slip-spring.
pub type SlipSpringId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpringState {
    Active,
    Destroyed,
}

/// One of the two anchoring ends of a slip-spring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpringEnd {
    First,
    Second,
}

impl SpringEnd {
    #[inline]
    pub fn index(self) -> usize {
        match self {
            SpringEnd::First => 0,
            SpringEnd::Second => 1,
        }
    }

    #[inline]
    pub fn other(self) -> SpringEnd {
        match self {
            SpringEnd::First => SpringEnd::Second,
            SpringEnd::Second => SpringEnd::First,
        }
    }
}

/// Entanglement point linking two beads.
#[derive(Clone, Debug, PartialEq)]
pub struct SlipSpring {
    pub id: SlipSpringId,
    pub beads: [BeadId; 2],
    pub created_at: f64,
    /// Total escape rate computed in the latest hopping step.
    pub rate: f64,
    pub state: SpringState,
}

impl SlipSpring {
    pub fn new(id: SlipSpringId, beads: [BeadId; 2], created_at: f64) -> Self {
        Self {
            id,
            beads,
            created_at,
            rate: 0.0,
            state: SpringState::Active,
        }
    }

    #[inline]
    pub fn bead(&self, end: SpringEnd) -> BeadId {
        self.beads[end.index()]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Create,
    Hop,
    Destroy,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Create => "create",
            EventKind::Hop => "hop",
            EventKind::Destroy => "destroy",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate topology mutation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Event {
    /// Slide `end` of `spring` onto bead `to`.
    Hop {
        spring: SlipSpringId,
        end: SpringEnd,
        to: BeadId,
    },
    /// Remove `spring`.
    Destroy { spring: SlipSpringId },
    /// Attach a new slip-spring between the two beads of `site`.
    Create { site: [BeadId; 2] },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Hop { .. } => EventKind::Hop,
            Event::Destroy { .. } => EventKind::Destroy,
            Event::Create { .. } => EventKind::Create,
        }
    }

    /// The existing slip-spring the event acts on, if any.
    pub fn spring(&self) -> Option<SlipSpringId> {
        match *self {
            Event::Hop { spring, .. } | Event::Destroy { spring } => Some(spring),
            Event::Create { .. } => None,
        }
    }
}

/// Contract between the hopping scheme and the topology collaborator.
pub trait NetworkMutator {
    /// Structurally legal events in the current topology, in a deterministic order.
    fn candidates(&self) -> Vec<Event>;

    /// Active slip-spring `id`, if it exists.
    fn spring(&self, id: SlipSpringId) -> Option<&SlipSpring>;

    fn apply_hop(&mut self, id: SlipSpringId, end: SpringEnd, target: BeadId) -> Result<()>;

    /// Remove slip-spring `id`, returning it in the destroyed state.
    fn apply_destroy(&mut self, id: SlipSpringId) -> Result<SlipSpring>;

    fn apply_create(&mut self, site: [BeadId; 2], time: f64) -> Result<SlipSpringId>;

    /// Store the total escape rate of `id` computed by the scheme.
    fn record_rate(&mut self, _id: SlipSpringId, _rate: f64) {}
}

/// Linear-chain melt with slip-springs, usable as a topology collaborator.
///
/// Chains occupy consecutive bead ranges. A slip-spring end hops to an
/// adjacent bead of the same chain, a slip-spring with an end on a chain end
/// can be destroyed, and new slip-springs are created at configured sites.
#[derive(Clone, Debug, Default)]
pub struct ChainNetwork {
    chains: Vec<Range<BeadId>>,
    chain_of: Vec<usize>,
    springs: BTreeMap<SlipSpringId, SlipSpring>,
    creation_sites: Vec<[BeadId; 2]>,
    next_id: SlipSpringId,
}

impl ChainNetwork {
    /// Create chains with the given numbers of beads, numbered consecutively.
    pub fn new(chain_lengths: &[usize]) -> Result<Self> {
        let mut chains = Vec::with_capacity(chain_lengths.len());
        let mut chain_of = Vec::new();
        let mut start = 0;
        for (c, &len) in chain_lengths.iter().enumerate() {
            if len == 0 {
                return Err(KmcError::invalid(format!("chain {} has no beads", c)));
            }
            chains.push(start..start + len);
            chain_of.extend(std::iter::repeat(c).take(len));
            start += len;
        }
        Ok(Self {
            chains,
            chain_of,
            ..Self::default()
        })
    }

    pub fn n_beads(&self) -> usize {
        self.chain_of.len()
    }

    pub fn n_springs(&self) -> usize {
        self.springs.len()
    }

    pub fn springs(&self) -> impl Iterator<Item = &SlipSpring> {
        self.springs.values()
    }

    pub fn chain_of(&self, bead: BeadId) -> Option<usize> {
        self.chain_of.get(bead).copied()
    }

    fn is_chain_end(&self, bead: BeadId) -> bool {
        match self.chain_of(bead) {
            Some(c) => {
                let chain = &self.chains[c];
                bead == chain.start || bead + 1 == chain.end
            }
            None => false,
        }
    }

    fn check_site(&self, site: [BeadId; 2]) -> std::result::Result<(), String> {
        if site.iter().any(|&b| b >= self.n_beads()) {
            return Err(format!("site {:?} outside {} beads", site, self.n_beads()));
        }
        if site[0] == site[1] {
            return Err(format!("site {:?} joins a bead to itself", site));
        }
        Ok(())
    }

    fn occupied(&self, site: [BeadId; 2]) -> bool {
        self.springs.values().any(|s| {
            s.beads == site || s.beads == [site[1], site[0]]
        })
    }

    /// Register a pair of beads where new slip-springs may be created.
    pub fn add_creation_site(&mut self, site: [BeadId; 2]) -> Result<()> {
        self.check_site(site).map_err(KmcError::invalid)?;
        self.creation_sites.push(site);
        Ok(())
    }

    /// Attach an initial slip-spring.
    pub fn add_spring(&mut self, beads: [BeadId; 2], created_at: f64) -> Result<SlipSpringId> {
        self.check_site(beads).map_err(KmcError::invalid)?;
        let id = self.next_id;
        self.next_id += 1;
        self.springs.insert(id, SlipSpring::new(id, beads, created_at));
        Ok(id)
    }

    fn hop_is_legal(&self, spring: &SlipSpring, end: SpringEnd, target: BeadId) -> bool {
        let from = spring.bead(end);
        let adjacent = target + 1 == from || from + 1 == target;
        adjacent
            && target < self.n_beads()
            && self.chain_of(target) == self.chain_of(from)
            && target != spring.bead(end.other())
    }
}

impl NetworkMutator for ChainNetwork {
    fn candidates(&self) -> Vec<Event> {
        let mut events = Vec::new();
        for spring in self.springs.values() {
            for end in [SpringEnd::First, SpringEnd::Second] {
                let from = spring.bead(end);
                let neighbors = [from.checked_sub(1), Some(from + 1)];
                for to in neighbors.into_iter().flatten() {
                    if self.hop_is_legal(spring, end, to) {
                        events.push(Event::Hop {
                            spring: spring.id,
                            end,
                            to,
                        });
                    }
                }
            }
            if spring.beads.iter().any(|&b| self.is_chain_end(b)) {
                events.push(Event::Destroy { spring: spring.id });
            }
        }
        for &site in &self.creation_sites {
            if !self.occupied(site) {
                events.push(Event::Create { site });
            }
        }
        events
    }

    fn spring(&self, id: SlipSpringId) -> Option<&SlipSpring> {
        self.springs.get(&id)
    }

    fn apply_hop(&mut self, id: SlipSpringId, end: SpringEnd, target: BeadId) -> Result<()> {
        let spring = self
            .springs
            .get(&id)
            .ok_or_else(|| KmcError::rejected(id, "no such active slip-spring"))?;
        if !self.hop_is_legal(spring, end, target) {
            return Err(KmcError::rejected(
                id,
                format!("bead {} is not a free neighbour of bead {}", target, spring.bead(end)),
            ));
        }
        if let Some(spring) = self.springs.get_mut(&id) {
            spring.beads[end.index()] = target;
        }
        Ok(())
    }

    fn apply_destroy(&mut self, id: SlipSpringId) -> Result<SlipSpring> {
        let at_chain_end = match self.springs.get(&id) {
            Some(spring) => spring.beads.iter().any(|&b| self.is_chain_end(b)),
            None => return Err(KmcError::rejected(id, "no such active slip-spring")),
        };
        if !at_chain_end {
            return Err(KmcError::rejected(id, "no end sits on a chain end"));
        }
        let mut spring = self
            .springs
            .remove(&id)
            .ok_or_else(|| KmcError::rejected(id, "no such active slip-spring"))?;
        spring.state = SpringState::Destroyed;
        Ok(spring)
    }

    fn apply_create(&mut self, site: [BeadId; 2], time: f64) -> Result<SlipSpringId> {
        if let Err(reason) = self.check_site(site) {
            return Err(KmcError::rejected(self.next_id, reason));
        }
        if self.occupied(site) {
            return Err(KmcError::rejected(
                self.next_id,
                format!("site {:?} already holds a slip-spring", site),
            ));
        }
        let id = self.next_id;
        self.next_id += 1;
        self.springs.insert(id, SlipSpring::new(id, site, time));
        Ok(id)
    }

    fn record_rate(&mut self, id: SlipSpringId, rate: f64) {
        if let Some(spring) = self.springs.get_mut(&id) {
            spring.rate = rate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Two chains of 4 beads: 0..4 and 4..8
    fn two_chains() -> ChainNetwork {
        ChainNetwork::new(&[4, 4]).unwrap()
    }

    #[test]
    fn test_chain_layout() {
        let net = two_chains();
        assert_eq!(net.n_beads(), 8);
        assert_eq!(net.chain_of(3), Some(0));
        assert_eq!(net.chain_of(4), Some(1));
        assert_eq!(net.chain_of(8), None);
        assert!(ChainNetwork::new(&[3, 0]).is_err());
    }

    #[test]
    fn test_interior_spring_candidates() {
        let mut net = two_chains();
        let id = net.add_spring([1, 6], 0.0).unwrap();
        let events = net.candidates();

        // Each end can hop both ways; no end on a chain end, so no destroy
        assert_eq!(events.len(), 4);
        assert!(events.contains(&Event::Hop { spring: id, end: SpringEnd::First, to: 0 }));
        assert!(events.contains(&Event::Hop { spring: id, end: SpringEnd::First, to: 2 }));
        assert!(events.contains(&Event::Hop { spring: id, end: SpringEnd::Second, to: 5 }));
        assert!(events.contains(&Event::Hop { spring: id, end: SpringEnd::Second, to: 7 }));
    }

    #[test]
    fn test_chain_end_spring_can_be_destroyed() {
        let mut net = two_chains();
        let id = net.add_spring([3, 5], 1.5).unwrap();
        let events = net.candidates();

        // Bead 3 ends chain 0: it may only hop back to 2
        assert!(events.contains(&Event::Hop { spring: id, end: SpringEnd::First, to: 2 }));
        assert!(!events.contains(&Event::Hop { spring: id, end: SpringEnd::First, to: 4 }));
        assert!(events.contains(&Event::Destroy { spring: id }));

        let destroyed = net.apply_destroy(id).unwrap();
        assert_eq!(destroyed.state, SpringState::Destroyed);
        assert_eq!(destroyed.created_at, 1.5);
        assert_eq!(net.n_springs(), 0);
        assert!(net.spring(id).is_none());
    }

    #[test]
    fn test_illegal_mutations_are_rejected() {
        let mut net = two_chains();
        let id = net.add_spring([1, 6], 0.0).unwrap();

        // Jump across chains
        assert!(matches!(
            net.apply_hop(id, SpringEnd::First, 4),
            Err(KmcError::MutationRejected { .. })
        ));
        // Not adjacent
        assert!(net.apply_hop(id, SpringEnd::First, 3).is_err());
        // Interior spring cannot be destroyed
        assert!(net.apply_destroy(id).is_err());
        // Unknown spring
        assert!(net.apply_hop(99, SpringEnd::First, 2).is_err());
        assert!(net.apply_destroy(99).is_err());

        assert_eq!(net.spring(id).unwrap().beads, [1, 6]);
    }

    #[test]
    fn test_hop_moves_end() {
        let mut net = two_chains();
        let id = net.add_spring([1, 6], 0.0).unwrap();
        net.apply_hop(id, SpringEnd::Second, 7).unwrap();
        assert_eq!(net.spring(id).unwrap().beads, [1, 7]);
    }

    #[test]
    fn test_creation_sites() {
        let mut net = two_chains();
        net.add_creation_site([0, 7]).unwrap();
        assert!(net.add_creation_site([2, 2]).is_err());
        assert!(net.add_creation_site([2, 20]).is_err());

        assert_eq!(net.candidates(), vec![Event::Create { site: [0, 7] }]);

        let id = net.apply_create([0, 7], 2.0).unwrap();
        assert_eq!(net.spring(id).unwrap().created_at, 2.0);
        // Occupied site: no new create candidate, direct create rejected
        assert!(!net.candidates().contains(&Event::Create { site: [0, 7] }));
        assert!(net.apply_create([7, 0], 3.0).is_err());
    }

    #[test]
    fn test_record_rate() {
        let mut net = two_chains();
        let id = net.add_spring([1, 6], 0.0).unwrap();
        net.record_rate(id, 2.5);
        assert_eq!(net.spring(id).unwrap().rate, 2.5);
    }

    #[test]
    fn test_event_accessors() {
        let hop = Event::Hop { spring: 3, end: SpringEnd::Second, to: 1 };
        assert_eq!(hop.kind(), EventKind::Hop);
        assert_eq!(hop.spring(), Some(3));
        let create = Event::Create { site: [0, 1] };
        assert_eq!(create.spring(), None);
        assert_eq!(create.kind().to_string(), "create");
        assert_eq!(SpringEnd::First.other(), SpringEnd::Second);
    }
}
