//! Multi-agent alliance formation for the Seedbed substrate.
//!
//! # Architecture
//!
//! A founder proposes an alliance to 1 to 7 invitees. Every invitee must
//! trust the founder and be trusted by the founder at or above the trust
//! threshold. The proposal collects acceptances; when every invitee has
//! accepted, the engine forms the [`Alliance`] in the same call. Any
//! rejection ends the proposal permanently. Only the founder may dissolve
//! an active alliance, and dissolution is terminal.
//!
//! # Events
//!
//! Successful mutations publish an [`AllianceEvent`] on a broadcast
//! channel, separate from return values:
//!
//! - `Proposed` -- a proposal passed validation.
//! - `InvitationAccepted` -- an invitee accepted.
//! - `Formed` -- quorum reached; always follows the final `InvitationAccepted`.
//! - `InvitationRejected` -- an invitee rejected; the proposal is dead.
//! - `Dissolved` -- the founder ended the alliance.
//!
//! # Invariants
//!
//! - A proposal forms at most one alliance, and only at full quorum.
//! - A rejected proposal never accepts again.
//! - The per-agent index lists only active alliances.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use seedbed_types::{AllianceId, PadState, SeedId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::collaborators::{self, MoodReader, TopicProvider, TrustProvider};
use crate::config::AllianceConfig;
use crate::error::AllianceError;
use crate::persistence::{AlliancePersistence, spawn_save};

/// Capacity of the alliance event channel.
///
/// A subscriber that falls further behind receives
/// [`broadcast::error::RecvError::Lagged`] and skips ahead.
const EVENT_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What the founder wants the alliance to be.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllianceCharter {
    /// Display name.
    pub name: String,
    /// Purpose statement.
    pub description: String,
    /// Topics the members share.
    pub shared_topics: Vec<String>,
}

/// Lifecycle of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Collecting acceptances.
    Pending,
    /// Every invitee accepted; an alliance was formed.
    Accepted,
    /// An invitee rejected. Terminal.
    Rejected,
}

/// Lifecycle of a formed alliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllianceStatus {
    /// In force.
    Active,
    /// Ended by the founder. Terminal.
    Dissolved,
}

/// A pending or decided invitation to form an alliance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllianceProposal {
    /// Identifier shared with the alliance it forms.
    pub alliance_id: AllianceId,
    /// The proposing agent.
    pub founder_seed_id: SeedId,
    /// Invited agents, founder excluded, in proposal order.
    pub invited_seed_ids: Vec<SeedId>,
    /// Agents that have accepted. Starts with the founder.
    pub accepted_by: BTreeSet<SeedId>,
    /// Current status.
    pub status: ProposalStatus,
    /// The founder's charter.
    pub config: AllianceCharter,
    /// When the proposal was made.
    pub created_at: DateTime<Utc>,
}

impl AllianceProposal {
    /// Whether `seed_id` was invited.
    pub fn is_invited(&self, seed_id: &SeedId) -> bool {
        self.invited_seed_ids.contains(seed_id)
    }

    /// Whether the founder and every invitee have accepted.
    pub fn has_quorum(&self) -> bool {
        self.accepted_by.contains(&self.founder_seed_id)
            && self
                .invited_seed_ids
                .iter()
                .all(|s| self.accepted_by.contains(s))
    }
}

/// A formed alliance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alliance {
    /// Identifier, equal to the proposal's.
    pub alliance_id: AllianceId,
    /// The founding agent.
    pub founder_seed_id: SeedId,
    /// Founder followed by invitees in proposal order.
    pub member_seed_ids: Vec<SeedId>,
    /// Display name.
    pub name: String,
    /// Purpose statement.
    pub description: String,
    /// Topics the members share.
    pub shared_topics: Vec<String>,
    /// Current status.
    pub status: AllianceStatus,
    /// When quorum was reached.
    pub formed_at: DateTime<Utc>,
    /// When the founder dissolved it.
    pub dissolved_at: Option<DateTime<Utc>>,
}

/// Notification of a successful alliance mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AllianceEvent {
    /// A proposal passed validation.
    Proposed {
        /// The new proposal.
        proposal: AllianceProposal,
    },
    /// An invitee accepted.
    InvitationAccepted {
        /// The proposal.
        alliance_id: AllianceId,
        /// The accepting agent.
        seed_id: SeedId,
    },
    /// Quorum reached and the alliance formed.
    Formed {
        /// The new alliance.
        alliance: Alliance,
    },
    /// An invitee rejected.
    InvitationRejected {
        /// The proposal.
        alliance_id: AllianceId,
        /// The rejecting agent.
        seed_id: SeedId,
    },
    /// The founder dissolved the alliance.
    Dissolved {
        /// The dissolved alliance.
        alliance_id: AllianceId,
        /// The founder.
        requested_by: SeedId,
    },
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Owns proposals, alliances and the per-agent membership index.
pub struct AllianceEngine {
    config: AllianceConfig,
    proposals: BTreeMap<AllianceId, AllianceProposal>,
    alliances: BTreeMap<AllianceId, Alliance>,
    memberships: BTreeMap<SeedId, BTreeSet<AllianceId>>,
    events: broadcast::Sender<AllianceEvent>,
    persistence: Option<Arc<dyn AlliancePersistence>>,
}

impl AllianceEngine {
    /// Create an engine without persistence.
    pub fn new(config: AllianceConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            proposals: BTreeMap::new(),
            alliances: BTreeMap::new(),
            memberships: BTreeMap::new(),
            events,
            persistence: None,
        }
    }

    /// Attach a persistence adapter.
    #[must_use]
    pub fn with_persistence(mut self, persistence: Arc<dyn AlliancePersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Receive every future [`AllianceEvent`].
    pub fn subscribe_events(&self) -> broadcast::Receiver<AllianceEvent> {
        self.events.subscribe()
    }

    // -----------------------------------------------------------------------
    // Protocol
    // -----------------------------------------------------------------------

    /// Validate and record a new proposal.
    ///
    /// # Errors
    ///
    /// Returns an [`AllianceError`] naming the violated constraint: the
    /// founder invited itself, there are no or too many invitees, an
    /// invitee is listed twice, or trust in either direction between the
    /// founder and some invitee is below the threshold or not a number.
    pub fn propose_alliance(
        &mut self,
        founder: &SeedId,
        invitees: Vec<SeedId>,
        charter: AllianceCharter,
        trust: &dyn TrustProvider,
    ) -> Result<AllianceProposal, AllianceError> {
        if invitees.contains(founder) {
            return Err(AllianceError::SelfInvitation(founder.clone()));
        }
        if invitees.is_empty() {
            return Err(AllianceError::NoInvitees);
        }
        if invitees.len() > self.config.max_invitees {
            return Err(AllianceError::TooManyInvitees {
                count: invitees.len(),
                max: self.config.max_invitees,
            });
        }

        let mut seen = BTreeSet::new();
        for invitee in &invitees {
            if !seen.insert(invitee) {
                return Err(AllianceError::DuplicateInvitee(invitee.clone()));
            }
        }

        let required = self.config.min_trust;
        for invitee in &invitees {
            for (from, to) in [(founder, invitee), (invitee, founder)] {
                let value = trust.trust(from, to);
                // NaN compares false against everything
                if value.is_nan() || value < required {
                    return Err(AllianceError::InsufficientTrust {
                        from: from.clone(),
                        to: to.clone(),
                        trust: value,
                        required,
                    });
                }
            }
        }

        let proposal = AllianceProposal {
            alliance_id: AllianceId::new(),
            founder_seed_id: founder.clone(),
            invited_seed_ids: invitees,
            accepted_by: BTreeSet::from([founder.clone()]),
            status: ProposalStatus::Pending,
            config: charter,
            created_at: Utc::now(),
        };
        self.proposals
            .insert(proposal.alliance_id, proposal.clone());

        info!(
            alliance_id = %proposal.alliance_id,
            founder = %founder,
            invitees = proposal.invited_seed_ids.len(),
            "alliance proposed"
        );
        self.save_proposal(&proposal);
        self.emit(AllianceEvent::Proposed {
            proposal: proposal.clone(),
        });
        Ok(proposal)
    }

    /// Record `seed_id`'s acceptance. Forms the alliance at full quorum.
    ///
    /// Returns `false` without side effects if the proposal is unknown or
    /// no longer pending, or `seed_id` was not invited or already accepted.
    pub fn accept_invitation(&mut self, alliance_id: AllianceId, seed_id: &SeedId) -> bool {
        let Some(proposal) = self.proposals.get_mut(&alliance_id) else {
            return false;
        };
        if proposal.status != ProposalStatus::Pending
            || !proposal.is_invited(seed_id)
            || proposal.accepted_by.contains(seed_id)
        {
            return false;
        }

        proposal.accepted_by.insert(seed_id.clone());
        let formed = proposal.has_quorum();
        if formed {
            proposal.status = ProposalStatus::Accepted;
        }
        let proposal = proposal.clone();

        debug!(alliance_id = %alliance_id, seed_id = %seed_id, "invitation accepted");
        self.save_proposal(&proposal);
        self.emit(AllianceEvent::InvitationAccepted {
            alliance_id,
            seed_id: seed_id.clone(),
        });

        if formed {
            self.form_alliance(&proposal);
        }
        true
    }

    fn form_alliance(&mut self, proposal: &AllianceProposal) {
        let mut members = vec![proposal.founder_seed_id.clone()];
        members.extend(proposal.invited_seed_ids.iter().cloned());

        let alliance = Alliance {
            alliance_id: proposal.alliance_id,
            founder_seed_id: proposal.founder_seed_id.clone(),
            member_seed_ids: members,
            name: proposal.config.name.clone(),
            description: proposal.config.description.clone(),
            shared_topics: proposal.config.shared_topics.clone(),
            status: AllianceStatus::Active,
            formed_at: Utc::now(),
            dissolved_at: None,
        };

        for member in &alliance.member_seed_ids {
            self.memberships
                .entry(member.clone())
                .or_default()
                .insert(alliance.alliance_id);
        }
        self.alliances
            .insert(alliance.alliance_id, alliance.clone());

        info!(
            alliance_id = %alliance.alliance_id,
            name = %alliance.name,
            members = alliance.member_seed_ids.len(),
            "alliance formed"
        );
        self.save_alliance(&alliance);
        self.emit(AllianceEvent::Formed { alliance });
    }

    /// Record `seed_id`'s rejection, permanently ending the proposal.
    ///
    /// Returns `false` without side effects under the same conditions as
    /// [`Self::accept_invitation`].
    pub fn reject_invitation(&mut self, alliance_id: AllianceId, seed_id: &SeedId) -> bool {
        let Some(proposal) = self.proposals.get_mut(&alliance_id) else {
            return false;
        };
        if proposal.status != ProposalStatus::Pending
            || !proposal.is_invited(seed_id)
            || proposal.accepted_by.contains(seed_id)
        {
            return false;
        }

        proposal.status = ProposalStatus::Rejected;
        let proposal = proposal.clone();

        info!(alliance_id = %alliance_id, seed_id = %seed_id, "alliance invitation rejected");
        self.save_proposal(&proposal);
        self.emit(AllianceEvent::InvitationRejected {
            alliance_id,
            seed_id: seed_id.clone(),
        });
        true
    }

    /// Dissolve an active alliance. Only its founder may do so.
    pub fn dissolve_alliance(&mut self, alliance_id: AllianceId, requester: &SeedId) -> bool {
        let Some(alliance) = self.alliances.get_mut(&alliance_id) else {
            return false;
        };
        if alliance.status != AllianceStatus::Active || alliance.founder_seed_id != *requester {
            return false;
        }

        alliance.status = AllianceStatus::Dissolved;
        alliance.dissolved_at = Some(Utc::now());
        let alliance = alliance.clone();

        for member in &alliance.member_seed_ids {
            if let Some(ids) = self.memberships.get_mut(member) {
                ids.remove(&alliance_id);
                if ids.is_empty() {
                    self.memberships.remove(member);
                }
            }
        }

        info!(alliance_id = %alliance_id, founder = %requester, "alliance dissolved");
        self.save_alliance(&alliance);
        self.emit(AllianceEvent::Dissolved {
            alliance_id,
            requested_by: requester.clone(),
        });
        true
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Look up an alliance.
    pub fn get_alliance(&self, alliance_id: AllianceId) -> Option<&Alliance> {
        self.alliances.get(&alliance_id)
    }

    /// Look up a proposal.
    pub fn get_proposal(&self, alliance_id: AllianceId) -> Option<&AllianceProposal> {
        self.proposals.get(&alliance_id)
    }

    /// Active alliances `seed_id` belongs to.
    pub fn alliances_for_agent(&self, seed_id: &SeedId) -> Vec<&Alliance> {
        self.memberships
            .get(seed_id)
            .map(|ids| ids.iter().filter_map(|id| self.alliances.get(id)).collect())
            .unwrap_or_default()
    }

    /// Pending proposals awaiting `seed_id`'s answer.
    pub fn pending_invitations_for(&self, seed_id: &SeedId) -> Vec<&AllianceProposal> {
        self.proposals
            .values()
            .filter(|p| {
                p.status == ProposalStatus::Pending
                    && p.is_invited(seed_id)
                    && !p.accepted_by.contains(seed_id)
            })
            .collect()
    }

    /// Every active alliance.
    pub fn active_alliances(&self) -> Vec<&Alliance> {
        self.alliances
            .values()
            .filter(|a| a.status == AllianceStatus::Active)
            .collect()
    }

    /// Mean mood of the alliance's members. `None` if the alliance is
    /// unknown or no member has mood state.
    pub fn collective_mood(
        &self,
        alliance_id: AllianceId,
        moods: &dyn MoodReader,
    ) -> Option<PadState> {
        let alliance = self.alliances.get(&alliance_id)?;
        collaborators::collective_mood(moods, &alliance.member_seed_ids)
    }

    /// Mean reputation of the alliance's members.
    #[allow(clippy::cast_precision_loss)]
    pub fn average_reputation(
        &self,
        alliance_id: AllianceId,
        trust: &dyn TrustProvider,
    ) -> Option<f64> {
        let alliance = self.alliances.get(&alliance_id)?;
        if alliance.member_seed_ids.is_empty() {
            return None;
        }
        let total: f64 = alliance
            .member_seed_ids
            .iter()
            .map(|m| trust.reputation(m))
            .sum();
        Some(total / alliance.member_seed_ids.len() as f64)
    }

    /// Topics every agent in `seed_ids` follows, in the first agent's order.
    ///
    /// A single agent gets its full list. Any agent following nothing
    /// makes the result empty.
    pub fn detect_shared_topics(seed_ids: &[SeedId], topics: &dyn TopicProvider) -> Vec<String> {
        let Some((first, rest)) = seed_ids.split_first() else {
            return Vec::new();
        };
        let mut shared = topics.subscriptions(first);
        for seed_id in rest {
            let theirs: BTreeSet<String> = topics.subscriptions(seed_id).into_iter().collect();
            if theirs.is_empty() {
                return Vec::new();
            }
            shared.retain(|t| theirs.contains(t));
        }
        shared
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Replace in-memory state with whatever the adapter holds.
    ///
    /// Returns the number of alliances loaded. Load failures are logged and
    /// leave the engine unchanged.
    pub async fn load_from_persistence(&mut self) -> usize {
        let Some(store) = self.persistence.clone() else {
            return 0;
        };
        let (alliances, proposals) = match (store.load_alliances().await, store.load_proposals().await)
        {
            (Ok(alliances), Ok(proposals)) => (alliances, proposals),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "alliance load failed");
                return 0;
            }
        };

        self.proposals = proposals.into_iter().map(|p| (p.alliance_id, p)).collect();
        self.alliances = alliances.into_iter().map(|a| (a.alliance_id, a)).collect();
        self.memberships.clear();
        for alliance in self.alliances.values() {
            if alliance.status != AllianceStatus::Active {
                continue;
            }
            for member in &alliance.member_seed_ids {
                self.memberships
                    .entry(member.clone())
                    .or_default()
                    .insert(alliance.alliance_id);
            }
        }

        info!(
            alliances = self.alliances.len(),
            proposals = self.proposals.len(),
            "alliances restored from persistence"
        );
        self.alliances.len()
    }

    fn save_alliance(&self, alliance: &Alliance) {
        let Some(store) = self.persistence.as_ref() else {
            return;
        };
        let store = Arc::clone(store);
        let alliance = alliance.clone();
        spawn_save("alliance", alliance.alliance_id.to_string(), async move {
            store.save_alliance(&alliance).await
        });
    }

    fn save_proposal(&self, proposal: &AllianceProposal) {
        let Some(store) = self.persistence.as_ref() else {
            return;
        };
        let store = Arc::clone(store);
        let proposal = proposal.clone();
        spawn_save("alliance_proposal", proposal.alliance_id.to_string(), async move {
            store.save_proposal(&proposal).await
        });
    }

    fn emit(&self, event: AllianceEvent) -> usize {
        // send fails only when nobody is listening.
        self.events.send(event).unwrap_or(0)
    }
}

impl Default for AllianceEngine {
    fn default() -> Self {
        Self::new(AllianceConfig::default())
    }
}

impl core::fmt::Debug for AllianceEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AllianceEngine")
            .field("config", &self.config)
            .field("proposals", &self.proposals.len())
            .field("alliances", &self.alliances.len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::persistence::InMemoryPersistence;

    // -----------------------------------------------------------------------
    // Helper functions
    // -----------------------------------------------------------------------

    /// Trust provider with a default level and per-pair overrides.
    struct TableTrust {
        default: f64,
        overrides: BTreeMap<(SeedId, SeedId), f64>,
        reputations: BTreeMap<SeedId, f64>,
    }

    impl TableTrust {
        fn uniform(default: f64) -> Self {
            Self {
                default,
                overrides: BTreeMap::new(),
                reputations: BTreeMap::new(),
            }
        }

        fn with(mut self, from: &str, to: &str, value: f64) -> Self {
            self.overrides
                .insert((SeedId::from(from), SeedId::from(to)), value);
            self
        }
    }

    impl TrustProvider for TableTrust {
        fn trust(&self, from: &SeedId, to: &SeedId) -> f64 {
            self.overrides
                .get(&(from.clone(), to.clone()))
                .copied()
                .unwrap_or(self.default)
        }

        fn reputation(&self, seed_id: &SeedId) -> f64 {
            self.reputations.get(seed_id).copied().unwrap_or(0.5)
        }
    }

    struct TableTopics(BTreeMap<SeedId, Vec<String>>);

    impl TopicProvider for TableTopics {
        fn subscriptions(&self, seed_id: &SeedId) -> Vec<String> {
            self.0.get(seed_id).cloned().unwrap_or_default()
        }
    }

    fn seeds(names: &[&str]) -> Vec<SeedId> {
        names.iter().map(|n| SeedId::from(*n)).collect()
    }

    fn invitees(n: usize) -> Vec<SeedId> {
        (0..n).map(|i| SeedId::new(format!("invitee-{i}"))).collect()
    }

    fn charter() -> AllianceCharter {
        AllianceCharter {
            name: String::from("Stargazers"),
            description: String::from("Amateur astronomy"),
            shared_topics: vec![String::from("astronomy")],
        }
    }

    fn founder() -> SeedId {
        SeedId::from("founder")
    }

    fn propose(engine: &mut AllianceEngine, members: &[&str]) -> AllianceId {
        engine
            .propose_alliance(&founder(), seeds(members), charter(), &TableTrust::uniform(0.9))
            .map(|p| p.alliance_id)
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Proposal validation
    // -----------------------------------------------------------------------

    #[test]
    fn eight_invitees_is_too_many() {
        let mut engine = AllianceEngine::default();
        let result =
            engine.propose_alliance(&founder(), invitees(8), charter(), &TableTrust::uniform(0.9));
        let message = result.as_ref().map_err(ToString::to_string).err();
        assert!(message.is_some_and(|m| m.contains("at most 7 agents")));
        assert!(matches!(
            result,
            Err(AllianceError::TooManyInvitees { count: 8, max: 7 })
        ));
    }

    #[test]
    fn seven_invitees_is_allowed() {
        let mut engine = AllianceEngine::default();
        let result =
            engine.propose_alliance(&founder(), invitees(7), charter(), &TableTrust::uniform(0.9));
        assert!(result.is_ok());
        let proposal = result.ok();
        assert_eq!(proposal.as_ref().map(|p| p.invited_seed_ids.len()), Some(7));
        assert_eq!(
            proposal.map(|p| p.accepted_by),
            Some(BTreeSet::from([founder()]))
        );
    }

    #[test]
    fn founder_cannot_invite_itself() {
        let mut engine = AllianceEngine::default();
        let result = engine.propose_alliance(
            &founder(),
            seeds(&["a", "founder"]),
            charter(),
            &TableTrust::uniform(0.9),
        );
        assert_eq!(result, Err(AllianceError::SelfInvitation(founder())));
    }

    #[test]
    fn empty_and_duplicate_invitees_fail() {
        let mut engine = AllianceEngine::default();
        let trust = TableTrust::uniform(0.9);
        assert_eq!(
            engine.propose_alliance(&founder(), Vec::new(), charter(), &trust),
            Err(AllianceError::NoInvitees)
        );
        assert_eq!(
            engine.propose_alliance(&founder(), seeds(&["a", "b", "a"]), charter(), &trust),
            Err(AllianceError::DuplicateInvitee(SeedId::from("a")))
        );
    }

    #[test]
    fn asymmetric_trust_names_the_offender() {
        let mut engine = AllianceEngine::default();
        let trust = TableTrust::uniform(0.9).with("b", "founder", 0.4);
        let result = engine.propose_alliance(&founder(), seeds(&["a", "b"]), charter(), &trust);
        assert!(matches!(
            result,
            Err(AllianceError::InsufficientTrust { ref from, ref to, .. })
                if *from == SeedId::from("b") && *to == founder()
        ));
        assert!(engine.active_alliances().is_empty());
        assert!(engine.pending_invitations_for(&SeedId::from("a")).is_empty());
    }

    #[test]
    fn nan_trust_is_insufficient() {
        let mut engine = AllianceEngine::default();
        let trust = TableTrust::uniform(0.9).with("founder", "a", f64::NAN);
        let result = engine.propose_alliance(&founder(), seeds(&["a"]), charter(), &trust);
        assert!(matches!(
            result,
            Err(AllianceError::InsufficientTrust { ref from, ref to, trust, .. })
                if *from == founder() && *to == SeedId::from("a") && trust.is_nan()
        ));
        assert!(engine.pending_invitations_for(&SeedId::from("a")).is_empty());
    }

    #[test]
    fn trust_exactly_at_threshold_passes() {
        let mut engine = AllianceEngine::default();
        let result =
            engine.propose_alliance(&founder(), seeds(&["a"]), charter(), &TableTrust::uniform(0.6));
        assert!(result.is_ok());
    }

    // -----------------------------------------------------------------------
    // Quorum
    // -----------------------------------------------------------------------

    #[test]
    fn alliance_forms_only_at_full_quorum() {
        let mut engine = AllianceEngine::default();
        let id = propose(&mut engine, &["a", "b"]);

        assert!(engine.accept_invitation(id, &SeedId::from("a")));
        assert!(engine.get_alliance(id).is_none());
        assert_eq!(engine.pending_invitations_for(&SeedId::from("b")).len(), 1);

        assert!(engine.accept_invitation(id, &SeedId::from("b")));
        let alliance = engine.get_alliance(id);
        assert_eq!(alliance.map(|a| a.status), Some(AllianceStatus::Active));
        assert_eq!(
            alliance.map(|a| a.member_seed_ids.clone()),
            Some(seeds(&["founder", "a", "b"]))
        );
        assert_eq!(
            engine.get_proposal(id).map(|p| p.status),
            Some(ProposalStatus::Accepted)
        );
        assert_eq!(engine.alliances_for_agent(&SeedId::from("b")).len(), 1);
        assert!(engine.pending_invitations_for(&SeedId::from("b")).is_empty());
    }

    #[test]
    fn accept_guards() {
        let mut engine = AllianceEngine::default();
        let id = propose(&mut engine, &["a", "b"]);

        assert!(!engine.accept_invitation(AllianceId::new(), &SeedId::from("a")));
        assert!(!engine.accept_invitation(id, &SeedId::from("stranger")));
        assert!(!engine.accept_invitation(id, &founder()));
        assert!(engine.accept_invitation(id, &SeedId::from("a")));
        assert!(!engine.accept_invitation(id, &SeedId::from("a")));
    }

    #[test]
    fn single_rejection_blocks_forever() {
        let mut engine = AllianceEngine::default();
        let id = propose(&mut engine, &["a", "b", "c"]);

        assert!(engine.accept_invitation(id, &SeedId::from("a")));
        assert!(engine.reject_invitation(id, &SeedId::from("b")));
        assert!(!engine.accept_invitation(id, &SeedId::from("c")));
        assert!(!engine.accept_invitation(id, &SeedId::from("b")));
        assert!(!engine.reject_invitation(id, &SeedId::from("c")));

        assert!(engine.get_alliance(id).is_none());
        assert_eq!(
            engine.get_proposal(id).map(|p| p.status),
            Some(ProposalStatus::Rejected)
        );
    }

    #[test]
    fn events_arrive_in_order() {
        let mut engine = AllianceEngine::default();
        let mut rx = engine.subscribe_events();
        let id = propose(&mut engine, &["a"]);
        engine.accept_invitation(id, &SeedId::from("a"));
        engine.dissolve_alliance(id, &founder());

        let kinds: Vec<&'static str> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| match e {
                AllianceEvent::Proposed { .. } => "proposed",
                AllianceEvent::InvitationAccepted { .. } => "accepted",
                AllianceEvent::Formed { .. } => "formed",
                AllianceEvent::InvitationRejected { .. } => "rejected",
                AllianceEvent::Dissolved { .. } => "dissolved",
            })
            .collect();
        assert_eq!(kinds, vec!["proposed", "accepted", "formed", "dissolved"]);
    }

    #[test]
    fn failed_operations_emit_nothing() {
        let mut engine = AllianceEngine::default();
        let id = propose(&mut engine, &["a"]);
        let mut rx = engine.subscribe_events();

        assert!(!engine.accept_invitation(id, &SeedId::from("stranger")));
        assert!(!engine.dissolve_alliance(id, &founder()));
        assert!(rx.try_recv().is_err());
    }

    // -----------------------------------------------------------------------
    // Dissolution
    // -----------------------------------------------------------------------

    #[test]
    fn only_founder_dissolves_and_only_once() {
        let mut engine = AllianceEngine::default();
        let id = propose(&mut engine, &["a"]);
        engine.accept_invitation(id, &SeedId::from("a"));

        assert!(!engine.dissolve_alliance(id, &SeedId::from("a")));
        assert!(engine.dissolve_alliance(id, &founder()));
        assert!(!engine.dissolve_alliance(id, &founder()));

        assert_eq!(
            engine.get_alliance(id).map(|a| a.status),
            Some(AllianceStatus::Dissolved)
        );
        assert!(engine.alliances_for_agent(&founder()).is_empty());
        assert!(engine.alliances_for_agent(&SeedId::from("a")).is_empty());
        assert!(engine.active_alliances().is_empty());
    }

    // -----------------------------------------------------------------------
    // Collaborator queries
    // -----------------------------------------------------------------------

    #[test]
    fn shared_topics_follow_first_agent_order() {
        let mut table = BTreeMap::new();
        table.insert(
            SeedId::from("a"),
            vec![String::from("space"), String::from("music"), String::from("code")],
        );
        table.insert(SeedId::from("b"), vec![String::from("code"), String::from("space")]);
        table.insert(SeedId::from("c"), Vec::new());
        let topics = TableTopics(table);

        assert_eq!(
            AllianceEngine::detect_shared_topics(&seeds(&["a", "b"]), &topics),
            vec![String::from("space"), String::from("code")]
        );
        assert_eq!(
            AllianceEngine::detect_shared_topics(&seeds(&["a"]), &topics).len(),
            3
        );
        assert!(AllianceEngine::detect_shared_topics(&seeds(&["a", "c"]), &topics).is_empty());
        assert!(AllianceEngine::detect_shared_topics(&[], &topics).is_empty());
    }

    #[test]
    fn average_reputation_over_members() {
        let mut engine = AllianceEngine::default();
        let id = propose(&mut engine, &["a"]);
        engine.accept_invitation(id, &SeedId::from("a"));

        let mut trust = TableTrust::uniform(0.9);
        trust.reputations.insert(founder(), 0.8);
        trust.reputations.insert(SeedId::from("a"), 0.4);
        let average = engine.average_reputation(id, &trust);
        assert!(average.is_some_and(|r| (r - 0.6).abs() < 1e-9));
        assert!(engine.average_reputation(AllianceId::new(), &trust).is_none());
    }

    #[test]
    fn collective_mood_of_members() {
        let mut engine = AllianceEngine::default();
        let id = propose(&mut engine, &["a"]);
        engine.accept_invitation(id, &SeedId::from("a"));

        let mut moods = crate::mood::MoodEngine::default();
        assert!(engine.collective_mood(id, &moods).is_none());
        moods.update_mood(
            &founder(),
            PadState::new(0.4, 0.0, 0.0),
            crate::mood::MoodUpdateMetadata::new("test", "unit"),
        );
        let mood = engine.collective_mood(id, &moods);
        assert!(mood.is_some_and(|m| (m.valence - 0.4).abs() < 1e-9));
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn reload_restores_alliances_and_index() {
        let store = Arc::new(InMemoryPersistence::new());
        let mut first = AllianceEngine::default().with_persistence(store.clone());
        let id = propose(&mut first, &["a"]);
        first.accept_invitation(id, &SeedId::from("a"));
        let pending = propose(&mut first, &["b"]);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let mut second = AllianceEngine::default().with_persistence(store);
        assert_eq!(second.load_from_persistence().await, 1);
        assert_eq!(second.alliances_for_agent(&SeedId::from("a")).len(), 1);
        assert_eq!(second.pending_invitations_for(&SeedId::from("b")).len(), 1);
        assert!(second.accept_invitation(pending, &SeedId::from("b")));
    }

    #[tokio::test]
    async fn persistence_failure_does_not_block_protocol() {
        let store = Arc::new(InMemoryPersistence::new());
        store.set_fail_writes(true);
        let mut engine = AllianceEngine::default().with_persistence(store);
        let id = propose(&mut engine, &["a"]);
        assert!(engine.accept_invitation(id, &SeedId::from("a")));
        assert!(engine.get_alliance(id).is_some());
    }
}
