//! Scripted colony run.
//!
//! Brings a handful of agents online, routes one of every stimulus type,
//! plays twenty browsing sessions per agent, lets each reflect, and forms
//! an alliance among the agents that share topics. Trust, topics and the
//! reflection model are in-process stand-ins.

use std::collections::BTreeMap;

use seedbed_agents::{
    AllianceCharter, AllianceEngine, AllianceEvent, BrowsingAction, LlmError, SessionAction,
    TopicProvider, TrustProvider,
};
use seedbed_core::{AgentProfile, Colony};
use seedbed_router::SubscriptionFilter;
use seedbed_types::{
    AgentReplyPayload, ChannelMessagePayload, ConversationType, HexacoTraits,
    InternalThoughtPayload, SeedId, StimulusPriority, TipDataType, TipPayload, WorldFeedPayload,
};
use tracing::{info, warn};

use crate::error::EngineError;

/// Browsing sessions played per agent.
const SESSIONS_PER_AGENT: usize = 20;

/// Trust level the demo agents extend to each other.
const COLONY_TRUST: f64 = 0.8;

/// Trust anyone extends to or receives from the outsider.
const OUTSIDER_TRUST: f64 = 0.2;

/// Agent nobody trusts.
const OUTSIDER: &str = "mallory";

/// What the scripted run produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DemoSummary {
    /// Agents brought online.
    pub agents: usize,
    /// Stimuli routed.
    pub events_routed: u64,
    /// Trait ticks applied across all agents.
    pub trait_ticks: u64,
    /// Adaptations active at the end.
    pub adaptations: usize,
    /// Alliances formed.
    pub alliances_formed: usize,
}

// ---------------------------------------------------------------------------
// Stand-in collaborators
// ---------------------------------------------------------------------------

/// Everyone trusts everyone except the outsider.
struct DemoTrust;

impl TrustProvider for DemoTrust {
    fn trust(&self, from: &SeedId, to: &SeedId) -> f64 {
        if from.as_str() == OUTSIDER || to.as_str() == OUTSIDER {
            OUTSIDER_TRUST
        } else {
            COLONY_TRUST
        }
    }

    fn reputation(&self, seed_id: &SeedId) -> f64 {
        if seed_id.as_str() == OUTSIDER { 0.1 } else { 0.6 }
    }
}

/// Fixed topic subscriptions.
struct DemoTopics(BTreeMap<SeedId, Vec<String>>);

impl TopicProvider for DemoTopics {
    fn subscriptions(&self, seed_id: &SeedId) -> Vec<String> {
        self.0.get(seed_id).cloned().unwrap_or_default()
    }
}

/// Reflection model that proposes habits from the mood line of the prompt.
async fn scripted_llm(_system: String, user: String) -> Result<String, LlmError> {
    let mut adaptations = vec!["Ask one clarifying question before replying."];
    if user.contains("Current mood: excited") || user.contains("Current mood: engaged") {
        adaptations.push("Share one surprising fact per thread.");
    } else {
        adaptations.push("Summarize long debates before adding to them.");
    }
    Ok(serde_json::json!({ "adaptations": adaptations }).to_string())
}

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

fn roster() -> Vec<(AgentProfile, Vec<&'static str>)> {
    let agent = |id: &str, extraversion: f64, agreeableness: f64, filter| AgentProfile {
        seed_id: SeedId::from(id),
        name: id.to_owned(),
        base_prompt: format!("You are {id}, a resident of the Seedbed colony."),
        traits: HexacoTraits {
            extraversion,
            agreeableness,
            ..HexacoTraits::default()
        },
        filter,
    };
    vec![
        (
            agent("ada", 0.7, 0.6, SubscriptionFilter::all()),
            vec!["astronomy", "physics", "music"],
        ),
        (
            agent("bo", 0.4, 0.7, SubscriptionFilter::all()),
            vec!["physics", "astronomy"],
        ),
        (
            agent(
                "cy",
                0.5,
                0.5,
                SubscriptionFilter::all().with_categories(["science"]),
            ),
            vec!["astronomy", "physics", "chess"],
        ),
        (
            agent(OUTSIDER, 0.6, 0.2, SubscriptionFilter::all()),
            vec!["astronomy", "physics"],
        ),
    ]
}

fn session_for(index: usize) -> Vec<SessionAction> {
    let mut actions = vec![
        SessionAction::chained(BrowsingAction::ReadComments, BrowsingAction::Comment),
        SessionAction::single(BrowsingAction::Upvote),
    ];
    if index.checked_rem(3) == Some(0) {
        actions.push(SessionAction::single(BrowsingAction::CreatePost));
    }
    if index.checked_rem(4) == Some(0) {
        actions.push(SessionAction::single(BrowsingAction::Downvote));
    }
    actions
}

async fn route_stimuli(colony: &Colony) {
    let router = colony.router();
    router
        .ingest_world_feed(
            WorldFeedPayload {
                headline: String::from("Amazing breakthrough in exoplanet imaging"),
                body: Some(String::from("Astronomers celebrate a brilliant success.")),
                category: String::from("science"),
                source_name: String::from("Sky Wire"),
                source_url: None,
            },
            None,
        )
        .await;
    router
        .ingest_world_feed(
            WorldFeedPayload {
                headline: String::from("Budget crisis deepens after failed vote"),
                body: None,
                category: String::from("politics"),
                source_name: String::from("Capitol Desk"),
                source_url: None,
            },
            Some(StimulusPriority::Breaking),
        )
        .await;
    router
        .ingest_tip(
            TipPayload {
                tip_id: String::from("tip-1"),
                content: String::from("The new telescope data is really great"),
                data_type: TipDataType::Text,
                attribution: Some(String::from("reader")),
            },
            Some(vec![SeedId::from("bo")]),
            None,
        )
        .await;
    for tick in 1..=3_u64 {
        router.emit_cron_tick("hourly", tick).await;
    }
    router
        .emit_agent_reply(
            AgentReplyPayload {
                reply_to_post_id: String::from("post-7"),
                reply_from_seed_id: SeedId::from("bo"),
                content: String::from("I disagree, that analysis looks wrong"),
            },
            SeedId::from("ada"),
            None,
        )
        .await;
    router
        .emit_internal_thought(
            SeedId::from("cy"),
            InternalThoughtPayload {
                topic: String::from("why chess openings repeat"),
                prompt: None,
            },
        )
        .await;
    router
        .ingest_channel_message(
            ChannelMessagePayload {
                platform: String::from("telegram"),
                conversation_id: String::from("dm-ada"),
                conversation_type: ConversationType::Direct,
                sender_name: String::from("owner"),
                sender_platform_id: String::from("u-1"),
                content: String::from("Thanks, you have been so helpful today!"),
                message_id: String::from("m-1"),
                is_owner: true,
            },
            SeedId::from("ada"),
            None,
        )
        .await;
}

/// Run the script against `colony`.
pub async fn run(colony: &Colony) -> Result<DemoSummary, EngineError> {
    let mut alliance_events = colony.alliances().await.subscribe_events();

    let roster = roster();
    let mut topics = BTreeMap::new();
    for (profile, subscribed) in &roster {
        topics.insert(
            profile.seed_id.clone(),
            subscribed.iter().map(|t| (*t).to_owned()).collect(),
        );
        colony.register_agent(profile.clone()).await;
    }
    let topics = DemoTopics(topics);
    let seeds: Vec<SeedId> = roster.iter().map(|(p, _)| p.seed_id.clone()).collect();

    route_stimuli(colony).await;
    for seed_id in &seeds {
        if let Some(label) = colony.mood_label(seed_id).await {
            info!(seed_id = %seed_id, mood = %label, "mood after stimuli");
        }
    }

    let mut trait_ticks: u64 = 0;
    for index in 0..SESSIONS_PER_AGENT {
        let enclaves = if index.checked_rem(2) == Some(0) {
            vec![String::from("proof-theory")]
        } else {
            vec![String::from("creative-chaos")]
        };
        for seed_id in &seeds {
            let report = colony
                .complete_session(seed_id, &session_for(index), &enclaves)
                .await?;
            if report.trait_tick.is_some() {
                trait_ticks = trait_ticks.saturating_add(1);
            }
        }
    }

    let mut adaptations: usize = 0;
    for seed_id in &seeds {
        let activity = vec![format!("played {SESSIONS_PER_AGENT} browsing sessions")];
        if let Some(outcome) = colony.reflect(seed_id, activity, &scripted_llm).await? {
            info!(
                seed_id = %seed_id,
                added = outcome.added.len(),
                reinforced = outcome.reinforced.len(),
                rejected = outcome.rejected.len(),
                "reflection complete"
            );
        }
        adaptations = adaptations.saturating_add(colony.adaptations_of(seed_id).await.len());
        colony.decay_mood(seed_id, 5).await;
    }

    let alliances_formed = form_alliances(colony, &seeds, &topics).await?;

    while let Ok(event) = alliance_events.try_recv() {
        if let AllianceEvent::Formed { alliance } = event {
            info!(alliance_id = %alliance.alliance_id, name = %alliance.name, "observed formation");
        }
    }

    let stats = colony.router().stats().await;
    info!(
        total_events = stats.total_events,
        failed_deliveries = stats.failed_deliveries,
        history_len = stats.history_len,
        "router stats"
    );

    Ok(DemoSummary {
        agents: seeds.len(),
        events_routed: stats.total_events,
        trait_ticks,
        adaptations,
        alliances_formed,
    })
}

async fn form_alliances(
    colony: &Colony,
    seeds: &[SeedId],
    topics: &DemoTopics,
) -> Result<usize, EngineError> {
    let Some((founder, invitees)) = seeds.split_first() else {
        return Ok(0);
    };
    let shared = AllianceEngine::detect_shared_topics(seeds, topics);
    let charter = AllianceCharter {
        name: String::from("Stargazers"),
        description: String::from("Agents who follow the night sky"),
        shared_topics: shared,
    };

    // The outsider sinks the first attempt.
    let attempt = colony.alliances().await.propose_alliance(
        founder,
        invitees.to_vec(),
        charter.clone(),
        &DemoTrust,
    );
    if let Err(e) = attempt {
        warn!(founder = %founder, error = %e, "alliance proposal rejected");
    }

    let trusted: Vec<SeedId> = invitees
        .iter()
        .filter(|s| s.as_str() != OUTSIDER)
        .cloned()
        .collect();
    let proposal = colony.alliances().await.propose_alliance(
        founder,
        trusted.clone(),
        charter,
        &DemoTrust,
    )?;
    for invitee in &trusted {
        colony
            .alliances()
            .await
            .accept_invitation(proposal.alliance_id, invitee);
    }

    let alliances = colony.alliances().await;
    let reputation = alliances.average_reputation(proposal.alliance_id, &DemoTrust);
    let formed = alliances.active_alliances().len();
    drop(alliances);

    let mood = colony.alliance_mood(proposal.alliance_id).await;
    info!(
        alliance_id = %proposal.alliance_id,
        ?reputation,
        ?mood,
        "alliance summary"
    );
    Ok(formed)
}
