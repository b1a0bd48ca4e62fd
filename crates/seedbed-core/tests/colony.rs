//! End-to-end colony scenarios: stimuli, sessions, reflection, alliances.

use std::sync::Arc;
use std::time::Duration;

use seedbed_agents::{
    AllianceCharter, BrowsingAction, InMemoryPersistence, LlmError, ReflectionLlm,
    SessionAction, TrustProvider,
};
use seedbed_core::{AgentProfile, Colony, SeedbedConfig, WarmStart};
use seedbed_router::SubscriptionFilter;
use seedbed_types::{
    HexacoTraits, PadState, SeedId, StimulusPriority, StimulusType, TipDataType, TipPayload,
    WorldFeedPayload,
};
use tokio::sync::Notify;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn profile(id: &str, filter: SubscriptionFilter) -> AgentProfile {
    AgentProfile {
        seed_id: SeedId::from(id),
        name: id.to_owned(),
        base_prompt: format!("You are {id}, a thoughtful member of the colony."),
        traits: HexacoTraits::default(),
        filter,
    }
}

fn feed(headline: &str) -> WorldFeedPayload {
    WorldFeedPayload {
        headline: headline.to_owned(),
        body: None,
        category: String::from("world"),
        source_name: String::from("wire"),
        source_url: None,
    }
}

fn comments(n: usize) -> Vec<SessionAction> {
    vec![SessionAction::single(BrowsingAction::Comment); n]
}

fn suggest(texts: &'static [&'static str]) -> impl ReflectionLlm {
    move |_system: String, user: String| async move {
        assert!(user.contains("Current mood:"));
        let quoted: Vec<String> = texts.iter().map(|t| format!("\"{t}\"")).collect();
        Ok::<String, LlmError>(format!("{{\"adaptations\": [{}]}}", quoted.join(", ")))
    }
}

struct Friendly;

impl TrustProvider for Friendly {
    fn trust(&self, _from: &SeedId, _to: &SeedId) -> f64 {
        0.9
    }

    fn reputation(&self, _seed_id: &SeedId) -> f64 {
        0.7
    }
}

// ---------------------------------------------------------------------------
// Stimuli
// ---------------------------------------------------------------------------

#[tokio::test]
async fn filters_decide_whose_mood_moves() {
    let colony = Colony::new(&SeedbedConfig::default());
    colony
        .register_agent(profile("news", SubscriptionFilter::all()))
        .await;
    colony
        .register_agent(profile(
            "tips",
            SubscriptionFilter::all().with_types([StimulusType::Tip]),
        ))
        .await;

    let tips = SeedId::from("tips");
    let news = SeedId::from("news");
    let tips_before = colony.mood_of(&tips).await;

    colony
        .router()
        .ingest_world_feed(
            feed("Terrible disaster and awful collapse"),
            Some(StimulusPriority::Breaking),
        )
        .await;

    assert_eq!(colony.mood_of(&tips).await, tips_before);
    let news_mood = colony.mood_of(&news).await.unwrap_or(PadState::NEUTRAL);
    assert!(news_mood.valence < 0.0);

    colony
        .router()
        .ingest_tip(
            TipPayload {
                tip_id: String::from("t-1"),
                content: String::from("Great progress, a wonderful win"),
                data_type: TipDataType::Text,
                attribution: None,
            },
            Some(vec![tips.clone()]),
            None,
        )
        .await;

    let tips_after = colony.mood_of(&tips).await.unwrap_or(PadState::NEUTRAL);
    assert!(tips_before.is_some_and(|before| tips_after.valence > before.valence));
}

// ---------------------------------------------------------------------------
// Sessions and reflection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sessions_drive_trait_ticks() {
    let colony = Colony::new(&SeedbedConfig::default());
    colony
        .register_agent(profile("ada", SubscriptionFilter::all()))
        .await;
    let ada = SeedId::from("ada");

    let first = colony.complete_session(&ada, &comments(10), &[]).await;
    assert!(first.is_ok_and(|r| r.trait_tick.is_none()));

    let second = colony
        .complete_session(&ada, &comments(10), &[String::from("arena")])
        .await;
    assert!(second.is_ok_and(|r| r.trait_tick.is_some()));

    let traits = colony.traits_of(&ada).await.unwrap_or_default();
    assert!(traits.extraversion > 0.5);
    assert!(traits.extraversion <= 0.65 + 1e-9);
}

#[tokio::test]
async fn reflection_after_twenty_sessions_adds_overlay() {
    let colony = Colony::new(&SeedbedConfig::default());
    colony
        .register_agent(profile("ada", SubscriptionFilter::all()))
        .await;
    let ada = SeedId::from("ada");
    let llm = suggest(&["Ask one clarifying question.", "Thank people who help."]);

    for _ in 0..19 {
        let report = colony.complete_session(&ada, &comments(1), &[]).await;
        assert!(report.is_ok());
    }
    let early = colony.reflect(&ada, Vec::new(), &llm).await;
    assert!(early.is_ok_and(|o| o.is_none()));

    let last = colony.complete_session(&ada, &comments(1), &[]).await;
    assert!(last.is_ok());
    let outcome = colony
        .reflect(&ada, vec![String::from("commented on 20 threads")], &llm)
        .await;
    assert!(outcome.is_ok_and(|o| o.is_some_and(|o| o.added.len() == 2)));

    let prompt = colony.assembled_prompt(&ada).await.unwrap_or_default();
    assert!(prompt.starts_with("You are ada"));
    assert!(prompt.contains("Learned behaviors"));
    assert!(prompt.contains("- Ask one clarifying question."));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_reflection_does_not_block_other_agents() {
    let colony = Arc::new(Colony::new(&SeedbedConfig::default()));
    for id in ["ada", "bo"] {
        colony
            .register_agent(profile(id, SubscriptionFilter::all()))
            .await;
    }
    let ada = SeedId::from("ada");
    let bo = SeedId::from("bo");
    for _ in 0..20 {
        let report = colony.complete_session(&ada, &comments(1), &[]).await;
        assert!(report.is_ok());
    }

    let release = Arc::new(Notify::new());
    let gate = Arc::clone(&release);
    let held_llm = move |_system: String, _user: String| {
        let gate = Arc::clone(&gate);
        async move {
            gate.notified().await;
            Ok::<String, LlmError>(String::from(
                r#"{"adaptations": ["Ask one clarifying question."]}"#,
            ))
        }
    };
    let reflecting = {
        let colony = Arc::clone(&colony);
        let ada = ada.clone();
        tokio::spawn(async move { colony.reflect(&ada, Vec::new(), &held_llm).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let session = tokio::time::timeout(
        Duration::from_secs(1),
        colony.complete_session(&bo, &comments(1), &[]),
    )
    .await;
    assert!(session.is_ok_and(|r| r.is_ok()));
    let bo_prompt = tokio::time::timeout(Duration::from_secs(1), colony.assembled_prompt(&bo)).await;
    assert!(bo_prompt.is_ok());

    release.notify_one();
    let outcome = reflecting.await;
    assert!(outcome.is_ok_and(|r| r.is_ok_and(|o| o.is_some_and(|o| o.added.len() == 1))));
    assert_eq!(colony.adaptations_of(&ada).await.len(), 1);
}

// ---------------------------------------------------------------------------
// Alliances
// ---------------------------------------------------------------------------

#[tokio::test]
async fn alliance_mood_averages_members() {
    let colony = Colony::new(&SeedbedConfig::default());
    for id in ["ada", "bo", "cy"] {
        colony
            .register_agent(profile(id, SubscriptionFilter::all()))
            .await;
    }
    let ada = SeedId::from("ada");

    let alliance_id = {
        let mut alliances = colony.alliances().await;
        let proposal = alliances.propose_alliance(
            &ada,
            vec![SeedId::from("bo"), SeedId::from("cy")],
            AllianceCharter {
                name: String::from("Night Owls"),
                description: String::from("Late-night science threads"),
                shared_topics: Vec::new(),
            },
            &Friendly,
        );
        assert!(proposal.is_ok());
        let id = proposal.map(|p| p.alliance_id).unwrap_or_default();
        assert!(alliances.accept_invitation(id, &SeedId::from("bo")));
        assert!(alliances.accept_invitation(id, &SeedId::from("cy")));
        id
    };

    let collective = colony.alliance_mood(alliance_id).await;
    let single = colony.mood_of(&ada).await;
    // identical personalities share a baseline
    assert!(
        collective
            .zip(single)
            .is_some_and(|(c, s)| (c.valence - s.valence).abs() < 1e-9)
    );
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn second_colony_warm_starts_from_store() {
    let store = Arc::new(InMemoryPersistence::new());
    let config = SeedbedConfig::default();

    let first = Colony::with_persistence(&config, &store);
    let warm = first
        .register_agent(profile("ada", SubscriptionFilter::all()))
        .await;
    assert_eq!(warm, WarmStart::default());
    let report = first
        .complete_session(&SeedId::from("ada"), &comments(15), &[])
        .await;
    assert!(report.is_ok_and(|r| r.trait_tick.is_some()));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let second = Colony::with_persistence(&config, &store);
    let warm = second
        .register_agent(profile("ada", SubscriptionFilter::all()))
        .await;
    assert_eq!(
        warm,
        WarmStart {
            mood: true,
            traits: true,
            prompts: true,
        }
    );
    let traits = second.traits_of(&SeedId::from("ada")).await.unwrap_or_default();
    assert!(traits.extraversion > 0.5);
}
