//! Batch simulation runtime: logical clock, concurrent paper processing,
//! and checkpointed resume.

use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinSet;

use colloquy_config::PipelineConfig;
use colloquy_llm::GenerativeClient;
use colloquy_memory::{DurableStore, MemoryStream, VectorCache};

use crate::citation::Paper;
use crate::error::CoreError;
use crate::researcher::Researcher;
use crate::state::StateStore;

/// State key under which the resume checkpoint is persisted.
pub const CHECKPOINT_KEY: &str = "simulation_state";

/// Logical simulation time, advanced one hour per processed paper.
/// Independent of wall clock so resumed runs stay continuous.
#[derive(Debug, Clone, Copy)]
pub struct SimulationClock {
    current: DateTime<Utc>,
}

impl SimulationClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { current: start }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.current
    }

    pub fn advance_hours(&mut self, hours: i64) {
        self.current += Duration::hours(hours);
    }
}

/// Resume point persisted after every batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Papers already processed.
    pub offset: usize,
    /// Logical time at the checkpoint.
    pub current_time: DateTime<Utc>,
    /// Agent names active when the checkpoint was taken.
    pub agents: Vec<String>,
}

/// Load the checkpoint, treating a missing or unreadable one as a fresh
/// start.
pub async fn load_checkpoint(store: &dyn StateStore) -> Result<Option<Checkpoint>, CoreError> {
    let value = store.read(CHECKPOINT_KEY).await?;
    if value.is_null() {
        return Ok(None);
    }
    match serde_json::from_value(value) {
        Ok(checkpoint) => Ok(Some(checkpoint)),
        Err(err) => {
            warn!("checkpoint is unreadable, starting fresh: {err}");
            Ok(None)
        }
    }
}

pub async fn save_checkpoint(
    store: &dyn StateStore,
    checkpoint: &Checkpoint,
) -> Result<(), CoreError> {
    let value = serde_json::to_value(checkpoint)?;
    store
        .update(CHECKPOINT_KEY, Box::new(move |_| value))
        .await
}

/// Build the research team described by the configuration, binding each
/// agent to its own memory stream over the shared storage tiers.
pub async fn build_team(
    config: &PipelineConfig,
    llm: Arc<dyn GenerativeClient>,
    vector: Option<Arc<dyn VectorCache>>,
    durable: Option<Arc<dyn DurableStore>>,
    state: Arc<dyn StateStore>,
) -> Vec<Arc<Researcher>> {
    let mut team = Vec::with_capacity(config.agents.len());
    for agent in &config.agents {
        let memory = MemoryStream::new(
            &agent.name,
            config.memory.vector_dim,
            llm.clone(),
            vector.clone(),
            durable.clone(),
        )
        .await;
        let mut researcher = Researcher::new(
            &agent.name,
            &agent.persona,
            &config.topic,
            llm.clone(),
            memory,
            state.clone(),
        );
        if config.claims_enabled {
            researcher = researcher.with_claim_extraction();
        }
        team.push(Arc::new(researcher));
    }
    team
}

/// Process one batch of papers concurrently, one task per paper. A failed
/// task is logged and never aborts the rest of the batch.
pub async fn process_batch(
    agents: &[Arc<Researcher>],
    papers: Vec<Paper>,
    time: DateTime<Utc>,
) {
    let mut tasks = JoinSet::new();
    for paper in papers {
        let agents: Vec<Arc<Researcher>> = agents.to_vec();
        tasks.spawn(async move {
            for agent in &agents {
                agent.perceive_paper(&paper, time).await;
            }
        });
    }
    while let Some(result) = tasks.join_next().await {
        if let Err(err) = result {
            warn!("paper task failed: {err}");
        }
    }
}

/// Per-agent reflection followed by pairwise discussions seeded with the
/// fresh reflections.
pub async fn reflect_and_discuss(agents: &[Arc<Researcher>], time: DateTime<Utc>) {
    let mut insights = Vec::with_capacity(agents.len());
    for agent in agents {
        insights.push(agent.reflect(time).await);
    }
    for i in 0..agents.len() {
        for j in (i + 1)..agents.len() {
            agents[i]
                .discuss_with(&agents[j], time, &insights[i], &insights[j])
                .await;
        }
    }
}

/// Drive the whole corpus through the team in batches, resuming from the
/// persisted checkpoint and saving a new one after every batch.
pub async fn run_simulation(
    agents: &[Arc<Researcher>],
    papers: &[Paper],
    batch_size: usize,
    state: &dyn StateStore,
) -> Result<(), CoreError> {
    let batch_size = batch_size.max(1);
    let checkpoint = load_checkpoint(state).await?;
    let mut offset = checkpoint.as_ref().map(|c| c.offset).unwrap_or(0);
    let mut clock = SimulationClock::new(
        checkpoint
            .as_ref()
            .map(|c| c.current_time)
            .unwrap_or_else(Utc::now),
    );

    if offset >= papers.len() {
        info!("corpus already processed, nothing to resume");
        return Ok(());
    }

    while offset < papers.len() {
        let end = (offset + batch_size).min(papers.len());
        info!("processing papers {offset}..{end} of {}", papers.len());
        let batch = papers[offset..end].to_vec();
        let count = batch.len();

        process_batch(agents, batch, clock.now()).await;
        clock.advance_hours(count as i64);
        reflect_and_discuss(agents, clock.now()).await;

        offset = end;
        let checkpoint = Checkpoint {
            offset,
            current_time: clock.now(),
            agents: agents.iter().map(|a| a.name().to_string()).collect(),
        };
        save_checkpoint(state, &checkpoint).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Checkpoint, SimulationClock, load_checkpoint, save_checkpoint};
    use crate::state::{MemoryStateStore, StateStore};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    #[test]
    fn clock_advances_independently_of_wall_time() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut clock = SimulationClock::new(start);
        clock.advance_hours(5);
        assert_eq!(clock.now() - start, chrono::Duration::hours(5));
    }

    #[tokio::test]
    async fn checkpoint_round_trips_through_the_store() {
        let store = MemoryStateStore::new();
        assert_eq!(load_checkpoint(&store).await.unwrap(), None);

        let checkpoint = Checkpoint {
            offset: 10,
            current_time: Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap(),
            agents: vec!["Dr. Analysis".to_string(), "Dr. Synthesis".to_string()],
        };
        save_checkpoint(&store, &checkpoint).await.unwrap();
        assert_eq!(load_checkpoint(&store).await.unwrap(), Some(checkpoint));
    }

    #[tokio::test]
    async fn unreadable_checkpoint_starts_fresh() {
        let store = MemoryStateStore::new();
        store
            .update(
                super::CHECKPOINT_KEY,
                Box::new(|_| serde_json::json!({"offset": "not a number"})),
            )
            .await
            .unwrap();
        assert_eq!(load_checkpoint(&store).await.unwrap(), None);
    }
}
