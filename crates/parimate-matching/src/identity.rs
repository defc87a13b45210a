use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use parimate_media::FrameSampler;
use parimate_types::{
    Check, CheckContext, CheckId, CheckResult, Frame, MatchingConfig, OwnerId, ParimateError,
};

/// Face embedding and verification model.
#[async_trait]
pub trait FaceVerifier: Send + Sync {
    /// Embedding of the single face in a reference photo.
    async fn embed(&self, frame: &Frame) -> Result<Vec<f32>, ParimateError>;

    /// Whether the face in `frame` belongs to the person behind `reference`.
    async fn verify(&self, frame: &Frame, reference: &[f32]) -> Result<bool, ParimateError>;
}

/// Persistence of each user's reference face embedding.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn reference_for(&self, owner: OwnerId) -> Result<Option<Vec<f32>>, ParimateError>;

    async fn store_reference(&self, owner: OwnerId, embedding: Vec<f32>)
    -> Result<(), ParimateError>;
}

/// Process-local reference store.
#[derive(Debug, Default, Clone)]
pub struct MemoryReferenceStore {
    references: Arc<DashMap<OwnerId, Vec<f32>>>,
}

impl MemoryReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReferenceStore for MemoryReferenceStore {
    async fn reference_for(&self, owner: OwnerId) -> Result<Option<Vec<f32>>, ParimateError> {
        Ok(self.references.get(&owner).map(|r| r.value().clone()))
    }

    async fn store_reference(
        &self,
        owner: OwnerId,
        embedding: Vec<f32>,
    ) -> Result<(), ParimateError> {
        self.references.insert(owner, embedding);
        Ok(())
    }
}

/// The person on camera is the account owner.
///
/// Every sampled frame is verified against the stored reference; frames
/// the verifier cannot judge are skipped. The check passes when the share
/// of verified frames reaches `identity_min_ratio`.
#[derive(Clone)]
pub struct IdentityCheck {
    verifier: Arc<dyn FaceVerifier>,
    references: Arc<dyn ReferenceStore>,
    sampler: FrameSampler,
    min_ratio: f64,
}

impl IdentityCheck {
    pub fn new(
        verifier: Arc<dyn FaceVerifier>,
        references: Arc<dyn ReferenceStore>,
        sampler: FrameSampler,
        config: &MatchingConfig,
    ) -> Self {
        Self {
            verifier,
            references,
            sampler,
            min_ratio: config.identity_min_ratio,
        }
    }

    /// Embed a reference photo and store it for `owner`.
    pub async fn register_reference(
        &self,
        owner: OwnerId,
        photo: &Frame,
    ) -> Result<(), ParimateError> {
        let embedding = self.verifier.embed(photo).await?;
        self.references.store_reference(owner, embedding).await?;
        tracing::info!(owner = %owner.0, "Stored reference face");
        Ok(())
    }
}

#[async_trait]
impl Check for IdentityCheck {
    fn id(&self) -> CheckId {
        CheckId::Identity
    }

    async fn run(&self, ctx: &CheckContext) -> Result<CheckResult, ParimateError> {
        let reference = self
            .references
            .reference_for(ctx.owner_id)
            .await?
            .ok_or(ParimateError::ReferenceMissing(ctx.owner_id))?;

        let sampler = self.sampler.clone();
        let path: PathBuf = ctx.video_path.clone();
        let frames = tokio::task::spawn_blocking(move || sampler.sample(&path))
            .await
            .map_err(|e| ParimateError::Internal(format!("frame sampling task failed: {e}")))??;

        let (mut judged, mut verified) = (0usize, 0usize);
        for frame in &frames {
            match self.verifier.verify(frame, &reference).await {
                Ok(same) => {
                    judged += 1;
                    if same {
                        verified += 1;
                    }
                }
                Err(e) => tracing::debug!(session_id = %ctx.session_id, error = %e, "Face not verifiable"),
            }
        }

        if judged == 0 {
            return Ok(CheckResult::inconclusive(format!(
                "no verifiable face in {} frames",
                frames.len()
            )));
        }
        let share = verified as f64 / judged as f64;
        tracing::debug!(session_id = %ctx.session_id, verified, judged, "Identity scored");
        Ok(CheckResult::scored(share, self.min_ratio, judged))
    }
}
