use crate::media::{MediaFile, validate_image, validate_video};
use sui::interface::{MarketplaceInterface, RegisterMomentRequest};
use sui::{MarketplaceError, constants};
use thiserror::Error;
use tracing::{debug, info, warn};
use walrus::{WalrusClient, WalrusUploadResult};

/// Progress weights: 10% pre-flight validation, 40% video upload, 50%
/// thumbnail upload, so one bar can represent the whole pipeline.
const PRE_FLIGHT_WEIGHT: f64 = 10.0;
const VIDEO_WEIGHT: f64 = 40.0;
const THUMBNAIL_WEIGHT: f64 = 50.0;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Transaction build failed: {0}")]
    Build(String),

    #[error("Transaction submission failed: {0}")]
    Wallet(String),
}

/// Registration pipeline states, in order of progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    Validating,
    UploadingVideo,
    UploadingThumbnail,
    BuildingTransaction,
    AwaitingSignature,
    Success { digest: String },
    Failed { message: String },
}

/// Descriptive form fields for a new moment.
#[derive(Debug, Clone)]
pub struct MomentForm {
    pub match_id: String,
    pub fighter_a: String,
    pub fighter_b: String,
    pub moment_type: String,
    pub max_supply: u64,
}

/// Blend per-phase completion into a single progress figure.
pub fn blend_progress(pre_flight_done: bool, video_pct: f64, thumbnail_pct: f64) -> f64 {
    let pre = if pre_flight_done { PRE_FLIGHT_WEIGHT } else { 0.0 };
    pre + video_pct / 100.0 * VIDEO_WEIGHT + thumbnail_pct / 100.0 * THUMBNAIL_WEIGHT
}

/// The admin registration flow:
/// idle → validating → uploading(video) → uploading(thumbnail) →
/// building-transaction → awaiting-signature → success | failed.
///
/// Validation gates run before any network call. Uploads are sequential.
/// A build or signing failure keeps the completed upload results, so a
/// resubmission does not re-upload.
pub struct RegistrationFlow {
    state: FlowState,
    video_result: Option<WalrusUploadResult>,
    thumbnail_result: Option<WalrusUploadResult>,
}

impl RegistrationFlow {
    pub fn new() -> Self {
        Self {
            state: FlowState::Idle,
            video_result: None,
            thumbnail_result: None,
        }
    }

    /// Resume a two-step flow whose uploads already completed (e.g. after
    /// a rejected signature).
    pub fn resume(
        video_result: WalrusUploadResult,
        thumbnail_result: WalrusUploadResult,
    ) -> Self {
        Self {
            state: FlowState::BuildingTransaction,
            video_result: Some(video_result),
            thumbnail_result: Some(thumbnail_result),
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn video_result(&self) -> Option<&WalrusUploadResult> {
        self.video_result.as_ref()
    }

    pub fn thumbnail_result(&self) -> Option<&WalrusUploadResult> {
        self.thumbnail_result.as_ref()
    }

    /// Current progress, 0..=100.
    pub fn progress(&self) -> f64 {
        match &self.state {
            FlowState::Idle | FlowState::Validating => 0.0,
            FlowState::UploadingVideo => blend_progress(true, 0.0, 0.0),
            FlowState::UploadingThumbnail => blend_progress(true, 100.0, 0.0),
            FlowState::BuildingTransaction
            | FlowState::AwaitingSignature
            | FlowState::Success { .. } => blend_progress(true, 100.0, 100.0),
            FlowState::Failed { .. } => blend_progress(
                false,
                if self.video_result.is_some() { 100.0 } else { 0.0 },
                if self.thumbnail_result.is_some() { 100.0 } else { 0.0 },
            ),
        }
    }

    /// Reset everything, discarding upload results.
    pub fn reset(&mut self) {
        self.state = FlowState::Idle;
        self.video_result = None;
        self.thumbnail_result = None;
    }

    fn fail(&mut self, message: String) {
        self.state = FlowState::Failed { message };
    }

    /// Validate and upload both media files. Already-uploaded results are
    /// kept, so a retried flow only uploads what is missing.
    pub async fn upload_media(
        &mut self,
        client: &WalrusClient,
        video: &MediaFile,
        thumbnail: &MediaFile,
    ) -> Result<(), FlowError> {
        self.state = FlowState::Validating;

        if let Err(e) = validate_video(video) {
            self.fail(e.to_string());
            return Err(FlowError::Validation(e.to_string()));
        }
        if let Err(e) = validate_image(thumbnail) {
            self.fail(e.to_string());
            return Err(FlowError::Validation(e.to_string()));
        }

        if self.video_result.is_none() {
            self.state = FlowState::UploadingVideo;
            match client.upload(video.bytes.clone()).await {
                Ok(result) => {
                    debug!("Video uploaded: {}", result.blob_id);
                    self.video_result = Some(result);
                }
                Err(e) => {
                    // Upload failures discard partial results; the next
                    // attempt starts the upload phase over.
                    self.video_result = None;
                    self.thumbnail_result = None;
                    self.fail(e.to_string());
                    return Err(FlowError::Upload(e.to_string()));
                }
            }
        } else {
            debug!("Video already uploaded; skipping");
        }

        if self.thumbnail_result.is_none() {
            self.state = FlowState::UploadingThumbnail;
            match client.upload(thumbnail.bytes.clone()).await {
                Ok(result) => {
                    debug!("Thumbnail uploaded: {}", result.blob_id);
                    self.thumbnail_result = Some(result);
                }
                Err(e) => {
                    // Keep the finished video upload for the retry.
                    self.fail(e.to_string());
                    return Err(FlowError::Upload(e.to_string()));
                }
            }
        } else {
            debug!("Thumbnail already uploaded; skipping");
        }

        self.state = FlowState::BuildingTransaction;
        Ok(())
    }

    /// Assemble the registration request from the form and the completed
    /// uploads. The video blob doubles as the content hash source.
    fn prepare_request(&mut self, form: &MomentForm) -> Result<RegisterMomentRequest, FlowError> {
        let (Some(video), Some(thumbnail)) = (&self.video_result, &self.thumbnail_result) else {
            let message = "uploads are not complete".to_string();
            self.fail(message.clone());
            return Err(FlowError::Build(message));
        };

        self.state = FlowState::BuildingTransaction;
        Ok(RegisterMomentRequest {
            match_id: form.match_id.clone(),
            fighter_a: form.fighter_a.clone(),
            fighter_b: form.fighter_b.clone(),
            moment_type: form.moment_type.clone(),
            video_blob_id: video.blob_id.clone(),
            thumbnail_blob_id: thumbnail.blob_id.clone(),
            content_hash: video.hash.clone(),
            max_supply: form.max_supply,
        })
    }

    /// Record the submission outcome. Failures keep the upload results so
    /// the user can resubmit without re-uploading.
    fn record_outcome(
        &mut self,
        outcome: Result<String, MarketplaceError>,
    ) -> Result<String, FlowError> {
        match outcome {
            Ok(digest) => {
                info!("Moment registered: {}", digest);
                self.state = FlowState::Success {
                    digest: digest.clone(),
                };
                Ok(digest)
            }
            Err(e) => {
                warn!("Moment registration failed: {}", e);
                let message = e.to_string();
                self.fail(message.clone());
                match e {
                    MarketplaceError::TransactionBuildError(_)
                    | MarketplaceError::SoldOut(_)
                    | MarketplaceError::AdminCapMissing => Err(FlowError::Build(message)),
                    _ => Err(FlowError::Wallet(message)),
                }
            }
        }
    }

    /// Build and submit the registration transaction.
    pub async fn submit(
        &mut self,
        interface: &MarketplaceInterface,
        form: &MomentForm,
    ) -> Result<String, FlowError> {
        let request = self.prepare_request(form)?;
        self.state = FlowState::AwaitingSignature;
        let outcome = interface.register_moment(request).await;
        let digest = self.record_outcome(outcome)?;
        debug!("Explorer: {}", constants::suiscan_url("testnet", &digest));
        Ok(digest)
    }
}

impl Default for RegistrationFlow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload_result(id: &str) -> WalrusUploadResult {
        WalrusUploadResult {
            uri: format!("walrus://{}", id),
            blob_id: id.to_string(),
            hash: id.to_string(),
        }
    }

    fn form() -> MomentForm {
        MomentForm {
            match_id: "UFC300-001".to_string(),
            fighter_a: "A".to_string(),
            fighter_b: "B".to_string(),
            moment_type: "KO".to_string(),
            max_supply: 1000,
        }
    }

    #[test]
    fn progress_weights() {
        assert_eq!(blend_progress(false, 0.0, 0.0), 0.0);
        assert_eq!(blend_progress(true, 0.0, 0.0), 10.0);
        assert_eq!(blend_progress(true, 100.0, 0.0), 50.0);
        assert_eq!(blend_progress(true, 100.0, 100.0), 100.0);
        assert_eq!(blend_progress(true, 50.0, 0.0), 30.0);
    }

    #[test]
    fn progress_tracks_states() {
        let mut flow = RegistrationFlow::new();
        assert_eq!(flow.progress(), 0.0);
        flow.state = FlowState::UploadingVideo;
        assert_eq!(flow.progress(), 10.0);
        flow.state = FlowState::UploadingThumbnail;
        assert_eq!(flow.progress(), 50.0);
        flow.state = FlowState::AwaitingSignature;
        assert_eq!(flow.progress(), 100.0);
    }

    #[test]
    fn prepare_request_requires_completed_uploads() {
        let mut flow = RegistrationFlow::new();
        let err = flow.prepare_request(&form()).unwrap_err();
        assert!(matches!(err, FlowError::Build(_)));
        assert!(matches!(flow.state(), FlowState::Failed { .. }));
    }

    #[test]
    fn prepare_request_uses_video_blob_as_content_hash() {
        let mut flow = RegistrationFlow::resume(upload_result("vid"), upload_result("thumb"));
        let request = flow.prepare_request(&form()).unwrap();
        assert_eq!(request.video_blob_id, "vid");
        assert_eq!(request.thumbnail_blob_id, "thumb");
        assert_eq!(request.content_hash, "vid");
        assert_eq!(request.max_supply, 1000);
    }

    #[test]
    fn submission_failure_preserves_upload_results() {
        let mut flow = RegistrationFlow::resume(upload_result("vid"), upload_result("thumb"));
        let _ = flow.prepare_request(&form()).unwrap();

        let err = flow
            .record_outcome(Err(MarketplaceError::TransactionError {
                message: "user rejected".to_string(),
                tx_digest: None,
            }))
            .unwrap_err();

        assert!(matches!(err, FlowError::Wallet(_)));
        assert!(matches!(flow.state(), FlowState::Failed { .. }));
        // The uploads survive; resubmission will not re-upload.
        assert!(flow.video_result().is_some());
        assert!(flow.thumbnail_result().is_some());
        assert_eq!(flow.progress(), 90.0);
    }

    #[test]
    fn build_errors_are_classified_as_build_failures() {
        let mut flow = RegistrationFlow::resume(upload_result("vid"), upload_result("thumb"));
        let err = flow
            .record_outcome(Err(MarketplaceError::AdminCapMissing))
            .unwrap_err();
        assert!(matches!(err, FlowError::Build(_)));
    }

    #[test]
    fn success_reaches_terminal_state() {
        let mut flow = RegistrationFlow::resume(upload_result("vid"), upload_result("thumb"));
        let digest = flow.record_outcome(Ok("digest123".to_string())).unwrap();
        assert_eq!(digest, "digest123");
        assert_eq!(
            flow.state(),
            &FlowState::Success {
                digest: "digest123".to_string()
            }
        );
        assert_eq!(flow.progress(), 100.0);
    }

    #[tokio::test]
    async fn validation_rejects_before_any_upload() {
        // Relay that cannot be reached: if validation let us through, the
        // upload would fail differently.
        let client = WalrusClient::with_config(walrus::WalrusConfig {
            relay_url: "http://127.0.0.1:1".to_string(),
            aggregator_url: "http://127.0.0.1:1".to_string(),
            max_retries: 1,
            retry_delay: std::time::Duration::from_millis(1),
        });

        let mut flow = RegistrationFlow::new();
        let video = MediaFile::new(vec![0u8; 16], "video/x-msvideo");
        let thumbnail = MediaFile::new(vec![0u8; 16], "image/png");

        let err = flow
            .upload_media(&client, &video, &thumbnail)
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::Validation(_)));
        assert!(flow.video_result().is_none());
        assert_eq!(flow.progress(), 0.0);
    }
}
