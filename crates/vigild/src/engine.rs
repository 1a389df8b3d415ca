//! Engine thread: owns the detection service and serializes requests.
//!
//! Each request is handled synchronously by the engine thread; the remote
//! extraction path blocks inside the worker's HTTP timeout, so that wait
//! never ties up the async runtime. Handlers talk to the engine through a
//! clone-safe handle over mpsc/oneshot channels.

use chrono::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use vigil_store::{AccessType, DetectionStats};

use crate::error::ServiceError;
use crate::service::{
    DetectionService, FaceDetectionResponse, PlateDetectionResponse, ProfileRegistration,
};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from request handlers to the engine thread.
enum EngineRequest {
    RecognizeFace {
        image: Vec<u8>,
        camera_location: String,
        reply: oneshot::Sender<Result<FaceDetectionResponse, ServiceError>>,
    },
    DetectPlate {
        image: Vec<u8>,
        camera_location: String,
        access_type: AccessType,
        reply: oneshot::Sender<Result<PlateDetectionResponse, ServiceError>>,
    },
    RegisterProfile {
        owner_id: String,
        image: Vec<u8>,
        replace: bool,
        reply: oneshot::Sender<Result<ProfileRegistration, ServiceError>>,
    },
    RevokeProfile {
        profile_id: String,
        reply: oneshot::Sender<Result<(), ServiceError>>,
    },
    DetectionStats {
        window_hours: i64,
        reply: oneshot::Sender<Result<DetectionStats, ServiceError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    pub async fn recognize_face(
        &self,
        image: Vec<u8>,
        camera_location: String,
    ) -> Result<FaceDetectionResponse, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::RecognizeFace {
                image,
                camera_location,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        Ok(reply_rx.await.map_err(|_| EngineError::ChannelClosed)??)
    }

    pub async fn detect_plate(
        &self,
        image: Vec<u8>,
        camera_location: String,
        access_type: AccessType,
    ) -> Result<PlateDetectionResponse, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::DetectPlate {
                image,
                camera_location,
                access_type,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        Ok(reply_rx.await.map_err(|_| EngineError::ChannelClosed)??)
    }

    pub async fn register_profile(
        &self,
        owner_id: String,
        image: Vec<u8>,
        replace: bool,
    ) -> Result<ProfileRegistration, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::RegisterProfile {
                owner_id,
                image,
                replace,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        Ok(reply_rx.await.map_err(|_| EngineError::ChannelClosed)??)
    }

    pub async fn revoke_profile(&self, profile_id: String) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::RevokeProfile {
                profile_id,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        Ok(reply_rx.await.map_err(|_| EngineError::ChannelClosed)??)
    }

    pub async fn detection_stats(&self, window_hours: i64) -> Result<DetectionStats, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::DetectionStats {
                window_hours,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        Ok(reply_rx.await.map_err(|_| EngineError::ChannelClosed)??)
    }
}

/// Spawn the engine on a dedicated OS thread and return its handle.
/// The thread exits when every handle has been dropped.
pub fn spawn_engine(service: DetectionService) -> EngineHandle {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(16);

    std::thread::Builder::new()
        .name("vigil-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(request) = rx.blocking_recv() {
                match request {
                    EngineRequest::RecognizeFace {
                        image,
                        camera_location,
                        reply,
                    } => {
                        let _ = reply.send(service.recognize_face(&image, &camera_location));
                    }
                    EngineRequest::DetectPlate {
                        image,
                        camera_location,
                        access_type,
                        reply,
                    } => {
                        let _ =
                            reply.send(service.detect_plate(&image, &camera_location, access_type));
                    }
                    EngineRequest::RegisterProfile {
                        owner_id,
                        image,
                        replace,
                        reply,
                    } => {
                        let _ = reply.send(service.register_profile(&owner_id, &image, replace));
                    }
                    EngineRequest::RevokeProfile { profile_id, reply } => {
                        let _ = reply.send(service.revoke_profile(&profile_id));
                    }
                    EngineRequest::DetectionStats {
                        window_hours,
                        reply,
                    } => {
                        let _ =
                            reply.send(service.detection_stats(Duration::hours(window_hours)));
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    EngineHandle { tx }
}
