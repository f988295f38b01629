use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::address::HostAddress;
use crate::config::MembershipConfig;
use crate::error::{JoinError, JoinRejection};
use crate::membership::protocol::{decode, encode, JoinCandidate, MembershipMessage};
use crate::membership::types::{MemberIdentity, MemberRole, View};
use crate::transport::Transport;

/// A granted admission: the identity the coordinator assigned and the view
/// that now contains it.
#[derive(Debug, Clone)]
pub struct Admission {
    pub identity: MemberIdentity,
    pub view: View,
}

/// Why one contact with one locator or coordinator did not produce an
/// admission. Unreachable contacts are absorbed by moving to the next
/// locator; rejections are remembered and retried after backoff.
enum AttemptError {
    Unreachable(String),
    Rejected(JoinRejection),
}

/// The joining side of the discovery protocol.
///
/// Owns the node's transport for the duration of the join: replies are read
/// off the same socket the requests go out on, matched by token, and
/// everything else arriving meanwhile is ignored.
pub struct JoinClient {
    transport: Arc<dyn Transport>,
    advertised: HostAddress,
    role: MemberRole,
    weight: u32,
    locators: Vec<HostAddress>,
    attempts: usize,
    request_timeout: Duration,
}

impl JoinClient {
    pub fn new(transport: Arc<dyn Transport>, config: &MembershipConfig) -> Self {
        Self {
            transport,
            advertised: config.advertised.clone(),
            role: config.role,
            weight: config.weight,
            locators: config.locators.clone(),
            attempts: config.join_attempts,
            request_timeout: config.join_timeout,
        }
    }

    /// Runs the admission protocol to completion: up to `attempts` rounds
    /// across the whole locator list, with jittered backoff between rounds.
    pub async fn join(&self) -> Result<Admission, JoinError> {
        let mut last_rejection: Option<JoinRejection> = None;
        let mut delay_ms = 150u64;

        for attempt in 1..=self.attempts {
            for locator in &self.locators {
                if *locator == self.advertised {
                    continue;
                }
                match self.attempt_via(locator).await {
                    Ok(admission) => {
                        info!(
                            "admitted as {} into {} via locator {}",
                            admission.identity, admission.view, locator
                        );
                        return Ok(admission);
                    }
                    Err(AttemptError::Rejected(rejection)) => {
                        warn!("admission refused via {}: {}", locator, rejection);
                        last_rejection = Some(rejection);
                    }
                    Err(AttemptError::Unreachable(reason)) => {
                        debug!("locator {} unreachable: {}", locator, reason);
                    }
                }
            }

            if attempt < self.attempts {
                // Simple jitter to prevent thundering herd
                let jitter = rand::random::<u64>() % 50;
                sleep(Duration::from_millis(delay_ms + jitter)).await;
                delay_ms = (delay_ms * 2).min(1200);
            }
        }

        match last_rejection {
            Some(rejection) => Err(JoinError::Rejected(rejection)),
            None => Err(JoinError::Exhausted {
                attempts: self.attempts,
            }),
        }
    }

    /// One full pass through one locator: discover the coordinator, then
    /// request admission, following at most one stale-coordinator hint.
    async fn attempt_via(&self, locator: &HostAddress) -> Result<Admission, AttemptError> {
        let locator_endpoint = self.resolve(locator).await?;
        let coordinator = self.find_coordinator(locator_endpoint).await?;

        let mut target = coordinator;
        for _ in 0..2 {
            match self.request_admission(&target).await {
                Ok(admission) => return Ok(admission),
                Err(AttemptError::Rejected(JoinRejection::NotCoordinator {
                    coordinator: Some(hint),
                })) if hint != target => {
                    debug!("re-aiming admission at hinted coordinator {}", hint);
                    target = hint;
                }
                Err(other) => return Err(other),
            }
        }
        Err(AttemptError::Rejected(JoinRejection::NotCoordinator {
            coordinator: None,
        }))
    }

    async fn find_coordinator(&self, locator: SocketAddr) -> Result<HostAddress, AttemptError> {
        let token = Uuid::new_v4();
        self.send(locator, &MembershipMessage::FindCoordinator { token })
            .await?;

        let deadline = Instant::now() + self.request_timeout;
        self.await_reply(deadline, |message| match message {
            MembershipMessage::CoordinatorReply {
                token: reply_token,
                coordinator,
            } if reply_token == token => Some(coordinator),
            _ => None,
        })
        .await
        .ok_or_else(|| AttemptError::Unreachable("no coordinator reply".into()))
    }

    async fn request_admission(&self, target: &HostAddress) -> Result<Admission, AttemptError> {
        let endpoint = self.resolve(target).await?;
        let token = Uuid::new_v4();
        let candidate = JoinCandidate {
            address: self.advertised.clone(),
            role: self.role,
            weight: self.weight,
        };
        self.send(endpoint, &MembershipMessage::JoinRequest { token, candidate })
            .await?;

        let deadline = Instant::now() + self.request_timeout;
        match self
            .await_reply(deadline, |message| match message {
                MembershipMessage::JoinGranted {
                    token: reply_token,
                    identity,
                    view,
                } if reply_token == token => Some(Ok(Admission { identity, view })),
                MembershipMessage::JoinRefused {
                    token: reply_token,
                    rejection,
                } if reply_token == token => Some(Err(rejection)),
                _ => None,
            })
            .await
        {
            Some(Ok(admission)) => Ok(admission),
            Some(Err(rejection)) => Err(AttemptError::Rejected(rejection)),
            None => Err(AttemptError::Unreachable("no admission reply".into())),
        }
    }

    /// Reads datagrams until the matcher accepts one or the deadline passes.
    /// Unrelated traffic (heartbeats, stale-token replies) is skipped.
    async fn await_reply<T>(
        &self,
        deadline: Instant,
        mut matcher: impl FnMut(MembershipMessage) -> Option<T>,
    ) -> Option<T> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            match timeout(remaining, self.transport.recv()).await {
                Ok(Ok((payload, _))) => match decode(&payload) {
                    Ok(message) => {
                        if let Some(matched) = matcher(message) {
                            return Some(matched);
                        }
                    }
                    Err(error) => debug!("undecodable datagram during join: {:#}", error),
                },
                Ok(Err(_)) | Err(_) => return None,
            }
        }
    }

    async fn resolve(&self, address: &HostAddress) -> Result<SocketAddr, AttemptError> {
        match timeout(self.request_timeout, address.resolve()).await {
            Ok(Ok(endpoint)) => Ok(endpoint),
            Ok(Err(error)) => Err(AttemptError::Unreachable(error.to_string())),
            Err(_) => Err(AttemptError::Unreachable("resolution timed out".into())),
        }
    }

    async fn send(
        &self,
        endpoint: SocketAddr,
        message: &MembershipMessage,
    ) -> Result<(), AttemptError> {
        let payload = encode(message).map_err(|error| AttemptError::Unreachable(error.to_string()))?;
        self.transport
            .send(endpoint, &payload)
            .await
            .map_err(|error| AttemptError::Unreachable(error.to_string()))
    }
}
