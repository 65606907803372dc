//! The shared ground frequency.
//!
//! Aircraft requests and controller responses queue here and are spoken one
//! at a time. The channel is locked from the moment an utterance starts
//! until the speech collaborator reports that exact utterance complete.
//!
//! Arbitration, run once per unlocked tick: a pending response is spoken
//! before the oldest pending request only when the response answers an
//! older request. Otherwise the oldest request goes first. A response is
//! therefore never spoken before its own request, and answers to old
//! exchanges are not starved by a stream of new requests.

use crate::lifecycle::LifecycleState;
use crate::models::AircraftId;
use crate::phraseology::{request_text, response_text, response_what};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, info, warn};

pub type RequestId = u64;
pub type UtteranceId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    DepartureRunway,
    Pushback,
}

/// Speech parameters of one synthetic speaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voice {
    pub name: String,
    pub rate: f64,
    pub pitch: f64,
    pub volume: f64,
}

impl Voice {
    /// Draw a voice once per speaker; it is reused for every utterance.
    pub fn random<R: Rng + ?Sized>(name: impl Into<String>, rng: &mut R) -> Self {
        Self {
            name: name.into(),
            rate: rng.random_range(0.0..0.35) + 1.0,
            pitch: rng.random_range(0.0..0.7) + 0.8,
            volume: 1.0 - rng.random_range(0.0..0.1),
        }
    }
}

/// Speech playback collaborator.
pub trait SpeechSynthesizer {
    /// Start speaking and return an id for the completion signal.
    fn speak(&mut self, text: &str, voice: &Voice) -> UtteranceId;

    /// Advance playback and return the utterances that finished.
    fn advance(&mut self, dt: f64) -> Vec<UtteranceId>;
}

/// What an aircraft submits; the channel assigns the id.
#[derive(Debug, Clone)]
pub struct RequestDraft {
    pub kind: RequestKind,
    pub aircraft: AircraftId,
    pub from_tail: String,
    pub to_whom: String,
    pub payload: String,
    pub voice: Voice,
}

#[derive(Debug, Clone)]
pub struct GroundRequest {
    pub id: RequestId,
    pub kind: RequestKind,
    pub aircraft: AircraftId,
    pub from_tail: String,
    pub to_whom: String,
    pub payload: String,
    pub voice: Voice,
}

#[derive(Debug, Clone)]
pub struct GroundResponse {
    /// Id of the request this answers
    pub request_id: RequestId,
    pub kind: RequestKind,
    pub aircraft: AircraftId,
    pub from_whom: String,
    pub to_tail: String,
    pub what: String,
    /// Transition the aircraft makes once the response has been heard
    pub from_state: LifecycleState,
    pub to_state: LifecycleState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Request,
    Response,
}

/// An utterance that was just started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spoken {
    pub utterance: UtteranceId,
    pub side: Side,
    pub request_id: RequestId,
    pub aircraft: AircraftId,
    pub speaker: String,
    pub text: String,
}

/// Completion message routed back to the owning aircraft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Delivery {
    RequestSpoken {
        aircraft: AircraftId,
        request_id: RequestId,
        kind: RequestKind,
    },
    ResponseSpoken {
        aircraft: AircraftId,
        request_id: RequestId,
        from: LifecycleState,
        to: LifecycleState,
    },
}

#[derive(Debug)]
enum Item {
    Request(GroundRequest),
    Response(GroundResponse),
}

#[derive(Debug)]
struct InFlight {
    utterance: UtteranceId,
    item: Item,
    /// Owner was destroyed while speaking; complete silently
    orphaned: bool,
}

#[derive(Debug)]
pub struct GroundChannel {
    controller: String,
    controller_voice: Voice,
    next_request_id: RequestId,
    requests: VecDeque<GroundRequest>,
    responses: VecDeque<GroundResponse>,
    /// Requests issued and not yet resolved by a spoken response
    open: BTreeMap<RequestId, GroundRequest>,
    /// Requests that already have a response generated
    answered: BTreeSet<RequestId>,
    in_flight: Option<InFlight>,
}

impl GroundChannel {
    pub fn new(controller: impl Into<String>, controller_voice: Voice) -> Self {
        Self {
            controller: controller.into(),
            controller_voice,
            next_request_id: 0,
            requests: VecDeque::new(),
            responses: VecDeque::new(),
            open: BTreeMap::new(),
            answered: BTreeSet::new(),
            in_flight: None,
        }
    }

    pub fn controller(&self) -> &str {
        &self.controller
    }

    /// True while an utterance is in flight.
    pub fn is_locked(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    pub fn pending_responses(&self) -> usize {
        self.responses.len()
    }

    /// Queue an aircraft request and return its id.
    pub fn request(&mut self, draft: RequestDraft) -> RequestId {
        let id = self.next_request_id;
        self.next_request_id += 1;
        let request = GroundRequest {
            id,
            kind: draft.kind,
            aircraft: draft.aircraft,
            from_tail: draft.from_tail,
            to_whom: draft.to_whom,
            payload: draft.payload,
            voice: draft.voice,
        };
        debug!("Ground request {} queued from {}", id, request.from_tail);
        self.open.insert(id, request.clone());
        self.requests.push_back(request);
        id
    }

    /// Queue the controller's answer to `request_id`.
    ///
    /// Unknown, resolved or already answered ids are ignored; returns whether
    /// a response was queued.
    pub fn generate_response(
        &mut self,
        request_id: RequestId,
        info: &str,
        from_state: LifecycleState,
        to_state: LifecycleState,
    ) -> bool {
        let Some(request) = self.open.get(&request_id) else {
            warn!("Response for unknown request {} ignored", request_id);
            return false;
        };
        if !self.answered.insert(request_id) {
            warn!("Duplicate response for request {} ignored", request_id);
            return false;
        }
        let response = GroundResponse {
            request_id,
            kind: request.kind,
            aircraft: request.aircraft,
            from_whom: request.to_whom.clone(),
            to_tail: request.from_tail.clone(),
            what: response_what(request.kind, info),
            from_state,
            to_state,
        };
        self.responses.push_back(response);
        true
    }

    /// Start the next utterance if the channel is free.
    pub fn tick(&mut self, speech: &mut dyn SpeechSynthesizer) -> Option<Spoken> {
        if self.in_flight.is_some() {
            return None;
        }
        let request_head = self.requests.front().map(|r| r.id);
        let response_head = self.responses.front().map(|r| r.request_id);

        let speak_response = match (request_head, response_head) {
            (Some(request_id), Some(response_id)) => response_id < request_id,
            (None, Some(_)) => true,
            (_, None) => false,
        };

        if speak_response {
            let response = self.responses.pop_front()?;
            Some(self.speak_response(response, speech))
        } else {
            let request = self.requests.pop_front()?;
            Some(self.speak_request(request, speech))
        }
    }

    fn speak_request(&mut self, request: GroundRequest, speech: &mut dyn SpeechSynthesizer) -> Spoken {
        let text = request_text(&request.to_whom, &request.from_tail, &request.payload);
        let utterance = speech.speak(&text, &request.voice);
        info!(target: "radio", "{}: {}", request.from_tail, text);
        let spoken = Spoken {
            utterance,
            side: Side::Request,
            request_id: request.id,
            aircraft: request.aircraft,
            speaker: request.from_tail.clone(),
            text,
        };
        self.in_flight = Some(InFlight {
            utterance,
            item: Item::Request(request),
            orphaned: false,
        });
        spoken
    }

    fn speak_response(&mut self, response: GroundResponse, speech: &mut dyn SpeechSynthesizer) -> Spoken {
        let text = response_text(&response.to_tail, &response.from_whom, &response.what);
        let utterance = speech.speak(&text, &self.controller_voice);
        info!(target: "radio", "{}: {}", response.from_whom, text);
        let spoken = Spoken {
            utterance,
            side: Side::Response,
            request_id: response.request_id,
            aircraft: response.aircraft,
            speaker: response.from_whom.clone(),
            text,
        };
        self.in_flight = Some(InFlight {
            utterance,
            item: Item::Response(response),
            orphaned: false,
        });
        spoken
    }

    /// Resolve a finished utterance and release the lock.
    ///
    /// Completion of anything other than the in-flight utterance is a no-op.
    pub fn on_utterance_complete(&mut self, utterance: UtteranceId) -> Option<Delivery> {
        match &self.in_flight {
            Some(in_flight) if in_flight.utterance == utterance => {}
            _ => {
                debug!("Completion for stale utterance {} ignored", utterance);
                return None;
            }
        }
        let in_flight = self.in_flight.take()?;
        if in_flight.orphaned {
            return None;
        }
        match in_flight.item {
            Item::Request(request) => Some(Delivery::RequestSpoken {
                aircraft: request.aircraft,
                request_id: request.id,
                kind: request.kind,
            }),
            Item::Response(response) => {
                self.open.remove(&response.request_id);
                self.answered.remove(&response.request_id);
                Some(Delivery::ResponseSpoken {
                    aircraft: response.aircraft,
                    request_id: response.request_id,
                    from: response.from_state,
                    to: response.to_state,
                })
            }
        }
    }

    /// Drop every queued entry that belongs to a destroyed aircraft.
    pub fn purge_aircraft(&mut self, aircraft: AircraftId) {
        let before = self.requests.len() + self.responses.len();
        self.requests.retain(|r| r.aircraft != aircraft);
        self.responses.retain(|r| r.aircraft != aircraft);
        let purged_ids: Vec<RequestId> = self
            .open
            .iter()
            .filter(|(_, r)| r.aircraft == aircraft)
            .map(|(id, _)| *id)
            .collect();
        for id in purged_ids {
            self.open.remove(&id);
            self.answered.remove(&id);
        }
        if let Some(in_flight) = self.in_flight.as_mut() {
            let owner = match &in_flight.item {
                Item::Request(r) => r.aircraft,
                Item::Response(r) => r.aircraft,
            };
            if owner == aircraft {
                in_flight.orphaned = true;
            }
        }
        let purged = before - (self.requests.len() + self.responses.len());
        if purged > 0 {
            debug!("Purged {} queued transmissions of {}", purged, aircraft);
        }
    }
}
