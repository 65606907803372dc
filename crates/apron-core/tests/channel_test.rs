//! Ground frequency arbitration with timed playback.

mod common;

use apron_core::channel::{Side, SpeechSynthesizer};
use apron_core::{
    AircraftId, Delivery, GroundChannel, LifecycleState, RequestDraft, RequestKind, Spoken,
};
use common::{test_voice, ScriptedSpeech};

fn draft(index: u32, kind: RequestKind, tail: &str) -> RequestDraft {
    RequestDraft {
        kind,
        aircraft: AircraftId::new(index, 0),
        from_tail: tail.into(),
        to_whom: "PaloAlto ground".into(),
        payload: "ready for departure".into(),
        voice: test_voice(tail),
    }
}

/// Play until the in-flight utterance finishes and return its delivery.
fn finish(channel: &mut GroundChannel, speech: &mut ScriptedSpeech) -> Option<Delivery> {
    for _ in 0..10 {
        for done in speech.advance(0.25) {
            if let Some(delivery) = channel.on_utterance_complete(done) {
                return Some(delivery);
            }
        }
        if !channel.is_locked() {
            return None;
        }
    }
    None
}

fn speak(channel: &mut GroundChannel, speech: &mut ScriptedSpeech) -> Spoken {
    channel.tick(speech).unwrap()
}

#[test]
fn test_requests_then_answer_to_the_older_one_first() {
    let mut channel = GroundChannel::new("PaloAlto ground", test_voice("ground"));
    let mut speech = ScriptedSpeech::new(0.5);
    let first = channel.request(draft(0, RequestKind::DepartureRunway, "N12AB"));
    let second = channel.request(draft(1, RequestKind::DepartureRunway, "N34CD"));
    assert_eq!((first, second), (0, 1));

    let spoken = speak(&mut channel, &mut speech);
    assert_eq!((spoken.side, spoken.request_id), (Side::Request, first));
    assert!(channel.is_locked());
    assert!(channel.tick(&mut speech).is_none());

    let delivery = finish(&mut channel, &mut speech).unwrap();
    assert_eq!(
        delivery,
        Delivery::RequestSpoken {
            aircraft: AircraftId::new(0, 0),
            request_id: first,
            kind: RequestKind::DepartureRunway,
        }
    );

    // The answer to request 0 jumps ahead of the still-queued request 1
    assert!(channel.generate_response(
        first,
        "31",
        LifecycleState::DepartureRunwayRequest,
        LifecycleState::TaxiwayRequest
    ));
    let spoken = speak(&mut channel, &mut speech);
    assert_eq!((spoken.side, spoken.request_id), (Side::Response, first));
    assert!(spoken.text.contains("departure using runway 31"));
    assert_eq!(spoken.speaker, "PaloAlto ground");
    assert!(matches!(
        finish(&mut channel, &mut speech),
        Some(Delivery::ResponseSpoken { request_id: 0, to: LifecycleState::TaxiwayRequest, .. })
    ));

    let spoken = speak(&mut channel, &mut speech);
    assert_eq!((spoken.side, spoken.request_id), (Side::Request, second));
}

#[test]
fn test_newer_answer_waits_for_older_request() {
    let mut channel = GroundChannel::new("PaloAlto ground", test_voice("ground"));
    let mut speech = ScriptedSpeech::new(0.5);
    let older = channel.request(draft(0, RequestKind::Pushback, "N12AB"));
    let newer = channel.request(draft(1, RequestKind::Pushback, "N34CD"));

    // Answer to the newer request queued before anything was spoken
    channel.generate_response(
        newer,
        "31",
        LifecycleState::PushbackRequest,
        LifecycleState::Pushback,
    );

    let order: Vec<(Side, u64)> = (0..3)
        .map(|_| {
            let spoken = speak(&mut channel, &mut speech);
            finish(&mut channel, &mut speech);
            (spoken.side, spoken.request_id)
        })
        .collect();
    assert_eq!(
        order,
        vec![
            (Side::Request, older),
            (Side::Request, newer),
            (Side::Response, newer),
        ]
    );
    assert!(channel.tick(&mut speech).is_none());
}

#[test]
fn test_one_utterance_at_a_time() {
    let mut channel = GroundChannel::new("PaloAlto ground", test_voice("ground"));
    let mut speech = ScriptedSpeech::new(1.0);
    for index in 0..3 {
        channel.request(draft(index, RequestKind::DepartureRunway, "N12AB"));
    }
    for _ in 0..40 {
        if let Some(done) = speech.advance(0.1).first() {
            channel.on_utterance_complete(*done);
        }
        channel.tick(&mut speech);
        assert!(speech.playing() <= 1);
    }
    assert_eq!(speech.spoken.len(), 3);
    assert_eq!(channel.pending_requests(), 0);
}

#[test]
fn test_stale_completion_keeps_lock() {
    let mut channel = GroundChannel::new("PaloAlto ground", test_voice("ground"));
    let mut speech = ScriptedSpeech::new(0.5);
    channel.request(draft(0, RequestKind::DepartureRunway, "N12AB"));
    let spoken = speak(&mut channel, &mut speech);

    assert!(channel.on_utterance_complete(spoken.utterance + 1).is_none());
    assert!(channel.is_locked());
    assert!(channel.on_utterance_complete(spoken.utterance).is_some());
    assert!(!channel.is_locked());
    // A second completion for the same utterance does nothing
    assert!(channel.on_utterance_complete(spoken.utterance).is_none());
}
