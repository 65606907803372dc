//! Timed speech stand-in and the radio transcript.
//!
//! Utterances take as long as their words would at the speaker's rate.
//! Everything spoken on the ground frequency is kept with a wall-clock
//! timestamp so a run can be replayed or diffed afterwards.

use anyhow::Context;
use apron_core::channel::Side;
use apron_core::{AircraftId, RequestId, SpeechSynthesizer, Spoken, UtteranceId, Voice};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Speaking speed at rate 1.0.
pub const WORDS_PER_SECOND: f64 = 2.5;

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntry {
    pub timestamp: DateTime<Utc>,
    pub sim_time_secs: f64,
    pub side: Side,
    pub request_id: RequestId,
    pub aircraft: AircraftId,
    pub speaker: String,
    pub text: String,
    pub voice: Option<Voice>,
}

#[derive(Debug)]
struct Playing {
    remaining: f64,
    voice: Voice,
}

/// Speech synthesizer that only keeps time, plus the transcript it produced.
#[derive(Debug, Default)]
pub struct RadioLog {
    next_utterance: UtteranceId,
    playing: BTreeMap<UtteranceId, Playing>,
    transcript: Vec<TranscriptEntry>,
}

impl RadioLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        !self.playing.is_empty()
    }

    /// Add a just-started utterance to the transcript.
    pub fn record(&mut self, spoken: &Spoken, sim_time_secs: f64) {
        let voice = self.playing.get(&spoken.utterance).map(|p| p.voice.clone());
        info!(target: "radio", "[{:>7.1}s] {}: {}", sim_time_secs, spoken.speaker, spoken.text);
        self.transcript.push(TranscriptEntry {
            timestamp: Utc::now(),
            sim_time_secs,
            side: spoken.side,
            request_id: spoken.request_id,
            aircraft: spoken.aircraft,
            speaker: spoken.speaker.clone(),
            text: spoken.text.clone(),
            voice,
        });
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(&self.transcript).context("Failed to serialize transcript")
    }

    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let json = self.to_json()?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write transcript to {}", path.display()))?;
        info!("Wrote {} transmissions to {}", self.transcript.len(), path.display());
        Ok(())
    }
}

/// Seconds needed to say `text` with `voice`.
pub fn speaking_time(text: &str, voice: &Voice) -> f64 {
    let words = text.split_whitespace().count().max(1) as f64;
    let rate = if voice.rate > 0.0 { voice.rate } else { 1.0 };
    words / (WORDS_PER_SECOND * rate)
}

impl SpeechSynthesizer for RadioLog {
    fn speak(&mut self, text: &str, voice: &Voice) -> UtteranceId {
        let id = self.next_utterance;
        self.next_utterance += 1;
        let remaining = speaking_time(text, voice);
        debug!("Utterance {} plays for {:.1}s", id, remaining);
        self.playing.insert(
            id,
            Playing {
                remaining,
                voice: voice.clone(),
            },
        );
        id
    }

    fn advance(&mut self, dt: f64) -> Vec<UtteranceId> {
        let mut done = Vec::new();
        for (id, playing) in self.playing.iter_mut() {
            playing.remaining -= dt;
            if playing.remaining <= 0.0 {
                done.push(*id);
            }
        }
        for id in &done {
            self.playing.remove(id);
        }
        done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(rate: f64) -> Voice {
        Voice {
            name: "N12AB".into(),
            rate,
            pitch: 1.0,
            volume: 1.0,
        }
    }

    #[test]
    fn test_speaking_time_scales_with_rate() {
        let text = "PaloAlto ground November one two alpha bravo ready";
        assert!((speaking_time(text, &voice(1.0)) - 8.0 / 2.5).abs() < 1e-9);
        assert!(speaking_time(text, &voice(2.0)) < speaking_time(text, &voice(1.0)));
        assert!(speaking_time("", &voice(1.0)) > 0.0);
    }

    #[test]
    fn test_utterance_completes_after_its_duration() {
        let mut radio = RadioLog::new();
        let id = radio.speak("one two three four five", &voice(1.0));
        assert!(radio.advance(1.0).is_empty());
        assert!(radio.is_playing());
        assert_eq!(radio.advance(1.0), vec![id]);
        assert!(!radio.is_playing());
        assert!(radio.advance(1.0).is_empty());
    }

    #[test]
    fn test_record_keeps_voice_and_serializes() {
        let mut radio = RadioLog::new();
        let utterance = radio.speak("PaloAlto ground ready", &voice(1.2));
        radio.record(
            &Spoken {
                utterance,
                side: Side::Request,
                request_id: 0,
                aircraft: AircraftId::new(0, 0),
                speaker: "N12AB".into(),
                text: "PaloAlto ground ready".into(),
            },
            3.5,
        );
        let entry = &radio.transcript()[0];
        assert_eq!(entry.sim_time_secs, 3.5);
        assert_eq!(entry.voice.as_ref().unwrap().rate, 1.2);

        let json: serde_json::Value = serde_json::from_str(&radio.to_json().unwrap()).unwrap();
        assert_eq!(json[0]["speaker"], "N12AB");
        assert_eq!(json[0]["side"], "Request");
    }
}
