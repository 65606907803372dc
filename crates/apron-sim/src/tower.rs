//! Scripted tower operator.
//!
//! Stands in for the person clicking through aircraft cards: every prompt is
//! answered after a fixed reaction time with a predictable choice, so a
//! headless run moves traffic from gate to runway and back again.

use apron_core::presentation::TAXIWAY_AUTOMATIC;
use apron_core::{AircraftEvent, AircraftId, LifecycleState, Presentation, Prompt, PromptKind, Telemetry};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// What the operator currently sees for one aircraft.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Card {
    pub tail: String,
    pub state: Option<LifecycleState>,
    pub info: String,
    pub telemetry: Option<Telemetry>,
}

#[derive(Debug, Clone)]
struct PendingPrompt {
    aircraft: AircraftId,
    prompt: Prompt,
    disabled: Vec<String>,
    offered_at: f64,
}

#[derive(Debug)]
pub struct ScriptedTower {
    reaction_secs: f64,
    preferred_approach: Option<String>,
    clock: f64,
    cards: BTreeMap<AircraftId, Card>,
    pending: Vec<PendingPrompt>,
    answered: usize,
}

impl Default for ScriptedTower {
    fn default() -> Self {
        Self::new(2.0)
    }
}

impl ScriptedTower {
    pub fn new(reaction_secs: f64) -> Self {
        Self {
            reaction_secs,
            preferred_approach: None,
            clock: 0.0,
            cards: BTreeMap::new(),
            pending: Vec::new(),
            answered: 0,
        }
    }

    /// Fly this approach whenever the runway offers it.
    pub fn with_preferred_approach(mut self, approach: impl Into<String>) -> Self {
        self.preferred_approach = Some(approach.into());
        self
    }

    pub fn card(&self, aircraft: AircraftId) -> Option<&Card> {
        self.cards.get(&aircraft)
    }

    pub fn cards(&self) -> impl Iterator<Item = (&AircraftId, &Card)> {
        self.cards.iter()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Prompts answered so far.
    pub fn answered(&self) -> usize {
        self.answered
    }

    /// Answer every prompt that has waited out the reaction time.
    ///
    /// Prompts the operator has nothing to say to (hold buttons, line-up
    /// offers) stay pending until the aircraft withdraws them.
    pub fn decide(&mut self, now: f64) -> Vec<(AircraftId, AircraftEvent)> {
        self.clock = now;
        let mut events = Vec::new();
        let reaction = self.reaction_secs;
        let mut kept = Vec::with_capacity(self.pending.len());
        for pending in std::mem::take(&mut self.pending) {
            if now - pending.offered_at < reaction {
                kept.push(pending);
                continue;
            }
            match self.answer(&pending) {
                Some(event) => {
                    info!("Tower answers {} {}: {:?}", pending.aircraft, pending.prompt.kind, event);
                    self.answered += 1;
                    events.push((pending.aircraft, event));
                }
                None => kept.push(pending),
            }
        }
        self.pending = kept;
        events
    }

    fn answer(&self, pending: &PendingPrompt) -> Option<AircraftEvent> {
        let mut enabled = pending
            .prompt
            .options
            .iter()
            .filter(|option| !pending.disabled.contains(*option));
        let event = match pending.prompt.kind {
            PromptKind::DepartureRunway => AircraftEvent::DepartureRunwayChosen(enabled.next()?.clone()),
            PromptKind::ArrivalRunway => AircraftEvent::ArrivalRunwayChosen(enabled.next()?.clone()),
            PromptKind::Approach => {
                let preferred = self
                    .preferred_approach
                    .as_ref()
                    .filter(|name| pending.prompt.options.contains(*name));
                let choice = match preferred {
                    Some(name) => name.clone(),
                    None => enabled.next()?.clone(),
                };
                AircraftEvent::ApproachChosen(choice)
            }
            PromptKind::Taxiway => AircraftEvent::TaxiwayChosen {
                automatic: pending.prompt.options.is_empty()
                    || pending.prompt.options.iter().any(|o| o == TAXIWAY_AUTOMATIC),
            },
            // Last exit is the one the aircraft can still make
            PromptKind::Exit => AircraftEvent::ExitChosen(enabled.last()?.clone()),
            PromptKind::ParkingGate => AircraftEvent::GateChosen(enabled.next()?.clone()),
            PromptKind::PushbackApproval => AircraftEvent::PushbackApproved,
            PromptKind::Takeoff => AircraftEvent::TakeoffApproved,
            PromptKind::HoldControl | PromptKind::Align => return None,
        };
        Some(event)
    }
}

impl Presentation for ScriptedTower {
    fn open_card(&mut self, aircraft: AircraftId, tail: &str) {
        debug!("Card opened for {} {}", tail, aircraft);
        self.cards.insert(
            aircraft,
            Card {
                tail: tail.to_string(),
                ..Card::default()
            },
        );
    }

    fn close_card(&mut self, aircraft: AircraftId) {
        debug!("Card closed for {}", aircraft);
        self.cards.remove(&aircraft);
        self.pending.retain(|p| p.aircraft != aircraft);
    }

    fn set_state_name(&mut self, aircraft: AircraftId, state: LifecycleState) {
        if let Some(card) = self.cards.get_mut(&aircraft) {
            card.state = Some(state);
        }
    }

    fn set_info(&mut self, aircraft: AircraftId, info: &str) {
        if let Some(card) = self.cards.get_mut(&aircraft) {
            card.info = info.to_string();
        }
    }

    fn set_tail_name(&mut self, aircraft: AircraftId, tail: &str) {
        if let Some(card) = self.cards.get_mut(&aircraft) {
            card.tail = tail.to_string();
        }
    }

    fn set_telemetry(&mut self, aircraft: AircraftId, telemetry: &Telemetry) {
        if let Some(card) = self.cards.get_mut(&aircraft) {
            card.telemetry = Some(*telemetry);
        }
    }

    fn request_choice(&mut self, aircraft: AircraftId, prompt: Prompt) {
        debug!("{} asks for {} {:?}", aircraft, prompt.kind, prompt.options);
        self.pending
            .retain(|p| !(p.aircraft == aircraft && p.prompt.kind == prompt.kind));
        self.pending.push(PendingPrompt {
            aircraft,
            prompt,
            disabled: Vec::new(),
            offered_at: self.clock,
        });
    }

    fn withdraw(&mut self, aircraft: AircraftId, kind: PromptKind) {
        self.pending
            .retain(|p| !(p.aircraft == aircraft && p.prompt.kind == kind));
    }

    fn disable_option(&mut self, aircraft: AircraftId, kind: PromptKind, option: &str) {
        for pending in self
            .pending
            .iter_mut()
            .filter(|p| p.aircraft == aircraft && p.prompt.kind == kind)
        {
            pending.disabled.push(option.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> AircraftId {
        AircraftId::new(0, 0)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_waits_for_reaction_time() {
        let mut tower = ScriptedTower::new(2.0);
        tower.decide(1.0);
        tower.request_choice(id(), Prompt::new(PromptKind::DepartureRunway, names(&["31", "13"])));
        assert!(tower.decide(2.5).is_empty());
        let events = tower.decide(3.0);
        assert_eq!(events, vec![(id(), AircraftEvent::DepartureRunwayChosen("31".into()))]);
        assert_eq!(tower.pending(), 0);
        assert_eq!(tower.answered(), 1);
    }

    #[test]
    fn test_prefers_configured_approach() {
        let mut tower = ScriptedTower::new(0.0).with_preferred_approach("C");
        tower.request_choice(id(), Prompt::new(PromptKind::Approach, names(&["A", "B", "C", "D"])));
        assert_eq!(tower.decide(0.0)[0].1, AircraftEvent::ApproachChosen("C".into()));

        let mut tower = ScriptedTower::new(0.0).with_preferred_approach("Z");
        tower.request_choice(id(), Prompt::new(PromptKind::Approach, names(&["A", "B"])));
        assert_eq!(tower.decide(0.0)[0].1, AircraftEvent::ApproachChosen("A".into()));
    }

    #[test]
    fn test_exit_skips_disabled_options() {
        let mut tower = ScriptedTower::new(0.0);
        tower.request_choice(id(), Prompt::new(PromptKind::Exit, names(&["R5", "R3", "R1"])));
        tower.disable_option(id(), PromptKind::Exit, "R1");
        assert_eq!(tower.decide(0.0)[0].1, AircraftEvent::ExitChosen("R3".into()));
    }

    #[test]
    fn test_withdrawn_and_button_prompts() {
        let mut tower = ScriptedTower::new(0.0);
        tower.request_choice(id(), Prompt::button(PromptKind::HoldControl));
        tower.request_choice(id(), Prompt::button(PromptKind::Takeoff));
        tower.withdraw(id(), PromptKind::Takeoff);
        assert!(tower.decide(5.0).is_empty());
        assert_eq!(tower.pending(), 1);

        tower.open_card(id(), "N12AB");
        tower.close_card(id());
        assert_eq!(tower.pending(), 0);
        assert!(tower.card(id()).is_none());
    }

    #[test]
    fn test_card_tracks_state_and_telemetry() {
        let mut tower = ScriptedTower::default();
        tower.open_card(id(), "N12AB");
        tower.set_state_name(id(), LifecycleState::Loading);
        tower.set_telemetry(
            id(),
            &Telemetry {
                altitude_ft: 11.0,
                speed_kt: 0.0,
                heading_deg: 90.0,
                vertical_rate_fpm: 0.0,
            },
        );
        let card = tower.card(id()).unwrap();
        assert_eq!(card.tail, "N12AB");
        assert_eq!(card.state, Some(LifecycleState::Loading));
        assert_eq!(card.telemetry.unwrap().heading_deg, 90.0);
    }
}
