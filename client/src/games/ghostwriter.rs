//! Ghostwriter: everybody answers a trivia prompt, then guesses who wrote
//! which of the shuffled answers.
//!
//! Scoring per round:
//! - +1 to each player who names the right author of an answer
//! - +2 to each author whose answer nobody attributed correctly

use super::{own_slots, pick_content, pool, shuffled};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use shared::{GameRules, Ledger, Phase, PlayerId, RoundOutcome};
use std::collections::{BTreeMap, BTreeSet};

const PROMPTS: &[&str] = &[
    "What is the worst thing to find in your soup?",
    "Name a superpower nobody asked for.",
    "The real reason dinosaurs went extinct:",
    "What do cats dream about?",
    "The most useless kitchen gadget:",
    "A terrible name for a boat:",
    "What the moon is actually made of:",
    "The secret ingredient in grandma's cookies:",
    "A bad thing to shout in a library:",
    "What aliens would find most confusing about Earth:",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GhostPhase {
    Answering,
    Guessing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GhostContent {
    pub prompt: String,
    /// Shuffled anonymous answers, filled in when guessing starts
    pub answers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GhostAction {
    Answer(String),
    /// `slot` indexes `GhostContent::answers`
    Guess { slot: usize, author: PlayerId },
    NoGuess,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ghostwriter {
    pub answer_seconds: u32,
    pub guess_seconds: u32,
    pub reveal_seconds: u32,
}

impl Default for Ghostwriter {
    fn default() -> Self {
        Self {
            answer_seconds: 60,
            guess_seconds: 45,
            reveal_seconds: 10,
        }
    }
}

fn answer_text(action: &GhostAction) -> Option<String> {
    match action {
        GhostAction::Answer(text) => Some(text.clone()),
        _ => None,
    }
}

fn answer_pool(ledger: &Ledger<Ghostwriter>) -> BTreeMap<String, Vec<PlayerId>> {
    pool(ledger, &GhostPhase::Answering, answer_text)
}

impl GameRules for Ghostwriter {
    type Phase = GhostPhase;
    type Content = GhostContent;
    type Action = GhostAction;

    fn name(&self) -> &'static str {
        "ghostwriter"
    }

    fn input_phases(&self) -> Vec<GhostPhase> {
        vec![GhostPhase::Answering, GhostPhase::Guessing]
    }

    fn min_players(&self) -> usize {
        2
    }

    fn phase_seconds(&self, phase: &Phase<GhostPhase>) -> u32 {
        match phase {
            Phase::Input(GhostPhase::Answering) => self.answer_seconds,
            Phase::Input(GhostPhase::Guessing) => self.guess_seconds,
            Phase::Reveal => self.reveal_seconds,
            Phase::Setup | Phase::GameOver => 0,
        }
    }

    fn generate_content(
        &self,
        _round: u32,
        used: &BTreeSet<String>,
        rng: &mut StdRng,
    ) -> (String, GhostContent) {
        let (key, prompt) = pick_content(PROMPTS, self.name(), used, rng);
        (
            key,
            GhostContent {
                prompt: prompt.to_string(),
                answers: Vec::new(),
            },
        )
    }

    fn enter_phase(
        &self,
        phase: &GhostPhase,
        content: &mut GhostContent,
        ledger: &Ledger<Self>,
        rng: &mut StdRng,
    ) {
        if *phase == GhostPhase::Guessing {
            content.answers = shuffled(&answer_pool(ledger), rng);
        }
    }

    fn required_actors(
        &self,
        phase: &GhostPhase,
        content: &GhostContent,
        ledger: &Ledger<Self>,
        eligible: &[PlayerId],
    ) -> Vec<PlayerId> {
        match phase {
            GhostPhase::Answering => eligible.to_vec(),
            GhostPhase::Guessing => {
                // only players with someone else's answer to guess
                let pool = answer_pool(ledger);
                eligible
                    .iter()
                    .filter(|id| own_slots(&content.answers, &pool, id).len() < content.answers.len())
                    .cloned()
                    .collect()
            }
        }
    }

    fn accepts(
        &self,
        phase: &GhostPhase,
        player: &str,
        action: &GhostAction,
        content: &GhostContent,
        ledger: &Ledger<Self>,
    ) -> bool {
        match (phase, action) {
            (GhostPhase::Answering, GhostAction::Answer(_)) => true,
            (GhostPhase::Guessing, GhostAction::NoGuess) => true,
            (GhostPhase::Guessing, GhostAction::Guess { slot, author }) => {
                *slot < content.answers.len()
                    && author != player
                    && !own_slots(&content.answers, &answer_pool(ledger), player).contains(slot)
            }
            _ => false,
        }
    }

    fn sentinel(&self, phase: &GhostPhase) -> GhostAction {
        match phase {
            GhostPhase::Answering => GhostAction::Answer(String::new()),
            GhostPhase::Guessing => GhostAction::NoGuess,
        }
    }

    fn score_round(&self, content: &GhostContent, ledger: &Ledger<Self>) -> RoundOutcome {
        let pool = answer_pool(ledger);
        let mut outcome = RoundOutcome::default();
        let mut identified: BTreeSet<PlayerId> = BTreeSet::new();

        if let Some(guesses) = ledger.actions(&GhostPhase::Guessing) {
            for (guesser, submission) in guesses {
                let GhostAction::Guess { slot, author } = &submission.action else {
                    continue;
                };
                let correct = content
                    .answers
                    .get(*slot)
                    .and_then(|text| pool.get(text))
                    .map(|authors| authors.contains(author))
                    .unwrap_or(false);
                if correct {
                    outcome.award(guesser, 1);
                    outcome.count(guesser);
                    identified.insert(author.clone());
                }
            }
        }

        for authors in pool.values() {
            for author in authors {
                if !identified.contains(author) {
                    outcome.award(author, 2);
                }
            }
        }
        outcome
    }

    /// `Answering`: the whole line. `Guessing`: `<slot> <author>` with a
    /// 1-based slot, or `skip`.
    fn parse_action(
        &self,
        phase: &GhostPhase,
        _content: &GhostContent,
        text: &str,
    ) -> Option<GhostAction> {
        let text = text.trim();
        match phase {
            GhostPhase::Answering => Some(GhostAction::Answer(text.to_string())),
            GhostPhase::Guessing => {
                if text.eq_ignore_ascii_case("skip") {
                    return Some(GhostAction::NoGuess);
                }
                let (slot, author) = text.split_once(char::is_whitespace)?;
                let slot: usize = slot.parse().ok()?;
                Some(GhostAction::Guess {
                    slot: slot.checked_sub(1)?,
                    author: author.trim().to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use shared::RoundLedger;

    fn answered(answers: &[(&str, &str)]) -> Ledger<Ghostwriter> {
        let mut ledger = RoundLedger::new();
        for (player, text) in answers {
            ledger.record(
                &GhostPhase::Answering,
                player,
                GhostAction::Answer(text.to_string()),
                text.is_empty(),
            );
        }
        ledger
    }

    fn guessing_content(ledger: &Ledger<Ghostwriter>) -> GhostContent {
        let mut content = GhostContent {
            prompt: "p".into(),
            answers: Vec::new(),
        };
        let mut rng = StdRng::seed_from_u64(1);
        Ghostwriter::default().enter_phase(&GhostPhase::Guessing, &mut content, ledger, &mut rng);
        content
    }

    fn slot_of(content: &GhostContent, text: &str) -> usize {
        content.answers.iter().position(|a| a == text).unwrap()
    }

    #[test]
    fn test_empty_answers_are_left_out() {
        let ledger = answered(&[("a", "cat"), ("b", "dog"), ("c", "")]);
        let content = guessing_content(&ledger);
        assert_eq!(content.answers.len(), 2);
    }

    #[test]
    fn test_own_answer_cannot_be_guessed() {
        let game = Ghostwriter::default();
        let ledger = answered(&[("a", "cat"), ("b", "dog")]);
        let content = guessing_content(&ledger);
        let cat = slot_of(&content, "cat");

        let own = GhostAction::Guess {
            slot: cat,
            author: "b".into(),
        };
        assert!(!game.accepts(&GhostPhase::Guessing, "a", &own, &content, &ledger));

        let fair = GhostAction::Guess {
            slot: cat,
            author: "a".into(),
        };
        assert!(game.accepts(&GhostPhase::Guessing, "b", &fair, &content, &ledger));

        let out_of_range = GhostAction::Guess {
            slot: 9,
            author: "a".into(),
        };
        assert!(!game.accepts(&GhostPhase::Guessing, "b", &out_of_range, &content, &ledger));
    }

    #[test]
    fn test_guess_in_answering_phase_is_rejected() {
        let game = Ghostwriter::default();
        let ledger = answered(&[]);
        let content = guessing_content(&ledger);
        assert!(!game.accepts(
            &GhostPhase::Answering,
            "a",
            &GhostAction::NoGuess,
            &content,
            &ledger
        ));
    }

    #[test]
    fn test_sole_author_is_not_required_to_guess() {
        let game = Ghostwriter::default();
        let ledger = answered(&[("a", "cat"), ("b", "")]);
        let content = guessing_content(&ledger);
        let eligible = vec!["a".to_string(), "b".to_string()];
        let required = game.required_actors(&GhostPhase::Guessing, &content, &ledger, &eligible);
        assert_eq!(required, vec!["b".to_string()]);
    }

    #[test]
    fn test_scoring_round() {
        let game = Ghostwriter::default();
        let mut ledger = answered(&[("a", "cat"), ("b", "dog"), ("c", ""), ("d", "")]);
        let content = guessing_content(&ledger);
        let cat = slot_of(&content, "cat");
        let dog = slot_of(&content, "dog");

        let guesses = [
            ("b", GhostAction::Guess { slot: cat, author: "a".into() }),
            ("c", GhostAction::Guess { slot: dog, author: "a".into() }),
            ("d", GhostAction::Guess { slot: cat, author: "c".into() }),
            ("a", GhostAction::NoGuess),
        ];
        for (player, guess) in guesses {
            ledger.record(&GhostPhase::Guessing, player, guess, false);
        }

        let outcome = game.score_round(&content, &ledger);
        assert_eq!(outcome.points.get("a"), None);
        assert_eq!(outcome.points.get("b"), Some(&3));
        assert_eq!(outcome.points.get("c"), None);
        assert_eq!(outcome.tally.get("b"), Some(&1));
    }

    #[test]
    fn test_parse_action() {
        let game = Ghostwriter::default();
        let content = GhostContent {
            prompt: "p".into(),
            answers: vec!["x".into()],
        };
        assert_eq!(
            game.parse_action(&GhostPhase::Answering, &content, " a ghost "),
            Some(GhostAction::Answer("a ghost".into()))
        );
        assert_eq!(
            game.parse_action(&GhostPhase::Guessing, &content, "1 bob"),
            Some(GhostAction::Guess {
                slot: 0,
                author: "bob".into()
            })
        );
        assert_eq!(
            game.parse_action(&GhostPhase::Guessing, &content, "skip"),
            Some(GhostAction::NoGuess)
        );
        assert_eq!(game.parse_action(&GhostPhase::Guessing, &content, "0 bob"), None);
        assert_eq!(game.parse_action(&GhostPhase::Guessing, &content, "bob"), None);
    }

    #[test]
    fn test_prompts_do_not_repeat() {
        let game = Ghostwriter::default();
        let mut rng = StdRng::seed_from_u64(11);
        let mut used = BTreeSet::new();
        for round in 1..=PROMPTS.len() as u32 {
            let (key, _) = game.generate_content(round, &used, &mut rng);
            assert!(used.insert(key));
        }
    }
}
