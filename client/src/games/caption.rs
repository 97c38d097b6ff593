//! Caption contest: everybody captions the same picture, then votes for the
//! best caption that is not their own. One point per vote received.

use super::{own_slots, pick_content, pool, shuffled};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use shared::{GameRules, Ledger, Phase, PlayerId, RoundOutcome};
use std::collections::{BTreeMap, BTreeSet};

const TEMPLATES: &[&str] = &[
    "A dog in a business suit at a board meeting",
    "A cat staring at a cucumber",
    "Two pigeons arguing over a single fry",
    "A toddler holding a giant trophy",
    "A penguin on a treadmill",
    "A wizard stuck in traffic",
    "A goat on top of a parked car",
    "A raccoon inspecting a trash can like a sommelier",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptionPhase {
    Captioning,
    Voting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionContent {
    pub template: String,
    pub captions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CaptionAction {
    Caption(String),
    Vote(usize),
    Abstain,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub caption_seconds: u32,
    pub vote_seconds: u32,
    pub reveal_seconds: u32,
}

impl Default for Caption {
    fn default() -> Self {
        Self {
            caption_seconds: 60,
            vote_seconds: 30,
            reveal_seconds: 10,
        }
    }
}

fn caption_pool(ledger: &Ledger<Caption>) -> BTreeMap<String, Vec<PlayerId>> {
    pool(ledger, &CaptionPhase::Captioning, |action: &CaptionAction| {
        match action {
            CaptionAction::Caption(text) => Some(text.clone()),
            _ => None,
        }
    })
}

impl GameRules for Caption {
    type Phase = CaptionPhase;
    type Content = CaptionContent;
    type Action = CaptionAction;

    fn name(&self) -> &'static str {
        "caption"
    }

    fn input_phases(&self) -> Vec<CaptionPhase> {
        vec![CaptionPhase::Captioning, CaptionPhase::Voting]
    }

    fn min_players(&self) -> usize {
        3
    }

    fn phase_seconds(&self, phase: &Phase<CaptionPhase>) -> u32 {
        match phase {
            Phase::Input(CaptionPhase::Captioning) => self.caption_seconds,
            Phase::Input(CaptionPhase::Voting) => self.vote_seconds,
            Phase::Reveal => self.reveal_seconds,
            Phase::Setup | Phase::GameOver => 0,
        }
    }

    fn generate_content(
        &self,
        _round: u32,
        used: &BTreeSet<String>,
        rng: &mut StdRng,
    ) -> (String, CaptionContent) {
        let (key, template) = pick_content(TEMPLATES, self.name(), used, rng);
        (
            key,
            CaptionContent {
                template: template.to_string(),
                captions: Vec::new(),
            },
        )
    }

    fn enter_phase(
        &self,
        phase: &CaptionPhase,
        content: &mut CaptionContent,
        ledger: &Ledger<Self>,
        rng: &mut StdRng,
    ) {
        if *phase == CaptionPhase::Voting {
            content.captions = shuffled(&caption_pool(ledger), rng);
        }
    }

    fn required_actors(
        &self,
        phase: &CaptionPhase,
        content: &CaptionContent,
        ledger: &Ledger<Self>,
        eligible: &[PlayerId],
    ) -> Vec<PlayerId> {
        match phase {
            CaptionPhase::Captioning => eligible.to_vec(),
            CaptionPhase::Voting => {
                let pool = caption_pool(ledger);
                eligible
                    .iter()
                    .filter(|id| own_slots(&content.captions, &pool, id).len() < content.captions.len())
                    .cloned()
                    .collect()
            }
        }
    }

    fn accepts(
        &self,
        phase: &CaptionPhase,
        player: &str,
        action: &CaptionAction,
        content: &CaptionContent,
        ledger: &Ledger<Self>,
    ) -> bool {
        match (phase, action) {
            (CaptionPhase::Captioning, CaptionAction::Caption(_)) => true,
            (CaptionPhase::Voting, CaptionAction::Abstain) => true,
            (CaptionPhase::Voting, CaptionAction::Vote(slot)) => {
                *slot < content.captions.len()
                    && !own_slots(&content.captions, &caption_pool(ledger), player).contains(slot)
            }
            _ => false,
        }
    }

    fn sentinel(&self, phase: &CaptionPhase) -> CaptionAction {
        match phase {
            CaptionPhase::Captioning => CaptionAction::Caption(String::new()),
            CaptionPhase::Voting => CaptionAction::Abstain,
        }
    }

    fn score_round(&self, content: &CaptionContent, ledger: &Ledger<Self>) -> RoundOutcome {
        let pool = caption_pool(ledger);
        let mut outcome = RoundOutcome::default();

        if let Some(votes) = ledger.actions(&CaptionPhase::Voting) {
            for submission in votes.values() {
                let CaptionAction::Vote(slot) = submission.action else {
                    continue;
                };
                let authors = content
                    .captions
                    .get(slot)
                    .and_then(|text| pool.get(text));
                for author in authors.into_iter().flatten() {
                    outcome.award(author, 1);
                    outcome.count(author);
                }
            }
        }
        outcome
    }

    /// `Captioning`: the whole line. `Voting`: a 1-based caption number or
    /// `skip`.
    fn parse_action(
        &self,
        phase: &CaptionPhase,
        _content: &CaptionContent,
        text: &str,
    ) -> Option<CaptionAction> {
        let text = text.trim();
        match phase {
            CaptionPhase::Captioning => Some(CaptionAction::Caption(text.to_string())),
            CaptionPhase::Voting if text.eq_ignore_ascii_case("skip") => {
                Some(CaptionAction::Abstain)
            }
            CaptionPhase::Voting => {
                let slot: usize = text.parse().ok()?;
                Some(CaptionAction::Vote(slot.checked_sub(1)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use shared::{leaderboard, RoundLedger};

    fn captioned(captions: &[(&str, &str)]) -> (Ledger<Caption>, CaptionContent) {
        let mut ledger = RoundLedger::new();
        for (player, text) in captions {
            ledger.record(
                &CaptionPhase::Captioning,
                player,
                CaptionAction::Caption(text.to_string()),
                false,
            );
        }
        let mut content = CaptionContent {
            template: "t".into(),
            captions: Vec::new(),
        };
        let mut rng = StdRng::seed_from_u64(5);
        Caption::default().enter_phase(&CaptionPhase::Voting, &mut content, &ledger, &mut rng);
        (ledger, content)
    }

    fn slot_of(content: &CaptionContent, text: &str) -> usize {
        content.captions.iter().position(|c| c == text).unwrap()
    }

    #[test]
    fn test_cannot_vote_for_own_caption() {
        let game = Caption::default();
        let (ledger, content) = captioned(&[("a", "funny"), ("b", "meh"), ("c", "ok")]);
        let funny = slot_of(&content, "funny");
        assert!(!game.accepts(
            &CaptionPhase::Voting,
            "a",
            &CaptionAction::Vote(funny),
            &content,
            &ledger
        ));
        assert!(game.accepts(
            &CaptionPhase::Voting,
            "b",
            &CaptionAction::Vote(funny),
            &content,
            &ledger
        ));
    }

    #[test]
    fn test_votes_score_one_point_each() {
        let game = Caption::default();
        let (mut ledger, content) = captioned(&[("a", "funny"), ("b", "meh"), ("c", "ok")]);
        let funny = slot_of(&content, "funny");
        let meh = slot_of(&content, "meh");

        ledger.record(&CaptionPhase::Voting, "b", CaptionAction::Vote(funny), false);
        ledger.record(&CaptionPhase::Voting, "c", CaptionAction::Vote(funny), false);
        ledger.record(&CaptionPhase::Voting, "a", CaptionAction::Vote(meh), false);

        let outcome = game.score_round(&content, &ledger);
        assert_eq!(outcome.points.get("a"), Some(&2));
        assert_eq!(outcome.points.get("b"), Some(&1));
        assert_eq!(outcome.tally.get("a"), Some(&2));
        assert_eq!(leaderboard::round_winner(&outcome.points), Some("a".to_string()));
    }

    #[test]
    fn test_abstain_scores_nothing() {
        let game = Caption::default();
        let (mut ledger, content) = captioned(&[("a", "x"), ("b", "y"), ("c", "z")]);
        ledger.record(&CaptionPhase::Voting, "a", CaptionAction::Abstain, true);
        assert!(game.score_round(&content, &ledger).points.is_empty());
    }

    #[test]
    fn test_parse_vote() {
        let game = Caption::default();
        let content = CaptionContent {
            template: "t".into(),
            captions: vec!["x".into(), "y".into()],
        };
        assert_eq!(
            game.parse_action(&CaptionPhase::Voting, &content, "2"),
            Some(CaptionAction::Vote(1))
        );
        assert_eq!(
            game.parse_action(&CaptionPhase::Voting, &content, "SKIP"),
            Some(CaptionAction::Abstain)
        );
        assert_eq!(game.parse_action(&CaptionPhase::Voting, &content, "two"), None);
    }
}
