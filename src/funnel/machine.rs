//! Funnel state machine — pure decision logic.
//!
//! `decide` looks at the current lead (if any) and one inbound signal, and
//! returns what to persist, what to answer, and whether the reminder set must
//! be re-armed. It performs no I/O.

use super::referral::{ORGANIC_SOURCE, parse_referral};
use super::stage::Stage;
use super::strategy::Strategy;
use crate::store::{Lead, LeadUpdate};

/// Free-text keywords that self-report funnel progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Done,
    Verified,
    Funded,
}

impl Keyword {
    /// Match an already-normalized (trimmed, lowercase) text.
    pub fn parse(normalized: &str) -> Option<Self> {
        match normalized {
            "done" => Some(Self::Done),
            "verified" => Some(Self::Verified),
            "funded" => Some(Self::Funded),
            _ => None,
        }
    }

    pub fn target_stage(&self) -> Stage {
        match self {
            Self::Done => Stage::Done,
            Self::Verified => Stage::Verified,
            Self::Funded => Stage::Funded,
        }
    }
}

/// Button options the funnel understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuOption {
    SelectStrategy(Strategy),
    BeginCopying,
    EnabledCopying,
    GetStarted,
    HowItWorks,
    CopyLink,
    Support,
    Back,
}

impl MenuOption {
    /// Resolve an opaque option identifier. Unknown ids yield `None`.
    pub fn parse(option_id: &str) -> Option<Self> {
        if let Ok(strategy) = option_id.parse::<Strategy>() {
            return Some(Self::SelectStrategy(strategy));
        }
        match option_id {
            "start_copying" => Some(Self::BeginCopying),
            "copied" => Some(Self::EnabledCopying),
            "get_started" => Some(Self::GetStarted),
            "info" => Some(Self::HowItWorks),
            "copy_link" => Some(Self::CopyLink),
            "support" => Some(Self::Support),
            "back" => Some(Self::Back),
            _ => None,
        }
    }

    /// Identifier carried by the button for this option.
    pub fn id(&self) -> &'static str {
        match self {
            Self::SelectStrategy(strategy) => strategy.key(),
            Self::BeginCopying => "start_copying",
            Self::EnabledCopying => "copied",
            Self::GetStarted => "get_started",
            Self::HowItWorks => "info",
            Self::CopyLink => "copy_link",
            Self::Support => "support",
            Self::Back => "back",
        }
    }
}

/// One classified input to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Start command (or `start` typed as text) with its optional argument.
    Start { token: Option<String> },
    Menu(MenuOption),
    Keyword(Keyword),
    /// Free text or option id that matched nothing.
    Unrecognized,
}

/// The response the funnel wants to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Greeting plus the account-size question.
    Welcome { name: Option<String> },
    /// Account-size question on its own (strategy is required but missing).
    ChooseStrategy,
    StrategyChosen(Strategy),
    CopyInstructions(Strategy),
    CopyingActive,
    AccountStep,
    VerificationStep,
    FundingStep,
    ActivationStep(Strategy),
    HowItWorks,
    CopyLink(Option<Strategy>),
    Support,
    MainMenu,
    Fallback,
}

/// Who the signal came from.
#[derive(Debug, Clone, Copy)]
pub struct Subject<'a> {
    pub user_id: &'a str,
    pub display_name: Option<&'a str>,
    pub lead: Option<&'a Lead>,
}

/// Outcome of one transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Fields to upsert. `None` means the store is left untouched.
    pub update: Option<LeadUpdate>,
    pub reply: Reply,
    /// Cancel and recreate the user's reminder jobs.
    pub rearm: bool,
}

impl Decision {
    fn respond(subject: &Subject<'_>, reply: Reply) -> Self {
        Self {
            update: first_contact(subject),
            reply,
            rearm: false,
        }
    }
}

/// Compute the next funnel step for `signal`.
pub fn decide(subject: Subject<'_>, signal: Signal) -> Decision {
    let stage = subject.lead.map(|l| l.stage);
    let strategy = subject.lead.and_then(|l| l.strategy);

    match signal {
        Signal::Start { token } => {
            let referral = parse_referral(token.as_deref());
            let has_source = subject.lead.is_some_and(|l| l.source.is_some());
            let source = referral
                .source
                .or_else(|| (!has_source).then(|| ORGANIC_SOURCE.to_string()));

            Decision {
                update: Some(
                    base_update(&subject)
                        .with_stage(Stage::Start)
                        .with_source(source)
                        .with_strategy(referral.strategy),
                ),
                reply: Reply::Welcome {
                    name: subject.display_name.map(str::to_string),
                },
                rearm: true,
            }
        }

        Signal::Menu(MenuOption::SelectStrategy(selected)) => {
            let mut update = base_update(&subject).with_strategy(Some(selected));
            if matches!(stage, None | Some(Stage::Start) | Some(Stage::StrategySelected)) {
                update = update.with_stage(Stage::StrategySelected);
            }
            Decision {
                update: Some(update),
                reply: Reply::StrategyChosen(selected),
                rearm: false,
            }
        }

        Signal::Menu(MenuOption::BeginCopying) => {
            let reply = match strategy {
                Some(s) => Reply::CopyInstructions(s),
                None => Reply::ChooseStrategy,
            };
            if matches!(stage, None | Some(Stage::Start) | Some(Stage::StrategySelected)) {
                Decision {
                    update: Some(base_update(&subject).with_stage(Stage::StartCopying)),
                    reply,
                    rearm: false,
                }
            } else {
                Decision::respond(&subject, reply)
            }
        }

        Signal::Menu(MenuOption::EnabledCopying) => match strategy {
            Some(_) => Decision {
                update: Some(base_update(&subject).with_stage(Stage::Copied)),
                reply: Reply::CopyingActive,
                rearm: false,
            },
            None => Decision::respond(&subject, Reply::ChooseStrategy),
        },

        Signal::Menu(MenuOption::GetStarted) => Decision::respond(&subject, Reply::AccountStep),
        Signal::Menu(MenuOption::HowItWorks) => Decision::respond(&subject, Reply::HowItWorks),
        Signal::Menu(MenuOption::CopyLink) => Decision::respond(&subject, Reply::CopyLink(strategy)),
        Signal::Menu(MenuOption::Support) => Decision::respond(&subject, Reply::Support),
        Signal::Menu(MenuOption::Back) => Decision::respond(&subject, Reply::MainMenu),

        Signal::Keyword(keyword) => {
            let reply = match keyword {
                Keyword::Done => Reply::VerificationStep,
                Keyword::Verified => Reply::FundingStep,
                Keyword::Funded => match strategy {
                    Some(s) => Reply::ActivationStep(s),
                    None => return Decision::respond(&subject, Reply::ChooseStrategy),
                },
            };

            let target = keyword.target_stage();
            if stage.is_none_or(|current| current < target) {
                Decision {
                    update: Some(base_update(&subject).with_stage(target)),
                    reply,
                    rearm: false,
                }
            } else {
                // Already at or past this step: repeat the instructions.
                Decision::respond(&subject, reply)
            }
        }

        Signal::Unrecognized => Decision::respond(&subject, Reply::Fallback),
    }
}

fn base_update(subject: &Subject<'_>) -> LeadUpdate {
    LeadUpdate::new(subject.user_id).with_display_name(subject.display_name.map(str::to_string))
}

/// Creates the lead on first contact, otherwise leaves the store alone.
fn first_contact(subject: &Subject<'_>) -> Option<LeadUpdate> {
    subject.lead.is_none().then(|| base_update(subject))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn lead(stage: Stage, strategy: Option<Strategy>) -> Lead {
        let now = Utc::now();
        Lead {
            user_id: "42".into(),
            first_seen: now,
            last_touch: now,
            stage,
            source: Some("meta".into()),
            display_name: Some("Alice".into()),
            strategy,
            started_at: Some(now),
        }
    }

    fn subject(lead: Option<&Lead>) -> Subject<'_> {
        Subject {
            user_id: "42",
            display_name: Some("Alice"),
            lead,
        }
    }

    #[test]
    fn start_for_new_user_with_token() {
        let d = decide(
            subject(None),
            Signal::Start {
                token: Some("st500_meta".into()),
            },
        );
        let update = d.update.unwrap();
        assert_eq!(update.stage, Some(Stage::Start));
        assert_eq!(update.source.as_deref(), Some("meta"));
        assert_eq!(update.strategy, Some(Strategy::St500));
        assert!(d.rearm);
        assert_eq!(
            d.reply,
            Reply::Welcome {
                name: Some("Alice".into())
            }
        );
    }

    #[test]
    fn start_without_token_is_organic_for_new_user() {
        let d = decide(subject(None), Signal::Start { token: None });
        let update = d.update.unwrap();
        assert_eq!(update.source.as_deref(), Some(ORGANIC_SOURCE));
        assert!(update.strategy.is_none());
    }

    #[test]
    fn restart_without_token_keeps_existing_source() {
        let existing = lead(Stage::Verified, Some(Strategy::St50));
        let d = decide(subject(Some(&existing)), Signal::Start { token: None });
        let update = d.update.unwrap();
        assert_eq!(update.stage, Some(Stage::Start));
        assert!(update.source.is_none(), "must not overwrite meta with organic");
        assert!(d.rearm);
    }

    #[test]
    fn strategy_selection_from_start() {
        let existing = lead(Stage::Start, None);
        let d = decide(
            subject(Some(&existing)),
            Signal::Menu(MenuOption::SelectStrategy(Strategy::St50)),
        );
        let update = d.update.unwrap();
        assert_eq!(update.stage, Some(Stage::StrategySelected));
        assert_eq!(update.strategy, Some(Strategy::St50));
        assert_eq!(d.reply, Reply::StrategyChosen(Strategy::St50));
    }

    #[test]
    fn strategy_selection_later_keeps_stage() {
        let existing = lead(Stage::Verified, None);
        let d = decide(
            subject(Some(&existing)),
            Signal::Menu(MenuOption::SelectStrategy(Strategy::St500)),
        );
        let update = d.update.unwrap();
        assert!(update.stage.is_none());
        assert_eq!(update.strategy, Some(Strategy::St500));
    }

    #[test]
    fn begin_copying_from_strategy_selected() {
        let existing = lead(Stage::StrategySelected, Some(Strategy::St500));
        let d = decide(subject(Some(&existing)), Signal::Menu(MenuOption::BeginCopying));
        assert_eq!(d.update.unwrap().stage, Some(Stage::StartCopying));
        assert_eq!(d.reply, Reply::CopyInstructions(Strategy::St500));
    }

    #[test]
    fn begin_copying_after_done_does_not_move() {
        let existing = lead(Stage::Done, Some(Strategy::St50));
        let d = decide(subject(Some(&existing)), Signal::Menu(MenuOption::BeginCopying));
        assert!(d.update.is_none());
        assert_eq!(d.reply, Reply::CopyInstructions(Strategy::St50));
    }

    #[test]
    fn done_keyword_from_start() {
        let existing = lead(Stage::Start, None);
        let d = decide(subject(Some(&existing)), Signal::Keyword(Keyword::Done));
        assert_eq!(d.update.unwrap().stage, Some(Stage::Done));
        assert_eq!(d.reply, Reply::VerificationStep);
        assert!(!d.rearm);
    }

    #[test]
    fn keywords_skip_ahead() {
        let existing = lead(Stage::Start, Some(Strategy::St500));
        let d = decide(subject(Some(&existing)), Signal::Keyword(Keyword::Funded));
        assert_eq!(d.update.unwrap().stage, Some(Stage::Funded));
        assert_eq!(d.reply, Reply::ActivationStep(Strategy::St500));
    }

    #[test]
    fn keyword_never_regresses() {
        let existing = lead(Stage::Funded, Some(Strategy::St50));
        let d = decide(subject(Some(&existing)), Signal::Keyword(Keyword::Done));
        assert!(d.update.is_none());
        assert_eq!(d.reply, Reply::VerificationStep);
    }

    #[test]
    fn funded_without_strategy_reprompts() {
        let existing = lead(Stage::Verified, None);
        let d = decide(subject(Some(&existing)), Signal::Keyword(Keyword::Funded));
        assert!(d.update.is_none());
        assert_eq!(d.reply, Reply::ChooseStrategy);
    }

    #[test]
    fn funded_for_unknown_user_reprompts_and_creates_lead() {
        let d = decide(subject(None), Signal::Keyword(Keyword::Funded));
        let update = d.update.unwrap();
        assert!(update.stage.is_none());
        assert_eq!(d.reply, Reply::ChooseStrategy);
    }

    #[test]
    fn enabled_copying_requires_strategy() {
        let without = lead(Stage::Start, None);
        let d = decide(subject(Some(&without)), Signal::Menu(MenuOption::EnabledCopying));
        assert!(d.update.is_none());
        assert_eq!(d.reply, Reply::ChooseStrategy);

        let with = lead(Stage::Start, Some(Strategy::St50));
        let d = decide(subject(Some(&with)), Signal::Menu(MenuOption::EnabledCopying));
        assert_eq!(d.update.unwrap().stage, Some(Stage::Copied));
        assert_eq!(d.reply, Reply::CopyingActive);
    }

    #[test]
    fn unrecognized_text_leaves_existing_lead_alone() {
        let existing = lead(Stage::Done, None);
        let d = decide(subject(Some(&existing)), Signal::Unrecognized);
        assert!(d.update.is_none());
        assert_eq!(d.reply, Reply::Fallback);
    }

    #[test]
    fn informational_options_never_change_stage() {
        let existing = lead(Stage::Verified, Some(Strategy::St50));
        for option in [
            MenuOption::GetStarted,
            MenuOption::HowItWorks,
            MenuOption::CopyLink,
            MenuOption::Support,
            MenuOption::Back,
        ] {
            let d = decide(subject(Some(&existing)), Signal::Menu(option));
            assert!(d.update.is_none(), "{option:?} touched the store");
            assert!(!d.rearm);
        }
    }

    #[test]
    fn option_ids_roundtrip() {
        for option in [
            MenuOption::SelectStrategy(Strategy::St50),
            MenuOption::SelectStrategy(Strategy::St500),
            MenuOption::BeginCopying,
            MenuOption::EnabledCopying,
            MenuOption::GetStarted,
            MenuOption::HowItWorks,
            MenuOption::CopyLink,
            MenuOption::Support,
            MenuOption::Back,
        ] {
            assert_eq!(MenuOption::parse(option.id()), Some(option));
        }
        assert_eq!(MenuOption::parse("onb9"), None);
    }

    #[test]
    fn keyword_parse() {
        assert_eq!(Keyword::parse("done"), Some(Keyword::Done));
        assert_eq!(Keyword::parse("verified"), Some(Keyword::Verified));
        assert_eq!(Keyword::parse("funded"), Some(Keyword::Funded));
        assert_eq!(Keyword::parse("Funded"), None);
        assert_eq!(Keyword::parse("done!"), None);
    }
}
