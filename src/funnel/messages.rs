//! Message copy and button sets for each funnel reply.

use super::machine::{MenuOption, Reply};
use super::strategy::Strategy;
use crate::channels::{Button, ButtonSet, OutgoingMessage};
use crate::config::FunnelLinks;

pub const DISCLAIMER: &str = "This is not financial advice. Trading involves risk; \
past performance does not guarantee future results.";

/// Sent when handling an event failed internally.
pub const RETRY_MESSAGE: &str = "Something went wrong. Please try again or type /start.";

/// Sent to non-operators asking for stats.
pub const RESTRICTED_MESSAGE: &str = "Stats are restricted.";

fn option(label: &str, option: MenuOption) -> Button {
    Button::callback(label, option.id())
}

fn account_size_buttons() -> ButtonSet {
    vec![
        vec![option("Under $500", MenuOption::SelectStrategy(Strategy::St50))],
        vec![option("Over $500", MenuOption::SelectStrategy(Strategy::St500))],
    ]
}

/// The main menu.
pub fn main_menu() -> ButtonSet {
    vec![
        vec![option("1️⃣ Get Started", MenuOption::GetStarted)],
        vec![option("2️⃣ How Copy Trading Works", MenuOption::HowItWorks)],
        vec![option("3️⃣ Copy Link", MenuOption::CopyLink)],
        vec![option("4️⃣ Contact Support", MenuOption::Support)],
    ]
}

fn copy_buttons(strategy: Strategy) -> ButtonSet {
    let profile = strategy.profile();
    vec![
        vec![Button::url("Open Copy Trading", profile.copy_link)],
        vec![Button::url("Join Strategy Channel", profile.channel_link)],
        vec![option("I enabled copying", MenuOption::EnabledCopying)],
    ]
}

/// Render a funnel reply into a concrete message.
pub fn render(reply: &Reply, links: &FunnelLinks) -> OutgoingMessage {
    match reply {
        Reply::Welcome { name } => {
            let greeting = match name {
                Some(name) => format!("Hey {name} 👋"),
                None => "Hey 👋".to_string(),
            };
            OutgoingMessage::text(format!(
                "{greeting}\n\nWelcome to Team Steady.\n\n\
                 We trade XAUUSD with strict risk control.\n\n\
                 What is your account size?"
            ))
            .with_buttons(account_size_buttons())
        }

        Reply::ChooseStrategy => OutgoingMessage::text(
            "Before we continue, pick the strategy that fits your account.\n\n\
             What is your account size?",
        )
        .with_buttons(account_size_buttons()),

        Reply::StrategyChosen(strategy) => {
            let profile = strategy.profile();
            OutgoingMessage::text(format!(
                "✅ {}\nBest for: {}\n\nTap below when you are ready to start copying.",
                profile.name, profile.audience
            ))
            .with_buttons(vec![
                vec![option("Start copying", MenuOption::BeginCopying)],
                vec![option("Back", MenuOption::Back)],
            ])
        }

        Reply::CopyInstructions(strategy) => OutgoingMessage::text(format!(
            "{}\n\nOpen Copy Trading below and enable copying.",
            strategy.profile().name
        ))
        .with_buttons(copy_buttons(*strategy)),

        Reply::CopyingActive => OutgoingMessage::text(format!(
            "🔥 Perfect. Copying is now active.\n\n\
             Stay updated in the strategy channel.\n\n{DISCLAIMER}"
        )),

        Reply::AccountStep => OutgoingMessage::text(format!(
            "Step 1 — Create Your Account\n\n👉 {}\n\nType \"Done\" when finished.",
            links.account
        )),

        Reply::VerificationStep => OutgoingMessage::text(
            "Step 2 — Verification (KYC)\n\n\
             Upload your ID and proof of address. Type \"Verified\" when ready.",
        ),

        Reply::FundingStep => OutgoingMessage::text(
            "Step 3 — Add Funds\n\n\
             Choose a starting amount you are comfortable with. Type \"Funded\" when complete.",
        ),

        Reply::ActivationStep(strategy) => {
            let profile = strategy.profile();
            OutgoingMessage::text(format!(
                "Step 4 — Activate Copy Trading\n\n\
                 Strategy: {}\n👉 {}\n\nPress \"Copy\", then join the strategy channel:\n{}\n\n{DISCLAIMER}",
                profile.name, profile.copy_link, profile.channel_link
            ))
            .with_buttons(copy_buttons(*strategy))
        }

        Reply::HowItWorks => OutgoingMessage::text(format!(
            "Copy trading mirrors our trades automatically. \
             You control your capital and can pause anytime.\n\n{DISCLAIMER}"
        ))
        .with_buttons(vec![
            vec![option("Get Started", MenuOption::GetStarted)],
            vec![option("Copy Link", MenuOption::CopyLink)],
            vec![option("Back", MenuOption::Back)],
        ]),

        Reply::CopyLink(strategy) => match strategy {
            Some(strategy) => OutgoingMessage::text(format!(
                "Copy link for {}:\n👉 {}\n\nNeed help? Choose Get Started.",
                strategy.profile().name,
                strategy.profile().copy_link
            ))
            .with_buttons(vec![
                vec![option("Get Started", MenuOption::GetStarted)],
                vec![Button::url("Info Channel", strategy.profile().channel_link)],
                vec![option("Back", MenuOption::Back)],
            ]),
            None => OutgoingMessage::text(
                "Pick your account size first so we can send the right copy link.",
            )
            .with_buttons(account_size_buttons()),
        },

        Reply::Support => OutgoingMessage::text(
            "Write your message here or open support. We answer as soon as possible.",
        )
        .with_buttons(vec![
            vec![Button::url("Open Support", &links.support)],
            vec![Button::url("Info Channel", &links.channel)],
            vec![option("Back", MenuOption::Back)],
        ]),

        Reply::MainMenu => OutgoingMessage::text("Choose an option below:").with_buttons(main_menu()),

        Reply::Fallback => OutgoingMessage::text(
            "I did not understand. Choose a menu option or type /start.",
        )
        .with_buttons(main_menu()),
    }
}
