//! Scripted dialogs and assistant context for the glove purchase demo

use crate::collaborators::Speaker::{Cove, Juan};
use crate::collaborators::{DialogLine, Speaker};
use std::fmt;
use std::str::FromStr;

/// Which scripted dialog to voice
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DialogScript {
    /// Supplier holds firm and the buyer escalates to a manager
    Escalation,
    /// Buyer talks the supplier down to two cents a glove
    Agreement,
}

impl DialogScript {
    pub fn lines(&self) -> Vec<DialogLine> {
        let script = match self {
            DialogScript::Escalation => ESCALATION,
            DialogScript::Agreement => AGREEMENT,
        };
        script
            .iter()
            .map(|(speaker, text)| DialogLine::new(*speaker, text))
            .collect()
    }
}

impl fmt::Display for DialogScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialogScript::Escalation => write!(f, "escalation"),
            DialogScript::Agreement => write!(f, "agreement"),
        }
    }
}

impl FromStr for DialogScript {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "escalation" => Ok(DialogScript::Escalation),
            "agreement" => Ok(DialogScript::Agreement),
            other => Err(format!("unknown dialog script: {}", other)),
        }
    }
}

const ESCALATION: &[(Speaker, &str)] = &[
    (Cove, "I’m looking to buy 1,000 rubber gloves. What’s your best price per glove?"),
    (Juan, "For that quantity, we’re pricing at $0.04 per glove. That’s $40 for 10 boxes."),
    (Cove, "That’s a bit high. I’ve seen gloves priced significantly lower. Can you do better?"),
    (Juan, "Our gloves are top quality, and costs have been rising. This is a fair rate."),
    (Cove, "Quality is important, but this is a volume purchase. Market prices are lower."),
    (Juan, "Alright, I can lower it to $0.038 per glove. That’s the best I can do."),
    (Cove, "Still outside our range. I’ve seen offers at $0.03 or less. We need to get closer."),
    (Juan, "I doubt you’re getting this quality at that price. We stand by our product."),
    (Cove, "If we can’t get under $0.035, I’ll have to check with my manager."),
    (Juan, "Go ahead, but I don’t think anyone’s offering this quality for less."),
    (Cove, "Let me bring my manager into this. Give me a moment."),
];

const AGREEMENT: &[(Speaker, &str)] = &[
    (Cove, "I’m looking to buy 1,000 rubber gloves. What’s your best price per glove?"),
    (Juan, "I appreciate your business. For this quantity, I can offer you a solid deal—$0.03 per glove. That’s competitive in today’s market."),
    (Cove, "Three cents? Come on, I’ve been sourcing gloves for a while, and I know the market range. That’s on the high end. I was expecting something more reasonable."),
    (Juan, "I hear you, but prices are fluctuating. Supply chain issues, demand spikes—you know how it is. At $0.03, you’re getting consistent quality and reliable delivery."),
    (Cove, "Let’s be real, you and I both know that gloves are available for less. I respect your business, but I can’t justify overpaying."),
    (Juan, "I’m not just selling gloves—I’m selling dependability. You want gloves that won’t tear, that arrive on time. The cheap stuff? It’s cheap for a reason."),
    (Cove, "I’m all for quality, but I also have a budget. $0.015 per glove is what I’m seeing out there."),
    (Juan, "No way. At that price, you’re getting leftovers from who-knows-where. If you’re serious, I can do $0.027, but that’s pushing it."),
    (Cove, "That’s still not working for me. Look, I’ll be straightforward—I’m a buyer who comes back for more. You give me a fair deal, I’ll remember it."),
    (Juan, "Future business is great, but I can’t lose money on this deal. How about $0.025? That’s already cutting into my margin."),
    (Cove, "We’re getting there, but I still think you can do better. I’ll take all 1,000 gloves right now at $0.02 per glove. You get a clean sale, no hassle."),
    (Juan, "$0.02? That’s tough. You’re really squeezing me here."),
    (Cove, "I’m giving you a guaranteed sale. No chasing, no delays. Let’s lock it in."),
    (Juan, "…Alright. $0.02 per glove. But next time, we talk bulk pricing first."),
    (Cove, "Fair enough. Pleasure doing business."),
];

/// Briefing for the assistant that reports back to the purchasing manager
pub const NEGOTIATION_CONTEXT: &str = "\
You are an AI negotiation assistant speaking to a purchasing manager about a recent price discussion with a supplier for rubber gloves. Your goal is to summarize the negotiation and help the manager decide whether to proceed with the purchase or hold off for now.

Key Points to Cover:

You negotiated for 1,000 gloves but couldn’t get the price below 4 cents per glove.

The supplier insists on quality but won’t match the lower-end market price of 3 cents per glove.

The supplier is firm on their offer and unlikely to reduce further.

Competitor pricing exists, but quality might be uncertain.

If the manager values immediate supply and quality, accepting the price makes sense.

If cost savings are the priority, waiting and exploring other options could be better.

Steer the conversation by:

Asking if the manager wants to prioritize quality or cost.

Clarifying if waiting is an acceptable option.

Providing a concise, objective recommendation based on the priorities given.

End the conversation with a clear decision: either approve the purchase at the current price or hold off and seek alternatives";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_alternate_and_open_with_buyer() {
        for script in [DialogScript::Escalation, DialogScript::Agreement] {
            let lines = script.lines();
            assert_eq!(lines[0].speaker, Speaker::Cove);
            for pair in lines.windows(2) {
                assert_ne!(pair[0].speaker, pair[1].speaker);
            }
        }
    }

    #[test]
    fn test_script_lengths() {
        assert_eq!(DialogScript::Escalation.lines().len(), 11);
        assert_eq!(DialogScript::Agreement.lines().len(), 15);
    }

    #[test]
    fn test_spoken_text_keeps_punctuation() {
        let lines = DialogScript::Agreement.lines();
        assert_eq!(
            lines[1].text,
            "I appreciate your business. For this quantity, I can offer you a solid deal\u{2014}$0.03 per glove. That\u{2019}s competitive in today\u{2019}s market."
        );
        assert!(lines[5].text.starts_with("I\u{2019}m not just selling gloves\u{2014}I\u{2019}m selling"));
    }

    #[test]
    fn test_parse_script() {
        assert_eq!("Agreement".parse::<DialogScript>(), Ok(DialogScript::Agreement));
        assert_eq!(" escalation ".parse::<DialogScript>(), Ok(DialogScript::Escalation));
        assert!("haggle".parse::<DialogScript>().is_err());
    }
}
