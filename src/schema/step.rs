use serde::{Deserialize, Serialize};

/// An ordered stage of the entry procedure.
///
/// `required` is the search order used when attributing an utterance to an
/// intent; the learner may satisfy the intents in any order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub key: String,
    pub title: String,
    /// Visitor lines emitted once, the first time the step becomes active.
    pub opening: Vec<String>,
    pub required: Vec<String>,
    /// Used when an unmatched question cannot be echoed back.
    pub failure_response: String,
    pub hint: String,
    /// Completion additionally waits for the supervisor briefing.
    #[serde(default)]
    pub requires_briefing: bool,
}

fn step(
    key: &str,
    title: &str,
    opening: &[&str],
    required: &[&str],
    failure_response: &str,
    hint: &str,
) -> Step {
    Step {
        key: key.to_string(),
        title: title.to_string(),
        opening: opening.iter().map(|s| s.to_string()).collect(),
        required: required.iter().map(|s| s.to_string()).collect(),
        failure_response: failure_response.to_string(),
        hint: hint.to_string(),
        requires_briefing: false,
    }
}

/// The five-step entry-control procedure.
pub fn default_steps() -> Vec<Step> {
    let mut id_check = step(
        "id_check",
        "2) ID-check + control question + contact supervisor",
        &["Sure. Where do you want me to go?"],
        &["request_id", "control_question", "contact_supervisor"],
        "Why do you need that?",
        "Request ID, ask one control question (DOB/address/nationality), then contact supervisor.",
    );
    id_check.requires_briefing = true;

    vec![
        step(
            "gate",
            "1) Gate interview (5W's + appointment details)",
            &["Good morning.", "I need to enter the base."],
            &[
                "ask_identity",
                "ask_purpose",
                "ask_appointment",
                "ask_host",
                "ask_time",
                "ask_topic",
            ],
            "Sorry, what exactly do you need to know?",
            "Ask: name, purpose, appointment, who with, what time, and what it is about.",
        ),
        id_check,
        step(
            "threat_rules",
            "3) Entry decision: search warning + prohibited items (weapons/drugs/alcohol)",
            &["Can I go in now?"],
            &["inform_search_threat", "prohibited_items", "request_surrender"],
            "I don't understand. What do you mean?",
            "Explain the search due to threat. State prohibited items. Ask to surrender them.",
        ),
        step(
            "patdown",
            "4) Pat-down / search instructions (with 3 mandatory announcements)",
            &["Alright. What do I need to do?"],
            &[
                "explain_patdown",
                "ask_sharp",
                "empty_pockets",
                "remove_jacket",
                "announce_armpits",
                "announce_waist",
                "announce_private",
                "leg_instruction",
            ],
            "Could you give me a clear instruction, please?",
            "Explain pat-down, ask sharp objects, empty pockets, remove jacket, announce armpits/waist/private parts, and give leg instruction.",
        ),
        step(
            "registration_rules",
            "5) Registration + base rules briefing",
            &["Okay. Am I good to go?"],
            &[
                "issue_visitor_pass_rule",
                "return_pass_rule",
                "alarm_rally_point",
                "closing_time",
            ],
            "Sorry, can you repeat that more clearly?",
            "Visitor pass rules, return rule, rally point, and closing time.",
        ),
    ]
}

/// Every required intent across all steps, in declaration order.
pub fn all_required(steps: &[Step]) -> impl Iterator<Item = &str> {
    steps.iter().flat_map(|s| s.required.iter().map(String::as_str))
}
