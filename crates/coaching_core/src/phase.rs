//! crates/coaching_core/src/phase.rs
//!
//! Heuristic detection of GROW phase transitions from conversation content.
//!
//! The detector is a rule-based classifier over a sliding window of recent
//! utterances: a transition to the next stage fires only when the user has
//! engaged for a minimum number of turns AND the recent conversation contains
//! lexical evidence that the current stage's work is done. It is deliberately
//! behind a trait so the heuristic can later be swapped for a better
//! classifier without touching the conversation driver.

use crate::domain::{ChatTurn, Phase, Role};
use lazy_static::lazy_static;
use regex::Regex;

/// How many of the most recent messages (any role) are scanned for
/// completion signals.
const RECENT_WINDOW: usize = 6;

/// Minimum user-authored turns before a goal → reality transition.
const GOAL_MIN_USER_TURNS: usize = 3;
/// Minimum user-authored turns before a reality → options transition.
const REALITY_MIN_USER_TURNS: usize = 5;
/// Minimum user-authored turns before an options → will transition.
const OPTIONS_MIN_USER_TURNS: usize = 7;

lazy_static! {
    /// Lexical evidence that the user has articulated a clear goal.
    static ref GOAL_COMPLETION_SIGNALS: Vec<Regex> = compile(&[
        "我的目标是",
        "我想要(实现|达成|完成)",
        "希望在.*?之前",
        "具体的指标是",
        "成功的标志是",
        "衡量标准",
    ]);

    /// Lexical evidence that the current-state analysis has been done.
    static ref REALITY_COMPLETION_SIGNALS: Vec<Regex> = compile(&[
        "目前.*?分清晰",
        "现状.*?是",
        "障碍.*?是",
        "我的优势",
        "可以利用",
        "资源.*?有",
        "影响因素",
    ]);

    /// Lexical evidence that options have been explored, including a
    /// confidence score of 7 or above.
    static ref OPTIONS_COMPLETION_SIGNALS: Vec<Regex> = compile(&[
        "我计划",
        "我打算",
        "可以.*?做",
        "方案.*?是",
        "我.*?信心",
        "[7-9]分|10分",
    ]);
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("phase signal pattern must compile"))
        .collect()
}

/// Strategy seam for phase detection: history × phase → phase.
///
/// Implementations must be pure (no I/O, no randomness), forward-only, and
/// advance at most one stage per invocation.
pub trait PhaseDetector: Send + Sync {
    fn detect(&self, history: &[ChatTurn], current: Phase) -> Phase;
}

/// The regex-and-threshold detector carried over from the original system.
///
/// Thresholds and signal sets are empirically chosen configuration constants;
/// they are not re-derived here.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedDetector;

impl RuleBasedDetector {
    pub fn new() -> Self {
        RuleBasedDetector
    }

    fn recent_content(history: &[ChatTurn]) -> String {
        let start = history.len().saturating_sub(RECENT_WINDOW);
        history[start..]
            .iter()
            .map(|turn| turn.content.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn user_turn_count(history: &[ChatTurn]) -> usize {
        history.iter().filter(|turn| turn.role == Role::User).count()
    }

    fn any_match(signals: &[Regex], content: &str) -> bool {
        signals.iter().any(|signal| signal.is_match(content))
    }
}

impl PhaseDetector for RuleBasedDetector {
    fn detect(&self, history: &[ChatTurn], current: Phase) -> Phase {
        // A conversation with no history always starts at the goal stage.
        if history.is_empty() {
            return Phase::Goal;
        }

        let user_turns = Self::user_turn_count(history);
        let recent = Self::recent_content(history);

        match current {
            Phase::Goal => {
                if user_turns >= GOAL_MIN_USER_TURNS
                    && Self::any_match(&GOAL_COMPLETION_SIGNALS, &recent)
                {
                    Phase::Reality
                } else {
                    Phase::Goal
                }
            }
            Phase::Reality => {
                if user_turns >= REALITY_MIN_USER_TURNS
                    && Self::any_match(&REALITY_COMPLETION_SIGNALS, &recent)
                {
                    Phase::Options
                } else {
                    Phase::Reality
                }
            }
            Phase::Options => {
                if user_turns >= OPTIONS_MIN_USER_TURNS
                    && Self::any_match(&OPTIONS_COMPLETION_SIGNALS, &recent)
                {
                    Phase::Will
                } else {
                    Phase::Options
                }
            }
            // Terminal: the session stays here until it is completed.
            Phase::Will => Phase::Will,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChatTurn;

    fn detector() -> RuleBasedDetector {
        RuleBasedDetector::new()
    }

    /// Builds a history of `user_turns` exchanges where every user message
    /// carries the given text and every assistant reply is neutral.
    fn history_with(user_turns: usize, user_text: &str) -> Vec<ChatTurn> {
        let mut turns = Vec::new();
        for _ in 0..user_turns {
            turns.push(ChatTurn::user(user_text));
            turns.push(ChatTurn::assistant("我很好奇，可以多说一些吗？"));
        }
        turns
    }

    #[test]
    fn empty_history_returns_goal_for_any_phase() {
        for phase in [Phase::Goal, Phase::Reality, Phase::Options, Phase::Will] {
            assert_eq!(detector().detect(&[], phase), Phase::Goal);
        }
    }

    #[test]
    fn will_is_terminal() {
        let noisy = history_with(10, "我的目标是明年升职，衡量标准是绩效评级");
        assert_eq!(detector().detect(&noisy, Phase::Will), Phase::Will);
    }

    #[test]
    fn advances_at_most_one_stage() {
        // Signals for several downstream stages at once; still only a
        // single-step advance from the current stage.
        let loaded = history_with(
            10,
            "我的目标是提升效率，现状的障碍是时间不足，我计划下周开始，信心有8分",
        );
        assert_eq!(detector().detect(&loaded, Phase::Goal), Phase::Reality);
        assert_eq!(detector().detect(&loaded, Phase::Reality), Phase::Options);
        assert_eq!(detector().detect(&loaded, Phase::Options), Phase::Will);
    }

    #[test]
    fn never_regresses() {
        let idle = history_with(10, "嗯，让我再想想");
        for phase in [Phase::Goal, Phase::Reality, Phase::Options, Phase::Will] {
            assert_eq!(detector().detect(&idle, phase), phase);
        }
    }

    #[test]
    fn goal_transition_requires_three_user_turns() {
        let text = "我的目标是在三个月内提升团队协作效率，衡量标准是项目delay率下降";
        let short = history_with(2, text);
        assert_eq!(detector().detect(&short, Phase::Goal), Phase::Goal);

        let enough = history_with(3, text);
        assert_eq!(detector().detect(&enough, Phase::Goal), Phase::Reality);
    }

    #[test]
    fn goal_transition_requires_signal_language() {
        let chatty = history_with(4, "最近工作有点忙，想聊聊");
        assert_eq!(detector().detect(&chatty, Phase::Goal), Phase::Goal);
    }

    #[test]
    fn reality_transition_requires_five_user_turns_and_signal() {
        let text = "目前的现状大概是6分清晰，主要障碍就是跨部门沟通，我的优势是执行力";
        let short = history_with(4, text);
        assert_eq!(detector().detect(&short, Phase::Reality), Phase::Reality);

        let enough = history_with(5, text);
        assert_eq!(detector().detect(&enough, Phase::Reality), Phase::Options);
    }

    #[test]
    fn options_transition_requires_seven_user_turns_and_signal() {
        let text = "我计划先和主管对齐目标，再排一个双周复盘，信心大概8分";
        let short = history_with(6, text);
        assert_eq!(detector().detect(&short, Phase::Options), Phase::Options);

        let enough = history_with(7, text);
        assert_eq!(detector().detect(&enough, Phase::Options), Phase::Will);
    }

    #[test]
    fn only_recent_window_is_scanned() {
        // Goal language buried outside the last six messages must not count.
        let mut turns = history_with(3, "我的目标是三个月内完成转岗");
        for _ in 0..4 {
            turns.push(ChatTurn::user("今天天气不错"));
            turns.push(ChatTurn::assistant("听起来心情也不错？"));
        }
        assert_eq!(detector().detect(&turns, Phase::Goal), Phase::Goal);
    }

    #[test]
    fn assistant_messages_count_toward_signals_but_not_threshold() {
        // Two user turns only, even though the assistant echoes goal language.
        let turns = vec![
            ChatTurn::user("我想聊聊团队的事"),
            ChatTurn::assistant("你的目标是什么？衡量标准呢？"),
            ChatTurn::user("还没想清楚"),
            ChatTurn::assistant("慢慢来"),
        ];
        assert_eq!(detector().detect(&turns, Phase::Goal), Phase::Goal);
    }

    #[test]
    fn steady_state_is_idempotent() {
        let stable = history_with(4, "我还在梳理思路");
        let first = detector().detect(&stable, Phase::Reality);
        for _ in 0..10 {
            assert_eq!(detector().detect(&stable, Phase::Reality), first);
        }
        assert_eq!(first, Phase::Reality);
    }

    #[test]
    fn detection_is_deterministic() {
        let turns = history_with(5, "现状的障碍是资源不足，可以利用内部平台");
        let a = detector().detect(&turns, Phase::Reality);
        let b = detector().detect(&turns, Phase::Reality);
        assert_eq!(a, b);
    }
}
