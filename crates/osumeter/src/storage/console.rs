//! Colored one-play summary for the terminal.

use std::fmt::Write as _;

use owo_colors::OwoColorize;

use crate::detector::{CompletedPlay, PlayOutcome};
use crate::game::Ruleset;

/// Format a recorded play as a boxed block.
pub fn format_play_console(play: &CompletedPlay) -> String {
    let mut output = String::new();

    let name = play.map.display_name();
    let border_width = (name.chars().count() + 4).max(50);
    let border: String = "━".repeat(border_width);
    let border_dim = border.dimmed();

    let outcome = match play.outcome {
        PlayOutcome::Pass => "PASS".green().bold().to_string(),
        PlayOutcome::Fail => "FAIL".red().bold().to_string(),
    };

    let stars = play
        .map
        .star_rating
        .map(|s| format!(" {:.2}★", s))
        .unwrap_or_default();

    let _ = writeln!(output, "{}", border_dim);
    let _ = writeln!(output, "  {}{}", name.bold(), stars.yellow());
    let _ = writeln!(output, "{}", border_dim);
    let _ = writeln!(output, "  RESULT : {} ({})", outcome, play.ruleset);
    let _ = writeln!(output, "  MODS   : {}", play.mods.cyan());
    let _ = writeln!(
        output,
        "  SCORE  : {}  {:.2}%  {}x",
        play.score,
        play.accuracy * 100.0,
        play.max_combo
    );
    let _ = writeln!(output, "  HITS   : {}", format_hits(play));
    if let Some(pp) = play.pp {
        let _ = writeln!(output, "  PP     : {:.2}", pp);
    }
    if let Some(replay) = &play.replay {
        let _ = writeln!(output, "  REPLAY : {}", replay.path.display().dimmed());
    }
    let _ = writeln!(output, "{}", border_dim);

    output
}

fn format_hits(play: &CompletedPlay) -> String {
    let h = &play.hits;
    let miss = h.miss.red().to_string();
    match play.ruleset {
        Ruleset::Osu => format!("{} / {} / {} / {}", h.great, h.ok, h.meh, miss),
        Ruleset::Taiko => format!("{} / {} / {}", h.great, h.ok, miss),
        Ruleset::Catch => format!("{} / {} / {} / {}", h.great, h.ok, h.meh, miss),
        Ruleset::Mania => format!(
            "{} / {} / {} / {} / {} / {}",
            h.perfect, h.great, h.good, h.ok, h.meh, miss
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::fixtures;

    #[test]
    fn test_contains_core_fields() {
        let mut play = fixtures::play("abc", 123_456);
        play.map.star_rating = Some(5.43);
        let text = format_play_console(&play);

        assert!(text.contains("Artist - Song [Hard]"));
        assert!(text.contains("PASS"));
        assert!(text.contains("123456"));
        assert!(text.contains("96.33%"));
        assert!(text.contains("5.43"));
        assert!(text.contains("HD"));
        assert!(!text.contains("PP"));
        assert!(!text.contains("REPLAY"));
    }

    #[test]
    fn test_fail_and_replay_lines() {
        let mut play = fixtures::play("abc", 1);
        play.outcome = PlayOutcome::Fail;
        play.pp = Some(12.5);
        play.replay = Some(crate::detector::ReplayLink {
            path: "r.osr".into(),
            replay_hash: "h".to_string(),
            counts_match: true,
        });
        let text = format_play_console(&play);

        assert!(text.contains("FAIL"));
        assert!(text.contains("12.50"));
        assert!(text.contains("r.osr"));
    }
}
