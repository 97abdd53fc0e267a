use std::fmt::Write;

use crate::aggregate::Window;
use crate::models::{RankedList, SigninType, TypeFilter};

pub fn build_report(
    filter: TypeFilter,
    window: Window,
    type_mix: &RankedList<SigninType>,
    leaderboard: &RankedList<String>,
    limit: usize,
) -> String {
    let mut output = String::new();
    let total: usize = type_mix.iter().map(|pair| pair.value).sum();

    let _ = writeln!(output, "# Sign-in Report");
    let _ = writeln!(
        output,
        "Window {} to {} ({} sign-ins)",
        window.start().format("%Y-%m-%d %H:%M"),
        window.end().format("%Y-%m-%d %H:%M"),
        total
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Sign-in Mix");

    if type_mix.is_empty() {
        let _ = writeln!(output, "No sign-ins recorded for this window.");
    } else {
        for pair in type_mix {
            let _ = writeln!(output, "- {}: {} sign-ins", pair.key, pair.value);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Most Active Members ({filter})");

    if leaderboard.is_empty() {
        let _ = writeln!(output, "No members signed in during this window.");
    } else {
        for (place, pair) in leaderboard.iter().take(limit).enumerate() {
            let _ = writeln!(output, "{}. {} with {} sign-ins", place + 1, pair.key, pair.value);
        }
    }

    output
}
