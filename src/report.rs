use crate::engine::Outcome;
use crate::types::Comparison;
use colored::Colorize;

pub fn render_human(outcome: &Outcome) -> String {
    let record = &outcome.record;
    let mut out = String::new();

    if outcome.passed() {
        let note = if record.options.generate {
            format!(" ({})", "generated".dimmed())
        } else {
            String::new()
        };
        out.push_str(&format!(
            "{} {}{}\n",
            "[OK]".green().bold(),
            record.name.green(),
            note
        ));
        return out;
    }

    out.push_str(&format!(
        "{} {}\n",
        "[FAIL]".red().bold(),
        record.name.red().bold()
    ));
    if !record.verification.passed {
        out.push_str(&format!(
            "  {} {} (missing)\n",
            "expected:".bold(),
            record.verification.expected
        ));
    }
    if let Some(err) = &record.subject.error {
        out.push_str(&format!("  {} {}\n", "error   :".bold(), err.red()));
    }
    if let Some(compare) = record.compare.as_ref().filter(|c| !c.matches) {
        let detail = match (&compare.error, &compare.comparison) {
            (Some(err), _) => err.clone(),
            (None, Comparison::Text(text)) => format!("{} differs from {}", text.actual, text.expected),
            (None, Comparison::Image(image)) => image.error_msg.clone(),
        };
        out.push_str(&format!(
            "  {} {} {}\n",
            "compare :".bold(),
            compare.kind,
            detail.red()
        ));
    }
    out
}

pub fn print_human(outcome: &Outcome) {
    print!("{}", render_human(outcome));
}
