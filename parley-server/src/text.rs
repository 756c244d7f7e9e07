//! ANSI formatting for server-pushed text.

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const YELLOW: &str = "\x1b[33m";
pub const BLUE: &str = "\x1b[34m";
pub const PURPLE: &str = "\x1b[35m";
pub const CYAN: &str = "\x1b[36m";

/// Render `text` between two full-width border lines.
pub fn boxed(text: &str, border: char, width: usize) -> String {
    let border = border.to_string().repeat(width);
    format!("{BOLD}{PURPLE}{border}{RESET}\n{BOLD}{BLUE} {text} {RESET}\n{BOLD}{PURPLE}{border}{RESET}")
}

/// Color a broadcast line for delivery. Presence lines (`>>`) show
/// blue, bot lines purple; history keeps the plain text.
pub fn colorize(line: &str) -> String {
    if line.starts_with(">>") {
        format!("{BLUE}{line}{RESET}")
    } else if line.starts_with(crate::room::BOT_PREFIX) {
        format!("{PURPLE}{line}{RESET}")
    } else {
        line.to_string()
    }
}

/// The `/help` command summary.
pub fn help_menu() -> Vec<String> {
    let mut lines = vec![boxed("HELP MENU", '-', 50)];
    lines.push(format!("{BOLD}Available Commands:{RESET}"));
    lines.push(format!("{YELLOW}/rooms{RESET} - Show available rooms"));
    lines.push(format!("{YELLOW}/join <roomname>{RESET} - Join or create a room"));
    lines.push(format!("{YELLOW}/leave{RESET} - Leave the current room"));
    lines.push(format!("{YELLOW}/help{RESET} - Show this help menu"));
    lines.push(format!("{YELLOW}exit{RESET} - Disconnect from server"));
    lines.push(format!("{BOLD}In AI rooms:{RESET}"));
    lines.push("Type any message to interact with the AI assistant.".to_string());
    lines.push("Create an AI room with name starting with 'AI '".to_string());
    lines
}

/// The room listing block shown by `/rooms` and before room selection.
pub fn room_listing(rooms: &[String]) -> Vec<String> {
    vec![
        boxed("AVAILABLE ROOMS", '-', 40),
        format!("{CYAN}Rooms: {BOLD}{}{RESET}", rooms.join(", ")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxed_renders_three_lines() {
        let b = boxed("CHAT SERVER", '=', 50);
        let lines: Vec<&str> = b.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains(&"=".repeat(50)));
        assert!(lines[1].contains("CHAT SERVER"));
    }

    #[test]
    fn colorize_marks_presence_and_bot_lines() {
        assert!(colorize(">> alice joined the room general").starts_with(BLUE));
        assert!(colorize("Bot: hello").starts_with(PURPLE));
        assert_eq!(colorize("alice: hello"), "alice: hello");
    }
}
