use engine::Score;

const NAME_WIDTH: usize = 20;
const POINTS_WIDTH: usize = 5;

pub(crate) const TITLE_ART: &[&str] = &[
    "==========================================================================",
    "/----   8   |   | +-----      +---\\  +----- /---- \\   /  /=\\  |\\  | +---\\ ",
    "|      / \\  |   | |           |    | |      |     |\\ /| /   \\ | | | |    |",
    "\\---\\ /   \\ \\   / +-----      |    | +----- \\---\\ | v | |   | | | | |    |",
    "    | |---|  \\ /  |           |    | |          | |   | \\   / | | | |    |",
    "----/ |   |   v   +-----      +---/  +----- ----/ |   |  \\=/  |  \\| +---/ ",
    "==========================================================================",
    "",
];

pub(crate) const INTRO_PARAGRAPHS: &[&[&str]] = &[
    &[
        "The year is 21XX. A zombie apocalypse has befallen humanity. You're lucky -- ",
        "you made it to a safety shelter in time and have not been plagued. We've still",
        "been on the lookout for more survivors though, and we have our sights set on a",
        "local daycare. While most were evacuated from the daycare, one kid named Des-",
        "-mond was on the potty at the time and missed the call. I'm convinced he's ",
        "alive though. ",
    ],
    &[
        "You will be guiding a robot that we've dropped off at the front of the daycare.",
        "Your job is to find Desmond, pick him up, and bring him back to the front of ",
        "the daycare; all while avoiding the zombies inside the building. Points in this",
        "game are added based on a) how many turns you take and b) how close you are to ",
        "Desmond on each turn. The lower your score is, the better.",
    ],
    &[
        "To move the robot around, just use \"w\", \"a\", \"s\", and \"d\". Adding a number af-",
        "-terwards, like \"s 2\" or \"d 3\", allow the robot to clear 2 or 3 tiles in one ",
        "quick sprint. To pick up Desmond, move on top of him, then use \"p\".",
    ],
];

pub(crate) const WIN_ART: &[&str] = &[
    "=========================================",
    "\\   /  /=\\  |   |      |   |  /=\\  |\\  |",
    " \\ /  /   \\ |   |      |   | /   \\ | | |",
    "  Y   |   | |   |      | 8 | |   | | | |",
    "  |   \\   / |   |      |/ \\| \\   / | | |",
    "  |    \\=/   \\=/       /   \\  \\=/  |  \\|",
    "=========================================",
];

pub(crate) const GAME_OVER_ART: &[&str] = &[
    "======================================================",
    " /---   8   \\   / +-----       /=\\  |   | +----- +===\\",
    "/      / \\  |\\ /| |           /   \\ |   | |      |   |",
    "|   + /   \\ | v | +-----      |   | \\   / +----- +===/",
    "\\   | |---| |   | |           \\   /  \\ /  |      |\\__ ",
    " \\--+ |   | |   | +-----       \\=/    v   +----- |   \\",
    "======================================================",
];

pub(crate) fn win_lines(name: &str, score: u64) -> Vec<String> {
    let mut lines: Vec<String> = WIN_ART.iter().map(|line| line.to_string()).collect();
    lines.push(format!("Score: {score}"));
    lines.push(format!(
        "Thank you for getting him out safely, {name}. His parents have been"
    ));
    lines.push("waiting for so long, and they've been anxiously waiting to see him.".to_string());
    lines.push(
        "(You hear Desmond rushing towards his parents, anxious to hug his mom and dad.)"
            .to_string(),
    );
    lines
}

/// Leaderboard table, highest score first.
pub(crate) fn leaderboard_lines(scores: &[Score]) -> Vec<String> {
    if scores.is_empty() {
        return vec!["No leaderboard data available...".to_string()];
    }

    let mut lines = Vec::with_capacity(scores.len() + 2);
    lines.push(format!(
        "{:<name_w$} | {:<points_w$}",
        "Name",
        "Score",
        name_w = NAME_WIDTH,
        points_w = POINTS_WIDTH
    ));
    lines.push(format!(
        "{}-+-{}",
        "-".repeat(NAME_WIDTH),
        "-".repeat(POINTS_WIDTH)
    ));
    for score in scores.iter().rev() {
        lines.push(format!(
            "{:<name_w$} | {:>points_w$}",
            truncate_name(&score.name),
            score.points,
            name_w = NAME_WIDTH,
            points_w = POINTS_WIDTH
        ));
    }
    lines
}

fn truncate_name(name: &str) -> String {
    if name.chars().count() > NAME_WIDTH {
        let mut short: String = name.chars().take(NAME_WIDTH - 3).collect();
        short.push_str("...");
        short
    } else {
        name.to_string()
    }
}
