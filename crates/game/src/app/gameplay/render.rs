use std::fmt::Write as _;

use engine::Point;

use super::state::GameState;

const VISITED_OUT_OF_SIGHT: char = '$';
const UNSEEN: char = '?';
const HOME: char = '!';
const HOSTILE: char = 'E';
const QUARRY: char = 'D';
const AGENT: char = 'R';

/// Proximity hint, coordinates, turn number, then the bracketed map.
pub(crate) fn render_view(state: &GameState) -> Vec<String> {
    let mut lines = status_lines(state);
    lines.extend(map_lines(state));
    lines
}

fn status_lines(state: &GameState) -> Vec<String> {
    let agent = state.agent();
    let quarry = state.quarry();
    let rules = state.rules();
    let distance = agent.position.chebyshev_to(quarry.position);

    let hint = if distance == 0 {
        if agent.carrying {
            "You have Desmond! Get back to the front door."
        } else {
            "You can now pick up Desmond! Use the 'p' command."
        }
    } else if distance <= rules.warning_radius {
        if distance <= rules.sight_radius {
            "Desmond is in view. Look for the 'D' symbol on the map."
        } else {
            "Desmond is close, but not quite within sight."
        }
    } else {
        "Desmond isn't around these parts."
    };

    vec![
        hint.to_string(),
        format!("Current coordinates: {}", agent.position),
        format!("Home point: {}", state.grid().home()),
        format!("Turn number: {}", state.turn_counter()),
    ]
}

fn map_lines(state: &GameState) -> Vec<String> {
    let glyphs = build_glyphs(state);
    let grid = state.grid();
    let agent = state.agent().position;
    let on_quarry = agent == state.quarry().position;

    let mut lines = Vec::with_capacity(glyphs.len() + 1);
    let mut header = String::from("   ");
    for x in 0..grid.width() {
        let _ = write!(header, "{x:2} ");
    }
    lines.push(header);

    for (y, row) in glyphs.iter().enumerate() {
        let mut line = String::new();
        let _ = write!(line, "{y:2} ");
        for (x, glyph) in row.iter().enumerate() {
            let at = Point::new(x as i32, y as i32);
            let (open, close) = if at == agent && on_quarry {
                ('{', '}')
            } else if grid.is_visited(at) {
                ('(', ')')
            } else {
                ('[', ']')
            };
            line.push(open);
            line.push(*glyph);
            line.push(close);
        }
        lines.push(line);
    }
    lines
}

fn build_glyphs(state: &GameState) -> Vec<Vec<char>> {
    let grid = state.grid();
    let agent = state.agent().position;
    let sight = state.rules().sight_radius;
    let in_sight = |at: Point| at.chebyshev_to(agent) <= sight;

    let mut glyphs = Vec::with_capacity(grid.height() as usize);
    for y in 0..grid.height() {
        let mut row = Vec::with_capacity(grid.width() as usize);
        for x in 0..grid.width() {
            let at = Point::new(x, y);
            let glyph = if in_sight(at) {
                grid.tile_at(at).map(|tile| tile.glyph()).unwrap_or(UNSEEN)
            } else if grid.is_visited(at) {
                VISITED_OUT_OF_SIGHT
            } else {
                UNSEEN
            };
            row.push(glyph);
        }
        glyphs.push(row);
    }

    let mut overlay = |at: Point, glyph: char| {
        if in_sight(at) {
            glyphs[at.y as usize][at.x as usize] = glyph;
        }
    };
    overlay(grid.home(), HOME);
    for hostile in state.hostiles() {
        overlay(hostile.position, HOSTILE);
    }
    overlay(state.quarry().position, QUARRY);
    overlay(agent, AGENT);
    glyphs
}
