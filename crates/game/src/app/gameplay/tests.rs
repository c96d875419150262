use std::collections::HashSet;
use std::io::Cursor;

use engine::{error_chain, CommandError, Grid, LineConsole, Point, TransitionState};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::entities::{MSG_ALREADY_CARRYING, MSG_NOTHING_TO_PICK_UP, MSG_PICKED_UP};
use super::render::render_view;
use super::session::COMMAND_PROMPT;
use super::*;
use crate::app::config::{DebugAccess, GameConfig};

const HOME: Point = Point::new(0, 10);

fn rules_with_hostiles(hostile_count: usize) -> GameRules {
    GameConfig {
        hostile_count,
        ..GameConfig::default()
    }
    .rules()
}

fn fresh_state(seed: u64, hostile_count: usize, debug: DebugAccess) -> GameState {
    let grid = Grid::from_layout(&DEFAULT_LAYOUT).expect("default layout");
    GameState::new(
        grid,
        rules_with_hostiles(hostile_count),
        StdRng::seed_from_u64(seed),
        debug,
    )
}

fn started(seed: u64, hostile_count: usize, debug: DebugAccess) -> GameState {
    let mut state = fresh_state(seed, hostile_count, debug);
    state.init_game("Tester").expect("init game");
    state
}

fn dispatcher() -> GameDispatcher {
    build_dispatcher().expect("dispatcher")
}

fn run_command(state: &mut GameState, line: &str) -> i32 {
    dispatcher().execute(state, line).expect("command accepted")
}

fn rejected(state: &mut GameState, line: &str) -> String {
    let err = dispatcher()
        .execute(state, line)
        .expect_err("command rejected");
    assert!(
        matches!(err, CommandError::Execution { .. }),
        "unexpected error kind: {err}"
    );
    error_chain(&err)
}

fn scripted_round(state: &mut GameState, script: &str) -> (RoundOutcome, String) {
    let dispatcher = dispatcher();
    let mut console = LineConsole::new(Cursor::new(script.as_bytes().to_vec()), Vec::new());
    let outcome = play_round(state, &dispatcher, &mut console).expect("round io");
    let (_, output) = console.into_parts();
    (outcome, String::from_utf8(output).expect("utf8"))
}

#[test]
fn spawn_points_clear_home_and_avoid_walls() {
    for seed in 0..40 {
        let state = started(seed, 15, DebugAccess::Locked);
        let clear_zone = state.rules().clear_zone;
        let mut spawns = vec![state.quarry().position];
        spawns.extend(state.hostiles().iter().map(|hostile| hostile.position));

        for spawn in &spawns {
            let offset = *spawn - HOME;
            assert!(
                offset.x.abs() > clear_zone && offset.y.abs() > clear_zone,
                "seed {seed}: {spawn} inside clear zone"
            );
            assert!(!state.grid().collides_at(*spawn), "seed {seed}: {spawn}");
        }

        let mut hostiles: Vec<Point> = state
            .hostiles()
            .iter()
            .map(|hostile| hostile.position)
            .collect();
        assert_eq!(hostiles.len(), 15);
        hostiles.sort_by_key(|p| (p.x, p.y));
        hostiles.dedup();
        assert_eq!(hostiles.len(), 15, "seed {seed}: hostiles share a tile");
    }
}

#[test]
fn init_game_resets_counters_and_places_agent_home() {
    let state = started(3, 15, DebugAccess::Locked);
    assert_eq!(state.phase(), GamePhase::Running);
    assert_eq!(state.agent().position, HOME);
    assert!(!state.agent().carrying);
    assert_eq!(state.turn_counter(), 0);
    assert_eq!(state.score(), 0);
    assert_eq!(state.player_name(), "Tester");
    assert!(state.grid().is_visited(HOME));
    assert_eq!(state.grid().visited_count(), 1);
}

#[test]
fn spawn_gives_up_after_attempt_cap() {
    let grid = Grid::from_layout(&["! ", "  "]).expect("tiny grid");
    let rules = GameRules {
        spawn_attempt_cap: Some(50),
        ..rules_with_hostiles(1)
    };
    let mut state = GameState::new(grid, rules, StdRng::seed_from_u64(1), DebugAccess::Locked);

    let err = state.init_game("Nobody").expect_err("no room to spawn");
    assert!(matches!(
        err,
        GameError::UnsatisfiableSpawn {
            attempts: 50,
            clear_zone: 3,
            ..
        }
    ));
    assert_eq!(state.phase(), GamePhase::NotStarted);
}

#[test]
fn move_command_sprints_and_scores_the_turn() {
    let mut state = started(11, 0, DebugAccess::Locked);
    assert_eq!(run_command(&mut state, "d 3"), 0);
    assert_eq!(state.turn_counter(), 0);

    state.advance_turn();
    assert_eq!(state.agent().position, Point::new(3, 10));
    assert_eq!(state.turn_counter(), 1);
    let first = state.agent().position.manhattan_to(state.quarry().position) as u64;
    assert_eq!(state.score(), first);
    for x in 0..=3 {
        assert!(state.grid().is_visited(Point::new(x, 10)));
    }

    assert_eq!(run_command(&mut state, "s"), 0);
    state.advance_turn();
    assert_eq!(state.agent().position, Point::new(3, 11));
    assert_eq!(state.turn_counter(), 2);
    let second = state.agent().position.manhattan_to(state.quarry().position) as u64;
    assert_eq!(state.score(), first + second);
}

#[test]
fn walls_stop_the_agent_but_the_turn_still_counts() {
    let mut state = started(5, 0, DebugAccess::Locked);
    assert_eq!(run_command(&mut state, "w 2"), 0);
    state.advance_turn();
    assert_eq!(state.agent().position, HOME);
    assert_eq!(state.turn_counter(), 1);
}

#[test]
fn malformed_moves_are_rejected_without_queuing() {
    let mut state = started(5, 0, DebugAccess::Locked);

    let chain = rejected(&mut state, "d 4");
    assert!(chain.contains("The robot can only move 1-3 tiles. (got 4)"), "{chain}");
    let chain = rejected(&mut state, "d 0");
    assert!(chain.contains("(got 0)"), "{chain}");
    let chain = rejected(&mut state, "a far");
    assert!(chain.contains("'far' is not a whole number of tiles"), "{chain}");
    assert!(chain.contains("Caused by: invalid digit"), "{chain}");
    let chain = rejected(&mut state, "s 1 2");
    assert!(chain.contains("Command s only takes one argument"), "{chain}");
    let chain = rejected(&mut state, "p now");
    assert!(chain.contains("Command p takes no arguments"), "{chain}");

    assert_eq!(state.agent().intent, None);
}

#[test]
fn help_prompts_again_without_spending_a_turn() {
    let mut state = started(5, 0, DebugAccess::Locked);

    assert_eq!(run_command(&mut state, "help legend"), 1);
    let output = state.drain_output();
    assert_eq!(output[0], "Here's a legend:");

    assert_eq!(run_command(&mut state, "help"), 1);
    let output = state.drain_output();
    assert!(output
        .iter()
        .any(|line| line == "NOTE 0: the robot can only move up to 3 metres at a time."));

    assert_eq!(run_command(&mut state, "help debug"), 1);
    let output = state.drain_output();
    assert_eq!(output[0], "Debugging is NOT enabled.");
    assert!(output.iter().any(|line| line.contains("RESCUE_DEBUG=1")));
    assert!(output.iter().any(|line| line.contains("Enable Debugging")));

    assert_eq!(state.turn_counter(), 0);
    assert_eq!(state.agent().intent, None);
}

#[test]
fn debug_commands_need_debug_access() {
    let mut state = started(5, 0, DebugAccess::Locked);
    let chain = rejected(&mut state, "debug desmond");
    assert!(chain.contains("Debug mode is not enabled."), "{chain}");

    state.set_debug_access(DebugAccess::Enabled);
    assert_eq!(run_command(&mut state, "debug desmond"), 1);
    let quarry = state.quarry().position;
    assert_eq!(
        state.drain_output(),
        vec![format!("Desmond's position is ({}, {})", quarry.x, quarry.y)]
    );

    let chain = rejected(&mut state, "debug");
    assert!(chain.contains("only takes two arguments"), "{chain}");
    let chain = rejected(&mut state, "debug teleport");
    assert!(chain.contains("Unknown debug option 'teleport'"), "{chain}");

    assert_eq!(run_command(&mut state, "help debug"), 1);
    assert_eq!(state.drain_output()[0], "Here's a list of commands for debugging:");

    assert_eq!(run_command(&mut state, "debug force-win"), 0);
    assert_eq!(state.phase(), GamePhase::Won);
}

#[test]
fn give_up_ends_the_game_immediately() {
    let mut state = started(5, 0, DebugAccess::Locked);
    assert_eq!(run_command(&mut state, "give-up"), 0);
    assert_eq!(state.phase(), GamePhase::GameOver);
    assert_eq!(
        state.drain_output(),
        vec!["You just gave up on poor Desmond. How could you??"]
    );

    state.advance_turn();
    assert_eq!(state.turn_counter(), 0);
}

#[test]
fn pickup_reports_each_case() {
    let mut state = started(8, 0, DebugAccess::Locked);
    let spot = Point::new(5, 10);
    state.place_agent(spot, false);
    state.place_quarry(Point::new(12, 2), false);

    run_command(&mut state, "p");
    state.advance_turn();
    assert_eq!(state.drain_output(), vec![MSG_NOTHING_TO_PICK_UP]);
    assert!(!state.agent().carrying);

    state.place_quarry(spot, false);
    run_command(&mut state, "p");
    state.advance_turn();
    assert_eq!(state.drain_output(), vec![MSG_PICKED_UP]);
    assert!(state.agent().carrying);
    assert!(state.quarry().picked_up);

    run_command(&mut state, "p");
    state.advance_turn();
    assert_eq!(state.drain_output(), vec![MSG_ALREADY_CARRYING]);
}

#[test]
fn carried_quarry_follows_the_agent() {
    let mut state = started(8, 0, DebugAccess::Locked);
    state.place_agent(Point::new(5, 10), true);
    state.place_quarry(Point::new(5, 10), true);

    run_command(&mut state, "d 2");
    state.advance_turn();
    assert_eq!(state.agent().position, Point::new(7, 10));
    assert_eq!(state.quarry().position, Point::new(7, 10));
    assert_eq!(state.score(), 0);
}

#[test]
fn reaching_home_with_quarry_wins_even_beside_a_hostile() {
    let mut state = started(2, 0, DebugAccess::Locked);
    state.place_agent(Point::new(1, 10), true);
    state.place_quarry(Point::new(1, 10), true);
    state.place_hostiles(&[HOME]);

    run_command(&mut state, "a");
    state.advance_turn();
    assert_eq!(state.agent().position, HOME);
    assert_eq!(state.phase(), GamePhase::Won);
}

#[test]
fn walking_into_a_hostile_ends_the_game() {
    let mut state = started(2, 0, DebugAccess::Locked);
    state.place_agent(Point::new(5, 10), false);
    state.place_quarry(Point::new(12, 2), false);
    state.place_hostiles(&[Point::new(6, 10)]);

    run_command(&mut state, "d");
    state.advance_turn();
    assert_eq!(state.phase(), GamePhase::GameOver);
}

#[test]
fn wandering_never_stacks_hostiles_or_leaves_a_trail() {
    let mut quarry_wandered = false;
    for seed in 0..20 {
        let mut state = started(seed, 15, DebugAccess::Locked);
        let visited = state.grid().visited_count();
        let quarry_start = state.quarry().position;

        for tick in 0..300 {
            state.tick_all();
            let mut taken = HashSet::new();
            for hostile in state.hostiles() {
                let at = hostile.position;
                assert!(taken.insert(at), "seed {seed} tick {tick}: two hostiles on {at}");
                assert!(!state.grid().collides_at(at), "seed {seed} tick {tick}: {at}");
            }
            assert!(!state.grid().collides_at(state.quarry().position));
            assert_eq!(
                state.grid().visited_count(),
                visited,
                "seed {seed} tick {tick}: wandering marked a tile"
            );
        }
        quarry_wandered |= state.quarry().position != quarry_start;
    }
    assert!(quarry_wandered);
}

#[test]
fn quarry_and_hostiles_still_move_in_the_winning_round() {
    let hostile_start = Point::new(10, 2);
    let mut hostile_moved = false;
    for seed in 0..50 {
        let mut state = started(seed, 0, DebugAccess::Locked);
        state.place_agent(Point::new(1, 10), true);
        state.place_quarry(Point::new(1, 10), true);
        state.place_hostiles(&[hostile_start]);

        run_command(&mut state, "a");
        state.advance_turn();
        assert_eq!(state.phase(), GamePhase::Won, "seed {seed}");
        assert_eq!(state.quarry().position, HOME, "seed {seed}");
        assert_eq!(state.turn_counter(), 1, "seed {seed}");
        hostile_moved |= state.hostiles()[0].position != hostile_start;
    }
    assert!(hostile_moved);
}

#[test]
fn hostile_stepping_onto_the_agent_catches_it_next_round() {
    let agent_at = Point::new(5, 10);
    let mut stepped_on = 0;
    for seed in 0..200 {
        let mut state = started(seed, 0, DebugAccess::Locked);
        state.place_agent(agent_at, false);
        state.place_quarry(Point::new(12, 2), false);
        state.place_hostiles(&[Point::new(6, 10)]);

        state.advance_turn();
        if state.hostiles()[0].position != agent_at {
            continue;
        }
        stepped_on += 1;
        assert_eq!(state.phase(), GamePhase::Running, "seed {seed}");

        state.advance_turn();
        assert_eq!(state.phase(), GamePhase::GameOver, "seed {seed}");
    }
    assert!(stepped_on > 0);
}

#[test]
fn audio_state_follows_distance_and_carrying() {
    let mut state = started(2, 0, DebugAccess::Locked);
    state.place_agent(HOME, false);

    state.place_quarry(Point::new(10, 10), false);
    assert_eq!(state.audio_state(), TransitionState::Far);

    state.place_quarry(Point::new(5, 6), false);
    assert_eq!(state.audio_state(), TransitionState::Near);

    state.place_agent(Point::new(5, 6), true);
    state.place_quarry(Point::new(5, 6), true);
    assert_eq!(state.audio_state(), TransitionState::Carrying);
}

#[test]
fn view_shows_status_and_sight_limited_map() {
    let mut state = started(2, 0, DebugAccess::Locked);
    state.place_quarry(Point::new(2, 10), false);

    let lines = render_view(&state);
    assert_eq!(
        &lines[..4],
        &[
            "Desmond is in view. Look for the 'D' symbol on the map.",
            "Current coordinates: (0, 10)",
            "Home point: (0, 10)",
            "Turn number: 0",
        ]
    );
    assert!(lines[4].starts_with("    0  1  2 "));
    assert_eq!(lines.len(), 4 + 1 + 20);
    assert!(lines[14].starts_with(" 9 [x][x][x][?]"), "{}", lines[14]);
    assert!(lines[15].starts_with("10 (R)[ ][D][?]"), "{}", lines[15]);
    assert!(lines[4 + 1].starts_with(" 0 [?]"));
}

#[test]
fn view_marks_interactable_and_visited_tiles() {
    let mut state = started(2, 0, DebugAccess::Locked);
    state.place_quarry(HOME, false);
    let lines = render_view(&state);
    assert_eq!(lines[0], "You can now pick up Desmond! Use the 'p' command.");
    assert!(lines[15].starts_with("10 {R}"), "{}", lines[15]);

    state.place_agent(Point::new(5, 10), false);
    state.place_quarry(Point::new(9, 10), false);
    let lines = render_view(&state);
    assert_eq!(lines[0], "Desmond is close, but not quite within sight.");
    assert!(lines[15].starts_with("10 ($)[?][?]"), "{}", lines[15]);
    assert!(lines[15].contains("(R)"));

    state.place_quarry(Point::new(19, 0), false);
    assert_eq!(render_view(&state)[0], "Desmond isn't around these parts.");
}

#[test]
fn hostiles_render_only_within_sight() {
    let mut state = started(2, 0, DebugAccess::Locked);
    state.place_quarry(Point::new(19, 0), false);
    state.place_hostiles(&[Point::new(1, 11), Point::new(10, 10)]);

    let lines = render_view(&state);
    assert!(lines[16].starts_with("11 [x][E]"), "{}", lines[16]);
    assert!(!lines[15].contains('E'));
}

#[test]
fn round_reprompts_until_a_command_acts() {
    let mut state = started(4, 0, DebugAccess::Locked);
    let (outcome, output) = scripted_round(&mut state, "bogus\nhelp legend\n\"open\nd 3\n");

    assert_eq!(outcome, RoundOutcome::Completed);
    assert_eq!(state.turn_counter(), 1);
    assert_eq!(state.agent().position, Point::new(3, 10));
    assert_eq!(output.matches(COMMAND_PROMPT).count(), 4);
    assert!(output.contains("unknown command 'bogus'. try: help"));
    assert!(output.contains("Here's a legend:"));
    assert!(output.contains("could not parse command line\nCaused by: unterminated quoted string"));
}

#[test]
fn round_rejects_overlong_line_and_prompts_again() {
    let mut state = started(4, 0, DebugAccess::Locked);
    let script = format!("help \"{}\"\nd\n", "a".repeat(300));
    let (outcome, output) = scripted_round(&mut state, &script);

    assert_eq!(outcome, RoundOutcome::Completed);
    assert_eq!(output.matches(COMMAND_PROMPT).count(), 2);
    assert!(output.contains("command line is 307 characters long; the limit is 256"));
    assert_eq!(state.agent().position, Point::new(1, 10));
}

#[test]
fn round_reports_closed_input_and_quit_requests() {
    let mut state = started(4, 0, DebugAccess::Enabled);
    let (outcome, _) = scripted_round(&mut state, "");
    assert_eq!(outcome, RoundOutcome::InputClosed);
    assert_eq!(state.turn_counter(), 0);

    let (outcome, _) = scripted_round(&mut state, "debug quit\n");
    assert_eq!(outcome, RoundOutcome::QuitRequested);
    assert!(state.quit_requested());
    assert_eq!(state.turn_counter(), 0);
}

#[test]
fn round_that_ends_the_game_skips_the_tick() {
    let mut state = started(4, 0, DebugAccess::Locked);
    let (outcome, output) = scripted_round(&mut state, "give-up\n");
    assert_eq!(outcome, RoundOutcome::Completed);
    assert_eq!(state.phase(), GamePhase::GameOver);
    assert_eq!(state.turn_counter(), 0);
    assert!(output.contains("How could you??"));
}
