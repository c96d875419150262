use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Sub;

use thiserror::Error;

pub const WALL_GLYPH: char = 'x';
pub const HOME_GLYPH: char = '!';
pub const EMPTY_GLYPH: char = ' ';

/// Integer grid coordinate. `y` grows downward, matching the rendered board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan_len(self) -> i32 {
        self.x.abs() + self.y.abs()
    }

    pub fn chebyshev_len(self) -> i32 {
        self.x.abs().max(self.y.abs())
    }

    pub fn manhattan_to(self, other: Point) -> i32 {
        (self - other).manhattan_len()
    }

    pub fn chebyshev_to(self, other: Point) -> i32 {
        (self - other).chebyshev_len()
    }

    pub fn step(self, direction: Direction) -> Point {
        let (dx, dy) = direction.delta();
        Point::new(self.x + dx, self.y + dy)
    }
}

// Coordinates are small and roughly uniform, so xor-combining is enough.
impl Hash for Point {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_i32(self.x ^ self.y);
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    West,
    South,
    East,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::West,
        Direction::South,
        Direction::East,
    ];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::West => (-1, 0),
            Self::South => (0, 1),
            Self::East => (1, 0),
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "w" => Some(Self::North),
            "a" => Some(Self::West),
            "s" => Some(Self::South),
            "d" => Some(Self::East),
            _ => None,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::West => "west",
            Self::South => "south",
            Self::East => "east",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tile {
    Empty,
    Wall,
}

impl Tile {
    pub fn glyph(self) -> char {
        match self {
            Self::Empty => EMPTY_GLYPH,
            Self::Wall => WALL_GLYPH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("grid layout has no rows")]
    Empty,
    #[error("grid row {row} has width {actual}, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("unknown tile glyph {glyph:?} at {at}")]
    UnknownGlyph { glyph: char, at: Point },
    #[error("grid layout has no home tile ('{HOME_GLYPH}')")]
    MissingHome,
}

/// Static terrain with a per-tile visited overlay and a single home tile.
///
/// Terrain never changes after construction; only the overlay is mutable.
#[derive(Debug, Clone)]
pub struct Grid {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
    visited: Vec<bool>,
    home: Point,
}

impl Grid {
    /// Builds a grid from text rows: `x` wall, `!` home, space empty.
    /// The first `!` in row-major order becomes the home tile.
    pub fn from_layout<S: AsRef<str>>(rows: &[S]) -> Result<Self, GridError> {
        let first = rows.first().ok_or(GridError::Empty)?;
        let width = first.as_ref().chars().count();
        if width == 0 {
            return Err(GridError::Empty);
        }

        let mut tiles = Vec::with_capacity(width * rows.len());
        let mut home = None;
        for (y, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            let actual = row.chars().count();
            if actual != width {
                return Err(GridError::RaggedRow {
                    row: y,
                    expected: width,
                    actual,
                });
            }
            for (x, glyph) in row.chars().enumerate() {
                let at = Point::new(x as i32, y as i32);
                let tile = match glyph {
                    WALL_GLYPH => Tile::Wall,
                    EMPTY_GLYPH => Tile::Empty,
                    HOME_GLYPH => {
                        home.get_or_insert(at);
                        Tile::Empty
                    }
                    _ => return Err(GridError::UnknownGlyph { glyph, at }),
                };
                tiles.push(tile);
            }
        }

        let home = home.ok_or(GridError::MissingHome)?;
        let visited = vec![false; tiles.len()];
        Ok(Self {
            width: width as i32,
            height: rows.len() as i32,
            tiles,
            visited,
            home,
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn home(&self) -> Point {
        self.home
    }

    fn index_of(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn tile_at(&self, at: Point) -> Option<Tile> {
        self.index_of(at.x, at.y).map(|index| self.tiles[index])
    }

    /// True when `(x, y)` is out of bounds or a wall.
    pub fn collides(&self, x: i32, y: i32) -> bool {
        match self.index_of(x, y) {
            Some(index) => self.tiles[index] == Tile::Wall,
            None => true,
        }
    }

    pub fn collides_at(&self, at: Point) -> bool {
        self.collides(at.x, at.y)
    }

    pub fn is_visited(&self, at: Point) -> bool {
        self.index_of(at.x, at.y)
            .map(|index| self.visited[index])
            .unwrap_or(false)
    }

    pub fn mark_visited(&mut self, at: Point) {
        if let Some(index) = self.index_of(at.x, at.y) {
            self.visited[index] = true;
        }
    }

    pub fn clear_visited(&mut self) {
        self.visited.iter_mut().for_each(|cell| *cell = false);
    }

    pub fn visited_count(&self) -> usize {
        self.visited.iter().filter(|cell| **cell).count()
    }

    /// Walks up to `distance` tiles from `from`, stopping before the first
    /// colliding tile. With `mark_visited`, the start tile and every entered
    /// tile are recorded in the overlay.
    pub fn try_move(
        &mut self,
        from: Point,
        direction: Direction,
        distance: u32,
        mark_visited: bool,
    ) -> Point {
        if mark_visited {
            self.mark_visited(from);
        }

        let mut current = from;
        for _ in 0..distance {
            let next = current.step(direction);
            if self.collides_at(next) {
                return current;
            }
            current = next;
            if mark_visited {
                self.mark_visited(current);
            }
        }
        current
    }
}
