/// Built-in daycare floor plan. `x` wall, `!` front door (home), space floor.
pub(crate) const DEFAULT_LAYOUT: [&str; 20] = [
    "   x   x     x      ",
    "   x   x     x      ",
    "   x   x            ",
    "   xx  x            ",
    "    x  x     xxxxxxx",
    "    x  x     x      ",
    "    x  x     x      ",
    "       x     x xxxxx",
    "       x     x      ",
    "xxx                 ",
    "!              xxxxx",
    "x                   ",
    "xxx                 ",
    "           xxxxx    ",
    "           x   x    ",
    "               x    ",
    "               x    ",
    "           x  xx    ",
    "xxxxxxxx   x        ",
    "xxxxxxxx   x        ",
];
