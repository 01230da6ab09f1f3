use battle_sync::{CellColor, WireGrid};

#[derive(Clone, PartialEq)]
pub enum TermCell {
    Empty,
    Block(CellColor),
    Hazard,
    BorderVertical,
    BorderHorizontal,
    BorderBottomLeft,
    BorderBottomRight,
    Space,
    Message(String),
}

pub trait TermStyle {
    fn display<'a>(&self, cell: &'a TermCell) -> &'a str;
    fn width(&self, cell: &TermCell) -> usize;
}

pub trait TermRender {
    fn output(&self, style: &impl TermStyle) -> Vec<Vec<TermCell>>;
    fn render(&self, style: &impl TermStyle) -> Vec<String> {
        self.output(style)
            .iter()
            .map(|row| row.iter().map(|cell| style.display(cell)).collect())
            .collect()
    }
}

fn line_width(line: &[TermCell], style: &impl TermStyle) -> usize {
    line.iter().map(|cell| style.width(cell)).sum()
}

// Make all lines in block the same width by padding with TermCell::Space
pub fn pad_block_right(block: &mut [Vec<TermCell>], style: &impl TermStyle) {
    let width = block
        .iter()
        .map(|line| line_width(line, style))
        .max()
        .unwrap_or(0);
    for line in block.iter_mut() {
        let padding = width - line_width(line, style);
        line.extend(std::iter::repeat(TermCell::Space).take(padding));
    }
}

pub struct PlainTermStyle;

impl TermStyle for PlainTermStyle {
    fn display<'a>(&self, cell: &'a TermCell) -> &'a str {
        match cell {
            TermCell::Empty => "  ",
            TermCell::Block(CellColor::Garbage) => "##",
            TermCell::Block(_) => "[]",
            TermCell::Hazard => "()",
            TermCell::BorderVertical => "|",
            TermCell::BorderHorizontal => "--",
            TermCell::BorderBottomLeft | TermCell::BorderBottomRight => "+",
            TermCell::Space => " ",
            TermCell::Message(s) => s.as_str(),
        }
    }

    fn width(&self, cell: &TermCell) -> usize {
        cell_width(cell)
    }
}

pub struct AnsiTermStyle;

impl TermStyle for AnsiTermStyle {
    fn display<'a>(&self, cell: &'a TermCell) -> &'a str {
        match cell {
            TermCell::Empty => "\x1b[0m  ",
            TermCell::Block(CellColor::I) => "\x1b[0;36m[]",
            TermCell::Block(CellColor::O) => "\x1b[0;33m[]",
            TermCell::Block(CellColor::T) => "\x1b[0;35m[]",
            TermCell::Block(CellColor::S) => "\x1b[0;32m[]",
            TermCell::Block(CellColor::Z) => "\x1b[0;31m[]",
            TermCell::Block(CellColor::J) => "\x1b[0;34m[]",
            TermCell::Block(CellColor::L) => "\x1b[0;37m[]",
            TermCell::Block(CellColor::Garbage) => "\x1b[0;90m##",
            TermCell::Hazard => "\x1b[1;33m()",
            TermCell::BorderVertical => "\x1b[0m│",
            TermCell::BorderHorizontal => "\x1b[0m──",
            TermCell::BorderBottomLeft => "\x1b[0m└",
            TermCell::BorderBottomRight => "\x1b[0m┘",
            TermCell::Space => " ",
            TermCell::Message(s) => s.as_str(),
        }
    }

    fn width(&self, cell: &TermCell) -> usize {
        cell_width(cell)
    }
}

fn cell_width(cell: &TermCell) -> usize {
    match cell {
        TermCell::Empty | TermCell::Block(_) | TermCell::Hazard | TermCell::BorderHorizontal => 2,
        TermCell::BorderVertical
        | TermCell::BorderBottomLeft
        | TermCell::BorderBottomRight
        | TermCell::Space => 1,
        TermCell::Message(s) => s.chars().count(),
    }
}

/// One player's well: a grid snapshot, hazards on top, an optional banner
pub struct WellField {
    grid: WireGrid,
    hazards: Vec<(i32, i32)>,
    title: String,
    banner: Option<String>,
}

impl WellField {
    pub fn new(grid: WireGrid, title: impl Into<String>) -> Self {
        Self {
            grid,
            hazards: Vec::new(),
            title: title.into(),
            banner: None,
        }
    }

    pub fn with_hazards(mut self, hazards: Vec<(i32, i32)>) -> Self {
        self.hazards = hazards;
        self
    }

    pub fn with_banner(mut self, banner: Option<String>) -> Self {
        self.banner = banner;
        self
    }
}

impl TermRender for WellField {
    fn output(&self, style: &impl TermStyle) -> Vec<Vec<TermCell>> {
        let mut lines = vec![vec![TermCell::Space, TermCell::Message(self.title.clone())]];
        for y in 0..self.grid.rows() {
            let mut line = vec![TermCell::BorderVertical];
            for x in 0..self.grid.cols() {
                let cell = if self.hazards.contains(&(x as i32, y as i32)) {
                    TermCell::Hazard
                } else {
                    match self.grid.cell(x, y) {
                        Some(color) => TermCell::Block(color),
                        None => TermCell::Empty,
                    }
                };
                line.push(cell);
            }
            line.push(TermCell::BorderVertical);
            lines.push(line);
        }
        if let Some(banner) = &self.banner {
            let middle = lines.len() / 2;
            let inner = self.grid.cols() * 2;
            let text: String = banner.chars().take(inner).collect();
            let left = (inner - text.chars().count()) / 2;
            let right = inner - left - text.chars().count();
            lines[middle] = vec![
                TermCell::BorderVertical,
                TermCell::Message(format!("{}{}{}", " ".repeat(left), text, " ".repeat(right))),
                TermCell::BorderVertical,
            ];
        }
        let mut bottom = vec![TermCell::BorderBottomLeft];
        bottom.extend(std::iter::repeat(TermCell::BorderHorizontal).take(self.grid.cols()));
        bottom.push(TermCell::BorderBottomRight);
        lines.push(bottom);
        pad_block_right(&mut lines, style);
        lines
    }
}

/// Both wells side by side with a status column between them
pub struct DuelField {
    player: WellField,
    opponent: WellField,
    status: Vec<String>,
}

impl DuelField {
    pub fn new(player: WellField, opponent: WellField, status: Vec<String>) -> Self {
        Self {
            player,
            opponent,
            status,
        }
    }
}

impl TermRender for DuelField {
    fn output(&self, style: &impl TermStyle) -> Vec<Vec<TermCell>> {
        let player = self.player.output(style);
        let opponent = self.opponent.output(style);
        let mut status: Vec<Vec<TermCell>> = self
            .status
            .iter()
            .map(|s| vec![TermCell::Space, TermCell::Message(s.clone()), TermCell::Space])
            .collect();
        status.resize(player.len().max(opponent.len()), vec![TermCell::Space]);
        pad_block_right(&mut status, style);

        let player_width = player.first().map(|l| line_width(l, style)).unwrap_or(0);
        let opponent_width = opponent.first().map(|l| line_width(l, style)).unwrap_or(0);
        let mut lines = Vec::new();
        for (i, middle) in status.into_iter().enumerate() {
            let mut line = player
                .get(i)
                .cloned()
                .unwrap_or_else(|| vec![TermCell::Space; player_width]);
            line.push(TermCell::Space);
            line.extend(middle);
            line.push(TermCell::Space);
            line.extend(
                opponent
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| vec![TermCell::Space; opponent_width]),
            );
            lines.push(line);
        }
        lines
    }
}
