use thiserror::Error;

pub const MAIN_WINDOW: &str = "main-window";
pub const BACKGROUND_WINDOW: &str = "background-window";

pub const MAIN_PANE_COUNT: usize = 3;
pub const BACKGROUND_PANE_COUNT: usize = 4;

/// Width of the right-hand column in the main window, in percent.
pub const RIGHT_COLUMN_PERCENT: u8 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    Center,
    TopRight,
    BottomRight,
}

impl Area {
    pub fn as_str(&self) -> &'static str {
        match self {
            Area::Center => "Center",
            Area::TopRight => "TopRight",
            Area::BottomRight => "BottomRight",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pane {
    pub area: Area,
    /// 1-based position within the area.
    pub index: u8,
    pub pane_id: String,
}

impl Pane {
    pub fn label(&self) -> String {
        format!("{}{}", self.area.as_str(), self.index)
    }
}

const MAIN_SLOTS: [(Area, u8); MAIN_PANE_COUNT] =
    [(Area::Center, 1), (Area::TopRight, 1), (Area::BottomRight, 1)];

const BACKGROUND_SLOTS: [(Area, u8); BACKGROUND_PANE_COUNT] = [
    (Area::Center, 2),
    (Area::Center, 3),
    (Area::BottomRight, 2),
    (Area::BottomRight, 3),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("{window} has {actual} panes, expected {expected}")]
    PaneCount {
        window: &'static str,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLayout {
    pub name: String,
    pub panes: Vec<Pane>,
}

impl SessionLayout {
    /// A handle to an existing session whose panes were not re-queried.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            panes: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.panes.len() == MAIN_PANE_COUNT + BACKGROUND_PANE_COUNT
    }

    pub fn pane(&self, area: Area, index: u8) -> Option<&Pane> {
        self.panes
            .iter()
            .find(|p| p.area == area && p.index == index)
    }

    pub fn main_target(&self) -> String {
        format!("{}:{}", self.name, MAIN_WINDOW)
    }
}

/// Assigns pane ids, in `list-panes` order, to the fixed slots of both windows.
pub fn build_session_layout(
    name: &str,
    main_ids: &[String],
    background_ids: &[String],
) -> Result<SessionLayout, LayoutError> {
    if main_ids.len() != MAIN_PANE_COUNT {
        return Err(LayoutError::PaneCount {
            window: MAIN_WINDOW,
            expected: MAIN_PANE_COUNT,
            actual: main_ids.len(),
        });
    }
    if background_ids.len() != BACKGROUND_PANE_COUNT {
        return Err(LayoutError::PaneCount {
            window: BACKGROUND_WINDOW,
            expected: BACKGROUND_PANE_COUNT,
            actual: background_ids.len(),
        });
    }

    let panes = MAIN_SLOTS
        .iter()
        .zip(main_ids)
        .chain(BACKGROUND_SLOTS.iter().zip(background_ids))
        .map(|(&(area, index), id)| Pane {
            area,
            index,
            pane_id: id.clone(),
        })
        .collect();

    Ok(SessionLayout {
        name: name.to_string(),
        panes,
    })
}

/// Three screen slots sharing one visible position: the main-window slot and
/// two hidden slots in the background window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ring {
    Center,
    RightBelow,
}

impl Ring {
    pub fn slots(&self) -> [(Area, u8); 3] {
        match self {
            Ring::Center => [(Area::Center, 1), (Area::Center, 2), (Area::Center, 3)],
            Ring::RightBelow => [
                (Area::BottomRight, 1),
                (Area::BottomRight, 2),
                (Area::BottomRight, 3),
            ],
        }
    }

    /// Current occupant of each slot, visible slot first.
    pub fn occupants(&self, layout: &SessionLayout) -> Option<[String; 3]> {
        let [a, b, c] = self.slots();
        Some([
            layout.pane(a.0, a.1)?.pane_id.clone(),
            layout.pane(b.0, b.1)?.pane_id.clone(),
            layout.pane(c.0, c.1)?.pane_id.clone(),
        ])
    }
}

/// The two `(source, target)` swaps that advance a ring one step:
/// `[a, b, c]` becomes `[b, c, a]`.
pub fn rotation_swaps<T: Clone>(occupants: &[T; 3]) -> [(T, T); 2] {
    let [a, b, c] = occupants.clone();
    [(a.clone(), b), (a, c)]
}
