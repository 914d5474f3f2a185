use std::collections::VecDeque;

use civ_tactics_core::CellCoord;
use serde::Deserialize;

/// External pointer collaborator supplied by the rendering layer.
///
/// The core never ray-casts; it only asks which cell is under the pointer.
/// Each tick the selection flow calls [`PointerPick::is_held`] once, then
/// [`PointerPick::pick`] if the button is still down.
pub trait PointerPick {
    /// Samples the selection button for the current frame.
    fn is_held(&mut self) -> bool;

    /// Cell currently under the pointer, if the pointer is over the grid.
    fn pick(&mut self) -> Option<CellCoord>;
}

/// One frame of recorded pointer input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct PointerSample {
    /// Whether the selection button is down.
    #[serde(default)]
    pub held: bool,
    /// Cell under the pointer.
    #[serde(default)]
    pub cell: Option<CellCoord>,
}

impl PointerSample {
    /// Button held with the pointer over `cell`.
    #[must_use]
    pub const fn held_over(cell: CellCoord) -> Self {
        Self {
            held: true,
            cell: Some(cell),
        }
    }

    /// Button held with the pointer outside the grid.
    #[must_use]
    pub const fn held_off_grid() -> Self {
        Self {
            held: true,
            cell: None,
        }
    }

    /// Button released.
    #[must_use]
    pub const fn released() -> Self {
        Self {
            held: false,
            cell: None,
        }
    }
}

/// Replays a recorded pointer trace, one sample per [`PointerPick::is_held`] call.
///
/// Once the trace runs out the button reads as released.
#[derive(Clone, Debug, Default)]
pub struct ScriptedPointer {
    samples: VecDeque<PointerSample>,
    current: PointerSample,
}

impl ScriptedPointer {
    /// Creates a pointer that replays `samples` in order.
    pub fn new(samples: impl IntoIterator<Item = PointerSample>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
            current: PointerSample::released(),
        }
    }

    /// Drag gesture holding the button over each cell for `hold` frames, then releasing.
    pub fn drag(cells: &[CellCoord], hold: usize) -> Self {
        let held = cells
            .iter()
            .flat_map(|cell| std::iter::repeat(PointerSample::held_over(*cell)).take(hold));
        Self::new(held.chain(std::iter::once(PointerSample::released())))
    }

    /// Samples not yet replayed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

impl PointerPick for ScriptedPointer {
    fn is_held(&mut self) -> bool {
        self.current = self
            .samples
            .pop_front()
            .unwrap_or_else(PointerSample::released);
        self.current.held
    }

    fn pick(&mut self) -> Option<CellCoord> {
        self.current.cell
    }
}
