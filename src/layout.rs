//! Page layout calculations
//!
//! Card positions are computed in pixels at the configured resolution with
//! the origin at the top-left corner of the page. Conversion to PDF points
//! happens only when a page is rendered.

/// Simple length type in millimeters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Length(pub f64);

impl Length {
    /// Create a length from millimeters
    pub fn from_mm(mm: f64) -> Self {
        Length(mm)
    }

    /// Get the value in points (1/72 inch)
    pub fn pt(&self) -> f64 {
        self.0 * 72.0 / 25.4
    }

    /// Whole pixels at the given resolution (truncated)
    pub fn px(&self, dpi: u32) -> u32 {
        (self.0 / 25.4 * dpi as f64) as u32
    }
}

/// Page dimensions
#[derive(Debug, Clone, Copy)]
pub struct PageDimensions {
    pub width: Length,
    pub height: Length,
}

impl PageDimensions {
    /// A4 size (210mm × 297mm)
    pub fn a4() -> Self {
        Self {
            width: Length::from_mm(210.0),
            height: Length::from_mm(297.0),
        }
    }

    /// Canvas size in pixels
    pub fn to_pixels(&self, dpi: u32) -> (u32, u32) {
        (self.width.px(dpi), self.height.px(dpi))
    }
}

/// Fixed grid of equally sized cards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardGrid {
    pub card_width: u32,
    pub card_height: u32,
    /// Offset of the first card from the top-left page corner
    pub margin: u32,
    /// Gap between neighbouring cards
    pub spacing: u32,
    pub columns: u32,
    pub max_rows_per_page: u32,
}

impl CardGrid {
    /// Cards that fit on one full page
    pub fn capacity(&self) -> usize {
        (self.columns * self.max_rows_per_page) as usize
    }

    /// Right and bottom edge of a full page of cards
    pub fn extent(&self) -> (u32, u32) {
        let width = self.margin
            + self.columns.saturating_sub(1) * (self.card_width + self.spacing)
            + self.card_width;
        let height = self.margin
            + self.max_rows_per_page.saturating_sub(1) * (self.card_height + self.spacing)
            + self.card_height;
        (width, height)
    }
}

/// Where one card goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Position of the card in the input sequence
    pub index: usize,
    /// Top-left corner in page pixels
    pub x: u32,
    pub y: u32,
}

/// Cards assigned to one output page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePlan {
    /// 1-based page number
    pub number: usize,
    pub slots: Vec<Slot>,
}

/// Assign `count` cards to pages
///
/// Cards are placed row-major. The cursor advances by card width plus
/// spacing; after every `columns` cards it returns to the margin and drops
/// one row. A page is closed as soon as its row counter reaches
/// `max_rows_per_page`, and a final partial page is closed when the cursor
/// has left its starting position. Zero cards yields zero pages.
pub fn paginate(count: usize, grid: &CardGrid) -> Vec<PagePlan> {
    let columns = grid.columns.max(1) as usize;
    let max_rows = grid.max_rows_per_page.max(1);

    let mut pages = Vec::new();
    let mut slots = Vec::new();
    let (mut x, mut y) = (grid.margin, grid.margin);
    let mut row = 0;

    for index in 0..count {
        slots.push(Slot { index, x, y });
        x += grid.card_width + grid.spacing;

        if (index + 1) % columns == 0 {
            x = grid.margin;
            y += grid.card_height + grid.spacing;
            row += 1;
        }

        if row >= max_rows {
            pages.push(PagePlan {
                number: pages.len() + 1,
                slots: std::mem::take(&mut slots),
            });
            x = grid.margin;
            y = grid.margin;
            row = 0;
        }
    }

    if x != grid.margin || y != grid.margin {
        pages.push(PagePlan {
            number: pages.len() + 1,
            slots,
        });
    }

    pages
}
