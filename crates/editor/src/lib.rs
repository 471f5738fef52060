//! In-memory authoring state for one route.
//!
//! A [`RouteDraft`] exists only while a route is being drawn or repaired. It
//! owns the ordered point sequence plus the highlight/selection bookkeeping
//! the map display needs, and produces a codec-ready sequence on demand.
//! Failed operations never leave a partial mutation behind.

use std::{collections::BTreeSet, error, fmt, result};

use model::{route::Route, Coordinate};
use utility::{geo, id::Id};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    /// At least two points are required for the attempted operation.
    InsufficientPoints,
    /// An index-based operation addressed a point that does not exist.
    IndexOutOfRange { index: usize, len: usize },
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientPoints => {
                write!(f, "route needs at least two points")
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "point index {} out of range (length {})", index, len)
            }
        }
    }
}

impl error::Error for EditError {}

pub type Result<T> = result::Result<T, EditError>;

/// The ephemeral editable form of a route. Discarded on cancel, or turned
/// into a save request via [`RouteDraft::to_codec_sequence`] on exit.
#[derive(Debug, Clone)]
pub struct RouteDraft {
    route_id: Option<Id<Route>>,
    display_name: String,
    points: Vec<Coordinate>,
    highlighted: Option<usize>,
    selected: BTreeSet<usize>,
    is_new: bool,
}

impl RouteDraft {
    /// Starts authoring a brand-new route.
    pub fn new<S: Into<String>>(display_name: S) -> Self {
        Self {
            route_id: None,
            display_name: display_name.into(),
            points: Vec::new(),
            highlighted: None,
            selected: BTreeSet::new(),
            is_new: true,
        }
    }

    /// Starts revising an already-persisted route from its decoded points.
    pub fn for_route<S: Into<String>>(
        route_id: Id<Route>,
        display_name: S,
        points: Vec<Coordinate>,
    ) -> Self {
        Self {
            route_id: Some(route_id),
            display_name: display_name.into(),
            points,
            highlighted: None,
            selected: BTreeSet::new(),
            is_new: false,
        }
    }

    pub fn route_id(&self) -> Option<Id<Route>> {
        self.route_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn set_display_name<S: Into<String>>(&mut self, display_name: S) {
        self.display_name = display_name.into();
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    pub fn selected(&self) -> &BTreeSet<usize> {
        &self.selected
    }

    /// Pushes a point to the end of the sequence.
    pub fn append_point(&mut self, point: Coordinate) {
        self.points.push(point);
    }

    /// Inserts the raw clicked point after the start of the segment it is
    /// closest to. Ties between equally distant segments go to the earliest
    /// one. Requires at least two existing points.
    pub fn insert_near_segment(&mut self, point: Coordinate) -> Result<()> {
        if self.points.len() < 2 {
            return Err(EditError::InsufficientPoints);
        }

        let mut best_index = 0;
        let mut best_distance = f64::INFINITY;
        for (index, pair) in self.points.windows(2).enumerate() {
            let (_, distance) = geo::nearest_point_on_segment(
                point.into(),
                pair[0].into(),
                pair[1].into(),
            );
            if distance < best_distance {
                best_distance = distance;
                best_index = index;
            }
        }

        self.points.insert(best_index + 1, point);
        self.shift_bookkeeping_for_insert(best_index + 1);
        Ok(())
    }

    /// Replaces the coordinate at `index`.
    pub fn relocate_point(&mut self, index: usize, point: Coordinate) -> Result<()> {
        self.check_index(index)?;
        self.points[index] = point;
        Ok(())
    }

    /// Removes the point at `index`, shifting later indices down by one. The
    /// highlight and selection are adjusted to keep addressing the same
    /// points; a highlight on the removed point is cleared.
    pub fn delete_at(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        self.points.remove(index);
        self.highlighted = match self.highlighted {
            Some(h) if h == index => None,
            Some(h) if h > index => Some(h - 1),
            other => other,
        };
        self.selected = self
            .selected
            .iter()
            .filter(|&&s| s != index)
            .map(|&s| if s > index { s - 1 } else { s })
            .collect();
        Ok(())
    }

    /// Removes all points whose index is in `indices`, preserving the
    /// relative order of the remainder. Out-of-range members are ignored.
    /// Clears the selection.
    pub fn delete_indices(&mut self, indices: &BTreeSet<usize>) {
        let mut index = 0;
        self.points.retain(|_| {
            let keep = !indices.contains(&index);
            index += 1;
            keep
        });
        self.highlighted = match self.highlighted {
            Some(h) if indices.contains(&h) => None,
            Some(h) => Some(h - indices.iter().filter(|&&i| i < h).count()),
            None => None,
        };
        self.selected.clear();
    }

    /// Removes the currently selected points.
    pub fn delete_selected(&mut self) {
        let selected = std::mem::take(&mut self.selected);
        self.delete_indices(&selected);
    }

    /// Replaces the selection with all points inside the closed rectangle
    /// spanned by the two corners.
    pub fn select_in_bounding_box(&mut self, corner_1: Coordinate, corner_2: Coordinate) {
        let as_pairs: Vec<(f64, f64)> =
            self.points.iter().map(|&p| p.into()).collect();
        self.selected =
            geo::points_in_bounding_box(&as_pairs, corner_1.into(), corner_2.into())
                .into_iter()
                .collect();
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub fn highlight(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        self.highlighted = Some(index);
        Ok(())
    }

    pub fn clear_highlight(&mut self) {
        self.highlighted = None;
    }

    /// Removes all points and bookkeeping.
    pub fn clear(&mut self) {
        self.points.clear();
        self.highlighted = None;
        self.selected.clear();
    }

    /// The current sequence, ready for codec encoding. A route with fewer
    /// than two points cannot be persisted as active.
    pub fn to_codec_sequence(&self) -> Result<&[Coordinate]> {
        if self.points.len() < 2 {
            return Err(EditError::InsufficientPoints);
        }
        Ok(&self.points)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.points.len() {
            return Err(EditError::IndexOutOfRange {
                index,
                len: self.points.len(),
            });
        }
        Ok(())
    }

    fn shift_bookkeeping_for_insert(&mut self, inserted_at: usize) {
        if let Some(h) = self.highlighted {
            if h >= inserted_at {
                self.highlighted = Some(h + 1);
            }
        }
        self.selected = self
            .selected
            .iter()
            .map(|&s| if s >= inserted_at { s + 1 } else { s })
            .collect();
    }
}
