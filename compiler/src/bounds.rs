// bounds.rs — 3D bounding-box and halo algebra
//
// A Box3 describes a per-axis range of grid offsets, e.g. the neighborhood a
// stencil reads from one array, or the region a group must compute
// redundantly. The outward operators grow or shrink a box away from or
// towards the origin; they are the workhorses of the boundary analysis.
//
// Preconditions: none (types and pure functions only).
// Postconditions: none.
// Failure modes: none.
// Side effects: none.

use serde::{Deserialize, Serialize};

/// A relative grid offset `(di, dj, dk)`.
pub type Offset = [i32; 3];

/// Per-axis `(lo, hi)` endpoint pairs of a 3D offset box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Box3 {
    pub x: (i32, i32),
    pub y: (i32, i32),
    pub z: (i32, i32),
}

impl Box3 {
    /// The degenerate box containing only the origin.
    pub const ZERO: Box3 = Box3 {
        x: (0, 0),
        y: (0, 0),
        z: (0, 0),
    };

    /// Smallest box covering all offsets. Returns `ZERO` for an empty set.
    pub fn from_offsets<'a, I>(offsets: I) -> Box3
    where
        I: IntoIterator<Item = &'a Offset>,
    {
        let mut iter = offsets.into_iter();
        let first = match iter.next() {
            Some(o) => *o,
            None => return Box3::ZERO,
        };
        let mut bounds = [(first[0], first[0]), (first[1], first[1]), (first[2], first[2])];
        for off in iter {
            for (axis, b) in bounds.iter_mut().enumerate() {
                b.0 = b.0.min(off[axis]);
                b.1 = b.1.max(off[axis]);
            }
        }
        Box3 {
            x: bounds[0],
            y: bounds[1],
            z: bounds[2],
        }
    }

    /// Componentwise sum of corresponding endpoints.
    pub fn sum(self, other: Box3) -> Box3 {
        self.zip(other, |a, b| a + b)
    }

    /// Per endpoint pair: the min if the pair sums to ≤ 0, else the max.
    /// Grows the box outward from the origin.
    pub fn outward_max(self, other: Box3) -> Box3 {
        self.zip(other, |a, b| if a + b <= 0 { a.min(b) } else { a.max(b) })
    }

    /// Dual of `outward_max`: pulls the box inward towards the origin.
    pub fn outward_min(self, other: Box3) -> Box3 {
        self.zip(other, |a, b| if a + b <= 0 { a.max(b) } else { a.min(b) })
    }

    /// Endpoints as `[(xlo,xhi), (ylo,yhi), (zlo,zhi)]` for axis iteration.
    pub fn axes(self) -> [(i32, i32); 3] {
        [self.x, self.y, self.z]
    }

    /// True when every endpoint magnitude is within the per-axis widths.
    pub fn within(self, widths: [u32; 3]) -> bool {
        self.axes()
            .iter()
            .zip(widths.iter())
            .all(|(&(lo, hi), &w)| lo.unsigned_abs() <= w && hi.unsigned_abs() <= w)
    }

    fn zip(self, other: Box3, f: impl Fn(i32, i32) -> i32) -> Box3 {
        Box3 {
            x: (f(self.x.0, other.x.0), f(self.x.1, other.x.1)),
            y: (f(self.y.0, other.y.0), f(self.y.1, other.y.1)),
            z: (f(self.z.0, other.z.0), f(self.z.1, other.z.1)),
        }
    }
}

/// A halo exchange region: the outer box is the remote requirement, the inner
/// box is the part the local side can compute itself. The exchanged points
/// are the outer-minus-inner shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Halo {
    pub outer: Box3,
    pub inner: Box3,
}

impl Halo {
    /// Halo between a remote requirement box and a locally computable box.
    pub fn between(remote: Box3, local: Box3) -> Halo {
        Halo {
            outer: remote,
            inner: remote.outward_min(local),
        }
    }

    /// Empty iff on every axis the outer box does not extend past the inner.
    pub fn is_empty(&self) -> bool {
        self.outer
            .axes()
            .iter()
            .zip(self.inner.axes().iter())
            .all(|(o, i)| o.0 - i.0 >= 0 && o.1 - i.1 <= 0)
    }
}
