//! Per-cell marching cubes
//!
//! A [`GridCell`] holds the eight corner samples of one lattice cube. Asking
//! it for triangles yields a lazy [`CellTriangles`] iterator that walks the
//! case's row in the triangle table, computing edge crossings on demand.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use super::tables::{CORNER_OFFSETS, EDGE_CONNECTIONS, END, TRI_TABLE};

/// Below this corner-value difference an edge is treated as flat and its midpoint is used
const FLAT_EDGE_EPSILON: f32 = 1e-6;

/// Three surface points, laid out as nine packed floats (CPU and GPU share this layout)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Triangle {
    pub a: [f32; 3],
    pub b: [f32; 3],
    pub c: [f32; 3],
}

impl Triangle {
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self {
            a: a.to_array(),
            b: b.to_array(),
            c: c.to_array(),
        }
    }

    pub fn points(&self) -> [Vec3; 3] {
        [Vec3::from(self.a), Vec3::from(self.b), Vec3::from(self.c)]
    }

    /// Unnormalized normal in table winding (points toward open water)
    pub fn table_normal(&self) -> Vec3 {
        let [a, b, c] = self.points();
        (b - a).cross(c - a)
    }
}

/// One lattice cube: corner positions and density samples
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridCell {
    pub positions: [Vec3; 8],
    pub values: [f32; 8],
}

impl GridCell {
    /// Axis-aligned cube with its minimum corner at `origin`
    pub fn cube(origin: Vec3, size: f32, values: [f32; 8]) -> Self {
        let positions = CORNER_OFFSETS.map(|[x, y, z]| {
            origin + Vec3::new(x as f32, y as f32, z as f32) * size
        });
        Self { positions, values }
    }

    /// 8-bit case index; bit `i` set when corner `i` is open water
    pub fn case_index(&self, threshold: f32) -> usize {
        let mut case = 0;
        for (i, &v) in self.values.iter().enumerate() {
            if v <= threshold {
                case |= 1 << i;
            }
        }
        case
    }

    /// Lazily generated surface triangles inside this cube (0 to 5)
    pub fn triangles(&self, threshold: f32, interpolate: bool) -> CellTriangles<'_> {
        CellTriangles {
            cell: self,
            row: &TRI_TABLE[self.case_index(threshold)],
            cursor: 0,
            threshold,
            interpolate,
        }
    }

    /// Where the surface crosses `edge`
    ///
    /// Endpoints are always taken lower lattice corner first, so a cube edge
    /// shared by neighbouring cells produces a bitwise identical point.
    pub fn edge_point(&self, edge: usize, threshold: f32, interpolate: bool) -> Vec3 {
        let [mut i0, mut i1] = EDGE_CONNECTIONS[edge];
        if offset_sum(i0) > offset_sum(i1) {
            std::mem::swap(&mut i0, &mut i1);
        }
        let (p0, p1) = (self.positions[i0], self.positions[i1]);
        let (v0, v1) = (self.values[i0], self.values[i1]);

        let dv = v1 - v0;
        if !interpolate || dv.abs() < FLAT_EDGE_EPSILON {
            return (p0 + p1) * 0.5;
        }
        let t = ((threshold - v0) / dv).clamp(0.0, 1.0);
        p0 + (p1 - p0) * t
    }
}

fn offset_sum(corner: usize) -> u32 {
    CORNER_OFFSETS[corner].iter().sum()
}

/// Iterator over the triangles of one cell; recomputed on each call to [`GridCell::triangles`]
pub struct CellTriangles<'a> {
    cell: &'a GridCell,
    row: &'static [i8; 16],
    cursor: usize,
    threshold: f32,
    interpolate: bool,
}

impl Iterator for CellTriangles<'_> {
    type Item = Triangle;

    fn next(&mut self) -> Option<Triangle> {
        if self.cursor + 2 >= self.row.len() || self.row[self.cursor] == END {
            return None;
        }
        let edges = &self.row[self.cursor..self.cursor + 3];
        self.cursor += 3;

        let [a, b, c] = [edges[0], edges[1], edges[2]]
            .map(|e| self.cell.edge_point(e as usize, self.threshold, self.interpolate));
        Some(Triangle::new(a, b, c))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.row[self.cursor.min(self.row.len())..]
            .iter()
            .take_while(|&&e| e != END)
            .count()
            / 3;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CellTriangles<'_> {}
