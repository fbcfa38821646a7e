//! Block assembly: the per-invocation description of one cell's compute.

use std::sync::Arc;

use blockwork_core::{
    ArrayBinding, Binding, CellGrid, CropSlice, DataError, ElementKind, ExecutionContext,
    EngineError, Halo, Interval, SharedBuffer,
};

use crate::input::{worker_shape, DataView, InputGenerator};

/// Names a block task binds into a context; all are removed afterwards.
pub const BLOCK_NAMES: [&str; 8] = [
    "_buf", "_inputs", "_index", "_min", "_max", "_dim", "_halo", "block",
];

/// One cell's compute: its geometry, a fresh output buffer, and its
/// inputs over the halo-extended interval.
#[derive(Clone, Debug)]
pub struct Block {
    index: u64,
    interval: Interval,
    kind: ElementKind,
    output: SharedBuffer,
    inputs: Vec<DataView>,
    halo: Halo,
    crop: Vec<CropSlice>,
}

impl Block {
    /// Block for `interval` with a freshly allocated output buffer of
    /// `kind.buffer_len(n)` bytes.
    pub fn new(
        index: u64,
        interval: Interval,
        kind: ElementKind,
        inputs: Vec<DataView>,
        halo: Halo,
    ) -> Result<Self, DataError> {
        let crop = halo
            .crop_slices(&interval.dims())
            .map_err(|_| DataError::DimensionMismatch {
                expected: interval.num_dims(),
                actual: halo.num_dims(),
            })?;
        Ok(Self {
            index,
            output: SharedBuffer::zeroed(kind.buffer_len(interval.num_elements())),
            interval,
            kind,
            inputs,
            halo,
            crop,
        })
    }

    /// Assemble the block for cell `index` of `grid`: compute its bounds,
    /// extend them by `halo`, and ask every generator for an input.
    pub fn assemble(
        grid: &CellGrid,
        index: u64,
        kind: ElementKind,
        halo: &Halo,
        generators: &[Arc<dyn InputGenerator>],
    ) -> Result<Self, DataError> {
        let interval = grid.cell_interval(index)?;
        let extended = halo.extend(&interval).map_err(|_| DataError::DimensionMismatch {
            expected: grid.num_dims(),
            actual: halo.num_dims(),
        })?;
        let inputs = generators
            .iter()
            .map(|g| g.generate(&extended))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(index, interval, kind, inputs, halo.clone())
    }

    /// Linear cell index.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// The cell's own interval (without halo).
    pub fn interval(&self) -> &Interval {
        &self.interval
    }

    /// Output element kind.
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Output storage, written by exactly one worker.
    pub fn output(&self) -> &SharedBuffer {
        &self.output
    }

    /// Inputs in generator order.
    pub fn inputs(&self) -> &[DataView] {
        &self.inputs
    }

    /// The halo the inputs were extended by.
    pub fn halo(&self) -> &Halo {
        &self.halo
    }

    /// Host values for every `_`-prefixed block name, in worker axis order.
    pub fn bindings(&self) -> Vec<(&'static str, Binding)> {
        let reversed = |v: &[i64]| v.iter().rev().copied().collect::<Vec<_>>();
        let dims = self.interval.dims();
        vec![
            (
                "_buf",
                Binding::Array(ArrayBinding {
                    buffer: self.output.clone(),
                    primitive: self.kind.storage(),
                    shape: worker_shape(self.kind, &dims),
                }),
            ),
            (
                "_inputs",
                Binding::Arrays(self.inputs.iter().map(DataView::to_binding).collect()),
            ),
            ("_index", Binding::Int(self.index as i64)),
            ("_min", Binding::Ints(reversed(self.interval.min()))),
            ("_max", Binding::Ints(reversed(self.interval.max()))),
            ("_dim", Binding::Ints(dims.iter().rev().map(|&n| n as i64).collect())),
            ("_halo", Binding::Slices(self.crop.iter().rev().copied().collect())),
        ]
    }

    /// Bind the block, build `block` with `statement`, run `code`, then
    /// remove every name in [`BLOCK_NAMES`] whether or not `code` failed.
    pub fn execute(
        &self,
        ctx: &mut dyn ExecutionContext,
        statement: &str,
        code: &str,
    ) -> Result<(), EngineError> {
        let result = self.bind_and_run(ctx, statement, code);
        for name in BLOCK_NAMES {
            ctx.unbind(name);
        }
        result
    }

    fn bind_and_run(
        &self,
        ctx: &mut dyn ExecutionContext,
        statement: &str,
        code: &str,
    ) -> Result<(), EngineError> {
        for (name, binding) in self.bindings() {
            ctx.bind(name, binding)?;
        }
        ctx.exec(statement)?;
        ctx.exec(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound<'a>(bindings: &'a [(&'static str, Binding)], name: &str) -> &'a Binding {
        &bindings.iter().find(|(n, _)| *n == name).unwrap().1
    }

    #[test]
    fn output_buffer_is_sized_by_kind() {
        let grid = CellGrid::new(&[5, 4], &[3, 3]).unwrap();
        let halo = Halo::empty(2);
        // cell 1 is the short boundary cell at x = 3..4, y = 0..2
        let b = Block::assemble(&grid, 1, ElementKind::F64, &halo, &[]).unwrap();
        assert_eq!(b.interval().dims().as_slice(), &[2, 3]);
        assert_eq!(b.output().len(), 6 * 8);
        let b = Block::assemble(&grid, 1, ElementKind::I16, &halo, &[]).unwrap();
        assert_eq!(b.output().len(), 6 * 2);
        let b = Block::assemble(&grid, 1, ElementKind::Complex32, &halo, &[]).unwrap();
        assert_eq!(b.output().len(), 6 * 8);
        let b = Block::assemble(&grid, 1, ElementKind::Bit, &halo, &[]).unwrap();
        assert_eq!(b.output().len(), 8);
    }

    #[test]
    fn bindings_are_reversed() {
        let grid = CellGrid::new(&[5, 4], &[3, 3]).unwrap();
        let halo = Halo::new(&[1, 0], &[2, 0]).unwrap();
        let b = Block::assemble(&grid, 3, ElementKind::U8, &halo, &[]).unwrap();
        let bindings = b.bindings();
        assert!(matches!(bound(&bindings, "_index"), Binding::Int(3)));
        assert!(matches!(bound(&bindings, "_min"), Binding::Ints(v) if v == &[3, 3]));
        assert!(matches!(bound(&bindings, "_max"), Binding::Ints(v) if v == &[3, 4]));
        assert!(matches!(bound(&bindings, "_dim"), Binding::Ints(v) if v == &[1, 2]));
        let Binding::Slices(h) = bound(&bindings, "_halo") else {
            panic!("slices expected");
        };
        assert_eq!(h, &[CropSlice { offset: 0, len: 1 }, CropSlice { offset: 1, len: 2 }]);
        let Binding::Array(buf) = bound(&bindings, "_buf") else {
            panic!("array expected");
        };
        assert_eq!(buf.shape.as_slice(), &[1, 2]);
    }

    #[test]
    fn halo_rank_must_match() {
        let grid = CellGrid::new(&[4], &[2]).unwrap();
        let err = Block::assemble(&grid, 0, ElementKind::U8, &Halo::empty(2), &[]).unwrap_err();
        assert!(matches!(err, DataError::DimensionMismatch { .. }));
        let err = Block::assemble(&grid, 9, ElementKind::U8, &Halo::empty(1), &[]).unwrap_err();
        assert!(matches!(err, DataError::CellIndexOutOfRange { index: 9, count: 2 }));
    }
}
