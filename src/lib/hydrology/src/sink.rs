//! Generic output-sink interface (spec §6 "Persisted state"). The concrete
//! NetCDF writer is an external collaborator, out of scope for this crate;
//! this module defines the seam it is driven through.

use std::collections::HashMap;

use crate::error::Result;
use crate::grid::{FieldAttrs, Scalar2D};

/// Implemented by whatever external component actually serializes fields.
/// `define_variables` declares the variable and its attributes without
/// writing data; `write_variables` writes the current values.
pub trait OutputSink {
    fn define_variable(&mut self, attrs: &FieldAttrs) -> Result<()>;
    fn write_variable(&mut self, attrs: &FieldAttrs, field: &Scalar2D) -> Result<()>;
}

/// In-memory sink used by tests to exercise the round-trip property
/// (spec §8) without file I/O.
#[derive(Default)]
pub struct RecordingSink {
    pub defined: Vec<&'static str>,
    pub written: HashMap<&'static str, Vec<f64>>,
}

impl OutputSink for RecordingSink {
    fn define_variable(&mut self, attrs: &FieldAttrs) -> Result<()> {
        self.defined.push(attrs.short_name);
        Ok(())
    }

    fn write_variable(&mut self, attrs: &FieldAttrs, field: &Scalar2D) -> Result<()> {
        let values: Vec<f64> = field.owned_indices().map(|(i, j)| field.get(i, j)).collect();
        self.written.insert(attrs.short_name, values);
        Ok(())
    }
}

impl RecordingSink {
    /// Replays a previously written variable back into a freshly allocated
    /// field with the same layout, for the round-trip test in spec §8.
    pub fn restore_into(&self, short_name: &str, field: &mut Scalar2D) {
        if let Some(values) = self.written.get(short_name) {
            for ((i, j), value) in field.owned_indices().collect::<Vec<_>>().into_iter().zip(values) {
                field.set(i, j, *value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridLayout, PismIntent};

    fn layout() -> GridLayout {
        GridLayout {
            xs: 0,
            ys: 0,
            xm: 3,
            ym: 3,
            halo: 1,
            dx: 1.0,
            dy: 1.0,
        }
    }

    fn attrs() -> FieldAttrs {
        FieldAttrs {
            short_name: "bwat",
            units: "m",
            valid_min: 0.0,
            long_name: "subglacial water thickness",
            pism_intent: PismIntent::ModelState,
        }
    }

    #[test]
    fn round_trip_through_recording_sink_is_exact() {
        let l = layout();
        let a = attrs();
        let mut field = Scalar2D::new(l, a.clone(), 0.0);
        for (i, j) in field.owned_indices() {
            field.set(i, j, (i * 10 + j) as f64 * 0.1);
        }

        let mut sink = RecordingSink::default();
        sink.define_variable(&a).unwrap();
        sink.write_variable(&a, &field).unwrap();

        let mut restored = Scalar2D::new(l, a.clone(), -1.0);
        sink.restore_into(a.short_name, &mut restored);

        for (i, j) in field.owned_indices() {
            assert_eq!(field.get(i, j), restored.get(i, j));
        }
    }
}
