use std::fmt;

/// Opaque placeholder for a byte offset that is not known yet
///
/// Labels are cheap integers; they only become offsets once a layout pass resolves them. A label
/// is distinct from the offset it resolves to.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Label(pub u32);

impl fmt::Debug for Label {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("l{}", self.0))
    }
}

/// Generates fresh labels
#[derive(Clone, Default)]
pub struct LabelGenerator(u32);

impl LabelGenerator {
    pub fn new() -> LabelGenerator {
        LabelGenerator(0)
    }

    pub fn fresh(&mut self) -> Label {
        let label = Label(self.0);
        self.0 += 1;
        label
    }

    /// Make sure future fresh labels don't collide with a caller-chosen one
    pub fn reserve_past(&mut self, label: Label) {
        if label.0 >= self.0 {
            self.0 = label.0 + 1;
        }
    }
}
